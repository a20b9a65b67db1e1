//! Output comparison: whitespace-insensitive diff and scoring.

use common::Comparison;

pub const EXPECT_LABEL: &str = "<expect>";
pub const ACTUAL_LABEL: &str = "<actual>";
const CONTEXT: usize = 3;

/// Split on whitespace and terminate every token with a newline.
pub fn normalize(output: &[u8]) -> Vec<Vec<u8>> {
    output
        .split(|b| b.is_ascii_whitespace())
        .filter(|token| !token.is_empty())
        .map(|token| {
            let mut line = token.to_vec();
            line.push(b'\n');
            line
        })
        .collect()
}

/// Unified diff from `expected` to `actual`, empty when they agree up to
/// whitespace.
///
/// When either raw output is longer than `test_size` bytes, both sides are
/// replaced by a size marker so the diff never carries raw content.
pub fn diff(actual: &[u8], expected: &[u8], test_size: usize) -> Vec<u8> {
    let mut actual_lines = normalize(actual);
    let mut expected_lines = normalize(expected);
    if actual_lines == expected_lines {
        return Vec::new();
    }

    if actual.len() > test_size || expected.len() > test_size {
        expected_lines = vec![format!("size differs: expect {}\n", expected.len()).into_bytes()];
        actual_lines = vec![format!("size differs: actual {}\n", actual.len()).into_bytes()];
    }
    unified_diff(&expected_lines, &actual_lines, EXPECT_LABEL, ACTUAL_LABEL)
}

/// 1.0 iff the diff is empty.
pub fn exact_score(diff: &[u8]) -> f64 {
    if diff.is_empty() { 1.0 } else { 0.0 }
}

/// 1.0 iff every whitespace-separated token pair parses as floats that are
/// close within `rel_tol`. A length mismatch or unparsable token scores 0.0.
pub fn float_score(actual: &[u8], expected: &[u8], rel_tol: f64) -> f64 {
    let actual = normalize(actual);
    let expected = normalize(expected);
    if actual.len() != expected.len() {
        return 0.0;
    }
    let all_close = actual.iter().zip(&expected).all(|(a, e)| {
        match (parse_float(a), parse_float(e)) {
            (Some(a), Some(e)) => is_close(a, e, rel_tol),
            _ => false,
        }
    });
    if all_close { 1.0 } else { 0.0 }
}

/// Score `actual` against `expected` under `comparison`.
pub fn score(
    comparison: Comparison,
    actual: &[u8],
    expected: &[u8],
    diff: &[u8],
    rel_tol: f64,
) -> f64 {
    match comparison {
        Comparison::Exact => exact_score(diff),
        Comparison::Float if diff.is_empty() => 1.0,
        Comparison::Float => float_score(actual, expected, rel_tol),
    }
}

fn parse_float(token: &[u8]) -> Option<f64> {
    std::str::from_utf8(token).ok()?.trim().parse().ok()
}

fn is_close(a: f64, b: f64, rel_tol: f64) -> bool {
    if a == b {
        return true;
    }
    if a.is_infinite() || b.is_infinite() {
        return false;
    }
    (a - b).abs() <= rel_tol * a.abs().max(b.abs())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Edit {
    Equal,
    Delete,
    Insert,
}

/// Shortest edit script from `a` to `b` (Myers, O((N+M)D)).
fn edit_script<T: PartialEq>(a: &[T], b: &[T]) -> Vec<Edit> {
    let n = a.len() as isize;
    let m = b.len() as isize;
    let max = (n + m) as usize;
    let offset = max as isize;
    let mut v = vec![0isize; 2 * max + 2];
    let mut trace = Vec::new();

    'search: for d in 0..=max as isize {
        trace.push(v.clone());
        let mut k = -d;
        while k <= d {
            let idx = (k + offset) as usize;
            let mut x = if k == -d || (k != d && v[idx - 1] < v[idx + 1]) {
                v[idx + 1]
            } else {
                v[idx - 1] + 1
            };
            let mut y = x - k;
            while x < n && y < m && a[x as usize] == b[y as usize] {
                x += 1;
                y += 1;
            }
            v[idx] = x;
            if x >= n && y >= m {
                break 'search;
            }
            k += 2;
        }
    }

    let mut edits = Vec::with_capacity(max);
    let (mut x, mut y) = (n, m);
    for (d, v) in trace.iter().enumerate().rev() {
        let d = d as isize;
        let k = x - y;
        let idx = (k + offset) as usize;
        let prev_k = if k == -d || (k != d && v[idx - 1] < v[idx + 1]) {
            k + 1
        } else {
            k - 1
        };
        let prev_x = v[(prev_k + offset) as usize];
        let prev_y = prev_x - prev_k;

        while x > prev_x && y > prev_y {
            x -= 1;
            y -= 1;
            edits.push(Edit::Equal);
        }
        if d > 0 {
            if x == prev_x {
                edits.push(Edit::Insert);
            } else {
                edits.push(Edit::Delete);
            }
        }
        x = prev_x;
        y = prev_y;
    }
    edits.reverse();
    edits
}

/// `start,len` as printed in a unified hunk header (1-based).
fn hunk_range(start: usize, len: usize) -> String {
    match len {
        1 => format!("{}", start + 1),
        0 => format!("{start},0"),
        _ => format!("{},{len}", start + 1),
    }
}

/// Unified diff of two line sequences, each line already newline-terminated.
pub fn unified_diff(a: &[Vec<u8>], b: &[Vec<u8>], from: &str, to: &str) -> Vec<u8> {
    let edits = edit_script(a, b);
    if edits.iter().all(|e| *e == Edit::Equal) {
        return Vec::new();
    }

    // Line positions in `a` and `b` before each edit.
    let mut positions = Vec::with_capacity(edits.len() + 1);
    let (mut ai, mut bi) = (0, 0);
    for edit in &edits {
        positions.push((ai, bi));
        match edit {
            Edit::Equal => {
                ai += 1;
                bi += 1;
            }
            Edit::Delete => ai += 1,
            Edit::Insert => bi += 1,
        }
    }
    positions.push((ai, bi));

    // Group changes whose context windows touch.
    let changes: Vec<usize> = (0..edits.len()).filter(|&i| edits[i] != Edit::Equal).collect();
    let mut hunks: Vec<(usize, usize)> = Vec::new();
    for &i in &changes {
        let start = i.saturating_sub(CONTEXT);
        let end = (i + 1 + CONTEXT).min(edits.len());
        match hunks.last_mut() {
            Some(last) if start <= last.1 => last.1 = end,
            _ => hunks.push((start, end)),
        }
    }

    let mut out = format!("--- {from}\n+++ {to}\n").into_bytes();
    for (start, end) in hunks {
        let (a_start, b_start) = positions[start];
        let (a_end, b_end) = positions[end];
        out.extend_from_slice(
            format!(
                "@@ -{} +{} @@\n",
                hunk_range(a_start, a_end - a_start),
                hunk_range(b_start, b_end - b_start)
            )
            .as_bytes(),
        );
        for i in start..end {
            let (ai, bi) = positions[i];
            let (prefix, line) = match edits[i] {
                Edit::Equal => (b' ', &a[ai]),
                Edit::Delete => (b'-', &a[ai]),
                Edit::Insert => (b'+', &b[bi]),
            };
            out.push(prefix);
            out.extend_from_slice(line);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(text: &str) -> Vec<Vec<u8>> {
        text.split_inclusive('\n').map(|l| l.as_bytes().to_vec()).collect()
    }

    #[test]
    fn test_normalize_ignores_whitespace_layout() {
        assert_eq!(normalize(b"  1 2\n\n3\t"), normalize(b"1\n2\n3\n"));
        assert_eq!(normalize(b"1 2"), vec![b"1\n".to_vec(), b"2\n".to_vec()]);
        assert!(normalize(b" \n ").is_empty());
    }

    #[test]
    fn test_identical_output_has_empty_diff() {
        for sample in [&b""[..], b"345", b"1 2 3\n", b"\xff\xfe binary"] {
            let d = diff(sample, sample, 2);
            assert!(d.is_empty());
            assert_eq!(exact_score(&d), 1.0);
        }
        assert!(diff(b"345\n", b"345", 100).is_empty());
    }

    #[test]
    fn test_mismatch_produces_labelled_unified_diff() {
        let d = String::from_utf8(diff(b"346\n", b"345", 100)).unwrap();
        assert_eq!(d, "--- <expect>\n+++ <actual>\n@@ -1 +1 @@\n-345\n+346\n");
        assert_eq!(exact_score(d.as_bytes()), 0.0);
    }

    #[test]
    fn test_oversized_output_only_mentions_sizes() {
        let actual = b"secret ".repeat(50);
        let d = String::from_utf8(diff(&actual, b"345", 100)).unwrap();
        assert!(d.contains("size differs: expect 3"));
        assert!(d.contains(&format!("size differs: actual {}", actual.len())));
        assert!(!d.contains("secret"));
        assert!(!d.contains("345\n"));
    }

    #[test]
    fn test_hunks_keep_context_and_split_far_changes() {
        let a = lines("1\n2\n3\n4\n5\n6\n7\n8\n9\n10\n11\n12\n13\n14\n15\n");
        let mut b = a.clone();
        b[1] = b"two\n".to_vec();
        b[13] = b"fourteen\n".to_vec();

        let d = String::from_utf8(unified_diff(&a, &b, "x", "y")).unwrap();
        let headers: Vec<&str> = d.lines().filter(|l| l.starts_with("@@")).collect();
        assert_eq!(headers, vec!["@@ -1,5 +1,5 @@", "@@ -11,5 +11,5 @@"]);
        assert!(d.contains("-2\n+two\n"));
        assert!(d.contains("-14\n+fourteen\n"));
    }

    #[test]
    fn test_insert_only_diff() {
        let d = String::from_utf8(unified_diff(&[], &lines("a\n"), "x", "y")).unwrap();
        assert_eq!(d, "--- x\n+++ y\n@@ -0,0 +1 @@\n+a\n");
    }

    #[test]
    fn test_edit_script_is_minimal() {
        let a: Vec<char> = "ABCABBA".chars().collect();
        let b: Vec<char> = "CBABAC".chars().collect();
        let edits = edit_script(&a, &b);
        let changes = edits.iter().filter(|e| **e != Edit::Equal).count();
        assert_eq!(changes, 5);
    }

    #[test]
    fn test_float_score() {
        assert_eq!(float_score(b"0.30000000000000004", b"0.3", 1e-9), 1.0);
        assert_eq!(float_score(b"1.0 2.0", b"1 2", 1e-9), 1.0);
        assert_eq!(float_score(b"1.1", b"1.0", 1e-9), 0.0);
        assert_eq!(float_score(b"1.0", b"1.0 2.0", 1e-9), 0.0);
        assert_eq!(float_score(b"abc", b"abc", 1e-9), 0.0);
        assert_eq!(float_score(b"inf", b"inf", 1e-9), 1.0);
    }

    #[test]
    fn test_score_dispatch() {
        let d = diff(b"1.0", b"1", 100);
        assert!(!d.is_empty());
        assert_eq!(score(Comparison::Exact, b"1.0", b"1", &d, 1e-9), 0.0);
        assert_eq!(score(Comparison::Float, b"1.0", b"1", &d, 1e-9), 1.0);
        assert_eq!(score(Comparison::Float, b"x", b"x", &[], 1e-9), 1.0);
    }
}
