use serde::{Deserialize, Serialize};

use crate::category::{Category, Verdict};
use crate::check::Check;
use crate::record::{Header, InvalidRecord, Record, now_timestamp};
use crate::solution::Solution;

/// Identity of the single current result for a (check, solution) pair.
pub fn result_id(check_id: &str, solution_id: &str) -> String {
    format!("{check_id}{solution_id}")
}

/// Result of one check run against one solution.
///
/// Not versioned: a re-run overwrites the previous row. The input timestamps
/// are kept so staleness can be decided without re-reading the inputs.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CheckResult {
    #[serde(flatten)]
    pub header: Header,
    /// Conventionally in `[0, 1]`.
    pub rating: f64,
    pub category: Category,
    #[serde(rename = "check_ID")]
    pub check_id: String,
    pub check_timestamp: f64,
    #[serde(rename = "solution_ID")]
    pub solution_id: String,
    pub solution_timestamp: f64,
    pub verdict: Verdict,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl CheckResult {
    /// Empty result for `check` run against `solution`, stamped now.
    pub fn for_pair(check: &Check, solution: &Solution) -> Self {
        Self {
            header: Header::new(
                result_id(&check.header.id, &solution.header.id),
                solution.header.user_id.clone(),
                solution.header.task_id.clone(),
                now_timestamp(),
            ),
            rating: 0.0,
            category: check.category,
            check_id: check.header.id.clone(),
            check_timestamp: check.header.timestamp,
            solution_id: solution.header.id.clone(),
            solution_timestamp: solution.header.timestamp,
            verdict: Verdict::default(),
            stdout: Vec::new(),
            stderr: Vec::new(),
        }
    }

    /// Append a line of explanation to the captured stderr.
    pub fn append_stderr(&mut self, text: &[u8]) {
        if !self.stderr.is_empty() && !self.stderr.ends_with(b"\n") {
            self.stderr.push(b'\n');
        }
        self.stderr.extend_from_slice(text);
    }
}

impl Record for CheckResult {
    const IS_VERSIONED: bool = false;

    fn header(&self) -> &Header {
        &self.header
    }

    fn validate(&self) -> Result<(), InvalidRecord> {
        self.header.validate()?;
        if self.check_id.is_empty() {
            return Err(InvalidRecord::MissingField("check_ID"));
        }
        if self.solution_id.is_empty() {
            return Err(InvalidRecord::MissingField("solution_ID"));
        }
        Ok(())
    }
}
