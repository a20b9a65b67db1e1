use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::category::Category;
use crate::record::{Content, Header, Record, hex_content};

/// Instructor-supplied check.
///
/// A runtime check holds a `name.in`/`name.out` pair, a validate check holds
/// exactly one source module.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Check {
    #[serde(flatten)]
    pub header: Header,
    #[serde(with = "hex_content")]
    pub content: Content,
    pub category: Category,
}

impl Check {
    pub fn new(header: Header, category: Category, content: Content) -> Self {
        Self {
            header,
            content,
            category,
        }
    }

    /// First file whose name ends with `suffix` (e.g. `".in"`).
    pub fn file_with_suffix(&self, suffix: &str) -> Option<(&str, &[u8])> {
        self.content
            .iter()
            .find(|(name, _)| name.ends_with(suffix))
            .map(|(name, bytes)| (name.as_str(), bytes.as_slice()))
    }
}

impl Record for Check {
    const IS_VERSIONED: bool = true;

    fn header(&self) -> &Header {
        &self.header
    }
}

/// Extra arguments handed to a check at grading time.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CheckArgs {
    pub args: Vec<Value>,
    pub kwargs: Map<String, Value>,
}

impl CheckArgs {
    /// Normalize an argument spec into `(args, kwargs)`.
    ///
    /// Accepted shapes: `null` (no arguments), a bare value (one positional
    /// argument), a list (positional arguments), a mapping (keyword
    /// arguments), or a two-element `[mapping, list]` pair.
    pub fn from_spec(spec: &Value) -> Self {
        match spec {
            Value::Null => Self::default(),
            Value::Object(kwargs) => Self {
                args: Vec::new(),
                kwargs: kwargs.clone(),
            },
            Value::Array(items) => match items.as_slice() {
                [Value::Object(kwargs), Value::Array(args)] => Self {
                    args: args.clone(),
                    kwargs: kwargs.clone(),
                },
                _ => Self {
                    args: items.clone(),
                    kwargs: Map::new(),
                },
            },
            other => Self {
                args: vec![other.clone()],
                kwargs: Map::new(),
            },
        }
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty() && self.kwargs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_args_from_null() {
        assert!(CheckArgs::from_spec(&Value::Null).is_empty());
    }

    #[test]
    fn test_args_from_bare_value() {
        let args = CheckArgs::from_spec(&json!(3));
        assert_eq!(args.args, vec![json!(3)]);
        assert!(args.kwargs.is_empty());
    }

    #[test]
    fn test_args_from_list_and_mapping() {
        let args = CheckArgs::from_spec(&json!([1, "two"]));
        assert_eq!(args.args, vec![json!(1), json!("two")]);

        let kwargs = CheckArgs::from_spec(&json!({"limit": 10}));
        assert!(kwargs.args.is_empty());
        assert_eq!(kwargs.kwargs.get("limit"), Some(&json!(10)));
    }

    #[test]
    fn test_args_from_pair() {
        let args = CheckArgs::from_spec(&json!([{"deadline": "2024-01-08"}, [1, 2]]));
        assert_eq!(args.args, vec![json!(1), json!(2)]);
        assert_eq!(args.kwargs.get("deadline"), Some(&json!("2024-01-08")));
    }

    #[test]
    fn test_file_with_suffix() {
        let mut content = Content::new();
        content.insert("1.in".into(), b"123, 345".to_vec());
        content.insert("1.out".into(), b"345".to_vec());
        let check = Check::new(Header::new("c", "", "t", 1.0), Category::Runtime, content);

        assert_eq!(check.file_with_suffix(".in"), Some(("1.in", &b"123, 345"[..])));
        assert_eq!(check.file_with_suffix(".out"), Some(("1.out", &b"345"[..])));
        assert_eq!(check.file_with_suffix(".py"), None);
    }
}
