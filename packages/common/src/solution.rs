use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::record::{Content, Header, Record, hex_content};

/// One student's submission for one task.
///
/// Each new submission timestamp is a new version; the latest per ID is the
/// "actual" solution.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Solution {
    #[serde(flatten)]
    pub header: Header,
    #[serde(with = "hex_content")]
    pub content: Content,
    /// Check ID to the argument spec supplied to that check.
    pub checks: BTreeMap<String, Value>,
}

impl Solution {
    pub fn new(header: Header, content: Content) -> Self {
        Self {
            header,
            content,
            checks: BTreeMap::new(),
        }
    }

    /// Register a check for this solution with its argument spec.
    pub fn with_check(mut self, check_id: impl Into<String>, spec: Value) -> Self {
        self.checks.insert(check_id.into(), spec);
        self
    }
}

impl Record for Solution {
    const IS_VERSIONED: bool = true;

    fn header(&self) -> &Header {
        &self.header
    }
}

/// Raw delivered homework, as scraped by a delivery backend.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Homework {
    #[serde(flatten)]
    pub header: Header,
    #[serde(with = "hex_content")]
    pub content: Content,
}

impl Record for Homework {
    const IS_VERSIONED: bool = true;

    fn header(&self) -> &Header {
        &self.header
    }
}
