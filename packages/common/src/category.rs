#[cfg(feature = "sea-orm")]
use sea_orm::prelude::StringLen;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of a check, deciding which checker evaluates it.
///
/// When the `sea-orm` feature is enabled, this enum can be used directly in SeaORM entities.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(
    feature = "sea-orm",
    derive(sea_orm::DeriveActiveEnum, sea_orm::EnumIter),
    sea_orm(rs_type = "String", db_type = "String(StringLen::None)")
)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Run the submitted program against an `.in`/`.out` pair.
    #[default]
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "runtime"))]
    Runtime,
    /// Run instructor-authored scoring code against the solution.
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "validate"))]
    Validate,
    /// Cross-solution similarity check (evaluated outside the execution engine).
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "plagiary"))]
    Plagiary,
}

impl Category {
    pub const ALL: &'static [Category] = &[Self::Runtime, Self::Validate, Self::Plagiary];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Runtime => "runtime",
            Self::Validate => "validate",
            Self::Plagiary => "plagiary",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of running one check against one solution.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(
    feature = "sea-orm",
    derive(sea_orm::DeriveActiveEnum, sea_orm::EnumIter),
    sea_orm(rs_type = "String", db_type = "String(StringLen::None)")
)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    /// The program (or validator) ran to completion with exit code zero.
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "passed"))]
    Passed,
    /// Non-zero exit, crash, timeout, or a validator exception.
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "failed"))]
    Failed,
    /// The validator module has no known entrypoint.
    #[default]
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "missing"))]
    Missing,
}

impl Verdict {
    pub const ALL: &'static [Verdict] = &[Self::Passed, Self::Failed, Self::Missing];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Passed => "passed",
            Self::Failed => "failed",
            Self::Missing => "missing",
        }
    }

    /// Verdict for a finished process: passed iff the exit code is zero.
    pub fn from_exit_code(code: Option<i32>) -> Self {
        match code {
            Some(0) => Self::Passed,
            _ => Self::Failed,
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error when parsing an invalid category or verdict string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseKindError {
    kind: &'static str,
    invalid: String,
    valid: Vec<&'static str>,
}

impl fmt::Display for ParseKindError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Invalid {} '{}'. Valid values: {}",
            self.kind,
            self.invalid,
            self.valid.join(", ")
        )
    }
}

impl std::error::Error for ParseKindError {}

impl FromStr for Category {
    type Err = ParseKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| ParseKindError {
                kind: "category",
                invalid: s.to_string(),
                valid: Self::ALL.iter().map(|c| c.as_str()).collect(),
            })
    }
}

impl FromStr for Verdict {
    type Err = ParseKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|v| v.as_str() == s)
            .ok_or_else(|| ParseKindError {
                kind: "verdict",
                invalid: s.to_string(),
                valid: Self::ALL.iter().map(|v| v.as_str()).collect(),
            })
    }
}
