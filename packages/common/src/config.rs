use std::collections::HashMap;

use serde::Deserialize;
use serde_json::Value;

use crate::check::CheckArgs;

/// Global fallbacks for per-task limits.
#[derive(Debug, Deserialize, Clone)]
pub struct TestsConfig {
    /// Output size in bytes above which diffs collapse to a size marker. Default: 100.
    #[serde(default = "default_max_size")]
    pub max_size: usize,
    /// CPU time limit in seconds. Default: 2.
    #[serde(default = "default_time_limit")]
    pub default_time_limit: u64,
    /// Stack size limit in bytes. Default: 3 MiB.
    #[serde(default = "default_resource_limit")]
    pub default_resource_limit: u64,
}

fn default_max_size() -> usize {
    100
}
fn default_time_limit() -> u64 {
    2
}
fn default_resource_limit() -> u64 {
    3 * 1024 * 1024
}

impl Default for TestsConfig {
    fn default() -> Self {
        Self {
            max_size: default_max_size(),
            default_time_limit: default_time_limit(),
            default_resource_limit: default_resource_limit(),
        }
    }
}

/// How program output is compared with the expected output.
#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Comparison {
    /// Whitespace-insensitive exact match.
    #[default]
    Exact,
    /// Token-wise float comparison with a relative tolerance.
    Float,
}

/// Per-task configuration, keyed by task ID. Every field is optional.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct TaskConfig {
    /// CPU time limit in seconds.
    pub time_limit: Option<u64>,
    /// Stack size limit in bytes.
    pub resource_limit: Option<u64>,
    /// Diff truncation threshold in bytes.
    pub test_size: Option<usize>,
    /// Address space limit in bytes (Linux only).
    pub address_space_limit: Option<u64>,
    /// Maximum size of a file the program may write, in bytes (Linux only).
    pub file_size_limit: Option<u64>,
    #[serde(default)]
    pub comparison: Comparison,
    /// Relative tolerance for [`Comparison::Float`]. Default: 1e-9.
    pub float_tolerance: Option<f64>,
    /// Check IDs injected into every solution of this task.
    #[serde(default)]
    pub checks: Vec<String>,
    /// Argument specs keyed by check ID.
    #[serde(default)]
    pub check_args: HashMap<String, Value>,
}

impl TaskConfig {
    /// Normalized arguments configured for `check_id`, if any.
    pub fn args_for(&self, check_id: &str) -> Option<CheckArgs> {
        self.check_args.get(check_id).map(CheckArgs::from_spec)
    }
}

/// Limits resolved for one task, falling back to [`TestsConfig`].
#[derive(Debug, Clone, PartialEq)]
pub struct TaskLimits {
    pub time_limit: u64,
    pub resource_limit: u64,
    pub test_size: usize,
    pub address_space_limit: Option<u64>,
    pub file_size_limit: Option<u64>,
    pub comparison: Comparison,
    pub float_tolerance: f64,
}

pub const DEFAULT_FLOAT_TOLERANCE: f64 = 1e-9;

impl TaskLimits {
    pub fn resolve(task: Option<&TaskConfig>, tests: &TestsConfig) -> Self {
        let task = task.cloned().unwrap_or_default();
        Self {
            time_limit: task.time_limit.unwrap_or(tests.default_time_limit),
            resource_limit: task.resource_limit.unwrap_or(tests.default_resource_limit),
            test_size: task.test_size.unwrap_or(tests.max_size),
            address_space_limit: task.address_space_limit,
            file_size_limit: task.file_size_limit,
            comparison: task.comparison,
            float_tolerance: task.float_tolerance.unwrap_or(DEFAULT_FLOAT_TOLERANCE),
        }
    }
}

impl Default for TaskLimits {
    fn default() -> Self {
        Self::resolve(None, &TestsConfig::default())
    }
}
