pub mod category;
pub mod check;
pub mod check_result;
pub mod config;
pub mod record;
pub mod solution;

pub use category::{Category, Verdict};
pub use check::{Check, CheckArgs};
pub use check_result::{CheckResult, result_id};
pub use config::{Comparison, TaskConfig, TaskLimits, TestsConfig};
pub use record::{Content, Header, InvalidRecord, Record, now_timestamp};
pub use solution::{Homework, Solution};
