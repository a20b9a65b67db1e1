pub mod error;
pub mod process;

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use common::TaskLimits;
pub use error::SandboxError;
pub use process::RlimitSandbox;

/// Open file descriptors allowed to a checked program.
pub const OPEN_FILES_LIMIT: u64 = 30;

/// Limits applied to the child before it runs user code.
/// Sizes are in bytes, times in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceLimits {
    pub cpu_time: u64,
    pub stack: u64,
    pub open_files: u64,
    /// Linux only.
    pub address_space: Option<u64>,
    /// Linux only.
    pub file_size: Option<u64>,
}

impl ResourceLimits {
    pub fn for_task(limits: &TaskLimits) -> Self {
        Self {
            cpu_time: limits.time_limit.max(1),
            stack: limits.resource_limit,
            open_files: OPEN_FILES_LIMIT,
            address_space: limits.address_space_limit,
            file_size: limits.file_size_limit,
        }
    }
}

/// Timeout escalation policy.
///
/// The child gets `wall_factor × cpu_time` of wall clock. Then it is sent
/// SIGTERM and polled with a backoff doubling from `initial_backoff`; once the
/// backoff exceeds `ceiling_factor × cpu_time` the process is undead.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Escalation {
    pub wall_factor: u32,
    pub ceiling_factor: u32,
    pub initial_backoff: Duration,
}

impl Default for Escalation {
    fn default() -> Self {
        Self {
            wall_factor: 2,
            ceiling_factor: 32,
            initial_backoff: Duration::from_secs(1),
        }
    }
}

impl Escalation {
    pub fn wall_timeout(&self, limits: &ResourceLimits) -> Duration {
        Duration::from_secs(limits.cpu_time) * self.wall_factor
    }

    pub fn ceiling(&self, limits: &ResourceLimits) -> Duration {
        Duration::from_secs(limits.cpu_time) * self.ceiling_factor
    }
}

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub resource_limits: ResourceLimits,
    pub escalation: Escalation,
    /// File bound to stdin; `/dev/null` when unset.
    pub stdin: Option<PathBuf>,
    /// Files receiving stdout/stderr; discarded when unset.
    pub stdout: Option<PathBuf>,
    pub stderr: Option<PathBuf>,
    pub current_dir: Option<PathBuf>,
}

impl RunOptions {
    pub fn new(resource_limits: ResourceLimits, escalation: Escalation) -> Self {
        Self {
            resource_limits,
            escalation,
            stdin: None,
            stdout: None,
            stderr: None,
            current_dir: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecutionResult {
    pub exit_code: Option<i32>,
    pub signal: Option<i32>,
    /// The wall timeout fired and the process was terminated.
    pub timed_out: bool,
    pub wall_time: Duration,
    /// Human-readable note about how the process ended, if abnormal.
    pub message: String,
}

impl ExecutionResult {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

#[async_trait]
pub trait Sandbox: Send + Sync {
    async fn execute(
        &self,
        argv: &[String],
        run_options: &RunOptions,
    ) -> Result<ExecutionResult, SandboxError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limits_for_task() {
        let limits = ResourceLimits::for_task(&TaskLimits::default());
        assert_eq!(limits.cpu_time, 2);
        assert_eq!(limits.stack, 3 * 1024 * 1024);
        assert_eq!(limits.open_files, 30);
        assert_eq!(limits.address_space, None);
    }

    #[test]
    fn test_escalation_bounds() {
        let limits = ResourceLimits::for_task(&TaskLimits::default());
        let policy = Escalation::default();
        assert_eq!(policy.wall_timeout(&limits), Duration::from_secs(4));
        assert_eq!(policy.ceiling(&limits), Duration::from_secs(64));
    }
}
