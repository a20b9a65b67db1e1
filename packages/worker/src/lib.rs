pub mod checker;
pub mod compare;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod sandbox;
pub mod scratch;

pub use checker::Checker;
pub use config::{CheckSettings, GraderAppConfig, LoggingConfig, WorkerSettings};
pub use error::CheckError;
pub use orchestrator::{Orchestrator, RecheckMode, SweepReport, is_stale};
pub use sandbox::{
    Escalation, ExecutionResult, ResourceLimits, RlimitSandbox, RunOptions, Sandbox, SandboxError,
};
