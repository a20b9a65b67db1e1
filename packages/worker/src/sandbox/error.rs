use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SandboxError {
    #[error("Environment initialization failed: {0}")]
    Initialization(String),

    #[error("execution error: {0}")]
    Execution(String),

    /// The process outlived the termination ceiling. Fatal.
    #[error("process {pid} did not exit {waited:?} after termination")]
    Undead { pid: u32, waited: Duration },
}
