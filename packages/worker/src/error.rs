use std::time::Duration;

use depot::DepotError;
use thiserror::Error;

/// Failures that stop a grading sweep.
///
/// Ordinary check failures never surface here; they become a failed
/// [`common::CheckResult`] instead.
#[derive(Debug, Error)]
pub enum CheckError {
    #[error("Process {pid} survived termination for {waited:?}")]
    Undead { pid: u32, waited: Duration },

    #[error("Depot error: {0}")]
    Depot(#[from] DepotError),
}
