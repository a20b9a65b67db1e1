pub mod runtime;
pub mod validator;

use std::collections::HashMap;

use common::{Category, Check, CheckArgs, CheckResult, Solution, TaskConfig, TaskLimits, TestsConfig};
use depot::Depot;
use tracing::debug;

use crate::config::{CheckSettings, GraderAppConfig};
use crate::error::CheckError;
use crate::sandbox::error::SandboxError;
use crate::sandbox::{Escalation, ExecutionResult, ResourceLimits, RunOptions, Sandbox};

/// Runs checks against solutions inside a [`Sandbox`].
pub struct Checker<S: Sandbox> {
    sandbox: S,
    settings: CheckSettings,
    tests: TestsConfig,
    tasks: HashMap<String, TaskConfig>,
    escalation: Escalation,
}

impl<S: Sandbox> Checker<S> {
    pub fn new(sandbox: S, config: &GraderAppConfig) -> Self {
        Self {
            sandbox,
            settings: config.check.clone(),
            tests: config.tests.clone(),
            tasks: config.tasks.clone(),
            escalation: Escalation::default(),
        }
    }

    pub fn with_escalation(mut self, escalation: Escalation) -> Self {
        self.escalation = escalation;
        self
    }

    pub fn task(&self, task_id: &str) -> Option<&TaskConfig> {
        self.tasks.get(task_id)
    }

    pub fn limits(&self, task_id: &str) -> TaskLimits {
        TaskLimits::resolve(self.task(task_id), &self.tests)
    }

    /// Evaluate `check` against `solution`, dispatching on the check category.
    ///
    /// `Ok(None)` means the check produced no result and nothing should be
    /// stored. Only an undead process is an error.
    pub async fn check(
        &self,
        depot: &Depot,
        check: &Check,
        solution: &Solution,
        args: &CheckArgs,
    ) -> Result<Option<CheckResult>, CheckError> {
        match check.category {
            Category::Runtime => self.runtime(check, solution).await,
            Category::Validate => self.validate(depot, check, solution, args).await,
            Category::Plagiary => {
                debug!(check = %check.header.id, "Plagiary checks are evaluated elsewhere");
                Ok(None)
            }
        }
    }

    fn run_options(&self, limits: &TaskLimits) -> RunOptions {
        RunOptions::new(ResourceLimits::for_task(limits), self.escalation)
    }

    /// Run `argv`. Sandbox failures other than an undead process come back
    /// as the inner error so the caller can record them.
    async fn execute(
        &self,
        argv: &[String],
        options: &RunOptions,
    ) -> Result<Result<ExecutionResult, SandboxError>, CheckError> {
        match self.sandbox.execute(argv, options).await {
            Err(SandboxError::Undead { pid, waited }) => Err(CheckError::Undead { pid, waited }),
            other => Ok(other),
        }
    }
}

/// Mark `result` failed with an explanation.
fn fail(result: &mut CheckResult, message: impl AsRef<str>) {
    result.verdict = common::Verdict::Failed;
    result.rating = 0.0;
    result.append_stderr(message.as_ref().as_bytes());
}
