use std::io;
use std::path::PathBuf;

use common::{Category, Check, CheckArgs, CheckResult, Solution, Verdict};
use depot::{Depot, Operator};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::{Checker, fail};
use crate::error::CheckError;
use crate::sandbox::Sandbox;
use crate::scratch::{ScratchFiles, scratch_key};

/// Python driver run by the validator interpreter.
///
/// `driver.py MODULE RESULT` reads the payload from stdin and writes the
/// rating, or `missing` when the module has no entrypoint, to `RESULT`.
/// Exceptions propagate as a non-zero exit with a traceback on stderr.
pub const DRIVER: &str = include_str!("driver.py");

/// Marker written by the driver when the module has no entrypoint.
pub const MISSING_MARKER: &str = "missing";

#[derive(Serialize)]
struct Payload<'a> {
    solution: &'a Solution,
    /// Every stored version, newest first.
    history: &'a [Solution],
    args: &'a [Value],
    kwargs: &'a Map<String, Value>,
}

struct Prepared {
    scratch: ScratchFiles,
    driver: PathBuf,
    module: PathBuf,
    payload: PathBuf,
    result: PathBuf,
}

impl<S: Sandbox> Checker<S> {
    /// Run the check's validator module against `solution` in a subprocess.
    ///
    /// `validator(solution, *args, **kwargs)` is preferred; otherwise
    /// `history_validator(solutions, *args, **kwargs)` receives every stored
    /// version, newest first. A check without exactly one module yields no
    /// result.
    #[instrument(skip_all, fields(check = %check.header.id, solution = %solution.header.id))]
    pub async fn validate(
        &self,
        depot: &Depot,
        check: &Check,
        solution: &Solution,
        args: &CheckArgs,
    ) -> Result<Option<CheckResult>, CheckError> {
        if check.category != Category::Validate {
            warn!(category = %check.category, "Not a validate check");
            return Ok(None);
        }
        let mut modules = check.content.values();
        let module = match (modules.next(), modules.next()) {
            (Some(module), None) => module.as_slice(),
            _ => {
                warn!(files = check.content.len(), "Validator check must hold exactly one module");
                return Ok(None);
            }
        };

        let limits = self.limits(&solution.header.task_id);
        let mut result = CheckResult::for_pair(check, solution);

        let history = match depot
            .search::<Solution>()
            .filter("id", Operator::Eq, solution.header.id.as_str())
            .all()
            .await
        {
            Ok(history) if !history.is_empty() => history,
            Ok(_) => vec![solution.clone()],
            Err(e) => {
                fail(&mut result, format!("Failed to load solution history: {e}"));
                return Ok(Some(result));
            }
        };
        let payload = Payload {
            solution,
            history: &history,
            args: &args.args,
            kwargs: &args.kwargs,
        };

        let stem = format!(
            "{}_{}",
            scratch_key(&solution.header.user_id, &solution.header.task_id),
            Uuid::new_v4().simple()
        );
        let mut prepared = match self.prepare_validator(&stem, module, &payload).await {
            Ok(prepared) => prepared,
            Err(e) => {
                fail(&mut result, format!("Failed to prepare validator: {e}"));
                return Ok(Some(result));
            }
        };

        let mut options = self.run_options(&limits);
        options.stdin = Some(prepared.payload.clone());
        options.stdout = Some(prepared.scratch.path(".out"));
        options.stderr = Some(prepared.scratch.path(".err"));
        let argv = vec![
            self.settings.validator_interpreter.clone(),
            prepared.driver.to_string_lossy().into_owned(),
            prepared.module.to_string_lossy().into_owned(),
            prepared.result.to_string_lossy().into_owned(),
        ];

        let execution = match self.execute(&argv, &options).await? {
            Ok(execution) => execution,
            Err(e) => {
                fail(&mut result, e.to_string());
                return Ok(Some(result));
            }
        };

        result.stdout = prepared.scratch.read(".out").await;
        if !execution.message.is_empty() {
            result.append_stderr(execution.message.as_bytes());
        }
        let stderr = prepared.scratch.read(".err").await;
        result.append_stderr(&stderr);

        if execution.success() {
            let output = tokio::fs::read_to_string(&prepared.result).await.unwrap_or_default();
            match output.trim() {
                MISSING_MARKER => result.verdict = Verdict::Missing,
                text => match text.parse::<f64>() {
                    Ok(rating) => {
                        result.rating = rating;
                        result.verdict = Verdict::Passed;
                    }
                    Err(_) => fail(&mut result, format!("Unreadable validator rating: {text:?}")),
                },
            }
        } else {
            result.verdict = Verdict::Failed;
        }

        info!(verdict = %result.verdict, rating = result.rating, "Validator finished");
        Ok(Some(result))
    }

    async fn prepare_validator(
        &self,
        stem: &str,
        module: &[u8],
        payload: &Payload<'_>,
    ) -> io::Result<Prepared> {
        let payload = serde_json::to_vec(payload)?;

        let mut scratch = ScratchFiles::create(&self.settings.directory, stem).await?;
        let driver = scratch.write("_driver.py", DRIVER.as_bytes()).await?;
        let module = scratch.write(".py", module).await?;
        let payload = scratch.write(".json", &payload).await?;
        let result = scratch.path(".result");
        Ok(Prepared {
            scratch,
            driver,
            module,
            payload,
            result,
        })
    }
}
