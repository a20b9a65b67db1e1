use std::io;
use std::path::{Path, PathBuf};

use common::{Category, Check, CheckResult, Solution, Verdict};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::{Checker, fail};
use crate::compare;
use crate::error::CheckError;
use crate::sandbox::Sandbox;
use crate::scratch::{ScratchFiles, scratch_key};

impl<S: Sandbox> Checker<S> {
    /// Run the solution's program on the check's `.in` file and score its
    /// output against the `.out` file.
    ///
    /// A missing program or missing test file is not an error: the run
    /// proceeds with empty content.
    #[instrument(skip_all, fields(check = %check.header.id, solution = %solution.header.id))]
    pub async fn runtime(
        &self,
        check: &Check,
        solution: &Solution,
    ) -> Result<Option<CheckResult>, CheckError> {
        if check.category != Category::Runtime {
            warn!(category = %check.category, "Not a runtime check");
            return Ok(None);
        }

        let limits = self.limits(&solution.header.task_id);
        let mut result = CheckResult::for_pair(check, solution);

        let program = solution
            .content
            .get(&self.settings.program)
            .map(Vec::as_slice)
            .unwrap_or_default();
        if program.is_empty() {
            debug!(program = %self.settings.program, "Solution has no program");
        }
        let input = check.file_with_suffix(".in").map(|(_, b)| b).unwrap_or_default();
        let expected = check.file_with_suffix(".out").map(|(_, b)| b).unwrap_or_default();

        let key = format!(
            "{}_{}",
            scratch_key(&solution.header.user_id, &solution.header.task_id),
            Uuid::new_v4().simple()
        );
        let (mut scratch, program_path, input_path) =
            match self.prepare(&key, program, input).await {
                Ok(prepared) => prepared,
                Err(e) => {
                    fail(&mut result, format!("Failed to prepare scratch files: {e}"));
                    return Ok(Some(result));
                }
            };

        let mut options = self.run_options(&limits);
        options.stdin = Some(input_path);
        options.stdout = Some(scratch.path(".out"));
        options.stderr = Some(scratch.path(".err"));
        let argv = vec![
            self.settings.interpreter.clone(),
            program_path.to_string_lossy().into_owned(),
        ];

        let execution = match self.execute(&argv, &options).await? {
            Ok(execution) => execution,
            Err(e) => {
                fail(&mut result, e.to_string());
                return Ok(Some(result));
            }
        };

        result.stdout = scratch.read(".out").await;
        if !execution.message.is_empty() {
            result.append_stderr(execution.message.as_bytes());
        }
        let stderr = scratch.read(".err").await;
        result.append_stderr(&stderr);
        result.verdict = Verdict::from_exit_code(execution.exit_code);

        let diff = compare::diff(&result.stdout, expected, limits.test_size);
        result.rating = compare::score(
            limits.comparison,
            &result.stdout,
            expected,
            &diff,
            limits.float_tolerance,
        );
        if result.rating < 1.0 && !diff.is_empty() {
            result.append_stderr(&diff);
        }

        info!(verdict = %result.verdict, rating = result.rating, "Runtime check finished");
        Ok(Some(result))
    }

    async fn prepare(
        &self,
        key: &str,
        program: &[u8],
        input: &[u8],
    ) -> io::Result<(ScratchFiles, PathBuf, PathBuf)> {
        let suffix = Path::new(&self.settings.program)
            .extension()
            .map(|ext| format!(".{}", ext.to_string_lossy()))
            .unwrap_or_default();

        let mut scratch = ScratchFiles::create(&self.settings.directory, key).await?;
        let program_path = scratch.write(&suffix, program).await?;
        let input_path = scratch.write(".in", input).await?;
        Ok((scratch, program_path, input_path))
    }
}
