//! Staleness-driven incremental re-checking.

use std::collections::BTreeMap;
use std::ops::AddAssign;

use common::{Check, CheckArgs, CheckResult, Solution, result_id};
use depot::{Depot, Operator};
use futures::{StreamExt, stream};
use tracing::{debug, error, info, instrument, warn};

use crate::checker::Checker;
use crate::error::CheckError;
use crate::sandbox::Sandbox;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RecheckMode {
    /// Re-run only pairs whose inputs changed since the stored result.
    #[default]
    Incremental,
    /// Re-run every pair.
    Full,
}

/// Whether a stored result must be recomputed for these inputs.
///
/// Stale when no result exists, or when the newer input is newer than the
/// older of the two versions the result was computed from.
pub fn is_stale(stored: Option<&CheckResult>, check: &Check, solution: &Solution) -> bool {
    let Some(stored) = stored else {
        return true;
    };
    let newest_input = check.header.timestamp.max(solution.header.timestamp);
    let oldest_seen = stored.solution_timestamp.min(stored.check_timestamp);
    newest_input > oldest_seen
}

/// Group solutions by `(user_id, task_id)`, keeping search order within a group.
fn by_student_task(solutions: &[Solution]) -> BTreeMap<(&str, &str), Vec<&Solution>> {
    let mut groups: BTreeMap<(&str, &str), Vec<&Solution>> = BTreeMap::new();
    for solution in solutions {
        let key = (solution.header.user_id.as_str(), solution.header.task_id.as_str());
        groups.entry(key).or_default().push(solution);
    }
    groups
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub solutions: usize,
    /// Pairs that were run and written to the depot.
    pub checked: usize,
    /// Pairs skipped because the stored result is current.
    pub fresh: usize,
    /// Referenced check IDs with no stored check.
    pub missing_checks: usize,
    /// Pairs whose checker produced nothing, or whose result was not written.
    pub no_result: usize,
}

impl AddAssign for SweepReport {
    fn add_assign(&mut self, other: Self) {
        self.solutions += other.solutions;
        self.checked += other.checked;
        self.fresh += other.fresh;
        self.missing_checks += other.missing_checks;
        self.no_result += other.no_result;
    }
}

pub struct Orchestrator<S: Sandbox> {
    depot: Depot,
    checker: Checker<S>,
    concurrency: usize,
}

impl<S: Sandbox> Orchestrator<S> {
    pub fn new(depot: Depot, checker: Checker<S>, concurrency: usize) -> Self {
        Self {
            depot,
            checker,
            concurrency: concurrency.max(1),
        }
    }

    pub fn depot(&self) -> &Depot {
        &self.depot
    }

    /// Check every actual solution. Stops early only on an undead process.
    #[instrument(skip(self))]
    pub async fn sweep(&self, mode: RecheckMode) -> Result<SweepReport, CheckError> {
        let solutions = self.depot.search::<Solution>().actual().all().await?;
        let groups = by_student_task(&solutions);
        info!(
            solutions = solutions.len(),
            groups = groups.len(),
            concurrency = self.concurrency,
            "Sweep started"
        );

        let mut pending = stream::iter(groups.into_values().map(|group| self.check_group(group, mode)))
            .buffer_unordered(self.concurrency);

        let mut report = SweepReport::default();
        while let Some(outcome) = pending.next().await {
            report += outcome?;
        }

        info!(?report, "Sweep finished");
        Ok(report)
    }

    /// Solutions of one student and task share a scratch area, so they run
    /// one after another.
    async fn check_group(
        &self,
        group: Vec<&Solution>,
        mode: RecheckMode,
    ) -> Result<SweepReport, CheckError> {
        let mut report = SweepReport::default();
        for solution in group {
            report += self.check_solution(solution, mode).await?;
        }
        Ok(report)
    }

    /// Checks referenced by `solution`, with task configuration merged in.
    /// Configured arguments win over the solution's own.
    pub fn checks_for(&self, solution: &Solution) -> BTreeMap<String, CheckArgs> {
        let mut checks: BTreeMap<String, CheckArgs> = solution
            .checks
            .iter()
            .map(|(id, spec)| (id.clone(), CheckArgs::from_spec(spec)))
            .collect();

        if let Some(task) = self.checker.task(&solution.header.task_id) {
            for id in &task.checks {
                checks.entry(id.clone()).or_default();
            }
            for (id, args) in checks.iter_mut() {
                if let Some(configured) = task.args_for(id) {
                    *args = configured;
                }
            }
        }
        checks
    }

    #[instrument(skip_all, fields(solution = %solution.header.id))]
    pub async fn check_solution(
        &self,
        solution: &Solution,
        mode: RecheckMode,
    ) -> Result<SweepReport, CheckError> {
        let mut report = SweepReport {
            solutions: 1,
            ..Default::default()
        };

        for (check_id, args) in self.checks_for(solution) {
            let check = match self
                .depot
                .search::<Check>()
                .filter("id", Operator::Eq, check_id.as_str())
                .first()
                .await
            {
                Ok(Some(check)) => check,
                Ok(None) => {
                    warn!(check = %check_id, "Referenced check not found, skipping");
                    report.missing_checks += 1;
                    continue;
                }
                Err(e) => {
                    error!(check = %check_id, error = %e, "Failed to load check, skipping");
                    report.no_result += 1;
                    continue;
                }
            };

            let identity = result_id(&check_id, &solution.header.id);
            let stored = self
                .depot
                .search::<CheckResult>()
                .filter("id", Operator::Eq, identity.as_str())
                .fields(&["id", "check_timestamp", "solution_timestamp"])
                .first()
                .await
                .unwrap_or_else(|e| {
                    warn!(result = %identity, error = %e, "Failed to load stored result, re-running");
                    None
                });

            if mode == RecheckMode::Incremental && !is_stale(stored.as_ref(), &check, solution) {
                debug!(check = %check_id, "Result is current");
                report.fresh += 1;
                continue;
            }

            match self.checker.check(&self.depot, &check, solution, &args).await? {
                Some(result) => match self.depot.store(&result).await {
                    Ok(true) => report.checked += 1,
                    Ok(false) => report.no_result += 1,
                    Err(e) => {
                        error!(result = %identity, error = %e, "Refusing to store invalid result");
                        report.no_result += 1;
                    }
                },
                None => {
                    warn!(check = %check_id, category = %check.category, "Check produced no result");
                    report.no_result += 1;
                }
            }
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{Category, Content, Header};

    fn check(ts: f64) -> Check {
        Check::new(Header::new("c", "", "t", ts), Category::Runtime, Content::new())
    }

    fn solution(ts: f64) -> Solution {
        Solution::new(Header::new("s", "u", "t", ts), Content::new())
    }

    fn stored(check_ts: f64, solution_ts: f64) -> CheckResult {
        CheckResult {
            check_timestamp: check_ts,
            solution_timestamp: solution_ts,
            ..Default::default()
        }
    }

    #[test]
    fn test_no_result_is_stale() {
        assert!(is_stale(None, &check(1.0), &solution(1.0)));
    }

    #[test]
    fn test_same_inputs_are_fresh() {
        let result = stored(5.0, 5.0);
        assert!(!is_stale(Some(&result), &check(5.0), &solution(5.0)));
    }

    #[test]
    fn test_bumping_either_input_is_stale() {
        let result = stored(5.0, 5.0);
        assert!(is_stale(Some(&result), &check(6.0), &solution(5.0)));
        assert!(is_stale(Some(&result), &check(5.0), &solution(6.0)));
    }

    #[test]
    fn test_predicate_compares_newest_input_with_oldest_seen() {
        // Inputs with different versions stay stale even when unchanged:
        // max(1, 2) > min(1, 2).
        let result = stored(1.0, 2.0);
        assert!(is_stale(Some(&result), &check(1.0), &solution(2.0)));
        // Older inputs than the stored ones are never stale.
        assert!(!is_stale(Some(&result), &check(0.5), &solution(1.0)));
    }

    #[test]
    fn test_solutions_grouped_by_student_and_task() {
        let solutions = vec![
            Solution::new(Header::new("a", "u1", "t", 3.0), Content::new()),
            Solution::new(Header::new("b", "u2", "t", 2.0), Content::new()),
            Solution::new(Header::new("c", "u1", "t", 1.0), Content::new()),
            Solution::new(Header::new("d", "u1", "t2", 1.0), Content::new()),
        ];
        let groups = by_student_task(&solutions);
        assert_eq!(groups.len(), 3);
        let ids: Vec<&str> = groups[&("u1", "t")].iter().map(|s| s.header.id.as_str()).collect();
        assert_eq!(ids, ["a", "c"]);
        assert_eq!(groups[&("u2", "t")].len(), 1);
    }

    #[test]
    fn test_report_accumulates() {
        let mut total = SweepReport::default();
        total += SweepReport { solutions: 1, checked: 2, ..Default::default() };
        total += SweepReport { solutions: 1, fresh: 1, missing_checks: 1, ..Default::default() };
        assert_eq!(
            total,
            SweepReport { solutions: 2, checked: 2, fresh: 1, missing_checks: 1, no_result: 0 }
        );
    }
}
