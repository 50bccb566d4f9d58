use serde::Serialize;
use tidemark_common::{Error, Result};
use tracing::{error, info, warn};

use crate::context::Context;
use crate::driver::Driver;
use crate::migration::Migration;
use crate::planner::Plan;
use crate::repository::MigrationFile;

/// Progress of one [`Executor::run`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutorState {
    Idle,
    /// Working on the step at this plan index.
    Running(usize),
    Done,
    /// `step` failed after `step` earlier steps were applied.
    Failed { step: usize },
    /// Stopped before `completed` started.
    Cancelled { completed: usize },
}

/// Migrations applied by a run, in the order they ran.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub applied: Vec<Migration>,
}

impl RunReport {
    pub fn is_empty(&self) -> bool {
        self.applied.is_empty()
    }

    pub fn extend(&mut self, other: RunReport) {
        self.applied.extend(other.applied);
    }
}

/// Applies a plan one step at a time: read the script, execute it, then
/// record or remove the bookkeeping row. The first failure stops the run and
/// steps already applied stay applied.
pub struct Executor<'a> {
    driver: &'a dyn Driver,
    table: &'a str,
    state: ExecutorState,
}

impl<'a> Executor<'a> {
    pub fn new(driver: &'a dyn Driver, table: &'a str) -> Self {
        Self {
            driver,
            table,
            state: ExecutorState::Idle,
        }
    }

    pub fn state(&self) -> &ExecutorState {
        &self.state
    }

    pub async fn run(&mut self, ctx: &Context, plan: &Plan) -> Result<RunReport> {
        ctx.instrument(self.run_steps(ctx, plan)).await
    }

    async fn run_steps(&mut self, ctx: &Context, plan: &Plan) -> Result<RunReport> {
        let mut report = RunReport::default();
        if plan.is_empty() {
            info!("nothing pending");
            self.state = ExecutorState::Done;
            return Ok(report);
        }

        for (i, step) in plan.iter().enumerate() {
            // A statement already submitted is not interrupted; cancellation
            // only takes effect between steps.
            if ctx.is_cancelled() {
                warn!("cancelled before step {i} ({})", step.file_name());
                self.state = ExecutorState::Cancelled { completed: i };
                return Err(Error::Cancelled { completed: i });
            }

            self.state = ExecutorState::Running(i);
            info!(
                "[{}/{}] {} {}",
                i + 1,
                plan.len(),
                step.direction(),
                step.file_name()
            );

            if let Err(e) = self.apply(ctx, step).await {
                error!("{} failed: {e}", step.file_name());
                self.state = ExecutorState::Failed { step: i };
                return Err(Error::ExecutionFailed {
                    step: i,
                    migration: step.file_name(),
                    source: Box::new(e),
                });
            }
            report.applied.push(step.migration.clone());
        }

        self.state = ExecutorState::Done;
        info!("applied {} migration(s)", report.applied.len());
        Ok(report)
    }

    async fn apply(&self, ctx: &Context, step: &MigrationFile) -> Result<()> {
        let script = tokio::fs::read_to_string(&step.path).await?;
        self.driver.execute(ctx, &script, &[]).await?;

        let migration = &step.migration;
        self.driver
            .update_schema_migrations(
                ctx,
                self.table,
                migration.direction(),
                migration.version(),
                migration.label(),
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::filename::decode;
    use crate::migration::Direction;
    use crate::testing::MemoryDriver;

    const TABLE: &str = "schema_migrations";

    fn write_plan(dir: &Path, files: &[(&str, &str)]) -> Plan {
        let steps = files
            .iter()
            .map(|(name, sql)| {
                let path = dir.join(name);
                std::fs::write(&path, sql).unwrap();
                MigrationFile::new(decode(name).unwrap(), path)
            })
            .collect();
        Plan::new(steps)
    }

    #[tokio::test]
    async fn applies_steps_in_order_and_records_them() {
        let dir = tempfile::tempdir().unwrap();
        let plan = write_plan(
            dir.path(),
            &[
                ("forward-100-a.sql", "CREATE TABLE a;"),
                ("forward-200-b.sql", "CREATE TABLE b;"),
            ],
        );
        let driver = MemoryDriver::new().with_table();
        let mut executor = Executor::new(&driver, TABLE);
        assert_eq!(executor.state(), &ExecutorState::Idle);

        let report = executor.run(&Context::default(), &plan).await.unwrap();
        assert_eq!(report.applied.len(), 2);
        assert_eq!(executor.state(), &ExecutorState::Done);
        assert_eq!(driver.executed(), ["CREATE TABLE a;", "CREATE TABLE b;"]);
        assert_eq!(driver.applied_tokens(), ["19700101000140", "19700101000320"]);
    }

    #[tokio::test]
    async fn reverse_steps_remove_rows() {
        let dir = tempfile::tempdir().unwrap();
        let plan = write_plan(dir.path(), &[("reverse-200-b.sql", "DROP TABLE b;")]);
        let driver = MemoryDriver::new().with_applied(["100", "200"]);

        let report = Executor::new(&driver, TABLE)
            .run(&Context::default(), &plan)
            .await
            .unwrap();
        assert_eq!(report.applied[0].direction(), Direction::Reverse);
        assert_eq!(driver.applied_tokens(), ["19700101000140"]);
    }

    #[tokio::test]
    async fn failure_stops_the_run_and_keeps_earlier_steps() {
        let dir = tempfile::tempdir().unwrap();
        let plan = write_plan(
            dir.path(),
            &[
                ("forward-100-a.sql", "CREATE TABLE a;"),
                ("forward-200-b.sql", "FAIL;"),
                ("forward-300-c.sql", "CREATE TABLE c;"),
            ],
        );
        let driver = MemoryDriver::new().with_table();
        let mut executor = Executor::new(&driver, TABLE);

        let err = executor.run(&Context::default(), &plan).await.unwrap_err();
        match &err {
            Error::ExecutionFailed {
                step, migration, ..
            } => {
                assert_eq!(*step, 1);
                assert_eq!(migration, "forward-200-b.sql");
            }
            other => panic!("expected ExecutionFailed, got {other:?}"),
        }
        assert_eq!(err.completed_steps(), Some(1));
        assert_eq!(executor.state(), &ExecutorState::Failed { step: 1 });
        assert_eq!(driver.executed(), ["CREATE TABLE a;"]);
        assert_eq!(driver.applied_tokens(), ["19700101000140"]);
    }

    #[tokio::test]
    async fn missing_script_file_fails_the_step() {
        let driver = MemoryDriver::new().with_table();
        let plan = Plan::new(vec![MigrationFile::new(
            decode("forward-100-a.sql").unwrap(),
            "/nonexistent/forward-100-a.sql",
        )]);

        let err = Executor::new(&driver, TABLE)
            .run(&Context::default(), &plan)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ExecutionFailed { step: 0, .. }));
        assert!(driver.applied_tokens().is_empty());
    }

    #[tokio::test]
    async fn cancellation_stops_before_next_step() {
        let dir = tempfile::tempdir().unwrap();
        let plan = write_plan(dir.path(), &[("forward-100-a.sql", "CREATE TABLE a;")]);
        let driver = MemoryDriver::new().with_table();
        let ctx = Context::default();
        ctx.cancel();

        let mut executor = Executor::new(&driver, TABLE);
        let err = executor.run(&ctx, &plan).await.unwrap_err();
        assert!(matches!(err, Error::Cancelled { completed: 0 }));
        assert_eq!(executor.state(), &ExecutorState::Cancelled { completed: 0 });
        assert!(driver.executed().is_empty());
    }

    #[tokio::test]
    async fn cancellation_mid_run_keeps_completed_steps() {
        let dir = tempfile::tempdir().unwrap();
        let plan = write_plan(
            dir.path(),
            &[
                ("forward-100-a.sql", "CREATE TABLE a; -- CANCEL"),
                ("forward-200-b.sql", "CREATE TABLE b;"),
            ],
        );
        let driver = MemoryDriver::new().with_table();
        let ctx = Context::default();

        let mut executor = Executor::new(&driver, TABLE);
        let err = executor.run(&ctx, &plan).await.unwrap_err();
        assert!(matches!(err, Error::Cancelled { completed: 1 }));
        assert_eq!(err.completed_steps(), Some(1));
        assert_eq!(executor.state(), &ExecutorState::Cancelled { completed: 1 });
        assert_eq!(driver.executed(), ["CREATE TABLE a; -- CANCEL"]);
        assert_eq!(driver.applied_tokens(), ["19700101000140"]);
    }

    #[tokio::test]
    async fn reversing_an_unrecorded_version_fails() {
        let dir = tempfile::tempdir().unwrap();
        let plan = write_plan(dir.path(), &[("reverse-300-c.sql", "DROP TABLE c;")]);
        let driver = MemoryDriver::new().with_applied(["100"]);

        let err = Executor::new(&driver, TABLE)
            .run(&Context::default(), &plan)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ExecutionFailed { step: 0, .. }));
        assert_eq!(driver.applied_tokens(), ["19700101000140"]);
    }

    #[tokio::test]
    async fn empty_plan_is_a_successful_noop() {
        let driver = MemoryDriver::new().with_table();
        let mut executor = Executor::new(&driver, TABLE);
        let report = executor
            .run(&Context::default(), &Plan::default())
            .await
            .unwrap();
        assert!(report.is_empty());
        assert_eq!(executor.state(), &ExecutorState::Done);
    }
}
