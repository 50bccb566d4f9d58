use serde::Serialize;
use tidemark_common::{Error, Result};
use tracing::info;

use crate::context::Context;
use crate::driver::Driver;
use crate::executor::{Executor, RunReport};
use crate::migration::{Direction, Migration, Version};
use crate::planner::{Plan, Planner};
use crate::repository::{Catalog, Repository};
use crate::tracker::{AppliedSet, StateTracker};

pub const DEFAULT_TABLE: &str = "schema_migrations";

/// Whether a catalog entry's version is recorded as applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum MigrationState {
    Applied { executed_at: i64 },
    Pending,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationStatus {
    pub migration: Migration,
    #[serde(flatten)]
    pub state: MigrationState,
}

/// Runs the engine's commands against one connected driver and one
/// migrations directory.
///
/// Every command scans the directory before touching the database, so a
/// broken catalog never causes side effects.
pub struct Migrator<'d> {
    driver: &'d dyn Driver,
    repository: Repository,
    table: String,
}

impl<'d> Migrator<'d> {
    pub fn new(driver: &'d dyn Driver, repository: Repository) -> Self {
        Self {
            driver,
            repository,
            table: DEFAULT_TABLE.to_string(),
        }
    }

    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn repository(&self) -> &Repository {
        &self.repository
    }

    /// Create the bookkeeping table if it is missing.
    pub async fn init(&self, ctx: &Context) -> Result<()> {
        self.driver
            .create_schema_migrations_table(ctx, &self.table)
            .await
    }

    /// Bring a legacy bookkeeping table up to the current shape.
    pub async fn upgrade(&self, ctx: &Context) -> Result<()> {
        self.driver.upgrade_schema_migrations(ctx, &self.table).await?;
        ctx.in_scope(|| info!("upgraded {}", self.table));
        Ok(())
    }

    /// Apply pending forward migrations, up to `target` when given.
    pub async fn migrate(&self, ctx: &Context, target: Option<&Version>) -> Result<RunReport> {
        let catalog = self.repository.scan(ctx)?;
        self.init(ctx).await?;
        let applied = self.tracker().applied(ctx).await?;
        let plan = Planner::new(&catalog, &applied).forward(target)?;
        self.execute(ctx, &plan).await
    }

    /// Roll back the latest applied migration, or every applied migration
    /// down to and including `target`.
    pub async fn rollback(&self, ctx: &Context, target: Option<&Version>) -> Result<RunReport> {
        let (catalog, applied) = self.load(ctx).await?;
        let plan = Planner::new(&catalog, &applied).reverse(target)?;
        self.execute(ctx, &plan).await
    }

    /// Roll back the latest applied migration and apply it again. The
    /// forward half does not run if the rollback fails.
    pub async fn remigrate(&self, ctx: &Context) -> Result<RunReport> {
        let (catalog, applied) = self.load(ctx).await?;
        let (reverse, forward) = Planner::new(&catalog, &applied).remigrate()?;

        let mut report = self.execute(ctx, &reverse).await?;
        if !reverse.is_empty() {
            report.extend(self.execute(ctx, &forward).await?);
        }
        Ok(report)
    }

    /// Run exactly one migration selected by version prefix.
    pub async fn run_single(
        &self,
        ctx: &Context,
        direction: Direction,
        query: &str,
    ) -> Result<RunReport> {
        let (catalog, applied) = self.load(ctx).await?;
        let plan = Planner::new(&catalog, &applied).single(direction, query)?;
        self.execute(ctx, &plan).await
    }

    /// Catalog entries of `direction` with their applied state. `target`
    /// keeps versions <= target for forward and >= target for reverse.
    ///
    /// A missing bookkeeping table reads as nothing applied; a legacy table
    /// is reported as `SchemaMigrationsMissingColumns`.
    pub async fn info(
        &self,
        ctx: &Context,
        direction: Direction,
        target: Option<&Version>,
    ) -> Result<Vec<MigrationStatus>> {
        let catalog = self.repository.scan(ctx)?;
        let applied = match self.tracker().applied(ctx).await {
            Ok(applied) => applied,
            Err(Error::SchemaMigrationsDoesNotExist(_)) => AppliedSet::default(),
            Err(e) => return Err(e),
        };

        let statuses = catalog
            .entries(direction)
            .iter()
            .filter(|f| match (direction, target) {
                (_, None) => true,
                (Direction::Forward, Some(t)) => f.version() <= t,
                (Direction::Reverse, Some(t)) => f.version() >= t,
            })
            .map(|f| MigrationStatus {
                migration: f.migration.clone(),
                state: match applied.get(f.version()) {
                    Some(row) => MigrationState::Applied {
                        executed_at: row.executed_at,
                    },
                    None => MigrationState::Pending,
                },
            })
            .collect();
        Ok(statuses)
    }

    pub async fn dump_schema(&self, ctx: &Context) -> Result<String> {
        self.driver.dump_schema(ctx).await
    }

    async fn load(&self, ctx: &Context) -> Result<(Catalog, AppliedSet)> {
        let catalog = self.repository.scan(ctx)?;
        let applied = self.tracker().applied(ctx).await?;
        Ok((catalog, applied))
    }

    async fn execute(&self, ctx: &Context, plan: &Plan) -> Result<RunReport> {
        Executor::new(self.driver, &self.table).run(ctx, plan).await
    }

    fn tracker(&self) -> StateTracker<'_> {
        StateTracker::new(self.driver, &self.table)
    }
}
