use async_trait::async_trait;
use serde::Serialize;
use tidemark_common::Result;

use crate::context::Context;
use crate::migration::{Direction, Version};

/// One row of the bookkeeping table. Presence means the forward migration
/// was applied and not yet reversed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppliedVersion {
    pub version: Version,
    /// Empty for rows written before the table was upgraded.
    pub label: String,
    /// Unix seconds; zero for rows written before the table was upgraded.
    pub executed_at: i64,
}

/// Capability set every database backend provides to the engine.
///
/// Backends are separate types chosen at build time (see the `tidemark-db`
/// crate features); the engine only ever sees `&dyn Driver`.
#[async_trait]
pub trait Driver: Send + Sync {
    /// Short backend name, e.g. `sqlite`.
    fn name(&self) -> &'static str;

    /// Open the connection. Calling it again while connected is a no-op.
    async fn connect(&mut self, dsn: &str) -> Result<()>;

    /// Release the connection. Calling it while disconnected is a no-op.
    async fn close(&mut self) -> Result<()>;

    /// Run a script. With no `params` the script may contain several
    /// statements; the backend decides where they split and either applies
    /// them atomically or, lacking transactional DDL, stops at the first
    /// failure with earlier statements left applied. With `params` the script
    /// is a single statement and the values are bound in order.
    async fn execute(&self, ctx: &Context, script: &str, params: &[&str]) -> Result<()>;

    /// Create the bookkeeping table with `migration_id`, `label` and
    /// `executed_at` if it does not exist.
    async fn create_schema_migrations_table(&self, ctx: &Context, table: &str) -> Result<()>;

    /// Rows of the bookkeeping table in ascending version order.
    ///
    /// Fails with `SchemaMigrationsDoesNotExist` when the table is absent and
    /// `SchemaMigrationsMissingColumns` when it still has the legacy shape.
    async fn applied_versions(&self, ctx: &Context, table: &str) -> Result<Vec<AppliedVersion>>;

    /// Insert (forward) or delete (reverse) the row for `version` as one
    /// atomic change. Inserted rows are stamped with the current time.
    ///
    /// A row stored under the version's unix-epoch spelling counts as the
    /// same version. Inserting an already recorded version, or deleting one
    /// that is not recorded, fails with `Database`.
    async fn update_schema_migrations(
        &self,
        ctx: &Context,
        table: &str,
        direction: Direction,
        version: &Version,
        label: &str,
    ) -> Result<()>;

    /// Add the `label` and `executed_at` columns to a legacy table, skipping
    /// any already present.
    async fn upgrade_schema_migrations(&self, ctx: &Context, table: &str) -> Result<()>;

    /// Textual dump of the current schema.
    async fn dump_schema(&self, ctx: &Context) -> Result<String>;
}
