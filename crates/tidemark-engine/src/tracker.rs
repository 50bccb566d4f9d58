use std::collections::BTreeMap;

use tidemark_common::{Error, Result};
use tracing::{debug, warn};

use crate::context::Context;
use crate::driver::{AppliedVersion, Driver};
use crate::migration::Version;

/// Versions recorded in the bookkeeping table, keyed and ordered by version.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppliedSet {
    rows: BTreeMap<Version, AppliedVersion>,
}

impl AppliedSet {
    pub fn from_rows(rows: impl IntoIterator<Item = AppliedVersion>) -> Self {
        Self {
            rows: rows.into_iter().map(|r| (r.version.clone(), r)).collect(),
        }
    }

    pub fn contains(&self, version: &Version) -> bool {
        self.rows.contains_key(version)
    }

    pub fn get(&self, version: &Version) -> Option<&AppliedVersion> {
        self.rows.get(version)
    }

    /// The most recently applied version by ordering.
    pub fn latest(&self) -> Option<&AppliedVersion> {
        self.rows.values().next_back()
    }

    /// Ascending iteration.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &AppliedVersion> {
        self.rows.values()
    }

    /// Rows with version >= `from`, newest first.
    pub fn newest_down_to<'a>(
        &'a self,
        from: &'a Version,
    ) -> impl Iterator<Item = &'a AppliedVersion> + 'a {
        self.rows.range(from..).rev().map(|(_, row)| row)
    }

    pub fn insert(&mut self, row: AppliedVersion) {
        self.rows.insert(row.version.clone(), row);
    }

    pub fn remove(&mut self, version: &Version) -> Option<AppliedVersion> {
        self.rows.remove(version)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Reads applied state through a [`Driver`].
pub struct StateTracker<'a> {
    driver: &'a dyn Driver,
    table: &'a str,
}

impl<'a> StateTracker<'a> {
    pub fn new(driver: &'a dyn Driver, table: &'a str) -> Self {
        Self { driver, table }
    }

    /// Fetch the applied set. A missing table or a table still in the legacy
    /// shape surfaces as the matching engine error, whichever way the backend
    /// reported it.
    pub async fn applied(&self, ctx: &Context) -> Result<AppliedSet> {
        let rows = self
            .driver
            .applied_versions(ctx, self.table)
            .await
            .map_err(|e| self.translate(ctx, e))?;
        let set = AppliedSet::from_rows(rows);
        ctx.in_scope(|| {
            debug!(
                "{} applied version(s) in {} ({})",
                set.len(),
                self.table,
                self.driver.name()
            )
        });
        Ok(set)
    }

    fn translate(&self, ctx: &Context, err: Error) -> Error {
        match err {
            Error::SchemaMigrationsDoesNotExist(_) => {
                Error::SchemaMigrationsDoesNotExist(self.table.to_string())
            }
            Error::SchemaMigrationsMissingColumns(_) => {
                ctx.in_scope(|| warn!("{} needs an upgrade", self.table));
                Error::SchemaMigrationsMissingColumns(self.table.to_string())
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemoryDriver;

    fn row(version: &str) -> AppliedVersion {
        AppliedVersion {
            version: Version::parse(version).unwrap(),
            label: String::new(),
            executed_at: 0,
        }
    }

    #[test]
    fn latest_and_range_follow_version_order() {
        let set = AppliedSet::from_rows([row("300"), row("100"), row("200")]);
        assert_eq!(set.latest().unwrap().version, Version::parse("300").unwrap());

        let from = Version::parse("200").unwrap();
        let newest: Vec<_> = set
            .newest_down_to(&from)
            .map(|r| r.version.unix())
            .collect();
        assert_eq!(newest, [300, 200]);
        assert!(AppliedSet::default().latest().is_none());
    }

    #[tokio::test]
    async fn missing_table_is_reported() {
        let driver = MemoryDriver::new();
        let err = StateTracker::new(&driver, "schema_migrations")
            .applied(&Context::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::SchemaMigrationsDoesNotExist(t) if t == "schema_migrations"));
    }

    #[tokio::test]
    async fn legacy_table_reports_missing_columns_until_upgraded() {
        let ctx = Context::default();
        let driver = MemoryDriver::new().with_legacy_table(["20200101000000"]);
        let tracker = StateTracker::new(&driver, "schema_migrations");

        let err = tracker.applied(&ctx).await.unwrap_err();
        assert!(matches!(err, Error::SchemaMigrationsMissingColumns(_)));

        driver
            .upgrade_schema_migrations(&ctx, "schema_migrations")
            .await
            .unwrap();
        let set = tracker.applied(&ctx).await.unwrap();
        let only = set.latest().unwrap();
        assert_eq!(only.version.as_str(), "20200101000000");
        assert_eq!(only.label, "");
        assert_eq!(only.executed_at, 0);
    }
}
