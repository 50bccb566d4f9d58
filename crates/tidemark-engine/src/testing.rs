//! In-memory [`Driver`] for engine tests.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use tidemark_common::{Error, Result};

use crate::context::Context;
use crate::driver::{AppliedVersion, Driver};
use crate::migration::{Direction, Version};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shape {
    Legacy,
    Modern,
}

#[derive(Debug, Default)]
struct State {
    connected: bool,
    shape: Option<Shape>,
    rows: BTreeMap<String, (String, i64)>,
    executed: Vec<String>,
}

/// Records executed scripts and keeps bookkeeping rows in a map. A script
/// containing `FAIL` errors instead of running; one containing `CANCEL` runs
/// and then cancels the context.
pub struct MemoryDriver {
    state: Mutex<State>,
}

impl MemoryDriver {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
        }
    }

    pub fn with_table(self) -> Self {
        self.lock().shape = Some(Shape::Modern);
        self
    }

    pub fn with_legacy_table<'a>(self, versions: impl IntoIterator<Item = &'a str>) -> Self {
        {
            let mut state = self.lock();
            state.shape = Some(Shape::Legacy);
            for v in versions {
                state.rows.insert(v.to_string(), (String::new(), 0));
            }
        }
        self
    }

    pub fn with_applied<'a>(self, versions: impl IntoIterator<Item = &'a str>) -> Self {
        {
            let mut state = self.lock();
            state.shape = Some(Shape::Modern);
            for v in versions {
                let version = Version::parse(v).unwrap();
                state
                    .rows
                    .insert(version.to_string(), ("fixture".to_string(), 1));
            }
        }
        self
    }

    pub fn executed(&self) -> Vec<String> {
        self.lock().executed.clone()
    }

    pub fn applied_tokens(&self) -> Vec<String> {
        self.lock().rows.keys().cloned().collect()
    }

    pub fn is_connected(&self) -> bool {
        self.lock().connected
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }
}

#[async_trait]
impl Driver for MemoryDriver {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn connect(&mut self, _dsn: &str) -> Result<()> {
        self.lock().connected = true;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.lock().connected = false;
        Ok(())
    }

    async fn execute(&self, ctx: &Context, script: &str, _params: &[&str]) -> Result<()> {
        if script.contains("FAIL") {
            return Err(Error::Database(format!("script failed: {}", script.trim())));
        }
        self.lock().executed.push(script.trim().to_string());
        if script.contains("CANCEL") {
            ctx.cancel();
        }
        Ok(())
    }

    async fn create_schema_migrations_table(&self, _ctx: &Context, _table: &str) -> Result<()> {
        let mut state = self.lock();
        if state.shape.is_none() {
            state.shape = Some(Shape::Modern);
        }
        Ok(())
    }

    async fn applied_versions(&self, _ctx: &Context, table: &str) -> Result<Vec<AppliedVersion>> {
        let state = self.lock();
        match state.shape {
            None => Err(Error::SchemaMigrationsDoesNotExist(table.to_string())),
            Some(Shape::Legacy) => Err(Error::SchemaMigrationsMissingColumns(table.to_string())),
            Some(Shape::Modern) => state
                .rows
                .iter()
                .map(|(v, (label, at))| {
                    Ok(AppliedVersion {
                        version: Version::parse(v)?,
                        label: label.clone(),
                        executed_at: *at,
                    })
                })
                .collect(),
        }
    }

    async fn update_schema_migrations(
        &self,
        _ctx: &Context,
        table: &str,
        direction: Direction,
        version: &Version,
        label: &str,
    ) -> Result<()> {
        let mut state = self.lock();
        if state.shape.is_none() {
            return Err(Error::SchemaMigrationsDoesNotExist(table.to_string()));
        }
        match direction {
            Direction::Forward => {
                if state.rows.contains_key(version.as_str()) {
                    return Err(Error::Database(format!("duplicate key {version}")));
                }
                state
                    .rows
                    .insert(version.to_string(), (label.to_string(), 1_700_000_000));
            }
            Direction::Reverse => {
                if state.rows.remove(version.as_str()).is_none() {
                    return Err(Error::Database(format!("{version} is not recorded")));
                }
            }
        }
        Ok(())
    }

    async fn upgrade_schema_migrations(&self, _ctx: &Context, table: &str) -> Result<()> {
        let mut state = self.lock();
        match state.shape {
            None => Err(Error::SchemaMigrationsDoesNotExist(table.to_string())),
            Some(_) => {
                state.shape = Some(Shape::Modern);
                Ok(())
            }
        }
    }

    async fn dump_schema(&self, _ctx: &Context) -> Result<String> {
        Ok(self.lock().executed.join("\n"))
    }
}
