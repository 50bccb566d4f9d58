use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{Connection, params, params_from_iter};
use tidemark_common::{Error, Result};
use tidemark_engine::{AppliedVersion, Context, Direction, Driver, Version};
use tracing::{debug, info};

const LABEL_COLUMN: (&str, &str) = ("label", "TEXT NOT NULL DEFAULT ''");
const EXECUTED_AT_COLUMN: (&str, &str) = ("executed_at", "INTEGER NOT NULL DEFAULT 0");

/// SQLite backend. Holds at most one connection.
///
/// Scripts run inside a transaction, so a failing statement rolls back the
/// whole script. Scripts must not issue their own `BEGIN`/`COMMIT`.
pub struct SqliteDriver {
    conn: Mutex<Option<Connection>>,
}

impl Default for SqliteDriver {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Target {
    Memory,
    File(PathBuf),
}

fn parse_dsn(dsn: &str) -> Result<Target> {
    let rest = dsn
        .strip_prefix("sqlite://")
        .or_else(|| dsn.strip_prefix("file://"))
        .or_else(|| dsn.strip_prefix("sqlite:"))
        .unwrap_or(dsn);
    match rest {
        "" => Err(Error::Config(format!("empty sqlite path in DSN {dsn:?}"))),
        ":memory:" => Ok(Target::Memory),
        path => Ok(Target::File(PathBuf::from(path))),
    }
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

impl SqliteDriver {
    pub fn new() -> Self {
        Self {
            conn: Mutex::new(None),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Option<Connection>>> {
        self.conn
            .lock()
            .map_err(|_| Error::Database("sqlite driver lock poisoned".into()))
    }

    fn with_conn<T>(&self, f: impl FnOnce(&mut Connection) -> Result<T>) -> Result<T> {
        let mut guard = self.lock()?;
        let conn = guard.as_mut().ok_or(Error::NotConnected)?;
        f(conn)
    }

    fn table_exists(conn: &Connection, table: &str) -> Result<bool> {
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
                params![table],
                |row| row.get(0),
            )
            .map_err(|e| Error::Database(format!("failed to look up table {table}: {e}")))?;
        Ok(count > 0)
    }

    fn columns(conn: &Connection, table: &str) -> Result<Vec<String>> {
        let mut stmt = conn
            .prepare(&format!("PRAGMA table_info({})", quote_ident(table)))
            .map_err(|e| Error::Database(format!("failed to prepare query: {e}")))?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(1))
            .map_err(|e| Error::Database(format!("failed to read columns of {table}: {e}")))?;

        let mut columns = Vec::new();
        for row in rows {
            columns.push(
                row.map_err(|e| Error::Database(format!("failed to read column row: {e}")))?,
            );
        }
        Ok(columns)
    }

    fn missing_columns(conn: &Connection, table: &str) -> Result<Vec<(&'static str, &'static str)>> {
        let present = Self::columns(conn, table)?;
        Ok([LABEL_COLUMN, EXECUTED_AT_COLUMN]
            .into_iter()
            .filter(|(name, _)| !present.iter().any(|c| c == name))
            .collect())
    }

    fn require_table(conn: &Connection, table: &str) -> Result<()> {
        if Self::table_exists(conn, table)? {
            Ok(())
        } else {
            Err(Error::SchemaMigrationsDoesNotExist(table.to_string()))
        }
    }
}

#[async_trait]
impl Driver for SqliteDriver {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    async fn connect(&mut self, dsn: &str) -> Result<()> {
        let mut guard = self.lock()?;
        if guard.is_some() {
            return Ok(());
        }

        let conn = match parse_dsn(dsn)? {
            Target::Memory => Connection::open_in_memory()
                .map_err(|e| Error::Database(format!("failed to open in-memory database: {e}")))?,
            Target::File(path) => Connection::open(&path).map_err(|e| {
                Error::Database(format!("failed to open {}: {e}", path.display()))
            })?,
        };
        conn.execute_batch("PRAGMA foreign_keys=ON;")
            .map_err(|e| Error::Database(format!("failed to set pragmas: {e}")))?;

        *guard = Some(conn);
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        let mut guard = self.lock()?;
        if let Some(conn) = guard.take() {
            conn.close()
                .map_err(|(_, e)| Error::Database(format!("failed to close database: {e}")))?;
        }
        Ok(())
    }

    async fn execute(&self, ctx: &Context, script: &str, params: &[&str]) -> Result<()> {
        self.with_conn(|conn| {
            if !params.is_empty() {
                conn.execute(script, params_from_iter(params.iter()))
                    .map_err(|e| Error::Database(format!("statement failed: {e}")))?;
                return Ok(());
            }

            let tx = conn
                .transaction()
                .map_err(|e| Error::Database(format!("failed to start transaction: {e}")))?;
            tx.execute_batch(script)
                .map_err(|e| Error::Database(format!("script failed: {e}")))?;
            tx.commit()
                .map_err(|e| Error::Database(format!("failed to commit: {e}")))?;
            ctx.in_scope(|| debug!("executed script ({} bytes)", script.len()));
            Ok(())
        })
    }

    async fn create_schema_migrations_table(&self, ctx: &Context, table: &str) -> Result<()> {
        self.with_conn(|conn| {
            let sql = format!(
                "CREATE TABLE IF NOT EXISTS {} (
                    migration_id TEXT PRIMARY KEY NOT NULL,
                    {} {},
                    {} {}
                )",
                quote_ident(table),
                LABEL_COLUMN.0,
                LABEL_COLUMN.1,
                EXECUTED_AT_COLUMN.0,
                EXECUTED_AT_COLUMN.1,
            );
            conn.execute_batch(&sql)
                .map_err(|e| Error::Database(format!("failed to create {table}: {e}")))?;
            ctx.in_scope(|| debug!("ensured table {table}"));
            Ok(())
        })
    }

    async fn applied_versions(&self, ctx: &Context, table: &str) -> Result<Vec<AppliedVersion>> {
        self.with_conn(|conn| {
            Self::require_table(conn, table)?;
            if !Self::missing_columns(conn, table)?.is_empty() {
                return Err(Error::SchemaMigrationsMissingColumns(table.to_string()));
            }

            let mut stmt = conn
                .prepare(&format!(
                    "SELECT migration_id, label, executed_at FROM {} ORDER BY migration_id ASC",
                    quote_ident(table)
                ))
                .map_err(|e| Error::Database(format!("failed to prepare query: {e}")))?;
            let rows = stmt
                .query_map([], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, i64>(2)?,
                    ))
                })
                .map_err(|e| Error::Database(format!("failed to query {table}: {e}")))?;

            let mut applied = Vec::new();
            for row in rows {
                let (id, label, executed_at) =
                    row.map_err(|e| Error::Database(format!("failed to read row: {e}")))?;
                let version = Version::parse(&id).map_err(|_| {
                    Error::Database(format!("unparsable migration_id {id:?} in {table}"))
                })?;
                applied.push(AppliedVersion {
                    version,
                    label,
                    executed_at,
                });
            }
            applied.sort_by(|a, b| a.version.cmp(&b.version));
            ctx.in_scope(|| debug!("read {} row(s) from {table}", applied.len()));
            Ok(applied)
        })
    }

    async fn update_schema_migrations(
        &self,
        ctx: &Context,
        table: &str,
        direction: Direction,
        version: &Version,
        label: &str,
    ) -> Result<()> {
        self.with_conn(|conn| {
            Self::require_table(conn, table)?;
            let table_ident = quote_ident(table);
            let fail = |e: rusqlite::Error| {
                Error::Database(format!("failed to record {direction} {version} in {table}: {e}"))
            };
            // Legacy rows may hold the unix-epoch spelling of a version.
            let epoch = version.unix().to_string();
            let recorded: i64 = conn
                .query_row(
                    &format!("SELECT COUNT(*) FROM {table_ident} WHERE migration_id IN (?1, ?2)"),
                    params![version.as_str(), epoch],
                    |row| row.get(0),
                )
                .map_err(fail)?;

            match direction {
                Direction::Forward => {
                    if recorded > 0 {
                        return Err(Error::Database(format!(
                            "{version} is already recorded in {table}"
                        )));
                    }
                    conn.execute(
                        &format!(
                            "INSERT INTO {table_ident} (migration_id, label, executed_at) VALUES (?1, ?2, ?3)"
                        ),
                        params![version.as_str(), label, Utc::now().timestamp()],
                    )
                    .map_err(fail)?;
                }
                Direction::Reverse => {
                    if recorded == 0 {
                        return Err(Error::Database(format!(
                            "{version} is not recorded in {table}"
                        )));
                    }
                    conn.execute(
                        &format!("DELETE FROM {table_ident} WHERE migration_id IN (?1, ?2)"),
                        params![version.as_str(), epoch],
                    )
                    .map_err(fail)?;
                }
            }
            ctx.in_scope(|| debug!("recorded {direction} {version} in {table}"));
            Ok(())
        })
    }

    async fn upgrade_schema_migrations(&self, ctx: &Context, table: &str) -> Result<()> {
        self.with_conn(|conn| {
            Self::require_table(conn, table)?;
            let missing = Self::missing_columns(conn, table)?;
            if missing.is_empty() {
                ctx.in_scope(|| info!("{table} is already up to date"));
                return Ok(());
            }

            // SQLite adds one column per ALTER TABLE statement.
            for (name, definition) in missing {
                conn.execute_batch(&format!(
                    "ALTER TABLE {} ADD COLUMN {name} {definition}",
                    quote_ident(table)
                ))
                .map_err(|e| Error::Database(format!("failed to add {name} to {table}: {e}")))?;
                ctx.in_scope(|| info!("added column {name} to {table}"));
            }
            Ok(())
        })
    }

    async fn dump_schema(&self, _ctx: &Context) -> Result<String> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT sql FROM sqlite_master
                     WHERE sql IS NOT NULL AND name NOT LIKE 'sqlite_%'
                     ORDER BY CASE type WHEN 'table' THEN 0 WHEN 'view' THEN 1
                                        WHEN 'index' THEN 2 ELSE 3 END, name",
                )
                .map_err(|e| Error::Database(format!("failed to prepare query: {e}")))?;
            let rows = stmt
                .query_map([], |row| row.get::<_, String>(0))
                .map_err(|e| Error::Database(format!("failed to read schema: {e}")))?;

            let mut dump = String::new();
            for row in rows {
                let sql = row.map_err(|e| Error::Database(format!("failed to read row: {e}")))?;
                dump.push_str(&sql);
                dump.push_str(";\n");
            }
            Ok(dump)
        })
    }
}
