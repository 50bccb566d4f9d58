use std::path::PathBuf;

use anyhow::{Context as _, Result, bail};
use tidemark_config::{AppConfig, ConfigLoader};
use tidemark_engine::{Context, Driver, Migrator, Repository};
use tracing::{debug, info, warn};

use crate::cli::Cli;

/// Config file values with command-line overrides applied.
#[derive(Debug, Clone)]
pub struct Settings {
    pub conf: PathBuf,
    pub config: AppConfig,
    pub dsn: Option<String>,
}

impl Settings {
    pub fn resolve(cli: &Cli, ctx: &Context) -> Result<Self> {
        let mut config = ctx
            .in_scope(|| ConfigLoader::load(&cli.conf))
            .with_context(|| format!("failed to load config {}", cli.conf.display()))?;
        if let Some(files) = &cli.files {
            config.path_to_files = files.clone();
        }
        if let Some(table) = &cli.table {
            config.schema_migrations_table = table.clone();
        }
        Ok(Self {
            conf: cli.conf.clone(),
            config,
            dsn: cli.dsn.clone(),
        })
    }
}

/// One open database connection for the duration of a command.
pub struct Session {
    driver: Box<dyn Driver>,
    settings: Settings,
}

impl Session {
    pub async fn open(settings: Settings, ctx: &Context) -> Result<Self> {
        let Some(dsn) = settings.dsn.as_deref() else {
            bail!("no database configured: pass --dsn or set DB_DSN");
        };
        let mut driver = tidemark_db::driver_for_dsn(dsn)?;
        driver
            .connect(dsn)
            .await
            .with_context(|| format!("failed to connect with {} driver", driver.name()))?;
        ctx.in_scope(|| info!("connected ({} driver)", driver.name()));
        Ok(Self { driver, settings })
    }

    pub fn migrator(&self) -> Migrator<'_> {
        Migrator::new(
            self.driver.as_ref(),
            Repository::new(&self.settings.config.path_to_files),
        )
        .with_table(&self.settings.config.schema_migrations_table)
    }

    /// Close the connection and hand back `outcome`. The connection is
    /// closed whether or not the command succeeded; a close failure after a
    /// command failure is only logged.
    pub async fn close<T>(mut self, ctx: &Context, outcome: tidemark_common::Result<T>) -> Result<T> {
        let closed = self.driver.close().await;
        if closed.is_ok() {
            ctx.in_scope(|| debug!("{} connection closed", self.driver.name()));
        }
        match (outcome, closed) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(e)) => Err(e).context("failed to close database connection"),
            (Err(e), closed) => {
                if let Err(close_err) = closed {
                    ctx.in_scope(|| warn!("failed to close database connection: {close_err}"));
                }
                Err(e.into())
            }
        }
    }
}
