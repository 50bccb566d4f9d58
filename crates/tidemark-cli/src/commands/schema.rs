use anyhow::{Context as _, Result};
use tidemark_config::ConfigLoader;
use tidemark_engine::Context;
use tracing::info;

use crate::session::{Session, Settings};

/// Write a default config when none exists, make sure the migrations
/// directory is there, then create the bookkeeping table.
pub async fn init(settings: Settings, ctx: &Context) -> Result<()> {
    if !settings.conf.exists() {
        ctx.in_scope(|| ConfigLoader::write_default(&settings.conf))?;
        println!("wrote {}", settings.conf.display());
    }

    let dir = &settings.config.path_to_files;
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create {}", dir.display()))?;

    let session = Session::open(settings, ctx).await?;
    let outcome = session.migrator().init(ctx).await;
    session.close(ctx, outcome).await?;
    ctx.in_scope(|| info!("initialized"));
    Ok(())
}

pub async fn upgrade(settings: Settings, ctx: &Context) -> Result<()> {
    let session = Session::open(settings, ctx).await?;
    let outcome = session.migrator().upgrade(ctx).await;
    session.close(ctx, outcome).await
}

pub async fn dump(settings: Settings, ctx: &Context) -> Result<()> {
    let session = Session::open(settings, ctx).await?;
    let outcome = session.migrator().dump_schema(ctx).await;
    print!("{}", session.close(ctx, outcome).await?);
    Ok(())
}
