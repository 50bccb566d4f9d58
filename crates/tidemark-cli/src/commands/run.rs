use anyhow::Result;
use tidemark_engine::Context;

use super::print_report;
use crate::cli::{RunMigrationArgs, TargetArgs};
use crate::session::{Session, Settings};

pub async fn migrate(settings: Settings, ctx: &Context, args: TargetArgs) -> Result<()> {
    let session = Session::open(settings, ctx).await?;
    let outcome = session.migrator().migrate(ctx, args.version.as_ref()).await;
    print_report(&session.close(ctx, outcome).await?);
    Ok(())
}

pub async fn rollback(settings: Settings, ctx: &Context, args: TargetArgs) -> Result<()> {
    let session = Session::open(settings, ctx).await?;
    let outcome = session.migrator().rollback(ctx, args.version.as_ref()).await;
    print_report(&session.close(ctx, outcome).await?);
    Ok(())
}

pub async fn remigrate(settings: Settings, ctx: &Context) -> Result<()> {
    let session = Session::open(settings, ctx).await?;
    let outcome = session.migrator().remigrate(ctx).await;
    print_report(&session.close(ctx, outcome).await?);
    Ok(())
}

pub async fn single(settings: Settings, ctx: &Context, args: RunMigrationArgs) -> Result<()> {
    let session = Session::open(settings, ctx).await?;
    let outcome = session
        .migrator()
        .run_single(ctx, args.direction, &args.version)
        .await;
    print_report(&session.close(ctx, outcome).await?);
    Ok(())
}
