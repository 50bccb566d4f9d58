mod create;
mod info;
mod run;
mod schema;

use anyhow::Result;
use tidemark_engine::{Context, RunReport};

use crate::cli::{Cli, Command};
use crate::session::Settings;

/// Dispatch a parsed command line.
pub async fn run(cli: Cli, ctx: &Context) -> Result<()> {
    if let Command::Version = cli.command {
        println!("tidemark {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let settings = Settings::resolve(&cli, ctx)?;
    match cli.command {
        Command::CreateMigration(args) => create::run(&settings, ctx, args),
        Command::Migrate(args) => run::migrate(settings, ctx, args).await,
        Command::Rollback(args) => run::rollback(settings, ctx, args).await,
        Command::Remigrate => run::remigrate(settings, ctx).await,
        Command::RunMigration(args) => run::single(settings, ctx, args).await,
        Command::Info(args) => info::run(settings, ctx, args).await,
        Command::Init => schema::init(settings, ctx).await,
        Command::Upgrade => schema::upgrade(settings, ctx).await,
        Command::DumpSchema => schema::dump(settings, ctx).await,
        Command::Version => Ok(()),
    }
}

fn print_report(report: &RunReport) {
    if report.is_empty() {
        println!("nothing pending");
        return;
    }
    for migration in &report.applied {
        println!("{}", migration.filename());
    }
}
