use anyhow::Result;
use chrono::Utc;
use tidemark_engine::{Context, Creator};

use crate::cli::CreateMigrationArgs;
use crate::session::Settings;

pub fn run(settings: &Settings, ctx: &Context, args: CreateMigrationArgs) -> Result<()> {
    let config = &settings.config;
    let created = Creator::new(&config.path_to_files)
        .with_tokens(&config.forward_label, &config.reverse_label)?
        .create(ctx, &args.name, args.reversible, Utc::now())?;
    for path in created {
        println!("{}", path.display());
    }
    Ok(())
}
