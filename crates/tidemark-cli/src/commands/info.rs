use anyhow::Result;
use chrono::DateTime;
use tidemark_common::Error;
use tidemark_engine::{Context, MigrationState, MigrationStatus};

use crate::cli::{InfoArgs, InfoFormat};
use crate::session::{Session, Settings};

pub async fn run(settings: Settings, ctx: &Context, args: InfoArgs) -> Result<()> {
    let session = Session::open(settings, ctx).await?;
    let outcome = session
        .migrator()
        .info(ctx, args.direction, args.version.as_ref())
        .await;

    let statuses = match session.close(ctx, outcome).await {
        Ok(statuses) => statuses,
        Err(e) => match e.downcast_ref::<Error>() {
            // A legacy table is reported, not failed on.
            Some(err @ Error::SchemaMigrationsMissingColumns(_)) => {
                println!("{err}");
                return Ok(());
            }
            _ => return Err(e),
        },
    };

    match args.format {
        InfoFormat::Tsv => print!("{}", render_tsv(&statuses)),
        InfoFormat::Json => println!("{}", serde_json::to_string_pretty(&statuses)?),
    }
    Ok(())
}

fn render_tsv(statuses: &[MigrationStatus]) -> String {
    let mut out = String::from("state\tversion\tlabel\texecuted_at\n");
    for status in statuses {
        let (state, executed_at) = match &status.state {
            MigrationState::Applied { executed_at } => ("up", format_executed_at(*executed_at)),
            MigrationState::Pending => ("down", String::new()),
        };
        out.push_str(&format!(
            "{state}\t{}\t{}\t{executed_at}\n",
            status.migration.version(),
            status.migration.label()
        ));
    }
    out
}

fn format_executed_at(secs: i64) -> String {
    // Rows carried over from a legacy table have no timestamp.
    if secs == 0 {
        return String::new();
    }
    DateTime::from_timestamp(secs, 0)
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| secs.to_string())
}
