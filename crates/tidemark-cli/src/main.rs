mod cli;
mod commands;
mod logging;
mod session;

use std::process::ExitCode;

use clap::Parser;
use tracing::warn;

use crate::cli::Cli;

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let ctx = logging::context(cli.log_json);

    // Ctrl-C stops the run at the next step boundary.
    let interrupt_ctx = ctx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            interrupt_ctx.in_scope(|| warn!("interrupt received, stopping after the current step"));
            interrupt_ctx.cancel();
        }
    });

    match commands::run(cli, &ctx).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("tidemark: {e:#}");
            ExitCode::FAILURE
        }
    }
}
