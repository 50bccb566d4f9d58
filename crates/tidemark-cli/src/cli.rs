use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use tidemark_config::loader::DEFAULT_CONFIG_FILE;
use tidemark_engine::{Direction, Version};

#[derive(Parser, Debug)]
#[command(
    name = "tidemark",
    version,
    about = "Versioned, file-based schema migrations",
    after_help = "Examples:\n  \
    tidemark create-migration --name add_users --reversible\n  \
    tidemark --dsn sqlite://app.db migrate\n  \
    tidemark --dsn sqlite://app.db rollback --version 20200101000000\n  \
    tidemark info --direction forward --format json"
)]
pub struct Cli {
    /// Config file (YAML, TOML or JSON by extension)
    #[arg(long, global = true, value_name = "PATH", default_value = DEFAULT_CONFIG_FILE)]
    pub conf: PathBuf,

    /// Directory of migration files; overrides `path_to_files`
    #[arg(long, global = true, value_name = "DIR")]
    pub files: Option<PathBuf>,

    /// Database connection string
    #[arg(long, global = true, env = "DB_DSN", value_name = "DSN", hide_env_values = true)]
    pub dsn: Option<String>,

    /// Bookkeeping table name; overrides `schema_migrations_table`
    #[arg(long, global = true, value_name = "NAME")]
    pub table: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Write a new forward migration file, and its reverse sibling
    CreateMigration(CreateMigrationArgs),
    /// Apply pending forward migrations
    Migrate(TargetArgs),
    /// Roll back the latest migration, or everything down to a version
    Rollback(TargetArgs),
    /// Roll back the latest migration and apply it again
    Remigrate,
    /// Run exactly one migration selected by version prefix
    RunMigration(RunMigrationArgs),
    /// List migrations with their applied state
    Info(InfoArgs),
    /// Write a default config file and create the bookkeeping table
    Init,
    /// Add missing columns to a legacy bookkeeping table
    Upgrade,
    /// Print the current database schema
    DumpSchema,
    /// Print version information
    Version,
}

#[derive(Args, Debug)]
pub struct CreateMigrationArgs {
    /// Migration label; whitespace becomes underscores
    #[arg(long)]
    pub name: String,

    /// Also write the reverse file
    #[arg(long)]
    pub reversible: bool,
}

#[derive(Args, Debug)]
pub struct TargetArgs {
    /// Target version, as a timestamp or unix epoch
    #[arg(long, value_name = "VERSION")]
    pub version: Option<Version>,
}

#[derive(Args, Debug)]
pub struct RunMigrationArgs {
    /// Version or version prefix; a trailing `*` is accepted
    #[arg(long, value_name = "VERSION")]
    pub version: String,

    #[arg(long, default_value = "forward")]
    pub direction: Direction,
}

#[derive(Args, Debug)]
pub struct InfoArgs {
    #[arg(long, default_value = "forward")]
    pub direction: Direction,

    /// Only show versions up to (forward) or from (reverse) this one
    #[arg(long, value_name = "VERSION")]
    pub version: Option<Version>,

    #[arg(long, value_enum, default_value_t = InfoFormat::Tsv)]
    pub format: InfoFormat,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum InfoFormat {
    Tsv,
    Json,
}
