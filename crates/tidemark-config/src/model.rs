use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub const DEFAULT_PATH_TO_FILES: &str = "db/migrations";
pub const DEFAULT_SCHEMA_MIGRATIONS_TABLE: &str = "schema_migrations";

/// Settings read from the project's config file. Every field falls back to
/// its default when absent, so a partial file is valid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Directory holding the migration files.
    pub path_to_files: PathBuf,
    /// Direction token written into new forward filenames.
    pub forward_label: String,
    /// Direction token written into new reverse filenames.
    pub reverse_label: String,
    pub schema_migrations_table: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            path_to_files: PathBuf::from(DEFAULT_PATH_TO_FILES),
            forward_label: "forward".to_string(),
            reverse_label: "reverse".to_string(),
            schema_migrations_table: DEFAULT_SCHEMA_MIGRATIONS_TABLE.to_string(),
        }
    }
}
