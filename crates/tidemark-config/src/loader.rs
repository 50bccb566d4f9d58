use std::path::Path;

use tidemark_common::{Error, Result};
use tracing::{debug, info};

use crate::model::AppConfig;

/// File name used when no `--conf` path is given.
pub const DEFAULT_CONFIG_FILE: &str = ".tidemark.yml";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Yaml,
    Toml,
    Json,
}

impl Format {
    fn from_path(path: &Path) -> Result<Self> {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        match ext {
            "yml" | "yaml" => Ok(Format::Yaml),
            "toml" => Ok(Format::Toml),
            "json" => Ok(Format::Json),
            other => Err(Error::Config(format!(
                "unsupported config extension: {other:?} ({})",
                path.display()
            ))),
        }
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Read the config at `path`. A file that does not exist yields the
    /// defaults; one that exists but cannot be read or parsed is an error.
    pub fn load(path: &Path) -> Result<AppConfig> {
        let format = Format::from_path(path)?;
        if !path.exists() {
            debug!("no config file at {}, using defaults", path.display());
            return Ok(AppConfig::default());
        }

        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read {}: {e}", path.display())))?;
        let config = Self::parse(&contents, format)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        info!("loaded config from {}", path.display());
        Ok(config)
    }

    /// Write a default config to `path`. Refuses to replace an existing file.
    pub fn write_default(path: &Path) -> Result<AppConfig> {
        let format = Format::from_path(path)?;
        if path.exists() {
            return Err(Error::Config(format!(
                "config file {} already exists",
                path.display()
            )));
        }

        let config = AppConfig::default();
        let rendered = match format {
            Format::Yaml => serde_yaml::to_string(&config)
                .map_err(|e| Error::Config(format!("YAML serialize error: {e}")))?,
            Format::Toml => toml::to_string_pretty(&config)
                .map_err(|e| Error::Config(format!("TOML serialize error: {e}")))?,
            Format::Json => serde_json::to_string_pretty(&config)?,
        };
        std::fs::write(path, rendered)?;
        info!("config written to {}", path.display());
        Ok(config)
    }

    fn parse(contents: &str, format: Format) -> std::result::Result<AppConfig, String> {
        match format {
            Format::Yaml => {
                serde_yaml::from_str(contents).map_err(|e| format!("YAML parse error: {e}"))
            }
            Format::Toml => toml::from_str(contents).map_err(|e| format!("TOML parse error: {e}")),
            Format::Json => {
                serde_json::from_str(contents).map_err(|e| format!("JSON parse error: {e}"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = ConfigLoader::load(&dir.path().join(DEFAULT_CONFIG_FILE)).unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn loads_each_supported_format() {
        let dir = tempfile::tempdir().unwrap();

        let yaml = dir.path().join("a.yaml");
        std::fs::write(&yaml, "path_to_files: yaml/dir\n").unwrap();
        assert_eq!(
            ConfigLoader::load(&yaml).unwrap().path_to_files,
            PathBuf::from("yaml/dir")
        );

        let toml_path = dir.path().join("b.toml");
        std::fs::write(&toml_path, "path_to_files = \"toml/dir\"\n").unwrap();
        assert_eq!(
            ConfigLoader::load(&toml_path).unwrap().path_to_files,
            PathBuf::from("toml/dir")
        );

        let json = dir.path().join("c.json");
        std::fs::write(&json, r#"{"path_to_files": "json/dir", "forward_label": "up"}"#).unwrap();
        let config = ConfigLoader::load(&json).unwrap();
        assert_eq!(config.path_to_files, PathBuf::from("json/dir"));
        assert_eq!(config.forward_label, "up");
    }

    #[test]
    fn unparsable_file_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{ not json").unwrap();
        let err = ConfigLoader::load(&path).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().contains("JSON parse error"));
    }

    #[test]
    fn unsupported_extension_is_rejected() {
        let err = ConfigLoader::load(Path::new("settings.ini")).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn write_default_round_trips_and_refuses_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_CONFIG_FILE);

        let written = ConfigLoader::write_default(&path).unwrap();
        assert_eq!(ConfigLoader::load(&path).unwrap(), written);
        assert!(ConfigLoader::write_default(&path).is_err());
    }
}
