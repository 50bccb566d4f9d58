use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tidemark_common::{Error, Result};
use tracing::info;

use crate::context::Context;
use crate::filename;
use crate::migration::{Direction, TIMESTAMP_FORMAT};

/// Writes new, empty migration files into a directory.
#[derive(Debug, Clone)]
pub struct Creator {
    dir: PathBuf,
    forward_token: String,
    reverse_token: String,
}

impl Creator {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            forward_token: Direction::Forward.as_str().to_string(),
            reverse_token: Direction::Reverse.as_str().to_string(),
        }
    }

    /// Use custom direction tokens in new filenames. Each must be an alias
    /// of its own direction.
    pub fn with_tokens(mut self, forward: &str, reverse: &str) -> Result<Self> {
        for (token, expected) in [(forward, Direction::Forward), (reverse, Direction::Reverse)] {
            if Direction::from_token(token) != Some(expected) {
                return Err(Error::Config(format!(
                    "{token:?} is not a {expected} direction alias"
                )));
            }
        }
        self.forward_token = forward.to_string();
        self.reverse_token = reverse.to_string();
        Ok(self)
    }

    /// Create the forward file for `name` (and its reverse sibling when
    /// `reversible`), versioned at `now`. Existing files are never replaced.
    pub fn create(
        &self,
        ctx: &Context,
        name: &str,
        reversible: bool,
        now: DateTime<Utc>,
    ) -> Result<Vec<PathBuf>> {
        ctx.in_scope(|| -> Result<Vec<PathBuf>> {
            let label = slug(name);
            let version = now.format(TIMESTAMP_FORMAT).to_string();
            std::fs::create_dir_all(&self.dir)?;

            let mut names = vec![filename::encode_with_token(
                &version,
                &self.forward_token,
                &label,
            )?];
            if reversible {
                names.push(filename::encode_with_token(
                    &version,
                    &self.reverse_token,
                    &label,
                )?);
            }

            let mut created = Vec::with_capacity(names.len());
            for name in names {
                let path = self.dir.join(&name);
                write_new(&path, &format!("-- {name}\n"))?;
                info!("created {}", path.display());
                created.push(path);
            }
            Ok(created)
        })
    }
}

fn slug(name: &str) -> String {
    name.split_whitespace().collect::<Vec<_>>().join("_")
}

fn write_new(path: &Path, contents: &str) -> Result<()> {
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map_err(|e| match e.kind() {
            ErrorKind::AlreadyExists => {
                Error::Config(format!("{} already exists", path.display()))
            }
            _ => Error::Io(e),
        })?;
    file.write_all(contents.as_bytes())?;
    Ok(())
}
