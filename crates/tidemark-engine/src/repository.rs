use std::path::{Path, PathBuf};

use tidemark_common::{Error, Result};
use tracing::{debug, info, warn};

use crate::context::Context;
use crate::filename;
use crate::migration::{Direction, Migration, Version};

/// A decoded migration and the file it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationFile {
    pub migration: Migration,
    pub path: PathBuf,
}

impl MigrationFile {
    pub fn new(migration: Migration, path: impl Into<PathBuf>) -> Self {
        Self {
            migration,
            path: path.into(),
        }
    }

    pub fn version(&self) -> &Version {
        self.migration.version()
    }

    pub fn direction(&self) -> Direction {
        self.migration.direction()
    }

    /// File name as found on disk.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.migration.filename())
    }
}

/// Every available migration, split by direction and sorted ascending by
/// version. Versions are unique within a direction.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    forward: Vec<MigrationFile>,
    reverse: Vec<MigrationFile>,
}

impl Catalog {
    /// Build a catalog, failing with `DuplicateVersion` when two files share a
    /// direction and version.
    pub fn from_files(files: impl IntoIterator<Item = MigrationFile>) -> Result<Self> {
        let mut catalog = Catalog::default();
        for file in files {
            match file.direction() {
                Direction::Forward => catalog.forward.push(file),
                Direction::Reverse => catalog.reverse.push(file),
            }
        }

        for entries in [&mut catalog.forward, &mut catalog.reverse] {
            entries.sort_by(|a, b| {
                a.version()
                    .cmp(b.version())
                    .then_with(|| a.path.cmp(&b.path))
            });
            if let Some(pair) = entries.windows(2).find(|w| w[0].version() == w[1].version()) {
                return Err(Error::DuplicateVersion {
                    direction: pair[0].direction().to_string(),
                    version: pair[0].version().to_string(),
                    first: pair[0].file_name(),
                    second: pair[1].file_name(),
                });
            }
        }

        Ok(catalog)
    }

    pub fn entries(&self, direction: Direction) -> &[MigrationFile] {
        match direction {
            Direction::Forward => &self.forward,
            Direction::Reverse => &self.reverse,
        }
    }

    pub fn get(&self, direction: Direction, version: &Version) -> Option<&MigrationFile> {
        let entries = self.entries(direction);
        entries
            .binary_search_by(|f| f.version().cmp(version))
            .ok()
            .map(|i| &entries[i])
    }

    pub fn contains(&self, direction: Direction, version: &Version) -> bool {
        self.get(direction, version).is_some()
    }

    pub fn len(&self) -> usize {
        self.forward.len() + self.reverse.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Resolve exactly one file of `direction` whose version matches `query`.
    ///
    /// `query` is a version prefix in canonical form, optionally ending in
    /// `*`. Only when no canonical token starts with it is a bare query read
    /// as a complete unix-epoch version.
    pub fn lookup(&self, direction: Direction, query: &str) -> Result<&MigrationFile> {
        let entries = self.entries(direction);
        let prefix = query.trim_end_matches('*');

        let mut matches: Vec<&MigrationFile> = entries
            .iter()
            .filter(|f| f.version().as_str().starts_with(prefix))
            .collect();
        if matches.is_empty()
            && !query.ends_with('*')
            && let Ok(exact) = Version::parse(prefix)
        {
            matches.extend(entries.iter().filter(|f| f.version() == &exact));
        }

        match matches.as_slice() {
            [] => Err(Error::NotFound(format!(
                "no {direction} migration matching version {query:?}"
            ))),
            [one] => Ok(one),
            many => Err(Error::AmbiguousMatch {
                query: format!("{direction} {query}"),
                candidates: many.iter().map(|f| f.file_name()).collect(),
            }),
        }
    }
}

/// A directory of migration files.
#[derive(Debug, Clone)]
pub struct Repository {
    dir: PathBuf,
}

impl Repository {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Decode every file directly inside the directory into a [`Catalog`].
    ///
    /// Files that do not decode are skipped with a warning. Listing failures
    /// and duplicate versions abort the whole scan.
    pub fn scan(&self, ctx: &Context) -> Result<Catalog> {
        ctx.in_scope(|| self.scan_inner())
    }

    fn scan_inner(&self) -> Result<Catalog> {
        let unreadable = |e: std::io::Error| Error::RepositoryUnreadable {
            path: self.dir.display().to_string(),
            reason: e.to_string(),
        };

        let mut paths = Vec::new();
        for entry in std::fs::read_dir(&self.dir).map_err(unreadable)? {
            let entry = entry.map_err(unreadable)?;
            let file_type = entry.file_type().map_err(unreadable)?;
            if file_type.is_dir() {
                debug!("skipping directory {}", entry.path().display());
                continue;
            }
            paths.push(entry.path());
        }
        // Directory order is unspecified; sort so scans are reproducible.
        paths.sort();

        let mut files = Vec::with_capacity(paths.len());
        for path in paths {
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                warn!("skipping non UTF-8 file name {}", path.display());
                continue;
            };
            match filename::decode(name) {
                Ok(migration) => files.push(MigrationFile::new(migration, path)),
                Err(e) => warn!("skipping {}: {e}", path.display()),
            }
        }

        let catalog = Catalog::from_files(files)?;
        info!(
            "scanned {}: {} forward, {} reverse",
            self.dir.display(),
            catalog.entries(Direction::Forward).len(),
            catalog.entries(Direction::Reverse).len()
        );
        Ok(catalog)
    }
}
