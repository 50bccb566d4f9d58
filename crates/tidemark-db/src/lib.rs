//! Backends for the tidemark [`Driver`] contract. Each backend sits behind a
//! cargo feature, so a build only links the databases it was compiled for.

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDriver;

use tidemark_common::{Error, Result};
use tidemark_engine::Driver;

/// Pick a compiled-in backend for `dsn` by its scheme. A DSN without a
/// scheme is treated as a SQLite file path.
pub fn driver_for_dsn(dsn: &str) -> Result<Box<dyn Driver>> {
    let scheme = dsn.split_once("://").map(|(scheme, _)| scheme);
    match scheme {
        #[cfg(feature = "sqlite")]
        None | Some("sqlite") | Some("file") => Ok(Box::new(SqliteDriver::new())),
        Some(other) => Err(Error::Config(format!(
            "no driver compiled in for scheme {other:?}"
        ))),
        #[cfg(not(feature = "sqlite"))]
        None => Err(Error::Config(format!(
            "DSN {dsn:?} has no scheme and no default driver is compiled in"
        ))),
    }
}
