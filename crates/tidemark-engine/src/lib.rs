//! Migration engine: decodes migration filenames into a catalog, compares it
//! with the versions recorded in the bookkeeping table, plans which scripts to
//! run, and executes the plan through a [`Driver`].
//!
//! Data flows one way:
//!
//! - [`Repository::scan`] builds a [`Catalog`] from a directory
//! - [`StateTracker::applied`] reads the [`AppliedSet`] through the driver
//! - [`Planner`] combines both into a [`Plan`]
//! - [`Executor::run`] applies the plan step by step
//!
//! [`Migrator`] wires these together for the common commands.

pub mod context;
pub mod creator;
pub mod driver;
pub mod executor;
pub mod filename;
pub mod migration;
pub mod migrator;
pub mod planner;
pub mod repository;
pub mod tracker;

#[cfg(test)]
mod testing;

pub use context::Context;
pub use creator::Creator;
pub use driver::{AppliedVersion, Driver};
pub use executor::{Executor, ExecutorState, RunReport};
pub use filename::{decode, encode};
pub use migration::{Direction, Migration, Version};
pub use migrator::{MigrationState, MigrationStatus, Migrator};
pub use planner::{Plan, Planner};
pub use repository::{Catalog, MigrationFile, Repository};
pub use tracker::{AppliedSet, StateTracker};
