//! Statement layer and configuration for txlocker
//!
//! This crate sits on top of the locker:
//! - Executor: execute / query_row / query_many with automatic release
//! - Config: `txlocker.toml` loading and defaults
//! - `open`: build a configured [`Locker`] over an already-open pool

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod executor;

pub use config::{LockerConfig, CONFIG_FILE_NAME};
pub use executor::StatementExecutor;

use std::path::Path;
use tracing::info;
use txlocker_concurrency::Locker;
use txlocker_core::{Pool, Result};

/// Build a locker over `pool` from `config`
///
/// # Errors
///
/// `Error::InvalidConfig` if the config does not validate.
pub fn open<P: Pool>(pool: P, config: &LockerConfig) -> Result<Locker<P>> {
    config.validate()?;
    info!(
        target: "txlocker::engine",
        driver = %config.driver,
        isolation = ?config.transaction.isolation,
        read_only = config.transaction.read_only,
        "Opening locker"
    );
    Ok(Locker::new(pool, config.driver.clone()).with_tx_options(config.transaction.clone()))
}

/// Build a locker from the config file at `path`, creating a default one first
/// if it is missing
pub fn open_with_config_file<P: Pool>(pool: P, path: &Path) -> Result<Locker<P>> {
    LockerConfig::write_default_if_missing(path)?;
    let config = LockerConfig::from_file(path)?;
    open(pool, &config)
}
