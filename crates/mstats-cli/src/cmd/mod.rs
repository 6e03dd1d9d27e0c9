pub mod config;
pub mod delivery;
pub mod evaluate;
pub mod init;
pub mod run;

use anyhow::Context;
use chrono::{DateTime, Utc};
use mstats_core::config::Config;
use mstats_core::interval::parse_timestamp;
use mstats_core::store::StatsDb;
use std::path::Path;

/// Load the config and open the database it points at.
pub fn open_project(root: &Path) -> anyhow::Result<(Config, StatsDb)> {
    let config = Config::load(root).context("failed to load config")?;
    let db_path = config.db_path(root);
    let db = StatsDb::open(&db_path)
        .with_context(|| format!("failed to open {}", db_path.display()))?;
    Ok((config, db))
}

/// Parse `--now`-style arguments, defaulting to the current time.
pub fn timestamp_or_now(value: Option<&str>) -> anyhow::Result<DateTime<Utc>> {
    match value {
        Some(s) => Ok(parse_timestamp(s)?),
        None => Ok(Utc::now()),
    }
}
