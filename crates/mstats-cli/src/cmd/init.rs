use crate::output::print_json;
use anyhow::Context;
use mstats_core::config::Config;
use mstats_core::interval::OperationInterval;
use mstats_core::paths;
use mstats_core::store::StatsDb;
use std::path::Path;

pub fn run(root: &Path, interval: Option<u32>, json: bool) -> anyhow::Result<()> {
    let config_path = paths::config_path(root);

    let config = if config_path.exists() {
        let mut config = Config::load(root).context("failed to load config")?;
        if let Some(minutes) = interval {
            config.maintenance.operation_interval = OperationInterval::new(minutes)?.minutes();
            config.save(root).context("failed to save config")?;
        }
        config
    } else {
        let interval = match interval {
            Some(minutes) => OperationInterval::new(minutes)?,
            None => OperationInterval::DEFAULT,
        };
        let config = Config::with_interval(interval);
        config.save(root).context("failed to save config")?;
        config
    };

    let db_path = config.db_path(root);
    StatsDb::open(&db_path).with_context(|| format!("failed to open {}", db_path.display()))?;
    tracing::info!(root = %root.display(), "initialized");

    if json {
        print_json(&serde_json::json!({
            "config": config_path,
            "database": db_path,
            "operation_interval": config.maintenance.operation_interval,
        }))?;
    } else {
        println!("Initialized in {}", root.display());
        println!("  config:             {}", config_path.display());
        println!("  database:           {}", db_path.display());
        println!(
            "  operation interval: {} minutes",
            config.maintenance.operation_interval
        );
    }
    Ok(())
}
