use super::{open_project, timestamp_or_now};
use crate::output::{print_json, print_table, ts};
use anyhow::Context;
use clap::Subcommand;
use mstats_core::store::DeliveryEntry;
use std::path::Path;

#[derive(Subcommand)]
pub enum DeliverySubcommand {
    /// Append a delivery-log entry
    Log {
        /// When the delivery happened, RFC 3339 (default: current time)
        #[arg(long)]
        at: Option<String>,
        #[arg(long, default_value = "1")]
        impressions: u64,
        #[arg(long, default_value = "0")]
        clicks: u64,
    },

    /// List delivery-log entries in logging order
    List,
}

pub fn run(root: &Path, subcmd: DeliverySubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        DeliverySubcommand::Log {
            at,
            impressions,
            clicks,
        } => log(root, at.as_deref(), impressions, clicks, json),
        DeliverySubcommand::List => list(root, json),
    }
}

fn log(
    root: &Path,
    at: Option<&str>,
    impressions: u64,
    clicks: u64,
    json: bool,
) -> anyhow::Result<()> {
    let (_, db) = open_project(root)?;
    let entry = DeliveryEntry::new(timestamp_or_now(at)?, impressions, clicks);
    db.log_delivery(&entry)
        .context("failed to write delivery entry")?;

    if json {
        print_json(&entry)?;
    } else {
        println!("Logged delivery at {}", ts(entry.logged_at));
    }
    Ok(())
}

fn list(root: &Path, json: bool) -> anyhow::Result<()> {
    let (_, db) = open_project(root)?;
    let entries = db.list_deliveries()?;

    if json {
        return print_json(&entries);
    }
    if entries.is_empty() {
        println!("No delivery data logged.");
        return Ok(());
    }
    let rows = entries
        .iter()
        .map(|e| {
            vec![
                ts(e.logged_at),
                e.impressions.to_string(),
                e.clicks.to_string(),
            ]
        })
        .collect();
    print_table(&["LOGGED AT", "IMPRESSIONS", "CLICKS"], rows);
    Ok(())
}
