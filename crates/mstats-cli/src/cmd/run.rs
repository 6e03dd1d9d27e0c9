use super::{open_project, timestamp_or_now};
use crate::output::{print_json, print_table, ts};
use anyhow::Context;
use clap::Subcommand;
use mstats_core::interval::parse_timestamp;
use mstats_core::Alignment;
use std::path::Path;

#[derive(Subcommand)]
pub enum RunSubcommand {
    /// Record that an alignment has been updated up to a boundary
    Record {
        /// Alignment: oi or hour
        #[arg(long)]
        alignment: String,
        /// Boundary reached, RFC 3339
        #[arg(long)]
        updated_to: String,
        /// When the run finished (default: current time)
        #[arg(long)]
        recorded_at: Option<String>,
    },

    /// List recorded runs
    List {
        /// Only show runs for this alignment (oi or hour)
        #[arg(long)]
        alignment: Option<String>,
    },
}

pub fn run(root: &Path, subcmd: RunSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        RunSubcommand::Record {
            alignment,
            updated_to,
            recorded_at,
        } => record(root, &alignment, &updated_to, recorded_at.as_deref(), json),
        RunSubcommand::List { alignment } => list(root, alignment.as_deref(), json),
    }
}

fn record(
    root: &Path,
    alignment: &str,
    updated_to: &str,
    recorded_at: Option<&str>,
    json: bool,
) -> anyhow::Result<()> {
    let alignment: Alignment = alignment.parse()?;
    let updated_to = parse_timestamp(updated_to)?;
    let recorded_at = timestamp_or_now(recorded_at)?;

    let (_, db) = open_project(root)?;
    let record = db
        .record_run(alignment, updated_to, recorded_at)
        .context("failed to record run")?;

    if json {
        print_json(&record)?;
    } else {
        println!(
            "Recorded {} run up to {}",
            record.alignment,
            ts(record.updated_to)
        );
    }
    Ok(())
}

fn list(root: &Path, alignment: Option<&str>, json: bool) -> anyhow::Result<()> {
    let alignment = alignment.map(str::parse::<Alignment>).transpose()?;
    let (_, db) = open_project(root)?;
    let runs = db.list_runs(alignment)?;

    if json {
        return print_json(&runs);
    }
    if runs.is_empty() {
        println!("No runs recorded.");
        return Ok(());
    }
    let rows = runs
        .iter()
        .map(|r| {
            vec![
                r.alignment.to_string(),
                ts(r.updated_to),
                ts(r.recorded_at),
            ]
        })
        .collect();
    print_table(&["ALIGNMENT", "UPDATED TO", "RECORDED AT"], rows);
    Ok(())
}
