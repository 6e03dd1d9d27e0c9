use super::{open_project, timestamp_or_now};
use crate::output::{print_json, print_table, ts, ts_opt, yes_no};
use anyhow::Context;
use mstats_core::cycle::commit_cycle;
use mstats_core::requirements::{AlignmentDecision, BaselineSource, UpdateRequirementsEvaluator};
use mstats_core::Alignment;
use std::path::Path;

pub fn run(root: &Path, now: Option<&str>, commit: bool, json: bool) -> anyhow::Result<()> {
    let (config, db) = open_project(root)?;
    let now = timestamp_or_now(now)?;
    let evaluator = UpdateRequirementsEvaluator::new(config.operation_interval()?);
    let interval = evaluator.interval();
    let requirements = evaluator
        .evaluate(&db, now)
        .context("failed to evaluate update requirements")?;

    let committed = if commit {
        commit_cycle(&db, &requirements, now).context("failed to record runs")?
    } else {
        Vec::new()
    };

    let (completed_start, completed_end) = requirements.last_completed_interval();
    let (current_start, current_end) = requirements.current_interval();

    if json {
        print_json(&serde_json::json!({
            "requirements": requirements,
            "interval_id": interval.interval_id(now),
            "intervals_per_week": interval.intervals_per_week(),
            "last_completed_interval": { "start": completed_start, "end": completed_end },
            "current_interval": { "start": current_start, "end": current_end },
            "committed": committed,
        }))?;
        return Ok(());
    }

    println!(
        "Evaluated at {} (operation interval {}, interval {} of {})",
        ts(now),
        interval,
        interval.interval_id(now),
        interval.intervals_per_week()
    );
    println!(
        "last completed interval: {} .. {}",
        ts(completed_start),
        ts(completed_end)
    );
    println!(
        "current interval:        {} .. {}",
        ts(current_start),
        ts(current_end)
    );
    println!();
    let rows = Alignment::ALL
        .iter()
        .map(|a| decision_row(requirements.decision(*a)))
        .collect();
    print_table(&["ALIGNMENT", "BASELINE", "SOURCE", "BOUNDARY", "DUE"], rows);
    println!();
    println!(
        "update intermediate: {}",
        yes_no(requirements.update_intermediate)
    );
    println!("update final:        {}", yes_no(requirements.update_final));

    for record in &committed {
        println!(
            "recorded {} run up to {}",
            record.alignment,
            ts(record.updated_to)
        );
    }
    Ok(())
}

fn decision_row(decision: &AlignmentDecision) -> Vec<String> {
    let source = match decision.source {
        Some(BaselineSource::RunHistory) => "run history",
        Some(BaselineSource::DeliveryLog) => "delivery log",
        None => "-",
    };
    vec![
        decision.alignment.to_string(),
        ts_opt(decision.baseline),
        source.to_string(),
        ts_opt(decision.boundary),
        yes_no(decision.due).to_string(),
    ]
}
