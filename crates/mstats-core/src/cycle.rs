//! Records the run boundaries reached by a maintenance cycle.
//!
//! After the aggregation for a cycle succeeds, each triggered alignment is
//! marked as updated up to the last boundary at or before `now`. Evaluating
//! again at the same instant then finds nothing left to do.

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::interval::Alignment;
use crate::requirements::UpdateRequirements;
use crate::store::{RunRecord, StatsDb};

/// Persist a run record for every alignment flagged in `requirements`.
///
/// Returns the records written, in evaluation order.
pub fn commit_cycle(
    db: &StatsDb,
    requirements: &UpdateRequirements,
    recorded_at: DateTime<Utc>,
) -> Result<Vec<RunRecord>> {
    let mut written = Vec::new();
    for alignment in Alignment::ALL {
        if !requirements.decision(alignment).due {
            continue;
        }
        let updated_to =
            alignment.period_start(requirements.operation_interval, requirements.now);
        written.push(db.record_run(alignment, updated_to, recorded_at)?);
    }
    if written.is_empty() {
        tracing::debug!(now = %requirements.now, "nothing to commit");
    }
    Ok(written)
}
