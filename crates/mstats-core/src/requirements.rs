//! Decides which statistics updates a maintenance cycle should run.
//!
//! For each alignment the evaluator asks the run history when that alignment
//! was last brought up to date. Only if no run was ever recorded does it fall
//! back to the earliest delivery data still waiting to be summarised. An
//! update is required once a full period has elapsed after the period
//! containing that baseline.
//!
//! The evaluator performs no writes. Persisting the new run boundaries is the
//! job of whoever performs the aggregation (see [`crate::cycle`]).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::interval::{Alignment, OperationInterval};

// ---------------------------------------------------------------------------
// RunHistory
// ---------------------------------------------------------------------------

/// The two lookups the evaluator depends on.
///
/// Errors are returned unchanged to the caller of
/// [`UpdateRequirementsEvaluator::evaluate`].
pub trait RunHistory {
    /// Boundary reached by the last completed run for `alignment`, as known at `as_of`.
    fn last_run(&self, alignment: Alignment, as_of: DateTime<Utc>)
        -> Result<Option<DateTime<Utc>>>;

    /// Earliest delivery-log entry not yet covered by a run for `alignment`.
    fn earliest_logged(&self, alignment: Alignment) -> Result<Option<DateTime<Utc>>>;
}

impl<T: RunHistory + ?Sized> RunHistory for &T {
    fn last_run(
        &self,
        alignment: Alignment,
        as_of: DateTime<Utc>,
    ) -> Result<Option<DateTime<Utc>>> {
        (**self).last_run(alignment, as_of)
    }

    fn earliest_logged(&self, alignment: Alignment) -> Result<Option<DateTime<Utc>>> {
        (**self).earliest_logged(alignment)
    }
}

// ---------------------------------------------------------------------------
// Decision types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BaselineSource {
    /// A previous run recorded the boundary it reached.
    RunHistory,
    /// No run yet; the earliest unprocessed delivery entry is used instead.
    DeliveryLog,
}

/// Outcome for a single alignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlignmentDecision {
    pub alignment: Alignment,
    pub baseline: Option<DateTime<Utc>>,
    pub source: Option<BaselineSource>,
    /// `due` is true iff `now >= boundary`. `None` when there is no baseline.
    pub boundary: Option<DateTime<Utc>>,
    pub due: bool,
}

impl AlignmentDecision {
    fn idle(alignment: Alignment) -> Self {
        Self {
            alignment,
            baseline: None,
            source: None,
            boundary: None,
            due: false,
        }
    }
}

/// Flags handed to the aggregation controller for one maintenance cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateRequirements {
    pub now: DateTime<Utc>,
    pub operation_interval: OperationInterval,
    /// Intermediate (per operation interval) tables need updating.
    pub update_intermediate: bool,
    /// Final (hourly) tables need updating.
    pub update_final: bool,
    pub intermediate: AlignmentDecision,
    pub hourly: AlignmentDecision,
}

impl UpdateRequirements {
    pub fn decision(&self, alignment: Alignment) -> &AlignmentDecision {
        match alignment {
            Alignment::OperationInterval => &self.intermediate,
            Alignment::Hour => &self.hourly,
        }
    }

    pub fn is_idle(&self) -> bool {
        !self.update_intermediate && !self.update_final
    }

    /// First and last second of the operation interval that most recently
    /// closed before `now`. This is the newest data an intermediate update
    /// can summarise.
    pub fn last_completed_interval(&self) -> (DateTime<Utc>, DateTime<Utc>) {
        self.operation_interval.previous_bounds(self.now)
    }

    /// Bounds of the operation interval still open at `now`.
    pub fn current_interval(&self) -> (DateTime<Utc>, DateTime<Utc>) {
        self.operation_interval.bounds(self.now)
    }
}

// ---------------------------------------------------------------------------
// UpdateRequirementsEvaluator
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
pub struct UpdateRequirementsEvaluator {
    interval: OperationInterval,
}

impl UpdateRequirementsEvaluator {
    pub fn new(interval: OperationInterval) -> Self {
        Self { interval }
    }

    pub fn interval(&self) -> OperationInterval {
        self.interval
    }

    /// Evaluate one maintenance cycle at `now`.
    ///
    /// Lookups happen in a fixed order: last run then earliest logged data
    /// for the operation interval, then the same pair for the hour. The
    /// earliest-logged lookup is skipped for any alignment that has a run
    /// record.
    pub fn evaluate<H>(&self, history: &H, now: DateTime<Utc>) -> Result<UpdateRequirements>
    where
        H: RunHistory + ?Sized,
    {
        let oi_baseline = baseline(history, Alignment::OperationInterval, now)?;
        let hour_baseline = baseline(history, Alignment::Hour, now)?;

        let intermediate = self.decide(Alignment::OperationInterval, oi_baseline, None, now);
        // Hourly roll-ups read the intermediate tables, so the hour holding
        // the intermediate baseline has to close first. The gate can only
        // push the hourly boundary later, never earlier.
        let hourly = self.decide(
            Alignment::Hour,
            hour_baseline,
            oi_baseline.map(|(ts, _)| ts),
            now,
        );

        tracing::debug!(
            now = %now,
            interval = %self.interval,
            update_intermediate = intermediate.due,
            update_final = hourly.due,
            "evaluated update requirements"
        );

        Ok(UpdateRequirements {
            now,
            operation_interval: self.interval,
            update_intermediate: intermediate.due,
            update_final: hourly.due,
            intermediate,
            hourly,
        })
    }

    fn decide(
        &self,
        alignment: Alignment,
        baseline: Option<(DateTime<Utc>, BaselineSource)>,
        gate: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> AlignmentDecision {
        let Some((ts, source)) = baseline else {
            tracing::debug!(%alignment, "no run history or logged data");
            return AlignmentDecision::idle(alignment);
        };

        let mut boundary = alignment.next_boundary(self.interval, ts);
        let mut due = alignment.is_due(self.interval, ts, now);
        if let Some(gate_ts) = gate {
            boundary = boundary.max(alignment.next_boundary(self.interval, gate_ts));
            due = due && alignment.is_due(self.interval, gate_ts, now);
        }

        tracing::debug!(
            %alignment,
            baseline = %ts,
            ?source,
            boundary = %boundary,
            due,
            "alignment checked"
        );

        AlignmentDecision {
            alignment,
            baseline: Some(ts),
            source: Some(source),
            boundary: Some(boundary),
            due,
        }
    }
}

fn baseline<H>(
    history: &H,
    alignment: Alignment,
    now: DateTime<Utc>,
) -> Result<Option<(DateTime<Utc>, BaselineSource)>>
where
    H: RunHistory + ?Sized,
{
    if let Some(ts) = history.last_run(alignment, now)? {
        return Ok(Some((ts, BaselineSource::RunHistory)));
    }
    Ok(history
        .earliest_logged(alignment)?
        .map(|ts| (ts, BaselineSource::DeliveryLog)))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StatsError;
    use std::cell::RefCell;
    use std::collections::HashMap;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        LastRun(Alignment, DateTime<Utc>),
        EarliestLogged(Alignment),
    }

    /// Returns canned answers and records every call made against it.
    #[derive(Default)]
    struct ScriptedHistory {
        runs: HashMap<Alignment, DateTime<Utc>>,
        logged: HashMap<Alignment, DateTime<Utc>>,
        calls: RefCell<Vec<Call>>,
    }

    impl ScriptedHistory {
        fn with_run(mut self, alignment: Alignment, ts: &str) -> Self {
            self.runs.insert(alignment, at(ts));
            self
        }

        fn with_logged(mut self, alignment: Alignment, ts: &str) -> Self {
            self.logged.insert(alignment, at(ts));
            self
        }

        fn calls(&self) -> Vec<Call> {
            self.calls.borrow().clone()
        }

        fn earliest_calls(&self, alignment: Alignment) -> usize {
            self.calls
                .borrow()
                .iter()
                .filter(|c| **c == Call::EarliestLogged(alignment))
                .count()
        }
    }

    impl RunHistory for ScriptedHistory {
        fn last_run(
            &self,
            alignment: Alignment,
            as_of: DateTime<Utc>,
        ) -> Result<Option<DateTime<Utc>>> {
            self.calls.borrow_mut().push(Call::LastRun(alignment, as_of));
            Ok(self.runs.get(&alignment).copied())
        }

        fn earliest_logged(&self, alignment: Alignment) -> Result<Option<DateTime<Utc>>> {
            self.calls.borrow_mut().push(Call::EarliestLogged(alignment));
            Ok(self.logged.get(&alignment).copied())
        }
    }

    struct BrokenHistory;

    impl RunHistory for BrokenHistory {
        fn last_run(&self, _: Alignment, _: DateTime<Utc>) -> Result<Option<DateTime<Utc>>> {
            Err(StatsError::CollaboratorUnavailable("connection refused".into()))
        }

        fn earliest_logged(&self, _: Alignment) -> Result<Option<DateTime<Utc>>> {
            panic!("earliest_logged must not be reached after a failed last_run");
        }
    }

    fn at(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    fn evaluator(minutes: u32) -> UpdateRequirementsEvaluator {
        UpdateRequirementsEvaluator::new(OperationInterval::new(minutes).unwrap())
    }

    const RUN_TIMES: [&str; 3] = [
        "2008-08-12T13:00:01Z",
        "2008-08-12T13:30:01Z",
        "2008-08-12T14:00:01Z",
    ];

    fn logged_only() -> ScriptedHistory {
        ScriptedHistory::default()
            .with_logged(Alignment::OperationInterval, "2008-08-12T13:29:59Z")
            .with_logged(Alignment::Hour, "2008-08-12T12:59:59Z")
    }

    fn expected_flags(now: &str, minutes: u32) -> (bool, bool) {
        match (now, minutes) {
            ("2008-08-12T13:00:01Z", _) => (false, false),
            ("2008-08-12T13:30:01Z", 30) => (true, false),
            ("2008-08-12T13:30:01Z", _) => (false, false),
            _ => (true, true),
        }
    }

    #[test]
    fn no_data_means_no_updates_and_both_lookups_made() {
        for now in RUN_TIMES {
            for minutes in [30, 60] {
                let history = ScriptedHistory::default();
                let result = evaluator(minutes).evaluate(&history, at(now)).unwrap();

                assert!(!result.update_intermediate, "{now} / {minutes}");
                assert!(!result.update_final, "{now} / {minutes}");
                assert!(result.is_idle());
                assert_eq!(
                    history.calls(),
                    vec![
                        Call::LastRun(Alignment::OperationInterval, at(now)),
                        Call::EarliestLogged(Alignment::OperationInterval),
                        Call::LastRun(Alignment::Hour, at(now)),
                        Call::EarliestLogged(Alignment::Hour),
                    ]
                );
            }
        }
    }

    #[test]
    fn scenario_a_nothing_logged_at_one_o_clock() {
        let history = ScriptedHistory::default();
        let result = evaluator(30)
            .evaluate(&history, at("2008-08-12T13:00:01Z"))
            .unwrap();
        assert!(!result.update_intermediate);
        assert!(!result.update_final);
        assert_eq!(result.intermediate.boundary, None);
        assert_eq!(result.hourly.source, None);
    }

    #[test]
    fn scenario_b_half_hour_completes_interval_only() {
        let history = logged_only();
        let result = evaluator(30)
            .evaluate(&history, at("2008-08-12T13:30:01Z"))
            .unwrap();
        assert!(result.update_intermediate);
        assert!(!result.update_final);
        assert_eq!(result.intermediate.source, Some(BaselineSource::DeliveryLog));
        assert_eq!(
            result.intermediate.boundary,
            Some(at("2008-08-12T13:30:00Z"))
        );
        assert_eq!(history.earliest_calls(Alignment::OperationInterval), 1);
        assert_eq!(history.earliest_calls(Alignment::Hour), 1);
    }

    #[test]
    fn scenario_c_top_of_hour_triggers_both() {
        let history = logged_only();
        let result = evaluator(30)
            .evaluate(&history, at("2008-08-12T14:00:01Z"))
            .unwrap();
        assert!(result.update_intermediate);
        assert!(result.update_final);
        assert_eq!(result.hourly.boundary, Some(at("2008-08-12T14:00:00Z")));
    }

    #[test]
    fn scenario_d_run_record_skips_logged_lookup() {
        let history = ScriptedHistory::default()
            .with_run(Alignment::OperationInterval, "2008-08-12T13:29:59Z")
            // Must never be consulted.
            .with_logged(Alignment::OperationInterval, "2008-08-01T00:00:00Z");
        let result = evaluator(30)
            .evaluate(&history, at("2008-08-12T13:30:01Z"))
            .unwrap();

        assert!(result.update_intermediate);
        assert_eq!(result.intermediate.baseline, Some(at("2008-08-12T13:29:59Z")));
        assert_eq!(result.intermediate.source, Some(BaselineSource::RunHistory));
        assert_eq!(history.earliest_calls(Alignment::OperationInterval), 0);
        assert_eq!(history.earliest_calls(Alignment::Hour), 1);
    }

    #[test]
    fn logged_data_only_across_intervals() {
        for now in RUN_TIMES {
            for minutes in [30, 60] {
                let history = logged_only();
                let result = evaluator(minutes).evaluate(&history, at(now)).unwrap();
                assert_eq!(
                    (result.update_intermediate, result.update_final),
                    expected_flags(now, minutes),
                    "{now} / {minutes}"
                );
                assert_eq!(history.calls().len(), 4);
            }
        }
    }

    #[test]
    fn interval_run_with_logged_hour_data() {
        for now in RUN_TIMES {
            for minutes in [30, 60] {
                let history = ScriptedHistory::default()
                    .with_run(Alignment::OperationInterval, "2008-08-12T13:29:59Z")
                    .with_logged(Alignment::Hour, "2008-08-12T12:59:59Z");
                let result = evaluator(minutes).evaluate(&history, at(now)).unwrap();
                assert_eq!(
                    (result.update_intermediate, result.update_final),
                    expected_flags(now, minutes),
                    "{now} / {minutes}"
                );
                assert_eq!(
                    history.calls(),
                    vec![
                        Call::LastRun(Alignment::OperationInterval, at(now)),
                        Call::LastRun(Alignment::Hour, at(now)),
                        Call::EarliestLogged(Alignment::Hour),
                    ]
                );
            }
        }
    }

    #[test]
    fn both_runs_recorded_never_reads_delivery_log() {
        for now in RUN_TIMES {
            for minutes in [30, 60] {
                let history = ScriptedHistory::default()
                    .with_run(Alignment::OperationInterval, "2008-08-12T13:29:59Z")
                    .with_run(Alignment::Hour, "2008-08-12T12:59:59Z");
                let result = evaluator(minutes).evaluate(&history, at(now)).unwrap();
                assert_eq!(
                    (result.update_intermediate, result.update_final),
                    expected_flags(now, minutes),
                    "{now} / {minutes}"
                );
                assert_eq!(history.earliest_calls(Alignment::OperationInterval), 0);
                assert_eq!(history.earliest_calls(Alignment::Hour), 0);
            }
        }
    }

    #[test]
    fn hourly_baseline_alone_is_due_past_the_hour() {
        let history =
            ScriptedHistory::default().with_logged(Alignment::Hour, "2008-08-12T12:59:59Z");
        let due = evaluator(30)
            .evaluate(&history, at("2008-08-12T13:00:01Z"))
            .unwrap();
        assert!(due.update_final);
        assert!(!due.update_intermediate);

        let not_yet = evaluator(30)
            .evaluate(&history, at("2008-08-12T12:59:59Z"))
            .unwrap();
        assert!(!not_yet.update_final);
    }

    #[test]
    fn intermediate_can_be_due_without_final() {
        let history = ScriptedHistory::default()
            .with_run(Alignment::OperationInterval, "2008-08-12T13:00:00Z")
            .with_run(Alignment::Hour, "2008-08-12T13:00:00Z");
        let result = evaluator(15)
            .evaluate(&history, at("2008-08-12T13:15:00Z"))
            .unwrap();
        assert!(result.update_intermediate);
        assert!(!result.update_final);
    }

    #[test]
    fn earlier_interval_baseline_never_advances_hourly_boundary() {
        let history = ScriptedHistory::default()
            .with_run(Alignment::OperationInterval, "2008-08-12T12:10:00Z")
            .with_run(Alignment::Hour, "2008-08-12T13:00:00Z");
        let result = evaluator(10)
            .evaluate(&history, at("2008-08-12T13:30:01Z"))
            .unwrap();
        assert!(result.update_intermediate);
        assert!(!result.update_final);
        assert_eq!(result.hourly.boundary, Some(at("2008-08-12T14:00:00Z")));
    }

    #[test]
    fn later_interval_baseline_holds_hourly_back() {
        let history = ScriptedHistory::default()
            .with_run(Alignment::OperationInterval, "2008-08-12T13:30:00Z")
            .with_run(Alignment::Hour, "2008-08-12T12:00:00Z");
        let result = evaluator(30)
            .evaluate(&history, at("2008-08-12T13:30:01Z"))
            .unwrap();
        assert!(!result.update_final);
        assert_eq!(result.hourly.boundary, Some(at("2008-08-12T14:00:00Z")));
    }

    #[test]
    fn completed_and_current_interval_ranges() {
        let result = evaluator(30)
            .evaluate(&ScriptedHistory::default(), at("2008-08-12T13:30:01Z"))
            .unwrap();
        assert_eq!(
            result.last_completed_interval(),
            (at("2008-08-12T13:00:00Z"), at("2008-08-12T13:29:59Z"))
        );
        assert_eq!(
            result.current_interval(),
            (at("2008-08-12T13:30:00Z"), at("2008-08-12T13:59:59Z"))
        );
    }

    #[test]
    fn boundary_is_inclusive() {
        let history = ScriptedHistory::default()
            .with_run(Alignment::OperationInterval, "2008-08-12T13:29:59Z");
        let exactly = evaluator(30)
            .evaluate(&history, at("2008-08-12T13:30:00Z"))
            .unwrap();
        assert!(exactly.update_intermediate);

        let just_before = evaluator(30)
            .evaluate(&history, at("2008-08-12T13:29:59.999Z"))
            .unwrap();
        assert!(!just_before.update_intermediate);
    }

    #[test]
    fn repeated_evaluation_is_identical() {
        let history = logged_only();
        let e = evaluator(30);
        let now = at("2008-08-12T13:30:01Z");
        let first = e.evaluate(&history, now).unwrap();
        let second = e.evaluate(&history, now).unwrap();
        assert_eq!(first, second);
        assert_eq!(history.calls().len(), 8);
    }

    #[test]
    fn collaborator_errors_propagate_unchanged() {
        let err = evaluator(60)
            .evaluate(&BrokenHistory, at("2008-08-12T14:00:01Z"))
            .unwrap_err();
        match err {
            StatsError::CollaboratorUnavailable(reason) => {
                assert_eq!(reason, "connection refused")
            }
            other => panic!("expected CollaboratorUnavailable, got {other:?}"),
        }
    }

    #[test]
    fn decision_lookup_by_alignment() {
        let history = logged_only();
        let result = evaluator(30)
            .evaluate(&history, at("2008-08-12T14:00:01Z"))
            .unwrap();
        assert_eq!(
            result.decision(Alignment::Hour).baseline,
            Some(at("2008-08-12T12:59:59Z"))
        );
        assert_eq!(
            result.decision(Alignment::OperationInterval).alignment,
            Alignment::OperationInterval
        );
    }

    #[test]
    fn requirements_serialize_with_snake_case_sources() {
        let history = logged_only();
        let result = evaluator(30)
            .evaluate(&history, at("2008-08-12T13:30:01Z"))
            .unwrap();
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["update_intermediate"], true);
        assert_eq!(json["operation_interval"], 30);
        assert_eq!(json["intermediate"]["source"], "delivery_log");
        assert_eq!(json["hourly"]["alignment"], "hour");
    }
}
