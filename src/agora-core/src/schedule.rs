//! Stage event scheduling.
//!
//! Every time a stage is entered, each of its event templates is resolved
//! into either a trigger offset or a skip. The trigger loop then fires due
//! events as the stage timer counts down.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::scenario::{Stage, StageEvent};

/// Source of uniform draws in `[0, 1)`.
pub trait RandomSource {
    fn next_unit(&mut self) -> f64;
}

/// [`RandomSource`] backed by any `rand` generator.
#[derive(Debug, Clone)]
pub struct RngSource<R: Rng>(R);

impl<R: Rng> RngSource<R> {
    pub fn new(rng: R) -> Self {
        Self(rng)
    }
}

impl RngSource<StdRng> {
    /// Entropy-seeded generator for live sessions.
    pub fn from_entropy() -> Self {
        Self(StdRng::from_entropy())
    }

    /// Reproducible generator.
    pub fn seeded(seed: u64) -> Self {
        Self(StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> RandomSource for RngSource<R> {
    fn next_unit(&mut self) -> f64 {
        self.0.r#gen::<f64>()
    }
}

/// Replays a fixed list of draws, cycling when exhausted.
#[derive(Debug, Clone)]
pub struct SequenceSource {
    values: Vec<f64>,
    pos: usize,
}

impl SequenceSource {
    pub fn new(values: impl Into<Vec<f64>>) -> Self {
        Self {
            values: values.into(),
            pos: 0,
        }
    }
}

impl RandomSource for SequenceSource {
    fn next_unit(&mut self) -> f64 {
        if self.values.is_empty() {
            return 0.0;
        }
        let value = self.values[self.pos % self.values.len()];
        self.pos += 1;
        value
    }
}

/// Ids of every stage event that has fired during the session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TriggeredEvents(BTreeSet<String>);

impl TriggeredEvents {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `id`. Returns `false` if it was already recorded.
    pub fn insert(&mut self, id: &str) -> bool {
        self.0.insert(id.to_string())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.0.contains(id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn ids(&self) -> Vec<String> {
        self.0.iter().cloned().collect()
    }
}

impl FromIterator<String> for TriggeredEvents {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Outcome of one event template for the current stage visit.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledEvent {
    pub event: StageEvent,
    /// Elapsed seconds at which the event fires; `None` when skipped or
    /// already fired earlier in the session.
    pub trigger_at: Option<f64>,
}

/// Display status of a scheduled event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EventStatus {
    Triggered,
    Skipped,
    Scheduled(f64),
}

impl ScheduledEvent {
    pub fn status(&self, triggered: &TriggeredEvents) -> EventStatus {
        if triggered.contains(&self.event.id) {
            EventStatus::Triggered
        } else {
            match self.trigger_at {
                Some(at) => EventStatus::Scheduled(at),
                None => EventStatus::Skipped,
            }
        }
    }
}

/// Resolve a stage's event templates for one visit.
///
/// Non-live stages always produce an empty schedule. Templates already in
/// `triggered` are emitted as skipped without consuming any draws.
pub fn compute_schedule(
    stage: &Stage,
    triggered: &TriggeredEvents,
    rng: &mut dyn RandomSource,
) -> Vec<ScheduledEvent> {
    if !stage.stage_type.is_live() {
        return Vec::new();
    }

    let mut schedule: Vec<ScheduledEvent> = stage
        .events
        .iter()
        .map(|event| {
            let trigger_at = if triggered.contains(&event.id) {
                None
            } else if rng.next_unit() >= event.probability {
                None
            } else {
                let u = rng.next_unit();
                Some(event.min_delay + u * (event.max_delay - event.min_delay))
            };
            ScheduledEvent {
                event: event.clone(),
                trigger_at,
            }
        })
        .collect();

    // Stable: equal offsets keep template order.
    schedule.sort_by(|a, b| compare_offsets(a.trigger_at, b.trigger_at));

    debug!(
        stage = %stage.id,
        scheduled = schedule.iter().filter(|s| s.trigger_at.is_some()).count(),
        total = schedule.len(),
        "computed stage event schedule"
    );

    schedule
}

fn compare_offsets(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// First scheduled event that is due at `elapsed` and has not fired yet.
pub fn next_due<'a>(
    schedule: &'a [ScheduledEvent],
    elapsed: f64,
    triggered: &TriggeredEvents,
) -> Option<&'a ScheduledEvent> {
    schedule.iter().find(|s| {
        s.trigger_at.is_some_and(|at| at <= elapsed) && !triggered.contains(&s.event.id)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::StageType;

    fn event(id: &str, min_delay: f64, max_delay: f64, probability: f64) -> StageEvent {
        StageEvent {
            id: id.to_string(),
            text: format!("Event {}", id),
            description: "Something happens.".to_string(),
            min_delay,
            max_delay,
            probability,
        }
    }

    fn stage(stage_type: StageType, events: Vec<StageEvent>) -> Stage {
        Stage {
            id: "s1".to_string(),
            stage_type,
            title: "Stage".to_string(),
            description: String::new(),
            duration_seconds: 600,
            events,
        }
    }

    #[test]
    fn test_zero_width_window_always_scheduled_at_delay() {
        let stage = stage(StageType::Debate, vec![event("a", 45.0, 45.0, 1.0)]);
        let triggered = TriggeredEvents::new();
        for seed in 0..50 {
            let mut rng = RngSource::seeded(seed);
            let schedule = compute_schedule(&stage, &triggered, &mut rng);
            assert_eq!(schedule[0].trigger_at, Some(45.0));
        }
    }

    #[test]
    fn test_zero_probability_never_scheduled() {
        let stage = stage(StageType::Freeform, vec![event("a", 10.0, 20.0, 0.0)]);
        let triggered = TriggeredEvents::new();
        for seed in 0..50 {
            let mut rng = RngSource::seeded(seed);
            let schedule = compute_schedule(&stage, &triggered, &mut rng);
            assert_eq!(schedule[0].trigger_at, None);
            assert_eq!(next_due(&schedule, 1_000.0, &triggered), None);
        }
    }

    #[test]
    fn test_offset_interpolates_window() {
        let stage = stage(StageType::Speech, vec![event("a", 30.0, 90.0, 0.5)]);
        // First draw passes the probability check, second lands at 25%.
        let mut rng = SequenceSource::new(vec![0.2, 0.25]);
        let schedule = compute_schedule(&stage, &TriggeredEvents::new(), &mut rng);
        assert_eq!(schedule[0].trigger_at, Some(45.0));
    }

    #[test]
    fn test_draw_at_probability_skips() {
        let stage = stage(StageType::Speech, vec![event("a", 30.0, 90.0, 0.5)]);
        let mut rng = SequenceSource::new(vec![0.5]);
        let schedule = compute_schedule(&stage, &TriggeredEvents::new(), &mut rng);
        assert_eq!(schedule[0].trigger_at, None);
    }

    #[test]
    fn test_triggered_events_never_rescheduled() {
        let stage = stage(StageType::Debate, vec![event("a", 0.0, 10.0, 1.0)]);
        let triggered: TriggeredEvents = ["a".to_string()].into_iter().collect();
        for seed in 0..20 {
            let mut rng = RngSource::seeded(seed);
            let schedule = compute_schedule(&stage, &triggered, &mut rng);
            assert_eq!(schedule[0].trigger_at, None);
            assert_eq!(schedule[0].status(&triggered), EventStatus::Triggered);
        }
    }

    #[test]
    fn test_non_live_stages_have_empty_schedule() {
        for stage_type in [
            StageType::NpcResponse,
            StageType::Vote,
            StageType::Verdict,
            StageType::Debrief,
        ] {
            let stage = stage(stage_type, vec![event("a", 0.0, 0.0, 1.0)]);
            let mut rng = SequenceSource::new(vec![0.0]);
            assert!(compute_schedule(&stage, &TriggeredEvents::new(), &mut rng).is_empty());
        }
    }

    #[test]
    fn test_schedule_sorted_with_skipped_last() {
        let stage = stage(
            StageType::Debate,
            vec![
                event("late", 100.0, 100.0, 1.0),
                event("skipped", 0.0, 0.0, 0.0),
                event("early", 20.0, 20.0, 1.0),
            ],
        );
        let mut rng = SequenceSource::new(vec![0.5]);
        let schedule = compute_schedule(&stage, &TriggeredEvents::new(), &mut rng);
        let ids: Vec<&str> = schedule.iter().map(|s| s.event.id.as_str()).collect();
        assert_eq!(ids, vec!["early", "late", "skipped"]);
    }

    #[test]
    fn test_equal_offsets_keep_template_order() {
        let stage = stage(
            StageType::Debate,
            vec![event("first", 50.0, 50.0, 1.0), event("second", 50.0, 50.0, 1.0)],
        );
        let mut rng = SequenceSource::new(vec![0.0]);
        let schedule = compute_schedule(&stage, &TriggeredEvents::new(), &mut rng);
        assert_eq!(schedule[0].event.id, "first");
        assert_eq!(schedule[1].event.id, "second");
    }

    #[test]
    fn test_next_due_picks_earliest_untriggered() {
        let stage = stage(
            StageType::Debate,
            vec![event("a", 10.0, 10.0, 1.0), event("b", 20.0, 20.0, 1.0)],
        );
        let mut rng = SequenceSource::new(vec![0.0]);
        let schedule = compute_schedule(&stage, &TriggeredEvents::new(), &mut rng);

        let mut triggered = TriggeredEvents::new();
        assert_eq!(next_due(&schedule, 5.0, &triggered), None);
        assert_eq!(next_due(&schedule, 25.0, &triggered).unwrap().event.id, "a");

        triggered.insert("a");
        assert_eq!(next_due(&schedule, 25.0, &triggered).unwrap().event.id, "b");
        triggered.insert("b");
        assert_eq!(next_due(&schedule, 25.0, &triggered), None);
    }

    #[test]
    fn test_triggered_set_insert_reports_duplicates() {
        let mut triggered = TriggeredEvents::new();
        assert!(triggered.insert("a"));
        assert!(!triggered.insert("a"));
        assert_eq!(triggered.len(), 1);
        assert_eq!(serde_json::to_string(&triggered).unwrap(), r#"["a"]"#);
    }
}
