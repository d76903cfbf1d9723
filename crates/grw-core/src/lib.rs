//! Core domain model and event occurrence engine for GRW.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const CRATE_NAME: &str = "grw-core";

const MS_PER_DAY: i64 = 86_400_000;

/// Extra cycles the predictor may walk past its computed window before
/// giving up. The `cycle_end > from` test always advances on well-formed
/// recurrences; the bound only matters if that invariant is broken.
const PREDICTOR_EXTRA_CYCLES: i64 = 100;

/// Game metadata loaded from a game's `_meta.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameMeta {
    pub id: String,
    pub slug: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub categories: Vec<CategoryDefinition>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryDefinition {
    pub id: String,
    pub slug: String,
    pub name: String,
    pub entity_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub display_fields: Vec<DisplayField>,
}

/// Field of a schemaless entity that listing/detail pages should show.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayField {
    pub key: String,
    pub label: String,
}

/// The three identity fields every entity record must carry, whatever
/// else its category-specific schema adds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityIdentity {
    pub id: String,
    pub slug: String,
    pub name: String,
}

pub fn entity_identity(value: &serde_json::Value) -> Option<EntityIdentity> {
    let field = |key: &str| value.get(key)?.as_str().map(ToString::to_string);
    Some(EntityIdentity {
        id: field("id")?,
        slug: field("slug")?,
        name: field("name")?,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    Active,
    Upcoming,
    Ended,
}

impl std::fmt::Display for EventStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            EventStatus::Active => "active",
            EventStatus::Upcoming => "upcoming",
            EventStatus::Ended => "ended",
        };
        f.write_str(s)
    }
}

/// Informational classification of a recurrence. Does not alter the
/// cycle arithmetic; `interval_days` alone drives it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecurrenceType {
    Weekly,
    Biweekly,
    Custom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecurrenceConfig {
    #[serde(rename = "type")]
    pub kind: RecurrenceType,
    #[serde(default = "default_interval_days")]
    pub interval_days: i64,
    pub duration_days: i64,
}

fn default_interval_days() -> i64 {
    7
}

impl RecurrenceConfig {
    fn interval_ms(&self) -> i64 {
        self.interval_days.saturating_mul(MS_PER_DAY)
    }

    fn duration_ms(&self) -> i64 {
        self.duration_days.saturating_mul(MS_PER_DAY)
    }

    /// Boundary validation for stored configs. The occurrence engine is
    /// total either way; configs that fail here never reach the store.
    pub fn validate(&self) -> Result<(), EventConfigError> {
        if self.interval_days <= 0 {
            return Err(EventConfigError::NonPositiveInterval(self.interval_days));
        }
        if self.duration_days < 0 {
            return Err(EventConfigError::NegativeDuration(self.duration_days));
        }
        if self.duration_days > self.interval_days {
            return Err(EventConfigError::DurationExceedsInterval {
                duration_days: self.duration_days,
                interval_days: self.interval_days,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EventConfigError {
    #[error("recurrence interval must be at least one day, got {0}")]
    NonPositiveInterval(i64),
    #[error("recurrence duration must not be negative, got {0}")]
    NegativeDuration(i64),
    #[error("recurrence duration of {duration_days} days exceeds the {interval_days}-day interval")]
    DurationExceedsInterval {
        duration_days: i64,
        interval_days: i64,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageRequirement {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_id: Option<String>,
    pub item_name: String,
    pub quantity: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageReward {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_id: Option<String>,
    pub item_name: String,
    pub quantity: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rarity: Option<String>,
}

/// One stage of a staged event. Rendering-only; the occurrence engine
/// never looks at stages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventStage {
    pub id: String,
    pub name: String,
    pub order: u32,
    #[serde(default)]
    pub requirements: Vec<StageRequirement>,
    #[serde(default)]
    pub rewards: Vec<StageReward>,
}

/// Scheduling half of an event record, tagged by the `type` field of the
/// stored JSON. A recurring event without a recurrence config cannot be
/// represented, so that malformed shape is rejected at parse time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventSchedule {
    #[serde(rename_all = "camelCase")]
    OneTime {
        start_date: DateTime<Utc>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        end_date: Option<DateTime<Utc>>,
    },
    #[serde(rename_all = "camelCase")]
    Recurring {
        start_date: DateTime<Utc>,
        recurrence: RecurrenceConfig,
    },
}

impl EventSchedule {
    pub fn start_date(&self) -> DateTime<Utc> {
        match self {
            EventSchedule::OneTime { start_date, .. } => *start_date,
            EventSchedule::Recurring { start_date, .. } => *start_date,
        }
    }

    pub fn recurrence(&self) -> Option<&RecurrenceConfig> {
        match self {
            EventSchedule::OneTime { .. } => None,
            EventSchedule::Recurring { recurrence, .. } => Some(recurrence),
        }
    }
}

/// Immutable game event record as stored in `events.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameEvent {
    pub id: String,
    pub slug: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(flatten)]
    pub schedule: EventSchedule,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stages: Vec<EventStage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl GameEvent {
    pub fn validate(&self) -> Result<(), EventConfigError> {
        match self.schedule.recurrence() {
            Some(recurrence) => recurrence.validate(),
            None => Ok(()),
        }
    }
}

/// The occurrence of an event relevant at some reference time. Derived,
/// never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventOccurrence {
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub status: EventStatus,
}

/// An [`EventOccurrence`] plus the absolute cycle ordinal since the
/// event's anchor start.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictedOccurrence {
    #[serde(flatten)]
    pub occurrence: EventOccurrence,
    pub cycle_index: u64,
}

/// Whether the event is active at the reference time.
pub fn is_event_active(event: &GameEvent, at: DateTime<Utc>) -> bool {
    event_status(event, at) == EventStatus::Active
}

/// Status of the event at the reference time.
pub fn event_status(event: &GameEvent, at: DateTime<Utc>) -> EventStatus {
    current_occurrence(event, at).status
}

/// Compute the occurrence relevant at `at`.
///
/// One-time events always echo their own fixed dates, whatever the
/// status. Recurring events report the cycle containing `at` when it is
/// inside the active window, and the next cycle's window during
/// downtime. Both window boundaries are inclusive.
pub fn current_occurrence(event: &GameEvent, at: DateTime<Utc>) -> EventOccurrence {
    match &event.schedule {
        EventSchedule::OneTime {
            start_date,
            end_date,
        } => {
            // Absent end means a zero-duration occurrence at the start.
            let end = end_date.unwrap_or(*start_date);
            let status = if at < *start_date {
                EventStatus::Upcoming
            } else if at > end {
                EventStatus::Ended
            } else {
                EventStatus::Active
            };
            EventOccurrence {
                start_date: *start_date,
                end_date: end,
                status,
            }
        }
        EventSchedule::Recurring {
            start_date,
            recurrence,
        } => {
            let interval_ms = recurrence.interval_ms();
            if interval_ms <= 0 {
                // Degenerate interval; validation keeps these out of the
                // store, here it collapses to a zero-width ended window.
                return EventOccurrence {
                    start_date: *start_date,
                    end_date: *start_date,
                    status: EventStatus::Ended,
                };
            }
            let duration_ms = recurrence.duration_ms();
            let start_ms = start_date.timestamp_millis();
            let at_ms = at.timestamp_millis();

            if at_ms < start_ms {
                // First cycle has not begun; its window comes from the
                // configured duration, recurring events store no endDate.
                return EventOccurrence {
                    start_date: *start_date,
                    end_date: datetime_from_ms(start_ms + duration_ms),
                    status: EventStatus::Upcoming,
                };
            }

            // Floor division picks the current cycle directly, so a
            // reference time years past the anchor costs the same as one
            // inside the first cycle.
            let cycles_passed = (at_ms - start_ms) / interval_ms;
            let cycle_start = start_ms + cycles_passed * interval_ms;
            let cycle_end = cycle_start + duration_ms;

            if at_ms >= cycle_start && at_ms <= cycle_end {
                EventOccurrence {
                    start_date: datetime_from_ms(cycle_start),
                    end_date: datetime_from_ms(cycle_end),
                    status: EventStatus::Active,
                }
            } else {
                // Downtime between windows; report the next cycle.
                let next_start = cycle_start + interval_ms;
                EventOccurrence {
                    start_date: datetime_from_ms(next_start),
                    end_date: datetime_from_ms(next_start + duration_ms),
                    status: EventStatus::Upcoming,
                }
            }
        }
    }
}

/// Enumerate up to `count` occurrences of a recurring event that have not
/// fully ended by `from`, oldest first.
///
/// Non-recurring events yield an empty vector; that is the "not
/// applicable" signal, not an error. Cycle indices are absolute ordinals
/// since the anchor start, so a call made mid-history starts at the
/// current cycle number rather than zero.
pub fn predict_future_occurrences(
    event: &GameEvent,
    count: usize,
    from: DateTime<Utc>,
) -> Vec<PredictedOccurrence> {
    let EventSchedule::Recurring {
        start_date,
        recurrence,
    } = &event.schedule
    else {
        return Vec::new();
    };

    let interval_ms = recurrence.interval_ms();
    if interval_ms <= 0 || count == 0 {
        return Vec::new();
    }
    let duration_ms = recurrence.duration_ms();
    let start_ms = start_date.timestamp_millis();
    let from_ms = from.timestamp_millis();

    let first_cycle = if from_ms > start_ms {
        (from_ms - start_ms) / interval_ms
    } else {
        0
    };

    let mut occurrences = Vec::with_capacity(count);
    let mut cycle = first_cycle;
    let give_up_after = first_cycle + count as i64 + PREDICTOR_EXTRA_CYCLES;

    while occurrences.len() < count && cycle <= give_up_after {
        let cycle_start = start_ms + cycle * interval_ms;
        let cycle_end = cycle_start + duration_ms;

        // Skip cycles that have fully ended; this can drop the starting
        // cycle itself when the call lands in its downtime.
        if cycle_end > from_ms {
            let status = if from_ms >= cycle_start && from_ms <= cycle_end {
                EventStatus::Active
            } else {
                EventStatus::Upcoming
            };
            occurrences.push(PredictedOccurrence {
                occurrence: EventOccurrence {
                    start_date: datetime_from_ms(cycle_start),
                    end_date: datetime_from_ms(cycle_end),
                    status,
                },
                cycle_index: cycle as u64,
            });
        }
        cycle += 1;
    }

    occurrences
}

fn datetime_from_ms(ms: i64) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp_millis(ms).expect("occurrence timestamp within chrono range")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn ts(s: &str) -> DateTime<Utc> {
        s.parse().expect("rfc3339 timestamp")
    }

    fn one_time(start: &str, end: Option<&str>) -> GameEvent {
        GameEvent {
            id: "launch-fest".into(),
            slug: "launch-fest".into(),
            name: "Launch Festival".into(),
            description: None,
            schedule: EventSchedule::OneTime {
                start_date: ts(start),
                end_date: end.map(ts),
            },
            stages: Vec::new(),
            category: None,
            image: None,
        }
    }

    fn recurring(start: &str, interval_days: i64, duration_days: i64) -> GameEvent {
        GameEvent {
            id: "guild-raid".into(),
            slug: "guild-raid".into(),
            name: "Guild Raid".into(),
            description: None,
            schedule: EventSchedule::Recurring {
                start_date: ts(start),
                recurrence: RecurrenceConfig {
                    kind: RecurrenceType::Custom,
                    interval_days,
                    duration_days,
                },
            },
            stages: Vec::new(),
            category: None,
            image: None,
        }
    }

    #[test]
    fn one_time_status_progression() {
        let event = one_time("2026-02-01T00:00:00Z", Some("2026-02-07T23:59:59Z"));

        assert_eq!(
            event_status(&event, ts("2026-01-15T00:00:00Z")),
            EventStatus::Upcoming
        );
        assert_eq!(
            event_status(&event, ts("2026-02-03T12:00:00Z")),
            EventStatus::Active
        );
        assert_eq!(
            event_status(&event, ts("2026-02-10T00:00:00Z")),
            EventStatus::Ended
        );
    }

    #[test]
    fn one_time_boundaries_are_inclusive() {
        let event = one_time("2026-02-01T00:00:00Z", Some("2026-02-07T23:59:59Z"));

        assert!(is_event_active(&event, ts("2026-02-01T00:00:00Z")));
        assert!(is_event_active(&event, ts("2026-02-07T23:59:59Z")));
        assert!(!is_event_active(&event, ts("2026-01-31T23:59:59Z")));
        assert!(!is_event_active(&event, ts("2026-02-08T00:00:00Z")));
    }

    #[test]
    fn one_time_occurrence_echoes_fixed_dates_for_every_status() {
        let event = one_time("2026-04-01T00:00:00Z", Some("2026-04-15T23:59:59Z"));

        for at in [
            "2026-03-01T00:00:00Z",
            "2026-04-10T00:00:00Z",
            "2026-05-01T00:00:00Z",
        ] {
            let occurrence = current_occurrence(&event, ts(at));
            assert_eq!(occurrence.start_date, ts("2026-04-01T00:00:00Z"));
            assert_eq!(occurrence.end_date, ts("2026-04-15T23:59:59Z"));
        }
    }

    #[test]
    fn one_time_without_end_is_a_zero_duration_occurrence() {
        let event = one_time("2026-05-01T00:00:00Z", None);

        let before = current_occurrence(&event, ts("2026-04-01T00:00:00Z"));
        assert_eq!(before.status, EventStatus::Upcoming);
        assert_eq!(before.end_date, ts("2026-05-01T00:00:00Z"));

        assert!(is_event_active(&event, ts("2026-05-01T00:00:00Z")));
        assert_eq!(
            event_status(&event, ts("2026-05-01T00:00:01Z")),
            EventStatus::Ended
        );
    }

    #[test]
    fn recurring_active_inside_first_cycle() {
        let event = recurring("2024-01-01T00:00:00Z", 21, 7);
        assert!(is_event_active(&event, ts("2024-01-03T00:00:00Z")));
    }

    #[test]
    fn recurring_downtime_reports_next_cycle() {
        let event = recurring("2024-01-01T00:00:00Z", 21, 7);

        // Nine days in: the seven-day window has ended, the next cycle
        // starts on day 21.
        let occurrence = current_occurrence(&event, ts("2024-01-10T00:00:00Z"));
        assert_eq!(occurrence.status, EventStatus::Upcoming);
        assert_eq!(occurrence.start_date, ts("2024-01-22T00:00:00Z"));
        assert_eq!(occurrence.end_date, ts("2024-01-29T00:00:00Z"));
    }

    #[test]
    fn recurring_active_in_later_cycles() {
        let event = recurring("2024-01-01T00:00:00Z", 21, 7);
        assert!(is_event_active(&event, ts("2024-01-23T00:00:00Z")));
    }

    #[test]
    fn recurring_before_anchor_reports_first_window() {
        let event = recurring("2024-01-01T00:00:00Z", 21, 7);

        let occurrence = current_occurrence(&event, ts("2023-12-01T00:00:00Z"));
        assert_eq!(occurrence.status, EventStatus::Upcoming);
        assert_eq!(occurrence.start_date, ts("2024-01-01T00:00:00Z"));
        // End comes from the duration, not a stored endDate.
        assert_eq!(occurrence.end_date, ts("2024-01-08T00:00:00Z"));
    }

    #[test]
    fn recurring_periodicity_holds_across_many_cycles() {
        let event = recurring("2024-01-01T00:00:00Z", 21, 7);
        let anchor = ts("2024-01-01T00:00:00Z");

        for k in 0..60 {
            let cycle_start = anchor + Duration::days(21 * k);
            assert!(is_event_active(&event, cycle_start), "cycle {k} start");
            assert_eq!(
                event_status(&event, cycle_start + Duration::days(8)),
                EventStatus::Upcoming,
                "cycle {k} downtime"
            );
        }
    }

    #[test]
    fn recurring_far_future_is_still_resolved() {
        let event = recurring("2024-01-01T00:00:00Z", 21, 7);
        let occurrence = current_occurrence(&event, ts("2029-01-01T00:00:00Z"));
        assert!(matches!(
            occurrence.status,
            EventStatus::Active | EventStatus::Upcoming
        ));
        assert!(occurrence.end_date > occurrence.start_date);
    }

    #[test]
    fn recurring_boundary_instants_are_active() {
        let event = recurring("2024-01-01T00:00:00Z", 14, 5);
        // Exact window start and exact window end of cycle 2.
        assert!(is_event_active(&event, ts("2024-01-29T00:00:00Z")));
        assert!(is_event_active(&event, ts("2024-02-03T00:00:00Z")));
        assert!(!is_event_active(&event, ts("2024-02-03T00:00:01Z")));
    }

    #[test]
    fn degenerate_interval_collapses_to_ended() {
        let event = recurring("2024-01-01T00:00:00Z", 0, 0);
        let occurrence = current_occurrence(&event, ts("2024-06-01T00:00:00Z"));
        assert_eq!(occurrence.status, EventStatus::Ended);
        assert_eq!(occurrence.start_date, occurrence.end_date);
        assert!(predict_future_occurrences(&event, 5, ts("2024-06-01T00:00:00Z")).is_empty());
    }

    #[test]
    fn predictor_skips_non_recurring_events() {
        let event = one_time("2026-01-01T00:00:00Z", Some("2026-01-07T00:00:00Z"));
        assert!(predict_future_occurrences(&event, 5, ts("2026-01-01T00:00:00Z")).is_empty());
    }

    #[test]
    fn predictor_yields_the_documented_three_week_cadence() {
        let event = recurring("2024-01-01T00:00:00Z", 21, 7);
        let predictions = predict_future_occurrences(&event, 5, ts("2024-01-01T00:00:00Z"));

        let starts: Vec<DateTime<Utc>> = predictions
            .iter()
            .map(|p| p.occurrence.start_date)
            .collect();
        assert_eq!(
            starts,
            vec![
                ts("2024-01-01T00:00:00Z"),
                ts("2024-01-22T00:00:00Z"),
                ts("2024-02-12T00:00:00Z"),
                ts("2024-03-04T00:00:00Z"),
                ts("2024-03-25T00:00:00Z"),
            ]
        );
    }

    #[test]
    fn predictor_interval_and_duration_laws() {
        let event = recurring("2024-01-01T00:00:00Z", 21, 7);
        let predictions = predict_future_occurrences(&event, 5, ts("2024-01-01T00:00:00Z"));
        assert_eq!(predictions.len(), 5);

        for pair in predictions.windows(2) {
            assert_eq!(
                pair[1].occurrence.start_date - pair[0].occurrence.start_date,
                Duration::days(21)
            );
        }
        for p in &predictions {
            assert_eq!(
                p.occurrence.end_date - p.occurrence.start_date,
                Duration::days(7)
            );
        }
    }

    #[test]
    fn predictor_cycle_indices_are_consecutive_absolute_ordinals() {
        let event = recurring("2024-01-01T00:00:00Z", 21, 7);
        let predictions = predict_future_occurrences(&event, 5, ts("2024-01-01T00:00:00Z"));
        let indices: Vec<u64> = predictions.iter().map(|p| p.cycle_index).collect();
        assert_eq!(indices, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn predictor_marks_the_running_cycle_active() {
        let event = recurring("2024-01-01T00:00:00Z", 21, 7);
        let predictions = predict_future_occurrences(&event, 3, ts("2024-01-03T00:00:00Z"));

        assert_eq!(predictions[0].occurrence.status, EventStatus::Active);
        assert_eq!(predictions[0].cycle_index, 0);
        assert_eq!(predictions[1].occurrence.status, EventStatus::Upcoming);
        assert_eq!(predictions[2].occurrence.status, EventStatus::Upcoming);
    }

    #[test]
    fn predictor_drops_cycles_that_already_ended() {
        let event = recurring("2024-01-01T00:00:00Z", 21, 7);
        let from = ts("2024-07-01T00:00:00Z");
        let predictions = predict_future_occurrences(&event, 3, from);

        assert_eq!(predictions.len(), 3);
        for p in &predictions {
            assert!(p.occurrence.end_date > from);
        }
        // Mid-downtime start: the walk advanced past the spent cycle.
        assert!(predictions[0].cycle_index > 0);
        for pair in predictions.windows(2) {
            assert_eq!(pair[1].cycle_index, pair[0].cycle_index + 1);
        }
    }

    #[test]
    fn predictor_handles_far_future_reference_times() {
        let event = recurring("2024-01-01T00:00:00Z", 21, 7);
        let from = ts("2029-01-01T00:00:00Z");
        let predictions = predict_future_occurrences(&event, 5, from);

        assert_eq!(predictions.len(), 5);
        for p in &predictions {
            assert!(p.occurrence.end_date > from);
        }
    }

    #[test]
    fn predictor_default_interval_is_weekly() {
        let mut event = recurring("2024-01-01T00:00:00Z", 7, 2);
        if let EventSchedule::Recurring { recurrence, .. } = &mut event.schedule {
            recurrence.kind = RecurrenceType::Weekly;
        }
        let predictions = predict_future_occurrences(&event, 4, ts("2024-01-01T00:00:00Z"));
        assert_eq!(predictions.len(), 4);
        assert_eq!(
            predictions[1].occurrence.start_date - predictions[0].occurrence.start_date,
            Duration::days(7)
        );
    }

    #[test]
    fn recurrence_validation_rejects_bad_configs() {
        let zero_interval = RecurrenceConfig {
            kind: RecurrenceType::Custom,
            interval_days: 0,
            duration_days: 0,
        };
        assert_eq!(
            zero_interval.validate(),
            Err(EventConfigError::NonPositiveInterval(0))
        );

        let oversized = RecurrenceConfig {
            kind: RecurrenceType::Custom,
            interval_days: 7,
            duration_days: 9,
        };
        assert_eq!(
            oversized.validate(),
            Err(EventConfigError::DurationExceedsInterval {
                duration_days: 9,
                interval_days: 7,
            })
        );

        let fine = RecurrenceConfig {
            kind: RecurrenceType::Biweekly,
            interval_days: 14,
            duration_days: 3,
        };
        assert!(fine.validate().is_ok());
    }

    #[test]
    fn event_json_round_trips_through_the_stored_shape() {
        let json = r#"{
            "id": "frost-siege",
            "slug": "frost-siege",
            "name": "Frost Siege",
            "type": "recurring",
            "startDate": "2024-01-01T00:00:00Z",
            "recurrence": { "type": "custom", "intervalDays": 21, "durationDays": 7 }
        }"#;

        let event: GameEvent = serde_json::from_str(json).expect("parse event");
        assert_eq!(
            event.schedule.recurrence().map(|r| r.interval_days),
            Some(21)
        );

        let value = serde_json::to_value(&event).expect("serialize event");
        assert_eq!(value["type"], "recurring");
        assert_eq!(value["recurrence"]["intervalDays"], 21);

        let back: GameEvent = serde_json::from_value(value).expect("reparse event");
        assert_eq!(back, event);
    }

    #[test]
    fn recurring_event_without_recurrence_fails_to_parse() {
        let json = r#"{
            "id": "broken",
            "slug": "broken",
            "name": "Broken",
            "type": "recurring",
            "startDate": "2024-01-01T00:00:00Z"
        }"#;
        assert!(serde_json::from_str::<GameEvent>(json).is_err());
    }

    #[test]
    fn interval_days_defaults_to_seven_when_absent() {
        let json = r#"{
            "id": "weekly-arena",
            "slug": "weekly-arena",
            "name": "Weekly Arena",
            "type": "recurring",
            "startDate": "2024-01-01T00:00:00Z",
            "recurrence": { "type": "weekly", "durationDays": 2 }
        }"#;
        let event: GameEvent = serde_json::from_str(json).expect("parse event");
        assert_eq!(
            event.schedule.recurrence().map(|r| r.interval_days),
            Some(7)
        );
    }

    #[test]
    fn occurrence_dates_survive_a_serde_round_trip() {
        let event = recurring("2024-01-01T00:00:00Z", 21, 7);
        let occurrence = current_occurrence(&event, ts("2024-01-10T00:00:00Z"));

        let json = serde_json::to_string(&occurrence).expect("serialize occurrence");
        let back: EventOccurrence = serde_json::from_str(&json).expect("parse occurrence");
        assert_eq!(back, occurrence);
    }

    #[test]
    fn entity_identity_requires_all_three_fields() {
        let full = serde_json::json!({"id": "h1", "slug": "pyra", "name": "Pyra", "tier": "S"});
        let identity = entity_identity(&full).expect("identity");
        assert_eq!(identity.slug, "pyra");

        let partial = serde_json::json!({"id": "h2", "name": "Nameless"});
        assert!(entity_identity(&partial).is_none());
    }
}
