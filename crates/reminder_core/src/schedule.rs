//! crates/reminder_core/src/schedule.rs
//!
//! The recurrence rule calculator. Pure functions: given a rule and a reference
//! instant, compute the next instant the rule fires at.
//!
//! Rules are assumed to have passed `settings::validate_rule`. Malformed input
//! never panics here; it falls back to a fixed cadence ahead of the reference.

use std::collections::BTreeSet;

use chrono::{Datelike, Duration, NaiveDateTime};

use crate::domain::{RecurrenceRule, TimeOfDay};

/// How close the current interval grid point must be to the reference for it
/// to be returned instead of the next one.
pub const DEFAULT_JITTER_TOLERANCE_SECS: i64 = 30;

/// Cadence used when a rule cannot be evaluated.
pub const FALLBACK_CADENCE_MINUTES: i64 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Calculator {
    jitter_tolerance: Duration,
}

impl Default for Calculator {
    fn default() -> Self {
        Self::new(Duration::seconds(DEFAULT_JITTER_TOLERANCE_SECS))
    }
}

impl Calculator {
    pub fn new(jitter_tolerance: Duration) -> Self {
        Self { jitter_tolerance }
    }

    pub fn jitter_tolerance(&self) -> Duration {
        self.jitter_tolerance
    }

    /// Next trigger for `rule` as seen from `reference`.
    ///
    /// `last_triggered` is the reminder's most recent firing, if any. An
    /// interval grid point at or before it is never returned again.
    pub fn next_trigger(
        &self,
        rule: &RecurrenceRule,
        reference: NaiveDateTime,
        last_triggered: Option<NaiveDateTime>,
    ) -> NaiveDateTime {
        match rule {
            RecurrenceRule::Daily { time } => next_daily(*time, reference),
            RecurrenceRule::Weekly { time, days_of_week } => {
                next_weekly(*time, days_of_week, reference)
            }
            RecurrenceRule::Interval {
                interval_minutes,
                window_start,
                window_end,
            } => self.next_interval(
                *interval_minutes,
                *window_start,
                *window_end,
                reference,
                last_triggered,
            ),
            RecurrenceRule::Adaptive { base } => self.next_trigger(base, reference, last_triggered),
        }
    }

    fn next_interval(
        &self,
        interval_minutes: u32,
        window_start: TimeOfDay,
        window_end: TimeOfDay,
        reference: NaiveDateTime,
        last_triggered: Option<NaiveDateTime>,
    ) -> NaiveDateTime {
        if interval_minutes == 0 || window_end <= window_start {
            return fallback(reference);
        }

        let day = reference.date();
        let start = day.and_time(window_start.to_naive());
        let end = day.and_time(window_end.to_naive());
        if reference < start {
            return start;
        }

        let interval = Duration::minutes(interval_minutes.into());
        let periods_elapsed = (reference - start).num_seconds() / interval.num_seconds();
        let current = start + Duration::seconds(periods_elapsed * interval.num_seconds());

        let already_fired = last_triggered.is_some_and(|last| current <= last);
        if current < end && reference - current <= self.jitter_tolerance && !already_fired {
            return current;
        }

        let candidate = current + interval;
        if candidate >= end {
            return start + Duration::days(1);
        }
        candidate
    }
}

/// Shorthand for `Calculator::default().next_trigger(..)`.
pub fn next_trigger(
    rule: &RecurrenceRule,
    reference: NaiveDateTime,
    last_triggered: Option<NaiveDateTime>,
) -> NaiveDateTime {
    Calculator::default().next_trigger(rule, reference, last_triggered)
}

fn next_daily(time: TimeOfDay, reference: NaiveDateTime) -> NaiveDateTime {
    let today = reference.date().and_time(time.to_naive());
    if today <= reference {
        today + Duration::days(1)
    } else {
        today
    }
}

fn next_weekly(time: TimeOfDay, days: &BTreeSet<u8>, reference: NaiveDateTime) -> NaiveDateTime {
    // Every weekday selected is just a daily rule.
    if (0..7).all(|d| days.contains(&d)) {
        return next_daily(time, reference);
    }

    let today = reference.weekday().num_days_from_sunday() as u8;
    // Offset 7 is today again, one week out.
    for offset in 0..=7u8 {
        let weekday = (today + offset) % 7;
        if !days.contains(&weekday) {
            continue;
        }
        let candidate =
            (reference.date() + Duration::days(offset.into())).and_time(time.to_naive());
        if candidate > reference {
            return candidate;
        }
    }
    fallback(reference)
}

fn fallback(reference: NaiveDateTime) -> NaiveDateTime {
    reference + Duration::minutes(FALLBACK_CADENCE_MINUTES)
}
