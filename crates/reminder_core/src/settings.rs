//! crates/reminder_core/src/settings.rs
//!
//! The user-facing reminder settings and their translation into recurrence rules.
//!
//! Settings arrive as loosely-filled JSON (every field optional). They are
//! validated eagerly here, one category at a time, so a bad field in one
//! category never blocks the others.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::domain::{Category, MealSlot, RecurrenceRule, TimeOfDay};

/// The `InvalidRule` family: settings fields that cannot become a rule.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RuleError {
    #[error("'{0}' is not a valid HH:mm time")]
    InvalidTime(String),
    #[error("at least one weekday must be selected")]
    EmptyDays,
    #[error("weekday index {0} is outside 0-6")]
    InvalidWeekday(i64),
    #[error("interval must be a positive number of minutes, got {0}")]
    NonPositiveInterval(i64),
    #[error("window {start}-{end} is empty")]
    EmptyWindow { start: TimeOfDay, end: TimeOfDay },
    #[error("an adaptive rule cannot wrap another adaptive rule")]
    NestedAdaptive,
}

//=========================================================================================
// Defaults
//=========================================================================================

pub const DEFAULT_WATER_INTERVAL_MINUTES: i64 = 60;
pub const DEFAULT_WATER_START: &str = "08:00";
pub const DEFAULT_WATER_END: &str = "22:00";

fn default_meal_time(slot: MealSlot) -> &'static str {
    match slot {
        MealSlot::Breakfast => "08:00",
        MealSlot::Lunch => "12:30",
        MealSlot::Dinner => "19:00",
        MealSlot::Snack => "15:30",
    }
}

/// Default `(time, days)` for the weekly categories.
fn default_weekly(category: Category) -> (&'static str, &'static [i64]) {
    match category {
        Category::Workout => ("18:00", &[1, 3, 5]),
        Category::Weight => ("07:30", &[1]),
        _ => ("20:00", &[0, 1, 2, 3, 4, 5, 6]),
    }
}

fn default_daily_time(category: Category) -> &'static str {
    match category {
        Category::Goal => "09:00",
        Category::Summary => "21:00",
        Category::Meal(slot) => default_meal_time(slot),
        _ => "12:00",
    }
}

fn default_true() -> bool {
    true
}

//=========================================================================================
// Settings Structs
//=========================================================================================

/// Settings for a category that fires once a day.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DailySettings {
    pub enabled: bool,
    pub time: Option<String>,
    /// Opt into adaptive timing.
    pub adaptive: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WeeklySettings {
    pub enabled: bool,
    pub time: Option<String>,
    pub days: Option<Vec<i64>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WaterSettings {
    pub enabled: bool,
    pub interval_minutes: Option<i64>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MealSettings {
    pub breakfast: DailySettings,
    pub lunch: DailySettings,
    pub dinner: DailySettings,
    pub snack: DailySettings,
}

impl MealSettings {
    fn slot(&self, slot: MealSlot) -> &DailySettings {
        match slot {
            MealSlot::Breakfast => &self.breakfast,
            MealSlot::Lunch => &self.lunch,
            MealSlot::Dinner => &self.dinner,
            MealSlot::Snack => &self.snack,
        }
    }
}

/// An owner's full reminder configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ReminderSettings {
    /// Master switch. When off the owner has no reminders at all.
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub meals: MealSettings,
    pub water: WaterSettings,
    pub workout: WeeklySettings,
    pub weight: WeeklySettings,
    pub streak: WeeklySettings,
    pub goal: DailySettings,
    pub summary: DailySettings,
}

impl Default for ReminderSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            meals: MealSettings::default(),
            water: WaterSettings::default(),
            workout: WeeklySettings::default(),
            weight: WeeklySettings::default(),
            streak: WeeklySettings::default(),
            goal: DailySettings::default(),
            summary: DailySettings::default(),
        }
    }
}

/// The outcome of resolving one enabled category.
pub type ResolvedCategory = (Category, Result<RecurrenceRule, RuleError>);

impl ReminderSettings {
    /// Builds a rule for every enabled category.
    ///
    /// Disabled categories are absent from the result. Returns nothing when the
    /// master switch is off.
    pub fn resolve(&self) -> Vec<ResolvedCategory> {
        if !self.enabled {
            return Vec::new();
        }

        let mut resolved = Vec::new();
        for slot in MealSlot::ALL {
            let category = Category::Meal(slot);
            let setting = self.meals.slot(slot);
            if setting.enabled {
                resolved.push((category, daily_rule(category, setting)));
            }
        }
        if self.water.enabled {
            resolved.push((Category::Water, water_rule(&self.water)));
        }
        for (category, setting) in [
            (Category::Workout, &self.workout),
            (Category::Weight, &self.weight),
            (Category::Streak, &self.streak),
        ] {
            if setting.enabled {
                resolved.push((category, weekly_rule(category, setting)));
            }
        }
        for (category, setting) in [
            (Category::Goal, &self.goal),
            (Category::Summary, &self.summary),
        ] {
            if setting.enabled {
                resolved.push((category, daily_rule(category, setting)));
            }
        }
        resolved
    }
}

//=========================================================================================
// Rule Construction
//=========================================================================================

fn parse_time(value: Option<&str>, default: &str) -> Result<TimeOfDay, RuleError> {
    value.unwrap_or(default).parse()
}

fn daily_rule(category: Category, setting: &DailySettings) -> Result<RecurrenceRule, RuleError> {
    let time = parse_time(setting.time.as_deref(), default_daily_time(category))?;
    let rule = RecurrenceRule::Daily { time };
    if setting.adaptive {
        return Ok(RecurrenceRule::Adaptive {
            base: Box::new(rule),
        });
    }
    Ok(rule)
}

fn weekly_rule(category: Category, setting: &WeeklySettings) -> Result<RecurrenceRule, RuleError> {
    let (default_time, default_days) = default_weekly(category);
    let time = parse_time(setting.time.as_deref(), default_time)?;
    let days = setting.days.as_deref().unwrap_or(default_days);
    let days_of_week = parse_days(days)?;
    let rule = RecurrenceRule::Weekly { time, days_of_week };
    validate_rule(&rule)?;
    Ok(rule)
}

fn water_rule(setting: &WaterSettings) -> Result<RecurrenceRule, RuleError> {
    let minutes = setting
        .interval_minutes
        .unwrap_or(DEFAULT_WATER_INTERVAL_MINUTES);
    let interval_minutes = u32::try_from(minutes)
        .ok()
        .filter(|m| *m > 0)
        .ok_or(RuleError::NonPositiveInterval(minutes))?;
    let rule = RecurrenceRule::Interval {
        interval_minutes,
        window_start: parse_time(setting.start_time.as_deref(), DEFAULT_WATER_START)?,
        window_end: parse_time(setting.end_time.as_deref(), DEFAULT_WATER_END)?,
    };
    validate_rule(&rule)?;
    Ok(rule)
}

fn parse_days(days: &[i64]) -> Result<BTreeSet<u8>, RuleError> {
    days.iter()
        .map(|&d| {
            u8::try_from(d)
                .ok()
                .filter(|d| *d <= 6)
                .ok_or(RuleError::InvalidWeekday(d))
        })
        .collect()
}

/// Checks the invariants the calculator relies on.
pub fn validate_rule(rule: &RecurrenceRule) -> Result<(), RuleError> {
    match rule {
        RecurrenceRule::Daily { .. } => Ok(()),
        RecurrenceRule::Weekly { days_of_week, .. } => {
            if days_of_week.is_empty() {
                return Err(RuleError::EmptyDays);
            }
            if let Some(bad) = days_of_week.iter().find(|d| **d > 6) {
                return Err(RuleError::InvalidWeekday((*bad).into()));
            }
            Ok(())
        }
        RecurrenceRule::Interval {
            interval_minutes,
            window_start,
            window_end,
        } => {
            if *interval_minutes == 0 {
                return Err(RuleError::NonPositiveInterval(0));
            }
            if window_end <= window_start {
                return Err(RuleError::EmptyWindow {
                    start: *window_start,
                    end: *window_end,
                });
            }
            Ok(())
        }
        RecurrenceRule::Adaptive { base } => match base.as_ref() {
            RecurrenceRule::Adaptive { .. } => Err(RuleError::NestedAdaptive),
            other => validate_rule(other),
        },
    }
}
