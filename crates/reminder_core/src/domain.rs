//! crates/reminder_core/src/domain.rs
//!
//! Defines the pure, core data structures for the scheduler.
//! These structs are independent of any database or delivery mechanism.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use chrono::{NaiveDateTime, NaiveTime};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::settings::RuleError;

static TIME_OF_DAY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{1,2}):(\d{2})$").expect("time-of-day pattern is a valid regex")
});

//=========================================================================================
// Time of Day
//=========================================================================================

/// A local wall-clock time with minute precision, written as `HH:mm`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TimeOfDay {
    hour: u8,
    minute: u8,
}

impl TimeOfDay {
    /// Builds a time of day, rejecting anything outside 00:00-23:59.
    pub fn new(hour: u8, minute: u8) -> Result<Self, RuleError> {
        if hour > 23 || minute > 59 {
            return Err(RuleError::InvalidTime(format!("{hour:02}:{minute:02}")));
        }
        Ok(Self { hour, minute })
    }

    pub fn hour(&self) -> u8 {
        self.hour
    }

    pub fn minute(&self) -> u8 {
        self.minute
    }

    pub fn to_naive(self) -> NaiveTime {
        // Both components are range-checked on construction.
        NaiveTime::from_hms_opt(self.hour.into(), self.minute.into(), 0).unwrap_or(NaiveTime::MIN)
    }
}

impl FromStr for TimeOfDay {
    type Err = RuleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let caps = TIME_OF_DAY
            .captures(s.trim())
            .ok_or_else(|| RuleError::InvalidTime(s.to_string()))?;
        let hour = caps[1]
            .parse::<u8>()
            .map_err(|_| RuleError::InvalidTime(s.to_string()))?;
        let minute = caps[2]
            .parse::<u8>()
            .map_err(|_| RuleError::InvalidTime(s.to_string()))?;
        Self::new(hour, minute).map_err(|_| RuleError::InvalidTime(s.to_string()))
    }
}

impl TryFrom<String> for TimeOfDay {
    type Error = RuleError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TimeOfDay> for String {
    fn from(value: TimeOfDay) -> Self {
        value.to_string()
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

//=========================================================================================
// Category
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MealSlot {
    Breakfast,
    Lunch,
    Dinner,
    Snack,
}

impl MealSlot {
    pub const ALL: [MealSlot; 4] = [
        MealSlot::Breakfast,
        MealSlot::Lunch,
        MealSlot::Dinner,
        MealSlot::Snack,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MealSlot::Breakfast => "breakfast",
            MealSlot::Lunch => "lunch",
            MealSlot::Dinner => "dinner",
            MealSlot::Snack => "snack",
        }
    }
}

/// The closed set of reminder categories. Opaque to the scheduler; it only
/// feeds id derivation and payload selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Category {
    Meal(MealSlot),
    Water,
    Workout,
    Goal,
    Weight,
    Streak,
    Summary,
}

impl Category {
    /// A stable string key, used both in ids and in the persisted row.
    pub fn key(&self) -> String {
        match self {
            Category::Meal(slot) => format!("meal_{}", slot.as_str()),
            Category::Water => "water".to_string(),
            Category::Workout => "workout".to_string(),
            Category::Goal => "goal".to_string(),
            Category::Weight => "weight".to_string(),
            Category::Streak => "streak".to_string(),
            Category::Summary => "summary".to_string(),
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        if let Some(slot) = key.strip_prefix("meal_") {
            return MealSlot::ALL
                .into_iter()
                .find(|s| s.as_str() == slot)
                .map(Category::Meal);
        }
        match key {
            "water" => Some(Category::Water),
            "workout" => Some(Category::Workout),
            "goal" => Some(Category::Goal),
            "weight" => Some(Category::Weight),
            "streak" => Some(Category::Streak),
            "summary" => Some(Category::Summary),
            _ => None,
        }
    }
}

impl TryFrom<String> for Category {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Category::from_key(&value).ok_or_else(|| format!("unknown reminder category '{value}'"))
    }
}

impl From<Category> for String {
    fn from(value: Category) -> Self {
        value.key()
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

//=========================================================================================
// Recurrence Rule
//=========================================================================================

/// How a reminder recurs. Weekday indices run 0 (Sunday) to 6 (Saturday).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RecurrenceRule {
    Daily {
        time: TimeOfDay,
    },
    Weekly {
        time: TimeOfDay,
        days_of_week: BTreeSet<u8>,
    },
    /// Fires every `interval_minutes` inside `[window_start, window_end)`.
    Interval {
        interval_minutes: u32,
        window_start: TimeOfDay,
        window_end: TimeOfDay,
    },
    /// Placeholder for learned timing; currently computed exactly like `base`.
    Adaptive {
        base: Box<RecurrenceRule>,
    },
}

impl RecurrenceRule {
    pub fn kind(&self) -> &'static str {
        match self {
            RecurrenceRule::Daily { .. } => "daily",
            RecurrenceRule::Weekly { .. } => "weekly",
            RecurrenceRule::Interval { .. } => "interval",
            RecurrenceRule::Adaptive { .. } => "adaptive",
        }
    }
}

//=========================================================================================
// Reminder
//=========================================================================================

/// Delivery content. The scheduler hands it to the sink without looking inside.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payload {
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

/// The persisted unit of schedulable work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reminder {
    pub id: String,
    pub owner_id: String,
    pub category: Category,
    pub rule: RecurrenceRule,
    pub payload: Payload,
    pub enabled: bool,
    pub next_trigger: NaiveDateTime,
    pub last_triggered: Option<NaiveDateTime>,
    pub trigger_count: u32,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Reminder {
    /// Ids are derived from owner and category, so re-deriving settings
    /// replaces a reminder instead of duplicating it.
    pub fn id_for(owner_id: &str, category: Category) -> String {
        format!("rem:{}:{}", owner_id, category.key())
    }

    /// A freshly scheduled reminder that has never fired.
    pub fn new(
        owner_id: &str,
        category: Category,
        rule: RecurrenceRule,
        payload: Payload,
        next_trigger: NaiveDateTime,
        now: NaiveDateTime,
    ) -> Self {
        Self {
            id: Self::id_for(owner_id, category),
            owner_id: owner_id.to_string(),
            category,
            rule,
            payload,
            enabled: true,
            next_trigger,
            last_triggered: None,
            trigger_count: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Best-effort "this owner's reminders changed" message for the trigger loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WakeSignal {
    pub owner_id: String,
    pub reminder_ids: Vec<String>,
}
