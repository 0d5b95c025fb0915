//! services/agent/src/adapters/payloads.rs
//!
//! Minimal notification content per category. Real copy belongs to the client
//! application; these payloads carry enough routing data for it to take over.

use reminder_core::domain::{Category, Payload, RecurrenceRule};
use reminder_core::ports::PayloadProvider;
use serde_json::json;

#[derive(Debug, Clone, Default)]
pub struct DefaultPayloads;

impl PayloadProvider for DefaultPayloads {
    fn payload_for(&self, category: Category, rule: &RecurrenceRule) -> Payload {
        let (title, body, route) = match category {
            Category::Meal(slot) => {
                let meal = slot.as_str();
                (
                    format!("Time to log {meal}"),
                    format!("Don't forget to record your {meal}."),
                    "/log/meal",
                )
            }
            Category::Water => (
                "Hydration check".to_string(),
                "Have a glass of water.".to_string(),
                "/log/water",
            ),
            Category::Workout => (
                "Workout time".to_string(),
                "Your scheduled workout is up.".to_string(),
                "/log/workout",
            ),
            Category::Goal => (
                "Goal check-in".to_string(),
                "Take a minute to review your goals.".to_string(),
                "/goals",
            ),
            Category::Weight => (
                "Weigh-in".to_string(),
                "Log today's weight.".to_string(),
                "/log/weight",
            ),
            Category::Streak => (
                "Keep your streak".to_string(),
                "Log something today to keep your streak going.".to_string(),
                "/streak",
            ),
            Category::Summary => (
                "Your daily summary".to_string(),
                "See how today went.".to_string(),
                "/summary",
            ),
        };

        Payload {
            title,
            body,
            data: json!({
                "category": category.key(),
                "route": route,
                "rule": rule.kind(),
            }),
        }
    }
}
