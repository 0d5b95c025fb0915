pub mod clock;
pub mod domain;
pub mod ports;
pub mod schedule;
pub mod settings;

pub use clock::{Clock, ManualClock, SystemClock};
pub use domain::{Category, MealSlot, Payload, RecurrenceRule, Reminder, TimeOfDay, WakeSignal};
pub use ports::{DeliverySink, PayloadProvider, PortError, PortResult, ReminderStore, WakeChannel};
pub use schedule::{next_trigger, Calculator};
pub use settings::{ReminderSettings, RuleError};
