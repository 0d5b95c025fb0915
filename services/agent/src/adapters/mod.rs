pub mod db;
pub mod delivery;
pub mod memory;
pub mod payloads;
pub mod wake;

pub use db::DbAdapter;
pub use delivery::{LogSink, WebhookSink};
pub use memory::MemoryStore;
pub use payloads::DefaultPayloads;
pub use wake::{MpscWake, NoopWake};
