//! Price notification engine
//!
//! Features:
//! - Percent-change and heartbeat notify conditions per pair
//! - Batched submission of all due pairs
//! - Non-overlapping poll cycles with a separate error cadence

pub mod clock;
pub mod notifier;
pub mod polling;
pub mod state;

pub use clock::{Clock, ManualClock, SystemClock};
pub use notifier::{CycleReport, NotifyReason, PriceNotifier};
pub use polling::{CycleExecutor, PollingHandler, PollingHandlerStats};
pub use state::{NotifyEntry, NotifyState, NotifyStateStats};
