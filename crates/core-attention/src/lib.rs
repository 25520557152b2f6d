//! Token-budget accounting, checkpoint-policy enforcement, and compaction
//! detection — the attention subsystem of §4.7.

mod error;
mod monitor;

pub use error::{store_err, Error, Result};
pub use monitor::AttentionMonitor;
