//! Shared domain types for the port orchestration engine.
//!
//! No I/O lives here: entities, enums, and the hand-rolled workspace error
//! pattern only. Every other crate builds on top of these.

mod checkpoint;
mod domain_error;
mod error;
mod ids;
mod message;
mod port;
mod profile;
mod session;
mod usage;

pub use checkpoint::*;
pub use domain_error::*;
pub use error::{Error, Result};
pub use ids::new_id;
pub use message::*;
pub use port::*;
pub use profile::*;
pub use session::*;
pub use usage::*;
