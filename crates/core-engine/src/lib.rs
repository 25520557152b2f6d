//! Session Engine, Port Engine, Rules Activator, Escalation Service, and
//! Checkpoint & Recovery — the components that sit directly on top of
//! `core-store` and translate row-level failures into `core_types::DomainError`.

mod checkpoint;
mod error;
mod escalation;
mod port;
mod rules;
mod session;

pub use checkpoint::{render_recovery_prompt, CheckpointService};
pub use error::{store_err, Error, Result};
pub use escalation::EscalationService;
pub use port::PortEngine;
pub use rules::RulesActivator;
pub use session::SessionEngine;
