//! Bridge session lifecycle
//!
//! Provides:
//! - The lifecycle state machine (Idle → Configuring → Running → TearingDown → Terminated)
//! - Validated session plans
//! - The rollback record and its once-only finalizer
//! - Termination signal forwarding
//! - The orchestrator sequencing setup and teardown

pub mod orchestrator;
pub mod plan;
pub mod session;
pub mod signals;
pub mod state;

pub use orchestrator::Orchestrator;
pub use plan::{MacChoice, Plan};
