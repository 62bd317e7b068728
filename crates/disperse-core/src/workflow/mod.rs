//! Release workflow: inference, gate, mutation, verification, CI waits,
//! publishing and the state machine tying them together

pub mod ci;
pub mod dispatch;
pub mod gate;
pub mod inference;
pub mod mutate;
mod orchestrator;
pub mod verify;

#[cfg(test)]
pub(crate) mod testing;

pub use dispatch::PublisherDispatch;
pub use gate::{evaluate as evaluate_gate, GateContext};
pub use inference::{infer_current, propose_next, CurrentVersion, NextVersionRequest};
pub use mutate::MutationReport;
pub use orchestrator::*;
