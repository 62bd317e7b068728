//! Exit codes for the CLI

use disperse_core::error::DisperseError;
use disperse_core::TerminalState;

/// Success, including nothing to release and finished dry runs
pub const SUCCESS: u8 = 0;

/// A release or check failed
pub const ERROR: u8 = 1;

/// Configuration missing or invalid
pub const CONFIG_ERROR: u8 = 2;

/// User cancelled
pub const CANCELLED: u8 = 130;

/// Exit code for one finished release attempt
pub fn for_state(state: &TerminalState) -> u8 {
    match state {
        TerminalState::Done | TerminalState::NothingToRelease | TerminalState::Aborted => SUCCESS,
        TerminalState::Failed { .. } => ERROR,
    }
}

/// Exit code for an error that escaped a command
pub fn for_error(error: &anyhow::Error) -> u8 {
    match error.downcast_ref::<DisperseError>() {
        Some(DisperseError::Config(_)) => CONFIG_ERROR,
        _ => ERROR,
    }
}
