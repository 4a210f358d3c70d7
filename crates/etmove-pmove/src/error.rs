// error.rs — failures a tick can report to its caller

use etmove_common::q_shared::ChargeState;

/// Errors that indicate corrupted input state rather than gameplay outcomes.
/// Blocked reloads, empty clips and the like are never errors.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PmoveError {
    #[error("{machine} charge machine in impossible state {state:?}")]
    InvalidChargeState {
        machine: &'static str,
        state: ChargeState,
    },

    #[error("span slice length must be positive, got {0}")]
    InvalidSlice(i32),
}
