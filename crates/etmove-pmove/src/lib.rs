#![allow(clippy::too_many_arguments, clippy::collapsible_if, clippy::collapsible_else_if,
         clippy::manual_range_contains, clippy::comparison_chain, clippy::float_cmp,
         clippy::needless_range_loop, clippy::if_same_then_else)]

pub mod error;
pub mod pmove;
mod trace;
pub mod slidemove;
mod classify;
mod moves;
mod stance;
mod footsteps;
mod view;
mod reload;
mod weapon;
mod aimspread;
mod enhanced_attack;

#[cfg(test)]
mod test_support;

pub use classify::FOOTSTEP_SILENT;
pub use error::PmoveError;
pub use pmove::{pmove, pmove_single, Pmove, PmoveCallbacks, SPRINTTIME};
pub use slidemove::pm_clip_velocity;
