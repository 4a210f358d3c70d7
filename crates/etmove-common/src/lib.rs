#![allow(clippy::too_many_arguments, clippy::collapsible_if, clippy::collapsible_else_if,
         clippy::manual_range_contains, clippy::comparison_chain, clippy::float_cmp,
         clippy::needless_range_loop, clippy::if_same_then_else)]

pub mod q_shared;
pub mod weapons;
pub mod events;
pub mod cvar;

pub use cvar::{ConfigError, CvarContext, PmoveConfig};
pub use events::{EventLog, EventSink};
pub use q_shared::{CharacterInfo, PlayerState, PmoveExt, Trace, UserCmd, Vec3};
pub use weapons::{Weapon, WeaponDef, WeaponState, WeaponTable};
