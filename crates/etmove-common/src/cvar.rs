// cvar.rs — named tunables and the movement configuration built from them

use std::collections::HashMap;

use serde::{Deserialize, Deserializer};
use tracing::{debug, warn};

bitflags::bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct CvarFlags: u32 {
        const ARCHIVE    = 0x01;
        const SERVERINFO = 0x04;
        /// Changes wait for `get_latched_vars`.
        const LATCH      = 0x10;
        /// Only settable through `force_set`.
        const NOSET      = 0x08;
    }
}

/// A single named variable.
#[derive(Clone, Debug, PartialEq)]
pub struct Cvar {
    pub name: String,
    pub string: String,
    pub latched_string: Option<String>,
    pub flags: CvarFlags,
    pub modified: bool,
    pub value: f32,
}

/// Registry of named variables.
#[derive(Clone, Debug, Default)]
pub struct CvarContext {
    pub cvar_vars: Vec<Cvar>,
    cvar_index: HashMap<String, usize>,
}

impl CvarContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn find_var(&self, name: &str) -> Option<&Cvar> {
        self.cvar_index.get(name).map(|&idx| &self.cvar_vars[idx])
    }

    /// Value as a float; 0 when unknown.
    pub fn variable_value(&self, name: &str) -> f32 {
        self.find_var(name).map_or(0.0, |var| var.value)
    }

    /// Value as a string; "" when unknown.
    pub fn variable_string(&self, name: &str) -> &str {
        self.find_var(name).map_or("", |var| var.string.as_str())
    }

    /// Get or create a variable. An existing variable keeps its value and
    /// gains `flags`.
    pub fn get(&mut self, name: &str, value: &str, flags: CvarFlags) -> usize {
        if let Some(&idx) = self.cvar_index.get(name) {
            self.cvar_vars[idx].flags |= flags;
            return idx;
        }

        let idx = self.cvar_vars.len();
        self.cvar_vars.push(Cvar {
            name: name.to_string(),
            string: value.to_string(),
            latched_string: None,
            flags,
            modified: true,
            value: value.parse::<f32>().unwrap_or(0.0),
        });
        self.cvar_index.insert(name.to_string(), idx);
        idx
    }

    fn set2(&mut self, name: &str, value: &str, force: bool) -> usize {
        let idx = match self.cvar_index.get(name) {
            Some(&idx) => idx,
            None => return self.get(name, value, CvarFlags::empty()),
        };
        let var = &mut self.cvar_vars[idx];

        if !force {
            if var.flags.contains(CvarFlags::NOSET) {
                warn!(name, "write protected");
                return idx;
            }

            if var.flags.contains(CvarFlags::LATCH) {
                let current = var.latched_string.as_deref().unwrap_or(&var.string);
                if value != current {
                    debug!(name, value, "latched for next restart");
                    var.latched_string = Some(value.to_string());
                }
                return idx;
            }
        } else {
            var.latched_string = None;
        }

        if value == var.string {
            return idx;
        }

        var.modified = true;
        var.string = value.to_string();
        var.value = value.parse::<f32>().unwrap_or(0.0);
        idx
    }

    /// Set a value, honouring NOSET and LATCH.
    pub fn set(&mut self, name: &str, value: &str) -> usize {
        self.set2(name, value, false)
    }

    /// Set a value, ignoring NOSET and LATCH.
    pub fn force_set(&mut self, name: &str, value: &str) -> usize {
        self.set2(name, value, true)
    }

    pub fn set_value(&mut self, name: &str, value: f32) {
        let val_str = if value == (value as i32) as f32 {
            format!("{}", value as i32)
        } else {
            format!("{}", value)
        };
        self.set(name, &val_str);
    }

    /// Apply every pending latched change.
    pub fn get_latched_vars(&mut self) {
        for var in &mut self.cvar_vars {
            if let Some(latched) = var.latched_string.take() {
                var.value = latched.parse::<f32>().unwrap_or(0.0);
                var.string = latched;
                var.modified = true;
            }
        }
    }
}

// ============================================================
// Movement configuration
// ============================================================

bitflags::bitflags! {
    /// Optional weapon behaviour switches.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct WeaponFlags: u32 {
        /// Engineers may use pliers underwater.
        const ENGI       = 0x0001;
        /// Medics may use the syringe underwater.
        const MEDIC      = 0x0002;
        /// Rifles may be topped up before the clip is dry.
        const FAIRRIFLES = 0x0004;
        const MOLOTOV    = 0x0008;
        const THKNIVES   = 0x0010;
    }
}

bitflags::bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct MiscFlags: u32 {
        const DOUBLEJUMP    = 0x0001;
        /// Stance and terrain aware aim spread.
        const REALAIMSPREAD = 0x0002;
    }
}

bitflags::bitflags! {
    /// Level-5 light weapons perks.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct Sk5LightWeapons: u32 {
        const RECOIL = 0x0001;
    }
}

bitflags::bitflags! {
    /// Level-5 battle sense perks.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct Sk5BattleSense: u32 {
        const SPRINT = 0x0001;
    }
}

/// How the aim spread reacts to view motion.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AimSpreadMode {
    /// Angular speed of the current command only.
    #[default]
    Classic,
    /// Angular speed averaged over recent commands.
    MovingAverage,
    /// View motion never widens the spread.
    Disabled,
}

impl AimSpreadMode {
    pub fn from_index(value: i32) -> Option<Self> {
        match value {
            0 => Some(AimSpreadMode::Classic),
            1 => Some(AimSpreadMode::MovingAverage),
            2 => Some(AimSpreadMode::Disabled),
            _ => None,
        }
    }

    pub fn index(self) -> i32 {
        self as i32
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("unknown variable: {0}")]
    Unknown(String),

    #[error("invalid value {value:?} for {name}")]
    Invalid { name: String, value: String },

    #[error("malformed config: {0}")]
    Parse(#[from] serde_json::Error),
}

fn flags_from_bits<'de, D, F>(deserializer: D) -> Result<F, D::Error>
where
    D: Deserializer<'de>,
    F: bitflags::Flags<Bits = u32>,
{
    u32::deserialize(deserializer).map(F::from_bits_truncate)
}

/// Every tunable a tick reads.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PmoveConfig {
    /// Emulate a fixed client frame rate by injecting its rounding error.
    pub fixed_physics: bool,
    pub fixed_physics_fps: i32,
    /// Split spans into slices of exactly `pmove_msec`.
    pub pmove_fixed: bool,
    pub pmove_msec: i32,
    #[serde(deserialize_with = "flags_from_bits")]
    pub weapons: WeaponFlags,
    #[serde(deserialize_with = "flags_from_bits")]
    pub misc: MiscFlags,
    /// Scoped weapons stay inaccurate for a moment after going prone.
    pub prone_delay: bool,
    pub aim_spread_mode: AimSpreadMode,
    pub panzer_war: bool,
    pub sniper_war: bool,
    #[serde(deserialize_with = "flags_from_bits")]
    pub sk5_lightweap: Sk5LightWeapons,
    #[serde(deserialize_with = "flags_from_bits")]
    pub sk5_battle: Sk5BattleSense,
    pub sk5_recoil_factor: f32,
    pub sk5_sprint_factor: f32,
    pub no_weapon_clips: bool,
    pub no_footsteps: bool,
    /// Longest slice a span is cut into when not running fixed.
    pub max_slice_ms: i32,
}

impl Default for PmoveConfig {
    fn default() -> Self {
        Self {
            fixed_physics: false,
            fixed_physics_fps: 125,
            pmove_fixed: false,
            pmove_msec: 8,
            weapons: WeaponFlags::empty(),
            misc: MiscFlags::empty(),
            prone_delay: false,
            aim_spread_mode: AimSpreadMode::Classic,
            panzer_war: false,
            sniper_war: false,
            sk5_lightweap: Sk5LightWeapons::empty(),
            sk5_battle: Sk5BattleSense::empty(),
            sk5_recoil_factor: 0.5,
            sk5_sprint_factor: 2.0,
            no_weapon_clips: false,
            no_footsteps: false,
            max_slice_ms: 50,
        }
    }
}

const CV_FIXED_PHYSICS: &str = "bg_fixedphysics";
const CV_FIXED_PHYSICS_FPS: &str = "bg_fixedphysicsfps";
const CV_PMOVE_FIXED: &str = "pmove_fixed";
const CV_PMOVE_MSEC: &str = "pmove_msec";
const CV_WEAPONS: &str = "bg_weapons";
const CV_MISC: &str = "bg_misc";
const CV_PRONE_DELAY: &str = "bg_proneDelay";
const CV_AIM_SPREAD: &str = "bg_aimSpread";
const CV_PANZER_WAR: &str = "bg_panzerWar";
const CV_SNIPER_WAR: &str = "bg_sniperWar";
const CV_SK5_LIGHTWEAP: &str = "bg_sk5_lightweap";
const CV_SK5_BATTLE: &str = "bg_sk5_battle";
const CV_SK5_RECOIL_FACTOR: &str = "bg_sk5_recoilFactor";
const CV_SK5_SPRINT_FACTOR: &str = "bg_sk5_sprintFactor";
const CV_NO_WEAPON_CLIPS: &str = "bg_noWeaponClips";
const CV_NO_FOOTSTEPS: &str = "bg_noFootsteps";
const CV_MAX_SLICE: &str = "bg_maxSliceMsec";

fn read_str<'a>(cvars: &'a CvarContext, name: &str) -> Result<&'a str, ConfigError> {
    cvars
        .find_var(name)
        .map(|var| var.string.as_str())
        .ok_or_else(|| ConfigError::Unknown(name.to_string()))
}

fn read_int(cvars: &CvarContext, name: &str) -> Result<i32, ConfigError> {
    let s = read_str(cvars, name)?;
    s.trim().parse::<i32>().map_err(|_| ConfigError::Invalid {
        name: name.to_string(),
        value: s.to_string(),
    })
}

fn read_float(cvars: &CvarContext, name: &str) -> Result<f32, ConfigError> {
    let s = read_str(cvars, name)?;
    s.trim().parse::<f32>().map_err(|_| ConfigError::Invalid {
        name: name.to_string(),
        value: s.to_string(),
    })
}

fn read_bits(cvars: &CvarContext, name: &str) -> Result<u32, ConfigError> {
    let value = read_int(cvars, name)?;
    u32::try_from(value).map_err(|_| ConfigError::Invalid {
        name: name.to_string(),
        value: value.to_string(),
    })
}

impl PmoveConfig {
    /// Seed a registry with the default value of every tunable.
    pub fn register_cvars(cvars: &mut CvarContext) {
        let d = PmoveConfig::default();
        let bool_str = |b: bool| if b { "1" } else { "0" };
        let sys = CvarFlags::SERVERINFO | CvarFlags::LATCH;

        cvars.get(CV_FIXED_PHYSICS, bool_str(d.fixed_physics), sys);
        cvars.get(CV_FIXED_PHYSICS_FPS, &d.fixed_physics_fps.to_string(), sys);
        cvars.get(CV_PMOVE_FIXED, bool_str(d.pmove_fixed), CvarFlags::SERVERINFO);
        cvars.get(CV_PMOVE_MSEC, &d.pmove_msec.to_string(), CvarFlags::SERVERINFO);
        cvars.get(CV_WEAPONS, &d.weapons.bits().to_string(), sys);
        cvars.get(CV_MISC, &d.misc.bits().to_string(), sys);
        cvars.get(CV_PRONE_DELAY, bool_str(d.prone_delay), sys);
        cvars.get(CV_AIM_SPREAD, &d.aim_spread_mode.index().to_string(), sys);
        cvars.get(CV_PANZER_WAR, bool_str(d.panzer_war), sys);
        cvars.get(CV_SNIPER_WAR, bool_str(d.sniper_war), sys);
        cvars.get(CV_SK5_LIGHTWEAP, &d.sk5_lightweap.bits().to_string(), sys);
        cvars.get(CV_SK5_BATTLE, &d.sk5_battle.bits().to_string(), sys);
        cvars.get(CV_SK5_RECOIL_FACTOR, &d.sk5_recoil_factor.to_string(), sys);
        cvars.get(CV_SK5_SPRINT_FACTOR, &d.sk5_sprint_factor.to_string(), sys);
        cvars.get(CV_NO_WEAPON_CLIPS, bool_str(d.no_weapon_clips), sys);
        cvars.get(CV_NO_FOOTSTEPS, bool_str(d.no_footsteps), CvarFlags::SERVERINFO);
        cvars.get(CV_MAX_SLICE, &d.max_slice_ms.to_string(), CvarFlags::SERVERINFO);
    }

    /// Build a config from a registry seeded by `register_cvars`.
    pub fn from_cvars(cvars: &CvarContext) -> Result<Self, ConfigError> {
        let aim = read_int(cvars, CV_AIM_SPREAD)?;
        let aim_spread_mode = AimSpreadMode::from_index(aim).ok_or_else(|| ConfigError::Invalid {
            name: CV_AIM_SPREAD.to_string(),
            value: aim.to_string(),
        })?;

        let config = Self {
            fixed_physics: read_int(cvars, CV_FIXED_PHYSICS)? != 0,
            fixed_physics_fps: read_int(cvars, CV_FIXED_PHYSICS_FPS)?,
            pmove_fixed: read_int(cvars, CV_PMOVE_FIXED)? != 0,
            pmove_msec: read_int(cvars, CV_PMOVE_MSEC)?,
            weapons: WeaponFlags::from_bits_truncate(read_bits(cvars, CV_WEAPONS)?),
            misc: MiscFlags::from_bits_truncate(read_bits(cvars, CV_MISC)?),
            prone_delay: read_int(cvars, CV_PRONE_DELAY)? != 0,
            aim_spread_mode,
            panzer_war: read_int(cvars, CV_PANZER_WAR)? != 0,
            sniper_war: read_int(cvars, CV_SNIPER_WAR)? != 0,
            sk5_lightweap: Sk5LightWeapons::from_bits_truncate(read_bits(cvars, CV_SK5_LIGHTWEAP)?),
            sk5_battle: Sk5BattleSense::from_bits_truncate(read_bits(cvars, CV_SK5_BATTLE)?),
            sk5_recoil_factor: read_float(cvars, CV_SK5_RECOIL_FACTOR)?,
            sk5_sprint_factor: read_float(cvars, CV_SK5_SPRINT_FACTOR)?,
            no_weapon_clips: read_int(cvars, CV_NO_WEAPON_CLIPS)? != 0,
            no_footsteps: read_int(cvars, CV_NO_FOOTSTEPS)? != 0,
            max_slice_ms: read_int(cvars, CV_MAX_SLICE)?,
        };
        config.validated()
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: PmoveConfig = serde_json::from_str(json)?;
        config.validated()
    }

    fn validated(self) -> Result<Self, ConfigError> {
        let positive = [
            (CV_FIXED_PHYSICS_FPS, self.fixed_physics_fps),
            (CV_PMOVE_MSEC, self.pmove_msec),
            (CV_MAX_SLICE, self.max_slice_ms),
        ];
        for (name, value) in positive {
            if value <= 0 {
                return Err(ConfigError::Invalid {
                    name: name.to_string(),
                    value: value.to_string(),
                });
            }
        }
        Ok(self)
    }
}
