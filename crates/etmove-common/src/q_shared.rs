// q_shared.rs — foundational types and functions shared by the movement core

use crate::weapons::{Weapon, WeaponState, NUM_WEAPONS};

// ============================================================
// Basic types
// ============================================================

pub type Vec3 = [f32; 3];

pub const VEC3_ORIGIN: Vec3 = [0.0, 0.0, 0.0];

// angle indexes
pub const PITCH: usize = 0; // up / down
pub const YAW: usize = 1; // left / right
pub const ROLL: usize = 2; // fall over

pub const MAX_GENTITIES: i32 = 1024;
pub const ENTITYNUM_NONE: i32 = MAX_GENTITIES - 1;
pub const ENTITYNUM_WORLD: i32 = MAX_GENTITIES - 2;
/// Ground entity of a player who has not touched the ground since spawning.
pub const ENTITYNUM_UNSET: i32 = -1;

pub const MAXTOUCH: usize = 32;
pub const MAX_CLIP_PLANES: usize = 5;

// ============================================================
// Player dimensions
// ============================================================

pub const DEFAULT_VIEWHEIGHT: f32 = 40.0;
pub const CROUCH_VIEWHEIGHT: f32 = 16.0;
pub const PRONE_VIEWHEIGHT: f32 = -8.0;
pub const DEAD_VIEWHEIGHT: f32 = -16.0;

pub const PLAYER_MINS: Vec3 = [-18.0, -18.0, -24.0];
pub const PLAYER_MAXS: Vec3 = [18.0, 18.0, 48.0];
pub const PLAYER_CROUCH_MAX_Z: f32 = 24.0;

/// Bounding box used for the legs while prone or playing dead.
pub const PLAYER_LEGS_PRONE_MINS: Vec3 = [-13.5, -13.5, -24.0];
pub const PLAYER_LEGS_PRONE_MAXS: Vec3 = [13.5, 13.5, -14.4];

/// Top bit of the weapon/legs/torso animation numbers; flipped each restart.
pub const ANIM_TOGGLEBIT: i32 = 1 << 9;

// ============================================================
// Degree / radian conversion
// ============================================================

pub const DEG_TO_RAD: f32 = std::f32::consts::PI / 180.0;
pub const RAD_TO_DEG: f32 = 180.0 / std::f32::consts::PI;

// ============================================================
// Angle/short conversion
// ============================================================

#[inline]
pub fn angle2short(x: f32) -> i32 {
    ((x * 65536.0 / 360.0) as i32) & 65535
}

#[inline]
pub fn short2angle(x: i16) -> f32 {
    (x as f32) * (360.0 / 65536.0)
}

/// Wrap an angle into [0, 360).
pub fn angle_normalize360(angle: f32) -> f32 {
    (360.0 / 65536.0) * (((angle * (65536.0 / 360.0)) as i32) & 65535) as f32
}

/// Wrap an angle into (-180, 180].
pub fn angle_normalize180(angle: f32) -> f32 {
    let angle = angle_normalize360(angle);
    if angle > 180.0 {
        angle - 360.0
    } else {
        angle
    }
}

/// Signed shortest difference between two angles.
pub fn angle_delta(angle1: f32, angle2: f32) -> f32 {
    angle_normalize180(angle1 - angle2)
}

// ============================================================
// MATHLIB — Vector operations
// ============================================================

#[inline]
pub fn dot_product(a: &Vec3, b: &Vec3) -> f32 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

#[inline]
pub fn vector_subtract(a: &Vec3, b: &Vec3) -> Vec3 {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

#[inline]
pub fn vector_add(a: &Vec3, b: &Vec3) -> Vec3 {
    [a[0] + b[0], a[1] + b[1], a[2] + b[2]]
}

/// veca + scale * vecb
#[inline]
pub fn vector_ma(veca: &Vec3, scale: f32, vecb: &Vec3) -> Vec3 {
    [
        veca[0] + scale * vecb[0],
        veca[1] + scale * vecb[1],
        veca[2] + scale * vecb[2],
    ]
}

#[inline]
pub fn vector_scale(v: &Vec3, scale: f32) -> Vec3 {
    [v[0] * scale, v[1] * scale, v[2] * scale]
}

pub fn vector_length(v: &Vec3) -> f32 {
    (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt()
}

/// Normalize in place, returns original length.
pub fn vector_normalize(v: &mut Vec3) -> f32 {
    let length = vector_length(v);
    if length != 0.0 {
        let ilength = 1.0 / length;
        v[0] *= ilength;
        v[1] *= ilength;
        v[2] *= ilength;
    }
    length
}

/// Normalized copy; a zero vector stays zero.
pub fn vector_normalize2(v: &Vec3) -> (Vec3, f32) {
    let mut out = *v;
    let length = vector_normalize(&mut out);
    if length == 0.0 {
        out = VEC3_ORIGIN;
    }
    (out, length)
}

pub fn cross_product(v1: &Vec3, v2: &Vec3) -> Vec3 {
    [
        v1[1] * v2[2] - v1[2] * v2[1],
        v1[2] * v2[0] - v1[0] * v2[2],
        v1[0] * v2[1] - v1[1] * v2[0],
    ]
}

/// Round each component to the nearest integer (ties to even, matching the
/// FPU default rounding mode the network snapping relies on).
pub fn snap_vector(v: &mut Vec3) {
    for c in v.iter_mut() {
        *c = c.round_ties_even();
    }
}

// ============================================================
// Angle functions
// ============================================================

/// Returns (forward, right, up) for the given euler angles.
pub fn angle_vectors(angles: &Vec3) -> (Vec3, Vec3, Vec3) {
    let angle_yaw = angles[YAW] * DEG_TO_RAD;
    let sy = angle_yaw.sin();
    let cy = angle_yaw.cos();

    let angle_pitch = angles[PITCH] * DEG_TO_RAD;
    let sp = angle_pitch.sin();
    let cp = angle_pitch.cos();

    let angle_roll = angles[ROLL] * DEG_TO_RAD;
    let sr = angle_roll.sin();
    let cr = angle_roll.cos();

    let forward = [cp * cy, cp * sy, -sp];
    let right = [
        -sr * sp * cy + -cr * -sy,
        -sr * sp * sy + -cr * cy,
        -sr * cp,
    ];
    let up = [cr * sp * cy + -sr * -sy, cr * sp * sy + -sr * cy, cr * cp];
    (forward, right, up)
}

/// Convert a direction vector to euler angles (no truncation).
pub fn vectoangles(value: &Vec3) -> Vec3 {
    let (yaw, pitch);

    if value[1] == 0.0 && value[0] == 0.0 {
        yaw = 0.0;
        pitch = if value[2] > 0.0 { 90.0 } else { 270.0 };
    } else {
        let mut y = if value[0] != 0.0 {
            value[1].atan2(value[0]) * RAD_TO_DEG
        } else if value[1] > 0.0 {
            90.0
        } else {
            270.0
        };
        if y < 0.0 {
            y += 360.0;
        }
        yaw = y;

        let forward = (value[0] * value[0] + value[1] * value[1]).sqrt();
        let mut p = value[2].atan2(forward) * RAD_TO_DEG;
        if p < 0.0 {
            p += 360.0;
        }
        pitch = p;
    }

    [-pitch, yaw, 0.0]
}

// ============================================================
// Contents and surface flags
// ============================================================

bitflags::bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct Contents: u32 {
        const SOLID         = 0x0000_0001;
        const LIGHTGRID     = 0x0000_0004;
        const LAVA          = 0x0000_0008;
        const SLIME         = 0x0000_0010;
        const WATER         = 0x0000_0020;
        const FOG           = 0x0000_0040;
        const MISSILECLIP   = 0x0000_0080;
        const ITEM          = 0x0000_0100;
        const MOVER         = 0x0000_4000;
        const AREAPORTAL    = 0x0000_8000;
        const PLAYERCLIP    = 0x0001_0000;
        const MONSTERCLIP   = 0x0002_0000;
        const TELEPORTER    = 0x0004_0000;
        const JUMPPAD       = 0x0008_0000;
        const CLUSTERPORTAL = 0x0010_0000;
        const DONOTENTER    = 0x0020_0000;
        const ORIGIN        = 0x0100_0000;
        const BODY          = 0x0200_0000;
        const CORPSE        = 0x0400_0000;
        const DETAIL        = 0x0800_0000;
        const STRUCTURAL    = 0x1000_0000;
        const TRANSLUCENT   = 0x2000_0000;
        const TRIGGER       = 0x4000_0000;
        const NODROP        = 0x8000_0000;
    }
}

pub const MASK_PLAYERSOLID: Contents = Contents::SOLID
    .union(Contents::PLAYERCLIP)
    .union(Contents::BODY);
pub const MASK_DEADSOLID: Contents = Contents::SOLID.union(Contents::PLAYERCLIP);
pub const MASK_WATER: Contents = Contents::WATER
    .union(Contents::LAVA)
    .union(Contents::SLIME);

bitflags::bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct SurfFlags: u32 {
        const NODAMAGE     = 0x0000_0001;
        const SLICK        = 0x0000_0002;
        const SKY          = 0x0000_0004;
        const LADDER       = 0x0000_0008;
        const NOIMPACT     = 0x0000_0010;
        const NOMARKS      = 0x0000_0020;
        const SPLASH       = 0x0000_0040;
        const NODRAW       = 0x0000_0080;
        const METAL        = 0x0000_1000;
        const NOSTEPS      = 0x0000_2000;
        const NONSOLID     = 0x0000_4000;
        const WOOD         = 0x0004_0000;
        const GRASS        = 0x0008_0000;
        const GRAVEL       = 0x0010_0000;
        const GLASS        = 0x0020_0000;
        const SNOW         = 0x0040_0000;
        const ROOF         = 0x0080_0000;
        const RUBBLE       = 0x0100_0000;
        const CARPET       = 0x0200_0000;
        const MONSTERSLICK = 0x0400_0000;
    }
}

// ============================================================
// Plane / trace
// ============================================================

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CPlane {
    pub normal: Vec3,
    pub dist: f32,
}

/// Result of a swept-box query against the world.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Trace {
    pub allsolid: bool,
    pub startsolid: bool,
    pub fraction: f32,
    pub endpos: Vec3,
    pub plane: CPlane,
    pub surface_flags: SurfFlags,
    pub contents: Contents,
    pub entity_num: i32,
}

impl Default for Trace {
    fn default() -> Self {
        Self {
            allsolid: false,
            startsolid: false,
            fraction: 1.0,
            endpos: VEC3_ORIGIN,
            plane: CPlane::default(),
            surface_flags: SurfFlags::empty(),
            contents: Contents::empty(),
            entity_num: ENTITYNUM_NONE,
        }
    }
}

// ============================================================
// Player movement types
// ============================================================

/// Fixed emplacement operated through the player's fire button.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HeavyWeaponUse {
    #[default]
    None,
    Mg42,
    AaGun,
}

/// Ordering matters: everything at or past `Dead` is treated as "no control".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
#[repr(i32)]
pub enum PmType {
    #[default]
    Normal = 0,
    Noclip,
    Spectator,
    Dead,
    Freeze,
    Intermission,
    PlayDead,
}

bitflags::bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct PmFlags: i32 {
        const DUCKED          = 0x0001;
        const JUMP_HELD       = 0x0002;
        const LADDER          = 0x0004;
        const BACKWARDS_JUMP  = 0x0008;
        const BACKWARDS_RUN   = 0x0010;
        const TIME_LAND       = 0x0020;
        const TIME_KNOCKBACK  = 0x0040;
        const TIME_WATERJUMP  = 0x0100;
        const RESPAWNED       = 0x0200;
        const FLAILING        = 0x0800;
        const FOLLOW          = 0x1000;
        const TIME_LOAD       = 0x2000;
        const LIMBO           = 0x4000;
        const TIME_LOCKPLAYER = 0x8000;
        const DOUBLEJUMPING   = 0x1_0000;
    }
}

impl PmFlags {
    pub const ALL_TIMES: PmFlags = PmFlags::TIME_WATERJUMP
        .union(PmFlags::TIME_LAND)
        .union(PmFlags::TIME_KNOCKBACK)
        .union(PmFlags::TIME_LOCKPLAYER);
}

bitflags::bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct EFlags: u32 {
        const DEAD         = 0x0000_0001;
        const CROUCHING    = 0x0000_0010;
        const MG42_ACTIVE  = 0x0000_0020;
        const FIRING       = 0x0000_0080;
        const BREATH       = 0x0000_1000;
        const TALK         = 0x0000_4000;
        const ZOOMING      = 0x0010_0000;
        const PRONE        = 0x0020_0000;
        const PRONE_MOVING = 0x0040_0000;
        const AAGUN_ACTIVE = 0x0080_0000;
        const MOUNTEDTANK  = 0x0100_0000;
        const PLAYDEAD     = 0x0200_0000;
    }
}

impl EFlags {
    /// Player is operating a fixed emplacement of some kind.
    pub fn mounted(self) -> bool {
        self.intersects(EFlags::MG42_ACTIVE | EFlags::AAGUN_ACTIVE | EFlags::MOUNTEDTANK)
    }
}

bitflags::bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct Buttons: u8 {
        const ATTACK  = 0x01;
        const TALK    = 0x02;
        const ACTIVATE = 0x40;
        const WALKING = 0x10;
        const SPRINT  = 0x20;
    }
}

bitflags::bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct WButtons: u8 {
        const ATTACK2   = 0x01;
        const ZOOM      = 0x02;
        const RELOAD    = 0x08;
        const LEANLEFT  = 0x10;
        const LEANRIGHT = 0x20;
        const PRONE     = 0x80;
    }
}

/// Direction of a double-tapped movement key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DoubleTap {
    #[default]
    None,
    MoveLeft,
    MoveRight,
    MoveForward,
    MoveBack,
    LeanLeft,
    LeanRight,
    Up,
}

/// One input sample. Angles are 16-bit shorts as sent on the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct UserCmd {
    pub server_time: i32,
    pub angles: [i32; 3],
    pub buttons: Buttons,
    pub wbuttons: WButtons,
    pub weapon: Weapon,
    pub forwardmove: i8,
    pub rightmove: i8,
    pub upmove: i8,
    pub double_tap: DoubleTap,
}

// ============================================================
// Classes, skills, powerups
// ============================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlayerClass {
    #[default]
    Soldier,
    Medic,
    Engineer,
    FieldOps,
    CovertOps,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(usize)]
pub enum Skill {
    BattleSense = 0,
    ExplosivesAndConstruction,
    FirstAid,
    Signals,
    LightWeapons,
    HeavyWeapons,
    MilitaryIntelligenceAndScopedWeapons,
}

pub const NUM_SKILLS: usize = 7;

/// Read-only character data supplied by the owning simulation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CharacterInfo {
    pub skill: [i32; NUM_SKILLS],
    pub soldier_charge_time: i32,
    pub medic_charge_time: i32,
    pub engineer_charge_time: i32,
    pub lt_charge_time: i32,
    pub covertops_charge_time: i32,
}

impl Default for CharacterInfo {
    fn default() -> Self {
        Self {
            skill: [0; NUM_SKILLS],
            soldier_charge_time: 20000,
            medic_charge_time: 45000,
            engineer_charge_time: 30000,
            lt_charge_time: 40000,
            covertops_charge_time: 30000,
        }
    }
}

impl CharacterInfo {
    #[inline]
    pub fn level(&self, skill: Skill) -> i32 {
        self.skill[skill as usize]
    }

    /// Full charge time for the given class.
    pub fn charge_time(&self, class: PlayerClass) -> i32 {
        match class {
            PlayerClass::Soldier => self.soldier_charge_time,
            PlayerClass::Medic => self.medic_charge_time,
            PlayerClass::Engineer => self.engineer_charge_time,
            PlayerClass::FieldOps => self.lt_charge_time,
            PlayerClass::CovertOps => self.covertops_charge_time,
        }
    }
}

/// Staged reload of the pump shotgun.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum M97ReloadState {
    #[default]
    Begin,
    BeginPump,
    AfterPump,
    Loop,
}

// ============================================================
// Player state
// ============================================================

/// Network-relevant player state. Mutated only by the movement core.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerState {
    pub command_time: i32,
    pub pm_type: PmType,
    pub pm_flags: PmFlags,
    pub pm_time: i32,
    pub bob_cycle: i32,

    pub origin: Vec3,
    pub velocity: Vec3,
    pub viewangles: Vec3,
    pub delta_angles: [i32; 3],
    pub viewheight: i32,

    pub gravity: i32,
    pub speed: i32,
    pub friction: f32,
    pub run_speed_scale: f32,
    pub sprint_speed_scale: f32,
    pub crouch_speed_scale: f32,

    pub mins: Vec3,
    pub maxs: Vec3,
    pub crouch_max_z: f32,
    pub stand_view_height: f32,
    pub crouch_view_height: f32,
    pub dead_view_height: f32,

    pub ground_entity_num: i32,
    pub movement_dir: i32,
    pub e_flags: EFlags,
    pub client_num: i32,
    pub legs_timer: i32,
    pub torso_timer: i32,
    pub jump_time: i32,

    pub weapon: Weapon,
    pub next_weapon: Weapon,
    pub weapon_state: WeaponState,
    pub weapon_time: i32,
    pub weapon_delay: i32,
    pub grenade_time_left: i32,
    pub weap_anim: i32,
    /// Bit per `Weapon` the player carries.
    pub weapons: u64,
    pub ammo: [i32; NUM_WEAPONS],
    pub ammoclip: [i32; NUM_WEAPONS],
    pub weap_heat: [i32; NUM_WEAPONS],
    pub cur_weap_heat: i32,
    pub aim_spread_scale: i32,
    pub aim_spread_scale_float: f32,
    pub leanf: f32,
    pub class_weapon_time: i32,
    pub last_fire_time: i32,
    pub m97_reload: M97ReloadState,

    pub health: i32,
    pub player_class: PlayerClass,
    pub dead_yaw: i32,
    pub has_binoculars: bool,
    /// Fixed emplacement the player is manning, if any.
    pub hweapon_use: HeavyWeaponUse,
    pub team_spectator: bool,
    pub sprint_exert_time: i32,
    pub powerup_adrenaline: i32,
    pub powerup_nofatigue: i32,
    pub pmove_framecount: i32,
}

impl Default for PlayerState {
    fn default() -> Self {
        Self {
            command_time: 0,
            pm_type: PmType::Normal,
            pm_flags: PmFlags::empty(),
            pm_time: 0,
            bob_cycle: 0,
            origin: VEC3_ORIGIN,
            velocity: VEC3_ORIGIN,
            viewangles: VEC3_ORIGIN,
            delta_angles: [0; 3],
            viewheight: DEFAULT_VIEWHEIGHT as i32,
            gravity: 800,
            speed: 320,
            friction: 1.0,
            run_speed_scale: 0.8,
            sprint_speed_scale: 1.1,
            crouch_speed_scale: 0.25,
            mins: PLAYER_MINS,
            maxs: PLAYER_MAXS,
            crouch_max_z: PLAYER_CROUCH_MAX_Z,
            stand_view_height: DEFAULT_VIEWHEIGHT,
            crouch_view_height: CROUCH_VIEWHEIGHT,
            dead_view_height: DEAD_VIEWHEIGHT,
            ground_entity_num: ENTITYNUM_NONE,
            movement_dir: 0,
            e_flags: EFlags::empty(),
            client_num: 0,
            legs_timer: 0,
            torso_timer: 0,
            jump_time: 0,
            weapon: Weapon::None,
            next_weapon: Weapon::None,
            weapon_state: WeaponState::Ready,
            weapon_time: 0,
            weapon_delay: 0,
            grenade_time_left: 0,
            weap_anim: 0,
            weapons: 0,
            ammo: [0; NUM_WEAPONS],
            ammoclip: [0; NUM_WEAPONS],
            weap_heat: [0; NUM_WEAPONS],
            cur_weap_heat: 0,
            aim_spread_scale: 0,
            aim_spread_scale_float: 0.0,
            leanf: 0.0,
            class_weapon_time: 0,
            last_fire_time: 0,
            m97_reload: M97ReloadState::Begin,
            health: 100,
            player_class: PlayerClass::Soldier,
            dead_yaw: 0,
            has_binoculars: false,
            hweapon_use: HeavyWeaponUse::None,
            team_spectator: false,
            sprint_exert_time: 0,
            powerup_adrenaline: 0,
            powerup_nofatigue: 0,
            pmove_framecount: 0,
        }
    }
}

impl PlayerState {
    #[inline]
    pub fn has_weapon(&self, weapon: Weapon) -> bool {
        self.weapons & (1u64 << weapon as u32) != 0
    }

    pub fn give_weapon(&mut self, weapon: Weapon) {
        self.weapons |= 1u64 << weapon as u32;
    }

    pub fn take_weapon(&mut self, weapon: Weapon) {
        self.weapons &= !(1u64 << weapon as u32);
    }

    #[inline]
    pub fn on_ground(&self) -> bool {
        self.ground_entity_num != ENTITYNUM_NONE
    }
}

/// Externally visible form of `PlayerState`; the only place view angles are
/// reduced to 16-bit shorts.
#[derive(Debug, Clone, PartialEq)]
pub struct NetPlayerState {
    pub command_time: i32,
    pub pm_type: PmType,
    pub pm_flags: PmFlags,
    pub pm_time: i32,
    pub origin: Vec3,
    pub velocity: Vec3,
    pub viewangles: [u16; 3],
    pub delta_angles: [i32; 3],
    pub viewheight: i32,
    pub ground_entity_num: i32,
    pub e_flags: EFlags,
    pub weapon: Weapon,
    pub weapon_state: WeaponState,
    pub weapon_time: i32,
    pub aim_spread_scale: i32,
    pub cur_weap_heat: i32,
    pub leanf: f32,
}

impl From<&PlayerState> for NetPlayerState {
    fn from(ps: &PlayerState) -> Self {
        Self {
            command_time: ps.command_time,
            pm_type: ps.pm_type,
            pm_flags: ps.pm_flags,
            pm_time: ps.pm_time,
            origin: ps.origin,
            velocity: ps.velocity,
            viewangles: ps.viewangles.map(|a| angle2short(a) as u16),
            delta_angles: ps.delta_angles,
            viewheight: ps.viewheight,
            ground_entity_num: ps.ground_entity_num,
            e_flags: ps.e_flags,
            weapon: ps.weapon,
            weapon_state: ps.weapon_state,
            weapon_time: ps.weapon_time,
            aim_spread_scale: ps.aim_spread_scale,
            cur_weap_heat: ps.cur_weap_heat,
            leanf: ps.leanf,
        }
    }
}

impl NetPlayerState {
    /// Copy the transmitted fields back over a predicted state.
    pub fn apply_to(&self, ps: &mut PlayerState) {
        ps.command_time = self.command_time;
        ps.pm_type = self.pm_type;
        ps.pm_flags = self.pm_flags;
        ps.pm_time = self.pm_time;
        ps.origin = self.origin;
        ps.velocity = self.velocity;
        ps.viewangles = self.viewangles.map(|a| short2angle(a as i16));
        ps.delta_angles = self.delta_angles;
        ps.viewheight = self.viewheight;
        ps.ground_entity_num = self.ground_entity_num;
        ps.e_flags = self.e_flags;
        ps.weapon = self.weapon;
        ps.weapon_state = self.weapon_state;
        ps.weapon_time = self.weapon_time;
        ps.aim_spread_scale = self.aim_spread_scale;
        ps.cur_weap_heat = self.cur_weap_heat;
        ps.leanf = self.leanf;
    }
}

// ============================================================
// Per-player auxiliary state (not sent every frame)
// ============================================================

bitflags::bitflags! {
    /// Which side-arms were last used in their silenced form.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct SideArmFlags: u8 {
        const SILENCED = 0x01;
        const RIFLE_LAUNCHER = 0x02;
    }
}

pub const AIMSPREAD_MAX_HISTORY: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AimSpreadHistory {
    pub angle: [f32; AIMSPREAD_MAX_HISTORY],
    pub time: [i32; AIMSPREAD_MAX_HISTORY],
    pub head: usize,
}

/// Record behind one charge-and-throw machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChargeRecord {
    pub state: ChargeState,
    pub state_alarm: i32,
    pub depressed_time: i32,
    pub arming_index: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChargeState {
    #[default]
    Idle,
    Arming,
    Throwing,
    Release,
    Clicked,
}

/// Per-player state that must survive between ticks but is not part of the
/// networked player state.
#[derive(Debug, Clone, PartialEq)]
pub struct PmoveExt {
    pub jump_time: i32,
    pub dodge_time: i32,
    pub dtmove: DoubleTap,
    pub sprint_time: i32,
    pub prone_time: i32,
    pub prone_ground_time: i32,
    pub prone_legs_offset: f32,
    pub was_shoved: bool,

    pub weap_recoil_time: i32,
    pub weap_recoil_duration: i32,
    pub weap_recoil_yaw: f32,
    pub weap_recoil_pitch: f32,
    pub last_recoil_delta_time: i32,

    pub released_fire: bool,
    pub auto_reload: bool,
    pub silenced_side_arm: SideArmFlags,
    pub weap_anim_timer: i32,
    pub m97_reload_interrupt: bool,
    pub airleft: i32,
    /// Surface under the player as of the last tick.
    pub ground_surface: SurfFlags,

    pub mounted_weapon_angles: Vec3,
    pub centerangles: Vec3,
    pub harc: f32,
    pub varc: f32,

    pub aim_spread: AimSpreadHistory,

    pub a2_alt: ChargeRecord,
    pub a2_molotov: ChargeRecord,
    pub a2_knife: ChargeRecord,
}

impl Default for PmoveExt {
    fn default() -> Self {
        Self {
            jump_time: 0,
            dodge_time: 0,
            dtmove: DoubleTap::None,
            sprint_time: 20000,
            prone_time: 0,
            prone_ground_time: 0,
            prone_legs_offset: 0.0,
            was_shoved: false,
            weap_recoil_time: 0,
            weap_recoil_duration: 0,
            weap_recoil_yaw: 0.0,
            weap_recoil_pitch: 0.0,
            last_recoil_delta_time: 0,
            released_fire: false,
            auto_reload: true,
            silenced_side_arm: SideArmFlags::empty(),
            weap_anim_timer: 0,
            m97_reload_interrupt: false,
            airleft: 0,
            ground_surface: SurfFlags::empty(),
            mounted_weapon_angles: VEC3_ORIGIN,
            centerangles: VEC3_ORIGIN,
            harc: 0.0,
            varc: 0.0,
            aim_spread: AimSpreadHistory::default(),
            a2_alt: ChargeRecord::default(),
            a2_molotov: ChargeRecord::default(),
            a2_knife: ChargeRecord::default(),
        }
    }
}

// ============================================================
// Tests
// ============================================================
