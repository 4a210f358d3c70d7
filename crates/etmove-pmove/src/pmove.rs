// pmove.rs — tick context, world callbacks and the simulation entry points

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{trace, warn};

use etmove_common::cvar::{PmoveConfig, Sk5BattleSense};
use etmove_common::events::{AnimScriptEvent, EntityEvent, EventSink, MoveAnim, ScriptTrigger};
use etmove_common::q_shared::{
    angle_vectors, snap_vector, vector_scale, Buttons, CharacterInfo, ChargeState, Contents,
    EFlags, HeavyWeaponUse, PlayerClass, PlayerState, PmFlags, PmType, PmoveExt, SideArmFlags, Skill,
    SurfFlags, Trace, UserCmd, Vec3, WButtons, DEFAULT_VIEWHEIGHT, ENTITYNUM_WORLD,
    MASK_PLAYERSOLID, MAXTOUCH, VEC3_ORIGIN,
};
use etmove_common::weapons::{Weapon, WeaponClass, WeaponDef, WeaponState, WeaponTable};

use crate::error::PmoveError;

// ============================================================
// Constants
// ============================================================

pub(crate) const STEPSIZE: f32 = 18.0;
pub(crate) const OVERCLIP: f32 = 1.001;
pub(crate) const MIN_WALK_NORMAL: f32 = 0.7;
pub(crate) const JUMP_VELOCITY: f32 = 270.0;

/// Full stamina bar, in milliseconds of sprinting.
pub const SPRINTTIME: i32 = 20000;

const MAX_FRAME_MSEC: i32 = 200;
const MAX_CATCHUP_MSEC: i32 = 1000;
const LOAD_CATCHUP_MSEC: i32 = 50;
const PMOVE_FRAMECOUNT_BITS: i32 = 6;

// error injected per axis when emulating fixed-rate clients
const FIXED_PHYSICS_ERROR: Vec3 = [0.22, 0.22, 0.4];

// ============================================================
// Pmove local state — zeroed before each tick
// ============================================================

#[derive(Clone, Default)]
pub(crate) struct PmLocal {
    pub(crate) forward: Vec3,
    pub(crate) right: Vec3,
    pub(crate) up: Vec3,
    pub(crate) frametime: f32,
    pub(crate) msec: i32,

    pub(crate) walking: bool,
    pub(crate) ground_plane: bool,
    pub(crate) ground_trace: Trace,

    pub(crate) previous_origin: Vec3,
    pub(crate) previous_velocity: Vec3,
    pub(crate) previous_waterlevel: i32,

    pub(crate) ladder: bool,
    pub(crate) ladder_forward: bool,
    pub(crate) ladder_vec: Vec3,
}

// ============================================================
// Callbacks trait — the world queries the host provides
// ============================================================

/// Collision queries against the world snapshot the tick runs in.
pub trait PmoveCallbacks {
    /// Sweep a box from `start` to `end`, ignoring `pass_entity`.
    fn trace(
        &self,
        start: &Vec3,
        mins: &Vec3,
        maxs: &Vec3,
        end: &Vec3,
        pass_entity: i32,
        mask: Contents,
    ) -> Trace;

    fn pointcontents(&self, point: &Vec3, pass_entity: i32) -> Contents;
}

// ============================================================
// Pmove — one player's inputs and outputs for a call
// ============================================================

pub struct Pmove<'a> {
    // state (in / out)
    pub ps: &'a mut PlayerState,
    pub pmext: &'a mut PmoveExt,

    // read-only collaborators
    pub character: &'a CharacterInfo,
    pub weapons: &'a WeaponTable,
    pub config: &'a PmoveConfig,

    // command (in)
    pub cmd: UserCmd,
    /// Previous command, used by the aim spread.
    pub oldcmd: UserCmd,
    pub tracemask: Contents,

    // results (out)
    pub touchents: Vec<i32>,
    pub mins: Vec3,
    pub maxs: Vec3,
    pub watertype: Contents,
    pub waterlevel: i32,
    pub xyspeed: f32,
}

impl<'a> Pmove<'a> {
    pub fn new(
        ps: &'a mut PlayerState,
        pmext: &'a mut PmoveExt,
        character: &'a CharacterInfo,
        weapons: &'a WeaponTable,
        config: &'a PmoveConfig,
        cmd: UserCmd,
    ) -> Self {
        Self {
            ps,
            pmext,
            character,
            weapons,
            config,
            cmd,
            oldcmd: UserCmd::default(),
            tracemask: MASK_PLAYERSOLID,
            touchents: Vec::with_capacity(MAXTOUCH),
            mins: VEC3_ORIGIN,
            maxs: VEC3_ORIGIN,
            watertype: Contents::empty(),
            waterlevel: 0,
            xyspeed: 0.0,
        }
    }
}

// ============================================================
// Pmove context — holds all state for one tick
// ============================================================

pub(crate) struct PmoveContext<'a, 'p, C: PmoveCallbacks, S: EventSink> {
    pub(crate) pm: &'a mut Pmove<'p>,
    pub(crate) pml: PmLocal,
    pub(crate) cb: &'a C,
    pub(crate) sink: &'a mut S,
    pub(crate) rng: ChaCha8Rng,
}

/// Jitter source for one tick. Seeded from data both client and server
/// share, so predicted recoil matches the authoritative one.
pub(crate) fn tick_rng(server_time: i32, client_num: i32) -> ChaCha8Rng {
    let seed = ((server_time as u32 as u64) << 32) | client_num as u32 as u64;
    ChaCha8Rng::seed_from_u64(seed)
}

impl<'a, 'p, C: PmoveCallbacks, S: EventSink> PmoveContext<'a, 'p, C, S> {
    pub(crate) fn new(pm: &'a mut Pmove<'p>, cb: &'a C, sink: &'a mut S) -> Self {
        let rng = tick_rng(pm.cmd.server_time, pm.ps.client_num);
        Self {
            pm,
            pml: PmLocal::default(),
            cb,
            sink,
            rng,
        }
    }

    // --------------------------------------------------------
    // Small accessors
    // --------------------------------------------------------

    #[inline]
    pub(crate) fn now(&self) -> i32 {
        self.pm.cmd.server_time
    }

    #[inline]
    pub(crate) fn def(&self, weapon: Weapon) -> WeaponDef {
        *self.pm.weapons.get(weapon)
    }

    #[inline]
    pub(crate) fn skill(&self, skill: Skill) -> i32 {
        self.pm.character.level(skill)
    }

    #[inline]
    pub(crate) fn eflag(&self, flag: EFlags) -> bool {
        self.pm.ps.e_flags.intersects(flag)
    }

    #[inline]
    pub(crate) fn pmflag(&self, flag: PmFlags) -> bool {
        self.pm.ps.pm_flags.intersects(flag)
    }

    // --------------------------------------------------------
    // Emission
    // --------------------------------------------------------

    pub(crate) fn add_event(&mut self, event: EntityEvent) {
        self.sink.add_event(event, 0);
    }

    pub(crate) fn add_event_ext(&mut self, event: EntityEvent, parm: i32) {
        self.sink.add_event(event, parm);
    }

    pub(crate) fn script_event(&mut self, event: AnimScriptEvent, is_continue: bool, force: bool) {
        self.sink.script_event(ScriptTrigger {
            event,
            is_continue,
            force,
        });
    }

    /// Script event picking the prone variant when lying down.
    pub(crate) fn stance_script_event(
        &mut self,
        standing: AnimScriptEvent,
        prone: AnimScriptEvent,
        is_continue: bool,
        force: bool,
    ) {
        let event = if self.eflag(EFlags::PRONE) { prone } else { standing };
        self.script_event(event, is_continue, force);
    }

    pub(crate) fn move_anim(&mut self, anim: MoveAnim) {
        self.sink.move_anim(anim);
    }

    pub(crate) fn add_touch_ent(&mut self, entity_num: i32) {
        if entity_num == ENTITYNUM_WORLD {
            return;
        }
        if self.pm.touchents.len() == MAXTOUCH {
            return;
        }
        if self.pm.touchents.contains(&entity_num) {
            return;
        }
        self.pm.touchents.push(entity_num);
    }

    // --------------------------------------------------------
    // PM_DropTimers
    // --------------------------------------------------------
    pub(crate) fn drop_timers(&mut self) {
        let msec = self.pml.msec;
        let ps = &mut *self.pm.ps;

        // misc timing counter
        if ps.pm_time != 0 {
            if msec >= ps.pm_time {
                ps.pm_flags.remove(PmFlags::ALL_TIMES);
                ps.pm_time = 0;
            } else {
                ps.pm_time -= msec;
            }
        }

        // animation counters
        if ps.legs_timer > 0 {
            ps.legs_timer = (ps.legs_timer - msec).max(0);
        }
        if ps.torso_timer > 0 {
            ps.torso_timer = (ps.torso_timer - msec).max(0);
        }

        // first person weapon counter
        let pmext = &mut *self.pm.pmext;
        if pmext.weap_anim_timer > 0 {
            pmext.weap_anim_timer = (pmext.weap_anim_timer - msec).max(0);
        }
    }

    // --------------------------------------------------------
    // PM_Sprint
    // --------------------------------------------------------
    pub(crate) fn sprint(&mut self) {
        let frametime = self.pml.frametime;
        let cmd = self.pm.cmd;
        let exerting = cmd.buttons.contains(Buttons::SPRINT)
            && (cmd.forwardmove != 0 || cmd.rightmove != 0)
            && !self.pmflag(PmFlags::DUCKED)
            && !self.eflag(EFlags::PRONE);

        let battle_sense = self.skill(Skill::BattleSense);
        let sk5_sprint =
            battle_sense >= 5 && self.pm.config.sk5_battle.contains(Sk5BattleSense::SPRINT);
        let sk5_factor = self.pm.config.sk5_sprint_factor;

        let ps = &mut *self.pm.ps;
        let pmext = &mut *self.pm.pmext;

        if exerting {
            if ps.powerup_adrenaline != 0 {
                pmext.sprint_time = SPRINTTIME;
            } else if ps.powerup_nofatigue != 0 {
                // the powerup drains first, stamina keeps recharging
                ps.powerup_nofatigue = (ps.powerup_nofatigue - 50).max(0);
                pmext.sprint_time = (pmext.sprint_time + 10).min(SPRINTTIME);
            } else {
                pmext.sprint_time -= (5000.0 * frametime) as i32;
            }

            pmext.sprint_time = pmext.sprint_time.max(0);

            if ps.sprint_exert_time == 0 {
                ps.sprint_exert_time = 1;
            }
        } else {
            if ps.powerup_adrenaline != 0 {
                pmext.sprint_time = SPRINTTIME;
            } else if ps.powerup_nofatigue != 0 {
                pmext.sprint_time += 10;
            } else {
                let rechargebase: i32 = if sk5_sprint {
                    (500.0 * sk5_factor) as i32
                } else if battle_sense >= 2 {
                    (500.0 * 1.6) as i32
                } else {
                    500
                };

                pmext.sprint_time += (rechargebase as f32 * frametime) as i32;
                // top quarter of the bar refills twice as fast
                if pmext.sprint_time > 5000 {
                    pmext.sprint_time += (rechargebase as f32 * frametime) as i32;
                }
            }

            pmext.sprint_time = pmext.sprint_time.min(SPRINTTIME);
            ps.sprint_exert_time = 0;
        }
    }

    // --------------------------------------------------------
    // Zoom and firing flags
    // --------------------------------------------------------
    fn update_zoom_and_firing(&mut self) {
        let cmd = self.pm.cmd;
        let weapon = self.pm.ps.weapon;
        let def = self.def(weapon);

        self.pm.ps.e_flags.remove(EFlags::FIRING | EFlags::ZOOMING);

        if cmd.wbuttons.contains(WButtons::ZOOM)
            && self.pm.ps.health >= 0
            && self.pm.ps.weapon_delay == 0
            && !self.eflag(EFlags::PLAYDEAD)
        {
            if self.pm.ps.has_binoculars
                && !def.class.contains(WeaponClass::SCOPED)
                && !self.pm.ps.e_flags.mounted()
                && weapon != Weapon::MobileMg42Set
                && weapon != Weapon::MortarSet
                && self.pm.pmext.a2_knife.state == ChargeState::Idle
            {
                self.pm.ps.e_flags.insert(EFlags::ZOOMING);
            }

            // no binoculars with a live grenade in hand
            if self.pm.ps.grenade_time_left > 0
                && (def.class.contains(WeaponClass::FUSED) || weapon == Weapon::Molotov)
            {
                self.pm.ps.e_flags.remove(EFlags::ZOOMING);
            }
        }

        if !self.pmflag(PmFlags::RESPAWNED)
            && self.pm.ps.pm_type != PmType::Intermission
            && self.weapon_ammo_available(weapon) != 0
            && !self.eflag(EFlags::ZOOMING)
            && self.pm.ps.leanf == 0.0
            && matches!(self.pm.ps.weapon_state, WeaponState::Ready | WeaponState::Firing)
            && cmd.buttons.contains(Buttons::ATTACK)
            && !cmd.buttons.contains(Buttons::TALK)
        {
            self.pm.ps.e_flags.insert(EFlags::FIRING);
        }
    }

    // --------------------------------------------------------
    // Fixed physics rounding
    // --------------------------------------------------------
    fn snap_velocity(&mut self) {
        let config = self.pm.config;
        let velocity = &mut self.pm.ps.velocity;

        if !config.fixed_physics {
            snap_vector(velocity);
            return;
        }

        // inject the rounding error a client at the reference frame rate
        // would accumulate
        let fac = self.pml.msec as f32 / 1000.0 * config.fixed_physics_fps as f32;
        for i in 0..3 {
            if velocity[i].abs() < 0.5 {
                velocity[i] = 0.0;
                continue;
            }

            let mut delta = velocity[i] - self.pml.previous_velocity[i];
            // gravity always pulls the same way
            if i == 2 {
                delta = -delta;
            }

            if delta <= -0.5 / fac {
                velocity[i] -= FIXED_PHYSICS_ERROR[i] * fac;
            } else if delta >= 0.5 / fac {
                velocity[i] += FIXED_PHYSICS_ERROR[i] * fac;
            }
        }

        // 1/64 unit is plenty of precision
        let mut scaled = vector_scale(velocity, 64.0);
        snap_vector(&mut scaled);
        *velocity = vector_scale(&scaled, 1.0 / 64.0);
    }

    // --------------------------------------------------------
    // PmoveSingle
    // --------------------------------------------------------
    pub(crate) fn execute(&mut self) -> Result<(), PmoveError> {
        // clear results
        self.pm.touchents.clear();
        self.pm.watertype = Contents::empty();
        self.pm.waterlevel = 0;

        if self.pm.ps.health <= 0 {
            // corpses can fly through bodies
            self.pm.tracemask.remove(Contents::BODY);
            self.pm.ps.e_flags.remove(EFlags::ZOOMING);
        }

        // running clears the walk button so it can't silence footsteps
        if self.pm.cmd.forwardmove.unsigned_abs() > 64 || self.pm.cmd.rightmove.unsigned_abs() > 64 {
            self.pm.cmd.buttons.remove(Buttons::WALKING);
        }

        if self.pm.cmd.buttons.contains(Buttons::TALK) {
            self.pm.ps.e_flags.insert(EFlags::TALK);
        } else {
            self.pm.ps.e_flags.remove(EFlags::TALK);
        }

        self.update_zoom_and_firing();

        if self.pmflag(PmFlags::RESPAWNED) && self.pm.ps.player_class == PlayerClass::CovertOps {
            self.pm.pmext.silenced_side_arm.insert(SideArmFlags::SILENCED);
        }

        // respawn protection ends once attack is released
        if self.pm.ps.health > 0 && !self.pm.cmd.buttons.contains(Buttons::ATTACK) {
            self.pm.ps.pm_flags.remove(PmFlags::RESPAWNED);
        }

        // talking locks out every other input
        if self.pm.cmd.buttons.contains(Buttons::TALK) {
            let cmd = &mut self.pm.cmd;
            cmd.buttons = Buttons::TALK;
            cmd.wbuttons = WButtons::empty();
            cmd.forwardmove = 0;
            cmd.rightmove = 0;
            cmd.upmove = 0;
            cmd.double_tap = Default::default();
        }

        // no movement while manning an emplacement
        if self.pm.ps.hweapon_use != HeavyWeaponUse::None {
            self.zero_move_axes();
        }

        self.pml = PmLocal::default();

        // determine the time
        self.pml.msec = (self.pm.cmd.server_time - self.pm.ps.command_time).clamp(1, MAX_FRAME_MSEC);
        self.pm.ps.command_time = self.pm.cmd.server_time;
        self.pml.previous_origin = self.pm.ps.origin;
        self.pml.previous_velocity = self.pm.ps.velocity;
        self.pml.frametime = self.pml.msec as f32 * 0.001;

        if self.pm.ps.pm_type != PmType::Freeze && !self.pmflag(PmFlags::LIMBO) {
            self.update_view_angles();
        }

        let (forward, right, up) = angle_vectors(&self.pm.ps.viewangles);
        self.pml.forward = forward;
        self.pml.right = right;
        self.pml.up = up;

        if self.pm.cmd.upmove < 10 {
            self.pm.ps.pm_flags.remove(PmFlags::JUMP_HELD);
        }

        // backpedal animations
        if self.pm.cmd.forwardmove < 0 {
            self.pm.ps.pm_flags.insert(PmFlags::BACKWARDS_RUN);
        } else if self.pm.cmd.forwardmove > 0
            || (self.pm.cmd.forwardmove == 0 && self.pm.cmd.rightmove != 0)
        {
            self.pm.ps.pm_flags.remove(PmFlags::BACKWARDS_RUN);
        }

        if self.pm.ps.pm_type >= PmType::Dead
            || self.eflag(EFlags::PLAYDEAD)
            || self.pmflag(PmFlags::LIMBO | PmFlags::TIME_LOCKPLAYER)
        {
            self.zero_move_axes();
        }

        match self.pm.ps.pm_type {
            PmType::Spectator => {
                self.check_duck();
                self.fly_move();
                self.drop_timers();
                return Ok(());
            }
            PmType::Noclip => {
                self.noclip_move();
                self.drop_timers();
                return Ok(());
            }
            PmType::Freeze | PmType::Intermission => return Ok(()),
            _ => {}
        }

        // a set mortar still falls but cannot walk
        if self.pm.ps.weapon == Weapon::MortarSet && self.pm.ps.pm_type == PmType::Normal {
            self.zero_move_axes();
        }

        self.set_water_level();
        self.pml.previous_waterlevel = self.pm.waterlevel;

        if !self.check_play_dead() && !self.check_prone() {
            self.check_duck();
        }

        self.ground_trace();

        if self.pm.ps.pm_type == PmType::Dead || self.eflag(EFlags::PLAYDEAD) {
            self.dead_move();
            if self.pm.ps.weapon == Weapon::MortarSet {
                self.pm.ps.weapon = Weapon::Mortar;
            }
        } else {
            if self.pm.ps.weapon == Weapon::MobileMg42Set && !self.eflag(EFlags::PRONE) {
                self.begin_weapon_change(Weapon::MobileMg42Set, Weapon::MobileMg42, false);
            }
            if self.pm.ps.weapon == Weapon::SatchelDet
                && self.pm.ps.ammoclip[Weapon::SatchelDet.index()] == 0
            {
                self.begin_weapon_change(Weapon::SatchelDet, Weapon::Satchel, true);
            }
        }

        self.check_ladder_move();
        self.drop_timers();
        self.dispatch_move();

        if self.eflag(EFlags::MOUNTEDTANK) {
            self.pm.ps.velocity = VEC3_ORIGIN;
            self.pm.ps.viewheight = DEFAULT_VIEWHEIGHT as i32;
            self.move_anim(MoveAnim::Idle);
        }

        self.sprint();

        // set groundentity, watertype, and waterlevel for the new origin
        self.ground_trace();
        self.set_water_level();

        self.weapon()?;

        self.footsteps();
        self.water_events();

        self.snap_velocity();

        self.pm.pmext.ground_surface = self.pml.ground_trace.surface_flags;
        Ok(())
    }

    fn zero_move_axes(&mut self) {
        let cmd = &mut self.pm.cmd;
        cmd.forwardmove = 0;
        cmd.rightmove = 0;
        cmd.upmove = 0;
    }
}

// ============================================================
// Public entry points
// ============================================================

/// Run exactly one tick for `pm.cmd`.
pub fn pmove_single<C: PmoveCallbacks, S: EventSink>(
    pm: &mut Pmove<'_>,
    callbacks: &C,
    sink: &mut S,
) -> Result<(), PmoveError> {
    let mut ctx = PmoveContext::new(pm, callbacks, sink);
    ctx.execute()
}

/// Advance `pm.ps.command_time` to `pm.cmd.server_time`, cutting the span
/// into bounded slices so the result does not depend on the caller's frame
/// rate. Returns the ground surface flags when a corpse rests on a surface
/// monsters slide off, otherwise empty flags.
pub fn pmove<C: PmoveCallbacks, S: EventSink>(
    pm: &mut Pmove<'_>,
    callbacks: &C,
    sink: &mut S,
) -> Result<SurfFlags, PmoveError> {
    let final_time = pm.cmd.server_time;

    if final_time < pm.ps.command_time {
        warn!(
            final_time,
            command_time = pm.ps.command_time,
            "command older than player state"
        );
        return Ok(SurfFlags::empty());
    }

    let slice = if pm.config.pmove_fixed {
        pm.config.pmove_msec
    } else {
        pm.config.max_slice_ms
    };
    if slice <= 0 {
        return Err(PmoveError::InvalidSlice(slice));
    }

    if final_time > pm.ps.command_time + MAX_CATCHUP_MSEC {
        pm.ps.command_time = final_time - MAX_CATCHUP_MSEC;
    }

    // after a loadgame, prevent huge spans
    if pm.ps.pm_flags.contains(PmFlags::TIME_LOAD) && final_time - pm.ps.command_time > LOAD_CATCHUP_MSEC {
        pm.ps.command_time = final_time - LOAD_CATCHUP_MSEC;
    }

    pm.ps.pmove_framecount = (pm.ps.pmove_framecount + 1) & ((1 << PMOVE_FRAMECOUNT_BITS) - 1);

    PmoveContext::new(pm, callbacks, sink).adjust_aim_spread_scale();

    while pm.ps.command_time != final_time {
        let msec = (final_time - pm.ps.command_time).min(slice);
        pm.cmd.server_time = pm.ps.command_time + msec;
        trace!(server_time = pm.cmd.server_time, msec, "pmove slice");

        pmove_single(pm, callbacks, sink)?;

        if pm.ps.pm_flags.contains(PmFlags::JUMP_HELD) {
            pm.cmd.upmove = 20;
        }
    }

    pm.ps.cur_weap_heat = pm.ps.cur_weap_heat.clamp(0, 255);

    let corpse = pm.ps.health <= 0
        || pm.ps.pm_type == PmType::Dead
        || pm.ps.e_flags.contains(EFlags::PLAYDEAD);
    if corpse && pm.pmext.ground_surface.contains(SurfFlags::MONSTERSLICK) {
        Ok(pm.pmext.ground_surface)
    } else {
        Ok(SurfFlags::empty())
    }
}

// ============================================================
// Tests
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{cmd_at, init_tracing, Fixture, TestWorld};
    use etmove_common::events::EventLog;
    use etmove_common::q_shared::{ENTITYNUM_NONE, PmFlags};

    #[test]
    fn test_pmove_gravity_in_air() {
        let mut fx = Fixture::new();
        fx.ps.origin = [0.0, 0.0, 1000.0];
        let mut log = EventLog::new();

        fx.run_single(&TestWorld::open_air(), cmd_at(1100), &mut log).unwrap();

        // 100ms at 800 gravity
        assert!(fx.ps.velocity[2] <= -79.0, "vel_z = {}", fx.ps.velocity[2]);
        assert!(fx.ps.origin[2] < 1000.0);
        assert_eq!(fx.ps.ground_entity_num, ENTITYNUM_NONE);
    }

    #[test]
    fn test_pmove_on_ground() {
        let mut fx = Fixture::standing();
        let mut log = EventLog::new();

        fx.run_single(&TestWorld::floor(), cmd_at(1008), &mut log).unwrap();

        assert_eq!(fx.ps.ground_entity_num, ENTITYNUM_WORLD);
        assert!((fx.ps.origin[2] - 24.0).abs() < 0.01);
    }

    #[test]
    fn test_pmove_freeze_no_movement() {
        let mut fx = Fixture::new();
        fx.ps.pm_type = PmType::Freeze;
        fx.ps.origin = [100.0, 100.0, 100.0];
        let mut cmd = cmd_at(1016);
        cmd.forwardmove = 127;
        let mut log = EventLog::new();

        fx.run_single(&TestWorld::open_air(), cmd, &mut log).unwrap();

        assert_eq!(fx.ps.origin, [100.0, 100.0, 100.0]);
        assert_eq!(fx.ps.command_time, 1016);
    }

    #[test]
    fn test_pmove_idle_tick_is_stationary() {
        let mut fx = Fixture::standing();
        fx.ps.give_weapon(Weapon::Thompson);
        fx.ps.weapon = Weapon::Thompson;
        fx.ps.ammoclip[Weapon::Thompson.index()] = 30;
        let mut log = EventLog::new();

        let mut cmd = cmd_at(1008);
        cmd.weapon = Weapon::Thompson;
        fx.run_single(&TestWorld::floor(), cmd, &mut log).unwrap();

        assert_eq!(fx.ps.origin, [0.0, 0.0, 24.0]);
        assert_eq!(fx.ps.velocity, VEC3_ORIGIN);
        assert_eq!(fx.ps.weapon_state, WeaponState::Ready);
        assert_eq!(fx.ps.ammoclip[Weapon::Thompson.index()], 30);
    }

    #[test]
    fn test_pmove_is_deterministic() {
        init_tracing();
        let run = || {
            let mut fx = Fixture::standing();
            fx.ps.give_weapon(Weapon::Mp40);
            fx.ps.weapon = Weapon::Mp40;
            fx.ps.ammoclip[Weapon::Mp40.index()] = 30;
            fx.ps.velocity = [120.0, 40.0, 0.0];
            let mut cmd = cmd_at(1050);
            cmd.weapon = Weapon::Mp40;
            cmd.forwardmove = 127;
            cmd.rightmove = -60;
            cmd.buttons = Buttons::ATTACK;
            let mut log = EventLog::new();
            fx.run_span(&TestWorld::floor(), cmd, &mut log).unwrap();
            (fx.ps, fx.pmext, log)
        };

        let (ps_a, ext_a, log_a) = run();
        let (ps_b, ext_b, log_b) = run();
        assert_eq!(ps_a, ps_b);
        assert_eq!(ext_a, ext_b);
        assert_eq!(log_a, log_b);
    }

    #[test]
    fn test_empty_clip_auto_reloads_over_ticks() {
        let mut fx = Fixture::standing();
        fx.ps.give_weapon(Weapon::Mp40);
        fx.ps.weapon = Weapon::Mp40;
        fx.ps.ammoclip[Weapon::Mp40.clip_index().index()] = 0;
        fx.ps.ammo[Weapon::Mp40.ammo_index().index()] = 20;
        assert!(fx.pmext.auto_reload);
        let reload_time = fx.weapons[Weapon::Mp40].reload_time;
        let max_clip = fx.weapons[Weapon::Mp40].max_clip;
        let mut log = EventLog::new();

        let mut saw_reloading = false;
        let mut saw_firing = false;
        let mut time = 1008;
        while time <= 1000 + reload_time + 200 {
            let mut cmd = cmd_at(time);
            cmd.weapon = Weapon::Mp40;
            // only the first tick tries to shoot
            if time == 1008 {
                cmd.buttons = Buttons::ATTACK;
            }
            fx.run_single(&TestWorld::floor(), cmd, &mut log).unwrap();
            saw_reloading |= fx.ps.weapon_state == WeaponState::Reloading;
            saw_firing |= fx.ps.weapon_state == WeaponState::Firing;
            time += 8;
        }

        assert!(saw_reloading);
        assert!(!saw_firing);
        assert_eq!(fx.ps.weapon_state, WeaponState::Ready);
        let loaded = max_clip.min(20);
        assert_eq!(fx.ps.ammoclip[Weapon::Mp40.clip_index().index()], loaded);
        assert_eq!(fx.ps.ammo[Weapon::Mp40.ammo_index().index()], 20 - loaded);
    }

    #[test]
    fn test_pmove_span_chops_into_slices() {
        let mut fx = Fixture::new();
        fx.ps.origin = [0.0, 0.0, 1000.0];
        fx.ps.command_time = 1000;
        let mut log = EventLog::new();

        fx.run_span(&TestWorld::open_air(), cmd_at(1120), &mut log).unwrap();

        assert_eq!(fx.ps.command_time, 1120);
        assert_eq!(fx.ps.pmove_framecount, 1);
    }

    #[test]
    fn test_pmove_fixed_matches_single_ticks() {
        init_tracing();
        let config = serde_json::json!({ "pmove_fixed": true, "pmove_msec": 8 });
        let config = PmoveConfig::from_json(&config.to_string()).unwrap();

        let mut cmd = cmd_at(1024);
        cmd.forwardmove = 127;

        let mut spanned = Fixture::standing();
        spanned.config = config.clone();
        let mut log = EventLog::new();
        spanned.run_span(&TestWorld::floor(), cmd, &mut log).unwrap();

        let mut ticked = Fixture::standing();
        ticked.config = config;
        ticked.ps.pmove_framecount = 1;
        for t in [1008, 1016, 1024] {
            cmd.server_time = t;
            ticked.run_single(&TestWorld::floor(), cmd, &mut log).unwrap();
        }

        assert_eq!(spanned.ps, ticked.ps);
        assert_eq!(spanned.ps.command_time, 1024);
    }

    #[test]
    fn test_pmove_span_caps_catchup() {
        let mut fx = Fixture::standing();
        fx.ps.command_time = 0;
        let mut log = EventLog::new();

        fx.run_span(&TestWorld::floor(), cmd_at(5000), &mut log).unwrap();
        assert_eq!(fx.ps.command_time, 5000);
    }

    #[test]
    fn test_pmove_span_rejects_empty_slice() {
        let mut fx = Fixture::standing();
        fx.config.max_slice_ms = 0;
        let mut log = EventLog::new();

        let err = fx.run_span(&TestWorld::floor(), cmd_at(1100), &mut log).unwrap_err();
        assert_eq!(err, PmoveError::InvalidSlice(0));
    }

    #[test]
    fn test_pmove_span_ignores_stale_command() {
        let mut fx = Fixture::standing();
        fx.ps.command_time = 2000;
        let mut log = EventLog::new();

        fx.run_span(&TestWorld::floor(), cmd_at(1500), &mut log).unwrap();
        assert_eq!(fx.ps.command_time, 2000);
    }

    #[test]
    fn test_talk_blocks_input() {
        let mut fx = Fixture::standing();
        let mut cmd = cmd_at(1050);
        cmd.buttons = Buttons::TALK | Buttons::ATTACK;
        cmd.forwardmove = 127;
        let mut log = EventLog::new();

        fx.run_single(&TestWorld::floor(), cmd, &mut log).unwrap();

        assert!(fx.ps.e_flags.contains(EFlags::TALK));
        assert_eq!(fx.ps.velocity[0], 0.0);
    }

    #[test]
    fn test_respawned_cleared_when_attack_released() {
        let mut fx = Fixture::standing();
        fx.ps.pm_flags.insert(PmFlags::RESPAWNED);
        let mut log = EventLog::new();

        fx.run_single(&TestWorld::floor(), cmd_at(1008), &mut log).unwrap();
        assert!(!fx.ps.pm_flags.contains(PmFlags::RESPAWNED));
    }

    #[test]
    fn test_drop_timers() {
        let mut fx = Fixture::standing();
        fx.ps.pm_time = 5;
        fx.ps.pm_flags.insert(PmFlags::TIME_LAND);
        fx.ps.legs_timer = 100;
        fx.ps.torso_timer = 4;
        fx.pmext.weap_anim_timer = 30;
        let mut log = EventLog::new();

        fx.with_context(&TestWorld::floor(), cmd_at(1008), &mut log, |ctx| {
            ctx.drop_timers();
        });

        assert_eq!(fx.ps.pm_time, 0);
        assert!(!fx.ps.pm_flags.contains(PmFlags::TIME_LAND));
        assert_eq!(fx.ps.legs_timer, 92);
        assert_eq!(fx.ps.torso_timer, 0);
        assert_eq!(fx.pmext.weap_anim_timer, 22);
    }

    #[test]
    fn test_sprint_drains_and_recharges() {
        let mut fx = Fixture::standing();
        fx.pmext.sprint_time = 10000;
        let mut cmd = cmd_at(1050);
        cmd.buttons = Buttons::SPRINT;
        cmd.forwardmove = 127;
        let mut log = EventLog::new();

        fx.with_context(&TestWorld::floor(), cmd, &mut log, |ctx| {
            ctx.pml.frametime = 0.05;
            ctx.sprint();
        });
        assert_eq!(fx.pmext.sprint_time, 10000 - 250);
        assert_eq!(fx.ps.sprint_exert_time, 1);

        // released: 500/s, doubled above 5000
        fx.with_context(&TestWorld::floor(), cmd_at(1100), &mut log, |ctx| {
            ctx.pml.frametime = 0.05;
            ctx.sprint();
        });
        assert_eq!(fx.pmext.sprint_time, 9750 + 50);
        assert_eq!(fx.ps.sprint_exert_time, 0);
    }

    #[test]
    fn test_sprint_adrenaline_keeps_bar_full() {
        let mut fx = Fixture::standing();
        fx.pmext.sprint_time = 100;
        fx.ps.powerup_adrenaline = 5000;
        let mut cmd = cmd_at(1050);
        cmd.buttons = Buttons::SPRINT;
        cmd.forwardmove = 127;
        let mut log = EventLog::new();

        fx.with_context(&TestWorld::floor(), cmd, &mut log, |ctx| {
            ctx.pml.frametime = 0.05;
            ctx.sprint();
        });
        assert_eq!(fx.pmext.sprint_time, SPRINTTIME);
    }

    #[test]
    fn test_touch_ents_are_unique_and_skip_world() {
        let mut fx = Fixture::standing();
        let mut log = EventLog::new();

        fx.with_context(&TestWorld::floor(), cmd_at(1008), &mut log, |ctx| {
            ctx.add_touch_ent(ENTITYNUM_WORLD);
            ctx.add_touch_ent(7);
            ctx.add_touch_ent(7);
            ctx.add_touch_ent(9);
            assert_eq!(ctx.pm.touchents, vec![7, 9]);
        });
    }

    #[test]
    fn test_fixed_physics_snaps_to_64ths() {
        let mut fx = Fixture::new();
        fx.config.fixed_physics = true;
        fx.ps.origin = [0.0, 0.0, 1000.0];
        fx.ps.velocity = [100.3, 0.2, 0.0];
        let mut log = EventLog::new();

        fx.run_single(&TestWorld::open_air(), cmd_at(1008), &mut log).unwrap();

        for v in fx.ps.velocity {
            assert_eq!((v * 64.0).fract(), 0.0, "{v} is not a multiple of 1/64");
        }
        // small components snap to zero
        assert_eq!(fx.ps.velocity[1], 0.0);
    }

    #[test]
    fn test_tick_rng_depends_on_time_and_client() {
        use rand::Rng;
        let a: u32 = tick_rng(1000, 1).gen();
        let b: u32 = tick_rng(1000, 1).gen();
        let c: u32 = tick_rng(1000, 2).gen();
        let d: u32 = tick_rng(1008, 1).gen();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, d);
    }

    #[test]
    fn test_movement_constants() {
        assert_eq!(STEPSIZE, 18.0);
        assert_eq!(OVERCLIP, 1.001);
        assert_eq!(MIN_WALK_NORMAL, 0.7);
        assert_eq!(JUMP_VELOCITY, 270.0);
    }
}
