// weapon.rs — weapon switching, firing, heat, recoil and the per-tick weapon step

use rand::Rng;
use tracing::{debug, trace};

use etmove_common::cvar::{Sk5LightWeapons, WeaponFlags};
use etmove_common::events::{AnimScriptEvent, EntityEvent, EventSink};
use etmove_common::q_shared::{
    angle2short, vector_add, vector_scale, vectoangles, Buttons, EFlags, HeavyWeaponUse,
    PlayerClass, PmFlags, PmType, SideArmFlags, Skill, SurfFlags, WButtons, ANIM_TOGGLEBIT, PITCH,
    YAW,
};
use etmove_common::weapons::{
    AttackAnimMode, ChargeOwner, FireStart, PostFire, Recoil, Underwater, WeapAnim, Weapon,
    WeaponClass, WeaponDef, WeaponState, MAX_MG42_HEAT,
};

use crate::error::PmoveError;
use crate::pmove::{PmoveCallbacks, PmoveContext};

// ============================================================
// Constants
// ============================================================

const SWITCH_TIME: i32 = 250;

// emplacements
const MG42_RATE_OF_FIRE: i32 = 100;
const AAGUN_RATE_OF_FIRE: i32 = 100;
const MG42_COOL_RATE: f32 = 300.0;

const OVERHEAT_RECOVERY: i32 = 2000;
const MG_LAST_SHOT_TIME: i32 = 2000;
const DRY_FIRE_TIME: i32 = 500;
const UNDERWATER_CLICK_TIME: i32 = 500;
const ZOOM_FIRE_TIME: i32 = 500;

// quick-fire windows for tap shooters
const QUICK_FIRE_WINDOW: i32 = 150;
const AKIMBO_QUICK_FIRE_WINDOW: i32 = 50;

// fuses
const GRENADE_FUSE: i32 = 4000;
const DYNAMITE_FUSE: i32 = 50;
const DYNAMITE_MIN_FUSE: i32 = 5000;
const FORCE_THROW_FUSE: i32 = 100;

const RECOIL_STEP: i32 = 15;
const KNOCKBACK_MASS: f32 = 200.0;
const KNOCKBACK_TIME: i32 = 100;

const MAX_SPREAD: f32 = 255.0;

impl<C: PmoveCallbacks, S: EventSink> PmoveContext<'_, '_, C, S> {
    // ============================================================
    // Jitter
    // ============================================================

    fn random(&mut self) -> f32 {
        self.rng.gen::<f32>()
    }

    fn crandom(&mut self) -> f32 {
        2.0 * (self.random() - 0.5)
    }

    // ============================================================
    // First-person animation
    // ============================================================

    /// Restart `anim`, flipping the toggle bit so the client notices.
    pub(crate) fn start_weapon_anim(&mut self, anim: WeapAnim) {
        if self.pm.ps.pm_type >= PmType::Dead || self.eflag(EFlags::PLAYDEAD) {
            return;
        }
        if self.pm.pmext.weap_anim_timer > 0 || self.pm.cmd.weapon == Weapon::None {
            return;
        }

        let ps = &mut *self.pm.ps;
        ps.weap_anim = ((ps.weap_anim & ANIM_TOGGLEBIT) ^ ANIM_TOGGLEBIT) | anim as i32;
    }

    /// Start `anim` unless it is already playing.
    pub(crate) fn continue_weapon_anim(&mut self, anim: WeapAnim) {
        if self.pm.cmd.weapon == Weapon::None {
            return;
        }
        if (self.pm.ps.weap_anim & !ANIM_TOGGLEBIT) == anim as i32 {
            return;
        }
        if self.pm.pmext.weap_anim_timer > 0 {
            return;
        }
        self.start_weapon_anim(anim);
    }

    fn fire_script(&mut self, second: bool, is_continue: bool, force: bool) {
        let (standing, prone) = if second {
            (AnimScriptEvent::FireWeapon2, AnimScriptEvent::FireWeapon2Prone)
        } else {
            (AnimScriptEvent::FireWeapon, AnimScriptEvent::FireWeaponProne)
        };
        self.stance_script_event(standing, prone, is_continue, force);
    }

    // ============================================================
    // Switching
    // ============================================================

    /// Put `old` away in favour of `new`. With `reload` set the raise ends in
    /// a reload.
    pub(crate) fn begin_weapon_change(&mut self, old: Weapon, new: Weapon, reload: bool) {
        let ps = &*self.pm.ps;
        if self.pmflag(PmFlags::RESPAWNED) || new == Weapon::None || !ps.has_weapon(new) {
            return;
        }
        if matches!(ps.weapon_state, WeaponState::Dropping | WeaponState::DroppingToReload) {
            return;
        }
        // a shot or throw is still pending
        if ps.weapon_delay != 0 || ps.grenade_time_left > 0 {
            return;
        }
        // no room to set a mortar
        if new == Weapon::MortarSet && (self.eflag(EFlags::PRONE) || self.pm.waterlevel == 3) {
            return;
        }

        self.pm.ps.next_weapon = new;

        let new_def = self.def(new);
        let old_def = self.def(old);
        let is_alt = new.is_alt_of(old);

        if new_def.class.contains(WeaponClass::QUIET_ALT_TOGGLE) {
            if !is_alt {
                self.add_event(EntityEvent::ChangeWeapon);
            }
        } else if new_def.class.contains(WeaponClass::FUSED) {
            self.pm.ps.grenade_time_left = 0;
            self.add_event(EntityEvent::ChangeWeapon);
        } else if new == Weapon::MortarSet {
            self.add_event(EntityEvent::ChangeWeapon);
        } else {
            self.add_event(if reload { EntityEvent::ChangeWeapon2 } else { EntityEvent::ChangeWeapon });
        }

        self.start_weapon_anim(if is_alt { WeapAnim::AltSwitchFrom } else { old_def.anims.drop });

        let mut switch_time = SWITCH_TIME;
        if is_alt {
            switch_time = old_def.alt_drop.time;
            if old_def.alt_drop.reload_alt && self.clip_of(new) == 0 && self.reserve_of(new) > 0 {
                self.reload_clip(new);
            }
            if old_def.alt_drop.mount {
                self.pm.pmext.mounted_weapon_angles = vectoangles(&self.pml.forward);
            }
        }

        if is_alt && old_def.alt_drop.undo_anim {
            self.stance_script_event(
                AnimScriptEvent::UndoAltWeaponMode,
                AnimScriptEvent::UndoAltWeaponModeProne,
                false,
                false,
            );
        } else {
            self.script_event(AnimScriptEvent::DropWeapon, false, false);
        }

        let ps = &mut *self.pm.ps;
        ps.weapon_state = if reload { WeaponState::DroppingToReload } else { WeaponState::Dropping };
        ps.weapon_time += switch_time;
        debug!(?old, ?new, reload, switch_time, "begin weapon change");
    }

    /// The drop finished: bring up the pending weapon.
    pub(crate) fn finish_weapon_change(&mut self) {
        let old = self.pm.ps.weapon;
        let mut new = self.pm.ps.next_weapon;
        if !self.pm.ps.has_weapon(new) {
            new = Weapon::None;
        }

        let ps = &mut *self.pm.ps;
        ps.weapon = new;
        ps.weapon_state = if ps.weapon_state == WeaponState::DroppingToReload {
            WeaponState::RaisingToReload
        } else {
            WeaponState::Raising
        };

        let new_def = self.def(new);
        if new_def.class.contains(WeaponClass::SCOPED) {
            self.pm.ps.aim_spread_scale = MAX_SPREAD as i32;
            self.pm.ps.aim_spread_scale_float = MAX_SPREAD;
        }

        // remember the preferred form of side-arm and rifle
        let side_arm = &mut self.pm.pmext.silenced_side_arm;
        match new {
            Weapon::Silencer | Weapon::SilencedColt => side_arm.insert(SideArmFlags::SILENCED),
            Weapon::Luger | Weapon::Colt => side_arm.remove(SideArmFlags::SILENCED),
            Weapon::M7 | Weapon::Gpg40 => side_arm.insert(SideArmFlags::RIFLE_LAUNCHER),
            Weapon::Carbine | Weapon::Kar98 => side_arm.remove(SideArmFlags::RIFLE_LAUNCHER),
            _ => {}
        }

        if old == new {
            return;
        }

        let is_alt = new.is_alt_of(old);
        let mut switch_time = SWITCH_TIME;
        let mut show_switch = true;
        if is_alt {
            switch_time = new_def.alt_raise.time;
            if new_def.alt_raise.skip_when_dry && self.clip_of(old) == 0 {
                switch_time = 0;
                show_switch = false;
            }
        }
        self.pm.ps.weapon_time += switch_time;
        debug!(?old, ?new, switch_time, "finish weapon change");

        if !show_switch {
            return;
        }

        if is_alt && new_def.alt_raise.alt_anim {
            self.stance_script_event(
                AnimScriptEvent::DoAltWeaponMode,
                AnimScriptEvent::DoAltWeaponModeProne,
                false,
                false,
            );
        } else {
            self.stance_script_event(
                AnimScriptEvent::RaiseWeapon,
                AnimScriptEvent::RaiseWeaponProne,
                false,
                false,
            );
        }

        self.start_weapon_anim(if is_alt {
            new_def.anims.alt_switch_to
        } else {
            new_def.anims.raise
        });
    }

    // ============================================================
    // Heat
    // ============================================================

    fn update_cur_heat(&mut self) {
        let ps = &mut *self.pm.ps;
        let (heat, max) = if ps.hweapon_use != HeavyWeaponUse::None
            || ps.e_flags.contains(EFlags::MOUNTEDTANK)
        {
            (ps.weap_heat[Weapon::DummyMg42.index()], MAX_MG42_HEAT)
        } else {
            (ps.weap_heat[ps.weapon.index()], self.pm.weapons.get(ps.weapon).max_heat)
        };

        ps.cur_weap_heat = if max != 0 {
            (heat as f32 / max as f32 * MAX_SPREAD) as i32
        } else {
            0
        };
    }

    /// Bleed heat off every owned weapon and refresh the heat gauge.
    pub(crate) fn cool_weapons(&mut self) {
        let heavy_gunner = self.pm.ps.player_class == PlayerClass::Soldier
            && self.skill(Skill::HeavyWeapons) >= 2;
        let factor = if heavy_gunner { 2.0 } else { 1.0 };
        let frametime = self.pml.frametime;

        for weapon in Weapon::all() {
            if !self.pm.ps.has_weapon(weapon) {
                continue;
            }
            let heat = &mut self.pm.ps.weap_heat[weapon.index()];
            if *heat == 0 {
                continue;
            }
            let cool = (self.pm.weapons.get(weapon).cool_rate as f32 * factor * frametime) as i32;
            *heat = (*heat - cool).max(0);
        }

        if self.pm.ps.weapon != Weapon::None {
            self.update_cur_heat();
        }
    }

    // ============================================================
    // Emplacements
    // ============================================================

    fn emplacement_fire(&mut self, event: EntityEvent, rate: i32, heats: bool) {
        let attack = self.pm.cmd.buttons.contains(Buttons::ATTACK);

        if heats {
            let heat = &mut self.pm.ps.weap_heat[Weapon::DummyMg42.index()];
            if *heat != 0 {
                *heat = (*heat - (MG42_COOL_RATE * self.pml.frametime) as i32).max(0);
                self.update_cur_heat();
            }
        }

        let ps = &mut *self.pm.ps;
        if ps.weapon_time > 0 {
            ps.weapon_time -= self.pml.msec;
            if ps.weapon_time > 0 {
                return;
            }
            if !attack {
                ps.weapon_time = 0;
                return;
            }
        }

        if !attack {
            return;
        }

        ps.weapon_time += rate;
        if heats {
            ps.weap_heat[Weapon::DummyMg42.index()] += rate;
        }
        self.add_event(event);
        self.script_event(AnimScriptEvent::FireWeapon, false, true);

        if heats && self.pm.ps.weap_heat[Weapon::DummyMg42.index()] >= MAX_MG42_HEAT {
            self.pm.ps.weap_heat[Weapon::DummyMg42.index()] = MAX_MG42_HEAT;
            self.pm.ps.weapon_time = OVERHEAT_RECOVERY;
            self.add_event(EntityEvent::WeapOverheat);
            debug!("emplacement overheated");
        }
        self.update_cur_heat();
    }

    // ============================================================
    // Recoil
    // ============================================================

    /// Push the view along the active recoil curve up to the current time.
    fn replay_recoil(&mut self) {
        let ext = &*self.pm.pmext;
        let (recoil_time, duration) = (ext.weap_recoil_time, ext.weap_recoil_duration);
        let (pitch, yaw) = (ext.weap_recoil_pitch, ext.weap_recoil_yaw);
        let mut i = ext.last_recoil_delta_time;
        if recoil_time == 0 {
            return;
        }
        if duration <= 0 {
            self.pm.pmext.weap_recoil_time = 0;
            self.pm.pmext.last_recoil_delta_time = 0;
            return;
        }

        let delta = (self.now() - recoil_time).min(duration);
        let dur = duration as f32;
        let mut muzzle = self.pm.ps.viewangles;

        while i < delta {
            let t = i as f32;
            let fade = 1.0 - t / dur;
            if pitch > 0.0 {
                muzzle[PITCH] -= 2.0 * pitch * (2.5 * t / dur).cos();
                muzzle[PITCH] -= 0.25 * self.random() * fade;
            }
            if yaw > 0.0 {
                muzzle[YAW] += 0.5 * yaw * (1.0 - t * 3.0 / dur).cos();
                muzzle[YAW] += 0.5 * self.crandom() * fade;
            }
            i += RECOIL_STEP;
        }

        for axis in 0..3 {
            self.pm.ps.delta_angles[axis] =
                angle2short(muzzle[axis]) - self.pm.cmd.angles[axis];
        }
        self.pm.ps.viewangles = muzzle;

        let ext = &mut *self.pm.pmext;
        if delta == duration {
            ext.weap_recoil_time = 0;
            ext.last_recoil_delta_time = 0;
        } else {
            ext.last_recoil_delta_time = delta;
        }
        trace!(delta, "recoil replay");
    }

    /// Arm the recoil curve for a shot from a weapon with `profile`.
    fn start_recoil(&mut self, profile: Recoil) {
        self.pm.pmext.last_recoil_delta_time = 0;

        let scoped = self.skill(Skill::MilitaryIntelligenceAndScopedWeapons);
        let light = self.skill(Skill::LightWeapons);
        let sniper_war = self.pm.config.sniper_war;

        let (duration, yaw, pitch) = match profile {
            Recoil::None => {
                self.pm.pmext.weap_recoil_time = 0;
                self.pm.pmext.weap_recoil_yaw = 0.0;
                return;
            }
            Recoil::ScopedRifle => {
                let yaw = self.crandom() * 0.5;
                let pitch = if scoped >= 3 || sniper_war { 0.25 } else { 0.5 };
                (300, yaw, pitch)
            }
            Recoil::MobileMg => {
                if self.pmflag(PmFlags::DUCKED) || self.eflag(EFlags::PRONE) {
                    let yaw = self.crandom() * 0.5;
                    (200, yaw, 0.45 * self.random() * 0.15)
                } else {
                    let yaw = self.crandom() * 0.25;
                    (200, yaw, 0.75 * self.random() * 0.2)
                }
            }
            Recoil::ScopedAuto => {
                let mut pitch = 0.45 * self.random() * 0.15;
                if scoped >= 3 {
                    pitch *= 0.5;
                }
                (100, 0.0, pitch)
            }
            Recoil::Pistol => {
                if light >= 3 {
                    (70, 0.0, 0.25 * self.random() * 0.15)
                } else {
                    (100, 0.0, 0.45 * self.random() * 0.15)
                }
            }
            Recoil::Shotgun => (250, 0.0, 0.20),
        };

        let mut duration = duration;
        if light >= 5 && self.pm.config.sk5_lightweap.contains(Sk5LightWeapons::RECOIL) {
            duration = (duration as f32 * self.pm.config.sk5_recoil_factor) as i32;
        }

        let ext = &mut *self.pm.pmext;
        ext.weap_recoil_time = self.pm.cmd.server_time;
        ext.weap_recoil_duration = duration;
        ext.weap_recoil_yaw = yaw;
        ext.weap_recoil_pitch = pitch;
    }

    // ============================================================
    // Gates
    // ============================================================

    /// Whether the class charge bar holds enough for `weapon`.
    fn charge_ready(&mut self, weapon: Weapon, def: &WeaponDef) -> bool {
        let Some(rule) = def.charge else {
            return true;
        };
        if weapon == Weapon::Panzerfaust && self.pm.config.panzer_war {
            return true;
        }

        let class = match rule.owner {
            ChargeOwner::Class(class) => class,
            ChargeOwner::Own => self.pm.ps.player_class,
        };
        let factor = if self.skill(rule.skill) >= rule.level {
            rule.skilled_factor
        } else {
            rule.factor
        };
        let required = self.pm.character.charge_time(class) as f32 * factor;

        if ((self.now() - self.pm.ps.class_weapon_time) as f32) < required {
            if rule.no_power_anim && self.pm.cmd.buttons.contains(Buttons::ATTACK) {
                self.script_event(AnimScriptEvent::NoPower, true, false);
            }
            return false;
        }
        true
    }

    fn fires_underwater(&self, def: &WeaponDef) -> bool {
        match def.underwater {
            Underwater::Allowed => true,
            Underwater::Denied => false,
            Underwater::EngineerOption => self.pm.config.weapons.contains(WeaponFlags::ENGI),
            Underwater::MedicOption => self.pm.config.weapons.contains(WeaponFlags::MEDIC),
        }
    }

    fn is_firing(&self) -> bool {
        matches!(self.pm.ps.weapon_state, WeaponState::Firing | WeaponState::FiringAlt)
    }

    // ============================================================
    // Weapon step
    // ============================================================

    /// Run the weapon for this tick.
    pub(crate) fn weapon(&mut self) -> Result<(), PmoveError> {
        if self.pmflag(PmFlags::RESPAWNED) || self.pm.ps.team_spectator {
            return Ok(());
        }

        if self.pm.ps.health <= 0 || self.eflag(EFlags::PLAYDEAD) {
            if !self.pmflag(PmFlags::LIMBO) {
                self.cool_weapons();
            }
            return Ok(());
        }

        match self.pm.ps.hweapon_use {
            HeavyWeaponUse::Mg42 => {
                self.emplacement_fire(EntityEvent::FireWeaponMg42, MG42_RATE_OF_FIRE, true);
                return Ok(());
            }
            HeavyWeaponUse::AaGun => {
                self.emplacement_fire(EntityEvent::FireWeaponAagun, AAGUN_RATE_OF_FIRE, false);
                return Ok(());
            }
            HeavyWeaponUse::None => {}
        }
        if self.eflag(EFlags::MOUNTEDTANK) {
            self.emplacement_fire(EntityEvent::FireWeaponMountedMg42, MG42_RATE_OF_FIRE, true);
            return Ok(());
        }

        let weapon = self.pm.ps.weapon;
        let def = self.def(weapon);
        let akimbo_fire = weapon.is_akimbo() && self.akimbo_fires_own_clip(weapon);
        let attack = self.pm.cmd.buttons.contains(Buttons::ATTACK);
        let msec = self.pml.msec;

        self.cool_weapons();

        if self.enhanced_attack()? {
            return Ok(());
        }

        self.replay_recoil();

        // a cooked grenade in hand
        if def.class.contains(WeaponClass::FUSED) && self.pm.ps.grenade_time_left > 0 {
            let mut force_throw = false;
            let ps = &mut *self.pm.ps;
            if weapon == Weapon::Dynamite {
                ps.grenade_time_left = (ps.grenade_time_left + msec).max(DYNAMITE_MIN_FUSE);
            } else {
                ps.grenade_time_left -= msec;
                if ps.grenade_time_left <= FORCE_THROW_FUSE {
                    force_throw = true;
                    ps.grenade_time_left = FORCE_THROW_FUSE;
                }
            }

            if !attack || force_throw || self.eflag(EFlags::PRONE_MOVING) {
                if self.pm.ps.weapon_delay == def.fire_delay_time || force_throw {
                    self.fire_script(akimbo_fire, false, true);
                }
            } else {
                return Ok(());
            }
        }

        let mut delayed_fire = false;
        let ps = &mut *self.pm.ps;
        if ps.weapon_delay > 0 {
            ps.weapon_delay -= msec;
            if ps.weapon_delay <= 0 {
                ps.weapon_delay = 0;
                delayed_fire = true;
            }
        }

        if ps.weapon_state == WeaponState::Relaxing {
            ps.weapon_state = WeaponState::Ready;
            return Ok(());
        }

        if self.eflag(EFlags::PRONE_MOVING) && !delayed_fire {
            return Ok(());
        }

        let ps = &mut *self.pm.ps;
        if ps.weapon_time > 0 {
            ps.weapon_time -= msec;
            if !attack && ps.weapon_time < 0 {
                ps.weapon_time = 0;
            }

            // tapping the trigger fires faster than holding it
            if def.class.contains(WeaponClass::QUICK_FIRE) {
                if self.pm.pmext.released_fire {
                    let window = if weapon.is_akimbo() {
                        AKIMBO_QUICK_FIRE_WINDOW
                    } else {
                        QUICK_FIRE_WINDOW
                    };
                    if attack && ps.weapon_time <= window {
                        ps.weapon_time = 0;
                    }
                } else if !attack {
                    self.pm.pmext.released_fire = true;
                }
            }
        }

        // honour a requested switch unless a drop or delayed shot is underway
        let ps = &*self.pm.ps;
        let idle = ps.weapon_time <= 0 || (!self.is_firing() && ps.weapon_delay <= 0);
        if idle && !delayed_fire && !self.eflag(EFlags::PLAYDEAD) && weapon != self.pm.cmd.weapon {
            let requested = self.pm.cmd.weapon;
            self.begin_weapon_change(weapon, requested, false);
        }

        if self.pm.ps.weapon_delay > 0 {
            return Ok(());
        }

        self.check_for_reload(weapon);

        if self.pm.ps.weapon_time > 0 || self.pm.ps.weapon_delay > 0 {
            return Ok(());
        }

        if self.pm.ps.weapon_state == WeaponState::Reloading {
            self.finish_weapon_reload();
            if self.pm.ps.weapon_time > 0 {
                return Ok(());
            }
        }

        match self.pm.ps.weapon_state {
            WeaponState::Dropping | WeaponState::DroppingToReload => {
                self.finish_weapon_change();
                return Ok(());
            }
            WeaponState::Raising => {
                self.pm.ps.weapon_state = WeaponState::Ready;
                let idle = self.def(self.pm.ps.weapon).anims.idle;
                self.start_weapon_anim(idle);
                return Ok(());
            }
            WeaponState::RaisingToReload => {
                self.pm.ps.weapon_state = WeaponState::Ready;
                let raised = self.pm.ps.weapon;
                self.begin_weapon_reload(raised);
                return Ok(());
            }
            _ => {}
        }

        if weapon == Weapon::None {
            return Ok(());
        }

        if weapon == Weapon::Panzerfaust && self.eflag(EFlags::PRONE) {
            return Ok(());
        }

        if !self.charge_ready(weapon, &def) {
            return Ok(());
        }
        if def.fire_start == FireStart::MortarSet && !delayed_fire {
            self.pm.ps.weapon_state = WeaponState::Ready;
        }

        let lean_blocked = self.pm.ps.leanf != 0.0 && !def.class.contains(WeaponClass::LEAN_FIRE);
        if (!attack && !delayed_fire) || lean_blocked {
            self.pm.ps.weapon_time = 0;
            self.pm.ps.weapon_delay = 0;
            if self.is_firing() {
                self.continue_weapon_anim(def.anims.idle);
            }
            self.pm.ps.weapon_state = WeaponState::Ready;
            return Ok(());
        }

        // carried, not set
        if weapon == Weapon::Mortar {
            return Ok(());
        }

        if self.eflag(EFlags::ZOOMING) {
            // binocular fire is an artillery call
            if self.pm.ps.player_class == PlayerClass::FieldOps {
                self.pm.ps.weapon_time += ZOOM_FIRE_TIME;
                self.add_event(EntityEvent::FireWeapon);
            }
            return Ok(());
        }

        if self.pm.waterlevel == 3 && !self.fires_underwater(&def) {
            self.add_event(EntityEvent::NoFireUnderwater);
            self.pm.ps.weapon_time = UNDERWATER_CLICK_TIME;
            self.pm.ps.weapon_delay = 0;
            return Ok(());
        }

        self.fire_start(weapon, &def, akimbo_fire, delayed_fire);
        self.pm.ps.weapon_state = WeaponState::Firing;

        // out of ammo: click, maybe reload
        let needed = def.uses;
        if weapon != Weapon::None && needed > self.weapon_ammo_available(weapon) {
            let mut reloading = needed <= self.reserve_of(weapon);
            if !self.pm.pmext.auto_reload
                && def.class.contains(WeaponClass::AUTO_RELOAD)
                && !self.pm.cmd.wbuttons.contains(WButtons::RELOAD)
            {
                reloading = false;
            }
            if def.class.contains(WeaponClass::SCOPED) {
                reloading = false;
            }

            if !def.class.contains(WeaponClass::SILENT_EMPTY) {
                self.add_event(if reloading { EntityEvent::EmptyClip } else { EntityEvent::NoAmmo });
            }

            if reloading {
                let anim = self.reload_anim(weapon);
                self.continue_weapon_anim(anim);
            } else {
                self.continue_weapon_anim(def.anims.idle);
                self.pm.ps.weapon_time += DRY_FIRE_TIME;
            }
            return Ok(());
        }

        if self.pm.ps.weapon_delay > 0 {
            return Ok(());
        }

        self.fire(weapon, &def, akimbo_fire);
        Ok(())
    }

    /// Begin the shot: spin-up, fuse or plant, depending on the weapon.
    fn fire_start(&mut self, weapon: Weapon, def: &WeaponDef, akimbo_fire: bool, delayed_fire: bool) {
        let firing = self.is_firing();
        let has_ammo = self.weapon_ammo_available(weapon) != 0;

        match def.fire_start {
            FireStart::Standard | FireStart::Continuous | FireStart::SpinUp => {
                if !firing {
                    let panzer = weapon == Weapon::Panzerfaust;
                    let panzer_war = panzer && self.pm.config.panzer_war;
                    if def.fire_start == FireStart::SpinUp && panzer && !panzer_war {
                        self.add_event(EntityEvent::SpinUp);
                    }
                    if !panzer_war {
                        self.pm.ps.weapon_delay = def.fire_delay_time;
                    }
                } else {
                    let second = def.fire_start == FireStart::SpinUp && akimbo_fire;
                    let is_continue = def.fire_start == FireStart::Continuous;
                    self.fire_script(second, is_continue, true);
                }
            }
            FireStart::MortarSet => {
                if !firing {
                    self.add_event(EntityEvent::SpinUp);
                    self.start_weapon_anim(def.anims.attack);
                    self.pm.ps.weapon_delay = def.fire_delay_time;
                } else {
                    self.fire_script(false, false, true);
                }
            }
            FireStart::Melee => {
                if !delayed_fire {
                    self.fire_script(false, false, false);
                }
            }
            FireStart::Fused => {
                if !delayed_fire {
                    if has_ammo {
                        self.pm.ps.grenade_time_left =
                            if weapon == Weapon::Dynamite { DYNAMITE_FUSE } else { GRENADE_FUSE };
                        self.start_weapon_anim(def.anims.attack);
                    }
                    self.pm.ps.weapon_delay = def.fire_delay_time;
                }
            }
            FireStart::Placed => {
                if !delayed_fire {
                    if has_ammo {
                        self.stance_script_event(
                            AnimScriptEvent::FireWeapon,
                            AnimScriptEvent::FireWeapon2Prone,
                            false,
                            true,
                        );
                    }
                    self.pm.ps.weapon_delay = def.fire_delay_time;
                }
            }
            FireStart::Planted => {
                if !delayed_fire {
                    if has_ammo {
                        self.start_weapon_anim(def.anims.attack);
                    }
                    self.pm.ps.weapon_delay = def.fire_delay_time;
                }
            }
            FireStart::Detonator => {
                if !firing {
                    self.add_event(EntityEvent::SpinUp);
                    self.pm.ps.weapon_delay = def.fire_delay_time;
                    self.continue_weapon_anim(def.anims.attack);
                } else {
                    self.fire_script(false, false, true);
                }
            }
        }
    }

    /// The shot leaves the barrel.
    fn fire(&mut self, weapon: Weapon, def: &WeaponDef, akimbo_fire: bool) {
        if !self.eflag(EFlags::PRONE)
            && self.pml.ground_trace.surface_flags.contains(SurfFlags::SLICK)
            && def.slick_knockback > 0.0
        {
            let kick = vector_scale(&self.pml.forward, -def.slick_knockback / KNOCKBACK_MASS);
            let ps = &mut *self.pm.ps;
            ps.velocity = vector_add(&ps.velocity, &kick);
            if ps.pm_time == 0 {
                ps.pm_time = KNOCKBACK_TIME;
                ps.pm_flags.insert(PmFlags::TIME_KNOCKBACK);
            }
        }

        if !(weapon == Weapon::Panzerfaust && self.pm.config.panzer_war) {
            self.weapon_use_ammo(weapon, def.uses);
        }

        if def.max_heat != 0 {
            self.pm.ps.weap_heat[weapon.index()] += def.next_shot_time;
        }

        let attack_anim = if weapon.is_akimbo() {
            if akimbo_fire { WeapAnim::Attack1 } else { WeapAnim::Attack2 }
        } else if self.weapon_clip_empty(weapon) {
            def.anims.last_attack
        } else {
            def.anims.attack
        };
        match def.attack_anim_mode {
            AttackAnimMode::Start => self.start_weapon_anim(attack_anim),
            AttackAnimMode::Continue => self.continue_weapon_anim(attack_anim),
            AttackAnimMode::None => {}
        }

        match def.post_fire {
            PostFire::None => {}
            PostFire::NoAmmo => self.add_event(EntityEvent::NoAmmo),
            PostFire::PanzerNoAmmo => {
                if !self.pm.config.panzer_war {
                    self.add_event(EntityEvent::NoAmmo);
                }
            }
            PostFire::SatchelSwap => {
                self.add_event(EntityEvent::NoAmmo);
                let ps = &mut *self.pm.ps;
                ps.ammoclip[Weapon::SatchelDet.index()] = 1;
                ps.ammo[Weapon::Satchel.index()] = 0;
                ps.ammoclip[Weapon::Satchel.index()] = 0;
                self.begin_weapon_change(Weapon::Satchel, Weapon::SatchelDet, false);
            }
            PostFire::NoAmmoWhenReserveEmpty => {
                if self.reserve_of(weapon) == 0 {
                    self.add_event(EntityEvent::NoAmmo);
                }
            }
        }

        let fire_event = if weapon.is_akimbo() {
            if akimbo_fire { EntityEvent::FireWeapon } else { EntityEvent::FireWeaponB }
        } else if self.weapon_clip_empty(weapon) {
            EntityEvent::FireWeaponLastShot
        } else {
            EntityEvent::FireWeapon
        };
        self.add_event(fire_event);

        self.pm.pmext.released_fire = false;
        self.pm.ps.last_fire_time = self.now();

        let mut add_time = def.next_shot_time;
        if let Some(sidearm) = weapon.akimbo_sidearm() {
            // one gun dry: the other fires at half rate
            if self.clip_of(weapon) == 0 {
                if !akimbo_fire {
                    add_time *= 2;
                }
            } else if self.clip_of(sidearm) == 0 && akimbo_fire {
                add_time *= 2;
            }
        }
        if def.class.contains(WeaponClass::RELOAD_WHEN_DRY) && attack_anim == WeapAnim::AttackLastShot {
            add_time = MG_LAST_SHOT_TIME;
        }

        let mut spread_add = def.spread_add;
        if def.spread_add_random > 0 {
            spread_add += self.rng.gen_range(0..def.spread_add_random);
        }

        self.start_recoil(def.recoil);

        let heat = &mut self.pm.ps.weap_heat[weapon.index()];
        if def.max_heat != 0 && *heat != 0 && *heat >= def.max_heat {
            *heat = def.max_heat;
            self.add_event(EntityEvent::WeapOverheat);
            add_time = OVERHEAT_RECOVERY;
            debug!(?weapon, "overheated");
        }

        let scoped = self.skill(Skill::MilitaryIntelligenceAndScopedWeapons);
        let ps = &mut *self.pm.ps;
        ps.aim_spread_scale_float = (ps.aim_spread_scale_float + 3.0 * spread_add as f32).min(MAX_SPREAD);
        if (scoped >= 3 || self.pm.config.sniper_war) && ps.player_class == PlayerClass::CovertOps {
            ps.aim_spread_scale_float *= 0.5;
        }
        ps.aim_spread_scale = ps.aim_spread_scale_float as i32;

        ps.weapon_time += add_time;
        trace!(?weapon, add_time, "fired");

        self.switch_if_empty();
    }
}

// ============================================================
// Tests
// ============================================================
