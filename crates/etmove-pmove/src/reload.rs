// reload.rs — clip accounting, reloads and the pump shotgun's staged reload

use tracing::debug;

use etmove_common::cvar::WeaponFlags;
use etmove_common::events::{AnimScriptEvent, EntityEvent, EventSink};
use etmove_common::q_shared::{Buttons, M97ReloadState, Skill, WButtons};
use etmove_common::weapons::{
    akimbo_fire_sequence, ReloadAnim, WeapAnim, Weapon, WeaponClass, WeaponState,
};

use crate::pmove::{PmoveCallbacks, PmoveContext};

const FAST_RELOAD_SCALE: f32 = 0.65;

// pump shotgun stages
const M97_PUMP_TIME: i32 = 1050;
const M97_OPEN_TIME: i32 = 650;
const M97_PUMP_CLOSE_TIME: i32 = 950;
const M97_AFTER_PUMP_TIME: i32 = 550;
const M97_CLOSE_TIME: i32 = 900;
const M97_SHELL_TIME: i32 = 650;
const M97_SHELL_TIME_FAST: i32 = 400;

impl<C: PmoveCallbacks, S: EventSink> PmoveContext<'_, '_, C, S> {
    // ============================================================
    // Ammo accounting
    // ============================================================

    #[inline]
    pub(crate) fn clip_of(&self, weapon: Weapon) -> i32 {
        self.pm.ps.ammoclip[weapon.clip_index().index()]
    }

    #[inline]
    pub(crate) fn reserve_of(&self, weapon: Weapon) -> i32 {
        self.pm.ps.ammo[weapon.ammo_index().index()]
    }

    /// Whether the next akimbo shot comes out of the akimbo's own clip.
    /// Always true for single weapons.
    pub(crate) fn akimbo_fires_own_clip(&self, weapon: Weapon) -> bool {
        match weapon.akimbo_sidearm() {
            Some(sidearm) => akimbo_fire_sequence(self.clip_of(weapon), self.clip_of(sidearm)),
            None => true,
        }
    }

    /// Clip slot the next shot draws from.
    fn firing_clip_slot(&self, weapon: Weapon) -> usize {
        match weapon.akimbo_sidearm() {
            Some(sidearm) if !self.akimbo_fires_own_clip(weapon) => sidearm.clip_index().index(),
            _ => weapon.clip_index().index(),
        }
    }

    /// Rounds the next shot can draw on.
    pub(crate) fn weapon_ammo_available(&self, weapon: Weapon) -> i32 {
        if self.pm.config.no_weapon_clips {
            self.reserve_of(weapon)
        } else {
            self.pm.ps.ammoclip[self.firing_clip_slot(weapon)]
        }
    }

    pub(crate) fn weapon_use_ammo(&mut self, weapon: Weapon, amount: i32) {
        if self.pm.config.no_weapon_clips {
            self.pm.ps.ammo[weapon.ammo_index().index()] -= amount;
        } else {
            let slot = self.firing_clip_slot(weapon);
            self.pm.ps.ammoclip[slot] -= amount;
        }
    }

    pub(crate) fn weapon_clip_empty(&self, weapon: Weapon) -> bool {
        if self.pm.config.no_weapon_clips {
            self.reserve_of(weapon) <= 0
        } else {
            self.clip_of(weapon) <= 0
        }
    }

    /// Move rounds from the reserve into the clip. Akimbo pairs fill both.
    pub(crate) fn reload_clip(&mut self, weapon: Weapon) {
        let max_clip = self.def(weapon).max_clip;
        let clip_slot = weapon.clip_index().index();
        let ammo_slot = weapon.ammo_index().index();

        let ps = &mut *self.pm.ps;
        let mut to_move = max_clip - ps.ammoclip[clip_slot];
        // one shell at a time
        if weapon == Weapon::M97 {
            to_move = to_move.min(1);
        }
        to_move = to_move.min(ps.ammo[ammo_slot]);

        if to_move > 0 {
            ps.ammo[ammo_slot] -= to_move;
            ps.ammoclip[clip_slot] += to_move;
        }

        if let Some(sidearm) = weapon.akimbo_sidearm() {
            self.reload_clip(sidearm);
        }
    }

    pub(crate) fn reload_anim(&self, weapon: Weapon) -> WeapAnim {
        match self.def(weapon).anims.reload {
            ReloadAnim::Fixed(anim) => anim,
            ReloadAnim::Standard => {
                if self.skill(Skill::LightWeapons) >= 2
                    && self.def(weapon).class.contains(WeaponClass::FAST_RELOAD)
                {
                    WeapAnim::Reload2
                } else {
                    WeapAnim::Reload1
                }
            }
        }
    }

    // ============================================================
    // Reload
    // ============================================================

    /// Start reloading `weapon` if nothing forbids it.
    pub(crate) fn begin_weapon_reload(&mut self, weapon: Weapon) {
        if !matches!(self.pm.ps.weapon_state, WeaponState::Ready | WeaponState::Firing) {
            return;
        }

        let def = self.def(weapon);
        let fair_rifles = self.pm.config.weapons.contains(WeaponFlags::FAIRRIFLES);
        let loaded = self.clip_of(weapon) != 0;
        if loaded
            && (def.class.contains(WeaponClass::RELOAD_WHEN_DRY)
                || (def.class.contains(WeaponClass::RIFLE_RELOAD_LOCK) && !fair_rifles))
        {
            return;
        }

        if def.class.contains(WeaponClass::NO_RELOAD) {
            return;
        }

        let full = match weapon.akimbo_sidearm() {
            Some(sidearm) => {
                self.clip_of(weapon) >= def.max_clip
                    && self.clip_of(sidearm) >= self.def(sidearm).max_clip
            }
            None => self.clip_of(weapon) >= def.max_clip,
        };
        if full {
            return;
        }

        // can't reload while leaning
        if self.pm.ps.leanf != 0.0 {
            return;
        }

        if weapon == Weapon::M97 {
            self.begin_m97_reload();
            return;
        }

        if !def.class.contains(WeaponClass::NO_RELOAD_SCRIPT) {
            self.stance_script_event(AnimScriptEvent::Reload, AnimScriptEvent::ReloadProne, false, true);
        }
        if !def.class.contains(WeaponClass::NO_RELOAD_ANIM) {
            let anim = self.reload_anim(weapon);
            self.continue_weapon_anim(anim);
        }

        let mut reload_time = def.reload_time;
        if self.skill(Skill::LightWeapons) >= 2 && def.class.contains(WeaponClass::FAST_RELOAD) {
            reload_time = (reload_time as f32 * FAST_RELOAD_SCALE) as i32;
        }

        let ps = &mut *self.pm.ps;
        if ps.weapon_state == WeaponState::Ready {
            ps.weapon_time += reload_time;
        } else if ps.weapon_time < reload_time {
            ps.weapon_time = reload_time;
        }
        ps.weapon_state = WeaponState::Reloading;
        debug!(?weapon, reload_time, "begin reload");

        self.add_event(EntityEvent::FillClip);
    }

    pub(crate) fn finish_weapon_reload(&mut self) {
        let weapon = self.pm.ps.weapon;
        if weapon == Weapon::M97 {
            self.m97_reload();
            return;
        }

        self.reload_clip(weapon);
        self.pm.ps.weapon_state = WeaponState::Ready;
        let idle = self.def(weapon).anims.idle;
        self.start_weapon_anim(idle);
    }

    /// Start a reload when the player asks for one or the clip ran dry.
    pub(crate) fn check_for_reload(&mut self, weapon: Weapon) {
        if self.pm.config.no_weapon_clips {
            return;
        }

        let def = self.def(weapon);
        if def.class.contains(WeaponClass::NO_RELOAD) {
            return;
        }

        let requested = self.pm.cmd.wbuttons.contains(WButtons::RELOAD);

        match self.pm.ps.weapon_state {
            WeaponState::Raising
            | WeaponState::RaisingToReload
            | WeaponState::Dropping
            | WeaponState::DroppingToReload
            | WeaponState::Readying
            | WeaponState::Relaxing => return,
            WeaponState::Reloading => {
                if self.pm.ps.weapon == Weapon::M97 && self.pm.cmd.buttons.contains(Buttons::ATTACK) {
                    self.pm.pmext.m97_reload_interrupt = true;
                }
                return;
            }
            _ => {}
        }

        let autoreload = self.pm.pmext.auto_reload || !def.class.contains(WeaponClass::AUTO_RELOAD);
        let clip = self.clip_of(weapon);
        let reserve = self.reserve_of(weapon);

        // scoped weapons reload unscoped
        if def.class.contains(WeaponClass::SCOPED) {
            if requested && reserve != 0 && clip < def.max_clip {
                if let Some(base) = weapon.alt() {
                    self.begin_weapon_change(weapon, base, true);
                }
            }
            return;
        }

        if self.pm.ps.weapon_time > 0 {
            return;
        }

        let sidearm_clip = weapon.akimbo_sidearm().map(|s| (self.clip_of(s), self.def(s).max_clip));
        let do_reload = if requested {
            reserve != 0
                && (clip < def.max_clip
                    || sidearm_clip.is_some_and(|(clip, max)| clip < max))
        } else if autoreload {
            clip == 0
                && reserve != 0
                && sidearm_clip.map_or(true, |(clip, _)| clip == 0)
        } else {
            false
        };

        if do_reload {
            self.begin_weapon_reload(weapon);
        }
    }

    /// Throw away a spent explosive once nothing is left of it.
    pub(crate) fn switch_if_empty(&mut self) {
        let weapon = self.pm.ps.weapon;
        let class = self.def(weapon).class;
        if !class.contains(WeaponClass::SWITCH_IF_EMPTY) {
            return;
        }
        if self.clip_of(weapon) != 0 || self.reserve_of(weapon) != 0 {
            return;
        }

        if class.contains(WeaponClass::DISCARD_WHEN_EMPTY) {
            self.pm.ps.take_weapon(weapon);
        }
        self.add_event(EntityEvent::NoAmmo);
    }

    // ============================================================
    // Pump shotgun
    // ============================================================

    /// First stage: open the breech, pumping first if the tube is empty.
    pub(crate) fn begin_m97_reload(&mut self) {
        let anim = if self.clip_of(Weapon::M97) == 0 {
            self.add_event(EntityEvent::M97Pump);
            self.pm.ps.weapon_time += M97_PUMP_TIME;
            self.pm.ps.m97_reload = M97ReloadState::BeginPump;
            self.stance_script_event(
                AnimScriptEvent::ReloadSg1,
                AnimScriptEvent::ReloadSg1Prone,
                false,
                true,
            );
            WeapAnim::AltSwitchFrom
        } else {
            self.pm.ps.weapon_time += M97_OPEN_TIME;
            self.pm.ps.m97_reload = M97ReloadState::Begin;
            WeapAnim::Reload1
        };

        self.start_weapon_anim(anim);
        self.pm.pmext.m97_reload_interrupt = false;
        self.pm.ps.weapon_state = WeaponState::Reloading;
        debug!(stage = ?self.pm.ps.m97_reload, "begin pump reload");
    }

    /// Advance the staged reload by one stage.
    pub(crate) fn m97_reload(&mut self) {
        let interrupted = self.pm.pmext.m97_reload_interrupt;
        let stage = self.pm.ps.m97_reload;

        if stage == M97ReloadState::BeginPump {
            self.reload_clip(Weapon::M97);
            if self.reserve_of(Weapon::M97) == 0 || interrupted {
                self.finish_m97_stage(WeapAnim::Drop2, M97_PUMP_CLOSE_TIME);
            } else {
                self.start_weapon_anim(WeapAnim::AltSwitchTo);
                self.pm.ps.weapon_time += M97_AFTER_PUMP_TIME;
                self.pm.ps.m97_reload = M97ReloadState::AfterPump;
            }
            return;
        }

        // the shell from the previous loop goes in now
        if stage != M97ReloadState::AfterPump && stage != M97ReloadState::Begin {
            self.reload_clip(Weapon::M97);
        }

        if interrupted && stage != M97ReloadState::Begin {
            self.finish_m97_stage(WeapAnim::Reload3, M97_CLOSE_TIME);
            return;
        }

        let max_clip = self.def(Weapon::M97).max_clip;
        if self.clip_of(Weapon::M97) < max_clip && self.reserve_of(Weapon::M97) > 0 {
            self.add_event(EntityEvent::FillClip);
            self.start_weapon_anim(WeapAnim::Reload2);
            self.pm.ps.weapon_time += if self.skill(Skill::LightWeapons) >= 2 {
                M97_SHELL_TIME_FAST
            } else {
                M97_SHELL_TIME
            };
            self.pm.ps.m97_reload = M97ReloadState::Loop;
            self.stance_script_event(
                AnimScriptEvent::ReloadSg2,
                AnimScriptEvent::ReloadSg2Prone,
                false,
                true,
            );
        } else {
            self.finish_m97_stage(WeapAnim::Reload3, M97_CLOSE_TIME);
        }
    }

    fn finish_m97_stage(&mut self, anim: WeapAnim, time: i32) {
        self.start_weapon_anim(anim);
        self.pm.ps.weapon_time += time;
        self.pm.ps.weapon_state = WeaponState::Ready;
    }
}

// ============================================================
// Tests
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{cmd_at, Fixture, TestWorld};
    use etmove_common::events::EventLog;
    use etmove_common::q_shared::{UserCmd, ANIM_TOGGLEBIT};

    fn armed(weapon: Weapon, clip: i32, reserve: i32) -> Fixture {
        let mut fx = Fixture::standing();
        fx.ps.give_weapon(weapon);
        fx.ps.weapon = weapon;
        fx.ps.ammoclip[weapon.clip_index().index()] = clip;
        fx.ps.ammo[weapon.ammo_index().index()] = reserve;
        fx
    }

    #[test]
    fn test_reload_clip_moves_what_fits() {
        let mut fx = armed(Weapon::Thompson, 12, 10);
        let mut log = EventLog::new();

        fx.with_context(&TestWorld::floor(), cmd_at(1008), &mut log, |ctx| {
            ctx.reload_clip(Weapon::Thompson);
        });
        assert_eq!(fx.ps.ammoclip[Weapon::Thompson.index()], 22);
        assert_eq!(fx.ps.ammo[Weapon::Thompson.index()], 0);
    }

    #[test]
    fn test_reload_clip_akimbo_fills_both() {
        let mut fx = armed(Weapon::AkimboColt, 2, 40);
        fx.ps.ammoclip[Weapon::Colt.index()] = 0;
        let mut log = EventLog::new();

        fx.with_context(&TestWorld::floor(), cmd_at(1008), &mut log, |ctx| {
            ctx.reload_clip(Weapon::AkimboColt);
        });
        assert_eq!(fx.ps.ammoclip[Weapon::AkimboColt.index()], 8);
        assert_eq!(fx.ps.ammoclip[Weapon::Colt.index()], 8);
        assert_eq!(fx.ps.ammo[Weapon::Colt.index()], 40 - 6 - 8);
    }

    fn holding(weapon: Weapon, time: i32) -> UserCmd {
        UserCmd { weapon, ..cmd_at(time) }
    }

    #[test]
    fn test_begin_reload_from_ready() {
        let mut fx = armed(Weapon::Mp40, 5, 60);
        let mut log = EventLog::new();

        fx.with_context(&TestWorld::floor(), holding(Weapon::Mp40, 1008), &mut log, |ctx| {
            ctx.begin_weapon_reload(Weapon::Mp40);
        });
        assert_eq!(fx.ps.weapon_state, WeaponState::Reloading);
        assert_eq!(fx.ps.weapon_time, 2400);
        assert!(log.has_event(EntityEvent::FillClip));
        assert!(log.has_script(AnimScriptEvent::Reload));
        assert_eq!(fx.ps.weap_anim & !ANIM_TOGGLEBIT, WeapAnim::Reload1 as i32);
    }

    #[test]
    fn test_fast_reload_with_light_weapons() {
        let mut fx = armed(Weapon::Mp40, 5, 60);
        fx.character.skill[Skill::LightWeapons as usize] = 2;
        let mut log = EventLog::new();

        fx.with_context(&TestWorld::floor(), holding(Weapon::Mp40, 1008), &mut log, |ctx| {
            ctx.begin_weapon_reload(Weapon::Mp40);
        });
        assert_eq!(fx.ps.weapon_time, (2400.0 * FAST_RELOAD_SCALE) as i32);
        assert_eq!(fx.ps.weap_anim & !ANIM_TOGGLEBIT, WeapAnim::Reload2 as i32);
    }

    #[test]
    fn test_no_reload_while_leaning() {
        let mut fx = armed(Weapon::Mp40, 5, 60);
        fx.ps.leanf = 10.0;
        let mut log = EventLog::new();

        fx.with_context(&TestWorld::floor(), cmd_at(1008), &mut log, |ctx| {
            ctx.begin_weapon_reload(Weapon::Mp40);
        });
        assert_eq!(fx.ps.weapon_state, WeaponState::Ready);
        assert!(!log.has_event(EntityEvent::FillClip));
    }

    #[test]
    fn test_full_clip_does_not_reload() {
        let mut fx = armed(Weapon::Mp40, 30, 60);
        let mut log = EventLog::new();

        fx.with_context(&TestWorld::floor(), cmd_at(1008), &mut log, |ctx| {
            ctx.begin_weapon_reload(Weapon::Mp40);
        });
        assert_eq!(fx.ps.weapon_state, WeaponState::Ready);
    }

    #[test]
    fn test_garand_locked_until_dry_unless_fair_rifles() {
        let mut fx = armed(Weapon::Garand, 3, 24);
        let mut log = EventLog::new();

        fx.with_context(&TestWorld::floor(), cmd_at(1008), &mut log, |ctx| {
            ctx.begin_weapon_reload(Weapon::Garand);
        });
        assert_eq!(fx.ps.weapon_state, WeaponState::Ready);

        fx.config.weapons.insert(WeaponFlags::FAIRRIFLES);
        fx.with_context(&TestWorld::floor(), cmd_at(1016), &mut log, |ctx| {
            ctx.begin_weapon_reload(Weapon::Garand);
        });
        assert_eq!(fx.ps.weapon_state, WeaponState::Reloading);
    }

    #[test]
    fn test_auto_reload_on_empty_clip() {
        let mut fx = armed(Weapon::Thompson, 0, 30);
        let mut log = EventLog::new();

        fx.with_context(&TestWorld::floor(), cmd_at(1008), &mut log, |ctx| {
            ctx.check_for_reload(Weapon::Thompson);
        });
        assert_eq!(fx.ps.weapon_state, WeaponState::Reloading);

        // and not when the player turned it off
        let mut fx = armed(Weapon::Thompson, 0, 30);
        fx.pmext.auto_reload = false;
        fx.with_context(&TestWorld::floor(), cmd_at(1008), &mut log, |ctx| {
            ctx.check_for_reload(Weapon::Thompson);
        });
        assert_eq!(fx.ps.weapon_state, WeaponState::Ready);
    }

    #[test]
    fn test_manual_reload_request() {
        let mut fx = armed(Weapon::Luger, 6, 24);
        let mut cmd = cmd_at(1008);
        cmd.wbuttons = WButtons::RELOAD;
        let mut log = EventLog::new();

        fx.with_context(&TestWorld::floor(), cmd, &mut log, |ctx| {
            ctx.check_for_reload(Weapon::Luger);
        });
        assert_eq!(fx.ps.weapon_state, WeaponState::Reloading);
    }

    #[test]
    fn test_scoped_reload_drops_scope_first() {
        let mut fx = armed(Weapon::K43Scope, 4, 20);
        fx.ps.give_weapon(Weapon::K43);
        let mut cmd = cmd_at(1008);
        cmd.wbuttons = WButtons::RELOAD;
        let mut log = EventLog::new();

        fx.with_context(&TestWorld::floor(), cmd, &mut log, |ctx| {
            ctx.check_for_reload(Weapon::K43Scope);
        });
        assert_eq!(fx.ps.weapon_state, WeaponState::DroppingToReload);
        assert_eq!(fx.ps.next_weapon, Weapon::K43);
    }

    #[test]
    fn test_grenades_discarded_when_spent() {
        let mut fx = armed(Weapon::GrenadeLauncher, 0, 0);
        let mut log = EventLog::new();

        fx.with_context(&TestWorld::floor(), cmd_at(1008), &mut log, |ctx| {
            ctx.switch_if_empty();
        });
        assert!(!fx.ps.has_weapon(Weapon::GrenadeLauncher));
        assert!(log.has_event(EntityEvent::NoAmmo));
    }

    #[test]
    fn test_m97_staged_reload() {
        let mut fx = armed(Weapon::M97, 0, 3);
        let mut log = EventLog::new();

        fx.with_context(&TestWorld::floor(), cmd_at(1008), &mut log, |ctx| {
            ctx.begin_weapon_reload(Weapon::M97);
        });
        assert_eq!(fx.ps.m97_reload, M97ReloadState::BeginPump);
        assert_eq!(fx.ps.weapon_time, M97_PUMP_TIME);
        assert!(log.has_event(EntityEvent::M97Pump));

        // pump chambers a shell
        fx.ps.weapon_time = 0;
        fx.with_context(&TestWorld::floor(), cmd_at(1016), &mut log, |ctx| {
            ctx.finish_weapon_reload();
        });
        assert_eq!(fx.ps.ammoclip[Weapon::M97.index()], 1);
        assert_eq!(fx.ps.m97_reload, M97ReloadState::AfterPump);

        // shells go in one at a time until the reserve runs out
        for t in [1024, 1032, 1040] {
            fx.ps.weapon_time = 0;
            fx.with_context(&TestWorld::floor(), cmd_at(t), &mut log, |ctx| {
                ctx.finish_weapon_reload();
            });
        }
        assert_eq!(fx.ps.ammoclip[Weapon::M97.index()], 3);
        assert_eq!(fx.ps.ammo[Weapon::M97.index()], 0);
        assert_eq!(fx.ps.weapon_state, WeaponState::Ready);
        assert_eq!(fx.ps.weapon_time, M97_CLOSE_TIME);
    }

    #[test]
    fn test_m97_interrupted_by_attack() {
        let mut fx = armed(Weapon::M97, 2, 10);
        let mut log = EventLog::new();

        fx.with_context(&TestWorld::floor(), cmd_at(1008), &mut log, |ctx| {
            ctx.begin_weapon_reload(Weapon::M97);
        });
        assert_eq!(fx.ps.m97_reload, M97ReloadState::Begin);

        // first shell
        fx.ps.weapon_time = 0;
        fx.with_context(&TestWorld::floor(), cmd_at(1016), &mut log, |ctx| {
            ctx.finish_weapon_reload();
        });
        assert_eq!(fx.ps.m97_reload, M97ReloadState::Loop);

        let mut cmd = cmd_at(1024);
        cmd.buttons = Buttons::ATTACK;
        fx.with_context(&TestWorld::floor(), cmd, &mut log, |ctx| {
            ctx.check_for_reload(Weapon::M97);
        });
        assert!(fx.pmext.m97_reload_interrupt);

        fx.ps.weapon_time = 0;
        fx.with_context(&TestWorld::floor(), cmd_at(1032), &mut log, |ctx| {
            ctx.finish_weapon_reload();
        });
        assert_eq!(fx.ps.weapon_state, WeaponState::Ready);
        assert_eq!(fx.ps.ammoclip[Weapon::M97.index()], 3);
    }

    #[test]
    fn test_no_weapon_clips_uses_reserve() {
        let mut fx = armed(Weapon::Mp40, 0, 50);
        fx.config.no_weapon_clips = true;
        let mut log = EventLog::new();

        fx.with_context(&TestWorld::floor(), cmd_at(1008), &mut log, |ctx| {
            assert_eq!(ctx.weapon_ammo_available(Weapon::Mp40), 50);
            ctx.weapon_use_ammo(Weapon::Mp40, 1);
            assert!(!ctx.weapon_clip_empty(Weapon::Mp40));
        });
        assert_eq!(fx.ps.ammo[Weapon::Mp40.index()], 49);
    }
}
