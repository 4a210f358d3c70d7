// stance.rs — standing, crouching, prone and playing dead

use tracing::debug;

use etmove_common::events::{AnimScriptEvent, EntityEvent, EventSink};
use etmove_common::q_shared::{
    vector_length, ChargeState, DoubleTap, EFlags, HeavyWeaponUse, PmFlags, PmType, Trace,
    WButtons, PRONE_VIEWHEIGHT,
};
use etmove_common::weapons::{Weapon, WeaponClass, WeaponState};

use crate::pmove::{PmoveCallbacks, PmoveContext};

const PRONE_DELAY: i32 = 750;
const PRONE_DELAY_LONG: i32 = 1750;

/// Getting up blocks jumping for this long out of the normal jump delay.
const GET_UP_JUMP_BLOCK: i32 = 650;
const PLAY_DEAD_RECOVER_TIME: i32 = 500;

impl<C: PmoveCallbacks, S: EventSink> PmoveContext<'_, '_, C, S> {
    // --------------------------------------------------------
    // Helpers
    // --------------------------------------------------------

    /// Player-sized box from the state's extents with the given top.
    fn set_stance_box(&mut self, max_z: f32) {
        let ps = &*self.pm.ps;
        self.pm.mins = ps.mins;
        self.pm.maxs = [ps.maxs[0], ps.maxs[1], max_z];
    }

    fn prone_max_z(&self) -> f32 {
        let ps = &*self.pm.ps;
        ps.maxs[2] - ps.stand_view_height - PRONE_VIEWHEIGHT
    }

    /// Trace in place as if the player had `stance` (PRONE, PLAYDEAD or
    /// neither) instead of their current lying flags.
    fn trace_in_stance(&mut self, stance: EFlags) -> Trace {
        let lying = EFlags::PRONE | EFlags::PLAYDEAD;
        let saved = self.pm.ps.e_flags;

        self.pm.ps.e_flags.remove(lying);
        self.pm.ps.e_flags.insert(stance & lying);
        let origin = self.pm.ps.origin;
        let trace = self.trace_all(&origin, &origin);

        self.pm.ps.e_flags = saved;
        trace
    }

    fn prone_delay(&self) -> i32 {
        if self.pm.config.prone_delay {
            PRONE_DELAY_LONG
        } else {
            PRONE_DELAY
        }
    }

    /// Getting off the floor: crouch for a bit and block the next jump.
    fn get_up_from_floor(&mut self) {
        let now = self.now();
        self.pm.ps.pm_flags.insert(PmFlags::DUCKED);
        self.pm.pmext.jump_time = now - GET_UP_JUMP_BLOCK;
        self.pm.ps.jump_time = now - GET_UP_JUMP_BLOCK;
        // no double jump either
        self.pm.ps.pm_flags.insert(PmFlags::DOUBLEJUMPING);
    }

    // --------------------------------------------------------
    // PM_CheckDuck
    // --------------------------------------------------------

    /// Sets the movement box and view height for standing or crouching.
    pub(crate) fn check_duck(&mut self) {
        let stand_z = self.pm.ps.maxs[2];
        self.set_stance_box(stand_z);

        if self.pm.ps.pm_type == PmType::Dead {
            // the corpse box itself comes from the host
            self.pm.ps.viewheight = self.pm.ps.dead_view_height as i32;
            return;
        }

        let wants_duck = self.pm.cmd.upmove < 0
            && !self.eflag(EFlags::MOUNTEDTANK)
            && !self.pmflag(PmFlags::LADDER);

        if wants_duck || self.pm.ps.weapon == Weapon::MortarSet {
            self.pm.ps.pm_flags.insert(PmFlags::DUCKED);
        } else if self.pmflag(PmFlags::DUCKED) {
            // try to stand up
            let origin = self.pm.ps.origin;
            if !self.trace_all(&origin, &origin).allsolid {
                self.pm.ps.pm_flags.remove(PmFlags::DUCKED);
            }
        }

        if self.pmflag(PmFlags::DUCKED) {
            self.pm.maxs[2] = self.pm.ps.crouch_max_z;
            self.pm.ps.viewheight = self.pm.ps.crouch_view_height as i32;
        } else {
            self.pm.maxs[2] = stand_z;
            self.pm.ps.viewheight = self.pm.ps.stand_view_height as i32;
        }
    }

    // --------------------------------------------------------
    // PM_CheckProne
    // --------------------------------------------------------

    /// Enter or leave prone. Returns true while prone, in which case the
    /// movement box and view height are already set.
    pub(crate) fn check_prone(&mut self) -> bool {
        let now = self.now();
        let delay = self.prone_delay();

        if !self.eflag(EFlags::PRONE) && self.can_go_prone() {
            let cmd = self.pm.cmd;
            let asked = (self.pmflag(PmFlags::DUCKED) && cmd.double_tap == DoubleTap::MoveForward)
                || cmd.wbuttons.contains(WButtons::PRONE);

            // prone_time holds the negated time prone was last left
            if asked && now + self.pm.pmext.prone_time > delay {
                let crouch_z = self.pm.ps.crouch_max_z;
                self.set_stance_box(crouch_z);

                let trace = self.trace_in_stance(EFlags::PRONE);
                if !trace.startsolid && !trace.allsolid {
                    debug!("go prone");
                    self.pm.ps.pm_flags.insert(PmFlags::DUCKED);
                    self.pm.ps.e_flags.insert(EFlags::PRONE);
                    self.pm.pmext.prone_time = now;
                    self.pm.pmext.prone_ground_time = now;
                }
            }
        }

        if self.eflag(EFlags::PRONE) {
            let cmd = self.pm.cmd;
            let forced = self.pm.waterlevel > 1
                || self.pm.ps.pm_type == PmType::Dead
                || self.eflag(EFlags::MOUNTEDTANK);
            let asked = (cmd.double_tap == DoubleTap::MoveBack
                || cmd.upmove > 10
                || cmd.wbuttons.contains(WButtons::PRONE))
                && now - self.pm.pmext.prone_time > delay;

            if forced || asked {
                // see if we have the space to stop prone
                let crouch_z = self.pm.ps.crouch_max_z;
                self.set_stance_box(crouch_z);

                if !self.trace_in_stance(EFlags::empty()).allsolid {
                    debug!("leave prone");
                    self.get_up_from_floor();
                    self.pm.ps.e_flags.remove(EFlags::PRONE | EFlags::PRONE_MOVING);
                    self.pm.pmext.prone_time = -now;

                    if self.pm.ps.weapon == Weapon::MobileMg42Set {
                        self.begin_weapon_change(Weapon::MobileMg42Set, Weapon::MobileMg42, false);
                    }
                }
            }
        }

        if !self.eflag(EFlags::PRONE) {
            return false;
        }

        // crawling drops scopes
        let speed = vector_length(&self.pm.ps.velocity);
        let cmd = self.pm.cmd;
        let input = (cmd.forwardmove as i32).abs() + (cmd.rightmove as i32).abs() > 10;

        if input && speed > 40.0 && !self.eflag(EFlags::PRONE_MOVING) {
            self.pm.ps.e_flags.insert(EFlags::PRONE_MOVING);

            let weapon = self.pm.ps.weapon;
            let scoped = self.def(weapon).class.contains(WeaponClass::SCOPED);
            if let Some(base) = weapon.alt().filter(|_| scoped) {
                self.begin_weapon_change(weapon, base, false);
            }
        } else if !input && speed < 20.0 && self.eflag(EFlags::PRONE_MOVING) {
            self.pm.ps.e_flags.remove(EFlags::PRONE_MOVING);
        }

        let prone_z = self.prone_max_z();
        self.set_stance_box(prone_z);
        self.pm.ps.viewheight = PRONE_VIEWHEIGHT as i32;
        true
    }

    fn can_go_prone(&self) -> bool {
        let ps = &*self.pm.ps;
        if ps.pm_flags.contains(PmFlags::LADDER) {
            return false;
        }
        if ps.hweapon_use != HeavyWeaponUse::None || ps.e_flags.contains(EFlags::MOUNTEDTANK) {
            return false;
        }
        if ps.weapon_delay != 0 && ps.weapon == Weapon::Panzerfaust {
            return false;
        }
        if ps.weapon == Weapon::MortarSet {
            return false;
        }
        // can't go prone while swimming
        self.pm.waterlevel <= 1
    }

    // --------------------------------------------------------
    // PM_CheckPlayDead
    // --------------------------------------------------------

    /// Toggle playing dead. A one-shot `PmType::PlayDead` requests the
    /// toggle; water forces the player back up. Returns true while lying
    /// still, with the movement box and view height already set.
    pub(crate) fn check_play_dead(&mut self) -> bool {
        let requested = self.pm.ps.pm_type == PmType::PlayDead;
        let playing = self.eflag(EFlags::PLAYDEAD);

        if !requested && !playing {
            return false;
        }

        if requested || (playing && self.pm.waterlevel > 0) {
            if requested {
                self.pm.ps.pm_type = PmType::Normal;
            }

            if !playing && self.pm.waterlevel < 1 {
                if !self.can_play_dead() {
                    return false;
                }

                let crouch_z = self.pm.ps.crouch_max_z;
                self.set_stance_box(crouch_z);
                let trace = self.trace_in_stance(EFlags::PLAYDEAD);
                if !trace.startsolid && !trace.allsolid {
                    debug!("play dead");
                    self.pm.ps.e_flags.insert(EFlags::PLAYDEAD);
                }
            } else if playing {
                self.stop_play_dead();
            }
        }

        if !self.eflag(EFlags::PLAYDEAD) {
            return false;
        }

        let prone_z = self.prone_max_z();
        self.set_stance_box(prone_z);
        self.pm.ps.viewheight = PRONE_VIEWHEIGHT as i32;
        true
    }

    fn can_play_dead(&self) -> bool {
        let ps = &*self.pm.ps;
        ps.health > 0
            && ps.weapon_state == WeaponState::Ready
            && !ps.pm_flags.contains(PmFlags::LADDER)
            && self.pm.pmext.a2_knife.state == ChargeState::Idle
            && ps.hweapon_use == HeavyWeaponUse::None
            && !ps.e_flags.contains(EFlags::MOUNTEDTANK)
    }

    /// Get up if there is room to crouch, or failing that room to lie prone.
    fn stop_play_dead(&mut self) {
        let crouch_z = self.pm.ps.crouch_max_z;
        self.set_stance_box(crouch_z);
        let mut trace = self.trace_in_stance(EFlags::empty());

        if trace.allsolid {
            let prone_z = self.prone_max_z();
            self.set_stance_box(prone_z);
            trace = self.trace_in_stance(EFlags::PRONE);
        }

        if trace.allsolid {
            return;
        }

        debug!("stop playing dead");
        self.get_up_from_floor();
        self.pm.ps.e_flags.remove(EFlags::PLAYDEAD);

        // force the get-up animation over whatever the torso is doing
        self.pm.ps.torso_timer = 0;
        self.script_event(AnimScriptEvent::JumpBk, false, true);

        // no shooting for a moment
        self.pm.ps.pm_flags.insert(PmFlags::TIME_LOCKPLAYER);
        self.pm.ps.pm_time = PLAY_DEAD_RECOVER_TIME;
        self.pm.ps.weapon_time += PLAY_DEAD_RECOVER_TIME;

        self.add_event(EntityEvent::ChangeWeapon);
        let raise = self.def(self.pm.ps.weapon).anims.raise;
        self.start_weapon_anim(raise);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{cmd_at, Fixture, TestWorld};
    use etmove_common::events::EventLog;
    use etmove_common::q_shared::{CROUCH_VIEWHEIGHT, DEFAULT_VIEWHEIGHT};

    #[test]
    fn test_duck_and_stand() {
        let mut fx = Fixture::standing();
        let mut log = EventLog::new();
        let mut cmd = cmd_at(1008);
        cmd.upmove = -127;

        fx.with_context(&TestWorld::floor(), cmd, &mut log, |ctx| {
            ctx.check_duck();
            assert_eq!(ctx.pm.maxs[2], ctx.pm.ps.crouch_max_z);
        });
        assert!(fx.ps.pm_flags.contains(PmFlags::DUCKED));
        assert_eq!(fx.ps.viewheight, CROUCH_VIEWHEIGHT as i32);

        fx.with_context(&TestWorld::floor(), cmd_at(1016), &mut log, |ctx| {
            ctx.check_duck();
            assert_eq!(ctx.pm.maxs[2], 48.0);
        });
        assert!(!fx.ps.pm_flags.contains(PmFlags::DUCKED));
        assert_eq!(fx.ps.viewheight, DEFAULT_VIEWHEIGHT as i32);
    }

    #[test]
    fn test_duck_stays_under_low_ceiling() {
        let world = TestWorld::floor().with_ceiling(60.0);
        let mut fx = Fixture::standing();
        fx.ps.pm_flags.insert(PmFlags::DUCKED);
        let mut log = EventLog::new();

        fx.with_context(&world, cmd_at(1008), &mut log, |ctx| ctx.check_duck());
        assert!(fx.ps.pm_flags.contains(PmFlags::DUCKED));
    }

    #[test]
    fn test_mortar_set_forces_crouch() {
        let mut fx = Fixture::standing();
        fx.ps.weapon = Weapon::MortarSet;
        let mut log = EventLog::new();

        fx.with_context(&TestWorld::floor(), cmd_at(1008), &mut log, |ctx| ctx.check_duck());
        assert!(fx.ps.pm_flags.contains(PmFlags::DUCKED));
    }

    #[test]
    fn test_dead_uses_dead_view_height() {
        let mut fx = Fixture::standing();
        fx.ps.pm_type = PmType::Dead;
        let mut log = EventLog::new();

        fx.with_context(&TestWorld::floor(), cmd_at(1008), &mut log, |ctx| ctx.check_duck());
        assert_eq!(fx.ps.viewheight, fx.ps.dead_view_height as i32);
    }

    #[test]
    fn test_go_prone_and_get_up() {
        let mut fx = Fixture::standing();
        let mut log = EventLog::new();
        let mut cmd = cmd_at(2000);
        cmd.wbuttons = WButtons::PRONE;

        fx.with_context(&TestWorld::floor(), cmd, &mut log, |ctx| {
            assert!(ctx.check_prone());
            assert_eq!(ctx.pm.maxs[2], 48.0 - 40.0 + 8.0);
        });
        assert!(fx.ps.e_flags.contains(EFlags::PRONE));
        assert_eq!(fx.ps.viewheight, PRONE_VIEWHEIGHT as i32);
        assert_eq!(fx.pmext.prone_time, 2000);

        // too soon to toggle back
        cmd.server_time = 2100;
        fx.with_context(&TestWorld::floor(), cmd, &mut log, |ctx| {
            assert!(ctx.check_prone());
        });

        cmd.server_time = 3000;
        fx.with_context(&TestWorld::floor(), cmd, &mut log, |ctx| {
            assert!(!ctx.check_prone());
        });
        assert!(!fx.ps.e_flags.contains(EFlags::PRONE));
        assert!(fx.ps.pm_flags.contains(PmFlags::DUCKED | PmFlags::DOUBLEJUMPING));
        assert_eq!(fx.pmext.prone_time, -3000);
        assert_eq!(fx.pmext.jump_time, 3000 - GET_UP_JUMP_BLOCK);
    }

    #[test]
    fn test_no_prone_in_deep_water() {
        let mut fx = Fixture::standing();
        let mut log = EventLog::new();
        let mut cmd = cmd_at(2000);
        cmd.wbuttons = WButtons::PRONE;

        fx.with_context(&TestWorld::floor(), cmd, &mut log, |ctx| {
            ctx.pm.waterlevel = 2;
            assert!(!ctx.check_prone());
        });
        assert!(!fx.ps.e_flags.contains(EFlags::PRONE));
    }

    #[test]
    fn test_prone_blocked_by_wall_for_legs() {
        // legs would go into the wall behind
        let world = TestWorld::ladder_wall(30.0).without_ladder();
        let mut fx = Fixture::standing();
        fx.ps.viewangles = [0.0, 180.0, 0.0];
        let mut log = EventLog::new();
        let mut cmd = cmd_at(2000);
        cmd.wbuttons = WButtons::PRONE;

        fx.with_context(&world, cmd, &mut log, |ctx| {
            assert!(!ctx.check_prone());
        });
        assert!(!fx.ps.e_flags.contains(EFlags::PRONE));
    }

    #[test]
    fn test_prone_moving_drops_scope() {
        let mut fx = Fixture::standing();
        fx.ps.e_flags.insert(EFlags::PRONE);
        fx.pmext.prone_time = 1000;
        fx.ps.give_weapon(Weapon::K43);
        fx.ps.give_weapon(Weapon::K43Scope);
        fx.ps.weapon = Weapon::K43Scope;
        fx.ps.velocity = [60.0, 0.0, 0.0];
        let mut log = EventLog::new();
        let mut cmd = cmd_at(1100);
        cmd.forwardmove = 127;

        fx.with_context(&TestWorld::floor(), cmd, &mut log, |ctx| {
            assert!(ctx.check_prone());
        });
        assert!(fx.ps.e_flags.contains(EFlags::PRONE_MOVING));
        assert_eq!(fx.ps.next_weapon, Weapon::K43);
    }

    #[test]
    fn test_play_dead_toggle() {
        let mut fx = Fixture::standing();
        fx.ps.pm_type = PmType::PlayDead;
        let mut log = EventLog::new();

        fx.with_context(&TestWorld::floor(), cmd_at(1008), &mut log, |ctx| {
            assert!(ctx.check_play_dead());
        });
        assert!(fx.ps.e_flags.contains(EFlags::PLAYDEAD));
        assert_eq!(fx.ps.pm_type, PmType::Normal);
        assert_eq!(fx.ps.viewheight, PRONE_VIEWHEIGHT as i32);

        // still lying there next tick
        fx.with_context(&TestWorld::floor(), cmd_at(1016), &mut log, |ctx| {
            assert!(ctx.check_play_dead());
        });

        fx.ps.pm_type = PmType::PlayDead;
        fx.with_context(&TestWorld::floor(), cmd_at(1024), &mut log, |ctx| {
            assert!(!ctx.check_play_dead());
        });
        assert!(!fx.ps.e_flags.contains(EFlags::PLAYDEAD));
        assert!(fx.ps.pm_flags.contains(PmFlags::TIME_LOCKPLAYER));
        assert_eq!(fx.ps.pm_time, PLAY_DEAD_RECOVER_TIME);
        assert!(log.has_script(AnimScriptEvent::JumpBk));
        assert!(log.has_event(EntityEvent::ChangeWeapon));
    }

    #[test]
    fn test_play_dead_refused_while_reloading() {
        let mut fx = Fixture::standing();
        fx.ps.pm_type = PmType::PlayDead;
        fx.ps.weapon_state = WeaponState::Reloading;
        let mut log = EventLog::new();

        fx.with_context(&TestWorld::floor(), cmd_at(1008), &mut log, |ctx| {
            assert!(!ctx.check_play_dead());
        });
        assert!(!fx.ps.e_flags.contains(EFlags::PLAYDEAD));
        // the request is consumed either way
        assert_eq!(fx.ps.pm_type, PmType::Normal);
    }

    #[test]
    fn test_water_ends_play_dead() {
        let mut fx = Fixture::standing();
        fx.ps.e_flags.insert(EFlags::PLAYDEAD);
        let mut log = EventLog::new();

        fx.with_context(&TestWorld::water(10.0), cmd_at(1008), &mut log, |ctx| {
            ctx.pm.waterlevel = 1;
            assert!(!ctx.check_play_dead());
        });
        assert!(!fx.ps.e_flags.contains(EFlags::PLAYDEAD));
    }
}
