// enhanced_attack.rs — secondary-attack state machines: alt click, molotov and throwing knife

use tracing::debug;

use etmove_common::cvar::WeaponFlags;
use etmove_common::events::{AnimScriptEvent, EntityEvent, EventSink};
use etmove_common::q_shared::{
    Buttons, ChargeRecord, ChargeState, EFlags, PmType, PmoveExt, UserCmd, WButtons,
};
use etmove_common::weapons::{WeapAnim, Weapon};

use crate::error::PmoveError;
use crate::pmove::{PmoveCallbacks, PmoveContext};

const NO_AMMO_RETRY: i32 = 250;
// hold time per arming level
const ARMING_STEP: i32 = 100;

/// How far the throw was wound up.
struct ArmingLevel {
    weapon_anim: WeapAnim,
    script: AnimScriptEvent,
    /// Time the throw animation runs before release; 0 releases next tick.
    throw_period: i32,
}

const ARMING_LEVELS: [ArmingLevel; 5] = [
    ArmingLevel { weapon_anim: WeapAnim::Attack1, script: AnimScriptEvent::FireWeapon, throw_period: 0 },
    ArmingLevel { weapon_anim: WeapAnim::Attack1, script: AnimScriptEvent::FireWeapon, throw_period: 50 },
    ArmingLevel { weapon_anim: WeapAnim::Attack1, script: AnimScriptEvent::FireWeapon, throw_period: 100 },
    ArmingLevel { weapon_anim: WeapAnim::Attack2, script: AnimScriptEvent::FireWeapon2, throw_period: 150 },
    ArmingLevel { weapon_anim: WeapAnim::Attack2, script: AnimScriptEvent::FireWeapon2, throw_period: 200 },
];

// ============================================================
// Throw strategies
// ============================================================

#[derive(Clone, Copy)]
enum TriggerButton {
    Attack,
    Attack2,
}

impl TriggerButton {
    fn held(self, cmd: &UserCmd) -> bool {
        match self {
            TriggerButton::Attack => cmd.buttons.contains(Buttons::ATTACK),
            TriggerButton::Attack2 => cmd.wbuttons.contains(WButtons::ATTACK2),
        }
    }
}

#[derive(Clone, Copy)]
enum AmmoSlot {
    Clip,
    Reserve,
}

/// What sets one thrown weapon apart from another.
struct ThrowStrategy {
    name: &'static str,
    weapon: Weapon,
    button: TriggerButton,
    enabled_by: WeaponFlags,
    ammo: AmmoSlot,
    base_velocity: i32,
    velocity_per_level: i32,
    event: EntityEvent,
    /// Drop the weapon once the last one is gone.
    switch_if_empty: bool,
    record: fn(&mut PmoveExt) -> &mut ChargeRecord,
}

fn molotov_record(ext: &mut PmoveExt) -> &mut ChargeRecord {
    &mut ext.a2_molotov
}

fn knife_record(ext: &mut PmoveExt) -> &mut ChargeRecord {
    &mut ext.a2_knife
}

const MOLOTOV: ThrowStrategy = ThrowStrategy {
    name: "molotov",
    weapon: Weapon::Molotov,
    button: TriggerButton::Attack,
    enabled_by: WeaponFlags::MOLOTOV,
    ammo: AmmoSlot::Clip,
    base_velocity: 400,
    velocity_per_level: 35,
    event: EntityEvent::ThrowMolotov,
    switch_if_empty: true,
    record: molotov_record,
};

const THROWING_KNIFE: ThrowStrategy = ThrowStrategy {
    name: "throwing knife",
    weapon: Weapon::Knife,
    button: TriggerButton::Attack2,
    enabled_by: WeaponFlags::THKNIVES,
    ammo: AmmoSlot::Reserve,
    base_velocity: 600,
    velocity_per_level: 120,
    event: EntityEvent::ThrowKnife,
    switch_if_empty: false,
    record: knife_record,
};

impl<C: PmoveCallbacks, S: EventSink> PmoveContext<'_, '_, C, S> {
    /// Run the secondary-attack machine for the held weapon. `Ok(true)`
    /// means it consumed the tick and the regular weapon step must not run.
    pub(crate) fn enhanced_attack(&mut self) -> Result<bool, PmoveError> {
        match self.pm.ps.weapon {
            Weapon::Knife => self.throw_process(&THROWING_KNIFE),
            Weapon::Molotov => self.throw_process(&MOLOTOV),
            _ => self.alt_process(),
        }
    }

    // ============================================================
    // Alt click
    // ============================================================

    fn alt_process(&mut self) -> Result<bool, PmoveError> {
        let held = self.pm.cmd.wbuttons.contains(WButtons::ATTACK2);
        match self.pm.pmext.a2_alt.state {
            ChargeState::Idle => {
                if held {
                    let client = self.pm.ps.client_num;
                    self.add_event_ext(EntityEvent::AltAttack2, client);
                    self.pm.pmext.a2_alt.state = ChargeState::Clicked;
                }
            }
            ChargeState::Clicked => {
                if !held {
                    self.pm.pmext.a2_alt.state = ChargeState::Idle;
                }
            }
            state => {
                return Err(PmoveError::InvalidChargeState { machine: "alt", state });
            }
        }
        Ok(false)
    }

    // ============================================================
    // Charge and throw
    // ============================================================

    fn throw_record(&mut self, strategy: &ThrowStrategy) -> &mut ChargeRecord {
        (strategy.record)(&mut *self.pm.pmext)
    }

    fn throw_ammo(&self, strategy: &ThrowStrategy) -> i32 {
        let slot = strategy.weapon.index();
        match strategy.ammo {
            AmmoSlot::Clip => self.pm.ps.ammoclip[slot],
            AmmoSlot::Reserve => self.pm.ps.ammo[slot],
        }
    }

    fn throw_to_idle(&mut self, strategy: &ThrowStrategy) {
        let record = self.throw_record(strategy);
        if record.state == ChargeState::Idle {
            return;
        }
        record.state = ChargeState::Idle;
        self.start_weapon_anim(WeapAnim::Idle1);
    }

    fn throw_process(&mut self, strategy: &ThrowStrategy) -> Result<bool, PmoveError> {
        let now = self.now();
        let held = strategy.button.held(&self.pm.cmd);
        let record = *self.throw_record(strategy);
        let waiting = record.state_alarm > now;

        match record.state {
            ChargeState::Idle => {
                if !self.pm.config.weapons.contains(strategy.enabled_by) {
                    return Ok(false);
                }
                if waiting {
                    return Ok(true);
                }
                if !held || self.eflag(EFlags::ZOOMING) {
                    return Ok(false);
                }
                if self.pm.ps.pm_type == PmType::Dead || self.eflag(EFlags::PLAYDEAD) {
                    return Ok(true);
                }

                if self.throw_ammo(strategy) < 1 {
                    self.add_event(EntityEvent::NoAmmo);
                    self.throw_record(strategy).state_alarm = now + NO_AMMO_RETRY;
                    return Ok(true);
                }

                let record = self.throw_record(strategy);
                record.state = ChargeState::Arming;
                record.depressed_time = now;
                self.start_weapon_anim(WeapAnim::Arming);
                Ok(true)
            }

            ChargeState::Arming => {
                if waiting || held {
                    return Ok(true);
                }

                let held_for = (now - record.depressed_time) / ARMING_STEP;
                let index = held_for.clamp(0, ARMING_LEVELS.len() as i32 - 1) as usize;
                let level = &ARMING_LEVELS[index];

                self.start_weapon_anim(level.weapon_anim);
                self.script_event(level.script, false, false);

                let record = self.throw_record(strategy);
                record.arming_index = index;
                record.state_alarm = if level.throw_period != 0 { now + level.throw_period } else { 0 };
                record.state = ChargeState::Throwing;
                debug!(machine = strategy.name, index, "armed");
                Ok(true)
            }

            ChargeState::Throwing => {
                if waiting {
                    return Ok(true);
                }
                if self.pm.waterlevel == 3 {
                    self.add_event(EntityEvent::NoFireUnderwater);
                    self.throw_to_idle(strategy);
                    return Ok(true);
                }
                self.throw_record(strategy).state = ChargeState::Release;
                Ok(true)
            }

            ChargeState::Release => {
                if waiting {
                    return Ok(true);
                }

                let mut velocity =
                    strategy.base_velocity + (record.arming_index as i32 + 1) * strategy.velocity_per_level;
                match self.pm.waterlevel {
                    1 => velocity = (velocity as f32 * 0.85) as i32,
                    2 => velocity = (velocity as f32 * 0.5) as i32,
                    3 => {
                        self.add_event(EntityEvent::NoFireUnderwater);
                        self.throw_to_idle(strategy);
                        return Ok(true);
                    }
                    _ => {}
                }

                let slot = strategy.weapon.index();
                match strategy.ammo {
                    AmmoSlot::Clip => self.pm.ps.ammoclip[slot] -= 1,
                    AmmoSlot::Reserve => self.pm.ps.ammo[slot] -= 1,
                }

                self.add_event_ext(strategy.event, velocity);
                debug!(machine = strategy.name, velocity, "thrown");
                self.throw_to_idle(strategy);
                if strategy.switch_if_empty {
                    self.switch_if_empty();
                }
                Ok(true)
            }

            state => Err(PmoveError::InvalidChargeState { machine: strategy.name, state }),
        }
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
    use etmove_common::q_shared::ANIM_TOGGLEBIT;

    fn molotov(clip: i32) -> Fixture {
        let mut fx = Fixture::standing();
        fx.config.weapons.insert(WeaponFlags::MOLOTOV);
        fx.ps.give_weapon(Weapon::Molotov);
        fx.ps.weapon = Weapon::Molotov;
        fx.ps.ammoclip[Weapon::Molotov.index()] = clip;
        fx
    }

    fn knife(reserve: i32) -> Fixture {
        let mut fx = Fixture::standing();
        fx.config.weapons.insert(WeaponFlags::THKNIVES);
        fx.ps.give_weapon(Weapon::Knife);
        fx.ps.weapon = Weapon::Knife;
        fx.ps.ammo[Weapon::Knife.index()] = reserve;
        fx
    }

    fn cmd(weapon: Weapon, time: i32, buttons: Buttons, wbuttons: WButtons) -> UserCmd {
        UserCmd { weapon, buttons, wbuttons, ..cmd_at(time) }
    }

    fn run(fx: &mut Fixture, cmd: UserCmd, log: &mut EventLog) -> Result<bool, PmoveError> {
        fx.with_context(&TestWorld::floor(), cmd, log, |ctx| ctx.enhanced_attack())
    }

    #[test]
    fn test_alt_click_fires_once_per_press() {
        let mut fx = Fixture::standing();
        fx.ps.client_num = 3;
        let mut log = EventLog::new();
        let press = |t| cmd(Weapon::None, t, Buttons::empty(), WButtons::ATTACK2);

        assert_eq!(run(&mut fx, press(1008), &mut log), Ok(false));
        assert_eq!(fx.pmext.a2_alt.state, ChargeState::Clicked);
        run(&mut fx, press(1016), &mut log).expect("alt");
        let clicks: Vec<_> = log
            .entity_events()
            .filter(|(ev, _)| *ev == EntityEvent::AltAttack2)
            .collect();
        assert_eq!(clicks, vec![(EntityEvent::AltAttack2, 3)]);

        run(&mut fx, cmd_at(1024), &mut log).expect("alt");
        assert_eq!(fx.pmext.a2_alt.state, ChargeState::Idle);
    }

    #[test]
    fn test_alt_machine_rejects_throw_states() {
        let mut fx = Fixture::standing();
        fx.pmext.a2_alt.state = ChargeState::Release;
        let mut log = EventLog::new();

        let err = run(&mut fx, cmd_at(1008), &mut log).unwrap_err();
        assert_eq!(
            err,
            PmoveError::InvalidChargeState { machine: "alt", state: ChargeState::Release }
        );
    }

    #[test]
    fn test_molotov_disabled_falls_through() {
        let mut fx = molotov(1);
        fx.config.weapons.remove(WeaponFlags::MOLOTOV);
        let mut log = EventLog::new();

        let press = cmd(Weapon::Molotov, 1008, Buttons::ATTACK, WButtons::empty());
        assert_eq!(run(&mut fx, press, &mut log), Ok(false));
        assert_eq!(fx.pmext.a2_molotov.state, ChargeState::Idle);
    }

    #[test]
    fn test_molotov_full_throw() {
        let mut fx = molotov(2);
        let mut log = EventLog::new();
        let press = |t| cmd(Weapon::Molotov, t, Buttons::ATTACK, WButtons::empty());
        let release = |t| cmd(Weapon::Molotov, t, Buttons::empty(), WButtons::empty());

        assert_eq!(run(&mut fx, press(1000), &mut log), Ok(true));
        assert_eq!(fx.pmext.a2_molotov.state, ChargeState::Arming);
        assert_eq!(fx.ps.weap_anim & !ANIM_TOGGLEBIT, WeapAnim::Arming as i32);

        // holding keeps arming
        run(&mut fx, press(1150), &mut log).expect("molotov");
        assert_eq!(fx.pmext.a2_molotov.state, ChargeState::Arming);

        // released after 250 ms: level 2
        run(&mut fx, release(1250), &mut log).expect("molotov");
        assert_eq!(fx.pmext.a2_molotov.state, ChargeState::Throwing);
        assert_eq!(fx.pmext.a2_molotov.arming_index, 2);
        assert_eq!(fx.pmext.a2_molotov.state_alarm, 1350);

        // throw animation still running
        run(&mut fx, release(1300), &mut log).expect("molotov");
        assert_eq!(fx.pmext.a2_molotov.state, ChargeState::Throwing);

        run(&mut fx, release(1350), &mut log).expect("molotov");
        assert_eq!(fx.pmext.a2_molotov.state, ChargeState::Release);

        run(&mut fx, release(1358), &mut log).expect("molotov");
        assert_eq!(fx.pmext.a2_molotov.state, ChargeState::Idle);
        assert_eq!(fx.ps.ammoclip[Weapon::Molotov.index()], 1);
        let thrown: Vec<_> = log
            .entity_events()
            .filter(|(ev, _)| *ev == EntityEvent::ThrowMolotov)
            .collect();
        assert_eq!(thrown, vec![(EntityEvent::ThrowMolotov, 400 + 3 * 35)]);
    }

    #[test]
    fn test_molotov_without_ammo_clicks_and_waits() {
        let mut fx = molotov(0);
        let mut log = EventLog::new();
        let press = |t| cmd(Weapon::Molotov, t, Buttons::ATTACK, WButtons::empty());

        assert_eq!(run(&mut fx, press(1008), &mut log), Ok(true));
        assert!(log.has_event(EntityEvent::NoAmmo));
        assert_eq!(fx.pmext.a2_molotov.state_alarm, 1008 + NO_AMMO_RETRY);

        log.clear();
        assert_eq!(run(&mut fx, press(1016), &mut log), Ok(true));
        assert!(!log.has_event(EntityEvent::NoAmmo));
    }

    #[test]
    fn test_last_molotov_switches_away() {
        let mut fx = molotov(1);
        fx.pmext.a2_molotov.state = ChargeState::Release;
        let mut log = EventLog::new();

        run(&mut fx, cmd(Weapon::Molotov, 1008, Buttons::empty(), WButtons::empty()), &mut log)
            .expect("molotov");
        assert_eq!(fx.ps.ammoclip[Weapon::Molotov.index()], 0);
        assert!(log.has_event(EntityEvent::NoAmmo));
    }

    #[test]
    fn test_knife_throw_slowed_by_water() {
        let mut fx = knife(3);
        fx.pmext.a2_knife.state = ChargeState::Release;
        fx.pmext.a2_knife.arming_index = 4;
        let mut log = EventLog::new();

        let release = cmd(Weapon::Knife, 1008, Buttons::empty(), WButtons::empty());
        fx.with_context(&TestWorld::floor(), release, &mut log, |ctx| {
            ctx.pm.waterlevel = 2;
            ctx.enhanced_attack()
        })
        .expect("knife");

        let velocity = ((600 + 5 * 120) as f32 * 0.5) as i32;
        let thrown: Vec<_> = log
            .entity_events()
            .filter(|(ev, _)| *ev == EntityEvent::ThrowKnife)
            .collect();
        assert_eq!(thrown, vec![(EntityEvent::ThrowKnife, velocity)]);
        assert_eq!(fx.ps.ammo[Weapon::Knife.index()], 2);
    }

    #[test]
    fn test_knife_underwater_aborts() {
        let mut fx = knife(3);
        fx.pmext.a2_knife.state = ChargeState::Throwing;
        let mut log = EventLog::new();

        let release = cmd(Weapon::Knife, 1008, Buttons::empty(), WButtons::empty());
        fx.with_context(&TestWorld::floor(), release, &mut log, |ctx| {
            ctx.pm.waterlevel = 3;
            ctx.enhanced_attack()
        })
        .expect("knife");
        assert!(log.has_event(EntityEvent::NoFireUnderwater));
        assert_eq!(fx.pmext.a2_knife.state, ChargeState::Idle);
        assert_eq!(fx.ps.ammo[Weapon::Knife.index()], 3);
    }

    #[test]
    fn test_knife_zooming_ignored() {
        let mut fx = knife(3);
        fx.ps.e_flags.insert(EFlags::ZOOMING);
        let mut log = EventLog::new();

        let press = cmd(Weapon::Knife, 1008, Buttons::empty(), WButtons::ATTACK2);
        assert_eq!(run(&mut fx, press, &mut log), Ok(false));
    }

    #[test]
    fn test_throw_machine_rejects_clicked() {
        let mut fx = knife(3);
        fx.pmext.a2_knife.state = ChargeState::Clicked;
        let mut log = EventLog::new();

        let err = run(&mut fx, cmd_at(1008), &mut log).unwrap_err();
        assert!(matches!(err, PmoveError::InvalidChargeState { machine: "throwing knife", .. }));
    }
}
