// aimspread.rs — aim spread growth from view motion and its decay

use tracing::trace;

use etmove_common::cvar::{AimSpreadMode, MiscFlags};
use etmove_common::events::EventSink;
use etmove_common::q_shared::{
    short2angle, EFlags, PmFlags, Skill, SurfFlags, AIMSPREAD_MAX_HISTORY, ENTITYNUM_NONE,
};
use etmove_common::weapons::WeaponClass;

use crate::pmove::{PmoveCallbacks, PmoveContext};

const DECREASE_RATE: f32 = 200.0;
const INCREASE_RATE: f32 = 800.0;
// degrees per second
const VIEWRATE_MIN: f32 = 30.0;
const VIEWRATE_RANGE: f32 = 120.0;

const PRONE_SETTLE_TIME: i32 = 1750;
// shortest command interval the moving average trusts
const MIN_COMMAND_MSEC: i32 = 5;
// older history than this gap is not averaged
const MAX_HISTORY_GAP: i32 = 50;

const MAX_SPREAD: f32 = 255.0;

impl<C: PmoveCallbacks, S: EventSink> PmoveContext<'_, '_, C, S> {
    /// Update the aim spread from the view motion between `oldcmd` and `cmd`.
    pub(crate) fn adjust_aim_spread_scale(&mut self) {
        let now = self.pm.cmd.server_time;

        if self.eflag(EFlags::ZOOMING) {
            self.set_aim_spread(MAX_SPREAD);
            return;
        }

        // freshly prone players can't aim yet
        if self.pm.config.prone_delay
            && self.eflag(EFlags::PRONE)
            && now - self.pm.pmext.prone_time < PRONE_SETTLE_TIME
        {
            self.set_aim_spread(MAX_SPREAD);
            return;
        }

        let mode = self.pm.config.aim_spread_mode;
        let mut msec = now - self.pm.oldcmd.server_time;
        if mode == AimSpreadMode::MovingAverage && msec < MIN_COMMAND_MSEC {
            msec = MIN_COMMAND_MSEC;
        }
        let dt = msec as f32 / 1000.0;

        let weapon = self.pm.ps.weapon;
        let def = self.def(weapon);
        let scoped = def.class.contains(WeaponClass::SCOPED);
        let mut wpn_scale = def.spread_scale;
        if scoped {
            let trained = self.skill(Skill::MilitaryIntelligenceAndScopedWeapons) >= 3;
            wpn_scale = if trained || self.pm.config.sniper_war { 5.0 } else { 10.0 };
        }

        let (increase, decrease) = if wpn_scale > 0.0 {
            wpn_scale *= self.spread_stance_factor();
            let decrease = dt * DECREASE_RATE / wpn_scale;

            let mut angle = 0.0;
            for i in 0..2 {
                let now_angle = short2angle(self.pm.cmd.angles[i] as i16);
                let old_angle = short2angle(self.pm.oldcmd.angles[i] as i16);
                angle += (now_angle - old_angle).abs();
                if angle > 180.0 {
                    angle = 360.0 - angle;
                }
            }

            // scoped weapons also suffer from moving
            if scoped {
                angle += self.pm.ps.velocity[0].abs() + self.pm.ps.velocity[1].abs();
            }

            let mut speed = match mode {
                AimSpreadMode::Disabled => 0.0,
                AimSpreadMode::MovingAverage => self.aim_spread_moving_average(angle),
                AimSpreadMode::Classic if dt > 0.0 => angle / dt,
                AimSpreadMode::Classic => 0.0,
            };

            let range = VIEWRATE_RANGE / wpn_scale;
            speed = (speed - VIEWRATE_MIN / wpn_scale).clamp(0.0, range);
            let scale = speed / range;

            let mut increase = dt * scale * INCREASE_RATE;
            if mode != AimSpreadMode::MovingAverage {
                increase = increase.trunc();
            }
            (increase, decrease)
        } else {
            (0.0, DECREASE_RATE)
        };

        let spread = (self.pm.ps.aim_spread_scale_float + increase - decrease).clamp(0.0, MAX_SPREAD);
        self.set_aim_spread(spread);
        trace!(increase, decrease, spread, "aim spread");
    }

    fn set_aim_spread(&mut self, value: f32) {
        self.pm.ps.aim_spread_scale_float = value;
        self.pm.ps.aim_spread_scale = value as i32;
    }

    /// Spread sensitivity multiplier for the current stance and footing.
    fn spread_stance_factor(&self) -> f32 {
        let crouched = self.eflag(EFlags::CROUCHING);
        let prone = self.eflag(EFlags::PRONE);

        if !self.pm.config.misc.contains(MiscFlags::REALAIMSPREAD) {
            // crouched players settle faster
            return if crouched || prone { 0.5 } else { 1.0 };
        }

        // the tick has not traced yet; judge footing from last tick's results
        let on_ladder = self.pmflag(PmFlags::LADDER);
        let on_ground = self.pm.ps.ground_entity_num != ENTITYNUM_NONE;

        if on_ladder {
            return 1.25;
        }
        if !on_ground || self.eflag(EFlags::MOUNTEDTANK) {
            return 2.0;
        }

        let mut factor = 1.0;
        if self.pm.pmext.ground_surface.contains(SurfFlags::SLICK) {
            factor *= 2.0;
        }
        if crouched {
            factor *= 0.6;
        } else if prone {
            factor *= 0.4;
        }
        let wading = match self.pm.waterlevel {
            1 => 1.25,
            2 => 1.5,
            3 => 2.0,
            _ => 1.0,
        };
        factor * wading
    }

    /// Angular speed over the recent command history, in degrees per second.
    fn aim_spread_moving_average(&mut self, angle: f32) -> f32 {
        let now = self.pm.cmd.server_time;
        let mut total_time = now - self.pm.oldcmd.server_time;
        let history = &mut self.pm.pmext.aim_spread;

        let mut head = history.head % AIMSPREAD_MAX_HISTORY;
        history.angle[head] = angle;
        history.time[head] = now;

        let mut total_angle = angle;
        let mut reference = now;
        for _ in 0..AIMSPREAD_MAX_HISTORY - 1 {
            head = (head + AIMSPREAD_MAX_HISTORY - 1) % AIMSPREAD_MAX_HISTORY;
            let gap = reference - history.time[head];
            reference = history.time[head];
            if gap <= 0 || gap > MAX_HISTORY_GAP {
                break;
            }
            total_angle += history.angle[head];
            total_time += gap;
        }

        history.head = (history.head + 1) % AIMSPREAD_MAX_HISTORY;

        if total_time <= 0 {
            return 0.0;
        }
        total_angle / (total_time as f32 / 1000.0)
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
    use etmove_common::q_shared::{angle2short, UserCmd};
    use etmove_common::weapons::Weapon;

    fn armed(weapon: Weapon) -> Fixture {
        let mut fx = Fixture::standing();
        fx.ps.give_weapon(weapon);
        fx.ps.weapon = weapon;
        fx
    }

    fn adjust(fx: &mut Fixture, oldcmd: UserCmd, cmd: UserCmd) {
        let mut log = EventLog::new();
        fx.with_context(&TestWorld::floor(), cmd, &mut log, |ctx| {
            ctx.pm.oldcmd = oldcmd;
            ctx.adjust_aim_spread_scale();
        });
    }

    fn turned(time: i32, yaw: f32) -> UserCmd {
        let mut cmd = cmd_at(time);
        cmd.angles[1] = angle2short(yaw);
        cmd
    }

    #[test]
    fn test_zooming_maxes_spread() {
        let mut fx = armed(Weapon::Mp40);
        fx.ps.e_flags.insert(EFlags::ZOOMING);

        adjust(&mut fx, cmd_at(1000), cmd_at(1008));
        assert_eq!(fx.ps.aim_spread_scale, 255);
    }

    #[test]
    fn test_prone_delay_maxes_spread() {
        let mut fx = armed(Weapon::Mp40);
        fx.config.prone_delay = true;
        fx.ps.e_flags.insert(EFlags::PRONE);
        fx.pmext.prone_time = 1000;

        adjust(&mut fx, cmd_at(1000), cmd_at(1500));
        assert_eq!(fx.ps.aim_spread_scale, 255);

        // settled
        fx.ps.aim_spread_scale_float = 0.0;
        adjust(&mut fx, cmd_at(2900), cmd_at(2908));
        assert_eq!(fx.ps.aim_spread_scale, 0);
    }

    #[test]
    fn test_spread_decays_when_still() {
        let mut fx = armed(Weapon::Mp40);
        fx.ps.aim_spread_scale_float = 100.0;

        adjust(&mut fx, cmd_at(1000), cmd_at(1050));
        // 0.05 s * 200 / 0.6
        let expected = 100.0 - 0.05 * 200.0 / 0.6;
        assert!((fx.ps.aim_spread_scale_float - expected).abs() < 1e-3);
        assert_eq!(fx.ps.aim_spread_scale, expected as i32);
    }

    #[test]
    fn test_spread_grows_with_fast_turn() {
        let mut fx = armed(Weapon::Mp40);

        adjust(&mut fx, turned(1000, 0.0), turned(1050, 20.0));
        // 400 deg/s saturates the rate range
        let expected = (0.05f32 * 800.0).trunc() - 0.05 * 200.0 / 0.6;
        assert!((fx.ps.aim_spread_scale_float - expected).abs() < 0.1);
    }

    #[test]
    fn test_spread_disabled_mode_only_decays() {
        let mut fx = armed(Weapon::Mp40);
        fx.config.aim_spread_mode = AimSpreadMode::Disabled;
        fx.ps.aim_spread_scale_float = 50.0;

        adjust(&mut fx, turned(1000, 0.0), turned(1050, 20.0));
        assert!(fx.ps.aim_spread_scale_float < 50.0);
    }

    #[test]
    fn test_spreadless_weapon_resets() {
        let mut fx = armed(Weapon::Knife);
        fx.ps.aim_spread_scale_float = 150.0;

        adjust(&mut fx, cmd_at(1000), cmd_at(1008));
        assert_eq!(fx.ps.aim_spread_scale, 0);
    }

    #[test]
    fn test_spread_stays_in_range() {
        let mut fx = armed(Weapon::K43Scope);
        fx.ps.aim_spread_scale_float = 250.0;
        fx.ps.velocity = [300.0, 300.0, 0.0];

        for t in 0..20 {
            let base = 1000 + t * 50;
            adjust(&mut fx, turned(base, 0.0), turned(base + 50, 90.0));
            assert!((0.0..=255.0).contains(&fx.ps.aim_spread_scale_float));
        }
        assert_eq!(fx.ps.aim_spread_scale, 255);
    }

    #[test]
    fn test_moving_average_over_history() {
        let mut fx = armed(Weapon::Mp40);
        fx.config.aim_spread_mode = AimSpreadMode::MovingAverage;
        let mut log = EventLog::new();

        let speeds: Vec<f32> = (0..3)
            .map(|i| {
                let t = 1000 + i * 10;
                fx.with_context(&TestWorld::floor(), cmd_at(t + 10), &mut log, |ctx| {
                    ctx.pm.oldcmd = cmd_at(t);
                    ctx.aim_spread_moving_average(1.0)
                })
            })
            .collect();

        // 1 degree per 10 ms either way
        for speed in speeds {
            assert!((speed - 100.0).abs() < 1e-3);
        }
        assert_eq!(fx.pmext.aim_spread.head, 3);
    }

    #[test]
    fn test_real_aim_spread_in_air() {
        let mut fx = armed(Weapon::Mp40);
        fx.config.misc.insert(MiscFlags::REALAIMSPREAD);
        fx.ps.ground_entity_num = ENTITYNUM_NONE;
        fx.ps.aim_spread_scale_float = 100.0;

        adjust(&mut fx, cmd_at(1000), cmd_at(1050));
        // airborne doubles the weapon scale, halving the decay
        let expected = 100.0 - 0.05 * 200.0 / 1.2;
        assert!((fx.ps.aim_spread_scale_float - expected).abs() < 1e-3);
    }
}
