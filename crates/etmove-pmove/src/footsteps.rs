// footsteps.rs — legs animation, bob cycle, footstep and water sounds

use etmove_common::events::{EntityEvent, EventSink, MoveAnim};
use etmove_common::q_shared::{Buttons, EFlags, HeavyWeaponUse, PmFlags, ENTITYNUM_NONE};

use crate::pmove::{PmoveCallbacks, PmoveContext};

/// Head out of the water with less air left than this gasps.
const GASP_AIR: i32 = 6000;

impl<C: PmoveCallbacks, S: EventSink> PmoveContext<'_, '_, C, S> {
    /// Strafe animation when moving purely sideways.
    fn strafe_anim(&self) -> Option<MoveAnim> {
        let cmd = &self.pm.cmd;
        if cmd.rightmove == 0 || cmd.forwardmove != 0 {
            return None;
        }
        Some(if cmd.rightmove > 0 {
            MoveAnim::StrafeRight
        } else {
            MoveAnim::StrafeLeft
        })
    }

    // --------------------------------------------------------
    // PM_Footsteps
    // --------------------------------------------------------

    /// Pick the legs animation and advance the bob cycle, emitting a
    /// footstep or splash each time the cycle crosses a step.
    pub(crate) fn footsteps(&mut self) {
        if self.eflag(EFlags::DEAD | EFlags::PLAYDEAD) {
            if self.pmflag(PmFlags::FLAILING) {
                self.move_anim(MoveAnim::Flailing);
                if self.pm.ps.pm_time == 0 {
                    // the eagle has landed
                    self.pm.ps.pm_flags.remove(PmFlags::FLAILING);
                }
            } else if self.pm.ps.pm_time == 0 && !self.pmflag(PmFlags::LIMBO) {
                if self.pm.ps.ground_entity_num == ENTITYNUM_NONE {
                    // takeoff
                    self.pm.ps.pm_flags.insert(PmFlags::FLAILING);
                    self.move_anim(MoveAnim::Flailing);
                } else {
                    self.move_anim(MoveAnim::Fallen);
                }
            }
            return;
        }

        let velocity = self.pm.ps.velocity;
        self.pm.xyspeed = (velocity[0] * velocity[0] + velocity[1] * velocity[1]).sqrt();

        // emplacements always idle
        if self.pm.ps.hweapon_use != HeavyWeaponUse::None {
            self.move_anim(MoveAnim::Idle);
            return;
        }

        let backwards = self.pmflag(PmFlags::BACKWARDS_RUN);

        if self.pm.waterlevel > 2 {
            self.move_anim(if backwards { MoveAnim::SwimBk } else { MoveAnim::Swim });
            return;
        }

        if self.pm.ps.ground_entity_num == ENTITYNUM_NONE {
            if self.pmflag(PmFlags::LADDER) {
                let anim = if velocity[2] >= 0.0 {
                    MoveAnim::ClimbUp
                } else {
                    MoveAnim::ClimbDown
                };
                self.move_anim(anim);
            }
            return;
        }

        let cmd = self.pm.cmd;

        // not trying to move
        if cmd.forwardmove == 0 && cmd.rightmove == 0 {
            if self.pm.xyspeed < 5.0 {
                // start at beginning of cycle again
                self.pm.ps.bob_cycle = 0;
            }
            if self.pm.xyspeed > 120.0 {
                // keep what was playing until we stop
                return;
            }

            let anim = if self.eflag(EFlags::PRONE) {
                MoveAnim::IdleProne
            } else if self.pmflag(PmFlags::DUCKED) {
                MoveAnim::IdleCr
            } else {
                MoveAnim::Idle
            };
            self.move_anim(anim);
            return;
        }

        let walking = cmd.buttons.contains(Buttons::WALKING);
        let mut footstep = false;

        let (bobmove, anim) = if self.eflag(EFlags::PRONE) {
            // prone characters bob slower and never play footsteps
            (0.2, if backwards { MoveAnim::ProneBk } else { MoveAnim::Prone })
        } else if self.pmflag(PmFlags::DUCKED) {
            // ducked characters bob much faster and never play footsteps
            (0.5, if backwards { MoveAnim::WalkCrBk } else { MoveAnim::WalkCr })
        } else if !walking {
            footstep = true;
            let run = if backwards { MoveAnim::RunBk } else { MoveAnim::Run };
            (0.4, self.strafe_anim().unwrap_or(run))
        } else {
            let walk = if backwards { MoveAnim::WalkBk } else { MoveAnim::Walk };
            (0.3, self.strafe_anim().unwrap_or(walk))
        };
        self.move_anim(anim);

        let old = self.pm.ps.bob_cycle;
        self.pm.ps.bob_cycle = (old as f32 + bobmove * self.pml.msec as f32) as i32 & 255;

        // a step lands every time the cycle crosses a half
        if ((old + 64) ^ (self.pm.ps.bob_cycle + 64)) & 128 == 0 {
            return;
        }

        match self.pm.waterlevel {
            0 => {
                // on ground will only play sounds if running
                if footstep && !self.pm.config.no_footsteps {
                    let parm = self.footstep_parm();
                    self.add_event_ext(EntityEvent::Footstep, parm);
                }
            }
            // splashing
            1 => self.add_event(EntityEvent::FootSplash),
            // wading / swimming at surface
            2 => self.add_event(EntityEvent::Swim),
            // no sound when completely underwater
            _ => {}
        }
    }

    // --------------------------------------------------------
    // PM_WaterEvents
    // --------------------------------------------------------

    /// Sound events for entering and leaving water.
    pub(crate) fn water_events(&mut self) {
        let before = self.pml.previous_waterlevel;
        let now = self.pm.waterlevel;

        if before == 0 && now != 0 {
            self.add_event(EntityEvent::WaterTouch);
        }
        if before != 0 && now == 0 {
            self.add_event(EntityEvent::WaterLeave);
        }
        // head just going under
        if before != 3 && now == 3 {
            self.add_event(EntityEvent::WaterUnder);
        }
        // head coming back out
        if before == 3 && now != 3 {
            let gasp = i32::from(self.pm.pmext.airleft < GASP_AIR);
            self.add_event_ext(EntityEvent::WaterClear, gasp);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{cmd_at, Fixture, TestWorld};
    use etmove_common::events::{EventLog, FootstepType};
    use etmove_common::q_shared::{SurfFlags, ENTITYNUM_WORLD};

    fn grounded() -> Fixture {
        let mut fx = Fixture::standing();
        fx.ps.ground_entity_num = ENTITYNUM_WORLD;
        fx
    }

    #[test]
    fn test_footsteps_idle_resets_bob() {
        let mut fx = grounded();
        fx.ps.bob_cycle = 77;
        let mut log = EventLog::new();

        fx.with_context(&TestWorld::floor(), cmd_at(1008), &mut log, |ctx| ctx.footsteps());

        assert_eq!(fx.ps.bob_cycle, 0);
        assert_eq!(log.last_move_anim(), Some(MoveAnim::Idle));
    }

    #[test]
    fn test_footsteps_running_emits_step_on_cycle() {
        let mut fx = grounded();
        fx.ps.velocity = [200.0, 0.0, 0.0];
        // 60 + 0.4 * 50 = 80 crosses the 64 boundary
        fx.ps.bob_cycle = 60;
        let mut log = EventLog::new();
        let mut cmd = cmd_at(1050);
        cmd.forwardmove = 127;

        fx.with_context(&TestWorld::floor().with_surface(SurfFlags::GRASS), cmd, &mut log, |ctx| {
            ctx.pml.msec = 50;
            ctx.pml.ground_trace.surface_flags = SurfFlags::GRASS;
            ctx.footsteps();
            assert!((ctx.pm.xyspeed - 200.0).abs() < 1e-3);
        });

        assert_eq!(fx.ps.bob_cycle, 80);
        assert_eq!(log.last_move_anim(), Some(MoveAnim::Run));
        assert!(log
            .entity_events()
            .any(|e| e == (EntityEvent::Footstep, FootstepType::Grass as i32)));
    }

    #[test]
    fn test_footsteps_walking_is_silent() {
        let mut fx = grounded();
        fx.ps.bob_cycle = 60;
        let mut log = EventLog::new();
        let mut cmd = cmd_at(1050);
        cmd.forwardmove = 40;
        cmd.buttons = Buttons::WALKING;

        fx.with_context(&TestWorld::floor(), cmd, &mut log, |ctx| {
            ctx.pml.msec = 50;
            ctx.footsteps();
        });

        assert_eq!(fx.ps.bob_cycle, 75);
        assert_eq!(log.last_move_anim(), Some(MoveAnim::Walk));
        assert!(!log.has_event(EntityEvent::Footstep));
    }

    #[test]
    fn test_footsteps_strafe_and_crouch_anims() {
        let mut fx = grounded();
        let mut log = EventLog::new();
        let mut cmd = cmd_at(1008);
        cmd.rightmove = -127;

        fx.with_context(&TestWorld::floor(), cmd, &mut log, |ctx| ctx.footsteps());
        assert_eq!(log.last_move_anim(), Some(MoveAnim::StrafeLeft));

        fx.ps.pm_flags.insert(PmFlags::DUCKED | PmFlags::BACKWARDS_RUN);
        cmd.forwardmove = -127;
        fx.with_context(&TestWorld::floor(), cmd, &mut log, |ctx| ctx.footsteps());
        assert_eq!(log.last_move_anim(), Some(MoveAnim::WalkCrBk));
    }

    #[test]
    fn test_footsteps_splash_in_shallow_water() {
        let mut fx = grounded();
        fx.ps.bob_cycle = 60;
        let mut log = EventLog::new();
        let mut cmd = cmd_at(1050);
        cmd.forwardmove = 127;

        fx.with_context(&TestWorld::floor(), cmd, &mut log, |ctx| {
            ctx.pml.msec = 50;
            ctx.pm.waterlevel = 1;
            ctx.footsteps();
        });
        assert!(log.has_event(EntityEvent::FootSplash));
    }

    #[test]
    fn test_footsteps_dead_flailing_in_air() {
        let mut fx = Fixture::new();
        fx.ps.e_flags.insert(EFlags::DEAD);
        let mut log = EventLog::new();

        fx.with_context(&TestWorld::open_air(), cmd_at(1008), &mut log, |ctx| ctx.footsteps());
        assert!(fx.ps.pm_flags.contains(PmFlags::FLAILING));
        assert_eq!(log.last_move_anim(), Some(MoveAnim::Flailing));

        // landed: flailing ends, fallen plays next tick
        fx.ps.ground_entity_num = ENTITYNUM_WORLD;
        fx.with_context(&TestWorld::floor(), cmd_at(1016), &mut log, |ctx| ctx.footsteps());
        assert!(!fx.ps.pm_flags.contains(PmFlags::FLAILING));
        fx.with_context(&TestWorld::floor(), cmd_at(1024), &mut log, |ctx| ctx.footsteps());
        assert_eq!(log.last_move_anim(), Some(MoveAnim::Fallen));
    }

    #[test]
    fn test_footsteps_ladder_climb_anim() {
        let mut fx = Fixture::new();
        fx.ps.pm_flags.insert(PmFlags::LADDER);
        fx.ps.velocity = [0.0, 0.0, -20.0];
        let mut log = EventLog::new();

        fx.with_context(&TestWorld::open_air(), cmd_at(1008), &mut log, |ctx| ctx.footsteps());
        assert_eq!(log.last_move_anim(), Some(MoveAnim::ClimbDown));
    }

    fn water_transition(fx: &mut Fixture, before: i32, after: i32) -> Vec<(EntityEvent, i32)> {
        let mut log = EventLog::new();
        fx.with_context(&TestWorld::open_air(), cmd_at(1008), &mut log, |ctx| {
            ctx.pml.previous_waterlevel = before;
            ctx.pm.waterlevel = after;
            ctx.water_events();
        });
        log.entity_events().collect()
    }

    #[test]
    fn test_water_events_diving_in() {
        let mut fx = Fixture::standing();
        assert_eq!(
            water_transition(&mut fx, 0, 3),
            [(EntityEvent::WaterTouch, 0), (EntityEvent::WaterUnder, 0)]
        );
    }

    #[test]
    fn test_water_events_surfacing() {
        let mut fx = Fixture::standing();

        // short of breath: gasp
        fx.pmext.airleft = 2000;
        assert_eq!(water_transition(&mut fx, 3, 1), [(EntityEvent::WaterClear, 1)]);

        fx.pmext.airleft = GASP_AIR;
        assert_eq!(water_transition(&mut fx, 3, 1), [(EntityEvent::WaterClear, 0)]);

        fx.pmext.airleft = 2000;
        assert_eq!(
            water_transition(&mut fx, 3, 0),
            [(EntityEvent::WaterLeave, 0), (EntityEvent::WaterClear, 1)]
        );
    }
}
