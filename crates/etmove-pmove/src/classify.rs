// classify.rs — ground contact, landing, submersion and ladder attachment

use tracing::debug;

use etmove_common::events::{AnimScriptEvent, EntityEvent, EventSink, FootstepType};
use etmove_common::q_shared::{
    dot_product, vector_ma, vector_normalize, Contents, EFlags, PmFlags, SurfFlags, Trace,
    Vec3, ENTITYNUM_NONE, ENTITYNUM_UNSET, MASK_WATER,
};

use crate::pmove::{PmoveCallbacks, PmoveContext, MIN_WALK_NORMAL};

const GROUND_PROBE: f32 = 0.25;
const MOUNTED_GROUND_PROBE: f32 = 1.0;
const LIFT_PROBE: f32 = 64.0;
const TRACE_LADDER_DIST: f32 = 48.0;

/// Event parameter for a surface that makes no footstep sound.
pub const FOOTSTEP_SILENT: i32 = 9;

impl<C: PmoveCallbacks, S: EventSink> PmoveContext<'_, '_, C, S> {
    // --------------------------------------------------------
    // Jump animation helper
    // --------------------------------------------------------

    /// Forward or backward jump animation, depending on which way the
    /// player is pushing.
    pub(crate) fn jump_anim(&mut self, force: bool) {
        if self.pm.cmd.forwardmove >= 0 {
            self.script_event(AnimScriptEvent::Jump, false, force);
            self.pm.ps.pm_flags.remove(PmFlags::BACKWARDS_JUMP);
        } else {
            self.script_event(AnimScriptEvent::JumpBk, false, force);
            self.pm.ps.pm_flags.insert(PmFlags::BACKWARDS_JUMP);
        }
    }

    pub(crate) fn footstep_parm(&self) -> i32 {
        FootstepType::for_surface(self.pml.ground_trace.surface_flags)
            .map_or(FOOTSTEP_SILENT, |f| f as i32)
    }

    // --------------------------------------------------------
    // PM_CrashLand
    // --------------------------------------------------------

    /// Landing sounds and fall damage tiers for a hard landing.
    pub(crate) fn crash_land(&mut self) {
        // only play this if coming down hard
        if self.pm.ps.legs_timer == 0 && self.pml.previous_velocity[2] < -220.0 {
            self.script_event(AnimScriptEvent::Land, false, true);
        }

        // calculate the exact velocity on landing
        let dist = self.pm.ps.origin[2] - self.pml.previous_origin[2];
        let vel = self.pml.previous_velocity[2];
        let acc = -(self.pm.ps.gravity as f32);

        let a = acc / 2.0;
        let b = vel;
        let c = -dist;

        let den = b * b - 4.0 * a * c;
        if den < 0.0 {
            return;
        }
        let t = (-b - den.sqrt()) / (2.0 * a);

        let mut delta = vel + t * acc;
        delta = delta * delta * 0.0001;

        // never take falling damage if completely underwater
        if self.pm.waterlevel == 3 {
            self.pm.pmext.was_shoved = false;
            return;
        }

        // reduce falling damage if there is standing water
        match self.pm.waterlevel {
            2 => delta *= 0.25,
            1 => delta *= 0.5,
            _ => {}
        }

        if delta < 1.0 {
            return;
        }

        debug!(delta, "land");

        // bounce pads never hurt
        if !self.pml.ground_trace.surface_flags.contains(SurfFlags::NODAMAGE) {
            let parm = self.footstep_parm();
            let alive = self.pm.ps.health > 0;

            let event = if delta > 77.0 {
                Some(EntityEvent::FallNdie)
            } else if delta > 67.0 {
                Some(EntityEvent::FallDmg50)
            } else if delta > 58.0 {
                // pain grunts are skipped for corpses
                alive.then_some(EntityEvent::FallDmg25)
            } else if delta > 48.0 {
                alive.then_some(EntityEvent::FallDmg15)
            } else if delta > 38.75 {
                alive.then_some(EntityEvent::FallDmg10)
            } else if delta > 7.0 {
                Some(EntityEvent::FallShort)
            } else {
                Some(EntityEvent::Footstep)
            };

            if let Some(event) = event {
                self.add_event_ext(event, parm);
            }
        }

        // damage stops the player dead; done here so prediction agrees
        if delta > 38.75 {
            self.pm.ps.velocity = [0.0; 3];
        }

        // start footstep cycle over
        self.pm.ps.bob_cycle = 0;
    }

    // --------------------------------------------------------
    // PM_CorrectAllSolid
    // --------------------------------------------------------

    /// Look for a free spot in the 3x3x3 neighbourhood of the origin.
    /// On success the ground trace is redone from the real origin and
    /// returned; on failure the player is left airborne.
    pub(crate) fn correct_all_solid(&mut self) -> Option<Trace> {
        debug!(origin = ?self.pm.ps.origin, "allsolid");

        let origin = self.pm.ps.origin;
        for i in -1..=1 {
            for j in -1..=1 {
                for k in -1..=1 {
                    let point = [origin[0] + i as f32, origin[1] + j as f32, origin[2] + k as f32];
                    let trace = self.trace_all(&point, &point);
                    if !trace.allsolid {
                        let mut below = origin;
                        below[2] -= GROUND_PROBE;
                        let trace = self.trace_all(&origin, &below);
                        self.pml.ground_trace = trace;
                        return Some(trace);
                    }
                }
            }
        }

        self.pm.ps.ground_entity_num = ENTITYNUM_NONE;
        self.pml.ground_plane = false;
        self.pml.walking = false;
        None
    }

    // --------------------------------------------------------
    // PM_GroundTraceMissed
    // --------------------------------------------------------

    /// Nothing underfoot: the player is in free fall.
    pub(crate) fn ground_trace_missed(&mut self) {
        if self.pm.ps.ground_entity_num != ENTITYNUM_NONE {
            debug!("lift");

            // force the jump animation only when the ground is a ways away,
            // otherwise players would backflip down staircases
            let mut point = self.pm.ps.origin;
            point[2] -= LIFT_PROBE;
            let trace = self.trace_all(&self.pm.ps.origin, &point);
            if trace.fraction == 1.0 {
                self.jump_anim(true);
            }
        }

        // a spawning player is not in the air yet
        if self.pm.ps.ground_entity_num != ENTITYNUM_UNSET {
            self.pm.ps.ground_entity_num = ENTITYNUM_NONE;
        }
        self.pml.ground_plane = false;
        self.pml.walking = false;
    }

    // --------------------------------------------------------
    // PM_GroundTrace
    // --------------------------------------------------------
    pub(crate) fn ground_trace(&mut self) {
        let mut point = self.pm.ps.origin;
        if self.eflag(EFlags::MG42_ACTIVE | EFlags::AAGUN_ACTIVE) {
            point[2] -= MOUNTED_GROUND_PROBE;
        } else {
            point[2] -= GROUND_PROBE;
        }

        let (mut trace, legs_offset) = self.trace_all_legs(&self.pm.ps.origin, &point);
        self.pm.pmext.prone_legs_offset = legs_offset;
        self.pml.ground_trace = trace;

        // do something corrective if the trace starts in a solid
        if trace.allsolid && !self.eflag(EFlags::MOUNTEDTANK) {
            match self.correct_all_solid() {
                Some(corrected) => trace = corrected,
                None => return,
            }
        }

        // if the trace didn't hit anything, we are in free fall
        if trace.fraction == 1.0 {
            self.ground_trace_missed();
            return;
        }

        // check if getting thrown off the ground
        if self.pm.ps.velocity[2] > 0.0
            && dot_product(&self.pm.ps.velocity, &trace.plane.normal) > 10.0
            && !self.eflag(EFlags::PRONE)
        {
            debug!("kickoff");
            self.jump_anim(false);
            self.pm.ps.ground_entity_num = ENTITYNUM_NONE;
            self.pml.ground_plane = false;
            self.pml.walking = false;
            return;
        }

        // slopes that are too steep will not be considered onground
        if trace.plane.normal[2] < MIN_WALK_NORMAL {
            debug!(normal_z = trace.plane.normal[2], "steep");
            self.pm.ps.ground_entity_num = ENTITYNUM_NONE;
            self.pml.ground_plane = true;
            self.pml.walking = false;
            return;
        }

        self.pml.ground_plane = true;
        self.pml.walking = true;
        self.pm.ps.pm_flags.remove(PmFlags::DOUBLEJUMPING);

        // hitting solid ground will end a waterjump
        if self.pmflag(PmFlags::TIME_WATERJUMP) {
            self.pm.ps.pm_flags.remove(PmFlags::TIME_WATERJUMP | PmFlags::TIME_LAND);
            self.pm.ps.pm_time = 0;
        }

        if self.pm.ps.ground_entity_num == ENTITYNUM_NONE {
            // just hit the ground
            self.crash_land();

            // don't do landing time if we were just going down a slope
            if self.pml.previous_velocity[2] < -200.0 {
                // don't allow another jump for a little while
                self.pm.ps.pm_flags.insert(PmFlags::TIME_LAND);
                self.pm.ps.pm_time = 250;
            }
        }

        self.pm.ps.ground_entity_num = trace.entity_num;
        self.add_touch_ent(trace.entity_num);
    }

    // --------------------------------------------------------
    // PM_SetWaterLevel
    // --------------------------------------------------------

    /// Sample feet, waist and eyes to get the 0-3 submersion level.
    pub(crate) fn set_water_level(&mut self) {
        self.pm.waterlevel = 0;
        self.pm.watertype = Contents::empty();

        let ps = &*self.pm.ps;
        let client = ps.client_num;
        let mut point = [ps.origin[0], ps.origin[1], ps.origin[2] + ps.mins[2] + 1.0];
        let mut cont = self.cb.pointcontents(&point, client);

        if cont.intersects(MASK_WATER) {
            let sample2 = (ps.viewheight as f32 - ps.mins[2]) as i32;
            let sample1 = sample2 / 2;

            self.pm.watertype = cont;
            self.pm.waterlevel = 1;
            point[2] = ps.origin[2] + ps.mins[2] + sample1 as f32;
            cont = self.cb.pointcontents(&point, client);
            if cont.intersects(MASK_WATER) {
                self.pm.waterlevel = 2;
                point[2] = ps.origin[2] + ps.mins[2] + sample2 as f32;
                cont = self.cb.pointcontents(&point, client);
                if cont.intersects(MASK_WATER) {
                    self.pm.waterlevel = 3;
                }
            }
        }

        self.sink.set_underwater(self.pm.waterlevel > 2);
    }

    // --------------------------------------------------------
    // PM_CheckLadderMove
    // --------------------------------------------------------
    pub(crate) fn check_ladder_move(&mut self) {
        if self.pm.ps.pm_time != 0 {
            return;
        }

        let tracedist = if self.pml.walking { 1.0 } else { TRACE_LADDER_DIST };
        let was_on_ladder = self.pmflag(PmFlags::LADDER);

        self.pml.ladder = false;
        self.pml.ladder_forward = false;
        self.pm.ps.pm_flags.remove(PmFlags::LADDER);

        if self.pm.ps.health <= 0 {
            self.pm.ps.ground_entity_num = ENTITYNUM_NONE;
            self.pml.ground_plane = false;
            self.pml.walking = false;
            return;
        }

        // no climbing while prone or playing dead
        if self.eflag(EFlags::PRONE | EFlags::PLAYDEAD) {
            return;
        }

        let mut flatforward: Vec3 = [self.pml.forward[0], self.pml.forward[1], 0.0];
        vector_normalize(&mut flatforward);

        let origin = self.pm.ps.origin;
        let client = self.pm.ps.client_num;
        let spot = vector_ma(&origin, tracedist, &flatforward);
        let trace = self
            .cb
            .trace(&origin, &self.pm.mins, &self.pm.maxs, &spot, client, self.pm.tracemask);
        if trace.fraction < 1.0 && trace.surface_flags.contains(SurfFlags::LADDER) {
            self.pml.ladder = true;
            self.pml.ladder_vec = trace.plane.normal;
        }

        if self.pml.ladder && !self.pml.walking && trace.fraction * tracedist > 1.0 {
            // only just reached the ladder: make sure we are facing onto it
            // or it may throw us back off
            self.pml.ladder = false;
            let mut mins = self.pm.mins;
            mins[2] = -1.0;
            let spot = vector_ma(&origin, -tracedist, &self.pml.ladder_vec);
            let trace = self.cb.trace(&origin, &mins, &self.pm.maxs, &spot, client, self.pm.tracemask);
            if trace.fraction < 1.0 && trace.surface_flags.contains(SurfFlags::LADDER) {
                self.pml.ladder_forward = true;
                self.pml.ladder = true;
                self.pm.ps.pm_flags.insert(PmFlags::LADDER);
            }
        } else if self.pml.ladder {
            self.pm.ps.pm_flags.insert(PmFlags::LADDER);
        }

        // on the ground, only climb when pushing forwards
        if self.pml.ladder && self.pml.walking && self.pm.cmd.forwardmove <= 0 {
            self.pml.ladder = false;
        }

        if !self.pml.ladder && was_on_ladder && self.pm.ps.velocity[2] > 0.0 {
            self.script_event(AnimScriptEvent::ClimbDismount, false, false);
        }
        // mount animation only when going down the ladder
        if self.pml.ladder && !was_on_ladder && self.pm.ps.velocity[2] < 0.0 {
            self.script_event(AnimScriptEvent::ClimbMount, false, false);
        }
    }
}
