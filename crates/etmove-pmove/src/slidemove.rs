// slidemove.rs — collision response: clip, slide along planes, step up stairs

use etmove_common::events::{EntityEvent, EventSink};
use etmove_common::q_shared::{
    cross_product, dot_product, vector_ma, vector_normalize, vector_normalize2, Vec3,
    MAX_CLIP_PLANES, VEC3_ORIGIN,
};

use crate::pmove::{PmoveCallbacks, PmoveContext, MIN_WALK_NORMAL, OVERCLIP, STEPSIZE};

const MAX_BUMPS: usize = 4;

// ============================================================
// Velocity clipping
// ============================================================

/// Slide off of the impacting surface. Velocity heading into the plane is
/// pushed out by `overbounce`; velocity already leaving it is damped by it.
pub fn pm_clip_velocity(inv: &Vec3, normal: &Vec3, out: &mut Vec3, overbounce: f32) {
    let mut backoff = dot_product(inv, normal);

    if backoff < 0.0 {
        backoff *= overbounce;
    } else {
        backoff /= overbounce;
    }

    for i in 0..3 {
        out[i] = inv[i] - normal[i] * backoff;
    }
}

fn clipped(v: &Vec3, normal: &Vec3) -> Vec3 {
    let mut out = VEC3_ORIGIN;
    pm_clip_velocity(v, normal, &mut out, OVERCLIP);
    out
}

impl<C: PmoveCallbacks, S: EventSink> PmoveContext<'_, '_, C, S> {
    // --------------------------------------------------------
    // PM_SlideMove
    // --------------------------------------------------------

    /// Move along the velocity for the rest of the frame, sliding along
    /// anything hit. Returns true if anything was hit.
    pub(crate) fn slide_move(&mut self, gravity: bool) -> bool {
        let mut primal_velocity = self.pm.ps.velocity;
        let mut end_velocity = self.pm.ps.velocity;

        if gravity {
            end_velocity[2] -= self.pm.ps.gravity as f32 * self.pml.frametime;
            self.pm.ps.velocity[2] = (self.pm.ps.velocity[2] + end_velocity[2]) * 0.5;
            primal_velocity[2] = end_velocity[2];
            if self.pml.ground_plane {
                // slide along the ground plane
                let normal = self.pml.ground_trace.plane.normal;
                self.pm.ps.velocity = clipped(&self.pm.ps.velocity, &normal);
            }
        }

        let mut time_left = self.pml.frametime;
        let mut planes: [Vec3; MAX_CLIP_PLANES] = [VEC3_ORIGIN; MAX_CLIP_PLANES];
        let mut numplanes = 0;

        // never turn against the ground plane
        if self.pml.ground_plane {
            planes[numplanes] = self.pml.ground_trace.plane.normal;
            numplanes += 1;
        }

        // never turn against original velocity
        planes[numplanes] = vector_normalize2(&self.pm.ps.velocity).0;
        numplanes += 1;

        let mut bumpcount = 0;
        while bumpcount < MAX_BUMPS {
            let end = vector_ma(&self.pm.ps.origin, time_left, &self.pm.ps.velocity);
            let trace = self.trace_all(&self.pm.ps.origin, &end);

            if trace.allsolid {
                // trapped: don't build up falling damage, keep sideways control
                self.pm.ps.velocity[2] = 0.0;
                return true;
            }

            if trace.fraction > 0.0 {
                self.pm.ps.origin = trace.endpos;
            }

            if trace.fraction == 1.0 {
                break;
            }

            self.add_touch_ent(trace.entity_num);

            time_left -= time_left * trace.fraction;

            if numplanes >= MAX_CLIP_PLANES {
                self.pm.ps.velocity = VEC3_ORIGIN;
                return true;
            }

            // same plane as before: nudge out along it
            let normal = trace.plane.normal;
            if planes[..numplanes].iter().any(|p| dot_product(&normal, p) > 0.99) {
                for i in 0..3 {
                    self.pm.ps.velocity[i] += normal[i];
                }
                bumpcount += 1;
                continue;
            }

            planes[numplanes] = normal;
            numplanes += 1;

            // modify velocity so it parallels all of the clip planes
            for i in 0..numplanes {
                let into = dot_product(&self.pm.ps.velocity, &planes[i]);
                if into >= 0.1 {
                    continue;
                }

                let mut clip_velocity = clipped(&self.pm.ps.velocity, &planes[i]);
                let mut end_clip_velocity = clipped(&end_velocity, &planes[i]);

                // see if there is a second plane that the new move enters
                for j in 0..numplanes {
                    if j == i {
                        continue;
                    }
                    if dot_product(&clip_velocity, &planes[j]) >= 0.1 {
                        continue;
                    }

                    clip_velocity = clipped(&clip_velocity, &planes[j]);
                    end_clip_velocity = clipped(&end_clip_velocity, &planes[j]);

                    // still heading back into the first plane?
                    if dot_product(&clip_velocity, &planes[i]) >= 0.0 {
                        continue;
                    }

                    // slide the original velocity along the crease
                    let mut dir = cross_product(&planes[i], &planes[j]);
                    vector_normalize(&mut dir);
                    let d = dot_product(&dir, &self.pm.ps.velocity);
                    clip_velocity = [dir[0] * d, dir[1] * d, dir[2] * d];
                    let d = dot_product(&dir, &end_velocity);
                    end_clip_velocity = [dir[0] * d, dir[1] * d, dir[2] * d];

                    // stop dead at a triple plane interaction
                    let third = (0..numplanes)
                        .filter(|&k| k != i && k != j)
                        .any(|k| dot_product(&clip_velocity, &planes[k]) < 0.1);
                    if third {
                        self.pm.ps.velocity = VEC3_ORIGIN;
                        return true;
                    }
                }

                // all interactions fixed, try another move
                self.pm.ps.velocity = clip_velocity;
                end_velocity = end_clip_velocity;
                break;
            }

            bumpcount += 1;
        }

        if gravity {
            self.pm.ps.velocity = end_velocity;
        }

        // don't change velocity while a timer runs
        if self.pm.ps.pm_time != 0 {
            self.pm.ps.velocity = primal_velocity;
        }

        bumpcount != 0
    }

    // --------------------------------------------------------
    // PM_StepSlideMove
    // --------------------------------------------------------

    pub(crate) fn step_slide_move(&mut self, gravity: bool) {
        let start_o = self.pm.ps.origin;
        let start_v = self.pm.ps.velocity;

        if !self.slide_move(gravity) {
            // got exactly where we wanted to go first try
            return;
        }

        let mut down = start_o;
        down[2] -= STEPSIZE;
        let trace = self.trace_all(&start_o, &down);

        // never step up when you still have up velocity
        if self.pm.ps.velocity[2] > 0.0
            && (trace.fraction == 1.0 || trace.plane.normal[2] < MIN_WALK_NORMAL)
        {
            return;
        }

        let down_o = self.pm.ps.origin;
        let down_v = self.pm.ps.velocity;

        // test the player position if they were a stepheight higher
        let mut up = start_o;
        up[2] += STEPSIZE;
        let trace = self.trace_all(&start_o, &up);
        if trace.allsolid {
            return;
        }

        let step_size = trace.endpos[2] - start_o[2];

        // try slidemove from this position
        self.pm.ps.origin = trace.endpos;
        self.pm.ps.velocity = start_v;
        self.slide_move(gravity);

        // push down the final amount, recording where the legs settled
        let mut down = self.pm.ps.origin;
        down[2] -= step_size;
        let (trace, legs_offset) = self.trace_all_legs(&self.pm.ps.origin, &down);
        self.pm.pmext.prone_legs_offset = legs_offset;
        if !trace.allsolid {
            self.pm.ps.origin = trace.endpos;
        }
        if trace.fraction < 1.0 {
            self.pm.ps.velocity = clipped(&self.pm.ps.velocity, &trace.plane.normal);
        }

        // keep the unstepped move when stepping got us less far
        let flat = |o: &Vec3| {
            let dx = o[0] - start_o[0];
            let dy = o[1] - start_o[1];
            dx * dx + dy * dy
        };
        if flat(&self.pm.ps.origin) < flat(&down_o) {
            self.pm.ps.origin = down_o;
            self.pm.ps.velocity = down_v;
        }

        let delta = self.pm.ps.origin[2] - start_o[2];
        if delta > 2.0 {
            let event = if delta < 7.0 {
                EntityEvent::Step4
            } else if delta < 11.0 {
                EntityEvent::Step8
            } else if delta < 15.0 {
                EntityEvent::Step12
            } else {
                EntityEvent::Step16
            };
            self.add_event(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{cmd_at, Fixture, Solid, TestWorld};
    use etmove_common::events::EventLog;
    use etmove_common::q_shared::ENTITYNUM_WORLD;

    #[test]
    fn test_clip_velocity_into_floor() {
        let inv = [100.0, 0.0, -50.0];
        let normal = [0.0, 0.0, 1.0];
        let mut out = VEC3_ORIGIN;
        pm_clip_velocity(&inv, &normal, &mut out, 1.0);
        assert_eq!(out, [100.0, 0.0, 0.0]);
    }

    #[test]
    fn test_clip_velocity_overbounce_pushes_out() {
        let inv = [0.0, 0.0, -100.0];
        let normal = [0.0, 0.0, 1.0];
        let mut out = VEC3_ORIGIN;
        pm_clip_velocity(&inv, &normal, &mut out, OVERCLIP);
        assert!(out[2] > 0.0 && out[2] < 0.2);
    }

    #[test]
    fn test_clip_velocity_leaving_plane_is_damped() {
        let inv = [0.0, 0.0, 100.0];
        let normal = [0.0, 0.0, 1.0];
        let mut out = VEC3_ORIGIN;
        pm_clip_velocity(&inv, &normal, &mut out, 2.0);
        assert_eq!(out[2], 50.0);
    }

    #[test]
    fn test_slide_move_open_air_moves_full_distance() {
        let mut fx = Fixture::new();
        fx.ps.origin = [0.0, 0.0, 500.0];
        fx.ps.velocity = [100.0, 0.0, 0.0];
        let mut log = EventLog::new();

        let hit = fx.with_context(&TestWorld::open_air(), cmd_at(1008), &mut log, |ctx| {
            ctx.slide_move(false)
        });

        assert!(!hit);
        assert!((fx.ps.origin[0] - 0.8).abs() < 1e-4);
    }

    #[test]
    fn test_slide_move_along_wall() {
        let world = TestWorld::floor().with_solid(Solid::world([20.0, -1000.0, 0.0], [60.0, 1000.0, 200.0]));
        let mut fx = Fixture::standing();
        fx.ps.origin = [0.0, 0.0, 24.0];
        fx.ps.velocity = [400.0, 400.0, 0.0];
        let mut log = EventLog::new();

        fx.with_context(&world, cmd_at(1008), &mut log, |ctx| {
            ctx.pml.frametime = 0.1;
            assert!(ctx.slide_move(false));
        });

        // blocked in x, keeps sliding in y
        assert!(fx.ps.origin[0] <= 2.0 + 0.01);
        assert!(fx.ps.origin[1] > 30.0);
        assert!(fx.ps.velocity[0].abs() < 1.0);
    }

    #[test]
    fn test_slide_move_records_touched_entity() {
        let mut crate_box = Solid::world([20.0, -50.0, 0.0], [60.0, 50.0, 100.0]);
        crate_box.entity = 42;
        let world = TestWorld::floor().with_solid(crate_box);
        let mut fx = Fixture::standing();
        fx.ps.velocity = [400.0, 0.0, 0.0];
        let mut log = EventLog::new();

        fx.with_context(&world, cmd_at(1008), &mut log, |ctx| {
            ctx.pml.frametime = 0.1;
            ctx.slide_move(false);
            assert_eq!(ctx.pm.touchents, vec![42]);
        });
    }

    #[test]
    fn test_step_slide_move_climbs_stair() {
        let world = TestWorld::floor().with_step(20.0, 8.0);
        let mut fx = Fixture::standing();
        fx.ps.velocity = [300.0, 0.0, 0.0];
        let mut log = EventLog::new();

        fx.with_context(&world, cmd_at(1008), &mut log, |ctx| {
            ctx.pml.frametime = 0.05;
            ctx.pml.ground_plane = true;
            ctx.pml.walking = true;
            ctx.pml.ground_trace.plane.normal = [0.0, 0.0, 1.0];
            ctx.pml.ground_trace.entity_num = ENTITYNUM_WORLD;
            ctx.step_slide_move(false);
        });

        assert!((fx.ps.origin[2] - 32.0).abs() < 0.1, "z = {}", fx.ps.origin[2]);
        assert!(fx.ps.origin[0] > 5.0);
        assert!(log.has_event(EntityEvent::Step8));
    }

    #[test]
    fn test_step_slide_move_refuses_tall_wall() {
        let world = TestWorld::floor().with_step(20.0, 40.0);
        let mut fx = Fixture::standing();
        fx.ps.velocity = [300.0, 0.0, 0.0];
        let mut log = EventLog::new();

        fx.with_context(&world, cmd_at(1008), &mut log, |ctx| {
            ctx.pml.frametime = 0.05;
            ctx.pml.ground_plane = true;
            ctx.pml.ground_trace.plane.normal = [0.0, 0.0, 1.0];
            ctx.step_slide_move(false);
        });

        assert!((fx.ps.origin[2] - 24.0).abs() < 0.1);
        assert!(fx.ps.origin[0] < 2.1);
        assert!(log.entity_events().next().is_none());
    }
}
