// trace.rs — body and prone-legs collision traces

use etmove_common::events::EventSink;
use etmove_common::q_shared::{
    vector_add, vector_ma, vector_subtract, Contents, EFlags, Trace, Vec3, DEG_TO_RAD,
    PLAYER_LEGS_PRONE_MAXS, PLAYER_LEGS_PRONE_MINS, YAW,
};

use crate::pmove::{PmoveCallbacks, PmoveContext, STEPSIZE};

/// Horizontal distance from the body centre to the legs box centre.
const LEGS_REACH: f32 = 32.0;

/// Trace the legs box of a prone (or play-dead) body that sits at `start`
/// and moves to `end`. Prone legs trail behind the view direction, play-dead
/// legs stick out in front.
///
/// Returns the legs trace and the vertical offset the legs ended up at when
/// they had to step up onto something the body cleared.
pub(crate) fn trace_legs<C: PmoveCallbacks>(
    cb: &C,
    start: &Vec3,
    end: &Vec3,
    body: Option<&Trace>,
    viewangles: &Vec3,
    ignore_entity: i32,
    tracemask: Contents,
    prone: bool,
) -> (Trace, f32) {
    // other players never block legs
    let tracemask = tracemask - (Contents::BODY | Contents::CORPSE);
    let mut legs_offset = 0.0;

    let angle = viewangles[YAW] * DEG_TO_RAD;
    let flatforward = [angle.cos(), angle.sin(), 0.0];
    let reach = if prone { -LEGS_REACH } else { LEGS_REACH };
    let mut ofs = [flatforward[0] * reach, flatforward[1] * reach, 0.0];

    let org = vector_add(start, &ofs);
    let point = vector_add(end, &ofs);
    let mut trace = cb.trace(
        &org,
        &PLAYER_LEGS_PRONE_MINS,
        &PLAYER_LEGS_PRONE_MAXS,
        &point,
        ignore_entity,
        tracemask,
    );

    let legs_blocked_first = match body {
        None => true,
        Some(body) => trace.fraction < body.fraction || trace.allsolid,
    };
    if !legs_blocked_first {
        return (trace, legs_offset);
    }

    // see if the legs can step up
    ofs[2] += STEPSIZE;
    let org = vector_add(start, &ofs);
    let point = vector_add(end, &ofs);
    let steptrace = cb.trace(
        &org,
        &PLAYER_LEGS_PRONE_MINS,
        &PLAYER_LEGS_PRONE_MAXS,
        &point,
        ignore_entity,
        tracemask,
    );

    if !steptrace.allsolid && !steptrace.startsolid && steptrace.fraction > trace.fraction {
        trace = steptrace;
        legs_offset = ofs[2];

        // settle back down onto whatever the legs climbed
        let org = steptrace.endpos;
        let mut point = steptrace.endpos;
        point[2] -= STEPSIZE;
        let settle = cb.trace(
            &org,
            &PLAYER_LEGS_PRONE_MINS,
            &PLAYER_LEGS_PRONE_MAXS,
            &point,
            ignore_entity,
            tracemask,
        );
        if !settle.allsolid {
            legs_offset = ofs[2] - (org[2] - settle.endpos[2]);
        }
    }

    (trace, legs_offset)
}

impl<C: PmoveCallbacks, S: EventSink> PmoveContext<'_, '_, C, S> {
    // --------------------------------------------------------
    // Body + legs merge
    // --------------------------------------------------------

    /// Trace every player box from `start` to `end` and keep the worst
    /// result. Standing players only have the body box.
    pub(crate) fn trace_all_legs(&self, start: &Vec3, end: &Vec3) -> (Trace, f32) {
        let ps = &*self.pm.ps;
        let mut trace = self.cb.trace(
            start,
            &self.pm.mins,
            &self.pm.maxs,
            end,
            ps.client_num,
            self.pm.tracemask,
        );

        if !ps.e_flags.intersects(EFlags::PRONE | EFlags::PLAYDEAD) {
            return (trace, 0.0);
        }

        let (mut legs, legs_offset) = trace_legs(
            self.cb,
            start,
            end,
            Some(&trace),
            &ps.viewangles,
            ps.client_num,
            self.pm.tracemask,
            ps.e_flags.contains(EFlags::PRONE),
        );

        if legs.fraction < trace.fraction || legs.startsolid || legs.allsolid {
            // report where the body would stop, not the legs
            let delta = vector_subtract(end, start);
            legs.endpos = vector_ma(start, legs.fraction, &delta);
            trace = legs;
        }

        (trace, legs_offset)
    }

    pub(crate) fn trace_all(&self, start: &Vec3, end: &Vec3) -> Trace {
        self.trace_all_legs(start, end).0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{cmd_at, Fixture, TestWorld};
    use etmove_common::events::EventLog;

    #[test]
    fn test_trace_all_standing_uses_body_only() {
        let mut fx = Fixture::standing();
        let mut log = EventLog::new();
        let world = TestWorld::floor();

        fx.with_context(&world, cmd_at(1008), &mut log, |ctx| {
            let (tr, ofs) = ctx.trace_all_legs(&[0.0, 0.0, 40.0], &[0.0, 0.0, 10.0]);
            assert!((tr.endpos[2] - 24.0).abs() < 0.01);
            assert_eq!(tr.plane.normal, [0.0, 0.0, 1.0]);
            assert_eq!(ofs, 0.0);
        });
    }

    #[test]
    fn test_prone_legs_blocked_by_wall_behind() {
        // prone facing -x puts the legs toward +x, into the wall
        let world = TestWorld::ladder_wall(40.0).without_ladder();
        let mut fx = Fixture::standing();
        fx.ps.e_flags.insert(EFlags::PRONE);
        fx.ps.viewangles = [0.0, 180.0, 0.0];
        let mut log = EventLog::new();

        fx.with_context(&world, cmd_at(1008), &mut log, |ctx| {
            ctx.pm.mins = [-15.0, -15.0, -24.0];
            ctx.pm.maxs = [15.0, 15.0, -8.0];
            let tr = ctx.trace_all(&[0.0, 0.0, 24.0], &[0.0, 0.0, 24.0]);
            assert!(tr.allsolid);
        });
    }

    #[test]
    fn test_trace_legs_without_body_trace() {
        let world = TestWorld::floor();
        let (tr, ofs) = trace_legs(
            &world,
            &[0.0, 0.0, 24.0],
            &[0.0, 0.0, 24.0],
            None,
            &[0.0, 0.0, 0.0],
            0,
            Contents::SOLID,
            true,
        );
        assert!(!tr.allsolid);
        // nothing to step over, so the stepped trace is no better
        assert_eq!(ofs, 0.0);
    }
}
