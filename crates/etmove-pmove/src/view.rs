// view.rs — view angle resolution, mounted weapon arcs and leaning

use tracing::trace;

use etmove_common::events::EventSink;
use etmove_common::q_shared::{
    angle2short, angle_normalize180, angle_normalize360, angle_vectors, short2angle, vector_ma,
    EFlags, PmFlags, PmType, Vec3, WButtons, DEG_TO_RAD, MASK_PLAYERSOLID, PITCH, ROLL, YAW,
};
use etmove_common::weapons::Weapon;

use crate::pmove::{PmoveCallbacks, PmoveContext};
use crate::trace::trace_legs;

// ============================================================
// Constants
// ============================================================

const PITCH_LIMIT: i32 = 16000;

/// Degrees per second a mounted gun can traverse.
const MG42_YAWSPEED: f32 = 300.0;
const MORTAR_TRAVERSE_SPEED: f32 = 60.0;
const MORTAR_YAW_ARC: f32 = 30.0;
const MORTAR_PITCH_DOWN: f32 = 30.0;
const MORTAR_PITCH_UP: f32 = 20.0;

const TANK_PITCH_UP: f32 = 14.0;
const TANK_PITCH_DOWN: f32 = 50.0;

const PRONE_PITCH_ARC: f32 = 40.0;
const PRONE_MG_ARC: f32 = 20.0;

pub(crate) const LEAN_MAX: f32 = 28.0;
const LEAN_TIME_TO: f32 = 200.0;
const LEAN_TIME_FR: f32 = 300.0;

const LEAN_MINS: Vec3 = [-8.0, -8.0, -7.0];
const LEAN_MAXS: Vec3 = [8.0, 8.0, 4.0];

/// Shortest signed difference `new - old`, unwrapped across the 0/360 seam.
fn unwrapped_delta(new: f32, old: f32) -> f32 {
    let mut delta = new - old;
    if delta > 180.0 {
        delta -= 360.0;
    } else if delta < -180.0 {
        delta += 360.0;
    }
    delta
}

impl<C: PmoveCallbacks, S: EventSink> PmoveContext<'_, '_, C, S> {
    /// Write `angle` into the view and rebase `delta_angles` so the next
    /// command's absolute angle lands on it.
    fn force_view_angle(&mut self, axis: usize, angle: f32) {
        let ps = &mut *self.pm.ps;
        ps.viewangles[axis] = angle;
        ps.delta_angles[axis] = angle2short(angle) - self.pm.cmd.angles[axis];
    }

    /// Cap how far `axis` may turn this tick.
    fn limit_turn_rate(&mut self, axis: usize, old: f32, degs_per_sec: f32) {
        let step = degs_per_sec * self.pml.frametime;
        let delta = unwrapped_delta(self.pm.ps.viewangles[axis], old);

        if delta > step {
            self.force_view_angle(axis, old + step);
        } else if delta < -step {
            self.force_view_angle(axis, old - step);
        }
    }

    /// Keep `axis` within `[center - below, center + above]`.
    fn clamp_to_arc(&mut self, axis: usize, center: f32, above: f32, below: f32) {
        let diff = angle_normalize180(self.pm.ps.viewangles[axis] - center);

        if diff > above {
            self.force_view_angle(axis, angle_normalize180(center + above));
        } else if diff < -below {
            self.force_view_angle(axis, angle_normalize180(center - below));
        }
    }

    /// Same as `clamp_to_arc` but measures the offset without the
    /// normalization quantization, the way deployed weapons are checked.
    fn clamp_to_deployed_arc(&mut self, axis: usize, center: f32, above: f32, below: f32) {
        let diff = unwrapped_delta(self.pm.ps.viewangles[axis], center);

        if diff > above {
            self.force_view_angle(axis, angle_normalize180(center + above));
        } else if diff < -below {
            self.force_view_angle(axis, angle_normalize180(center - below));
        }
    }

    // --------------------------------------------------------
    // PM_UpdateViewAngles
    // --------------------------------------------------------

    /// Turn the command's absolute angles into view angles, then apply
    /// every stance and emplacement restriction on top.
    pub(crate) fn update_view_angles(&mut self) {
        if self.pm.ps.pm_type == PmType::Intermission || self.pmflag(PmFlags::TIME_LOCKPLAYER) {
            return;
        }

        let cmd = self.pm.cmd;

        // wounded players may look around but their view stays put
        if self.pm.ps.pm_type != PmType::Spectator
            && (self.pm.ps.health <= 0 || self.eflag(EFlags::PLAYDEAD))
        {
            let yaw = (cmd.angles[YAW] + self.pm.ps.delta_angles[YAW]) as i16;
            self.pm.ps.dead_yaw = yaw as i32;
            return;
        }

        let old = self.pm.ps.viewangles;

        for axis in 0..3 {
            let ps = &mut *self.pm.ps;
            let mut temp = (cmd.angles[axis] + ps.delta_angles[axis]) as i16 as i32;
            if axis == PITCH {
                // no looking past straight up or down
                if temp > PITCH_LIMIT {
                    ps.delta_angles[axis] = PITCH_LIMIT - cmd.angles[axis];
                    temp = PITCH_LIMIT;
                } else if temp < -PITCH_LIMIT {
                    ps.delta_angles[axis] = -PITCH_LIMIT - cmd.angles[axis];
                    temp = -PITCH_LIMIT;
                }
            }
            ps.viewangles[axis] = short2angle(temp as i16);
        }

        if self.pm.ps.e_flags.mounted() {
            self.mounted_view_limits(&old);
        } else if self.pm.ps.weapon == Weapon::MortarSet {
            self.mortar_view_limits(&old);
        } else if self.eflag(EFlags::PRONE) {
            self.prone_view_limits(&old);
        }

        self.update_lean();
    }

    fn mounted_view_limits(&mut self, old: &Vec3) {
        self.limit_turn_rate(YAW, old[YAW], MG42_YAWSPEED);

        let pmext = &mut *self.pm.pmext;
        let mut below = pmext.varc;
        let above = if self.pm.ps.e_flags.contains(EFlags::AAGUN_ACTIVE) {
            0.0
        } else if self.pm.ps.e_flags.contains(EFlags::MOUNTEDTANK) {
            below = TANK_PITCH_DOWN;

            // the barrel's pitch follows the hull as the turret turns
            let turn = angle_normalize180(pmext.centerangles[YAW] - self.pm.ps.viewangles[YAW]);
            let tilt = (turn * DEG_TO_RAD).cos() * angle_normalize180(-pmext.centerangles[PITCH]);
            pmext.centerangles[PITCH] = -angle_normalize360(tilt);

            TANK_PITCH_UP
        } else {
            pmext.varc / 2.0
        };

        let center = self.pm.pmext.centerangles;
        self.clamp_to_arc(PITCH, center[PITCH], above, below);

        if !self.eflag(EFlags::MOUNTEDTANK) {
            let harc = self.pm.pmext.harc;
            self.clamp_to_arc(YAW, center[YAW], harc, harc);
        }
    }

    fn mortar_view_limits(&mut self, old: &Vec3) {
        self.limit_turn_rate(YAW, old[YAW], MORTAR_TRAVERSE_SPEED);
        self.limit_turn_rate(PITCH, old[PITCH], MORTAR_TRAVERSE_SPEED);

        let mounted = self.pm.pmext.mounted_weapon_angles;
        self.clamp_to_deployed_arc(YAW, mounted[YAW], MORTAR_YAW_ARC, MORTAR_YAW_ARC);
        self.clamp_to_deployed_arc(PITCH, mounted[PITCH], MORTAR_PITCH_UP, MORTAR_PITCH_DOWN);
    }

    fn prone_view_limits(&mut self, old: &Vec3) {
        let mounted = self.pm.pmext.mounted_weapon_angles;
        let tick_yaw_delta = self.pm.ps.delta_angles[YAW];
        let mut pitch_arc = PRONE_PITCH_ARC;

        if self.pm.ps.weapon == Weapon::MobileMg42Set {
            pitch_arc = PRONE_MG_ARC;
            self.clamp_to_deployed_arc(YAW, mounted[YAW], PRONE_MG_ARC, PRONE_MG_ARC);
        }
        self.clamp_to_deployed_arc(PITCH, mounted[PITCH], pitch_arc, pitch_arc);

        if self.pm.ps.viewangles[YAW] == old[YAW] {
            return;
        }

        // turning swings the legs around, they must not end up in a wall
        let ps = &*self.pm.ps;
        let (legs, legs_offset) = trace_legs(
            self.cb,
            &ps.origin,
            &ps.origin,
            None,
            &ps.viewangles,
            ps.client_num,
            self.pm.tracemask,
            true,
        );
        self.pm.pmext.prone_legs_offset = legs_offset;

        if legs.allsolid {
            trace!(yaw = self.pm.ps.viewangles[YAW], "prone turn blocked by legs");
            self.force_view_angle(YAW, old[YAW]);
        } else {
            // the arc clamp only bounds this tick's view
            self.pm.ps.delta_angles[YAW] = tick_yaw_delta;
        }
    }

    // --------------------------------------------------------
    // PM_UpdateLean
    // --------------------------------------------------------

    pub(crate) fn update_lean(&mut self) {
        let cmd = self.pm.cmd;
        let mut leaning = 0;

        if cmd.wbuttons.intersects(WButtons::LEANLEFT | WButtons::LEANRIGHT)
            && cmd.forwardmove == 0
            && cmd.upmove <= 0
        {
            // both held cancel out
            if cmd.wbuttons.contains(WButtons::LEANLEFT) {
                leaning -= 1;
            }
            if cmd.wbuttons.contains(WButtons::LEANRIGHT) {
                leaning += 1;
            }
        }

        if self.pm.ps.e_flags.mounted() || self.eflag(EFlags::FIRING) {
            leaning = 0;
        }

        // a panzerfaust being fired keeps whatever lean it had
        if self.pm.ps.weapon_delay != 0 && self.pm.ps.weapon == Weapon::Panzerfaust {
            return;
        }

        if self.eflag(EFlags::PRONE) || self.pm.ps.weapon == Weapon::MortarSet {
            leaning = 0;
        }

        let msec = self.pml.msec as f32;
        let mut leanofs = self.pm.ps.leanf;

        match leaning {
            0 => {
                let step = msec / LEAN_TIME_FR * LEAN_MAX;
                if leanofs > 0.0 {
                    leanofs = (leanofs - step).max(0.0);
                } else if leanofs < 0.0 {
                    leanofs = (leanofs + step).min(0.0);
                }
            }
            l if l > 0 => {
                if leanofs < LEAN_MAX {
                    leanofs += msec / LEAN_TIME_TO * LEAN_MAX;
                }
                leanofs = leanofs.min(LEAN_MAX);
            }
            _ => {
                if leanofs > -LEAN_MAX {
                    leanofs -= msec / LEAN_TIME_TO * LEAN_MAX;
                }
                leanofs = leanofs.max(-LEAN_MAX);
            }
        }

        self.pm.ps.leanf = leanofs;

        if leaning != 0 {
            let ps = &*self.pm.ps;
            let mut start = ps.origin;
            start[2] += ps.viewheight as f32;

            let mut viewangles = ps.viewangles;
            viewangles[ROLL] += leanofs / 2.0;
            let (_, right, _) = angle_vectors(&viewangles);
            let end = vector_ma(&start, leanofs, &right);

            let tr = self
                .cb
                .trace(&start, &LEAN_MINS, &LEAN_MAXS, &end, ps.client_num, MASK_PLAYERSOLID);
            self.pm.ps.leanf *= tr.fraction;
        }

        // strafing is locked out while leaning
        if self.pm.ps.leanf != 0.0 {
            self.pm.cmd.rightmove = 0;
        }
    }
}
