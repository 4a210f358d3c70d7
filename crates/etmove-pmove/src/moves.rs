// moves.rs — friction, acceleration and the per-medium movement modes

use etmove_common::cvar::MiscFlags;
use etmove_common::events::{EntityEvent, EventSink};
use etmove_common::q_shared::{
    angle_delta, angle_normalize180, angle_vectors, dot_product, vector_length, vector_ma,
    vector_normalize, vector_normalize2, vector_scale, vector_subtract, vectoangles, Buttons, Contents, DoubleTap, EFlags, PmFlags, PmType, Skill,
    SurfFlags, Vec3, DEFAULT_VIEWHEIGHT, ENTITYNUM_NONE, VEC3_ORIGIN,
};
use etmove_common::weapons::Weapon;

use crate::pmove::{PmoveCallbacks, PmoveContext, JUMP_VELOCITY, OVERCLIP};
use crate::slidemove::pm_clip_velocity;

// ============================================================
// Tuning
// ============================================================

const STOP_SPEED: f32 = 100.0;

const WATER_SWIM_SCALE: f32 = 0.5;
const SLAG_SWIM_SCALE: f32 = 0.3;
const PRONE_SPEED_SCALE: f32 = 0.21;

const ACCELERATE: f32 = 10.0;
const AIR_ACCELERATE: f32 = 1.0;
const WATER_ACCELERATE: f32 = 4.0;
const SLAG_ACCELERATE: f32 = 2.0;
const FLY_ACCELERATE: f32 = 8.0;

const FRICTION: f32 = 6.0;
const WATER_FRICTION: f32 = 1.0;
const SLAG_FRICTION: f32 = 1.0;
const LADDER_FRICTION: f32 = 14.0;
const SPECTATOR_FRICTION: f32 = 5.0;
const NOCLIP_FRICTION: f32 = FRICTION * 1.5;

/// Minimum time between two jumps, and the window a double jump may use.
pub(crate) const JUMP_DELAY: i32 = 850;
const JUMP_STAMINA_COST: i32 = 2500;
const DOUBLE_JUMP_SCALE: f32 = 1.4;

const DODGE_TIME: i32 = 350;
const DODGE_FRICTION_START: i32 = 250;
const DODGE_SIDE_MOVE: f32 = 2070.0;

const MOVEMENT_DIR_LIMIT: i32 = 75;

impl<C: PmoveCallbacks, S: EventSink> PmoveContext<'_, '_, C, S> {
    // --------------------------------------------------------
    // PM_Friction
    // --------------------------------------------------------

    /// Handles both ground friction and water friction.
    pub(crate) fn friction(&mut self) {
        let mut vec = self.pm.ps.velocity;
        if self.pml.walking {
            // ignore slope movement
            vec[2] = 0.0;
        }

        let speed = vector_length(&vec);
        let pm_type = self.pm.ps.pm_type;
        let flying = matches!(pm_type, PmType::Spectator | PmType::Noclip);

        if speed < 1.0 && !flying {
            // allow sinking underwater
            self.pm.ps.velocity[0] = 0.0;
            self.pm.ps.velocity[1] = 0.0;
            return;
        }

        let ft = self.pml.frametime;
        let mut drop = 0.0;

        // end of dodge
        let since_dodge = self.now() - self.pm.pmext.dodge_time;
        if since_dodge < DODGE_TIME && since_dodge > DODGE_FRICTION_START {
            drop += speed * 20.0 * ft;
        }

        // ground friction, unless getting knocked back
        if self.pm.waterlevel <= 1
            && self.pml.walking
            && !self.pml.ground_trace.surface_flags.contains(SurfFlags::SLICK)
            && !self.pmflag(PmFlags::TIME_KNOCKBACK)
        {
            let control = speed.max(STOP_SPEED);
            drop += control * FRICTION * ft;
        }

        // water friction even if just wading
        if self.pm.waterlevel != 0 {
            let friction = if self.pm.watertype == Contents::SLIME {
                SLAG_FRICTION
            } else {
                WATER_FRICTION
            };
            drop += speed * friction * self.pm.waterlevel as f32 * ft;
        }

        if pm_type == PmType::Spectator {
            drop += speed * SPECTATOR_FRICTION * ft;
        }

        // ladder strafe friction
        if self.pml.ladder {
            drop += speed * LADDER_FRICTION * ft;
        }

        let mut newspeed = (speed - drop).max(0.0) / speed;

        // barely moving and barely slowing: stop instead of creeping
        if flying && drop < 1.0 && speed < 3.0 {
            newspeed = 0.0;
        }

        self.pm.ps.velocity = vector_scale(&self.pm.ps.velocity, newspeed);
    }

    // --------------------------------------------------------
    // PM_Accelerate
    // --------------------------------------------------------
    pub(crate) fn accelerate(&mut self, wishdir: &Vec3, wishspeed: f32, accel: f32) {
        let currentspeed = dot_product(&self.pm.ps.velocity, wishdir);
        let addspeed = wishspeed - currentspeed;
        if addspeed <= 0.0 {
            return;
        }

        let mut accelspeed = (accel * self.pml.frametime * wishspeed).min(addspeed);

        // per-player ground grip
        if self.pm.ps.ground_entity_num != ENTITYNUM_NONE {
            accelspeed *= 1.0 / self.pm.ps.friction;
        }
        accelspeed = accelspeed.min(addspeed);

        self.pm.ps.velocity = vector_ma(&self.pm.ps.velocity, accelspeed, wishdir);
    }

    // --------------------------------------------------------
    // PM_CmdScale
    // --------------------------------------------------------

    /// Scale factor that maps the -127..127 command axes onto a speed
    /// without the sqrt(2) diagonal bonus.
    pub(crate) fn cmd_scale(&self) -> f32 {
        let cmd = &self.pm.cmd;
        let (f, r, u) = (cmd.forwardmove as i32, cmd.rightmove as i32, cmd.upmove as i32);

        let max = f.abs().max(r.abs()).max(u.abs());
        if max == 0 {
            return 0.0;
        }

        let total = ((f * f + r * r + u * u) as f32).sqrt();
        let ps = &*self.pm.ps;
        let mut scale = ps.speed as f32 * max as f32 / (127.0 * total);

        if cmd.buttons.contains(Buttons::SPRINT) && self.pm.pmext.sprint_time > 50 {
            scale *= ps.sprint_speed_scale;
        } else {
            scale *= ps.run_speed_scale;
        }

        if ps.pm_type == PmType::Noclip {
            scale *= 3.0;
        }

        // heavy weapons slow their carrier
        let heavy = matches!(
            ps.weapon,
            Weapon::MobileMg42 | Weapon::MobileMg42Set | Weapon::Mortar
        ) || (ps.weapon == Weapon::Panzerfaust && !self.pm.config.panzer_war);
        let heavy_weapons = self.skill(Skill::HeavyWeapons);
        if heavy {
            scale *= if heavy_weapons >= 3 { 0.75 } else { 0.5 };
        }

        if ps.weapon == Weapon::Flamethrower
            && (heavy_weapons < 3 || cmd.buttons.contains(Buttons::ATTACK))
        {
            scale *= 0.7;
        }

        scale
    }

    // --------------------------------------------------------
    // PM_SetMovementDir
    // --------------------------------------------------------

    /// Legs yaw relative to the view, from the distance actually moved.
    pub(crate) fn set_movement_dir(&mut self) {
        let ps = &*self.pm.ps;
        let moved = vector_subtract(&ps.origin, &self.pml.previous_origin);
        let (dir, speed) = vector_normalize2(&moved);
        let input = self.pm.cmd.forwardmove != 0 || self.pm.cmd.rightmove != 0;

        // slower than 20 units per second just faces the head angles
        if input && ps.ground_entity_num != ENTITYNUM_NONE && speed > self.pml.frametime * 5.0 {
            let angles = vectoangles(&dir);
            let mut moveyaw = angle_delta(angles[1], ps.viewangles[1]) as i32;

            if self.pm.cmd.forwardmove < 0 {
                moveyaw = angle_normalize180((moveyaw + 180) as f32) as i32;
            }

            self.pm.ps.movement_dir = moveyaw.clamp(-MOVEMENT_DIR_LIMIT, MOVEMENT_DIR_LIMIT);
        } else {
            self.pm.ps.movement_dir = 0;
        }
    }

    // --------------------------------------------------------
    // Jumps
    // --------------------------------------------------------

    /// Launch off the ground with `velocity`, forcing the jump animation.
    fn launch(&mut self, velocity: f32) {
        self.pml.ground_plane = false;
        self.pml.walking = false;
        self.pm.ps.pm_flags.insert(PmFlags::JUMP_HELD);

        self.pm.ps.ground_entity_num = ENTITYNUM_NONE;
        self.pm.ps.velocity[2] = velocity;
        self.add_event(EntityEvent::Jump);
        self.jump_anim(true);
    }

    /// Common jump preconditions: not respawning, jump pressed, and jump
    /// released since the last one.
    fn jump_pressed(&mut self) -> bool {
        if self.pmflag(PmFlags::RESPAWNED) {
            return false;
        }
        if self.pm.cmd.upmove < 10 {
            return false;
        }
        if self.pmflag(PmFlags::JUMP_HELD) {
            // clear upmove so cmd_scale doesn't lower running speed
            self.pm.cmd.upmove = 0;
            return false;
        }
        true
    }

    pub(crate) fn check_jump(&mut self) -> bool {
        if self.eflag(EFlags::PRONE) {
            return false;
        }
        if self.now() - self.pm.pmext.jump_time < JUMP_DELAY {
            return false;
        }
        if !self.jump_pressed() {
            return false;
        }

        self.launch(JUMP_VELOCITY);
        true
    }

    /// A second, stronger jump while still airborne from the first.
    pub(crate) fn check_double_jump(&mut self) -> bool {
        if !self.pm.config.misc.contains(MiscFlags::DOUBLEJUMP) {
            return false;
        }
        if self.pmflag(PmFlags::DOUBLEJUMPING) || self.eflag(EFlags::PRONE) {
            return false;
        }
        if self.now() - self.pm.pmext.jump_time >= JUMP_DELAY {
            return false;
        }
        if !self.jump_pressed() {
            return false;
        }

        self.launch(JUMP_VELOCITY * DOUBLE_JUMP_SCALE);
        true
    }

    pub(crate) fn check_water_jump(&mut self) -> bool {
        if self.pm.ps.pm_time != 0 {
            return false;
        }
        if self.pm.waterlevel != 2 {
            return false;
        }

        let mut flatforward = [self.pml.forward[0], self.pml.forward[1], 0.0];
        vector_normalize(&mut flatforward);

        let client = self.pm.ps.client_num;
        let mut spot = vector_ma(&self.pm.ps.origin, 30.0, &flatforward);
        spot[2] += 4.0;
        if !self.cb.pointcontents(&spot, client).contains(Contents::SOLID) {
            return false;
        }

        spot[2] += 16.0;
        if !self.cb.pointcontents(&spot, client).is_empty() {
            return false;
        }

        // jump out of water
        self.pm.ps.velocity = vector_scale(&self.pml.forward, 200.0);
        self.pm.ps.velocity[2] = 350.0;

        self.pm.ps.pm_flags.insert(PmFlags::TIME_WATERJUMP);
        self.pm.ps.pm_time = 2000;
        true
    }

    /// Sideways dodge on a double-tapped strafe. Currently switched off;
    /// the air move still honours a dodge already in progress.
    pub(crate) fn check_dodge(&mut self) -> bool {
        false
    }

    // --------------------------------------------------------
    // Movement modes
    // --------------------------------------------------------

    /// Flying out of the water: no control, but falls.
    pub(crate) fn water_jump_move(&mut self) {
        self.step_slide_move(true);

        self.pm.ps.velocity[2] -= self.pm.ps.gravity as f32 * self.pml.frametime;
        if self.pm.ps.velocity[2] < 0.0 {
            // cancel as soon as we are falling down again
            self.pm.ps.pm_flags.remove(PmFlags::ALL_TIMES);
            self.pm.ps.pm_time = 0;
        }
    }

    pub(crate) fn water_move(&mut self) {
        if self.check_water_jump() {
            self.water_jump_move();
            return;
        }

        self.friction();

        let scale = self.cmd_scale();
        let cmd = self.pm.cmd;
        let wishvel = if scale == 0.0 {
            // sink towards bottom
            [0.0, 0.0, -60.0]
        } else {
            let mut v = [0.0; 3];
            for i in 0..3 {
                v[i] = scale * self.pml.forward[i] * cmd.forwardmove as f32
                    + scale * self.pml.right[i] * cmd.rightmove as f32;
            }
            v[2] += scale * cmd.upmove as f32;
            v
        };

        let (wishdir, mut wishspeed) = vector_normalize2(&wishvel);
        let speed = self.pm.ps.speed as f32;

        if self.pm.watertype == Contents::SLIME {
            wishspeed = wishspeed.min(speed * SLAG_SWIM_SCALE);
            self.accelerate(&wishdir, wishspeed, SLAG_ACCELERATE);
        } else {
            wishspeed = wishspeed.min(speed * WATER_SWIM_SCALE);
            self.accelerate(&wishdir, wishspeed, WATER_ACCELERATE);
        }

        // make sure we can go up slopes easily under water
        let normal = self.pml.ground_trace.plane.normal;
        if self.pml.ground_plane && dot_product(&self.pm.ps.velocity, &normal) < 0.0 {
            let vel = vector_length(&self.pm.ps.velocity);
            let inv = self.pm.ps.velocity;
            pm_clip_velocity(&inv, &normal, &mut self.pm.ps.velocity, OVERCLIP);
            vector_normalize(&mut self.pm.ps.velocity);
            self.pm.ps.velocity = vector_scale(&self.pm.ps.velocity, vel);
        }

        self.slide_move(false);
    }

    /// Spectator flight.
    pub(crate) fn fly_move(&mut self) {
        self.friction();

        let scale = self.cmd_scale();
        let cmd = self.pm.cmd;
        let mut wishvel = [0.0; 3];
        if scale != 0.0 {
            for i in 0..3 {
                wishvel[i] = scale * self.pml.forward[i] * cmd.forwardmove as f32
                    + scale * self.pml.right[i] * cmd.rightmove as f32;
            }
            wishvel[2] += scale * cmd.upmove as f32;
        }

        let (wishdir, wishspeed) = vector_normalize2(&wishvel);
        self.accelerate(&wishdir, wishspeed, FLY_ACCELERATE);
        self.step_slide_move(false);
    }

    pub(crate) fn air_move(&mut self) {
        if self.check_double_jump() {
            self.pm.ps.pm_flags.insert(PmFlags::DOUBLEJUMPING);
            if self.pm.waterlevel > 1 {
                self.water_move();
            }
            self.pm.ps.jump_time = self.now();
        }

        self.friction();

        let mut fmove = self.pm.cmd.forwardmove as f32;
        let mut smove = self.pm.cmd.rightmove as f32;
        let scale;

        // project moves down to flat plane
        if self.now() - self.pm.pmext.dodge_time < DODGE_TIME {
            self.pml.forward[2] = 0.0;
            fmove = 0.0;
            smove = if self.pm.pmext.dtmove == DoubleTap::MoveLeft {
                -DODGE_SIDE_MOVE
            } else {
                DODGE_SIDE_MOVE
            };
            scale = 1.0;
        } else {
            scale = self.cmd_scale();
            self.pml.forward[2] = 0.0;
            self.pml.right[2] = 0.0;
        }
        vector_normalize(&mut self.pml.forward);
        vector_normalize(&mut self.pml.right);

        let wishvel = [
            self.pml.forward[0] * fmove + self.pml.right[0] * smove,
            self.pml.forward[1] * fmove + self.pml.right[1] * smove,
            0.0,
        ];
        let (wishdir, wishspeed) = vector_normalize2(&wishvel);

        // not on ground, so little effect on velocity
        self.accelerate(&wishdir, wishspeed * scale, AIR_ACCELERATE);

        // a steep plane we can't stand on still deflects us
        if self.pml.ground_plane {
            let inv = self.pm.ps.velocity;
            pm_clip_velocity(&inv, &self.pml.ground_trace.plane.normal, &mut self.pm.ps.velocity, OVERCLIP);
        }

        self.step_slide_move(true);
        self.set_movement_dir();
    }

    pub(crate) fn walk_move(&mut self) {
        let normal = self.pml.ground_trace.plane.normal;

        if self.pm.waterlevel > 2 && dot_product(&self.pml.forward, &normal) > 0.0 {
            // begin swimming
            self.water_move();
            return;
        }

        if self.check_jump() {
            // jumped away
            if self.pm.waterlevel > 1 {
                self.water_move();
            } else {
                self.air_move();
            }

            // jumping costs stamina, but only once per jump window
            let now = self.now();
            if now - self.pm.pmext.jump_time >= JUMP_DELAY {
                let pmext = &mut *self.pm.pmext;
                pmext.sprint_time = (pmext.sprint_time - JUMP_STAMINA_COST).max(0);
                pmext.jump_time = now;
            }

            self.pm.ps.jump_time = now;
            return;
        } else if self.pm.waterlevel <= 1 && self.check_dodge() {
            self.air_move();
            return;
        }

        self.friction();

        let fmove = self.pm.cmd.forwardmove as f32;
        let smove = self.pm.cmd.rightmove as f32;
        let scale = self.cmd_scale();

        // project the forward and right directions onto the ground plane
        self.pml.forward[2] = 0.0;
        self.pml.right[2] = 0.0;
        let (forward, right) = (self.pml.forward, self.pml.right);
        pm_clip_velocity(&forward, &normal, &mut self.pml.forward, OVERCLIP);
        pm_clip_velocity(&right, &normal, &mut self.pml.right, OVERCLIP);
        vector_normalize(&mut self.pml.forward);
        vector_normalize(&mut self.pml.right);

        // wish velocity keeps its slope component
        let mut wishvel = [0.0; 3];
        for i in 0..3 {
            wishvel[i] = self.pml.forward[i] * fmove + self.pml.right[i] * smove;
        }

        let (wishdir, wishspeed) = vector_normalize2(&wishvel);
        let mut wishspeed = wishspeed * scale;
        let speed = self.pm.ps.speed as f32;

        if self.eflag(EFlags::PRONE) {
            wishspeed = wishspeed.min(speed * PRONE_SPEED_SCALE);
        } else if self.pmflag(PmFlags::DUCKED) {
            wishspeed = wishspeed.min(speed * self.pm.ps.crouch_speed_scale);
        }

        // wading or walking on the bottom
        if self.pm.waterlevel != 0 {
            let depth = self.pm.waterlevel as f32 / 3.0;
            let swim = if self.pm.watertype == Contents::SLIME {
                SLAG_SWIM_SCALE
            } else {
                WATER_SWIM_SCALE
            };
            let water_scale = 1.0 - (1.0 - swim) * depth;
            wishspeed = wishspeed.min(speed * water_scale);
        }

        // when a player gets hit, they temporarily lose full control
        let slick = self.pml.ground_trace.surface_flags.contains(SurfFlags::SLICK)
            || self.pmflag(PmFlags::TIME_KNOCKBACK);
        let accel = if slick { AIR_ACCELERATE } else { ACCELERATE };

        self.accelerate(&wishdir, wishspeed, accel);

        if slick {
            self.pm.ps.velocity[2] -= self.pm.ps.gravity as f32 * self.pml.frametime;
        }

        // breath shows on snow
        if self.pml.ground_trace.surface_flags.contains(SurfFlags::SNOW) {
            self.pm.ps.e_flags.insert(EFlags::BREATH);
        } else {
            self.pm.ps.e_flags.remove(EFlags::BREATH);
        }

        // slide along the ground plane
        let inv = self.pm.ps.velocity;
        pm_clip_velocity(&inv, &normal, &mut self.pm.ps.velocity, OVERCLIP);

        // don't do anything if standing still
        if self.pm.ps.velocity[0] == 0.0 && self.pm.ps.velocity[1] == 0.0 {
            if self.eflag(EFlags::PRONE) {
                self.pm.pmext.prone_ground_time = self.now();
            }
            return;
        }

        self.step_slide_move(false);
        self.set_movement_dir();
    }

    /// Corpses and players faking death slide to a halt.
    pub(crate) fn dead_move(&mut self) {
        if !self.pml.walking {
            return;
        }

        // extra friction
        let forward = vector_length(&self.pm.ps.velocity) - 20.0;
        if forward <= 0.0 {
            self.pm.ps.velocity = VEC3_ORIGIN;
        } else {
            vector_normalize(&mut self.pm.ps.velocity);
            self.pm.ps.velocity = vector_scale(&self.pm.ps.velocity, forward);
        }
    }

    pub(crate) fn noclip_move(&mut self) {
        self.pm.ps.viewheight = DEFAULT_VIEWHEIGHT as i32;

        let speed = vector_length(&self.pm.ps.velocity);
        if speed < 1.0 {
            self.pm.ps.velocity = VEC3_ORIGIN;
        } else {
            let control = speed.max(STOP_SPEED);
            let drop = control * NOCLIP_FRICTION * self.pml.frametime;
            let newspeed = (speed - drop).max(0.0) / speed;
            self.pm.ps.velocity = vector_scale(&self.pm.ps.velocity, newspeed);
        }

        let scale = self.cmd_scale();
        let cmd = self.pm.cmd;
        let mut wishvel = [0.0; 3];
        for i in 0..3 {
            wishvel[i] = self.pml.forward[i] * cmd.forwardmove as f32
                + self.pml.right[i] * cmd.rightmove as f32;
        }
        wishvel[2] += cmd.upmove as f32;

        let (wishdir, wishspeed) = vector_normalize2(&wishvel);
        self.accelerate(&wishdir, wishspeed * scale, ACCELERATE);

        self.pm.ps.origin = vector_ma(&self.pm.ps.origin, self.pml.frametime, &self.pm.ps.velocity);
    }

    // --------------------------------------------------------
    // PM_LadderMove
    // --------------------------------------------------------

    /// Climb with forward/back, strafe off with left/right, no gravity.
    pub(crate) fn ladder_move(&mut self) {
        if self.pml.ladder_forward {
            // move towards the ladder
            let toward = vector_scale(&self.pml.ladder_vec, -200.0);
            self.pm.ps.velocity[0] = toward[0];
            self.pm.ps.velocity[1] = toward[1];
        }

        // looking down far enough turns forward into climbing down
        let upscale = ((self.pml.forward[2] + 0.5) * 2.5).clamp(-1.0, 1.0);

        // forward/right should be horizontal only
        self.pml.forward[2] = 0.0;
        self.pml.right[2] = 0.0;
        vector_normalize(&mut self.pml.forward);
        vector_normalize(&mut self.pml.right);

        let scale = self.cmd_scale();
        let cmd = self.pm.cmd;
        let mut wishvel = [0.0; 3];

        if cmd.forwardmove != 0 {
            wishvel[2] = 0.9 * upscale * scale * cmd.forwardmove as f32;
        }

        if cmd.rightmove != 0 {
            // strafe, so we can jump off the ladder
            let angles = vectoangles(&self.pml.ladder_vec);
            let (_, mut ladder_right, _) = angle_vectors(&angles);

            // looking away from the ladder reverses the right vector
            if dot_product(&self.pml.ladder_vec, &self.pml.forward) < 0.0 {
                ladder_right = vector_scale(&ladder_right, -1.0);
            }
            wishvel = vector_ma(&wishvel, 0.5 * scale * cmd.rightmove as f32, &ladder_right);
        }

        // strafe friction
        self.friction();

        for axis in 0..2 {
            if self.pm.ps.velocity[axis].abs() < 1.0 {
                self.pm.ps.velocity[axis] = 0.0;
            }
        }

        let (wishdir, wishspeed) = vector_normalize2(&wishvel);
        self.accelerate(&wishdir, wishspeed, ACCELERATE);

        // hold position vertically when not climbing
        if wishvel[2] == 0.0 {
            let pull = self.pm.ps.gravity as f32 * self.pml.frametime;
            let vz = &mut self.pm.ps.velocity[2];
            if *vz > 0.0 {
                *vz = (*vz - pull).max(0.0);
            } else {
                *vz = (*vz + pull).min(0.0);
            }
        }

        // no gravity while on the ladder
        self.step_slide_move(false);

        // always point legs forward
        self.pm.ps.movement_dir = 0;
    }

    // --------------------------------------------------------
    // Mode dispatcher
    // --------------------------------------------------------

    /// Pick the movement mode for this tick.
    pub(crate) fn dispatch_move(&mut self) {
        let tank = self.eflag(EFlags::MOUNTEDTANK);

        if self.pml.ladder {
            self.ladder_move();
        } else if self.pmflag(PmFlags::TIME_WATERJUMP) {
            self.water_jump_move();
        } else if self.pm.waterlevel > 1 {
            // swimming
            self.water_move();
        } else if self.pml.walking && !tank {
            self.walk_move();
        } else if !tank {
            // airborne
            self.air_move();
        }
    }
}
