// test_support.rs — box-world trace stub and player fixtures shared by the unit tests

use etmove_common::cvar::PmoveConfig;
use etmove_common::events::EventLog;
use etmove_common::q_shared::{
    angle_vectors, CharacterInfo, Contents, PlayerState, PmoveExt, SurfFlags, Trace, UserCmd,
    Vec3, ENTITYNUM_WORLD,
};
use etmove_common::weapons::WeaponTable;

use crate::error::PmoveError;
use crate::pmove::{pmove, pmove_single, Pmove, PmoveCallbacks, PmoveContext};

/// Route `tracing` output to the test harness. `RUST_LOG=etmove_pmove=trace`
/// shows every slice.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// ============================================================
// Box world
// ============================================================

const CLIP_EPSILON: f32 = 0.03125;
const TOUCH_EPSILON: f32 = 0.001;
const HUGE: f32 = 10000.0;

#[derive(Clone, Copy, Debug)]
pub struct Solid {
    pub mins: Vec3,
    pub maxs: Vec3,
    pub contents: Contents,
    pub surface: SurfFlags,
    pub entity: i32,
}

impl Solid {
    pub fn world(mins: Vec3, maxs: Vec3) -> Self {
        Self {
            mins,
            maxs,
            contents: Contents::SOLID,
            surface: SurfFlags::empty(),
            entity: ENTITYNUM_WORLD,
        }
    }
}

/// World built from axis-aligned boxes. Traces use the same plane-by-plane
/// clipping a brush collision model does, backed off by a small epsilon.
#[derive(Clone, Debug, Default)]
pub struct TestWorld {
    pub solids: Vec<Solid>,
}

impl TestWorld {
    pub fn open_air() -> Self {
        Self::default()
    }

    /// Flat ground whose top is z = 0.
    pub fn floor() -> Self {
        Self {
            solids: vec![Solid::world([-HUGE, -HUGE, -1000.0], [HUGE, HUGE, 0.0])],
        }
    }

    /// Floor plus a pool of water `depth` units deep.
    pub fn water(depth: f32) -> Self {
        let mut world = Self::floor();
        world.solids.push(Solid {
            contents: Contents::WATER,
            ..Solid::world([-HUGE, -HUGE, 0.0], [HUGE, HUGE, depth])
        });
        world
    }

    /// Floor plus a ladder-faced wall filling everything past `x`.
    pub fn ladder_wall(x: f32) -> Self {
        let mut world = Self::floor();
        world.solids.push(Solid {
            surface: SurfFlags::LADDER,
            ..Solid::world([x, -HUGE, 0.0], [x + 100.0, HUGE, 1000.0])
        });
        world
    }

    pub fn without_ladder(mut self) -> Self {
        for solid in &mut self.solids {
            solid.surface.remove(SurfFlags::LADDER);
        }
        self
    }

    pub fn with_ceiling(mut self, height: f32) -> Self {
        self.solids
            .push(Solid::world([-HUGE, -HUGE, height], [HUGE, HUGE, height + 1000.0]));
        self
    }

    /// Raised floor of height `h` for everything past `x`.
    pub fn with_step(mut self, x: f32, h: f32) -> Self {
        self.solids.push(Solid::world([x, -HUGE, 0.0], [HUGE, HUGE, h]));
        self
    }

    pub fn with_surface(mut self, surface: SurfFlags) -> Self {
        if let Some(floor) = self.solids.first_mut() {
            floor.surface = surface;
        }
        self
    }

    pub fn with_solid(mut self, solid: Solid) -> Self {
        self.solids.push(solid);
        self
    }

    /// Clip a box sweep against one solid. Returns `None` when it misses.
    fn clip(&self, solid: &Solid, start: &Vec3, mins: &Vec3, maxs: &Vec3, end: &Vec3) -> Option<Trace> {
        let mut enter = -1.0f32;
        let mut leave = 1.0f32;
        let mut normal = [0.0; 3];
        let mut starts_out = false;
        let mut ends_out = false;

        for axis in 0..3 {
            // upper face pushes out along +axis, lower face along -axis
            for sign in [1.0f32, -1.0] {
                let (d1, d2) = if sign > 0.0 {
                    let face = solid.maxs[axis] - mins[axis];
                    (start[axis] - face, end[axis] - face)
                } else {
                    let face = solid.mins[axis] - maxs[axis];
                    (face - start[axis], face - end[axis])
                };

                let outside = d1 > -TOUCH_EPSILON;
                if outside {
                    starts_out = true;
                }
                if d2 > -TOUCH_EPSILON {
                    ends_out = true;
                }

                if outside && (d2 >= CLIP_EPSILON || d2 >= d1) {
                    return None;
                }
                if !outside && d2 <= 0.0 {
                    continue;
                }

                if d1 > d2 {
                    let f = ((d1 - CLIP_EPSILON) / (d1 - d2)).max(0.0);
                    if f > enter {
                        enter = f;
                        normal = [0.0; 3];
                        normal[axis] = sign;
                    }
                } else {
                    let f = ((d1 + CLIP_EPSILON) / (d1 - d2)).min(1.0);
                    leave = leave.min(f);
                }
            }
        }

        if !starts_out {
            return Some(Trace {
                startsolid: true,
                allsolid: !ends_out,
                fraction: 0.0,
                endpos: *start,
                contents: solid.contents,
                surface_flags: solid.surface,
                entity_num: solid.entity,
                ..Trace::default()
            });
        }

        if enter < leave && enter > -1.0 {
            let fraction = enter.max(0.0);
            let mut trace = Trace {
                fraction,
                contents: solid.contents,
                surface_flags: solid.surface,
                entity_num: solid.entity,
                ..Trace::default()
            };
            trace.plane.normal = normal;
            return Some(trace);
        }
        None
    }
}

impl PmoveCallbacks for TestWorld {
    fn trace(
        &self,
        start: &Vec3,
        mins: &Vec3,
        maxs: &Vec3,
        end: &Vec3,
        _pass_entity: i32,
        mask: Contents,
    ) -> Trace {
        let mut best = Trace {
            endpos: *end,
            ..Trace::default()
        };

        for solid in self.solids.iter().filter(|s| s.contents.intersects(mask)) {
            let Some(hit) = self.clip(solid, start, mins, maxs, end) else {
                continue;
            };
            if hit.startsolid {
                best.startsolid = true;
                if hit.allsolid {
                    best.allsolid = true;
                }
            }
            if hit.fraction < best.fraction || (hit.startsolid && best.fraction > 0.0) {
                let (startsolid, allsolid) = (best.startsolid, best.allsolid);
                best = hit;
                best.startsolid = startsolid;
                best.allsolid = allsolid;
            }
        }

        if best.fraction < 1.0 || best.startsolid {
            for i in 0..3 {
                best.endpos[i] = start[i] + best.fraction * (end[i] - start[i]);
            }
        }
        best
    }

    fn pointcontents(&self, point: &Vec3, _pass_entity: i32) -> Contents {
        self.solids
            .iter()
            .filter(|s| (0..3).all(|i| point[i] > s.mins[i] && point[i] < s.maxs[i]))
            .fold(Contents::empty(), |acc, s| acc | s.contents)
    }
}

// ============================================================
// Fixture — owns everything a Pmove borrows
// ============================================================

pub fn cmd_at(server_time: i32) -> UserCmd {
    UserCmd {
        server_time,
        ..UserCmd::default()
    }
}

pub struct Fixture {
    pub ps: PlayerState,
    pub pmext: PmoveExt,
    pub character: CharacterInfo,
    pub weapons: WeaponTable,
    pub config: PmoveConfig,
}

impl Fixture {
    /// Player at the origin, last simulated at t = 1000.
    pub fn new() -> Self {
        let ps = PlayerState {
            command_time: 1000,
            ..PlayerState::default()
        };
        Self {
            ps,
            pmext: PmoveExt::default(),
            character: CharacterInfo::default(),
            weapons: WeaponTable::default(),
            config: PmoveConfig::default(),
        }
    }

    /// Player standing still on `TestWorld::floor()`.
    pub fn standing() -> Self {
        let mut fx = Self::new();
        fx.ps.origin = [0.0, 0.0, 24.0];
        fx
    }

    fn pmove(&mut self, cmd: UserCmd) -> Pmove<'_> {
        Pmove::new(
            &mut self.ps,
            &mut self.pmext,
            &self.character,
            &self.weapons,
            &self.config,
            cmd,
        )
    }

    pub fn run_single(&mut self, world: &TestWorld, cmd: UserCmd, log: &mut EventLog) -> Result<(), PmoveError> {
        let mut pm = self.pmove(cmd);
        pmove_single(&mut pm, world, log)
    }

    pub fn run_span(
        &mut self,
        world: &TestWorld,
        cmd: UserCmd,
        log: &mut EventLog,
    ) -> Result<SurfFlags, PmoveError> {
        let mut pm = self.pmove(cmd);
        pmove(&mut pm, world, log)
    }

    /// Build a context for `cmd` as a tick would at its start (8 ms frame,
    /// view vectors from the current angles, stance box) and hand it to `f`.
    pub fn with_context<R>(
        &mut self,
        world: &TestWorld,
        cmd: UserCmd,
        log: &mut EventLog,
        f: impl FnOnce(&mut PmoveContext<'_, '_, TestWorld, EventLog>) -> R,
    ) -> R {
        let mut pm = self.pmove(cmd);
        pm.mins = pm.ps.mins;
        pm.maxs = pm.ps.maxs;
        let mut ctx = PmoveContext::new(&mut pm, world, log);
        ctx.pml.msec = 8;
        ctx.pml.frametime = 0.008;
        ctx.pml.previous_origin = ctx.pm.ps.origin;
        ctx.pml.previous_velocity = ctx.pm.ps.velocity;
        let (forward, right, up) = angle_vectors(&ctx.pm.ps.viewangles);
        ctx.pml.forward = forward;
        ctx.pml.right = right;
        ctx.pml.up = up;
        f(&mut ctx)
    }
}

#[test]
fn test_box_world_floor_contact() {
    let world = TestWorld::floor();
    let mins = [-18.0, -18.0, -24.0];
    let maxs = [18.0, 18.0, 48.0];

    // resting exactly on the floor is not solid
    let tr = world.trace(&[0.0, 0.0, 24.0], &mins, &maxs, &[0.0, 0.0, 24.0], 0, Contents::SOLID);
    assert!(!tr.startsolid);
    assert_eq!(tr.fraction, 1.0);

    // dropping onto it stops just above
    let tr = world.trace(&[0.0, 0.0, 40.0], &mins, &maxs, &[0.0, 0.0, 0.0], 0, Contents::SOLID);
    assert!(tr.fraction < 1.0);
    assert!((tr.endpos[2] - 24.0).abs() < 0.05);
    assert_eq!(tr.plane.normal, [0.0, 0.0, 1.0]);

    // sunk into it is stuck
    let tr = world.trace(&[0.0, 0.0, 10.0], &mins, &maxs, &[0.0, 0.0, 10.0], 0, Contents::SOLID);
    assert!(tr.allsolid);
}

#[test]
fn test_box_world_water_contents() {
    let world = TestWorld::water(30.0);
    assert_eq!(world.pointcontents(&[0.0, 0.0, 10.0], 0), Contents::WATER);
    assert_eq!(world.pointcontents(&[0.0, 0.0, 40.0], 0), Contents::empty());
    assert_eq!(world.pointcontents(&[0.0, 0.0, -5.0], 0), Contents::SOLID);
}
