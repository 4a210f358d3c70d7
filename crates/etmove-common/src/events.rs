// events.rs — predictable events, animation script triggers and the sink they flow into

use tracing::trace;

use crate::q_shared::SurfFlags;

/// Events raised by a tick that the host plays back as sounds or effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityEvent {
    Footstep,
    FootstepMetal,
    FootstepWood,
    FootstepGrass,
    FootstepGravel,
    FootstepRoof,
    FootstepSnow,
    FootstepCarpet,
    FootSplash,
    FootWade,
    Step4,
    Step8,
    Step12,
    Step16,
    Swim,
    WaterTouch,
    WaterLeave,
    WaterUnder,
    WaterClear,
    Jump,
    FallShort,
    FallDmg10,
    FallDmg15,
    FallDmg25,
    FallDmg50,
    FallNdie,
    FireWeapon,
    FireWeaponB,
    FireWeaponLastShot,
    FireWeaponMg42,
    FireWeaponMountedMg42,
    FireWeaponAagun,
    NoAmmo,
    EmptyClip,
    FillClip,
    ChangeWeapon,
    ChangeWeapon2,
    SpinUp,
    WeapOverheat,
    NoFireUnderwater,
    ThrowMolotov,
    ThrowKnife,
    AltAttack2,
    M97Pump,
}

/// Body-animation script triggers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnimScriptEvent {
    ClimbMount,
    ClimbDismount,
    DoAltWeaponMode,
    DoAltWeaponModeProne,
    UndoAltWeaponMode,
    UndoAltWeaponModeProne,
    DropWeapon,
    RaiseWeapon,
    RaiseWeaponProne,
    FireWeapon,
    FireWeaponProne,
    FireWeapon2,
    FireWeapon2Prone,
    Jump,
    JumpBk,
    Land,
    NoPower,
    Reload,
    ReloadProne,
    ReloadSg1,
    ReloadSg1Prone,
    ReloadSg2,
    ReloadSg2Prone,
}

/// Script trigger together with its playback flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScriptTrigger {
    pub event: AnimScriptEvent,
    /// Keep the current animation running if it is already this one.
    pub is_continue: bool,
    /// Override a higher-priority animation.
    pub force: bool,
}

/// Legs movement animation selected by the tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveAnim {
    Idle,
    IdleCr,
    IdleProne,
    Walk,
    WalkBk,
    WalkCr,
    WalkCrBk,
    Run,
    RunBk,
    Prone,
    ProneBk,
    Swim,
    SwimBk,
    StrafeLeft,
    StrafeRight,
    ClimbUp,
    ClimbDown,
    Flailing,
    Fallen,
}

/// Footstep sound class of a surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FootstepType {
    #[default]
    Default,
    Metal,
    Wood,
    Grass,
    Gravel,
    Splash,
    Roof,
    Snow,
    Carpet,
}

impl FootstepType {
    /// Footstep class for the surface under the player; `None` on surfaces
    /// that make no sound.
    pub fn for_surface(flags: SurfFlags) -> Option<FootstepType> {
        if flags.contains(SurfFlags::NOSTEPS) {
            return None;
        }
        Some(if flags.contains(SurfFlags::METAL) {
            FootstepType::Metal
        } else if flags.contains(SurfFlags::WOOD) {
            FootstepType::Wood
        } else if flags.contains(SurfFlags::GRASS) {
            FootstepType::Grass
        } else if flags.contains(SurfFlags::GRAVEL) {
            FootstepType::Gravel
        } else if flags.contains(SurfFlags::ROOF) {
            FootstepType::Roof
        } else if flags.contains(SurfFlags::SNOW) {
            FootstepType::Snow
        } else if flags.contains(SurfFlags::CARPET) {
            FootstepType::Carpet
        } else if flags.contains(SurfFlags::SPLASH) {
            FootstepType::Splash
        } else {
            FootstepType::Default
        })
    }

    pub fn event(self) -> EntityEvent {
        match self {
            FootstepType::Default => EntityEvent::Footstep,
            FootstepType::Metal => EntityEvent::FootstepMetal,
            FootstepType::Wood => EntityEvent::FootstepWood,
            FootstepType::Grass => EntityEvent::FootstepGrass,
            FootstepType::Gravel => EntityEvent::FootstepGravel,
            FootstepType::Splash => EntityEvent::FootSplash,
            FootstepType::Roof => EntityEvent::FootstepRoof,
            FootstepType::Snow => EntityEvent::FootstepSnow,
            FootstepType::Carpet => EntityEvent::FootstepCarpet,
        }
    }
}

/// Receiver for everything a tick emits. Only entity events are mandatory;
/// hosts without an animation system can ignore the rest.
pub trait EventSink {
    fn add_event(&mut self, event: EntityEvent, parm: i32);

    fn script_event(&mut self, _trigger: ScriptTrigger) {}

    fn move_anim(&mut self, _anim: MoveAnim) {}

    /// Head-under-water condition for the animation system, set every tick.
    fn set_underwater(&mut self, _underwater: bool) {}
}

/// Anything a tick emitted, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Emitted {
    Entity(EntityEvent, i32),
    Script(ScriptTrigger),
    Movement(MoveAnim),
}

/// Collecting sink, used by prediction replays and tests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventLog {
    pub emitted: Vec<Emitted>,
    pub underwater: bool,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.emitted.clear();
    }

    pub fn entity_events(&self) -> impl Iterator<Item = (EntityEvent, i32)> + '_ {
        self.emitted.iter().filter_map(|e| match *e {
            Emitted::Entity(ev, parm) => Some((ev, parm)),
            _ => None,
        })
    }

    pub fn has_event(&self, event: EntityEvent) -> bool {
        self.entity_events().any(|(ev, _)| ev == event)
    }

    pub fn has_script(&self, event: AnimScriptEvent) -> bool {
        self.emitted
            .iter()
            .any(|e| matches!(e, Emitted::Script(t) if t.event == event))
    }

    pub fn last_move_anim(&self) -> Option<MoveAnim> {
        self.emitted.iter().rev().find_map(|e| match *e {
            Emitted::Movement(anim) => Some(anim),
            _ => None,
        })
    }
}

impl EventSink for EventLog {
    fn add_event(&mut self, event: EntityEvent, parm: i32) {
        trace!(?event, parm, "entity event");
        self.emitted.push(Emitted::Entity(event, parm));
    }

    fn script_event(&mut self, trigger: ScriptTrigger) {
        self.emitted.push(Emitted::Script(trigger));
    }

    fn move_anim(&mut self, anim: MoveAnim) {
        self.emitted.push(Emitted::Movement(anim));
    }

    fn set_underwater(&mut self, underwater: bool) {
        self.underwater = underwater;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_log_order() {
        let mut log = EventLog::new();
        log.add_event(EntityEvent::Jump, 0);
        log.script_event(ScriptTrigger {
            event: AnimScriptEvent::Jump,
            is_continue: false,
            force: true,
        });
        log.move_anim(MoveAnim::Run);
        log.add_event(EntityEvent::FallShort, 0);

        let events: Vec<_> = log.entity_events().collect();
        assert_eq!(events, vec![(EntityEvent::Jump, 0), (EntityEvent::FallShort, 0)]);
        assert!(log.has_script(AnimScriptEvent::Jump));
        assert_eq!(log.last_move_anim(), Some(MoveAnim::Run));
    }

    #[test]
    fn test_default_sink_methods_are_optional() {
        struct OnlyEvents(Vec<EntityEvent>);
        impl EventSink for OnlyEvents {
            fn add_event(&mut self, event: EntityEvent, _parm: i32) {
                self.0.push(event);
            }
        }

        let mut sink = OnlyEvents(Vec::new());
        sink.move_anim(MoveAnim::Idle);
        sink.add_event(EntityEvent::NoAmmo, 0);
        assert_eq!(sink.0, vec![EntityEvent::NoAmmo]);
    }

    #[test]
    fn test_footstep_events() {
        assert_eq!(FootstepType::Metal.event(), EntityEvent::FootstepMetal);
        assert_eq!(FootstepType::Splash.event(), EntityEvent::FootSplash);
    }

    #[test]
    fn test_footstep_for_surface() {
        assert_eq!(FootstepType::for_surface(SurfFlags::empty()), Some(FootstepType::Default));
        assert_eq!(FootstepType::for_surface(SurfFlags::GRAVEL), Some(FootstepType::Gravel));
        assert_eq!(FootstepType::for_surface(SurfFlags::NOSTEPS | SurfFlags::METAL), None);
    }
}
