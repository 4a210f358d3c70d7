// weapons.rs — weapon identities, descriptor table and per-weapon rules
//
// Every weapon-specific switch the fire/reload/change logic needs is read
// from one `WeaponDef` row, so adding a weapon touches only this table.

use std::ops::{Index, IndexMut};

use crate::q_shared::{PlayerClass, Skill};

// ============================================================
// Identities
// ============================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[repr(u8)]
pub enum Weapon {
    #[default]
    None = 0,
    Knife,
    Luger,
    Mp40,
    GrenadeLauncher,
    Panzerfaust,
    Flamethrower,
    Colt,
    Thompson,
    GrenadePineapple,
    Sten,
    MedicSyringe,
    Ammo,
    Arty,
    Silencer,
    Dynamite,
    Smoketrail,
    MapMortar,
    VeryBigExplosion,
    Medkit,
    Binoculars,
    Pliers,
    SmokeMarker,
    Kar98,
    Carbine,
    Garand,
    Landmine,
    Satchel,
    SatchelDet,
    Tripmine,
    SmokeBomb,
    MobileMg42,
    K43,
    Fg42,
    DummyMg42,
    Mortar,
    Lockpick,
    AkimboColt,
    AkimboLuger,
    Gpg40,
    M7,
    SilencedColt,
    GarandScope,
    K43Scope,
    Fg42Scope,
    MortarSet,
    MedicAdrenaline,
    AkimboSilencedColt,
    AkimboSilencedLuger,
    MobileMg42Set,
    PoisonSyringe,
    AdrenalineShare,
    M97,
    PoisonGas,
    LandmineBbetty,
    LandminePgas,
    Molotov,
}

pub const NUM_WEAPONS: usize = Weapon::Molotov as usize + 1;

const ALL_WEAPONS: [Weapon; NUM_WEAPONS] = {
    use Weapon::*;
    [
        None, Knife, Luger, Mp40, GrenadeLauncher, Panzerfaust, Flamethrower, Colt, Thompson,
        GrenadePineapple, Sten, MedicSyringe, Ammo, Arty, Silencer, Dynamite, Smoketrail,
        MapMortar, VeryBigExplosion, Medkit, Binoculars, Pliers, SmokeMarker, Kar98, Carbine,
        Garand, Landmine, Satchel, SatchelDet, Tripmine, SmokeBomb, MobileMg42, K43, Fg42,
        DummyMg42, Mortar, Lockpick, AkimboColt, AkimboLuger, Gpg40, M7, SilencedColt,
        GarandScope, K43Scope, Fg42Scope, MortarSet, MedicAdrenaline, AkimboSilencedColt,
        AkimboSilencedLuger, MobileMg42Set, PoisonSyringe, AdrenalineShare, M97, PoisonGas,
        LandmineBbetty, LandminePgas, Molotov,
    ]
};

impl Weapon {
    pub fn from_index(index: usize) -> Option<Weapon> {
        ALL_WEAPONS.get(index).copied()
    }

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn all() -> impl Iterator<Item = Weapon> {
        ALL_WEAPONS.iter().copied()
    }

    /// Weapon whose clip slot this weapon draws from.
    pub fn clip_index(self) -> Weapon {
        match self {
            Weapon::Silencer => Weapon::Luger,
            Weapon::SilencedColt => Weapon::Colt,
            Weapon::AkimboSilencedColt => Weapon::AkimboColt,
            Weapon::AkimboSilencedLuger => Weapon::AkimboLuger,
            Weapon::GarandScope => Weapon::Garand,
            Weapon::K43Scope => Weapon::K43,
            Weapon::Fg42Scope => Weapon::Fg42,
            Weapon::MobileMg42Set => Weapon::MobileMg42,
            Weapon::MortarSet => Weapon::Mortar,
            w => w,
        }
    }

    /// Weapon whose reserve slot this weapon draws from.
    pub fn ammo_index(self) -> Weapon {
        match self {
            Weapon::AkimboColt | Weapon::AkimboSilencedColt | Weapon::SilencedColt => Weapon::Colt,
            Weapon::AkimboLuger | Weapon::AkimboSilencedLuger | Weapon::Silencer => Weapon::Luger,
            w => w.clip_index(),
        }
    }

    /// The other firing mode of the same physical weapon.
    pub fn alt(self) -> Option<Weapon> {
        use Weapon::*;
        Some(match self {
            Luger => Silencer,
            Silencer => Luger,
            Colt => SilencedColt,
            SilencedColt => Colt,
            Kar98 => Gpg40,
            Gpg40 => Kar98,
            Carbine => M7,
            M7 => Carbine,
            Garand => GarandScope,
            GarandScope => Garand,
            K43 => K43Scope,
            K43Scope => K43,
            Fg42 => Fg42Scope,
            Fg42Scope => Fg42,
            Mortar => MortarSet,
            MortarSet => Mortar,
            MobileMg42 => MobileMg42Set,
            MobileMg42Set => MobileMg42,
            AkimboColt => AkimboSilencedColt,
            AkimboSilencedColt => AkimboColt,
            AkimboLuger => AkimboSilencedLuger,
            AkimboSilencedLuger => AkimboLuger,
            _ => return Option::None,
        })
    }

    #[inline]
    pub fn is_alt_of(self, other: Weapon) -> bool {
        other.alt() == Some(self)
    }

    /// Single side-arm paired with an akimbo weapon.
    pub fn akimbo_sidearm(self) -> Option<Weapon> {
        match self {
            Weapon::AkimboColt => Some(Weapon::Colt),
            Weapon::AkimboSilencedColt => Some(Weapon::SilencedColt),
            Weapon::AkimboLuger => Some(Weapon::Luger),
            Weapon::AkimboSilencedLuger => Some(Weapon::Silencer),
            _ => None,
        }
    }

    #[inline]
    pub fn is_akimbo(self) -> bool {
        self.akimbo_sidearm().is_some()
    }
}

/// Which hand fires next for an akimbo pair: `true` means the akimbo's own
/// clip, `false` means the paired side-arm's clip.
pub fn akimbo_fire_sequence(akimbo_clip: i32, sidearm_clip: i32) -> bool {
    if akimbo_clip == 0 {
        return false;
    }
    if sidearm_clip == 0 {
        return true;
    }
    akimbo_clip != sidearm_clip
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WeaponState {
    Raising,
    RaisingToReload,
    Dropping,
    DroppingToReload,
    #[default]
    Ready,
    Firing,
    FiringAlt,
    Reloading,
    Readying,
    Relaxing,
}

/// First-person weapon animations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum WeapAnim {
    Idle1 = 0,
    Idle2,
    Attack1,
    Attack2,
    AttackLastShot,
    Drop,
    Raise,
    Reload1,
    Reload2,
    Reload3,
    AltSwitchFrom,
    AltSwitchTo,
    Drop2,
    Arming,
}

// ============================================================
// Descriptor pieces
// ============================================================

bitflags::bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct WeaponClass: u32 {
        /// Reloads on an empty clip unless the player turned auto-reload off.
        const AUTO_RELOAD        = 0x0000_0001;
        /// Light weapon that gets the quick reload at light-weapons skill 2.
        const FAST_RELOAD        = 0x0000_0002;
        const SCOPED             = 0x0000_0004;
        /// Held grenade with a cooking fuse.
        const FUSED              = 0x0000_0008;
        /// Semi-automatic: a released trigger shortens the refire time.
        const QUICK_FIRE         = 0x0000_0010;
        /// May be fired while leaning.
        const LEAN_FIRE          = 0x0000_0020;
        const SWITCH_IF_EMPTY    = 0x0000_0040;
        /// Loses its inventory bit after the last one is thrown.
        const DISCARD_WHEN_EMPTY = 0x0000_0080;
        /// No click when trying to fire without ammo.
        const SILENT_EMPTY       = 0x0000_0100;
        /// Slows the carrier down.
        const HEAVY              = 0x0000_0200;
        /// Cannot be reloaded at all.
        const NO_RELOAD          = 0x0000_0400;
        /// Reload only once the clip is dry.
        const RELOAD_WHEN_DRY    = 0x0000_0800;
        /// Reload only once the clip is dry, unless fair rifles are enabled.
        const RIFLE_RELOAD_LOCK  = 0x0000_1000;
        /// Change sound only when not toggling to the launcher attachment.
        const QUIET_ALT_TOGGLE   = 0x0000_2000;
        /// No third-person reload animation.
        const NO_RELOAD_SCRIPT   = 0x0000_4000;
        /// No first-person reload animation.
        const NO_RELOAD_ANIM     = 0x0000_8000;
        /// Deployed form; requires standing out of deep water.
        const DEPLOYED           = 0x0001_0000;
    }
}

/// Whether the weapon can be used with the head under water.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Underwater {
    #[default]
    Denied,
    Allowed,
    EngineerOption,
    MedicOption,
}

/// How pressing fire begins an attack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FireStart {
    #[default]
    Standard,
    /// Standard, with the looping third-person fire animation.
    Continuous,
    /// Spin-up delay with the single-shot fire animation.
    SpinUp,
    MortarSet,
    Melee,
    Fused,
    Placed,
    Planted,
    Detonator,
}

/// How the first-person attack animation is driven once the shot goes off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AttackAnimMode {
    #[default]
    Start,
    Continue,
    None,
}

/// Extra bookkeeping after a shot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PostFire {
    #[default]
    None,
    NoAmmo,
    PanzerNoAmmo,
    SatchelSwap,
    NoAmmoWhenReserveEmpty,
}

/// View kick profile applied after a shot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Recoil {
    #[default]
    None,
    ScopedRifle,
    MobileMg,
    ScopedAuto,
    Pistol,
    Shotgun,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReloadAnim {
    /// Reload1, or Reload2 for fast-reload weapons at light-weapons skill 2.
    #[default]
    Standard,
    Fixed(WeapAnim),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeaponAnims {
    pub idle: WeapAnim,
    pub attack: WeapAnim,
    pub last_attack: WeapAnim,
    pub reload: ReloadAnim,
    pub raise: WeapAnim,
    pub drop: WeapAnim,
    pub alt_switch_to: WeapAnim,
}

impl Default for WeaponAnims {
    fn default() -> Self {
        Self {
            idle: WeapAnim::Idle1,
            attack: WeapAnim::Attack1,
            last_attack: WeapAnim::AttackLastShot,
            reload: ReloadAnim::Standard,
            raise: WeapAnim::Raise,
            drop: WeapAnim::Drop,
            alt_switch_to: WeapAnim::AltSwitchTo,
        }
    }
}

/// Leaving this weapon for its alternate mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AltDrop {
    pub time: i32,
    /// Play the "undo alt mode" body animation instead of the drop.
    pub undo_anim: bool,
    /// Top up the alternate's empty clip on the way out.
    pub reload_alt: bool,
    /// Record the current aim as the deployed weapon's centre.
    pub mount: bool,
}

impl Default for AltDrop {
    fn default() -> Self {
        Self { time: 250, undo_anim: false, reload_alt: false, mount: false }
    }
}

/// Raising this weapon after toggling from its alternate mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AltRaise {
    pub time: i32,
    pub alt_anim: bool,
    /// Skip the raise entirely when the previous mode's clip is empty.
    pub skip_when_dry: bool,
}

impl Default for AltRaise {
    fn default() -> Self {
        Self { time: 250, alt_anim: false, skip_when_dry: false }
    }
}

/// Whose charge bar a weapon draws on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChargeOwner {
    Class(PlayerClass),
    /// The firing player's own class.
    Own,
}

/// Minimum charge a weapon needs before it may fire:
/// `charge_time(owner) * factor`, with `skilled_factor` at or above `level`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChargeRule {
    pub owner: ChargeOwner,
    pub skill: Skill,
    pub level: i32,
    pub skilled_factor: f32,
    pub factor: f32,
    /// Play the "no power" body animation while the player keeps trying.
    pub no_power_anim: bool,
}

impl ChargeRule {
    const fn new(class: PlayerClass, skill: Skill, level: i32, skilled: f32, base: f32) -> Self {
        Self {
            owner: ChargeOwner::Class(class),
            skill,
            level,
            skilled_factor: skilled,
            factor: base,
            no_power_anim: false,
        }
    }
}

/// Static description of one weapon.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeaponDef {
    pub max_ammo: i32,
    pub uses: i32,
    pub max_clip: i32,
    pub reload_time: i32,
    pub fire_delay_time: i32,
    pub next_shot_time: i32,
    pub max_heat: i32,
    pub cool_rate: i32,

    pub class: WeaponClass,
    pub underwater: Underwater,
    pub fire_start: FireStart,
    pub attack_anim_mode: AttackAnimMode,
    pub post_fire: PostFire,
    pub recoil: Recoil,
    pub anims: WeaponAnims,
    pub alt_drop: AltDrop,
    pub alt_raise: AltRaise,
    pub charge: Option<ChargeRule>,

    /// Aim spread sensitivity; zero for weapons without spread.
    pub spread_scale: f32,
    pub spread_add: i32,
    /// Upper bound (exclusive) of a random term added to `spread_add`.
    pub spread_add_random: i32,
    /// Knockback applied on slick ground when not prone.
    pub slick_knockback: f32,
}

impl Default for WeaponDef {
    fn default() -> Self {
        Self {
            max_ammo: 0,
            uses: 0,
            max_clip: 0,
            reload_time: 0,
            fire_delay_time: 0,
            next_shot_time: 0,
            max_heat: 0,
            cool_rate: 0,
            class: WeaponClass::empty(),
            underwater: Underwater::Denied,
            fire_start: FireStart::Standard,
            attack_anim_mode: AttackAnimMode::Start,
            post_fire: PostFire::None,
            recoil: Recoil::None,
            anims: WeaponAnims::default(),
            alt_drop: AltDrop::default(),
            alt_raise: AltRaise::default(),
            charge: None,
            spread_scale: 0.0,
            spread_add: 0,
            spread_add_random: 0,
            slick_knockback: 0.0,
        }
    }
}

pub const DELAY_LOW: i32 = 100;
pub const DELAY_PISTOL: i32 = 100;
pub const DELAY_THROW: i32 = 250;
pub const DELAY_HW: i32 = 750;

pub const MAX_MG42_HEAT: i32 = 1500;

const fn ammo(
    max_ammo: i32,
    uses: i32,
    max_clip: i32,
    reload_time: i32,
    fire_delay_time: i32,
    next_shot_time: i32,
) -> WeaponDef {
    WeaponDef {
        max_ammo,
        uses,
        max_clip,
        reload_time,
        fire_delay_time,
        next_shot_time,
        max_heat: 0,
        cool_rate: 0,
        class: WeaponClass::empty(),
        underwater: Underwater::Denied,
        fire_start: FireStart::Standard,
        attack_anim_mode: AttackAnimMode::Start,
        post_fire: PostFire::None,
        recoil: Recoil::None,
        anims: WeaponAnims {
            idle: WeapAnim::Idle1,
            attack: WeapAnim::Attack1,
            last_attack: WeapAnim::AttackLastShot,
            reload: ReloadAnim::Standard,
            raise: WeapAnim::Raise,
            drop: WeapAnim::Drop,
            alt_switch_to: WeapAnim::AltSwitchTo,
        },
        alt_drop: AltDrop { time: 250, undo_anim: false, reload_alt: false, mount: false },
        alt_raise: AltRaise { time: 250, alt_anim: false, skip_when_dry: false },
        charge: None,
        spread_scale: 0.0,
        spread_add: 0,
        spread_add_random: 0,
        slick_knockback: 0.0,
    }
}

fn describe(weapon: Weapon) -> WeaponDef {
    use PlayerClass as Pc;
    use Skill as Sk;
    use Weapon::*;
    use WeaponClass as C;

    let pistol = |def: WeaponDef| WeaponDef {
        class: C::AUTO_RELOAD | C::QUICK_FIRE | def.class,
        fire_start: FireStart::SpinUp,
        recoil: Recoil::Pistol,
        spread_scale: 0.4,
        spread_add: 20,
        ..def
    };
    let smg = |def: WeaponDef| WeaponDef {
        class: C::AUTO_RELOAD | C::FAST_RELOAD | def.class,
        fire_start: FireStart::Continuous,
        attack_anim_mode: AttackAnimMode::Continue,
        spread_scale: 0.6,
        spread_add: 15,
        spread_add_random: 10,
        ..def
    };
    let rifle = |def: WeaponDef| WeaponDef {
        class: C::AUTO_RELOAD | C::QUICK_FIRE | def.class,
        fire_start: FireStart::SpinUp,
        spread_scale: 0.5,
        spread_add: 50,
        ..def
    };
    let launcher = |def: WeaponDef| WeaponDef {
        // loaded on the way in from the rifle
        class: C::NO_RELOAD | C::NO_RELOAD_SCRIPT | def.class,
        fire_start: FireStart::SpinUp,
        post_fire: PostFire::NoAmmoWhenReserveEmpty,
        charge: Some(ChargeRule::new(Pc::Engineer, Sk::BattleSense, i32::MAX, 0.5, 0.5)),
        anims: WeaponAnims {
            idle: WeapAnim::Idle2,
            attack: WeapAnim::Attack2,
            last_attack: WeapAnim::Attack2,
            reload: ReloadAnim::Fixed(WeapAnim::Reload2),
            raise: WeapAnim::Reload3,
            drop: WeapAnim::Drop2,
            alt_switch_to: WeapAnim::AltSwitchFrom,
        },
        alt_drop: AltDrop { time: 0, ..AltDrop::default() },
        alt_raise: AltRaise { time: 2350, alt_anim: true, skip_when_dry: false },
        ..def
    };
    let fused = |def: WeaponDef| WeaponDef {
        class: C::FUSED
            | C::LEAN_FIRE
            | C::SWITCH_IF_EMPTY
            | C::SILENT_EMPTY
            | C::NO_RELOAD_SCRIPT
            | def.class,
        underwater: Underwater::Allowed,
        fire_start: FireStart::Fused,
        ..def
    };
    let landmine = |def: WeaponDef| WeaponDef {
        class: C::SWITCH_IF_EMPTY | C::SILENT_EMPTY | def.class,
        underwater: Underwater::Allowed,
        fire_start: FireStart::Placed,
        post_fire: PostFire::NoAmmo,
        charge: Some(ChargeRule::new(
            Pc::Engineer,
            Sk::ExplosivesAndConstruction,
            3,
            0.33,
            0.5,
        )),
        ..def
    };
    let item = ammo(1, 0, 1, 0, 50, 1000);
    let pistol_ammo = ammo(24, 1, 8, 1500, DELAY_PISTOL, 400);
    let akimbo_ammo = ammo(48, 1, 8, 2700, DELAY_PISTOL, 200);
    let grenade_ammo = ammo(4, 1, 4, 1000, DELAY_THROW, 1600);
    let syringe_ammo = ammo(10, 1, 10, 1500, 50, 1000);
    let covert_charge = ChargeRule::new(
        Pc::CovertOps,
        Sk::MilitaryIntelligenceAndScopedWeapons,
        2,
        0.66,
        1.0,
    );
    let adrenaline_charge = ChargeRule {
        owner: ChargeOwner::Own,
        ..ChargeRule::new(Pc::Medic, Sk::FirstAid, i32::MAX, 1.0, 1.0)
    };

    match weapon {
        None | Smoketrail | MapMortar | VeryBigExplosion | Arty => WeaponDef {
            class: C::NO_RELOAD,
            ..ammo(0, 0, 0, 0, 50, 0)
        },
        Knife => WeaponDef {
            underwater: Underwater::Allowed,
            fire_start: FireStart::Melee,
            ..ammo(999, 0, 999, 0, 50, 200)
        },
        Luger | Colt => pistol(WeaponDef {
            class: C::FAST_RELOAD,
            alt_drop: AltDrop { time: 0, ..AltDrop::default() },
            alt_raise: AltRaise { time: 0, alt_anim: true, skip_when_dry: false },
            ..pistol_ammo
        }),
        Silencer | SilencedColt => pistol(WeaponDef {
            class: C::FAST_RELOAD,
            alt_drop: AltDrop { time: 1000, undo_anim: true, ..AltDrop::default() },
            alt_raise: AltRaise { time: 1190, alt_anim: true, skip_when_dry: false },
            ..pistol_ammo
        }),
        AkimboColt | AkimboLuger | AkimboSilencedColt | AkimboSilencedLuger => {
            pistol(akimbo_ammo)
        }
        Mp40 | Thompson => smg(ammo(30, 1, 30, 2400, DELAY_LOW, 150)),
        Sten => smg(WeaponDef {
            max_heat: 700,
            cool_rate: 300,
            ..ammo(32, 1, 32, 3100, DELAY_LOW, 110)
        }),
        M97 => WeaponDef {
            class: C::AUTO_RELOAD,
            fire_start: FireStart::Continuous,
            attack_anim_mode: AttackAnimMode::Start,
            recoil: Recoil::Shotgun,
            spread_scale: 0.6,
            spread_add: 15,
            spread_add_random: 10,
            ..ammo(24, 1, 6, 2000, DELAY_LOW, 1250)
        },
        GrenadeLauncher | GrenadePineapple => fused(WeaponDef {
            class: C::DISCARD_WHEN_EMPTY,
            ..grenade_ammo
        }),
        SmokeBomb => fused(WeaponDef {
            post_fire: PostFire::NoAmmo,
            charge: Some(covert_charge),
            ..ammo(1, 1, 1, 0, DELAY_THROW, 1000)
        }),
        PoisonGas => fused(WeaponDef {
            post_fire: PostFire::NoAmmo,
            charge: Some(covert_charge),
            ..grenade_ammo
        }),
        Dynamite => fused(WeaponDef {
            class: C::DISCARD_WHEN_EMPTY,
            post_fire: PostFire::NoAmmo,
            charge: Some(ChargeRule::new(
                Pc::Engineer,
                Sk::ExplosivesAndConstruction,
                3,
                0.66,
                1.0,
            )),
            ..ammo(1, 1, 1, 0, DELAY_THROW, 1000)
        })
        .without_lean_fire(),
        Molotov => WeaponDef {
            class: C::SWITCH_IF_EMPTY | C::NO_RELOAD_SCRIPT,
            underwater: Underwater::Allowed,
            post_fire: PostFire::NoAmmo,
            ..grenade_ammo
        },
        Panzerfaust => WeaponDef {
            class: C::HEAVY,
            fire_start: FireStart::SpinUp,
            post_fire: PostFire::PanzerNoAmmo,
            charge: Some(ChargeRule::new(Pc::Soldier, Sk::HeavyWeapons, 1, 0.66, 1.0)),
            slick_knockback: 32000.0,
            ..ammo(4, 1, 1, 1000, DELAY_HW, 2000)
        },
        Flamethrower => WeaponDef {
            slick_knockback: 2000.0,
            ..ammo(200, 1, 200, 1000, DELAY_LOW, 50)
        },
        MedicSyringe => WeaponDef { underwater: Underwater::MedicOption, ..syringe_ammo },
        PoisonSyringe => WeaponDef { underwater: Underwater::Allowed, ..syringe_ammo },
        MedicAdrenaline => WeaponDef {
            underwater: Underwater::Allowed,
            charge: Some(adrenaline_charge),
            anims: WeaponAnims {
                idle: WeapAnim::Idle2,
                attack: WeapAnim::Attack2,
                ..WeaponAnims::default()
            },
            ..syringe_ammo
        },
        AdrenalineShare => WeaponDef {
            underwater: Underwater::Allowed,
            charge: Some(adrenaline_charge),
            ..syringe_ammo
        },
        Ammo => WeaponDef {
            class: C::NO_RELOAD,
            charge: Some(ChargeRule {
                no_power_anim: true,
                ..ChargeRule::new(Pc::FieldOps, Sk::Signals, 1, 0.15, 0.25)
            }),
            ..item
        },
        Medkit => WeaponDef {
            class: C::NO_RELOAD,
            fire_start: FireStart::Continuous,
            attack_anim_mode: AttackAnimMode::Start,
            charge: Some(ChargeRule {
                no_power_anim: true,
                ..ChargeRule::new(Pc::Medic, Sk::FirstAid, 2, 0.15, 0.25)
            }),
            ..item
        },
        Binoculars => WeaponDef { class: C::NO_RELOAD, next_shot_time: 0, ..item },
        Pliers => WeaponDef {
            class: C::NO_RELOAD,
            underwater: Underwater::EngineerOption,
            fire_start: FireStart::Continuous,
            attack_anim_mode: AttackAnimMode::Continue,
            next_shot_time: 50,
            ..item
        },
        Lockpick => WeaponDef {
            fire_start: FireStart::Continuous,
            attack_anim_mode: AttackAnimMode::Continue,
            ..item
        },
        SmokeMarker => WeaponDef {
            class: C::NO_RELOAD,
            fire_start: FireStart::Continuous,
            attack_anim_mode: AttackAnimMode::Continue,
            post_fire: PostFire::NoAmmo,
            charge: Some(ChargeRule::new(Pc::FieldOps, Sk::Signals, 2, 0.66, 1.0)),
            ..ammo(999, 0, 999, 0, 50, 1000)
        },
        Kar98 | Carbine => rifle(WeaponDef {
            class: C::QUIET_ALT_TOGGLE
                | if weapon == Carbine { C::RIFLE_RELOAD_LOCK } else { C::empty() },
            alt_drop: AltDrop { time: 0, reload_alt: true, ..AltDrop::default() },
            alt_raise: AltRaise { time: 1347, alt_anim: true, skip_when_dry: true },
            ..if weapon == Kar98 {
                ammo(20, 1, 10, 2500, DELAY_LOW, 400)
            } else {
                ammo(24, 1, 8, 1500, DELAY_LOW, 400)
            }
        }),
        Garand => rifle(WeaponDef {
            class: C::RIFLE_RELOAD_LOCK,
            ..ammo(24, 1, 8, 1500, DELAY_LOW, 400)
        }),
        K43 => rifle(ammo(30, 1, 10, 2500, DELAY_LOW, 400)),
        GarandScope | K43Scope => {
            let base = describe(if weapon == GarandScope { Garand } else { K43 });
            WeaponDef {
                class: base.class | C::SCOPED,
                recoil: Recoil::ScopedRifle,
                spread_scale: 10.0,
                spread_add: 200,
                alt_drop: AltDrop::default(),
                alt_raise: AltRaise::default(),
                ..base
            }
        }
        Gpg40 | M7 => launcher(ammo(4, 1, 1, 0, DELAY_LOW, 400)),
        Fg42 => WeaponDef {
            class: C::AUTO_RELOAD | C::FAST_RELOAD,
            fire_start: FireStart::Continuous,
            attack_anim_mode: AttackAnimMode::Start,
            alt_drop: AltDrop { time: 50, ..AltDrop::default() },
            alt_raise: AltRaise { time: 50, ..AltRaise::default() },
            spread_scale: 0.6,
            spread_add: 100,
            ..ammo(30, 1, 20, 2000, DELAY_LOW, 100)
        },
        Fg42Scope => WeaponDef {
            class: C::AUTO_RELOAD | C::SCOPED,
            recoil: Recoil::ScopedAuto,
            spread_scale: 10.0,
            ..describe(Fg42)
        },
        MobileMg42 | MobileMg42Set => {
            let deployed = weapon == MobileMg42Set;
            WeaponDef {
                max_heat: MAX_MG42_HEAT,
                cool_rate: 300,
                class: C::AUTO_RELOAD
                    | C::HEAVY
                    | C::RELOAD_WHEN_DRY
                    | if deployed { C::DEPLOYED } else { C::empty() },
                fire_start: FireStart::Continuous,
                attack_anim_mode: AttackAnimMode::Continue,
                recoil: if deployed { Recoil::None } else { Recoil::MobileMg },
                anims: if deployed {
                    WeaponAnims {
                        idle: WeapAnim::Idle2,
                        attack: WeapAnim::Attack2,
                        last_attack: WeapAnim::Attack2,
                        reload: ReloadAnim::Fixed(WeapAnim::Reload3),
                        raise: WeapAnim::Drop2,
                        ..WeaponAnims::default()
                    }
                } else {
                    WeaponAnims { alt_switch_to: WeapAnim::AltSwitchFrom, ..WeaponAnims::default() }
                },
                alt_drop: AltDrop { time: 0, mount: !deployed, ..AltDrop::default() },
                alt_raise: AltRaise {
                    time: if deployed { 1250 } else { 1722 },
                    ..AltRaise::default()
                },
                spread_scale: 0.9,
                spread_add: 20,
                slick_knockback: if deployed { 0.0 } else { 4000.0 },
                ..ammo(450, 1, 150, 3000, DELAY_LOW, 66)
            }
        }
        DummyMg42 => WeaponDef { max_heat: MAX_MG42_HEAT, cool_rate: 300, ..ammo(0, 0, 0, 0, 100, 100) },
        Mortar | MortarSet => {
            let deployed = weapon == MortarSet;
            WeaponDef {
                class: C::HEAVY
                    | C::NO_RELOAD_ANIM
                    | if deployed { C::DEPLOYED } else { C::empty() },
                fire_start: if deployed { FireStart::MortarSet } else { FireStart::Standard },
                attack_anim_mode: if deployed { AttackAnimMode::None } else { AttackAnimMode::Start },
                post_fire: if deployed { PostFire::NoAmmoWhenReserveEmpty } else { PostFire::None },
                charge: deployed.then_some(ChargeRule::new(
                    Pc::Soldier,
                    Sk::HeavyWeapons,
                    1,
                    0.33,
                    0.5,
                )),
                anims: if deployed {
                    WeaponAnims {
                        idle: WeapAnim::Idle2,
                        last_attack: WeapAnim::Attack1,
                        ..WeaponAnims::default()
                    }
                } else {
                    WeaponAnims { alt_switch_to: WeapAnim::AltSwitchFrom, ..WeaponAnims::default() }
                },
                alt_drop: AltDrop { time: 0, mount: !deployed, ..AltDrop::default() },
                alt_raise: AltRaise {
                    time: if deployed { 1667 } else { 1000 },
                    alt_anim: true,
                    skip_when_dry: false,
                },
                ..ammo(if deployed { 16 } else { 12 }, 1, 1, 0, DELAY_HW, 1400)
            }
        }
        Landmine | LandmineBbetty | LandminePgas => landmine(ammo(1, 1, 1, 0, DELAY_THROW, 1000)),
        Tripmine => WeaponDef {
            class: C::SILENT_EMPTY,
            underwater: Underwater::Allowed,
            fire_start: FireStart::Planted,
            ..ammo(1, 1, 1, 0, DELAY_THROW, 1000)
        },
        Satchel => WeaponDef {
            fire_start: FireStart::Planted,
            post_fire: PostFire::SatchelSwap,
            charge: Some(covert_charge),
            ..ammo(1, 1, 1, 0, DELAY_THROW, 0)
        },
        SatchelDet => WeaponDef {
            fire_start: FireStart::Detonator,
            attack_anim_mode: AttackAnimMode::Continue,
            anims: WeaponAnims {
                idle: WeapAnim::Idle2,
                attack: WeapAnim::Attack2,
                raise: WeapAnim::Reload2,
                drop: WeapAnim::Reload1,
                ..WeaponAnims::default()
            },
            ..ammo(1, 0, 1, 0, DELAY_THROW, 0)
        },
    }
}

impl WeaponDef {
    fn without_lean_fire(mut self) -> Self {
        self.class.remove(WeaponClass::LEAN_FIRE);
        self
    }
}

/// Per-weapon descriptor table, indexable by `Weapon`.
#[derive(Debug, Clone, PartialEq)]
pub struct WeaponTable {
    defs: Vec<WeaponDef>,
}

impl Default for WeaponTable {
    fn default() -> Self {
        Self { defs: Weapon::all().map(describe).collect() }
    }
}

impl WeaponTable {
    pub fn get(&self, weapon: Weapon) -> &WeaponDef {
        &self.defs[weapon.index()]
    }

    /// Replace one row, e.g. for a mod that retunes a weapon.
    pub fn set(&mut self, weapon: Weapon, def: WeaponDef) {
        self.defs[weapon.index()] = def;
    }
}

impl Index<Weapon> for WeaponTable {
    type Output = WeaponDef;

    fn index(&self, weapon: Weapon) -> &WeaponDef {
        self.get(weapon)
    }
}

impl IndexMut<Weapon> for WeaponTable {
    fn index_mut(&mut self, weapon: Weapon) -> &mut WeaponDef {
        &mut self.defs[weapon.index()]
    }
}
