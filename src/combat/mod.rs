//! Weapons, artifacts and the deployables they leave behind

pub mod artifacts;
pub mod channeler;
pub mod damage;
pub mod laser;
pub mod weapons;

pub use artifacts::{
    artifact_by_name, Activation, AiContext, AreaShield, Artifact, ArtifactEffect, CloakingDevice, Cooldown,
    DecoyLauncher, EmpBurst, GravityTractor, MiningLaser, RepairNanobots, SolarLinkArtifact,
};
pub use channeler::{update_deployables, STAR_TURRET_RANGE};
pub use damage::{blast_damage, circles_overlap};
pub use laser::{BeamPhase, LaserBeam};
pub use weapons::{FireContext, Spawn, Weapon, WeaponKind, MAX_DRONES};
