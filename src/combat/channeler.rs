//! Light channeler chain: channeler → battery → star turret
//!
//! The channeler ages from its deployment; the battery appears at the
//! battery delay and the turret at the turret delay, both measured from that
//! same clock. Energy only ever flows star → battery → turret shots.

use crate::core::config::SimulationConfig;
use crate::core::types::{normalize_angle, EntityId, IdAllocator};
use crate::entity::{nearest_hostile, Contact, Deployable, DeployableKind, Projectile};
use crate::world::galaxy::Galaxy;

/// Spacing between chain stages along the star's outward normal
const STAGE_SPACING: f32 = 30.0;

/// Star turret engagement range
pub const STAR_TURRET_RANGE: f32 = 600.0;

/// Star turret shot damage
const STAR_TURRET_DAMAGE: f32 = 6.0;

fn index_of(deployables: &[Deployable], id: EntityId) -> Option<usize> {
    deployables.iter().position(|d| d.id == id)
}

/// Advance every deployable by one tick. New stages are pushed onto
/// `deployables`; turret shots are returned for the projectile pool.
pub fn update_deployables(
    deployables: &mut Vec<Deployable>,
    galaxy: &mut Galaxy,
    contacts: &[Contact],
    ids: &mut IdAllocator,
    config: &SimulationConfig,
    dt: f32,
) -> Vec<Projectile> {
    let mut spawned = Vec::new();

    for i in 0..deployables.len() {
        let (owner, faction, pos) = (deployables[i].owner, deployables[i].faction, deployables[i].pos);
        let DeployableKind::Channeler { star, age, battery, turret } = &mut deployables[i].kind else {
            continue;
        };
        *age += dt;
        let star_id = *star;
        let Some(system) = galaxy.system_mut(star_id) else {
            continue;
        };
        let outward = (pos - system.center).normalize();

        if battery.is_none() && *age >= config.channeler_battery_delay {
            let mut stage = Deployable::battery(owner, faction, pos + outward * STAGE_SPACING, config.battery_capacity);
            stage.id = ids.next_id();
            *battery = Some(stage.id);
            tracing::debug!(channeler_star = %star_id, battery = %stage.id, "battery deployed");
            spawned.push(stage);
        }
        if turret.is_none() && *age >= config.channeler_turret_delay {
            if let Some(battery_id) = *battery {
                let mut stage = Deployable::star_turret(
                    owner,
                    faction,
                    pos + outward * (STAGE_SPACING * 2.0),
                    battery_id,
                    outward.angle(),
                );
                stage.id = ids.next_id();
                *turret = Some(stage.id);
                tracing::debug!(battery = %battery_id, turret = %stage.id, "star turret deployed");
                spawned.push(stage);
            }
        }

        let Some(battery_id) = *battery else {
            continue;
        };
        // The battery may have been spawned this tick and not pushed yet
        let target = match index_of(deployables, battery_id) {
            Some(j) => Some(&mut deployables[j]),
            None => spawned.iter_mut().find(|d| d.id == battery_id),
        };
        if let Some(battery) = target {
            if let DeployableKind::Battery { energy, capacity } = battery.kind {
                let amount = (config.channeler_transfer_rate * dt).min(system.star.energy).min(capacity - energy).max(0.0);
                let drawn = system.star.drain(amount);
                battery.charge(drawn);
            }
        }
    }
    deployables.extend(spawned);

    let period_connected = SimulationConfig::cadence_period(config.cadence_100_rpm);
    let period_disconnected = SimulationConfig::cadence_period(config.cadence_30_rpm);
    let mut shots = Vec::new();

    for i in 0..deployables.len() {
        let DeployableKind::StarTurret { battery, .. } = deployables[i].kind else {
            continue;
        };
        let battery_index = index_of(deployables, battery);
        let connected = battery_index.is_some_and(|j| deployables[j].energy() >= config.star_turret_shot_cost);

        let turret = &mut deployables[i];
        let (pos, faction, owner) = (turret.pos, turret.faction, turret.owner);
        if !connected {
            turret.apply_damage(config.star_turret_decay * dt);
        }
        let DeployableKind::StarTurret { facing, fire_timer, connected: linked, .. } = &mut turret.kind else {
            continue;
        };
        *linked = connected;
        *fire_timer += dt;
        let period = if connected { period_connected } else { period_disconnected };
        if *fire_timer < period {
            continue;
        }
        let Some(target) = nearest_hostile(contacts, faction, pos, STAR_TURRET_RANGE) else {
            continue;
        };
        let bearing = pos.angle_to(&target.pos);
        if normalize_angle(bearing - *facing).abs() > config.star_turret_arc * 0.5 {
            continue;
        }
        *fire_timer = 0.0;
        if connected {
            if let Some(j) = battery_index {
                deployables[j].spend(config.star_turret_shot_cost);
            }
        }
        shots.push(
            Projectile::new(owner, faction, pos, target.pos, config.projectile_speed, STAR_TURRET_DAMAGE)
                .with_max_distance(STAR_TURRET_RANGE),
        );
    }

    shots
}
