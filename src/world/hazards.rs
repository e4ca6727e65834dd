//! Environmental hazards - black holes, wormholes, portals, dust clouds
//!
//! Wormholes and portals come in pairs that reference each other by id.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::core::config::SimulationConfig;
use crate::core::types::{EntityId, IdAllocator, Rect, Vec2};
use crate::world::galaxy::Galaxy;

/// Hazards keep this distance from system centers when generated
const SYSTEM_CLEARANCE: f32 = 900.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlackHole {
    pub id: EntityId,
    pub pos: Vec2,
    /// Event radius: ships inside take hull damage
    pub radius: f32,
    pub strength: f32,
    pub pull_range: f32,
    /// Temporary holes (gravity tractor) count down and vanish
    pub lifetime: Option<f32>,
}

impl BlackHole {
    pub fn from_config(id: EntityId, pos: Vec2, config: &SimulationConfig) -> Self {
        Self {
            id,
            pos,
            radius: config.blackhole_radius,
            strength: config.blackhole_strength,
            pull_range: config.blackhole_range,
            lifetime: None,
        }
    }

    /// Pull acceleration on a body at `pos`: strength / d², zero outside pull range
    pub fn pull(&self, pos: Vec2) -> Vec2 {
        let d = self.pos.distance(&pos);
        if d >= self.pull_range || d < 1e-3 {
            return Vec2::ZERO;
        }
        // Inside the event radius the pull stops growing
        let effective = d.max(self.radius);
        (self.pos - pos).normalize() * (self.strength / (effective * effective))
    }

    pub fn expired(&self) -> bool {
        matches!(self.lifetime, Some(t) if t <= 0.0)
    }
}

/// How a paired hazard treats the traveller's velocity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GateKind {
    /// Keeps momentum
    Wormhole,
    /// Drops the ship at rest next to the exit
    Portal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Gate {
    pub id: EntityId,
    pub kind: GateKind,
    pub pos: Vec2,
    pub radius: f32,
    pub partner: EntityId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DustCloud {
    pub id: EntityId,
    pub pos: Vec2,
    pub radius: f32,
    /// Velocity retained per second while inside
    pub drag: f32,
}

/// Where a gate sends a ship
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GateExit {
    pub entry: EntityId,
    pub exit: EntityId,
    pub kind: GateKind,
    pub exit_pos: Vec2,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Hazards {
    pub black_holes: Vec<BlackHole>,
    pub gates: Vec<Gate>,
    pub dust_clouds: Vec<DustCloud>,
}

impl Hazards {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scatter hazards across the world away from star systems
    pub fn generate<R: Rng>(
        config: &SimulationConfig,
        galaxy: &Galaxy,
        ids: &mut IdAllocator,
        rng: &mut R,
    ) -> Self {
        let bounds = Rect::new(0.0, 0.0, config.world_width(), config.world_height());
        let mut hazards = Self::new();

        for _ in 0..config.black_hole_count {
            let pos = open_position(galaxy, bounds, rng);
            hazards.black_holes.push(BlackHole::from_config(ids.next_id(), pos, config));
        }

        for _ in 0..config.wormhole_pairs {
            hazards.add_pair(GateKind::Wormhole, config, galaxy, bounds, ids, rng);
        }
        for _ in 0..config.portal_pairs {
            hazards.add_pair(GateKind::Portal, config, galaxy, bounds, ids, rng);
        }

        for _ in 0..config.dust_cloud_count {
            let pos = open_position(galaxy, bounds, rng);
            hazards.dust_clouds.push(DustCloud {
                id: ids.next_id(),
                pos,
                radius: rng.gen_range(200.0..500.0),
                drag: config.dust_drag,
            });
        }

        hazards
    }

    fn add_pair<R: Rng>(
        &mut self,
        kind: GateKind,
        config: &SimulationConfig,
        galaxy: &Galaxy,
        bounds: Rect,
        ids: &mut IdAllocator,
        rng: &mut R,
    ) {
        let a = open_position(galaxy, bounds, rng);
        let mut b = open_position(galaxy, bounds, rng);
        for _ in 0..50 {
            if a.distance(&b) >= config.wormhole_min_separation {
                break;
            }
            b = open_position(galaxy, bounds, rng);
        }
        if a.distance(&b) < config.wormhole_min_separation {
            // Fall back to the farthest corner, pulled slightly inside the bounds
            let inset = config.wormhole_radius * 2.0;
            let corners = [
                Vec2::new(bounds.x + inset, bounds.y + inset),
                Vec2::new(bounds.x + bounds.width - inset, bounds.y + inset),
                Vec2::new(bounds.x + inset, bounds.y + bounds.height - inset),
                Vec2::new(bounds.x + bounds.width - inset, bounds.y + bounds.height - inset),
            ];
            b = corners
                .into_iter()
                .max_by(|p, q| p.distance(&a).total_cmp(&q.distance(&a)))
                .unwrap_or(b);
        }
        self.link_gates(kind, a, b, config.wormhole_radius, ids);
    }

    /// Create two gates that reference each other
    pub fn link_gates(&mut self, kind: GateKind, a: Vec2, b: Vec2, radius: f32, ids: &mut IdAllocator) -> (EntityId, EntityId) {
        let id_a = ids.next_id();
        let id_b = ids.next_id();
        self.gates.push(Gate { id: id_a, kind, pos: a, radius, partner: id_b });
        self.gates.push(Gate { id: id_b, kind, pos: b, radius, partner: id_a });
        (id_a, id_b)
    }

    pub fn gate(&self, id: EntityId) -> Option<&Gate> {
        self.gates.iter().find(|g| g.id == id)
    }

    /// Total black hole pull at `pos`
    pub fn pull_at(&self, pos: Vec2) -> Vec2 {
        self.black_holes
            .iter()
            .fold(Vec2::ZERO, |acc, hole| acc + hole.pull(pos))
    }

    /// Hull damage per second for a body of radius `size` at `pos`
    pub fn damage_rate_at(&self, pos: Vec2, size: f32, config: &SimulationConfig) -> f32 {
        self.black_holes
            .iter()
            .filter(|h| h.pos.distance(&pos) < h.radius + size)
            .count() as f32
            * config.blackhole_damage
    }

    /// Velocity retained per second in dust at `pos` (1.0 outside any cloud)
    pub fn drag_at(&self, pos: Vec2) -> f32 {
        self.dust_clouds
            .iter()
            .filter(|c| c.pos.distance(&pos) < c.radius)
            .fold(1.0, |acc, c| acc * c.drag)
    }

    /// Gate exit for a body touching a gate, if any
    pub fn gate_exit(&self, pos: Vec2, size: f32, heading: Vec2) -> Option<GateExit> {
        let entry = self.gates.iter().find(|g| g.pos.distance(&pos) < g.radius + size)?;
        let exit = self.gate(entry.partner)?;
        let dir = if heading.length() > 1e-3 { heading.normalize() } else { Vec2::new(1.0, 0.0) };
        Some(GateExit {
            entry: entry.id,
            exit: exit.id,
            kind: entry.kind,
            exit_pos: exit.pos + dir * (exit.radius + size + 10.0),
        })
    }

    /// Nearest black hole to `pos` with its distance
    pub fn nearest_black_hole(&self, pos: Vec2) -> Option<(&BlackHole, f32)> {
        self.black_holes
            .iter()
            .map(|h| (h, h.pos.distance(&pos)))
            .min_by(|a, b| a.1.total_cmp(&b.1))
    }

    /// Count down temporary black holes and drop the expired ones
    pub fn tick(&mut self, dt: f32) {
        for hole in &mut self.black_holes {
            if let Some(t) = hole.lifetime.as_mut() {
                *t -= dt;
            }
        }
        self.black_holes.retain(|h| !h.expired());
    }
}

fn open_position<R: Rng>(galaxy: &Galaxy, bounds: Rect, rng: &mut R) -> Vec2 {
    let mut pos = bounds.center();
    for _ in 0..30 {
        pos = Vec2::new(
            bounds.x + rng.gen::<f32>() * bounds.width,
            bounds.y + rng.gen::<f32>() * bounds.height,
        );
        if galaxy.systems().all(|s| s.center.distance(&pos) > SYSTEM_CLEARANCE) {
            break;
        }
    }
    pos
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::economy::ItemCatalog;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_pull_is_inverse_square() {
        let config = SimulationConfig::default();
        let hole = BlackHole::from_config(EntityId(1), Vec2::new(0.0, 0.0), &config);
        let near = hole.pull(Vec2::new(100.0, 0.0)).length();
        let far = hole.pull(Vec2::new(200.0, 0.0)).length();
        assert!((near / far - 4.0).abs() < 1e-3);
        // Pull points at the hole
        assert!(hole.pull(Vec2::new(100.0, 0.0)).x < 0.0);
        // Nothing outside range
        assert_eq!(hole.pull(Vec2::new(config.blackhole_range + 1.0, 0.0)), Vec2::ZERO);
    }

    #[test]
    fn test_generated_gates_are_paired_and_separated() {
        let config = SimulationConfig::default();
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        let mut ids = IdAllocator::new();
        let galaxy = Galaxy::generate(&config, &ItemCatalog::with_defaults(), &mut ids, &mut rng);
        let hazards = Hazards::generate(&config, &galaxy, &mut ids, &mut rng);
        assert_eq!(hazards.gates.len(), 2 * (config.wormhole_pairs + config.portal_pairs));
        for gate in &hazards.gates {
            let partner = hazards.gate(gate.partner).unwrap();
            assert_eq!(partner.partner, gate.id);
            assert_eq!(partner.kind, gate.kind);
            assert!(gate.pos.distance(&partner.pos) >= config.wormhole_min_separation - 1.0);
        }
    }

    #[test]
    fn test_gate_exit_points_past_partner() {
        let mut hazards = Hazards::new();
        let mut ids = IdAllocator::new();
        let (a, b) = hazards.link_gates(GateKind::Wormhole, Vec2::new(0.0, 0.0), Vec2::new(5000.0, 0.0), 40.0, &mut ids);
        let exit = hazards.gate_exit(Vec2::new(10.0, 0.0), 10.0, Vec2::new(1.0, 0.0)).unwrap();
        assert_eq!(exit.entry, a);
        assert_eq!(exit.exit, b);
        assert!(exit.exit_pos.distance(&Vec2::new(5000.0, 0.0)) > 40.0);
    }

    #[test]
    fn test_temporary_black_hole_expires() {
        let config = SimulationConfig::default();
        let mut hazards = Hazards::new();
        let mut hole = BlackHole::from_config(EntityId(1), Vec2::ZERO, &config);
        hole.lifetime = Some(0.5);
        hazards.black_holes.push(hole);
        hazards.tick(0.3);
        assert_eq!(hazards.black_holes.len(), 1);
        hazards.tick(0.3);
        assert!(hazards.black_holes.is_empty());
    }

    #[test]
    fn test_dust_drag() {
        let mut hazards = Hazards::new();
        hazards.dust_clouds.push(DustCloud { id: EntityId(1), pos: Vec2::ZERO, radius: 100.0, drag: 0.5 });
        assert_eq!(hazards.drag_at(Vec2::new(10.0, 0.0)), 0.5);
        assert_eq!(hazards.drag_at(Vec2::new(500.0, 0.0)), 1.0);
    }
}
