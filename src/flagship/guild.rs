//! Cosmic Guild ring city
//!
//! Buildings are laid out in three concentric rings around the hull: pentagons
//! inside, squares and circles in the middle, triangles and hexagons outside.
//! A candidate is rejected if its footprint intersects the hull or any
//! building already placed. Triangles are city turrets.

use geo::{Intersects, LineString, Polygon};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::f32::consts::TAU;

use crate::core::config::SimulationConfig;
use crate::core::types::Vec2;
use crate::flagship::turret::{Munition, Turret};

/// Vertices used for circles (hull and circular buildings)
const CIRCLE_SEGMENTS: usize = 16;

/// Placement attempts per ring slot
const PLACEMENT_TRIES: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BuildingShape {
    Pentagon,
    Square,
    Circle,
    Triangle,
    Hexagon,
}

impl BuildingShape {
    fn sides(&self) -> usize {
        match self {
            BuildingShape::Triangle => 3,
            BuildingShape::Square => 4,
            BuildingShape::Pentagon => 5,
            BuildingShape::Hexagon => 6,
            BuildingShape::Circle => CIRCLE_SEGMENTS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Building {
    pub shape: BuildingShape,
    /// Offset from the hull center
    pub offset: Vec2,
    /// Circumradius
    pub size: f32,
    pub rotation: f32,
    pub ring: usize,
    pub turret: Option<Turret>,
}

impl Building {
    /// Footprint vertices relative to the hull center
    pub fn vertices(&self) -> Vec<[f32; 2]> {
        regular_polygon(self.offset, self.size, self.shape.sides(), self.rotation)
    }

    pub fn is_turret(&self) -> bool {
        self.turret.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GuildCity {
    pub buildings: Vec<Building>,
}

/// Ring layout: (radius factor, building size, shapes to draw from)
const RINGS: [(f32, f32, &[BuildingShape]); 3] = [
    (1.45, 22.0, &[BuildingShape::Pentagon]),
    (2.0, 20.0, &[BuildingShape::Square, BuildingShape::Circle]),
    (2.6, 18.0, &[BuildingShape::Triangle, BuildingShape::Hexagon]),
];

impl GuildCity {
    /// Lay out a city around a hull of `hull_radius`
    pub fn generate<R: Rng>(hull_radius: f32, config: &SimulationConfig, rng: &mut R) -> Self {
        let hull = to_geo_polygon(&regular_polygon(Vec2::ZERO, hull_radius, CIRCLE_SEGMENTS, 0.0));
        let mut placed: Vec<Polygon<f64>> = Vec::new();
        let mut buildings = Vec::new();
        let mut rejected = 0usize;

        for (ring, (factor, size, shapes)) in RINGS.iter().enumerate() {
            let radius = hull_radius * factor;
            let slots = ((TAU * radius) / (size * 2.8)).floor().max(1.0) as usize;
            for slot in 0..slots {
                let base = slot as f32 * TAU / slots as f32;
                for _ in 0..PLACEMENT_TRIES {
                    let angle = base + rng.gen_range(-0.15..0.15f32);
                    let shape = shapes[rng.gen_range(0..shapes.len())];
                    let building = Building {
                        shape,
                        offset: Vec2::from_angle(angle) * (radius + rng.gen_range(-4.0..4.0f32)),
                        size: *size,
                        rotation: rng.gen::<f32>() * TAU,
                        ring,
                        turret: None,
                    };
                    let footprint = to_geo_polygon(&building.vertices());
                    if footprint.intersects(&hull) || placed.iter().any(|p| p.intersects(&footprint)) {
                        rejected += 1;
                        continue;
                    }
                    placed.push(footprint);
                    buildings.push(Building {
                        turret: (shape == BuildingShape::Triangle)
                            .then(|| Turret::new(angle, radius, Munition::CityMissile, config)),
                        ..building
                    });
                    break;
                }
            }
        }

        tracing::debug!(buildings = buildings.len(), rejected, "guild city laid out");
        Self { buildings }
    }

    pub fn turrets(&self) -> impl Iterator<Item = &Turret> {
        self.buildings.iter().filter_map(|b| b.turret.as_ref())
    }

    pub fn turrets_mut(&mut self) -> impl Iterator<Item = &mut Turret> {
        self.buildings.iter_mut().filter_map(|b| b.turret.as_mut())
    }

    /// Building whose bounding circle overlaps a circle at `offset` (hull frame)
    pub fn building_at(&self, offset: Vec2, r: f32) -> Option<&Building> {
        self.buildings.iter().find(|b| b.offset.distance(&offset) < b.size + r)
    }
}

/// Regular polygon vertices, counter-clockwise
pub fn regular_polygon(center: Vec2, radius: f32, sides: usize, rotation: f32) -> Vec<[f32; 2]> {
    (0..sides)
        .map(|k| {
            let p = center + Vec2::from_angle(rotation + k as f32 * TAU / sides as f32) * radius;
            [p.x, p.y]
        })
        .collect()
}

fn to_geo_polygon(vertices: &[[f32; 2]]) -> Polygon<f64> {
    let mut coords: Vec<(f64, f64)> = vertices.iter().map(|[x, y]| (*x as f64, *y as f64)).collect();
    // Close the ring
    if let Some(first) = coords.first().cloned() {
        coords.push(first);
    }
    Polygon::new(LineString::from(coords), vec![])
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn city(seed: u64) -> GuildCity {
        let config = SimulationConfig::default();
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        GuildCity::generate(120.0, &config, &mut rng)
    }

    #[test]
    fn test_no_building_overlaps() {
        for seed in 0..5 {
            let city = city(seed);
            assert!(!city.buildings.is_empty());
            let hull = to_geo_polygon(&regular_polygon(Vec2::ZERO, 120.0, CIRCLE_SEGMENTS, 0.0));
            let polys: Vec<_> = city.buildings.iter().map(|b| to_geo_polygon(&b.vertices())).collect();
            for (i, a) in polys.iter().enumerate() {
                assert!(!a.intersects(&hull));
                for b in &polys[i + 1..] {
                    assert!(!a.intersects(b));
                }
            }
        }
    }

    #[test]
    fn test_rings_use_their_shapes() {
        let city = city(3);
        for b in &city.buildings {
            let allowed = RINGS[b.ring].2;
            assert!(allowed.contains(&b.shape));
        }
    }

    #[test]
    fn test_only_triangles_are_turrets() {
        let city = city(7);
        for b in &city.buildings {
            assert_eq!(b.is_turret(), b.shape == BuildingShape::Triangle);
        }
        assert_eq!(city.turrets().count(), city.buildings.iter().filter(|b| b.shape == BuildingShape::Triangle).count());
    }

    #[test]
    fn test_same_seed_same_city() {
        assert_eq!(city(11), city(11));
    }
}
