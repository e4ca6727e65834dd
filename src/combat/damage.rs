//! Damage helpers shared by collision resolution and area effects

use crate::core::types::Vec2;
use crate::entity::Blast;

/// Minimum fraction of blast damage at the edge of the radius
const BLAST_EDGE_FRACTION: f32 = 0.5;

/// True if two circles overlap
pub fn circles_overlap(a: Vec2, ra: f32, b: Vec2, rb: f32) -> bool {
    a.distance_sq(&b) <= (ra + rb) * (ra + rb)
}

/// Damage a blast deals to a body of radius `size` at `pos`
///
/// Full damage at the center, falling linearly to half at the rim. Zero
/// outside.
pub fn blast_damage(blast: &Blast, pos: Vec2, size: f32) -> f32 {
    let d = (blast.pos.distance(&pos) - size).max(0.0);
    if d > blast.radius {
        return 0.0;
    }
    let t = if blast.radius > 0.0 { d / blast.radius } else { 0.0 };
    blast.damage * (1.0 - (1.0 - BLAST_EDGE_FRACTION) * t)
}
