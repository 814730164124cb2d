// src/forces.rs
//! Force evaluation: pairwise n-body interactions plus field generators.
//!
//! Three selectable methods share one output contract — `out[i]` is
//! *accumulated*, never overwritten, so pairwise and field contributions
//! compose:
//!
//! - **Direct**: all-pairs `F = strength * m_i * m_j / d²` along the
//!   connecting line, O(n²), exact.
//! - **Grid**: identical law, candidates from a spatial-hash neighbor query
//!   per body, O(n·k) expected. Matches Direct within tolerance when both
//!   respect the same cutoff distance.
//! - **Hierarchical**: Barnes–Hut selector. Currently evaluated via the
//!   Direct path with a warning; `theta` is accepted and unused. Callers
//!   must not treat outputs as interchangeable with a real tree code tuned
//!   for a given opening angle.
//!
//! Pairs closer than a numerical-stability epsilon contribute no force
//! (skipped, not an error) — the same guard applies to all field math.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::body::BodyId;
use crate::spatial::SpatialGrid;

/// Squared separation below which a pairwise/field contribution is skipped.
pub const DIST_EPSILON_SQ: f32 = 1e-8;

// ============================================================================
// PAIRWISE INTERACTIONS
// ============================================================================

/// Parameters of the pairwise interaction law.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PairwiseParams {
    /// Global multiplier on `m_i * m_j / d²`.
    pub strength: f32,
    /// Interactions beyond this distance are skipped. `None` = no cutoff.
    pub cutoff: Option<f32>,
}

impl Default for PairwiseParams {
    fn default() -> Self {
        Self { strength: 1.0, cutoff: None }
    }
}

#[inline(always)]
fn pair_force(p_i: Vec3, p_j: Vec3, m_i: f32, m_j: f32, params: &PairwiseParams) -> Option<Vec3> {
    let delta = p_j - p_i;
    let d_sq = delta.length_squared();
    if d_sq < DIST_EPSILON_SQ {
        return None; // coincident bodies: no force, not an error
    }
    if let Some(cutoff) = params.cutoff {
        if d_sq > cutoff * cutoff {
            return None;
        }
    }
    let d = d_sq.sqrt();
    let magnitude = params.strength * m_i * m_j / d_sq;
    Some(delta * (magnitude / d))
}

/// All-pairs evaluation. Equal-and-opposite accumulation, so total momentum
/// change from the pairwise pass is zero by construction.
pub fn accumulate_direct(
    positions: &[Vec3],
    masses: &[f32],
    params: &PairwiseParams,
    out: &mut [Vec3],
) {
    debug_assert_eq!(positions.len(), masses.len());
    debug_assert_eq!(positions.len(), out.len());

    for i in 0..positions.len() {
        for j in (i + 1)..positions.len() {
            if let Some(f) = pair_force(positions[i], positions[j], masses[i], masses[j], params) {
                out[i] += f;
                out[j] -= f;
            }
        }
    }
}

/// Grid-accelerated evaluation. Builds a spatial hash keyed by body index
/// and sums each body's neighbors within the cutoff — one-sided
/// accumulation, so no pair dedup is needed.
///
/// Falls back to [`accumulate_direct`] when no cutoff is configured, since
/// a neighbor query needs a finite radius to be meaningful.
pub fn accumulate_grid(
    positions: &[Vec3],
    masses: &[f32],
    cell_size: f32,
    params: &PairwiseParams,
    out: &mut [Vec3],
) {
    let Some(cutoff) = params.cutoff else {
        log::debug!("grid force method without a cutoff; using direct evaluation");
        accumulate_direct(positions, masses, params, out);
        return;
    };

    // Index-keyed grid; `SpatialGrid` is shared with the collision broad phase.
    let mut grid = match SpatialGrid::new(cell_size) {
        Ok(g) => g,
        Err(e) => {
            // Validated at world construction; unreachable in practice.
            log::warn!("invalid cell size for grid force pass ({e}); using direct");
            accumulate_direct(positions, masses, params, out);
            return;
        }
    };
    for (idx, &p) in positions.iter().enumerate() {
        grid.insert(BodyId(idx as u64), p);
    }
    let position_of = |id: BodyId| positions.get(id.raw() as usize).copied();

    for i in 0..positions.len() {
        let neighbors = grid.query_neighbors(BodyId(i as u64), positions[i], cutoff, position_of);
        for id in neighbors {
            let j = id.raw() as usize;
            if let Some(f) = pair_force(positions[i], positions[j], masses[i], masses[j], params) {
                out[i] += f;
            }
        }
    }
}

/// Barnes–Hut placeholder. Accepts the selector and `theta`, evaluates via
/// the Direct path. The warning keeps the approximation mismatch visible
/// instead of silently pretending the tree code ran.
pub fn accumulate_hierarchical(
    positions: &[Vec3],
    masses: &[f32],
    theta: f32,
    params: &PairwiseParams,
    out: &mut [Vec3],
) {
    log::warn!(
        "hierarchical force method (theta = {theta}) is not implemented; \
         falling back to direct evaluation"
    );
    accumulate_direct(positions, masses, params, out);
}

// ============================================================================
// FIELD GENERATORS
// ============================================================================

/// How a field force's magnitude decays with distance from the generator,
/// normalized so the factor is 1 at the center and 0 at/beyond `radius`
/// (Exponential is cut, not blended, at the radius edge).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Falloff {
    None,
    Linear,
    Quadratic,
    Exponential,
}

impl Falloff {
    /// Attenuation factor for a distance `dist` from the generator.
    #[inline]
    pub fn eval(self, dist: f32, radius: f32) -> f32 {
        if dist >= radius {
            return 0.0;
        }
        let t = (dist / radius).clamp(0.0, 1.0);
        match self {
            Falloff::None => 1.0,
            Falloff::Linear => 1.0 - t,
            Falloff::Quadratic => (1.0 - t) * (1.0 - t),
            Falloff::Exponential => (-3.0 * t).exp(),
        }
    }
}

/// A field generator. Closed sum type — one variant per field kind, each
/// carrying only its relevant parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ForceField {
    /// Uniform acceleration field: force = direction * strength * mass.
    Gravity { direction: Vec3, strength: f32 },
    /// Pulls bodies toward `position` within `radius`.
    Attraction {
        position: Vec3,
        strength: f32,
        radius: f32,
        falloff: Falloff,
    },
    /// Identical falloff math to Attraction, opposite sign.
    Repulsion {
        position: Vec3,
        strength: f32,
        radius: f32,
        falloff: Falloff,
    },
    /// Rotational force around `axis` through `position`.
    Vortex {
        position: Vec3,
        axis: Vec3,
        strength: f32,
        radius: f32,
        falloff: Falloff,
    },
    /// Constant directional push, independent of mass.
    Wind { direction: Vec3, strength: f32 },
}

impl ForceField {
    /// Structural sanity check. Used to skip malformed fields at
    /// application time — a bad field never halts the step loop.
    pub fn is_valid(&self) -> bool {
        match *self {
            ForceField::Gravity { direction, strength } => {
                direction.is_finite() && strength.is_finite()
            }
            ForceField::Attraction { position, strength, radius, .. }
            | ForceField::Repulsion { position, strength, radius, .. } => {
                position.is_finite() && strength.is_finite() && radius > 0.0
            }
            ForceField::Vortex { position, axis, strength, radius, .. } => {
                position.is_finite()
                    && axis.is_finite()
                    && axis.length_squared() >= DIST_EPSILON_SQ
                    && strength.is_finite()
                    && radius > 0.0
            }
            ForceField::Wind { direction, strength } => {
                direction.is_finite() && strength.is_finite()
            }
        }
    }

    /// Force contribution on a body of mass `mass` at `position`.
    /// Returns `Vec3::ZERO` for degenerate geometry (epsilon guards).
    pub fn force_at(&self, position: Vec3, mass: f32) -> Vec3 {
        match *self {
            ForceField::Gravity { direction, strength } => {
                direction.normalize_or_zero() * strength * mass
            }
            ForceField::Attraction { position: center, strength, radius, falloff } => {
                radial_force(position, center, strength, radius, falloff)
            }
            ForceField::Repulsion { position: center, strength, radius, falloff } => {
                -radial_force(position, center, strength, radius, falloff)
            }
            ForceField::Vortex { position: center, axis, strength, radius, falloff } => {
                let offset = position - center;
                let dist_sq = offset.length_squared();
                if dist_sq < DIST_EPSILON_SQ {
                    return Vec3::ZERO; // on the vortex axis point
                }
                let dist = dist_sq.sqrt();
                let tangent = axis.normalize_or_zero().cross(offset);
                if tangent.length_squared() < DIST_EPSILON_SQ {
                    return Vec3::ZERO; // aligned with the axis
                }
                tangent.normalize() * strength * falloff.eval(dist, radius)
            }
            ForceField::Wind { direction, strength } => {
                direction.normalize_or_zero() * strength
            }
        }
    }
}

/// Shared attraction/repulsion math: positive strength pulls toward `center`.
#[inline]
fn radial_force(position: Vec3, center: Vec3, strength: f32, radius: f32, falloff: Falloff) -> Vec3 {
    let delta = center - position;
    let dist_sq = delta.length_squared();
    if dist_sq < DIST_EPSILON_SQ {
        return Vec3::ZERO;
    }
    let dist = dist_sq.sqrt();
    (delta / dist) * strength * falloff.eval(dist, radius)
}

/// Apply every valid field generator to every body, after the pairwise pass.
/// Invalid fields are skipped with a warning.
pub fn apply_fields(positions: &[Vec3], masses: &[f32], fields: &[ForceField], out: &mut [Vec3]) {
    for field in fields {
        if !field.is_valid() {
            log::warn!("skipping malformed force field: {field:?}");
            continue;
        }
        for i in 0..positions.len() {
            out[i] += field.force_at(positions[i], masses[i]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOL: f32 = 1e-4;

    #[test]
    fn direct_pairwise_is_equal_and_opposite() {
        let positions = vec![Vec3::new(-1.0, 0.0, 0.0), Vec3::new(1.0, 0.0, 0.0)];
        let masses = vec![2.0, 3.0];
        let mut out = vec![Vec3::ZERO; 2];
        accumulate_direct(&positions, &masses, &PairwiseParams::default(), &mut out);

        // F = 2*3 / 4 = 1.5 along +X for body 0.
        assert!((out[0] - Vec3::new(1.5, 0.0, 0.0)).length() < TOL);
        assert!((out[0] + out[1]).length() < TOL);
    }

    #[test]
    fn coincident_bodies_contribute_nothing() {
        let positions = vec![Vec3::ZERO, Vec3::ZERO];
        let masses = vec![1.0, 1.0];
        let mut out = vec![Vec3::ZERO; 2];
        accumulate_direct(&positions, &masses, &PairwiseParams::default(), &mut out);
        assert_eq!(out[0], Vec3::ZERO);
        assert_eq!(out[1], Vec3::ZERO);
    }

    #[test]
    fn cutoff_skips_distant_pairs() {
        let positions = vec![Vec3::ZERO, Vec3::new(100.0, 0.0, 0.0)];
        let masses = vec![1.0, 1.0];
        let params = PairwiseParams { strength: 1.0, cutoff: Some(10.0) };
        let mut out = vec![Vec3::ZERO; 2];
        accumulate_direct(&positions, &masses, &params, &mut out);
        assert_eq!(out[0], Vec3::ZERO);
    }

    #[test]
    fn grid_matches_direct_when_cutoff_respected() {
        use rand::{Rng, SeedableRng};
        let mut rng = rand::rngs::StdRng::seed_from_u64(7);
        let positions: Vec<Vec3> = (0..64)
            .map(|_| {
                Vec3::new(
                    rng.gen_range(-20.0..20.0),
                    rng.gen_range(-20.0..20.0),
                    rng.gen_range(-20.0..20.0),
                )
            })
            .collect();
        let masses = vec![1.0f32; positions.len()];
        let params = PairwiseParams { strength: 1.0, cutoff: Some(5.0) };

        let mut direct = vec![Vec3::ZERO; positions.len()];
        accumulate_direct(&positions, &masses, &params, &mut direct);

        let mut grid = vec![Vec3::ZERO; positions.len()];
        accumulate_grid(&positions, &masses, 5.0, &params, &mut grid);

        for (d, g) in direct.iter().zip(&grid) {
            let tol = 1e-4 * (1.0 + d.length());
            assert!((*d - *g).length() < tol, "direct {d:?} vs grid {g:?}");
        }
    }

    #[test]
    fn hierarchical_falls_back_to_direct() {
        let positions = vec![Vec3::new(-2.0, 0.0, 0.0), Vec3::new(2.0, 0.0, 0.0)];
        let masses = vec![1.0, 1.0];
        let params = PairwiseParams::default();

        let mut direct = vec![Vec3::ZERO; 2];
        accumulate_direct(&positions, &masses, &params, &mut direct);
        let mut bh = vec![Vec3::ZERO; 2];
        accumulate_hierarchical(&positions, &masses, 0.5, &params, &mut bh);
        assert_eq!(direct, bh);
    }

    #[test]
    fn attraction_and_repulsion_are_mirrored() {
        let body = Vec3::new(3.0, 0.0, 0.0);
        let pull = ForceField::Attraction {
            position: Vec3::ZERO,
            strength: 2.0,
            radius: 10.0,
            falloff: Falloff::Linear,
        };
        let push = ForceField::Repulsion {
            position: Vec3::ZERO,
            strength: 2.0,
            radius: 10.0,
            falloff: Falloff::Linear,
        };
        let f_pull = pull.force_at(body, 1.0);
        let f_push = push.force_at(body, 1.0);
        assert!((f_pull + f_push).length() < TOL);
        assert!(f_pull.x < 0.0); // toward the origin
    }

    #[test]
    fn falloff_is_zero_outside_radius() {
        for falloff in [Falloff::None, Falloff::Linear, Falloff::Quadratic, Falloff::Exponential] {
            assert_eq!(falloff.eval(10.0, 10.0), 0.0);
            assert_eq!(falloff.eval(11.0, 10.0), 0.0);
            assert!(falloff.eval(0.0, 10.0) > 0.99);
        }
    }

    #[test]
    fn vortex_is_tangential() {
        let field = ForceField::Vortex {
            position: Vec3::ZERO,
            axis: Vec3::Y,
            strength: 1.0,
            radius: 10.0,
            falloff: Falloff::None,
        };
        let at = Vec3::new(2.0, 0.0, 0.0);
        let f = field.force_at(at, 1.0);
        // Perpendicular to the radial offset and to the axis.
        assert!(f.dot(at).abs() < TOL);
        assert!(f.dot(Vec3::Y).abs() < TOL);
        assert!(f.length() > 0.5);

        // On the axis: epsilon guard, no blow-up.
        assert_eq!(field.force_at(Vec3::ZERO, 1.0), Vec3::ZERO);
    }

    #[test]
    fn malformed_field_is_skipped() {
        let positions = vec![Vec3::ZERO];
        let masses = vec![1.0];
        let mut out = vec![Vec3::ZERO];
        let bad = ForceField::Attraction {
            position: Vec3::ZERO,
            strength: f32::NAN,
            radius: -1.0,
            falloff: Falloff::None,
        };
        apply_fields(&positions, &masses, &[bad], &mut out);
        assert_eq!(out[0], Vec3::ZERO);
    }
}
