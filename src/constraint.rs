// src/constraint.rs
//! Geometric constraints, satisfied by iterative position correction
//! (under-relaxation, not an exact solve).
//!
//! Angle and multi-link hinge constraints are decomposed into pairwise
//! distance constraints — an explicit design simplification for this
//! domain's visual needs, *not* true angular dynamics. Constraints are
//! supplied per step by the caller; the world does not own them.

use std::collections::HashMap;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::body::{Body, BodyId};
use crate::forces::DIST_EPSILON_SQ;

/// A declarative relation between one or more bodies. Stiffness is in
/// `[0, 1]`; 1 corrects the full error per iteration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Constraint {
    /// Keep `|a - b|` at `target`.
    Distance {
        a: BodyId,
        b: BodyId,
        target: f32,
        stiffness: f32,
    },
    /// Keep the angle at `pivot` between arms `pivot->a` and `pivot->b`
    /// near `target` radians. Decomposed into three distance constraints:
    /// both arms hold their current length and the `a`-`b` chord is driven
    /// to the law-of-cosines target.
    Angle {
        a: BodyId,
        pivot: BodyId,
        b: BodyId,
        target: f32,
        stiffness: f32,
    },
    /// Multi-body linkage: consecutive bodies held at `spacing`.
    Hinge {
        bodies: Vec<BodyId>,
        spacing: f32,
        stiffness: f32,
    },
    /// Single-body anchor: linearly pulls the body toward `target`.
    Point {
        body: BodyId,
        target: Vec3,
        stiffness: f32,
    },
}

/// Internal pairwise link after decomposition.
struct DistanceLink {
    i: usize,
    j: usize,
    target: f32,
    stiffness: f32,
}

struct PointPull {
    i: usize,
    target: Vec3,
    stiffness: f32,
}

/// Satisfy `constraints` over `bodies` for `iterations` rounds, then
/// reconstruct velocity from each body's net position delta divided by `dt`
/// so that subsequent collision response sees consistent motion.
///
/// Constraints naming unknown or inactive bodies are skipped with a warning;
/// one bad descriptor never halts the pass. Fixed bodies are never moved.
pub fn solve(
    bodies: &mut [Body],
    index: &HashMap<BodyId, usize>,
    constraints: &[Constraint],
    iterations: u32,
    dt: f32,
) {
    if constraints.is_empty() || iterations == 0 {
        return;
    }

    let resolve = |id: BodyId| -> Option<usize> {
        match index.get(&id) {
            Some(&i) if bodies[i].active => Some(i),
            _ => {
                log::warn!("constraint references unknown or inactive body {id:?}; skipping");
                None
            }
        }
    };

    // Decompose once; the links are then relaxed for `iterations` rounds.
    let mut links: Vec<DistanceLink> = Vec::new();
    let mut pulls: Vec<PointPull> = Vec::new();

    for constraint in constraints {
        match constraint {
            Constraint::Distance { a, b, target, stiffness } => {
                let (Some(i), Some(j)) = (resolve(*a), resolve(*b)) else { continue };
                links.push(DistanceLink {
                    i,
                    j,
                    target: target.max(0.0),
                    stiffness: stiffness.clamp(0.0, 1.0),
                });
            }
            Constraint::Angle { a, pivot, b, target, stiffness } => {
                let (Some(i), Some(p), Some(j)) = (resolve(*a), resolve(*pivot), resolve(*b))
                else {
                    continue;
                };
                let stiffness = stiffness.clamp(0.0, 1.0);
                let arm_a = bodies[i].position.distance(bodies[p].position);
                let arm_b = bodies[j].position.distance(bodies[p].position);
                // Law of cosines: the chord length that realizes the target
                // angle given the current arm lengths.
                let chord =
                    (arm_a * arm_a + arm_b * arm_b - 2.0 * arm_a * arm_b * target.cos()).max(0.0);
                links.push(DistanceLink { i, j: p, target: arm_a, stiffness });
                links.push(DistanceLink { i: j, j: p, target: arm_b, stiffness });
                links.push(DistanceLink { i, j, target: chord.sqrt(), stiffness });
            }
            Constraint::Hinge { bodies: chain, spacing, stiffness } => {
                let stiffness = stiffness.clamp(0.0, 1.0);
                for pair in chain.windows(2) {
                    let (Some(i), Some(j)) = (resolve(pair[0]), resolve(pair[1])) else {
                        continue;
                    };
                    links.push(DistanceLink { i, j, target: spacing.max(0.0), stiffness });
                }
            }
            Constraint::Point { body, target, stiffness } => {
                let Some(i) = resolve(*body) else { continue };
                pulls.push(PointPull {
                    i,
                    target: *target,
                    stiffness: stiffness.clamp(0.0, 1.0),
                });
            }
        }
    }

    // Positions before solving, for the velocity reconstruction below.
    let before: Vec<Vec3> = bodies.iter().map(|b| b.position).collect();

    for _ in 0..iterations {
        for link in &links {
            relax_distance(bodies, link);
        }
        for pull in &pulls {
            let body = &mut bodies[pull.i];
            if body.fixed {
                continue;
            }
            body.position += (pull.target - body.position) * pull.stiffness;
        }
    }

    // v += dp/dt keeps the velocity consistent with the corrected motion.
    if dt > 0.0 {
        let inv_dt = 1.0 / dt;
        for (body, &prev) in bodies.iter_mut().zip(&before) {
            if body.fixed || !body.active {
                continue;
            }
            let delta = body.position - prev;
            if delta.length_squared() > 0.0 {
                body.velocity += delta * inv_dt;
            }
        }
    }
}

/// Move both endpoints half the positional error scaled by stiffness,
/// weighted by inverse mass (a fixed endpoint takes no share).
fn relax_distance(bodies: &mut [Body], link: &DistanceLink) {
    let delta = bodies[link.j].position - bodies[link.i].position;
    let dist_sq = delta.length_squared();
    if dist_sq < DIST_EPSILON_SQ {
        return; // coincident endpoints: no defined direction
    }
    let dist = dist_sq.sqrt();
    let error = dist - link.target;
    if error.abs() < 1e-6 {
        return;
    }

    let w_i = bodies[link.i].inv_mass();
    let w_j = bodies[link.j].inv_mass();
    let w_sum = w_i + w_j;
    if w_sum <= 0.0 {
        return; // both fixed
    }

    let correction = delta / dist * (error * link.stiffness);
    bodies[link.i].position += correction * (w_i / w_sum);
    bodies[link.j].position -= correction * (w_j / w_sum);
}
