// src/collision.rs
//! Sphere-sphere collision detection and impulse-based resolution.
//!
//! Detection tests squared center distance against the squared combined
//! radius for each candidate pair (broad phase or all-pairs). Resolution
//! runs in emission order — for bodies in several simultaneous collisions
//! the order affects the outcome, an accepted approximation of a true
//! simultaneous solve.
//!
//! Only the impulse is gated on an approaching pair. Positional correction
//! (slop + percent) runs for *any* overlapping pair, separating or not —
//! a deliberate departure from resolvers that return early on separation,
//! so resting bodies are pushed out of each other instead of sinking.

use std::time::Instant;

use glam::Vec3;

use crate::body::{Body, BodyId};
use crate::config::Bounds;
use crate::forces::DIST_EPSILON_SQ;

/// A detected contact. Transient — produced fresh each sub-step, never
/// persisted.
#[derive(Debug, Clone)]
pub struct Collision {
    pub a: BodyId,
    pub b: BodyId,
    /// Contact point on the surface of `a`, along the normal.
    pub point: Vec3,
    /// Unit vector from `a` toward `b`.
    pub normal: Vec3,
    /// Overlap depth, >= 0.
    pub depth: f32,
    /// Impulse magnitude applied during resolution (0 until resolved).
    pub impulse: f32,
    pub timestamp: Instant,
}

/// Resolution tuning; see [`crate::config::WorldConfig`] for the defaults.
#[derive(Debug, Clone, Copy)]
pub struct ResolveParams {
    /// Penetration tolerated before positional correction.
    pub slop: f32,
    /// Fraction of remaining penetration corrected per resolution.
    pub percent: f32,
}

/// Narrow-phase test for one candidate pair. Returns the collision if the
/// spheres overlap and the pair's filters allow contact.
pub fn detect_pair(a: &Body, b: &Body) -> Option<Collision> {
    if !a.active || !b.active {
        return None;
    }
    if !a.filter.allows(&b.filter) {
        return None;
    }

    let delta = b.position - a.position;
    let dist_sq = delta.length_squared();
    let combined = a.radius + b.radius;
    if combined <= 0.0 || dist_sq >= combined * combined {
        return None;
    }

    let (normal, dist) = if dist_sq < DIST_EPSILON_SQ {
        // Degenerate: centers coincide. Pick an arbitrary axis rather than
        // dividing by ~zero; expected at scale, handled locally.
        log::debug!("degenerate contact normal for {:?}/{:?}", a.id(), b.id());
        (Vec3::X, 0.0)
    } else {
        let dist = dist_sq.sqrt();
        (delta / dist, dist)
    };

    Some(Collision {
        a: a.id(),
        b: b.id(),
        point: a.position + normal * a.radius,
        normal,
        depth: combined - dist,
        impulse: 0.0,
        timestamp: Instant::now(),
    })
}

/// Impulse response with restitution plus positional correction.
///
/// Skips separating pairs. Fixed bodies contribute zero inverse mass, so
/// they absorb impulses without moving. Records the applied impulse
/// magnitude on the collision.
pub fn resolve(a: &mut Body, b: &mut Body, collision: &mut Collision, params: &ResolveParams) {
    let inv_a = a.inv_mass();
    let inv_b = b.inv_mass();
    let inv_sum = inv_a + inv_b;
    if inv_sum <= 0.0 {
        return; // two fixed bodies
    }

    let normal = collision.normal;
    let relative = b.velocity - a.velocity;
    let vn = relative.dot(normal);

    // Impulse only when approaching; correction below still applies so
    // resting overlap gets pushed out.
    if vn < 0.0 {
        let e = a.restitution.min(b.restitution);
        let j = -(1.0 + e) * vn / inv_sum;
        let impulse = normal * j;

        a.velocity -= impulse * inv_a;
        b.velocity += impulse * inv_b;
        collision.impulse = j;
    }

    // Positional correction: only the depth beyond the slop, a fraction at
    // a time, split by inverse mass.
    let correction =
        normal * ((collision.depth - params.slop).max(0.0) * params.percent / inv_sum);
    a.position -= correction * inv_a;
    b.position += correction * inv_b;
}

/// Enforce the world's axis-aligned bounds as six implicit planes: clamp
/// the violated component and reflect that velocity component scaled by
/// restitution.
pub fn apply_bounds(body: &mut Body, bounds: &Bounds) {
    if !body.active || body.fixed {
        return;
    }
    let r = body.radius;
    for axis in 0..3 {
        let min = bounds.min[axis] + r;
        let max = bounds.max[axis] - r;
        let p = body.position[axis];
        if p < min {
            body.position[axis] = min;
            if body.velocity[axis] < 0.0 {
                body.velocity[axis] = -body.velocity[axis] * body.restitution;
            }
        } else if p > max {
            body.position[axis] = max;
            if body.velocity[axis] > 0.0 {
                body.velocity[axis] = -body.velocity[axis] * body.restitution;
            }
        }
    }
}
