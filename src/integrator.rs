// src/integrator.rs
//! Semi-implicit Euler integration.
//!
//! Per active, non-fixed body, per fixed sub-step:
//! 1. `v += (F / m) * dt`
//! 2. `v += gravity * dt` (uniform external acceleration)
//! 3. `v *= damping`
//! 4. clamp `|v|` to `max_speed`, preserving direction
//! 5. `p += v * dt`
//! 6. reset the force accumulator for the next step
//!
//! Mass validity is a body-creation concern; the integrator assumes
//! `inv_mass` is already consistent (zero for fixed bodies).

use glam::Vec3;

use crate::body::Body;

/// Per-sub-step integration parameters.
#[derive(Debug, Clone, Copy)]
pub struct IntegrateParams {
    pub gravity: Vec3,
    /// In (0, 1]; 1 = no damping.
    pub damping: f32,
    pub max_speed: f32,
}

/// Advance one body by `dt`. No-op for fixed or inactive bodies beyond
/// clearing their force accumulator.
#[inline]
pub fn integrate_body(body: &mut Body, params: &IntegrateParams, dt: f32) {
    if !body.active {
        return;
    }
    if body.fixed {
        body.accumulated_force = Vec3::ZERO;
        return;
    }

    body.velocity += body.accumulated_force * body.inv_mass() * dt;
    body.velocity += params.gravity * dt;
    body.velocity *= params.damping;

    let speed_sq = body.velocity.length_squared();
    if speed_sq > params.max_speed * params.max_speed {
        body.velocity = body.velocity * (params.max_speed / speed_sq.sqrt());
    }

    body.position += body.velocity * dt;
    body.accumulated_force = Vec3::ZERO;
}

/// Advance every body in the slice.
pub fn integrate_all(bodies: &mut [Body], params: &IntegrateParams, dt: f32) {
    for body in bodies {
        integrate_body(body, params, dt);
    }
}
