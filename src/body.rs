// src/body.rs
//! Body types: the simulated point masses and their collision filtering.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

// ============================================================================
// DOMAIN TYPES (Strong Typing for Safety & Performance)
// ============================================================================

/// Opaque, immutable body identity. Assigned by the world at creation,
/// never reused within a world's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BodyId(pub(crate) u64);

impl BodyId {
    /// Raw id value, mostly useful for logging.
    #[inline(always)]
    pub fn raw(self) -> u64 {
        self.0
    }
}

/// Filter for collision detection layers.
///
/// Two bodies are allowed to collide only when the membership test passes
/// *symmetrically*: each body's group must intersect the other's mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollisionFilter {
    /// Which groups this body belongs to.
    pub group: u32,
    /// Which groups this body interacts with.
    pub mask: u32,
}

impl Default for CollisionFilter {
    fn default() -> Self {
        Self { group: 0xFFFF, mask: 0xFFFF } // Interacts with everything by default
    }
}

impl CollisionFilter {
    /// Symmetric membership test gating collision checks.
    #[inline(always)]
    pub fn allows(&self, other: &CollisionFilter) -> bool {
        (self.group & other.mask) != 0 && (other.group & self.mask) != 0
    }
}

// ============================================================================
// BODY STATE
// ============================================================================

/// A simulated point mass.
///
/// Fixed bodies are never moved by the integrator or the collision resolver
/// but still participate as immovable obstacles (their inverse mass is zero,
/// which makes every impulse and correction term vanish naturally).
#[derive(Debug, Clone)]
pub struct Body {
    pub(crate) id: BodyId,
    pub position: Vec3,
    pub velocity: Vec3,
    /// Net force accumulated this step. Reset to zero by the integrator.
    pub accumulated_force: Vec3,
    pub mass: f32,
    pub(crate) inv_mass: f32,
    pub radius: f32,
    pub restitution: f32,
    pub fixed: bool,
    /// Inactive bodies are skipped by every pass.
    pub active: bool,
    pub filter: CollisionFilter,
}

impl Body {
    #[inline(always)]
    pub fn id(&self) -> BodyId {
        self.id
    }

    /// Zero for fixed bodies, `1 / mass` otherwise.
    #[inline(always)]
    pub fn inv_mass(&self) -> f32 {
        self.inv_mass
    }

    /// Add a force to this step's accumulator (composes with pairwise and
    /// field contributions; it is never overwritten mid-step).
    #[inline(always)]
    pub fn apply_force(&mut self, force: Vec3) {
        self.accumulated_force += force;
    }
}

// ============================================================================
// CREATION DESCRIPTOR
// ============================================================================

/// Everything needed to create a body, minus its identity.
///
/// Validated at creation time: a non-positive mass, negative radius, or
/// out-of-range restitution is a configuration error, never silently fixed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BodyDesc {
    pub position: Vec3,
    #[serde(default)]
    pub velocity: Vec3,
    pub mass: f32,
    #[serde(default)]
    pub radius: f32,
    #[serde(default = "default_restitution")]
    pub restitution: f32,
    #[serde(default)]
    pub fixed: bool,
    #[serde(default)]
    pub filter: Option<CollisionFilter>,
}

fn default_restitution() -> f32 {
    0.5
}

impl Default for BodyDesc {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            velocity: Vec3::ZERO,
            mass: 1.0,
            radius: 0.0,
            restitution: 0.5,
            fixed: false,
            filter: None,
        }
    }
}

impl BodyDesc {
    pub(crate) fn validate(&self) -> Result<()> {
        if !(self.mass > 0.0) || !self.mass.is_finite() {
            return Err(Error::config(format!(
                "body mass must be finite and > 0, got {}",
                self.mass
            )));
        }
        if self.radius < 0.0 || !self.radius.is_finite() {
            return Err(Error::config(format!(
                "body radius must be finite and >= 0, got {}",
                self.radius
            )));
        }
        if !(0.0..=1.0).contains(&self.restitution) {
            return Err(Error::config(format!(
                "restitution must be in [0, 1], got {}",
                self.restitution
            )));
        }
        Ok(())
    }

    pub(crate) fn build(&self, id: BodyId) -> Body {
        Body {
            id,
            position: self.position,
            velocity: self.velocity,
            accumulated_force: Vec3::ZERO,
            mass: self.mass,
            inv_mass: if self.fixed { 0.0 } else { 1.0 / self.mass },
            radius: self.radius,
            restitution: self.restitution,
            fixed: self.fixed,
            active: true,
            filter: self.filter.unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_is_symmetric() {
        let a = CollisionFilter { group: 0b01, mask: 0b10 };
        let b = CollisionFilter { group: 0b10, mask: 0b01 };
        assert!(a.allows(&b));
        assert!(b.allows(&a));

        // One-way interest is not enough.
        let c = CollisionFilter { group: 0b100, mask: 0b01 };
        assert!(!a.allows(&c));
    }

    #[test]
    fn desc_rejects_bad_mass() {
        let mut desc = BodyDesc { mass: 0.0, ..Default::default() };
        assert!(desc.validate().unwrap_err().is_config());
        desc.mass = -2.0;
        assert!(desc.validate().is_err());
        desc.mass = f32::NAN;
        assert!(desc.validate().is_err());
    }

    #[test]
    fn fixed_body_has_zero_inv_mass() {
        let desc = BodyDesc { mass: 4.0, fixed: true, ..Default::default() };
        let body = desc.build(BodyId(1));
        assert_eq!(body.inv_mass(), 0.0);

        let desc = BodyDesc { mass: 4.0, ..Default::default() };
        let body = desc.build(BodyId(2));
        assert_eq!(body.inv_mass(), 0.25);
    }

    #[test]
    fn desc_rejects_bad_restitution() {
        let desc = BodyDesc { restitution: 1.5, ..Default::default() };
        assert!(desc.validate().is_err());
    }
}
