// src/config.rs
//! World configuration: the immutable-during-a-step record that drives the
//! simulation loop. Validation fails fast — a bad value is a construction
//! error, never a silently substituted default.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Selects how per-body net forces (and the collision broad phase) are
/// computed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ForceMethod {
    /// All-pairs O(n²). Exact.
    Direct,
    /// Spatial-hash accelerated, O(n·k) expected. Matches Direct within
    /// numerical tolerance when the cutoff distance is respected.
    Grid,
    /// Barnes–Hut selector. Accepted, but currently evaluated via the
    /// Direct path (see [`crate::forces`]); `theta` is carried for a real
    /// hierarchical implementation and ignored by the fallback.
    Hierarchical { theta: f32 },
}

/// Axis-aligned world bounds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min: Vec3,
    pub max: Vec3,
}

impl Bounds {
    #[inline]
    pub fn contains(&self, p: Vec3) -> bool {
        p.cmpge(self.min).all() && p.cmple(self.max).all()
    }
}

/// Global simulation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldConfig {
    /// Ambient acceleration applied to every non-fixed body each sub-step.
    pub gravity: Vec3,
    pub bounds: Bounds,
    /// Fixed simulation time step, seconds.
    pub fixed_step: f32,
    /// Catch-up cap per `update` call (spiral-of-death guard).
    pub max_substeps: u32,
    pub method: ForceMethod,
    /// Spatial hash cell size. Required > 0 when `method` is `Grid`.
    pub cell_size: f32,
    /// Body-count ceiling.
    pub max_bodies: usize,
    /// Velocity damping factor per sub-step, in (0, 1]. 1 = no damping.
    pub damping: f32,
    /// Speed ceiling; velocities are rescaled to this magnitude when exceeded.
    pub max_speed: f32,
    /// Constraint solver iterations per sub-step.
    pub constraint_iterations: u32,
    /// Reserved: bodies below this speed may be skipped in the future.
    /// Currently unused.
    #[serde(default)]
    pub sleep_threshold: f32,
    /// Penetration tolerated before positional correction kicks in.
    #[serde(default = "default_slop")]
    pub collision_slop: f32,
    /// Fraction of remaining penetration corrected per resolution.
    #[serde(default = "default_percent")]
    pub collision_percent: f32,
    /// Global multiplier on the pairwise interaction law.
    #[serde(default = "default_strength")]
    pub interaction_strength: f32,
    /// Pairwise interactions beyond this distance are skipped. `None` = no cutoff.
    #[serde(default)]
    pub interaction_cutoff: Option<f32>,
}

fn default_slop() -> f32 {
    0.01
}
fn default_percent() -> f32 {
    0.2
}
fn default_strength() -> f32 {
    1.0
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            gravity: Vec3::ZERO,
            bounds: Bounds {
                min: Vec3::splat(-1000.0),
                max: Vec3::splat(1000.0),
            },
            fixed_step: 1.0 / 60.0,
            max_substeps: 5,
            method: ForceMethod::Direct,
            cell_size: 10.0,
            max_bodies: 10_000,
            damping: 1.0,
            max_speed: 1000.0,
            constraint_iterations: 4,
            sleep_threshold: 0.0,
            collision_slop: default_slop(),
            collision_percent: default_percent(),
            interaction_strength: default_strength(),
            interaction_cutoff: None,
        }
    }
}

impl WorldConfig {
    /// Fail-fast validation. Called by `PhysicsWorld::new`.
    pub fn validate(&self) -> Result<()> {
        if !(self.fixed_step > 0.0) || !self.fixed_step.is_finite() {
            return Err(Error::config(format!(
                "fixed_step must be finite and > 0, got {}",
                self.fixed_step
            )));
        }
        if self.max_substeps == 0 {
            return Err(Error::config("max_substeps must be >= 1"));
        }
        if self.bounds.min.cmpge(self.bounds.max).any() {
            return Err(Error::config(format!(
                "malformed bounds: min {:?} must be strictly below max {:?} on every axis",
                self.bounds.min, self.bounds.max
            )));
        }
        if matches!(self.method, ForceMethod::Grid) && !(self.cell_size > 0.0) {
            return Err(Error::config(format!(
                "cell_size must be > 0 for the grid method, got {}",
                self.cell_size
            )));
        }
        if let ForceMethod::Hierarchical { theta } = self.method {
            if !(theta > 0.0) {
                return Err(Error::config(format!(
                    "hierarchical theta must be > 0, got {theta}"
                )));
            }
        }
        if self.max_bodies == 0 {
            return Err(Error::config("max_bodies must be >= 1"));
        }
        if !(self.damping > 0.0 && self.damping <= 1.0) {
            return Err(Error::config(format!(
                "damping must be in (0, 1], got {}",
                self.damping
            )));
        }
        if !(self.max_speed > 0.0) {
            return Err(Error::config("max_speed must be > 0"));
        }
        if self.collision_slop < 0.0 || !(0.0..=1.0).contains(&self.collision_percent) {
            return Err(Error::config(
                "collision_slop must be >= 0 and collision_percent in [0, 1]",
            ));
        }
        Ok(())
    }
}
