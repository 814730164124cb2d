// src/lib.rs
//! Interacting-particle simulation core.
//!
//! A [`PhysicsWorld`] owns a dense body table and advances it in fixed time
//! steps: pairwise interaction forces (direct, spatial-hash, or hierarchical
//! selector), field generators, semi-implicit Euler integration, impulse
//! collision response, world bounds, and iterative position constraints.
//! Large force batches can be shipped to a [`TaskPool`] of worker threads
//! with priority scheduling and retry.
//!
//! ```no_run
//! use swarm_physics::{BodyDesc, PhysicsWorld, WorldConfig};
//! use glam::Vec3;
//!
//! let mut world = PhysicsWorld::new(WorldConfig::default())?;
//! world.create_body(BodyDesc {
//!     position: Vec3::new(0.0, 10.0, 0.0),
//!     mass: 1.0,
//!     radius: 0.5,
//!     ..Default::default()
//! })?;
//! let report = world.update(Some(1.0 / 60.0), &[]);
//! println!("{} substeps, {} contacts", report.substeps, report.collisions.len());
//! # Ok::<(), swarm_physics::Error>(())
//! ```

pub mod body;
pub mod collision;
pub mod config;
pub mod constraint;
pub mod error;
pub mod forces;
pub mod integrator;
pub mod pool;
pub mod spatial;
pub mod world;

pub use body::{Body, BodyDesc, BodyId, CollisionFilter};
pub use collision::Collision;
pub use config::{Bounds, ForceMethod, WorldConfig};
pub use constraint::Constraint;
pub use error::{Error, Result};
pub use forces::{Falloff, ForceField};
pub use pool::{PoolConfig, PoolStats, Priority, TaskHandle, TaskPayload, TaskPool, TaskResult};
pub use spatial::SpatialGrid;
pub use world::{PhysicsWorld, StepReport};
