// src/world.rs
//! The physics world: body table, force/field evaluation, fixed-step
//! advancement, collision handling, and constraint relaxation, behind one
//! `update` call.
//!
//! - **Storage**: bodies live in a dense `Vec` (stable iteration order, cheap
//!   scans) with a `BodyId → index` map on the side. Removal is
//!   `swap_remove` + index patch, so ids stay valid across removals.
//! - **Fixed timestep**: `update` feeds an accumulator and advances in whole
//!   `fixed_step` quanta, at most `max_substeps` per call. Excess time beyond
//!   the cap is shed — the simulation falls behind wall time instead of
//!   spiralling.
//! - **Sub-step order**: pairwise forces → field generators → integration →
//!   collision detect/resolve → bounds → constraints. Identical inputs give
//!   numerically identical trajectories: iteration order is the dense body
//!   order and broad-phase pairs are sorted.
//! - **Offload**: with a [`TaskPool`] attached and enough bodies, the force
//!   pass ships to the pool as a `ForceBatch` and the step blocks on the
//!   handle, so integration never observes partial forces.

use std::collections::HashMap;
use std::sync::Arc;

use crossbeam_channel::{unbounded, Receiver, Sender};
use glam::Vec3;

use crate::body::{Body, BodyDesc, BodyId};
use crate::collision::{self, Collision, ResolveParams};
use crate::config::{ForceMethod, WorldConfig};
use crate::constraint::{self, Constraint};
use crate::forces::{self, ForceField, PairwiseParams};
use crate::integrator::{self, IntegrateParams};
use crate::pool::{Priority, TaskPayload, TaskPool, TaskResult};
use crate::spatial::SpatialGrid;
use crate::{Error, Result};

/// Below this many active bodies the force pass always runs inline; the
/// batch is too small to pay for the handoff.
pub(crate) const POOL_OFFLOAD_MIN_BODIES: usize = 256;

/// What one `update` call did.
#[derive(Debug, Clone, Default)]
pub struct StepReport {
    /// Every contact resolved this call, in resolution order.
    pub collisions: Vec<Collision>,
    /// Simulated seconds consumed (`substeps * fixed_step`).
    pub consumed: f32,
    /// Fixed sub-steps taken (≤ `max_substeps`).
    pub substeps: u32,
}

/// Owns all simulation state. Not `Sync` — one world per simulation thread;
/// cross-thread work goes through the attached [`TaskPool`].
pub struct PhysicsWorld {
    config: WorldConfig,
    bodies: Vec<Body>,
    index: HashMap<BodyId, usize>,
    /// Present iff `config.method` is `Grid`.
    grid: Option<SpatialGrid>,
    fields: Vec<ForceField>,
    next_id: u64,
    accumulator: f32,
    pool: Option<Arc<TaskPool>>,
    events_tx: Sender<Collision>,
    events_rx: Receiver<Collision>,
}

impl PhysicsWorld {
    pub fn new(config: WorldConfig) -> Result<Self> {
        config.validate()?;
        let grid = match config.method {
            ForceMethod::Grid => Some(SpatialGrid::new(config.cell_size)?),
            _ => None,
        };
        let (events_tx, events_rx) = unbounded();
        log::info!(
            "physics world up: method {:?}, fixed_step {}s, max {} bodies",
            config.method,
            config.fixed_step,
            config.max_bodies
        );
        Ok(Self {
            config,
            bodies: Vec::new(),
            index: HashMap::new(),
            grid,
            fields: Vec::new(),
            next_id: 1,
            accumulator: 0.0,
            pool: None,
            events_tx,
            events_rx,
        })
    }

    #[inline]
    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    // ========================================================================
    // BODY TABLE
    // ========================================================================

    /// Validates the descriptor and the body-count ceiling, then inserts into
    /// the table (and the spatial grid, when grid-accelerated).
    pub fn create_body(&mut self, desc: BodyDesc) -> Result<BodyId> {
        desc.validate()?;
        if self.bodies.len() >= self.config.max_bodies {
            return Err(Error::BodyLimit { limit: self.config.max_bodies });
        }

        let id = BodyId(self.next_id);
        self.next_id += 1;
        let body = desc.build(id);
        if let Some(grid) = &mut self.grid {
            grid.insert(id, body.position);
        }
        self.index.insert(id, self.bodies.len());
        self.bodies.push(body);
        log::debug!("body {} created ({} total)", id.raw(), self.bodies.len());
        Ok(id)
    }

    /// Remove a body. Swap-remove keeps the table dense; the displaced
    /// body's index entry is patched.
    pub fn remove_body(&mut self, id: BodyId) -> Result<()> {
        let slot = self.index.remove(&id).ok_or(Error::BodyNotFound(id))?;
        self.bodies.swap_remove(slot);
        if let Some(moved) = self.bodies.get(slot) {
            self.index.insert(moved.id(), slot);
        }
        if let Some(grid) = &mut self.grid {
            grid.remove(id);
        }
        log::debug!("body {} removed ({} left)", id.raw(), self.bodies.len());
        Ok(())
    }

    #[inline]
    pub fn body(&self, id: BodyId) -> Option<&Body> {
        self.index.get(&id).map(|&i| &self.bodies[i])
    }

    /// Mutable access. Direct position writes are picked up at the next
    /// `update` when the grid is rebuilt.
    #[inline]
    pub fn body_mut(&mut self, id: BodyId) -> Option<&mut Body> {
        self.index.get(&id).map(|&i| &mut self.bodies[i])
    }

    #[inline]
    pub fn bodies(&self) -> &[Body] {
        &self.bodies
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }

    /// Drop every body, field, queued event, and accumulated time. The
    /// configuration (and any attached pool) survives.
    pub fn reset(&mut self) {
        self.bodies.clear();
        self.index.clear();
        self.fields.clear();
        self.accumulator = 0.0;
        self.next_id = 1;
        if let Some(grid) = &mut self.grid {
            grid.rebuild(std::iter::empty());
        }
        while self.events_rx.try_recv().is_ok() {}
        log::info!("physics world reset");
    }

    // ========================================================================
    // STEP INPUTS
    // ========================================================================

    /// Replace the active field generators. Persist until replaced.
    pub fn set_fields(&mut self, fields: Vec<ForceField>) {
        self.fields = fields;
    }

    /// Offload bulk force batches to `pool` when the body count makes it
    /// worthwhile.
    pub fn attach_pool(&mut self, pool: Arc<TaskPool>) {
        self.pool = Some(pool);
    }

    pub fn detach_pool(&mut self) {
        self.pool = None;
    }

    /// Collisions emitted since the last drain, in resolution order.
    pub fn drain_events(&mut self) -> Vec<Collision> {
        self.events_rx.try_iter().collect()
    }

    // ========================================================================
    // STEPPING
    // ========================================================================

    /// Advance the simulation. `Some(dt)` feeds the accumulator with frame
    /// time; `None` forces exactly one fixed step's worth.
    pub fn update(&mut self, dt: Option<f32>, constraints: &[Constraint]) -> StepReport {
        let h = self.config.fixed_step;
        let elapsed = match dt {
            Some(v) if v.is_finite() && v >= 0.0 => v,
            Some(v) => {
                log::warn!("ignoring invalid frame dt {v}");
                0.0
            }
            None => h,
        };
        self.accumulator += elapsed;

        let mut report = StepReport::default();
        while self.accumulator >= h && report.substeps < self.config.max_substeps {
            self.substep(h, constraints, &mut report.collisions);
            self.accumulator -= h;
            report.consumed += h;
            report.substeps += 1;
        }
        if self.accumulator >= h {
            // Substep cap hit. Shed the whole-step backlog.
            log::debug!(
                "shedding {:.4}s of backlog after {} substeps",
                self.accumulator - h,
                report.substeps
            );
            self.accumulator = self.accumulator % h;
        }

        // Grid mirrors final positions between update calls.
        if report.substeps > 0 {
            if let Some(grid) = &mut self.grid {
                grid.rebuild(
                    self.bodies
                        .iter()
                        .filter(|b| b.active)
                        .map(|b| (b.id(), b.position)),
                );
            }
        }
        report
    }

    fn substep(&mut self, h: f32, constraints: &[Constraint], out: &mut Vec<Collision>) {
        self.force_pass();

        let params = IntegrateParams {
            gravity: self.config.gravity,
            damping: self.config.damping,
            max_speed: self.config.max_speed,
        };
        integrator::integrate_all(&mut self.bodies, &params, h);

        self.collision_pass(out);

        for body in &mut self.bodies {
            collision::apply_bounds(body, &self.config.bounds);
        }

        constraint::solve(
            &mut self.bodies,
            &self.index,
            constraints,
            self.config.constraint_iterations,
            h,
        );
    }

    /// Pairwise + field forces into every active body's accumulator, either
    /// inline or through the pool.
    fn force_pass(&mut self) {
        let actives: Vec<usize> = (0..self.bodies.len())
            .filter(|&i| self.bodies[i].active)
            .collect();
        if actives.is_empty() {
            return;
        }
        let positions: Vec<Vec3> = actives.iter().map(|&i| self.bodies[i].position).collect();
        let masses: Vec<f32> = actives.iter().map(|&i| self.bodies[i].mass).collect();
        let params = PairwiseParams {
            strength: self.config.interaction_strength,
            cutoff: self.config.interaction_cutoff,
        };

        let offload = self
            .pool
            .as_ref()
            .filter(|_| actives.len() >= POOL_OFFLOAD_MIN_BODIES);
        let forces = match offload {
            // Buffers move into the task; nothing is copied on the way out
            // either. Only a failed offload re-gathers from the body table.
            Some(pool) => match Self::offload_forces(
                pool,
                positions,
                masses,
                &self.config,
                params,
                &self.fields,
            ) {
                Some(forces) => forces,
                None => {
                    // Failed offload never loses the step: recompute inline.
                    let positions: Vec<Vec3> =
                        actives.iter().map(|&i| self.bodies[i].position).collect();
                    let masses: Vec<f32> =
                        actives.iter().map(|&i| self.bodies[i].mass).collect();
                    Self::inline_forces(&positions, &masses, &self.config, &params, &self.fields)
                }
            },
            None => Self::inline_forces(&positions, &masses, &self.config, &params, &self.fields),
        };

        for (slot, force) in actives.into_iter().zip(forces) {
            self.bodies[slot].apply_force(force);
        }
    }

    fn inline_forces(
        positions: &[Vec3],
        masses: &[f32],
        config: &WorldConfig,
        params: &PairwiseParams,
        fields: &[ForceField],
    ) -> Vec<Vec3> {
        let mut out = vec![Vec3::ZERO; positions.len()];
        match config.method {
            ForceMethod::Direct => forces::accumulate_direct(positions, masses, params, &mut out),
            ForceMethod::Grid => {
                forces::accumulate_grid(positions, masses, config.cell_size, params, &mut out)
            }
            ForceMethod::Hierarchical { theta } => {
                forces::accumulate_hierarchical(positions, masses, theta, params, &mut out)
            }
        }
        forces::apply_fields(positions, masses, fields, &mut out);
        out
    }

    /// Submit the batch and block on the handle. `None` means the task
    /// could not be queued or finally failed; the caller recomputes inline.
    fn offload_forces(
        pool: &Arc<TaskPool>,
        positions: Vec<Vec3>,
        masses: Vec<f32>,
        config: &WorldConfig,
        params: PairwiseParams,
        fields: &[ForceField],
    ) -> Option<Vec<Vec3>> {
        let payload = TaskPayload::ForceBatch {
            positions,
            masses,
            method: config.method,
            params,
            cell_size: config.cell_size,
            fields: fields.to_vec(),
        };
        let handle = match pool.submit(payload, Priority::High) {
            Ok(handle) => handle,
            Err(e) => {
                log::warn!("force batch not queued ({e}); computing inline");
                return None;
            }
        };
        match handle.wait() {
            Ok(TaskResult::Forces(forces)) => Some(forces),
            Ok(other) => {
                log::error!("force batch returned a mismatched result: {other:?}");
                None
            }
            Err(e) => {
                log::error!("force batch failed ({e}); computing inline");
                None
            }
        }
    }

    fn collision_pass(&mut self, out: &mut Vec<Collision>) {
        let candidates: Vec<(usize, usize)> = match &mut self.grid {
            Some(grid) => {
                grid.rebuild(
                    self.bodies
                        .iter()
                        .filter(|b| b.active)
                        .map(|b| (b.id(), b.position)),
                );
                grid.potential_pairs()
                    .into_iter()
                    .filter_map(|(a, b)| {
                        Some((*self.index.get(&a)?, *self.index.get(&b)?))
                    })
                    .collect()
            }
            None => {
                let n = self.bodies.len();
                (0..n).flat_map(|i| (i + 1..n).map(move |j| (i, j))).collect()
            }
        };

        let resolve = ResolveParams {
            slop: self.config.collision_slop,
            percent: self.config.collision_percent,
        };
        for (ia, ib) in candidates {
            let (a, b) = pair_mut(&mut self.bodies, ia, ib);
            if let Some(mut contact) = collision::detect_pair(a, b) {
                collision::resolve(a, b, &mut contact, &resolve);
                // Receiver is owned by the world; send cannot fail.
                let _ = self.events_tx.send(contact.clone());
                out.push(contact);
            }
        }
    }
}

/// Disjoint mutable borrows of two table slots.
#[inline]
fn pair_mut(bodies: &mut [Body], ia: usize, ib: usize) -> (&mut Body, &mut Body) {
    debug_assert_ne!(ia, ib);
    if ia < ib {
        let (left, right) = bodies.split_at_mut(ib);
        (&mut left[ia], &mut right[0])
    } else {
        let (left, right) = bodies.split_at_mut(ia);
        let (b, a) = (&mut left[ib], &mut right[0]);
        (a, b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::PoolConfig;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    fn init_logs() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn quiet_config() -> WorldConfig {
        WorldConfig {
            gravity: Vec3::ZERO,
            interaction_strength: 0.0,
            ..Default::default()
        }
    }

    fn ball(position: Vec3, velocity: Vec3, radius: f32, restitution: f32) -> BodyDesc {
        BodyDesc {
            position,
            velocity,
            mass: 1.0,
            radius,
            restitution,
            ..Default::default()
        }
    }

    #[test]
    fn create_respects_ceiling() {
        let mut world = PhysicsWorld::new(WorldConfig {
            max_bodies: 2,
            ..quiet_config()
        })
        .unwrap();
        world.create_body(BodyDesc::default()).unwrap();
        world.create_body(BodyDesc::default()).unwrap();
        let err = world.create_body(BodyDesc::default()).unwrap_err();
        assert_eq!(err, Error::BodyLimit { limit: 2 });
    }

    #[test]
    fn swap_remove_keeps_lookups_valid() {
        let mut world = PhysicsWorld::new(quiet_config()).unwrap();
        let a = world.create_body(ball(Vec3::X, Vec3::ZERO, 0.0, 0.5)).unwrap();
        let b = world.create_body(ball(Vec3::Y, Vec3::ZERO, 0.0, 0.5)).unwrap();
        let c = world.create_body(ball(Vec3::Z, Vec3::ZERO, 0.0, 0.5)).unwrap();

        world.remove_body(b).unwrap();
        assert_eq!(world.len(), 2);
        assert_eq!(world.body(a).unwrap().position, Vec3::X);
        assert_eq!(world.body(c).unwrap().position, Vec3::Z);
        assert!(world.body(b).is_none());
        assert_eq!(world.remove_body(b).unwrap_err(), Error::BodyNotFound(b));
    }

    #[test]
    fn accumulator_takes_whole_steps_and_sheds_backlog() {
        let mut world = PhysicsWorld::new(WorldConfig {
            max_substeps: 5,
            ..quiet_config()
        })
        .unwrap();
        let h = world.config().fixed_step;

        let report = world.update(Some(2.5 * h), &[]);
        assert_eq!(report.substeps, 2);
        assert!((report.consumed - 2.0 * h).abs() < 1e-6);

        // A huge frame is capped; the backlog is shed, not banked.
        let report = world.update(Some(100.0), &[]);
        assert_eq!(report.substeps, 5);
        let next = world.update(Some(0.0), &[]);
        assert!(next.substeps <= 1);
    }

    #[test]
    fn none_dt_advances_exactly_one_step() {
        let mut world = PhysicsWorld::new(quiet_config()).unwrap();
        let id = world
            .create_body(ball(Vec3::ZERO, Vec3::X, 0.0, 0.5))
            .unwrap();
        let report = world.update(None, &[]);
        assert_eq!(report.substeps, 1);
        let h = world.config().fixed_step;
        let x = world.body(id).unwrap().position.x;
        assert!((x - h).abs() < 1e-6);
    }

    #[test]
    fn two_equal_spheres_exchange_velocities() {
        // Head-on elastic contact: unit-mass spheres, r = 1, e = 1, launched
        // at -1 and +1 from +3 and -3 on the x axis. After contact the
        // velocities swap.
        init_logs();
        let mut world = PhysicsWorld::new(quiet_config()).unwrap();
        let a = world
            .create_body(ball(Vec3::new(3.0, 0.0, 0.0), Vec3::new(-1.0, 0.0, 0.0), 1.0, 1.0))
            .unwrap();
        let b = world
            .create_body(ball(Vec3::new(-3.0, 0.0, 0.0), Vec3::new(1.0, 0.0, 0.0), 1.0, 1.0))
            .unwrap();

        let mut contacts = 0;
        for _ in 0..200 {
            contacts += world.update(None, &[]).collisions.len();
        }
        assert!(contacts > 0, "spheres never touched");

        let va = world.body(a).unwrap().velocity;
        let vb = world.body(b).unwrap().velocity;
        assert!((va.x - 1.0).abs() < 1e-4, "va = {va:?}");
        assert!((vb.x + 1.0).abs() < 1e-4, "vb = {vb:?}");
        assert!(va.y.abs() < 1e-6 && va.z.abs() < 1e-6);
    }

    #[test]
    fn separation_never_shrinks_once_apart() {
        // Inelastic head-on contact: after resolution makes the velocities
        // point apart, the pair's separation is non-decreasing.
        let mut world = PhysicsWorld::new(quiet_config()).unwrap();
        let a = world
            .create_body(ball(Vec3::new(1.2, 0.0, 0.0), Vec3::new(-2.0, 0.0, 0.0), 1.0, 0.5))
            .unwrap();
        let b = world
            .create_body(ball(Vec3::new(-1.2, 0.0, 0.0), Vec3::new(2.0, 0.0, 0.0), 1.0, 0.5))
            .unwrap();

        let gap = |world: &PhysicsWorld| {
            world.body(a).unwrap().position.distance(world.body(b).unwrap().position)
        };
        let separating = |world: &PhysicsWorld| {
            let (ba, bb) = (world.body(a).unwrap(), world.body(b).unwrap());
            (bb.velocity - ba.velocity).dot((bb.position - ba.position).normalize()) >= 0.0
        };

        let mut prev: Option<f32> = None;
        for _ in 0..120 {
            world.update(None, &[]);
            if separating(&world) {
                let d = gap(&world);
                if let Some(p) = prev {
                    assert!(d >= p - 1e-5, "separation shrank: {p} -> {d}");
                }
                prev = Some(d);
            }
        }
        assert!(prev.is_some(), "pair never reached a separating state");
    }

    #[test]
    fn momentum_is_conserved_without_external_forces() {
        let mut world = PhysicsWorld::new(WorldConfig {
            interaction_strength: 0.05,
            interaction_cutoff: Some(50.0),
            ..quiet_config()
        })
        .unwrap();
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..24 {
            world
                .create_body(BodyDesc {
                    position: Vec3::new(
                        rng.gen_range(-20.0..20.0),
                        rng.gen_range(-20.0..20.0),
                        rng.gen_range(-20.0..20.0),
                    ),
                    velocity: Vec3::new(
                        rng.gen_range(-1.0..1.0),
                        rng.gen_range(-1.0..1.0),
                        rng.gen_range(-1.0..1.0),
                    ),
                    mass: rng.gen_range(0.5..3.0),
                    radius: 0.2,
                    restitution: 1.0,
                    ..Default::default()
                })
                .unwrap();
        }

        let momentum = |world: &PhysicsWorld| -> Vec3 {
            world.bodies().iter().map(|b| b.velocity * b.mass).sum()
        };
        let before = momentum(&world);
        for _ in 0..60 {
            world.update(None, &[]);
        }
        let after = momentum(&world);
        assert!(
            (after - before).length() < 1e-3,
            "momentum drifted from {before:?} to {after:?}"
        );
    }

    #[test]
    fn identical_inputs_give_identical_trajectories() {
        let build = || {
            let mut world = PhysicsWorld::new(WorldConfig {
                method: ForceMethod::Grid,
                cell_size: 4.0,
                interaction_strength: 0.1,
                interaction_cutoff: Some(8.0),
                gravity: Vec3::new(0.0, -9.81, 0.0),
                ..Default::default()
            })
            .unwrap();
            let mut rng = StdRng::seed_from_u64(99);
            for _ in 0..50 {
                world
                    .create_body(BodyDesc {
                        position: Vec3::new(
                            rng.gen_range(-30.0..30.0),
                            rng.gen_range(-30.0..30.0),
                            rng.gen_range(-30.0..30.0),
                        ),
                        mass: rng.gen_range(0.5..2.0),
                        radius: 0.5,
                        ..Default::default()
                    })
                    .unwrap();
            }
            world
        };

        let mut left = build();
        let mut right = build();
        for _ in 0..30 {
            left.update(None, &[]);
            right.update(None, &[]);
        }
        for (a, b) in left.bodies().iter().zip(right.bodies()) {
            assert_eq!(a.position, b.position);
            assert_eq!(a.velocity, b.velocity);
        }
    }

    #[test]
    fn bodies_stay_inside_bounds() {
        let mut world = PhysicsWorld::new(WorldConfig {
            gravity: Vec3::new(0.0, -50.0, 0.0),
            bounds: crate::config::Bounds {
                min: Vec3::splat(-10.0),
                max: Vec3::splat(10.0),
            },
            interaction_strength: 0.0,
            ..Default::default()
        })
        .unwrap();
        let mut rng = StdRng::seed_from_u64(5);
        for _ in 0..16 {
            world
                .create_body(BodyDesc {
                    position: Vec3::new(
                        rng.gen_range(-9.0..9.0),
                        rng.gen_range(-9.0..9.0),
                        rng.gen_range(-9.0..9.0),
                    ),
                    velocity: Vec3::new(
                        rng.gen_range(-30.0..30.0),
                        rng.gen_range(-30.0..30.0),
                        rng.gen_range(-30.0..30.0),
                    ),
                    mass: 1.0,
                    radius: 0.5,
                    restitution: 0.9,
                    ..Default::default()
                })
                .unwrap();
        }

        for _ in 0..240 {
            world.update(None, &[]);
            for body in world.bodies() {
                assert!(
                    world.config().bounds.contains(body.position),
                    "escaped: {:?}",
                    body.position
                );
            }
        }
    }

    #[test]
    fn fields_push_bodies() {
        let mut world = PhysicsWorld::new(quiet_config()).unwrap();
        let id = world
            .create_body(ball(Vec3::ZERO, Vec3::ZERO, 0.0, 0.5))
            .unwrap();
        world.set_fields(vec![ForceField::Wind {
            direction: Vec3::X,
            strength: 10.0,
        }]);
        for _ in 0..30 {
            world.update(None, &[]);
        }
        assert!(world.body(id).unwrap().velocity.x > 0.0);
    }

    #[test]
    fn constraints_run_inside_update() {
        let mut world = PhysicsWorld::new(quiet_config()).unwrap();
        let a = world
            .create_body(ball(Vec3::ZERO, Vec3::ZERO, 0.0, 0.5))
            .unwrap();
        let b = world
            .create_body(ball(Vec3::new(5.0, 0.0, 0.0), Vec3::ZERO, 0.0, 0.5))
            .unwrap();
        let link = vec![Constraint::Distance {
            a,
            b,
            target: 2.0,
            stiffness: 1.0,
        }];

        for _ in 0..120 {
            world.update(None, &link);
        }
        let gap = (world.body(a).unwrap().position - world.body(b).unwrap().position).length();
        assert!((gap - 2.0).abs() < 0.05, "gap = {gap}");
    }

    #[test]
    fn events_mirror_reported_collisions() {
        let mut world = PhysicsWorld::new(quiet_config()).unwrap();
        world
            .create_body(ball(Vec3::new(0.4, 0.0, 0.0), Vec3::ZERO, 0.5, 0.0))
            .unwrap();
        world
            .create_body(ball(Vec3::new(-0.4, 0.0, 0.0), Vec3::ZERO, 0.5, 0.0))
            .unwrap();

        let report = world.update(None, &[]);
        assert!(!report.collisions.is_empty());
        let events = world.drain_events();
        assert_eq!(events.len(), report.collisions.len());
        assert!(world.drain_events().is_empty());
    }

    #[test]
    fn pooled_and_inline_force_passes_agree() {
        init_logs();
        let seed_bodies = |world: &mut PhysicsWorld| {
            let mut rng = StdRng::seed_from_u64(7);
            for _ in 0..POOL_OFFLOAD_MIN_BODIES + 8 {
                world
                    .create_body(BodyDesc {
                        position: Vec3::new(
                            rng.gen_range(-50.0..50.0),
                            rng.gen_range(-50.0..50.0),
                            rng.gen_range(-50.0..50.0),
                        ),
                        mass: rng.gen_range(0.5..2.0),
                        ..Default::default()
                    })
                    .unwrap();
            }
        };
        let config = WorldConfig {
            interaction_strength: 0.01,
            interaction_cutoff: Some(10.0),
            bounds: crate::config::Bounds {
                min: Vec3::splat(-200.0),
                max: Vec3::splat(200.0),
            },
            ..Default::default()
        };

        let mut inline = PhysicsWorld::new(config.clone()).unwrap();
        seed_bodies(&mut inline);

        let mut pooled = PhysicsWorld::new(config).unwrap();
        seed_bodies(&mut pooled);
        let pool = Arc::new(TaskPool::new(PoolConfig::default()).unwrap());
        pooled.attach_pool(Arc::clone(&pool));

        for _ in 0..5 {
            inline.update(None, &[]);
            pooled.update(None, &[]);
        }
        for (a, b) in inline.bodies().iter().zip(pooled.bodies()) {
            assert_eq!(a.position, b.position);
            assert_eq!(a.velocity, b.velocity);
        }
        assert!(pool.stats().completed >= 5);
    }

    #[test]
    fn reset_clears_everything_but_config() {
        let mut world = PhysicsWorld::new(quiet_config()).unwrap();
        world
            .create_body(ball(Vec3::new(0.4, 0.0, 0.0), Vec3::ZERO, 0.5, 0.0))
            .unwrap();
        world
            .create_body(ball(Vec3::new(-0.4, 0.0, 0.0), Vec3::ZERO, 0.5, 0.0))
            .unwrap();
        world.set_fields(vec![ForceField::Wind {
            direction: Vec3::X,
            strength: 1.0,
        }]);
        world.update(None, &[]);

        world.reset();
        assert!(world.is_empty());
        assert!(world.drain_events().is_empty());
        let report = world.update(Some(1.0), &[]);
        assert!(report.collisions.is_empty());
    }
}
