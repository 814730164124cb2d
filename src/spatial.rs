// src/spatial.rs
//! Spatial hash grid — the broad phase.
//!
//! Divides space into uniform cubic cells keyed by the integer-quantized
//! position. `rebuild` is O(n); radius queries scan only the cells within
//! `ceil(r / cell_size)` of the query cell, giving average O(k) for k nearby
//! bodies (worst-case O(n) when the cell size is badly mis-tuned relative
//! to the query radius).
//!
//! `potential_pairs` is the collision broad phase: it trades false positives
//! (same cell, but farther apart than the combined radius) for zero false
//! negatives whenever `cell_size >= 2 * max body radius`.

use std::collections::{HashMap, HashSet};

use glam::Vec3;

use crate::body::BodyId;
use crate::{Error, Result};

type CellKey = (i32, i32, i32);

/// Uniform spatial hash over body positions.
pub struct SpatialGrid {
    cell_size: f32,
    inv_cell_size: f32,
    cells: HashMap<CellKey, Vec<BodyId>>,
    /// Mirror of every body's current cell, for O(1) incremental removal.
    locations: HashMap<BodyId, CellKey>,
}

impl SpatialGrid {
    /// Create a grid. A cell size of zero or below is a configuration
    /// error, not a runtime recoverable case.
    pub fn new(cell_size: f32) -> Result<Self> {
        if !(cell_size > 0.0) || !cell_size.is_finite() {
            return Err(Error::config(format!(
                "spatial grid cell size must be finite and > 0, got {cell_size}"
            )));
        }
        Ok(Self {
            cell_size,
            inv_cell_size: 1.0 / cell_size,
            cells: HashMap::new(),
            locations: HashMap::new(),
        })
    }

    #[inline(always)]
    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    #[inline(always)]
    fn key_for(&self, p: Vec3) -> CellKey {
        (
            (p.x * self.inv_cell_size).floor() as i32,
            (p.y * self.inv_cell_size).floor() as i32,
            (p.z * self.inv_cell_size).floor() as i32,
        )
    }

    /// Clear and re-insert all bodies by current position. O(n).
    /// Retains cell allocations for reuse across steps.
    pub fn rebuild<I>(&mut self, positions: I)
    where
        I: IntoIterator<Item = (BodyId, Vec3)>,
    {
        for cell in self.cells.values_mut() {
            cell.clear();
        }
        self.locations.clear();
        for (id, pos) in positions {
            self.insert(id, pos);
        }
    }

    /// Insert one body. Incremental counterpart of `rebuild` used by body CRUD.
    pub fn insert(&mut self, id: BodyId, position: Vec3) {
        let key = self.key_for(position);
        self.cells.entry(key).or_default().push(id);
        self.locations.insert(id, key);
    }

    /// Remove one body. No-op if absent.
    pub fn remove(&mut self, id: BodyId) {
        if let Some(key) = self.locations.remove(&id) {
            if let Some(cell) = self.cells.get_mut(&key) {
                cell.retain(|&member| member != id);
            }
        }
    }

    /// Total number of indexed bodies.
    pub fn len(&self) -> usize {
        self.locations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }

    /// All bodies within `radius` of `point` (inclusive), by exact distance,
    /// scanning only the `ceil(radius / cell_size)` ring of cells.
    ///
    /// `position_of` resolves a member id to its current position; members it
    /// cannot resolve are skipped.
    pub fn query_radius<F>(&self, point: Vec3, radius: f32, position_of: F) -> Vec<BodyId>
    where
        F: Fn(BodyId) -> Option<Vec3>,
    {
        let mut out = Vec::new();
        let reach = (radius * self.inv_cell_size).ceil() as i32;
        let center = self.key_for(point);
        let r_sq = radius * radius;

        for dx in -reach..=reach {
            for dy in -reach..=reach {
                for dz in -reach..=reach {
                    let key = (center.0 + dx, center.1 + dy, center.2 + dz);
                    let Some(cell) = self.cells.get(&key) else { continue };
                    for &id in cell {
                        if let Some(pos) = position_of(id) {
                            if pos.distance_squared(point) <= r_sq {
                                out.push(id);
                            }
                        }
                    }
                }
            }
        }
        out
    }

    /// `query_radius` around a body's own position, excluding the body itself.
    pub fn query_neighbors<F>(
        &self,
        id: BodyId,
        position: Vec3,
        radius: f32,
        position_of: F,
    ) -> Vec<BodyId>
    where
        F: Fn(BodyId) -> Option<Vec3>,
    {
        let mut out = self.query_radius(position, radius, position_of);
        out.retain(|&other| other != id);
        out
    }

    /// Unique unordered candidate pairs from same or adjacent cells.
    ///
    /// Each cell is paired against itself and the forward half of its 26-cell
    /// neighborhood, so every pair of bodies within one cell length of each
    /// other is reported exactly once (an ordered-pair dedup key guards the
    /// degenerate multi-shared-cell case). No false negatives as long as
    /// `cell_size >= r_a + r_b` for every pair, i.e. `cell_size >= 2 * max radius`.
    pub fn potential_pairs(&self) -> Vec<(BodyId, BodyId)> {
        // Forward half-neighborhood: strictly "greater" offsets only, so each
        // cross-cell pairing is visited from exactly one side.
        const FORWARD: [(i32, i32, i32); 13] = [
            (1, 0, 0),
            (-1, 1, 0),
            (0, 1, 0),
            (1, 1, 0),
            (-1, -1, 1),
            (0, -1, 1),
            (1, -1, 1),
            (-1, 0, 1),
            (0, 0, 1),
            (1, 0, 1),
            (-1, 1, 1),
            (0, 1, 1),
            (1, 1, 1),
        ];

        let mut seen: HashSet<(BodyId, BodyId)> = HashSet::new();
        let mut pairs = Vec::new();
        let mut push = |a: BodyId, b: BodyId, out: &mut Vec<(BodyId, BodyId)>| {
            let key = if a < b { (a, b) } else { (b, a) };
            if seen.insert(key) {
                out.push(key);
            }
        };

        for (&key, cell) in &self.cells {
            // Within-cell pairs.
            for i in 0..cell.len() {
                for j in (i + 1)..cell.len() {
                    push(cell[i], cell[j], &mut pairs);
                }
            }
            // Cross-cell pairs against the forward neighborhood.
            for (dx, dy, dz) in FORWARD {
                let neighbor = (key.0 + dx, key.1 + dy, key.2 + dz);
                let Some(other) = self.cells.get(&neighbor) else { continue };
                for &a in cell {
                    for &b in other {
                        push(a, b, &mut pairs);
                    }
                }
            }
        }
        // Hash-map iteration order is not stable across grid instances; the
        // resolver consumes pairs in emission order, so sort for determinism.
        pairs.sort_unstable();
        pairs
    }
}
