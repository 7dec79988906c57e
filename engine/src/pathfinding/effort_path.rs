//! Effort Pathfinding
//!
//! A* over the integer cells of a [`HeightField`] with a cost that punishes
//! elevation change. Each step from `cur` to `next` costs
//!
//! ```text
//! d + (slope_multiplier * |h(next) - h(cur)| / d) ^ slope_exponent + bridge
//! ```
//!
//! where `d` is the Euclidean step length (1 or √2) and `bridge` is an
//! occasional fixed penalty drawn from an injectable random source.
//!
//! The open set is a binary heap keyed on `(f, sequence)`: among equal `f`
//! the cell that entered the open set first is expanded first. Improved
//! cells are pushed again and stale heap entries are skipped on pop.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::RoadConfig;
use crate::terrain::HeightField;

/// Integer grid cell `(x, z)`.
pub type GridPoint = (usize, usize);

/// 8-connected neighbourhood, orthogonal first.
const NEIGHBOURS: [(isize, isize); 8] = [
    (1, 0),
    (-1, 0),
    (0, 1),
    (0, -1),
    (1, 1),
    (-1, -1),
    (1, -1),
    (-1, 1),
];

// ============================================================================
// COST MODEL
// ============================================================================

/// Occasional extra step cost.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BridgePenalty {
    /// Chance per evaluated step, in `[0, 1]`
    pub probability: f64,
    pub magnitude: f64,
}

/// Random source for the bridge penalty.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BridgeRoll {
    /// Never add the penalty
    Disabled,
    /// Reproducible sequence
    Seeded(u64),
    /// Seeded from OS entropy
    Entropy,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EffortCost {
    pub slope_multiplier: f64,
    pub slope_exponent: f64,
    pub bridge: BridgePenalty,
}

impl Default for EffortCost {
    fn default() -> Self {
        Self::from_config(&RoadConfig::default())
    }
}

impl EffortCost {
    pub fn from_config(config: &RoadConfig) -> Self {
        Self {
            slope_multiplier: config.slope_penalty_multiplier,
            slope_exponent: config.slope_penalty_exponent,
            bridge: BridgePenalty {
                probability: config.bridge_probability.clamp(0.0, 1.0),
                magnitude: config.bridge_cost,
            },
        }
    }

    /// Deterministic part of a step cost (distance + slope).
    pub fn base_step(&self, distance: f64, rise: f32) -> f64 {
        let d = if distance > 0.0 { distance } else { 1.0 };
        let slope = self.slope_multiplier * rise.abs() as f64 / d;
        distance + slope.powf(self.slope_exponent)
    }
}

// ============================================================================
// OPEN SET
// ============================================================================

#[derive(Debug)]
struct OpenEntry {
    f: f64,
    /// Order in which the cell entered the open set
    sequence: u64,
    cell: usize,
}

impl PartialEq for OpenEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for OpenEntry {}

impl PartialOrd for OpenEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OpenEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Lowest f first, then earliest sequence
        match other.f.total_cmp(&self.f) {
            Ordering::Equal => other.sequence.cmp(&self.sequence),
            ord => ord,
        }
    }
}

// ============================================================================
// PATHFINDER
// ============================================================================

/// Slope-aware A* pathfinder.
pub struct EffortPathfinder {
    cost: EffortCost,
    rng: Option<StdRng>,
}

impl EffortPathfinder {
    pub fn new(cost: EffortCost, roll: BridgeRoll) -> Self {
        let rng = match roll {
            BridgeRoll::Disabled => None,
            BridgeRoll::Seeded(seed) => Some(StdRng::seed_from_u64(seed)),
            BridgeRoll::Entropy => Some(StdRng::from_entropy()),
        };
        Self { cost, rng }
    }

    /// Pathfinder configured from the road section; a zero probability
    /// disables the penalty, a `bridge_seed` makes it reproducible.
    pub fn from_config(config: &RoadConfig) -> Self {
        let cost = EffortCost::from_config(config);
        let roll = if cost.bridge.probability <= 0.0 {
            BridgeRoll::Disabled
        } else {
            config.bridge_seed.map_or(BridgeRoll::Entropy, BridgeRoll::Seeded)
        };
        Self::new(cost, roll)
    }

    pub fn cost(&self) -> &EffortCost {
        &self.cost
    }

    fn bridge(&mut self) -> f64 {
        let BridgePenalty { probability, magnitude } = self.cost.bridge;
        let Some(rng) = self.rng.as_mut() else {
            return 0.0;
        };
        if probability > 0.0 && rng.gen_bool(probability) {
            magnitude
        } else {
            0.0
        }
    }

    /// Find a low-effort path between two (continuous) grid positions.
    ///
    /// Endpoints are rounded and clamped into the grid. The result starts at
    /// the start cell and ends at the goal cell; when the search exhausts
    /// without reaching the goal it falls back to `[start, goal]`.
    pub fn find_effort_path(
        &mut self,
        field: &HeightField,
        start: (f32, f32),
        end: (f32, f32),
    ) -> Vec<GridPoint> {
        let (w, h) = (field.width(), field.height());
        let start = snap(field, start);
        let goal = snap(field, end);
        if start == goal {
            return vec![start];
        }

        let index = |(x, z): GridPoint| z * w + x;
        let cell_of = |i: usize| (i % w, i / w);
        let heuristic = |(x, z): GridPoint| {
            let dx = x as f64 - goal.0 as f64;
            let dz = z as f64 - goal.1 as f64;
            dx.hypot(dz)
        };

        let n = w * h;
        let mut g_score = vec![f64::INFINITY; n];
        let mut f_score = vec![f64::INFINITY; n];
        let mut came_from: Vec<Option<usize>> = vec![None; n];
        let mut open_sequence: Vec<Option<u64>> = vec![None; n];
        let mut heap = BinaryHeap::new();
        let mut next_sequence = 0u64;

        let s = index(start);
        g_score[s] = 0.0;
        f_score[s] = heuristic(start);
        open_sequence[s] = Some(next_sequence);
        heap.push(OpenEntry {
            f: f_score[s],
            sequence: next_sequence,
            cell: s,
        });
        next_sequence += 1;

        let goal_index = index(goal);
        let mut expanded = 0usize;

        while let Some(entry) = heap.pop() {
            let current = entry.cell;
            if open_sequence[current] != Some(entry.sequence) || entry.f != f_score[current] {
                continue;
            }
            expanded += 1;

            if current == goal_index {
                let mut path = vec![cell_of(current)];
                let mut cursor = current;
                while let Some(prev) = came_from[cursor] {
                    path.push(cell_of(prev));
                    cursor = prev;
                }
                path.reverse();
                tracing::debug!(
                    "Effort path {:?} -> {:?}: {} cells, {} expansions, cost {:.2}",
                    start,
                    goal,
                    path.len(),
                    expanded,
                    g_score[current]
                );
                return path;
            }
            open_sequence[current] = None;

            let (cx, cz) = cell_of(current);
            let current_height = field.at(cx, cz);
            for (dx, dz) in NEIGHBOURS {
                let (Some(nx), Some(nz)) = (cx.checked_add_signed(dx), cz.checked_add_signed(dz)) else {
                    continue;
                };
                if nx >= w || nz >= h {
                    continue;
                }
                let distance = ((dx * dx + dz * dz) as f64).sqrt();
                let rise = field.at(nx, nz) - current_height;
                let tentative = g_score[current] + self.cost.base_step(distance, rise) + self.bridge();

                let next = index((nx, nz));
                if tentative < g_score[next] {
                    came_from[next] = Some(current);
                    g_score[next] = tentative;
                    f_score[next] = tentative + heuristic((nx, nz));
                    let sequence = *open_sequence[next].get_or_insert_with(|| {
                        next_sequence += 1;
                        next_sequence - 1
                    });
                    heap.push(OpenEntry {
                        f: f_score[next],
                        sequence,
                        cell: next,
                    });
                }
            }
        }

        tracing::warn!(
            "Effort path {:?} -> {:?} exhausted after {} expansions, using straight segment",
            start,
            goal,
            expanded
        );
        vec![start, goal]
    }
}

/// Round and clamp a continuous position to a grid cell.
fn snap(field: &HeightField, (x, z): (f32, f32)) -> GridPoint {
    let (x, z) = field.clamp_xz(x.round(), z.round());
    (x as usize, z as usize)
}

// ============================================================================
// PATH METRICS
// ============================================================================

/// Total Euclidean length of a cell path.
pub fn path_length(path: &[GridPoint]) -> f64 {
    path.windows(2)
        .map(|w| {
            let dx = w[1].0 as f64 - w[0].0 as f64;
            let dz = w[1].1 as f64 - w[0].1 as f64;
            dx.hypot(dz)
        })
        .sum()
}

/// Deterministic effort of a path (bridge penalties excluded).
pub fn path_cost(field: &HeightField, path: &[GridPoint], cost: &EffortCost) -> f64 {
    path.windows(2)
        .map(|w| {
            let dx = w[1].0 as f64 - w[0].0 as f64;
            let dz = w[1].1 as f64 - w[0].1 as f64;
            let rise = field.at(w[1].0, w[1].1) - field.at(w[0].0, w[0].1);
            cost.base_step(dx.hypot(dz), rise)
        })
        .sum()
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn pathfinder() -> EffortPathfinder {
        EffortPathfinder::new(EffortCost::default(), BridgeRoll::Disabled)
    }

    fn assert_connected(path: &[GridPoint]) {
        for w in path.windows(2) {
            let dx = w[0].0.abs_diff(w[1].0);
            let dz = w[0].1.abs_diff(w[1].1);
            assert!(dx <= 1 && dz <= 1 && (dx, dz) != (0, 0), "gap in {path:?}");
        }
    }

    #[test]
    fn test_same_start_and_end() {
        let field = HeightField::flat(5, 5, 0.0).unwrap();
        assert_eq!(pathfinder().find_effort_path(&field, (2.0, 3.0), (2.0, 3.0)), vec![(2, 3)]);
        // Both round and clamp to the same cell
        assert_eq!(pathfinder().find_effort_path(&field, (9.0, 9.0), (4.4, 4.4)), vec![(4, 4)]);
    }

    #[test]
    fn test_flat_diagonal_is_straight() {
        let field = HeightField::flat(10, 10, 3.0).unwrap();
        let path = pathfinder().find_effort_path(&field, (0.0, 0.0), (7.0, 7.0));
        assert_eq!(path.first(), Some(&(0, 0)));
        assert_eq!(path.last(), Some(&(7, 7)));
        assert_connected(&path);
        assert!((path_length(&path) - 7.0 * 2f64.sqrt()).abs() < 1e-9);
    }

    #[test]
    fn test_endpoints_are_clamped() {
        let field = HeightField::flat(4, 4, 0.0).unwrap();
        let path = pathfinder().find_effort_path(&field, (-3.0, -1.2), (10.0, 2.6));
        assert_eq!(path.first(), Some(&(0, 0)));
        assert_eq!(path.last(), Some(&(3, 3)));
    }

    #[test]
    fn test_slope_cost_grows_with_rise() {
        let cost = EffortCost::default();
        assert_eq!(cost.base_step(1.0, 0.0), 1.0);
        let expected = 1.0 + 6f64.powf(2.2);
        assert!((cost.base_step(1.0, -1.0) - expected).abs() < 1e-9);
    }

    #[test]
    fn test_cost_constants_keep_config_precision() {
        let cost = EffortCost::from_config(&RoadConfig::default());
        assert_eq!(cost.slope_exponent, 2.2);
        assert_eq!(cost.slope_multiplier, 6.0);
        assert_eq!(cost.bridge.magnitude, 5.0);
    }

    #[test]
    fn test_bridge_roll_respects_probability() {
        let mut cost = EffortCost::default();
        cost.bridge.probability = 1.0;
        let mut always = EffortPathfinder::new(cost, BridgeRoll::Seeded(7));
        assert!((0..20).all(|_| always.bridge() == 5.0));

        cost.bridge.probability = 0.0;
        let mut never = EffortPathfinder::new(cost, BridgeRoll::Seeded(7));
        assert!((0..20).all(|_| never.bridge() == 0.0));

        cost.bridge.probability = 1.0;
        let mut disabled = EffortPathfinder::new(cost, BridgeRoll::Disabled);
        assert_eq!(disabled.bridge(), 0.0);
    }

    #[test]
    fn test_seeded_bridge_is_reproducible() {
        let field = HeightField::from_fn(12, 12, |x, z| ((x * 7 + z * 3) % 5) as f32 * 0.1).unwrap();
        let mut cost = EffortCost::default();
        cost.bridge.probability = 0.5;
        let a = EffortPathfinder::new(cost, BridgeRoll::Seeded(42)).find_effort_path(&field, (0.0, 0.0), (11.0, 9.0));
        let b = EffortPathfinder::new(cost, BridgeRoll::Seeded(42)).find_effort_path(&field, (0.0, 0.0), (11.0, 9.0));
        assert_eq!(a, b);
        assert_connected(&a);
    }

    #[test]
    fn test_open_entry_orders_by_f_then_sequence() {
        let mut heap = BinaryHeap::new();
        heap.push(OpenEntry { f: 2.0, sequence: 0, cell: 0 });
        heap.push(OpenEntry { f: 1.0, sequence: 2, cell: 1 });
        heap.push(OpenEntry { f: 1.0, sequence: 1, cell: 2 });
        assert_eq!(heap.pop().map(|e| e.cell), Some(2));
        assert_eq!(heap.pop().map(|e| e.cell), Some(1));
        assert_eq!(heap.pop().map(|e| e.cell), Some(0));
    }

    #[test]
    fn test_path_cost_of_flat_path_is_length() {
        let field = HeightField::flat(5, 5, 1.0).unwrap();
        let path = vec![(0, 0), (1, 1), (2, 1)];
        let cost = path_cost(&field, &path, &EffortCost::default());
        assert!((cost - path_length(&path)).abs() < 1e-9);
    }
}
