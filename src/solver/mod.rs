pub mod backtrack;
pub mod greedy;

use std::collections::HashMap;

use tracing::{debug, info};

use crate::model::{Assignment, Item, UsageGrid, Weights};

/// One placement question: can these pods share the pool, and how?
pub struct SolveInput<'a> {
    /// Demand vector per pod, in request order.
    pub weights: &'a [Weights],
    /// Capacity of a single GPU; all GPUs are identical.
    pub capacity: &'a [u32],
    pub gpus: usize,
    /// Pre-existing usage per GPU. `None` means an empty pool.
    pub initial: Option<&'a [Weights]>,
}

/// Answer to a placement question. Infeasibility is an answer, not an
/// error; genuine errors are caught at the configuration boundary before
/// the engine ever runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Placement {
    Fit(Assignment),
    Infeasible,
}

impl Placement {
    pub fn is_fit(&self) -> bool {
        matches!(self, Self::Fit(_))
    }

    pub fn assignment(&self) -> Option<&Assignment> {
        match self {
            Self::Fit(assignment) => Some(assignment),
            Self::Infeasible => None,
        }
    }
}

/// Cache key with deep equality over the whole question. Two equal keys
/// describe behaviourally identical inputs, so no digest is needed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct SolveKey {
    weights: Vec<Weights>,
    capacity: Weights,
    gpus: usize,
    initial: Vec<Weights>,
}

impl SolveKey {
    fn of(input: &SolveInput<'_>) -> Self {
        Self {
            weights: input.weights.to_vec(),
            capacity: input.capacity.to_vec(),
            gpus: input.gpus,
            initial: input.initial.map(<[_]>::to_vec).unwrap_or_default(),
        }
    }
}

/// Owns the memo tables for one configuration.
///
/// Created by the entry point and passed down by reference, so tests stay
/// isolated and several configurations can coexist in one process. Both
/// tables grow monotonically; there is no eviction. Negative answers are
/// cached too, which is what lets the slack enumerator prune whole count
/// ranges in O(1) per repeat query.
#[derive(Debug, Default)]
pub struct SolverContext {
    placements: HashMap<SolveKey, Placement>,
    feasibility: HashMap<String, bool>,
}

impl SolverContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct placement questions answered so far.
    pub fn placements_cached(&self) -> usize {
        self.placements.len()
    }

    pub(crate) fn feasibility_entry(&self, key: &str) -> Option<bool> {
        self.feasibility.get(key).copied()
    }

    pub(crate) fn record_feasibility(&mut self, key: String, feasible: bool) {
        self.feasibility.insert(key, feasible);
    }

    /// Decide whether the pods in `input` fit, and where.
    ///
    /// Tries, in order: the cache, aggregate-demand rejection, the trivial
    /// one-pod-per-GPU layout, first-fit-decreasing, and finally the
    /// complete backtracking search. The answer, either way, is cached
    /// under the full input.
    pub fn solve(&mut self, input: &SolveInput<'_>) -> Placement {
        let key = SolveKey::of(input);
        if let Some(hit) = self.placements.get(&key) {
            debug!(pods = input.weights.len(), "placement served from cache");
            return hit.clone();
        }

        let answer = solve_uncached(input);
        self.placements.insert(key, answer.clone());
        answer
    }
}

fn solve_uncached(input: &SolveInput<'_>) -> Placement {
    let grid = match input.initial {
        Some(used) => UsageGrid::with_initial(input.capacity.to_vec(), used.to_vec()),
        None => UsageGrid::new(input.capacity.to_vec(), input.gpus),
    };

    if exceeds_pool_capacity(input.weights, &grid) {
        info!(
            pods = input.weights.len(),
            gpus = input.gpus,
            "aggregate demand exceeds pool capacity"
        );
        return Placement::Infeasible;
    }

    if let Some(assignment) = one_per_gpu(input.weights, &grid) {
        debug!(pods = input.weights.len(), "one pod per GPU suffices");
        return Placement::Fit(assignment);
    }

    let items = Item::rank_by_weight(input.weights);

    let mut attempt = grid.clone();
    if let Some(assignment) = greedy::first_fit_decreasing(&items, &mut attempt) {
        debug!("first-fit-decreasing found a placement");
        return Placement::Fit(assignment);
    }

    let mut attempt = grid;
    match backtrack::search(&items, &mut attempt) {
        Some(assignment) => {
            debug!("backtracking found a placement");
            Placement::Fit(assignment)
        }
        None => {
            info!(pods = input.weights.len(), "no placement exists");
            Placement::Infeasible
        }
    }
}

/// Fast reject: one dimension whose total demand exceeds the pool's total
/// spare capacity dooms every arrangement.
fn exceeds_pool_capacity(weights: &[Weights], grid: &UsageGrid) -> bool {
    let spare = grid.remaining_total();
    let mut demand = vec![0u64; grid.dimensions()];
    for pod in weights {
        for (d, w) in pod.iter().enumerate() {
            demand[d] += u64::from(*w);
        }
    }
    demand.iter().zip(&spare).any(|(need, have)| need > have)
}

/// Fast accept: with at least as many usable GPUs as pods, try giving every
/// pod its own GPU, skipping GPUs it does not fit on. Falls through to the
/// real packers when the simple scan cannot place everything.
fn one_per_gpu(weights: &[Weights], grid: &UsageGrid) -> Option<Assignment> {
    let usable = (0..grid.gpus()).filter(|&g| grid.has_headroom(g)).count();
    if weights.len() > usable {
        return None;
    }

    let mut probe = grid.clone();
    let mut assignment: Assignment = vec![None; weights.len()];
    let mut next = 0;
    for (pod, pod_weights) in weights.iter().enumerate() {
        let slot = (next..probe.gpus()).find(|&g| probe.fits(g, pod_weights))?;
        probe.occupy(slot, pod_weights);
        assignment[pod] = Some(slot);
        next = slot + 1;
    }
    Some(assignment)
}
