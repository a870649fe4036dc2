use std::collections::BTreeMap;

use tracing::{debug, info};

use crate::model::Weights;
use crate::solver::{SolveInput, SolverContext};

/// Additional pods per type, on top of the base workload. A `BTreeMap`
/// keeps the types in lexicographic order, which is also the canonical
/// serialization order.
pub type Combination = BTreeMap<String, u32>;

/// How many extra pods of a single type the enumeration will consider.
pub const DEFAULT_CEILING: u32 = 20;

/// `type:count` pairs for the non-zero entries, comma-joined, in type
/// order. Both the feasibility cache key and the output ordering key.
pub fn canonical(combo: &Combination) -> String {
    combo
        .iter()
        .filter(|&(_, &count)| count > 0)
        .map(|(pod_type, count)| format!("{pod_type}:{count}"))
        .collect::<Vec<_>>()
        .join(",")
}

/// The fixed side of an enumeration: the workload that is already promised
/// and the pool it runs on.
pub struct SlackQuery<'a> {
    /// Pods already requested, per type.
    pub base: &'a BTreeMap<String, u32>,
    /// Type name to demand vector; defines the universe of types to try.
    pub mappings: &'a BTreeMap<String, Weights>,
    pub capacity: &'a [u32],
    pub gpus: usize,
    pub initial: Option<&'a [Weights]>,
    /// Per-type count ceiling, normally [`DEFAULT_CEILING`].
    pub ceiling: u32,
}

/// Enumerate every additional-pod combination that still fits on top of the
/// base workload, then keep only the maximal ones: combinations where one
/// more pod of any type no longer fits.
///
/// Counts per type run 0..=ceiling, depth-first over the type list. Weights
/// are non-negative, so feasibility is monotone in every count; the first
/// infeasible count for a type prunes all higher counts. The same
/// monotonicity is why cached negative answers are safe to reuse.
pub fn enumerate_maximal(ctx: &mut SolverContext, query: &SlackQuery<'_>) -> Vec<Combination> {
    let types: Vec<&String> = query.mappings.keys().collect();
    let mut feasible = Vec::new();
    let mut current = Combination::new();
    explore(ctx, query, &types, 0, &mut current, &mut feasible);
    info!(candidates = feasible.len(), "feasible combinations enumerated");

    let mut maximal: Vec<Combination> = feasible
        .into_iter()
        .filter(|combo| is_maximal(ctx, query, combo))
        .collect();
    maximal.sort_by_key(canonical);
    info!(maximal = maximal.len(), "maximal combinations kept");
    maximal
}

fn explore(
    ctx: &mut SolverContext,
    query: &SlackQuery<'_>,
    types: &[&String],
    depth: usize,
    current: &mut Combination,
    feasible: &mut Vec<Combination>,
) {
    let Some(pod_type) = types.get(depth) else {
        if fits(ctx, query, current) {
            feasible.push(current.clone());
        }
        return;
    };

    // Count zero first, then climb until the combination stops fitting.
    explore(ctx, query, types, depth + 1, current, feasible);
    for count in 1..=query.ceiling {
        current.insert((*pod_type).clone(), count);
        if !fits(ctx, query, current) {
            break;
        }
        explore(ctx, query, types, depth + 1, current, feasible);
    }
    current.remove(*pod_type);
}

/// A combination is maximal when one more pod of every type breaks it.
fn is_maximal(ctx: &mut SolverContext, query: &SlackQuery<'_>, combo: &Combination) -> bool {
    query.mappings.keys().all(|pod_type| {
        let mut extended = combo.clone();
        *extended.entry(pod_type.clone()).or_insert(0) += 1;
        !fits(ctx, query, &extended)
    })
}

/// Memoized "does base plus these additional pods fit" predicate.
fn fits(ctx: &mut SolverContext, query: &SlackQuery<'_>, combo: &Combination) -> bool {
    let key = canonical(combo);
    if let Some(hit) = ctx.feasibility_entry(&key) {
        return hit;
    }

    let mut weights: Vec<Weights> = Vec::new();
    for (pod_type, count) in query.base.iter().chain(combo.iter()) {
        let demand = &query.mappings[pod_type.as_str()];
        for _ in 0..*count {
            weights.push(demand.clone());
        }
    }

    let placement = ctx.solve(&SolveInput {
        weights: &weights,
        capacity: query.capacity,
        gpus: query.gpus,
        initial: query.initial,
    });
    let feasible = placement.is_fit();
    debug!(combination = %key, feasible, "slack probe");
    ctx.record_feasibility(key, feasible);
    feasible
}
