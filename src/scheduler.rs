use std::collections::BTreeMap;

use tracing::{info, warn};

use crate::config::{Config, PodRequest, PodSpec};
use crate::model::{Assignment, Weights};
use crate::slack::{self, Combination, DEFAULT_CEILING, SlackQuery};
use crate::solver::{Placement, SolveInput, SolverContext};
use crate::timeline::{self, Replay, TimedPod};

/// Run the workload described by `cfg` and print the outcome.
///
/// The configuration is already validated, so nothing here can fail:
/// infeasible workloads complete normally with the standard message, and
/// only the process exit code distinguishes configuration errors (handled
/// upstream) from answered questions.
pub fn run(cfg: &Config) {
    match &cfg.pods {
        PodRequest::Counts(counts) => run_static(cfg, counts),
        PodRequest::Timeline(specs) => run_timeline(cfg, specs),
    }
}

/// Static-count path: one placement question, then the slack enumeration.
fn run_static(cfg: &Config, counts: &BTreeMap<String, u32>) {
    let requests = expand_counts(counts);
    let weights: Vec<Weights> = requests
        .iter()
        .map(|pod_type| cfg.gpu.mappings[pod_type.as_str()].clone())
        .collect();
    let initial = cfg.initial_usage();
    info!(
        pods = requests.len(),
        gpus = cfg.gpu.number,
        "placing static workload"
    );

    let mut ctx = SolverContext::new();
    let placement = ctx.solve(&SolveInput {
        weights: &weights,
        capacity: &cfg.gpu.capacity,
        gpus: cfg.gpu.number,
        initial: Some(&initial),
    });

    let Placement::Fit(assignment) = placement else {
        println!("No valid assignment found.");
        return;
    };

    println!("GPU Assignment:");
    print!("{}", render_layout(cfg, &requests, &assignment));

    let query = SlackQuery {
        base: counts,
        mappings: &cfg.gpu.mappings,
        capacity: &cfg.gpu.capacity,
        gpus: cfg.gpu.number,
        initial: Some(&initial),
        ceiling: DEFAULT_CEILING,
    };
    let maximal = slack::enumerate_maximal(&mut ctx, &query);
    print!("{}", render_combinations(&maximal));
}

/// Timeline path: replay the schedule online, then show the final layout.
fn run_timeline(cfg: &Config, specs: &[PodSpec]) {
    let pods: Vec<TimedPod> = specs
        .iter()
        .enumerate()
        .map(|(index, spec)| TimedPod {
            index,
            type_name: spec.pod_type.clone(),
            weights: cfg.gpu.mappings[spec.pod_type.as_str()].clone(),
            add_time: spec.add_time,
            remove_time: spec.remove_time,
        })
        .collect();
    let initial = cfg.initial_usage();
    info!(
        pods = pods.len(),
        gpus = cfg.gpu.number,
        "replaying timeline workload"
    );

    let replayed = timeline::replay(
        &pods,
        &cfg.gpu.capacity,
        cfg.gpu.number,
        Some(&initial),
        cfg.gpu.quota.as_ref(),
    );

    match replayed {
        Replay::Completed { assignment, .. } => {
            let names: Vec<String> = specs.iter().map(|s| s.pod_type.clone()).collect();
            println!("Final GPU Assignment:");
            print!("{}", render_layout(cfg, &names, &assignment));
        }
        Replay::OutOfCapacity { time, item } => {
            warn!(time, pod = %specs[item].pod_type, "schedule ran out of capacity");
            println!("No valid assignment found.");
        }
    }
}

/// One request per pod. Types come out of the `BTreeMap` in name order, so
/// the expansion order, which is the item identity, is deterministic.
fn expand_counts(counts: &BTreeMap<String, u32>) -> Vec<String> {
    counts
        .iter()
        .flat_map(|(pod_type, &count)| std::iter::repeat_n(pod_type.clone(), count as usize))
        .collect()
}

/// GPUs in ascending index order, each with its pod names in assignment
/// order. Initial-state pods come first on their GPU, then newly placed
/// ones.
fn render_layout(cfg: &Config, names: &[String], assignment: &Assignment) -> String {
    let mut out = String::new();
    for gpu in 0..cfg.gpu.number {
        let mut on_gpu: Vec<&str> = Vec::new();
        if let Some(state) = &cfg.gpu.initial_state {
            if let Some(pods) = state.get(&gpu) {
                on_gpu.extend(pods.iter().map(String::as_str));
            }
        }
        on_gpu.extend(
            assignment
                .iter()
                .enumerate()
                .filter(|(_, slot)| **slot == Some(gpu))
                .map(|(pod, _)| names[pod].as_str()),
        );

        if on_gpu.is_empty() {
            out.push_str(&format!("GPU {gpu}: (empty)\n"));
        } else {
            out.push_str(&format!("GPU {gpu}: {}\n", on_gpu.join(", ")));
        }
    }
    out
}

/// Numbered maximal combinations, one per line, already in canonical order.
fn render_combinations(maximal: &[Combination]) -> String {
    let mut out = String::new();
    out.push('\n');
    out.push_str("Additional Pod Combinations:\n");
    for (i, combination) in maximal.iter().enumerate() {
        let parts: Vec<String> = combination
            .iter()
            .filter(|&(_, &count)| count > 0)
            .map(|(pod_type, count)| format!("{pod_type}: {count}"))
            .collect();
        if parts.is_empty() {
            out.push_str(&format!("{}. No additional pods can be added\n", i + 1));
        } else {
            out.push_str(&format!("{}. {}\n", i + 1, parts.join(", ")));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GpuPool;

    fn config(gpus: usize, initial: Option<BTreeMap<usize, Vec<String>>>) -> Config {
        Config {
            gpu: GpuPool {
                number: gpus,
                capacity: vec![8, 8],
                mappings: BTreeMap::from([
                    ("big".to_string(), vec![4, 4]),
                    ("small".to_string(), vec![2, 2]),
                ]),
                quota: None,
                initial_state: initial,
            },
            pods: PodRequest::Counts(BTreeMap::new()),
        }
    }

    #[test]
    fn counts_expand_in_type_order() {
        let counts = BTreeMap::from([("small".to_string(), 2), ("big".to_string(), 1)]);
        assert_eq!(expand_counts(&counts), vec!["big", "small", "small"]);
    }

    #[test]
    fn zero_counts_expand_to_nothing() {
        let counts = BTreeMap::from([("small".to_string(), 0)]);
        assert!(expand_counts(&counts).is_empty());
    }

    #[test]
    fn layout_lists_gpus_in_ascending_order() {
        let cfg = config(3, None);
        let names = vec!["big".to_string(), "small".to_string()];
        let assignment = vec![Some(1), Some(0)];
        assert_eq!(
            render_layout(&cfg, &names, &assignment),
            "GPU 0: small\nGPU 1: big\nGPU 2: (empty)\n"
        );
    }

    #[test]
    fn layout_puts_initial_pods_before_new_ones() {
        let initial = BTreeMap::from([(0usize, vec!["small".to_string()])]);
        let cfg = config(1, Some(initial));
        let names = vec!["big".to_string()];
        let assignment = vec![Some(0)];
        assert_eq!(
            render_layout(&cfg, &names, &assignment),
            "GPU 0: small, big\n"
        );
    }

    #[test]
    fn unplaced_pods_are_omitted_from_the_layout() {
        let cfg = config(1, None);
        let names = vec!["big".to_string(), "small".to_string()];
        let assignment = vec![Some(0), None];
        assert_eq!(render_layout(&cfg, &names, &assignment), "GPU 0: big\n");
    }

    #[test]
    fn combinations_render_numbered_in_order() {
        let maximal = vec![
            BTreeMap::from([("big".to_string(), 2u32)]),
            BTreeMap::from([("small".to_string(), 4u32)]),
        ];
        assert_eq!(
            render_combinations(&maximal),
            "\nAdditional Pod Combinations:\n1. big: 2\n2. small: 4\n"
        );
    }

    #[test]
    fn empty_combination_renders_the_standard_line() {
        let maximal = vec![Combination::new()];
        assert_eq!(
            render_combinations(&maximal),
            "\nAdditional Pod Combinations:\n1. No additional pods can be added\n"
        );
    }
}
