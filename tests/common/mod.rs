use std::collections::BTreeMap;

use gpupack::model::{Assignment, Weights};
use gpupack::timeline::TimedPod;

pub fn mappings(entries: &[(&str, &[u32])]) -> BTreeMap<String, Weights> {
    entries
        .iter()
        .map(|(pod_type, weights)| (pod_type.to_string(), weights.to_vec()))
        .collect()
}

pub fn counts(entries: &[(&str, u32)]) -> BTreeMap<String, u32> {
    entries
        .iter()
        .map(|(pod_type, count)| (pod_type.to_string(), *count))
        .collect()
}

pub fn timed_pod(
    index: usize,
    pod_type: &str,
    weights: &[u32],
    add_time: i64,
    remove_time: Option<i64>,
) -> TimedPod {
    TimedPod {
        index,
        type_name: pod_type.to_string(),
        weights: weights.to_vec(),
        add_time,
        remove_time,
    }
}

/// Usage per GPU implied by an assignment; the capacity check in tests.
pub fn gpu_loads(weights: &[Weights], assignment: &Assignment, gpus: usize) -> Vec<Weights> {
    let dims = weights.first().map_or(0, Vec::len);
    let mut used = vec![vec![0u32; dims]; gpus];
    for (pod, slot) in assignment.iter().enumerate() {
        if let Some(gpu) = slot {
            for d in 0..dims {
                used[*gpu][d] += weights[pod][d];
            }
        }
    }
    used
}
