use std::collections::BTreeMap;

use tracing::{debug, info, warn};

use crate::model::{Assignment, UsageGrid, Weights};

/// A pod with its lifetime, from the timeline form of the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimedPod {
    /// Position in the original pod list; the identity results refer to.
    pub index: usize,
    pub type_name: String,
    pub weights: Weights,
    pub add_time: i64,
    /// `None` means the pod stays for the rest of the schedule.
    pub remove_time: Option<i64>,
}

/// What happens to a pod at a point in time.
///
/// `Remove` sorts before `Assign` so a same-tick departure frees its room
/// before the arrival is placed. The replay depends on this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum EventKind {
    Remove,
    Assign,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub time: i64,
    pub kind: EventKind,
    pub item: usize,
}

/// Expand pod lifetimes into one chronological event stream.
/// Ordered by time, then kind (removals first), then pod index.
pub fn build_timeline(pods: &[TimedPod]) -> Vec<Event> {
    let mut events = Vec::with_capacity(pods.len() * 2);
    for pod in pods {
        events.push(Event {
            time: pod.add_time,
            kind: EventKind::Assign,
            item: pod.index,
        });
        if let Some(time) = pod.remove_time {
            events.push(Event {
                time,
                kind: EventKind::Remove,
                item: pod.index,
            });
        }
    }
    events.sort_by_key(|e| (e.time, e.kind, e.item));
    events
}

/// Outcome of replaying a schedule. Running out of room is a negative
/// answer, not an error; the offending event is reported so the caller can
/// say which pod failed and when.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Replay {
    Completed {
        /// Final placement; pods that were removed (or never placed) are
        /// `None`.
        assignment: Assignment,
        /// Final usage per GPU.
        usage: Vec<Weights>,
    },
    OutOfCapacity {
        time: i64,
        item: usize,
    },
}

/// Online first-fit replay of the event stream.
///
/// Events are processed strictly in order and no decision is ever
/// revisited: a schedule is feasible exactly when this pure first-fit pass
/// succeeds. An optional per-type quota caps how many placements a type may
/// consume; a pod over quota is left unplaced and the replay carries on.
/// The quota counter is monotone, removals do not refund it.
pub fn replay(
    pods: &[TimedPod],
    capacity: &[u32],
    gpus: usize,
    initial: Option<&[Weights]>,
    quota: Option<&BTreeMap<String, u32>>,
) -> Replay {
    let mut grid = match initial {
        Some(used) => UsageGrid::with_initial(capacity.to_vec(), used.to_vec()),
        None => UsageGrid::new(capacity.to_vec(), gpus),
    };
    let mut assignment: Assignment = vec![None; pods.len()];
    let mut quota_spent: BTreeMap<&str, u32> = BTreeMap::new();

    for event in build_timeline(pods) {
        let pod = &pods[event.item];
        match event.kind {
            EventKind::Assign => {
                if let Some(cap) = quota.and_then(|q| q.get(&pod.type_name)) {
                    let spent = quota_spent.get(pod.type_name.as_str()).copied().unwrap_or(0);
                    if spent >= *cap {
                        warn!(
                            time = event.time,
                            pod = %pod.type_name,
                            quota = cap,
                            "quota exhausted, pod left unplaced"
                        );
                        continue;
                    }
                }

                let Some(slot) = (0..grid.gpus()).find(|&g| grid.fits(g, &pod.weights)) else {
                    warn!(time = event.time, pod = %pod.type_name, "no GPU has room");
                    return Replay::OutOfCapacity {
                        time: event.time,
                        item: event.item,
                    };
                };
                grid.occupy(slot, &pod.weights);
                assignment[event.item] = Some(slot);
                *quota_spent.entry(pod.type_name.as_str()).or_insert(0) += 1;
                info!(time = event.time, pod = %pod.type_name, gpu = slot, "placed");
                debug!(usage = ?grid.used(), "pool usage");
            }
            EventKind::Remove => {
                // Removing a pod that never got a slot is a no-op.
                if let Some(slot) = assignment[event.item].take() {
                    grid.release(slot, &pod.weights);
                    info!(time = event.time, pod = %pod.type_name, gpu = slot, "removed");
                    debug!(usage = ?grid.used(), "pool usage");
                }
            }
        }
    }

    Replay::Completed {
        assignment,
        usage: grid.used().to_vec(),
    }
}
