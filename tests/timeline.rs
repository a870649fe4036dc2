mod common;

use std::collections::BTreeMap;

use gpupack::timeline::{EventKind, Replay, build_timeline, replay};

use common::timed_pod;

#[test]
fn overlapping_pods_do_not_fit_one_gpu() {
    // The first pod stays until t=5; the second arrives at t=3 and finds
    // the only GPU full.
    let pods = vec![
        timed_pod(0, "worker", &[2, 2], 0, Some(5)),
        timed_pod(1, "worker", &[2, 2], 3, None),
    ];
    let outcome = replay(&pods, &[2, 2], 1, None, None);
    assert_eq!(outcome, Replay::OutOfCapacity { time: 3, item: 1 });
}

#[test]
fn same_tick_handoff_reuses_the_gpu() {
    // Removal at t=3 is processed before the arrival at t=3, so the second
    // pod inherits the slot.
    let pods = vec![
        timed_pod(0, "worker", &[2, 2], 0, Some(3)),
        timed_pod(1, "worker", &[2, 2], 3, None),
    ];
    let Replay::Completed { assignment, usage } = replay(&pods, &[2, 2], 1, None, None) else {
        panic!("handoff must succeed");
    };
    assert_eq!(assignment, vec![None, Some(0)]);
    assert_eq!(usage, vec![vec![2, 2]]);
}

#[test]
fn removals_precede_arrivals_at_every_shared_tick() {
    let pods = vec![
        timed_pod(0, "a", &[1, 1], 0, Some(4)),
        timed_pod(1, "b", &[1, 1], 2, Some(6)),
        timed_pod(2, "c", &[1, 1], 4, None),
        timed_pod(3, "d", &[1, 1], 6, None),
    ];
    let events = build_timeline(&pods);
    for window in events.windows(2) {
        if window[0].time == window[1].time {
            assert!(
                window[0].kind <= window[1].kind,
                "remove must sort before assign at t={}",
                window[0].time
            );
        }
    }
    assert!(EventKind::Remove < EventKind::Assign);
    // And the replay stays within one slot throughout.
    let outcome = replay(&pods, &[2, 2], 1, None, None);
    assert!(matches!(outcome, Replay::Completed { .. }));
}

#[test]
fn quota_caps_placements_without_failing_the_run() {
    let pods = vec![
        timed_pod(0, "capped", &[1, 1], 0, None),
        timed_pod(1, "capped", &[1, 1], 1, None),
        timed_pod(2, "free", &[1, 1], 2, None),
    ];
    let quota = BTreeMap::from([("capped".to_string(), 1)]);
    let Replay::Completed { assignment, .. } = replay(&pods, &[4, 4], 1, None, Some(&quota))
    else {
        panic!("quota never fails a schedule");
    };
    assert_eq!(assignment, vec![Some(0), None, Some(0)]);
}

#[test]
fn initial_state_is_part_of_the_replay() {
    let pods = vec![timed_pod(0, "worker", &[2, 2], 0, None)];
    let initial = vec![vec![1, 1], vec![0, 0]];
    let Replay::Completed { assignment, usage } =
        replay(&pods, &[2, 2], 2, Some(&initial), None)
    else {
        panic!("second GPU is free");
    };
    assert_eq!(assignment, vec![Some(1)]);
    assert_eq!(usage, vec![vec![1, 1], vec![2, 2]]);
}
