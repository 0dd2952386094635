//! Commit serialization across threads.

use std::sync::Arc;
use std::thread;

use chrono::{DateTime, Duration, TimeZone, Utc};
use timeblock_core::storage::BlockStore;
use timeblock_core::{
    FixedClock, Interval, MemoryStore, Priority, ProposedBlock, Provenance, ScheduleManager,
};

fn at(hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 19, hour, 0, 0).unwrap()
}

/// Payload `n` is one block per hour, shifted by `n` minutes, all for task `t{n}`.
fn payload(n: u32) -> Vec<ProposedBlock> {
    (0..4)
        .map(|i| {
            let start = at(8 + i) + Duration::minutes(i64::from(n));
            ProposedBlock {
                task_id: format!("t{n}"),
                task_title: format!("Task {n}"),
                priority: Priority::Med,
                start_time: start,
                end_time: start + Duration::minutes(30),
            }
        })
        .collect()
}

fn intervals(blocks: &[ProposedBlock]) -> Vec<Interval> {
    let mut out: Vec<Interval> = blocks.iter().map(|b| b.interval().unwrap()).collect();
    out.sort();
    out
}

#[test]
fn same_user_commits_never_interleave() {
    let mgr = Arc::new(ScheduleManager::new(
        MemoryStore::new(),
        FixedClock::utc(at(7)),
    ));

    let handles: Vec<_> = (0..8)
        .map(|n| {
            let mgr = Arc::clone(&mgr);
            thread::spawn(move || mgr.commit("u1", &payload(n)).unwrap())
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.join().unwrap().committed_count, 4);
    }

    let auto = mgr
        .store()
        .list_blocks("u1", Some(Provenance::Auto))
        .unwrap();
    assert_eq!(auto.len(), 4);

    // Exactly one payload survives intact.
    let winner = auto[0].task_id.clone();
    assert!(auto.iter().all(|b| b.task_id == winner));
    let n: u32 = winner[1..].parse().unwrap();
    let committed: Vec<Interval> = auto.iter().map(|b| b.interval).collect();
    assert_eq!(committed, intervals(&payload(n)));
}

#[test]
fn different_users_commit_independently() {
    let mgr = Arc::new(ScheduleManager::new(
        MemoryStore::new(),
        FixedClock::utc(at(7)),
    ));

    let handles: Vec<_> = (0..4)
        .map(|n| {
            let mgr = Arc::clone(&mgr);
            thread::spawn(move || mgr.commit(&format!("user-{n}"), &payload(n)).unwrap())
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    for n in 0..4 {
        let auto = mgr
            .store()
            .list_blocks(&format!("user-{n}"), Some(Provenance::Auto))
            .unwrap();
        assert_eq!(auto.len(), 4);
        assert!(auto.iter().all(|b| b.task_id == format!("t{n}")));
    }
}
