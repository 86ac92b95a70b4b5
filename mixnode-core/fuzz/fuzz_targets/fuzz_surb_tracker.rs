#![no_main]
use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use mixnode_core::surb::{SurbCtx, SurbTracker};
use mixnode_protocol::SprpKey;
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::time::Instant;

/// Drive the tracker with arbitrary store/take/sweep sequences and compare
/// it against a plain map of id -> ETA offset.
#[derive(Arbitrary, Debug)]
enum Op {
    Store { id: u8, eta_ms: u8 },
    Take { id: u8 },
    Sweep { now_ms: u16, slack_ms: u8 },
}

fuzz_target!(|ops: Vec<Op>| {
    let base = Instant::now();
    let tracker = SurbTracker::new();
    let mut model: BTreeMap<u64, u64> = BTreeMap::new();

    for op in ops {
        match op {
            Op::Store { id, eta_ms } => {
                let id = u64::from(id);
                if model.contains_key(&id) {
                    continue;
                }
                let eta = base + Duration::from_millis(u64::from(eta_ms));
                tracker.store(SurbCtx::new(id, eta, SprpKey::from_bytes([id as u8; 32])));
                model.insert(id, u64::from(eta_ms));
            }
            Op::Take { id } => {
                let id = u64::from(id);
                let taken = tracker.take(id);
                assert_eq!(taken.is_some(), model.remove(&id).is_some());
            }
            Op::Sweep { now_ms, slack_ms } => {
                let now = u64::from(now_ms);
                let slack = u64::from(slack_ms);
                let stats = tracker.sweep(
                    base + Duration::from_millis(now),
                    Duration::from_millis(slack),
                );
                let before = model.len();
                model.retain(|_, eta| *eta + slack > now);
                assert_eq!(stats.swept, before - model.len());
                assert_eq!(stats.remaining, model.len());
            }
        }
        assert_eq!(tracker.len(), model.len());
        for id in model.keys() {
            assert!(tracker.contains(*id));
        }
    }
});
