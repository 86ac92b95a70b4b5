//! Outstanding SURB bookkeeping shared by the scheduler and the reply path.

use super::context::SurbCtx;
use super::eta_index::EtaIndex;
use super::store::SurbStore;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;

/// Outcome of one [`SurbTracker::sweep`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SweepStats {
    pub swept: usize,
    pub remaining: usize,
}

#[derive(Debug, Default)]
struct Inner {
    store: SurbStore,
    index: EtaIndex,
}

/// Token store plus ETA index behind a single lock.
///
/// Every id in the store maps to the index node holding its context, and
/// every context in the index has a store entry. Any observed violation of
/// this is a lifecycle bug and panics.
#[derive(Debug, Default)]
pub struct SurbTracker {
    inner: Mutex<Inner>,
}

impl SurbTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().expect("BUG: SURB tracker lock poisoned")
    }

    /// Record an outstanding SURB.
    ///
    /// # Panics
    /// If a context with the same id is already outstanding.
    pub fn store(&self, ctx: SurbCtx) {
        let id = ctx.id;
        let mut inner = self.lock();
        if inner.store.contains(id) {
            panic!("BUG: SURB 0x{:016x} is already outstanding", id);
        }

        let handle = inner.index.insert(ctx);
        let fresh = inner.store.insert(id, handle);
        debug_assert!(fresh, "BUG: SURB 0x{:016x} inserted twice", id);
    }

    /// Retire the SURB `id`. `None` if it is not outstanding.
    pub fn take(&self, id: u64) -> Option<SurbCtx> {
        let mut inner = self.lock();
        let handle = inner.store.remove(id)?;

        match inner.index.remove_surb(handle, id) {
            Some(ctx) => Some(ctx),
            None => panic!("BUG: SURB 0x{:016x} stored but not indexed", id),
        }
    }

    /// Drop every SURB whose `eta + slack` is at or before `now`.
    pub fn sweep(&self, now: Instant, slack: Duration) -> SweepStats {
        let started = std::time::Instant::now();
        let mut inner = self.lock();
        let mut swept = 0;

        loop {
            let handle = match inner.index.first() {
                Some((handle, node)) => match node.eta().checked_add(slack) {
                    Some(deadline) if deadline <= now => handle,
                    _ => break,
                },
                None => break,
            };

            let node = match inner.index.remove_node(handle) {
                Some(node) => node,
                None => panic!("BUG: ETA index head vanished during sweep"),
            };
            let eta = node.eta();
            for ctx in node.into_surbs() {
                if inner.store.remove(ctx.id).is_none() {
                    panic!("BUG: swept SURB 0x{:016x} missing from store", ctx.id);
                }
                log::debug!(
                    "Lost SURB 0x{:016x}, {:?} past deadline",
                    ctx.id,
                    now.saturating_duration_since(eta)
                );
                swept += 1;
            }
        }

        let remaining = inner.store.len();
        if swept > 0 {
            log::debug!(
                "Swept {} lost SURB(s), {} outstanding, took {:?}",
                swept,
                remaining,
                started.elapsed()
            );
        }
        SweepStats { swept, remaining }
    }

    pub fn contains(&self, id: u64) -> bool {
        self.lock().store.contains(id)
    }

    /// Number of outstanding SURBs.
    pub fn len(&self) -> usize {
        self.lock().store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Assert store/index agreement.
    #[cfg(test)]
    pub(crate) fn assert_consistent(&self) {
        use std::collections::BTreeSet;

        let inner = self.lock();
        let stored: BTreeSet<u64> = inner.store.ids().collect();
        let mut indexed = BTreeSet::new();
        let mut last_eta = None;
        for node in inner.index.iter() {
            assert!(!node.surbs().is_empty(), "empty ETA node");
            assert!(last_eta.map_or(true, |last| last < node.eta()), "ETA order");
            last_eta = Some(node.eta());
            for ctx in node.surbs() {
                assert_eq!(ctx.eta(), node.eta());
                assert_eq!(ctx.eta_node, inner.store.get(ctx.id));
                assert!(indexed.insert(ctx.id), "SURB indexed twice");
            }
        }
        assert_eq!(stored, indexed);
    }
}
