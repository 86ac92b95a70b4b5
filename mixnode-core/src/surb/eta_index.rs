//! SURB contexts ordered by expected arrival time.
//!
//! Nodes live in an arena and are addressed by generational handles, so a
//! handle held by a context that has since been removed simply stops
//! resolving instead of pointing at a recycled node. A `BTreeMap` keyed by
//! ETA gives ascending iteration and O(log n) insert/remove.

use super::context::SurbCtx;
use std::collections::BTreeMap;
use tokio::time::Instant;

/// Stable reference to a node of the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EtaHandle {
    slot: u32,
    generation: u32,
}

/// All contexts sharing one exact ETA. Never empty while in the index.
#[derive(Debug)]
pub struct EtaNode {
    eta: Instant,
    surbs: Vec<SurbCtx>,
}

impl EtaNode {
    pub fn eta(&self) -> Instant {
        self.eta
    }

    pub fn surbs(&self) -> &[SurbCtx] {
        &self.surbs
    }

    pub(crate) fn into_surbs(self) -> Vec<SurbCtx> {
        self.surbs
    }
}

#[derive(Debug, Default)]
struct Slot {
    generation: u32,
    node: Option<EtaNode>,
}

#[derive(Debug, Default)]
pub struct EtaIndex {
    slots: Vec<Slot>,
    free: Vec<u32>,
    order: BTreeMap<Instant, EtaHandle>,
}

impl EtaIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct ETAs.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Insert `ctx` under its ETA, joining an existing node on an exact
    /// collision. Sets and returns the context's node handle.
    pub fn insert(&mut self, mut ctx: SurbCtx) -> EtaHandle {
        let existing = self.order.get(&ctx.eta).copied();
        let handle = match existing {
            Some(handle) => handle,
            None => {
                let handle = self.alloc(EtaNode {
                    eta: ctx.eta,
                    surbs: Vec::with_capacity(1),
                });
                self.order.insert(ctx.eta, handle);
                handle
            }
        };

        ctx.eta_node = Some(handle);
        match self.get_mut(handle) {
            Some(node) => node.surbs.push(ctx),
            None => panic!("BUG: ETA index order references a vacant node"),
        }
        handle
    }

    pub fn get(&self, handle: EtaHandle) -> Option<&EtaNode> {
        self.slots
            .get(handle.slot as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.node.as_ref())
    }

    fn get_mut(&mut self, handle: EtaHandle) -> Option<&mut EtaNode> {
        self.slots
            .get_mut(handle.slot as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.node.as_mut())
    }

    /// Detach the context `id` from node `handle`, dropping the node when it
    /// empties. The returned context is no longer indexed.
    ///
    /// Returns `None` if the handle is stale or the node does not hold `id`.
    pub fn remove_surb(&mut self, handle: EtaHandle, id: u64) -> Option<SurbCtx> {
        let node = self.get_mut(handle)?;
        if node.surbs.is_empty() {
            panic!("BUG: empty SURB list in ETA node");
        }

        let pos = node.surbs.iter().position(|ctx| ctx.id == id)?;
        let mut ctx = node.surbs.remove(pos);
        if ctx.eta_node != Some(handle) {
            panic!("BUG: SURB 0x{:016x} node handle mismatch", id);
        }
        ctx.eta_node = None;

        if node.surbs.is_empty() {
            self.remove_node(handle);
        }
        Some(ctx)
    }

    /// Earliest node, if any.
    pub fn first(&self) -> Option<(EtaHandle, &EtaNode)> {
        let (_, &handle) = self.order.iter().next()?;
        self.get(handle).map(|node| (handle, node))
    }

    /// Remove a whole node. Every context it held is un-indexed.
    pub fn remove_node(&mut self, handle: EtaHandle) -> Option<EtaNode> {
        let slot = self.slots.get_mut(handle.slot as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        let mut node = slot.node.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(handle.slot);
        self.order.remove(&node.eta);

        for ctx in node.surbs.iter_mut() {
            ctx.eta_node = None;
        }
        Some(node)
    }

    /// Nodes in ascending ETA order.
    pub fn iter(&self) -> impl Iterator<Item = &EtaNode> + '_ {
        self.order.values().filter_map(move |&handle| self.get(handle))
    }

    fn alloc(&mut self, node: EtaNode) -> EtaHandle {
        match self.free.pop() {
            Some(slot) => {
                let entry = &mut self.slots[slot as usize];
                entry.node = Some(node);
                EtaHandle {
                    slot,
                    generation: entry.generation,
                }
            }
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    node: Some(node),
                });
                EtaHandle {
                    slot: (self.slots.len() - 1) as u32,
                    generation: 0,
                }
            }
        }
    }
}
