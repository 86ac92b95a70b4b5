use super::eta_index::EtaHandle;
use std::collections::HashMap;

/// Exact-match map from SURB id suffix to the index node holding its context.
#[derive(Debug, Default)]
pub struct SurbStore {
    entries: HashMap<u64, EtaHandle>,
}

impl SurbStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a mapping. Returns `false` if `id` is already present, leaving the
    /// existing mapping in place.
    pub fn insert(&mut self, id: u64, handle: EtaHandle) -> bool {
        use std::collections::hash_map::Entry;
        match self.entries.entry(id) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(handle);
                true
            }
        }
    }

    pub fn get(&self, id: u64) -> Option<EtaHandle> {
        self.entries.get(&id).copied()
    }

    pub fn remove(&mut self, id: u64) -> Option<EtaHandle> {
        self.entries.remove(&id)
    }

    pub fn contains(&self, id: u64) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = u64> + '_ {
        self.entries.keys().copied()
    }
}
