use std::collections::BTreeMap;

use crate::CoverId;

/// Cover locations temporarily excluded from selection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CoverBlacklist {
    entries: BTreeMap<CoverId, f32>,
}

impl CoverBlacklist {
    pub fn new() -> Self {
        Self::default()
    }

    /// Blacklisting an id that is already listed restarts its timer;
    /// `blacklist == false` removes it.
    pub fn set(&mut self, id: CoverId, blacklist: bool, seconds: f32) {
        if blacklist {
            self.entries.insert(id, seconds);
        } else {
            self.entries.remove(&id);
        }
    }

    pub fn contains(&self, id: CoverId) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn remaining(&self, id: CoverId) -> Option<f32> {
        self.entries.get(&id).copied()
    }

    /// Advance every timer by `dt_seconds` and purge expired entries.
    pub fn update(&mut self, dt_seconds: f32) {
        self.entries.retain(|_, remaining| {
            *remaining -= dt_seconds;
            *remaining > 0.0
        });
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (CoverId, f32)> + '_ {
        self.entries.iter().map(|(id, t)| (*id, *t))
    }
}
