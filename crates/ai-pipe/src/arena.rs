//! Storage for the running pipe and its subpipes.

use slotmap::{new_key_type, SlotMap};

use crate::{GoalPipe, PipeId, PipeWorld};

new_key_type! {
    /// Generation-checked reference to a pipe in a [`PipeArena`].
    pub struct PipeKey;
}

/// Root pipe plus a stack of inserted subpipes.
///
/// The chain only grows at the innermost end, so it can never form a cycle.
/// Keys of removed pipes resolve to `None`.
#[derive(Debug)]
pub struct PipeArena<W: PipeWorld> {
    pipes: SlotMap<PipeKey, GoalPipe<W>>,
    chain: Vec<PipeKey>,
}

impl<W: PipeWorld> Default for PipeArena<W> {
    fn default() -> Self {
        Self {
            pipes: SlotMap::with_key(),
            chain: Vec::new(),
        }
    }
}

impl<W: PipeWorld> PipeArena<W> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of pipes in the chain, root included.
    pub fn depth(&self) -> usize {
        self.chain.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }

    pub fn root(&self) -> Option<PipeKey> {
        self.chain.first().copied()
    }

    pub fn innermost(&self) -> Option<PipeKey> {
        self.chain.last().copied()
    }

    /// Parent of `key` in the chain.
    pub fn parent(&self, key: PipeKey) -> Option<PipeKey> {
        let pos = self.position(key)?;
        pos.checked_sub(1).map(|p| self.chain[p])
    }

    pub fn get(&self, key: PipeKey) -> Option<&GoalPipe<W>> {
        self.pipes.get(key)
    }

    pub fn get_mut(&mut self, key: PipeKey) -> Option<&mut GoalPipe<W>> {
        self.pipes.get_mut(key)
    }

    pub fn contains(&self, key: PipeKey) -> bool {
        self.pipes.contains_key(key)
    }

    /// Root to innermost.
    pub fn keys(&self) -> impl Iterator<Item = PipeKey> + '_ {
        self.chain.iter().copied()
    }

    pub fn find_id(&self, id: PipeId) -> Option<PipeKey> {
        self.keys()
            .find(|k| self.pipes.get(*k).is_some_and(|p| p.id() == Some(id)))
    }

    pub fn find_name(&self, name: &str) -> Option<PipeKey> {
        self.keys()
            .find(|k| self.pipes.get(*k).is_some_and(|p| p.name() == name))
    }

    pub fn push(&mut self, pipe: GoalPipe<W>) -> PipeKey {
        let key = self.pipes.insert(pipe);
        self.chain.push(key);
        key
    }

    pub fn pop_innermost(&mut self) -> Option<(PipeKey, GoalPipe<W>)> {
        let key = self.chain.pop()?;
        self.pipes.remove(key).map(|pipe| (key, pipe))
    }

    /// Remove `key` and, unless `keep_nested`, every pipe inserted above it.
    /// Returns the removed pipes innermost first.
    pub fn remove(&mut self, key: PipeKey, keep_nested: bool) -> Vec<(PipeKey, GoalPipe<W>)> {
        let Some(pos) = self.position(key) else {
            return Vec::new();
        };
        let keys: Vec<PipeKey> = if keep_nested {
            vec![self.chain.remove(pos)]
        } else {
            self.chain.drain(pos..).rev().collect()
        };
        keys.into_iter()
            .filter_map(|k| self.pipes.remove(k).map(|pipe| (k, pipe)))
            .collect()
    }

    /// Empty the arena, innermost first.
    pub fn drain(&mut self) -> Vec<(PipeKey, GoalPipe<W>)> {
        let keys: Vec<PipeKey> = self.chain.drain(..).rev().collect();
        keys.into_iter()
            .filter_map(|k| self.pipes.remove(k).map(|pipe| (k, pipe)))
            .collect()
    }

    fn position(&self, key: PipeKey) -> Option<usize> {
        self.chain.iter().position(|k| *k == key)
    }
}
