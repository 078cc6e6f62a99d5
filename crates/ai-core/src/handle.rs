//! Generation-checked handles for world objects the agent refers to
//! (attention target, last-op result).

use slotmap::SlotMap;

use crate::Vec3;

slotmap::new_key_type! {
    /// Index plus generation. Lookups after removal return `None`.
    pub struct ObjectHandle;
}

/// Snapshot of the parts of a world object the behavior core reads.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ObjectState {
    pub position: Vec3,
    pub velocity: Vec3,
}

impl ObjectState {
    pub fn at(position: Vec3) -> Self {
        Self {
            position,
            velocity: Vec3::ZERO,
        }
    }
}

/// Reference object store for worlds that don't already own a handle space.
#[derive(Debug, Clone, Default)]
pub struct ObjectTable {
    objects: SlotMap<ObjectHandle, ObjectState>,
}

impl ObjectTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, state: ObjectState) -> ObjectHandle {
        self.objects.insert(state)
    }

    pub fn remove(&mut self, handle: ObjectHandle) -> Option<ObjectState> {
        self.objects.remove(handle)
    }

    pub fn get(&self, handle: ObjectHandle) -> Option<ObjectState> {
        self.objects.get(handle).copied()
    }

    pub fn get_mut(&mut self, handle: ObjectHandle) -> Option<&mut ObjectState> {
        self.objects.get_mut(handle)
    }

    pub fn contains(&self, handle: ObjectHandle) -> bool {
        self.objects.contains_key(handle)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}
