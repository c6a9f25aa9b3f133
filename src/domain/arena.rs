//! Fixed-capacity storage for requirement records.
//!
//! Records are bump allocated and only ever released all at once. The backing
//! vector is reserved up front, so allocation never grows or moves it.

use tracing::trace;

use crate::domain::{Requirement, RequirementId};

/// Default number of requirement slots.
pub const DEFAULT_CAPACITY: usize = 64;

#[derive(Debug, Clone)]
pub(crate) struct Arena {
    slots: Vec<Requirement>,
    capacity: usize,
    generation: u32,
}

impl Arena {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            capacity,
            generation: 0,
        }
    }

    /// Like [`Arena::with_capacity`], but returns `None` instead of aborting
    /// when the slots cannot be indexed with `u32` or cannot be allocated.
    pub fn try_with_capacity(capacity: usize) -> Option<Self> {
        u32::try_from(capacity).ok()?;
        let mut slots = Vec::new();
        slots.try_reserve_exact(capacity).ok()?;
        Some(Self {
            slots,
            capacity,
            generation: 0,
        })
    }

    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of slots handed out since the last reset.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Takes the next free slot, or returns `None` once the arena is full.
    pub fn allocate(&mut self, requirement: Requirement) -> Option<RequirementId> {
        if self.slots.len() >= self.capacity {
            return None;
        }

        let index = u32::try_from(self.slots.len()).ok()?;
        self.slots.push(requirement);
        trace!(index, generation = self.generation, "allocated requirement slot");

        Some(self.id(index))
    }

    /// Drops every record and rewinds the cursor.
    ///
    /// Handles issued before the reset stop resolving.
    pub fn reset(&mut self) {
        self.slots.clear();
        self.generation = self.generation.wrapping_add(1);
    }

    pub const fn id(&self, index: u32) -> RequirementId {
        RequirementId {
            index,
            generation: self.generation,
        }
    }

    pub fn get(&self, id: RequirementId) -> Option<&Requirement> {
        if id.generation != self.generation {
            return None;
        }
        self.slots.get(id.index as usize)
    }

    pub fn get_mut(&mut self, id: RequirementId) -> Option<&mut Requirement> {
        if id.generation != self.generation {
            return None;
        }
        self.slots.get_mut(id.index as usize)
    }

    /// Slot access for list walks. List links only ever point at live slots
    /// of the current generation.
    pub fn slot(&self, index: u32) -> &Requirement {
        &self.slots[index as usize]
    }

    pub fn slot_mut(&mut self, index: u32) -> &mut Requirement {
        &mut self.slots[index as usize]
    }

    pub fn iter(&self) -> impl Iterator<Item = (RequirementId, &Requirement)> {
        (0..).zip(&self.slots).map(|(index, req)| (self.id(index), req))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Capabilities, RequesterId, ResourceId};

    fn record() -> Requirement {
        Requirement::new(RequesterId(0), ResourceId(0), Capabilities::NONE)
    }

    #[test]
    fn allocates_in_order_until_full() {
        let mut arena = Arena::with_capacity(2);

        let first = arena.allocate(record()).unwrap();
        let second = arena.allocate(record()).unwrap();
        assert_eq!(first.index, 0);
        assert_eq!(second.index, 1);

        assert!(arena.allocate(record()).is_none());
        assert_eq!(arena.len(), 2);
    }

    #[test]
    fn allocation_never_reallocates() {
        let mut arena = Arena::with_capacity(8);
        arena.allocate(record()).unwrap();
        let base = arena.slots.as_ptr();

        while arena.allocate(record()).is_some() {}

        assert_eq!(arena.slots.as_ptr(), base);
    }

    #[test]
    fn reset_rewinds_and_invalidates_handles() {
        let mut arena = Arena::with_capacity(1);
        let old = arena.allocate(record()).unwrap();

        arena.reset();
        assert_eq!(arena.len(), 0);
        assert!(arena.get(old).is_none());

        let new = arena.allocate(record()).unwrap();
        assert_eq!(new.index, old.index);
        assert_ne!(new, old);
        assert!(arena.get(new).is_some());
        assert!(arena.get_mut(old).is_none());
    }

    #[test]
    fn zero_capacity_arena_is_always_full() {
        let mut arena = Arena::with_capacity(0);
        assert!(arena.allocate(record()).is_none());
    }

    #[test]
    fn oversized_capacity_is_refused() {
        assert!(Arena::try_with_capacity(u32::MAX as usize + 1).is_none());
        assert!(Arena::try_with_capacity(usize::MAX).is_none());

        let arena = Arena::try_with_capacity(4).unwrap();
        assert_eq!(arena.capacity(), 4);
        assert!(arena.slots.capacity() >= 4);
    }
}
