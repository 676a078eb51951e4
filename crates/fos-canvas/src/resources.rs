//! Resource Table
//!
//! Arena of native resources addressed by generation-checked handles.
//! A slot is reused after release, but its generation is bumped, so a
//! handle that outlived its resource never resolves to the newcomer.

use std::fmt;

use crate::{CanvasError, Result};

/// Opaque reference to a resource in a [`ResourceTable`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle {
    index: u32,
    generation: u32,
}

impl Handle {
    /// Slot index
    pub fn index(self) -> u32 {
        self.index
    }

    /// Generation of the slot when the handle was issued
    pub fn generation(self) -> u32 {
        self.generation
    }

    /// Pack into a single integer (generation in the high half)
    pub fn to_bits(self) -> u64 {
        (u64::from(self.generation) << 32) | u64::from(self.index)
    }

    /// Unpack from [`Handle::to_bits`]
    pub fn from_bits(bits: u64) -> Self {
        Self {
            index: bits as u32,
            generation: (bits >> 32) as u32,
        }
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}v{}", self.index, self.generation)
    }
}

#[derive(Debug)]
struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

/// Generation-checked arena
#[derive(Debug)]
pub struct ResourceTable<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    live: usize,
}

impl<T> ResourceTable<T> {
    /// Create an empty table
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            live: 0,
        }
    }

    /// Store a resource and return its handle
    pub fn insert(&mut self, value: T) -> Handle {
        self.live += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.value = Some(value);
            return Handle {
                index,
                generation: slot.generation,
            };
        }
        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            value: Some(value),
        });
        Handle {
            index,
            generation: 0,
        }
    }

    /// Look up a live resource
    pub fn get(&self, handle: Handle) -> Result<&T> {
        self.slots
            .get(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.value.as_ref())
            .ok_or(CanvasError::InvalidHandle(handle))
    }

    /// Look up a live resource mutably
    pub fn get_mut(&mut self, handle: Handle) -> Result<&mut T> {
        self.slots
            .get_mut(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.value.as_mut())
            .ok_or(CanvasError::InvalidHandle(handle))
    }

    /// Borrow two distinct resources, the first mutably
    pub fn get_pair_mut(&mut self, target: Handle, source: Handle) -> Result<(&mut T, &T)> {
        // validate both before splitting the borrow
        self.get(target)?;
        self.get(source)?;
        if target.index == source.index {
            return Err(CanvasError::InvalidArgument(format!(
                "{target} and {source} share a slot"
            )));
        }

        let (t, s) = (target.index as usize, source.index as usize);
        let (target_slot, source_slot) = if t < s {
            let (head, tail) = self.slots.split_at_mut(s);
            (&mut head[t], &tail[0])
        } else {
            let (head, tail) = self.slots.split_at_mut(t);
            (&mut tail[0], &head[s])
        };
        match (target_slot.value.as_mut(), source_slot.value.as_ref()) {
            (Some(t), Some(s)) => Ok((t, s)),
            _ => Err(CanvasError::InvalidHandle(target)),
        }
    }

    /// Whether the handle refers to a live resource
    pub fn contains(&self, handle: Handle) -> bool {
        self.get(handle).is_ok()
    }

    /// Release a resource. Releasing a stale handle is a no-op.
    pub fn release(&mut self, handle: Handle) -> Option<T> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        if slot.generation != handle.generation {
            tracing::trace!(%handle, "release of stale handle ignored");
            return None;
        }
        let value = slot.value.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(handle.index);
        self.live -= 1;
        Some(value)
    }

    /// Number of live resources
    pub fn len(&self) -> usize {
        self.live
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }
}

impl<T> Default for ResourceTable<T> {
    fn default() -> Self {
        Self::new()
    }
}
