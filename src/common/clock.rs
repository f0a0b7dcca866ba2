use std::fmt;

/*
    A vector clock holds one logical counter per member of the group.
    Slot i only moves forward: process i increments it for each local
    send, and every process raises it to the max seen on a delivered
    message. The length is fixed when the clock is created and never
    changes; combining clocks of different lengths means a frame slipped
    past validation, so it panics rather than truncating.
*/

pub type ProcessId = usize;

#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct VectorClock {
    slots: Vec<u32>,
}

impl VectorClock {
    pub fn new(size: usize) -> Self {
        VectorClock {
            slots: vec![0; size],
        }
    }

    pub fn from_slots(slots: Vec<u32>) -> Self {
        VectorClock { slots }
    }

    /// Advances the slot owned by `index` and returns its new value.
    pub fn increment(&mut self, index: ProcessId) -> u32 {
        let slot = &mut self.slots[index];
        *slot += 1;
        *slot
    }

    pub fn merge(&mut self, other: &VectorClock) {
        assert_eq!(
            self.slots.len(),
            other.slots.len(),
            "vector clock length mismatch on merge"
        );
        for (mine, theirs) in self.slots.iter_mut().zip(&other.slots) {
            *mine = (*mine).max(*theirs);
        }
    }

    pub fn snapshot(&self) -> VectorClock {
        self.clone()
    }

    pub fn get(&self, index: ProcessId) -> u32 {
        self.slots[index]
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn as_slice(&self) -> &[u32] {
        &self.slots
    }

    /// True when every slot is at least the matching slot of `other`.
    pub fn dominates(&self, other: &VectorClock) -> bool {
        assert_eq!(self.slots.len(), other.slots.len(), "vector clock length mismatch");
        self.slots.iter().zip(&other.slots).all(|(a, b)| a >= b)
    }
}

impl fmt::Display for VectorClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, value) in self.slots.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{}", value)?;
        }
        write!(f, "]")
    }
}
