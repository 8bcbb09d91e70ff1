use super::replacer::FrameId;
use std::collections::VecDeque;

/// Slots that have never held a block, handed out in slot order.
#[derive(Debug)]
pub struct FreeList {
    slots: VecDeque<FrameId>,
}

impl FreeList {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: (0..capacity).collect(),
        }
    }

    pub fn take_any(&mut self) -> Option<FrameId> {
        self.slots.pop_front()
    }

    /// Put back a slot that was taken for an assignment that did not happen.
    pub fn release(&mut self, slot: FrameId) {
        self.slots.push_front(slot);
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }

    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
