use super::replacer::FrameId;
use crate::storage::page::BlockId;
use std::collections::HashMap;

/// Maps each cached block to the slot holding it.
///
/// A reverse slot→block table is kept alongside so reassigning a slot can
/// drop its old entry without scanning the map.
#[derive(Debug)]
pub struct PageTable {
    blocks: HashMap<BlockId, FrameId>,
    slots: Vec<Option<BlockId>>,
}

impl PageTable {
    pub fn new(capacity: usize) -> Self {
        Self {
            blocks: HashMap::with_capacity(capacity),
            slots: vec![None; capacity],
        }
    }

    pub fn lookup(&self, block: &BlockId) -> Option<FrameId> {
        self.blocks.get(block).copied()
    }

    /// Map `block` to `slot`, dropping whatever `slot` held before.
    pub fn insert(&mut self, block: BlockId, slot: FrameId) {
        if let Some(old) = self.slots[slot].take() {
            self.blocks.remove(&old);
        }
        if let Some(prev_slot) = self.blocks.insert(block.clone(), slot) {
            if prev_slot != slot {
                self.slots[prev_slot] = None;
            }
        }
        self.slots[slot] = Some(block);
    }

    pub fn remove(&mut self, block: &BlockId) -> Option<FrameId> {
        let slot = self.blocks.remove(block)?;
        self.slots[slot] = None;
        Some(slot)
    }

    #[cfg(test)]
    pub(crate) fn block_at(&self, slot: FrameId) -> Option<&BlockId> {
        self.slots.get(slot).and_then(Option::as_ref)
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}
