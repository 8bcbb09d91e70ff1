use super::replacer::FrameId;
use crate::storage::disk::DiskManager;
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::page::{BlockId, Page};
use crate::transaction::TransactionId;

/// One slot of the buffer pool.
///
/// A frame holds at most one block. Its slot index never changes; only the
/// assigned block and its contents are swapped when the frame is reused.
#[derive(Debug)]
pub struct Frame {
    slot: FrameId,
    page: Page,
    block: Option<BlockId>,
    pin_count: u32,
    dirty_by: Option<TransactionId>,
    last_access: u64,
    reference_bit: bool,
}

impl Frame {
    pub fn new(slot: FrameId) -> Self {
        Self {
            slot,
            page: Page::new(),
            block: None,
            pin_count: 0,
            dirty_by: None,
            last_access: 0,
            reference_bit: false,
        }
    }

    pub fn slot(&self) -> FrameId {
        self.slot
    }

    pub fn block(&self) -> Option<&BlockId> {
        self.block.as_ref()
    }

    pub fn page(&self) -> &Page {
        &self.page
    }

    pub fn page_mut(&mut self) -> &mut Page {
        &mut self.page
    }

    pub fn pin_count(&self) -> u32 {
        self.pin_count
    }

    pub fn is_pinned(&self) -> bool {
        self.pin_count > 0
    }

    pub fn pin(&mut self) {
        self.pin_count += 1;
    }

    /// Release one pin. Unpinning a frame that is not pinned is a caller bug
    /// and leaves the frame untouched.
    pub fn unpin(&mut self) -> StorageResult<()> {
        if self.pin_count == 0 {
            return Err(StorageError::PinCountUnderflow { slot: self.slot });
        }
        self.pin_count -= 1;
        Ok(())
    }

    /// Record a pin event for the replacement policies.
    pub fn touch(&mut self, tick: u64) {
        self.last_access = tick;
        self.reference_bit = true;
    }

    pub fn last_access(&self) -> u64 {
        self.last_access
    }

    pub fn reference_bit(&self) -> bool {
        self.reference_bit
    }

    pub fn clear_reference_bit(&mut self) {
        self.reference_bit = false;
    }

    pub fn dirty_by(&self) -> Option<TransactionId> {
        self.dirty_by
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty_by.is_some()
    }

    pub fn is_modified_by(&self, txn: TransactionId) -> bool {
        self.dirty_by == Some(txn)
    }

    pub fn mark_dirty(&mut self, txn: TransactionId) {
        self.dirty_by = Some(txn);
    }

    /// Hand the frame a new block. Any previous assignment is dropped along
    /// with its dirty marker and reference bit; callers flush first.
    pub fn assign(&mut self, block: BlockId, page: Page) {
        self.block = Some(block);
        self.page = page;
        self.dirty_by = None;
        self.reference_bit = false;
    }

    /// Write the contents back if some transaction modified them.
    /// Returns whether a write happened.
    pub fn flush(&mut self, disk: &mut dyn DiskManager) -> StorageResult<bool> {
        match (&self.block, self.dirty_by) {
            (Some(block), Some(_)) => {
                disk.write_block(block, &self.page)?;
                self.dirty_by = None;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    #[cfg(test)]
    pub(crate) fn set_last_access(&mut self, tick: u64) {
        self.last_access = tick;
    }

    #[cfg(test)]
    pub(crate) fn set_reference_bit(&mut self, bit: bool) {
        self.reference_bit = bit;
    }
}
