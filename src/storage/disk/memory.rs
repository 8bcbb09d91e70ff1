use crate::storage::disk::DiskManager;
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::page::{BlockId, Page};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// A disk that lives entirely in memory.
///
/// Clones share the same blocks, so a test can hand one clone to a pool and
/// keep another to inspect what the pool wrote and how often it did I/O.
#[derive(Debug, Clone, Default)]
pub struct MemoryDiskManager {
    inner: Arc<Mutex<MemoryDisk>>,
}

#[derive(Debug, Default)]
struct MemoryDisk {
    files: HashMap<String, Vec<Page>>,
    reads: usize,
    writes: usize,
}

impl MemoryDiskManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reads(&self) -> usize {
        self.inner.lock().reads
    }

    pub fn writes(&self) -> usize {
        self.inner.lock().writes
    }

    /// Contents of `block` as last written, bypassing any cache.
    pub fn block(&self, block: &BlockId) -> Option<Page> {
        self.inner
            .lock()
            .files
            .get(block.file_name())
            .and_then(|blocks| blocks.get(block.block_num() as usize))
            .cloned()
    }
}

impl DiskManager for MemoryDiskManager {
    fn read_block(&mut self, block: &BlockId, page: &mut Page) -> StorageResult<()> {
        let mut disk = self.inner.lock();
        let stored = disk
            .files
            .get(block.file_name())
            .and_then(|blocks| blocks.get(block.block_num() as usize))
            .ok_or_else(|| StorageError::BlockNotFound(block.clone()))?;
        page.data_mut().copy_from_slice(stored.data());
        disk.reads += 1;
        Ok(())
    }

    fn write_block(&mut self, block: &BlockId, page: &Page) -> StorageResult<()> {
        let mut disk = self.inner.lock();
        let blocks = disk.files.entry(block.file_name().to_string()).or_default();
        let index = block.block_num() as usize;
        if index >= blocks.len() {
            blocks.resize_with(index + 1, Page::new);
        }
        blocks[index] = page.clone();
        disk.writes += 1;
        Ok(())
    }

    fn append_new_block(&mut self, file_name: &str) -> StorageResult<BlockId> {
        let mut disk = self.inner.lock();
        let blocks = disk.files.entry(file_name.to_string()).or_default();
        blocks.push(Page::new());
        Ok(BlockId::new(file_name, (blocks.len() - 1) as u32))
    }

    fn block_count(&mut self, file_name: &str) -> StorageResult<u32> {
        let disk = self.inner.lock();
        Ok(disk.files.get(file_name).map_or(0, |blocks| blocks.len() as u32))
    }
}
