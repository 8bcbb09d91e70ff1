//! Disk collaborators consumed by the buffer pool.
//!
//! The pool never computes file offsets; it asks a [`DiskManager`] to move
//! whole blocks between disk and memory.

pub mod file_manager;
pub mod memory;

use crate::storage::error::StorageResult;
use crate::storage::page::{BlockId, Page};

pub use file_manager::FileDiskManager;
pub use memory::MemoryDiskManager;

pub trait DiskManager: Send {
    /// Read the contents of `block` into `page`.
    fn read_block(&mut self, block: &BlockId, page: &mut Page) -> StorageResult<()>;

    /// Write `page` to `block`.
    fn write_block(&mut self, block: &BlockId, page: &Page) -> StorageResult<()>;

    /// Extend `file_name` by one zeroed block and return its identity.
    fn append_new_block(&mut self, file_name: &str) -> StorageResult<BlockId>;

    /// Number of blocks currently in `file_name`.
    fn block_count(&mut self, file_name: &str) -> StorageResult<u32>;
}
