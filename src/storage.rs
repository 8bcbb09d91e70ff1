//! Storage layer.
//!
//! - **Page**: fixed-size (4KB) block contents, the unit of I/O
//! - **DiskManager**: moves whole blocks between files and memory
//! - **BufferPoolManager**: fixed set of frames caching blocks, with pin
//!   counting and naive, LRU or clock replacement

pub mod buffer;
pub mod disk;
pub mod error;
pub mod page;

pub use buffer::{BufferPoolManager, FrameHandle, FrameInfo, PoolStats, ReplacementPolicy};
pub use disk::{DiskManager, FileDiskManager, MemoryDiskManager};
pub use error::{StorageError, StorageResult};
pub use page::{BlockId, Page, PAGE_SIZE};
