pub mod clock;
pub mod frame;
pub mod free_list;
pub mod lru;
pub mod naive;
pub mod page_table;
pub mod replacer;

use crate::config::PoolConfig;
use crate::storage::disk::DiskManager;
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::page::{BlockId, Page};
use crate::transaction::TransactionId;
use frame::Frame;
use free_list::FreeList;
use log::{debug, error, info, trace};
use page_table::PageTable;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

pub use replacer::{FrameId, ReplacementPolicy, Replacer};

/// How long `pin_with_retry` sleeps between attempts.
const RETRY_INTERVAL: Duration = Duration::from_millis(5);

/// A pinned frame, as returned by `pin` and `pin_new`.
///
/// The handle names the slot and the block it was pinned for. Every pin must
/// be paired with exactly one `unpin`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameHandle {
    slot: FrameId,
    block: BlockId,
}

impl FrameHandle {
    pub fn slot(&self) -> FrameId {
        self.slot
    }

    pub fn block(&self) -> &BlockId {
        &self.block
    }
}

/// Counters describing how the pool has been used.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub flushes: u64,
}

impl PoolStats {
    pub fn hit_ratio(&self) -> f64 {
        let lookups = self.hits + self.misses;
        if lookups == 0 {
            0.0
        } else {
            self.hits as f64 / lookups as f64
        }
    }
}

/// Point-in-time view of one frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameInfo {
    pub slot: FrameId,
    pub block: Option<BlockId>,
    pub pin_count: u32,
    pub dirty_by: Option<TransactionId>,
}

impl fmt::Display for FrameInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.block {
            Some(block) => write!(f, "#{:<3} {} pins={}", self.slot, block, self.pin_count)?,
            None => write!(f, "#{:<3} <free>", self.slot)?,
        }
        if let Some(txn) = self.dirty_by {
            write!(f, " dirty({})", txn)?;
        }
        Ok(())
    }
}

/// The buffer pool manager.
///
/// All state sits behind one lock, so every operation is atomic with respect
/// to the others. Cloning yields another handle to the same pool.
#[derive(Clone)]
pub struct BufferPoolManager {
    inner: Arc<Mutex<BufferPool>>,
}

struct BufferPool {
    frames: Vec<Frame>,
    page_table: PageTable,
    free_list: FreeList,
    replacer: Box<dyn Replacer>,
    disk: Box<dyn DiskManager>,
    available: usize,
    tick: u64,
    stats: PoolStats,
}

/// Where a slot for a new assignment came from.
#[derive(Debug, Clone, Copy)]
enum Candidate {
    Free(FrameId),
    Victim(FrameId),
}

impl Candidate {
    fn slot(self) -> FrameId {
        match self {
            Candidate::Free(slot) | Candidate::Victim(slot) => slot,
        }
    }
}

impl BufferPoolManager {
    pub fn new(
        disk: impl DiskManager + 'static,
        capacity: usize,
        policy: ReplacementPolicy,
    ) -> StorageResult<Self> {
        if capacity == 0 {
            return Err(StorageError::InvalidCapacity(capacity));
        }

        info!("buffer pool created: {} frames, {} replacement", capacity, policy);

        Ok(Self {
            inner: Arc::new(Mutex::new(BufferPool {
                frames: (0..capacity).map(Frame::new).collect(),
                page_table: PageTable::new(capacity),
                free_list: FreeList::new(capacity),
                replacer: policy.build(),
                disk: Box::new(disk),
                available: capacity,
                tick: 0,
                stats: PoolStats::default(),
            })),
        })
    }

    pub fn from_config(disk: impl DiskManager + 'static, config: &PoolConfig) -> StorageResult<Self> {
        Self::new(disk, config.capacity, config.policy)
    }

    /// Pin `block`, reading it from disk if it is not cached.
    ///
    /// Fails with `Exhausted` when every frame is pinned. Errors from the
    /// disk leave the pool as it was.
    pub fn pin(&self, block: &BlockId) -> StorageResult<FrameHandle> {
        self.inner.lock().pin(block)
    }

    /// Append a new block to `file_name`, format it and pin it.
    pub fn pin_new<F>(&self, file_name: &str, formatter: F) -> StorageResult<FrameHandle>
    where
        F: FnOnce(&mut Page),
    {
        self.inner.lock().pin_new(file_name, formatter)
    }

    /// Keep calling `pin` until it succeeds or `timeout` passes.
    ///
    /// The pool lock is released between attempts so other threads can unpin.
    pub fn pin_with_retry(&self, block: &BlockId, timeout: Duration) -> StorageResult<FrameHandle> {
        let deadline = Instant::now() + timeout;
        loop {
            match self.pin(block) {
                Err(StorageError::Exhausted) if Instant::now() < deadline => {
                    thread::sleep(RETRY_INTERVAL);
                }
                result => return result,
            }
        }
    }

    pub fn unpin(&self, handle: &FrameHandle) -> StorageResult<()> {
        self.inner.lock().unpin(handle)
    }

    /// Write back every frame last modified by `txn`.
    pub fn flush_all(&self, txn: TransactionId) -> StorageResult<()> {
        self.inner.lock().flush_all(txn)
    }

    /// Number of frames that are not pinned.
    pub fn available(&self) -> usize {
        self.inner.lock().available
    }

    /// Read the page behind `handle`.
    ///
    /// `f` runs with the pool locked and must not call back into the pool,
    /// or it deadlocks.
    pub fn read_page<R>(&self, handle: &FrameHandle, f: impl FnOnce(&Page) -> R) -> StorageResult<R> {
        let mut pool = self.inner.lock();
        let frame = pool.frame_for(handle)?;
        Ok(f(frame.page()))
    }

    /// Modify the page behind `handle` on behalf of `txn`, marking it dirty.
    ///
    /// As with `read_page`, `f` must not call back into the pool.
    pub fn write_page<R>(
        &self,
        handle: &FrameHandle,
        txn: TransactionId,
        f: impl FnOnce(&mut Page) -> R,
    ) -> StorageResult<R> {
        let mut pool = self.inner.lock();
        let frame = pool.frame_for(handle)?;
        frame.mark_dirty(txn);
        Ok(f(frame.page_mut()))
    }

    pub fn capacity(&self) -> usize {
        self.inner.lock().frames.len()
    }

    pub fn policy(&self) -> ReplacementPolicy {
        self.inner.lock().replacer.policy()
    }

    pub fn is_cached(&self, block: &BlockId) -> bool {
        self.inner.lock().page_table.lookup(block).is_some()
    }

    pub fn stats(&self) -> PoolStats {
        self.inner.lock().stats
    }

    pub fn snapshot(&self) -> Vec<FrameInfo> {
        self.inner
            .lock()
            .frames
            .iter()
            .map(|frame| FrameInfo {
                slot: frame.slot(),
                block: frame.block().cloned(),
                pin_count: frame.pin_count(),
                dirty_by: frame.dirty_by(),
            })
            .collect()
    }
}

impl BufferPool {
    fn pin(&mut self, block: &BlockId) -> StorageResult<FrameHandle> {
        if let Some(slot) = self.page_table.lookup(block) {
            self.stats.hits += 1;
            self.pin_slot(slot);
            return Ok(FrameHandle {
                slot,
                block: block.clone(),
            });
        }

        let candidate = self.choose_slot()?;
        if let Err(err) = self.load(candidate.slot(), block) {
            self.give_back(candidate);
            return Err(err);
        }
        self.stats.misses += 1;
        self.pin_slot(candidate.slot());

        Ok(FrameHandle {
            slot: candidate.slot(),
            block: block.clone(),
        })
    }

    fn pin_new<F>(&mut self, file_name: &str, formatter: F) -> StorageResult<FrameHandle>
    where
        F: FnOnce(&mut Page),
    {
        let candidate = self.choose_slot()?;
        let block = match self.allocate(candidate.slot(), file_name, formatter) {
            Ok(block) => block,
            Err(err) => {
                self.give_back(candidate);
                return Err(err);
            }
        };
        self.pin_slot(candidate.slot());

        Ok(FrameHandle {
            slot: candidate.slot(),
            block,
        })
    }

    fn unpin(&mut self, handle: &FrameHandle) -> StorageResult<()> {
        let frame = self.frame_for(handle)?;
        if let Err(err) = frame.unpin() {
            error!("unpin of {} in frame {} without a matching pin", handle.block, handle.slot);
            return Err(err);
        }
        if !frame.is_pinned() {
            self.available += 1;
        }
        Ok(())
    }

    fn flush_all(&mut self, txn: TransactionId) -> StorageResult<()> {
        let mut flushed = 0;
        for frame in self.frames.iter_mut().filter(|f| f.is_modified_by(txn)) {
            if frame.flush(self.disk.as_mut())? {
                flushed += 1;
            }
        }
        self.stats.flushes += flushed;
        debug!("flushed {} frames for {}", flushed, txn);
        Ok(())
    }

    fn frame_for(&mut self, handle: &FrameHandle) -> StorageResult<&mut Frame> {
        match self.frames.get_mut(handle.slot) {
            Some(frame) if frame.block() == Some(&handle.block) => Ok(frame),
            _ => Err(StorageError::StaleHandle {
                slot: handle.slot,
                block: handle.block.clone(),
            }),
        }
    }

    fn pin_slot(&mut self, slot: FrameId) {
        self.tick += 1;
        let frame = &mut self.frames[slot];
        if !frame.is_pinned() {
            self.available -= 1;
        }
        frame.touch(self.tick);
        frame.pin();
    }

    /// Find a slot for a new block: a free one if any, else a victim.
    fn choose_slot(&mut self) -> StorageResult<Candidate> {
        if let Some(slot) = self.free_list.take_any() {
            return Ok(Candidate::Free(slot));
        }
        match self.replacer.evict(&mut self.frames) {
            Some(slot) => Ok(Candidate::Victim(slot)),
            None => {
                debug!("no unpinned frame among {}", self.frames.len());
                Err(StorageError::Exhausted)
            }
        }
    }

    /// Undo `choose_slot` after a failed disk operation.
    fn give_back(&mut self, candidate: Candidate) {
        // A victim was never modified, so it stays where it is. The replacer's
        // own state is not rewound: a clock arm stays advanced and the bits
        // it cleared stay cleared.
        if let Candidate::Free(slot) = candidate {
            self.free_list.release(slot);
        }
    }

    fn load(&mut self, slot: FrameId, block: &BlockId) -> StorageResult<()> {
        let mut page = Page::new();
        self.disk.read_block(block, &mut page)?;
        self.write_back(slot)?;
        self.reassign(slot, block.clone(), page);
        Ok(())
    }

    fn allocate<F>(&mut self, slot: FrameId, file_name: &str, formatter: F) -> StorageResult<BlockId>
    where
        F: FnOnce(&mut Page),
    {
        self.write_back(slot)?;
        let block = self.disk.append_new_block(file_name)?;
        let mut page = Page::new();
        formatter(&mut page);
        self.disk.write_block(&block, &page)?;
        self.reassign(slot, block.clone(), page);
        Ok(block)
    }

    fn write_back(&mut self, slot: FrameId) -> StorageResult<()> {
        if self.frames[slot].flush(self.disk.as_mut())? {
            self.stats.flushes += 1;
        }
        Ok(())
    }

    fn reassign(&mut self, slot: FrameId, block: BlockId, page: Page) {
        let frame = &mut self.frames[slot];
        // Frames fresh from the free list have nothing to unlink.
        if let Some(old) = frame.block() {
            trace!("evicting {} from frame {}", old, slot);
            self.page_table.remove(old);
            self.stats.evictions += 1;
        }
        trace!("frame {} now holds {}", slot, block);
        frame.assign(block.clone(), page);
        self.page_table.insert(block, slot);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::disk::{FileDiskManager, MemoryDiskManager};
    use std::io;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tempfile::tempdir;

    const FILE: &str = "test.tbl";

    const POLICIES: [ReplacementPolicy; 3] = [
        ReplacementPolicy::Naive,
        ReplacementPolicy::Lru,
        ReplacementPolicy::Clock,
    ];

    /// A `MemoryDiskManager` whose appends and writes can be switched to fail.
    #[derive(Clone, Default)]
    struct FaultyDisk {
        disk: MemoryDiskManager,
        fail_append: Arc<AtomicBool>,
        fail_write: Arc<AtomicBool>,
    }

    impl FaultyDisk {
        fn check(flag: &AtomicBool, op: &str) -> StorageResult<()> {
            if flag.load(Ordering::SeqCst) {
                return Err(io::Error::new(io::ErrorKind::Other, format!("{} failed", op)).into());
            }
            Ok(())
        }
    }

    impl DiskManager for FaultyDisk {
        fn read_block(&mut self, block: &BlockId, page: &mut Page) -> StorageResult<()> {
            self.disk.read_block(block, page)
        }

        fn write_block(&mut self, block: &BlockId, page: &Page) -> StorageResult<()> {
            Self::check(&self.fail_write, "write")?;
            self.disk.write_block(block, page)
        }

        fn append_new_block(&mut self, file_name: &str) -> StorageResult<BlockId> {
            Self::check(&self.fail_append, "append")?;
            self.disk.append_new_block(file_name)
        }

        fn block_count(&mut self, file_name: &str) -> StorageResult<u32> {
            self.disk.block_count(file_name)
        }
    }

    fn create_faulty_buffer_pool(
        capacity: usize,
        policy: ReplacementPolicy,
    ) -> StorageResult<(BufferPoolManager, FaultyDisk)> {
        let disk = FaultyDisk {
            disk: seeded_disk(16),
            ..FaultyDisk::default()
        };
        let pool = BufferPoolManager::new(disk.clone(), capacity, policy)?;
        Ok((pool, disk))
    }

    fn seeded_disk(blocks: u32) -> MemoryDiskManager {
        let mut disk = MemoryDiskManager::new();
        for i in 0..blocks {
            let block = disk.append_new_block(FILE).unwrap();
            let mut page = Page::new();
            page.set_i32(0, i as i32).unwrap();
            disk.write_block(&block, &page).unwrap();
        }
        disk
    }

    fn block(n: u32) -> BlockId {
        BlockId::new(FILE, n)
    }

    fn create_test_buffer_pool(
        capacity: usize,
        policy: ReplacementPolicy,
    ) -> StorageResult<(BufferPoolManager, MemoryDiskManager)> {
        let disk = seeded_disk(16);
        let pool = BufferPoolManager::new(disk.clone(), capacity, policy)?;
        Ok((pool, disk))
    }

    /// Checks that frames, page table and counters agree.
    fn assert_consistent(pool: &BufferPoolManager) {
        let inner = pool.inner.lock();
        let unpinned = inner.frames.iter().filter(|f| !f.is_pinned()).count();
        assert_eq!(inner.available, unpinned);

        let assigned: Vec<_> = inner.frames.iter().filter(|f| f.block().is_some()).collect();
        assert_eq!(inner.page_table.len(), assigned.len());
        for frame in assigned {
            let block = frame.block().unwrap();
            assert_eq!(inner.page_table.lookup(block), Some(frame.slot()));
        }
    }

    #[test]
    fn test_pin_reads_block() -> StorageResult<()> {
        let (pool, _) = create_test_buffer_pool(4, ReplacementPolicy::Naive)?;

        let handle = pool.pin(&block(3))?;
        assert_eq!(handle.block(), &block(3));
        assert_eq!(pool.read_page(&handle, |page| page.get_i32(0))??, 3);
        assert_eq!(pool.available(), 3);
        assert_consistent(&pool);

        Ok(())
    }

    #[test]
    fn test_pin_same_block_twice() -> StorageResult<()> {
        let (pool, disk) = create_test_buffer_pool(4, ReplacementPolicy::Lru)?;

        let first = pool.pin(&block(1))?;
        let second = pool.pin(&block(1))?;
        assert_eq!(first, second);
        assert_eq!(pool.available(), 3);
        assert_eq!(disk.reads(), 1);

        let pinned: Vec<_> = pool.snapshot().into_iter().filter(|f| f.pin_count > 0).collect();
        assert_eq!(pinned.len(), 1);
        assert_eq!(pinned[0].pin_count, 2);

        pool.unpin(&first)?;
        assert_eq!(pool.available(), 3);
        pool.unpin(&second)?;
        assert_eq!(pool.available(), 4);
        assert_consistent(&pool);

        Ok(())
    }

    #[test]
    fn test_exhaustion_leaves_state_unchanged() -> StorageResult<()> {
        let (pool, disk) = create_test_buffer_pool(1, ReplacementPolicy::Clock)?;

        let held = pool.pin(&block(0))?;
        let before = pool.snapshot();

        let result = pool.pin(&block(1));
        assert!(matches!(result, Err(StorageError::Exhausted)));
        assert_eq!(pool.snapshot(), before);
        assert_eq!(pool.available(), 0);
        assert!(!pool.is_cached(&block(1)));
        assert_eq!(disk.reads(), 1);

        let result = pool.pin_new(FILE, |_| {});
        assert!(matches!(result, Err(StorageError::Exhausted)));

        pool.unpin(&held)?;
        assert!(pool.pin(&block(1)).is_ok());
        assert_consistent(&pool);

        Ok(())
    }

    #[test]
    fn test_unpin_underflow() -> StorageResult<()> {
        let (pool, _) = create_test_buffer_pool(2, ReplacementPolicy::Naive)?;

        let handle = pool.pin(&block(0))?;
        pool.unpin(&handle)?;
        assert_eq!(pool.available(), 2);

        let err = pool.unpin(&handle).unwrap_err();
        assert!(matches!(err, StorageError::PinCountUnderflow { slot: 0 }));
        assert_eq!(pool.available(), 2);
        assert_consistent(&pool);

        Ok(())
    }

    #[test]
    fn test_evicted_block_leaves_index() -> StorageResult<()> {
        let (pool, _) = create_test_buffer_pool(2, ReplacementPolicy::Naive)?;

        for n in 0..2 {
            let handle = pool.pin(&block(n))?;
            pool.unpin(&handle)?;
        }
        let handle = pool.pin(&block(5))?;
        assert_eq!(handle.slot(), 0);
        assert!(!pool.is_cached(&block(0)));
        assert!(pool.is_cached(&block(1)));
        assert!(pool.is_cached(&block(5)));
        assert_eq!(pool.stats().evictions, 1);

        // The old handle no longer names what the frame holds.
        let stale = FrameHandle {
            slot: 0,
            block: block(0),
        };
        assert!(matches!(pool.unpin(&stale), Err(StorageError::StaleHandle { .. })));
        assert_consistent(&pool);

        Ok(())
    }

    #[test]
    fn test_free_slots_preferred_over_eviction() -> StorageResult<()> {
        for policy in POLICIES {
            let (pool, _) = create_test_buffer_pool(3, policy)?;
            let handle = pool.pin(&block(0))?;
            pool.unpin(&handle)?;

            // Slot 0 is unpinned, but free slots 1 and 2 go first.
            assert_eq!(pool.pin(&block(1))?.slot(), 1);
            assert_eq!(pool.pin(&block(2))?.slot(), 2);
            assert!(pool.is_cached(&block(0)));
            assert_eq!(pool.stats().evictions, 0);
        }
        Ok(())
    }

    #[test]
    fn test_lru_evicts_least_recently_pinned() -> StorageResult<()> {
        let (pool, _) = create_test_buffer_pool(3, ReplacementPolicy::Lru)?;

        for n in [0, 1, 2] {
            let handle = pool.pin(&block(n))?;
            pool.unpin(&handle)?;
        }
        // Touch block 0 again so block 1 becomes the oldest.
        let handle = pool.pin(&block(0))?;
        pool.unpin(&handle)?;

        let handle = pool.pin(&block(9))?;
        assert_eq!(handle.slot(), 1);
        assert!(!pool.is_cached(&block(1)));
        assert!(pool.is_cached(&block(0)));
        assert!(pool.is_cached(&block(2)));

        Ok(())
    }

    #[test]
    fn test_clock_gives_second_chance() -> StorageResult<()> {
        let (pool, _) = create_test_buffer_pool(2, ReplacementPolicy::Clock)?;

        let a = pool.pin(&block(0))?;
        let b = pool.pin(&block(1))?;
        pool.unpin(&a)?;
        pool.unpin(&b)?;

        // Both bits are set: the arm clears 0 and 1, wraps, and takes 0.
        let c = pool.pin(&block(2))?;
        assert_eq!(c.slot(), 0);
        pool.unpin(&c)?;

        // Frame 1 lost its bit on the previous sweep.
        let d = pool.pin(&block(3))?;
        assert_eq!(d.slot(), 1);
        assert!(pool.is_cached(&block(2)));
        assert_consistent(&pool);

        Ok(())
    }

    #[test]
    fn test_dirty_victim_written_back() -> StorageResult<()> {
        let (pool, disk) = create_test_buffer_pool(1, ReplacementPolicy::Naive)?;
        let txn = TransactionId::new(1);

        let handle = pool.pin(&block(0))?;
        pool.write_page(&handle, txn, |page| page.set_i32(0, 500))??;
        pool.unpin(&handle)?;

        let writes = disk.writes();
        let other = pool.pin(&block(1))?;
        assert_eq!(disk.writes(), writes + 1);
        assert_eq!(disk.block(&block(0)).unwrap().get_i32(0)?, 500);
        pool.unpin(&other)?;

        let handle = pool.pin(&block(0))?;
        assert_eq!(pool.read_page(&handle, |page| page.get_i32(0))??, 500);

        Ok(())
    }

    #[test]
    fn test_flush_all_by_transaction() -> StorageResult<()> {
        let (pool, disk) = create_test_buffer_pool(4, ReplacementPolicy::Lru)?;
        let t1 = TransactionId::new(1);
        let t2 = TransactionId::new(2);

        let h0 = pool.pin(&block(0))?;
        let h1 = pool.pin(&block(1))?;
        let h2 = pool.pin(&block(2))?;
        pool.write_page(&h0, t1, |page| page.set_i32(0, 100))??;
        pool.write_page(&h1, t2, |page| page.set_i32(0, 200))??;
        pool.write_page(&h2, t1, |page| page.set_i32(0, 300))??;

        let writes = disk.writes();
        pool.flush_all(t1)?;
        assert_eq!(disk.writes(), writes + 2);
        assert_eq!(disk.block(&block(0)).unwrap().get_i32(0)?, 100);
        assert_eq!(disk.block(&block(2)).unwrap().get_i32(0)?, 300);
        assert_eq!(disk.block(&block(1)).unwrap().get_i32(0)?, 1);

        let dirty: Vec<_> = pool.snapshot().into_iter().filter_map(|f| f.dirty_by).collect();
        assert_eq!(dirty, vec![t2]);

        // Nothing left for t1.
        pool.flush_all(t1)?;
        assert_eq!(disk.writes(), writes + 2);

        Ok(())
    }

    #[test]
    fn test_failed_load_rolls_back() -> StorageResult<()> {
        let (pool, _) = create_test_buffer_pool(2, ReplacementPolicy::Lru)?;

        let missing = BlockId::new("missing.tbl", 0);
        assert!(matches!(pool.pin(&missing), Err(StorageError::BlockNotFound(_))));
        assert_eq!(pool.available(), 2);
        assert!(!pool.is_cached(&missing));

        // The free slot went back and is used next.
        assert_eq!(pool.pin(&block(0))?.slot(), 0);

        // Same for a victim chosen by the policy.
        let h = pool.pin(&block(1))?;
        pool.unpin(&h)?;
        assert!(pool.pin(&missing).is_err());
        assert!(pool.is_cached(&block(1)));
        assert_consistent(&pool);

        Ok(())
    }

    #[test]
    fn test_failed_append_releases_free_slot() -> StorageResult<()> {
        for policy in POLICIES {
            let (pool, disk) = create_faulty_buffer_pool(3, policy)?;

            disk.fail_append.store(true, Ordering::SeqCst);
            let result = pool.pin_new(FILE, |_| {});
            assert!(matches!(result, Err(StorageError::Io(_))), "{}", policy);
            assert_eq!(pool.available(), 3);
            assert!(!pool.is_cached(&block(16)));
            assert!(disk.disk.block(&block(16)).is_none());
            assert_consistent(&pool);

            // Slot 0 went back to the front of the free list.
            disk.fail_append.store(false, Ordering::SeqCst);
            assert_eq!(pool.pin(&block(0))?.slot(), 0);
            let handle = pool.pin_new(FILE, |_| {})?;
            assert_eq!(handle.slot(), 1);
            assert_eq!(handle.block(), &block(16));
            assert_eq!(pool.stats().evictions, 0);
            assert_consistent(&pool);
        }
        Ok(())
    }

    #[test]
    fn test_failed_format_write_releases_free_slot() -> StorageResult<()> {
        for policy in POLICIES {
            let (pool, disk) = create_faulty_buffer_pool(2, policy)?;

            disk.fail_write.store(true, Ordering::SeqCst);
            let result = pool.pin_new(FILE, |page| {
                page.set_i32(0, 77).unwrap();
            });
            assert!(matches!(result, Err(StorageError::Io(_))), "{}", policy);
            assert_eq!(pool.available(), 2);
            assert!(!pool.is_cached(&block(16)));
            assert!(pool.snapshot().iter().all(|f| f.block.is_none()));
            assert_consistent(&pool);

            // The appended block stays on disk; the next one follows it.
            disk.fail_write.store(false, Ordering::SeqCst);
            let handle = pool.pin_new(FILE, |_| {})?;
            assert_eq!(handle.slot(), 0);
            assert_eq!(handle.block(), &block(17));
            assert_consistent(&pool);
        }
        Ok(())
    }

    #[test]
    fn test_failed_write_back_keeps_dirty_victim() -> StorageResult<()> {
        let txn = TransactionId::new(1);
        for policy in POLICIES {
            let (pool, disk) = create_faulty_buffer_pool(1, policy)?;

            let handle = pool.pin(&block(0))?;
            pool.write_page(&handle, txn, |page| page.set_i32(0, 500))??;
            pool.unpin(&handle)?;

            disk.fail_write.store(true, Ordering::SeqCst);
            let result = pool.pin(&block(1));
            assert!(matches!(result, Err(StorageError::Io(_))), "{}", policy);
            let result = pool.pin_new(FILE, |_| {});
            assert!(matches!(result, Err(StorageError::Io(_))), "{}", policy);

            let frames = pool.snapshot();
            assert_eq!(frames[0].block, Some(block(0)));
            assert_eq!(frames[0].dirty_by, Some(txn));
            assert_eq!(frames[0].pin_count, 0);
            assert_eq!(pool.available(), 1);
            assert!(pool.is_cached(&block(0)));
            assert!(!pool.is_cached(&block(1)));
            assert!(disk.disk.block(&block(16)).is_none());
            assert_eq!(disk.disk.block(&block(0)).unwrap().get_i32(0)?, 0);
            assert_eq!(pool.stats().evictions, 0);
            assert_consistent(&pool);

            disk.fail_write.store(false, Ordering::SeqCst);
            let handle = pool.pin(&block(1))?;
            assert_eq!(handle.slot(), 0);
            assert_eq!(disk.disk.block(&block(0)).unwrap().get_i32(0)?, 500);
            assert_consistent(&pool);
        }
        Ok(())
    }

    #[test]
    fn test_pin_new_formats_block() -> StorageResult<()> {
        let (pool, disk) = create_test_buffer_pool(2, ReplacementPolicy::Clock)?;

        let handle = pool.pin_new("fresh.tbl", |page| {
            page.set_string(0, "Stratton Hall").unwrap();
        })?;
        assert_eq!(handle.block(), &BlockId::new("fresh.tbl", 0));
        assert!(pool.is_cached(handle.block()));
        assert_eq!(pool.read_page(&handle, |page| page.get_string(0))??, "Stratton Hall");

        // The formatted contents are already on disk.
        let stored = disk.block(handle.block()).unwrap();
        assert_eq!(stored.get_string(0)?, "Stratton Hall");

        let next = pool.pin_new("fresh.tbl", |_| {})?;
        assert_eq!(next.block().block_num(), 1);
        assert_eq!(pool.available(), 0);
        assert_consistent(&pool);

        Ok(())
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let result = BufferPoolManager::new(MemoryDiskManager::new(), 0, ReplacementPolicy::Naive);
        assert!(matches!(result, Err(StorageError::InvalidCapacity(0))));
    }

    #[test]
    fn test_stats() -> StorageResult<()> {
        let (pool, _) = create_test_buffer_pool(2, ReplacementPolicy::Lru)?;

        let h = pool.pin(&block(0))?;
        pool.unpin(&h)?;
        let h = pool.pin(&block(0))?;
        pool.unpin(&h)?;

        let stats = pool.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert!((stats.hit_ratio() - 0.5).abs() < f64::EPSILON);

        Ok(())
    }

    #[test]
    fn test_file_backed_eviction() -> StorageResult<()> {
        let dir = tempdir()?;
        let pool = BufferPoolManager::new(FileDiskManager::new(dir.path())?, 2, ReplacementPolicy::Lru)?;
        let txn = TransactionId::new(7);

        let mut blocks = Vec::new();
        for i in 0..3 {
            let handle = pool.pin_new("heap.tbl", |_| {})?;
            pool.write_page(&handle, txn, |page| page.set_i32(0, i * 10))??;
            blocks.push(handle.block().clone());
            pool.unpin(&handle)?;
        }

        // The first block was evicted and must come back from disk.
        assert!(!pool.is_cached(&blocks[0]));
        let handle = pool.pin(&blocks[0])?;
        assert_eq!(pool.read_page(&handle, |page| page.get_i32(0))??, 0);

        Ok(())
    }

    #[test]
    fn test_snapshot_display() -> StorageResult<()> {
        let (pool, _) = create_test_buffer_pool(2, ReplacementPolicy::Naive)?;
        let handle = pool.pin(&block(4))?;
        pool.write_page(&handle, TransactionId::new(2), |_| ())?;

        let lines: Vec<String> = pool.snapshot().iter().map(ToString::to_string).collect();
        assert_eq!(lines[0], "#0   [file test.tbl, block 4] pins=1 dirty(Txn2)");
        assert_eq!(lines[1], "#1   <free>");

        Ok(())
    }
}
