use crate::storage::error::{StorageError, StorageResult};
use byteorder::{BigEndian, ByteOrder};
use std::fmt;

/// Size of a disk block and of every cached page.
pub const PAGE_SIZE: usize = 4096;

/// Logical identity of a disk-resident block: file name plus block number.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId {
    file_name: String,
    block_num: u32,
}

impl BlockId {
    pub fn new(file_name: impl Into<String>, block_num: u32) -> Self {
        Self {
            file_name: file_name.into(),
            block_num,
        }
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn block_num(&self) -> u32 {
        self.block_num
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[file {}, block {}]", self.file_name, self.block_num)
    }
}

/// The contents of one block held in memory.
///
/// Integers are stored big-endian. Strings are stored as a 4-byte length
/// followed by their UTF-8 bytes.
#[derive(Clone, PartialEq, Eq)]
pub struct Page {
    data: Box<[u8; PAGE_SIZE]>,
}

impl Page {
    pub fn new() -> Self {
        Self {
            data: Box::new([0u8; PAGE_SIZE]),
        }
    }

    pub fn data(&self) -> &[u8; PAGE_SIZE] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8; PAGE_SIZE] {
        &mut self.data
    }

    pub fn get_i32(&self, offset: usize) -> StorageResult<i32> {
        let bytes = self.slice(offset, 4)?;
        Ok(BigEndian::read_i32(bytes))
    }

    pub fn set_i32(&mut self, offset: usize, value: i32) -> StorageResult<()> {
        let bytes = self.slice_mut(offset, 4)?;
        BigEndian::write_i32(bytes, value);
        Ok(())
    }

    pub fn get_string(&self, offset: usize) -> StorageResult<String> {
        let len = self.get_i32(offset)?;
        let len = usize::try_from(len).map_err(|_| StorageError::OffsetOutOfBounds {
            offset,
            len: 4,
        })?;
        let bytes = self.slice(offset + 4, len)?;
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }

    pub fn set_string(&mut self, offset: usize, value: &str) -> StorageResult<()> {
        let bytes = value.as_bytes();
        // Check the whole record fits before touching the length prefix.
        self.slice(offset, 4 + bytes.len())?;
        self.set_i32(offset, bytes.len() as i32)?;
        self.slice_mut(offset + 4, bytes.len())?.copy_from_slice(bytes);
        Ok(())
    }

    fn slice(&self, offset: usize, len: usize) -> StorageResult<&[u8]> {
        match offset.checked_add(len) {
            Some(end) if end <= PAGE_SIZE => Ok(&self.data[offset..end]),
            _ => Err(StorageError::OffsetOutOfBounds { offset, len }),
        }
    }

    fn slice_mut(&mut self, offset: usize, len: usize) -> StorageResult<&mut [u8]> {
        match offset.checked_add(len) {
            Some(end) if end <= PAGE_SIZE => Ok(&mut self.data[offset..end]),
            _ => Err(StorageError::OffsetOutOfBounds { offset, len }),
        }
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Page {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let used = self.data.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
        f.debug_struct("Page").field("used_bytes", &used).finish()
    }
}
