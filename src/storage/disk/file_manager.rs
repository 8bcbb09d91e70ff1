use crate::storage::disk::DiskManager;
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::page::{BlockId, Page, PAGE_SIZE};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Stores each named file as a plain file in a data directory.
///
/// Block `n` of a file lives at byte offset `n * PAGE_SIZE`. Files are opened
/// lazily and kept open. Reads never create a file; writes and appends do.
pub struct FileDiskManager {
    data_dir: PathBuf,
    open_files: HashMap<String, File>,
}

impl FileDiskManager {
    pub fn new(data_dir: impl AsRef<Path>) -> StorageResult<Self> {
        let data_dir = data_dir.as_ref().to_path_buf();
        fs::create_dir_all(&data_dir)?;
        Ok(Self {
            data_dir,
            open_files: HashMap::new(),
        })
    }

    fn file(&mut self, file_name: &str) -> StorageResult<&mut File> {
        match self.open_files.entry(file_name.to_string()) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let file = OpenOptions::new()
                    .read(true)
                    .write(true)
                    .create(true)
                    .truncate(false)
                    .open(self.data_dir.join(file_name))?;
                Ok(entry.insert(file))
            }
        }
    }

    /// Like `file`, but `None` when no such file exists yet.
    fn existing_file(&mut self, file_name: &str) -> StorageResult<Option<&mut File>> {
        match self.open_files.entry(file_name.to_string()) {
            Entry::Occupied(entry) => Ok(Some(entry.into_mut())),
            Entry::Vacant(entry) => {
                let opened = OpenOptions::new()
                    .read(true)
                    .write(true)
                    .open(self.data_dir.join(file_name));
                match opened {
                    Ok(file) => Ok(Some(entry.insert(file))),
                    Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
                    Err(err) => Err(err.into()),
                }
            }
        }
    }

    fn block_offset(block: &BlockId) -> u64 {
        block.block_num() as u64 * PAGE_SIZE as u64
    }
}

impl DiskManager for FileDiskManager {
    fn read_block(&mut self, block: &BlockId, page: &mut Page) -> StorageResult<()> {
        let offset = Self::block_offset(block);
        let file = match self.existing_file(block.file_name())? {
            Some(file) => file,
            None => return Err(StorageError::BlockNotFound(block.clone())),
        };

        if offset + PAGE_SIZE as u64 > file.metadata()?.len() {
            return Err(StorageError::BlockNotFound(block.clone()));
        }

        file.seek(SeekFrom::Start(offset))?;
        file.read_exact(page.data_mut())?;
        Ok(())
    }

    fn write_block(&mut self, block: &BlockId, page: &Page) -> StorageResult<()> {
        let offset = Self::block_offset(block);
        let file = self.file(block.file_name())?;

        file.seek(SeekFrom::Start(offset))?;
        file.write_all(page.data())?;
        file.sync_data()?;
        Ok(())
    }

    fn append_new_block(&mut self, file_name: &str) -> StorageResult<BlockId> {
        let block_num = self.block_count(file_name)?;
        let file = self.file(file_name)?;

        let new_len = (block_num as u64 + 1) * PAGE_SIZE as u64;
        file.set_len(new_len)?;

        Ok(BlockId::new(file_name, block_num))
    }

    fn block_count(&mut self, file_name: &str) -> StorageResult<u32> {
        let file = self.file(file_name)?;
        Ok((file.metadata()?.len() / PAGE_SIZE as u64) as u32)
    }
}
