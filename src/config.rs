//! Buffer pool configuration.
//!
//! Values are layered: built-in defaults, then an optional config file, then
//! `BUFMGR_*` environment variables (e.g. `BUFMGR_CAPACITY=64`,
//! `BUFMGR_POLICY=clock`).

use crate::storage::buffer::ReplacementPolicy;
use crate::storage::error::StorageResult;
use serde::Deserialize;
use std::path::PathBuf;

pub const DEFAULT_CAPACITY: usize = 8;
pub const DEFAULT_DATA_DIR: &str = "./bufmgr_data";

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PoolConfig {
    /// Number of frames in the pool.
    pub capacity: usize,
    /// Replacement policy used once no free frame is left.
    pub policy: ReplacementPolicy,
    /// Directory holding the database files.
    pub data_dir: PathBuf,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            policy: ReplacementPolicy::default(),
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
        }
    }
}

impl PoolConfig {
    /// Load the configuration, reading `file` too when one is given.
    ///
    /// An unknown policy fails here with `InvalidPolicyConfiguration` wrapped
    /// in a configuration error, never later at pin time.
    pub fn load(file: Option<&str>) -> StorageResult<Self> {
        let mut builder = ::config::Config::builder()
            .set_default("capacity", DEFAULT_CAPACITY as i64)?
            .set_default("policy", ReplacementPolicy::default().to_string())?
            .set_default("data_dir", DEFAULT_DATA_DIR)?;
        if let Some(file) = file {
            builder = builder.add_source(::config::File::with_name(file));
        }
        builder = builder.add_source(::config::Environment::with_prefix("BUFMGR"));
        Ok(builder.build()?.try_deserialize()?)
    }
}
