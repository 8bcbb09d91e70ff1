use super::clock::ClockReplacer;
use super::frame::Frame;
use super::lru::LruReplacer;
use super::naive::NaiveReplacer;
use crate::storage::error::StorageError;
use serde::Deserialize;
use std::fmt::{self, Debug};
use std::str::FromStr;

pub type FrameId = usize;

pub trait Replacer: Send + Debug {
    /// Select an unpinned frame to reuse. Returns None if every frame is pinned.
    ///
    /// Only called when no free slot is left. The pool, not the replacer,
    /// unlinks the victim's old block from the page table.
    fn evict(&mut self, frames: &mut [Frame]) -> Option<FrameId>;

    /// The policy this replacer implements.
    fn policy(&self) -> ReplacementPolicy;
}

/// Page replacement policy, fixed when the pool is built.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "String")]
pub enum ReplacementPolicy {
    /// First unpinned frame in slot order.
    Naive,
    /// Unpinned frame with the oldest last access.
    #[default]
    Lru,
    /// Second-chance scan over reference bits.
    Clock,
}

impl ReplacementPolicy {
    pub fn build(self) -> Box<dyn Replacer> {
        match self {
            ReplacementPolicy::Naive => Box::new(NaiveReplacer::new()),
            ReplacementPolicy::Lru => Box::new(LruReplacer::new()),
            ReplacementPolicy::Clock => Box::new(ClockReplacer::new()),
        }
    }
}

impl FromStr for ReplacementPolicy {
    type Err = StorageError;

    /// Accepts policy names as well as the numeric codes 0, 1 and 2.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "naive" | "0" => Ok(ReplacementPolicy::Naive),
            "lru" | "1" => Ok(ReplacementPolicy::Lru),
            "clock" | "2" => Ok(ReplacementPolicy::Clock),
            other => Err(StorageError::InvalidPolicyConfiguration(other.to_string())),
        }
    }
}

impl TryFrom<String> for ReplacementPolicy {
    type Error = StorageError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for ReplacementPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ReplacementPolicy::Naive => "naive",
            ReplacementPolicy::Lru => "lru",
            ReplacementPolicy::Clock => "clock",
        };
        f.write_str(name)
    }
}
