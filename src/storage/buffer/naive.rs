use super::frame::Frame;
use super::replacer::{FrameId, ReplacementPolicy, Replacer};

/// Picks the first unpinned frame in slot order.
#[derive(Debug, Default)]
pub struct NaiveReplacer;

impl NaiveReplacer {
    pub fn new() -> Self {
        Self
    }
}

impl Replacer for NaiveReplacer {
    fn evict(&mut self, frames: &mut [Frame]) -> Option<FrameId> {
        frames
            .iter()
            .find(|frame| !frame.is_pinned())
            .map(Frame::slot)
    }

    fn policy(&self) -> ReplacementPolicy {
        ReplacementPolicy::Naive
    }
}
