use super::frame::Frame;
use super::replacer::{FrameId, ReplacementPolicy, Replacer};

/// Evicts the unpinned frame whose last pin is oldest.
///
/// Recency comes from the logical tick the pool stamps on a frame at every
/// pin; ties go to the lowest slot.
#[derive(Debug, Default)]
pub struct LruReplacer;

impl LruReplacer {
    pub fn new() -> Self {
        Self
    }
}

impl Replacer for LruReplacer {
    fn evict(&mut self, frames: &mut [Frame]) -> Option<FrameId> {
        let mut victim: Option<&Frame> = None;
        for frame in frames.iter().filter(|f| !f.is_pinned()) {
            match victim {
                Some(best) if best.last_access() <= frame.last_access() => {}
                _ => victim = Some(frame),
            }
        }
        victim.map(Frame::slot)
    }

    fn policy(&self) -> ReplacementPolicy {
        ReplacementPolicy::Lru
    }
}
