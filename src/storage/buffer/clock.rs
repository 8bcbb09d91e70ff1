use super::frame::Frame;
use super::replacer::{FrameId, ReplacementPolicy, Replacer};

/// Second-chance replacement.
///
/// The arm sweeps the frames in a circle and keeps its position between
/// calls. An unpinned frame with its reference bit set loses the bit and is
/// passed over; the first unpinned frame found without one is the victim.
#[derive(Debug, Default)]
pub struct ClockReplacer {
    hand: usize,
}

impl ClockReplacer {
    pub fn new() -> Self {
        Self { hand: 0 }
    }

    #[cfg(test)]
    pub(crate) fn hand(&self) -> usize {
        self.hand
    }
}

impl Replacer for ClockReplacer {
    fn evict(&mut self, frames: &mut [Frame]) -> Option<FrameId> {
        let len = frames.len();
        if len == 0 {
            return None;
        }
        // One pass may only clear bits; the second is guaranteed to find a
        // victim unless everything is pinned.
        for _ in 0..2 * len {
            let idx = self.hand % len;
            self.hand = (idx + 1) % len;

            let frame = &mut frames[idx];
            if frame.is_pinned() {
                continue;
            }
            if frame.reference_bit() {
                frame.clear_reference_bit();
                continue;
            }
            return Some(idx);
        }
        None
    }

    fn policy(&self) -> ReplacementPolicy {
        ReplacementPolicy::Clock
    }
}
