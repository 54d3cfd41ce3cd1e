//! Page replacement policy for the buffer pool.

use crate::frame::{Frame, FrameId};
use oxbow_common::{OxbowError, Result};
use parking_lot::Mutex;

/// Trait for page replacement algorithms.
pub trait Replacer {
    /// Selects the frame to load the next page into.
    ///
    /// An invalid frame may be chosen directly; a valid victim is chosen
    /// only when it is unpinned and has used up its second chance. Fails
    /// with [`OxbowError::BufferExceeded`] when every frame is pinned.
    fn find_victim(&self, frames: &[Frame]) -> Result<FrameId>;
}

/// Clock (second-chance) replacement algorithm.
///
/// A cursor sweeps the frame table; recently referenced frames get one
/// sweep of grace before they become eviction candidates. The hand starts
/// at the last frame so the first advance lands on frame 0.
pub struct ClockReplacer {
    hand: Mutex<usize>,
}

impl ClockReplacer {
    /// Creates a clock replacer for a pool of `num_frames` frames.
    pub fn new(num_frames: usize) -> Self {
        assert!(num_frames >= 1, "clock replacer requires at least one frame");
        Self {
            hand: Mutex::new(num_frames - 1),
        }
    }
}

impl Replacer for ClockReplacer {
    fn find_victim(&self, frames: &[Frame]) -> Result<FrameId> {
        let mut hand = self.hand.lock();

        // N + 1 inspections: one full sweep may only clear reference bits,
        // the extra step picks up the first frame it revisits.
        for _ in 0..=frames.len() {
            *hand = (*hand + 1) % frames.len();
            let frame = &frames[*hand];

            if !frame.is_valid() {
                return Ok(frame.frame_id());
            }
            if frame.ref_bit() {
                frame.set_ref_bit(false);
                continue;
            }
            if frame.is_pinned() {
                continue;
            }
            return Ok(frame.frame_id());
        }

        Err(OxbowError::BufferExceeded)
    }
}
