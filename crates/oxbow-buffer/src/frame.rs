//! Buffer frame management.

use oxbow_common::{same_file, FileRef, Page, PageNo, INVALID_PAGE_NO};
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

/// Unique identifier for a frame in the buffer pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameId(pub u32);

impl FrameId {
    /// Invalid frame ID.
    pub const INVALID: FrameId = FrameId(u32::MAX);

    /// Returns true if this is a valid frame ID.
    pub fn is_valid(&self) -> bool {
        *self != Self::INVALID
    }
}

impl std::fmt::Display for FrameId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "frame:{}", self.0)
    }
}

/// A frame in the buffer pool holding a single page.
///
/// Each frame couples the page slot with its descriptor: the identity of the
/// owning file and page while loaded, plus the pin count, dirty flag, and
/// clock reference bit. A frame with no owner is free for the replacer to
/// hand out.
pub struct Frame {
    /// Frame identifier; position in the frame table.
    frame_id: FrameId,
    /// Identity of the loaded page. `Some` iff the frame is valid.
    owner: Mutex<Option<(FileRef, PageNo)>>,
    /// The page slot.
    page: RwLock<Page>,
    /// Number of callers currently holding this page.
    pin_count: AtomicU32,
    /// Whether the in-memory copy has unsaved modifications.
    dirty: AtomicBool,
    /// Second-chance flag for the clock replacement algorithm.
    ref_bit: AtomicBool,
}

impl Frame {
    /// Creates a new empty buffer frame.
    pub fn new(frame_id: FrameId) -> Self {
        Self {
            frame_id,
            owner: Mutex::new(None),
            page: RwLock::new(Page::empty()),
            pin_count: AtomicU32::new(0),
            dirty: AtomicBool::new(false),
            ref_bit: AtomicBool::new(false),
        }
    }

    /// Returns the frame ID.
    #[inline]
    pub fn frame_id(&self) -> FrameId {
        self.frame_id
    }

    /// Returns the identity of the loaded page, if any.
    #[inline]
    pub fn owner(&self) -> Option<(FileRef, PageNo)> {
        self.owner.lock().as_ref().map(|(f, p)| (f.clone(), *p))
    }

    /// Returns the loaded page number, if any.
    #[inline]
    pub fn page_no(&self) -> Option<PageNo> {
        self.owner.lock().as_ref().map(|(_, p)| *p)
    }

    /// Returns true iff the frame holds a loaded page.
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.owner.lock().is_some()
    }

    /// Returns true if the frame holds a page of the given file.
    #[inline]
    pub fn owned_by(&self, file: &FileRef) -> bool {
        self.owner
            .lock()
            .as_ref()
            .is_some_and(|(f, _)| same_file(f, file))
    }

    /// Initializes the descriptor after a page load.
    ///
    /// The frame becomes valid and pinned once, clean, with the reference
    /// bit set so the new page survives the next clock sweep.
    pub fn assign(&self, file: FileRef, page_no: PageNo) {
        *self.owner.lock() = Some((file, page_no));
        self.dirty.store(false, Ordering::Release);
        self.ref_bit.store(true, Ordering::Relaxed);
        self.pin_count.store(1, Ordering::Release);
    }

    /// Resets the frame to the unused state.
    pub fn reset(&self) {
        *self.owner.lock() = None;
        self.pin_count.store(0, Ordering::Release);
        self.dirty.store(false, Ordering::Release);
        self.ref_bit.store(false, Ordering::Relaxed);
        self.page.write().set_page_no(INVALID_PAGE_NO);
    }

    /// Returns the current pin count.
    #[inline]
    pub fn pin_count(&self) -> u32 {
        self.pin_count.load(Ordering::Acquire)
    }

    /// Increments the pin count and sets the reference bit.
    #[inline]
    pub fn pin(&self) {
        self.pin_count.fetch_add(1, Ordering::AcqRel);
        self.ref_bit.store(true, Ordering::Relaxed);
    }

    /// Decrements the pin count, saturating at zero.
    ///
    /// Returns the new pin count. The reference bit is not touched; the
    /// access that pinned the page already set it.
    #[inline]
    pub fn unpin(&self) -> u32 {
        let prev = self.pin_count.fetch_sub(1, Ordering::AcqRel);
        if prev == 0 {
            self.pin_count.store(0, Ordering::Release);
            return 0;
        }
        prev - 1
    }

    /// Returns true if this frame is pinned.
    #[inline]
    pub fn is_pinned(&self) -> bool {
        self.pin_count.load(Ordering::Acquire) > 0
    }

    /// Returns true if this frame is dirty.
    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    /// Marks this frame as dirty or clean.
    #[inline]
    pub fn set_dirty(&self, dirty: bool) {
        self.dirty.store(dirty, Ordering::Release);
    }

    /// Returns the reference bit value.
    #[inline]
    pub fn ref_bit(&self) -> bool {
        self.ref_bit.load(Ordering::Relaxed)
    }

    /// Sets the reference bit.
    #[inline]
    pub fn set_ref_bit(&self, value: bool) {
        self.ref_bit.store(value, Ordering::Relaxed);
    }

    /// Reads the page slot.
    #[inline]
    pub fn page(&self) -> parking_lot::RwLockReadGuard<'_, Page> {
        self.page.read()
    }

    /// Writes to the page slot.
    #[inline]
    pub fn page_mut(&self) -> parking_lot::RwLockWriteGuard<'_, Page> {
        self.page.write()
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("frame_id", &self.frame_id)
            .field("page_no", &self.page_no())
            .field("pin_count", &self.pin_count())
            .field("dirty", &self.is_dirty())
            .field("ref_bit", &self.ref_bit())
            .finish()
    }
}
