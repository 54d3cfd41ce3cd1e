//! Buffer pool manager.

use crate::frame::{Frame, FrameId};
use crate::page_index::{PageIndex, PageKey};
use crate::replacer::{ClockReplacer, Replacer};
use oxbow_common::{same_file, FileRef, OxbowError, Page, PageNo, Result, INVALID_PAGE_NO, PAGE_SIZE};
use parking_lot::Mutex;
use sysinfo::System;

/// Buffer pool manager.
///
/// Mediates between paged files and higher-level callers, keeping a bounded
/// number of pages resident:
/// - Page identity to frame mapping (page index)
/// - Clock replacement for eviction, with write-back of dirty victims
/// - Pin counting so pages in use stay resident
///
/// All operations run to completion on the calling thread; callers serialize
/// access. Every `fetch_page` must be paired with an `unpin_page` before the
/// page becomes evictable again, or callers can use the
/// [`read_page`](BufMgr::read_page) / [`write_page`](BufMgr::write_page)
/// guards, which release the pin on drop.
pub struct BufMgr {
    /// Frame table; each frame couples a pool slot with its descriptor.
    frames: Vec<Frame>,
    /// Page identity to frame ID mapping.
    page_index: Mutex<PageIndex>,
    /// Page replacement policy.
    replacer: ClockReplacer,
}

impl BufMgr {
    /// Creates a buffer manager with `num_bufs` frames.
    ///
    /// A pool of zero frames is an ill-formed configuration.
    pub fn new(num_bufs: u32) -> Self {
        assert!(num_bufs >= 1, "buffer pool requires at least one frame");
        let num_bufs = num_bufs as usize;

        let frames: Vec<_> = (0..num_bufs)
            .map(|i| Frame::new(FrameId(i as u32)))
            .collect();

        Self {
            frames,
            page_index: Mutex::new(PageIndex::with_capacity(num_bufs)),
            replacer: ClockReplacer::new(num_bufs),
        }
    }

    /// Creates a buffer manager sized to 25% of available system RAM.
    ///
    /// Queries the system for available memory and allocates 25% of it for
    /// the pool. Minimum 1,000 frames to ensure useful caching even on
    /// low-memory systems.
    pub fn auto_sized() -> Self {
        let mut sys = System::new_all();
        sys.refresh_memory();

        let available_bytes = sys.available_memory() as usize;
        let target_bytes = available_bytes / 4;
        let num_frames = (target_bytes / PAGE_SIZE).max(1_000);

        Self::new(num_frames as u32)
    }

    /// Returns the number of frames in the pool.
    pub fn num_frames(&self) -> usize {
        self.frames.len()
    }

    /// Checks if a page is resident.
    pub fn contains(&self, file: &FileRef, page_no: PageNo) -> bool {
        self.page_index
            .lock()
            .lookup(&PageKey::new(file, page_no))
            .is_some()
    }

    /// Fetches a page, loading it from the file on a miss.
    ///
    /// The returned frame is pinned; the caller must pair this with
    /// [`unpin_page`](BufMgr::unpin_page). On a miss the page index entry is
    /// installed only after the load succeeds, so a failed read leaves no
    /// stale mapping.
    pub fn fetch_page(&self, file: &FileRef, page_no: PageNo) -> Result<&Frame> {
        let key = PageKey::new(file, page_no);

        if let Some(frame_id) = self.page_index.lock().lookup(&key) {
            let frame = &self.frames[frame_id.0 as usize];
            frame.pin();
            return Ok(frame);
        }

        let frame_id = self.alloc_frame()?;
        let frame = &self.frames[frame_id.0 as usize];

        let page = file.read_page(page_no)?;
        *frame.page_mut() = page;

        let inserted = self.page_index.lock().insert(key, frame_id);
        debug_assert!(inserted, "page already resident after miss");
        frame.assign(file.clone(), page_no);

        Ok(frame)
    }

    /// Releases one pin on a resident page.
    ///
    /// `dirty` marks the page as modified; dirtiness is sticky until
    /// write-back, so a later clean unpin never clears it. Unpinning a page
    /// that is not resident is tolerated silently. Unpinning a resident page
    /// with no outstanding pins fails with
    /// [`OxbowError::PageNotPinned`].
    pub fn unpin_page(&self, file: &FileRef, page_no: PageNo, dirty: bool) -> Result<()> {
        let Some(frame_id) = self.page_index.lock().lookup(&PageKey::new(file, page_no)) else {
            return Ok(());
        };
        let frame = &self.frames[frame_id.0 as usize];

        if frame.pin_count() == 0 {
            return Err(OxbowError::PageNotPinned {
                file: file.name().to_string(),
                page_no,
                frame_no: frame_id.0,
            });
        }

        frame.unpin();
        if dirty {
            frame.set_dirty(true);
        }
        Ok(())
    }

    /// Allocates a new page in the file and makes it resident.
    ///
    /// The file assigns the page number. The returned frame is pinned.
    pub fn new_page(&self, file: &FileRef) -> Result<(PageNo, &Frame)> {
        let page = file.allocate_page()?;
        let page_no = page.page_no();

        let frame_id = self.alloc_frame()?;
        let frame = &self.frames[frame_id.0 as usize];
        *frame.page_mut() = page;

        let inserted = self
            .page_index
            .lock()
            .insert(PageKey::new(file, page_no), frame_id);
        debug_assert!(inserted, "freshly allocated page already resident");
        frame.assign(file.clone(), page_no);

        Ok((page_no, frame))
    }

    /// Removes a page from the file, evicting it first if resident.
    ///
    /// The caller is expected to hold no pin on the page; this is not
    /// checked. A non-resident page is disposed silently.
    pub fn dispose_page(&self, file: &FileRef, page_no: PageNo) -> Result<()> {
        if let Some(frame_id) = self.page_index.lock().remove(&PageKey::new(file, page_no)) {
            self.frames[frame_id.0 as usize].reset();
        }
        file.delete_page(page_no)
    }

    /// Writes back and releases every resident page of the given file.
    ///
    /// Fails on the first frame that is pinned or carries an invalid page
    /// number; frames already processed stay flushed and released. Callers
    /// must have quiesced the file.
    pub fn flush_file(&self, file: &FileRef) -> Result<()> {
        for frame in &self.frames {
            let Some((owner, page_no)) = frame.owner() else {
                continue;
            };
            if !same_file(&owner, file) {
                continue;
            }

            if page_no == INVALID_PAGE_NO {
                return Err(OxbowError::BadBuffer {
                    frame_no: frame.frame_id().0,
                    dirty: frame.is_dirty(),
                    valid: true,
                    ref_bit: frame.ref_bit(),
                });
            }
            if frame.is_pinned() {
                return Err(OxbowError::PagePinned {
                    file: file.name().to_string(),
                    page_no,
                    frame_no: frame.frame_id().0,
                });
            }

            if frame.is_dirty() {
                file.write_page(&frame.page())?;
                frame.set_dirty(false);
            }
            self.page_index
                .lock()
                .remove(&PageKey::new(file, page_no));
            frame.reset();
        }
        Ok(())
    }

    /// Selects a frame for the next load, evicting its current page if any.
    ///
    /// A dirty victim is written back before its index entry is removed, so
    /// a failed write leaves the mapping intact. The chosen frame is handed
    /// out reset.
    fn alloc_frame(&self) -> Result<FrameId> {
        let frame_id = self.replacer.find_victim(&self.frames)?;
        let frame = &self.frames[frame_id.0 as usize];

        if let Some((file, page_no)) = frame.owner() {
            if frame.is_dirty() {
                file.write_page(&frame.page())?;
                frame.set_dirty(false);
            }
            self.page_index
                .lock()
                .remove(&PageKey::new(&file, page_no));
        }

        frame.reset();
        Ok(frame_id)
    }

    /// Returns a read guard for a page; the pin is released on drop.
    pub fn read_page(&self, file: &FileRef, page_no: PageNo) -> Result<PageReadGuard<'_>> {
        let frame = self.fetch_page(file, page_no)?;
        Ok(PageReadGuard {
            mgr: self,
            file: file.clone(),
            page_no,
            frame,
        })
    }

    /// Returns a write guard for a page; the pin is released on drop.
    pub fn write_page(&self, file: &FileRef, page_no: PageNo) -> Result<PageWriteGuard<'_>> {
        let frame = self.fetch_page(file, page_no)?;
        Ok(PageWriteGuard {
            mgr: self,
            file: file.clone(),
            page_no,
            frame,
        })
    }

    /// Returns statistics about the pool.
    pub fn stats(&self) -> BufMgrStats {
        let mut valid_frames = 0;
        let mut pinned_frames = 0;
        let mut dirty_frames = 0;

        for frame in &self.frames {
            if frame.is_valid() {
                valid_frames += 1;
                if frame.is_pinned() {
                    pinned_frames += 1;
                }
                if frame.is_dirty() {
                    dirty_frames += 1;
                }
            }
        }

        BufMgrStats {
            total_frames: self.frames.len(),
            valid_frames,
            pinned_frames,
            dirty_frames,
        }
    }

    /// Renders a per-frame diagnostic listing of the pool.
    pub fn dump(&self) -> String {
        use std::fmt::Write as _;

        let mut out = String::new();
        let mut valid_frames = 0;
        for frame in &self.frames {
            match frame.owner() {
                Some((file, page_no)) => {
                    valid_frames += 1;
                    let _ = writeln!(
                        out,
                        "{} file={} page={} pin={} dirty={} refbit={}",
                        frame.frame_id(),
                        file.name(),
                        page_no,
                        frame.pin_count(),
                        frame.is_dirty(),
                        frame.ref_bit(),
                    );
                }
                None => {
                    let _ = writeln!(out, "{} <empty>", frame.frame_id());
                }
            }
        }
        let _ = writeln!(out, "total valid frames: {valid_frames}");
        out
    }
}

impl Drop for BufMgr {
    /// Writes back every valid dirty page. Write errors are ignored;
    /// outstanding pins are a caller bug and do not block shutdown.
    fn drop(&mut self) {
        for frame in &self.frames {
            if let Some((file, _)) = frame.owner() {
                if frame.is_dirty() {
                    let _ = file.write_page(&frame.page());
                }
            }
        }
    }
}

impl std::fmt::Debug for BufMgr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let stats = self.stats();
        f.debug_struct("BufMgr")
            .field("total_frames", &stats.total_frames)
            .field("valid_frames", &stats.valid_frames)
            .field("pinned_frames", &stats.pinned_frames)
            .field("dirty_frames", &stats.dirty_frames)
            .finish()
    }
}

/// Statistics about the buffer pool.
#[derive(Debug, Clone)]
pub struct BufMgrStats {
    /// Total number of frames.
    pub total_frames: usize,
    /// Number of frames holding a page.
    pub valid_frames: usize,
    /// Number of pinned frames.
    pub pinned_frames: usize,
    /// Number of dirty frames.
    pub dirty_frames: usize,
}

/// RAII guard for reading a page.
pub struct PageReadGuard<'a> {
    mgr: &'a BufMgr,
    file: FileRef,
    page_no: PageNo,
    frame: &'a Frame,
}

impl PageReadGuard<'_> {
    /// Returns the page number.
    pub fn page_no(&self) -> PageNo {
        self.page_no
    }

    /// Returns the page contents.
    pub fn page(&self) -> parking_lot::RwLockReadGuard<'_, Page> {
        self.frame.page()
    }
}

impl Drop for PageReadGuard<'_> {
    fn drop(&mut self) {
        let _ = self.mgr.unpin_page(&self.file, self.page_no, false);
    }
}

/// RAII guard for writing a page.
pub struct PageWriteGuard<'a> {
    mgr: &'a BufMgr,
    file: FileRef,
    page_no: PageNo,
    frame: &'a Frame,
}

impl PageWriteGuard<'_> {
    /// Returns the page number.
    pub fn page_no(&self) -> PageNo {
        self.page_no
    }

    /// Returns mutable access to the page contents.
    pub fn page_mut(&self) -> parking_lot::RwLockWriteGuard<'_, Page> {
        self.frame.page_mut()
    }

    /// Marks the page as dirty.
    pub fn set_dirty(&self) {
        self.frame.set_dirty(true);
    }
}

impl Drop for PageWriteGuard<'_> {
    fn drop(&mut self) {
        let _ = self
            .mgr
            .unpin_page(&self.file, self.page_no, self.frame.is_dirty());
    }
}
