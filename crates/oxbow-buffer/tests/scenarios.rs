//! Buffer manager scenarios driven through the public API against an
//! in-memory paged file that records every I/O call.

use oxbow_buffer::BufMgr;
use oxbow_common::{FileRef, OxbowError, Page, PageFile, PageNo, Result};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// In-memory paged file recording reads, writes, and deletes.
struct RecordingFile {
    name: String,
    pages: Mutex<HashMap<PageNo, Page>>,
    next_page_no: AtomicU32,
    read_log: Mutex<Vec<PageNo>>,
    write_log: Mutex<Vec<PageNo>>,
    delete_log: Mutex<Vec<PageNo>>,
}

impl RecordingFile {
    fn with_pages(name: &str, page_nos: &[PageNo]) -> Arc<Self> {
        let mut pages = HashMap::new();
        let mut max = 0;
        for &page_no in page_nos {
            pages.insert(page_no, Page::new(page_no));
            max = max.max(page_no);
        }
        Arc::new(Self {
            name: name.to_string(),
            pages: Mutex::new(pages),
            next_page_no: AtomicU32::new(max + 1),
            read_log: Mutex::new(Vec::new()),
            write_log: Mutex::new(Vec::new()),
            delete_log: Mutex::new(Vec::new()),
        })
    }

    fn reads(&self) -> Vec<PageNo> {
        self.read_log.lock().clone()
    }

    fn writes(&self) -> Vec<PageNo> {
        self.write_log.lock().clone()
    }

    fn deletes(&self) -> Vec<PageNo> {
        self.delete_log.lock().clone()
    }

    fn stored_byte(&self, page_no: PageNo, offset: usize) -> Option<u8> {
        self.pages.lock().get(&page_no).map(|p| p.data()[offset])
    }
}

impl PageFile for RecordingFile {
    fn read_page(&self, page_no: PageNo) -> Result<Page> {
        self.read_log.lock().push(page_no);
        self.pages
            .lock()
            .get(&page_no)
            .cloned()
            .ok_or_else(|| OxbowError::PageNotFound {
                file: self.name.clone(),
                page_no,
            })
    }

    fn write_page(&self, page: &Page) -> Result<()> {
        self.write_log.lock().push(page.page_no());
        self.pages.lock().insert(page.page_no(), page.clone());
        Ok(())
    }

    fn allocate_page(&self) -> Result<Page> {
        let page_no = self.next_page_no.fetch_add(1, Ordering::AcqRel);
        let page = Page::new(page_no);
        self.pages.lock().insert(page_no, page.clone());
        Ok(page)
    }

    fn delete_page(&self, page_no: PageNo) -> Result<()> {
        self.delete_log.lock().push(page_no);
        self.pages
            .lock()
            .remove(&page_no)
            .map(|_| ())
            .ok_or_else(|| OxbowError::PageNotFound {
                file: self.name.clone(),
                page_no,
            })
    }

    fn name(&self) -> &str {
        &self.name
    }
}

fn as_ref(file: &Arc<RecordingFile>) -> FileRef {
    file.clone()
}

#[test]
fn repeated_read_hits_without_file_io() {
    let mgr = BufMgr::new(3);
    let f1 = RecordingFile::with_pages("f1.dat", &[1, 2, 3]);
    let file = as_ref(&f1);

    let frame = mgr.fetch_page(&file, 1).unwrap();
    assert_eq!(frame.pin_count(), 1);
    assert!(frame.ref_bit());
    mgr.unpin_page(&file, 1, false).unwrap();

    // Second read must be a hit: pinned again, no further file read
    let frame = mgr.fetch_page(&file, 1).unwrap();
    assert_eq!(frame.pin_count(), 1);
    assert!(frame.ref_bit());
    assert_eq!(f1.reads(), vec![1]);

    mgr.unpin_page(&file, 1, false).unwrap();
}

#[test]
fn eviction_writes_dirty_victim_back_exactly_once() {
    let mgr = BufMgr::new(2);
    let f1 = RecordingFile::with_pages("f1.dat", &[1, 2, 3]);
    let file = as_ref(&f1);

    let frame = mgr.fetch_page(&file, 1).unwrap();
    frame.page_mut().data_mut()[0] = 0x77;
    mgr.unpin_page(&file, 1, true).unwrap();

    mgr.fetch_page(&file, 2).unwrap();
    mgr.unpin_page(&file, 2, false).unwrap();

    // Miss: the clock clears both reference bits, sweeps again, and evicts
    // the dirty frame holding page 1 after writing it back
    mgr.fetch_page(&file, 3).unwrap();

    assert_eq!(f1.writes(), vec![1]);
    assert_eq!(f1.stored_byte(1, 0), Some(0x77));
    assert!(!mgr.contains(&file, 1));
    assert!(mgr.contains(&file, 2));
    assert!(mgr.contains(&file, 3));
}

#[test]
fn fully_pinned_pool_rejects_new_pages() {
    let mgr = BufMgr::new(2);
    let f1 = RecordingFile::with_pages("f1.dat", &[1, 2, 3]);
    let file = as_ref(&f1);

    mgr.fetch_page(&file, 1).unwrap();
    mgr.fetch_page(&file, 2).unwrap();

    let result = mgr.fetch_page(&file, 3);
    assert!(matches!(result, Err(OxbowError::BufferExceeded)));

    // Resident set unchanged
    assert!(mgr.contains(&file, 1));
    assert!(mgr.contains(&file, 2));
    assert!(!mgr.contains(&file, 3));
    assert_eq!(f1.reads(), vec![1, 2]);
}

#[test]
fn double_unpin_reports_page_not_pinned() {
    let mgr = BufMgr::new(3);
    let f1 = RecordingFile::with_pages("f1.dat", &[1]);
    let file = as_ref(&f1);

    mgr.fetch_page(&file, 1).unwrap();
    mgr.unpin_page(&file, 1, false).unwrap();

    match mgr.unpin_page(&file, 1, false) {
        Err(OxbowError::PageNotPinned {
            file: name,
            page_no,
            ..
        }) => {
            assert_eq!(name, "f1.dat");
            assert_eq!(page_no, 1);
        }
        other => panic!("expected PageNotPinned, got {other:?}"),
    }
}

#[test]
fn flush_of_pinned_page_fails_without_side_effects() {
    let mgr = BufMgr::new(3);
    let f1 = RecordingFile::with_pages("f1.dat", &[1]);
    let file = as_ref(&f1);

    mgr.fetch_page(&file, 1).unwrap();

    match mgr.flush_file(&file) {
        Err(OxbowError::PagePinned { page_no, .. }) => assert_eq!(page_no, 1),
        other => panic!("expected PagePinned, got {other:?}"),
    }

    assert!(f1.writes().is_empty());
    assert!(mgr.contains(&file, 1));

    // After quiescing the file, the flush goes through
    mgr.unpin_page(&file, 1, false).unwrap();
    mgr.flush_file(&file).unwrap();
    assert!(!mgr.contains(&file, 1));
}

#[test]
fn dispose_evicts_and_deletes_from_file() {
    let mgr = BufMgr::new(3);
    let f1 = RecordingFile::with_pages("f1.dat", &[1]);
    let file = as_ref(&f1);

    mgr.fetch_page(&file, 1).unwrap();
    mgr.unpin_page(&file, 1, false).unwrap();

    mgr.dispose_page(&file, 1).unwrap();

    assert!(!mgr.contains(&file, 1));
    assert_eq!(f1.deletes(), vec![1]);
    assert_eq!(mgr.stats().valid_frames, 0);
}

#[test]
fn clock_evicts_resident_pages_in_arrival_order() {
    let mgr = BufMgr::new(3);
    let f1 = RecordingFile::with_pages("f1.dat", &[1, 2, 3, 4, 5, 6]);
    let file = as_ref(&f1);

    // Pages 1, 2, 3 resident and unpinned, all with the reference bit set
    for page_no in 1..=3 {
        mgr.fetch_page(&file, page_no).unwrap();
        mgr.unpin_page(&file, page_no, false).unwrap();
    }

    // Each subsequent miss evicts the page the hand reaches first after
    // finishing its bit-clearing sweep: 1, then 2, then 3
    mgr.fetch_page(&file, 4).unwrap();
    mgr.unpin_page(&file, 4, false).unwrap();
    assert!(!mgr.contains(&file, 1));
    assert!(mgr.contains(&file, 2));
    assert!(mgr.contains(&file, 3));

    mgr.fetch_page(&file, 5).unwrap();
    mgr.unpin_page(&file, 5, false).unwrap();
    assert!(!mgr.contains(&file, 2));
    assert!(mgr.contains(&file, 3));

    mgr.fetch_page(&file, 6).unwrap();
    mgr.unpin_page(&file, 6, false).unwrap();
    assert!(!mgr.contains(&file, 3));
    assert!(mgr.contains(&file, 4));
    assert!(mgr.contains(&file, 5));
    assert!(mgr.contains(&file, 6));
}

#[test]
fn pin_counts_move_by_one_per_operation() {
    let mgr = BufMgr::new(3);
    let f1 = RecordingFile::with_pages("f1.dat", &[1]);
    let file = as_ref(&f1);

    let frame = mgr.fetch_page(&file, 1).unwrap();
    assert_eq!(frame.pin_count(), 1);

    mgr.fetch_page(&file, 1).unwrap();
    assert_eq!(frame.pin_count(), 2);

    mgr.unpin_page(&file, 1, false).unwrap();
    assert_eq!(frame.pin_count(), 1);

    mgr.unpin_page(&file, 1, false).unwrap();
    assert_eq!(frame.pin_count(), 0);
}

#[test]
fn dirty_flag_survives_clean_unpin() {
    let mgr = BufMgr::new(2);
    let f1 = RecordingFile::with_pages("f1.dat", &[1, 2, 3]);
    let file = as_ref(&f1);

    let frame = mgr.fetch_page(&file, 1).unwrap();
    frame.page_mut().data_mut()[3] = 0x11;
    mgr.unpin_page(&file, 1, true).unwrap();

    mgr.fetch_page(&file, 1).unwrap();
    mgr.unpin_page(&file, 1, false).unwrap();
    assert!(frame.is_dirty());

    // The still-dirty page must be written back when evicted
    mgr.fetch_page(&file, 2).unwrap();
    mgr.unpin_page(&file, 2, false).unwrap();
    mgr.fetch_page(&file, 3).unwrap();
    mgr.unpin_page(&file, 3, false).unwrap();

    assert!(!mgr.contains(&file, 1));
    assert_eq!(f1.writes(), vec![1]);
    assert_eq!(f1.stored_byte(1, 3), Some(0x11));
}

#[test]
fn allocated_pages_start_pinned_and_resident() {
    let mgr = BufMgr::new(3);
    let f1 = RecordingFile::with_pages("f1.dat", &[]);
    let file = as_ref(&f1);

    let (page_no, frame) = mgr.new_page(&file).unwrap();

    assert_eq!(frame.pin_count(), 1);
    assert!(mgr.contains(&file, page_no));
    assert_eq!(frame.page().page_no(), page_no);

    // No file read is involved in allocation
    assert!(f1.reads().is_empty());

    mgr.unpin_page(&file, page_no, true).unwrap();
    mgr.flush_file(&file).unwrap();
    assert_eq!(f1.writes(), vec![page_no]);
}

#[test]
fn two_files_with_equal_page_numbers_stay_distinct() {
    let mgr = BufMgr::new(4);
    let f1 = RecordingFile::with_pages("f1.dat", &[1]);
    let f2 = RecordingFile::with_pages("f2.dat", &[1]);
    let file1 = as_ref(&f1);
    let file2 = as_ref(&f2);

    let frame1 = mgr.fetch_page(&file1, 1).unwrap();
    let frame2 = mgr.fetch_page(&file2, 1).unwrap();

    frame1.page_mut().data_mut()[0] = 0xA1;
    frame2.page_mut().data_mut()[0] = 0xB2;

    mgr.unpin_page(&file1, 1, true).unwrap();
    mgr.unpin_page(&file2, 1, true).unwrap();

    mgr.flush_file(&file1).unwrap();
    mgr.flush_file(&file2).unwrap();

    assert_eq!(f1.stored_byte(1, 0), Some(0xA1));
    assert_eq!(f2.stored_byte(1, 0), Some(0xB2));
}
