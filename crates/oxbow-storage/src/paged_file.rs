//! Page-level file I/O.

use oxbow_common::{OxbowError, Page, PageFile, PageNo, Result, PAGE_SIZE};
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

/// Options for opening a paged file.
#[derive(Debug, Clone)]
pub struct PagedFileOptions {
    /// Enable fsync after writes.
    pub fsync_enabled: bool,
}

impl Default for PagedFileOptions {
    fn default() -> Self {
        Self {
            fsync_enabled: true,
        }
    }
}

/// A paged data file backed by `std::fs`.
///
/// Pages live at `page_no * PAGE_SIZE`; the page count is derived from the
/// file length. Pages removed with `delete_page` go on a session-scoped free
/// list and are handed out again by `allocate_page` before the file is
/// extended. The free list is not persisted.
pub struct PagedFile {
    /// Display name, used in error messages.
    name: String,
    fsync_enabled: bool,
    inner: Mutex<Inner>,
}

struct Inner {
    file: File,
    num_pages: u32,
    free: BTreeSet<PageNo>,
}

impl PagedFile {
    /// Opens or creates a paged file with default options.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with(path, PagedFileOptions::default())
    }

    /// Opens or creates a paged file.
    pub fn open_with(path: impl AsRef<Path>, options: PagedFileOptions) -> Result<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)?;

        let file_size = file.metadata()?.len();
        let num_pages = (file_size / PAGE_SIZE as u64) as u32;

        Ok(Self {
            name: path.display().to_string(),
            fsync_enabled: options.fsync_enabled,
            inner: Mutex::new(Inner {
                file,
                num_pages,
                free: BTreeSet::new(),
            }),
        })
    }

    /// Returns the number of pages in the file, freed pages included.
    pub fn num_pages(&self) -> u32 {
        self.inner.lock().num_pages
    }

    fn sync(&self, file: &File) -> Result<()> {
        if self.fsync_enabled {
            file.sync_all()?;
        }
        Ok(())
    }
}

impl PageFile for PagedFile {
    fn read_page(&self, page_no: PageNo) -> Result<Page> {
        let mut inner = self.inner.lock();

        if page_no >= inner.num_pages || inner.free.contains(&page_no) {
            return Err(OxbowError::PageNotFound {
                file: self.name.clone(),
                page_no,
            });
        }

        let offset = u64::from(page_no) * PAGE_SIZE as u64;
        inner.file.seek(SeekFrom::Start(offset))?;

        let mut page = Page::new(page_no);
        inner.file.read_exact(page.data_mut())?;

        Ok(page)
    }

    fn write_page(&self, page: &Page) -> Result<()> {
        let mut inner = self.inner.lock();
        let page_no = page.page_no();

        if page_no >= inner.num_pages {
            return Err(OxbowError::PageNotFound {
                file: self.name.clone(),
                page_no,
            });
        }

        let offset = u64::from(page_no) * PAGE_SIZE as u64;
        inner.file.seek(SeekFrom::Start(offset))?;
        inner.file.write_all(page.data())?;

        self.sync(&inner.file)
    }

    fn allocate_page(&self) -> Result<Page> {
        let mut inner = self.inner.lock();

        // Reuse a freed slot before extending the file
        let page_no = match inner.free.pop_first() {
            Some(page_no) => page_no,
            None => {
                let page_no = inner.num_pages;
                inner.num_pages = page_no + 1;
                page_no
            }
        };

        let page = Page::new(page_no);
        let offset = u64::from(page_no) * PAGE_SIZE as u64;
        inner.file.seek(SeekFrom::Start(offset))?;
        inner.file.write_all(page.data())?;
        self.sync(&inner.file)?;

        Ok(page)
    }

    fn delete_page(&self, page_no: PageNo) -> Result<()> {
        let mut inner = self.inner.lock();

        if page_no >= inner.num_pages || inner.free.contains(&page_no) {
            return Err(OxbowError::PageNotFound {
                file: self.name.clone(),
                page_no,
            });
        }

        inner.free.insert(page_no);
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for PagedFile {
    fn drop(&mut self) {
        let inner = self.inner.lock();
        let _ = inner.file.sync_all();
    }
}
