//! The paged file abstraction consumed by the buffer manager.

use crate::error::Result;
use crate::page::{Page, PageNo};
use std::sync::Arc;

/// A paged file: the collaborator the buffer manager reads from and writes
/// back to.
///
/// All calls are synchronous and blocking. Implementations hand out pages by
/// value; the page number embedded in a returned [`Page`] is authoritative.
pub trait PageFile {
    /// Reads an existing page from the file.
    fn read_page(&self, page_no: PageNo) -> Result<Page>;

    /// Persists a page at the position given by its embedded page number.
    fn write_page(&self, page: &Page) -> Result<()>;

    /// Allocates a new page and returns it; the file assigns the number.
    fn allocate_page(&self) -> Result<Page>;

    /// Removes a page from the file.
    fn delete_page(&self, page_no: PageNo) -> Result<()>;

    /// Display name of the file, used only for error messages.
    fn name(&self) -> &str;
}

/// Shared, non-owning handle to a paged file.
///
/// The buffer manager never frees files; it holds clones of the handle the
/// caller supplies and identifies the file by the address of the shared
/// allocation.
pub type FileRef = Arc<dyn PageFile>;

/// Address of the shared file allocation, used as the file's identity.
#[inline]
pub fn file_addr(file: &FileRef) -> usize {
    Arc::as_ptr(file) as *const () as usize
}

/// Returns true if both handles refer to the same file.
#[inline]
pub fn same_file(a: &FileRef, b: &FileRef) -> bool {
    file_addr(a) == file_addr(b)
}
