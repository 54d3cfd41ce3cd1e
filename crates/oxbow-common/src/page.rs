//! Page value for OxbowDB storage.

/// Default page size in bytes (16 KB).
pub const PAGE_SIZE: usize = 16 * 1024;

/// Page number within a file (0-indexed).
pub type PageNo = u32;

/// Sentinel page number marking a page that does not exist.
///
/// A frame whose slot carries this number during a file flush indicates a
/// corrupted buffer state.
pub const INVALID_PAGE_NO: PageNo = u32::MAX;

/// The fixed-size unit of disk and memory transfer.
///
/// A page carries its own number; the file layer assigns it on allocation
/// and uses it to locate the page on write-back.
#[derive(Clone)]
pub struct Page {
    page_no: PageNo,
    data: Box<[u8; PAGE_SIZE]>,
}

impl Page {
    /// Creates a zeroed page with the given number.
    pub fn new(page_no: PageNo) -> Self {
        Self {
            page_no,
            data: Box::new([0u8; PAGE_SIZE]),
        }
    }

    /// Creates a zeroed page with no identity.
    pub fn empty() -> Self {
        Self::new(INVALID_PAGE_NO)
    }

    /// Returns the page number.
    #[inline]
    pub fn page_no(&self) -> PageNo {
        self.page_no
    }

    /// Overwrites the page number.
    #[inline]
    pub fn set_page_no(&mut self, page_no: PageNo) {
        self.page_no = page_no;
    }

    /// Returns the page payload.
    #[inline]
    pub fn data(&self) -> &[u8; PAGE_SIZE] {
        &self.data
    }

    /// Returns the page payload for modification.
    #[inline]
    pub fn data_mut(&mut self) -> &mut [u8; PAGE_SIZE] {
        &mut self.data
    }
}

impl std::fmt::Debug for Page {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Page")
            .field("page_no", &self.page_no)
            .field("len", &PAGE_SIZE)
            .finish()
    }
}
