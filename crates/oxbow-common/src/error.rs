//! Error types for OxbowDB.

use crate::page::PageNo;
use thiserror::Error;

/// Result type alias using OxbowError.
pub type Result<T> = std::result::Result<T, OxbowError>;

/// Errors that can occur in OxbowDB operations.
#[derive(Debug, Error)]
pub enum OxbowError {
    // I/O errors from the file layer, propagated unchanged
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("page {page_no} not found in file {file}")]
    PageNotFound { file: String, page_no: PageNo },

    // Buffer protocol errors
    #[error("buffer exceeded: all frames are pinned")]
    BufferExceeded,

    #[error("page {page_no} in file {file} is not pinned (frame {frame_no})")]
    PageNotPinned {
        file: String,
        page_no: PageNo,
        frame_no: u32,
    },

    #[error("page {page_no} in file {file} is still pinned (frame {frame_no})")]
    PagePinned {
        file: String,
        page_no: PageNo,
        frame_no: u32,
    },

    #[error("bad buffer frame {frame_no}: dirty={dirty} valid={valid} refbit={ref_bit}")]
    BadBuffer {
        frame_no: u32,
        dirty: bool,
        valid: bool,
        ref_bit: bool,
    },
}
