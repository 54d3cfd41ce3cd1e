//! On-disk paged files for OxbowDB.
//!
//! This crate provides [`PagedFile`], the `std::fs`-backed implementation of
//! the [`oxbow_common::PageFile`] interface the buffer manager consumes.

mod paged_file;

pub use paged_file::{PagedFile, PagedFileOptions};
