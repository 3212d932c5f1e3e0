//! PDF split, merge and compression
//!
//! Documents are parsed with lopdf and wrapped in [`PdfDocument`]. Every
//! operation produces fresh output bytes through [`compose::PageComposer`]
//! or a re-save of the parsed document, so inputs are never modified.
//!
//! Features that look at page pixels (blank page detection, thumbnails)
//! take a [`PageRenderer`]. Enable the `pdfium` feature for a renderer
//! backed by libpdfium.

pub mod archive;
pub mod blank;
pub mod bookmarks;
pub mod command;
pub mod compose;
pub mod compress;
pub mod document;
pub mod error;
pub mod merge;
pub mod naming;
pub mod ranges;
pub mod render;
pub mod split;

pub use archive::{create_zip_archive, package, zip_split_results, OutputFile};
pub use blank::{BlankDetector, BlankPageInfo, DEFAULT_BLANK_THRESHOLD};
pub use bookmarks::{extract_outline, flatten, Bookmark};
pub use command::{PdfCommand, ProcessMetrics, ProcessOutput, ProcessResult};
pub use compress::{CompressionLevel, CompressionOptions, CompressionResult};
pub use document::{PageHandle, PdfDocument, PdfInfo};
pub use error::{PdfStudioError, Result};
pub use merge::{merge_documents, MergePosition, PageOrder};
pub use ranges::{parse_page_selection, parse_ranges, PageRange};
pub use render::{PageRenderer, PixelBuffer, Thumbnail};
pub use split::{split, SplitMode, SplitResult};

#[cfg(feature = "pdfium")]
pub use render::PdfiumRenderer;

/// Parse PDF bytes and return page count
pub fn get_page_count(bytes: &[u8]) -> Result<u32> {
    Ok(PdfDocument::load(bytes.to_vec())?.page_count())
}
