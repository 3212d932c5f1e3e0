use thiserror::Error;

#[derive(Error, Debug)]
pub enum PdfStudioError {
    #[error("Failed to parse PDF: {0}")]
    ParseError(String),

    #[error("Page {page} does not exist (document has {page_count} pages)")]
    PageRangeError { page: u32, page_count: u32 },

    #[error("No bookmarks found in this PDF")]
    NoBookmarks,

    #[error("All pages are blank! Cannot create empty PDF.")]
    AllPagesBlank,

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid page reference: source {source_file_index}, page {page}")]
    InvalidPageReference { source_file_index: i32, page: u32 },

    #[error("Failed to render page: {0}")]
    RenderError(String),

    #[error("No page renderer available for blank page detection")]
    RendererUnavailable,

    #[error("PDF operation failed: {0}")]
    OperationError(String),

    #[error("Failed to build archive: {0}")]
    ArchiveError(String),
}

pub type Result<T> = std::result::Result<T, PdfStudioError>;
