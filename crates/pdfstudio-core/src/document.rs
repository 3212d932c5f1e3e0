//! Document model adapter
//!
//! Wraps `lopdf` behind the handful of operations the split, merge and
//! compress engines need: load, page count, page copying and save.

use std::io::{Read, Write};
use std::sync::atomic::{AtomicU64, Ordering};

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use lopdf::{Dictionary, Document, Object, ObjectId};
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{PdfStudioError, Result};

static NEXT_DOCUMENT_ID: AtomicU64 = AtomicU64::new(1);

/// Page attributes a page may inherit from its ancestors in the page tree.
const INHERITABLE_PAGE_KEYS: [&[u8]; 4] =
    [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// Info dictionary keys cleared when metadata is stripped.
const METADATA_KEYS: [&[u8]; 6] = [
    b"Title",
    b"Author",
    b"Subject",
    b"Keywords",
    b"Producer",
    b"Creator",
];

const MAX_TREE_DEPTH: usize = 64;

/// Process-unique identity of a loaded document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DocumentId(u64);

/// A parsed PDF together with the bytes it was loaded from
#[derive(Debug, Clone)]
pub struct PdfDocument {
    id: DocumentId,
    bytes: Vec<u8>,
    doc: Document,
    /// Page object ids, index = page number - 1
    pages: Vec<ObjectId>,
}

/// Reference to one page of a loaded document, as returned by
/// [`PdfDocument::copy_pages`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageHandle {
    pub(crate) source: DocumentId,
    pub(crate) page_number: u32,
    pub(crate) object_id: ObjectId,
}

impl PageHandle {
    pub fn page_number(&self) -> u32 {
        self.page_number
    }
}

/// PDF file information
#[derive(Debug, Clone, Serialize, Default, PartialEq)]
pub struct PdfInfo {
    /// Number of pages in the document
    pub page_count: u32,
    /// PDF version string (e.g., "1.7")
    pub version: String,
    /// Whether the trailer declares encryption
    pub encrypted: bool,
    /// File size in bytes
    pub size_bytes: usize,
    /// Document title from metadata (if available)
    pub title: Option<String>,
    /// Document author from metadata (if available)
    pub author: Option<String>,
}

/// How aggressively the container is compacted on save.
///
/// None of the modes touch page content streams' meaning, only how
/// the objects are stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum Compaction {
    None,
    /// Flate-compress streams that are stored uncompressed
    #[default]
    Streams,
    /// `Streams` plus pruning, thumbnail removal, best-level re-deflate
    /// and object renumbering
    Full,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SaveOptions {
    /// Clear title/author/subject/keywords/producer/creator
    pub strip_metadata: bool,
    /// Also drop XMP metadata streams from the catalog and pages
    pub strip_xmp: bool,
    pub compaction: Compaction,
}

impl PdfDocument {
    /// Parse raw PDF bytes.
    ///
    /// Encryption declared in the trailer is ignored as long as lopdf could
    /// read the object graph.
    pub fn load(bytes: impl Into<Vec<u8>>) -> Result<Self> {
        let bytes = bytes.into();

        if bytes.len() < 8 {
            return Err(PdfStudioError::ParseError(
                "File too small to be a valid PDF".into(),
            ));
        }

        let head = &bytes[..bytes.len().min(1024)];
        if find_pattern(head, b"%PDF-").is_none() {
            return Err(PdfStudioError::ParseError(
                "Not a valid PDF file (missing %PDF- header)".into(),
            ));
        }

        let doc =
            Document::load_mem(&bytes).map_err(|e| PdfStudioError::ParseError(e.to_string()))?;

        if doc.is_encrypted() {
            warn!("Document declares encryption, ignoring it");
        }

        let pages: Vec<ObjectId> = doc.get_pages().into_values().collect();
        if pages.is_empty() {
            return Err(PdfStudioError::ParseError("PDF has no pages".into()));
        }

        let id = DocumentId(NEXT_DOCUMENT_ID.fetch_add(1, Ordering::Relaxed));
        debug!(pages = pages.len(), bytes = bytes.len(), "Loaded PDF");

        Ok(Self {
            id,
            bytes,
            doc,
            pages,
        })
    }

    pub fn id(&self) -> DocumentId {
        self.id
    }

    pub fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    /// Length of the raw input in bytes
    pub fn byte_len(&self) -> usize {
        self.bytes.len()
    }

    /// The raw bytes this document was loaded from
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn inner(&self) -> &Document {
        &self.doc
    }

    /// Fail with `PageRangeError` unless `page` is within `[1, page_count]`
    pub fn check_page(&self, page: u32) -> Result<()> {
        if page == 0 || page > self.page_count() {
            return Err(PdfStudioError::PageRangeError {
                page,
                page_count: self.page_count(),
            });
        }
        Ok(())
    }

    /// Resolve page numbers to handles, preserving order and duplicates
    pub fn copy_pages(&self, page_numbers: &[u32]) -> Result<Vec<PageHandle>> {
        page_numbers
            .iter()
            .map(|&page_number| {
                self.check_page(page_number)?;
                Ok(PageHandle {
                    source: self.id,
                    page_number,
                    object_id: self.pages[(page_number - 1) as usize],
                })
            })
            .collect()
    }

    /// Page dictionary with inherited attributes copied in and `/Parent` removed
    pub(crate) fn detached_page(&self, page_id: ObjectId) -> Result<Dictionary> {
        let mut page = self
            .doc
            .get_dictionary(page_id)
            .map_err(|e| PdfStudioError::OperationError(format!("Invalid page object: {}", e)))?
            .clone();

        for key in INHERITABLE_PAGE_KEYS {
            if page.has(key) {
                continue;
            }
            if let Some(value) = self.inherited_attribute(&page, key) {
                page.set(key.to_vec(), value);
            }
        }

        // Default to US Letter when no ancestor carries a MediaBox
        if !page.has(b"MediaBox") {
            page.set(
                "MediaBox",
                Object::Array(vec![
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Integer(612),
                    Object::Integer(792),
                ]),
            );
        }

        page.remove(b"Parent");
        Ok(page)
    }

    fn inherited_attribute(&self, page: &Dictionary, key: &[u8]) -> Option<Object> {
        let mut parent = page.get(b"Parent").and_then(Object::as_reference).ok();
        let mut depth = 0;

        while let Some(parent_id) = parent {
            if depth >= MAX_TREE_DEPTH {
                break;
            }
            depth += 1;

            let node = self.doc.get_dictionary(parent_id).ok()?;
            if let Ok(value) = node.get(key) {
                return Some(value.clone());
            }
            parent = node.get(b"Parent").and_then(Object::as_reference).ok();
        }

        None
    }

    /// Collect header and metadata facts about the document
    pub fn info(&self) -> PdfInfo {
        let (title, author) = self.title_and_author();
        PdfInfo {
            page_count: self.page_count(),
            version: extract_version(&self.bytes),
            encrypted: self.doc.is_encrypted(),
            size_bytes: self.bytes.len(),
            title,
            author,
        }
    }

    fn title_and_author(&self) -> (Option<String>, Option<String>) {
        let Some(info) = info_dictionary(&self.doc) else {
            return (None, None);
        };

        let read = |key: &[u8]| {
            info.get(key)
                .and_then(Object::as_str)
                .ok()
                .map(decode_text_string)
                .filter(|s| !s.is_empty())
        };

        (read(b"Title"), read(b"Author"))
    }

    /// Resolve an object, following a single level of indirection
    pub(crate) fn resolve<'a>(&'a self, object: &'a Object) -> Option<&'a Object> {
        match object {
            Object::Reference(id) => self.doc.get_object(*id).ok(),
            other => Some(other),
        }
    }

    /// Position (1-based) of a page object in the document
    pub(crate) fn page_number_of(&self, page_id: ObjectId) -> Option<u32> {
        self.pages
            .iter()
            .position(|&id| id == page_id)
            .map(|index| index as u32 + 1)
    }

    pub(crate) fn catalog(&self) -> Option<&Dictionary> {
        let root = self.doc.trailer.get(b"Root").ok()?;
        self.resolve(root)?.as_dict().ok()
    }
}

/// Serialize a document, applying metadata stripping and compaction
pub fn save_document(doc: &mut Document, options: &SaveOptions) -> Result<Vec<u8>> {
    if options.strip_metadata {
        strip_info_metadata(doc);
    }
    if options.strip_xmp {
        strip_xmp_streams(doc);
    }

    match options.compaction {
        Compaction::None => {}
        Compaction::Streams => doc.compress(),
        Compaction::Full => {
            doc.prune_objects();
            doc.delete_zero_length_streams();
            strip_page_extras(doc);
            doc.prune_objects();
            redeflate_streams(doc);
            doc.compress();
            doc.renumber_objects();
        }
    }

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer)
        .map_err(|e| PdfStudioError::OperationError(format!("Save failed: {}", e)))?;

    Ok(buffer)
}

fn info_dictionary(doc: &Document) -> Option<&Dictionary> {
    match doc.trailer.get(b"Info").ok()? {
        Object::Reference(id) => doc.get_dictionary(*id).ok(),
        Object::Dictionary(dict) => Some(dict),
        _ => None,
    }
}

fn strip_info_metadata(doc: &mut Document) {
    let info_id = match doc.trailer.get_mut(b"Info") {
        Ok(Object::Reference(id)) => Some(*id),
        Ok(Object::Dictionary(dict)) => {
            for key in METADATA_KEYS {
                dict.remove(key);
            }
            None
        }
        _ => None,
    };

    if let Some(id) = info_id {
        if let Ok(Object::Dictionary(dict)) = doc.get_object_mut(id) {
            for key in METADATA_KEYS {
                dict.remove(key);
            }
        }
    }
}

fn strip_xmp_streams(doc: &mut Document) {
    for object in doc.objects.values_mut() {
        if let Object::Dictionary(dict) = object {
            let is_catalog_or_page = matches!(
                dict.get(b"Type").and_then(Object::as_name),
                Ok(b"Catalog") | Ok(b"Page")
            );
            if is_catalog_or_page {
                dict.remove(b"Metadata");
            }
        }
    }
}

/// Remove page thumbnails and application private data
fn strip_page_extras(doc: &mut Document) {
    let page_ids: Vec<ObjectId> = doc.get_pages().into_values().collect();
    for page_id in page_ids {
        if let Ok(Object::Dictionary(page)) = doc.get_object_mut(page_id) {
            page.remove(b"Thumb");
            page.remove(b"PieceInfo");
        }
    }
}

/// Re-encode plain Flate streams at the best compression level, keeping
/// the result only when it is smaller
fn redeflate_streams(doc: &mut Document) {
    let mut recompressed = 0usize;

    for object in doc.objects.values_mut() {
        let Object::Stream(stream) = object else {
            continue;
        };

        let plain_flate = matches!(
            stream.dict.get(b"Filter"),
            Ok(Object::Name(name)) if name == b"FlateDecode"
        ) && !stream.dict.has(b"DecodeParms");
        if !plain_flate {
            continue;
        }

        let mut decoded = Vec::new();
        if ZlibDecoder::new(stream.content.as_slice())
            .read_to_end(&mut decoded)
            .is_err()
        {
            continue;
        }

        let mut encoder = ZlibEncoder::new(Vec::new(), flate2::Compression::best());
        if encoder.write_all(&decoded).is_err() {
            continue;
        }
        let Ok(encoded) = encoder.finish() else {
            continue;
        };

        if encoded.len() < stream.content.len() {
            stream.dict.set("Length", Object::Integer(encoded.len() as i64));
            stream.content = encoded;
            recompressed += 1;
        }
    }

    debug!(recompressed, "Re-deflated streams");
}

/// Extract PDF version from header
fn extract_version(bytes: &[u8]) -> String {
    // Header format: %PDF-1.7
    if let Some(pos) = find_pattern(&bytes[..bytes.len().min(1024)], b"%PDF-") {
        let start = pos + 5;
        if let Some(version_bytes) = bytes.get(start..start + 3) {
            if let Ok(version) = std::str::from_utf8(version_bytes) {
                return version.trim().to_string();
            }
        }
    }
    "1.4".to_string()
}

/// Decode a PDF text string: UTF-16BE when it carries a byte order mark,
/// PDFDocEncoding (treated as Latin-1) otherwise
pub(crate) fn decode_text_string(bytes: &[u8]) -> String {
    if let Some(utf16) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = utf16
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    if let Some(utf8) = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]) {
        return String::from_utf8_lossy(utf8).into_owned();
    }
    bytes.iter().map(|&b| b as char).collect()
}

fn find_pattern(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}
