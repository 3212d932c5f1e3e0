//! PDF merge operations
//!
//! Combines pages of several documents into one. All variants go through
//! [`PageComposer`], which imports each source once and rebuilds a flat
//! page tree in the requested order.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::compose::PageComposer;
use crate::document::{PdfDocument, SaveOptions};
use crate::error::{PdfStudioError, Result};
use crate::ranges::PageRange;

/// Source index that refers to the base document in a [`PageOrder`]
pub const BASE_DOCUMENT: i32 = -1;

/// Where added documents go relative to the base document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MergePosition {
    Before,
    After,
    /// After the given base page; 0 means before the first page
    AfterPage(u32),
}

/// One output page of a custom-order merge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageOrder {
    /// -1 for the base document, otherwise an index into the added documents
    pub source_file_index: i32,
    /// 1-based page number within that source
    pub original_page_number: u32,
}

impl PageOrder {
    pub fn new(source_file_index: i32, original_page_number: u32) -> Self {
        Self {
            source_file_index,
            original_page_number,
        }
    }
}

/// A document plus the page ranges to take from it
#[derive(Debug, Clone)]
pub struct MergeSource<'a> {
    pub doc: &'a PdfDocument,
    /// Empty means every page
    pub ranges: Vec<PageRange>,
}

/// Merge multiple PDFs into one
///
/// The algorithm:
/// 1. If empty, return error
/// 2. If single document, return it as-is
/// 3. Load every document
/// 4. Append all pages of each, in order, to a fresh document
pub fn merge_documents(documents: Vec<Vec<u8>>) -> Result<Vec<u8>> {
    if documents.is_empty() {
        return Err(PdfStudioError::InvalidArgument(
            "No documents to merge".into(),
        ));
    }

    // Single document - return as-is
    if documents.len() == 1 {
        return Ok(documents.into_iter().next().unwrap_or_default());
    }

    let mut loaded = Vec::with_capacity(documents.len());
    for (i, bytes) in documents.into_iter().enumerate() {
        let doc = PdfDocument::load(bytes).map_err(|e| {
            PdfStudioError::ParseError(format!("Failed to load document {}: {}", i, e))
        })?;
        loaded.push(doc);
    }

    let mut composer = PageComposer::new();
    for doc in &loaded {
        composer.append_all(doc)?;
    }

    info!(
        documents = loaded.len(),
        pages = composer.page_count(),
        "Merged documents"
    );
    composer.finish(&SaveOptions::default())
}

/// Insert every page of `added`, in list order, into `base` at `position`
pub fn merge_at_position(
    base: &PdfDocument,
    added: &[PdfDocument],
    position: MergePosition,
) -> Result<Vec<u8>> {
    if added.is_empty() {
        return Err(PdfStudioError::InvalidArgument(
            "No documents to merge".into(),
        ));
    }

    let base_count = base.page_count();
    let split_at = match position {
        MergePosition::Before => 0,
        MergePosition::After => base_count,
        MergePosition::AfterPage(page) => page.min(base_count),
    };

    let before: Vec<u32> = (1..=split_at).collect();
    let after: Vec<u32> = (split_at + 1..=base_count).collect();

    let mut composer = PageComposer::new();
    composer.append(base, &before)?;
    for doc in added {
        composer.append_all(doc)?;
    }
    composer.append(base, &after)?;

    info!(
        ?position,
        added = added.len(),
        pages = composer.page_count(),
        "Merged at position"
    );
    composer.finish(&SaveOptions::default())
}

/// Build a document whose pages follow `order` exactly; duplicates allowed
pub fn merge_with_custom_order(
    base: &PdfDocument,
    added: &[PdfDocument],
    order: &[PageOrder],
) -> Result<Vec<u8>> {
    if order.is_empty() {
        return Err(PdfStudioError::InvalidArgument(
            "Page order is empty".into(),
        ));
    }

    let mut composer = PageComposer::new();
    for entry in order {
        let source = resolve_source(base, added, entry)?;
        composer.append(source, &[entry.original_page_number])?;
    }

    info!(pages = composer.page_count(), "Merged with custom order");
    composer.finish(&SaveOptions::default())
}

fn resolve_source<'a>(
    base: &'a PdfDocument,
    added: &'a [PdfDocument],
    entry: &PageOrder,
) -> Result<&'a PdfDocument> {
    let invalid = || PdfStudioError::InvalidPageReference {
        source_file_index: entry.source_file_index,
        page: entry.original_page_number,
    };

    let source = match entry.source_file_index {
        BASE_DOCUMENT => base,
        index if index >= 0 => added.get(index as usize).ok_or_else(invalid)?,
        _ => return Err(invalid()),
    };

    if entry.original_page_number == 0 || entry.original_page_number > source.page_count() {
        return Err(invalid());
    }
    Ok(source)
}

/// Concatenate selected ranges of several documents.
///
/// Ranges are clamped to each document; a source without ranges
/// contributes all of its pages.
pub fn merge_with_ranges(sources: &[MergeSource<'_>]) -> Result<Vec<u8>> {
    if sources.is_empty() {
        return Err(PdfStudioError::InvalidArgument(
            "No documents to merge".into(),
        ));
    }

    let mut composer = PageComposer::new();
    for source in sources {
        if source.ranges.is_empty() {
            composer.append_all(source.doc)?;
            continue;
        }
        for range in &source.ranges {
            if let Some(range) = range.clamp(source.doc.page_count()) {
                let pages: Vec<u32> = range.pages().collect();
                composer.append(source.doc, &pages)?;
            }
        }
    }

    info!(pages = composer.page_count(), "Merged page ranges");
    composer.finish(&SaveOptions::default())
}

/// Alternate pages of `a` and `b` (A1, B1, A2, B2, ...), appending the
/// remainder of the longer document. `reverse_b` takes `b` back to front,
/// which matches a stack of back sides scanned in reverse.
pub fn interleave_pages(a: &PdfDocument, b: &PdfDocument, reverse_b: bool) -> Result<Vec<u8>> {
    let pages_a = a.page_count();
    let pages_b = b.page_count();

    let mut b_order: Vec<u32> = (1..=pages_b).collect();
    if reverse_b {
        b_order.reverse();
    }

    let mut composer = PageComposer::new();
    for i in 0..pages_a.max(pages_b) {
        if i < pages_a {
            composer.append(a, &[i + 1])?;
        }
        if let Some(&page) = b_order.get(i as usize) {
            composer.append(b, &[page])?;
        }
    }

    info!(pages = composer.page_count(), reverse_b, "Interleaved pages");
    composer.finish(&SaveOptions::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{Dictionary, Document, Object};
    use pretty_assertions::assert_eq;

    /// Helper to create a simple PDF with N pages containing identifiable text
    fn create_test_pdf(num_pages: u32, content_prefix: &str) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");

        // Create a catalog and pages root
        let pages_id = doc.new_object_id();
        let catalog_id = doc.new_object_id();

        let mut page_ids = Vec::new();

        for page_num in 0..num_pages {
            let content = format!(
                "BT /F1 12 Tf 50 700 Td ({}-{}) Tj ET",
                content_prefix,
                page_num + 1
            );
            let content_id = doc.add_object(lopdf::Stream::new(
                Dictionary::new(),
                content.into_bytes(),
            ));

            let mut page_dict = Dictionary::new();
            page_dict.set("Type", Object::Name(b"Page".to_vec()));
            page_dict.set("Parent", Object::Reference(pages_id));
            page_dict.set("Contents", Object::Reference(content_id));
            page_dict.set(
                "MediaBox",
                Object::Array(vec![
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Integer(612),
                    Object::Integer(792),
                ]),
            );
            page_ids.push(Object::Reference(doc.add_object(page_dict)));
        }

        let mut pages_dict = Dictionary::new();
        pages_dict.set("Type", Object::Name(b"Pages".to_vec()));
        pages_dict.set("Count", Object::Integer(num_pages as i64));
        pages_dict.set("Kids", Object::Array(page_ids));
        doc.objects.insert(pages_id, Object::Dictionary(pages_dict));

        let mut catalog_dict = Dictionary::new();
        catalog_dict.set("Type", Object::Name(b"Catalog".to_vec()));
        catalog_dict.set("Pages", Object::Reference(pages_id));
        doc.objects
            .insert(catalog_id, Object::Dictionary(catalog_dict));

        doc.trailer.set("Root", Object::Reference(catalog_id));

        let mut buffer = Vec::new();
        doc.save_to(&mut buffer).unwrap();
        buffer
    }

    fn load(num_pages: u32, prefix: &str) -> PdfDocument {
        PdfDocument::load(create_test_pdf(num_pages, prefix)).unwrap()
    }

    /// Label drawn on each page of `bytes`, in page order
    fn labels(bytes: &[u8]) -> Vec<String> {
        let doc = Document::load_mem(bytes).unwrap();
        doc.get_pages()
            .values()
            .map(|&id| {
                let content = doc.get_page_content(id).unwrap();
                let text = String::from_utf8_lossy(&content).into_owned();
                let start = text.find('(').unwrap() + 1;
                let end = text.find(')').unwrap();
                text[start..end].to_string()
            })
            .collect()
    }

    #[test]
    fn test_merge_empty_fails() {
        let result = merge_documents(vec![]);
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("No documents to merge"));
    }

    #[test]
    fn test_merge_single_document_returns_same() {
        let pdf = create_test_pdf(2, "Single");
        let result = merge_documents(vec![pdf.clone()]).unwrap();
        assert_eq!(result, pdf);
    }

    #[test]
    fn test_merge_preserves_page_order() {
        let merged = merge_documents(vec![
            create_test_pdf(2, "First"),
            create_test_pdf(1, "Second"),
            create_test_pdf(2, "Third"),
        ])
        .unwrap();

        assert_eq!(
            labels(&merged),
            vec!["First-1", "First-2", "Second-1", "Third-1", "Third-2"]
        );
    }

    #[test]
    fn test_merge_handles_different_sizes() {
        let merged = merge_documents(vec![
            create_test_pdf(10, "Large"),
            create_test_pdf(1, "Small"),
            create_test_pdf(5, "Medium"),
        ])
        .unwrap();

        let doc = Document::load_mem(&merged).unwrap();
        assert_eq!(doc.get_pages().len(), 16);
    }

    #[test]
    fn test_merge_reports_bad_input_index() {
        let err = merge_documents(vec![create_test_pdf(1, "A"), b"garbage".to_vec()]).unwrap_err();
        assert!(err.to_string().contains("document 1"));
    }

    #[test]
    fn test_merge_after_page_inserts_in_middle() {
        let base = load(3, "B");
        let added = vec![load(2, "X")];

        let merged = merge_at_position(&base, &added, MergePosition::AfterPage(1)).unwrap();
        assert_eq!(labels(&merged), vec!["B-1", "X-1", "X-2", "B-2", "B-3"]);
    }

    #[test]
    fn test_merge_before_and_after() {
        let base = load(2, "B");
        let added = vec![load(1, "X"), load(1, "Y")];

        let before = merge_at_position(&base, &added, MergePosition::Before).unwrap();
        assert_eq!(labels(&before), vec!["X-1", "Y-1", "B-1", "B-2"]);

        let after = merge_at_position(&base, &added, MergePosition::After).unwrap();
        assert_eq!(labels(&after), vec!["B-1", "B-2", "X-1", "Y-1"]);
    }

    #[test]
    fn test_merge_after_page_clamps() {
        let base = load(2, "B");
        let added = vec![load(1, "X")];

        let merged = merge_at_position(&base, &added, MergePosition::AfterPage(99)).unwrap();
        assert_eq!(labels(&merged), vec!["B-1", "B-2", "X-1"]);

        let merged = merge_at_position(&base, &added, MergePosition::AfterPage(0)).unwrap();
        assert_eq!(labels(&merged), vec!["X-1", "B-1", "B-2"]);
    }

    #[test]
    fn test_merge_at_position_requires_added() {
        let base = load(2, "B");
        assert!(matches!(
            merge_at_position(&base, &[], MergePosition::After),
            Err(PdfStudioError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_custom_order_with_duplicates() {
        let base = load(2, "B");
        let added = vec![load(2, "X")];
        let order = vec![
            PageOrder::new(0, 2),
            PageOrder::new(-1, 1),
            PageOrder::new(0, 2),
            PageOrder::new(-1, 2),
        ];

        let merged = merge_with_custom_order(&base, &added, &order).unwrap();
        assert_eq!(labels(&merged), vec!["X-2", "B-1", "X-2", "B-2"]);
    }

    #[test]
    fn test_custom_order_rejects_bad_references() {
        let base = load(2, "B");
        let added = vec![load(1, "X")];

        for bad in [
            PageOrder::new(1, 1),
            PageOrder::new(-2, 1),
            PageOrder::new(-1, 3),
            PageOrder::new(0, 0),
        ] {
            let result = merge_with_custom_order(&base, &added, &[PageOrder::new(-1, 1), bad]);
            assert!(
                matches!(result, Err(PdfStudioError::InvalidPageReference { .. })),
                "{:?} should be rejected",
                bad
            );
        }
    }

    #[test]
    fn test_custom_order_empty_fails() {
        let base = load(1, "B");
        assert!(matches!(
            merge_with_custom_order(&base, &[], &[]),
            Err(PdfStudioError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_page_order_serde_uses_camel_case() {
        let order: PageOrder =
            serde_json::from_str(r#"{"sourceFileIndex":-1,"originalPageNumber":4}"#).unwrap();
        assert_eq!(order, PageOrder::new(BASE_DOCUMENT, 4));
    }

    #[test]
    fn test_merge_with_ranges() {
        let a = load(5, "A");
        let b = load(3, "B");
        let sources = vec![
            MergeSource {
                doc: &a,
                ranges: vec![
                    PageRange { start: 4, end: 9 },
                    PageRange { start: 1, end: 1 },
                ],
            },
            MergeSource {
                doc: &b,
                ranges: Vec::new(),
            },
        ];

        let merged = merge_with_ranges(&sources).unwrap();
        assert_eq!(
            labels(&merged),
            vec!["A-4", "A-5", "A-1", "B-1", "B-2", "B-3"]
        );
    }

    #[test]
    fn test_interleave_pages() {
        let fronts = load(3, "F");
        let backs = load(2, "R");

        let merged = interleave_pages(&fronts, &backs, false).unwrap();
        assert_eq!(labels(&merged), vec!["F-1", "R-1", "F-2", "R-2", "F-3"]);

        let merged = interleave_pages(&fronts, &backs, true).unwrap();
        assert_eq!(labels(&merged), vec!["F-1", "R-2", "F-2", "R-1", "F-3"]);
    }
}
