//! PDF split strategies
//!
//! Every strategy copies pages out of one loaded document into fresh output
//! documents, never reordering them, and names each output after the input's
//! base name.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::blank::{BlankDetector, DEFAULT_BLANK_THRESHOLD};
use crate::bookmarks::{extract_outline, flatten};
use crate::compose::compose_pages;
use crate::document::{PdfDocument, SaveOptions};
use crate::error::{PdfStudioError, Result};
use crate::naming;
use crate::ranges::parse_ranges;
use crate::render::{PageRenderer, ANALYSIS_SCALE};

pub const DEFAULT_EVERY_N: u32 = 5;
pub const DEFAULT_TARGET_MB: f64 = 10.0;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// One output document of a split
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SplitResult {
    pub name: String,
    #[serde(skip)]
    pub data: Vec<u8>,
    pub page_count: u32,
    pub start_page: u32,
    pub end_page: u32,
}

/// A split request, one variant per strategy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SplitMode {
    Extract {
        pages: Vec<u32>,
        #[serde(default)]
        skip_blank: bool,
        #[serde(default)]
        threshold: Option<f64>,
        #[serde(default)]
        scale: Option<f32>,
    },
    Ranges {
        expression: String,
    },
    EveryN {
        n: u32,
    },
    Single,
    Bookmarks {
        #[serde(default)]
        level: u32,
    },
    Even,
    Odd,
    BySize {
        target_mb: f64,
    },
    RemoveBlank {
        #[serde(default)]
        threshold: Option<f64>,
        #[serde(default)]
        scale: Option<f32>,
    },
}

impl SplitMode {
    /// Whether this mode has to rasterize pages
    pub fn needs_renderer(&self) -> bool {
        matches!(
            self,
            SplitMode::Extract {
                skip_blank: true,
                ..
            } | SplitMode::RemoveBlank { .. }
        )
    }

    /// Detector for the blank-page modes, defaults filled in
    pub fn blank_detector(&self) -> Result<BlankDetector> {
        let (threshold, scale) = match self {
            SplitMode::Extract {
                threshold, scale, ..
            }
            | SplitMode::RemoveBlank { threshold, scale } => (*threshold, *scale),
            _ => (None, None),
        };
        BlankDetector::new(
            threshold.unwrap_or(DEFAULT_BLANK_THRESHOLD),
            scale.unwrap_or(ANALYSIS_SCALE),
        )
    }
}

/// Run the strategy `mode` describes
pub fn split(
    doc: &PdfDocument,
    base_name: &str,
    mode: &SplitMode,
    renderer: Option<&dyn PageRenderer>,
) -> Result<Vec<SplitResult>> {
    let renderer = if mode.needs_renderer() {
        Some(renderer.ok_or(PdfStudioError::RendererUnavailable)?)
    } else {
        None
    };

    let results = match (mode, renderer) {
        (SplitMode::Extract { pages, .. }, Some(renderer)) => {
            extract_non_blank_pages(doc, base_name, pages, &mode.blank_detector()?, renderer)?
        }
        (SplitMode::Extract { pages, .. }, None) => extract_pages(doc, base_name, pages)?,
        (SplitMode::Ranges { expression }, _) => split_by_ranges(doc, base_name, expression)?,
        (SplitMode::EveryN { n }, _) => split_every_n(doc, base_name, *n)?,
        (SplitMode::Single, _) => split_single_pages(doc, base_name)?,
        (SplitMode::Bookmarks { level }, _) => split_by_bookmarks(doc, base_name, *level)?,
        (SplitMode::Even, _) => extract_even_pages(doc, base_name)?,
        (SplitMode::Odd, _) => extract_odd_pages(doc, base_name)?,
        (SplitMode::BySize { target_mb }, _) => split_by_size(doc, base_name, *target_mb)?,
        (SplitMode::RemoveBlank { .. }, Some(renderer)) => {
            remove_blank_pages(doc, base_name, &mode.blank_detector()?, renderer)?
        }
        (SplitMode::RemoveBlank { .. }, None) => {
            return Err(PdfStudioError::RendererUnavailable);
        }
    };

    info!(
        outputs = results.len(),
        pages = results.iter().map(|r| r.page_count).sum::<u32>(),
        "Split complete"
    );
    Ok(results)
}

/// Copy `pages` into one output, labelled with their first and last page
fn single_output(doc: &PdfDocument, name: String, pages: &[u32]) -> Result<SplitResult> {
    let data = compose_pages(doc, pages, &SaveOptions::default())?;
    Ok(SplitResult {
        name,
        data,
        page_count: pages.len() as u32,
        start_page: pages.iter().copied().min().unwrap_or(0),
        end_page: pages.iter().copied().max().unwrap_or(0),
    })
}

/// Copy the contiguous run `start..=end`
fn contiguous_output(
    doc: &PdfDocument,
    name: String,
    start: u32,
    end: u32,
) -> Result<SplitResult> {
    let pages: Vec<u32> = (start..=end).collect();
    debug!(start, end, name = %name, "Writing chunk");
    single_output(doc, name, &pages)
}

/// Extract the given pages, in the given order, into one document
pub fn extract_pages(
    doc: &PdfDocument,
    base_name: &str,
    pages: &[u32],
) -> Result<Vec<SplitResult>> {
    if pages.is_empty() {
        return Err(PdfStudioError::InvalidArgument("No pages selected".into()));
    }
    Ok(vec![single_output(
        doc,
        naming::extracted_name(base_name),
        pages,
    )?])
}

/// Like [`extract_pages`], leaving out pages that render blank
pub fn extract_non_blank_pages(
    doc: &PdfDocument,
    base_name: &str,
    pages: &[u32],
    detector: &BlankDetector,
    renderer: &dyn PageRenderer,
) -> Result<Vec<SplitResult>> {
    if pages.is_empty() {
        return Err(PdfStudioError::InvalidArgument("No pages selected".into()));
    }

    let extraction = detector.extract_non_blank(doc, renderer, pages)?;
    if !extraction.skipped_blank_pages.is_empty() {
        info!(skipped = ?extraction.skipped_blank_pages, "Skipped blank pages");
    }

    let kept: Vec<u32> = pages
        .iter()
        .copied()
        .filter(|p| !extraction.skipped_blank_pages.contains(p))
        .collect();

    Ok(vec![SplitResult {
        name: naming::extracted_name(base_name),
        data: extraction.data,
        page_count: kept.len() as u32,
        start_page: kept.iter().copied().min().unwrap_or(0),
        end_page: kept.iter().copied().max().unwrap_or(0),
    }])
}

/// One output per range in `expression`, clamped to the document.
///
/// Ranges entirely outside the document are dropped, so an expression with
/// nothing valid yields no outputs.
pub fn split_by_ranges(
    doc: &PdfDocument,
    base_name: &str,
    expression: &str,
) -> Result<Vec<SplitResult>> {
    let ranges: Vec<_> = parse_ranges(expression)
        .into_iter()
        .filter_map(|range| range.clamp(doc.page_count()))
        .collect();
    if ranges.is_empty() {
        debug!(expression, "No valid page ranges");
    }

    ranges
        .into_iter()
        .map(|range| {
            contiguous_output(
                doc,
                naming::range_name(base_name, range.start, range.end),
                range.start,
                range.end,
            )
        })
        .collect()
}

/// Consecutive chunks of `n` pages; the last chunk may be shorter
pub fn split_every_n(doc: &PdfDocument, base_name: &str, n: u32) -> Result<Vec<SplitResult>> {
    if n < 1 {
        return Err(PdfStudioError::InvalidArgument(
            "Pages per chunk must be at least 1".into(),
        ));
    }
    chunked(doc, n, |start, end, _| naming::chunk_name(base_name, start, end))
}

pub fn split_single_pages(doc: &PdfDocument, base_name: &str) -> Result<Vec<SplitResult>> {
    (1..=doc.page_count())
        .map(|page| {
            contiguous_output(doc, naming::single_page_name(base_name, page), page, page)
        })
        .collect()
}

/// One output per bookmark at or above `level`.
///
/// Each section runs from its bookmark's page up to the page before the
/// next bookmark; the last one runs to the end of the document.
pub fn split_by_bookmarks(
    doc: &PdfDocument,
    base_name: &str,
    level: u32,
) -> Result<Vec<SplitResult>> {
    let outline = extract_outline(doc);
    if outline.is_empty() {
        return Err(PdfStudioError::NoBookmarks);
    }

    let flat = flatten(&outline, level);
    let total = doc.page_count();
    let mut results = Vec::new();

    for (i, bookmark) in flat.iter().enumerate() {
        let start = bookmark.page_number.max(1);
        if start > total {
            debug!(title = %bookmark.title, page = start, "Bookmark past last page, skipping");
            continue;
        }

        let end = match flat.get(i + 1) {
            Some(next) => next.page_number.saturating_sub(1).min(total),
            None => total,
        };
        if end < start {
            // Shares its start page with the next bookmark
            continue;
        }

        results.push(contiguous_output(
            doc,
            naming::bookmark_name(base_name, i + 1, &bookmark.title),
            start,
            end,
        )?);
    }

    Ok(results)
}

pub fn extract_even_pages(doc: &PdfDocument, base_name: &str) -> Result<Vec<SplitResult>> {
    let pages: Vec<u32> = (2..=doc.page_count()).step_by(2).collect();
    if pages.is_empty() {
        return Err(PdfStudioError::InvalidArgument(
            "Document has no even pages".into(),
        ));
    }
    Ok(vec![single_output(
        doc,
        naming::even_pages_name(base_name),
        &pages,
    )?])
}

pub fn extract_odd_pages(doc: &PdfDocument, base_name: &str) -> Result<Vec<SplitResult>> {
    let pages: Vec<u32> = (1..=doc.page_count()).step_by(2).collect();
    Ok(vec![single_output(
        doc,
        naming::odd_pages_name(base_name),
        &pages,
    )?])
}

/// Chunks sized from the input's average bytes per page.
///
/// The page count per chunk is an estimate: real output sizes vary with
/// how resources are shared between pages.
pub fn split_by_size(
    doc: &PdfDocument,
    base_name: &str,
    target_mb: f64,
) -> Result<Vec<SplitResult>> {
    let per_chunk = pages_per_chunk(doc.byte_len(), doc.page_count(), target_mb)?;
    debug!(per_chunk, target_mb, "Splitting by size");
    chunked(doc, per_chunk, |_, _, part| naming::part_name(base_name, part))
}

/// `max(1, floor(target_bytes / average_page_bytes))`
pub fn pages_per_chunk(byte_len: usize, page_count: u32, target_mb: f64) -> Result<u32> {
    if !(target_mb.is_finite() && target_mb > 0.0) {
        return Err(PdfStudioError::InvalidArgument(format!(
            "Target size must be positive, got {} MB",
            target_mb
        )));
    }

    let average_page = byte_len as f64 / page_count.max(1) as f64;
    let per_chunk = (target_mb * BYTES_PER_MB / average_page).floor();
    Ok(per_chunk.clamp(1.0, u32::MAX as f64) as u32)
}

pub fn remove_blank_pages(
    doc: &PdfDocument,
    base_name: &str,
    detector: &BlankDetector,
    renderer: &dyn PageRenderer,
) -> Result<Vec<SplitResult>> {
    let removal = detector.remove_blank(doc, renderer)?;

    let kept = (1..=doc.page_count()).filter(|p| !removal.removed_pages.contains(p));
    let (start_page, end_page) =
        kept.fold((u32::MAX, 0), |(lo, hi), p| (lo.min(p), hi.max(p)));

    Ok(vec![SplitResult {
        name: naming::no_blanks_name(base_name),
        data: removal.data,
        page_count: removal.page_count,
        start_page,
        end_page,
    }])
}

/// Walk the document in runs of `size` pages; `name` gets the run's
/// bounds and its 1-based position
fn chunked(
    doc: &PdfDocument,
    size: u32,
    name: impl Fn(u32, u32, usize) -> String,
) -> Result<Vec<SplitResult>> {
    let total = doc.page_count();
    let mut results = Vec::new();
    let mut start = 1u32;

    while start <= total {
        let end = start.saturating_add(size - 1).min(total);
        results.push(contiguous_output(
            doc,
            name(start, end, results.len() + 1),
            start,
            end,
        )?);
        if end == total {
            break;
        }
        start = end + 1;
    }

    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{content::Content, content::Operation, Dictionary, Document, Object, Stream};
    use pretty_assertions::assert_eq;

    // Helper to create a simple PDF with N pages
    fn create_test_pdf(num_pages: u32) -> PdfDocument {
        let mut doc = Document::with_version("1.7");
        let pages_id = doc.new_object_id();

        let mut page_ids = Vec::new();

        for i in 0..num_pages {
            let content = Content {
                operations: vec![
                    Operation::new("BT", vec![]),
                    Operation::new(
                        "Tf",
                        vec![Object::Name(b"F1".to_vec()), Object::Integer(12)],
                    ),
                    Operation::new("Td", vec![Object::Integer(100), Object::Integer(700)]),
                    Operation::new(
                        "Tj",
                        vec![Object::String(
                            format!("Page {}", i + 1).into_bytes(),
                            lopdf::StringFormat::Literal,
                        )],
                    ),
                    Operation::new("ET", vec![]),
                ],
            };
            let content_id =
                doc.add_object(Stream::new(Dictionary::new(), content.encode().unwrap()));

            let page = Dictionary::from_iter(vec![
                ("Type", Object::Name(b"Page".to_vec())),
                ("Parent", Object::Reference(pages_id)),
                (
                    "MediaBox",
                    Object::Array(vec![
                        Object::Integer(0),
                        Object::Integer(0),
                        Object::Integer(612),
                        Object::Integer(792),
                    ]),
                ),
                ("Contents", Object::Reference(content_id)),
            ]);
            page_ids.push(doc.add_object(page));
        }

        let pages = Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Pages".to_vec())),
            ("Count", Object::Integer(num_pages as i64)),
            (
                "Kids",
                Object::Array(page_ids.iter().map(|id| Object::Reference(*id)).collect()),
            ),
        ]);
        doc.objects.insert(pages_id, Object::Dictionary(pages));

        let catalog = Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Catalog".to_vec())),
            ("Pages", Object::Reference(pages_id)),
        ]);
        let catalog_id = doc.add_object(catalog);
        doc.trailer.set("Root", Object::Reference(catalog_id));

        let mut buffer = Vec::new();
        doc.save_to(&mut buffer).unwrap();
        PdfDocument::load(buffer).unwrap()
    }

    fn spans(results: &[SplitResult]) -> Vec<(u32, u32, u32)> {
        results
            .iter()
            .map(|r| (r.start_page, r.end_page, r.page_count))
            .collect()
    }

    fn output_pages(result: &SplitResult) -> usize {
        Document::load_mem(&result.data).unwrap().get_pages().len()
    }

    #[test]
    fn test_extract_empty_pages_fails() {
        let doc = create_test_pdf(5);
        let result = extract_pages(&doc, "doc", &[]);
        assert!(matches!(result, Err(PdfStudioError::InvalidArgument(_))));
    }

    #[test]
    fn test_extract_keeps_order_and_duplicates() {
        let doc = create_test_pdf(5);
        let results = extract_pages(&doc, "doc", &[4, 2, 4]).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].name, "doc_extracted.pdf");
        assert_eq!(spans(&results), vec![(2, 4, 3)]);
        assert_eq!(output_pages(&results[0]), 3);
    }

    #[test]
    fn test_extract_invalid_page_number_fails() {
        let doc = create_test_pdf(5);
        assert!(matches!(
            extract_pages(&doc, "doc", &[10]),
            Err(PdfStudioError::PageRangeError { page: 10, .. })
        ));
        assert!(extract_pages(&doc, "doc", &[0]).is_err());
    }

    #[test]
    fn test_split_by_ranges_clamps_and_skips() {
        let doc = create_test_pdf(10);
        let results = split_by_ranges(&doc, "doc", "1-3, 5, 8-12, 20-25, junk").unwrap();
        let names: Vec<&str> = results.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["doc_pages_1-3.pdf", "doc_pages_5-5.pdf", "doc_pages_8-10.pdf"]
        );
        assert_eq!(spans(&results), vec![(1, 3, 3), (5, 5, 1), (8, 10, 3)]);
    }

    #[test]
    fn test_split_every_n() {
        let doc = create_test_pdf(7);
        let results = split_every_n(&doc, "doc", 3).unwrap();
        assert_eq!(spans(&results), vec![(1, 3, 3), (4, 6, 3), (7, 7, 1)]);
        assert_eq!(results[2].name, "doc_7-7.pdf");
        assert_eq!(output_pages(&results[1]), 3);
    }

    #[test]
    fn test_split_every_n_zero_fails() {
        let doc = create_test_pdf(3);
        assert!(matches!(
            split_every_n(&doc, "doc", 0),
            Err(PdfStudioError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_split_every_n_larger_than_document() {
        let doc = create_test_pdf(3);
        let results = split_every_n(&doc, "doc", u32::MAX).unwrap();
        assert_eq!(spans(&results), vec![(1, 3, 3)]);
    }

    #[test]
    fn test_split_single_pages() {
        let doc = create_test_pdf(3);
        let results = split_single_pages(&doc, "doc").unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(results[1].name, "doc_page_2.pdf");
        assert!(results.iter().all(|r| output_pages(r) == 1));
    }

    #[test]
    fn test_even_and_odd() {
        let doc = create_test_pdf(5);
        let even = extract_even_pages(&doc, "doc").unwrap();
        assert_eq!(even[0].name, "doc_even_pages.pdf");
        assert_eq!(spans(&even), vec![(2, 4, 2)]);

        let odd = extract_odd_pages(&doc, "doc").unwrap();
        assert_eq!(odd[0].name, "doc_odd_pages.pdf");
        assert_eq!(spans(&odd), vec![(1, 5, 3)]);
    }

    #[test]
    fn test_even_pages_of_single_page_fails() {
        let doc = create_test_pdf(1);
        assert!(matches!(
            extract_even_pages(&doc, "doc"),
            Err(PdfStudioError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_bookmarks_split_without_outline_fails() {
        let doc = create_test_pdf(3);
        assert!(matches!(
            split_by_bookmarks(&doc, "doc", 0),
            Err(PdfStudioError::NoBookmarks)
        ));
    }

    #[test]
    fn test_pages_per_chunk() {
        let mb = 1024 * 1024;
        // 10 pages at 1 MB each, 3 MB target
        assert_eq!(pages_per_chunk(10 * mb, 10, 3.0).unwrap(), 3);
        // Target smaller than one page still yields one page per chunk
        assert_eq!(pages_per_chunk(10 * mb, 10, 0.1).unwrap(), 1);
        assert!(pages_per_chunk(mb, 1, 0.0).is_err());
        assert!(pages_per_chunk(mb, 1, -2.0).is_err());
        assert!(pages_per_chunk(mb, 1, f64::NAN).is_err());
    }

    #[test]
    fn test_split_by_size_names_parts() {
        let doc = create_test_pdf(4);
        // Tiny target: one page per part
        let results = split_by_size(&doc, "doc", 1e-9).unwrap();
        let names: Vec<&str> = results.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["doc_part1.pdf", "doc_part2.pdf", "doc_part3.pdf", "doc_part4.pdf"]
        );

        // Huge target: everything in one part
        let results = split_by_size(&doc, "doc", 1000.0).unwrap();
        assert_eq!(spans(&results), vec![(1, 4, 4)]);
    }

    #[test]
    fn test_dispatch_requires_renderer_for_blank_modes() {
        let doc = create_test_pdf(2);
        let mode = SplitMode::RemoveBlank {
            threshold: None,
            scale: None,
        };
        assert!(matches!(
            split(&doc, "doc", &mode, None),
            Err(PdfStudioError::RendererUnavailable)
        ));

        let mode = SplitMode::Extract {
            pages: vec![1],
            skip_blank: true,
            threshold: None,
            scale: None,
        };
        assert!(matches!(
            split(&doc, "doc", &mode, None),
            Err(PdfStudioError::RendererUnavailable)
        ));
    }

    #[test]
    fn test_blank_detector_from_mode() {
        let mode = SplitMode::RemoveBlank {
            threshold: Some(0.9),
            scale: Some(0.25),
        };
        let detector = mode.blank_detector().unwrap();
        assert_eq!(detector.threshold(), 0.9);
        assert_eq!(detector.scale(), 0.25);

        let defaults = SplitMode::Single.blank_detector().unwrap();
        assert_eq!(defaults.threshold(), DEFAULT_BLANK_THRESHOLD);
        assert_eq!(defaults.scale(), ANALYSIS_SCALE);

        let mode = SplitMode::Extract {
            pages: vec![1],
            skip_blank: true,
            threshold: Some(1.5),
            scale: None,
        };
        assert!(matches!(
            mode.blank_detector(),
            Err(PdfStudioError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_dispatch_every_n() {
        let doc = create_test_pdf(4);
        let results = split(&doc, "doc", &SplitMode::EveryN { n: 2 }, None).unwrap();
        assert_eq!(spans(&results), vec![(1, 2, 2), (3, 4, 2)]);
    }

    #[test]
    fn test_split_mode_deserializes() {
        let mode: SplitMode =
            serde_json::from_str(r#"{"type":"Ranges","expression":"1-3"}"#).unwrap();
        assert_eq!(
            mode,
            SplitMode::Ranges {
                expression: "1-3".into()
            }
        );

        let mode: SplitMode = serde_json::from_str(r#"{"type":"Bookmarks"}"#).unwrap();
        assert_eq!(mode, SplitMode::Bookmarks { level: 0 });
    }
}
