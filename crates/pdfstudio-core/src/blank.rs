//! Blank page detection
//!
//! A page is blank when the share of near-white pixels in a low resolution
//! rendering reaches the threshold.

use std::collections::{BTreeSet, HashSet};

use serde::Serialize;
use tracing::{debug, info};

use crate::compose::compose_pages;
use crate::document::{PdfDocument, SaveOptions};
use crate::error::{PdfStudioError, Result};
use crate::render::{PageRenderer, PixelBuffer, ANALYSIS_SCALE};

pub const DEFAULT_BLANK_THRESHOLD: f64 = 0.98;

/// A channel value above this counts as white
const WHITE_CHANNEL_MIN: u8 = 250;

/// Fraction of pixels whose R, G and B channels are all above 250.
///
/// Alpha is ignored. An empty buffer counts as entirely white.
pub fn white_ratio(pixels: &PixelBuffer) -> f64 {
    let total = pixels.width() as u64 * pixels.height() as u64;
    if total == 0 {
        return 1.0;
    }

    let white = pixels
        .pixels()
        .filter(|p| {
            p.0[0] > WHITE_CHANNEL_MIN && p.0[1] > WHITE_CHANNEL_MIN && p.0[2] > WHITE_CHANNEL_MIN
        })
        .count() as u64;

    white as f64 / total as f64
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlankPageInfo {
    pub page_number: u32,
    pub white_ratio: f64,
    pub is_blank: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlankRemoval {
    #[serde(skip)]
    pub data: Vec<u8>,
    pub removed_pages: Vec<u32>,
    pub page_count: u32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NonBlankExtraction {
    #[serde(skip)]
    pub data: Vec<u8>,
    pub skipped_blank_pages: Vec<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlankDetector {
    threshold: f64,
    scale: f32,
}

impl Default for BlankDetector {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_BLANK_THRESHOLD,
            scale: ANALYSIS_SCALE,
        }
    }
}

impl BlankDetector {
    pub fn new(threshold: f64, scale: f32) -> Result<Self> {
        if !(0.0..=1.0).contains(&threshold) {
            return Err(PdfStudioError::InvalidArgument(format!(
                "Blank threshold must be between 0 and 1, got {}",
                threshold
            )));
        }
        if !(scale.is_finite() && scale > 0.0) {
            return Err(PdfStudioError::InvalidArgument(format!(
                "Render scale must be positive, got {}",
                scale
            )));
        }
        Ok(Self { threshold, scale })
    }

    pub fn with_threshold(threshold: f64) -> Result<Self> {
        Self::new(threshold, ANALYSIS_SCALE)
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    /// Classify every page of `doc`, in page order
    pub fn classify(
        &self,
        doc: &PdfDocument,
        renderer: &dyn PageRenderer,
    ) -> Result<Vec<BlankPageInfo>> {
        let pages: Vec<u32> = (1..=doc.page_count()).collect();
        self.classify_pages(doc, renderer, &pages)
    }

    fn classify_pages(
        &self,
        doc: &PdfDocument,
        renderer: &dyn PageRenderer,
        pages: &[u32],
    ) -> Result<Vec<BlankPageInfo>> {
        let mut results = Vec::with_capacity(pages.len());

        renderer.render_pages(doc, pages, self.scale, &mut |page_number, pixels| {
            let ratio = white_ratio(&pixels);
            let is_blank = ratio >= self.threshold;
            debug!(page = page_number, white_ratio = ratio, is_blank, "Analyzed page");
            results.push(BlankPageInfo {
                page_number,
                white_ratio: ratio,
                is_blank,
            });
            Ok(())
        })?;

        Ok(results)
    }

    /// Rebuild the document without its blank pages
    pub fn remove_blank(
        &self,
        doc: &PdfDocument,
        renderer: &dyn PageRenderer,
    ) -> Result<BlankRemoval> {
        let (blank, kept): (Vec<BlankPageInfo>, Vec<BlankPageInfo>) = self
            .classify(doc, renderer)?
            .into_iter()
            .partition(|info| info.is_blank);

        if kept.is_empty() {
            return Err(PdfStudioError::AllPagesBlank);
        }

        let removed_pages: Vec<u32> = blank.iter().map(|info| info.page_number).collect();
        let kept_pages: Vec<u32> = kept.iter().map(|info| info.page_number).collect();
        let data = compose_pages(doc, &kept_pages, &SaveOptions::default())?;

        info!(
            removed = removed_pages.len(),
            kept = kept_pages.len(),
            "Removed blank pages"
        );

        Ok(BlankRemoval {
            data,
            removed_pages,
            page_count: kept_pages.len() as u32,
        })
    }

    /// Extract `pages` in the given order, skipping the blank ones
    pub fn extract_non_blank(
        &self,
        doc: &PdfDocument,
        renderer: &dyn PageRenderer,
        pages: &[u32],
    ) -> Result<NonBlankExtraction> {
        if pages.is_empty() {
            return Err(PdfStudioError::InvalidArgument("No pages specified".into()));
        }
        for &page in pages {
            doc.check_page(page)?;
        }

        // Each distinct page is rendered once
        let distinct: Vec<u32> = pages
            .iter()
            .copied()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let blank: HashSet<u32> = self
            .classify_pages(doc, renderer, &distinct)?
            .into_iter()
            .filter(|info| info.is_blank)
            .map(|info| info.page_number)
            .collect();

        let (skipped_blank_pages, non_blank): (Vec<u32>, Vec<u32>) =
            pages.iter().copied().partition(|page| blank.contains(page));

        if non_blank.is_empty() {
            return Err(PdfStudioError::AllPagesBlank);
        }

        let data = compose_pages(doc, &non_blank, &SaveOptions::default())?;
        Ok(NonBlankExtraction {
            data,
            skipped_blank_pages,
        })
    }
}
