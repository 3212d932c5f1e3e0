//! Size estimation and structural compression
//!
//! Compression never re-encodes images or touches page content. Each level
//! applies a superset of the previous level's container transformations
//! (metadata stripping, stream compaction, pruning), so the expected ratios
//! in [`level_info`] are estimates only.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::document::{save_document, Compaction, PdfDocument, SaveOptions};
use crate::error::{PdfStudioError, Result};

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Attachment limit most mail providers enforce
pub const DEFAULT_EMAIL_LIMIT_MB: f64 = 25.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionLevel {
    Low,
    #[default]
    Medium,
    High,
    Extreme,
}

impl CompressionLevel {
    /// All levels, least aggressive first
    pub const ALL: [CompressionLevel; 4] = [
        CompressionLevel::Low,
        CompressionLevel::Medium,
        CompressionLevel::High,
        CompressionLevel::Extreme,
    ];

    /// Expected output size as a fraction of the input
    pub fn expected_ratio(self) -> f64 {
        match self {
            CompressionLevel::Low => 0.85,
            CompressionLevel::Medium => 0.65,
            CompressionLevel::High => 0.45,
            CompressionLevel::Extreme => 0.30,
        }
    }

    fn save_options(self, remove_metadata: bool) -> SaveOptions {
        match self {
            CompressionLevel::Low => SaveOptions {
                strip_metadata: remove_metadata,
                strip_xmp: false,
                compaction: Compaction::Streams,
            },
            CompressionLevel::Medium => SaveOptions {
                strip_metadata: true,
                strip_xmp: false,
                compaction: Compaction::Streams,
            },
            CompressionLevel::High => SaveOptions {
                strip_metadata: true,
                strip_xmp: false,
                compaction: Compaction::Full,
            },
            CompressionLevel::Extreme => SaveOptions {
                strip_metadata: true,
                strip_xmp: true,
                compaction: Compaction::Full,
            },
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CompressionLevel::Low => "low",
            CompressionLevel::Medium => "medium",
            CompressionLevel::High => "high",
            CompressionLevel::Extreme => "extreme",
        }
    }
}

impl fmt::Display for CompressionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CompressionLevel {
    type Err = PdfStudioError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(CompressionLevel::Low),
            "medium" => Ok(CompressionLevel::Medium),
            "high" => Ok(CompressionLevel::High),
            "extreme" => Ok(CompressionLevel::Extreme),
            other => Err(PdfStudioError::InvalidArgument(format!(
                "Unknown compression level: {}",
                other
            ))),
        }
    }
}

/// Descriptive settings for a level.
///
/// `image_dpi` and `image_quality` are shown to users as guidance; the
/// engine does not resample images.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelInfo {
    pub level: CompressionLevel,
    pub description: &'static str,
    pub expected_ratio: f64,
    pub image_dpi: u32,
    pub image_quality: u8,
    pub remove_metadata: bool,
}

pub fn level_info(level: CompressionLevel) -> LevelInfo {
    let (description, image_dpi, image_quality) = match level {
        CompressionLevel::Low => ("Minimal compression, best quality", 300, 90),
        CompressionLevel::Medium => ("Balanced compression", 200, 75),
        CompressionLevel::High => ("High compression, good quality", 150, 60),
        CompressionLevel::Extreme => ("Maximum compression, reduced quality", 72, 40),
    };

    LevelInfo {
        level,
        description,
        expected_ratio: level.expected_ratio(),
        image_dpi,
        image_quality,
        remove_metadata: level.save_options(false).strip_metadata,
    }
}

pub fn all_level_info() -> Vec<LevelInfo> {
    CompressionLevel::ALL.into_iter().map(level_info).collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompressionEstimate {
    pub level: CompressionLevel,
    /// Bytes
    pub estimated_size: u64,
    /// Percentage reduction
    pub estimated_ratio: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompressionResult {
    #[serde(skip)]
    pub data: Vec<u8>,
    pub original_size: usize,
    pub compressed_size: usize,
    /// Percentage reduction achieved; negative when the output grew
    pub compression_ratio: f64,
    pub page_count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompressionOptions {
    pub level: CompressionLevel,
    /// Strip metadata even at levels that keep it
    #[serde(default)]
    pub remove_metadata: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetCompression {
    pub result: CompressionResult,
    pub achieved_level: CompressionLevel,
    /// False when even the smallest output is above the target
    pub target_met: bool,
}

/// Size estimate for `level` without compressing anything
pub fn estimate(original_size: u64, level: CompressionLevel) -> CompressionEstimate {
    let ratio = level.expected_ratio();
    CompressionEstimate {
        level,
        estimated_size: (original_size as f64 * ratio).round() as u64,
        estimated_ratio: (1.0 - ratio) * 100.0,
    }
}

/// One estimate per level, least aggressive first
pub fn estimate_all(doc: &PdfDocument) -> Vec<CompressionEstimate> {
    CompressionLevel::ALL
        .into_iter()
        .map(|level| estimate(doc.byte_len() as u64, level))
        .collect()
}

/// Re-save `doc` with the transformations of `options.level`
pub fn compress(doc: &PdfDocument, options: &CompressionOptions) -> Result<CompressionResult> {
    let save_options = options.level.save_options(options.remove_metadata);
    let mut working = doc.inner().clone();
    let data = save_document(&mut working, &save_options)?;

    let original_size = doc.byte_len();
    let compressed_size = data.len();
    let compression_ratio = (1.0 - compressed_size as f64 / original_size as f64) * 100.0;

    debug!(
        level = %options.level,
        original_size,
        compressed_size,
        "Compressed document"
    );

    Ok(CompressionResult {
        data,
        original_size,
        compressed_size,
        compression_ratio,
        page_count: doc.page_count(),
    })
}

/// Try levels from low to extreme and stop at the first output that fits
/// in `target_mb`. When none fits, the smallest output is returned with
/// `target_met` unset.
pub fn compress_to_target(doc: &PdfDocument, target_mb: f64) -> Result<TargetCompression> {
    if !(target_mb.is_finite() && target_mb > 0.0) {
        return Err(PdfStudioError::InvalidArgument(format!(
            "Target size must be positive, got {} MB",
            target_mb
        )));
    }
    let target_bytes = target_mb * BYTES_PER_MB;

    let mut best: Option<(CompressionResult, CompressionLevel)> = None;

    for level in CompressionLevel::ALL {
        let result = compress(
            doc,
            &CompressionOptions {
                level,
                remove_metadata: false,
            },
        )?;

        if result.compressed_size as f64 <= target_bytes {
            info!(%level, size = result.compressed_size, "Target size met");
            return Ok(TargetCompression {
                result,
                achieved_level: level,
                target_met: true,
            });
        }

        let smaller = best
            .as_ref()
            .map_or(true, |(b, _)| result.compressed_size < b.compressed_size);
        if smaller {
            best = Some((result, level));
        }
    }

    let (result, achieved_level) = best.ok_or_else(|| {
        PdfStudioError::OperationError("No compression level produced output".into())
    })?;
    info!(
        level = %achieved_level,
        size = result.compressed_size,
        target_bytes,
        "Target size not met, returning smallest result"
    );

    Ok(TargetCompression {
        result,
        achieved_level,
        target_met: false,
    })
}

/// Least aggressive level whose expected ratio fits the target
pub fn recommend_level(original_size: u64, target_mb: f64) -> CompressionLevel {
    let target_ratio = target_mb * BYTES_PER_MB / original_size as f64;

    CompressionLevel::ALL
        .into_iter()
        .find(|level| target_ratio >= level.expected_ratio())
        .unwrap_or(CompressionLevel::Extreme)
}

/// Compress several documents in turn. `on_progress` gets the 1-based
/// position, the total and the file name before each file starts.
pub fn compress_batch(
    files: &[(&str, &PdfDocument)],
    options: &CompressionOptions,
    mut on_progress: impl FnMut(usize, usize, &str),
) -> Result<Vec<CompressionResult>> {
    let total = files.len();
    files
        .iter()
        .enumerate()
        .map(|(i, (name, doc))| {
            on_progress(i + 1, total, name);
            compress(doc, options)
        })
        .collect()
}

/// Human readable size, e.g. `"1.5 MB"`
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];

    if bytes == 0 {
        return "0 Bytes".to_string();
    }

    let mut value = bytes as f64;
    let mut exponent = 0;
    while value >= 1024.0 && exponent < UNITS.len() - 1 {
        value /= 1024.0;
        exponent += 1;
    }

    let rounded = format!("{:.2}", value);
    let trimmed = rounded.trim_end_matches('0').trim_end_matches('.');
    format!("{} {}", trimmed, UNITS[exponent])
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Savings {
    /// Negative when the output is larger than the input
    pub saved_bytes: i64,
    pub saved_percentage: f64,
    pub formatted_saved: String,
}

pub fn calculate_savings(original_size: u64, compressed_size: u64) -> Savings {
    let saved_bytes = original_size as i64 - compressed_size as i64;
    let saved_percentage = if original_size == 0 {
        0.0
    } else {
        saved_bytes as f64 / original_size as f64 * 100.0
    };

    let formatted = format_file_size(saved_bytes.unsigned_abs());
    let formatted_saved = if saved_bytes < 0 {
        format!("-{}", formatted)
    } else {
        formatted
    };

    Savings {
        saved_bytes,
        saved_percentage,
        formatted_saved,
    }
}

pub fn meets_email_limit(size_bytes: u64, limit_mb: f64) -> bool {
    size_bytes as f64 <= limit_mb * BYTES_PER_MB
}
