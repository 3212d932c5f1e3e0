use std::time::Instant;

use base64::Engine;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::archive::OutputFile;
use crate::compress::{compress, compress_to_target, CompressionLevel, CompressionOptions};
use crate::document::PdfDocument;
use crate::error::Result;
use crate::merge::{merge_at_position, merge_with_custom_order, MergePosition, PageOrder};
use crate::naming;
use crate::render::PageRenderer;
use crate::split::{split, SplitMode};

#[derive(Debug, Clone, Deserialize)]
pub struct InputFile {
    pub name: String,
    pub data: Vec<u8>,
}

/// How added documents are combined with the base document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MergeLayout {
    Position(MergePosition),
    CustomOrder(Vec<PageOrder>),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum PdfCommand {
    Split {
        file: InputFile,
        mode: SplitMode,
    },
    Merge {
        base: InputFile,
        #[serde(default)]
        added: Vec<InputFile>,
        layout: MergeLayout,
    },
    Compress {
        file: InputFile,
        #[serde(default)]
        level: CompressionLevel,
        #[serde(default)]
        remove_metadata: bool,
        /// Pick the lowest level that fits instead of using `level`
        #[serde(default)]
        target_mb: Option<f64>,
    },
}

/// Files produced by a command, before any packaging
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    pub files: Vec<OutputFile>,
    pub metrics: ProcessMetrics,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProcessResult {
    pub success: bool,
    pub files: Vec<EncodedFile>,
    pub error: Option<String>,
    pub metrics: Option<ProcessMetrics>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EncodedFile {
    pub name: String,
    /// Base64-encoded file data
    pub data: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProcessMetrics {
    pub input_size_bytes: usize,
    pub output_size_bytes: usize,
    pub page_count: u32,
    pub processing_time_ms: u64,
    /// Level picked for a size target
    #[serde(skip_serializing_if = "Option::is_none")]
    pub achieved_level: Option<CompressionLevel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_met: Option<bool>,
}

impl PdfCommand {
    pub fn name(&self) -> &'static str {
        match self {
            PdfCommand::Split { .. } => "split",
            PdfCommand::Merge { .. } => "merge",
            PdfCommand::Compress { .. } => "compress",
        }
    }

    fn input_size(&self) -> usize {
        match self {
            PdfCommand::Split { file, .. } | PdfCommand::Compress { file, .. } => file.data.len(),
            PdfCommand::Merge { base, added, .. } => {
                base.data.len() + added.iter().map(|f| f.data.len()).sum::<usize>()
            }
        }
    }

    /// Run the command. `renderer` is only consulted by split modes that
    /// detect blank pages.
    pub fn execute(&self, renderer: Option<&dyn PageRenderer>) -> Result<ProcessOutput> {
        let started = Instant::now();

        let mut target = None;
        let (files, page_count) = match self {
            PdfCommand::Split { file, mode } => {
                let doc = PdfDocument::load(file.data.clone())?;
                let base = naming::base_name(&file.name);
                let results = split(&doc, &base, mode, renderer)?;
                let pages = results.iter().map(|r| r.page_count).sum();
                (results.into_iter().map(OutputFile::from).collect(), pages)
            }
            PdfCommand::Merge {
                base,
                added,
                layout,
            } => {
                let base_doc = PdfDocument::load(base.data.clone())?;
                let added_docs = added
                    .iter()
                    .map(|f| PdfDocument::load(f.data.clone()))
                    .collect::<Result<Vec<_>>>()?;

                let (data, pages) = match layout {
                    MergeLayout::Position(position) => {
                        let pages = base_doc.page_count()
                            + added_docs.iter().map(|d| d.page_count()).sum::<u32>();
                        (merge_at_position(&base_doc, &added_docs, *position)?, pages)
                    }
                    MergeLayout::CustomOrder(order) => (
                        merge_with_custom_order(&base_doc, &added_docs, order)?,
                        order.len() as u32,
                    ),
                };
                (
                    vec![OutputFile::new(naming::merged_name(&base.name), data)],
                    pages,
                )
            }
            PdfCommand::Compress {
                file,
                level,
                remove_metadata,
                target_mb,
            } => {
                let doc = PdfDocument::load(file.data.clone())?;
                let result = match target_mb {
                    Some(target_mb) => {
                        let outcome = compress_to_target(&doc, *target_mb)?;
                        target = Some((outcome.achieved_level, outcome.target_met));
                        outcome.result
                    }
                    None => compress(
                        &doc,
                        &CompressionOptions {
                            level: *level,
                            remove_metadata: *remove_metadata,
                        },
                    )?,
                };
                let pages = result.page_count;
                (
                    vec![OutputFile::new(
                        naming::compressed_name(&file.name),
                        result.data,
                    )],
                    pages,
                )
            }
        };

        let metrics = ProcessMetrics {
            input_size_bytes: self.input_size(),
            output_size_bytes: files.iter().map(|f| f.data.len()).sum(),
            page_count,
            processing_time_ms: started.elapsed().as_millis() as u64,
            achieved_level: target.map(|(level, _)| level),
            target_met: target.map(|(_, met)| met),
        };
        info!(
            command = self.name(),
            outputs = files.len(),
            time_ms = metrics.processing_time_ms,
            "Command finished"
        );

        Ok(ProcessOutput { files, metrics })
    }
}

impl From<Result<ProcessOutput>> for ProcessResult {
    fn from(outcome: Result<ProcessOutput>) -> Self {
        match outcome {
            Ok(output) => ProcessResult {
                success: true,
                files: output
                    .files
                    .iter()
                    .map(|f| EncodedFile {
                        name: f.name.clone(),
                        data: base64::engine::general_purpose::STANDARD.encode(&f.data),
                    })
                    .collect(),
                error: None,
                metrics: Some(output.metrics),
            },
            Err(e) => ProcessResult {
                success: false,
                files: Vec::new(),
                error: Some(e.to_string()),
                metrics: None,
            },
        }
    }
}
