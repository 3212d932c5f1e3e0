//! Packaging of multi-file outputs

use std::io::{Cursor, Write};

use serde::Serialize;
use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::{PdfStudioError, Result};
use crate::naming;
use crate::split::SplitResult;

/// A named output blob
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutputFile {
    pub name: String,
    #[serde(skip)]
    pub data: Vec<u8>,
}

impl OutputFile {
    pub fn new(name: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }
}

impl From<SplitResult> for OutputFile {
    fn from(result: SplitResult) -> Self {
        Self::new(result.name, result.data)
    }
}

/// Write `files` into a deflate-compressed zip, in order
pub fn create_zip_archive(files: &[OutputFile]) -> Result<Vec<u8>> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for file in files {
        zip.start_file(file.name.as_str(), options)
            .map_err(|e| PdfStudioError::ArchiveError(e.to_string()))?;
        zip.write_all(&file.data)
            .map_err(|e| PdfStudioError::ArchiveError(e.to_string()))?;
    }

    let cursor = zip
        .finish()
        .map_err(|e| PdfStudioError::ArchiveError(e.to_string()))?;
    let bytes = cursor.into_inner();
    debug!(entries = files.len(), size = bytes.len(), "Wrote zip archive");
    Ok(bytes)
}

pub fn zip_split_results(results: &[SplitResult]) -> Result<Vec<u8>> {
    let files: Vec<OutputFile> = results.iter().cloned().map(OutputFile::from).collect();
    create_zip_archive(&files)
}

/// One file is passed through untouched. Several are zipped into
/// `{base}_split.zip`.
pub fn package(mut files: Vec<OutputFile>, base_name: &str) -> Result<OutputFile> {
    match files.len() {
        0 => Err(PdfStudioError::InvalidArgument(
            "Nothing to package".into(),
        )),
        1 => Ok(files.remove(0)),
        _ => Ok(OutputFile::new(
            naming::split_archive_name(base_name),
            create_zip_archive(&files)?,
        )),
    }
}
