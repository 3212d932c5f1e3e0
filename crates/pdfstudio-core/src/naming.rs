//! Output file names

use lazy_static::lazy_static;
use regex::Regex;

/// Longest sanitized bookmark title used in a file name, in characters
pub const MAX_TITLE_LEN: usize = 50;

lazy_static! {
    /// Trailing `.pdf` extension in any case
    static ref PDF_EXTENSION: Regex = Regex::new(r"(?i)\.pdf$").unwrap();

    /// Characters not allowed in file names on common filesystems
    static ref UNSAFE_CHARS: Regex = Regex::new(r#"[<>:"/\\|?*]"#).unwrap();

    static ref WHITESPACE: Regex = Regex::new(r"\s+").unwrap();
}

/// File name without its `.pdf` extension
pub fn base_name(file_name: &str) -> String {
    PDF_EXTENSION.replace(file_name, "").into_owned()
}

/// Make a bookmark title safe for use in a file name
pub fn sanitize_title(title: &str) -> String {
    let safe = UNSAFE_CHARS.replace_all(title, "_");
    let safe = WHITESPACE.replace_all(&safe, "_");
    safe.chars().take(MAX_TITLE_LEN).collect()
}

pub fn extracted_name(base: &str) -> String {
    format!("{}_extracted.pdf", base)
}

pub fn range_name(base: &str, start: u32, end: u32) -> String {
    format!("{}_pages_{}-{}.pdf", base, start, end)
}

pub fn chunk_name(base: &str, start: u32, end: u32) -> String {
    format!("{}_{}-{}.pdf", base, start, end)
}

pub fn single_page_name(base: &str, page: u32) -> String {
    format!("{}_page_{}.pdf", base, page)
}

/// `index` is 1-based within the flattened bookmark list
pub fn bookmark_name(base: &str, index: usize, title: &str) -> String {
    format!("{}_{:02}_{}.pdf", base, index, sanitize_title(title))
}

pub fn even_pages_name(base: &str) -> String {
    format!("{}_even_pages.pdf", base)
}

pub fn odd_pages_name(base: &str) -> String {
    format!("{}_odd_pages.pdf", base)
}

pub fn part_name(base: &str, part: usize) -> String {
    format!("{}_part{}.pdf", base, part)
}

pub fn no_blanks_name(base: &str) -> String {
    format!("{}_no_blanks.pdf", base)
}

pub fn split_archive_name(base: &str) -> String {
    format!("{}_split.zip", base)
}

pub fn merged_name(file_name: &str) -> String {
    format!("merged_{}", file_name)
}

pub fn compressed_name(file_name: &str) -> String {
    format!("compressed_{}", file_name)
}
