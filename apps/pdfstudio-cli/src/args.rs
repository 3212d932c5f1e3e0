//! Parsers for merge arguments

use anyhow::{bail, Context};
use pdfstudio_core::merge::{MergePosition, PageOrder, BASE_DOCUMENT};

/// `before`, `after`, or a base page number to insert after
pub fn parse_position(value: &str) -> anyhow::Result<MergePosition> {
    match value.trim().to_ascii_lowercase().as_str() {
        "before" | "start" => Ok(MergePosition::Before),
        "after" | "end" => Ok(MergePosition::After),
        page => page
            .parse()
            .map(MergePosition::AfterPage)
            .with_context(|| format!("Invalid merge position: {}", value)),
    }
}

/// Comma separated `SOURCE:PAGE` pairs. SOURCE is `base` (or -1) for the
/// base document, or the 0-based index of an added file.
pub fn parse_order(value: &str) -> anyhow::Result<Vec<PageOrder>> {
    let mut order = Vec::new();
    for entry in value.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let Some((source, page)) = entry.split_once(':') else {
            bail!("Expected SOURCE:PAGE, got {}", entry);
        };
        let source = match source.trim() {
            "base" | "b" => BASE_DOCUMENT,
            index => index
                .parse()
                .with_context(|| format!("Invalid source index: {}", index))?,
        };
        let page = page
            .trim()
            .parse()
            .with_context(|| format!("Invalid page number in {}", entry))?;
        order.push(PageOrder::new(source, page));
    }
    if order.is_empty() {
        bail!("Page order is empty");
    }
    Ok(order)
}
