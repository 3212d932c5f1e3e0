//! Page range expressions such as `"1-3, 5, 8-10"`

use serde::{Deserialize, Serialize};

/// Inclusive page interval, `start <= end`.
///
/// Bounds are not checked against any document, so page 0 or pages past
/// the end can appear until [`PageRange::clamp`] is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRange {
    pub start: u32,
    pub end: u32,
}

impl PageRange {
    pub fn new(start: u32, end: u32) -> Option<Self> {
        (start <= end).then_some(Self { start, end })
    }

    /// Restrict to `[1, page_count]`; `None` when nothing is left
    pub fn clamp(&self, page_count: u32) -> Option<Self> {
        Self::new(self.start.max(1), self.end.min(page_count))
    }

    pub fn len(&self) -> u32 {
        (self.end - self.start).saturating_add(1)
    }

    /// A range always holds at least one page
    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn pages(&self) -> impl Iterator<Item = u32> {
        self.start..=self.end
    }
}

/// Leading decimal digits after optional whitespace and `+`, like
/// JavaScript's `parseInt(s, 10)` restricted to non-negative values.
/// Values too large for `u32` saturate.
fn parse_leading_int(token: &str) -> Option<u32> {
    let token = token.trim_start();
    let token = token.strip_prefix('+').unwrap_or(token);
    let digits = token
        .bytes()
        .take_while(u8::is_ascii_digit)
        .collect::<Vec<u8>>();
    if digits.is_empty() {
        return None;
    }

    Some(digits.iter().fold(0u32, |acc, d| {
        acc.saturating_mul(10).saturating_add((d - b'0') as u32)
    }))
}

/// Parse a comma separated list of `N` and `A-B` tokens.
///
/// Tokens that do not parse, or where `A > B`, are dropped. Order is kept
/// and nothing is de-duplicated.
pub fn parse_ranges(expression: &str) -> Vec<PageRange> {
    expression
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .filter_map(|part| {
            if part.contains('-') {
                let mut bounds = part.split('-');
                let start = parse_leading_int(bounds.next().unwrap_or_default())?;
                let end = parse_leading_int(bounds.next().unwrap_or_default())?;
                PageRange::new(start, end)
            } else {
                let page = parse_leading_int(part)?;
                Some(PageRange {
                    start: page,
                    end: page,
                })
            }
        })
        .collect()
}

/// Sorted, de-duplicated pages from `expression` that exist in a document
/// of `total_pages` pages
pub fn parse_page_selection(expression: &str, total_pages: u32) -> Vec<u32> {
    use std::collections::BTreeSet;

    let mut pages = BTreeSet::new();
    for range in parse_ranges(expression) {
        if let Some(range) = range.clamp(total_pages) {
            pages.extend(range.pages());
        }
    }
    pages.into_iter().collect()
}
