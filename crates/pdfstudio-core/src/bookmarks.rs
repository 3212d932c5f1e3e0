//! Document outline (bookmark) extraction
//!
//! Walks `/Outlines` through `/First` and `/Next` links and resolves each
//! entry's destination to a 1-based page number.

use std::collections::HashSet;

use lopdf::{Dictionary, Object, ObjectId};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::document::{decode_text_string, PdfDocument};

/// Nesting limit for outline and name trees
const MAX_DEPTH: usize = 64;

/// Safety limit on outline entries in one document
const MAX_ENTRIES: usize = 100_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bookmark {
    pub title: String,
    /// Target page, 1-based
    pub page_number: u32,
    /// Depth in the outline, 0 = top level
    pub level: u32,
    pub children: Vec<Bookmark>,
}

/// Where an outline entry points
enum Target {
    Page(u32),
    /// The entry carries no destination or GoTo action
    Missing,
    Unresolved,
}

struct OutlineWalker<'a> {
    doc: &'a PdfDocument,
    visited: HashSet<ObjectId>,
    skipped: usize,
}

/// Read the document outline as a tree of top-level bookmarks.
///
/// A document without an outline yields an empty list.
pub fn extract_outline(doc: &PdfDocument) -> Vec<Bookmark> {
    let Some(first) = doc
        .catalog()
        .and_then(|catalog| catalog.get(b"Outlines").ok())
        .and_then(|outlines| doc.resolve(outlines))
        .and_then(|outlines| outlines.as_dict().ok())
        .and_then(|outlines| outlines.get(b"First").and_then(Object::as_reference).ok())
    else {
        return Vec::new();
    };

    let mut walker = OutlineWalker {
        doc,
        visited: HashSet::new(),
        skipped: 0,
    };
    let bookmarks = walker.siblings(first, 0);

    debug!(
        top_level = bookmarks.len(),
        skipped = walker.skipped,
        "Extracted outline"
    );
    bookmarks
}

impl OutlineWalker<'_> {
    fn siblings(&mut self, first: ObjectId, level: u32) -> Vec<Bookmark> {
        let mut items = Vec::new();
        if level as usize >= MAX_DEPTH {
            warn!(level, "Outline nesting too deep, truncating");
            return items;
        }

        let mut current = Some(first);
        while let Some(node_id) = current {
            if self.visited.len() >= MAX_ENTRIES || !self.visited.insert(node_id) {
                break;
            }
            let Ok(node) = self.doc.inner().get_dictionary(node_id) else {
                break;
            };

            let title = node
                .get(b"Title")
                .ok()
                .and_then(|t| self.doc.resolve(t))
                .and_then(|t| t.as_str().ok())
                .map(decode_text_string)
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| "Untitled".to_string());

            let page_number = match self.target(node) {
                Target::Page(page) => Some(page),
                Target::Missing => Some(1),
                Target::Unresolved => {
                    warn!(title = %title, "Skipping bookmark with unresolvable destination");
                    self.skipped += 1;
                    None
                }
            };

            if let Some(page_number) = page_number {
                let children = match node.get(b"First").and_then(Object::as_reference) {
                    Ok(child) => self.siblings(child, level + 1),
                    Err(_) => Vec::new(),
                };
                items.push(Bookmark {
                    title,
                    page_number,
                    level,
                    children,
                });
            }

            current = node.get(b"Next").and_then(Object::as_reference).ok();
        }

        items
    }

    fn target(&self, node: &Dictionary) -> Target {
        if let Ok(dest) = node.get(b"Dest") {
            return self.resolve_destination(dest, 0);
        }

        let action = node
            .get(b"A")
            .ok()
            .and_then(|a| self.doc.resolve(a))
            .and_then(|a| a.as_dict().ok());
        if let Some(action) = action {
            let is_goto = matches!(action.get(b"S").and_then(Object::as_name), Ok(b"GoTo"));
            if is_goto {
                return match action.get(b"D") {
                    Ok(dest) => self.resolve_destination(dest, 0),
                    Err(_) => Target::Unresolved,
                };
            }
        }

        Target::Missing
    }

    fn resolve_destination(&self, dest: &Object, depth: usize) -> Target {
        if depth >= MAX_DEPTH {
            return Target::Unresolved;
        }
        let Some(dest) = self.doc.resolve(dest) else {
            return Target::Unresolved;
        };

        match dest {
            Object::Array(items) => match items.first() {
                Some(Object::Reference(page_id)) => self
                    .doc
                    .page_number_of(*page_id)
                    .map_or(Target::Unresolved, Target::Page),
                // Some producers write a 0-based page index instead of a reference
                Some(Object::Integer(index)) if *index >= 0 => {
                    let page = *index as u32 + 1;
                    if page <= self.doc.page_count() {
                        Target::Page(page)
                    } else {
                        Target::Unresolved
                    }
                }
                _ => Target::Unresolved,
            },
            Object::Dictionary(dict) => match dict.get(b"D") {
                Ok(inner) => self.resolve_destination(inner, depth + 1),
                Err(_) => Target::Unresolved,
            },
            Object::Name(name) | Object::String(name, _) => match self.named_destination(name) {
                Some(found) => self.resolve_destination(found, depth + 1),
                None => Target::Unresolved,
            },
            _ => Target::Unresolved,
        }
    }

    /// Look `name` up in the catalog's `/Dests` dictionary, then in the
    /// `/Names /Dests` name tree
    fn named_destination(&self, name: &[u8]) -> Option<&Object> {
        let catalog = self.doc.catalog()?;

        let from_dests = catalog
            .get(b"Dests")
            .ok()
            .and_then(|d| self.doc.resolve(d))
            .and_then(|d| d.as_dict().ok())
            .and_then(|d| d.get(name).ok());
        if from_dests.is_some() {
            return from_dests;
        }

        let tree = catalog
            .get(b"Names")
            .ok()
            .and_then(|n| self.doc.resolve(n))
            .and_then(|n| n.as_dict().ok())?
            .get(b"Dests")
            .ok()
            .and_then(|d| self.doc.resolve(d))
            .and_then(|d| d.as_dict().ok())?;

        self.lookup_name_tree(tree, name, 0)
    }

    fn lookup_name_tree<'d>(
        &'d self,
        node: &'d Dictionary,
        name: &[u8],
        depth: usize,
    ) -> Option<&'d Object> {
        if depth >= MAX_DEPTH {
            return None;
        }

        if let Some(names) = node
            .get(b"Names")
            .ok()
            .and_then(|n| self.doc.resolve(n))
            .and_then(|n| n.as_array().ok())
        {
            for pair in names.chunks_exact(2) {
                let key = self.doc.resolve(&pair[0]).and_then(|k| k.as_str().ok());
                if key == Some(name) {
                    return Some(&pair[1]);
                }
            }
        }

        let kids = node
            .get(b"Kids")
            .ok()
            .and_then(|k| self.doc.resolve(k))
            .and_then(|k| k.as_array().ok())?;
        kids.iter()
            .filter_map(|kid| self.doc.resolve(kid).and_then(|k| k.as_dict().ok()))
            .find_map(|kid| self.lookup_name_tree(kid, name, depth + 1))
    }
}

/// Pre-order flattening down to `target_level`, sorted by page number.
///
/// Nodes deeper than `target_level` are left out. The sort is stable, so
/// bookmarks on the same page keep their outline order.
pub fn flatten(bookmarks: &[Bookmark], target_level: u32) -> Vec<Bookmark> {
    fn visit(items: &[Bookmark], depth: u32, target: u32, out: &mut Vec<Bookmark>) {
        for item in items {
            if depth <= target {
                out.push(Bookmark {
                    children: Vec::new(),
                    ..item.clone()
                });
            }
            if depth < target && !item.children.is_empty() {
                visit(&item.children, depth + 1, target, out);
            }
        }
    }

    let mut flat = Vec::new();
    visit(bookmarks, 0, target_level, &mut flat);
    flat.sort_by_key(|b| b.page_number);
    flat
}
