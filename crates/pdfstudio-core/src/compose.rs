//! Output document assembly
//!
//! Builds a fresh document out of pages copied from one or more loaded
//! documents:
//! 1. Import each source's objects once, remapping ids by an offset
//! 2. Detach each copied page (inline inherited attributes, drop `/Parent`)
//! 3. Re-parent the pages under a single flat page tree
//! 4. Write a new catalog, prune unreachable objects and save

use std::collections::{HashMap, HashSet};

use lopdf::{Dictionary, Document, Object, ObjectId};

use crate::document::{save_document, DocumentId, PageHandle, PdfDocument, SaveOptions};
use crate::error::{PdfStudioError, Result};

pub struct PageComposer {
    target: Document,
    pages_id: ObjectId,
    kids: Vec<ObjectId>,
    /// Id offset applied to each imported source document
    offsets: HashMap<DocumentId, u32>,
    placed: HashSet<ObjectId>,
}

impl Default for PageComposer {
    fn default() -> Self {
        Self::new()
    }
}

impl PageComposer {
    pub fn new() -> Self {
        let mut target = Document::with_version("1.7");
        let pages_id = target.new_object_id();

        Self {
            target,
            pages_id,
            kids: Vec::new(),
            offsets: HashMap::new(),
            placed: HashSet::new(),
        }
    }

    /// Number of pages added so far
    pub fn page_count(&self) -> u32 {
        self.kids.len() as u32
    }

    /// Copy `page_numbers` (1-based, any order, duplicates allowed) from `source`
    pub fn append(&mut self, source: &PdfDocument, page_numbers: &[u32]) -> Result<()> {
        let handles = source.copy_pages(page_numbers)?;
        self.append_handles(source, &handles)
    }

    /// Copy every page of `source` in document order
    pub fn append_all(&mut self, source: &PdfDocument) -> Result<()> {
        let all: Vec<u32> = (1..=source.page_count()).collect();
        self.append(source, &all)
    }

    /// Add pages previously resolved with [`PdfDocument::copy_pages`]
    pub fn append_handles(&mut self, source: &PdfDocument, handles: &[PageHandle]) -> Result<()> {
        if let Some(foreign) = handles.iter().find(|h| h.source != source.id()) {
            return Err(PdfStudioError::OperationError(format!(
                "Page {} was copied from a different document",
                foreign.page_number
            )));
        }

        let offset = self.import(source);

        for handle in handles {
            let mut page = source.detached_page(handle.object_id)?;
            for (_, value) in page.iter_mut() {
                *value = remap_object_refs(value.clone(), offset);
            }
            page.set("Parent", Object::Reference(self.pages_id));

            let target_id = (handle.object_id.0 + offset, handle.object_id.1);
            let page_id = if self.placed.insert(target_id) {
                self.target
                    .objects
                    .insert(target_id, Object::Dictionary(page));
                target_id
            } else {
                // Same page requested again: give the copy its own object
                self.target.add_object(Object::Dictionary(page))
            };
            self.kids.push(page_id);
        }

        Ok(())
    }

    /// Bring all objects of `source` into the target under a fresh id range
    fn import(&mut self, source: &PdfDocument) -> u32 {
        if let Some(&offset) = self.offsets.get(&source.id()) {
            return offset;
        }

        let objects = &source.inner().objects;
        let source_max = objects
            .keys()
            .map(|id| id.0)
            .max()
            .unwrap_or(0)
            .max(source.inner().max_id);
        let offset = self.target.max_id;

        for (old_id, object) in objects.iter() {
            let new_id = (old_id.0 + offset, old_id.1);
            self.target
                .objects
                .insert(new_id, remap_object_refs(object.clone(), offset));
        }

        self.target.max_id = offset + source_max;
        self.offsets.insert(source.id(), offset);
        offset
    }

    /// Assemble the page tree and catalog, then serialize
    pub fn finish(mut self, options: &SaveOptions) -> Result<Vec<u8>> {
        if self.kids.is_empty() {
            return Err(PdfStudioError::InvalidArgument(
                "No pages specified".into(),
            ));
        }

        let kids = self
            .kids
            .iter()
            .map(|&id| Object::Reference(id))
            .collect::<Vec<_>>();
        let pages = Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Pages".to_vec())),
            ("Count", Object::Integer(self.kids.len() as i64)),
            ("Kids", Object::Array(kids)),
        ]);
        self.target
            .objects
            .insert(self.pages_id, Object::Dictionary(pages));

        let catalog = Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Catalog".to_vec())),
            ("Pages", Object::Reference(self.pages_id)),
        ]);
        let catalog_id = self.target.add_object(catalog);
        self.target.trailer.set("Root", Object::Reference(catalog_id));

        // Drops the source catalogs, page trees and any pages not copied
        self.target.prune_objects();

        save_document(&mut self.target, options)
    }
}

/// Build a single-source document holding `page_numbers` in the given order
pub fn compose_pages(
    source: &PdfDocument,
    page_numbers: &[u32],
    options: &SaveOptions,
) -> Result<Vec<u8>> {
    let mut composer = PageComposer::new();
    composer.append(source, page_numbers)?;
    composer.finish(options)
}

/// Recursively remap object references in an object
pub(crate) fn remap_object_refs(obj: Object, offset: u32) -> Object {
    match obj {
        Object::Reference(id) => Object::Reference((id.0 + offset, id.1)),
        Object::Array(arr) => Object::Array(
            arr.into_iter()
                .map(|o| remap_object_refs(o, offset))
                .collect(),
        ),
        Object::Dictionary(mut dict) => {
            for (_, value) in dict.iter_mut() {
                *value = remap_object_refs(value.clone(), offset);
            }
            Object::Dictionary(dict)
        }
        Object::Stream(mut stream) => {
            for (_, value) in stream.dict.iter_mut() {
                *value = remap_object_refs(value.clone(), offset);
            }
            Object::Stream(stream)
        }
        other => other,
    }
}
