//! Shared fixtures: synthetic PDFs and a fake renderer

#![allow(dead_code)]

use std::collections::HashSet;

use image::{Rgba, RgbaImage};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream, StringFormat};
use pdfstudio_core::render::{PageRenderer, PixelBuffer};
use pdfstudio_core::{PdfDocument, Result};

/// Where a test bookmark points
#[derive(Debug, Clone)]
pub enum Dest {
    Page(u32),
    /// `/Dest /name`, resolved through the catalog `/Dests` dictionary
    Named(String),
    /// `/Dest (name)`, resolved through the `/Names /Dests` tree
    NamedString(String),
    /// GoTo action with an explicit destination
    Action(u32),
    /// Reference to a page object that is not in the page tree
    Dangling,
    None,
}

#[derive(Debug, Clone)]
pub struct Entry {
    pub title: String,
    pub dest: Dest,
    pub children: Vec<Entry>,
}

pub fn entry(title: &str, dest: Dest) -> Entry {
    Entry {
        title: title.to_string(),
        dest,
        children: Vec::new(),
    }
}

pub fn chapter(title: &str, page: u32, children: Vec<Entry>) -> Entry {
    Entry {
        title: title.to_string(),
        dest: Dest::Page(page),
        children,
    }
}

/// Builds small PDFs whose page N draws the text `{label}-{N}`
#[derive(Debug, Clone)]
pub struct PdfBuilder {
    pages: u32,
    label: String,
    outline: Vec<Entry>,
    catalog_dests: Vec<(String, u32)>,
    name_tree_dests: Vec<(String, u32)>,
    title: Option<String>,
    author: Option<String>,
    bulky: bool,
}

impl PdfBuilder {
    pub fn new(pages: u32, label: &str) -> Self {
        Self {
            pages,
            label: label.to_string(),
            outline: Vec::new(),
            catalog_dests: Vec::new(),
            name_tree_dests: Vec::new(),
            title: None,
            author: None,
            bulky: false,
        }
    }

    pub fn outline(mut self, entries: Vec<Entry>) -> Self {
        self.outline = entries;
        self
    }

    pub fn catalog_dest(mut self, name: &str, page: u32) -> Self {
        self.catalog_dests.push((name.to_string(), page));
        self
    }

    pub fn name_tree_dest(mut self, name: &str, page: u32) -> Self {
        self.name_tree_dests.push((name.to_string(), page));
        self
    }

    pub fn metadata(mut self, title: &str, author: &str) -> Self {
        self.title = Some(title.to_string());
        self.author = Some(author.to_string());
        self
    }

    /// Uncompressed content, page thumbnails, XMP and unreachable objects,
    /// so every compression level has something to remove
    pub fn bulky(mut self) -> Self {
        self.bulky = true;
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let catalog_id = doc.new_object_id();

        let mut page_ids = Vec::new();
        for page in 1..=self.pages {
            let mut content = format!("BT /F1 12 Tf 50 700 Td ({}-{}) Tj ET", self.label, page);
            if self.bulky {
                for line in 0..200 {
                    content.push_str(&format!("\nBT /F1 8 Tf 50 {} Td (filler) Tj ET", line));
                }
            }
            let content_id = doc.add_object(Stream::new(Dictionary::new(), content.into_bytes()));

            let mut page_dict = Dictionary::new();
            page_dict.set("Type", Object::Name(b"Page".to_vec()));
            page_dict.set("Parent", Object::Reference(pages_id));
            page_dict.set("Contents", Object::Reference(content_id));
            page_dict.set(
                "MediaBox",
                Object::Array(vec![
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Integer(612),
                    Object::Integer(792),
                ]),
            );
            if self.bulky {
                let thumb = doc.add_object(Stream::new(Dictionary::new(), vec![0x7f; 4096]));
                page_dict.set("Thumb", Object::Reference(thumb));
            }
            page_ids.push(doc.add_object(page_dict));
        }

        let mut pages_dict = Dictionary::new();
        pages_dict.set("Type", Object::Name(b"Pages".to_vec()));
        pages_dict.set("Count", Object::Integer(self.pages as i64));
        pages_dict.set(
            "Kids",
            Object::Array(page_ids.iter().map(|&id| Object::Reference(id)).collect()),
        );
        doc.objects.insert(pages_id, Object::Dictionary(pages_dict));

        let mut catalog = Dictionary::new();
        catalog.set("Type", Object::Name(b"Catalog".to_vec()));
        catalog.set("Pages", Object::Reference(pages_id));

        if !self.outline.is_empty() {
            let outlines_id = doc.new_object_id();
            let (first, last, count) = add_entries(&mut doc, &self.outline, outlines_id, &page_ids);
            let mut outlines = Dictionary::new();
            outlines.set("Type", Object::Name(b"Outlines".to_vec()));
            outlines.set("First", Object::Reference(first));
            outlines.set("Last", Object::Reference(last));
            outlines.set("Count", Object::Integer(count));
            doc.objects.insert(outlines_id, Object::Dictionary(outlines));
            catalog.set("Outlines", Object::Reference(outlines_id));
        }

        if !self.catalog_dests.is_empty() {
            let mut dests = Dictionary::new();
            for (name, page) in &self.catalog_dests {
                dests.set(name.as_bytes().to_vec(), fit(page_ids[*page as usize - 1]));
            }
            let dests_id = doc.add_object(dests);
            catalog.set("Dests", Object::Reference(dests_id));
        }

        if !self.name_tree_dests.is_empty() {
            // One intermediate Kids level, as large documents write it
            let mut names = Vec::new();
            for (name, page) in &self.name_tree_dests {
                names.push(Object::String(name.as_bytes().to_vec(), StringFormat::Literal));
                let mut dest = Dictionary::new();
                dest.set("D", fit(page_ids[*page as usize - 1]));
                names.push(Object::Dictionary(dest));
            }
            let leaf_id = doc.add_object(Dictionary::from_iter(vec![(
                "Names",
                Object::Array(names),
            )]));
            let root = Dictionary::from_iter(vec![(
                "Kids",
                Object::Array(vec![Object::Reference(leaf_id)]),
            )]);
            let names_dict = Dictionary::from_iter(vec![("Dests", Object::Dictionary(root))]);
            catalog.set("Names", Object::Dictionary(names_dict));
        }

        if self.bulky {
            let xmp = doc.add_object(Stream::new(
                Dictionary::from_iter(vec![
                    ("Type", Object::Name(b"Metadata".to_vec())),
                    ("Subtype", Object::Name(b"XML".to_vec())),
                ]),
                "<x:xmpmeta>".repeat(300).into_bytes(),
            ));
            catalog.set("Metadata", Object::Reference(xmp));
            for _ in 0..20 {
                doc.add_object(Stream::new(Dictionary::new(), vec![b'z'; 512]));
            }
        }

        doc.objects.insert(catalog_id, Object::Dictionary(catalog));
        doc.trailer.set("Root", Object::Reference(catalog_id));

        if self.title.is_some() || self.author.is_some() {
            let mut info = Dictionary::new();
            if let Some(title) = &self.title {
                info.set("Title", Object::string_literal(title.as_str()));
            }
            if let Some(author) = &self.author {
                info.set("Author", Object::string_literal(author.as_str()));
            }
            info.set("Producer", Object::string_literal("fixture builder"));
            let info_id = doc.add_object(info);
            doc.trailer.set("Info", Object::Reference(info_id));
        }

        let mut buffer = Vec::new();
        doc.save_to(&mut buffer).unwrap();
        buffer
    }

    pub fn load(&self) -> PdfDocument {
        PdfDocument::load(self.build()).unwrap()
    }
}

fn fit(page_id: ObjectId) -> Object {
    Object::Array(vec![
        Object::Reference(page_id),
        Object::Name(b"Fit".to_vec()),
    ])
}

/// Write `entries` as siblings under `parent`; returns first, last and count
fn add_entries(
    doc: &mut Document,
    entries: &[Entry],
    parent: ObjectId,
    page_ids: &[ObjectId],
) -> (ObjectId, ObjectId, i64) {
    let ids: Vec<ObjectId> = entries.iter().map(|_| doc.new_object_id()).collect();
    let mut count = 0;

    for (i, entry) in entries.iter().enumerate() {
        let mut item = Dictionary::new();
        item.set("Title", Object::string_literal(entry.title.as_str()));
        item.set("Parent", Object::Reference(parent));
        if i > 0 {
            item.set("Prev", Object::Reference(ids[i - 1]));
        }
        if i + 1 < ids.len() {
            item.set("Next", Object::Reference(ids[i + 1]));
        }

        match &entry.dest {
            Dest::Page(page) => item.set("Dest", fit(page_ids[*page as usize - 1])),
            Dest::Named(name) => item.set("Dest", Object::Name(name.as_bytes().to_vec())),
            Dest::NamedString(name) => item.set("Dest", Object::string_literal(name.as_str())),
            Dest::Action(page) => {
                let mut action = Dictionary::new();
                action.set("S", Object::Name(b"GoTo".to_vec()));
                action.set("D", fit(page_ids[*page as usize - 1]));
                item.set("A", Object::Dictionary(action));
            }
            Dest::Dangling => {
                let stray = doc.add_object(Dictionary::from_iter(vec![(
                    "Type",
                    Object::Name(b"Page".to_vec()),
                )]));
                item.set("Dest", fit(stray));
            }
            Dest::None => {}
        }

        count += 1;
        if !entry.children.is_empty() {
            let (first, last, child_count) =
                add_entries(doc, &entry.children, ids[i], page_ids);
            item.set("First", Object::Reference(first));
            item.set("Last", Object::Reference(last));
            item.set("Count", Object::Integer(child_count));
            count += child_count;
        }

        doc.objects.insert(ids[i], Object::Dictionary(item));
    }

    (ids[0], ids[ids.len() - 1], count)
}

/// Label drawn on each page of `bytes`, in page order
pub fn page_labels(bytes: &[u8]) -> Vec<String> {
    let doc = Document::load_mem(bytes).unwrap();
    doc.get_pages()
        .values()
        .map(|&id| {
            let content = doc.get_page_content(id).unwrap();
            let text = String::from_utf8_lossy(&content).into_owned();
            let start = text.find('(').unwrap() + 1;
            let end = text.find(')').unwrap();
            text[start..end].to_string()
        })
        .collect()
}

pub fn page_count(bytes: &[u8]) -> u32 {
    Document::load_mem(bytes).unwrap().get_pages().len() as u32
}

/// Renders listed pages as pure white and every other page with a dark band
pub struct FakeRenderer {
    blank: HashSet<u32>,
}

impl FakeRenderer {
    pub fn with_blank_pages(pages: &[u32]) -> Self {
        Self {
            blank: pages.iter().copied().collect(),
        }
    }
}

impl PageRenderer for FakeRenderer {
    fn render(&self, doc: &PdfDocument, page_number: u32, scale: f32) -> Result<PixelBuffer> {
        doc.check_page(page_number)?;
        let width = ((612.0 * scale).round() as u32).max(1);
        let height = ((792.0 * scale).round() as u32).max(1);
        let mut pixels = RgbaImage::from_pixel(width, height, Rgba([255, 255, 255, 255]));
        if !self.blank.contains(&page_number) {
            for y in 0..height / 4 {
                for x in 0..width {
                    pixels.put_pixel(x, y, Rgba([20, 20, 20, 255]));
                }
            }
        }
        Ok(pixels)
    }
}
