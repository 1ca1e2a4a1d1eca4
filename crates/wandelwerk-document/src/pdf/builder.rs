// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF assembly: build a fresh document from pages copied out of one or more
// source documents, with optional outline entries and /Info metadata.

use std::collections::HashMap;

use lopdf::{Dictionary, Document, Object, ObjectId, Stream, StringFormat, dictionary};
use tracing::{debug, warn};
use wandelwerk_core::error::{Result, WandelError};

/// Page attributes a page may inherit from its ancestors in the page tree.
const INHERITABLE: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// Depth limit when walking /Parent chains in malformed files.
const MAX_TREE_DEPTH: usize = 64;

/// Collects pages from source documents into a new document.
///
/// Page objects and everything they reference are deep-copied. Objects shared
/// between pages of the same source (fonts, images) are copied once per
/// [`PdfAssembler::append_pages`] call.
pub struct PdfAssembler {
    document: Document,
    pages_id: ObjectId,
    kids: Vec<Object>,
    bookmarks: Vec<(String, ObjectId)>,
    info: Dictionary,
}

impl Default for PdfAssembler {
    fn default() -> Self {
        Self::new()
    }
}

impl PdfAssembler {
    pub fn new() -> Self {
        let mut document = Document::with_version("1.7");
        let pages_id = document.new_object_id();
        Self {
            document,
            pages_id,
            kids: Vec::new(),
            bookmarks: Vec::new(),
            info: Dictionary::new(),
        }
    }

    /// Number of pages appended so far.
    pub fn page_count(&self) -> usize {
        self.kids.len()
    }

    /// Copy `page_ids` (in order) from `source`, returning the new page ids.
    pub fn append_pages(&mut self, source: &Document, page_ids: &[ObjectId]) -> Result<Vec<ObjectId>> {
        let mut copier = PageCopier::new(source);
        let mut appended = Vec::with_capacity(page_ids.len());
        for &page_id in page_ids {
            let new_id = copier.copy_page(&mut self.document, page_id, self.pages_id)?;
            self.kids.push(Object::Reference(new_id));
            appended.push(new_id);
        }
        debug!(
            copied_pages = appended.len(),
            copied_objects = copier.memo.len(),
            "Pages appended"
        );
        Ok(appended)
    }

    /// Add a top-level outline entry pointing at `page_id`.
    pub fn add_bookmark(&mut self, title: impl Into<String>, page_id: ObjectId) {
        self.bookmarks.push((title.into(), page_id));
    }

    /// Set an /Info entry such as `Title`, `Author` or `Creator`.
    pub fn set_info(&mut self, key: &str, value: &str) {
        self.info.set(key, text_string(value));
    }

    /// Copy Title/Author/Subject/Keywords from a source document's /Info.
    pub fn copy_info_from(&mut self, source: &Document) {
        let Some(info) = info_dictionary(source) else {
            return;
        };
        for key in [&b"Title"[..], b"Author", b"Subject", b"Keywords"] {
            if let Ok(value) = info.get(key) {
                if let Ok((_, resolved)) = source.dereference(value) {
                    self.info.set(key.to_vec(), resolved.clone());
                }
            }
        }
    }

    /// Write the page tree, catalog, outline and /Info and hand back the
    /// finished document.
    pub fn finish(self) -> Document {
        let Self {
            mut document,
            pages_id,
            kids,
            bookmarks,
            info,
        } = self;

        let count = kids.len() as i64;
        document.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
            }),
        );

        let mut catalog = dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        };
        if let Some(outlines_id) = write_outline(&mut document, &bookmarks) {
            catalog.set("Outlines", outlines_id);
            catalog.set("PageMode", "UseOutlines");
        }
        let catalog_id = document.add_object(catalog);
        document.trailer.set("Root", catalog_id);

        if !info.is_empty() {
            let info_id = document.add_object(info);
            document.trailer.set("Info", info_id);
        }
        document
    }
}

fn write_outline(document: &mut Document, bookmarks: &[(String, ObjectId)]) -> Option<ObjectId> {
    if bookmarks.is_empty() {
        return None;
    }
    let outlines_id = document.new_object_id();
    let item_ids: Vec<ObjectId> = bookmarks.iter().map(|_| document.new_object_id()).collect();

    for (index, (title, page_id)) in bookmarks.iter().enumerate() {
        let mut item = dictionary! {
            "Title" => text_string(title),
            "Parent" => outlines_id,
            "Dest" => vec![Object::Reference(*page_id), Object::Name(b"Fit".to_vec())],
        };
        if index > 0 {
            item.set("Prev", item_ids[index - 1]);
        }
        if let Some(next) = item_ids.get(index + 1) {
            item.set("Next", *next);
        }
        document.objects.insert(item_ids[index], Object::Dictionary(item));
    }

    let first = item_ids[0];
    let last = item_ids[item_ids.len() - 1];
    document.objects.insert(
        outlines_id,
        Object::Dictionary(dictionary! {
            "Type" => "Outlines",
            "First" => first,
            "Last" => last,
            "Count" => item_ids.len() as i64,
        }),
    );
    Some(outlines_id)
}

/// Serialise a document. `compact` prunes unreachable objects, drops empty
/// streams, renumbers and deflates streams before writing.
pub fn save_document(document: &mut Document, compact: bool) -> Result<Vec<u8>> {
    if compact {
        document.prune_objects();
        document.delete_zero_length_streams();
        document.renumber_objects();
        document.compress();
    }
    let mut output = Vec::new();
    document
        .save_to(&mut output)
        .map_err(|err| WandelError::Encode(format!("failed to serialise PDF: {}", err)))?;
    Ok(output)
}

/// Encode a PDF text string: literal for ASCII, UTF-16BE with BOM otherwise.
pub fn text_string(value: &str) -> Object {
    if value.is_ascii() {
        return Object::string_literal(value);
    }
    let mut bytes = vec![0xFE, 0xFF];
    for unit in value.encode_utf16() {
        bytes.extend_from_slice(&unit.to_be_bytes());
    }
    Object::String(bytes, StringFormat::Hexadecimal)
}

/// Decode a PDF text string (UTF-16BE with BOM, or single-byte).
pub fn decode_text_string(object: &Object) -> Option<String> {
    let Object::String(bytes, _) = object else {
        return None;
    };
    if let Some(utf16) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = utf16
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return Some(String::from_utf16_lossy(&units));
    }
    Some(bytes.iter().map(|&b| char::from(b)).collect())
}

/// The trailer's /Info dictionary, if present.
pub fn info_dictionary(document: &Document) -> Option<&Dictionary> {
    let info = document.trailer.get(b"Info").ok()?;
    let (_, resolved) = document.dereference(info).ok()?;
    resolved.as_dict().ok()
}

/// Look up a page attribute, following /Parent for inheritable keys.
pub fn inherited_attribute<'a>(
    document: &'a Document,
    page: &'a Dictionary,
    key: &[u8],
) -> Option<&'a Object> {
    let mut node = page;
    for _ in 0..MAX_TREE_DEPTH {
        if let Ok(value) = node.get(key) {
            return document.dereference(value).ok().map(|(_, resolved)| resolved);
        }
        let parent = node.get(b"Parent").ok()?.as_reference().ok()?;
        node = document.get_dictionary(parent).ok()?;
    }
    None
}

fn is_page_tree_node(object: &Object) -> bool {
    object
        .as_dict()
        .ok()
        .and_then(|dict| dict.get(b"Type").ok())
        .and_then(|kind| kind.as_name().ok())
        .is_some_and(|name| name == b"Page" || name == b"Pages")
}

/// Deep copier with a source-to-target id map, so shared and cyclic
/// references are copied exactly once.
struct PageCopier<'a> {
    source: &'a Document,
    memo: HashMap<ObjectId, ObjectId>,
}

impl<'a> PageCopier<'a> {
    fn new(source: &'a Document) -> Self {
        Self {
            source,
            memo: HashMap::new(),
        }
    }

    fn copy_page(&mut self, target: &mut Document, page_id: ObjectId, parent: ObjectId) -> Result<ObjectId> {
        let source = self.source;
        let page = source.get_dictionary(page_id).map_err(|err| {
            WandelError::Decode(format!("cannot read page object {:?}: {}", page_id, err))
        })?;

        let new_id = target.new_object_id();
        self.memo.insert(page_id, new_id);

        let mut copied = Dictionary::new();
        for (key, value) in page.iter() {
            // Article beads point into the source's thread tree.
            if key == b"Parent" || key == b"B" {
                continue;
            }
            copied.set(key.clone(), self.copy(target, value));
        }
        for key in INHERITABLE {
            if copied.has(key) {
                continue;
            }
            if let Some(value) = inherited_attribute(source, page, key) {
                let value = self.copy(target, value);
                copied.set(key.to_vec(), value);
            }
        }
        copied.set("Parent", parent);

        target.objects.insert(new_id, Object::Dictionary(copied));
        Ok(new_id)
    }

    fn copy(&mut self, target: &mut Document, object: &'a Object) -> Object {
        match object {
            Object::Reference(id) => {
                if let Some(mapped) = self.memo.get(id) {
                    return Object::Reference(*mapped);
                }
                let Ok(referenced) = self.source.get_object(*id) else {
                    warn!(?id, "Cannot resolve reference, using Null");
                    return Object::Null;
                };
                // Links to pages that were not selected are dropped rather
                // than dragging the whole page tree along.
                if is_page_tree_node(referenced) {
                    return Object::Null;
                }
                let new_id = target.new_object_id();
                self.memo.insert(*id, new_id);
                let cloned = self.copy(target, referenced);
                target.objects.insert(new_id, cloned);
                Object::Reference(new_id)
            }
            Object::Dictionary(dict) => Object::Dictionary(self.copy_dictionary(target, dict)),
            Object::Array(items) => Object::Array(items.iter().map(|item| self.copy(target, item)).collect()),
            Object::Stream(stream) => {
                let dict = self.copy_dictionary(target, &stream.dict);
                Object::Stream(Stream::new(dict, stream.content.clone()))
            }
            other => other.clone(),
        }
    }

    fn copy_dictionary(&mut self, target: &mut Document, dict: &'a Dictionary) -> Dictionary {
        let mut copied = Dictionary::new();
        for (key, value) in dict.iter() {
            copied.set(key.clone(), self.copy(target, value));
        }
        copied
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use lopdf::content::{Content, Operation};

    /// A small document with `pages` pages sharing one font, each page
    /// drawing its own number. MediaBox lives on the page tree root.
    pub(crate) fn sample_pdf(pages: u32) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let mut kids = Vec::new();
        for number in 1..=pages {
            let content = Content {
                operations: vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec!["F1".into(), 24.into()]),
                    Operation::new("Td", vec![100.into(), 600.into()]),
                    Operation::new("Tj", vec![Object::string_literal(format!("Page {number}"))]),
                    Operation::new("ET", vec![]),
                ],
            };
            let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            kids.push(Object::Reference(page_id));
        }

        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => pages as i64,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        let info_id = doc.add_object(dictionary! {
            "Title" => Object::string_literal("Sample"),
            "Author" => Object::string_literal("Tester"),
        });
        doc.trailer.set("Info", info_id);

        let mut out = Vec::new();
        doc.save_to(&mut out).unwrap();
        out
    }

    fn page_ids(doc: &Document) -> Vec<ObjectId> {
        doc.get_pages().values().copied().collect()
    }

    #[test]
    fn copies_pages_with_inherited_attributes() {
        let source = Document::load_mem(&sample_pdf(2)).unwrap();
        let mut assembler = PdfAssembler::new();
        assembler.append_pages(&source, &page_ids(&source)).unwrap();
        let mut built = assembler.finish();

        let bytes = save_document(&mut built, true).unwrap();
        let reloaded = Document::load_mem(&bytes).unwrap();
        assert_eq!(reloaded.get_pages().len(), 2);

        let first = reloaded.get_pages()[&1];
        let page = reloaded.get_dictionary(first).unwrap();
        assert!(page.has(b"MediaBox"));
        assert!(page.has(b"Resources"));
    }

    #[test]
    fn outline_entries_point_at_pages() {
        let source = Document::load_mem(&sample_pdf(3)).unwrap();
        let ids = page_ids(&source);
        let mut assembler = PdfAssembler::new();
        let first = assembler.append_pages(&source, &ids[..1]).unwrap();
        let second = assembler.append_pages(&source, &ids[1..]).unwrap();
        assembler.add_bookmark("Intro", first[0]);
        assembler.add_bookmark("Rest ü", second[0]);
        let mut built = assembler.finish();

        let bytes = save_document(&mut built, false).unwrap();
        let reloaded = Document::load_mem(&bytes).unwrap();
        let outlines_ref = reloaded.catalog().unwrap().get(b"Outlines").unwrap().as_reference().unwrap();
        let outlines = reloaded.get_dictionary(outlines_ref).unwrap();
        assert_eq!(outlines.get(b"Count").unwrap().as_i64().unwrap(), 2);

        let last = outlines.get(b"Last").unwrap().as_reference().unwrap();
        let title = reloaded.get_dictionary(last).unwrap().get(b"Title").unwrap();
        assert_eq!(decode_text_string(title).as_deref(), Some("Rest ü"));
    }

    #[test]
    fn info_is_written_to_trailer() {
        let source = Document::load_mem(&sample_pdf(1)).unwrap();
        let mut assembler = PdfAssembler::new();
        assembler.append_pages(&source, &page_ids(&source)).unwrap();
        assembler.copy_info_from(&source);
        assembler.set_info("Creator", "Wandelwerk");
        let built = assembler.finish();

        let info = info_dictionary(&built).unwrap();
        assert_eq!(decode_text_string(info.get(b"Title").unwrap()).as_deref(), Some("Sample"));
        assert_eq!(decode_text_string(info.get(b"Creator").unwrap()).as_deref(), Some("Wandelwerk"));
    }
}
