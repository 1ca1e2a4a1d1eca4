// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Page overlays and content transforms applied to a loaded document in place:
// text watermarks, the "protected" stamp, and uniform content scaling.

use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream, StringFormat, dictionary};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use wandelwerk_core::error::{Result, WandelError};

use super::builder::inherited_attribute;
use super::reader::media_box;

/// Resource names chosen to avoid clashing with names already on the page.
const FONT_NAME: &[u8] = b"WwHelv";
const STATE_NAME: &[u8] = b"WwGs";

/// Average Helvetica glyph advance as a fraction of the font size.
const HELVETICA_ADVANCE: f32 = 0.5;

/// Text watermark drawn on every page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PdfWatermark {
    pub text: String,
    /// Font size in points. Defaults to 8% of the shorter page side.
    pub font_size: Option<f32>,
    /// Fill opacity, 0.0 to 1.0.
    pub opacity: f32,
    /// Counter-clockwise angle in degrees.
    pub angle: f32,
    /// Fill colour as RGB components in 0.0 to 1.0.
    pub color: [f32; 3],
    /// Repeat across the page instead of a single centred line.
    pub tiled: bool,
}

impl Default for PdfWatermark {
    fn default() -> Self {
        Self {
            text: String::new(),
            font_size: None,
            opacity: 0.3,
            angle: 45.0,
            color: [0.5, 0.5, 0.5],
            tiled: false,
        }
    }
}

impl PdfWatermark {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.text.trim().is_empty() {
            return Err(WandelError::Validation("watermark text is empty".into()));
        }
        if !(0.0..=1.0).contains(&self.opacity) {
            return Err(WandelError::Validation(format!(
                "watermark opacity {} outside 0-1",
                self.opacity
            )));
        }
        if self.font_size.is_some_and(|size| size <= 0.0) {
            return Err(WandelError::Validation("font size must be positive".into()));
        }
        Ok(())
    }
}

fn real(value: f32) -> Object {
    Object::Real(value)
}

/// Helvetica uses WinAnsiEncoding; characters outside Latin-1 become '?'.
fn latin1_string(text: &str) -> Object {
    let bytes = text
        .chars()
        .map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?'))
        .collect();
    Object::String(bytes, StringFormat::Literal)
}

fn text_width(text: &str, size: f32) -> f32 {
    text.chars().count() as f32 * size * HELVETICA_ADVANCE
}

/// One line of text centred on (`x`, `y`) and rotated by `angle` degrees.
fn centred_text(text: &str, size: f32, x: f32, y: f32, angle: f32) -> Vec<Operation> {
    let (sin, cos) = angle.to_radians().sin_cos();
    vec![
        Operation::new("q", vec![]),
        Operation::new("cm", vec![real(cos), real(sin), real(-sin), real(cos), real(x), real(y)]),
        Operation::new("BT", vec![]),
        Operation::new("Tf", vec![Object::Name(FONT_NAME.to_vec()), real(size)]),
        Operation::new("Td", vec![real(-text_width(text, size) / 2.0), real(-size / 3.0)]),
        Operation::new("Tj", vec![latin1_string(text)]),
        Operation::new("ET", vec![]),
        Operation::new("Q", vec![]),
    ]
}

/// Draw a watermark on every page.
#[instrument(skip(document, watermark), fields(text = %watermark.text, tiled = watermark.tiled))]
pub fn apply_watermark(document: &mut Document, watermark: &PdfWatermark) -> Result<()> {
    watermark.validate()?;
    let [r, g, b] = watermark.color;
    let overlay = OverlayResources::install(document, watermark.opacity);

    for page_id in document.get_pages().into_values() {
        let [x0, y0, x1, y1] = media_box(document, page_id);
        let (width, height) = (x1 - x0, y1 - y0);
        let size = watermark
            .font_size
            .unwrap_or_else(|| width.abs().min(height.abs()) * 0.08);

        let mut ops = vec![Operation::new("rg", vec![real(r), real(g), real(b)])];
        if watermark.tiled {
            let step_x = text_width(&watermark.text, size) + size * 2.0;
            let step_y = size * 4.0;
            let mut y = y0;
            while y <= y1 + step_y {
                let mut x = x0;
                while x <= x1 + step_x {
                    ops.extend(centred_text(&watermark.text, size, x, y, watermark.angle));
                    x += step_x;
                }
                y += step_y;
            }
        } else {
            let (cx, cy) = (x0 + width / 2.0, y0 + height / 2.0);
            ops.extend(centred_text(&watermark.text, size, cx, cy, watermark.angle));
        }
        overlay.append(document, page_id, ops)?;
    }
    Ok(())
}

/// Stamp `label` in red across the top of every page and frame the page.
/// This is a visual marker only; the document is not encrypted.
#[instrument(skip(document))]
pub fn apply_protected_stamp(document: &mut Document, label: &str) -> Result<()> {
    let overlay = OverlayResources::install(document, 0.85);

    for page_id in document.get_pages().into_values() {
        let [x0, y0, x1, y1] = media_box(document, page_id);
        let (width, height) = (x1 - x0, y1 - y0);
        let size = (width.abs().min(height.abs()) * 0.05).max(10.0);
        let inset = size / 2.0;

        let mut ops = vec![
            Operation::new("RG", vec![real(0.8), real(0.0), real(0.0)]),
            Operation::new("rg", vec![real(0.8), real(0.0), real(0.0)]),
            Operation::new("w", vec![real(2.0)]),
            Operation::new(
                "re",
                vec![
                    real(x0 + inset),
                    real(y0 + inset),
                    real(width - 2.0 * inset),
                    real(height - 2.0 * inset),
                ],
            ),
            Operation::new("S", vec![]),
        ];
        ops.extend(centred_text(label, size, x0 + width / 2.0, y1 - size * 1.5, 0.0));
        overlay.append(document, page_id, ops)?;
    }
    Ok(())
}

/// Scale every page's content and media box by `factor`.
#[instrument(skip(document))]
pub fn scale_pages(document: &mut Document, factor: f32) -> Result<()> {
    if !(factor > 0.0 && factor <= 1.0) {
        return Err(WandelError::Validation(format!(
            "scale factor {} outside (0, 1]",
            factor
        )));
    }
    if (factor - 1.0).abs() < f32::EPSILON {
        return Ok(());
    }

    for page_id in document.get_pages().into_values() {
        let [x0, y0, x1, y1] = media_box(document, page_id);
        let prefix = Content {
            operations: vec![
                Operation::new("q", vec![]),
                Operation::new(
                    "cm",
                    vec![
                        real(factor),
                        real(0.0),
                        real(0.0),
                        real(factor),
                        real(-x0 * factor),
                        real(-y0 * factor),
                    ],
                ),
            ],
        };
        let suffix = Content {
            operations: vec![Operation::new("Q", vec![])],
        };
        wrap_contents(document, page_id, encode(prefix)?, encode(suffix)?)?;

        let page = page_dictionary_mut(document, page_id)?;
        page.set(
            "MediaBox",
            vec![
                real(0.0),
                real(0.0),
                real((x1 - x0) * factor),
                real((y1 - y0) * factor),
            ],
        );
        for key in [&b"CropBox"[..], b"BleedBox", b"TrimBox", b"ArtBox"] {
            page.remove(key);
        }
    }
    debug!(factor, "Pages scaled");
    Ok(())
}

/// Font and graphics-state objects shared by all overlays in one document.
struct OverlayResources {
    font_id: ObjectId,
    state_id: ObjectId,
}

impl OverlayResources {
    fn install(document: &mut Document, opacity: f32) -> Self {
        let font_id = document.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
            "Encoding" => "WinAnsiEncoding",
        });
        let state_id = document.add_object(dictionary! {
            "Type" => "ExtGState",
            "ca" => real(opacity),
            "CA" => real(opacity),
        });
        Self { font_id, state_id }
    }

    /// Run `ops` on top of the page's existing content, isolated from its
    /// graphics state.
    fn append(&self, document: &mut Document, page_id: ObjectId, ops: Vec<Operation>) -> Result<()> {
        let mut resources = page_resources(document, page_id);
        add_resource(document, &mut resources, b"Font", FONT_NAME, self.font_id);
        add_resource(document, &mut resources, b"ExtGState", STATE_NAME, self.state_id);

        let mut operations = vec![
            Operation::new("Q", vec![]),
            Operation::new("q", vec![]),
            Operation::new("gs", vec![Object::Name(STATE_NAME.to_vec())]),
        ];
        operations.extend(ops);
        operations.push(Operation::new("Q", vec![]));

        wrap_contents(document, page_id, b"q\n".to_vec(), encode(Content { operations })?)?;
        page_dictionary_mut(document, page_id)?.set("Resources", resources);
        Ok(())
    }
}

fn encode(content: Content) -> Result<Vec<u8>> {
    content
        .encode()
        .map_err(|err| WandelError::Encode(format!("failed to encode page content: {}", err)))
}

fn page_dictionary_mut(document: &mut Document, page_id: ObjectId) -> Result<&mut Dictionary> {
    document
        .get_object_mut(page_id)
        .and_then(Object::as_dict_mut)
        .map_err(|err| WandelError::Decode(format!("cannot edit page {:?}: {}", page_id, err)))
}

/// The page's effective /Resources as an owned dictionary.
fn page_resources(document: &Document, page_id: ObjectId) -> Dictionary {
    document
        .get_dictionary(page_id)
        .ok()
        .and_then(|page| inherited_attribute(document, page, b"Resources"))
        .and_then(|resources| resources.as_dict().ok())
        .cloned()
        .unwrap_or_else(Dictionary::new)
}

/// Register `name -> id` inside the `category` sub-dictionary (Font,
/// ExtGState) of `resources`, resolving an indirect sub-dictionary first.
fn add_resource(document: &Document, resources: &mut Dictionary, category: &[u8], name: &[u8], id: ObjectId) {
    let mut entries = resources
        .get(category)
        .ok()
        .and_then(|value| document.dereference(value).ok())
        .and_then(|(_, value)| value.as_dict().ok())
        .cloned()
        .unwrap_or_else(Dictionary::new);
    entries.set(name.to_vec(), id);
    resources.set(category.to_vec(), entries);
}

/// Surround a page's content streams with `prefix` and `suffix` streams.
fn wrap_contents(document: &mut Document, page_id: ObjectId, prefix: Vec<u8>, suffix: Vec<u8>) -> Result<()> {
    let existing: Vec<Object> = {
        let page = document
            .get_dictionary(page_id)
            .map_err(|err| WandelError::Decode(format!("cannot read page {:?}: {}", page_id, err)))?;
        match page.get(b"Contents") {
            Ok(Object::Reference(id)) => match document.get_object(*id) {
                Ok(Object::Array(items)) => items.clone(),
                _ => vec![Object::Reference(*id)],
            },
            Ok(Object::Array(items)) => items.clone(),
            _ => Vec::new(),
        }
    };

    let head = document.add_object(Stream::new(Dictionary::new(), prefix));
    let tail = document.add_object(Stream::new(Dictionary::new(), suffix));
    let mut contents = Vec::with_capacity(existing.len() + 2);
    contents.push(Object::Reference(head));
    contents.extend(existing);
    contents.push(Object::Reference(tail));

    page_dictionary_mut(document, page_id)?.set("Contents", contents);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::builder::save_document;
    use crate::pdf::builder::tests::sample_pdf;
    use crate::pdf::reader::PdfReader;

    fn page_content(document: &Document, page_number: u32) -> String {
        let page_id = document.get_pages()[&page_number];
        String::from_utf8_lossy(&document.get_page_content(page_id).unwrap()).into_owned()
    }

    #[test]
    fn watermark_adds_text_to_every_page() {
        let mut document = Document::load_mem(&sample_pdf(2)).unwrap();
        apply_watermark(&mut document, &PdfWatermark::new("CONFIDENTIAL")).unwrap();

        for page in 1..=2 {
            let content = page_content(&document, page);
            assert!(content.contains("(CONFIDENTIAL) Tj"));
            assert!(content.contains(&format!("Page {page}")));
        }
        let bytes = save_document(&mut document, true).unwrap();
        assert_eq!(PdfReader::from_bytes(&bytes).unwrap().page_count(), 2);
    }

    #[test]
    fn watermark_keeps_existing_fonts() {
        let mut document = Document::load_mem(&sample_pdf(1)).unwrap();
        apply_watermark(&mut document, &PdfWatermark::new("DRAFT")).unwrap();
        let page_id = document.get_pages()[&1];
        let resources = page_resources(&document, page_id);
        let fonts = resources.get(b"Font").unwrap().as_dict().unwrap();
        assert!(fonts.has(b"F1"));
        assert!(fonts.has(FONT_NAME));
    }

    #[test]
    fn empty_watermark_is_rejected() {
        let mut document = Document::load_mem(&sample_pdf(1)).unwrap();
        assert!(apply_watermark(&mut document, &PdfWatermark::new("  ")).is_err());
    }

    #[test]
    fn protected_stamp_is_drawn() {
        let mut document = Document::load_mem(&sample_pdf(1)).unwrap();
        apply_protected_stamp(&mut document, "PROTECTED").unwrap();
        assert!(page_content(&document, 1).contains("(PROTECTED) Tj"));
    }

    #[test]
    fn scaling_shrinks_media_box() {
        let mut document = Document::load_mem(&sample_pdf(1)).unwrap();
        scale_pages(&mut document, 0.5).unwrap();
        let bytes = save_document(&mut document, true).unwrap();
        let page = &PdfReader::from_bytes(&bytes).unwrap().pages()[0];
        assert!((page.width - 297.5).abs() < 0.01);
        assert!((page.height - 421.0).abs() < 0.01);
        assert!(scale_pages(&mut document, 1.5).is_err());
    }
}
