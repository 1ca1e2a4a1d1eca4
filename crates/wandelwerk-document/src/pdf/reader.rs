// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF reader: open and inspect existing PDF documents, and derive new ones
// from page selections (split, reorder, rotate) using the `lopdf` crate.

use lopdf::{Document, Object, ObjectId};
use serde::Serialize;
use tracing::{debug, info, instrument};
use wandelwerk_core::error::{Result, WandelError};
use wandelwerk_core::{Blob, PageRange};

use super::builder::{PdfAssembler, decode_text_string, inherited_attribute, info_dictionary, save_document};

/// US Letter, used when a page has no usable /MediaBox.
const DEFAULT_MEDIA_BOX: [f32; 4] = [0.0, 0.0, 612.0, 792.0];

/// Geometry of one page, in PDF points.
#[derive(Debug, Clone, Serialize)]
pub struct PageInfo {
    /// 1-based page number.
    pub number: u32,
    pub width: f32,
    pub height: f32,
    /// Effective /Rotate in degrees, normalised to 0, 90, 180 or 270.
    pub rotation: i64,
    /// Small raster preview, when a rasteriser is available.
    #[serde(skip)]
    pub thumbnail: Option<Blob>,
}

/// /Info metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DocumentInfo {
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub creator: Option<String>,
    pub producer: Option<String>,
}

/// Reads and manipulates existing PDF files.
///
/// Wraps `lopdf::Document`. Derived documents are always built fresh through
/// [`PdfAssembler`]; the loaded document is never mutated.
pub struct PdfReader {
    /// The underlying lopdf document.
    document: Document,
}

impl PdfReader {
    // -- Construction ---------------------------------------------------------

    /// Create a reader from raw PDF bytes already in memory.
    #[instrument(skip_all, fields(bytes_len = data.len()))]
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let document = Document::load_mem(data)
            .map_err(|err| WandelError::Decode(format!("failed to load PDF: {}", err)))?;

        debug!(pages = document.get_pages().len(), "PDF loaded from bytes");
        Ok(Self { document })
    }

    // -- Inspection -----------------------------------------------------------

    /// Number of pages in the document.
    pub fn page_count(&self) -> u32 {
        self.document.get_pages().len() as u32
    }

    /// Borrow the underlying document.
    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Clone of the underlying document for in-place editing.
    pub fn to_document(&self) -> Document {
        self.document.clone()
    }

    /// Page object ids in page order.
    pub fn page_ids(&self) -> Vec<ObjectId> {
        self.document.get_pages().values().copied().collect()
    }

    /// Object id of a 1-based page number.
    pub fn page_id(&self, page_number: u32) -> Result<ObjectId> {
        self.document
            .get_pages()
            .get(&page_number)
            .copied()
            .ok_or_else(|| WandelError::PageRange {
                from: page_number,
                to: page_number,
                page_count: self.page_count(),
            })
    }

    /// Size and rotation of every page.
    pub fn pages(&self) -> Vec<PageInfo> {
        self.document
            .get_pages()
            .into_iter()
            .map(|(number, page_id)| {
                let [x0, y0, x1, y1] = media_box(&self.document, page_id);
                PageInfo {
                    number,
                    width: (x1 - x0).abs(),
                    height: (y1 - y0).abs(),
                    rotation: page_rotation(&self.document, page_id),
                    thumbnail: None,
                }
            })
            .collect()
    }

    /// Title, author and producer fields from /Info.
    pub fn metadata(&self) -> DocumentInfo {
        let Some(info) = info_dictionary(&self.document) else {
            return DocumentInfo::default();
        };
        let field = |key: &[u8]| -> Option<String> {
            let value = info.get(key).ok()?;
            let (_, resolved) = self.document.dereference(value).ok()?;
            decode_text_string(resolved).filter(|s| !s.is_empty())
        };
        DocumentInfo {
            title: field(b"Title"),
            author: field(b"Author"),
            subject: field(b"Subject"),
            creator: field(b"Creator"),
            producer: field(b"Producer"),
        }
    }

    // -- Derivation -----------------------------------------------------------

    /// Build a new PDF from the given 1-based page numbers, in the given
    /// order. Pages may repeat.
    #[instrument(skip(self), fields(selected = page_numbers.len()))]
    pub fn select_pages(&self, page_numbers: &[u32]) -> Result<Vec<u8>> {
        self.assemble(page_numbers, None)
    }

    fn assemble(&self, page_numbers: &[u32], title: Option<&str>) -> Result<Vec<u8>> {
        if page_numbers.is_empty() {
            return Err(WandelError::Validation("no pages selected".into()));
        }
        let ids = page_numbers
            .iter()
            .map(|&number| self.page_id(number))
            .collect::<Result<Vec<_>>>()?;

        let mut assembler = PdfAssembler::new();
        assembler.append_pages(&self.document, &ids)?;
        assembler.copy_info_from(&self.document);
        if let Some(title) = title {
            assembler.set_info("Title", title);
        }
        let mut document = assembler.finish();
        let output = save_document(&mut document, true)?;

        debug!(output_bytes = output.len(), "Page selection written");
        Ok(output)
    }

    /// Split into one document per range, each titled "Pages {from}-{to}".
    /// Ranges that overhang the document are clamped to it; a range with no
    /// page inside the document fails the whole split before any output.
    #[instrument(skip(self), fields(ranges = ranges.len()))]
    pub fn split(&self, ranges: &[PageRange]) -> Result<Vec<Vec<u8>>> {
        if ranges.is_empty() {
            return Err(WandelError::Validation("no page ranges given".into()));
        }
        let total = self.page_count();
        let clamped = ranges
            .iter()
            .map(|range| clamp_range(*range, total))
            .collect::<Result<Vec<_>>>()?;
        info!(total, parts = clamped.len(), "Splitting PDF");

        clamped
            .iter()
            .map(|range| {
                let title = format!("Pages {}-{}", range.from, range.to);
                self.assemble(&range.pages().collect::<Vec<_>>(), Some(&title))
            })
            .collect()
    }

    /// Rotate pages by `degrees` (a multiple of 90). `None` rotates every page.
    #[instrument(skip(self))]
    pub fn rotate_pages(&self, page_numbers: Option<&[u32]>, degrees: i32) -> Result<Vec<u8>> {
        if degrees % 90 != 0 {
            return Err(WandelError::Validation(format!(
                "rotation must be a multiple of 90, got {}",
                degrees
            )));
        }

        let targets: Vec<ObjectId> = match page_numbers {
            Some(numbers) => numbers
                .iter()
                .map(|&number| self.page_id(number))
                .collect::<Result<_>>()?,
            None => self.page_ids(),
        };

        let mut doc = self.document.clone();
        for page_id in targets {
            let existing = page_rotation(&doc, page_id);
            let new_rotation = (existing + i64::from(degrees)).rem_euclid(360);
            if let Ok(Object::Dictionary(dict)) = doc.get_object_mut(page_id) {
                dict.set("Rotate", Object::Integer(new_rotation));
            }
            debug!(?page_id, existing, new_rotation, "Page rotated");
        }

        save_document(&mut doc, false)
    }
}

/// Effective /MediaBox of a page as `[x0, y0, x1, y1]`.
pub fn media_box(document: &Document, page_id: ObjectId) -> [f32; 4] {
    let Ok(page) = document.get_dictionary(page_id) else {
        return DEFAULT_MEDIA_BOX;
    };
    let Some(values) = inherited_attribute(document, page, b"MediaBox").and_then(|obj| obj.as_array().ok())
    else {
        return DEFAULT_MEDIA_BOX;
    };
    let numbers: Vec<f32> = values
        .iter()
        .filter_map(|value| document.dereference(value).ok())
        .filter_map(|(_, value)| value.as_float().ok())
        .collect();
    match numbers.as_slice() {
        [x0, y0, x1, y1] if x1 != x0 && y1 != y0 => [*x0, *y0, *x1, *y1],
        _ => DEFAULT_MEDIA_BOX,
    }
}

/// Effective /Rotate of a page, normalised to 0..360.
pub fn page_rotation(document: &Document, page_id: ObjectId) -> i64 {
    document
        .get_dictionary(page_id)
        .ok()
        .and_then(|page| inherited_attribute(document, page, b"Rotate"))
        .and_then(|value| value.as_i64().ok())
        .unwrap_or(0)
        .rem_euclid(360)
}

/// Intersect `range` with `1..=page_count`.
fn clamp_range(range: PageRange, page_count: u32) -> Result<PageRange> {
    let from = range.from.max(1);
    let to = range.to.min(page_count);
    if from > to {
        return Err(WandelError::PageRange {
            from: range.from,
            to: range.to,
            page_count,
        });
    }
    Ok(PageRange::new(from, to))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::builder::tests::sample_pdf;

    #[test]
    fn inspects_pages_and_metadata() {
        let reader = PdfReader::from_bytes(&sample_pdf(3)).unwrap();
        assert_eq!(reader.page_count(), 3);

        let pages = reader.pages();
        assert_eq!(pages.len(), 3);
        assert_eq!(pages[0].number, 1);
        assert_eq!((pages[0].width, pages[0].height), (595.0, 842.0));

        let info = reader.metadata();
        assert_eq!(info.title.as_deref(), Some("Sample"));
        assert_eq!(info.author.as_deref(), Some("Tester"));
    }

    #[test]
    fn split_ranges_cover_requested_pages() {
        let reader = PdfReader::from_bytes(&sample_pdf(5)).unwrap();
        let parts = reader
            .split(&[PageRange::new(1, 2), PageRange::new(3, 5)])
            .unwrap();
        let counts: Vec<u32> = parts
            .iter()
            .map(|bytes| PdfReader::from_bytes(bytes).unwrap().page_count())
            .collect();
        assert_eq!(counts, vec![2, 3]);
    }

    #[test]
    fn split_titles_each_part() {
        let reader = PdfReader::from_bytes(&sample_pdf(4)).unwrap();
        let parts = reader.split(&[PageRange::new(2, 3)]).unwrap();
        let info = PdfReader::from_bytes(&parts[0]).unwrap().metadata();
        assert_eq!(info.title.as_deref(), Some("Pages 2-3"));
        assert_eq!(info.author.as_deref(), Some("Tester"));
    }

    #[test]
    fn split_clamps_overhanging_ranges() {
        let reader = PdfReader::from_bytes(&sample_pdf(5)).unwrap();
        let parts = reader.split(&[PageRange::new(4, 9)]).unwrap();
        let part = PdfReader::from_bytes(&parts[0]).unwrap();
        assert_eq!(part.page_count(), 2);
        assert_eq!(part.metadata().title.as_deref(), Some("Pages 4-5"));
    }

    #[test]
    fn split_range_outside_document_fails_before_output() {
        let reader = PdfReader::from_bytes(&sample_pdf(5)).unwrap();
        let result = reader.split(&[PageRange::new(1, 2), PageRange::new(7, 9)]);
        assert!(matches!(
            result,
            Err(WandelError::PageRange { from: 7, to: 9, page_count: 5 })
        ));
    }

    #[test]
    fn reorder_and_repeat_pages() {
        let reader = PdfReader::from_bytes(&sample_pdf(3)).unwrap();
        let bytes = reader.select_pages(&[3, 1, 1]).unwrap();
        assert_eq!(PdfReader::from_bytes(&bytes).unwrap().page_count(), 3);
        assert!(reader.select_pages(&[4]).is_err());
    }

    #[test]
    fn rotation_accumulates_and_normalises() {
        let reader = PdfReader::from_bytes(&sample_pdf(2)).unwrap();
        let once = reader.rotate_pages(Some(&[2][..]), 270).unwrap();
        let twice = PdfReader::from_bytes(&once)
            .unwrap()
            .rotate_pages(None, 180)
            .unwrap();
        let pages = PdfReader::from_bytes(&twice).unwrap().pages();
        assert_eq!(pages[0].rotation, 180);
        assert_eq!(pages[1].rotation, 90);
        assert!(reader.rotate_pages(None, 45).is_err());
    }

    #[test]
    fn garbage_is_a_decode_error() {
        assert!(matches!(
            PdfReader::from_bytes(b"%PDF-not really"),
            Err(WandelError::Decode(_))
        ));
    }
}
