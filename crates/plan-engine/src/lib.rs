//! Document-rendering collaborator for plan documents.
//!
//! Opens a plan's source, reports its page count and page sizes, and gives
//! the pixel dimensions a page surface would have at a zoom factor. Pixel
//! rasterization is left to whatever front end draws the page.

use inspect_model::{SourceRef, SurfaceBounds};
use lopdf::{Document, Object, ObjectId};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Default page size when a page has no usable MediaBox (US Letter).
const FALLBACK_PAGE_SIZE: PageSize = PageSize { width_pt: 612.0, height_pt: 792.0 };

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DocumentHandle(u64);

impl DocumentHandle {
    pub fn raw(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSize {
    pub width_pt: f32,
    pub height_pt: f32,
}

/// Pixel dimensions of one rendered page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderedSurface {
    pub page: u32,
    pub width_px: u32,
    pub height_px: u32,
}

impl RenderedSurface {
    /// Bounds of the surface when drawn with its top-left corner at
    /// `(left, top)`.
    pub fn bounds_at(&self, left: f64, top: f64) -> SurfaceBounds {
        SurfaceBounds::new(left, top, f64::from(self.width_px), f64::from(self.height_px))
    }
}

#[derive(Debug, Clone)]
pub enum OpenSource {
    Path(PathBuf),
    Bytes(Vec<u8>),
}

impl From<PathBuf> for OpenSource {
    fn from(value: PathBuf) -> Self {
        Self::Path(value)
    }
}

impl From<&Path> for OpenSource {
    fn from(value: &Path) -> Self {
        Self::Path(value.to_path_buf())
    }
}

impl From<Vec<u8>> for OpenSource {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value)
    }
}

/// Plan sources registered from the file system are paths.
impl From<&SourceRef> for OpenSource {
    fn from(value: &SourceRef) -> Self {
        Self::Path(PathBuf::from(value.as_str()))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PlanEngineError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("PDF parse error: {0}")]
    Parse(#[from] lopdf::Error),
    #[error("invalid handle {0}")]
    InvalidHandle(u64),
    #[error("page {page} out of range (page_count={page_count})")]
    PageOutOfRange { page: u32, page_count: u32 },
    #[error("encrypted PDFs are not supported")]
    EncryptedUnsupported,
    #[error("document has no pages")]
    NoPages,
}

pub trait PlanEngine {
    fn open(&mut self, source: OpenSource) -> Result<DocumentHandle, PlanEngineError>;
    fn page_count(&self, handle: DocumentHandle) -> Result<u32, PlanEngineError>;
    /// `page` is 1-based, as pins number pages.
    fn page_size(&self, handle: DocumentHandle, page: u32) -> Result<PageSize, PlanEngineError>;
    fn render_surface(
        &self,
        handle: DocumentHandle,
        page: u32,
        zoom: f32,
    ) -> Result<RenderedSurface, PlanEngineError>;
    fn close(&mut self, handle: DocumentHandle) -> Result<(), PlanEngineError>;
}

#[derive(Debug, Default)]
pub struct LopdfEngine {
    next_handle: u64,
    docs: HashMap<DocumentHandle, Vec<PageSize>>,
}

impl LopdfEngine {
    pub fn new() -> Self {
        Self::default()
    }

    fn parse_sizes(bytes: &[u8]) -> Result<Vec<PageSize>, PlanEngineError> {
        let doc = Document::load_mem(bytes)?;
        if doc.trailer.get(b"Encrypt").is_ok() {
            return Err(PlanEngineError::EncryptedUnsupported);
        }

        let sizes: Vec<PageSize> = doc
            .get_pages()
            .into_values()
            .map(|page_id| inherited_media_box(&doc, page_id).unwrap_or(FALLBACK_PAGE_SIZE))
            .collect();

        if sizes.is_empty() {
            return Err(PlanEngineError::NoPages);
        }

        Ok(sizes)
    }

    fn pages(&self, handle: DocumentHandle) -> Result<&[PageSize], PlanEngineError> {
        self.docs.get(&handle).map(Vec::as_slice).ok_or(PlanEngineError::InvalidHandle(handle.raw()))
    }
}

impl PlanEngine for LopdfEngine {
    fn open(&mut self, source: OpenSource) -> Result<DocumentHandle, PlanEngineError> {
        let bytes = match source {
            OpenSource::Path(path) => fs::read(path)?,
            OpenSource::Bytes(bytes) => bytes,
        };

        let page_sizes = Self::parse_sizes(&bytes)?;

        self.next_handle += 1;
        let handle = DocumentHandle(self.next_handle);
        tracing::debug!(handle = handle.raw(), pages = page_sizes.len(), "opened plan document");
        self.docs.insert(handle, page_sizes);

        Ok(handle)
    }

    fn page_count(&self, handle: DocumentHandle) -> Result<u32, PlanEngineError> {
        Ok(self.pages(handle)?.len() as u32)
    }

    fn page_size(&self, handle: DocumentHandle, page: u32) -> Result<PageSize, PlanEngineError> {
        let pages = self.pages(handle)?;
        page.checked_sub(1)
            .and_then(|index| pages.get(index as usize))
            .copied()
            .ok_or(PlanEngineError::PageOutOfRange { page, page_count: pages.len() as u32 })
    }

    fn render_surface(
        &self,
        handle: DocumentHandle,
        page: u32,
        zoom: f32,
    ) -> Result<RenderedSurface, PlanEngineError> {
        let size = self.page_size(handle, page)?;
        let zoom = if zoom <= 0.0 { 1.0 } else { zoom };

        Ok(RenderedSurface {
            page,
            width_px: (size.width_pt * zoom).round().max(1.0) as u32,
            height_px: (size.height_pt * zoom).round().max(1.0) as u32,
        })
    }

    fn close(&mut self, handle: DocumentHandle) -> Result<(), PlanEngineError> {
        self.docs.remove(&handle).map(|_| ()).ok_or(PlanEngineError::InvalidHandle(handle.raw()))
    }
}

pub fn default_engine() -> LopdfEngine {
    LopdfEngine::new()
}

/// Page trees may declare MediaBox once on an ancestor `Pages` node.
const MAX_TREE_DEPTH: usize = 32;

fn inherited_media_box(doc: &Document, page_id: ObjectId) -> Option<PageSize> {
    let mut node = doc.get_dictionary(page_id).ok()?;
    for _ in 0..MAX_TREE_DEPTH {
        if let Ok(media_box) = node.get(b"MediaBox") {
            return size_of_box(doc, media_box);
        }
        let parent = node.get(b"Parent").and_then(Object::as_reference).ok()?;
        node = doc.get_dictionary(parent).ok()?;
    }
    None
}

fn size_of_box(doc: &Document, media_box: &Object) -> Option<PageSize> {
    let media_box = match media_box {
        Object::Reference(id) => doc.get_object(*id).ok()?,
        direct => direct,
    };
    let [x0, y0, x1, y1] = media_box.as_array().ok()?.as_slice() else {
        return None;
    };
    let coord = |value: &Object| value.as_float().ok();

    Some(PageSize {
        width_pt: (coord(x1)? - coord(x0)?).abs(),
        height_pt: (coord(y1)? - coord(y0)?).abs(),
    })
}

/// Generated plan documents for tests, here and in dependent crates.
#[cfg(any(test, feature = "test-fixtures"))]
pub mod fixtures {
    use crate::PlanEngineError;
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Document, Object, Stream};

    /// A document with one page per `(width_pt, height_pt)` entry.
    pub fn plan_document(sizes: &[(i64, i64)]) -> Result<Document, PlanEngineError> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();

        let content = Content { operations: vec![Operation::new("n", vec![])] };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));

        let kids: Vec<Object> = sizes
            .iter()
            .map(|&(width, height)| {
                let media_box =
                    vec![Object::Integer(0), Object::Integer(0), width.into(), height.into()];
                doc.add_object(dictionary! {
                    "Type" => "Page",
                    "Parent" => pages_id,
                    "MediaBox" => media_box,
                    "Contents" => content_id,
                })
                .into()
            })
            .collect();

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
            }),
        );

        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        Ok(doc)
    }

    pub fn to_bytes(doc: &mut Document) -> Result<Vec<u8>, PlanEngineError> {
        let mut bytes = Vec::new();
        doc.save_to(&mut bytes)?;
        Ok(bytes)
    }

    pub fn pdf_with_pages(sizes: &[(i64, i64)]) -> Result<Vec<u8>, PlanEngineError> {
        to_bytes(&mut plan_document(sizes)?)
    }
}
