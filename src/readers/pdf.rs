//! PDF page source backed by pdfium-render.
//!
//! pdfium keeps global state: every `Pdfium` drop tears the library down, so
//! one binding is shared by all sources through [`PdfLibrary`]. It is bound
//! on first use and lives as long as the engine. Documents are loaded once
//! per page walk, so a new upload under the same name is picked up on the
//! next walk.

use super::{PageDocument, PageSource, ReaderError};
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

/// Lazily bound pdfium shared between PDF sources.
#[derive(Clone)]
pub struct PdfLibrary {
    dir: Option<PathBuf>,
    pdfium: Arc<OnceLock<Pdfium>>,
}

impl PdfLibrary {
    /// `dir` points at a directory holding the pdfium shared library;
    /// `None` uses the system library.
    pub fn new(dir: Option<PathBuf>) -> Self {
        Self {
            dir,
            pdfium: Arc::new(OnceLock::new()),
        }
    }

    pub fn source(&self, path: &Path) -> PdfSource {
        PdfSource {
            path: path.to_path_buf(),
            library: self.clone(),
        }
    }

    fn pdfium(&self) -> Result<&Pdfium, ReaderError> {
        if let Some(pdfium) = self.pdfium.get() {
            return Ok(pdfium);
        }

        let bindings = match &self.dir {
            Some(dir) => {
                Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(dir))
                    .or_else(|_| Pdfium::bind_to_system_library())
            }
            None => Pdfium::bind_to_system_library(),
        }
        .map_err(|e| ReaderError::Source(format!("failed to initialize pdfium: {}", e)))?;

        tracing::info!(dir = ?self.dir, "pdfium bound");
        Ok(self.pdfium.get_or_init(|| Pdfium::new(bindings)))
    }
}

pub struct PdfSource {
    path: PathBuf,
    library: PdfLibrary,
}

impl PageSource for PdfSource {
    fn open(&self) -> Result<Box<dyn PageDocument + '_>, ReaderError> {
        let document = self
            .library
            .pdfium()?
            .load_pdf_from_file(&self.path, None)
            .map_err(|e| {
                ReaderError::Source(format!("failed to load {}: {}", self.path.display(), e))
            })?;
        Ok(Box::new(OpenPdf { document }))
    }
}

struct OpenPdf<'a> {
    document: PdfDocument<'a>,
}

impl PageDocument for OpenPdf<'_> {
    fn page_count(&self) -> usize {
        self.document.pages().len() as usize
    }

    fn page_text(&self, index: usize) -> Result<String, ReaderError> {
        let len = self.page_count();
        let page_index =
            PdfPageIndex::try_from(index).map_err(|_| ReaderError::OutOfRange { index, len })?;
        let page = self
            .document
            .pages()
            .get(page_index)
            .map_err(|_| ReaderError::OutOfRange { index, len })?;
        let text = page
            .text()
            .map_err(|e| ReaderError::Source(format!("no text layer on page {}: {}", index, e)))?;
        Ok(text.all())
    }
}
