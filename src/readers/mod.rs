//! Document readers: page counting, per-page text extraction and narration.
//!
//! A [`Reader`] ties one document on disk to one [`Voice`]. The format-specific
//! part is a [`PageSource`], produced by the [`ReaderKind`] registered for the
//! document's extension.

pub mod pdf;

use crate::backends::{Voice, VoiceError, VoiceFactory};
use lazy_static::lazy_static;
use regex::Regex;
use std::fmt;
use std::iter::FusedIterator;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

pub use pdf::{PdfLibrary, PdfSource};

/// Extension of every rendered clip.
pub const AUDIO_EXTENSION: &str = ".mp3";

#[derive(Error, Debug)]
pub enum ReaderError {
    #[error("invalid file name: {0}")]
    InvalidPath(String),
    #[error("cannot create voice: {0}")]
    VoiceUnavailable(#[source] VoiceError),
    #[error("page {index} not found (document has {len} pages)")]
    OutOfRange { index: usize, len: usize },
    #[error("failed to read document: {0}")]
    Source(String),
    #[error("failed to render page: {0}")]
    Render(#[from] VoiceError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Format-specific access to a document on disk.
pub trait PageSource: Send {
    /// Loads the document. The handle is meant to live for one page walk;
    /// open again to pick up a newer upload.
    fn open(&self) -> Result<Box<dyn PageDocument + '_>, ReaderError>;
}

/// A loaded document.
pub trait PageDocument {
    fn page_count(&self) -> usize;

    /// Raw extracted text of page `index`, possibly empty.
    fn page_text(&self, index: usize) -> Result<String, ReaderError>;
}

pub type SourceFactory = Arc<dyn Fn(&Path) -> Box<dyn PageSource> + Send + Sync>;

/// A registered document type: the file extension it handles and how to open it.
#[derive(Clone)]
pub struct ReaderKind {
    extension: String,
    open: SourceFactory,
}

impl ReaderKind {
    pub fn new<F>(extension: &str, open: F) -> Self
    where
        F: Fn(&Path) -> Box<dyn PageSource> + Send + Sync + 'static,
    {
        Self {
            extension: extension.to_string(),
            open: Arc::new(open),
        }
    }

    /// Extension tag including the dot, e.g. `.pdf`
    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Whether an uploaded file name looks like this document type.
    pub fn accepts(&self, file_name: &str) -> bool {
        file_name.to_lowercase().ends_with(&self.extension)
    }
}

/// How pages are announced before their text is spoken.
#[derive(Debug, Clone)]
pub struct Narration {
    pub page_label: String,
    pub empty_page_text: String,
}

impl Default for Narration {
    fn default() -> Self {
        Self {
            page_label: "Page".to_string(),
            empty_page_text: "This page is empty.".to_string(),
        }
    }
}

/// One readable page produced by [`Pages`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub index: usize,
    pub text: String,
}

pub struct Reader {
    source: Box<dyn PageSource>,
    extension: String,
    source_path: PathBuf,
    audio_path: PathBuf,
    voice: Box<dyn Voice>,
    voice_name: String,
    narration: Narration,
}

impl Reader {
    /// Binds a document path to a fresh voice built by `voice_factory`.
    ///
    /// Fails with [`ReaderError::InvalidPath`] when the path does not carry the
    /// kind's extension, and with [`ReaderError::VoiceUnavailable`] when the voice
    /// cannot be constructed.
    pub fn new(
        kind: &ReaderKind,
        path: PathBuf,
        voice_name: &str,
        voice_factory: &VoiceFactory,
        narration: Narration,
    ) -> Result<Self, ReaderError> {
        check_file_name(&path, &kind.extension)?;
        let audio_path = path.with_extension(&AUDIO_EXTENSION[1..]);
        check_file_name(&audio_path, AUDIO_EXTENSION)?;

        let voice = voice_factory().map_err(|e| {
            tracing::warn!(voice = voice_name, error = %e, "voice construction failed");
            ReaderError::VoiceUnavailable(e)
        })?;

        Ok(Self {
            source: (kind.open)(&path),
            extension: kind.extension.clone(),
            source_path: path,
            audio_path,
            voice,
            voice_name: voice_name.to_string(),
            narration,
        })
    }

    /// Total page count of the underlying document.
    pub fn len(&self) -> Result<usize, ReaderError> {
        Ok(self.source.open()?.page_count())
    }

    /// Renders page `index` to the audio file, returning its path.
    /// Empty pages are narrated with a placeholder.
    pub fn page_at(&self, index: usize) -> Result<PathBuf, ReaderError> {
        let document = self.source.open()?;
        let len = document.page_count();
        if index >= len {
            return Err(ReaderError::OutOfRange { index, len });
        }

        let mut text = normalize_text(&document.page_text(index)?);
        drop(document);
        if text.is_empty() {
            text = self.narration.empty_page_text.clone();
        }
        self.render_text(index, &text)
    }

    /// Lazily walks readable pages starting at `index`, skipping empty ones.
    pub fn pages_from(&self, index: usize) -> Pages<'_> {
        tracing::debug!(path = %self.source_path.display(), index, "starting page walk");
        Pages {
            source: self.source.as_ref(),
            document: None,
            next: index,
            done: false,
        }
    }

    pub fn render_page(&self, page: &Page) -> Result<PathBuf, ReaderError> {
        self.render_text(page.index, &page.text)
    }

    fn render_text(&self, index: usize, text: &str) -> Result<PathBuf, ReaderError> {
        let spoken = format!("{} {}.\n{}", self.narration.page_label, index + 1, text);
        self.voice.render(&spoken, &self.audio_path)?;
        Ok(self.audio_path.clone())
    }

    /// Swaps in a new voice. The current one stays if construction fails.
    pub fn set_voice(&mut self, name: &str, factory: &VoiceFactory) -> Result<(), VoiceError> {
        let voice = factory()?;
        tracing::info!(from = self.voice_name.as_str(), to = name, "voice switched");
        self.voice = voice;
        self.voice_name = name.to_string();
        Ok(())
    }

    pub fn voice(&self) -> &dyn Voice {
        self.voice.as_ref()
    }

    /// Registry name the current voice was built from.
    pub fn voice_name(&self) -> &str {
        &self.voice_name
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    pub fn audio_path(&self) -> &Path {
        &self.audio_path
    }
}

impl fmt::Debug for Reader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reader")
            .field("extension", &self.extension)
            .field("voice", &self.voice.id())
            .field("source_path", &self.source_path)
            .field("audio_path", &self.audio_path)
            .finish()
    }
}

fn check_file_name(path: &Path, extension: &str) -> Result<(), ReaderError> {
    let name = path.to_string_lossy();
    if name.chars().count() < 5 || !name.ends_with(extension) {
        tracing::debug!(path = %name, extension, "rejected file name");
        return Err(ReaderError::InvalidPath(format!(
            "{} is not a {} file name",
            name,
            extension.trim_start_matches('.')
        )));
    }
    Ok(())
}

/// Iterator over the readable pages of a document.
///
/// Finite and single-pass: once it returns `None` (or an error) it stays done.
/// Start a new walk with [`Reader::pages_from`]. The document is opened on the
/// first call and kept until the walk ends.
pub struct Pages<'a> {
    source: &'a dyn PageSource,
    document: Option<Box<dyn PageDocument + 'a>>,
    next: usize,
    done: bool,
}

impl Pages<'_> {
    /// Index the next call to `next` will look at first.
    pub fn position(&self) -> usize {
        self.next
    }

    fn finish(&mut self, err: Option<ReaderError>) -> Option<Result<Page, ReaderError>> {
        self.done = true;
        self.document = None;
        err.map(Err)
    }
}

impl Iterator for Pages<'_> {
    type Item = Result<Page, ReaderError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        if self.document.is_none() {
            match self.source.open() {
                Ok(document) => self.document = Some(document),
                Err(e) => return self.finish(Some(e)),
            }
        }

        let mut failure = None;
        if let Some(document) = self.document.as_deref() {
            let len = document.page_count();
            while self.next < len {
                let index = self.next;
                self.next += 1;

                let raw = match document.page_text(index) {
                    Ok(raw) => raw,
                    Err(e) => {
                        failure = Some(e);
                        break;
                    }
                };
                let text = normalize_text(&raw);
                if text.is_empty() {
                    tracing::debug!(index, "skipping page without text");
                    continue;
                }
                return Some(Ok(Page { index, text }));
            }
        }

        self.finish(failure)
    }
}

impl FusedIterator for Pages<'_> {}

lazy_static! {
    static ref HYPHEN_BREAK: Regex =
        Regex::new(r"(\w)-[ \t]*\r?\n\s*(\w)").expect("hyphen pattern is valid");
    static ref WHITESPACE: Regex = Regex::new(r"\s+").expect("whitespace pattern is valid");
}

/// Prepares extracted text for speech: rejoins words hyphenated across line
/// breaks and collapses whitespace. Whitespace-only input becomes empty.
pub fn normalize_text(raw: &str) -> String {
    let joined = HYPHEN_BREAK.replace_all(raw, "$1$2");
    WHITESPACE.replace_all(&joined, " ").trim().to_string()
}
