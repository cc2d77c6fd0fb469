//! Session registry: one page cursor per chat user.

use crate::backends::{self, EspeakVoice, GttsVoice, Voice, VoiceError, VoiceFactory};
use crate::config_loader::Settings;
use crate::cursor::PageCursor;
use crate::readers::{Narration, PdfLibrary, Reader, ReaderError, ReaderKind};
use crate::registry::Registry;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub type VoiceRegistry = Registry<VoiceFactory>;
pub type ReaderRegistry = Registry<ReaderKind>;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("no active session for {0}")]
    NoActiveSession(String),
    #[error("unknown reader: {0}")]
    UnknownReader(String),
    #[error("unknown voice: {0}")]
    UnknownVoice(String),
    #[error(transparent)]
    Reader(#[from] ReaderError),
    #[error("cannot create voice: {0}")]
    Voice(#[from] VoiceError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    /// True when the user asked for a page the document does not have.
    pub fn is_out_of_range(&self) -> bool {
        matches!(self, EngineError::Reader(ReaderError::OutOfRange { .. }))
    }
}

pub struct Engine {
    workdir: PathBuf,
    voices: VoiceRegistry,
    readers: ReaderRegistry,
    narration: Narration,
    sessions: HashMap<String, PageCursor>,
}

impl Engine {
    /// Creates the working directory if it does not exist yet.
    pub fn new(
        workdir: impl Into<PathBuf>,
        voices: VoiceRegistry,
        readers: ReaderRegistry,
        narration: Narration,
    ) -> Result<Self, EngineError> {
        let workdir = workdir.into();
        std::fs::create_dir_all(&workdir)?;
        tracing::info!(workdir = %workdir.display(), "engine ready");

        Ok(Self {
            workdir,
            voices,
            readers,
            narration,
            sessions: HashMap::new(),
        })
    }

    /// Engine with the stock capabilities: `espeak-ng` and `gtts` voices, `pdf` reader.
    pub fn from_settings(settings: &Settings) -> Result<Self, EngineError> {
        let mut voices = VoiceRegistry::new(settings.default_voice.as_str());
        let (binary, rate, timeout) = (
            settings.espeak_binary.clone(),
            settings.speech_rate,
            settings.espeak_timeout_secs,
        );
        voices.register(
            "espeak-ng",
            backends::factory(move || {
                Ok(Box::new(EspeakVoice::new(&binary, rate, timeout)?) as Box<dyn Voice>)
            }),
        );
        let (base_url, language, timeout) = (
            settings.gtts_base_url.clone(),
            settings.gtts_language.clone(),
            settings.gtts_timeout_secs,
        );
        voices.register(
            "gtts",
            backends::factory(move || {
                Ok(Box::new(GttsVoice::new(&base_url, &language, timeout)?) as Box<dyn Voice>)
            }),
        );

        let mut readers = ReaderRegistry::new(settings.default_reader.as_str());
        let pdfium = PdfLibrary::new(settings.pdfium_library_dir.as_ref().map(PathBuf::from));
        readers.register(
            "pdf",
            ReaderKind::new(".pdf", move |path| Box::new(pdfium.source(path))),
        );

        let narration = Narration {
            page_label: settings.page_label.clone(),
            empty_page_text: settings.empty_page_text.clone(),
        };
        Self::new(settings.workdir(), voices, readers, narration)
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    /// `<workdir>/temp_<user><ext>`: upload destination and existence marker.
    pub fn working_file(&self, user: &str, kind: &ReaderKind) -> PathBuf {
        self.workdir
            .join(format!("temp_{}{}", user, kind.extension()))
    }

    pub fn working_file_for(&self, user: &str, reader_name: &str) -> Option<PathBuf> {
        self.readers
            .get(reader_name)
            .map(|kind| self.working_file(user, kind))
    }

    pub fn has_uploaded_file(&self, user: &str, reader_name: &str) -> bool {
        self.working_file_for(user, reader_name)
            .map(|path| path.is_file())
            .unwrap_or(false)
    }

    /// Registry name of the reader that handles an uploaded file name.
    pub fn reader_for_file(&self, file_name: &str) -> Option<String> {
        self.readers
            .names()
            .into_iter()
            .find(|name| self.readers.get(name).is_some_and(|k| k.accepts(file_name)))
    }

    /// Pairs `user` with a new reader and cursor, replacing any previous session.
    /// Unknown voice or reader names fall back to the registry defaults.
    pub fn create_session(
        &mut self,
        user: &str,
        voice_name: &str,
        reader_name: &str,
        start_page: usize,
    ) -> Result<(), EngineError> {
        let (reader_key, kind) = self
            .readers
            .resolve_or_default(reader_name)
            .ok_or_else(|| EngineError::UnknownReader(reader_name.to_string()))?;
        let (voice_key, factory) = self
            .voices
            .resolve_or_default(voice_name)
            .ok_or_else(|| EngineError::UnknownVoice(voice_name.to_string()))?;

        let path = self.working_file(user, kind);
        let reader = Reader::new(kind, path, voice_key, factory, self.narration.clone())?;
        tracing::info!(user, reader = reader_key, voice = voice_key, start_page, "session created");

        if self
            .sessions
            .insert(user.to_string(), PageCursor::new(reader, start_page))
            .is_some()
        {
            tracing::debug!(user, "previous session replaced");
        }
        Ok(())
    }

    pub fn cursor(&self, user: &str) -> Option<&PageCursor> {
        self.sessions.get(user)
    }

    pub fn cursor_mut(&mut self, user: &str) -> Option<&mut PageCursor> {
        self.sessions.get_mut(user)
    }

    pub fn has_session(&self, user: &str) -> bool {
        self.sessions.contains_key(user)
    }

    fn session_mut(&mut self, user: &str) -> Result<&mut PageCursor, EngineError> {
        self.sessions
            .get_mut(user)
            .ok_or_else(|| EngineError::NoActiveSession(user.to_string()))
    }

    /// Next readable page for `user`, or `None` when the book is over.
    pub fn advance(&mut self, user: &str) -> Result<Option<PathBuf>, EngineError> {
        Ok(self.session_mut(user)?.advance()?)
    }

    pub fn jump_to(&mut self, user: &str, page: usize) -> Result<PathBuf, EngineError> {
        Ok(self.session_mut(user)?.jump_to(page)?)
    }

    /// Rebuilds the session on another reader type. The voice keeps its type but
    /// a fresh instance is built, so its configuration goes back to defaults.
    pub fn switch_reader(
        &mut self,
        user: &str,
        reader_name: &str,
        start_page: usize,
    ) -> Result<(), EngineError> {
        let voice_name = self
            .cursor(user)
            .ok_or_else(|| EngineError::NoActiveSession(user.to_string()))?
            .reader()
            .voice_name()
            .to_string();
        let kind = self
            .readers
            .get(reader_name)
            .ok_or_else(|| EngineError::UnknownReader(reader_name.to_string()))?;
        let factory = self
            .voices
            .get(&voice_name)
            .ok_or_else(|| EngineError::UnknownVoice(voice_name.clone()))?;

        let path = self.working_file(user, kind);
        let reader = Reader::new(kind, path, &voice_name, factory, self.narration.clone())?;
        tracing::info!(user, reader = reader_name, start_page, "reader switched");
        self.sessions
            .insert(user.to_string(), PageCursor::new(reader, start_page));
        Ok(())
    }

    /// Switches the voice of an existing session. Exact names only.
    pub fn switch_voice(&mut self, user: &str, voice_name: &str) -> Result<(), EngineError> {
        if !self.sessions.contains_key(user) {
            return Err(EngineError::NoActiveSession(user.to_string()));
        }
        let factory = self
            .voices
            .get(voice_name)
            .ok_or_else(|| EngineError::UnknownVoice(voice_name.to_string()))?
            .clone();
        self.session_mut(user)?.switch_voice(voice_name, &factory)?;
        Ok(())
    }

    /// Forgets the user's session. The working files stay on disk.
    pub fn end_session(&mut self, user: &str) -> bool {
        self.sessions.remove(user).is_some()
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn voice_names(&self) -> Vec<String> {
        self.voices.names()
    }

    pub fn reader_names(&self) -> Vec<String> {
        self.readers.names()
    }

    pub fn default_voice(&self) -> &str {
        self.voices.default_key()
    }

    pub fn default_reader(&self) -> &str {
        self.readers.default_key()
    }
}
