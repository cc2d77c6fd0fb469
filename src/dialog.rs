//! Chat flow on top of the engine: menu, upload, start prompt, page-by-page reading.
//!
//! The dialog knows nothing about a concrete chat platform. It talks through
//! [`ChatTransport`] and turns every internal failure into one of three user
//! messages ([`messages::INTERNAL_ERROR`], [`messages::PAGE_MISSING`],
//! [`messages::DELIVERY_PROBLEM`]); details only go to the log.

use crate::config_loader::Settings;
use crate::engine::{Engine, EngineError};
use crate::rate_limiter::{LimitType, RateLimiter};
use std::collections::HashMap;
use std::path::Path;

pub mod messages {
    pub const GREETING: &str = "Hi! I read PDF books aloud.";
    pub const MENU: &str = "Send me a PDF file and I will read its text aloud.\n\
                            If I find your previous file we can listen to it.";
    pub const SEND_DOCUMENT: &str = "Send a PDF file.";
    pub const ACCEPTED: &str = "Accepted.";
    pub const START_PROMPT: &str = "Read from the beginning? Or enter a page number.";
    pub const UPLOADED: &str = "File uploaded successfully.";
    pub const HINT: &str = "Pages with pictures only are skipped. Press next or menu.";
    pub const BOOK_OVER: &str = "The book is over.";
    pub const UNSUPPORTED: &str = "I can only read PDF files.";
    pub const TOO_LARGE: &str = "The file is too large.";
    pub const RATE_LIMITED: &str = "Too many requests, please wait a moment.";
    pub const VOICE_SET: &str = "Voice changed.";

    pub const INTERNAL_ERROR: &str = "An internal error occurred, returning you to the menu.";
    pub const PAGE_MISSING: &str = "That page does not exist, returning you to the menu.";
    pub const DELIVERY_PROBLEM: &str = "There was a problem uploading or sending the file.";
}

pub mod buttons {
    pub const UPLOAD: &str = "Upload PDF file";
    pub const USE_UPLOADED: &str = "Use uploaded file";
    pub const FROM_START: &str = "From the beginning";
    pub const HOME: &str = "Home";
    pub const NEXT_PAGE: &str = "Next page";
    pub const MENU: &str = "Menu";
}

/// Inline button callbacks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    NextPage,
    Menu,
}

impl Action {
    pub fn data(&self) -> &'static str {
        match self {
            Action::NextPage => "next_page",
            Action::Menu => "menu",
        }
    }

    pub fn from_data(data: &str) -> Option<Self> {
        match data.to_lowercase().as_str() {
            "next_page" => Some(Action::NextPage),
            "menu" => Some(Action::Menu),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Keyboard {
    /// Buttons that send their label back as text
    Reply(Vec<String>),
    /// Buttons attached to a message that fire callbacks
    Inline(Vec<(String, Action)>),
}

/// What the dialog needs from a chat platform.
pub trait ChatTransport {
    fn send_text(&mut self, user: &str, text: &str, keyboard: Option<Keyboard>);

    /// Delivers a rendered clip. Errors are reported to the user as a delivery problem.
    fn send_audio(&mut self, user: &str, path: &Path) -> std::io::Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Incoming {
    /// `/start`
    Start,
    Text(String),
    Document { file_name: String, bytes: Vec<u8> },
    Callback(Action),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Stage {
    #[default]
    Idle,
    Menu,
    StartPrompt,
    Reading,
}

#[derive(Debug, Default)]
struct UserState {
    stage: Stage,
    voice: Option<String>,
    reader: Option<String>,
}

pub struct Dialog {
    engine: Engine,
    limiter: RateLimiter,
    users: HashMap<String, UserState>,
    max_upload_bytes: u64,
}

impl Dialog {
    pub fn new(engine: Engine, limiter: RateLimiter, max_upload_bytes: u64) -> Self {
        Self {
            engine,
            limiter,
            users: HashMap::new(),
            max_upload_bytes,
        }
    }

    pub fn from_settings(settings: &Settings) -> Result<Self, EngineError> {
        let engine = Engine::from_settings(settings)?;
        let limiter = RateLimiter::new(settings.rate_limit_pages, settings.rate_limit_uploads);
        Ok(Self::new(engine, limiter, settings.max_upload_bytes()))
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut Engine {
        &mut self.engine
    }

    pub fn stage(&self, user: &str) -> Stage {
        self.users.get(user).map(|s| s.stage).unwrap_or_default()
    }

    fn state(&mut self, user: &str) -> &mut UserState {
        self.users.entry(user.to_string()).or_default()
    }

    fn reader_name(&self, user: &str) -> String {
        self.users
            .get(user)
            .and_then(|s| s.reader.clone())
            .unwrap_or_else(|| self.engine.default_reader().to_string())
    }

    fn voice_name(&self, user: &str) -> String {
        self.users
            .get(user)
            .and_then(|s| s.voice.clone())
            .unwrap_or_else(|| self.engine.default_voice().to_string())
    }

    /// Entry point for everything a user sends.
    pub fn handle(&mut self, user: &str, incoming: Incoming, transport: &mut dyn ChatTransport) {
        match incoming {
            Incoming::Start => {
                tracing::info!(user, "new visitor");
                transport.send_text(user, messages::GREETING, None);
                self.menu(user, transport);
            }
            Incoming::Document { file_name, bytes } => {
                self.upload(user, &file_name, &bytes, transport)
            }
            Incoming::Callback(Action::NextPage) => self.speak(user, transport),
            Incoming::Callback(Action::Menu) => self.menu(user, transport),
            Incoming::Text(text) => self.text(user, text.trim(), transport),
        }
    }

    fn text(&mut self, user: &str, text: &str, transport: &mut dyn ChatTransport) {
        if text == "/start" {
            return self.handle(user, Incoming::Start, transport);
        }
        if text == "/voices" {
            let list = self.engine.voice_names().join(", ");
            return transport.send_text(user, &format!("Voices: {}", list), None);
        }
        if let Some(name) = text.strip_prefix("/voice ") {
            return self.switch_voice(user, name.trim(), transport);
        }

        match self.stage(user) {
            Stage::Menu => match text {
                buttons::UPLOAD => transport.send_text(user, messages::SEND_DOCUMENT, None),
                buttons::USE_UPLOADED if self.has_uploaded_file(user) => {
                    transport.send_text(user, messages::ACCEPTED, None);
                    self.start_prompt(user, transport);
                }
                _ => self.menu(user, transport),
            },
            Stage::StartPrompt => match text {
                buttons::FROM_START => self.start_reading(user, None, transport),
                buttons::HOME => self.menu(user, transport),
                _ => match text.parse::<usize>() {
                    // pages are numbered from 1 for the user
                    Ok(page) if page > 0 => self.start_reading(user, Some(page - 1), transport),
                    Ok(_) => {
                        transport.send_text(user, messages::PAGE_MISSING, None);
                        self.menu(user, transport);
                    }
                    Err(_) => self.start_prompt(user, transport),
                },
            },
            Stage::Idle | Stage::Reading => self.menu(user, transport),
        }
    }

    fn has_uploaded_file(&self, user: &str) -> bool {
        self.engine
            .has_uploaded_file(user, &self.reader_name(user))
    }

    fn menu(&mut self, user: &str, transport: &mut dyn ChatTransport) {
        let mut keys = vec![buttons::UPLOAD.to_string()];
        if self.has_uploaded_file(user) {
            keys.push(buttons::USE_UPLOADED.to_string());
        }
        transport.send_text(user, messages::MENU, Some(Keyboard::Reply(keys)));
        self.state(user).stage = Stage::Menu;
    }

    fn start_prompt(&mut self, user: &str, transport: &mut dyn ChatTransport) {
        let keys = vec![buttons::FROM_START.to_string(), buttons::HOME.to_string()];
        transport.send_text(user, messages::START_PROMPT, Some(Keyboard::Reply(keys)));
        self.state(user).stage = Stage::StartPrompt;
    }

    fn reading_keyboard() -> Keyboard {
        Keyboard::Inline(vec![
            (buttons::NEXT_PAGE.to_string(), Action::NextPage),
            (buttons::MENU.to_string(), Action::Menu),
        ])
    }

    fn start_reading(&mut self, user: &str, page: Option<usize>, transport: &mut dyn ChatTransport) {
        let voice = self.voice_name(user);
        let reader = self.reader_name(user);
        if let Err(e) = self
            .engine
            .create_session(user, &voice, &reader, page.unwrap_or(0))
        {
            return self.fail(user, &e, transport);
        }

        match page {
            None => self.speak(user, transport),
            Some(page) => {
                if !self.limiter.check(user, LimitType::Page) {
                    return transport.send_text(user, messages::RATE_LIMITED, None);
                }
                match self.engine.jump_to(user, page) {
                    Ok(path) => self.deliver(user, &path, transport),
                    Err(e) => self.fail(user, &e, transport),
                }
            }
        }
    }

    fn speak(&mut self, user: &str, transport: &mut dyn ChatTransport) {
        if !self.limiter.check(user, LimitType::Page) {
            return transport.send_text(
                user,
                messages::RATE_LIMITED,
                Some(Self::reading_keyboard()),
            );
        }

        match self.engine.advance(user) {
            Ok(Some(path)) => self.deliver(user, &path, transport),
            Ok(None) => {
                tracing::info!(user, "reached the end of the book");
                transport.send_text(user, messages::BOOK_OVER, None);
                self.menu(user, transport);
            }
            Err(e) => self.fail(user, &e, transport),
        }
    }

    fn deliver(&mut self, user: &str, path: &Path, transport: &mut dyn ChatTransport) {
        if let Err(e) = transport.send_audio(user, path) {
            tracing::error!(user, path = %path.display(), error = %e, "audio delivery failed");
            transport.send_text(user, messages::DELIVERY_PROBLEM, None);
            return self.menu(user, transport);
        }
        transport.send_text(user, messages::HINT, Some(Self::reading_keyboard()));
        self.state(user).stage = Stage::Reading;
    }

    fn upload(&mut self, user: &str, file_name: &str, bytes: &[u8], transport: &mut dyn ChatTransport) {
        if !self.limiter.check(user, LimitType::Upload) {
            return transport.send_text(user, messages::RATE_LIMITED, None);
        }
        let Some(reader) = self.engine.reader_for_file(file_name) else {
            transport.send_text(user, messages::UNSUPPORTED, None);
            return self.menu(user, transport);
        };
        if bytes.len() as u64 > self.max_upload_bytes {
            tracing::warn!(user, size = bytes.len(), "upload too large");
            transport.send_text(user, messages::TOO_LARGE, None);
            return self.menu(user, transport);
        }

        let Some(path) = self.engine.working_file_for(user, &reader) else {
            return self.fail(user, &EngineError::UnknownReader(reader), transport);
        };
        tracing::info!(user, file_name, size = bytes.len(), "saving upload");
        if let Err(e) = std::fs::write(&path, bytes) {
            tracing::error!(user, path = %path.display(), error = %e, "failed to save upload");
            transport.send_text(user, messages::DELIVERY_PROBLEM, None);
            return self.menu(user, transport);
        }

        // a cursor over the old file would point at stale page numbers
        self.engine.end_session(user);
        self.state(user).reader = Some(reader);
        transport.send_text(user, messages::UPLOADED, None);
        self.start_prompt(user, transport);
    }

    fn switch_voice(&mut self, user: &str, name: &str, transport: &mut dyn ChatTransport) {
        if !self.engine.voice_names().iter().any(|v| v == name) {
            let list = self.engine.voice_names().join(", ");
            return transport.send_text(user, &format!("Voices: {}", list), None);
        }

        if self.engine.has_session(user) {
            if let Err(e) = self.engine.switch_voice(user, name) {
                return self.fail(user, &e, transport);
            }
        }
        self.state(user).voice = Some(name.to_string());
        transport.send_text(user, messages::VOICE_SET, None);
    }

    /// Logs the cause and sends the matching user-facing message, then the menu.
    fn fail(&mut self, user: &str, err: &EngineError, transport: &mut dyn ChatTransport) {
        tracing::error!(user, error = %err, "request failed");
        let text = if err.is_out_of_range() {
            messages::PAGE_MISSING
        } else {
            messages::INTERNAL_ERROR
        };
        transport.send_text(user, text, None);
        self.menu(user, transport);
    }
}
