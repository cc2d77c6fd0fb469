#![allow(dead_code)]

use page_speaker::backends::{self, Voice, VoiceError, VoiceFactory};
use page_speaker::dialog::{ChatTransport, Keyboard};
use page_speaker::engine::{Engine, ReaderRegistry, VoiceRegistry};
use page_speaker::readers::{Narration, PageDocument, PageSource, ReaderError, ReaderKind};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// In-memory document: one string per page. Counts how often it is loaded.
pub struct FakeSource {
    pages: Vec<String>,
    opens: Arc<AtomicUsize>,
}

pub struct FakeDocument<'a> {
    pages: &'a [String],
}

impl PageSource for FakeSource {
    fn open(&self) -> Result<Box<dyn PageDocument + '_>, ReaderError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeDocument { pages: &self.pages }))
    }
}

impl PageDocument for FakeDocument<'_> {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn page_text(&self, index: usize) -> Result<String, ReaderError> {
        self.pages.get(index).cloned().ok_or(ReaderError::OutOfRange {
            index,
            len: self.pages.len(),
        })
    }
}

pub fn fake_kind(pages: &[&str]) -> ReaderKind {
    counting_kind(pages, &Arc::default())
}

/// Like [`fake_kind`], bumping `opens` every time a document is loaded.
pub fn counting_kind(pages: &[&str], opens: &Arc<AtomicUsize>) -> ReaderKind {
    let pages: Vec<String> = pages.iter().map(|p| p.to_string()).collect();
    let opens = opens.clone();
    ReaderKind::new(".pdf", move |_| {
        Box::new(FakeSource {
            pages: pages.clone(),
            opens: opens.clone(),
        })
    })
}

/// Everything the recording voices were asked to say, in order.
#[derive(Clone, Default)]
pub struct Spoken(Arc<Mutex<Vec<String>>>);

impl Spoken {
    pub fn texts(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

/// Writes the text itself into the clip file.
pub struct RecordingVoice {
    id: &'static str,
    spoken: Spoken,
}

impl Voice for RecordingVoice {
    fn id(&self) -> &'static str {
        self.id
    }

    fn render(&self, text: &str, out: &Path) -> Result<(), VoiceError> {
        self.spoken.0.lock().unwrap().push(text.to_string());
        std::fs::write(out, text.as_bytes())?;
        Ok(())
    }
}

pub fn recording_factory(id: &'static str, spoken: &Spoken) -> VoiceFactory {
    let spoken = spoken.clone();
    backends::factory(move || {
        Ok(Box::new(RecordingVoice {
            id,
            spoken: spoken.clone(),
        }) as Box<dyn Voice>)
    })
}

pub fn broken_factory() -> VoiceFactory {
    backends::factory(|| Err(VoiceError::Unavailable("engine not installed".to_string())))
}

/// Voices `offline` (default), `cloud` and `broken`; one `pdf` reader over `pages`.
pub fn engine_with(dir: &Path, pages: &[&str], spoken: &Spoken) -> Engine {
    let mut voices = VoiceRegistry::new("offline");
    voices
        .register("offline", recording_factory("offline", spoken))
        .register("cloud", recording_factory("cloud", spoken))
        .register("broken", broken_factory());

    let mut readers = ReaderRegistry::new("pdf");
    readers.register("pdf", fake_kind(pages));

    Engine::new(dir, voices, readers, Narration::default()).unwrap()
}

#[derive(Debug, Clone, PartialEq)]
pub enum Sent {
    Text(String, Option<Keyboard>),
    Audio(PathBuf),
}

#[derive(Default)]
pub struct RecordingTransport {
    pub sent: Vec<Sent>,
    pub fail_audio: bool,
}

impl RecordingTransport {
    pub fn texts(&self) -> Vec<String> {
        self.sent
            .iter()
            .filter_map(|s| match s {
                Sent::Text(t, _) => Some(t.clone()),
                Sent::Audio(_) => None,
            })
            .collect()
    }

    pub fn audio(&self) -> Vec<PathBuf> {
        self.sent
            .iter()
            .filter_map(|s| match s {
                Sent::Audio(p) => Some(p.clone()),
                Sent::Text(..) => None,
            })
            .collect()
    }

    pub fn last_keyboard(&self) -> Option<Keyboard> {
        self.sent.iter().rev().find_map(|s| match s {
            Sent::Text(_, Some(k)) => Some(k.clone()),
            _ => None,
        })
    }

    pub fn clear(&mut self) {
        self.sent.clear();
    }
}

impl ChatTransport for RecordingTransport {
    fn send_text(&mut self, _user: &str, text: &str, keyboard: Option<Keyboard>) {
        self.sent.push(Sent::Text(text.to_string(), keyboard));
    }

    fn send_audio(&mut self, _user: &str, path: &Path) -> std::io::Result<()> {
        if self.fail_audio {
            return Err(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "chat platform refused the upload",
            ));
        }
        self.sent.push(Sent::Audio(path.to_path_buf()));
        Ok(())
    }
}
