pub mod espeak;
pub mod gtts;

use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

pub use espeak::EspeakVoice;
pub use gtts::GttsVoice;

#[derive(Error, Debug)]
pub enum VoiceError {
    /// The engine could not be brought up (missing binary, bad client config, ...)
    #[error("voice backend unavailable: {0}")]
    Unavailable(String),
    #[error("synthesis failed: {0}")]
    Synthesis(String),
    #[error("synthesis timed out after {0}s")]
    TimedOut(u64),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Trait that all speech synthesis backends must implement.
/// A voice turns a piece of text into an audio file on disk.
pub trait Voice: Send {
    /// Returns the unique ID of the backend (e.g., "espeak-ng")
    fn id(&self) -> &'static str;

    /// Synthesizes `text` and writes the audio to `out`, blocking until done.
    fn render(&self, text: &str, out: &Path) -> Result<(), VoiceError>;
}

/// Builds a fresh voice instance. Registered by name in the engine's voice table.
pub type VoiceFactory = Arc<dyn Fn() -> Result<Box<dyn Voice>, VoiceError> + Send + Sync>;

/// Wraps a constructor closure into a [`VoiceFactory`].
pub fn factory<F>(build: F) -> VoiceFactory
where
    F: Fn() -> Result<Box<dyn Voice>, VoiceError> + Send + Sync + 'static,
{
    Arc::new(build)
}
