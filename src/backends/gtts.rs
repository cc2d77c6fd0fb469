use super::{Voice, VoiceError};

use reqwest::blocking::Client;
use std::path::Path;
use std::time::Duration;

/// The endpoint only accepts this many characters per request.
pub const MAX_CHUNK_CHARS: usize = 100;

pub const DEFAULT_BASE_URL: &str = "https://translate.google.com";

/// Cloud synthesis against the Google Translate TTS endpoint (what gTTS talks to).
pub struct GttsVoice {
    client: Client,
    base_url: String,
    language: String,
    timeout_secs: u64,
}

impl GttsVoice {
    pub fn new(base_url: &str, language: &str, timeout_secs: u64) -> Result<Self, VoiceError> {
        if language.trim().is_empty() {
            return Err(VoiceError::Unavailable("gtts language is empty".to_string()));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(concat!("page-speaker/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| VoiceError::Unavailable(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            language: language.to_string(),
            timeout_secs,
        })
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    fn fetch_chunk(&self, chunk: &str, idx: usize, total: usize) -> Result<Vec<u8>, VoiceError> {
        let url = format!("{}/translate_tts", self.base_url);
        let total = total.to_string();
        let idx = idx.to_string();
        let textlen = chunk.chars().count().to_string();

        let resp = self
            .client
            .get(&url)
            .query(&[
                ("ie", "UTF-8"),
                ("client", "tw-ob"),
                ("tl", self.language.as_str()),
                ("q", chunk),
                ("total", total.as_str()),
                ("idx", idx.as_str()),
                ("textlen", textlen.as_str()),
            ])
            .send()
            .map_err(|e| {
                if e.is_timeout() {
                    VoiceError::TimedOut(self.timeout_secs)
                } else {
                    VoiceError::Synthesis(format!("request failed: {}", e))
                }
            })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(VoiceError::Synthesis(format!(
                "TTS endpoint returned {}",
                status
            )));
        }

        let bytes = resp
            .bytes()
            .map_err(|e| VoiceError::Synthesis(format!("failed to read response: {}", e)))?;
        Ok(bytes.to_vec())
    }
}

impl Voice for GttsVoice {
    fn id(&self) -> &'static str {
        "gtts"
    }

    fn render(&self, text: &str, out: &Path) -> Result<(), VoiceError> {
        let chunks = chunk_text(text, MAX_CHUNK_CHARS);
        if chunks.is_empty() {
            return Err(VoiceError::Synthesis("nothing to speak".to_string()));
        }

        let mut audio = Vec::new();
        for (idx, chunk) in chunks.iter().enumerate() {
            audio.extend(self.fetch_chunk(chunk, idx, chunks.len())?);
        }

        tracing::debug!(chunks = chunks.len(), bytes = audio.len(), "gtts synthesis done");
        std::fs::write(out, audio)?;
        Ok(())
    }
}

/// Splits text on whitespace into pieces of at most `max` characters.
/// Words longer than `max` are cut hard.
pub fn chunk_text(text: &str, max: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for word in text.split_whitespace() {
        let word_len = word.chars().count();

        if word_len > max {
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
                current_len = 0;
            }
            let chars: Vec<char> = word.chars().collect();
            for piece in chars.chunks(max) {
                chunks.push(piece.iter().collect());
            }
            continue;
        }

        let needed = if current.is_empty() { word_len } else { current_len + 1 + word_len };
        if needed > max {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if !current.is_empty() {
            current.push(' ');
            current_len += 1;
        }
        current.push_str(word);
        current_len += word_len;
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}
