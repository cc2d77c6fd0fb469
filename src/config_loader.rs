use config::{Config, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Where uploads (`temp_<user>.pdf`) and clips (`temp_<user>.mp3`) live
    pub workdir: String,
    pub default_voice: String,  // "espeak-ng" or "gtts"
    pub default_reader: String, // "pdf"
    // Offline voice
    pub espeak_binary: String,
    pub speech_rate: u32, // words per minute
    pub espeak_timeout_secs: u64,
    // Cloud voice
    pub gtts_base_url: String,
    pub gtts_language: String,
    pub gtts_timeout_secs: u64,
    // PDF
    #[serde(default)]
    pub pdfium_library_dir: Option<String>,
    // Narration
    pub page_label: String,
    pub empty_page_text: String,
    // Limits
    pub rate_limit_pages: u32,   // page requests per minute
    pub rate_limit_uploads: u32, // uploads per minute
    pub max_upload_size_mb: u64,
}

fn default_workdir() -> String {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("page-speaker")
        .join("temp")
        .to_string_lossy()
        .into_owned()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            workdir: default_workdir(),
            default_voice: "espeak-ng".to_string(),
            default_reader: "pdf".to_string(),
            espeak_binary: "espeak-ng".to_string(),
            speech_rate: 125,
            espeak_timeout_secs: 120,
            gtts_base_url: "https://translate.google.com".to_string(),
            gtts_language: "en".to_string(),
            gtts_timeout_secs: 30,
            pdfium_library_dir: None,
            page_label: "Page".to_string(),
            empty_page_text: "This page is empty.".to_string(),
            rate_limit_pages: 20,
            rate_limit_uploads: 5,
            max_upload_size_mb: 20,
        }
    }
}

impl Settings {
    pub fn new() -> Result<Self, config::ConfigError> {
        Self::load(None)
    }

    /// Layers defaults, `PageSpeaker.*` in the current directory, the user config
    /// file, an optional explicit file and `PAGE_SPEAKER_*` environment variables.
    pub fn load(extra: Option<&Path>) -> Result<Self, config::ConfigError> {
        let defaults = Settings::default();
        let mut builder = Config::builder()
            .set_default("workdir", defaults.workdir)?
            .set_default("default_voice", defaults.default_voice)?
            .set_default("default_reader", defaults.default_reader)?
            .set_default("espeak_binary", defaults.espeak_binary)?
            .set_default("speech_rate", defaults.speech_rate)?
            .set_default("espeak_timeout_secs", defaults.espeak_timeout_secs)?
            .set_default("gtts_base_url", defaults.gtts_base_url)?
            .set_default("gtts_language", defaults.gtts_language)?
            .set_default("gtts_timeout_secs", defaults.gtts_timeout_secs)?
            .set_default("page_label", defaults.page_label)?
            .set_default("empty_page_text", defaults.empty_page_text)?
            .set_default("rate_limit_pages", defaults.rate_limit_pages)?
            .set_default("rate_limit_uploads", defaults.rate_limit_uploads)?
            .set_default("max_upload_size_mb", defaults.max_upload_size_mb)?
            // Merge with local config file (if exists)
            .add_source(File::with_name("PageSpeaker").required(false))
            .add_source(
                File::with_name(&format!(
                    "{}/.config/page-speaker/PageSpeaker",
                    std::env::var("HOME").unwrap_or_default()
                ))
                .required(false),
            );

        if let Some(path) = extra {
            builder = builder.add_source(File::from(path).required(true));
        }

        // Environment wins, e.g. PAGE_SPEAKER_GTTS_LANGUAGE=ru
        let builder = builder.add_source(config::Environment::with_prefix("PAGE_SPEAKER"));

        let settings: Settings = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), config::ConfigError> {
        if self.speech_rate == 0 {
            return Err(config::ConfigError::Message(
                "speech_rate must be greater than 0".to_string(),
            ));
        }
        if self.gtts_language.trim().is_empty() {
            return Err(config::ConfigError::Message(
                "gtts_language must not be empty".to_string(),
            ));
        }
        if self.max_upload_size_mb == 0 {
            return Err(config::ConfigError::Message(
                "max_upload_size_mb must be greater than 0".to_string(),
            ));
        }
        if self.rate_limit_pages == 0 || self.rate_limit_uploads == 0 {
            return Err(config::ConfigError::Message(format!(
                "Invalid rate limits: pages={}, uploads={}. Must be positive",
                self.rate_limit_pages, self.rate_limit_uploads
            )));
        }
        Ok(())
    }

    pub fn workdir(&self) -> PathBuf {
        PathBuf::from(&self.workdir)
    }

    pub fn max_upload_bytes(&self) -> u64 {
        self.max_upload_size_mb.saturating_mul(1024 * 1024)
    }
}
