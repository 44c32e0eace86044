//! Text-to-speech narration.
//!
//! Speech comes from a [`SpeechEngine`]; [`Narrator`] validates the input and
//! writes each rendering to its own uuid-named MP3 so nothing is overwritten.

use crate::config::Config;
use async_trait::async_trait;
use reqwest::Client;
use std::path::PathBuf;
use thiserror::Error;
use uuid::Uuid;

/// Google's TTS endpoint rejects longer segments
const MAX_SEGMENT_CHARS: usize = 100;

const TTS_ENDPOINT: &str = "https://translate.google.com/translate_tts";

#[derive(Error, Debug)]
pub enum NarrationError {
    #[error("empty text cannot be narrated")]
    EmptyText,
    #[error("invalid speech request: {0}")]
    InvalidRequest(#[from] url::ParseError),
    #[error("speech request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),
    #[error("failed to write audio: {0}")]
    WriteError(#[from] std::io::Error),
}

/// Turns plain text into MP3 bytes
#[async_trait]
pub trait SpeechEngine: Send + Sync {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>, NarrationError>;
}

/// Google Translate TTS, English by default
pub struct GoogleTts {
    client: Client,
    lang: String,
}

impl GoogleTts {
    pub fn new(lang: impl Into<String>) -> Result<Self, NarrationError> {
        let client = Client::builder()
            .user_agent(concat!("redraft/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            lang: lang.into(),
        })
    }
}

#[async_trait]
impl SpeechEngine for GoogleTts {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>, NarrationError> {
        let segments = split_segments(text, MAX_SEGMENT_CHARS);
        let total = segments.len().to_string();
        let mut audio = Vec::new();

        for (idx, segment) in segments.iter().enumerate() {
            let idx = idx.to_string();
            let textlen = segment.chars().count().to_string();
            let url = url::Url::parse_with_params(
                TTS_ENDPOINT,
                [
                    ("ie", "UTF-8"),
                    ("q", segment.as_str()),
                    ("tl", self.lang.as_str()),
                    ("client", "tw-ob"),
                    ("total", total.as_str()),
                    ("idx", idx.as_str()),
                    ("textlen", textlen.as_str()),
                ],
            )?;

            let bytes = self
                .client
                .get(url)
                .send()
                .await?
                .error_for_status()?
                .bytes()
                .await?;
            audio.extend_from_slice(&bytes);
        }

        Ok(audio)
    }
}

/// Writes narrations into a directory of MP3 artifacts
pub struct Narrator {
    engine: Box<dyn SpeechEngine>,
    audio_dir: PathBuf,
}

impl Narrator {
    pub fn new(engine: Box<dyn SpeechEngine>, audio_dir: impl Into<PathBuf>) -> Self {
        Self {
            engine,
            audio_dir: audio_dir.into(),
        }
    }

    pub fn from_config(config: &Config) -> Result<Self, NarrationError> {
        let engine = GoogleTts::new(config.narration.lang.clone())?;
        Ok(Self::new(Box::new(engine), config.audio_dir()))
    }

    /// Narrate `text` into a fresh MP3 and return its path
    pub async fn narrate(&self, text: &str) -> Result<PathBuf, NarrationError> {
        if text.trim().is_empty() {
            return Err(NarrationError::EmptyText);
        }

        let audio = self.engine.synthesize(text).await?;

        std::fs::create_dir_all(&self.audio_dir)?;
        let path = self
            .audio_dir
            .join(format!("{}.mp3", Uuid::new_v4().simple()));
        std::fs::write(&path, audio)?;

        tracing::info!(path = %path.display(), chars = text.len(), "narration written");
        Ok(path)
    }
}

/// Split text into segments of at most `max` chars, breaking on whitespace
/// where possible.
fn split_segments(text: &str, max: usize) -> Vec<String> {
    let mut segments = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let mut word = word.to_string();
        // Words longer than a whole segment are hard-split
        while word.chars().count() > max {
            if !current.is_empty() {
                segments.push(std::mem::take(&mut current));
            }
            let split_at = word
                .char_indices()
                .nth(max)
                .map(|(i, _)| i)
                .unwrap_or(word.len());
            let rest = word.split_off(split_at);
            segments.push(word);
            word = rest;
        }

        let needed = if current.is_empty() {
            word.chars().count()
        } else {
            current.chars().count() + 1 + word.chars().count()
        };
        if needed > max && !current.is_empty() {
            segments.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(&word);
    }

    if !current.is_empty() {
        segments.push(current);
    }
    segments
}
