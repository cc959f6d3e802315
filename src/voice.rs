//! Spoken answers.
//!
//! [`SpeechSynthesizer`] turns text into MP3 bytes; [`GoogleTts`] does so
//! with the Google Translate text-to-speech endpoint. [`VoiceRenderer`]
//! materializes the audio in a transient file, reads it back and returns a
//! self-contained `data:audio/mp3;base64,...` URI that a page can embed.
//!
//! The transient file lives in a [`tempfile::NamedTempFile`], so it is
//! removed on every path, including synthesis or read-back failures.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use tracing::debug;

use crate::config::VoiceConfig;

/// Prefix of every URI returned by [`VoiceRenderer::render`].
pub const DATA_URI_PREFIX: &str = "data:audio/mp3;base64,";

/// Longest text the translate endpoint accepts in one request.
const MAX_SEGMENT_CHARS: usize = 100;

#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Synthesize `text` spoken in `lang` (an ISO code such as `"en"`).
    async fn synthesize(&self, text: &str, lang: &str) -> Result<Vec<u8>>;
}

/// Google Translate text-to-speech.
///
/// Long texts are spoken in segments of at most 100 characters and the MP3
/// frames are concatenated.
pub struct GoogleTts {
    client: reqwest::Client,
    base_url: String,
}

impl GoogleTts {
    pub fn new(config: &VoiceConfig) -> Result<Self> {
        Self::with_base_url(format!("https://translate.google.{}", config.tld))
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self> {
        Ok(Self {
            client: reqwest::Client::builder()
                .user_agent("Mozilla/5.0 (X11; Linux x86_64)")
                .build()?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl SpeechSynthesizer for GoogleTts {
    async fn synthesize(&self, text: &str, lang: &str) -> Result<Vec<u8>> {
        let segments = split_for_speech(text, MAX_SEGMENT_CHARS);
        if segments.is_empty() {
            bail!("No text to speak");
        }

        let endpoint = format!("{}/translate_tts", self.base_url);
        let total = segments.len().to_string();
        let mut audio = Vec::new();

        for (idx, segment) in segments.iter().enumerate() {
            let idx = idx.to_string();
            let textlen = segment.chars().count().to_string();
            debug!("TTS segment {}/{} ({} chars)", idx, total, textlen);
            let response = self
                .client
                .get(&endpoint)
                .query(&[
                    ("ie", "UTF-8"),
                    ("q", segment.as_str()),
                    ("tl", lang),
                    ("client", "tw-ob"),
                    ("total", total.as_str()),
                    ("idx", idx.as_str()),
                    ("textlen", textlen.as_str()),
                ])
                .send()
                .await
                .with_context(|| format!("Failed to reach the speech service at {}", self.base_url))?;

            let status = response.status();
            if !status.is_success() {
                let body_text = response.text().await.unwrap_or_default();
                bail!("Speech service error {}: {}", status, body_text);
            }
            audio.extend_from_slice(&response.bytes().await?);
        }

        Ok(audio)
    }
}

/// Break text into pieces of at most `max_chars`, ending pieces at sentence
/// punctuation where possible and otherwise at word boundaries.
pub fn split_for_speech(text: &str, max_chars: usize) -> Vec<String> {
    let mut segments = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let word_len = word.chars().count();

        if word_len > max_chars {
            if !current.is_empty() {
                segments.push(std::mem::take(&mut current));
            }
            let chars: Vec<char> = word.chars().collect();
            for piece in chars.chunks(max_chars) {
                segments.push(piece.iter().collect());
            }
            continue;
        }

        let needed = if current.is_empty() {
            word_len
        } else {
            current.chars().count() + 1 + word_len
        };
        if needed > max_chars {
            segments.push(std::mem::take(&mut current));
        }

        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);

        if word.ends_with(['.', '!', '?', ';', ':']) {
            segments.push(std::mem::take(&mut current));
        }
    }

    if !current.is_empty() {
        segments.push(current);
    }
    segments
}

pub struct VoiceRenderer {
    speech: Arc<dyn SpeechSynthesizer>,
    audio_dir: PathBuf,
}

impl VoiceRenderer {
    pub fn new(speech: Arc<dyn SpeechSynthesizer>, audio_dir: impl Into<PathBuf>) -> Self {
        Self {
            speech,
            audio_dir: audio_dir.into(),
        }
    }

    /// Speak `text` and return it as an embeddable data URI.
    pub async fn render(&self, text: &str, lang: &str) -> Result<String> {
        let audio = self.speech.synthesize(text, lang).await?;
        if audio.is_empty() {
            bail!("Speech service returned no audio");
        }

        let file = tempfile::Builder::new()
            .prefix("response-")
            .suffix(".mp3")
            .tempfile_in(&self.audio_dir)
            .with_context(|| {
                format!(
                    "Failed to create transient audio file in {}",
                    self.audio_dir.display()
                )
            })?;

        tokio::fs::write(file.path(), &audio).await?;
        let bytes = tokio::fs::read(file.path()).await?;
        debug!("Rendered {} bytes of audio via {}", bytes.len(), file.path().display());
        file.close().context("Failed to remove transient audio file")?;

        Ok(format!("{}{}", DATA_URI_PREFIX, STANDARD.encode(bytes)))
    }
}
