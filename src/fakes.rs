//! Deterministic stand-ins for the external services, for unit tests.

use std::sync::Mutex;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::embedding::Embedder;
use crate::llm::LanguageModel;
use crate::voice::SpeechSynthesizer;

/// One-hot vector keyed on the first ASCII letter of the text.
pub struct FirstLetterEmbedder;

#[async_trait]
impl Embedder for FirstLetterEmbedder {
    fn model_name(&self) -> &str {
        "first-letter"
    }

    fn dims(&self) -> usize {
        26
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|t| {
                let mut v = vec![0.0; 26];
                let slot = t
                    .bytes()
                    .find(u8::is_ascii_alphabetic)
                    .map(|b| (b.to_ascii_lowercase() - b'a') as usize)
                    .unwrap_or(0);
                v[slot] = 1.0;
                v
            })
            .collect())
    }
}

/// Returns a canned answer (or error) and records every prompt it saw.
pub struct ScriptedModel {
    reply: Result<String, String>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedModel {
    pub fn answering(answer: &str) -> Self {
        Self {
            reply: Ok(answer.to_string()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            reply: Err(message.to_string()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    fn model_name(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.reply.clone().map_err(|m| anyhow!(m))
    }
}

/// Synthesizes a fixed byte string, or fails when built with `failing`.
pub struct FixedSpeech {
    audio: Option<Vec<u8>>,
}

impl FixedSpeech {
    pub fn new(audio: &[u8]) -> Self {
        Self {
            audio: Some(audio.to_vec()),
        }
    }

    pub fn failing() -> Self {
        Self { audio: None }
    }
}

#[async_trait]
impl SpeechSynthesizer for FixedSpeech {
    async fn synthesize(&self, _text: &str, _lang: &str) -> Result<Vec<u8>> {
        self.audio
            .clone()
            .ok_or_else(|| anyhow!("speech service unavailable"))
    }
}
