//! Chat session state and the interaction handler.
//!
//! [`SessionState`] is everything that survives between interactions: the
//! processed flag, the handle of the indexed document, the chat history and
//! the last question asked. [`ChatSession`] owns one state plus the service
//! clients and runs every user interaction against them. Callers serialize
//! interactions; the HTTP surface keeps the session behind a mutex.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use serde::Serialize;
use tracing::{info, warn};

use crate::answer::AnswerSynthesizer;
use crate::chunk::Chunker;
use crate::config::Config;
use crate::embedding::{create_embedder, Embedder};
use crate::error::ChatError;
use crate::export::{self, HistoryExport};
use crate::extract;
use crate::index::{IndexClient, IndexHandle};
use crate::llm::{LanguageModel, OllamaModel};
use crate::models::{ChatTurn, Page};
use crate::retrieve::Retriever;
use crate::store::{create_store, VectorStore};
use crate::voice::{GoogleTts, SpeechSynthesizer, VoiceRenderer};

/// Per-user state carried across interactions.
#[derive(Debug, Default, Clone, Serialize)]
pub struct SessionState {
    pub pdf_processed: bool,
    pub index: Option<IndexHandle>,
    pub chat_history: Vec<ChatTurn>,
    pub last_question: String,
}

impl SessionState {
    /// Return every field to its initial value.
    pub fn reset(&mut self) {
        self.pdf_processed = false;
        self.index = None;
        self.chat_history.clear();
        self.last_question.clear();
    }

    /// Forget the conversation but keep the processed document.
    pub fn clear_chat(&mut self) {
        self.chat_history.clear();
        self.last_question.clear();
    }
}

/// External service clients a session talks to.
#[derive(Clone)]
pub struct Services {
    pub embedder: Arc<dyn Embedder>,
    pub store: Arc<dyn VectorStore>,
    pub llm: Arc<dyn LanguageModel>,
    pub speech: Arc<dyn SpeechSynthesizer>,
}

impl Services {
    /// Build the configured production clients.
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            embedder: create_embedder(&config.embedding)?,
            store: create_store(&config.store)?,
            llm: Arc::new(OllamaModel::new(&config.llm)?),
            speech: Arc::new(GoogleTts::new(&config.voice)?),
        })
    }
}

/// Result of processing an uploaded document.
#[derive(Debug, Clone, Serialize)]
pub struct UploadSummary {
    pub source: String,
    pub pages: usize,
    pub chunks: usize,
    pub collection: String,
}

/// What happened to a submitted question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AskOutcome {
    /// Blank input; nothing was done.
    Ignored,
    /// Same text as the previous question; nothing was done.
    Duplicate,
    Answered(ChatTurn),
}

/// A history row as shown to the user.
#[derive(Debug, Clone, Serialize)]
pub struct HistoryEntry {
    /// 1-based position in the order questions were asked.
    pub number: usize,
    pub latest: bool,
    pub question: String,
    pub answer: String,
}

pub struct ChatSession {
    config: Config,
    services: Services,
    chunker: Chunker,
    state: SessionState,
}

impl ChatSession {
    pub fn new(config: Config, services: Services) -> Self {
        let chunker = Chunker::from_config(&config.chunking);
        Self {
            config,
            services,
            chunker,
            state: SessionState::default(),
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn index_client(&self) -> IndexClient {
        IndexClient::new(self.services.embedder.clone(), self.services.store.clone())
    }

    /// Drop the configured collection without touching session state.
    pub async fn reset_collection(&self) -> Result<()> {
        self.index_client()
            .reset(&self.config.store.collection)
            .await?;
        Ok(())
    }

    /// Start a new document from uploaded PDF bytes.
    ///
    /// The session and the collection are reset before the PDF is parsed, so
    /// a failed upload leaves no document loaded.
    pub async fn upload_pdf(&mut self, name: &str, bytes: &[u8]) -> Result<UploadSummary> {
        self.state.reset();
        self.reset_collection().await?;
        let pages = extract::load_pdf_blocking(bytes.to_vec()).await?;
        self.index_pages(name, &pages).await
    }

    /// Start a new document from already extracted pages.
    pub async fn ingest_pages(&mut self, name: &str, pages: &[Page]) -> Result<UploadSummary> {
        self.state.reset();
        self.reset_collection().await?;
        self.index_pages(name, pages).await
    }

    async fn index_pages(&mut self, name: &str, pages: &[Page]) -> Result<UploadSummary> {
        let chunks = self.chunker.chunk_pages(name, pages);
        if chunks.is_empty() {
            return Err(ChatError::EmptyDocument(name.to_string()).into());
        }

        let handle = self
            .index_client()
            .index(&chunks, &self.config.store.collection)
            .await?;

        let summary = UploadSummary {
            source: name.to_string(),
            pages: pages.len(),
            chunks: handle.chunk_count(),
            collection: handle.collection().to_string(),
        };
        info!(
            "Processed '{}': {} pages, {} chunks",
            name, summary.pages, summary.chunks
        );

        self.state.index = Some(handle);
        self.state.pdf_processed = true;
        Ok(summary)
    }

    /// Answer a question about the current document.
    ///
    /// A repeat of the immediately preceding question is suppressed without
    /// calling any service.
    pub async fn ask(&mut self, question: &str) -> Result<AskOutcome> {
        let question = question.trim();
        if question.is_empty() {
            return Ok(AskOutcome::Ignored);
        }
        if question == self.state.last_question {
            info!("Ignoring repeated question");
            return Ok(AskOutcome::Duplicate);
        }

        let handle = match (&self.state.index, self.state.pdf_processed) {
            (Some(handle), true) => handle.clone(),
            _ => return Err(ChatError::NoDocument.into()),
        };

        let retriever = Retriever::new(
            self.services.embedder.clone(),
            self.services.store.clone(),
            handle,
            self.config.retrieval.top_k,
        )?;
        let answer = AnswerSynthesizer::new(self.services.llm.clone())
            .answer(question, &retriever)
            .await?;

        let turn = ChatTurn {
            question: question.to_string(),
            answer,
        };
        self.state.chat_history.push(turn.clone());
        self.state.last_question = question.to_string();
        Ok(AskOutcome::Answered(turn))
    }

    /// Voice-render the latest answer as a data URI.
    ///
    /// `None` when voice is disabled or nothing has been answered yet.
    pub async fn speak_latest(&self) -> Result<Option<String>> {
        if !self.config.voice.enabled {
            return Ok(None);
        }
        let Some(turn) = self.state.chat_history.last() else {
            return Ok(None);
        };
        let renderer = VoiceRenderer::new(self.services.speech.clone(), self.config.voice.audio_dir());
        let uri = renderer.render(&turn.answer, &self.config.voice.lang).await?;
        Ok(Some(uri))
    }

    /// Like [`speak_latest`](Self::speak_latest), but a synthesis failure is
    /// logged and reported as no audio.
    pub async fn try_speak_latest(&self) -> Option<String> {
        match self.speak_latest().await {
            Ok(uri) => uri,
            Err(e) => {
                warn!("Voice rendering failed: {:#}", e);
                None
            }
        }
    }

    pub fn clear_chat(&mut self) {
        self.state.clear_chat();
        info!("Chat history cleared");
    }

    /// Forget the current document and conversation.
    pub fn new_document(&mut self) {
        self.state.reset();
        info!("Session reset; upload a new PDF to continue");
    }

    pub fn history(&self) -> &[ChatTurn] {
        &self.state.chat_history
    }

    /// History for display: latest turn first.
    pub fn history_view(&self) -> Vec<HistoryEntry> {
        let total = self.state.chat_history.len();
        self.state
            .chat_history
            .iter()
            .enumerate()
            .rev()
            .map(|(i, turn)| HistoryEntry {
                number: i + 1,
                latest: i + 1 == total,
                question: turn.question.clone(),
                answer: turn.answer.clone(),
            })
            .collect()
    }

    pub fn export_history(&self) -> Option<HistoryExport> {
        export::export_history(&self.state.chat_history)
    }

    /// Write the transcript into the configured export directory.
    pub fn save_history(&self) -> Result<Option<PathBuf>> {
        match self.export_history() {
            Some(export) => Ok(Some(export::write_export(&export, &self.config.export.dir)?)),
            None => Ok(None),
        }
    }
}
