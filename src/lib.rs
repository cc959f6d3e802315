//! # ChatMuse
//!
//! Chat with a PDF. An uploaded document is split into overlapping chunks,
//! embedded and stored in a vector collection; each question retrieves the
//! closest chunks and a local language model answers from them. Answers can
//! be spoken back and the conversation exported as plain text.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────┐   ┌──────────────┐   ┌──────────┐
//! │ extract  │──▶│  chunk   │──▶│ index        │──▶│  store   │
//! │ PDF→page │   │ splitter │   │ embed+upsert │   │ Qdrant   │
//! └──────────┘   └──────────┘   └──────────────┘   └────┬─────┘
//!                                                       │
//!      ┌──────────┐   ┌──────────┐   ┌──────────┐       │
//!      │  voice   │◀──│  answer  │◀──│ retrieve │◀──────┘
//!      │ TTS→URI  │   │ LLM      │   │ top-k    │
//!      └──────────┘   └──────────┘   └──────────┘
//! ```
//!
//! [`session::ChatSession`] ties the pipeline to per-user state and is
//! driven by the HTTP [`server`] or the terminal [`chat_cmd`].
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`error`] | Typed interaction errors |
//! | [`extract`] | PDF text extraction |
//! | [`chunk`] | Recursive character chunking |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`store`] | Vector store backends |
//! | [`index`] | Collection reset and indexing |
//! | [`retrieve`] | Top-k similarity retrieval |
//! | [`llm`] | Language model client |
//! | [`answer`] | Retrieval-augmented answer synthesis |
//! | [`voice`] | Text-to-speech data URIs |
//! | [`export`] | Transcript export |
//! | [`session`] | Session state and interaction handler |
//! | [`server`] | HTTP server |
//! | [`chat_cmd`] | Terminal chat |

pub mod answer;
pub mod chat_cmd;
pub mod chunk;
pub mod config;
pub mod embedding;
pub mod error;
pub mod export;
pub mod extract;
pub mod index;
pub mod llm;
pub mod models;
pub mod retrieve;
pub mod server;
pub mod session;
pub mod store;
pub mod voice;

#[cfg(test)]
mod fakes;
