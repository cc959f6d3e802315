//! Retrieval-augmented answer synthesis.
//!
//! All retrieved chunks are "stuffed" into a single prompt together with the
//! question, and the language model's completion is the answer. Source
//! attribution is logged but not returned.

use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, info};

use crate::error::ChatError;
use crate::llm::LanguageModel;
use crate::models::RetrievedChunk;
use crate::retrieve::Retriever;

const PROMPT_PREAMBLE: &str = "Use the following pieces of context to answer the question at the end. \
If you don't know the answer, just say that you don't know, don't try to make up an answer.";

/// Assemble the question-answering prompt.
pub fn build_prompt(question: &str, context: &[RetrievedChunk]) -> String {
    let context_text = context
        .iter()
        .map(|c| c.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "{}\n\n{}\n\nQuestion: {}\nHelpful Answer:",
        PROMPT_PREAMBLE, context_text, question
    )
}

pub struct AnswerSynthesizer {
    llm: Arc<dyn LanguageModel>,
}

impl AnswerSynthesizer {
    pub fn new(llm: Arc<dyn LanguageModel>) -> Self {
        Self { llm }
    }

    /// Answer `question` from the chunks `retriever` finds for it.
    pub async fn answer(&self, question: &str, retriever: &Retriever) -> Result<String> {
        let context = retriever.search(question).await?;
        let prompt = build_prompt(question, &context);

        debug!(
            "Asking {} with {} context chunks ({} chars)",
            self.llm.model_name(),
            context.len(),
            prompt.len()
        );

        let answer = self
            .llm
            .generate(&prompt)
            .await
            .map_err(|e| ChatError::Upstream {
                service: format!("language model '{}'", self.llm.model_name()),
                message: format!("{:#}", e),
            })?;

        let sources: Vec<String> = context
            .iter()
            .map(|c| format!("{}#p{}", c.source, c.page + 1))
            .collect();
        info!("Answered from {:?}", sources);

        Ok(answer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::{FirstLetterEmbedder, ScriptedModel};
    use crate::index::IndexClient;
    use crate::models::Chunk;
    use crate::store::memory::InMemoryStore;

    fn hit(text: &str) -> RetrievedChunk {
        RetrievedChunk {
            text: text.to_string(),
            source: "doc.pdf".to_string(),
            page: 0,
            score: 1.0,
        }
    }

    #[test]
    fn test_prompt_layout() {
        let prompt = build_prompt("What is X?", &[hit("X is a letter."), hit("X marks the spot.")]);
        assert!(prompt.starts_with("Use the following pieces of context"));
        assert!(prompt.contains("X is a letter.\n\nX marks the spot."));
        assert!(prompt.ends_with("Question: What is X?\nHelpful Answer:"));
    }

    #[test]
    fn test_prompt_without_context_still_has_question() {
        let prompt = build_prompt("Anything?", &[]);
        assert!(prompt.ends_with("Question: Anything?\nHelpful Answer:"));
    }

    async fn retriever_over(texts: &[&str]) -> Retriever {
        let store = Arc::new(InMemoryStore::new());
        let embedder = Arc::new(FirstLetterEmbedder);
        let chunks: Vec<Chunk> = texts
            .iter()
            .enumerate()
            .map(|(i, t)| Chunk {
                id: format!("00000000-0000-0000-0000-{:012}", i),
                chunk_index: i,
                source: "doc.pdf".to_string(),
                page: i,
                text: t.to_string(),
            })
            .collect();
        let handle = IndexClient::new(embedder.clone(), store.clone())
            .index(&chunks, "pdf_chunks")
            .await
            .unwrap();
        Retriever::new(embedder, store, handle, 1).unwrap()
    }

    #[tokio::test]
    async fn test_answer_uses_retrieved_context() {
        let model = Arc::new(ScriptedModel::answering("Zebras are striped."));
        let retriever = retriever_over(&["zebras have stripes", "apples are red"]).await;

        let answer = AnswerSynthesizer::new(model.clone())
            .answer("zebra pattern?", &retriever)
            .await
            .unwrap();

        assert_eq!(answer, "Zebras are striped.");
        let prompts = model.prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("zebras have stripes"));
        assert!(!prompts[0].contains("apples are red"));
    }

    #[tokio::test]
    async fn test_model_failure_propagates() {
        let model = Arc::new(ScriptedModel::failing("connection refused"));
        let retriever = retriever_over(&["anything"]).await;

        let err = AnswerSynthesizer::new(model)
            .answer("a question", &retriever)
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ChatError>(),
            Some(ChatError::Upstream { .. })
        ));
        assert!(err.to_string().contains("connection refused"));
    }
}
