//! Interaction-level failures that callers need to tell apart.
//!
//! Everything else travels as `anyhow::Error`; [`crate::store::StoreError`]
//! covers the vector store.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChatError {
    /// A question was asked before any PDF was processed.
    #[error("no document has been processed yet; upload a PDF first")]
    NoDocument,

    /// The PDF parsed but contained no extractable text.
    #[error("'{0}' contains no extractable text")]
    EmptyDocument(String),

    /// The PDF could not be parsed.
    #[error("PDF extraction failed: {0}")]
    Pdf(String),

    /// An external model service failed or could not be reached.
    #[error("{service} failed: {message}")]
    Upstream { service: String, message: String },

    /// The handle was indexed with a different embedding model than the one
    /// used to embed the query.
    #[error("collection '{collection}' was indexed with '{indexed}', but queries are embedded with '{query}'")]
    ModelMismatch {
        collection: String,
        indexed: String,
        query: String,
    },
}
