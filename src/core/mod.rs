pub mod chunker;
pub mod embedder;
pub mod engine;
pub mod extract;
pub mod index;
pub mod llm;
pub mod pipeline;
pub mod prompt;

pub use crate::domain::model::{
    Answer, Chunk, Document, DocumentKind, EmbeddingProvider, EmbeddingSettings, Exchange,
    IndexedDocument, ModelSettings, RetrievedChunk, RetrievedContext, Transcript,
};
pub use crate::domain::ports::{ConfigProvider, Embedder, LanguageModel, Pipeline, Storage};
pub use crate::utils::error::Result;
