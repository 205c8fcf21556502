use crate::core::chunker::chunk_text;
use crate::core::embedder::{build_embedder, embed_in_batches};
use crate::core::extract::extract_text;
use crate::core::index::FlatL2Index;
use crate::core::llm::ModelClient;
use crate::core::prompt::{build_prompt, join_context};
use crate::core::{
    Answer, ConfigProvider, Document, DocumentKind, Embedder, IndexedDocument, LanguageModel,
    Pipeline, RetrievedChunk, RetrievedContext, Storage, Transcript,
};
use crate::utils::error::{RagError, Result};
use std::sync::Arc;

pub const TRANSCRIPT_FILE: &str = "docquery_transcript.json";

pub struct RagPipeline<S: Storage, C: ConfigProvider> {
    storage: S,
    config: C,
    embedder: Arc<dyn Embedder>,
    model: Arc<dyn LanguageModel>,
    mime_override: Option<String>,
}

impl<S: Storage, C: ConfigProvider> RagPipeline<S, C> {
    /// Builds the embedder and model client described by `config`.
    pub fn new(storage: S, config: C) -> Result<Self> {
        let embedder = build_embedder(&config.embedding())?;
        let model: Arc<dyn LanguageModel> = Arc::new(ModelClient::new(&config.model())?);
        Ok(Self::with_components(storage, config, embedder, model))
    }

    pub fn with_components(
        storage: S,
        config: C,
        embedder: Arc<dyn Embedder>,
        model: Arc<dyn LanguageModel>,
    ) -> Self {
        Self {
            storage,
            config,
            embedder,
            model,
            mime_override: None,
        }
    }

    /// Uses a declared MIME type instead of the file extension to pick the extractor.
    pub fn with_mime_override(mut self, mime: Option<String>) -> Self {
        self.mime_override = mime;
        self
    }

    fn resolve_kind(&self, path: &str) -> Result<DocumentKind> {
        let kind = match &self.mime_override {
            Some(mime) => DocumentKind::from_mime(mime),
            None => DocumentKind::from_path(path),
        };
        kind.ok_or_else(|| RagError::UnsupportedFileType {
            name: file_name(path),
        })
    }
}

#[async_trait::async_trait]
impl<S: Storage, C: ConfigProvider> Pipeline for RagPipeline<S, C> {
    async fn extract(&self, path: &str) -> Result<Document> {
        let kind = self.resolve_kind(path)?;
        let name = file_name(path);

        let limit = self.config.max_upload_bytes();
        let declared = self.storage.file_size(path).await?;
        if declared > limit {
            return Err(RagError::FileTooLarge {
                name,
                size: declared,
                limit,
            });
        }

        tracing::debug!("Reading {} as {}", path, kind);
        let bytes = self.storage.read_file(path).await?;

        // 檔案可能在檢查後被改寫
        let size = bytes.len() as u64;
        if size > limit {
            return Err(RagError::FileTooLarge { name, size, limit });
        }

        let text = tokio::task::spawn_blocking(move || extract_text(kind, &bytes))
            .await
            .map_err(|e| RagError::ProcessingError {
                message: format!("extraction task failed: {}", e),
            })??;
        if text.trim().is_empty() {
            return Err(RagError::EmptyDocument);
        }
        tracing::debug!("Extracted {} characters from {}", text.chars().count(), name);

        Ok(Document {
            name,
            kind,
            size_bytes: size,
            text,
        })
    }

    async fn index(&self, document: &Document) -> Result<IndexedDocument> {
        let chunks = chunk_text(
            &document.text,
            self.config.chunk_size(),
            self.config.chunk_overlap(),
        );
        if chunks.is_empty() {
            return Err(RagError::EmptyDocument);
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let batch_size = self.config.embedding().batch_size;
        let vectors = embed_in_batches(self.embedder.as_ref(), &texts, batch_size).await?;

        // 每次都重建索引
        let mut index = FlatL2Index::new(self.embedder.dimension());
        index.add(&vectors)?;
        tracing::debug!(
            "Indexed {} chunks ({} dimensions)",
            index.len(),
            index.dimension()
        );

        Ok(IndexedDocument {
            name: document.name.clone(),
            kind: document.kind,
            chunks,
            index,
        })
    }

    async fn retrieve(&self, indexed: &IndexedDocument, query: &str) -> Result<RetrievedContext> {
        let query_vector = self
            .embedder
            .embed(&[query.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| RagError::ProcessingError {
                message: "embedder returned no vector for the query".to_string(),
            })?;

        let neighbors = indexed.index.search(&query_vector, self.config.top_k())?;
        let chunks = neighbors
            .into_iter()
            .filter_map(|n| {
                indexed.chunks.get(n.index).map(|chunk| RetrievedChunk {
                    index: chunk.index,
                    distance: n.distance,
                    text: chunk.text.clone(),
                })
            })
            .collect::<Vec<_>>();
        tracing::debug!("Retrieved {} chunks for query", chunks.len());

        Ok(join_context(chunks))
    }

    async fn generate(&self, query: &str, context: &RetrievedContext) -> Result<Answer> {
        let model_id = self.config.model().model_id;
        let prompt = build_prompt(query, &context.text);

        tracing::debug!("Querying model {} ({} prompt chars)", model_id, prompt.len());
        let text = self.model.predict(&model_id, &prompt).await?;

        Ok(Answer {
            query: query.to_string(),
            context: context.text.clone(),
            text,
            model_id,
        })
    }

    async fn persist(&self, transcript: &Transcript) -> Result<String> {
        let output_path = format!(
            "{}/{}",
            self.config.output_path().trim_end_matches('/'),
            TRANSCRIPT_FILE
        );
        let json = serde_json::to_string_pretty(transcript)?;

        tracing::debug!("Writing transcript ({} bytes) to {}", json.len(), output_path);
        self.storage.write_file(&output_path, json.as_bytes()).await?;
        Ok(output_path)
    }
}

fn file_name(path: &str) -> String {
    std::path::Path::new(path)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(path)
        .to_string()
}
