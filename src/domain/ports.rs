use crate::domain::model::{
    Answer, Document, EmbeddingSettings, IndexedDocument, ModelSettings, RetrievedContext,
    Transcript,
};
use crate::utils::error::Result;
use async_trait::async_trait;

pub trait Storage: Send + Sync {
    /// Size in bytes, without reading the content.
    fn file_size(&self, path: &str) -> impl std::future::Future<Output = Result<u64>> + Send;
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

pub trait ConfigProvider: Send + Sync {
    fn chunk_size(&self) -> usize;
    fn chunk_overlap(&self) -> usize;
    fn top_k(&self) -> usize;
    fn max_upload_bytes(&self) -> u64;
    fn output_path(&self) -> &str;
    fn embedding(&self) -> EmbeddingSettings;
    fn model(&self) -> ModelSettings;
}

#[async_trait]
pub trait Embedder: Send + Sync {
    fn dimension(&self) -> usize;
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn predict(&self, model_id: &str, prompt: &str) -> Result<String>;
}

#[async_trait]
pub trait Pipeline: Send + Sync {
    async fn extract(&self, path: &str) -> Result<Document>;
    async fn index(&self, document: &Document) -> Result<IndexedDocument>;
    async fn retrieve(&self, indexed: &IndexedDocument, query: &str) -> Result<RetrievedContext>;
    async fn generate(&self, query: &str, context: &RetrievedContext) -> Result<Answer>;
    async fn persist(&self, transcript: &Transcript) -> Result<String>;
}
