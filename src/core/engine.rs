use crate::core::{Answer, DocumentKind, Exchange, IndexedDocument, Pipeline, Transcript};
use crate::utils::error::{RagError, Result};
use crate::utils::monitor::SystemMonitor;
use tokio::sync::RwLock;

/// Outcome of a successful `RagEngine::ingest`.
#[derive(Debug, Clone)]
pub struct IngestReport {
    pub file_name: String,
    pub kind: DocumentKind,
    pub characters: usize,
    pub chunk_count: usize,
    pub replaced_previous: bool,
}

#[derive(Default)]
struct Session {
    indexed: Option<IndexedDocument>,
    last_file_name: Option<String>,
    exchanges: Vec<Exchange>,
}

/// Drives a pipeline for one user session: the indexed document and its Q&A history.
pub struct RagEngine<P: Pipeline> {
    pipeline: P,
    monitor: SystemMonitor,
    session: RwLock<Session>,
}

impl<P: Pipeline> RagEngine<P> {
    pub fn new(pipeline: P) -> Self {
        Self::new_with_monitoring(pipeline, false)
    }

    pub fn new_with_monitoring(pipeline: P, monitor_enabled: bool) -> Self {
        Self {
            pipeline,
            monitor: SystemMonitor::new(monitor_enabled),
            session: RwLock::new(Session::default()),
        }
    }

    /// Extracts and indexes `path`. The previous document stays active if this fails.
    pub async fn ingest(&self, path: &str) -> Result<IngestReport> {
        {
            let session = self.session.read().await;
            let name = std::path::Path::new(path)
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or(path);
            if session.last_file_name.as_deref() != Some(name) {
                tracing::info!("📤 Uploading {}", name);
            }
        }

        // 擷取文字
        self.monitor.start_stage();
        tracing::info!("📄 Extracting text from {}", path);
        let document = self.pipeline.extract(path).await?;
        self.monitor.log_stats("Extract");

        // 切塊、嵌入並建立索引
        tracing::info!("🧮 Generating embeddings and indexing...");
        let indexed = self.pipeline.index(&document).await?;
        self.monitor.log_stats("Index");

        let report = IngestReport {
            file_name: document.name.clone(),
            kind: document.kind,
            characters: document.text.chars().count(),
            chunk_count: indexed.chunks.len(),
            replaced_previous: false,
        };

        let mut session = self.session.write().await;
        let replaced_previous = session.indexed.replace(indexed).is_some();
        session.last_file_name = Some(document.name);

        tracing::info!(
            "✅ Document processed and indexed successfully ({} chunks)",
            report.chunk_count
        );
        Ok(IngestReport {
            replaced_previous,
            ..report
        })
    }

    pub async fn ask(&self, query: &str) -> Result<Answer> {
        if query.trim().is_empty() {
            return Err(RagError::ValidationError {
                message: "query cannot be empty".to_string(),
            });
        }

        let session = self.session.read().await;
        let indexed = session.indexed.as_ref().ok_or(RagError::NoDocumentIndexed)?;

        self.monitor.start_stage();
        tracing::info!("🔎 Retrieving context from {}", indexed.name);
        let context = self.pipeline.retrieve(indexed, query).await?;
        self.monitor.log_stats("Retrieve");

        tracing::info!("🤖 Generating response from LLM...");
        let answer = self.pipeline.generate(query, &context).await?;
        self.monitor.log_stats("Generate");
        drop(session);

        self.session.write().await.exchanges.push(Exchange {
            query: answer.query.clone(),
            context: answer.context.clone(),
            answer: answer.text.clone(),
            asked_at: chrono::Utc::now(),
        });

        Ok(answer)
    }

    pub async fn is_indexed(&self) -> bool {
        self.session.read().await.indexed.is_some()
    }

    /// Name and chunk count of the active document.
    pub async fn current_document(&self) -> Option<(String, usize)> {
        self.session
            .read()
            .await
            .indexed
            .as_ref()
            .map(|d| (d.name.clone(), d.chunks.len()))
    }

    pub async fn transcript(&self) -> Transcript {
        let session = self.session.read().await;
        Transcript {
            document: session.indexed.as_ref().map(|d| d.name.clone()),
            kind: session.indexed.as_ref().map(|d| d.kind),
            chunk_count: session.indexed.as_ref().map(|d| d.chunks.len()).unwrap_or(0),
            exchanges: session.exchanges.clone(),
        }
    }

    pub async fn save_transcript(&self) -> Result<String> {
        let transcript = self.transcript().await;
        let output_path = self.pipeline.persist(&transcript).await?;
        tracing::info!(
            "📁 Transcript with {} exchanges saved to: {}",
            transcript.exchanges.len(),
            output_path
        );
        self.monitor.log_final_stats();
        Ok(output_path)
    }
}
