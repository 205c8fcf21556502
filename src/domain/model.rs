use crate::core::index::FlatL2Index;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const PDF_MIME: &str = "application/pdf";
pub const DOCX_MIME: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
pub const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
pub const CSV_MIME: &str = "text/csv";
pub const TEXT_MIME: &str = "text/plain";

pub const SUPPORTED_EXTENSIONS: &[&str] = &["pdf", "docx", "xlsx", "csv", "txt"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    Pdf,
    Docx,
    Xlsx,
    Csv,
    Text,
}

impl DocumentKind {
    pub fn from_mime(mime: &str) -> Option<Self> {
        // 忽略 "; charset=..." 之類的參數
        let essence = mime.split(';').next().unwrap_or_default().trim();
        match essence.to_ascii_lowercase().as_str() {
            PDF_MIME => Some(Self::Pdf),
            DOCX_MIME => Some(Self::Docx),
            XLSX_MIME => Some(Self::Xlsx),
            CSV_MIME => Some(Self::Csv),
            TEXT_MIME => Some(Self::Text),
            _ => None,
        }
    }

    pub fn from_path(path: &str) -> Option<Self> {
        let extension = std::path::Path::new(path)
            .extension()
            .and_then(|ext| ext.to_str())?
            .to_ascii_lowercase();
        match extension.as_str() {
            "pdf" => Some(Self::Pdf),
            "docx" => Some(Self::Docx),
            "xlsx" => Some(Self::Xlsx),
            "csv" => Some(Self::Csv),
            "txt" => Some(Self::Text),
            _ => None,
        }
    }

    pub fn mime(&self) -> &'static str {
        match self {
            Self::Pdf => PDF_MIME,
            Self::Docx => DOCX_MIME,
            Self::Xlsx => XLSX_MIME,
            Self::Csv => CSV_MIME,
            Self::Text => TEXT_MIME,
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pdf => "PDF",
            Self::Docx => "DOCX",
            Self::Xlsx => "XLSX",
            Self::Csv => "CSV",
            Self::Text => "TXT",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone)]
pub struct Document {
    pub name: String,
    pub kind: DocumentKind,
    pub size_bytes: u64,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Chunk {
    pub index: usize,
    pub text: String,
}

/// A document whose chunks have been embedded; chunk `i` is vector `i` in `index`.
#[derive(Debug, Clone)]
pub struct IndexedDocument {
    pub name: String,
    pub kind: DocumentKind,
    pub chunks: Vec<Chunk>,
    pub index: FlatL2Index,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievedChunk {
    pub index: usize,
    pub distance: f32,
    pub text: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RetrievedContext {
    pub chunks: Vec<RetrievedChunk>,
    pub text: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub query: String,
    pub context: String,
    pub text: String,
    pub model_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Exchange {
    pub query: String,
    pub context: String,
    pub answer: String,
    pub asked_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Transcript {
    pub document: Option<String>,
    pub kind: Option<DocumentKind>,
    pub chunk_count: usize,
    pub exchanges: Vec<Exchange>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    /// Remote embedding service speaking the `/api/embed` protocol
    Http,
    /// Local character-trigram hashing, no network
    Hashing,
}

#[derive(Debug, Clone)]
pub struct EmbeddingSettings {
    pub provider: EmbeddingProvider,
    pub endpoint: String,
    pub model: String,
    pub dimension: usize,
    pub batch_size: usize,
}

#[derive(Debug, Clone)]
pub struct ModelSettings {
    pub endpoint: String,
    pub model_id: String,
    pub auth_token: Option<String>,
    pub timeout_secs: u64,
    pub retry_attempts: u32,
    pub retry_delay_ms: u64,
}
