pub mod cli;
pub mod toml_config;

use crate::core::embedder::{DEFAULT_BATCH_SIZE, DEFAULT_EMBEDDING_DIMENSION};
use crate::core::llm::{DEFAULT_MODEL_ENDPOINT, DEFAULT_MODEL_ID};
use crate::core::{ConfigProvider, EmbeddingProvider, EmbeddingSettings, ModelSettings};
use crate::domain::model::SUPPORTED_EXTENSIONS;
use crate::utils::error::Result;
use crate::utils::validation::{self, Validate};
use serde::{Deserialize, Serialize};

pub const BYTES_PER_MB: u64 = 1024 * 1024;
pub const DEFAULT_MAX_UPLOAD_MB: u64 = 2;
pub const DEFAULT_TOP_K: usize = 5;
pub const DEFAULT_EMBEDDING_URL: &str = "http://localhost:11434";
pub const DEFAULT_EMBEDDING_MODEL: &str = "all-minilm";
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

#[cfg(feature = "cli")]
use clap::Parser;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(Parser))]
#[cfg_attr(feature = "cli", command(name = "docquery"))]
#[cfg_attr(
    feature = "cli",
    command(about = "RAG-based Q&A over a PDF, DOCX or spreadsheet")
)]
pub struct CliConfig {
    /// Document to index (pdf, docx, xlsx, csv, txt)
    #[cfg_attr(feature = "cli", arg(long))]
    pub file: Option<String>,

    /// Declared MIME type of the file, overrides the extension
    #[cfg_attr(feature = "cli", arg(long))]
    pub mime: Option<String>,

    /// Question to ask; repeat for several. Without it an interactive prompt starts
    #[cfg_attr(feature = "cli", arg(long = "query", short = 'q'))]
    pub queries: Vec<String>,

    #[cfg_attr(feature = "cli", arg(long, default_value = "500"))]
    pub chunk_size: usize,

    #[cfg_attr(feature = "cli", arg(long, default_value = "0"))]
    pub chunk_overlap: usize,

    #[cfg_attr(feature = "cli", arg(long, default_value = "5"))]
    pub top_k: usize,

    #[cfg_attr(feature = "cli", arg(long, default_value = "2"))]
    pub max_upload_mb: u64,

    #[cfg_attr(feature = "cli", arg(long, value_enum, default_value = "http"))]
    pub embedding_provider: EmbeddingProvider,

    #[cfg_attr(feature = "cli", arg(long, default_value = DEFAULT_EMBEDDING_URL))]
    pub embedding_url: String,

    #[cfg_attr(feature = "cli", arg(long, default_value = DEFAULT_EMBEDDING_MODEL))]
    pub embedding_model: String,

    #[cfg_attr(feature = "cli", arg(long, default_value = "384"))]
    pub embedding_dim: usize,

    #[cfg_attr(feature = "cli", arg(long, default_value = "32"))]
    pub batch_size: usize,

    #[cfg_attr(feature = "cli", arg(long, default_value = DEFAULT_MODEL_ENDPOINT))]
    pub model_endpoint: String,

    #[cfg_attr(feature = "cli", arg(long, default_value = DEFAULT_MODEL_ID))]
    pub model_id: String,

    #[cfg_attr(feature = "cli", arg(long, env = "VPS_AUTH_TOKEN", hide_env_values = true))]
    #[serde(skip_serializing)]
    pub auth_token: Option<String>,

    #[cfg_attr(feature = "cli", arg(long, default_value = "120"))]
    pub timeout_secs: u64,

    #[cfg_attr(feature = "cli", arg(long, default_value = "0"))]
    pub retries: u32,

    /// Directory for the session transcript
    #[cfg_attr(feature = "cli", arg(long))]
    pub output: Option<String>,

    #[cfg_attr(feature = "cli", arg(long, help = "Enable verbose output"))]
    pub verbose: bool,

    #[cfg_attr(feature = "cli", arg(long, help = "Log CPU and memory after each stage"))]
    pub monitor: bool,

    #[cfg_attr(feature = "cli", arg(long, help = "Emit logs as JSON lines"))]
    pub json_logs: bool,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            file: None,
            mime: None,
            queries: Vec::new(),
            chunk_size: crate::core::chunker::DEFAULT_CHUNK_SIZE,
            chunk_overlap: 0,
            top_k: DEFAULT_TOP_K,
            max_upload_mb: DEFAULT_MAX_UPLOAD_MB,
            embedding_provider: EmbeddingProvider::Http,
            embedding_url: DEFAULT_EMBEDDING_URL.to_string(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            embedding_dim: DEFAULT_EMBEDDING_DIMENSION,
            batch_size: DEFAULT_BATCH_SIZE,
            model_endpoint: DEFAULT_MODEL_ENDPOINT.to_string(),
            model_id: DEFAULT_MODEL_ID.to_string(),
            auth_token: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            retries: 0,
            output: None,
            verbose: false,
            monitor: false,
            json_logs: false,
        }
    }
}

impl ConfigProvider for CliConfig {
    fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    fn top_k(&self) -> usize {
        self.top_k
    }

    fn max_upload_bytes(&self) -> u64 {
        self.max_upload_mb * BYTES_PER_MB
    }

    fn output_path(&self) -> &str {
        self.output.as_deref().unwrap_or(".")
    }

    fn embedding(&self) -> EmbeddingSettings {
        EmbeddingSettings {
            provider: self.embedding_provider,
            endpoint: self.embedding_url.clone(),
            model: self.embedding_model.clone(),
            dimension: self.embedding_dim,
            batch_size: self.batch_size,
        }
    }

    fn model(&self) -> ModelSettings {
        ModelSettings {
            endpoint: self.model_endpoint.clone(),
            model_id: self.model_id.clone(),
            auth_token: self.auth_token.clone(),
            timeout_secs: self.timeout_secs,
            retry_attempts: self.retries,
            retry_delay_ms: 1000,
        }
    }
}

impl Validate for CliConfig {
    fn validate(&self) -> Result<()> {
        if let Some(file) = &self.file {
            validation::validate_path("file", file)?;
            // 有宣告 MIME 時以 MIME 判斷類型
            if self.mime.is_none() {
                validation::validate_file_extensions(
                    "file",
                    std::slice::from_ref(file),
                    SUPPORTED_EXTENSIONS,
                )?;
            }
        }
        if let Some(output) = &self.output {
            validation::validate_path("output", output)?;
        }

        validation::validate_chunking(self.chunk_size, self.chunk_overlap)?;
        validation::validate_positive_number("top_k", self.top_k, 1)?;
        validation::validate_range("max_upload_mb", self.max_upload_mb, 1, 1024)?;
        validation::validate_positive_number("embedding_dim", self.embedding_dim, 1)?;
        validation::validate_positive_number("batch_size", self.batch_size, 1)?;
        validation::validate_non_empty_string("model_id", &self.model_id)?;
        validation::validate_url("model_endpoint", &self.model_endpoint)?;
        if self.embedding_provider == EmbeddingProvider::Http {
            validation::validate_url("embedding_url", &self.embedding_url)?;
            validation::validate_non_empty_string("embedding_model", &self.embedding_model)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let config = CliConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_upload_bytes(), 2 * 1024 * 1024);
        assert_eq!(config.output_path(), ".");
        assert_eq!(config.embedding().dimension, 384);
        assert_eq!(config.model().model_id, "mdl-hy3grx9aoskqu");
    }

    #[test]
    fn test_unsupported_file_extension_fails() {
        let config = CliConfig {
            file: Some("slides.pptx".to_string()),
            ..CliConfig::default()
        };
        assert!(config.validate().is_err());

        let config = CliConfig {
            file: Some("upload.bin".to_string()),
            mime: Some("application/pdf".to_string()),
            ..CliConfig::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_hashing_provider_skips_embedding_url() {
        let config = CliConfig {
            embedding_provider: EmbeddingProvider::Hashing,
            embedding_url: String::new(),
            ..CliConfig::default()
        };
        assert!(config.validate().is_ok());
    }

    #[cfg(feature = "cli")]
    #[test]
    fn test_parse_cli_flags() {
        let config = CliConfig::try_parse_from([
            "docquery",
            "--file",
            "report.pdf",
            "-q",
            "first?",
            "--query",
            "second?",
            "--top-k",
            "3",
            "--embedding-provider",
            "hashing",
        ])
        .unwrap();

        assert_eq!(config.file.as_deref(), Some("report.pdf"));
        assert_eq!(config.queries, vec!["first?", "second?"]);
        assert_eq!(config.top_k, 3);
        assert_eq!(config.chunk_size, 500);
        assert_eq!(config.embedding_provider, EmbeddingProvider::Hashing);
    }
}
