use crate::config::{
    BYTES_PER_MB, DEFAULT_EMBEDDING_MODEL, DEFAULT_EMBEDDING_URL, DEFAULT_MAX_UPLOAD_MB,
    DEFAULT_TIMEOUT_SECS, DEFAULT_TOP_K,
};
use crate::core::chunker::DEFAULT_CHUNK_SIZE;
use crate::core::embedder::{DEFAULT_BATCH_SIZE, DEFAULT_EMBEDDING_DIMENSION};
use crate::core::llm::{DEFAULT_MODEL_ENDPOINT, DEFAULT_MODEL_ID};
use crate::core::{ConfigProvider, EmbeddingProvider, EmbeddingSettings, ModelSettings};
use crate::utils::error::{RagError, Result};
use crate::utils::validation::Validate;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TomlConfig {
    pub app: AppConfig,
    #[serde(default)]
    pub document: DocumentConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub output: OutputConfig,
    pub monitoring: Option<MonitoringConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub name: String,
    pub description: Option<String>,
    pub version: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentConfig {
    pub path: Option<String>,
    pub mime: Option<String>,
    pub max_upload_mb: Option<u64>,
    pub chunk_size: Option<usize>,
    pub chunk_overlap: Option<usize>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    pub provider: Option<EmbeddingProvider>,
    pub endpoint: Option<String>,
    pub model: Option<String>,
    pub dimension: Option<usize>,
    pub batch_size: Option<usize>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetrievalConfig {
    pub top_k: Option<usize>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelConfig {
    pub endpoint: Option<String>,
    pub model_id: Option<String>,
    pub auth_token: Option<String>,
    pub timeout_seconds: Option<u64>,
    pub retry_attempts: Option<u32>,
    pub retry_delay_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputConfig {
    pub path: Option<String>,
    pub save_transcript: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    pub enabled: bool,
    pub log_level: Option<String>,
}

impl TomlConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(RagError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| RagError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${VPS_AUTH_TOKEN})，未設定的保持原樣
    fn substitute_env_vars(content: &str) -> Result<String> {
        use regex::Regex;
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| RagError::ConfigError {
            message: format!("invalid substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    /// 驗證配置的合理性
    pub fn validate_config(&self) -> Result<()> {
        use crate::utils::validation::*;

        validate_non_empty_string("app.name", &self.app.name)?;

        if let Some(path) = &self.document.path {
            validate_path("document.path", path)?;
            if self.document.mime.is_none() {
                validate_file_extensions(
                    "document.path",
                    std::slice::from_ref(path),
                    crate::domain::model::SUPPORTED_EXTENSIONS,
                )?;
            }
        }
        validate_range("document.max_upload_mb", self.max_upload_mb(), 1, 1024)?;
        validate_chunking(self.chunk_size(), self.chunk_overlap())?;
        validate_positive_number("retrieval.top_k", self.top_k(), 1)?;

        let embedding = self.embedding();
        validate_positive_number("embedding.dimension", embedding.dimension, 1)?;
        validate_positive_number("embedding.batch_size", embedding.batch_size, 1)?;
        if embedding.provider == EmbeddingProvider::Http {
            validate_url("embedding.endpoint", &embedding.endpoint)?;
        }

        let model = self.model();
        validate_url("model.endpoint", &model.endpoint)?;
        validate_non_empty_string("model.model_id", &model.model_id)?;

        validate_path("output.path", self.output_path())?;
        if let Some(level) = self.log_level() {
            validate_log_level("monitoring.log_level", level)?;
        }
        Ok(())
    }

    pub fn document_path(&self) -> Option<&str> {
        self.document.path.as_deref()
    }

    pub fn max_upload_mb(&self) -> u64 {
        self.document.max_upload_mb.unwrap_or(DEFAULT_MAX_UPLOAD_MB)
    }

    pub fn save_transcript(&self) -> bool {
        self.output.save_transcript.unwrap_or(false)
    }

    pub fn monitoring_enabled(&self) -> bool {
        self.monitoring.as_ref().map(|m| m.enabled).unwrap_or(false)
    }

    pub fn log_level(&self) -> Option<&str> {
        self.monitoring.as_ref().and_then(|m| m.log_level.as_deref())
    }
}

impl ConfigProvider for TomlConfig {
    fn chunk_size(&self) -> usize {
        self.document.chunk_size.unwrap_or(DEFAULT_CHUNK_SIZE)
    }

    fn chunk_overlap(&self) -> usize {
        self.document.chunk_overlap.unwrap_or(0)
    }

    fn top_k(&self) -> usize {
        self.retrieval.top_k.unwrap_or(DEFAULT_TOP_K)
    }

    fn max_upload_bytes(&self) -> u64 {
        self.max_upload_mb() * BYTES_PER_MB
    }

    fn output_path(&self) -> &str {
        self.output.path.as_deref().unwrap_or("./output")
    }

    fn embedding(&self) -> EmbeddingSettings {
        EmbeddingSettings {
            provider: self.embedding.provider.unwrap_or(EmbeddingProvider::Http),
            endpoint: self
                .embedding
                .endpoint
                .clone()
                .unwrap_or_else(|| DEFAULT_EMBEDDING_URL.to_string()),
            model: self
                .embedding
                .model
                .clone()
                .unwrap_or_else(|| DEFAULT_EMBEDDING_MODEL.to_string()),
            dimension: self
                .embedding
                .dimension
                .unwrap_or(DEFAULT_EMBEDDING_DIMENSION),
            batch_size: self.embedding.batch_size.unwrap_or(DEFAULT_BATCH_SIZE),
        }
    }

    fn model(&self) -> ModelSettings {
        // 未替換的 ${VAR} 視為沒有設定
        let auth_token = self
            .model
            .auth_token
            .clone()
            .filter(|t| !t.trim().is_empty() && !t.starts_with("${"));

        ModelSettings {
            endpoint: self
                .model
                .endpoint
                .clone()
                .unwrap_or_else(|| DEFAULT_MODEL_ENDPOINT.to_string()),
            model_id: self
                .model
                .model_id
                .clone()
                .unwrap_or_else(|| DEFAULT_MODEL_ID.to_string()),
            auth_token,
            timeout_secs: self.model.timeout_seconds.unwrap_or(DEFAULT_TIMEOUT_SECS),
            retry_attempts: self.model.retry_attempts.unwrap_or(0),
            retry_delay_ms: self.model.retry_delay_ms.unwrap_or(1000),
        }
    }
}

impl Validate for TomlConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
