use thiserror::Error;

#[derive(Error, Debug)]
pub enum RagError {
    #[error("Zip operation failed: {0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("XML parsing failed: {0}")]
    XmlError(#[from] quick_xml::Error),

    #[error("PDF extraction failed: {message}")]
    PdfError { message: String },

    #[error("API request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Unsupported file type: {name}")]
    UnsupportedFileType { name: String },

    #[error("File {name} is {size} bytes, limit is {limit} bytes")]
    FileTooLarge { name: String, size: u64, limit: u64 },

    #[error("No valid text found in the document")]
    EmptyDocument,

    #[error("No document is indexed")]
    NoDocumentIndexed,

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Model endpoint returned {status}: {message}")]
    ModelError { status: u16, message: String },

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration validation failed for {field}: {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Data processing error: {message}")]
    ProcessingError { message: String },

    #[error("Validation error: {message}")]
    ValidationError { message: String },
}

pub type Result<T> = std::result::Result<T, RagError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Input,
    Network,
    Processing,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl RagError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            RagError::ConfigError { .. }
            | RagError::ConfigValidationError { .. }
            | RagError::InvalidConfigValueError { .. }
            | RagError::MissingConfigError { .. } => ErrorCategory::Configuration,
            RagError::UnsupportedFileType { .. }
            | RagError::FileTooLarge { .. }
            | RagError::EmptyDocument
            | RagError::NoDocumentIndexed
            | RagError::ValidationError { .. } => ErrorCategory::Input,
            RagError::ApiError(_) | RagError::ModelError { .. } => ErrorCategory::Network,
            RagError::ZipError(_)
            | RagError::XmlError(_)
            | RagError::PdfError { .. }
            | RagError::CsvError(_)
            | RagError::SerializationError(_)
            | RagError::DimensionMismatch { .. }
            | RagError::ProcessingError { .. } => ErrorCategory::Processing,
            RagError::IoError(_) => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            RagError::NoDocumentIndexed | RagError::ValidationError { .. } => ErrorSeverity::Low,
            RagError::ApiError(_) | RagError::ModelError { .. } => ErrorSeverity::Medium,
            RagError::IoError(_) => ErrorSeverity::Critical,
            _ => ErrorSeverity::High,
        }
    }

    /// 給使用者的修復建議
    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            RagError::UnsupportedFileType { .. } => {
                "Upload a PDF, DOCX, XLSX, CSV or TXT file"
            }
            RagError::FileTooLarge { .. } => "Upload a smaller file or raise the upload limit",
            RagError::EmptyDocument => "Check that the document contains selectable text",
            RagError::NoDocumentIndexed => "Load a document before asking questions",
            RagError::ZipError(_) | RagError::XmlError(_) | RagError::PdfError { .. } => {
                "The file looks corrupted; re-export it and try again"
            }
            RagError::CsvError(_) => "Check that the CSV file is well formed",
            RagError::ApiError(_) => "Check network connectivity and the endpoint URLs",
            RagError::ModelError { status, .. } if *status == 401 || *status == 403 => {
                "Check the model auth token (VPS_AUTH_TOKEN)"
            }
            RagError::ModelError { .. } => "Retry later or increase the retry count",
            RagError::DimensionMismatch { .. } => {
                "Make embedding-dim match the embedding model's output size"
            }
            RagError::ConfigError { .. }
            | RagError::ConfigValidationError { .. }
            | RagError::InvalidConfigValueError { .. }
            | RagError::MissingConfigError { .. } => "Review the configuration values and retry",
            RagError::IoError(_) => "Check file paths and permissions",
            RagError::SerializationError(_) => "The service returned an unexpected payload",
            RagError::ValidationError { .. } => "Enter a non-empty query",
            RagError::ProcessingError { .. } => "Check the input file and try again",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            RagError::UnsupportedFileType { name } => format!(
                "Unsupported file type for '{}'. Please upload a PDF, DOCX, or Excel file.",
                name
            ),
            RagError::FileTooLarge { limit, .. } => format!(
                "File size exceeds {}MB. Please upload a smaller file.",
                limit / (1024 * 1024)
            ),
            RagError::EmptyDocument => "No valid text found in the document.".to_string(),
            RagError::NoDocumentIndexed => {
                "No document is indexed. Please upload a file first.".to_string()
            }
            RagError::ApiError(_) | RagError::ModelError { .. } => {
                format!("Error querying the LLM: {}", self)
            }
            RagError::ZipError(_)
            | RagError::XmlError(_)
            | RagError::PdfError { .. }
            | RagError::CsvError(_) => format!("Error processing file: {}", self),
            _ => self.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_and_severity() {
        let err = RagError::NoDocumentIndexed;
        assert_eq!(err.category(), ErrorCategory::Input);
        assert_eq!(err.severity(), ErrorSeverity::Low);

        let err = RagError::ModelError {
            status: 503,
            message: "busy".to_string(),
        };
        assert_eq!(err.category(), ErrorCategory::Network);
        assert_eq!(err.severity(), ErrorSeverity::Medium);

        let err = RagError::IoError(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"));
        assert_eq!(err.severity(), ErrorSeverity::Critical);
    }

    #[test]
    fn test_user_friendly_message_for_large_file() {
        let err = RagError::FileTooLarge {
            name: "big.pdf".to_string(),
            size: 3 * 1024 * 1024,
            limit: 2 * 1024 * 1024,
        };
        assert_eq!(
            err.user_friendly_message(),
            "File size exceeds 2MB. Please upload a smaller file."
        );
    }

    #[test]
    fn test_auth_failure_suggests_token() {
        let err = RagError::ModelError {
            status: 401,
            message: "unauthorized".to_string(),
        };
        assert!(err.recovery_suggestion().contains("VPS_AUTH_TOKEN"));
    }
}
