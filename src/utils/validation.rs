use crate::utils::error::{RagError, Result};
use url::Url;

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

fn invalid(field: &str, value: impl ToString, reason: impl Into<String>) -> RagError {
    RagError::InvalidConfigValueError {
        field: field.to_string(),
        value: value.to_string(),
        reason: reason.into(),
    }
}

/// Endpoints must be absolute http(s) URLs.
pub fn validate_url(field_name: &str, url_str: &str) -> Result<()> {
    if url_str.is_empty() {
        return Err(invalid(field_name, url_str, "URL cannot be empty"));
    }

    let url = Url::parse(url_str)
        .map_err(|e| invalid(field_name, url_str, format!("Invalid URL format: {}", e)))?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        scheme => Err(invalid(
            field_name,
            url_str,
            format!("Unsupported URL scheme: {}", scheme),
        )),
    }
}

pub fn validate_path(field_name: &str, path: &str) -> Result<()> {
    if path.is_empty() {
        return Err(invalid(field_name, path, "Path cannot be empty"));
    }
    if path.contains('\0') {
        return Err(invalid(field_name, path, "Path contains null bytes"));
    }
    Ok(())
}

pub fn validate_positive_number(field_name: &str, value: usize, min_value: usize) -> Result<()> {
    if value < min_value {
        return Err(invalid(
            field_name,
            value,
            format!("Value must be at least {}", min_value),
        ));
    }
    Ok(())
}

/// Extensions are compared case-insensitively.
pub fn validate_file_extensions(
    field_name: &str,
    files: &[String],
    allowed_extensions: &[&str],
) -> Result<()> {
    for file in files {
        let extension = std::path::Path::new(file)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .ok_or_else(|| invalid(field_name, file, "File has no extension or invalid filename"))?;

        if !allowed_extensions.contains(&extension.as_str()) {
            return Err(invalid(
                field_name,
                file,
                format!(
                    "Unsupported file extension: {}. Allowed extensions: {}",
                    extension,
                    allowed_extensions.join(", ")
                ),
            ));
        }
    }
    Ok(())
}

pub fn validate_non_empty_string(field_name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(invalid(
            field_name,
            value,
            "Value cannot be empty or whitespace-only",
        ));
    }
    Ok(())
}

pub fn validate_range<T: PartialOrd + std::fmt::Display + Copy>(
    field_name: &str,
    value: T,
    min: T,
    max: T,
) -> Result<()> {
    if value < min || value > max {
        return Err(invalid(
            field_name,
            value,
            format!("Value must be between {} and {}", min, max),
        ));
    }
    Ok(())
}

/// Chunk overlap has to leave the window advancing.
pub fn validate_chunking(chunk_size: usize, chunk_overlap: usize) -> Result<()> {
    validate_positive_number("chunk_size", chunk_size, 1)?;
    if chunk_overlap >= chunk_size {
        return Err(invalid(
            "chunk_overlap",
            chunk_overlap,
            format!("Overlap must be smaller than chunk_size ({})", chunk_size),
        ));
    }
    Ok(())
}

pub const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

pub fn validate_log_level(field_name: &str, level: &str) -> Result<()> {
    if !LOG_LEVELS.contains(&level.to_ascii_lowercase().as_str()) {
        return Err(invalid(
            field_name,
            level,
            format!("Log level must be one of: {}", LOG_LEVELS.join(", ")),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_log_level() {
        assert!(validate_log_level("monitoring.log_level", "debug").is_ok());
        assert!(validate_log_level("monitoring.log_level", "WARN").is_ok());
        assert!(validate_log_level("monitoring.log_level", "loud").is_err());
        assert!(validate_log_level("monitoring.log_level", "").is_err());
    }

    #[test]
    fn test_validate_url() {
        assert!(validate_url("model_endpoint", "https://proxy.vipas.ai").is_ok());
        assert!(validate_url("embedding_url", "http://localhost:11434").is_ok());
        assert!(validate_url("model_endpoint", "").is_err());
        assert!(validate_url("model_endpoint", "invalid-url").is_err());
        assert!(validate_url("model_endpoint", "ftp://example.com").is_err());
    }

    #[test]
    fn test_validate_positive_number() {
        assert!(validate_positive_number("top_k", 5, 1).is_ok());
        assert!(validate_positive_number("top_k", 0, 1).is_err());
    }

    #[test]
    fn test_validate_file_extensions() {
        let files = vec!["report.pdf".to_string(), "Notes.DOCX".to_string()];
        assert!(validate_file_extensions("file", &files, &["pdf", "docx", "xlsx"]).is_ok());

        let invalid_files = vec!["slides.pptx".to_string()];
        assert!(validate_file_extensions("file", &invalid_files, &["pdf", "docx"]).is_err());

        let no_extension = vec!["README".to_string()];
        assert!(validate_file_extensions("file", &no_extension, &["pdf"]).is_err());
    }

    #[test]
    fn test_validate_chunking() {
        assert!(validate_chunking(500, 0).is_ok());
        assert!(validate_chunking(500, 100).is_ok());
        assert!(validate_chunking(0, 0).is_err());
        assert!(validate_chunking(500, 500).is_err());
    }

    #[test]
    fn test_validate_range() {
        assert!(validate_range("max_upload_mb", 2u64, 1, 64).is_ok());
        assert!(validate_range("max_upload_mb", 0u64, 1, 64).is_err());
    }
}
