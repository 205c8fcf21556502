use crate::core::{LanguageModel, ModelSettings};
use crate::utils::error::{RagError, Result};
use reqwest::{Client, StatusCode};
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

pub const DEFAULT_MODEL_ENDPOINT: &str = "https://proxy.vipas.ai";
pub const DEFAULT_MODEL_ID: &str = "mdl-hy3grx9aoskqu";
pub const NO_RESPONSE_TEXT: &str = "No response text available.";

const AUTH_HEADER: &str = "vps-auth-token";

#[derive(Serialize)]
struct PredictRequest<'a> {
    input_data: &'a str,
}

/// Client for the hosted model endpoint.
///
/// Sends `POST {endpoint}/predict?model_id=..` with `{"input_data": prompt}`
/// and reads the completion from `choices[0].text`.
pub struct ModelClient {
    client: Client,
    endpoint: String,
    auth_token: Option<String>,
    retry_attempts: u32,
    retry_delay: Duration,
}

impl ModelClient {
    pub fn new(settings: &ModelSettings) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            endpoint: settings.endpoint.trim_end_matches('/').to_string(),
            auth_token: settings.auth_token.clone().filter(|t| !t.trim().is_empty()),
            retry_attempts: settings.retry_attempts,
            retry_delay: Duration::from_millis(settings.retry_delay_ms),
        })
    }

    async fn send_once(&self, model_id: &str, prompt: &str) -> Result<String> {
        let url = format!("{}/predict", self.endpoint);
        let mut request = self
            .client
            .post(&url)
            .query(&[("model_id", model_id)])
            .json(&PredictRequest { input_data: prompt });
        if let Some(token) = &self.auth_token {
            request = request.header(AUTH_HEADER, token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(RagError::ModelError {
                status: status.as_u16(),
                message,
            });
        }

        let body: Value = response.json().await?;
        Ok(completion_text(&body))
    }
}

#[async_trait::async_trait]
impl LanguageModel for ModelClient {
    async fn predict(&self, model_id: &str, prompt: &str) -> Result<String> {
        let mut attempt = 0u32;
        loop {
            match self.send_once(model_id, prompt).await {
                Ok(text) => return Ok(text),
                Err(e) if attempt < self.retry_attempts && is_retryable(&e) => {
                    attempt += 1;
                    tracing::warn!(
                        "Model request failed ({}), retry {}/{} in {:?}",
                        e,
                        attempt,
                        self.retry_attempts,
                        self.retry_delay
                    );
                    tokio::time::sleep(self.retry_delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

fn is_retryable(error: &RagError) -> bool {
    match error {
        RagError::ApiError(e) => !e.is_decode(),
        RagError::ModelError { status, .. } => {
            StatusCode::from_u16(*status)
                .map(|s| s.is_server_error() || s == StatusCode::TOO_MANY_REQUESTS)
                .unwrap_or(false)
        }
        _ => false,
    }
}

fn completion_text(body: &Value) -> String {
    body.get("choices")
        .and_then(|choices| choices.get(0))
        .and_then(|choice| choice.get("text"))
        .and_then(|text| text.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| NO_RESPONSE_TEXT.to_string())
}
