use reqwest::Client;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use super::types::{CompletionRequest, CompletionResponse, Message, OracleJudgment};
use super::{extract_json_from_completion, VerifierOracle};
use crate::config::{RequestConfig, VerifierConfig};
use crate::error::{OracleError, OracleResult};
use crate::prompts::VERIFIER_SYSTEM_PROMPT;

/// HTTP client for the verifier oracle
#[derive(Clone)]
pub struct HttpVerifierOracle {
    client: Client,
    base_url: String,
    api_key: String,
    request_config: RequestConfig,
}

impl HttpVerifierOracle {
    /// Create a new verifier oracle client
    pub fn new(config: &VerifierConfig, request_config: RequestConfig) -> OracleResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(request_config.timeout_ms))
            .build()
            .map_err(OracleError::Http)?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            request_config,
        })
    }

    /// Get the base URL (for testing)
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Call the completion endpoint with retry and backoff
    async fn call_completion(
        &self,
        request: CompletionRequest,
    ) -> OracleResult<CompletionResponse> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let model = request.model.clone();

        let mut last_error = None;
        let mut retries = 0;

        while retries <= self.request_config.max_retries {
            if retries > 0 {
                let delay = Duration::from_millis(
                    self.request_config.retry_delay_ms * (2_u64.pow(retries - 1)),
                );
                warn!(
                    model = %model,
                    retry = retries,
                    delay_ms = delay.as_millis(),
                    "Retrying verifier request"
                );
                tokio::time::sleep(delay).await;
            }

            let start = Instant::now();

            match self.execute_request(&url, &request).await {
                Ok(response) => {
                    let latency = start.elapsed();
                    info!(
                        model = %model,
                        latency_ms = latency.as_millis(),
                        "Verifier call succeeded"
                    );
                    return Ok(response);
                }
                Err(e) => {
                    let latency = start.elapsed();
                    error!(
                        model = %model,
                        error = %e,
                        latency_ms = latency.as_millis(),
                        retry = retries,
                        "Verifier call failed"
                    );
                    last_error = Some(e);
                    retries += 1;
                }
            }
        }

        Err(OracleError::Unavailable {
            message: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "Unknown error".to_string()),
            retries,
        })
    }

    /// Execute a single request (internal)
    async fn execute_request(
        &self,
        url: &str,
        request: &CompletionRequest,
    ) -> OracleResult<CompletionResponse> {
        debug!(
            model = %request.model,
            messages = request.messages.len(),
            "Calling verifier completion endpoint"
        );

        let response = self
            .client
            .post(url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    OracleError::Timeout {
                        timeout_ms: self.request_config.timeout_ms,
                    }
                } else {
                    OracleError::Http(e)
                }
            })?;

        let status = response.status();

        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(OracleError::Api {
                status: status.as_u16(),
                message: error_body,
            });
        }

        let completion: CompletionResponse =
            response
                .json()
                .await
                .map_err(|e| OracleError::InvalidResponse {
                    message: format!("Failed to parse response: {}", e),
                })?;

        Ok(completion)
    }

    fn parse_judgment(completion: &str) -> OracleResult<OracleJudgment> {
        let json = extract_json_from_completion(completion)
            .map_err(|message| OracleError::InvalidResponse { message })?;

        let judgment: OracleJudgment =
            serde_json::from_str(json).map_err(|e| OracleError::InvalidResponse {
                message: format!("Judgment is not valid JSON: {}", e),
            })?;

        Ok(judgment.clamped())
    }
}

#[async_trait::async_trait]
impl VerifierOracle for HttpVerifierOracle {
    async fn judge(&self, prompt: &str, model: &str) -> OracleResult<OracleJudgment> {
        let messages = vec![
            Message::system(VERIFIER_SYSTEM_PROMPT),
            Message::user(prompt),
        ];
        let request = CompletionRequest::new(model, messages);

        let response = self.call_completion(request).await?;
        let content = response
            .choices
            .first()
            .map(|choice| choice.message.content.as_str())
            .ok_or_else(|| OracleError::InvalidResponse {
                message: "Response contained no choices".to_string(),
            })?;

        Self::parse_judgment(content)
    }
}
