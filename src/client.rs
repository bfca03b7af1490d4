//! # Reading Submission Client
//!
//! Thin wrapper around the billing backend's `POST /readings` endpoint.
//! Classifies every outcome into one of four buckets the engine's retry
//! policy is built on:
//!
//! - `Submitted` - the server persisted the reading
//! - `Rejected` - 400-class validation failure; needs user correction
//! - `Unauthorized` - 401/403; needs re-authentication, never silent retry
//! - `Network` - timeout, DNS, connection loss, 5xx; the only class
//!   eligible for automatic retry
//!
//! The bearer credential is fetched from the provider on every call.
//! Long-queued entries can outlive a token, and a replay must carry the
//! credential that is current at retry time.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::StatusCode;

use crate::auth::CredentialProvider;
use crate::config::Config;
use crate::model::{ApiErrorBody, QueuedReading, SubmitReadingRequest};

/// Classified result of one submission attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Reading persisted; carries the server-assigned identifier
    Submitted {
        /// Identifier assigned by the server
        server_id: String,
    },
    /// Validation failure; retrying the same payload cannot succeed
    Rejected {
        /// Reason reported by the server
        reason: String,
    },
    /// Credential missing, expired, or insufficient
    Unauthorized {
        /// Reason reported by the server
        reason: String,
    },
    /// Transient connectivity failure; eligible for automatic retry
    Network {
        /// Failure description
        reason: String,
    },
}

/// Submission port the sync engine drives.
#[async_trait]
pub trait SubmitReading: Send + Sync {
    /// Submit one reading and classify the outcome.
    ///
    /// Infrastructure failures are folded into the outcome rather than
    /// returned as errors; the engine records them on the queue entry.
    async fn submit(&self, reading: &QueuedReading) -> SubmitOutcome;
}

/// HTTP client for the reading CRUD backend.
pub struct ReadingClient {
    config: Config,
    client: reqwest::Client,
    credentials: Arc<dyn CredentialProvider>,
}

impl ReadingClient {
    pub fn new(config: Config, credentials: Arc<dyn CredentialProvider>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .unwrap_or_default();
        Self {
            config,
            client,
            credentials,
        }
    }

    /// Extract the server-assigned id from a success body.
    fn extract_server_id(body: &serde_json::Value) -> String {
        match body.get("id") {
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => String::new(),
        }
    }

    /// Best-effort reason text from an error response.
    async fn error_reason(response: reqwest::Response) -> String {
        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        serde_json::from_str::<ApiErrorBody>(&text)
            .ok()
            .and_then(|body| body.reason().map(str::to_string))
            .unwrap_or_else(|| {
                if text.is_empty() {
                    status.to_string()
                } else {
                    format!("{} - {}", status, text)
                }
            })
    }
}

#[async_trait]
impl SubmitReading for ReadingClient {
    async fn submit(&self, reading: &QueuedReading) -> SubmitOutcome {
        let Some(token) = self.credentials.bearer_token() else {
            return SubmitOutcome::Unauthorized {
                reason: "not authenticated".to_string(),
            };
        };

        let url = self.config.api_url("/readings");
        let payload = SubmitReadingRequest::from_reading(reading);

        let mut request = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", token))
            .json(&payload);
        if let Some(device_token) = self.credentials.device_token() {
            request = request.header("X-Device-Token", device_token);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(err) => {
                return SubmitOutcome::Network {
                    reason: format!("Network error: {}", err),
                };
            }
        };

        let status = response.status();
        if status.is_success() {
            let body = response
                .json::<serde_json::Value>()
                .await
                .unwrap_or(serde_json::Value::Null);
            return SubmitOutcome::Submitted {
                server_id: Self::extract_server_id(&body),
            };
        }

        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => SubmitOutcome::Unauthorized {
                reason: Self::error_reason(response).await,
            },
            s if s.is_client_error() => SubmitOutcome::Rejected {
                reason: Self::error_reason(response).await,
            },
            // 5xx and anything else unexpected: treat as transient.
            _ => SubmitOutcome::Network {
                reason: Self::error_reason(response).await,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::StaticCredentials;
    use crate::model::ReadingStatus;
    use chrono::{NaiveDate, Utc};
    use uuid::Uuid;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn sample_reading() -> QueuedReading {
        QueuedReading {
            id: Uuid::new_v4(),
            meter_id: "MTR-1".to_string(),
            building_id: "BLD-1".to_string(),
            reading_value: 120.0,
            read_date: NaiveDate::from_ymd_opt(2024, 1, 5).unwrap(),
            remarks: None,
            image: "aGVsbG8=".to_string(),
            created_at: Utc::now(),
            status: ReadingStatus::Pending,
            error: None,
        }
    }

    fn client_for(server: &MockServer, token: &str) -> ReadingClient {
        let config = Config::with_server_url(server.uri());
        ReadingClient::new(config, Arc::new(StaticCredentials::new(token)))
    }

    #[tokio::test]
    async fn test_success_returns_server_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/readings"))
            .and(header("Authorization", "Bearer tok-1"))
            .and(body_partial_json(serde_json::json!({
                "meterId": "MTR-1",
                "readingValue": 120.0,
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "id": "srv-42"
            })))
            .mount(&server)
            .await;

        let outcome = client_for(&server, "tok-1").submit(&sample_reading()).await;
        assert_eq!(
            outcome,
            SubmitOutcome::Submitted {
                server_id: "srv-42".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_unauthorized_is_distinct_from_rejection() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/readings"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "error": "token expired"
            })))
            .mount(&server)
            .await;

        let outcome = client_for(&server, "stale").submit(&sample_reading()).await;
        assert_eq!(
            outcome,
            SubmitOutcome::Unauthorized {
                reason: "token expired".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_validation_failure_maps_to_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/readings"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "message": "image is required"
            })))
            .mount(&server)
            .await;

        let outcome = client_for(&server, "tok").submit(&sample_reading()).await;
        assert_eq!(
            outcome,
            SubmitOutcome::Rejected {
                reason: "image is required".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_server_error_is_transient() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/readings"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let outcome = client_for(&server, "tok").submit(&sample_reading()).await;
        assert!(matches!(outcome, SubmitOutcome::Network { .. }));
    }

    #[tokio::test]
    async fn test_unreachable_host_is_network_failure() {
        // Nothing listens here.
        let config = Config::with_server_url("http://127.0.0.1:1");
        let client = ReadingClient::new(config, Arc::new(StaticCredentials::new("tok")));

        let outcome = client.submit(&sample_reading()).await;
        assert!(matches!(outcome, SubmitOutcome::Network { .. }));
    }

    #[tokio::test]
    async fn test_missing_credential_short_circuits() {
        let server = MockServer::start().await;
        let config = Config::with_server_url(server.uri());
        let creds = StaticCredentials::default();
        let client = ReadingClient::new(config, Arc::new(creds));

        let outcome = client.submit(&sample_reading()).await;
        assert!(matches!(outcome, SubmitOutcome::Unauthorized { .. }));
        // No request should have reached the server.
        assert!(server.received_requests().await.unwrap().is_empty());
    }
}
