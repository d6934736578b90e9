use crate::mpesa::error::{GatewayError, GatewayResult};
use crate::mpesa::types::DarajaErrorBody;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use std::time::Duration;
use tracing::warn;

/// Authentication scheme for an outbound gateway request.
pub enum RequestAuth<'a> {
    None,
    Bearer(&'a str),
    Basic { username: &'a str, password: &'a str },
}

#[derive(Clone)]
pub struct GatewayHttpClient {
    client: Client,
    timeout: Duration,
    max_retries: u32,
}

impl GatewayHttpClient {
    pub fn new(timeout: Duration, max_retries: u32) -> GatewayResult<Self> {
        let client =
            Client::builder()
                .timeout(timeout)
                .build()
                .map_err(|e| GatewayError::Network {
                    message: format!("failed to initialize HTTP client: {}", e),
                })?;

        Ok(Self {
            client,
            timeout,
            max_retries,
        })
    }

    pub async fn request_json<T: DeserializeOwned>(
        &self,
        method: reqwest::Method,
        url: &str,
        auth: RequestAuth<'_>,
        body: Option<&JsonValue>,
    ) -> GatewayResult<T> {
        let mut last_error = None;
        for attempt in 0..=self.max_retries {
            let mut request = self.client.request(method.clone(), url);
            request = request.timeout(self.timeout);

            match &auth {
                RequestAuth::None => {}
                RequestAuth::Bearer(token) => request = request.bearer_auth(token),
                RequestAuth::Basic { username, password } => {
                    request = request.basic_auth(username, Some(password))
                }
            }
            if let Some(payload) = body {
                request = request.json(payload);
            }

            let response = request.send().await.map_err(|e| GatewayError::Network {
                message: format!("gateway request failed: {}", e),
            });

            match response {
                Ok(resp) => {
                    let status = resp.status();
                    let text = resp.text().await.unwrap_or_default();
                    if status.is_success() {
                        return serde_json::from_str::<T>(&text).map_err(|e| {
                            GatewayError::Request {
                                message: format!("invalid gateway JSON response: {}", e),
                                provider_code: None,
                                retryable: false,
                            }
                        });
                    }

                    if status.as_u16() == 401 || status.as_u16() == 403 {
                        return Err(GatewayError::Auth {
                            message: format!("HTTP {}: {}", status, text),
                        });
                    }

                    if status.as_u16() == 429 {
                        if attempt < self.max_retries {
                            tokio::time::sleep(Duration::from_secs(1 << attempt)).await;
                            continue;
                        }
                        return Err(GatewayError::RateLimited {
                            message: "gateway rate limit exceeded".to_string(),
                            retry_after_seconds: None,
                        });
                    }

                    // The gateway wraps rejections in a structured error body;
                    // a present errorCode is a definitive verdict, not a
                    // transient condition worth retrying.
                    if let Ok(err_body) = serde_json::from_str::<DarajaErrorBody>(&text) {
                        if let Some(code) = err_body.error_code {
                            return Err(GatewayError::Request {
                                message: err_body
                                    .error_message
                                    .unwrap_or_else(|| format!("HTTP {}", status)),
                                provider_code: Some(code),
                                retryable: false,
                            });
                        }
                    }

                    if status.is_server_error() && attempt < self.max_retries {
                        warn!(
                            status = %status,
                            attempt = attempt + 1,
                            "gateway server error, retrying"
                        );
                        tokio::time::sleep(Duration::from_secs(1 << attempt)).await;
                        continue;
                    }

                    return Err(GatewayError::Request {
                        message: format!("HTTP {}: {}", status, text),
                        provider_code: Some(status.as_u16().to_string()),
                        retryable: status.is_server_error(),
                    });
                }
                Err(e) => {
                    last_error = Some(e);
                    if attempt < self.max_retries {
                        tokio::time::sleep(Duration::from_secs(1 << attempt)).await;
                        continue;
                    }
                }
            }
        }

        Err(last_error.unwrap_or(GatewayError::Network {
            message: "gateway request failed".to_string(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_initializes_with_short_timeout() {
        let client = GatewayHttpClient::new(Duration::from_secs(1), 0);
        assert!(client.is_ok());
    }

    #[test]
    fn error_body_parses_still_processing_shape() {
        let text = r#"{"requestId":"ws_1","errorCode":"500.001.1001","errorMessage":"The transaction is being processed"}"#;
        let body: DarajaErrorBody = serde_json::from_str(text).expect("should parse");
        assert_eq!(body.error_code.as_deref(), Some("500.001.1001"));
    }
}
