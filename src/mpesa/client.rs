use crate::mpesa::error::{GatewayError, GatewayResult};
use crate::mpesa::types::{
    StkPushRequest, StkPushResponse, StkQueryRequest, StkQueryResponse, TokenResponse,
};
use crate::mpesa::utils::{GatewayHttpClient, RequestAuth};
use base64::Engine;
use bigdecimal::BigDecimal;
use chrono::Utc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Safety margin subtracted from the gateway-reported token lifetime so a
/// token is never used at the edge of expiry.
const TOKEN_EXPIRY_MARGIN_SECS: u64 = 60;

const DEFAULT_TOKEN_TTL_SECS: u64 = 3600;

#[derive(Debug, Clone)]
pub struct DarajaConfig {
    pub shortcode: String,
    pub passkey: String,
    pub consumer_key: String,
    pub consumer_secret: String,
    pub callback_url: String,
    pub base_url: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

impl Default for DarajaConfig {
    fn default() -> Self {
        Self {
            shortcode: String::new(),
            passkey: String::new(),
            consumer_key: String::new(),
            consumer_secret: String::new(),
            callback_url: String::new(),
            base_url: "https://sandbox.safaricom.co.ke".to_string(),
            timeout_secs: 30,
            max_retries: 3,
        }
    }
}

impl DarajaConfig {
    pub fn from_env() -> GatewayResult<Self> {
        let shortcode = std::env::var("MPESA_SHORTCODE").unwrap_or_default();
        let passkey = std::env::var("MPESA_PASSKEY").unwrap_or_default();
        let consumer_key = std::env::var("MPESA_CONSUMER_KEY").unwrap_or_default();
        let consumer_secret = std::env::var("MPESA_CONSUMER_SECRET").unwrap_or_default();
        let callback_url = std::env::var("MPESA_CALLBACK_URL").unwrap_or_default();

        if shortcode.is_empty()
            || passkey.is_empty()
            || consumer_key.is_empty()
            || consumer_secret.is_empty()
            || callback_url.is_empty()
        {
            return Err(GatewayError::Validation {
                message: "MPESA_SHORTCODE, MPESA_PASSKEY, MPESA_CONSUMER_KEY, \
                          MPESA_CONSUMER_SECRET and MPESA_CALLBACK_URL are required"
                    .to_string(),
                field: Some("mpesa".to_string()),
            });
        }

        Ok(Self {
            shortcode,
            passkey,
            consumer_key,
            consumer_secret,
            callback_url,
            base_url: std::env::var("MPESA_BASE_URL")
                .unwrap_or_else(|_| "https://sandbox.safaricom.co.ke".to_string()),
            timeout_secs: std::env::var("MPESA_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(30),
            max_retries: std::env::var("MPESA_MAX_RETRIES")
                .ok()
                .and_then(|v| v.parse::<u32>().ok())
                .unwrap_or(3),
        })
    }
}

/// Arguments for an STK push.
#[derive(Debug, Clone)]
pub struct StkPushArgs {
    pub phone: String,
    pub amount: BigDecimal,
    pub account_reference: String,
    pub description: String,
}

/// Gateway acknowledgment of an accepted push request.
#[derive(Debug, Clone)]
pub struct StkAcknowledgement {
    pub merchant_request_id: Option<String>,
    pub checkout_request_id: String,
    pub customer_message: Option<String>,
}

struct CachedToken {
    token: String,
    expires_at: Instant,
}

impl CachedToken {
    fn is_valid(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

/// Daraja API client.
///
/// Bearer tokens are cached in-process for their gateway-reported lifetime
/// (minus a margin) and invalidated explicitly when the gateway rejects one.
pub struct DarajaClient {
    config: DarajaConfig,
    http: GatewayHttpClient,
    token: RwLock<Option<CachedToken>>,
}

impl DarajaClient {
    pub fn new(config: DarajaConfig) -> GatewayResult<Self> {
        let http =
            GatewayHttpClient::new(Duration::from_secs(config.timeout_secs), config.max_retries)?;
        Ok(Self {
            config,
            http,
            token: RwLock::new(None),
        })
    }

    pub fn from_env() -> GatewayResult<Self> {
        Self::new(DarajaConfig::from_env()?)
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }

    /// Compute the STK password: `base64(shortcode + passkey + timestamp)`.
    pub fn stk_password(shortcode: &str, passkey: &str, timestamp: &str) -> String {
        base64::engine::general_purpose::STANDARD
            .encode(format!("{}{}{}", shortcode, passkey, timestamp))
    }

    fn password_and_timestamp(&self) -> (String, String) {
        let timestamp = Utc::now().format("%Y%m%d%H%M%S").to_string();
        let password = Self::stk_password(&self.config.shortcode, &self.config.passkey, &timestamp);
        (password, timestamp)
    }

    /// Return a valid bearer token, fetching a fresh one when the cached
    /// token is absent or past its expiry margin.
    pub async fn bearer_token(&self) -> GatewayResult<String> {
        {
            let cached = self.token.read().await;
            if let Some(token) = cached.as_ref() {
                if token.is_valid() {
                    return Ok(token.token.clone());
                }
            }
        }

        let mut cached = self.token.write().await;
        // Another task may have refreshed while we waited on the lock.
        if let Some(token) = cached.as_ref() {
            if token.is_valid() {
                return Ok(token.token.clone());
            }
        }

        let response: TokenResponse = self
            .http
            .request_json(
                reqwest::Method::GET,
                &self.endpoint("/oauth/v1/generate?grant_type=client_credentials"),
                RequestAuth::Basic {
                    username: &self.config.consumer_key,
                    password: &self.config.consumer_secret,
                },
                None,
            )
            .await
            .map_err(|e| match e {
                GatewayError::Auth { message } => GatewayError::Auth { message },
                other => GatewayError::Auth {
                    message: format!("token acquisition failed: {}", other),
                },
            })?;

        let ttl = response
            .expires_in
            .as_deref()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TOKEN_TTL_SECS)
            .saturating_sub(TOKEN_EXPIRY_MARGIN_SECS)
            .max(1);

        debug!(ttl_secs = ttl, "gateway token refreshed");
        let token = response.access_token.clone();
        *cached = Some(CachedToken {
            token: response.access_token,
            expires_at: Instant::now() + Duration::from_secs(ttl),
        });

        Ok(token)
    }

    /// Drop the cached token so the next call fetches a fresh one.
    pub async fn invalidate_token(&self) {
        let mut cached = self.token.write().await;
        *cached = None;
    }

    /// Issue an STK push request to the payer's handset.
    pub async fn stk_push(&self, args: &StkPushArgs) -> GatewayResult<StkAcknowledgement> {
        let (password, timestamp) = self.password_and_timestamp();
        let request = StkPushRequest {
            business_short_code: self.config.shortcode.clone(),
            password,
            timestamp,
            transaction_type: "CustomerPayBillOnline".to_string(),
            amount: args.amount.with_scale(0).to_string(),
            party_a: args.phone.clone(),
            party_b: self.config.shortcode.clone(),
            phone_number: args.phone.clone(),
            callback_url: self.config.callback_url.clone(),
            account_reference: args.account_reference.clone(),
            transaction_desc: args.description.clone(),
        };
        let payload = serde_json::to_value(&request).map_err(|e| GatewayError::Request {
            message: format!("failed to serialize push request: {}", e),
            provider_code: None,
            retryable: false,
        })?;

        let response = self.post_authorized::<StkPushResponse>(
            "/mpesa/stkpush/v1/processrequest",
            &payload,
        )
        .await?;

        if response.response_code != "0" {
            return Err(GatewayError::Request {
                message: response
                    .response_description
                    .unwrap_or_else(|| "push request rejected".to_string()),
                provider_code: Some(response.response_code),
                retryable: false,
            });
        }

        info!(
            checkout_request_id = %response.checkout_request_id,
            "STK push accepted by gateway"
        );

        Ok(StkAcknowledgement {
            merchant_request_id: response.merchant_request_id,
            checkout_request_id: response.checkout_request_id,
            customer_message: response.customer_message,
        })
    }

    /// Query the gateway for the settlement state of a previously issued push.
    ///
    /// While the push is still in flight the gateway answers with an error
    /// body carrying the still-processing code; callers should check
    /// [`GatewayError::is_still_processing`] before treating the error as
    /// terminal.
    pub async fn query_stk_status(
        &self,
        checkout_request_id: &str,
    ) -> GatewayResult<StkQueryResponse> {
        let (password, timestamp) = self.password_and_timestamp();
        let request = StkQueryRequest {
            business_short_code: self.config.shortcode.clone(),
            password,
            timestamp,
            checkout_request_id: checkout_request_id.to_string(),
        };
        let payload = serde_json::to_value(&request).map_err(|e| GatewayError::Request {
            message: format!("failed to serialize query request: {}", e),
            provider_code: None,
            retryable: false,
        })?;

        self.post_authorized("/mpesa/stkpushquery/v1/query", &payload)
            .await
    }

    /// POST with bearer auth; an auth rejection invalidates the cached token
    /// and the request is re-attempted once with a fresh one.
    async fn post_authorized<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        payload: &serde_json::Value,
    ) -> GatewayResult<T> {
        let token = self.bearer_token().await?;
        let result = self
            .http
            .request_json(
                reqwest::Method::POST,
                &self.endpoint(path),
                RequestAuth::Bearer(&token),
                Some(payload),
            )
            .await;

        match result {
            Err(GatewayError::Auth { message }) => {
                warn!(path = path, "gateway rejected bearer token, refreshing");
                self.invalidate_token().await;
                let token = self.bearer_token().await?;
                self.http
                    .request_json(
                        reqwest::Method::POST,
                        &self.endpoint(path),
                        RequestAuth::Bearer(&token),
                        Some(payload),
                    )
                    .await
                    .map_err(|e| match e {
                        GatewayError::Auth { .. } => GatewayError::Auth { message },
                        other => other,
                    })
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn config() -> DarajaConfig {
        DarajaConfig {
            shortcode: "174379".to_string(),
            passkey: "testpasskey".to_string(),
            consumer_key: "key".to_string(),
            consumer_secret: "secret".to_string(),
            callback_url: "https://example.com/api/payments/callback".to_string(),
            base_url: "https://sandbox.safaricom.co.ke".to_string(),
            timeout_secs: 5,
            max_retries: 1,
        }
    }

    #[test]
    fn stk_password_matches_known_encoding() {
        let password = DarajaClient::stk_password("174379", "passkey", "20250115103000");
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(password)
            .expect("should decode");
        assert_eq!(decoded, b"174379passkey20250115103000");
    }

    #[test]
    fn endpoint_joins_base_url() {
        let client = DarajaClient::new(config()).expect("client init should succeed");
        assert_eq!(
            client.endpoint("/mpesa/stkpush/v1/processrequest"),
            "https://sandbox.safaricom.co.ke/mpesa/stkpush/v1/processrequest"
        );
    }

    #[test]
    fn amount_is_sent_as_whole_units() {
        let amount = BigDecimal::from_str("300.00").expect("valid decimal");
        assert_eq!(amount.with_scale(0).to_string(), "300");
    }

    #[tokio::test]
    async fn invalidate_clears_cached_token() {
        let client = DarajaClient::new(config()).expect("client init should succeed");
        {
            let mut cached = client.token.write().await;
            *cached = Some(CachedToken {
                token: "tok".to_string(),
                expires_at: Instant::now() + Duration::from_secs(60),
            });
        }
        client.invalidate_token().await;
        assert!(client.token.read().await.is_none());
    }

    #[tokio::test]
    async fn expired_cached_token_is_not_reused() {
        let client = DarajaClient::new(config()).expect("client init should succeed");
        {
            let mut cached = client.token.write().await;
            *cached = Some(CachedToken {
                token: "tok".to_string(),
                expires_at: Instant::now() - Duration::from_secs(1),
            });
        }
        let cached = client.token.read().await;
        assert!(!cached.as_ref().unwrap().is_valid());
    }
}
