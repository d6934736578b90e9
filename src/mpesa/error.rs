use thiserror::Error;

pub type GatewayResult<T> = Result<T, GatewayError>;

/// Daraja gateway processing result code for an STK request that has not
/// reached a terminal state yet.
pub const STILL_PROCESSING_CODE: &str = "500.001.1001";

#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    #[error("Validation error: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    #[error("Gateway authentication failed: {message}")]
    Auth { message: String },

    #[error("Gateway rejected request: {message}")]
    Request {
        message: String,
        provider_code: Option<String>,
        retryable: bool,
    },

    #[error("Network error: {message}")]
    Network { message: String },

    #[error("Rate limit exceeded: {message}")]
    RateLimited {
        message: String,
        retry_after_seconds: Option<u64>,
    },
}

impl GatewayError {
    pub fn is_retryable(&self) -> bool {
        match self {
            GatewayError::Validation { .. } => false,
            GatewayError::Auth { .. } => false,
            GatewayError::Request { retryable, .. } => *retryable,
            GatewayError::Network { .. } => true,
            GatewayError::RateLimited { .. } => true,
        }
    }

    pub fn http_status_code(&self) -> u16 {
        match self {
            GatewayError::Validation { .. } => 400,
            GatewayError::Auth { .. } => 502,
            GatewayError::Request { .. } => 502,
            GatewayError::Network { .. } => 503,
            GatewayError::RateLimited { .. } => 429,
        }
    }

    /// The STK query endpoint reports an in-flight push as an error with a
    /// dedicated code; the reconciler must treat it as "not settled yet",
    /// not as a failure.
    pub fn is_still_processing(&self) -> bool {
        matches!(
            self,
            GatewayError::Request {
                provider_code: Some(code),
                ..
            } if code == STILL_PROCESSING_CODE
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_flags_are_set() {
        assert!(GatewayError::Network {
            message: "timeout".to_string()
        }
        .is_retryable());
        assert!(!GatewayError::Auth {
            message: "bad credentials".to_string()
        }
        .is_retryable());
    }

    #[test]
    fn still_processing_is_detected() {
        let err = GatewayError::Request {
            message: "The transaction is being processed".to_string(),
            provider_code: Some(STILL_PROCESSING_CODE.to_string()),
            retryable: false,
        };
        assert!(err.is_still_processing());

        let err = GatewayError::Request {
            message: "rejected".to_string(),
            provider_code: Some("400.002.02".to_string()),
            retryable: false,
        };
        assert!(!err.is_still_processing());
    }

    #[test]
    fn error_http_status_mapping_is_correct() {
        assert_eq!(
            GatewayError::Validation {
                message: "bad".to_string(),
                field: None
            }
            .http_status_code(),
            400
        );
        assert_eq!(
            GatewayError::RateLimited {
                message: "limited".to_string(),
                retry_after_seconds: Some(30)
            }
            .http_status_code(),
            429
        );
    }
}
