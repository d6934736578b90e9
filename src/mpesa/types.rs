//! Wire types for the Daraja STK push API
//!
//! Field names follow the gateway's PascalCase JSON exactly; everything is
//! deserialized into tagged Rust types so success and failure are structurally
//! distinguishable rather than inferred from field presence.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// OAuth token grant response. `expires_in` arrives as a string ("3599").
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub expires_in: Option<String>,
}

/// Outbound STK push request body.
#[derive(Debug, Clone, Serialize)]
pub struct StkPushRequest {
    #[serde(rename = "BusinessShortCode")]
    pub business_short_code: String,
    #[serde(rename = "Password")]
    pub password: String,
    #[serde(rename = "Timestamp")]
    pub timestamp: String,
    #[serde(rename = "TransactionType")]
    pub transaction_type: String,
    #[serde(rename = "Amount")]
    pub amount: String,
    #[serde(rename = "PartyA")]
    pub party_a: String,
    #[serde(rename = "PartyB")]
    pub party_b: String,
    #[serde(rename = "PhoneNumber")]
    pub phone_number: String,
    #[serde(rename = "CallBackURL")]
    pub callback_url: String,
    #[serde(rename = "AccountReference")]
    pub account_reference: String,
    #[serde(rename = "TransactionDesc")]
    pub transaction_desc: String,
}

/// Gateway acknowledgment of an STK push request.
#[derive(Debug, Clone, Deserialize)]
pub struct StkPushResponse {
    #[serde(rename = "MerchantRequestID")]
    pub merchant_request_id: Option<String>,
    #[serde(rename = "CheckoutRequestID")]
    pub checkout_request_id: String,
    #[serde(rename = "ResponseCode")]
    pub response_code: String,
    #[serde(rename = "ResponseDescription")]
    pub response_description: Option<String>,
    #[serde(rename = "CustomerMessage")]
    pub customer_message: Option<String>,
}

/// Outbound STK status query body.
#[derive(Debug, Clone, Serialize)]
pub struct StkQueryRequest {
    #[serde(rename = "BusinessShortCode")]
    pub business_short_code: String,
    #[serde(rename = "Password")]
    pub password: String,
    #[serde(rename = "Timestamp")]
    pub timestamp: String,
    #[serde(rename = "CheckoutRequestID")]
    pub checkout_request_id: String,
}

/// STK status query response. `ResultCode` is a string here, unlike the
/// numeric code in the asynchronous callback.
#[derive(Debug, Clone, Deserialize)]
pub struct StkQueryResponse {
    #[serde(rename = "MerchantRequestID")]
    pub merchant_request_id: Option<String>,
    #[serde(rename = "CheckoutRequestID")]
    pub checkout_request_id: String,
    #[serde(rename = "ResponseCode")]
    pub response_code: String,
    #[serde(rename = "ResponseDescription")]
    pub response_description: Option<String>,
    #[serde(rename = "ResultCode")]
    pub result_code: String,
    #[serde(rename = "ResultDesc")]
    pub result_desc: Option<String>,
}

impl StkQueryResponse {
    pub fn is_success(&self) -> bool {
        self.result_code == "0"
    }
}

/// Error body the gateway returns on rejected requests.
#[derive(Debug, Clone, Deserialize)]
pub struct DarajaErrorBody {
    #[serde(rename = "requestId")]
    pub request_id: Option<String>,
    #[serde(rename = "errorCode")]
    pub error_code: Option<String>,
    #[serde(rename = "errorMessage")]
    pub error_message: Option<String>,
}

/// Top-level asynchronous callback envelope: `{"Body": {"stkCallback": …}}`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StkCallbackEnvelope {
    #[serde(rename = "Body")]
    pub body: CallbackBody,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CallbackBody {
    #[serde(rename = "stkCallback")]
    pub stk_callback: StkCallback,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StkCallback {
    #[serde(rename = "MerchantRequestID")]
    pub merchant_request_id: Option<String>,
    #[serde(rename = "CheckoutRequestID")]
    pub checkout_request_id: String,
    #[serde(rename = "ResultCode")]
    pub result_code: i64,
    #[serde(rename = "ResultDesc")]
    pub result_desc: Option<String>,
    #[serde(rename = "CallbackMetadata")]
    pub callback_metadata: Option<CallbackMetadata>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CallbackMetadata {
    #[serde(rename = "Item", default)]
    pub item: Vec<MetadataItem>,
}

/// Metadata name/value pair. Values arrive as strings or numbers depending on
/// the field, so they are kept as raw JSON until extraction.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MetadataItem {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Value")]
    pub value: Option<JsonValue>,
}

/// Fields extracted from a successful callback's metadata list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallbackFields {
    pub phone_number: Option<String>,
    pub receipt_number: Option<String>,
    pub transaction_date: Option<String>,
    pub amount: Option<String>,
}

impl StkCallback {
    pub fn is_success(&self) -> bool {
        self.result_code == 0
    }

    /// Walk the metadata item list and pick out the fields the settlement
    /// path needs. Missing items simply stay `None`.
    pub fn extract_fields(&self) -> CallbackFields {
        let mut fields = CallbackFields::default();
        let items = match &self.callback_metadata {
            Some(metadata) => &metadata.item,
            None => return fields,
        };

        for item in items {
            let value = match &item.value {
                Some(v) => stringify_value(v),
                None => continue,
            };
            match item.name.as_str() {
                "PhoneNumber" => fields.phone_number = Some(value),
                "MpesaReceiptNumber" => fields.receipt_number = Some(value),
                "TransactionDate" => fields.transaction_date = Some(value),
                "Amount" => fields.amount = Some(value),
                _ => {}
            }
        }

        fields
    }
}

fn stringify_value(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Parse the gateway's 14-digit `YYYYMMDDHHMMSS` transaction timestamp.
///
/// The gateway does not attach a zone; the value is stored as-is in UTC, which
/// matches how the rest of the system records timestamps.
pub fn parse_transaction_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if raw.len() != 14 || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    NaiveDateTime::parse_from_str(raw, "%Y%m%d%H%M%S")
        .ok()
        .map(|naive| Utc.from_utc_datetime(&naive))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;
    use chrono::Timelike;
    use serde_json::json;

    fn success_envelope() -> JsonValue {
        json!({
            "Body": {
                "stkCallback": {
                    "MerchantRequestID": "29115-34620561-1",
                    "CheckoutRequestID": "ws_CO_191220191020363925",
                    "ResultCode": 0,
                    "ResultDesc": "The service request is processed successfully.",
                    "CallbackMetadata": {
                        "Item": [
                            {"Name": "Amount", "Value": 300.0},
                            {"Name": "MpesaReceiptNumber", "Value": "NLJ7RT61SV"},
                            {"Name": "TransactionDate", "Value": 20250115103000i64},
                            {"Name": "PhoneNumber", "Value": 254712345678i64}
                        ]
                    }
                }
            }
        })
    }

    #[test]
    fn success_callback_deserializes() {
        let envelope: StkCallbackEnvelope =
            serde_json::from_value(success_envelope()).expect("envelope should parse");
        let callback = &envelope.body.stk_callback;
        assert!(callback.is_success());
        assert_eq!(callback.checkout_request_id, "ws_CO_191220191020363925");
    }

    #[test]
    fn metadata_extraction_handles_numeric_values() {
        let envelope: StkCallbackEnvelope =
            serde_json::from_value(success_envelope()).expect("envelope should parse");
        let fields = envelope.body.stk_callback.extract_fields();

        assert_eq!(fields.receipt_number.as_deref(), Some("NLJ7RT61SV"));
        assert_eq!(fields.phone_number.as_deref(), Some("254712345678"));
        assert_eq!(fields.transaction_date.as_deref(), Some("20250115103000"));
    }

    #[test]
    fn failure_callback_has_no_metadata() {
        let payload = json!({
            "Body": {
                "stkCallback": {
                    "MerchantRequestID": "29115-34620561-1",
                    "CheckoutRequestID": "ws_CO_1",
                    "ResultCode": 1032,
                    "ResultDesc": "Request cancelled by user"
                }
            }
        });
        let envelope: StkCallbackEnvelope =
            serde_json::from_value(payload).expect("envelope should parse");
        let callback = &envelope.body.stk_callback;
        assert!(!callback.is_success());
        assert_eq!(callback.extract_fields(), CallbackFields::default());
    }

    #[test]
    fn malformed_envelope_is_rejected() {
        let payload = json!({"Body": {"unexpected": true}});
        assert!(serde_json::from_value::<StkCallbackEnvelope>(payload).is_err());
    }

    #[test]
    fn transaction_timestamp_parses() {
        let parsed = parse_transaction_timestamp("20250115103000").expect("should parse");
        assert_eq!(parsed.year(), 2025);
        assert_eq!(parsed.month(), 1);
        assert_eq!(parsed.day(), 15);
        assert_eq!(parsed.hour(), 10);
        assert_eq!(parsed.minute(), 30);
        assert_eq!(parsed.second(), 0);
    }

    #[test]
    fn bad_timestamps_are_rejected() {
        assert!(parse_transaction_timestamp("2025011510").is_none());
        assert!(parse_transaction_timestamp("2025-01-15T10:30").is_none());
        assert!(parse_transaction_timestamp("20251315103000").is_none());
    }
}
