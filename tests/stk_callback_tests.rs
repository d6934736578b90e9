use chrono::{TimeZone, Utc};
use findmylostid_backend::mpesa::types::{parse_transaction_timestamp, StkCallbackEnvelope};
use serde_json::json;

fn success_payload() -> serde_json::Value {
    json!({
        "Body": {
            "stkCallback": {
                "MerchantRequestID": "29115-34620561-1",
                "CheckoutRequestID": "ws_1",
                "ResultCode": 0,
                "ResultDesc": "The service request is processed successfully.",
                "CallbackMetadata": {
                    "Item": [
                        {"Name": "Amount", "Value": 300},
                        {"Name": "MpesaReceiptNumber", "Value": "ABC123"},
                        {"Name": "TransactionDate", "Value": 20250115103000i64},
                        {"Name": "PhoneNumber", "Value": 254712345678i64}
                    ]
                }
            }
        }
    })
}

#[test]
fn successful_callback_yields_settlement_fields() {
    let envelope: StkCallbackEnvelope =
        serde_json::from_value(success_payload()).expect("envelope should parse");
    let callback = &envelope.body.stk_callback;

    assert!(callback.is_success());
    assert_eq!(callback.checkout_request_id, "ws_1");

    let fields = callback.extract_fields();
    assert_eq!(fields.receipt_number.as_deref(), Some("ABC123"));
    assert_eq!(fields.phone_number.as_deref(), Some("254712345678"));

    let date = fields
        .transaction_date
        .as_deref()
        .and_then(parse_transaction_timestamp)
        .expect("transaction date should parse");
    assert_eq!(date, Utc.with_ymd_and_hms(2025, 1, 15, 10, 30, 0).unwrap());
}

#[test]
fn failed_callback_carries_result_description() {
    let payload = json!({
        "Body": {
            "stkCallback": {
                "MerchantRequestID": "29115-34620561-2",
                "CheckoutRequestID": "ws_2",
                "ResultCode": 1032,
                "ResultDesc": "Request cancelled by user"
            }
        }
    });

    let envelope: StkCallbackEnvelope =
        serde_json::from_value(payload).expect("envelope should parse");
    let callback = &envelope.body.stk_callback;

    assert!(!callback.is_success());
    assert_eq!(
        callback.result_desc.as_deref(),
        Some("Request cancelled by user")
    );
}

#[test]
fn envelope_without_stk_callback_is_rejected() {
    let payload = json!({"Body": {"other": 1}});
    assert!(serde_json::from_value::<StkCallbackEnvelope>(payload).is_err());

    let payload = json!({"event": "charge.success"});
    assert!(serde_json::from_value::<StkCallbackEnvelope>(payload).is_err());
}

#[test]
fn metadata_with_missing_items_extracts_partially() {
    let payload = json!({
        "Body": {
            "stkCallback": {
                "CheckoutRequestID": "ws_3",
                "ResultCode": 0,
                "ResultDesc": "ok",
                "CallbackMetadata": {
                    "Item": [
                        {"Name": "PhoneNumber", "Value": "254700000001"}
                    ]
                }
            }
        }
    });

    let envelope: StkCallbackEnvelope =
        serde_json::from_value(payload).expect("envelope should parse");
    let fields = envelope.body.stk_callback.extract_fields();

    assert_eq!(fields.phone_number.as_deref(), Some("254700000001"));
    assert!(fields.receipt_number.is_none());
    assert!(fields.transaction_date.is_none());
}

#[test]
fn callback_round_trips_through_serde() {
    let envelope: StkCallbackEnvelope =
        serde_json::from_value(success_payload()).expect("envelope should parse");
    let serialized = serde_json::to_value(&envelope).expect("should serialize");

    assert_eq!(
        serialized["Body"]["stkCallback"]["CheckoutRequestID"],
        "ws_1"
    );
    assert_eq!(serialized["Body"]["stkCallback"]["ResultCode"], 0);
}
