use findmylostid_backend::error::ErrorCode;
use findmylostid_backend::services::claim_gate::ClaimSubmission;
use findmylostid_backend::services::payment_initiation::validate_phone;

fn submission() -> ClaimSubmission {
    ClaimSubmission {
        lost_item_id: "L1".to_string(),
        user_id: "U1".to_string(),
        name: "Jane Student".to_string(),
        email: "jane@students.jkuat.ac.ke".to_string(),
        phone: "254712345678".to_string(),
        comments: "Lost near the library".to_string(),
        checkout_request_id: "ws_1".to_string(),
    }
}

#[test]
fn complete_submission_passes_validation() {
    assert!(submission().validate().is_ok());
}

#[test]
fn each_missing_field_is_named() {
    let cases: Vec<(&str, Box<dyn Fn(&mut ClaimSubmission)>)> = vec![
        ("lost_item_id", Box::new(|s| s.lost_item_id.clear())),
        ("user_id", Box::new(|s| s.user_id.clear())),
        ("name", Box::new(|s| s.name.clear())),
        ("email", Box::new(|s| s.email.clear())),
        ("phone", Box::new(|s| s.phone.clear())),
        ("comments", Box::new(|s| s.comments.clear())),
        (
            "checkout_request_id",
            Box::new(|s| s.checkout_request_id.clear()),
        ),
    ];

    for (field, clear) in cases {
        let mut sub = submission();
        clear(&mut sub);
        let err = sub
            .validate()
            .expect_err("missing field should fail validation");
        assert_eq!(err.error_code(), ErrorCode::ValidationError);
        assert!(
            err.user_message().contains(field),
            "message should name '{}', got: {}",
            field,
            err.user_message()
        );
    }
}

#[test]
fn whitespace_only_fields_are_rejected() {
    let mut sub = submission();
    sub.comments = "   \t".to_string();
    assert!(sub.validate().is_err());
}

#[test]
fn claimant_phone_format_is_the_payment_format() {
    // The claim form reuses the payer phone format; both paths must agree.
    assert!(validate_phone("254712345678"));
    assert!(!validate_phone("0712345678"));
}
