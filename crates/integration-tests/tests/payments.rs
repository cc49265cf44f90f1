//! VNPay URL signing checked the way the return handler will see it.
//!
//! The signed payment URL is parsed back into query pairs, which must verify
//! under the same secret and fail once any signed value changes.

#![allow(clippy::unwrap_used)]

use chrono::{TimeZone, Utc};
use rust_decimal::Decimal;
use secrecy::SecretString;

use shopfront_api::services::payments::vnpay::{self, PaymentRequest};
use shopfront_core::OrderId;
use shopfront_integration_tests::{sign_vnpay_return, test_vnpay};

fn signed_pairs(amount: Decimal) -> Vec<(String, String)> {
    let config = test_vnpay();
    let url = vnpay::build_payment_url(
        &config,
        &PaymentRequest {
            order_id: OrderId::new(42),
            amount,
            ip_addr: "203.0.113.7",
            return_url: "http://localhost:3000/payment/vnpay-return",
            created_at: Utc.with_ymd_and_hms(2026, 3, 1, 8, 30, 0).unwrap(),
        },
    )
    .unwrap();

    assert!(url.starts_with(&config.payment_url));
    reqwest::Url::parse(&url)
        .unwrap()
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect()
}

fn value<'a>(pairs: &'a [(String, String)], key: &str) -> &'a str {
    pairs
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
        .unwrap()
}

#[test]
fn test_payment_url_verifies_under_merchant_secret() {
    let pairs = signed_pairs(Decimal::new(150_000, 0));

    assert_eq!(value(&pairs, "vnp_Amount"), "15000000");
    assert_eq!(value(&pairs, "vnp_CreateDate"), "20260301083000");
    assert_eq!(value(&pairs, "vnp_TxnRef"), "42_20260301083000");
    assert_eq!(value(&pairs, "vnp_OrderInfo"), "Thanh toan don hang 42");

    let outcome = vnpay::verify_return(&pairs, &test_vnpay().hash_secret);
    assert!(outcome.valid);
    assert_eq!(outcome.order_id, Some(OrderId::new(42)));
    // No response code yet, so not a successful payment.
    assert!(!outcome.success);
}

#[test]
fn test_tampered_amount_fails_verification() {
    let mut pairs = signed_pairs(Decimal::new(150_000, 0));
    for (k, v) in &mut pairs {
        if k == "vnp_Amount" {
            *v = "100".to_string();
        }
    }

    let outcome = vnpay::verify_return(&pairs, &test_vnpay().hash_secret);
    assert!(!outcome.valid);
    assert!(!outcome.success);
}

#[test]
fn test_successful_return_pays_exact_total() {
    let signed = signed_pairs(Decimal::new(150_000, 0));
    let mut params: Vec<(&str, &str)> = signed
        .iter()
        .filter(|(k, _)| k != "vnp_SecureHash")
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .collect();
    params.push(("vnp_ResponseCode", "00"));
    let pairs = sign_vnpay_return(&params, &test_vnpay().hash_secret);

    let outcome = vnpay::verify_return(&pairs, &test_vnpay().hash_secret);
    assert!(outcome.success);
    assert!(outcome.pays_for(Decimal::new(150_000, 0)));
}

#[test]
fn test_underpaid_return_does_not_pay_the_order() {
    let pairs = sign_vnpay_return(
        &[
            ("vnp_Amount", "100"),
            ("vnp_ResponseCode", "00"),
            ("vnp_TxnRef", "42_20260301083000"),
            ("vnp_OrderInfo", "Thanh toan don hang 42"),
        ],
        &test_vnpay().hash_secret,
    );

    let outcome = vnpay::verify_return(&pairs, &test_vnpay().hash_secret);
    // Genuinely signed and successful, but for 1 VND.
    assert!(outcome.valid);
    assert!(outcome.success);
    assert_eq!(outcome.order_id, Some(OrderId::new(42)));
    assert!(!outcome.pays_for(Decimal::new(150_000, 0)));
    assert!(outcome.pays_for(Decimal::ONE));
}

#[test]
fn test_other_secret_fails_verification() {
    let pairs = signed_pairs(Decimal::new(99_000, 0));
    let outcome = vnpay::verify_return(&pairs, &SecretString::from("SOMEONEELSESSECRET"));
    assert!(!outcome.valid);
}

#[test]
fn test_non_positive_amount_is_rejected() {
    let result = vnpay::build_payment_url(
        &test_vnpay(),
        &PaymentRequest {
            order_id: OrderId::new(1),
            amount: Decimal::ZERO,
            ip_addr: "127.0.0.1",
            return_url: "http://localhost:3000/payment/vnpay-return",
            created_at: Utc::now(),
        },
    );
    assert!(result.is_err());
}
