//! VNPay payment URL signing.
//!
//! Parameters are sorted by key, each value is form-urlencoded (space becomes
//! `+`), and the `k=v&...` string is signed with HMAC-SHA512 under the
//! merchant hash secret. The same string is used as the URL query.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use sha2::Sha512;
use url::form_urlencoded;

use shopfront_core::{OrderId, to_minor_units};

use super::PaymentError;
use crate::config::VnpayConfig;

type HmacSha512 = Hmac<Sha512>;

/// API version sent as `vnp_Version`.
pub const VERSION: &str = "2.1.0";
/// Response code VNPay uses for a successful payment.
pub const SUCCESS_CODE: &str = "00";

const SECURE_HASH: &str = "vnp_SecureHash";
const SECURE_HASH_TYPE: &str = "vnp_SecureHashType";

/// A request for a hosted payment page.
#[derive(Debug, Clone)]
pub struct PaymentRequest<'a> {
    pub order_id: OrderId,
    /// Amount in VND.
    pub amount: Decimal,
    /// Customer IP as reported to VNPay.
    pub ip_addr: &'a str,
    /// Where VNPay sends the customer afterwards.
    pub return_url: &'a str,
    pub created_at: DateTime<Utc>,
}

/// Outcome of checking a return redirect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReturnVerification {
    /// Signature matched.
    pub valid: bool,
    /// Signature matched and VNPay reported success.
    pub success: bool,
    /// Order named by the transaction reference, if it parses.
    pub order_id: Option<OrderId>,
    pub response_code: Option<String>,
    /// `vnp_Amount` as signed, in minor units.
    #[serde(skip)]
    pub amount: Option<i64>,
}

impl ReturnVerification {
    /// Whether this return settles an order totalling `total`.
    ///
    /// Requires a successful, correctly signed return whose amount matches
    /// the total exactly.
    #[must_use]
    pub fn pays_for(&self, total: Decimal) -> bool {
        self.success
            && self
                .amount
                .is_some_and(|paid| to_minor_units(total).is_ok_and(|due| due == paid))
    }
}

/// `yyyyMMddHHmmss` in UTC.
#[must_use]
pub fn format_create_date(at: DateTime<Utc>) -> String {
    at.format("%Y%m%d%H%M%S").to_string()
}

/// Build the signed payment URL for `request`.
///
/// # Errors
///
/// Returns `PaymentError::InvalidAmount` if the amount is not positive.
pub fn build_payment_url(
    config: &VnpayConfig,
    request: &PaymentRequest<'_>,
) -> Result<String, PaymentError> {
    let amount =
        to_minor_units(request.amount).map_err(|e| PaymentError::InvalidAmount(e.to_string()))?;
    let create_date = format_create_date(request.created_at);

    let mut params = BTreeMap::new();
    params.insert("vnp_Version", VERSION.to_string());
    params.insert("vnp_Command", "pay".to_string());
    params.insert("vnp_TmnCode", config.tmn_code.clone());
    params.insert("vnp_Locale", "vn".to_string());
    params.insert("vnp_CurrCode", "VND".to_string());
    params.insert("vnp_TxnRef", format!("{}_{create_date}", request.order_id));
    params.insert(
        "vnp_OrderInfo",
        format!("Thanh toan don hang {}", request.order_id),
    );
    params.insert("vnp_OrderType", "other".to_string());
    params.insert("vnp_Amount", amount.to_string());
    params.insert("vnp_ReturnUrl", request.return_url.to_string());
    params.insert("vnp_IpAddr", request.ip_addr.to_string());
    params.insert("vnp_CreateDate", create_date);

    let query = sign_data(params.iter().map(|(k, v)| (*k, v.as_str())));
    let hash = sign(&query, &config.hash_secret)?;

    Ok(format!(
        "{}?{query}&{SECURE_HASH}={hash}",
        config.payment_url
    ))
}

/// Verify the query parameters VNPay appends to the return URL.
///
/// Every `vnp_` parameter except the hash fields takes part in the
/// signature; other parameters are ignored.
#[must_use]
pub fn verify_return(params: &[(String, String)], hash_secret: &SecretString) -> ReturnVerification {
    let mut signed: BTreeMap<&str, &str> = BTreeMap::new();
    let mut provided = None;
    for (k, v) in params {
        match k.as_str() {
            SECURE_HASH => provided = Some(v.as_str()),
            SECURE_HASH_TYPE => {}
            key if key.starts_with("vnp_") => {
                signed.insert(key, v.as_str());
            }
            _ => {}
        }
    }

    let valid = provided.is_some_and(|hash| {
        let data = sign_data(signed.iter().map(|(k, v)| (*k, *v)));
        verify(&data, hash, hash_secret)
    });

    let response_code = signed.get("vnp_ResponseCode").map(|c| (*c).to_string());
    let order_id = signed
        .get("vnp_TxnRef")
        .and_then(|r| r.split('_').next())
        .and_then(|id| id.parse::<OrderId>().ok());
    let amount = signed
        .get("vnp_Amount")
        .and_then(|a| a.parse::<i64>().ok());

    ReturnVerification {
        valid,
        success: valid && response_code.as_deref() == Some(SUCCESS_CODE),
        order_id,
        response_code,
        amount,
    }
}

/// Join already-sorted pairs as `k=v&...` with form-urlencoded values.
fn sign_data<'a>(pairs: impl Iterator<Item = (&'a str, &'a str)>) -> String {
    pairs
        .map(|(k, v)| {
            let value: String = form_urlencoded::byte_serialize(v.as_bytes()).collect();
            format!("{k}={value}")
        })
        .collect::<Vec<_>>()
        .join("&")
}

/// Lowercase hex HMAC-SHA512 of `data`.
fn sign(data: &str, secret: &SecretString) -> Result<String, PaymentError> {
    let mut mac = HmacSha512::new_from_slice(secret.expose_secret().as_bytes())
        .map_err(|e| PaymentError::Gateway(format!("invalid VNPay hash secret: {e}")))?;
    mac.update(data.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Constant-time check of a hex signature (either case).
fn verify(data: &str, provided_hex: &str, secret: &SecretString) -> bool {
    let Ok(provided) = hex::decode(provided_hex) else {
        return false;
    };
    let Ok(mut mac) = HmacSha512::new_from_slice(secret.expose_secret().as_bytes()) else {
        return false;
    };
    mac.update(data.as_bytes());
    mac.verify_slice(&provided).is_ok()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn config() -> VnpayConfig {
        VnpayConfig {
            tmn_code: "DEMO1234".to_string(),
            hash_secret: SecretString::from("TESTHASHSECRETKEY"),
            payment_url: "https://sandbox.vnpayment.vn/paymentv2/vpcpay.html".to_string(),
        }
    }

    fn request(return_url: &str) -> PaymentRequest<'_> {
        PaymentRequest {
            order_id: OrderId::new(42),
            amount: Decimal::new(150_000, 0),
            ip_addr: "203.0.113.9",
            return_url,
            created_at: Utc.with_ymd_and_hms(2026, 3, 1, 8, 5, 9).unwrap(),
        }
    }

    /// Split a built URL back into query pairs.
    fn query_pairs(url: &str) -> Vec<(String, String)> {
        let parsed = url::Url::parse(url).unwrap();
        parsed.query_pairs().into_owned().collect()
    }

    #[test]
    fn test_create_date_format() {
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 8, 5, 9).unwrap();
        assert_eq!(format_create_date(at), "20260301080509");
    }

    #[test]
    fn test_payment_url_params() {
        let url = build_payment_url(&config(), &request("http://localhost:3000/payment/vnpay-return"))
            .unwrap();
        assert!(url.starts_with("https://sandbox.vnpayment.vn/paymentv2/vpcpay.html?vnp_Amount=15000000&"));

        let pairs: BTreeMap<String, String> = query_pairs(&url).into_iter().collect();
        assert_eq!(pairs["vnp_Version"], "2.1.0");
        assert_eq!(pairs["vnp_Command"], "pay");
        assert_eq!(pairs["vnp_TmnCode"], "DEMO1234");
        assert_eq!(pairs["vnp_TxnRef"], "42_20260301080509");
        assert_eq!(pairs["vnp_OrderInfo"], "Thanh toan don hang 42");
        assert_eq!(pairs["vnp_CreateDate"], "20260301080509");
        assert_eq!(pairs["vnp_IpAddr"], "203.0.113.9");
        assert_eq!(pairs["vnp_SecureHash"].len(), 128);
    }

    #[test]
    fn test_values_are_form_encoded_in_signature() {
        let url = build_payment_url(&config(), &request("http://localhost:3000/payment/vnpay-return"))
            .unwrap();
        assert!(url.contains("vnp_OrderInfo=Thanh+toan+don+hang+42"));
        assert!(url.contains("vnp_ReturnUrl=http%3A%2F%2Flocalhost%3A3000%2Fpayment%2Fvnpay-return"));
    }

    #[test]
    fn test_keys_are_sorted() {
        let url = build_payment_url(&config(), &request("http://localhost/r")).unwrap();
        let keys: Vec<String> = query_pairs(&url).into_iter().map(|(k, _)| k).collect();
        let mut sorted = keys[..keys.len() - 1].to_vec();
        sorted.sort();
        assert_eq!(keys[..keys.len() - 1], sorted[..]);
        assert_eq!(keys.last().unwrap(), "vnp_SecureHash");
    }

    #[test]
    fn test_rejects_non_positive_amount() {
        let mut req = request("http://localhost/r");
        req.amount = Decimal::ZERO;
        assert!(matches!(
            build_payment_url(&config(), &req),
            Err(PaymentError::InvalidAmount(_))
        ));
    }

    #[test]
    fn test_own_url_verifies() {
        let url = build_payment_url(&config(), &request("http://localhost/r")).unwrap();
        let mut pairs = query_pairs(&url);
        pairs.push(("vnp_SecureHashType".to_string(), "HmacSHA512".to_string()));

        let result = verify_return(&pairs, &config().hash_secret);
        assert!(result.valid);
        assert_eq!(result.order_id, Some(OrderId::new(42)));
        // No response code in a request URL.
        assert!(!result.success);
    }

    #[test]
    fn test_return_with_success_code() {
        let secret = config().hash_secret;
        let mut pairs = vec![
            ("vnp_Amount".to_string(), "15000000".to_string()),
            ("vnp_ResponseCode".to_string(), "00".to_string()),
            ("vnp_TxnRef".to_string(), "42_20260301080509".to_string()),
            ("vnp_OrderInfo".to_string(), "Thanh toan don hang 42".to_string()),
        ];
        let mut sorted: Vec<(&str, &str)> =
            pairs.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
        sorted.sort_unstable();
        let hash = sign(&sign_data(sorted.into_iter()), &secret)
            .unwrap()
            .to_uppercase();
        pairs.push(("vnp_SecureHash".to_string(), hash));
        pairs.push(("utm_source".to_string(), "ignored".to_string()));

        let result = verify_return(&pairs, &secret);
        assert!(result.valid);
        assert!(result.success);
        assert_eq!(result.response_code.as_deref(), Some("00"));
        assert_eq!(result.amount, Some(15_000_000));
        assert!(result.pays_for(Decimal::new(150_000, 0)));
    }

    /// A correctly signed success return for `amount` minor units.
    fn signed_success(amount: &str) -> ReturnVerification {
        let secret = config().hash_secret;
        let mut pairs = vec![
            ("vnp_Amount".to_string(), amount.to_string()),
            ("vnp_ResponseCode".to_string(), "00".to_string()),
            ("vnp_TxnRef".to_string(), "42_20260301080509".to_string()),
        ];
        let mut sorted: Vec<(&str, &str)> =
            pairs.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
        sorted.sort_unstable();
        let hash = sign(&sign_data(sorted.into_iter()), &secret).unwrap();
        pairs.push(("vnp_SecureHash".to_string(), hash));
        verify_return(&pairs, &secret)
    }

    #[test]
    fn test_underpaid_return_does_not_pay_order() {
        let result = signed_success("100");
        assert!(result.success);
        assert!(!result.pays_for(Decimal::new(150_000, 0)));
    }

    #[test]
    fn test_overpaid_return_does_not_pay_order() {
        let result = signed_success("30000000");
        assert!(!result.pays_for(Decimal::new(150_000, 0)));
    }

    #[test]
    fn test_unparseable_amount_does_not_pay_order() {
        let result = signed_success("abc");
        assert!(result.success);
        assert_eq!(result.amount, None);
        assert!(!result.pays_for(Decimal::new(150_000, 0)));
    }

    #[test]
    fn test_failed_return_does_not_pay_order() {
        let url = build_payment_url(&config(), &request("http://localhost/r")).unwrap();
        let result = verify_return(&query_pairs(&url), &config().hash_secret);
        assert_eq!(result.amount, Some(15_000_000));
        assert!(!result.pays_for(Decimal::new(150_000, 0)));
    }

    #[test]
    fn test_tampered_return_is_invalid() {
        let url = build_payment_url(&config(), &request("http://localhost/r")).unwrap();
        let pairs: Vec<(String, String)> = query_pairs(&url)
            .into_iter()
            .map(|(k, v)| {
                if k == "vnp_Amount" {
                    (k, "100".to_string())
                } else {
                    (k, v)
                }
            })
            .collect();
        assert!(!verify_return(&pairs, &config().hash_secret).valid);
    }

    #[test]
    fn test_missing_hash_is_invalid() {
        let pairs = vec![("vnp_ResponseCode".to_string(), "00".to_string())];
        let result = verify_return(&pairs, &config().hash_secret);
        assert!(!result.valid);
        assert!(!result.success);
    }
}
