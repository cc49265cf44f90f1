//! PayPal REST API client (v1 payments).
//!
//! Uses OAuth2 client credentials. The access token is cached in memory and
//! refreshed shortly before it expires.

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::sync::RwLock;
use tracing::{debug, instrument, warn};

use shopfront_core::round_money;

use super::PaymentError;
use crate::config::PayPalConfig;

/// Refresh the token when it has less than this many seconds left.
const TOKEN_REFRESH_MARGIN_SECS: i64 = 60;

const ITEM_NAME: &str = "E-commerce Purchase";
const ITEM_SKU: &str = "item";
const DESCRIPTION: &str = "Payment for e-commerce purchase";

/// PayPal API client.
///
/// Cheap to clone; clones share the HTTP connection pool and token cache.
#[derive(Clone)]
pub struct PayPalClient {
    inner: Arc<PayPalClientInner>,
}

struct PayPalClientInner {
    client: reqwest::Client,
    api_url: String,
    client_id: String,
    client_secret: SecretString,
    /// In-memory token cache
    token: RwLock<Option<CachedToken>>,
}

#[derive(Clone)]
struct CachedToken {
    access_token: SecretString,
    /// Unix timestamp when the token expires.
    expires_at: i64,
}

impl CachedToken {
    fn is_fresh(&self, now: i64) -> bool {
        self.expires_at - now > TOKEN_REFRESH_MARGIN_SECS
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    /// Token lifetime in seconds.
    expires_in: i64,
}

#[derive(Debug, Deserialize)]
struct PaymentLink {
    href: String,
    rel: String,
}

#[derive(Debug, Deserialize)]
struct CreatePaymentResponse {
    id: String,
    #[serde(default)]
    links: Vec<PaymentLink>,
}

#[derive(Serialize)]
struct ExecuteRequest<'a> {
    payer_id: &'a str,
}

/// A payment to create.
#[derive(Debug, Clone)]
pub struct NewPayment<'a> {
    pub amount: Decimal,
    /// ISO 4217 code, e.g. `USD`.
    pub currency: &'a str,
    /// Our order ID, sent as the invoice number.
    pub invoice_number: Option<String>,
    pub return_url: &'a str,
    pub cancel_url: &'a str,
}

/// A created payment awaiting buyer approval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreatedPayment {
    #[serde(rename = "paymentID")]
    pub payment_id: String,
    pub approval_url: String,
}

/// An executed payment as returned by PayPal.
#[derive(Debug, Clone)]
pub struct ExecutedPayment {
    /// `approved`, `failed`, ...
    pub state: Option<String>,
    /// Full PayPal response body.
    pub raw: Value,
}

impl ExecutedPayment {
    /// Whether PayPal reports the sale as approved.
    #[must_use]
    pub fn is_approved(&self) -> bool {
        self.state.as_deref() == Some("approved")
    }

    /// Whether this approved sale covers `total` for the given invoice.
    ///
    /// Compares the first transaction's `amount.total` and `invoice_number`.
    #[must_use]
    pub fn settles(&self, invoice_number: &str, total: Decimal) -> bool {
        let Some(tx) = self.raw.pointer("/transactions/0") else {
            return false;
        };
        let paid = tx
            .pointer("/amount/total")
            .and_then(Value::as_str)
            .and_then(|t| t.parse::<Decimal>().ok());
        let invoice = tx.get("invoice_number").and_then(Value::as_str);

        self.is_approved()
            && invoice == Some(invoice_number)
            && paid.is_some_and(|paid| paid == round_money(total))
    }
}

impl PayPalClient {
    /// Create a new client from configuration.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::Http` if the HTTP client cannot be built.
    pub fn new(config: &PayPalConfig) -> Result<Self, PaymentError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            inner: Arc::new(PayPalClientInner {
                client,
                api_url: config.api_url.clone(),
                client_id: config.client_id.clone(),
                client_secret: config.client_secret.clone(),
                token: RwLock::new(None),
            }),
        })
    }

    /// Create a `sale` payment and return its approval link.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::InvalidAmount` for a non-positive amount or a
    /// malformed currency, and a gateway error if PayPal rejects the request.
    #[instrument(skip(self, payment), fields(amount = %payment.amount, currency = payment.currency))]
    pub async fn create_payment(&self, payment: &NewPayment<'_>) -> Result<CreatedPayment, PaymentError> {
        let body = payment_body(payment)?;
        let token = self.access_token().await?;

        let response = self
            .inner
            .client
            .post(format!("{}/v1/payments/payment", self.inner.api_url))
            .bearer_auth(token.expose_secret())
            .json(&body)
            .send()
            .await?;

        let created: CreatePaymentResponse = parse_response(response).await?;
        let approval_url = approval_url(&created.links)
            .ok_or_else(|| PaymentError::Gateway("payment has no approval_url link".to_string()))?
            .to_string();

        debug!(payment_id = %created.id, "PayPal payment created");
        Ok(CreatedPayment {
            payment_id: created.id,
            approval_url,
        })
    }

    /// Execute an approved payment for the given payer.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::InvalidRequest` for a malformed payment ID and
    /// a gateway error if PayPal rejects the execution.
    #[instrument(skip(self))]
    pub async fn execute_payment(
        &self,
        payment_id: &str,
        payer_id: &str,
    ) -> Result<ExecutedPayment, PaymentError> {
        check_payment_id(payment_id)?;

        let token = self.access_token().await?;

        let response = self
            .inner
            .client
            .post(format!(
                "{}/v1/payments/payment/{payment_id}/execute",
                self.inner.api_url
            ))
            .bearer_auth(token.expose_secret())
            .json(&ExecuteRequest { payer_id })
            .send()
            .await?;

        let raw: Value = parse_response(response).await?;
        let state = raw.get("state").and_then(Value::as_str).map(ToString::to_string);

        Ok(ExecutedPayment { state, raw })
    }

    /// Return a cached token, fetching a new one if needed.
    async fn access_token(&self) -> Result<SecretString, PaymentError> {
        let now = chrono::Utc::now().timestamp();

        {
            let cached = self.inner.token.read().await;
            if let Some(token) = cached.as_ref().filter(|t| t.is_fresh(now)) {
                return Ok(token.access_token.clone());
            }
        }

        let mut cached = self.inner.token.write().await;
        // Another task may have refreshed while we waited for the lock.
        if let Some(token) = cached.as_ref().filter(|t| t.is_fresh(now)) {
            return Ok(token.access_token.clone());
        }

        let token = self.fetch_token(now).await?;
        let access_token = token.access_token.clone();
        *cached = Some(token);
        Ok(access_token)
    }

    #[instrument(skip(self))]
    async fn fetch_token(&self, now: i64) -> Result<CachedToken, PaymentError> {
        let response = self
            .inner
            .client
            .post(format!("{}/v1/oauth2/token", self.inner.api_url))
            .basic_auth(
                &self.inner.client_id,
                Some(self.inner.client_secret.expose_secret()),
            )
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            warn!(%status, "PayPal token request failed");
            return Err(PaymentError::AuthenticationFailed(format!(
                "HTTP {status}: {error_text}"
            )));
        }

        let token: TokenResponse = response.json().await?;
        Ok(CachedToken {
            access_token: SecretString::from(token.access_token),
            expires_at: now + token.expires_in,
        })
    }
}

/// Build the v1 payment request body.
fn payment_body(payment: &NewPayment<'_>) -> Result<Value, PaymentError> {
    if payment.amount <= Decimal::ZERO {
        return Err(PaymentError::InvalidAmount(
            "amount must be greater than zero".to_string(),
        ));
    }
    if payment.currency.len() != 3 || !payment.currency.chars().all(|c| c.is_ascii_uppercase()) {
        return Err(PaymentError::InvalidAmount(format!(
            "unsupported currency '{}'",
            payment.currency
        )));
    }

    let total = format!("{:.2}", round_money(payment.amount));
    let mut transaction = json!({
        "item_list": {
            "items": [{
                "name": ITEM_NAME,
                "sku": ITEM_SKU,
                "price": total,
                "currency": payment.currency,
                "quantity": 1,
            }],
        },
        "amount": {
            "currency": payment.currency,
            "total": total,
        },
        "description": DESCRIPTION,
    });
    if let (Some(invoice), Some(obj)) = (&payment.invoice_number, transaction.as_object_mut()) {
        obj.insert("invoice_number".to_string(), json!(invoice));
    }

    Ok(json!({
        "intent": "sale",
        "payer": { "payment_method": "paypal" },
        "redirect_urls": {
            "return_url": payment.return_url,
            "cancel_url": payment.cancel_url,
        },
        "transactions": [transaction],
    }))
}

/// Payment IDs go into the URL path, so only `[A-Za-z0-9-]` is allowed.
fn check_payment_id(payment_id: &str) -> Result<(), PaymentError> {
    if payment_id.is_empty() || !payment_id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        return Err(PaymentError::InvalidRequest(format!(
            "invalid payment id '{payment_id}'"
        )));
    }
    Ok(())
}

/// The buyer approval link, found by `rel` rather than position.
fn approval_url(links: &[PaymentLink]) -> Option<&str> {
    links
        .iter()
        .find(|l| l.rel == "approval_url")
        .map(|l| l.href.as_str())
}

/// Decode a successful JSON response or turn the error body into a gateway error.
async fn parse_response<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, PaymentError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json().await?);
    }

    let body: Value = response.json().await.unwrap_or(Value::Null);
    let message = body
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or("unknown error");
    let name = body.get("name").and_then(Value::as_str).unwrap_or("ERROR");
    warn!(%status, name, message, "PayPal request failed");
    Err(PaymentError::Gateway(format!("HTTP {status} {name}: {message}")))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn payment(amount: &str) -> NewPayment<'static> {
        NewPayment {
            amount: amount.parse().unwrap(),
            currency: "USD",
            invoice_number: None,
            return_url: "http://localhost:3000/payment/success",
            cancel_url: "http://localhost:3000/payment/cancel",
        }
    }

    #[test]
    fn test_payment_body_shape() {
        let body = payment_body(&payment("31.5")).unwrap();
        assert_eq!(body["intent"], "sale");
        assert_eq!(body["payer"]["payment_method"], "paypal");
        assert_eq!(
            body["redirect_urls"]["return_url"],
            "http://localhost:3000/payment/success"
        );

        let tx = &body["transactions"][0];
        assert_eq!(tx["amount"]["total"], "31.50");
        assert_eq!(tx["amount"]["currency"], "USD");
        assert_eq!(tx["item_list"]["items"][0]["name"], ITEM_NAME);
        assert_eq!(tx["item_list"]["items"][0]["sku"], "item");
        assert_eq!(tx["item_list"]["items"][0]["quantity"], 1);
        assert_eq!(tx["description"], DESCRIPTION);
        assert!(tx.get("invoice_number").is_none());
    }

    #[test]
    fn test_payment_body_carries_invoice_number() {
        let mut p = payment("10");
        p.invoice_number = Some("42".to_string());
        let body = payment_body(&p).unwrap();
        assert_eq!(body["transactions"][0]["invoice_number"], "42");
    }

    #[test]
    fn test_payment_body_validation() {
        assert!(matches!(
            payment_body(&payment("0")),
            Err(PaymentError::InvalidAmount(_))
        ));
        let mut p = payment("10");
        p.currency = "usd";
        assert!(matches!(payment_body(&p), Err(PaymentError::InvalidAmount(_))));
    }

    #[test]
    fn test_approval_url_found_by_rel() {
        let links = vec![
            PaymentLink {
                href: "https://api.sandbox.paypal.com/v1/payments/payment/PAY-1".to_string(),
                rel: "self".to_string(),
            },
            PaymentLink {
                href: "https://api.sandbox.paypal.com/v1/payments/payment/PAY-1/execute"
                    .to_string(),
                rel: "execute".to_string(),
            },
            PaymentLink {
                href: "https://www.sandbox.paypal.com/cgi-bin/webscr?token=EC-1".to_string(),
                rel: "approval_url".to_string(),
            },
        ];
        assert_eq!(
            approval_url(&links),
            Some("https://www.sandbox.paypal.com/cgi-bin/webscr?token=EC-1")
        );
        assert_eq!(approval_url(&links[..2]), None);
    }

    #[test]
    fn test_token_freshness() {
        let token = CachedToken {
            access_token: SecretString::from("A21AA"),
            expires_at: 1_000,
        };
        assert!(token.is_fresh(900));
        assert!(!token.is_fresh(940));
        assert!(!token.is_fresh(1_000));
    }

    #[test]
    fn test_created_payment_wire_names() {
        let created = CreatedPayment {
            payment_id: "PAY-1".to_string(),
            approval_url: "https://paypal.test/approve".to_string(),
        };
        let json = serde_json::to_value(created).unwrap();
        assert_eq!(json["paymentID"], "PAY-1");
        assert_eq!(json["approval_url"], "https://paypal.test/approve");
    }

    #[test]
    fn test_executed_payment_state() {
        let executed = ExecutedPayment {
            state: Some("approved".to_string()),
            raw: json!({ "state": "approved" }),
        };
        assert!(executed.is_approved());
        let failed = ExecutedPayment {
            state: Some("failed".to_string()),
            raw: Value::Null,
        };
        assert!(!failed.is_approved());
    }

    fn executed(state: &str, total: &str, invoice: &str) -> ExecutedPayment {
        ExecutedPayment {
            state: Some(state.to_string()),
            raw: json!({
                "state": state,
                "transactions": [{
                    "amount": { "total": total, "currency": "USD" },
                    "invoice_number": invoice,
                }],
            }),
        }
    }

    #[test]
    fn test_settles_matching_total_and_invoice() {
        let total = Decimal::new(3150, 2);
        assert!(executed("approved", "31.50", "42").settles("42", total));
        assert!(!executed("approved", "1.00", "42").settles("42", total));
        assert!(!executed("approved", "31.50", "41").settles("42", total));
        assert!(!executed("failed", "31.50", "42").settles("42", total));
    }

    #[test]
    fn test_settles_requires_transaction() {
        let bare = ExecutedPayment {
            state: Some("approved".to_string()),
            raw: json!({ "state": "approved" }),
        };
        assert!(!bare.settles("42", Decimal::ONE));
    }

    #[test]
    fn test_malformed_payment_id_is_invalid_request() {
        assert!(check_payment_id("PAY-1AB23456CD789012E").is_ok());
        for bad in ["", "PAY/../admin", "PAY 1", "PAY-1?x=y"] {
            assert!(matches!(
                check_payment_id(bad),
                Err(PaymentError::InvalidRequest(_))
            ));
        }
    }
}
