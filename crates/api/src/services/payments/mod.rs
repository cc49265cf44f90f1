//! Payment gateway integrations.
//!
//! - `paypal` - PayPal REST v1 payments (create, execute)
//! - `vnpay` - VNPay hosted payment URL signing and return verification

pub mod paypal;
pub mod vnpay;

use thiserror::Error;

pub use paypal::PayPalClient;

/// Errors from payment gateways.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// The gateway has no credentials configured.
    #[error("{0} is not configured")]
    NotConfigured(&'static str),

    /// The requested amount cannot be charged.
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    /// The request names something the gateway could never accept.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// HTTP request to the gateway failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The gateway answered with an error.
    #[error("gateway error: {0}")]
    Gateway(String),

    /// OAuth token request was refused.
    #[error("gateway authentication failed: {0}")]
    AuthenticationFailed(String),
}
