//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::{ApiConfig, VnpayConfig};
use crate::services::payments::{PayPalClient, PaymentError};

/// Application state shared across all handlers.
///
/// Cheaply cloneable via `Arc`.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ApiConfig,
    pool: PgPool,
    paypal: Option<PayPalClient>,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Errors
    ///
    /// Returns an error if the PayPal HTTP client cannot be built.
    pub fn new(config: ApiConfig, pool: PgPool) -> Result<Self, PaymentError> {
        let paypal = config.paypal.as_ref().map(PayPalClient::new).transpose()?;

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                paypal,
            }),
        })
    }

    #[must_use]
    pub fn config(&self) -> &ApiConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// The PayPal client.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::NotConfigured` when PayPal credentials are absent.
    pub fn paypal(&self) -> Result<&PayPalClient, PaymentError> {
        self.inner
            .paypal
            .as_ref()
            .ok_or(PaymentError::NotConfigured("PayPal"))
    }

    /// VNPay merchant settings.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::NotConfigured` when VNPay settings are absent.
    pub fn vnpay(&self) -> Result<&VnpayConfig, PaymentError> {
        self.inner
            .config
            .vnpay
            .as_ref()
            .ok_or(PaymentError::NotConfigured("VNPay"))
    }
}
