//! Business logic services.
//!
//! - `auth` - Registration, login and profile edits
//! - `checkout` - Turning a cart into an order
//! - `payments` - PayPal and VNPay gateways
//! - `reports` - Admin sales report aggregation
//! - `reviews` - Verified-purchase reviews

pub mod auth;
pub mod checkout;
pub mod payments;
pub mod reports;
pub mod reviews;
