//! Status enums for orders, payments and users.

use serde::{Deserialize, Serialize};

/// Lifecycle of an order.
///
/// `Delivered` and `Cancelled` are terminal. Every other status can move to
/// any different status, which mirrors how staff work the order board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "shop.order_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Pending,
    AwaitingPayment,
    Processing,
    InTransit,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    /// All statuses in board order.
    pub const ALL: [Self; 7] = [
        Self::Pending,
        Self::AwaitingPayment,
        Self::Processing,
        Self::InTransit,
        Self::Shipped,
        Self::Delivered,
        Self::Cancelled,
    ];

    /// Status a freshly placed order starts in.
    ///
    /// Cash on delivery can be worked immediately; every other method waits
    /// for the money first.
    #[must_use]
    pub const fn initial_for(method: PaymentMethod) -> Self {
        match method {
            PaymentMethod::Cod => Self::Pending,
            PaymentMethod::Bank | PaymentMethod::Paypal | PaymentMethod::Vnpay => {
                Self::AwaitingPayment
            }
        }
    }

    /// Whether no further transitions are allowed.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Delivered | Self::Cancelled)
    }

    /// Whether an order in this status can move to `next`.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        !self.is_terminal() && self != next
    }

    /// Whether the order's items are still deducted from product stock.
    #[must_use]
    pub const fn holds_stock(self) -> bool {
        !matches!(self, Self::Cancelled)
    }

    /// Whether the customer may still cancel the order themselves.
    #[must_use]
    pub const fn customer_cancellable(self) -> bool {
        matches!(self, Self::Pending | Self::AwaitingPayment)
    }

    /// Human-readable label for messages shown to people.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::AwaitingPayment => "Awaiting payment",
            Self::Processing => "Processing",
            Self::InTransit => "In transit",
            Self::Shipped => "Shipped",
            Self::Delivered => "Delivered",
            Self::Cancelled => "Cancelled",
        }
    }

    /// Wire representation (`snake_case`).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::AwaitingPayment => "awaiting_payment",
            Self::Processing => "processing",
            Self::InTransit => "in_transit",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("invalid order status: {s}"))
    }
}

/// How the customer pays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "shop.payment_method", rename_all = "lowercase")
)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    /// Cash on delivery.
    Cod,
    /// Bank transfer against static instructions.
    Bank,
    /// PayPal hosted checkout.
    Paypal,
    /// VNPay hosted payment page.
    Vnpay,
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cod => write!(f, "cod"),
            Self::Bank => write!(f, "bank"),
            Self::Paypal => write!(f, "paypal"),
            Self::Vnpay => write!(f, "vnpay"),
        }
    }
}

/// Account role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "shop.user_role", rename_all = "lowercase")
)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    /// Shopper.
    #[default]
    Customer,
    /// Store staff with catalogue, order and report access.
    Admin,
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Customer => write!(f, "customer"),
            Self::Admin => write!(f, "admin"),
        }
    }
}

impl std::str::FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "customer" => Ok(Self::Customer),
            "admin" => Ok(Self::Admin),
            _ => Err(format!("invalid user role: {s}")),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_status_by_payment_method() {
        assert_eq!(
            OrderStatus::initial_for(PaymentMethod::Cod),
            OrderStatus::Pending
        );
        assert_eq!(
            OrderStatus::initial_for(PaymentMethod::Bank),
            OrderStatus::AwaitingPayment
        );
        assert_eq!(
            OrderStatus::initial_for(PaymentMethod::Vnpay),
            OrderStatus::AwaitingPayment
        );
    }

    #[test]
    fn test_labels_are_distinct() {
        assert_eq!(OrderStatus::AwaitingPayment.label(), "Awaiting payment");
        let mut labels: Vec<_> = OrderStatus::ALL.iter().map(|s| s.label()).collect();
        labels.sort_unstable();
        labels.dedup();
        assert_eq!(labels.len(), OrderStatus::ALL.len());
    }

    #[test]
    fn test_terminal_statuses_do_not_move() {
        for next in OrderStatus::ALL {
            assert!(!OrderStatus::Delivered.can_transition_to(next));
            assert!(!OrderStatus::Cancelled.can_transition_to(next));
        }
    }

    #[test]
    fn test_open_statuses_move_anywhere_else() {
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Shipped));
        assert!(OrderStatus::Shipped.can_transition_to(OrderStatus::Processing));
        assert!(OrderStatus::InTransit.can_transition_to(OrderStatus::Delivered));
        assert!(!OrderStatus::Processing.can_transition_to(OrderStatus::Processing));
    }

    #[test]
    fn test_only_cancelled_releases_stock() {
        for status in OrderStatus::ALL {
            assert_eq!(status.holds_stock(), status != OrderStatus::Cancelled);
        }
    }

    #[test]
    fn test_status_wire_format() {
        let json = serde_json::to_string(&OrderStatus::AwaitingPayment).unwrap();
        assert_eq!(json, "\"awaiting_payment\"");
        for status in OrderStatus::ALL {
            assert_eq!(status.as_str().parse::<OrderStatus>().unwrap(), status);
        }
        assert!("lost".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn test_payment_method_wire_format() {
        let method: PaymentMethod = serde_json::from_str("\"cod\"").unwrap();
        assert_eq!(method, PaymentMethod::Cod);
        assert_eq!(PaymentMethod::Paypal.to_string(), "paypal");
    }

    #[test]
    fn test_user_role_roundtrip() {
        assert_eq!("admin".parse::<UserRole>().unwrap(), UserRole::Admin);
        assert_eq!(UserRole::default(), UserRole::Customer);
        assert!("root".parse::<UserRole>().is_err());
    }
}
