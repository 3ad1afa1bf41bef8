//! Status enums reported by the commerce API.
//!
//! The backend uses lowercase snake case. Values this storefront does not
//! know about deserialize to `Unknown` rather than failing the whole order.

use serde::{Deserialize, Serialize};

/// Order lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Pending,
    Processing,
    OnHold,
    Completed,
    Shipped,
    Cancelled,
    Refunded,
    Failed,
    #[serde(other)]
    Unknown,
}

impl OrderStatus {
    /// Label shown to shoppers.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Processing => "Processing",
            Self::OnHold => "On hold",
            Self::Completed => "Completed",
            Self::Shipped => "Shipped",
            Self::Cancelled => "Cancelled",
            Self::Refunded => "Refunded",
            Self::Failed => "Failed",
            Self::Unknown => "Received",
        }
    }
}

/// Payment status of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Authorized,
    Paid,
    PartiallyRefunded,
    Refunded,
    Failed,
    #[serde(other)]
    Unknown,
}

impl PaymentStatus {
    /// Whether the shopper still has to complete payment.
    #[must_use]
    pub const fn awaiting_payment(self) -> bool {
        matches!(self, Self::Pending | Self::Failed)
    }
}
