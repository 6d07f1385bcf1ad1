use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum OrderStatus {
    Pending,
    Assigned,
    #[serde(rename = "Out for Delivery")]
    OutForDelivery,
    Delivered,
    Cancelled,
}

/// Forward progression for `advance_status`. Cancelled is deliberately
/// not part of the sequence; see `OrderLedger::advance_status`.
pub const STATUS_SEQUENCE: [OrderStatus; 4] = [
    OrderStatus::Pending,
    OrderStatus::Assigned,
    OrderStatus::OutForDelivery,
    OrderStatus::Delivered,
];

impl OrderStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Pending => "Pending",
            OrderStatus::Assigned => "Assigned",
            OrderStatus::OutForDelivery => "Out for Delivery",
            OrderStatus::Delivered => "Delivered",
            OrderStatus::Cancelled => "Cancelled",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: u64,
    pub customer_username: String,
    pub customer_display_name: String,
    pub quantity: u32,
    pub address: String,
    pub status: OrderStatus,
    pub assigned_to: Option<String>,
    pub created_at: DateTime<Utc>,
}
