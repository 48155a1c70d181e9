//! Purchase-order lifecycle rules

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Purchase-order lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PurchaseOrderStatus {
    /// Being prepared
    #[default]
    Draft,
    /// Sent to the supplier
    Submitted,
    /// Approved for receiving
    Approved,
    /// Some lines received
    PartiallyReceived,
    /// Fully received
    Received,
    Cancelled,
}

impl PurchaseOrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PurchaseOrderStatus::Draft => "draft",
            PurchaseOrderStatus::Submitted => "submitted",
            PurchaseOrderStatus::Approved => "approved",
            PurchaseOrderStatus::PartiallyReceived => "partially_received",
            PurchaseOrderStatus::Received => "received",
            PurchaseOrderStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(PurchaseOrderStatus::Draft),
            "submitted" => Some(PurchaseOrderStatus::Submitted),
            "approved" => Some(PurchaseOrderStatus::Approved),
            "partially_received" => Some(PurchaseOrderStatus::PartiallyReceived),
            "received" => Some(PurchaseOrderStatus::Received),
            "cancelled" => Some(PurchaseOrderStatus::Cancelled),
            _ => None,
        }
    }

    /// The transition table. No edge absent from this list is legal.
    pub fn allowed_transitions(&self) -> &'static [PurchaseOrderStatus] {
        match self {
            PurchaseOrderStatus::Draft => &[
                PurchaseOrderStatus::Submitted,
                PurchaseOrderStatus::Cancelled,
            ],
            PurchaseOrderStatus::Submitted => &[
                PurchaseOrderStatus::Approved,
                PurchaseOrderStatus::Cancelled,
            ],
            PurchaseOrderStatus::Approved => &[
                PurchaseOrderStatus::PartiallyReceived,
                PurchaseOrderStatus::Received,
                PurchaseOrderStatus::Cancelled,
            ],
            PurchaseOrderStatus::PartiallyReceived => &[
                PurchaseOrderStatus::Received,
                PurchaseOrderStatus::Cancelled,
            ],
            PurchaseOrderStatus::Received => &[],
            PurchaseOrderStatus::Cancelled => &[],
        }
    }

    pub fn can_transition_to(&self, next: PurchaseOrderStatus) -> bool {
        self.allowed_transitions().contains(&next)
    }

    pub fn is_terminal(&self) -> bool {
        self.allowed_transitions().is_empty()
    }

    /// Goods may only be received against approved or partially received orders.
    pub fn can_receive(&self) -> bool {
        matches!(
            self,
            PurchaseOrderStatus::Approved | PurchaseOrderStatus::PartiallyReceived
        )
    }

    /// Line items and supplier are editable in draft only.
    pub fn can_edit(&self) -> bool {
        matches!(self, PurchaseOrderStatus::Draft)
    }
}

impl std::fmt::Display for PurchaseOrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Format an order number: `PO-YYYYMMDD-XXXX`
pub fn format_order_number(date: NaiveDate, sequence: u32) -> String {
    format!("PO-{}-{:04}", date.format("%Y%m%d"), sequence)
}

/// Next daily sequence given the highest existing order number for the day.
///
/// Unparseable numbers restart the sequence at 1, matching how the order
/// number generator has always behaved.
pub fn next_order_sequence(last_order_number: Option<&str>) -> u32 {
    last_order_number
        .and_then(|number| number.rsplit('-').next())
        .and_then(|suffix| suffix.parse::<u32>().ok())
        .map(|sequence| sequence + 1)
        .unwrap_or(1)
}
