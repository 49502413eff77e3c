use serde::{Deserialize, Serialize};
use std::str::FromStr;
use strum::{AsRefStr, Display, EnumIter, EnumString};
use utoipa::ToSchema;

use crate::errors::ServiceError;

/// Lifecycle state of a pickup order.
///
/// The four checkpoints form a strictly linear sequence
/// (`pending → assigned → in_transit → completed`); `cancelled` is a side
/// exit that is only reachable from `pending`.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    ToSchema,
    Display,
    EnumString,
    AsRefStr,
    EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Assigned,
    InTransit,
    Completed,
    Cancelled,
}

impl OrderStatus {
    /// Ordered checkpoints rendered by the progress timeline.
    pub const CHECKPOINTS: [OrderStatus; 4] = [
        OrderStatus::Pending,
        OrderStatus::Assigned,
        OrderStatus::InTransit,
        OrderStatus::Completed,
    ];

    /// Parses a stored status string.
    pub fn parse(raw: &str) -> Result<Self, ServiceError> {
        OrderStatus::from_str(raw)
            .map_err(|_| ServiceError::ValidationError(format!("Unknown order status: {raw}")))
    }

    /// Position of this status in the checkpoint sequence, `None` for `cancelled`.
    pub fn checkpoint_index(self) -> Option<usize> {
        Self::CHECKPOINTS.iter().position(|c| *c == self)
    }

    /// The checkpoint directly after this one.
    pub fn next_checkpoint(self) -> Option<Self> {
        self.checkpoint_index()
            .and_then(|idx| Self::CHECKPOINTS.get(idx + 1).copied())
    }

    /// Whether an order in this status must reference a vendor.
    pub fn requires_vendor(self) -> bool {
        matches!(
            self,
            OrderStatus::Assigned | OrderStatus::InTransit | OrderStatus::Completed
        )
    }

    /// Vendor-side advances move exactly one checkpoint forward and never out
    /// of `pending`, which only the matching service may leave.
    pub fn can_vendor_advance_to(self, target: OrderStatus) -> bool {
        matches!(self, OrderStatus::Assigned | OrderStatus::InTransit)
            && self.next_checkpoint() == Some(target)
    }

    pub fn label(self) -> &'static str {
        match self {
            OrderStatus::Pending => "Pickup Requested",
            OrderStatus::Assigned => "Vendor Assigned",
            OrderStatus::InTransit => "Vendor En Route",
            OrderStatus::Completed => "Pickup Complete",
            OrderStatus::Cancelled => "Cancelled",
        }
    }
}
