use crate::{
    auth::AuthUser,
    db::{retry_transient, DbPool},
    entities::order::{self, Entity as OrderEntity, Model as OrderModel},
    entities::vendor::Entity as VendorEntity,
    errors::ServiceError,
    events::{Event, EventSender},
    models::{CompletionEvent, OrderStatus, VendorSummary},
    services::orders::{ensure_read_access, load_order, OrderResponse},
};
use rust_decimal::Decimal;
use sea_orm::{sea_query::Expr, ColumnTrait, EntityTrait, QueryFilter};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Checkpoint {
    pub status: OrderStatus,
    pub label: String,
    pub reached: bool,
    pub current: bool,
}

/// Progress timeline of an order as shown to the requester
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TrackingView {
    pub order_id: Uuid,
    pub status: OrderStatus,
    /// Index into the checkpoint list of the furthest checkpoint reached
    pub furthest_checkpoint: usize,
    pub checkpoints: Vec<Checkpoint>,
    pub vendor: Option<VendorSummary>,
}

impl TrackingView {
    pub fn build(order_id: Uuid, status: OrderStatus, vendor: Option<VendorSummary>) -> Self {
        // cancellation only happens from pending
        let furthest = status.checkpoint_index().unwrap_or(0);
        let checkpoints = OrderStatus::CHECKPOINTS
            .iter()
            .enumerate()
            .map(|(idx, checkpoint)| Checkpoint {
                status: *checkpoint,
                label: checkpoint.label().to_string(),
                reached: idx <= furthest,
                current: *checkpoint == status,
            })
            .collect();

        Self {
            order_id,
            status,
            furthest_checkpoint: furthest,
            checkpoints,
            vendor,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AdvanceStatusRequest {
    #[schema(example = "in_transit")]
    pub status: String,
    /// Final amount paid out; defaults to the order's estimated value
    #[schema(value_type = Option<String>, example = "450.00")]
    pub settled_amount: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AdvanceOutcome {
    pub order: OrderResponse,
    pub completion: Option<CompletionEvent>,
}

/// Status tracking and vendor-side progress updates
#[derive(Clone)]
pub struct OrderStatusService {
    db_pool: Arc<DbPool>,
    event_sender: Option<Arc<EventSender>>,
}

impl OrderStatusService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Option<Arc<EventSender>>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    /// Checkpoint view for the requester, the bound vendor, or a service caller
    #[instrument(skip(self, caller), fields(order_id = %order_id))]
    pub async fn tracking(&self, caller: &AuthUser, order_id: Uuid) -> Result<TrackingView, ServiceError> {
        let db = &*self.db_pool;
        let order = retry_transient("tracking", || load_order(db, order_id)).await?;
        ensure_read_access(caller, &order)?;

        let vendor = match order.vendor_id {
            Some(vendor_id) => VendorEntity::find_by_id(vendor_id)
                .one(db)
                .await?
                .map(|v| v.summary()),
            None => None,
        };

        Ok(TrackingView::build(order.id, order.status()?, vendor))
    }

    /// Moves an order one checkpoint forward on behalf of its vendor.
    /// Entering `completed` records the settled amount and yields the
    /// completion event.
    #[instrument(skip(self, caller, request), fields(order_id = %order_id, target = %request.status))]
    pub async fn advance_status(
        &self,
        caller: &AuthUser,
        order_id: Uuid,
        request: AdvanceStatusRequest,
    ) -> Result<AdvanceOutcome, ServiceError> {
        let target = OrderStatus::parse(&request.status)?;
        let db = &*self.db_pool;
        let order = load_order(db, order_id).await?;
        Self::ensure_vendor_access(caller, &order)?;

        let current = order.status()?;
        if !current.can_vendor_advance_to(target) {
            warn!(order_id = %order_id, from = %current, to = %target, "Rejected status transition");
            return Err(ServiceError::InvalidTransition(format!(
                "Cannot move order {} from {} to {}",
                order_id, current, target
            )));
        }

        let settled_amount = if target == OrderStatus::Completed {
            let amount = request
                .settled_amount
                .or(order.estimated_value)
                .ok_or_else(|| {
                    ServiceError::ValidationError(
                        "settled_amount is required when the order has no estimate".to_string(),
                    )
                })?;
            if amount < Decimal::ZERO {
                return Err(ServiceError::ValidationError(
                    "settled_amount must not be negative".to_string(),
                ));
            }
            Some(amount)
        } else {
            None
        };

        let mut update = OrderEntity::update_many()
            .col_expr(order::Column::Status, Expr::value(target.to_string()))
            .col_expr(order::Column::UpdatedAt, Expr::value(chrono::Utc::now()));
        if let Some(amount) = settled_amount {
            update = update.col_expr(order::Column::SettledAmount, Expr::value(amount));
        }
        update = update
            .filter(order::Column::Id.eq(order_id))
            .filter(order::Column::Status.eq(current.to_string()));
        if target.requires_vendor() {
            update = update.filter(order::Column::VendorId.is_not_null());
        }
        let result = update
            .exec(db)
            .await
            .map_err(|e| {
                error!(error = %e, order_id = %order_id, "Failed to advance order status");
                ServiceError::DatabaseError(e)
            })?;

        if result.rows_affected == 0 {
            warn!(order_id = %order_id, from = %current, to = %target, "Status changed concurrently");
            return Err(ServiceError::InvalidTransition(format!(
                "Order {} is no longer {}",
                order_id, current
            )));
        }

        let updated = load_order(db, order_id).await?;
        info!(order_id = %order_id, from = %current, to = %target, "Order status advanced");

        let completion = settled_amount.map(|amount| CompletionEvent {
            order_id,
            requester_id: updated.requester_id.clone(),
            settled_amount: amount,
            completed_at: updated.updated_at,
        });

        if let Some(sender) = &self.event_sender {
            sender
                .publish(Event::OrderStatusChanged {
                    order_id,
                    old_status: current.to_string(),
                    new_status: target.to_string(),
                })
                .await;
            if let Some(event) = &completion {
                sender.publish(Event::OrderCompleted(event.clone())).await;
            }
        }

        Ok(AdvanceOutcome {
            order: updated.into(),
            completion,
        })
    }

    fn ensure_vendor_access(caller: &AuthUser, order: &OrderModel) -> Result<(), ServiceError> {
        if caller.is_service() {
            return Ok(());
        }
        match (caller.vendor_id(), order.vendor_id) {
            (Some(caller_vendor), Some(bound)) if caller_vendor == bound => Ok(()),
            _ => Err(ServiceError::Forbidden(format!(
                "Only the assigned vendor may update order {}",
                order.id
            ))),
        }
    }
}
