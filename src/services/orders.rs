use crate::{
    auth::AuthUser,
    db::{retry_transient, DbPool},
    entities::order::{self, Entity as OrderEntity, Model as OrderModel},
    errors::ServiceError,
    events::{Event, EventSender},
    models::{OrderStatus, PickupItem, PickupItems},
    services::prices::PriceService,
};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::{Validate, ValidationError};

fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank"));
    }
    Ok(())
}

/// Pickup request submitted by a customer
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateOrderRequest {
    #[validate(custom = "validate_not_blank")]
    pub address: String,
    pub city: Option<String>,
    /// Calendar date, `YYYY-MM-DD`
    #[validate(custom = "validate_not_blank")]
    #[schema(example = "2026-11-02")]
    pub scheduled_date: String,
    #[validate(custom = "validate_not_blank")]
    #[schema(example = "10:00 AM - 12:00 PM")]
    pub scheduled_time: String,
    pub items: Vec<PickupItem>,
    pub notes: Option<String>,
}

/// Logistics edit; only the provided fields change
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateLogisticsRequest {
    #[validate(custom = "validate_not_blank")]
    pub address: Option<String>,
    pub city: Option<String>,
    #[validate(custom = "validate_not_blank")]
    pub scheduled_date: Option<String>,
    #[validate(custom = "validate_not_blank")]
    pub scheduled_time: Option<String>,
    pub notes: Option<String>,
}

impl UpdateLogisticsRequest {
    fn is_empty(&self) -> bool {
        self.address.is_none()
            && self.city.is_none()
            && self.scheduled_date.is_none()
            && self.scheduled_time.is_none()
            && self.notes.is_none()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum OrderFilter {
    #[default]
    All,
    Active,
    Completed,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListOrdersQuery {
    pub filter: Option<OrderFilter>,
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderResponse {
    pub id: Uuid,
    pub requester_id: String,
    pub address: String,
    pub city: Option<String>,
    pub scheduled_date: NaiveDate,
    pub scheduled_time: String,
    pub items: Vec<PickupItem>,
    pub notes: Option<String>,
    #[schema(example = "pending")]
    pub status: String,
    pub vendor_id: Option<Uuid>,
    #[schema(value_type = Option<String>, example = "450.00")]
    pub estimated_value: Option<Decimal>,
    #[schema(value_type = Option<String>)]
    pub settled_amount: Option<Decimal>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<OrderModel> for OrderResponse {
    fn from(model: OrderModel) -> Self {
        Self {
            id: model.id,
            requester_id: model.requester_id,
            address: model.address,
            city: model.city,
            scheduled_date: model.scheduled_date,
            scheduled_time: model.scheduled_time,
            items: model.items.0,
            notes: model.notes,
            status: model.status,
            vendor_id: model.vendor_id,
            estimated_value: model.estimated_value,
            settled_amount: model.settled_amount,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OrderListResponse {
    pub orders: Vec<OrderResponse>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

fn parse_date(raw: &str) -> Result<NaiveDate, ServiceError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|_| {
        ServiceError::ValidationError(format!("scheduled_date must be YYYY-MM-DD, got {raw}"))
    })
}

/// Loads an order or fails with `NotFound`.
pub(crate) async fn load_order<C: ConnectionTrait>(db: &C, order_id: Uuid) -> Result<OrderModel, ServiceError> {
    OrderEntity::find_by_id(order_id)
        .one(db)
        .await
        .map_err(|e| {
            error!(error = %e, order_id = %order_id, "Failed to fetch order");
            ServiceError::DatabaseError(e)
        })?
        .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))
}

/// Requester or service caller; anyone else is refused.
pub(crate) fn ensure_requester_access(caller: &AuthUser, order: &OrderModel) -> Result<(), ServiceError> {
    if caller.can_access_order(&order.requester_id) {
        Ok(())
    } else {
        Err(ServiceError::Forbidden(format!(
            "Caller may not act on order {}",
            order.id
        )))
    }
}

/// Read access also extends to the vendor bound to the order.
pub(crate) fn ensure_read_access(caller: &AuthUser, order: &OrderModel) -> Result<(), ServiceError> {
    match (caller.vendor_id(), order.vendor_id) {
        (Some(caller_vendor), Some(bound)) if caller_vendor == bound => Ok(()),
        _ => ensure_requester_access(caller, order),
    }
}

/// Service for creating and managing pickup orders on the requester side
#[derive(Clone)]
pub struct OrderService {
    db_pool: Arc<DbPool>,
    event_sender: Option<Arc<EventSender>>,
    prices: PriceService,
}

impl OrderService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Option<Arc<EventSender>>) -> Self {
        let prices = PriceService::new(db_pool.clone());
        Self {
            db_pool,
            event_sender,
            prices,
        }
    }

    /// Creates a new pickup order in `pending`
    #[instrument(skip(self, caller, request), fields(requester_id = %caller.user_id))]
    pub async fn create_order(
        &self,
        caller: &AuthUser,
        request: CreateOrderRequest,
    ) -> Result<OrderResponse, ServiceError> {
        if !caller.is_requester() {
            return Err(ServiceError::AuthError(
                "Only customers may request a pickup".to_string(),
            ));
        }

        request.validate()?;
        let scheduled_date = parse_date(&request.scheduled_date)?;
        let items = PickupItems::from(request.items);
        items.validate()?;

        let estimated_value = self.prices.estimate_value(&items).await?;

        let now = Utc::now();
        let order_id = Uuid::new_v4();
        let model = order::ActiveModel {
            id: Set(order_id),
            requester_id: Set(caller.user_id.clone()),
            address: Set(request.address.trim().to_string()),
            city: Set(request.city),
            scheduled_date: Set(scheduled_date),
            scheduled_time: Set(request.scheduled_time.trim().to_string()),
            items: Set(items),
            notes: Set(request.notes),
            status: Set(OrderStatus::Pending.to_string()),
            vendor_id: Set(None),
            estimated_value: Set(estimated_value),
            settled_amount: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let saved = model.insert(&*self.db_pool).await.map_err(|e| {
            error!(error = %e, order_id = %order_id, "Failed to create order");
            ServiceError::DatabaseError(e)
        })?;

        if let Some(sender) = &self.event_sender {
            sender.publish(Event::OrderCreated(order_id)).await;
        }

        info!(order_id = %order_id, items = saved.items.len(), "Order created");
        Ok(saved.into())
    }

    /// Get an order visible to the caller
    #[instrument(skip(self, caller), fields(order_id = %order_id))]
    pub async fn get_order(&self, caller: &AuthUser, order_id: Uuid) -> Result<OrderResponse, ServiceError> {
        let db = &*self.db_pool;
        let order = retry_transient("get_order", || load_order(db, order_id)).await?;
        ensure_read_access(caller, &order)?;
        Ok(order.into())
    }

    /// Lists the caller's orders, newest first. Customers see their own
    /// requests, vendors the orders bound to them, service callers everything.
    #[instrument(skip(self, caller), fields(caller = %caller.user_id))]
    pub async fn list_orders(
        &self,
        caller: &AuthUser,
        filter: OrderFilter,
        page: u64,
        per_page: u64,
    ) -> Result<OrderListResponse, ServiceError> {
        let page = page.max(1);
        let per_page = per_page.max(1);

        let mut query = OrderEntity::find();
        if !caller.is_service() {
            query = match caller.vendor_id() {
                Some(vendor_id) => query.filter(order::Column::VendorId.eq(vendor_id)),
                None => query.filter(order::Column::RequesterId.eq(caller.user_id.clone())),
            };
        }
        query = match filter {
            OrderFilter::All => query,
            OrderFilter::Active => query.filter(order::Column::Status.is_not_in([
                OrderStatus::Completed.to_string(),
                OrderStatus::Cancelled.to_string(),
            ])),
            OrderFilter::Completed => {
                query.filter(order::Column::Status.eq(OrderStatus::Completed.to_string()))
            }
        };

        let paginator = query
            .order_by_desc(order::Column::CreatedAt)
            .paginate(&*self.db_pool, per_page);

        let total = paginator.num_items().await.map_err(|e| {
            error!(error = %e, "Failed to count orders");
            ServiceError::DatabaseError(e)
        })?;
        let orders = paginator.fetch_page(page - 1).await.map_err(|e| {
            error!(error = %e, page = page, "Failed to fetch orders page");
            ServiceError::DatabaseError(e)
        })?;

        Ok(OrderListResponse {
            orders: orders.into_iter().map(OrderResponse::from).collect(),
            total,
            page,
            per_page,
        })
    }

    /// Edits pickup logistics while the order is still pending and unassigned
    #[instrument(skip(self, caller, request), fields(order_id = %order_id))]
    pub async fn update_logistics(
        &self,
        caller: &AuthUser,
        order_id: Uuid,
        request: UpdateLogisticsRequest,
    ) -> Result<OrderResponse, ServiceError> {
        request.validate()?;
        if request.is_empty() {
            return Err(ServiceError::ValidationError(
                "At least one field must be provided".to_string(),
            ));
        }

        let db = &*self.db_pool;
        let order = load_order(db, order_id).await?;
        ensure_requester_access(caller, &order)?;

        let mut update = OrderEntity::update_many()
            .col_expr(order::Column::UpdatedAt, Expr::value(Utc::now()));
        if let Some(address) = request.address {
            update = update.col_expr(order::Column::Address, Expr::value(address.trim().to_string()));
        }
        if let Some(city) = request.city {
            update = update.col_expr(order::Column::City, Expr::value(city));
        }
        if let Some(date) = request.scheduled_date {
            update = update.col_expr(order::Column::ScheduledDate, Expr::value(parse_date(&date)?));
        }
        if let Some(time) = request.scheduled_time {
            update = update.col_expr(order::Column::ScheduledTime, Expr::value(time.trim().to_string()));
        }
        if let Some(notes) = request.notes {
            update = update.col_expr(order::Column::Notes, Expr::value(notes));
        }

        let result = update
            .filter(order::Column::Id.eq(order_id))
            .filter(order::Column::Status.eq(OrderStatus::Pending.to_string()))
            .filter(order::Column::VendorId.is_null())
            .exec(db)
            .await?;

        if result.rows_affected == 0 {
            warn!(order_id = %order_id, status = %order.status, "Logistics edit refused");
            return Err(ServiceError::InvalidTransition(format!(
                "Order {} can only be edited while pending",
                order_id
            )));
        }

        info!(order_id = %order_id, "Order logistics updated");
        Ok(load_order(db, order_id).await?.into())
    }

    /// Cancels a pending, unassigned order
    #[instrument(skip(self, caller), fields(order_id = %order_id))]
    pub async fn cancel_order(&self, caller: &AuthUser, order_id: Uuid) -> Result<OrderResponse, ServiceError> {
        let db = &*self.db_pool;
        let order = load_order(db, order_id).await?;
        ensure_requester_access(caller, &order)?;

        let result = OrderEntity::update_many()
            .col_expr(order::Column::Status, Expr::value(OrderStatus::Cancelled.to_string()))
            .col_expr(order::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(order::Column::Id.eq(order_id))
            .filter(order::Column::Status.eq(OrderStatus::Pending.to_string()))
            .filter(order::Column::VendorId.is_null())
            .exec(db)
            .await?;

        if result.rows_affected == 0 {
            let current = load_order(db, order_id).await?;
            warn!(order_id = %order_id, status = %current.status, "Cancellation refused");
            return Err(ServiceError::InvalidTransition(format!(
                "Order {} cannot be cancelled from {}",
                order_id, current.status
            )));
        }

        if let Some(sender) = &self.event_sender {
            sender.publish(Event::OrderCancelled(order_id)).await;
        }

        info!(order_id = %order_id, "Order cancelled");
        Ok(load_order(db, order_id).await?.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("2026-11-02", true)]
    #[case(" 2026-11-02 ", true)]
    #[case("02/11/2026", false)]
    #[case("2026-02-30", false)]
    fn date_parsing(#[case] raw: &str, #[case] ok: bool) {
        assert_eq!(parse_date(raw).is_ok(), ok);
    }

    #[test]
    fn blank_fields_fail_validation() {
        let request = CreateOrderRequest {
            address: "   ".into(),
            city: None,
            scheduled_date: "2026-11-02".into(),
            scheduled_time: "".into(),
            items: vec![],
            notes: None,
        };
        let errors = request.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("address"));
        assert!(fields.contains_key("scheduled_time"));
        assert!(!fields.contains_key("scheduled_date"));
    }

    #[test]
    fn empty_logistics_edit_is_detected() {
        assert!(UpdateLogisticsRequest::default().is_empty());
        let edit = UpdateLogisticsRequest {
            notes: Some("gate code 1234".into()),
            ..Default::default()
        };
        assert!(!edit.is_empty());
    }
}
