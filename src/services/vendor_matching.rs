//! Vendor matching: binds exactly one eligible vendor to a pending order.
//!
//! Selection is a pure function over a snapshot of the vendor directory. The
//! snapshot is taken inside the binding transaction, after the order has been
//! claimed with a conditional update (`pending` and unassigned). The order
//! binding and the vendor's load increment then commit together or not at all.

use crate::{
    auth::AuthUser,
    db::{retry_transient, DbPool},
    entities::order::{self, Entity as OrderEntity, Model as OrderModel},
    entities::vendor::{self, Entity as VendorEntity, Model as VendorModel},
    errors::ServiceError,
    events::{Event, EventSender},
    models::{OrderStatus, VendorSummary},
    services::orders::{ensure_requester_access, load_order, OrderResponse},
    services::vendors::lock_eligible,
};
use chrono::{DateTime, Utc};
use metrics::counter;
use sea_orm::{
    sea_query::Expr, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

/// The fields of a vendor the selection policy looks at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VendorCandidate {
    pub id: Uuid,
    pub total_pickups: i64,
    pub created_at: DateTime<Utc>,
    pub is_available: bool,
    pub is_verified: bool,
}

impl From<&VendorModel> for VendorCandidate {
    fn from(model: &VendorModel) -> Self {
        Self {
            id: model.id,
            total_pickups: model.total_pickups,
            created_at: model.created_at,
            is_available: model.is_available,
            is_verified: model.is_verified,
        }
    }
}

/// Least-loaded eligible vendor; ties go to the earliest registered.
pub fn select_vendor(snapshot: &[VendorCandidate]) -> Option<&VendorCandidate> {
    snapshot
        .iter()
        .filter(|c| c.is_available && c.is_verified)
        .min_by_key(|c| (c.total_pickups, c.created_at))
}

/// Result of one binding attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum BindOutcome {
    /// The order now references this vendor, whose load was incremented.
    Bound(VendorModel),
    /// The order was no longer pending and unassigned.
    OrderTaken,
    /// The eligible set was empty once the order was claimed.
    NoEligibleVendor,
}

/// Claims the order, selects from the eligible set and applies the binding,
/// all on `txn`. The caller commits on `Bound` and rolls back otherwise.
///
/// The order row is claimed before the eligible set is read, and that read
/// locks the vendor rows (`FOR UPDATE`; SQLite already holds the database
/// write lock at that point). Concurrent bindings therefore see each other's
/// load increments instead of racing on a stale snapshot.
pub async fn bind_vendor<C: ConnectionTrait>(
    txn: &C,
    order_id: Uuid,
) -> Result<BindOutcome, ServiceError> {
    let now = Utc::now();

    let claim = OrderEntity::update_many()
        .col_expr(order::Column::UpdatedAt, Expr::value(now))
        .filter(order::Column::Id.eq(order_id))
        .filter(order::Column::Status.eq(OrderStatus::Pending.to_string()))
        .filter(order::Column::VendorId.is_null())
        .exec(txn)
        .await?;
    if claim.rows_affected == 0 {
        return Ok(BindOutcome::OrderTaken);
    }

    let snapshot = lock_eligible(txn).await?;
    let candidates: Vec<VendorCandidate> = snapshot.iter().map(VendorCandidate::from).collect();
    let Some(chosen) = select_vendor(&candidates) else {
        return Ok(BindOutcome::NoEligibleVendor);
    };
    let Some(vendor) = snapshot.iter().find(|v| v.id == chosen.id).cloned() else {
        return Ok(BindOutcome::NoEligibleVendor);
    };
    debug!(
        order_id = %order_id,
        vendor_id = %vendor.id,
        load = vendor.total_pickups,
        "Vendor selected"
    );

    OrderEntity::update_many()
        .col_expr(order::Column::VendorId, Expr::value(vendor.id))
        .col_expr(order::Column::Status, Expr::value(OrderStatus::Assigned.to_string()))
        .filter(order::Column::Id.eq(order_id))
        .exec(txn)
        .await?;

    VendorEntity::update_many()
        .col_expr(
            vendor::Column::TotalPickups,
            Expr::col(vendor::Column::TotalPickups).add(1),
        )
        .col_expr(vendor::Column::UpdatedAt, Expr::value(now))
        .filter(vendor::Column::Id.eq(vendor.id))
        .exec(txn)
        .await?;

    Ok(BindOutcome::Bound(vendor))
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AssignmentResponse {
    pub order: OrderResponse,
    pub vendor: VendorSummary,
}

/// Service that performs the `pending -> assigned` transition
#[derive(Clone)]
pub struct VendorMatchingService {
    db_pool: Arc<DbPool>,
    event_sender: Option<Arc<EventSender>>,
}

impl VendorMatchingService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Option<Arc<EventSender>>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    /// Assigns the least-loaded eligible vendor to a pending order.
    #[instrument(skip(self, caller), fields(order_id = %order_id, caller = %caller.user_id))]
    pub async fn assign_vendor(
        &self,
        caller: &AuthUser,
        order_id: Uuid,
    ) -> Result<AssignmentResponse, ServiceError> {
        let db = &*self.db_pool;

        let order = retry_transient("assign_vendor.load_order", || load_order(db, order_id)).await?;
        ensure_requester_access(caller, &order)?;
        Self::ensure_assignable(&order)?;

        let txn = db.begin().await.map_err(|e| {
            error!(error = %e, order_id = %order_id, "Failed to start assignment transaction");
            ServiceError::DatabaseError(e)
        })?;

        match bind_vendor(&txn, order_id).await? {
            BindOutcome::Bound(vendor) => {
                txn.commit().await.map_err(|e| {
                    error!(error = %e, order_id = %order_id, "Failed to commit assignment");
                    ServiceError::DatabaseError(e)
                })?;
                self.finish(order_id, vendor.id).await
            }
            BindOutcome::OrderTaken => {
                txn.rollback().await?;
                let current = load_order(db, order_id).await?;
                Err(Self::lost_race(&current))
            }
            BindOutcome::NoEligibleVendor => {
                txn.rollback().await?;
                counter!("scrapx_matching_no_vendor", 1);
                info!(order_id = %order_id, "No eligible vendor available");
                Err(ServiceError::NoVendorAvailable(order_id))
            }
        }
    }

    fn ensure_assignable(order: &OrderModel) -> Result<(), ServiceError> {
        if let Some(vendor_id) = order.vendor_id {
            counter!("scrapx_matching_already_assigned", 1);
            return Err(ServiceError::AlreadyAssigned {
                order_id: order.id,
                vendor_id,
            });
        }
        if order.status()? != OrderStatus::Pending {
            warn!(order_id = %order.id, status = %order.status, "Order is not pending");
            return Err(ServiceError::InvalidTransition(format!(
                "Order {} is {} and cannot be assigned",
                order.id, order.status
            )));
        }
        Ok(())
    }

    /// Explains why the order compare-and-set bound nothing.
    fn lost_race(current: &OrderModel) -> ServiceError {
        match Self::ensure_assignable(current) {
            Err(e) => e,
            Ok(()) => ServiceError::Conflict(format!(
                "Order {} changed during assignment",
                current.id
            )),
        }
    }

    async fn finish(&self, order_id: Uuid, vendor_id: Uuid) -> Result<AssignmentResponse, ServiceError> {
        let db = &*self.db_pool;
        let order = load_order(db, order_id).await?;
        let vendor = VendorEntity::find_by_id(vendor_id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Vendor {} not found", vendor_id)))?;

        counter!("scrapx_matching_assigned", 1);
        info!(order_id = %order_id, vendor_id = %vendor_id, load = vendor.total_pickups, "Vendor assigned");

        if let Some(sender) = &self.event_sender {
            sender
                .publish(Event::VendorAssigned { order_id, vendor_id })
                .await;
        }

        Ok(AssignmentResponse {
            order: order.into(),
            vendor: vendor.summary(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use crate::models::{PickupItem, PickupItems, ScrapCategory};
    use chrono::{Duration, NaiveDate};
    use proptest::prelude::*;
    use rust_decimal_macros::dec;
    use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};

    fn candidate(load: i64, offset_secs: i64, available: bool, verified: bool) -> VendorCandidate {
        VendorCandidate {
            id: Uuid::new_v4(),
            total_pickups: load,
            created_at: DateTime::<Utc>::from_timestamp(1_700_000_000 + offset_secs, 0).unwrap(),
            is_available: available,
            is_verified: verified,
        }
    }

    #[test]
    fn picks_least_loaded() {
        let snapshot = vec![
            candidate(3, 0, true, true),
            candidate(1, 1, true, true),
            candidate(5, 2, true, true),
        ];
        assert_eq!(select_vendor(&snapshot), Some(&snapshot[1]));
    }

    #[test]
    fn ties_go_to_earliest_registered() {
        let snapshot = vec![candidate(2, 10, true, true), candidate(2, 5, true, true)];
        assert_eq!(select_vendor(&snapshot), Some(&snapshot[1]));
    }

    #[test]
    fn ineligible_vendors_are_skipped() {
        let snapshot = vec![
            candidate(0, 0, false, true),
            candidate(0, 1, true, false),
            candidate(4, 2, true, true),
        ];
        assert_eq!(select_vendor(&snapshot), Some(&snapshot[2]));
        assert_eq!(select_vendor(&snapshot[..2]), None);
        assert_eq!(select_vendor(&[]), None);
    }

    proptest! {
        #[test]
        fn selection_is_minimal_among_eligible(
            vendors in prop::collection::vec((0i64..20, 0i64..1000, any::<bool>(), any::<bool>()), 0..16)
        ) {
            let snapshot: Vec<VendorCandidate> = vendors
                .iter()
                .map(|(load, offset, available, verified)| candidate(*load, *offset, *available, *verified))
                .collect();
            let eligible: Vec<&VendorCandidate> =
                snapshot.iter().filter(|c| c.is_available && c.is_verified).collect();

            match select_vendor(&snapshot) {
                None => prop_assert!(eligible.is_empty()),
                Some(chosen) => {
                    prop_assert!(chosen.is_available && chosen.is_verified);
                    for other in eligible {
                        prop_assert!(
                            (chosen.total_pickups, chosen.created_at)
                                <= (other.total_pickups, other.created_at)
                        );
                    }
                }
            }
        }
    }

    async fn setup() -> DatabaseConnection {
        crate::db::memory_pool().await
    }

    async fn insert_vendor(db: &DatabaseConnection, load: i64) -> VendorModel {
        let now = Utc::now();
        vendor::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set("Green Haulers".into()),
            phone: Set("+91-9000000000".into()),
            rating: Set(dec!(4.5)),
            is_available: Set(true),
            is_verified: Set(true),
            total_pickups: Set(load),
            created_at: Set(now - Duration::minutes(5)),
            updated_at: Set(now),
        }
        .insert(db)
        .await
        .unwrap()
    }

    async fn insert_order(db: &DatabaseConnection) -> OrderModel {
        let now = Utc::now();
        order::ActiveModel {
            id: Set(Uuid::new_v4()),
            requester_id: Set("user-1".into()),
            address: Set("12 MG Road".into()),
            city: Set(None),
            scheduled_date: Set(NaiveDate::from_ymd_opt(2026, 11, 2).unwrap()),
            scheduled_time: Set("10:00 AM".into()),
            items: Set(PickupItems(vec![PickupItem {
                category: ScrapCategory::Paper,
                approximate_quantity: dec!(4),
            }])),
            notes: Set(None),
            status: Set(OrderStatus::Pending.to_string()),
            vendor_id: Set(None),
            estimated_value: Set(None),
            settled_amount: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(db)
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn binding_reads_load_inside_the_transaction() {
        let db = setup().await;
        let vendor = insert_vendor(&db, 1).await;
        let first = insert_order(&db).await;
        let second = insert_order(&db).await;

        // a snapshot taken before either binding would show load 1 for both
        for (order, expected) in [(first.id, 1), (second.id, 2)] {
            let txn = db.begin().await.unwrap();
            let outcome = bind_vendor(&txn, order).await.unwrap();
            assert_matches!(outcome, BindOutcome::Bound(ref v) if v.id == vendor.id && v.total_pickups == expected);
            txn.commit().await.unwrap();
        }

        let vendor_after = VendorEntity::find_by_id(vendor.id).one(&db).await.unwrap().unwrap();
        assert_eq!(vendor_after.total_pickups, 3);
        assert_eq!(load_order(&db, second.id).await.unwrap().vendor_id, Some(vendor.id));
    }

    #[tokio::test]
    async fn empty_directory_rolls_back_the_claim() {
        let db = setup().await;
        let order = insert_order(&db).await;

        let txn = db.begin().await.unwrap();
        let outcome = bind_vendor(&txn, order.id).await.unwrap();
        assert_eq!(outcome, BindOutcome::NoEligibleVendor);
        txn.rollback().await.unwrap();

        let reloaded = load_order(&db, order.id).await.unwrap();
        assert_eq!(reloaded.status, "pending");
        assert!(reloaded.vendor_id.is_none());
    }

    #[tokio::test]
    async fn bound_order_is_not_rebound() {
        let db = setup().await;
        let first = insert_vendor(&db, 0).await;
        let second = insert_vendor(&db, 1).await;
        let order = insert_order(&db).await;

        let txn = db.begin().await.unwrap();
        let outcome = bind_vendor(&txn, order.id).await.unwrap();
        assert_matches!(outcome, BindOutcome::Bound(ref v) if v.id == first.id);
        txn.commit().await.unwrap();

        let txn = db.begin().await.unwrap();
        let outcome = bind_vendor(&txn, order.id).await.unwrap();
        assert_eq!(outcome, BindOutcome::OrderTaken);
        txn.rollback().await.unwrap();

        let reloaded = load_order(&db, order.id).await.unwrap();
        assert_eq!(reloaded.vendor_id, Some(first.id));
        assert_eq!(reloaded.status, "assigned");
        let second_after = VendorEntity::find_by_id(second.id).one(&db).await.unwrap().unwrap();
        assert_eq!(second_after.total_pickups, 1);
    }
}
