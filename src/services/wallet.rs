use crate::{
    db::DbPool,
    entities::wallet_transaction::{self, Entity as WalletTransactionEntity, Model as WalletTransactionModel},
    errors::ServiceError,
    events::{Event, EventHandler},
    models::CompletionEvent,
};
use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{sea_query::OnConflict, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use std::sync::Arc;
use tracing::{debug, error, info, instrument};
use uuid::Uuid;

pub const KIND_CREDIT: &str = "credit";

/// Earnings ledger. Each completed order is credited at most once.
#[derive(Clone)]
pub struct WalletLedger {
    db_pool: Arc<DbPool>,
}

impl WalletLedger {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    /// Credits the requester for a completed pickup. Returns `false` when the
    /// order was already credited.
    #[instrument(skip(self, event), fields(order_id = %event.order_id))]
    pub async fn credit_completion(&self, event: &CompletionEvent) -> Result<bool, ServiceError> {
        let entry = wallet_transaction::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(event.requester_id.clone()),
            order_id: Set(event.order_id),
            amount: Set(event.settled_amount),
            kind: Set(KIND_CREDIT.to_string()),
            description: Set(Some(format!("Pickup {} completed", event.order_id))),
            created_at: Set(Utc::now()),
        };

        let inserted = WalletTransactionEntity::insert(entry)
            .on_conflict(
                OnConflict::column(wallet_transaction::Column::OrderId)
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(&*self.db_pool)
            .await
            .map_err(|e| {
                error!(error = %e, order_id = %event.order_id, "Failed to record wallet credit");
                ServiceError::DatabaseError(e)
            })?;

        if inserted == 0 {
            debug!(order_id = %event.order_id, "Order already credited");
            return Ok(false);
        }

        info!(
            order_id = %event.order_id,
            user_id = %event.requester_id,
            amount = %event.settled_amount,
            "Wallet credited"
        );
        Ok(true)
    }

    pub async fn transactions(&self, user_id: &str) -> Result<Vec<WalletTransactionModel>, ServiceError> {
        WalletTransactionEntity::find()
            .filter(wallet_transaction::Column::UserId.eq(user_id))
            .order_by_desc(wallet_transaction::Column::CreatedAt)
            .all(&*self.db_pool)
            .await
            .map_err(ServiceError::DatabaseError)
    }

    pub async fn balance(&self, user_id: &str) -> Result<Decimal, ServiceError> {
        Ok(self
            .transactions(user_id)
            .await?
            .iter()
            .map(|t| t.amount)
            .sum())
    }
}

#[async_trait]
impl EventHandler for WalletLedger {
    async fn handle_event(&self, event: &Event) -> Result<(), String> {
        if let Event::OrderCompleted(completion) = event {
            self.credit_completion(completion)
                .await
                .map_err(|e| format!("wallet credit for order {} failed: {}", completion.order_id, e))?;
        }
        Ok(())
    }
}
