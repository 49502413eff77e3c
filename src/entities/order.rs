use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{entity::prelude::*, Set};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{OrderStatus, PickupItems};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub requester_id: String,
    pub address: String,
    pub city: Option<String>,
    pub scheduled_date: NaiveDate,
    pub scheduled_time: String,
    #[sea_orm(column_type = "Json")]
    pub items: PickupItems,
    pub notes: Option<String>,
    pub status: String,
    pub vendor_id: Option<Uuid>,
    pub estimated_value: Option<Decimal>,
    pub settled_amount: Option<Decimal>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Model {
    /// Typed view of the stored status column.
    pub fn status(&self) -> Result<OrderStatus, crate::errors::ServiceError> {
        OrderStatus::parse(&self.status)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::vendor::Entity",
        from = "Column::VendorId",
        to = "super::vendor::Column::Id"
    )]
    Vendor,
}

impl Related<super::vendor::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Vendor.def()
    }
}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C>(mut self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        if !insert {
            self.updated_at = Set(Utc::now());
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use sea_orm::ActiveModelTrait;

    #[tokio::test]
    async fn update_refreshes_updated_at() {
        let db = crate::db::memory_pool().await;
        let stale = Utc::now() - Duration::days(2);
        let inserted = ActiveModel {
            id: Set(Uuid::new_v4()),
            requester_id: Set("user-1".into()),
            address: Set("12 MG Road".into()),
            city: Set(None),
            scheduled_date: Set(NaiveDate::from_ymd_opt(2026, 11, 2).unwrap()),
            scheduled_time: Set("10:00 AM".into()),
            items: Set(Default::default()),
            notes: Set(None),
            status: Set(OrderStatus::Pending.to_string()),
            vendor_id: Set(None),
            estimated_value: Set(None),
            settled_amount: Set(None),
            created_at: Set(stale),
            updated_at: Set(stale),
        }
        .insert(&db)
        .await
        .unwrap();
        assert!(inserted.updated_at < Utc::now() - Duration::days(1));

        let mut active: ActiveModel = inserted.into();
        active.notes = Set(Some("gate code 4411".into()));
        let updated = active.update(&db).await.unwrap();

        assert_eq!(updated.notes.as_deref(), Some("gate code 4411"));
        assert!(updated.updated_at > Utc::now() - Duration::minutes(1));
        assert!(updated.created_at < Utc::now() - Duration::days(1));
    }
}
