use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "scrap_materials")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub name: String,
    pub category: String,
    /// Base price, used when no market rate has been recorded
    pub price_per_kg: Decimal,
    pub unit: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::market_rate::Entity")]
    MarketRates,
}

impl Related<super::market_rate::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::MarketRates.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
