use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "market_rates")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub material_id: Uuid,
    pub price_per_kg: Decimal,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::scrap_material::Entity",
        from = "Column::MaterialId",
        to = "super::scrap_material::Column::Id",
        on_delete = "Cascade"
    )]
    ScrapMaterial,
}

impl Related<super::scrap_material::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ScrapMaterial.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
