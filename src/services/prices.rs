use crate::{
    db::DbPool,
    entities::market_rate::{self, Entity as MarketRateEntity},
    entities::scrap_material::{self, Entity as ScrapMaterialEntity, Model as ScrapMaterialModel},
    errors::ServiceError,
    models::{PickupItems, ScrapCategory},
};
use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use strum::Display;
use tracing::{error, info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Direction of the latest price move
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Trend {
    Up,
    Down,
    Stable,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MaterialPrice {
    pub id: Uuid,
    pub name: String,
    pub category: String,
    pub unit: String,
    /// Base price from the catalogue
    #[schema(value_type = String, example = "28.00")]
    pub price_per_kg: Decimal,
    #[schema(value_type = String, example = "30.00")]
    pub current_price: Decimal,
    #[schema(value_type = String, example = "28.00")]
    pub previous_price: Decimal,
    pub trend: Trend,
    #[schema(example = "+7.1%")]
    pub trend_value: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PriceListResponse {
    pub materials: Vec<MaterialPrice>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NewMaterial {
    #[validate(length(min = 1, max = 120, message = "Material name is required"))]
    pub name: String,
    pub category: ScrapCategory,
    pub price_per_kg: Decimal,
    pub unit: Option<String>,
}

/// Trend and signed percentage change, one decimal place.
pub fn compute_trend(current: Decimal, previous: Decimal) -> (Trend, String) {
    let diff = current - previous;
    let trend = if diff > Decimal::ZERO {
        Trend::Up
    } else if diff < Decimal::ZERO {
        Trend::Down
    } else {
        Trend::Stable
    };

    let pct = if previous > Decimal::ZERO {
        (diff / previous * Decimal::ONE_HUNDRED)
            .round_dp_with_strategy(1, RoundingStrategy::MidpointAwayFromZero)
    } else {
        Decimal::ZERO
    };
    let sign = if diff > Decimal::ZERO { "+" } else { "" };

    (trend, format!("{}{:.1}%", sign, pct))
}

/// Sum of quantity times the category price; `None` when no item is priced.
pub fn estimate_from(prices: &HashMap<ScrapCategory, Decimal>, items: &PickupItems) -> Option<Decimal> {
    let mut priced = false;
    let mut total = Decimal::ZERO;
    for item in items.iter() {
        if let Some(price) = prices.get(&item.category) {
            priced = true;
            total += item.approximate_quantity * *price;
        }
    }
    priced.then(|| total.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero))
}

/// Read-only market price feed plus catalogue maintenance for seeding.
#[derive(Clone)]
pub struct PriceService {
    db_pool: Arc<DbPool>,
}

impl PriceService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    /// Active materials with current price and trend, ordered by category then name.
    /// `None` or `"all"` lists every category.
    #[instrument(skip(self))]
    pub async fn list_prices(&self, category: Option<&str>) -> Result<Vec<MaterialPrice>, ServiceError> {
        let filter = match category.map(str::trim) {
            None | Some("") | Some("all") => None,
            Some(raw) => Some(ScrapCategory::from_str(raw).map_err(|_| {
                ServiceError::ValidationError(format!("Unknown category: {}", raw))
            })?),
        };

        let materials = self.active_materials(filter).await?;
        let history = self.rate_history(&materials).await?;

        let prices: Vec<MaterialPrice> = materials
            .into_iter()
            .map(|material| {
                let rates = history.get(&material.id).map(Vec::as_slice).unwrap_or(&[]);
                let current = rates.first().copied().unwrap_or(material.price_per_kg);
                let previous = rates.get(1).copied().unwrap_or(material.price_per_kg);
                let (trend, trend_value) = compute_trend(current, previous);
                MaterialPrice {
                    id: material.id,
                    name: material.name,
                    category: material.category,
                    unit: material.unit,
                    price_per_kg: material.price_per_kg,
                    current_price: current,
                    previous_price: previous,
                    trend,
                    trend_value,
                }
            })
            .collect();

        info!(count = prices.len(), "Price feed assembled");
        Ok(prices)
    }

    /// Mean current price per kg for every category that has active materials.
    pub async fn category_prices(&self) -> Result<HashMap<ScrapCategory, Decimal>, ServiceError> {
        let mut sums: HashMap<ScrapCategory, (Decimal, u32)> = HashMap::new();
        for price in self.list_prices(None).await? {
            let Ok(category) = ScrapCategory::from_str(&price.category) else {
                continue;
            };
            let entry = sums.entry(category).or_insert((Decimal::ZERO, 0));
            entry.0 += price.current_price;
            entry.1 += 1;
        }

        Ok(sums
            .into_iter()
            .map(|(category, (sum, count))| (category, sum / Decimal::from(count)))
            .collect())
    }

    /// Value estimate for a pickup request.
    #[instrument(skip(self, items), fields(items = items.len()))]
    pub async fn estimate_value(&self, items: &PickupItems) -> Result<Option<Decimal>, ServiceError> {
        let prices = self.category_prices().await?;
        Ok(estimate_from(&prices, items))
    }

    /// Adds a material to the catalogue.
    #[instrument(skip(self, request), fields(name = %request.name))]
    pub async fn add_material(&self, request: NewMaterial) -> Result<ScrapMaterialModel, ServiceError> {
        request.validate()?;
        if request.price_per_kg < Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "price_per_kg must not be negative".to_string(),
            ));
        }

        let model = scrap_material::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(request.name),
            category: Set(request.category.to_string()),
            price_per_kg: Set(request.price_per_kg),
            unit: Set(request.unit.unwrap_or_else(|| "kg".to_string())),
            is_active: Set(true),
            created_at: Set(Utc::now()),
        };

        model.insert(&*self.db_pool).await.map_err(|e| {
            error!(error = %e, "Failed to insert scrap material");
            ServiceError::DatabaseError(e)
        })
    }

    /// Appends a market rate observed now.
    pub async fn record_rate(
        &self,
        material_id: Uuid,
        price_per_kg: Decimal,
    ) -> Result<market_rate::Model, ServiceError> {
        self.record_rate_at(material_id, price_per_kg, Utc::now()).await
    }

    /// Appends a market rate with an explicit observation time.
    #[instrument(skip(self), fields(material_id = %material_id))]
    pub async fn record_rate_at(
        &self,
        material_id: Uuid,
        price_per_kg: Decimal,
        recorded_at: DateTime<Utc>,
    ) -> Result<market_rate::Model, ServiceError> {
        if price_per_kg < Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "price_per_kg must not be negative".to_string(),
            ));
        }

        let db = &*self.db_pool;
        ScrapMaterialEntity::find_by_id(material_id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Material {} not found", material_id)))?;

        let rate = market_rate::ActiveModel {
            id: Set(Uuid::new_v4()),
            material_id: Set(material_id),
            price_per_kg: Set(price_per_kg),
            recorded_at: Set(recorded_at),
        };

        rate.insert(db).await.map_err(|e| {
            error!(error = %e, material_id = %material_id, "Failed to record market rate");
            ServiceError::DatabaseError(e)
        })
    }

    async fn active_materials(
        &self,
        category: Option<ScrapCategory>,
    ) -> Result<Vec<ScrapMaterialModel>, ServiceError> {
        let mut query = ScrapMaterialEntity::find().filter(scrap_material::Column::IsActive.eq(true));
        if let Some(category) = category {
            query = query.filter(scrap_material::Column::Category.eq(category.to_string()));
        }

        query
            .order_by_asc(scrap_material::Column::Category)
            .order_by_asc(scrap_material::Column::Name)
            .all(&*self.db_pool)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to load scrap materials");
                ServiceError::DatabaseError(e)
            })
    }

    /// Latest two rates per material, newest first.
    async fn rate_history(
        &self,
        materials: &[ScrapMaterialModel],
    ) -> Result<HashMap<Uuid, Vec<Decimal>>, ServiceError> {
        if materials.is_empty() {
            return Ok(HashMap::new());
        }

        let ids: Vec<Uuid> = materials.iter().map(|m| m.id).collect();
        let rates = MarketRateEntity::find()
            .filter(market_rate::Column::MaterialId.is_in(ids))
            .order_by_desc(market_rate::Column::RecordedAt)
            .all(&*self.db_pool)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to load market rates");
                ServiceError::DatabaseError(e)
            })?;

        let mut history: HashMap<Uuid, Vec<Decimal>> = HashMap::new();
        for rate in rates {
            let entry = history.entry(rate.material_id).or_default();
            if entry.len() < 2 {
                entry.push(rate.price_per_kg);
            }
        }
        Ok(history)
    }
}
