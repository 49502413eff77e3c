use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::FromJsonQueryResult;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::errors::ServiceError;

/// Material family used for pricing and item classification.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    ToSchema,
    Display,
    EnumString,
    AsRefStr,
    EnumIter,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum ScrapCategory {
    Metal,
    Plastic,
    Paper,
    EWaste,
    Glass,
    Textile,
    Other,
}

/// One line of a pickup request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PickupItem {
    pub category: ScrapCategory,
    /// Approximate weight in kilograms
    #[serde(alias = "quantity")]
    #[schema(value_type = String, example = "12.5")]
    pub approximate_quantity: Decimal,
}

/// Ordered item list stored as a JSON column on the order.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, FromJsonQueryResult)]
pub struct PickupItems(pub Vec<PickupItem>);

impl PickupItems {
    pub fn validate(&self) -> Result<(), ServiceError> {
        if self.0.is_empty() {
            return Err(ServiceError::ValidationError(
                "items must contain at least one entry".to_string(),
            ));
        }
        if let Some(bad) = self
            .0
            .iter()
            .find(|item| item.approximate_quantity <= Decimal::ZERO)
        {
            return Err(ServiceError::ValidationError(format!(
                "quantity for {} must be positive",
                bad.category
            )));
        }
        Ok(())
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PickupItem> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<PickupItem>> for PickupItems {
    fn from(items: Vec<PickupItem>) -> Self {
        PickupItems(items)
    }
}

/// Vendor fields exposed to requesters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct VendorSummary {
    pub id: Uuid,
    pub name: String,
    pub phone: String,
    #[schema(value_type = String, example = "4.5")]
    pub rating: Decimal,
}

/// Emitted once when an order reaches `completed`; consumed by the wallet ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct CompletionEvent {
    pub order_id: Uuid,
    pub requester_id: String,
    #[schema(value_type = String, example = "450.00")]
    pub settled_amount: Decimal,
    pub completed_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::str::FromStr;

    #[test]
    fn categories_use_kebab_case() {
        assert_eq!(ScrapCategory::EWaste.to_string(), "e-waste");
        assert_eq!(
            ScrapCategory::from_str("e-waste").unwrap(),
            ScrapCategory::EWaste
        );
        let parsed: ScrapCategory = serde_json::from_str("\"metal\"").unwrap();
        assert_eq!(parsed, ScrapCategory::Metal);
    }

    #[test]
    fn item_accepts_quantity_alias() {
        let item: PickupItem =
            serde_json::from_str(r#"{"category":"paper","quantity":"3.5"}"#).unwrap();
        assert_eq!(item.approximate_quantity, dec!(3.5));
    }

    #[test]
    fn empty_items_are_rejected() {
        assert!(PickupItems::default().validate().is_err());
    }

    #[test]
    fn non_positive_quantity_is_rejected() {
        let items = PickupItems(vec![
            PickupItem {
                category: ScrapCategory::Metal,
                approximate_quantity: dec!(2),
            },
            PickupItem {
                category: ScrapCategory::Glass,
                approximate_quantity: dec!(0),
            },
        ]);
        let err = items.validate().unwrap_err();
        assert!(err.to_string().contains("glass"));
    }
}
