use crate::{
    auth::AuthUser,
    db::DbPool,
    entities::vendor::{self, Entity as VendorEntity, Model as VendorModel},
    errors::ServiceError,
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Select, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RegisterVendorRequest {
    #[validate(length(min = 1, max = 120, message = "Vendor name is required"))]
    pub name: String,
    #[validate(length(min = 5, max = 20, message = "Phone must be between 5 and 20 characters"))]
    pub phone: String,
    pub rating: Decimal,
    pub is_available: bool,
    pub is_verified: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SetAvailabilityRequest {
    pub is_available: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct VendorResponse {
    pub id: Uuid,
    pub name: String,
    pub phone: String,
    #[schema(value_type = String, example = "4.5")]
    pub rating: Decimal,
    pub is_available: bool,
    pub is_verified: bool,
    pub total_pickups: i64,
}

impl From<VendorModel> for VendorResponse {
    fn from(model: VendorModel) -> Self {
        Self {
            id: model.id,
            name: model.name,
            phone: model.phone,
            rating: model.rating,
            is_available: model.is_available,
            is_verified: model.is_verified,
            total_pickups: model.total_pickups,
        }
    }
}

fn eligible_query() -> Select<VendorEntity> {
    VendorEntity::find()
        .filter(vendor::Column::IsAvailable.eq(true))
        .filter(vendor::Column::IsVerified.eq(true))
}

/// Eligible vendors (available and verified), least loaded first, then
/// earliest registered.
pub async fn eligible_snapshot<C: ConnectionTrait>(db: &C) -> Result<Vec<VendorModel>, ServiceError> {
    eligible_query()
        .order_by_asc(vendor::Column::TotalPickups)
        .order_by_asc(vendor::Column::CreatedAt)
        .all(db)
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to load eligible vendors");
            ServiceError::DatabaseError(e)
        })
}

/// Same set as [`eligible_snapshot`], in id order, read with `FOR UPDATE` so
/// the rows stay locked until `txn` ends. SQLite has no row locks; there the
/// caller must already hold the write lock.
pub async fn lock_eligible<C: ConnectionTrait>(txn: &C) -> Result<Vec<VendorModel>, ServiceError> {
    eligible_query()
        .order_by_asc(vendor::Column::Id)
        .lock_exclusive()
        .all(txn)
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to lock eligible vendors");
            ServiceError::DatabaseError(e)
        })
}

/// Vendor directory. Presence and verification are owned by outside
/// collaborators; the matching engine only reads them.
#[derive(Clone)]
pub struct VendorService {
    db_pool: Arc<DbPool>,
}

impl VendorService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    #[instrument(skip(self, request), fields(name = %request.name))]
    pub async fn register_vendor(&self, request: RegisterVendorRequest) -> Result<VendorModel, ServiceError> {
        request.validate()?;
        if request.rating < Decimal::ZERO || request.rating > Decimal::from(5) {
            return Err(ServiceError::ValidationError(
                "rating must be between 0 and 5".to_string(),
            ));
        }

        let now = Utc::now();
        let vendor_id = Uuid::new_v4();
        let model = vendor::ActiveModel {
            id: Set(vendor_id),
            name: Set(request.name),
            phone: Set(request.phone),
            rating: Set(request.rating),
            is_available: Set(request.is_available),
            is_verified: Set(request.is_verified),
            total_pickups: Set(0),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let vendor = model.insert(&*self.db_pool).await.map_err(|e| {
            error!(error = %e, vendor_id = %vendor_id, "Failed to register vendor");
            ServiceError::DatabaseError(e)
        })?;

        info!(vendor_id = %vendor_id, "Vendor registered");
        Ok(vendor)
    }

    #[instrument(skip(self), fields(vendor_id = %vendor_id))]
    pub async fn get_vendor(&self, vendor_id: Uuid) -> Result<VendorModel, ServiceError> {
        VendorEntity::find_by_id(vendor_id)
            .one(&*self.db_pool)
            .await
            .map_err(|e| {
                error!(error = %e, vendor_id = %vendor_id, "Failed to fetch vendor");
                ServiceError::DatabaseError(e)
            })?
            .ok_or_else(|| ServiceError::NotFound(format!("Vendor {} not found", vendor_id)))
    }

    pub async fn eligible_snapshot(&self) -> Result<Vec<VendorModel>, ServiceError> {
        eligible_snapshot(&*self.db_pool).await
    }

    /// Presence toggle; callable by the vendor itself or a service credential.
    #[instrument(skip(self, caller), fields(vendor_id = %vendor_id))]
    pub async fn set_availability(
        &self,
        caller: &AuthUser,
        vendor_id: Uuid,
        is_available: bool,
    ) -> Result<VendorModel, ServiceError> {
        if !caller.is_service() && caller.vendor_id() != Some(vendor_id) {
            warn!(vendor_id = %vendor_id, caller = %caller.user_id, "Availability change refused");
            return Err(ServiceError::Forbidden(
                "Only the vendor or a service caller may change availability".to_string(),
            ));
        }

        self.update_flags(vendor_id, Some(is_available), None).await
    }

    /// Onboarding outcome; service callers only.
    #[instrument(skip(self, caller), fields(vendor_id = %vendor_id))]
    pub async fn set_verified(
        &self,
        caller: &AuthUser,
        vendor_id: Uuid,
        is_verified: bool,
    ) -> Result<VendorModel, ServiceError> {
        if !caller.is_service() {
            return Err(ServiceError::Forbidden(
                "Only a service caller may change verification".to_string(),
            ));
        }

        self.update_flags(vendor_id, None, Some(is_verified)).await
    }

    async fn update_flags(
        &self,
        vendor_id: Uuid,
        is_available: Option<bool>,
        is_verified: Option<bool>,
    ) -> Result<VendorModel, ServiceError> {
        let existing = self.get_vendor(vendor_id).await?;
        let mut active: vendor::ActiveModel = existing.into();
        if let Some(flag) = is_available {
            active.is_available = Set(flag);
        }
        if let Some(flag) = is_verified {
            active.is_verified = Set(flag);
        }
        active.updated_at = Set(Utc::now());

        let updated = active.update(&*self.db_pool).await.map_err(|e| {
            error!(error = %e, vendor_id = %vendor_id, "Failed to update vendor flags");
            ServiceError::DatabaseError(e)
        })?;

        info!(
            vendor_id = %vendor_id,
            is_available = updated.is_available,
            is_verified = updated.is_verified,
            "Vendor flags updated"
        );
        Ok(updated)
    }
}
