use axum::{
    extract::{Path, State},
    response::Json,
};
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    services::vendors::{SetAvailabilityRequest, VendorResponse},
    ApiResponse, ApiResult, AppState,
};

#[utoipa::path(
    put,
    path = "/api/v1/vendors/{id}/availability",
    summary = "Set vendor availability",
    description = "Presence toggle from the vendor app",
    params(("id" = Uuid, Path, description = "Vendor id")),
    request_body = SetAvailabilityRequest,
    responses(
        (status = 200, description = "Availability updated", body = ApiResponse<VendorResponse>),
        (status = 403, description = "Not this vendor", body = crate::errors::ErrorResponse),
        (status = 404, description = "Vendor not found", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = []))
)]
pub async fn set_availability(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    auth_user: AuthUser,
    Json(request): Json<SetAvailabilityRequest>,
) -> ApiResult<VendorResponse> {
    let vendor = state
        .services
        .vendors
        .set_availability(&auth_user, id, request.is_available)
        .await?;
    Ok(Json(ApiResponse::success(vendor.into())))
}
