use axum::{
    extract::{Query, State},
    response::Json,
};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::{
    services::prices::PriceListResponse,
    ApiResponse, ApiResult, AppState,
};

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PriceQuery {
    /// Category filter, e.g. `metal`; `all` or absent lists everything
    pub category: Option<String>,
}

#[utoipa::path(
    get,
    path = "/api/v1/prices",
    summary = "Market prices",
    description = "Current per-kg rates with trend against the previous observation",
    params(PriceQuery),
    responses(
        (status = 200, description = "Price list", body = ApiResponse<PriceListResponse>),
        (status = 400, description = "Unknown category", body = crate::errors::ErrorResponse),
    )
)]
pub async fn list_prices(
    State(state): State<AppState>,
    Query(query): Query<PriceQuery>,
) -> ApiResult<PriceListResponse> {
    let materials = state
        .services
        .prices
        .list_prices(query.category.as_deref())
        .await?;
    Ok(Json(ApiResponse::success(PriceListResponse { materials })))
}
