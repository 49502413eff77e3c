use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    errors::ServiceError,
    services::{
        order_status::{AdvanceOutcome, AdvanceStatusRequest, TrackingView},
        orders::{
            CreateOrderRequest, ListOrdersQuery, OrderListResponse, OrderResponse,
            UpdateLogisticsRequest,
        },
        vendor_matching::AssignmentResponse,
    },
    ApiResponse, ApiResult, AppState,
};

#[utoipa::path(
    post,
    path = "/api/v1/orders",
    summary = "Create order",
    description = "Request a scrap pickup. The order starts in `pending` without a vendor.",
    request_body = CreateOrderRequest,
    responses(
        (status = 201, description = "Order created successfully", body = ApiResponse<OrderResponse>,
            headers(("X-Request-Id" = String, description = "Unique request id"))
        ),
        (status = 400, description = "Invalid request data", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn create_order(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(request): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<ApiResponse<OrderResponse>>), ServiceError> {
    let order = state.services.orders.create_order(&auth_user, request).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(order))))
}

#[utoipa::path(
    get,
    path = "/api/v1/orders",
    summary = "List orders",
    description = "Orders visible to the caller, newest first",
    params(ListOrdersQuery),
    responses(
        (status = 200, description = "Orders retrieved successfully", body = ApiResponse<OrderListResponse>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn list_orders(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Query(query): Query<ListOrdersQuery>,
) -> ApiResult<OrderListResponse> {
    let per_page = state.config.page_size(query.per_page);
    let orders = state
        .services
        .orders
        .list_orders(
            &auth_user,
            query.filter.unwrap_or_default(),
            query.page.unwrap_or(1),
            per_page,
        )
        .await?;
    Ok(Json(ApiResponse::success(orders)))
}

#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}",
    summary = "Get order",
    params(("id" = Uuid, Path, description = "Order id")),
    responses(
        (status = 200, description = "Order retrieved successfully", body = ApiResponse<OrderResponse>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = []))
)]
pub async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    auth_user: AuthUser,
) -> ApiResult<OrderResponse> {
    let order = state.services.orders.get_order(&auth_user, id).await?;
    Ok(Json(ApiResponse::success(order)))
}

#[utoipa::path(
    patch,
    path = "/api/v1/orders/{id}",
    summary = "Edit pickup logistics",
    description = "Change address, date, time or notes while the order is still pending",
    params(("id" = Uuid, Path, description = "Order id")),
    request_body = UpdateLogisticsRequest,
    responses(
        (status = 200, description = "Order updated", body = ApiResponse<OrderResponse>),
        (status = 400, description = "Invalid request data", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Order is no longer pending", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = []))
)]
pub async fn update_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    auth_user: AuthUser,
    Json(request): Json<UpdateLogisticsRequest>,
) -> ApiResult<OrderResponse> {
    let order = state
        .services
        .orders
        .update_logistics(&auth_user, id, request)
        .await?;
    Ok(Json(ApiResponse::success(order)))
}

#[utoipa::path(
    post,
    path = "/api/v1/orders/{id}/assign-vendor",
    summary = "Assign vendor",
    description = "Bind the least-loaded available, verified vendor to a pending order",
    params(("id" = Uuid, Path, description = "Order id")),
    responses(
        (status = 200, description = "Vendor assigned", body = ApiResponse<AssignmentResponse>),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Already assigned, cancelled, or lost a race", body = crate::errors::ErrorResponse),
        (status = 503, description = "No vendor available", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = []))
)]
pub async fn assign_vendor(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    auth_user: AuthUser,
) -> ApiResult<AssignmentResponse> {
    let assignment = state.services.matching.assign_vendor(&auth_user, id).await?;
    Ok(Json(ApiResponse::success(assignment)))
}

#[utoipa::path(
    post,
    path = "/api/v1/orders/{id}/cancel",
    summary = "Cancel order",
    params(("id" = Uuid, Path, description = "Order id")),
    responses(
        (status = 200, description = "Order cancelled", body = ApiResponse<OrderResponse>),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Order is no longer pending", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = []))
)]
pub async fn cancel_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    auth_user: AuthUser,
) -> ApiResult<OrderResponse> {
    let order = state.services.orders.cancel_order(&auth_user, id).await?;
    Ok(Json(ApiResponse::success(order)))
}

#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}/tracking",
    summary = "Track order",
    description = "Checkpoint timeline and assigned vendor",
    params(("id" = Uuid, Path, description = "Order id")),
    responses(
        (status = 200, description = "Tracking view", body = ApiResponse<TrackingView>),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = []))
)]
pub async fn get_tracking(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    auth_user: AuthUser,
) -> ApiResult<TrackingView> {
    let view = state.services.order_status.tracking(&auth_user, id).await?;
    Ok(Json(ApiResponse::success(view)))
}

#[utoipa::path(
    post,
    path = "/api/v1/orders/{id}/status",
    summary = "Advance order status",
    description = "Vendor-side progress update: `assigned -> in_transit -> completed`",
    params(("id" = Uuid, Path, description = "Order id")),
    request_body = AdvanceStatusRequest,
    responses(
        (status = 200, description = "Status advanced", body = ApiResponse<AdvanceOutcome>),
        (status = 400, description = "Unknown status or missing amount", body = crate::errors::ErrorResponse),
        (status = 403, description = "Not the assigned vendor", body = crate::errors::ErrorResponse),
        (status = 409, description = "Transition not allowed", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = []))
)]
pub async fn advance_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    auth_user: AuthUser,
    Json(request): Json<AdvanceStatusRequest>,
) -> ApiResult<AdvanceOutcome> {
    let outcome = state
        .services
        .order_status
        .advance_status(&auth_user, id, request)
        .await?;
    Ok(Json(ApiResponse::success(outcome)))
}
