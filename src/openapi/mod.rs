use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "ScrapX Pickup API",
        version = "1.0.0",
        description = r#"
# ScrapX Pickup API

Backend for scheduling scrap-material pickups.

## Features

- **Pickup Orders**: Request a pickup, edit logistics while pending, cancel
- **Vendor Matching**: Each order is bound to exactly one available, verified vendor
- **Tracking**: Four-checkpoint timeline from request to completed pickup
- **Market Prices**: Per-kg rates with trend against the previous observation

## Authentication

Every endpoint except `/health` and `/api/v1/prices` requires a JWT:

```
Authorization: Bearer <your-jwt-token>
```

## Error Handling

Failures share one body; `code` is machine-readable:

```json
{
  "error": "Conflict",
  "code": "already_assigned",
  "message": "Order ... is already assigned to vendor ...",
  "request_id": "2f0c...",
  "timestamp": "2026-01-01T00:00:00Z"
}
```
        "#,
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "Orders", description = "Pickup order lifecycle"),
        (name = "Prices", description = "Market price feed"),
        (name = "Vendors", description = "Vendor presence"),
        (name = "Health", description = "Health check endpoints")
    ),
    paths(
        // Orders
        crate::handlers::orders::create_order,
        crate::handlers::orders::list_orders,
        crate::handlers::orders::get_order,
        crate::handlers::orders::update_order,
        crate::handlers::orders::assign_vendor,
        crate::handlers::orders::cancel_order,
        crate::handlers::orders::get_tracking,
        crate::handlers::orders::advance_status,

        // Prices
        crate::handlers::prices::list_prices,

        // Vendors
        crate::handlers::vendors::set_availability,

        // Health
        crate::handlers::health::health_check,
    ),
    components(
        schemas(
            crate::models::OrderStatus,
            crate::models::ScrapCategory,
            crate::models::PickupItem,
            crate::models::VendorSummary,
            crate::models::CompletionEvent,
            crate::services::orders::CreateOrderRequest,
            crate::services::orders::UpdateLogisticsRequest,
            crate::services::orders::OrderResponse,
            crate::services::orders::OrderListResponse,
            crate::services::orders::OrderFilter,
            crate::services::vendor_matching::AssignmentResponse,
            crate::services::order_status::TrackingView,
            crate::services::order_status::Checkpoint,
            crate::services::order_status::AdvanceStatusRequest,
            crate::services::order_status::AdvanceOutcome,
            crate::services::prices::MaterialPrice,
            crate::services::prices::PriceListResponse,
            crate::services::prices::Trend,
            crate::services::vendors::SetAvailabilityRequest,
            crate::services::vendors::VendorResponse,
            crate::handlers::health::HealthResponse,

            // Error types
            crate::errors::ErrorResponse
        )
    ),
    modifiers(&BearerAuth)
)]
pub struct ApiDocV1;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "Bearer",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDocV1::openapi())
        .config(utoipa_swagger_ui::Config::from("/api-docs/openapi.json").try_it_out_enabled(true))
}
