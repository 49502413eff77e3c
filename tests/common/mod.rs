#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::{self, Body},
    http::{header, Method, Request},
    response::Response,
    Router,
};
use chrono::{Duration as ChronoDuration, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, EntityTrait, Set};
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;
use uuid::Uuid;

use scrapx_api::{
    auth::{AuthUser, ROLE_CUSTOMER, ROLE_SERVICE, ROLE_VENDOR},
    config::AppConfig,
    db::{self, DbPool},
    entities::vendor,
    events::{self, EventHandler},
    models::{PickupItem, ScrapCategory},
    services::{
        orders::{CreateOrderRequest, OrderResponse},
        prices::NewMaterial,
        wallet::WalletLedger,
    },
    AppState,
};

pub const TEST_SECRET: &str =
    "scrapx-test-signing-key-9f3a7c1e5b8d2f4a6c0e9b7d5f3a1c8e6b4d2f0a9c7e5";

/// Helper harness for spinning up an application state backed by SQLite.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub db: Arc<DbPool>,
    pub ledger: Arc<WalletLedger>,
    _event_task: tokio::task::JoinHandle<()>,
    _dir: Option<TempDir>,
}

impl TestApp {
    /// Construct a new test application over a fresh in-memory database.
    pub async fn new() -> Self {
        // one connection keeps every query on the same in-memory database
        Self::build("sqlite::memory:".to_string(), 1, None).await
    }

    /// Same as [`TestApp::new`] but over a database file with a pool of
    /// several connections, so concurrent calls really overlap.
    pub async fn file_backed() -> Self {
        let dir = TempDir::new().expect("temp dir");
        let url = format!("sqlite://{}?mode=rwc", dir.path().join("scrapx.db").display());
        Self::build(url, 8, Some(dir)).await
    }

    async fn build(url: String, connections: u32, dir: Option<TempDir>) -> Self {
        let mut cfg = AppConfig::new(
            url,
            TEST_SECRET.to_string(),
            3600,
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );
        cfg.db_max_connections = connections;
        cfg.db_min_connections = 1;

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");
        let db = Arc::new(pool);

        let (sender, rx) = events::channel(cfg.event_channel_capacity);
        let state = AppState::new(db.clone(), cfg, Some(Arc::new(sender)));
        let ledger = state.services.wallet.clone();
        let handlers: Vec<Arc<dyn EventHandler>> = vec![ledger.clone()];
        let event_task = tokio::spawn(events::process_events(rx, handlers));

        let router = scrapx_api::app_router(state.clone());

        Self {
            router,
            state,
            db,
            ledger,
            _event_task: event_task,
            _dir: dir,
        }
    }

    pub fn customer(&self, id: &str) -> AuthUser {
        caller(id, ROLE_CUSTOMER)
    }

    pub fn vendor_caller(&self, vendor_id: Uuid) -> AuthUser {
        caller(&vendor_id.to_string(), ROLE_VENDOR)
    }

    pub fn service(&self) -> AuthUser {
        caller("dispatcher", ROLE_SERVICE)
    }

    pub fn token(&self, subject: &str, role: &str) -> String {
        self.state
            .auth
            .generate_token(subject, &[role])
            .expect("token")
    }

    /// Drive the real router with an optional bearer token and JSON body.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(path);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("request");

        self.router.clone().oneshot(request).await.expect("response")
    }

    /// Inserts a vendor with an explicit load. `age_minutes` orders
    /// registration time: larger means registered earlier.
    pub async fn seed_vendor(
        &self,
        name: &str,
        total_pickups: i64,
        is_available: bool,
        is_verified: bool,
        age_minutes: i64,
    ) -> vendor::Model {
        let now = Utc::now();
        vendor::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name.to_string()),
            phone: Set("+91-9000000000".to_string()),
            rating: Set(dec!(4.5)),
            is_available: Set(is_available),
            is_verified: Set(is_verified),
            total_pickups: Set(total_pickups),
            created_at: Set(now - ChronoDuration::minutes(age_minutes)),
            updated_at: Set(now),
        }
        .insert(&*self.db)
        .await
        .expect("insert vendor")
    }

    pub async fn vendor(&self, id: Uuid) -> vendor::Model {
        vendor::Entity::find_by_id(id)
            .one(&*self.db)
            .await
            .expect("query vendor")
            .expect("vendor exists")
    }

    pub async fn seed_material(&self, name: &str, category: ScrapCategory, price: Decimal) -> Uuid {
        self.state
            .services
            .prices
            .add_material(NewMaterial {
                name: name.to_string(),
                category,
                price_per_kg: price,
                unit: None,
            })
            .await
            .expect("insert material")
            .id
    }

    pub async fn create_order(&self, requester: &str) -> OrderResponse {
        self.state
            .services
            .orders
            .create_order(&self.customer(requester), order_request())
            .await
            .expect("create order")
    }

    /// Polls the ledger until the requester's balance is non-zero.
    pub async fn wait_for_balance(&self, user_id: &str) -> Decimal {
        for _ in 0..50 {
            let balance = self.ledger.balance(user_id).await.expect("balance");
            if balance > Decimal::ZERO {
                return balance;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        Decimal::ZERO
    }
}

pub fn caller(subject: &str, role: &str) -> AuthUser {
    AuthUser {
        user_id: subject.to_string(),
        roles: vec![role.to_string()],
        token_id: Uuid::new_v4().to_string(),
    }
}

pub fn order_request() -> CreateOrderRequest {
    CreateOrderRequest {
        address: "12 MG Road, Indiranagar".to_string(),
        city: Some("Bengaluru".to_string()),
        scheduled_date: "2026-11-02".to_string(),
        scheduled_time: "10:00 AM - 12:00 PM".to_string(),
        items: vec![PickupItem {
            category: ScrapCategory::Metal,
            approximate_quantity: dec!(2.5),
        }],
        notes: None,
    }
}

pub async fn response_json(response: Response) -> Value {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    serde_json::from_slice(&bytes).expect("json response")
}
