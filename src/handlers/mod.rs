pub mod health;
pub mod orders;
pub mod prices;
pub mod vendors;

use crate::db::DbPool;
use crate::events::EventSender;
use crate::services::{
    order_status::OrderStatusService, orders::OrderService, prices::PriceService,
    vendor_matching::VendorMatchingService, vendors::VendorService, wallet::WalletLedger,
};
use std::sync::Arc;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub orders: Arc<OrderService>,
    pub matching: Arc<VendorMatchingService>,
    pub order_status: Arc<OrderStatusService>,
    pub prices: Arc<PriceService>,
    pub vendors: Arc<VendorService>,
    pub wallet: Arc<WalletLedger>,
}

impl AppServices {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Option<Arc<EventSender>>) -> Self {
        Self {
            orders: Arc::new(OrderService::new(db_pool.clone(), event_sender.clone())),
            matching: Arc::new(VendorMatchingService::new(db_pool.clone(), event_sender.clone())),
            order_status: Arc::new(OrderStatusService::new(db_pool.clone(), event_sender)),
            prices: Arc::new(PriceService::new(db_pool.clone())),
            vendors: Arc::new(VendorService::new(db_pool.clone())),
            wallet: Arc::new(WalletLedger::new(db_pool)),
        }
    }
}
