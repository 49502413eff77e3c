pub mod order_status;
pub mod pickup;

pub use order_status::OrderStatus;
pub use pickup::{CompletionEvent, PickupItem, PickupItems, ScrapCategory, VendorSummary};
