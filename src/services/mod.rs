// Pickup lifecycle
pub mod order_status;
pub mod orders;
pub mod vendor_matching;

// Directory and market data
pub mod prices;
pub mod vendors;

// Ledger collaborator fed by completion events
pub mod wallet;
