pub mod market_rate;
pub mod order;
pub mod scrap_material;
pub mod vendor;
pub mod wallet_transaction;
