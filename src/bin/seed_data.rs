//! Seed data script - populates the database with demo vendors and the
//! market price list, and mints bearer tokens for local testing.
//!
//! Run with: cargo run --bin seed-data -- all
//!
//! This creates:
//! - 5 vendors (four eligible, one awaiting verification)
//! - 22 scrap materials across seven categories
//! - two market rates per material, so the price feed shows a trend

use std::sync::Arc;

use anyhow::Context;
use chrono::{Duration, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::info;

use scrapx_api::{
    auth::{AuthConfig, AuthService, ROLE_ADMIN, ROLE_CUSTOMER, ROLE_SERVICE, ROLE_VENDOR},
    config::{self, AppConfig},
    db,
    models::ScrapCategory,
    services::{
        prices::{NewMaterial, PriceService},
        vendors::{RegisterVendorRequest, VendorService},
    },
};

#[derive(Parser)]
#[command(name = "seed-data", about = "Seed the ScrapX database and mint dev tokens")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run database migrations
    Migrate,
    /// Register demo vendors
    Vendors,
    /// Load the price list with rate history
    Materials,
    /// Migrate, then seed vendors and materials
    All,
    /// Print a signed bearer token
    Token {
        #[arg(long, help = "Token subject (requester id or vendor id)")]
        subject: String,
        #[arg(long, value_enum, default_value_t = Role::Customer)]
        role: Role,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Role {
    Customer,
    Vendor,
    Service,
    Admin,
}

impl Role {
    fn as_claim(self) -> &'static str {
        match self {
            Role::Customer => ROLE_CUSTOMER,
            Role::Vendor => ROLE_VENDOR,
            Role::Service => ROLE_SERVICE,
            Role::Admin => ROLE_ADMIN,
        }
    }
}

// name, category, unit, previous price, current price
const PRICE_LIST: &[(&str, ScrapCategory, &str, Decimal, Decimal)] = &[
    ("Iron/Steel", ScrapCategory::Metal, "kg", dec!(26), dec!(28)),
    ("Copper Wire", ScrapCategory::Metal, "kg", dec!(435), dec!(450)),
    ("Aluminum", ScrapCategory::Metal, "kg", dec!(95), dec!(95)),
    ("Brass", ScrapCategory::Metal, "kg", dec!(340), dec!(350)),
    ("Stainless Steel", ScrapCategory::Metal, "kg", dec!(45), dec!(45)),
    ("PET Bottles", ScrapCategory::Plastic, "kg", dec!(19), dec!(18)),
    ("HDPE", ScrapCategory::Plastic, "kg", dec!(25), dec!(25)),
    ("PP Plastic", ScrapCategory::Plastic, "kg", dec!(20), dec!(22)),
    ("PVC", ScrapCategory::Plastic, "kg", dec!(17), dec!(15)),
    ("Newspaper", ScrapCategory::Paper, "kg", dec!(12), dec!(12)),
    ("Cardboard", ScrapCategory::Paper, "kg", dec!(11), dec!(10)),
    ("Office Paper", ScrapCategory::Paper, "kg", dec!(13), dec!(14)),
    ("Books/Magazines", ScrapCategory::Paper, "kg", dec!(8), dec!(8)),
    ("Circuit Boards", ScrapCategory::EWaste, "kg", dec!(175), dec!(200)),
    ("Old Phones", ScrapCategory::EWaste, "piece", dec!(150), dec!(150)),
    ("Laptop/Computer", ScrapCategory::EWaste, "kg", dec!(75), dec!(80)),
    ("Batteries", ScrapCategory::EWaste, "kg", dec!(75), dec!(75)),
    ("Glass Bottles", ScrapCategory::Glass, "kg", dec!(3), dec!(3)),
    ("Broken Glass", ScrapCategory::Glass, "kg", dec!(2.5), dec!(2)),
    ("Cotton Clothes", ScrapCategory::Textile, "kg", dec!(20), dec!(20)),
    ("Denim/Jeans", ScrapCategory::Textile, "kg", dec!(22), dec!(25)),
    ("Synthetic Fabric", ScrapCategory::Textile, "kg", dec!(15), dec!(15)),
];

// name, phone, rating, available, verified
const VENDORS: &[(&str, &str, Decimal, bool, bool)] = &[
    ("GreenCycle Collectors", "+91-9810000001", dec!(4.8), true, true),
    ("Kabadiwala Express", "+91-9810000002", dec!(4.5), true, true),
    ("MetalMart Pickups", "+91-9810000003", dec!(4.2), true, true),
    ("EcoHaul Services", "+91-9810000004", dec!(4.6), false, true),
    ("New Leaf Recyclers", "+91-9810000005", dec!(4.0), true, false),
];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config().context("failed to load configuration")?;
    config::init_tracing(cfg.log_level(), false);

    match cli.command {
        Command::Migrate => {
            scrapx_api::migrator::run_migration(&cfg.database_url).await?;
        }
        Command::Vendors => {
            let pool = connect(&cfg).await?;
            seed_vendors(&VendorService::new(pool)).await?;
        }
        Command::Materials => {
            let pool = connect(&cfg).await?;
            seed_materials(&PriceService::new(pool)).await?;
        }
        Command::All => {
            let pool = connect(&cfg).await?;
            db::run_migrations(&pool).await?;
            seed_vendors(&VendorService::new(pool.clone())).await?;
            seed_materials(&PriceService::new(pool)).await?;
            info!("Seed data complete. Try: curl http://localhost:8080/api/v1/prices");
        }
        Command::Token { subject, role } => {
            let auth = AuthService::new(AuthConfig::from(&cfg));
            let token = auth.generate_token(&subject, &[role.as_claim()])?;
            println!("{token}");
        }
    }

    Ok(())
}

async fn connect(cfg: &AppConfig) -> anyhow::Result<Arc<db::DbPool>> {
    info!("Connecting to database: {}", cfg.database_url);
    let pool = db::establish_connection_from_app_config(cfg).await?;
    Ok(Arc::new(pool))
}

async fn seed_vendors(vendors: &VendorService) -> anyhow::Result<()> {
    info!("Creating vendors...");
    for (name, phone, rating, is_available, is_verified) in VENDORS {
        let vendor = vendors
            .register_vendor(RegisterVendorRequest {
                name: name.to_string(),
                phone: phone.to_string(),
                rating: *rating,
                is_available: *is_available,
                is_verified: *is_verified,
            })
            .await?;
        info!("  {} ({})", vendor.name, vendor.id);
    }
    info!("  Created {} vendors", VENDORS.len());
    Ok(())
}

async fn seed_materials(prices: &PriceService) -> anyhow::Result<()> {
    info!("Creating materials...");
    let now = Utc::now();
    for (name, category, unit, previous, current) in PRICE_LIST {
        let material = prices
            .add_material(NewMaterial {
                name: name.to_string(),
                category: *category,
                price_per_kg: *current,
                unit: Some(unit.to_string()),
            })
            .await?;
        prices
            .record_rate_at(material.id, *previous, now - Duration::days(1))
            .await?;
        prices.record_rate_at(material.id, *current, now).await?;
    }
    info!("  Created {} materials with rate history", PRICE_LIST.len());
    Ok(())
}
