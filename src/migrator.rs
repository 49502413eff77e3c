use anyhow::Result;
use sea_orm::{ConnectOptions, Database};
use sea_orm_migration::prelude::*;
use std::time::Duration;
use tracing::{error, info};

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240301_000001_create_vendors_table::Migration),
            Box::new(m20240301_000002_create_orders_table::Migration),
            Box::new(m20240301_000003_create_price_tables::Migration),
            Box::new(m20240301_000004_create_wallet_transactions_table::Migration),
        ]
    }
}

// Migration implementations

mod m20240301_000001_create_vendors_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000001_create_vendors_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Vendors::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Vendors::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Vendors::Name).string().not_null())
                        .col(ColumnDef::new(Vendors::Phone).string().not_null())
                        .col(
                            ColumnDef::new(Vendors::Rating)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Vendors::IsAvailable)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(
                            ColumnDef::new(Vendors::IsVerified)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(
                            ColumnDef::new(Vendors::TotalPickups)
                                .big_integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Vendors::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Vendors::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            // Matching scans eligible vendors by load
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_vendors_eligibility_load")
                        .table(Vendors::Table)
                        .col(Vendors::IsAvailable)
                        .col(Vendors::IsVerified)
                        .col(Vendors::TotalPickups)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Vendors::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum Vendors {
        Table,
        Id,
        Name,
        Phone,
        Rating,
        IsAvailable,
        IsVerified,
        TotalPickups,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240301_000002_create_orders_table {

    use super::m20240301_000001_create_vendors_table::Vendors;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000002_create_orders_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            // Aligned with entities::order Model
            manager
                .create_table(
                    Table::create()
                        .table(Orders::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Orders::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Orders::RequesterId).string().not_null())
                        .col(ColumnDef::new(Orders::Address).string().not_null())
                        .col(ColumnDef::new(Orders::City).string().null())
                        .col(ColumnDef::new(Orders::ScheduledDate).date().not_null())
                        .col(ColumnDef::new(Orders::ScheduledTime).string().not_null())
                        .col(ColumnDef::new(Orders::Items).json().not_null())
                        .col(ColumnDef::new(Orders::Notes).string().null())
                        .col(
                            ColumnDef::new(Orders::Status)
                                .string()
                                .not_null()
                                .default("pending"),
                        )
                        .col(ColumnDef::new(Orders::VendorId).uuid().null())
                        .col(ColumnDef::new(Orders::EstimatedValue).decimal().null())
                        .col(ColumnDef::new(Orders::SettledAmount).decimal().null())
                        .col(
                            ColumnDef::new(Orders::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Orders::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_orders_vendor_id")
                                .from(Orders::Table, Orders::VendorId)
                                .to(Vendors::Table, Vendors::Id),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_orders_requester_id")
                        .table(Orders::Table)
                        .col(Orders::RequesterId)
                        .col(Orders::CreatedAt)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_orders_status")
                        .table(Orders::Table)
                        .col(Orders::Status)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_orders_vendor_id")
                        .table(Orders::Table)
                        .col(Orders::VendorId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Orders::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum Orders {
        Table,
        Id,
        RequesterId,
        Address,
        City,
        ScheduledDate,
        ScheduledTime,
        Items,
        Notes,
        Status,
        VendorId,
        EstimatedValue,
        SettledAmount,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240301_000003_create_price_tables {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000003_create_price_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(ScrapMaterials::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ScrapMaterials::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(ScrapMaterials::Name).string().not_null())
                        .col(ColumnDef::new(ScrapMaterials::Category).string().not_null())
                        .col(
                            ColumnDef::new(ScrapMaterials::PricePerKg)
                                .decimal()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ScrapMaterials::Unit)
                                .string()
                                .not_null()
                                .default("kg"),
                        )
                        .col(
                            ColumnDef::new(ScrapMaterials::IsActive)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(ScrapMaterials::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_scrap_materials_category")
                        .table(ScrapMaterials::Table)
                        .col(ScrapMaterials::Category)
                        .col(ScrapMaterials::Name)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(MarketRates::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(MarketRates::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(MarketRates::MaterialId).uuid().not_null())
                        .col(
                            ColumnDef::new(MarketRates::PricePerKg)
                                .decimal()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(MarketRates::RecordedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_market_rates_material_id")
                                .from(MarketRates::Table, MarketRates::MaterialId)
                                .to(ScrapMaterials::Table, ScrapMaterials::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_market_rates_material_recorded")
                        .table(MarketRates::Table)
                        .col(MarketRates::MaterialId)
                        .col(MarketRates::RecordedAt)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(MarketRates::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(ScrapMaterials::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum ScrapMaterials {
        Table,
        Id,
        Name,
        Category,
        PricePerKg,
        Unit,
        IsActive,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    enum MarketRates {
        Table,
        Id,
        MaterialId,
        PricePerKg,
        RecordedAt,
    }
}

mod m20240301_000004_create_wallet_transactions_table {

    use super::m20240301_000002_create_orders_table::Orders;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000004_create_wallet_transactions_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(WalletTransactions::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(WalletTransactions::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(WalletTransactions::UserId).string().not_null())
                        .col(
                            ColumnDef::new(WalletTransactions::OrderId)
                                .uuid()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(WalletTransactions::Amount).decimal().not_null())
                        .col(ColumnDef::new(WalletTransactions::Kind).string().not_null())
                        .col(ColumnDef::new(WalletTransactions::Description).string().null())
                        .col(
                            ColumnDef::new(WalletTransactions::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_wallet_transactions_order_id")
                                .from(WalletTransactions::Table, WalletTransactions::OrderId)
                                .to(Orders::Table, Orders::Id),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_wallet_transactions_user_id")
                        .table(WalletTransactions::Table)
                        .col(WalletTransactions::UserId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(WalletTransactions::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum WalletTransactions {
        Table,
        Id,
        UserId,
        OrderId,
        Amount,
        Kind,
        Description,
        CreatedAt,
    }
}

// Database migration CLI runner
pub async fn run_migration(db_url: &str) -> Result<()> {
    info!("Setting up database connection for migrations");

    let mut opt = ConnectOptions::new(db_url);
    opt.max_connections(5)
        .min_connections(1)
        .connect_timeout(Duration::from_secs(30))
        .acquire_timeout(Duration::from_secs(30))
        .sqlx_logging(true);

    let db = Database::connect(opt).await?;

    info!("Running database migrations");

    match Migrator::up(&db, None).await {
        Ok(_) => {
            info!("Migrations completed successfully");
            Ok(())
        }
        Err(e) => {
            error!("Migration failed: {}", e);
            Err(e.into())
        }
    }
}
