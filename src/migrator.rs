use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240115_000001_create_fleet_tables::Migration),
            Box::new(m20240115_000002_create_contract_tables::Migration),
            Box::new(m20240115_000003_create_billing_tables::Migration),
            Box::new(m20240115_000004_create_stock_tables::Migration),
            Box::new(m20240115_000005_create_analysis_tables::Migration),
        ]
    }
}

// Migration implementations

mod m20240115_000001_create_fleet_tables {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240115_000001_create_fleet_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Motos::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Motos::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Motos::LicensePlate).string().not_null())
                        .col(ColumnDef::new(Motos::Model).string().not_null())
                        .col(ColumnDef::new(Motos::Status).string().not_null())
                        .col(ColumnDef::new(Motos::InsuranceExpires).date())
                        .col(ColumnDef::new(Motos::PurchasePrice).decimal_len(19, 4))
                        .col(
                            ColumnDef::new(Motos::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Motos::UpdatedAt).timestamp_with_time_zone())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_motos_status")
                        .table(Motos::Table)
                        .col(Motos::Status)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(VehicleDocuments::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(VehicleDocuments::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(VehicleDocuments::MotoId).uuid().not_null())
                        .col(ColumnDef::new(VehicleDocuments::DocType).string().not_null())
                        .col(ColumnDef::new(VehicleDocuments::ExpiresOn).date())
                        .col(
                            ColumnDef::new(VehicleDocuments::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_vehicle_documents_moto")
                                .from(VehicleDocuments::Table, VehicleDocuments::MotoId)
                                .to(Motos::Table, Motos::Id),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_vehicle_documents_expires_on")
                        .table(VehicleDocuments::Table)
                        .col(VehicleDocuments::ExpiresOn)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(VehicleDocuments::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Motos::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum Motos {
        Table,
        Id,
        LicensePlate,
        Model,
        Status,
        InsuranceExpires,
        PurchasePrice,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    pub(super) enum VehicleDocuments {
        Table,
        Id,
        MotoId,
        DocType,
        ExpiresOn,
        CreatedAt,
    }
}

mod m20240115_000002_create_contract_tables {

    use sea_orm_migration::prelude::*;

    use super::m20240115_000001_create_fleet_tables::Motos;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240115_000002_create_contract_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(RentalContracts::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(RentalContracts::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(RentalContracts::MotoId).uuid().not_null())
                        .col(ColumnDef::new(RentalContracts::ClientId).uuid().not_null())
                        .col(ColumnDef::new(RentalContracts::Status).string().not_null())
                        .col(ColumnDef::new(RentalContracts::StartDate).date().not_null())
                        .col(ColumnDef::new(RentalContracts::EndDate).date())
                        .col(
                            ColumnDef::new(RentalContracts::MonthlyAmount)
                                .decimal_len(19, 4)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(RentalContracts::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_rental_contracts_moto")
                                .from(RentalContracts::Table, RentalContracts::MotoId)
                                .to(Motos::Table, Motos::Id),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_rental_contracts_moto_id")
                        .table(RentalContracts::Table)
                        .col(RentalContracts::MotoId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Payments::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Payments::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Payments::ContractId).uuid().not_null())
                        .col(ColumnDef::new(Payments::ClientId).uuid().not_null())
                        .col(
                            ColumnDef::new(Payments::Amount)
                                .decimal_len(19, 4)
                                .not_null(),
                        )
                        .col(ColumnDef::new(Payments::Status).string().not_null())
                        .col(ColumnDef::new(Payments::DueDate).date().not_null())
                        .col(ColumnDef::new(Payments::PaidAt).timestamp_with_time_zone())
                        .col(
                            ColumnDef::new(Payments::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Payments::UpdatedAt).timestamp_with_time_zone())
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_payments_contract")
                                .from(Payments::Table, Payments::ContractId)
                                .to(RentalContracts::Table, RentalContracts::Id),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_payments_contract_id")
                        .table(Payments::Table)
                        .col(Payments::ContractId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_payments_status")
                        .table(Payments::Table)
                        .col(Payments::Status)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Payments::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(RentalContracts::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum RentalContracts {
        Table,
        Id,
        MotoId,
        ClientId,
        Status,
        StartDate,
        EndDate,
        MonthlyAmount,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    pub(super) enum Payments {
        Table,
        Id,
        ContractId,
        ClientId,
        Amount,
        Status,
        DueDate,
        PaidAt,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240115_000003_create_billing_tables {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240115_000003_create_billing_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Invoices::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Invoices::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Invoices::PaymentId).uuid())
                        .col(
                            ColumnDef::new(Invoices::Total)
                                .decimal_len(19, 4)
                                .not_null(),
                        )
                        .col(ColumnDef::new(Invoices::Status).string().not_null())
                        .col(ColumnDef::new(Invoices::IssuedAt).timestamp_with_time_zone())
                        .col(
                            ColumnDef::new(Invoices::CreatedAt)
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
                        .name("idx_invoices_status")
                        .table(Invoices::Table)
                        .col(Invoices::Status)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Expenses::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Expenses::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Expenses::Category).string().not_null())
                        .col(
                            ColumnDef::new(Expenses::Amount)
                                .decimal_len(19, 4)
                                .not_null(),
                        )
                        .col(ColumnDef::new(Expenses::Description).string())
                        .col(ColumnDef::new(Expenses::MotoId).uuid())
                        .col(
                            ColumnDef::new(Expenses::IncurredAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Expenses::CreatedAt)
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
                        .name("idx_expenses_category_incurred_at")
                        .table(Expenses::Table)
                        .col(Expenses::Category)
                        .col(Expenses::IncurredAt)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(MonthlyBudgets::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(MonthlyBudgets::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(MonthlyBudgets::Category).string().not_null())
                        .col(ColumnDef::new(MonthlyBudgets::Year).integer().not_null())
                        .col(ColumnDef::new(MonthlyBudgets::Month).integer().not_null())
                        .col(
                            ColumnDef::new(MonthlyBudgets::Amount)
                                .decimal_len(19, 4)
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_monthly_budgets_period_category")
                        .table(MonthlyBudgets::Table)
                        .col(MonthlyBudgets::Year)
                        .col(MonthlyBudgets::Month)
                        .col(MonthlyBudgets::Category)
                        .unique()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(MonthlyBudgets::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Expenses::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Invoices::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum Invoices {
        Table,
        Id,
        PaymentId,
        Total,
        Status,
        IssuedAt,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    pub(super) enum Expenses {
        Table,
        Id,
        Category,
        Amount,
        Description,
        MotoId,
        IncurredAt,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    pub(super) enum MonthlyBudgets {
        Table,
        Id,
        Category,
        Year,
        Month,
        Amount,
    }
}

mod m20240115_000004_create_stock_tables {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240115_000004_create_stock_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(StockItems::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(StockItems::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(StockItems::Name).string().not_null())
                        .col(
                            ColumnDef::new(StockItems::CurrentStock)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockItems::MinimumStock)
                                .integer()
                                .not_null(),
                        )
                        .col(ColumnDef::new(StockItems::UnitCost).decimal_len(19, 4))
                        .col(
                            ColumnDef::new(StockItems::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(ColumnDef::new(StockItems::UpdatedAt).timestamp_with_time_zone())
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(StockMovements::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(StockMovements::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockMovements::StockItemId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockMovements::Quantity)
                                .integer()
                                .not_null(),
                        )
                        .col(ColumnDef::new(StockMovements::Reason).string())
                        .col(
                            ColumnDef::new(StockMovements::MovedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_stock_movements_item")
                                .from(StockMovements::Table, StockMovements::StockItemId)
                                .to(StockItems::Table, StockItems::Id),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_stock_movements_item_moved_at")
                        .table(StockMovements::Table)
                        .col(StockMovements::StockItemId)
                        .col(StockMovements::MovedAt)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(StockMovements::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(StockItems::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum StockItems {
        Table,
        Id,
        Name,
        CurrentStock,
        MinimumStock,
        UnitCost,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    pub(super) enum StockMovements {
        Table,
        Id,
        StockItemId,
        Quantity,
        Reason,
        MovedAt,
    }
}

mod m20240115_000005_create_analysis_tables {

    use sea_orm::{ConnectionTrait, DbBackend};
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240115_000005_create_analysis_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Anomalies::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Anomalies::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Anomalies::AnomalyType).string().not_null())
                        .col(ColumnDef::new(Anomalies::Severity).string().not_null())
                        .col(ColumnDef::new(Anomalies::Title).string().not_null())
                        .col(ColumnDef::new(Anomalies::Description).text().not_null())
                        .col(ColumnDef::new(Anomalies::SubjectType).string().not_null())
                        .col(ColumnDef::new(Anomalies::SubjectId).string().not_null())
                        .col(ColumnDef::new(Anomalies::AmountInvolved).decimal_len(19, 4))
                        .col(ColumnDef::new(Anomalies::AnalysisData).json().not_null())
                        .col(ColumnDef::new(Anomalies::Status).string().not_null())
                        .col(
                            ColumnDef::new(Anomalies::AutoDetected)
                                .boolean()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Anomalies::DetectedAt)
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
                        .name("idx_anomalies_type_subject")
                        .table(Anomalies::Table)
                        .col(Anomalies::AnomalyType)
                        .col(Anomalies::SubjectId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_anomalies_status")
                        .table(Anomalies::Table)
                        .col(Anomalies::Status)
                        .to_owned(),
                )
                .await?;

            // Postgres enforces the one-open-anomaly-per-subject invariant at
            // the storage layer; other backends rely on the guard query.
            if manager.get_database_backend() == DbBackend::Postgres {
                manager
                    .get_connection()
                    .execute_unprepared(
                        "CREATE UNIQUE INDEX IF NOT EXISTS uq_anomalies_open_subject \
                         ON anomalies (anomaly_type, subject_id) \
                         WHERE status IN ('New', 'InReview')",
                    )
                    .await?;
            }

            manager
                .create_table(
                    Table::create()
                        .table(FinancialSnapshots::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(FinancialSnapshots::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(FinancialSnapshots::PeriodType)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(FinancialSnapshots::PeriodKey)
                                .string()
                                .not_null(),
                        )
                        .col(ColumnDef::new(FinancialSnapshots::Metrics).json().not_null())
                        .col(ColumnDef::new(FinancialSnapshots::Trends).json())
                        .col(
                            ColumnDef::new(FinancialSnapshots::AlertsGenerated)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(FinancialSnapshots::AnalyzedAt)
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
                        .name("uq_financial_snapshots_period")
                        .table(FinancialSnapshots::Table)
                        .col(FinancialSnapshots::PeriodType)
                        .col(FinancialSnapshots::PeriodKey)
                        .unique()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(FinancialSnapshots::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Anomalies::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum Anomalies {
        Table,
        Id,
        AnomalyType,
        Severity,
        Title,
        Description,
        SubjectType,
        SubjectId,
        AmountInvolved,
        AnalysisData,
        Status,
        AutoDetected,
        DetectedAt,
    }

    #[derive(DeriveIden)]
    pub(super) enum FinancialSnapshots {
        Table,
        Id,
        PeriodType,
        PeriodKey,
        Metrics,
        Trends,
        AlertsGenerated,
        AnalyzedAt,
    }
}
