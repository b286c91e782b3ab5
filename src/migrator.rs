use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20230101_000001_create_promo_program_table::Migration),
            Box::new(m20230101_000002_create_promo_config_table::Migration),
            Box::new(m20230101_000003_create_promo_transaction_table::Migration),
        ]
    }
}

/// Precision and scale for money columns.
///
/// SQLite stores decimals as `real` and sea-query caps their precision at 16;
/// other backends get a true `DECIMAL(20, 2)`.
pub(crate) fn amount_precision(backend: sea_orm::DbBackend) -> (u32, u32) {
    match backend {
        sea_orm::DbBackend::Sqlite => (16, 2),
        _ => (20, 2),
    }
}

// Migration implementations

mod m20230101_000001_create_promo_program_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20230101_000001_create_promo_program_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(PromoProgram::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(PromoProgram::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PromoProgram::CodeKey)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(PromoProgram::Quota).integer().not_null())
                        .col(
                            ColumnDef::new(PromoProgram::PeriodStart)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PromoProgram::PeriodEnd)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PromoProgram::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PromoProgram::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PromoProgram::DeletedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(PromoProgram::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum PromoProgram {
        Table,
        Id,
        CodeKey,
        Quota,
        PeriodStart,
        PeriodEnd,
        CreatedAt,
        UpdatedAt,
        DeletedAt,
    }
}

mod m20230101_000002_create_promo_config_table {

    use super::m20230101_000001_create_promo_program_table::PromoProgram;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20230101_000002_create_promo_config_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            let (precision, scale) = super::amount_precision(manager.get_database_backend());

            manager
                .create_table(
                    Table::create()
                        .table(PromoConfig::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(PromoConfig::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(PromoConfig::Quantity).integer().not_null())
                        .col(
                            ColumnDef::new(PromoConfig::MinTrx)
                                .decimal_len(precision, scale)
                                .not_null(),
                        )
                        .col(ColumnDef::new(PromoConfig::MaxTrx).decimal_len(precision, scale).null())
                        .col(
                            ColumnDef::new(PromoConfig::Prosentase)
                                .decimal_len(10, scale)
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(PromoConfig::ProgramId).uuid().not_null())
                        .col(
                            ColumnDef::new(PromoConfig::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PromoConfig::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PromoConfig::DeletedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_promo_config_program_id")
                                .from(PromoConfig::Table, PromoConfig::ProgramId)
                                .to(PromoProgram::Table, PromoProgram::Id)
                                .on_delete(ForeignKeyAction::Restrict)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_promo_config_program_quantity")
                        .table(PromoConfig::Table)
                        .col(PromoConfig::ProgramId)
                        .col(PromoConfig::Quantity)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(PromoConfig::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum PromoConfig {
        Table,
        Id,
        Quantity,
        MinTrx,
        MaxTrx,
        Prosentase,
        ProgramId,
        CreatedAt,
        UpdatedAt,
        DeletedAt,
    }
}

mod m20230101_000003_create_promo_transaction_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20230101_000003_create_promo_transaction_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            let (precision, scale) = super::amount_precision(manager.get_database_backend());

            manager
                .create_table(
                    Table::create()
                        .table(PromoTransaction::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(PromoTransaction::TransactionId)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PromoTransaction::TransactionTime)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(ColumnDef::new(PromoTransaction::CustomerId).uuid().not_null())
                        .col(ColumnDef::new(PromoTransaction::PromoCode).string().not_null())
                        .col(
                            ColumnDef::new(PromoTransaction::QuantityOrigin)
                                .integer()
                                .not_null(),
                        )
                        .col(ColumnDef::new(PromoTransaction::Quantity).integer().not_null())
                        .col(
                            ColumnDef::new(PromoTransaction::ActTrx)
                                .decimal_len(precision, scale)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PromoTransaction::Prosentase)
                                .decimal_len(10, scale)
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(PromoTransaction::Point).big_integer().not_null())
                        .col(
                            ColumnDef::new(PromoTransaction::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PromoTransaction::UpdatedAt)
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
                        .name("idx_promo_transaction_customer_id")
                        .table(PromoTransaction::Table)
                        .col(PromoTransaction::CustomerId)
                        .to_owned(),
                )
                .await?;

            // Quota lookups count by promo code
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_promo_transaction_promo_code")
                        .table(PromoTransaction::Table)
                        .col(PromoTransaction::PromoCode)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(PromoTransaction::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum PromoTransaction {
        Table,
        TransactionId,
        TransactionTime,
        CustomerId,
        PromoCode,
        QuantityOrigin,
        Quantity,
        ActTrx,
        Prosentase,
        Point,
        CreatedAt,
        UpdatedAt,
    }
}
