use anyhow::Result;
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use sea_orm_migration::prelude::*;
use std::time::Duration;
use tracing::{error, info};

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240101_000001_create_requirements_table::Migration),
            Box::new(m20240101_000002_create_requirement_items_table::Migration),
            Box::new(m20240101_000003_create_requirement_approvals_table::Migration),
        ]
    }
}

#[derive(DeriveIden)]
enum Requirements {
    Table,
    Id,
    Title,
    Description,
    Status,
    Priority,
    CreatedBy,
    CreatedByName,
    CompanyId,
    CostCenter,
    PaymentMethod,
    PaymentTerm,
    Warranty,
    WarrantyDuration,
    AdditionalConditions,
    Attachments,
    TotalPrice,
    Currency,
    CancellationReason,
    Version,
    ReviewRound,
    CreatedAt,
    UpdatedAt,
    SubmittedAt,
    ApprovedAt,
    RejectedAt,
    CompletedAt,
    CancelledAt,
}

#[derive(DeriveIden)]
enum RequirementItems {
    Table,
    Id,
    RequirementId,
    LineNumber,
    Name,
    Description,
    Quantity,
    UnitOfMeasure,
    EstimatedPrice,
    Currency,
    Category,
    Subcategory,
    Specifications,
    Attachments,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum RequirementApprovals {
    Table,
    Id,
    RequirementId,
    ApproverId,
    ApproverName,
    Status,
    Comments,
    ReviewRound,
    CreatedAt,
}

mod m20240101_000001_create_requirements_table {
    use super::Requirements;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000001_create_requirements_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Requirements::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Requirements::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Requirements::Title).string_len(200).not_null())
                        .col(ColumnDef::new(Requirements::Description).text().null())
                        .col(ColumnDef::new(Requirements::Status).string_len(32).not_null())
                        .col(ColumnDef::new(Requirements::Priority).string_len(16).not_null())
                        .col(ColumnDef::new(Requirements::CreatedBy).string().not_null())
                        .col(ColumnDef::new(Requirements::CreatedByName).string().not_null())
                        .col(ColumnDef::new(Requirements::CompanyId).string().null())
                        .col(ColumnDef::new(Requirements::CostCenter).string().null())
                        .col(ColumnDef::new(Requirements::PaymentMethod).string_len(32).null())
                        .col(ColumnDef::new(Requirements::PaymentTerm).string().null())
                        .col(ColumnDef::new(Requirements::Warranty).boolean().null())
                        .col(ColumnDef::new(Requirements::WarrantyDuration).integer().null())
                        .col(ColumnDef::new(Requirements::AdditionalConditions).text().null())
                        .col(ColumnDef::new(Requirements::Attachments).json().not_null())
                        .col(
                            ColumnDef::new(Requirements::TotalPrice)
                                .decimal_len(19, 4)
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(Requirements::Currency).string_len(3).not_null())
                        .col(ColumnDef::new(Requirements::CancellationReason).text().null())
                        .col(
                            ColumnDef::new(Requirements::Version)
                                .integer()
                                .not_null()
                                .default(1),
                        )
                        .col(
                            ColumnDef::new(Requirements::ReviewRound)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Requirements::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Requirements::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Requirements::SubmittedAt).timestamp_with_time_zone().null())
                        .col(ColumnDef::new(Requirements::ApprovedAt).timestamp_with_time_zone().null())
                        .col(ColumnDef::new(Requirements::RejectedAt).timestamp_with_time_zone().null())
                        .col(ColumnDef::new(Requirements::CompletedAt).timestamp_with_time_zone().null())
                        .col(ColumnDef::new(Requirements::CancelledAt).timestamp_with_time_zone().null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_requirements_status")
                        .table(Requirements::Table)
                        .col(Requirements::Status)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_requirements_created_by")
                        .table(Requirements::Table)
                        .col(Requirements::CreatedBy)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_requirements_created_at")
                        .table(Requirements::Table)
                        .col(Requirements::CreatedAt)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Requirements::Table).to_owned())
                .await
        }
    }
}

mod m20240101_000002_create_requirement_items_table {
    use super::{RequirementItems, Requirements};
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000002_create_requirement_items_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(RequirementItems::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(RequirementItems::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(RequirementItems::RequirementId).uuid().not_null())
                        .col(ColumnDef::new(RequirementItems::LineNumber).integer().not_null())
                        .col(ColumnDef::new(RequirementItems::Name).string_len(200).not_null())
                        .col(ColumnDef::new(RequirementItems::Description).text().null())
                        .col(
                            ColumnDef::new(RequirementItems::Quantity)
                                .decimal_len(19, 4)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(RequirementItems::UnitOfMeasure)
                                .string_len(32)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(RequirementItems::EstimatedPrice)
                                .decimal_len(19, 4)
                                .null(),
                        )
                        .col(ColumnDef::new(RequirementItems::Currency).string_len(3).not_null())
                        .col(ColumnDef::new(RequirementItems::Category).string().null())
                        .col(ColumnDef::new(RequirementItems::Subcategory).string().null())
                        .col(ColumnDef::new(RequirementItems::Specifications).json().null())
                        .col(ColumnDef::new(RequirementItems::Attachments).json().not_null())
                        .col(
                            ColumnDef::new(RequirementItems::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(RequirementItems::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_requirement_items_requirement")
                                .from(RequirementItems::Table, RequirementItems::RequirementId)
                                .to(Requirements::Table, Requirements::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_requirement_items_requirement_line")
                        .table(RequirementItems::Table)
                        .col(RequirementItems::RequirementId)
                        .col(RequirementItems::LineNumber)
                        .unique()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(RequirementItems::Table).to_owned())
                .await
        }
    }
}

mod m20240101_000003_create_requirement_approvals_table {
    use super::{RequirementApprovals, Requirements};
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000003_create_requirement_approvals_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(RequirementApprovals::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(RequirementApprovals::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(RequirementApprovals::RequirementId)
                                .uuid()
                                .not_null(),
                        )
                        .col(ColumnDef::new(RequirementApprovals::ApproverId).string().not_null())
                        .col(
                            ColumnDef::new(RequirementApprovals::ApproverName)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(RequirementApprovals::Status)
                                .string_len(16)
                                .not_null(),
                        )
                        .col(ColumnDef::new(RequirementApprovals::Comments).text().null())
                        .col(
                            ColumnDef::new(RequirementApprovals::ReviewRound)
                                .integer()
                                .not_null()
                                .default(1),
                        )
                        .col(
                            ColumnDef::new(RequirementApprovals::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_requirement_approvals_requirement")
                                .from(
                                    RequirementApprovals::Table,
                                    RequirementApprovals::RequirementId,
                                )
                                .to(Requirements::Table, Requirements::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_requirement_approvals_requirement_round")
                        .table(RequirementApprovals::Table)
                        .col(RequirementApprovals::RequirementId)
                        .col(RequirementApprovals::ReviewRound)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(RequirementApprovals::Table).to_owned())
                .await
        }
    }
}

/// Opens a small connection pool for running migrations against `db_url`.
pub async fn connect(db_url: &str) -> Result<DatabaseConnection> {
    info!("Setting up database connection for migrations");

    let mut opt = ConnectOptions::new(db_url);
    opt.max_connections(2)
        .min_connections(1)
        .connect_timeout(Duration::from_secs(30))
        .acquire_timeout(Duration::from_secs(30))
        .sqlx_logging(false);

    Database::connect(opt).await.map_err(|e| {
        error!("Migration connection failed: {}", e);
        e.into()
    })
}
