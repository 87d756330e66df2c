use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240901_000001_create_reference_tables::Migration),
            Box::new(m20240901_000002_create_lots_table::Migration),
            Box::new(m20240901_000003_create_setup_jobs_table::Migration),
            Box::new(m20240901_000004_create_batches_table::Migration),
            Box::new(m20240901_000005_create_cards_table::Migration),
            Box::new(m20240901_000006_create_setup_quantity_adjustments_table::Migration),
        ]
    }
}

mod m20240901_000001_create_reference_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240901_000001_create_reference_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Machines::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Machines::Id)
                                .integer()
                                .primary_key()
                                .auto_increment()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Machines::Name).string().not_null())
                        .col(ColumnDef::new(Machines::MachineType).string())
                        .col(
                            ColumnDef::new(Machines::IsActive)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(Machines::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Employees::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Employees::Id)
                                .integer()
                                .primary_key()
                                .auto_increment()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Employees::FullName).string().not_null())
                        .col(ColumnDef::new(Employees::RoleId).integer())
                        .col(
                            ColumnDef::new(Employees::IsActive)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(Employees::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Parts::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Parts::Id)
                                .integer()
                                .primary_key()
                                .auto_increment()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Parts::DrawingNumber).string().not_null())
                        .col(ColumnDef::new(Parts::Description).string())
                        .col(
                            ColumnDef::new(Parts::IsActive)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(Parts::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Parts::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Employees::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Machines::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    pub enum Machines {
        Table,
        Id,
        Name,
        MachineType,
        IsActive,
        CreatedAt,
    }

    #[derive(Iden)]
    pub enum Employees {
        Table,
        Id,
        FullName,
        RoleId,
        IsActive,
        CreatedAt,
    }

    #[derive(Iden)]
    pub enum Parts {
        Table,
        Id,
        DrawingNumber,
        Description,
        IsActive,
        CreatedAt,
    }
}

mod m20240901_000002_create_lots_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240901_000002_create_lots_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Lots::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Lots::Id)
                                .integer()
                                .primary_key()
                                .auto_increment()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Lots::LotNumber)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Lots::PartId).integer().not_null())
                        .col(ColumnDef::new(Lots::InitialPlannedQuantity).integer())
                        .col(
                            ColumnDef::new(Lots::AdditionalQuantity)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(Lots::Status).string_len(32).not_null())
                        .col(ColumnDef::new(Lots::AssignedMachineId).integer())
                        .col(ColumnDef::new(Lots::MachineQueuePosition).integer())
                        .col(ColumnDef::new(Lots::ReservedMaterialId).integer())
                        .col(ColumnDef::new(Lots::DueDate).timestamp_with_time_zone())
                        .col(ColumnDef::new(Lots::OrderManagerId).integer())
                        .col(
                            ColumnDef::new(Lots::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Lots::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_lots_part")
                                .from(Lots::Table, Lots::PartId)
                                .to(Parts::Table, Parts::Id),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Lots::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    pub enum Lots {
        Table,
        Id,
        LotNumber,
        PartId,
        InitialPlannedQuantity,
        AdditionalQuantity,
        Status,
        AssignedMachineId,
        MachineQueuePosition,
        ReservedMaterialId,
        DueDate,
        OrderManagerId,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(Iden)]
    pub enum Parts {
        Table,
        Id,
    }
}

mod m20240901_000003_create_setup_jobs_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240901_000003_create_setup_jobs_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(SetupJobs::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(SetupJobs::Id)
                                .integer()
                                .primary_key()
                                .auto_increment()
                                .not_null(),
                        )
                        .col(ColumnDef::new(SetupJobs::LotId).integer().not_null())
                        .col(ColumnDef::new(SetupJobs::PartId).integer().not_null())
                        .col(ColumnDef::new(SetupJobs::MachineId).integer().not_null())
                        .col(ColumnDef::new(SetupJobs::EmployeeId).integer())
                        .col(
                            ColumnDef::new(SetupJobs::PlannedQuantity)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(SetupJobs::AdditionalQuantity)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(SetupJobs::CycleTime).integer())
                        .col(ColumnDef::new(SetupJobs::Status).string_len(32).not_null())
                        .col(ColumnDef::new(SetupJobs::StartTime).timestamp_with_time_zone())
                        .col(ColumnDef::new(SetupJobs::EndTime).timestamp_with_time_zone())
                        .col(ColumnDef::new(SetupJobs::QaId).integer())
                        .col(ColumnDef::new(SetupJobs::QaDate).timestamp_with_time_zone())
                        .col(
                            ColumnDef::new(SetupJobs::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_setup_jobs_lot")
                                .from(SetupJobs::Table, SetupJobs::LotId)
                                .to(Lots::Table, Lots::Id),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_setup_jobs_machine")
                                .from(SetupJobs::Table, SetupJobs::MachineId)
                                .to(Machines::Table, Machines::Id),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_setup_jobs_lot_status")
                        .table(SetupJobs::Table)
                        .col(SetupJobs::LotId)
                        .col(SetupJobs::Status)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(SetupJobs::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    pub enum SetupJobs {
        Table,
        Id,
        LotId,
        PartId,
        MachineId,
        EmployeeId,
        PlannedQuantity,
        AdditionalQuantity,
        CycleTime,
        Status,
        StartTime,
        EndTime,
        QaId,
        QaDate,
        CreatedAt,
    }

    #[derive(Iden)]
    pub enum Lots {
        Table,
        Id,
    }

    #[derive(Iden)]
    pub enum Machines {
        Table,
        Id,
    }
}

mod m20240901_000004_create_batches_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240901_000004_create_batches_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Batches::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Batches::Id)
                                .integer()
                                .primary_key()
                                .auto_increment()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Batches::SetupJobId).integer())
                        .col(ColumnDef::new(Batches::LotId).integer().not_null())
                        .col(ColumnDef::new(Batches::ParentBatchId).integer())
                        .col(
                            ColumnDef::new(Batches::InitialQuantity)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Batches::CurrentQuantity)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Batches::CurrentLocation)
                                .string_len(32)
                                .not_null(),
                        )
                        .col(ColumnDef::new(Batches::OriginalLocation).string_len(32))
                        .col(ColumnDef::new(Batches::OperatorId).integer())
                        .col(ColumnDef::new(Batches::OperatorReportedQuantity).integer())
                        .col(ColumnDef::new(Batches::RecountedQuantity).integer())
                        .col(ColumnDef::new(Batches::DiscrepancyAbsolute).integer())
                        .col(ColumnDef::new(Batches::DiscrepancyPercentage).decimal_len(10, 2))
                        .col(
                            ColumnDef::new(Batches::AdminAcknowledgedDiscrepancy)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(ColumnDef::new(Batches::WarehouseEmployeeId).integer())
                        .col(
                            ColumnDef::new(Batches::WarehouseReceivedAt)
                                .timestamp_with_time_zone(),
                        )
                        .col(ColumnDef::new(Batches::QcInspectorId).integer())
                        .col(ColumnDef::new(Batches::QcStartTime).timestamp_with_time_zone())
                        .col(ColumnDef::new(Batches::QcEndTime).timestamp_with_time_zone())
                        .col(ColumnDef::new(Batches::QcComment).string())
                        .col(
                            ColumnDef::new(Batches::BatchTime)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Batches::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Batches::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_batches_lot")
                                .from(Batches::Table, Batches::LotId)
                                .to(Lots::Table, Lots::Id),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_batches_setup_job")
                                .from(Batches::Table, Batches::SetupJobId)
                                .to(SetupJobs::Table, SetupJobs::Id),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_batches_parent")
                                .from(Batches::Table, Batches::ParentBatchId)
                                .to(Batches::Table, Batches::Id),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_batches_lot_location")
                        .table(Batches::Table)
                        .col(Batches::LotId)
                        .col(Batches::CurrentLocation)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_batches_setup_location")
                        .table(Batches::Table)
                        .col(Batches::SetupJobId)
                        .col(Batches::CurrentLocation)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Batches::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    pub enum Batches {
        Table,
        Id,
        SetupJobId,
        LotId,
        ParentBatchId,
        InitialQuantity,
        CurrentQuantity,
        CurrentLocation,
        OriginalLocation,
        OperatorId,
        OperatorReportedQuantity,
        RecountedQuantity,
        DiscrepancyAbsolute,
        DiscrepancyPercentage,
        AdminAcknowledgedDiscrepancy,
        WarehouseEmployeeId,
        WarehouseReceivedAt,
        QcInspectorId,
        QcStartTime,
        QcEndTime,
        QcComment,
        BatchTime,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(Iden)]
    pub enum Lots {
        Table,
        Id,
    }

    #[derive(Iden)]
    pub enum SetupJobs {
        Table,
        Id,
    }
}

mod m20240901_000005_create_cards_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240901_000005_create_cards_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Cards::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Cards::Id)
                                .integer()
                                .primary_key()
                                .auto_increment()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Cards::CardNumber).integer().not_null())
                        .col(ColumnDef::new(Cards::MachineId).integer().not_null())
                        .col(ColumnDef::new(Cards::Status).string_len(16).not_null())
                        .col(ColumnDef::new(Cards::BatchId).integer())
                        .col(ColumnDef::new(Cards::LastEvent).timestamp_with_time_zone())
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_cards_machine")
                                .from(Cards::Table, Cards::MachineId)
                                .to(Machines::Table, Machines::Id),
                        )
                        .to_owned(),
                )
                .await?;

            // Card numbers are printed on physical tokens; the slot identity
            // (machine_id, card_number) is stable across uses.
            manager
                .create_index(
                    Index::create()
                        .name("idx_cards_machine_number")
                        .table(Cards::Table)
                        .col(Cards::MachineId)
                        .col(Cards::CardNumber)
                        .unique()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Cards::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    pub enum Cards {
        Table,
        Id,
        CardNumber,
        MachineId,
        Status,
        BatchId,
        LastEvent,
    }

    #[derive(Iden)]
    pub enum Machines {
        Table,
        Id,
    }
}

mod m20240901_000006_create_setup_quantity_adjustments_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240901_000006_create_setup_quantity_adjustments_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(SetupQuantityAdjustments::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(SetupQuantityAdjustments::Id)
                                .integer()
                                .primary_key()
                                .auto_increment()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(SetupQuantityAdjustments::SetupJobId)
                                .integer()
                                .not_null()
                                .unique_key(),
                        )
                        .col(
                            ColumnDef::new(SetupQuantityAdjustments::AutoAdjustment)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(SetupQuantityAdjustments::ManualAdjustment)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(SetupQuantityAdjustments::DefectAdjustment)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(SetupQuantityAdjustments::WarehouseDiscrepancyAdjustment)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(SetupQuantityAdjustments::TotalAdjustment)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(SetupQuantityAdjustments::ManualAdjustedBy).integer())
                        .col(
                            ColumnDef::new(SetupQuantityAdjustments::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(SetupQuantityAdjustments::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_setup_quantity_adjustments_setup_job")
                                .from(
                                    SetupQuantityAdjustments::Table,
                                    SetupQuantityAdjustments::SetupJobId,
                                )
                                .to(SetupJobs::Table, SetupJobs::Id),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(
                    Table::drop()
                        .table(SetupQuantityAdjustments::Table)
                        .to_owned(),
                )
                .await
        }
    }

    #[derive(Iden)]
    pub enum SetupQuantityAdjustments {
        Table,
        Id,
        SetupJobId,
        AutoAdjustment,
        ManualAdjustment,
        DefectAdjustment,
        WarehouseDiscrepancyAdjustment,
        TotalAdjustment,
        ManualAdjustedBy,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(Iden)]
    pub enum SetupJobs {
        Table,
        Id,
    }
}
