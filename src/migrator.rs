use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240101_000001_create_purchase_orders_table::Migration),
            Box::new(m20240101_000002_create_audit_entries_table::Migration),
        ]
    }
}

mod m20240101_000001_create_purchase_orders_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000001_create_purchase_orders_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(PurchaseOrders::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(PurchaseOrders::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PurchaseOrders::OrderId)
                                .string_len(32)
                                .not_null()
                                .unique_key(),
                        )
                        .col(
                            ColumnDef::new(PurchaseOrders::State)
                                .string_len(32)
                                .not_null(),
                        )
                        .col(ColumnDef::new(PurchaseOrders::Supplier).string())
                        .col(
                            ColumnDef::new(PurchaseOrders::QuantityKg)
                                .integer()
                                .not_null(),
                        )
                        .col(ColumnDef::new(PurchaseOrders::UnitCost).decimal_len(16, 4))
                        .col(ColumnDef::new(PurchaseOrders::TotalCost).decimal_len(16, 4))
                        .col(ColumnDef::new(PurchaseOrders::DeliveryDays).integer())
                        .col(
                            ColumnDef::new(PurchaseOrders::Justification)
                                .string()
                                .not_null(),
                        )
                        .col(ColumnDef::new(PurchaseOrders::Observations).string())
                        .col(ColumnDef::new(PurchaseOrders::NeededBy).string())
                        .col(ColumnDef::new(PurchaseOrders::RequestingUser).string())
                        .col(ColumnDef::new(PurchaseOrders::ApprovingUser).string())
                        .col(ColumnDef::new(PurchaseOrders::ModifyingUser).string())
                        .col(ColumnDef::new(PurchaseOrders::ReceivedQuantityKg).integer())
                        .col(ColumnDef::new(PurchaseOrders::DiscrepancyStatus).string_len(32))
                        .col(ColumnDef::new(PurchaseOrders::DiscrepancyTicket).string_len(32))
                        .col(
                            ColumnDef::new(PurchaseOrders::ReadyForBilling)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(
                            ColumnDef::new(PurchaseOrders::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(ColumnDef::new(PurchaseOrders::UpdatedAt).timestamp_with_time_zone())
                        .col(ColumnDef::new(PurchaseOrders::ApprovedAt).timestamp_with_time_zone())
                        .col(ColumnDef::new(PurchaseOrders::RejectedAt).timestamp_with_time_zone())
                        .col(
                            ColumnDef::new(PurchaseOrders::Version)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_purchase_orders_state")
                        .table(PurchaseOrders::Table)
                        .col(PurchaseOrders::State)
                        .if_not_exists()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(PurchaseOrders::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    enum PurchaseOrders {
        Table,
        Id,
        OrderId,
        State,
        Supplier,
        QuantityKg,
        UnitCost,
        TotalCost,
        DeliveryDays,
        Justification,
        Observations,
        NeededBy,
        RequestingUser,
        ApprovingUser,
        ModifyingUser,
        ReceivedQuantityKg,
        DiscrepancyStatus,
        DiscrepancyTicket,
        ReadyForBilling,
        CreatedAt,
        UpdatedAt,
        ApprovedAt,
        RejectedAt,
        Version,
    }
}

mod m20240101_000002_create_audit_entries_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000002_create_audit_entries_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            // Deliberately no foreign key to purchase_orders: entries may be
            // audited under identifiers that are not (yet) persisted orders.
            manager
                .create_table(
                    Table::create()
                        .table(AuditEntries::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(AuditEntries::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(AuditEntries::OrderId)
                                .string_len(32)
                                .not_null(),
                        )
                        .col(ColumnDef::new(AuditEntries::Action).string_len(64).not_null())
                        .col(ColumnDef::new(AuditEntries::Actor).string().not_null())
                        .col(
                            ColumnDef::new(AuditEntries::Description)
                                .string()
                                .not_null()
                                .default(""),
                        )
                        .col(ColumnDef::new(AuditEntries::PreviousState).string_len(32))
                        .col(ColumnDef::new(AuditEntries::NewState).string_len(32))
                        .col(ColumnDef::new(AuditEntries::Details).text())
                        .col(
                            ColumnDef::new(AuditEntries::Timestamp)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_audit_entries_order_id")
                        .table(AuditEntries::Table)
                        .col(AuditEntries::OrderId)
                        .if_not_exists()
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_audit_entries_timestamp")
                        .table(AuditEntries::Table)
                        .col(AuditEntries::Timestamp)
                        .if_not_exists()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(AuditEntries::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    enum AuditEntries {
        Table,
        Id,
        OrderId,
        Action,
        Actor,
        Description,
        PreviousState,
        NewState,
        Details,
        Timestamp,
    }
}
