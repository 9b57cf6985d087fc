use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240101_000001_create_wines_table::Migration),
            Box::new(m20240101_000002_create_stock_history_table::Migration),
            Box::new(m20240101_000003_create_users_table::Migration),
        ]
    }
}

mod m20240101_000001_create_wines_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000001_create_wines_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Wines::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Wines::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Wines::Name).string().not_null())
                        .col(ColumnDef::new(Wines::WineType).string().not_null())
                        .col(
                            ColumnDef::new(Wines::UnpackagedBoxes)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Wines::PackagedBoxes)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Wines::RemainingWater)
                                .decimal_len(12, 3)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Wines::TotalStock)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Wines::Status)
                                .string_len(16)
                                .not_null()
                                .default("in_stock"),
                        )
                        .col(
                            ColumnDef::new(Wines::Version)
                                .integer()
                                .not_null()
                                .default(1),
                        )
                        .col(ColumnDef::new(Wines::CreatedAt).timestamp_with_time_zone().not_null())
                        .col(ColumnDef::new(Wines::UpdatedAt).timestamp_with_time_zone().not_null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_wines_status")
                        .table(Wines::Table)
                        .col(Wines::Status)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_wines_name")
                        .table(Wines::Table)
                        .col(Wines::Name)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Wines::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    enum Wines {
        Table,
        Id,
        Name,
        WineType,
        UnpackagedBoxes,
        PackagedBoxes,
        RemainingWater,
        TotalStock,
        Status,
        Version,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240101_000002_create_stock_history_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000002_create_stock_history_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            // No foreign key to wines: history must survive product deletion.
            manager
                .create_table(
                    Table::create()
                        .table(StockHistory::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(StockHistory::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(StockHistory::WineId).uuid().not_null())
                        .col(ColumnDef::new(StockHistory::WineName).string().not_null())
                        .col(ColumnDef::new(StockHistory::Action).string_len(16).not_null())
                        .col(ColumnDef::new(StockHistory::Details).json().not_null())
                        .col(
                            ColumnDef::new(StockHistory::Remark)
                                .string()
                                .not_null()
                                .default(""),
                        )
                        .col(ColumnDef::new(StockHistory::Operator).string().not_null())
                        .col(
                            ColumnDef::new(StockHistory::CreatedAt)
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
                        .name("idx_stock_history_wine_id")
                        .table(StockHistory::Table)
                        .col(StockHistory::WineId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_stock_history_action")
                        .table(StockHistory::Table)
                        .col(StockHistory::Action)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_stock_history_created_at")
                        .table(StockHistory::Table)
                        .col(StockHistory::CreatedAt)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(StockHistory::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    enum StockHistory {
        Table,
        Id,
        WineId,
        WineName,
        Action,
        Details,
        Remark,
        Operator,
        CreatedAt,
    }
}

mod m20240101_000003_create_users_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000003_create_users_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Users::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Users::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Users::Username).string().not_null().unique_key())
                        .col(ColumnDef::new(Users::PasswordHash).text().not_null())
                        .col(
                            ColumnDef::new(Users::Role)
                                .string_len(16)
                                .not_null()
                                .default("operator"),
                        )
                        .col(ColumnDef::new(Users::CreatedAt).timestamp_with_time_zone().not_null())
                        .col(ColumnDef::new(Users::UpdatedAt).timestamp_with_time_zone().not_null())
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Users::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    enum Users {
        Table,
        Id,
        Username,
        PasswordHash,
        Role,
        CreatedAt,
        UpdatedAt,
    }
}
