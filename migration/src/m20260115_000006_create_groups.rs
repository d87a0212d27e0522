use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Groups::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Groups::Id).string_len(64).not_null().primary_key())
                    .col(ColumnDef::new(Groups::Name).string_len(100).not_null())
                    .col(ColumnDef::new(Groups::Avatar).string_len(255))
                    .col(ColumnDef::new(Groups::Description).string_len(500))
                    .col(ColumnDef::new(Groups::OwnerId).string_len(64).not_null())
                    .col(
                        ColumnDef::new(Groups::MaxMembers)
                            .integer()
                            .not_null()
                            .default(500),
                    )
                    .col(ColumnDef::new(Groups::Status).small_integer().not_null().default(1))
                    .col(
                        ColumnDef::new(Groups::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Groups::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Groups::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Groups {
    Table,
    Id,
    Name,
    Avatar,
    Description,
    OwnerId,
    MaxMembers,
    Status,
    CreatedAt,
    UpdatedAt,
}
