use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(MessageReadReceipts::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(MessageReadReceipts::Id)
                            .string_len(64)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(MessageReadReceipts::MessageId).string_len(64).not_null())
                    .col(
                        ColumnDef::new(MessageReadReceipts::ConversationId)
                            .string_len(64)
                            .not_null(),
                    )
                    .col(ColumnDef::new(MessageReadReceipts::UserId).string_len(64).not_null())
                    .col(ColumnDef::new(MessageReadReceipts::ReadTime).big_integer().not_null())
                    .col(
                        ColumnDef::new(MessageReadReceipts::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // One receipt per (message, user); re-issuing is a no-op.
        manager
            .create_index(
                Index::create()
                    .name("uk_read_receipts_message_user")
                    .table(MessageReadReceipts::Table)
                    .col(MessageReadReceipts::MessageId)
                    .col(MessageReadReceipts::UserId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("ix_read_receipts_conversation_user")
                    .table(MessageReadReceipts::Table)
                    .col(MessageReadReceipts::ConversationId)
                    .col(MessageReadReceipts::UserId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(MessageReadReceipts::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum MessageReadReceipts {
    Table,
    Id,
    MessageId,
    ConversationId,
    UserId,
    ReadTime,
    CreatedAt,
}
