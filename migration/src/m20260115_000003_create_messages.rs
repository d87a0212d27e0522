use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Messages::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Messages::ConversationId).string_len(64).not_null())
                    .col(ColumnDef::new(Messages::Seq).big_integer().not_null())
                    .col(ColumnDef::new(Messages::ServerMsgId).string_len(64).not_null())
                    .col(ColumnDef::new(Messages::ClientMsgId).string_len(64).not_null())
                    .col(ColumnDef::new(Messages::SenderId).string_len(64).not_null())
                    .col(ColumnDef::new(Messages::ReceiverId).string_len(64))
                    .col(ColumnDef::new(Messages::GroupId).string_len(64))
                    .col(ColumnDef::new(Messages::MessageType).small_integer().not_null())
                    .col(ColumnDef::new(Messages::Content).text().not_null())
                    .col(ColumnDef::new(Messages::Status).small_integer().not_null().default(1))
                    .col(ColumnDef::new(Messages::SendTime).big_integer().not_null().default(0))
                    .col(ColumnDef::new(Messages::ServerTime).big_integer().not_null().default(0))
                    .col(
                        ColumnDef::new(Messages::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Messages::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .primary_key(
                        Index::create()
                            .name("pk_messages")
                            .col(Messages::ConversationId)
                            .col(Messages::Seq),
                    )
                    .to_owned(),
            )
            .await?;

        // Global uniqueness for the server-minted id.
        manager
            .create_index(
                Index::create()
                    .name("uk_messages_server_msg_id")
                    .table(Messages::Table)
                    .col(Messages::ServerMsgId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // Idempotent resend: one client_msg_id per conversation.
        manager
            .create_index(
                Index::create()
                    .name("uk_messages_conversation_client_msg_id")
                    .table(Messages::Table)
                    .col(Messages::ConversationId)
                    .col(Messages::ClientMsgId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("ix_messages_sender_id")
                    .table(Messages::Table)
                    .col(Messages::SenderId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("ix_messages_receiver_id")
                    .table(Messages::Table)
                    .col(Messages::ReceiverId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Messages::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Messages {
    Table,
    ConversationId,
    Seq,
    ServerMsgId,
    ClientMsgId,
    SenderId,
    ReceiverId,
    GroupId,
    MessageType,
    Content,
    Status,
    SendTime,
    ServerTime,
    CreatedAt,
    UpdatedAt,
}
