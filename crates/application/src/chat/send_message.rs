//! The send pipeline: derive conversation id, mint the server message id,
//! allocate the per-conversation seq, persist, refresh the summary.
//!
//! Fan-out to online recipients happens in the gateway after this returns;
//! the pipeline itself never touches connections.

use super::dtos::{SendMessageInput, SendOutcome};
use super::{conversations, sequences, sequences::SequenceAllocator};
use crate::error::is_unique_violation;
use crate::{AppError, AppResult};
use chrono::Utc;
use im_core::entities::{group_members, messages, users};
use im_core::ids;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    QueryFilter, Set, TransactionTrait,
};

pub struct SendMessageUseCase;

impl SendMessageUseCase {
    pub async fn execute(
        db: &DatabaseConnection,
        allocator: &SequenceAllocator,
        input: SendMessageInput,
    ) -> AppResult<SendOutcome> {
        if input.client_msg_id.is_empty() {
            return Err(AppError::Validation("client_msg_id is required".to_string()));
        }

        let conversation_id = resolve_conversation_id(&input)?;

        // Idempotent resend: the same (conversation, client_msg_id) collapses
        // onto the original row.
        if let Some(existing) = find_by_client_msg_id(db, &conversation_id, &input.client_msg_id).await? {
            return Ok(SendOutcome {
                message: existing,
                duplicate: true,
            });
        }

        match (&input.receiver_id, &input.group_id) {
            (Some(receiver_id), _) => {
                let receiver = users::Entity::find_by_id(receiver_id.clone()).one(db).await?;
                if receiver.is_none() {
                    return Err(AppError::NotFound(format!("user {}", receiver_id)));
                }
            }
            (None, Some(group_id)) => {
                if !is_active_member(db, group_id, &input.sender_id).await? {
                    return Err(AppError::PermissionDenied(
                        "sender is not a member of the group".to_string(),
                    ));
                }
            }
            (None, None) => {
                return Err(AppError::Validation(
                    "either receiver_id or group_id is required".to_string(),
                ))
            }
        }

        // Serialize writers on this conversation; the store transaction below
        // remains the source of truth for the counter.
        let lock = allocator.conversation_lock(&conversation_id);
        let _guard = lock.lock().await;

        let txn = db.begin().await?;

        let seq = sequences::next_seq(&txn, &conversation_id).await?;
        let now = ids::now_millis();
        let server_msg_id = ids::new_server_msg_id(&input.sender_id);
        let conversation_type = ids::conversation_type(input.group_id.as_deref().unwrap_or(""));

        let row = messages::ActiveModel {
            conversation_id: Set(conversation_id.clone()),
            seq: Set(seq),
            server_msg_id: Set(server_msg_id),
            client_msg_id: Set(input.client_msg_id.clone()),
            sender_id: Set(input.sender_id.clone()),
            receiver_id: Set(input.receiver_id.clone()),
            group_id: Set(input.group_id.clone()),
            message_type: Set(input.message_type),
            content: Set(input.content.clone()),
            status: Set(messages::STATUS_SENT),
            send_time: Set(input.send_time),
            server_time: Set(now),
            created_at: Set(Utc::now().into()),
            updated_at: Set(Utc::now().into()),
        };

        let inserted = match row.insert(&txn).await {
            Ok(model) => model,
            Err(err) if is_unique_violation(&err) => {
                // A concurrent resend won the insert; the rollback releases
                // the allocated seq so the counter stays gap-free.
                txn.rollback().await?;
                let existing = find_by_client_msg_id(db, &conversation_id, &input.client_msg_id)
                    .await?
                    .ok_or(AppError::Database(err))?;
                return Ok(SendOutcome {
                    message: existing,
                    duplicate: true,
                });
            }
            Err(err) => return Err(err.into()),
        };

        conversations::touch_summary(
            &txn,
            &conversation_id,
            conversation_type as i16,
            &inserted.server_msg_id,
            &input.content,
            now,
        )
        .await?;

        txn.commit().await?;

        Ok(SendOutcome {
            message: inserted,
            duplicate: false,
        })
    }
}

fn resolve_conversation_id(input: &SendMessageInput) -> AppResult<String> {
    if let Some(id) = input.conversation_id.as_deref() {
        if !id.is_empty() {
            return Ok(id.to_string());
        }
    }
    match (&input.receiver_id, &input.group_id) {
        (Some(receiver_id), _) => Ok(ids::single_chat_id(&input.sender_id, receiver_id)),
        (None, Some(group_id)) => Ok(ids::group_chat_id(group_id)),
        (None, None) => Err(AppError::Validation(
            "either receiver_id or group_id is required".to_string(),
        )),
    }
}

pub async fn find_by_client_msg_id<C: ConnectionTrait>(
    conn: &C,
    conversation_id: &str,
    client_msg_id: &str,
) -> Result<Option<messages::Model>, DbErr> {
    messages::Entity::find()
        .filter(messages::Column::ConversationId.eq(conversation_id))
        .filter(messages::Column::ClientMsgId.eq(client_msg_id))
        .one(conn)
        .await
}

pub async fn find_by_server_msg_id<C: ConnectionTrait>(
    conn: &C,
    server_msg_id: &str,
) -> Result<Option<messages::Model>, DbErr> {
    messages::Entity::find()
        .filter(messages::Column::ServerMsgId.eq(server_msg_id))
        .one(conn)
        .await
}

async fn is_active_member<C: ConnectionTrait>(
    conn: &C,
    group_id: &str,
    user_id: &str,
) -> Result<bool, DbErr> {
    let member = group_members::Entity::find()
        .filter(group_members::Column::GroupId.eq(group_id))
        .filter(group_members::Column::UserId.eq(user_id))
        .filter(group_members::Column::Status.eq(group_members::MEMBER_ACTIVE))
        .one(conn)
        .await?;
    Ok(member.is_some())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase};

    fn message_row(conversation_id: &str, seq: i64, client_msg_id: &str) -> messages::Model {
        messages::Model {
            conversation_id: conversation_id.to_string(),
            seq,
            server_msg_id: "a".repeat(32),
            client_msg_id: client_msg_id.to_string(),
            sender_id: "alice".to_string(),
            receiver_id: Some("bob".to_string()),
            group_id: None,
            message_type: 1,
            content: "hi".to_string(),
            status: messages::STATUS_SENT,
            send_time: 1,
            server_time: 2,
            created_at: Utc::now().into(),
            updated_at: Utc::now().into(),
        }
    }

    fn input() -> SendMessageInput {
        SendMessageInput {
            sender_id: "alice".to_string(),
            conversation_id: None,
            client_msg_id: "cm1".to_string(),
            receiver_id: Some("bob".to_string()),
            group_id: None,
            message_type: 1,
            content: "hi".to_string(),
            send_time: 1,
        }
    }

    #[tokio::test]
    async fn resend_returns_the_original_row() {
        let original = message_row("single_alice_bob", 1, "cm1");
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![original.clone()]])
            .into_connection();

        let allocator = SequenceAllocator::new();
        let outcome = SendMessageUseCase::execute(&db, &allocator, input())
            .await
            .unwrap();

        assert!(outcome.duplicate);
        assert_eq!(outcome.message.seq, 1);
        assert_eq!(outcome.message.server_msg_id, original.server_msg_id);
    }

    #[tokio::test]
    async fn rejects_input_without_target() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let allocator = SequenceAllocator::new();

        let mut bad = input();
        bad.receiver_id = None;
        let err = SendMessageUseCase::execute(&db, &allocator, bad)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn rejects_missing_client_msg_id() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let allocator = SequenceAllocator::new();

        let mut bad = input();
        bad.client_msg_id = String::new();
        let err = SendMessageUseCase::execute(&db, &allocator, bad)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn conversation_id_prefers_the_client_supplied_one() {
        let mut custom = input();
        custom.conversation_id = Some("single_alice_bob".to_string());
        assert_eq!(
            resolve_conversation_id(&custom).unwrap(),
            "single_alice_bob"
        );

        let derived = resolve_conversation_id(&input()).unwrap();
        assert_eq!(derived, "single_alice_bob");

        let mut group = input();
        group.receiver_id = None;
        group.group_id = Some("g1".to_string());
        assert_eq!(resolve_conversation_id(&group).unwrap(), "group_g1");
    }
}
