//! Read receipts: mark messages read for a user and work out who to notify.

use super::dtos::ReceiptOutcome;
use super::send_message::find_by_server_msg_id;
use crate::error::is_unique_violation;
use crate::AppResult;
use chrono::Utc;
use im_core::entities::{message_read_receipts, messages};
use im_core::ids;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    QueryFilter, QueryOrder, Set,
};
use std::collections::{HashMap, HashSet};

pub struct MarkReadUseCase;

impl MarkReadUseCase {
    /// Record one receipt per (message, reader). An empty `server_msg_ids`
    /// means "everything still unread in this conversation". Re-issuing a
    /// receipt is a no-op thanks to the unique (message, user) index.
    pub async fn execute(
        db: &DatabaseConnection,
        conversation_id: &str,
        server_msg_ids: Vec<String>,
        reader_id: &str,
        read_time: i64,
    ) -> AppResult<ReceiptOutcome> {
        let target_ids = if server_msg_ids.is_empty() {
            unread_message_ids(db, conversation_id, reader_id).await?
        } else {
            server_msg_ids
        };

        if target_ids.is_empty() {
            return Ok(ReceiptOutcome {
                marked: Vec::new(),
                notify_sender: None,
                read_time,
            });
        }

        for server_msg_id in &target_ids {
            let receipt = message_read_receipts::ActiveModel {
                id: Set(ids::new_entity_id()),
                message_id: Set(server_msg_id.clone()),
                conversation_id: Set(conversation_id.to_string()),
                user_id: Set(reader_id.to_string()),
                read_time: Set(read_time),
                created_at: Set(Utc::now().into()),
            };
            match receipt.insert(db).await {
                Ok(_) => {}
                // already receipted by this user
                Err(err) if is_unique_violation(&err) => {}
                Err(err) => return Err(err.into()),
            }
        }

        // The reader has seen the conversation; reset its unread counter.
        if let Err(err) = super::conversations::clear_unread(db, conversation_id).await {
            tracing::warn!(conversation_id = %conversation_id, error = %err, "failed to clear unread count");
        }

        // The sender of the first marked message is the one to notify; a
        // reader marking their own messages notifies nobody.
        let notify_sender = match find_by_server_msg_id(db, &target_ids[0]).await? {
            Some(message) if message.sender_id != reader_id => Some(message.sender_id),
            _ => None,
        };

        Ok(ReceiptOutcome {
            marked: target_ids,
            notify_sender,
            read_time,
        })
    }
}

/// server_msg_ids addressed to `user_id` in the conversation with no receipt
/// from them yet. Revoked rows are excluded.
pub async fn unread_message_ids<C: ConnectionTrait>(
    conn: &C,
    conversation_id: &str,
    user_id: &str,
) -> Result<Vec<String>, DbErr> {
    let candidates = messages::Entity::find()
        .filter(messages::Column::ConversationId.eq(conversation_id))
        .filter(messages::Column::ReceiverId.eq(user_id))
        .filter(messages::Column::Status.ne(messages::STATUS_REVOKED))
        .order_by_asc(messages::Column::Seq)
        .all(conn)
        .await?;

    let candidate_ids: Vec<String> = candidates.into_iter().map(|m| m.server_msg_id).collect();
    if candidate_ids.is_empty() {
        return Ok(candidate_ids);
    }

    let receipted: HashSet<String> = message_read_receipts::Entity::find()
        .filter(message_read_receipts::Column::MessageId.is_in(candidate_ids.clone()))
        .filter(message_read_receipts::Column::UserId.eq(user_id))
        .all(conn)
        .await?
        .into_iter()
        .map(|r| r.message_id)
        .collect();

    Ok(candidate_ids
        .into_iter()
        .filter(|id| !receipted.contains(id))
        .collect())
}

/// Bulk `server_msg_id → is_read` decoration for sync responses, scoped to
/// the requesting user.
pub async fn read_status<C: ConnectionTrait>(
    conn: &C,
    server_msg_ids: &[String],
    user_id: &str,
) -> Result<HashMap<String, bool>, DbErr> {
    let mut status: HashMap<String, bool> = server_msg_ids
        .iter()
        .map(|id| (id.clone(), false))
        .collect();
    if server_msg_ids.is_empty() {
        return Ok(status);
    }

    let receipts = message_read_receipts::Entity::find()
        .filter(message_read_receipts::Column::MessageId.is_in(server_msg_ids.to_vec()))
        .filter(message_read_receipts::Column::UserId.eq(user_id))
        .all(conn)
        .await?;
    for receipt in receipts {
        status.insert(receipt.message_id, true);
    }

    Ok(status)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase};

    fn receipt_row(message_id: &str, user_id: &str) -> message_read_receipts::Model {
        message_read_receipts::Model {
            id: ids::new_entity_id(),
            message_id: message_id.to_string(),
            conversation_id: "single_a_b".to_string(),
            user_id: user_id.to_string(),
            read_time: 1,
            created_at: Utc::now().into(),
        }
    }

    #[tokio::test]
    async fn read_status_marks_receipted_ids_only() {
        let ids = vec!["m1".to_string(), "m2".to_string(), "m3".to_string()];
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![receipt_row("m2", "bob")]])
            .into_connection();

        let status = read_status(&db, &ids, "bob").await.unwrap();
        assert_eq!(status.get("m1"), Some(&false));
        assert_eq!(status.get("m2"), Some(&true));
        assert_eq!(status.get("m3"), Some(&false));
    }

    #[tokio::test]
    async fn read_status_of_nothing_is_empty() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let status = read_status(&db, &[], "bob").await.unwrap();
        assert!(status.is_empty());
    }
}
