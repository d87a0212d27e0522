//! Per-conversation sequence allocation.
//!
//! The store's transactional read-modify-write on `message_sequences` is the
//! source of truth; the in-process mutex map only keeps concurrent senders
//! on one conversation from piling up on the row lock.

use chrono::Utc;
use im_core::entities::{group_members, message_sequences, messages};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DbErr, EntityTrait, QueryFilter,
    QuerySelect, Set,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Hands out one async mutex per conversation id.
#[derive(Default)]
pub struct SequenceAllocator {
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl SequenceAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn conversation_lock(&self, conversation_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().expect("sequence lock map poisoned");
        locks
            .entry(conversation_id.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }
}

/// Allocate the next seq for a conversation: read the row exclusively,
/// increment, write back. Creates the row at 1 when absent.
pub async fn next_seq<C: ConnectionTrait>(conn: &C, conversation_id: &str) -> Result<i64, DbErr> {
    let existing = message_sequences::Entity::find_by_id(conversation_id.to_string())
        .lock_exclusive()
        .one(conn)
        .await?;

    match existing {
        None => {
            let row = message_sequences::ActiveModel {
                conversation_id: Set(conversation_id.to_string()),
                max_seq: Set(1),
                updated_at: Set(Utc::now().into()),
            };
            row.insert(conn).await?;
            Ok(1)
        }
        Some(row) => {
            let next = row.max_seq + 1;
            let mut row: message_sequences::ActiveModel = row.into();
            row.max_seq = Set(next);
            row.updated_at = Set(Utc::now().into());
            row.update(conn).await?;
            Ok(next)
        }
    }
}

/// Current maxSeq for a conversation; 0 when no message was ever assigned.
pub async fn max_seq<C: ConnectionTrait>(conn: &C, conversation_id: &str) -> Result<i64, DbErr> {
    let row = message_sequences::Entity::find_by_id(conversation_id.to_string())
        .one(conn)
        .await?;
    Ok(row.map(|r| r.max_seq).unwrap_or(0))
}

/// Batched maxSeq lookup keyed by conversation id.
pub async fn max_seq_map<C: ConnectionTrait>(
    conn: &C,
    conversation_ids: &[String],
) -> Result<HashMap<String, i64>, DbErr> {
    if conversation_ids.is_empty() {
        return Ok(HashMap::new());
    }
    let rows = message_sequences::Entity::find()
        .filter(message_sequences::Column::ConversationId.is_in(conversation_ids.to_vec()))
        .all(conn)
        .await?;
    Ok(rows.into_iter().map(|r| (r.conversation_id, r.max_seq)).collect())
}

/// Every conversation the user participates in, from message history plus
/// group membership.
pub async fn user_conversation_ids<C: ConnectionTrait>(
    conn: &C,
    user_id: &str,
) -> Result<Vec<String>, DbErr> {
    let mut ids: Vec<String> = messages::Entity::find()
        .select_only()
        .column(messages::Column::ConversationId)
        .filter(
            Condition::any()
                .add(messages::Column::SenderId.eq(user_id))
                .add(messages::Column::ReceiverId.eq(user_id)),
        )
        .distinct()
        .into_tuple()
        .all(conn)
        .await?;

    let memberships = group_members::Entity::find()
        .filter(group_members::Column::UserId.eq(user_id))
        .filter(group_members::Column::Status.eq(group_members::MEMBER_ACTIVE))
        .all(conn)
        .await?;
    for membership in memberships {
        let conversation_id = im_core::ids::group_chat_id(&membership.group_id);
        if !ids.contains(&conversation_id) {
            ids.push(conversation_id);
        }
    }

    Ok(ids)
}

/// The maxSeq hint returned on auth: the highest assigned seq across the
/// user's conversations.
pub async fn user_max_seq_hint<C: ConnectionTrait>(conn: &C, user_id: &str) -> Result<i64, DbErr> {
    let ids = user_conversation_ids(conn, user_id).await?;
    let map = max_seq_map(conn, &ids).await?;
    Ok(map.values().copied().max().unwrap_or(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};

    fn seq_row(conversation_id: &str, max_seq: i64) -> message_sequences::Model {
        message_sequences::Model {
            conversation_id: conversation_id.to_string(),
            max_seq,
            updated_at: Utc::now().into(),
        }
    }

    #[tokio::test]
    async fn first_send_creates_the_row_at_one() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<message_sequences::Model>::new()])
            .append_query_results([vec![seq_row("single_alice_bob", 1)]])
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 1,
            }])
            .into_connection();

        let seq = next_seq(&db, "single_alice_bob").await.unwrap();
        assert_eq!(seq, 1);
    }

    #[tokio::test]
    async fn subsequent_sends_increment_without_gaps() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![seq_row("single_alice_bob", 41)]])
            .append_query_results([vec![seq_row("single_alice_bob", 42)]])
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 1,
            }])
            .into_connection();

        let seq = next_seq(&db, "single_alice_bob").await.unwrap();
        assert_eq!(seq, 42);
    }

    #[tokio::test]
    async fn missing_row_reads_as_zero() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<message_sequences::Model>::new()])
            .into_connection();

        assert_eq!(max_seq(&db, "single_a_b").await.unwrap(), 0);
    }

    #[test]
    fn allocator_reuses_one_lock_per_conversation() {
        let allocator = SequenceAllocator::new();
        let a = allocator.conversation_lock("c1");
        let b = allocator.conversation_lock("c1");
        let c = allocator.conversation_lock("c2");
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
    }
}
