//! Message revocation. The seq slot stays; sync just stops returning the row.

use crate::{AppError, AppResult};
use chrono::Utc;
use im_core::entities::messages;
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};

pub struct RevokeMessageUseCase;

impl RevokeMessageUseCase {
    /// Only the original sender may revoke. Returns the updated row so the
    /// gateway can notify recipients.
    pub async fn execute(
        db: &DatabaseConnection,
        server_msg_id: &str,
        actor_id: &str,
    ) -> AppResult<messages::Model> {
        let message = messages::Entity::find()
            .filter(messages::Column::ServerMsgId.eq(server_msg_id))
            .one(db)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("message {}", server_msg_id)))?;

        if message.sender_id != actor_id {
            return Err(AppError::PermissionDenied(
                "only the sender can revoke a message".to_string(),
            ));
        }

        let mut row: messages::ActiveModel = message.into();
        row.status = Set(messages::STATUS_REVOKED);
        row.updated_at = Set(Utc::now().into());
        let updated = row.update(db).await?;

        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};

    fn message_row(sender_id: &str) -> messages::Model {
        messages::Model {
            conversation_id: "single_a_b".to_string(),
            seq: 3,
            server_msg_id: "f".repeat(32),
            client_msg_id: "cm3".to_string(),
            sender_id: sender_id.to_string(),
            receiver_id: Some("b".to_string()),
            group_id: None,
            message_type: 1,
            content: "oops".to_string(),
            status: messages::STATUS_SENT,
            send_time: 0,
            server_time: 0,
            created_at: Utc::now().into(),
            updated_at: Utc::now().into(),
        }
    }

    #[tokio::test]
    async fn only_the_sender_may_revoke() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![message_row("alice")]])
            .into_connection();

        let err = RevokeMessageUseCase::execute(&db, &"f".repeat(32), "mallory")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::PermissionDenied(_)));
    }

    #[tokio::test]
    async fn unknown_message_is_not_found() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<messages::Model>::new()])
            .into_connection();

        let err = RevokeMessageUseCase::execute(&db, "missing", "alice")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn revoke_keeps_the_seq_slot() {
        let mut revoked = message_row("alice");
        revoked.status = messages::STATUS_REVOKED;
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![message_row("alice")]])
            .append_query_results([vec![revoked]])
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 1,
            }])
            .into_connection();

        let updated = RevokeMessageUseCase::execute(&db, &"f".repeat(32), "alice")
            .await
            .unwrap();
        assert_eq!(updated.status, messages::STATUS_REVOKED);
        assert_eq!(updated.seq, 3);
    }
}
