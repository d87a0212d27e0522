//! Range sync: fill a gap the client observed between its local maxSeq and a
//! pushed seq.

use super::dtos::RangeSyncOutcome;
use super::sync_messages::clamp_count;
use crate::{AppError, AppResult};
use im_core::entities::messages;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, QuerySelect};

pub struct SyncRangeUseCase;

impl SyncRangeUseCase {
    pub async fn execute(
        db: &DatabaseConnection,
        conversation_id: &str,
        start_seq: i64,
        end_seq: i64,
        count: i32,
    ) -> AppResult<RangeSyncOutcome> {
        if start_seq > end_seq {
            return Err(AppError::Validation(format!(
                "invalid seq range: start_seq ({}) > end_seq ({})",
                start_seq, end_seq
            )));
        }
        let count = clamp_count(count);

        let rows = messages::Entity::find()
            .filter(messages::Column::ConversationId.eq(conversation_id))
            .filter(messages::Column::Seq.gte(start_seq))
            .filter(messages::Column::Seq.lte(end_seq))
            .filter(messages::Column::Status.ne(messages::STATUS_REVOKED))
            .order_by_asc(messages::Column::Seq)
            .limit(count as u64)
            .all(db)
            .await?;

        if rows.is_empty() {
            return Ok(RangeSyncOutcome {
                messages: rows,
                actual_start: start_seq,
                actual_end: start_seq - 1,
                has_more: false,
            });
        }

        let actual_start = rows.first().map(|m| m.seq).unwrap_or(start_seq);
        let actual_end = rows.last().map(|m| m.seq).unwrap_or(start_seq);
        let has_more = actual_end < end_seq;

        Ok(RangeSyncOutcome {
            messages: rows,
            actual_start,
            actual_end,
            has_more,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sea_orm::{DatabaseBackend, MockDatabase};

    fn message_row(seq: i64) -> messages::Model {
        messages::Model {
            conversation_id: "single_a_b".to_string(),
            seq,
            server_msg_id: format!("{:032x}", seq),
            client_msg_id: format!("cm{}", seq),
            sender_id: "a".to_string(),
            receiver_id: Some("b".to_string()),
            group_id: None,
            message_type: 1,
            content: "x".to_string(),
            status: messages::STATUS_SENT,
            send_time: 0,
            server_time: 0,
            created_at: Utc::now().into(),
            updated_at: Utc::now().into(),
        }
    }

    #[tokio::test]
    async fn returns_the_requested_window_in_order() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![message_row(4), message_row(5), message_row(6)]])
            .into_connection();

        let out = SyncRangeUseCase::execute(&db, "single_a_b", 4, 6, 100)
            .await
            .unwrap();
        assert_eq!(out.actual_start, 4);
        assert_eq!(out.actual_end, 6);
        assert!(!out.has_more);
        let seqs: Vec<i64> = out.messages.iter().map(|m| m.seq).collect();
        assert_eq!(seqs, vec![4, 5, 6]);
    }

    #[tokio::test]
    async fn truncation_reports_has_more() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![message_row(4), message_row(5)]])
            .into_connection();

        let out = SyncRangeUseCase::execute(&db, "single_a_b", 4, 10, 2)
            .await
            .unwrap();
        assert_eq!(out.actual_end, 5);
        assert!(out.has_more);
    }

    #[tokio::test]
    async fn empty_window_has_inverted_bounds() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<messages::Model>::new()])
            .into_connection();

        let out = SyncRangeUseCase::execute(&db, "single_a_b", 4, 6, 100)
            .await
            .unwrap();
        assert!(out.messages.is_empty());
        assert_eq!(out.actual_start, 4);
        assert_eq!(out.actual_end, 3);
        assert!(!out.has_more);
    }

    #[tokio::test]
    async fn rejects_inverted_request() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let err = SyncRangeUseCase::execute(&db, "single_a_b", 9, 4, 100)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }
}
