//! Batch sync: catch a reconnecting client up across every conversation it
//! participates in, from a per-conversation cursor.

use super::dtos::ConversationSyncBlock;
use super::sequences;
use crate::AppResult;
use im_core::entities::messages;
use sea_orm::{
    ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, QueryOrder, QuerySelect,
};
use std::collections::HashMap;
use tracing::warn;

pub const DEFAULT_BATCH_COUNT: i32 = 100;
pub const MAX_BATCH_COUNT: i32 = 500;

pub fn clamp_count(count: i32) -> i32 {
    if count <= 0 {
        DEFAULT_BATCH_COUNT
    } else if count > MAX_BATCH_COUNT {
        MAX_BATCH_COUNT
    } else {
        count
    }
}

pub struct BatchSyncUseCase;

impl BatchSyncUseCase {
    /// Sweep every conversation of `user_id`. Conversations missing from
    /// `cursors` start at 0. A failing conversation is skipped, not fatal.
    pub async fn execute(
        db: &DatabaseConnection,
        user_id: &str,
        cursors: &HashMap<String, i64>,
        max_count_per_conversation: i32,
    ) -> AppResult<Vec<ConversationSyncBlock>> {
        let count = clamp_count(max_count_per_conversation);
        let conversation_ids = sequences::user_conversation_ids(db, user_id).await?;

        let mut blocks = Vec::with_capacity(conversation_ids.len());
        for conversation_id in conversation_ids {
            let last_seq = cursors.get(&conversation_id).copied().unwrap_or(0);
            match sync_conversation(db, &conversation_id, last_seq, count).await {
                Ok(Some(block)) => blocks.push(block),
                Ok(None) => {}
                Err(err) => {
                    warn!(
                        conversation_id = %conversation_id,
                        error = %err,
                        "skipping conversation during batch sync"
                    );
                }
            }
        }

        Ok(blocks)
    }
}

/// New rows after `last_seq`, ascending, revoked rows hidden. Returns `None`
/// when the client is already caught up.
async fn sync_conversation(
    db: &DatabaseConnection,
    conversation_id: &str,
    last_seq: i64,
    count: i32,
) -> Result<Option<ConversationSyncBlock>, DbErr> {
    let rows = messages::Entity::find()
        .filter(messages::Column::ConversationId.eq(conversation_id))
        .filter(messages::Column::Seq.gt(last_seq))
        .filter(messages::Column::Status.ne(messages::STATUS_REVOKED))
        .order_by_asc(messages::Column::Seq)
        .limit(count as u64)
        .all(db)
        .await?;

    let max_seq = sequences::max_seq(db, conversation_id).await?;
    if rows.is_empty() && max_seq <= last_seq {
        return Ok(None);
    }

    let has_more = rows.len() as i32 >= count;
    let synced_seq = rows.last().map(|m| m.seq).unwrap_or(last_seq);

    Ok(Some(ConversationSyncBlock {
        conversation_id: conversation_id.to_string(),
        messages: rows,
        max_seq,
        synced_seq,
        has_more,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn count_clamps_to_the_allowed_window() {
        assert_eq!(clamp_count(0), DEFAULT_BATCH_COUNT);
        assert_eq!(clamp_count(-5), DEFAULT_BATCH_COUNT);
        assert_eq!(clamp_count(250), 250);
        assert_eq!(clamp_count(9_000), MAX_BATCH_COUNT);
    }
}
