//! Conversation summary maintenance.

use chrono::Utc;
use im_core::entities::conversations;
use sea_orm::{ActiveModelTrait, ConnectionTrait, DbErr, EntityTrait, Set};

const PREVIEW_MAX_CHARS: usize = 512;

/// Refresh the summary row after a successful send: last message pointer,
/// preview, activity time, unread counter. Creates the row on first contact.
pub async fn touch_summary<C: ConnectionTrait>(
    conn: &C,
    conversation_id: &str,
    conversation_type: i16,
    last_message_id: &str,
    content: &str,
    at_millis: i64,
) -> Result<(), DbErr> {
    let preview: String = content.chars().take(PREVIEW_MAX_CHARS).collect();

    match conversations::Entity::find_by_id(conversation_id.to_string())
        .one(conn)
        .await?
    {
        Some(existing) => {
            let unread = existing.unread_count + 1;
            let mut row: conversations::ActiveModel = existing.into();
            row.last_message_id = Set(Some(last_message_id.to_string()));
            row.last_message = Set(Some(preview));
            row.last_message_at = Set(at_millis);
            row.unread_count = Set(unread);
            row.updated_at = Set(Utc::now().into());
            row.update(conn).await?;
        }
        None => {
            let row = conversations::ActiveModel {
                id: Set(conversation_id.to_string()),
                conversation_type: Set(conversation_type),
                last_message_id: Set(Some(last_message_id.to_string())),
                last_message: Set(Some(preview)),
                last_message_at: Set(at_millis),
                unread_count: Set(1),
                status: Set(1),
                created_at: Set(Utc::now().into()),
                updated_at: Set(Utc::now().into()),
            };
            row.insert(conn).await?;
        }
    }

    Ok(())
}

/// Reset the unread counter, typically after the reader issued receipts.
pub async fn clear_unread<C: ConnectionTrait>(
    conn: &C,
    conversation_id: &str,
) -> Result<(), DbErr> {
    if let Some(existing) = conversations::Entity::find_by_id(conversation_id.to_string())
        .one(conn)
        .await?
    {
        let mut row: conversations::ActiveModel = existing.into();
        row.unread_count = Set(0);
        row.updated_at = Set(Utc::now().into());
        row.update(conn).await?;
    }
    Ok(())
}
