use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// One receipt per (message, user); the unique index makes re-issuing a
/// receipt a no-op.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "message_read_receipts")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    /// The server_msg_id of the message that was read.
    pub message_id: String,
    pub conversation_id: String,
    pub user_id: String,
    pub read_time: i64,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
