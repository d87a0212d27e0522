use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

pub const STATUS_SENT: i16 = 1;
pub const STATUS_DELIVERED: i16 = 2;
pub const STATUS_READ: i16 = 3;
/// Revoked rows keep their seq slot but are hidden from every sync result.
pub const STATUS_REVOKED: i16 = 4;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "messages")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub conversation_id: String,
    /// Per-conversation ordinal, contiguous from 1.
    #[sea_orm(primary_key, auto_increment = false)]
    pub seq: i64,
    /// Server-minted, globally unique.
    pub server_msg_id: String,
    /// Client-minted, unique within a conversation; the idempotency key for
    /// resends.
    pub client_msg_id: String,
    pub sender_id: String,
    pub receiver_id: Option<String>,
    pub group_id: Option<String>,
    pub message_type: i16,
    pub content: String,
    pub status: i16,
    /// Client clock, advisory.
    pub send_time: i64,
    /// Server clock, authoritative, unix millis.
    pub server_time: i64,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::conversations::Entity",
        from = "Column::ConversationId",
        to = "super::conversations::Column::Id"
    )]
    Conversations,
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::SenderId",
        to = "super::users::Column::Id"
    )]
    Sender,
}

impl Related<super::conversations::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Conversations.def()
    }
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Sender.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
