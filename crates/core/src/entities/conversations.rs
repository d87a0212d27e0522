use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

pub const TYPE_SINGLE: i16 = 1;
pub const TYPE_GROUP: i16 = 2;

/// Conversation summary, keyed by the deterministic conversation id
/// (`single_<a>_<b>` / `group_<gid>`). Refreshed on every successful send.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "conversations")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub conversation_type: i16,
    pub last_message_id: Option<String>,
    pub last_message: Option<String>,
    pub last_message_at: i64,
    pub unread_count: i32,
    pub status: i16,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::messages::Entity")]
    Messages,
}

impl Related<super::messages::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Messages.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
