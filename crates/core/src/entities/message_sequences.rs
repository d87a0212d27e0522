use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// One row per conversation carrying the highest assigned seq. The
/// transactional read-modify-write on this row is what serializes concurrent
/// senders.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "message_sequences")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub conversation_id: String,
    pub max_seq: i64,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
