//! Delivery acks: a client confirming it received a pushed message.

use crate::AppResult;
use im_core::entities::messages;
use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};

pub struct AckMessageUseCase;

impl AckMessageUseCase {
    /// Promote `sent` to `delivered`. Later statuses (read, revoked) are
    /// never downgraded.
    pub async fn execute(db: &DatabaseConnection, server_msg_id: &str) -> AppResult<()> {
        messages::Entity::update_many()
            .col_expr(
                messages::Column::Status,
                Expr::value(messages::STATUS_DELIVERED),
            )
            .filter(messages::Column::ServerMsgId.eq(server_msg_id))
            .filter(messages::Column::Status.eq(messages::STATUS_SENT))
            .exec(db)
            .await?;
        Ok(())
    }
}
