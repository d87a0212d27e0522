use crate::auth::dtos::UserDto;
use crate::{AppError, AppResult};
use im_core::entities::users;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};

pub struct GetUserUseCase;

impl GetUserUseCase {
    pub async fn execute(db: &DatabaseConnection, user_id: &str) -> AppResult<UserDto> {
        let user = users::Entity::find_by_id(user_id.to_string())
            .one(db)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("user {}", user_id)))?;
        Ok(user.into())
    }
}

pub struct GetUsersBatchUseCase;

impl GetUsersBatchUseCase {
    /// Unknown ids are silently dropped; the response keeps store order.
    pub async fn execute(db: &DatabaseConnection, user_ids: &[String]) -> AppResult<Vec<UserDto>> {
        if user_ids.is_empty() {
            return Ok(Vec::new());
        }
        let found = users::Entity::find()
            .filter(users::Column::Id.is_in(user_ids.to_vec()))
            .all(db)
            .await?;
        Ok(found.into_iter().map(Into::into).collect())
    }
}
