use chrono::{DateTime, Utc};
use im_core::entities::users;
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 3, max = 64, message = "Username must be between 3-64 characters"))]
    pub username: String,
    #[validate(length(min = 6, max = 128, message = "Password must be between 6-128 characters"))]
    pub password: String,
    #[validate(length(min = 1, max = 100, message = "Nickname must be between 1-100 characters"))]
    pub nickname: String,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 3, max = 64))]
    pub username: String,
    #[validate(length(min = 6, max = 128))]
    pub password: String,
    #[serde(default)]
    pub platform: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: UserDto,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserDto {
    pub user_id: String,
    pub username: String,
    pub nickname: String,
    pub avatar: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<users::Model> for UserDto {
    fn from(user: users::Model) -> Self {
        Self {
            user_id: user.id,
            username: user.username,
            nickname: user.nickname,
            avatar: user.avatar,
            created_at: user.created_at.into(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub error_code: String,
}
