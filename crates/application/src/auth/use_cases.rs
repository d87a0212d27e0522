use crate::auth::dtos::*;
use crate::auth::tokens;
use crate::{AppError, AppResult};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::Utc;
use im_core::entities::users;
use im_core::ids;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
};
use validator::Validate;

pub struct AuthConfig {
    pub jwt_secret: String,
    pub token_expire_hours: i64,
}

// ============ Register Use Case ============

pub struct RegisterUseCase;

impl RegisterUseCase {
    pub async fn execute(db: &DatabaseConnection, req: RegisterRequest) -> AppResult<UserDto> {
        req.validate()?;

        let existing = users::Entity::find()
            .filter(users::Column::Username.eq(&req.username))
            .one(db)
            .await?;
        if existing.is_some() {
            return Err(AppError::Conflict("username already exists".to_string()));
        }

        let salt = SaltString::generate(&mut OsRng);
        let password_hash = Argon2::default()
            .hash_password(req.password.as_bytes(), &salt)?
            .to_string();

        let user = users::ActiveModel {
            id: Set(ids::new_entity_id()),
            username: Set(req.username),
            password_hash: Set(password_hash),
            nickname: Set(req.nickname),
            avatar: Set(None),
            status: Set(1),
            created_at: Set(Utc::now().into()),
            updated_at: Set(Utc::now().into()),
        };

        let user = user.insert(db).await?;
        Ok(user.into())
    }
}

// ============ Login Use Case ============

pub struct LoginUseCase;

impl LoginUseCase {
    pub async fn execute(
        db: &DatabaseConnection,
        config: &AuthConfig,
        req: LoginRequest,
    ) -> AppResult<LoginResponse> {
        req.validate()?;

        let user = users::Entity::find()
            .filter(users::Column::Username.eq(&req.username))
            .one(db)
            .await?
            .ok_or_else(|| AppError::NotFound("user".to_string()))?;

        let parsed = PasswordHash::new(&user.password_hash)?;
        Argon2::default()
            .verify_password(req.password.as_bytes(), &parsed)
            .map_err(|_| AppError::Authentication("invalid password".to_string()))?;

        let platform = req.platform.as_deref().unwrap_or("unknown");
        let token = tokens::mint(
            &user.id,
            platform,
            &config.jwt_secret,
            config.token_expire_hours,
        )?;

        Ok(LoginResponse {
            token,
            user: user.into(),
        })
    }
}
