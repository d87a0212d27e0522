use protocol::ErrorCode;
use thiserror::Error;

/// Application-level errors
#[derive(Debug, Error)]
pub enum AppError {
    /// Authentication errors (401)
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Token past its expiry (401)
    #[error("Token expired")]
    TokenExpired,

    /// Authorization errors (403)
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Validation errors (400)
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Not found errors (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Conflict errors (409) - e.g. duplicate unique key
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Payload above the configured ceiling (413)
    #[error("Message too large")]
    MessageTooLarge,

    /// Rate limiting errors (429)
    #[error("Rate limit exceeded")]
    RateLimited,

    /// Database errors (500 or mapped)
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// Internal server errors (500)
    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// HTTP status for the admin surface.
    pub fn status_code(&self) -> u16 {
        match self {
            AppError::Authentication(_) | AppError::TokenExpired => 401,
            AppError::PermissionDenied(_) => 403,
            AppError::Validation(_) => 400,
            AppError::NotFound(_) => 404,
            AppError::Conflict(_) => 409,
            AppError::MessageTooLarge => 413,
            AppError::RateLimited => 429,
            AppError::Database(e) => match e {
                sea_orm::DbErr::RecordNotFound(_) => 404,
                e if is_unique_violation(e) => 409,
                _ => 500,
            },
            AppError::Internal(_) => 500,
        }
    }

    /// Canonical code surfaced on the binary protocol. Store errors collapse
    /// to `Unknown` unless a specific kind applies.
    pub fn wire_code(&self) -> ErrorCode {
        match self {
            AppError::Authentication(_) => ErrorCode::AuthFailed,
            AppError::TokenExpired => ErrorCode::TokenExpired,
            AppError::PermissionDenied(_) => ErrorCode::PermissionDenied,
            AppError::Validation(_) => ErrorCode::InvalidParam,
            AppError::NotFound(_) => ErrorCode::UserNotExist,
            AppError::Conflict(_) => ErrorCode::InvalidParam,
            AppError::MessageTooLarge => ErrorCode::MessageTooLarge,
            AppError::RateLimited => ErrorCode::SendTooFast,
            AppError::Database(sea_orm::DbErr::RecordNotFound(_)) => ErrorCode::ConversationNotExist,
            AppError::Database(_) | AppError::Internal(_) => ErrorCode::Unknown,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::Authentication(_) => "AUTHENTICATION_FAILED",
            AppError::TokenExpired => "TOKEN_EXPIRED",
            AppError::PermissionDenied(_) => "PERMISSION_DENIED",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Conflict(_) => "CONFLICT",
            AppError::MessageTooLarge => "MESSAGE_TOO_LARGE",
            AppError::RateLimited => "RATE_LIMITED",
            AppError::Database(e) if is_unique_violation(e) => "CONFLICT",
            AppError::Database(_) => "DATABASE_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

/// Postgres reports 23505 with either of these phrasings depending on the
/// driver layer the error crossed.
pub fn is_unique_violation(err: &sea_orm::DbErr) -> bool {
    let text = err.to_string();
    text.contains("duplicate key") || text.contains("unique constraint") || text.contains("Duplicate entry")
}

impl From<jsonwebtoken::errors::Error> for AppError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => AppError::TokenExpired,
            _ => AppError::Authentication(format!("JWT error: {}", err)),
        }
    }
}

impl From<argon2::password_hash::Error> for AppError {
    fn from(err: argon2::password_hash::Error) -> Self {
        AppError::Authentication(format!("Password hashing error: {}", err))
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        let messages: Vec<String> = err
            .field_errors()
            .iter()
            .flat_map(|(field, errors)| {
                errors.iter().map(move |e| {
                    format!(
                        "{}: {}",
                        field,
                        e.message
                            .as_ref()
                            .map(|m| m.to_string())
                            .unwrap_or_else(|| "validation failed".to_string())
                    )
                })
            })
            .collect();
        AppError::Validation(messages.join(", "))
    }
}

/// Result type alias for application errors
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_codes_cover_the_catalog() {
        assert_eq!(
            AppError::Authentication("x".into()).wire_code(),
            ErrorCode::AuthFailed
        );
        assert_eq!(AppError::TokenExpired.wire_code(), ErrorCode::TokenExpired);
        assert_eq!(AppError::MessageTooLarge.wire_code(), ErrorCode::MessageTooLarge);
        assert_eq!(AppError::RateLimited.wire_code(), ErrorCode::SendTooFast);
        assert_eq!(
            AppError::PermissionDenied("not the sender".into()).wire_code(),
            ErrorCode::PermissionDenied
        );
    }

    #[test]
    fn store_errors_collapse_to_unknown() {
        let err = AppError::Database(sea_orm::DbErr::Custom("boom".into()));
        assert_eq!(err.wire_code(), ErrorCode::Unknown);
        assert_eq!(err.status_code(), 500);
    }

    #[test]
    fn expired_jwt_maps_to_token_expired() {
        let err: AppError =
            jsonwebtoken::errors::Error::from(jsonwebtoken::errors::ErrorKind::ExpiredSignature).into();
        assert!(matches!(err, AppError::TokenExpired));
    }
}
