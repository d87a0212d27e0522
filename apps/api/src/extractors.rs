//! Request extractor authenticating the HTTP admin surface.

use crate::config::Config;
use actix_web::error::ErrorUnauthorized;
use actix_web::http::header::AUTHORIZATION;
use actix_web::{dev::Payload, web, Error, FromRequest, HttpRequest};
use application::auth::{demo_user_id, tokens};
use std::future::{ready, Ready};

/// The verified caller of an admin route, from `Authorization: Bearer <jwt>`.
pub struct AuthenticatedUser {
    pub user_id: String,
    pub platform: String,
}

impl FromRequest for AuthenticatedUser {
    type Error = Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(authenticate(req))
    }
}

fn authenticate(req: &HttpRequest) -> Result<AuthenticatedUser, Error> {
    let config = req
        .app_data::<web::Data<Config>>()
        .ok_or_else(|| ErrorUnauthorized("server misconfigured"))?;

    let header = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| ErrorUnauthorized("missing authorization header"))?;
    let token = header
        .strip_prefix("Bearer ")
        .ok_or_else(|| ErrorUnauthorized("malformed authorization header"))?;

    if let Some(user_id) = demo_user_id(token) {
        if config.auth.allow_demo_tokens {
            return Ok(AuthenticatedUser {
                user_id: user_id.to_string(),
                platform: "demo".to_string(),
            });
        }
        return Err(ErrorUnauthorized("invalid token"));
    }

    let claims = tokens::verify(token, &config.auth.jwt_secret)
        .map_err(|_| ErrorUnauthorized("invalid token"))?;
    Ok(AuthenticatedUser {
        user_id: claims.user_id,
        platform: claims.platform,
    })
}
