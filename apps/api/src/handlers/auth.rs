use crate::config::Config;
use crate::handlers::error_handler::app_error_to_response;
use actix_web::{post, web, HttpResponse, Responder};
use application::auth::dtos::*;
use application::auth::use_cases::{AuthConfig, LoginUseCase, RegisterUseCase};
use sea_orm::DatabaseConnection;
use tracing::{error, info};

#[post("/api/auth/register")]
pub async fn register(
    db: web::Data<DatabaseConnection>,
    req: web::Json<RegisterRequest>,
) -> impl Responder {
    match RegisterUseCase::execute(db.get_ref(), req.into_inner()).await {
        Ok(user) => {
            info!(user_id = %user.user_id, "user registered");
            HttpResponse::Ok().json(user)
        }
        Err(err) => {
            error!(error = %err, "register failed");
            app_error_to_response(err)
        }
    }
}

#[post("/api/auth/login")]
pub async fn login(
    db: web::Data<DatabaseConnection>,
    config: web::Data<Config>,
    req: web::Json<LoginRequest>,
) -> impl Responder {
    let auth_config = AuthConfig {
        jwt_secret: config.auth.jwt_secret.clone(),
        token_expire_hours: config.auth.token_expire_hours,
    };

    match LoginUseCase::execute(db.get_ref(), &auth_config, req.into_inner()).await {
        Ok(response) => {
            info!(user_id = %response.user.user_id, "user logged in");
            HttpResponse::Ok().json(response)
        }
        Err(err) => app_error_to_response(err),
    }
}
