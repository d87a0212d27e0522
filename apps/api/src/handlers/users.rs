use crate::extractors::AuthenticatedUser;
use crate::handlers::error_handler::app_error_to_response;
use actix_web::{get, post, web, HttpResponse, Responder};
use application::users::use_cases::{GetUserUseCase, GetUsersBatchUseCase};
use sea_orm::DatabaseConnection;
use serde::Deserialize;

#[get("/api/user/info/{id}")]
pub async fn user_info(
    _caller: AuthenticatedUser,
    db: web::Data<DatabaseConnection>,
    path: web::Path<String>,
) -> impl Responder {
    let user_id = path.into_inner();
    match GetUserUseCase::execute(db.get_ref(), &user_id).await {
        Ok(user) => HttpResponse::Ok().json(user),
        Err(err) => app_error_to_response(err),
    }
}

#[derive(Debug, Deserialize)]
pub struct BatchUserInfoRequest {
    pub user_ids: Vec<String>,
}

#[post("/api/user/info/batch")]
pub async fn user_info_batch(
    _caller: AuthenticatedUser,
    db: web::Data<DatabaseConnection>,
    req: web::Json<BatchUserInfoRequest>,
) -> impl Responder {
    match GetUsersBatchUseCase::execute(db.get_ref(), &req.user_ids).await {
        Ok(users) => HttpResponse::Ok().json(users),
        Err(err) => app_error_to_response(err),
    }
}
