use crate::extractors::AuthenticatedUser;
use crate::handlers::error_handler::app_error_to_response;
use actix_web::{get, post, web, HttpResponse, Responder};
use application::groups::dtos::CreateGroupRequest;
use application::groups::use_cases::{CreateGroupUseCase, ListGroupMembersUseCase};
use sea_orm::DatabaseConnection;
use tracing::info;

#[post("/api/group/create")]
pub async fn create_group(
    caller: AuthenticatedUser,
    db: web::Data<DatabaseConnection>,
    req: web::Json<CreateGroupRequest>,
) -> impl Responder {
    match CreateGroupUseCase::execute(db.get_ref(), &caller.user_id, req.into_inner()).await {
        Ok(group) => {
            info!(group_id = %group.group_id, owner = %caller.user_id, "group created");
            HttpResponse::Ok().json(group)
        }
        Err(err) => app_error_to_response(err),
    }
}

#[get("/api/group/{id}/members")]
pub async fn group_members(
    caller: AuthenticatedUser,
    db: web::Data<DatabaseConnection>,
    path: web::Path<String>,
) -> impl Responder {
    let group_id = path.into_inner();
    match ListGroupMembersUseCase::execute(db.get_ref(), &group_id, &caller.user_id).await {
        Ok(members) => HttpResponse::Ok().json(members),
        Err(err) => app_error_to_response(err),
    }
}
