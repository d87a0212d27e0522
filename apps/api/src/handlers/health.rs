use crate::gateway::ConnectionRegistry;
use actix_web::{get, web, HttpResponse, Responder};
use serde_json::json;

#[get("/health")]
pub async fn health_check(registry: web::Data<ConnectionRegistry>) -> impl Responder {
    HttpResponse::Ok().json(json!({
        "status": "healthy",
        "connections": registry.connection_count(),
        "online_users": registry.online_user_count(),
    }))
}
