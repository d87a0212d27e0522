use actix_web::HttpResponse;
use application::auth::dtos::ErrorResponse;
use application::AppError;

/// Convert AppError to HTTP response
pub fn app_error_to_response(err: AppError) -> HttpResponse {
    let status_code = err.status_code();
    let error_response = ErrorResponse {
        error: err.to_string(),
        error_code: err.error_code().to_string(),
    };

    match status_code {
        400 => HttpResponse::BadRequest().json(error_response),
        401 => HttpResponse::Unauthorized().json(error_response),
        403 => HttpResponse::Forbidden().json(error_response),
        404 => HttpResponse::NotFound().json(error_response),
        409 => HttpResponse::Conflict().json(error_response),
        413 => HttpResponse::PayloadTooLarge().json(error_response),
        429 => HttpResponse::TooManyRequests().json(error_response),
        _ => HttpResponse::InternalServerError().json(error_response),
    }
}
