use actix_web::{HttpResponse, get, put, web};
use vigil::{Engine, Settings};

use crate::error::AppError;

macros_utils::routes! {
    route get_settings,
    route save_settings,
}

#[get("/settings")]
pub async fn get_settings(engine: web::Data<Engine>) -> HttpResponse {
    HttpResponse::Ok().json(engine.get_settings().as_ref())
}

/// Replaces the settings wholesale; partial bodies fill unset fields with defaults.
#[put("/settings")]
pub async fn save_settings(
    engine: web::Data<Engine>,
    body: web::Json<Settings>,
) -> Result<HttpResponse, AppError> {
    engine.save_settings(body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(engine.get_settings().as_ref()))
}
