use actix_web::{HttpResponse, delete, get, post, put, web};
use vigil::{Engine, TargetConfig, TargetId};

use crate::error::AppError;

macros_utils::routes! {
    route list_targets,
    route add_target,
    route get_target,
    route update_target,
    route remove_target,
    route check_target,
}

fn parse_id(raw: &str) -> Result<TargetId, AppError> {
    raw.parse().map_err(|_| AppError::BadId(raw.to_string()))
}

#[get("/targets")]
pub async fn list_targets(engine: web::Data<Engine>) -> HttpResponse {
    HttpResponse::Ok().json(engine.list_targets().await)
}

#[post("/targets")]
pub async fn add_target(
    engine: web::Data<Engine>,
    body: web::Json<TargetConfig>,
) -> Result<HttpResponse, AppError> {
    let target = engine.add_target(body.into_inner()).await?;
    Ok(HttpResponse::Created().json(target))
}

#[get("/targets/{id}")]
pub async fn get_target(
    engine: web::Data<Engine>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let id = parse_id(&path)?;
    Ok(HttpResponse::Ok().json(engine.get_target(&id).await?))
}

#[put("/targets/{id}")]
pub async fn update_target(
    engine: web::Data<Engine>,
    path: web::Path<String>,
    body: web::Json<TargetConfig>,
) -> Result<HttpResponse, AppError> {
    let id = parse_id(&path)?;
    let target = engine.update_target(id, body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(target))
}

#[delete("/targets/{id}")]
pub async fn remove_target(
    engine: web::Data<Engine>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    engine.remove_target(parse_id(&path)?).await?;
    Ok(HttpResponse::NoContent().finish())
}

/// Blocks until the (possibly shared) probe run completes.
#[post("/targets/{id}/check")]
pub async fn check_target(
    engine: web::Data<Engine>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let status = engine.manual_check(parse_id(&path)?).await?;
    Ok(HttpResponse::Ok().json(status))
}
