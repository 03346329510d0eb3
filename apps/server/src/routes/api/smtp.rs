use actix_web::{HttpResponse, get, post, web};
use serde::Deserialize;
use serde_json::json;
use vigil::{Engine, SmtpConfig, SmtpProvider};

use crate::error::AppError;

macros_utils::routes! {
    route test_smtp,
    route send_test_email,
    route provider_defaults,
}

#[derive(Debug, Default, Deserialize)]
pub struct TestEmailRequest {
    pub to: Option<String>,
}

/// Connect and authenticate with the given settings; nothing is sent or saved.
#[post("/smtp/test")]
pub async fn test_smtp(
    engine: web::Data<Engine>,
    body: web::Json<SmtpConfig>,
) -> Result<HttpResponse, AppError> {
    engine.test_smtp(&body).await?;
    Ok(HttpResponse::Ok().json(json!({ "ok": true })))
}

#[post("/smtp/test-email")]
pub async fn send_test_email(
    engine: web::Data<Engine>,
    body: Option<web::Json<TestEmailRequest>>,
) -> Result<HttpResponse, AppError> {
    let request = body.map(web::Json::into_inner).unwrap_or_default();
    engine.send_test_email(request.to.as_deref()).await?;
    Ok(HttpResponse::Ok().json(json!({ "ok": true })))
}

#[get("/smtp/providers/{provider}")]
pub async fn provider_defaults(
    engine: web::Data<Engine>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let provider: SmtpProvider = path.parse()?;
    Ok(HttpResponse::Ok().json(engine.provider_defaults(provider)))
}
