use actix_web::{HttpResponse, get, post, web};
use vigil::Engine;

macros_utils::routes! {
    route recent_alerts,
    route reset_cooldowns,
}

#[get("/alerts")]
pub async fn recent_alerts(engine: web::Data<Engine>) -> HttpResponse {
    HttpResponse::Ok().json(engine.recent_alerts())
}

#[post("/notifications/cooldowns/reset")]
pub async fn reset_cooldowns(engine: web::Data<Engine>) -> HttpResponse {
    engine.clear_cooldowns().await;
    HttpResponse::NoContent().finish()
}
