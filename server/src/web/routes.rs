// caisse/src/web/routes.rs

use actix_web::{web, HttpResponse};

use crate::errors::AppError;
use crate::web::handlers::{admin_handlers, monetico_handlers, order_handlers, paypal_handlers};

async fn health_check_handler() -> HttpResponse {
  HttpResponse::Ok().json(serde_json::json!({ "status": "ok" }))
}

/// Malformed JSON bodies are reported like any other validation failure.
fn json_config() -> web::JsonConfig {
  web::JsonConfig::default().error_handler(|err, _req| AppError::Validation(err.to_string()).into())
}

pub fn configure_app_routes(cfg: &mut web::ServiceConfig) {
  cfg
    .app_data(json_config())
    .route("/health", web::get().to(health_check_handler))
    .service(
      web::scope("/api")
        .service(
          web::scope("/payments")
            .service(
              web::resource("/monetico/return")
                .route(web::get().to(monetico_handlers::monetico_return_handler))
                .route(web::post().to(monetico_handlers::monetico_return_handler)),
            )
            .route("/monetico/form", web::post().to(monetico_handlers::payment_form_handler))
            .route("/paypal/capture", web::post().to(paypal_handlers::record_capture_handler)),
        )
        .route("/orders", web::post().to(order_handlers::create_order_handler))
        .service(
          web::scope("/admin/payment-intents")
            .route("/orphans", web::get().to(admin_handlers::list_orphans_handler))
            .route("/replay", web::post().to(admin_handlers::replay_intent_handler)),
        ),
    );
}
