// tests/monetico_return_tests.rs
mod common;

use actix_web::http::header::{self, ContentType};
use actix_web::http::StatusCode;
use actix_web::{test, web, App};
use caisse::models::OrderStatus;
use caisse::web::configure_app_routes;
use common::*;
use serde_json::{json, Value};
use serial_test::serial;

const RETURN_PATH: &str = "/api/payments/monetico/return";

fn notification(pairs: &[(String, String)]) -> test::TestRequest {
  test::TestRequest::post()
    .uri(RETURN_PATH)
    .insert_header(ContentType::form_url_encoded())
    .set_payload(form_body(pairs))
}

fn browser_return(pairs: &[(String, String)]) -> test::TestRequest {
  test::TestRequest::get().uri(&format!("{}?{}", RETURN_PATH, form_body(pairs)))
}

fn location(resp: &actix_web::dev::ServiceResponse) -> String {
  resp
    .headers()
    .get(header::LOCATION)
    .and_then(|v| v.to_str().ok())
    .unwrap_or_default()
    .to_string()
}

#[actix_web::test]
#[serial]
async fn notification_completes_pending_order() {
  let t = test_app(Some(TEST_KEY));
  t.store.seed_order(order("CMD-42", OrderStatus::Pending)).await;
  let app = test::init_service(
    App::new()
      .app_data(web::Data::new(t.state.clone()))
      .configure(configure_app_routes),
  )
  .await;

  let resp = test::call_service(&app, notification(&signed_fields(TEST_KEY, "CMD-42", "paiement")).to_request()).await;

  assert_eq!(resp.status(), StatusCode::OK);
  let body: Value = test::read_body_json(resp).await;
  assert_eq!(body, json!({ "success": true, "reference": "CMD-42" }));

  let stored = t.state.orders.find_order_by_reference("CMD-42").await.unwrap().unwrap();
  assert_eq!(stored.status, OrderStatus::Completed);
  assert_eq!(stored.provider_transaction_id.as_deref(), Some("AUTH42"));
  assert_eq!(t.notifier.count(), 1);
}

#[actix_web::test]
#[serial]
async fn missing_fields_are_rejected_before_any_store_access() {
  let t = test_app(Some(TEST_KEY));
  let app = test::init_service(
    App::new()
      .app_data(web::Data::new(t.state.clone()))
      .configure(configure_app_routes),
  )
  .await;

  let mut pairs = signed_fields(TEST_KEY, "CMD-42", "paiement");
  pairs.retain(|(k, _)| k != "MAC");
  let resp = test::call_service(&app, notification(&pairs).to_request()).await;

  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
  let body: Value = test::read_body_json(resp).await;
  assert_eq!(body, json!({ "error": "Paramètres manquants" }));
  assert_eq!(t.store.access_count(), 0);
}

#[actix_web::test]
#[serial]
async fn blank_required_field_counts_as_missing() {
  let t = test_app(Some(TEST_KEY));
  let app = test::init_service(
    App::new()
      .app_data(web::Data::new(t.state.clone()))
      .configure(configure_app_routes),
  )
  .await;

  let mut pairs = signed_fields(TEST_KEY, "CMD-42", "paiement");
  replace_field(&mut pairs, "montant", "  ");
  let resp = test::call_service(&app, browser_return(&pairs).to_request()).await;

  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
  assert_eq!(t.store.access_count(), 0);
}

#[actix_web::test]
#[serial]
async fn tampered_amount_fails_signature_on_every_transport() {
  let t = test_app(Some(TEST_KEY));
  t.store.seed_order(order("CMD-42", OrderStatus::Pending)).await;
  let app = test::init_service(
    App::new()
      .app_data(web::Data::new(t.state.clone()))
      .configure(configure_app_routes),
  )
  .await;

  let mut pairs = signed_fields(TEST_KEY, "CMD-42", "paiement");
  replace_field(&mut pairs, "montant", "1.00EUR");

  let resp = test::call_service(&app, notification(&pairs).to_request()).await;
  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
  let body: Value = test::read_body_json(resp).await;
  assert_eq!(body, json!({ "error": "Signature invalide" }));

  let resp = test::call_service(&app, browser_return(&pairs).to_request()).await;
  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
  assert!(resp.headers().get(header::LOCATION).is_none());

  assert_eq!(t.store.access_count(), 0);
  let stored = t.state.orders.find_order_by_reference("CMD-42").await.unwrap().unwrap();
  assert_eq!(stored.status, OrderStatus::Pending);
}

#[actix_web::test]
#[serial]
async fn mac_from_another_key_is_rejected() {
  let t = test_app(Some(TEST_KEY));
  let app = test::init_service(
    App::new()
      .app_data(web::Data::new(t.state.clone()))
      .configure(configure_app_routes),
  )
  .await;

  let pairs = signed_fields("FFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFF", "CMD-42", "paiement");
  let resp = test::call_service(&app, notification(&pairs).to_request()).await;
  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
#[serial]
async fn verified_success_without_order_is_acknowledged() {
  let t = test_app(Some(TEST_KEY));
  let app = test::init_service(
    App::new()
      .app_data(web::Data::new(t.state.clone()))
      .configure(configure_app_routes),
  )
  .await;

  let resp = test::call_service(&app, notification(&signed_fields(TEST_KEY, "CMD-404", "paiement")).to_request()).await;

  assert_eq!(resp.status(), StatusCode::OK);
  let body: Value = test::read_body_json(resp).await;
  assert_eq!(body, json!({ "success": true, "reference": "CMD-404" }));
  assert_eq!(t.store.order_count().await, 0);
  assert_eq!(t.notifier.count(), 0);
}

#[actix_web::test]
#[serial]
async fn redelivered_notification_transitions_once() {
  let t = test_app(Some(TEST_KEY));
  t.store.seed_order(order("CMD-42", OrderStatus::Pending)).await;
  let app = test::init_service(
    App::new()
      .app_data(web::Data::new(t.state.clone()))
      .configure(configure_app_routes),
  )
  .await;
  let pairs = signed_fields(TEST_KEY, "CMD-42", "paiement");

  for _ in 0..2 {
    let resp = test::call_service(&app, notification(&pairs).to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["success"], json!(true));
  }

  let stored = t.state.orders.find_order_by_reference("CMD-42").await.unwrap().unwrap();
  assert_eq!(stored.status, OrderStatus::Completed);
  assert_eq!(t.notifier.count(), 1);
}

#[actix_web::test]
#[serial]
async fn refused_payment_leaves_order_pending() {
  let t = test_app(Some(TEST_KEY));
  t.store.seed_order(order("CMD-42", OrderStatus::Pending)).await;
  let app = test::init_service(
    App::new()
      .app_data(web::Data::new(t.state.clone()))
      .configure(configure_app_routes),
  )
  .await;

  let resp = test::call_service(&app, notification(&signed_fields(TEST_KEY, "CMD-42", "Annulation")).to_request()).await;

  assert_eq!(resp.status(), StatusCode::OK);
  let body: Value = test::read_body_json(resp).await;
  assert_eq!(body, json!({ "success": false, "reference": "CMD-42" }));
  let stored = t.state.orders.find_order_by_reference("CMD-42").await.unwrap().unwrap();
  assert_eq!(stored.status, OrderStatus::Pending);
}

#[actix_web::test]
#[serial]
async fn browser_return_redirects_to_result_pages() {
  let t = test_app(Some(TEST_KEY));
  t.store.seed_order(order("CMD-42", OrderStatus::Pending)).await;
  let app = test::init_service(
    App::new()
      .app_data(web::Data::new(t.state.clone()))
      .configure(configure_app_routes),
  )
  .await;

  let resp = test::call_service(&app, browser_return(&signed_fields(TEST_KEY, "CMD-42", "payetest")).to_request()).await;
  assert_eq!(resp.status(), StatusCode::FOUND);
  let target = location(&resp);
  assert_eq!(target, "https://shop.example/payment/success?reference=CMD-42&code-retour=payetest");
  assert!(!target.contains("MAC"));

  let resp = test::call_service(&app, browser_return(&signed_fields(TEST_KEY, "CMD-43", "Annulation")).to_request()).await;
  assert_eq!(resp.status(), StatusCode::FOUND);
  assert_eq!(
    location(&resp),
    "https://shop.example/payment/error?reference=CMD-43&code-retour=Annulation"
  );
}

#[actix_web::test]
#[serial]
async fn post_without_form_content_type_is_a_browser_return() {
  let t = test_app(Some(TEST_KEY));
  t.store.seed_order(order("CMD-42", OrderStatus::Pending)).await;
  let app = test::init_service(
    App::new()
      .app_data(web::Data::new(t.state.clone()))
      .configure(configure_app_routes),
  )
  .await;

  let pairs = signed_fields(TEST_KEY, "CMD-42", "paiement");
  let req = test::TestRequest::post()
    .uri(&format!("{}?{}", RETURN_PATH, form_body(&pairs)))
    .to_request();
  let resp = test::call_service(&app, req).await;

  assert_eq!(resp.status(), StatusCode::FOUND);
  assert!(location(&resp).starts_with("https://shop.example/payment/success?"));
}

#[actix_web::test]
#[serial]
async fn missing_key_is_a_configuration_error() {
  let t = test_app(None);
  t.store.seed_order(order("CMD-42", OrderStatus::Pending)).await;
  let app = test::init_service(
    App::new()
      .app_data(web::Data::new(t.state.clone()))
      .configure(configure_app_routes),
  )
  .await;

  let resp = test::call_service(&app, notification(&signed_fields(TEST_KEY, "CMD-42", "paiement")).to_request()).await;

  assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
  let body: Value = test::read_body_json(resp).await;
  assert!(body["error"].as_str().unwrap().contains("MONETICO_KEY"));
  assert_eq!(t.store.access_count(), 0);
}

#[actix_web::test]
#[serial]
async fn store_failure_is_shaped_per_transport() {
  let t = test_app(Some(TEST_KEY));
  t.store.seed_order(order("CMD-42", OrderStatus::Pending)).await;
  t.store.set_fail_all(true);
  let app = test::init_service(
    App::new()
      .app_data(web::Data::new(t.state.clone()))
      .configure(configure_app_routes),
  )
  .await;
  let pairs = signed_fields(TEST_KEY, "CMD-42", "paiement");

  let resp = test::call_service(&app, notification(&pairs).to_request()).await;
  assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
  let body: Value = test::read_body_json(resp).await;
  assert_eq!(body, json!({ "success": false, "reference": "CMD-42" }));

  let resp = test::call_service(&app, browser_return(&pairs).to_request()).await;
  assert_eq!(resp.status(), StatusCode::FOUND);
  assert!(location(&resp).starts_with("https://shop.example/payment/error?reference=CMD-42"));
}
