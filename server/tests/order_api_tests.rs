// tests/order_api_tests.rs
mod common;

use actix_web::http::StatusCode;
use actix_web::{test, web, App};
use caisse::models::{DeliveryType, IntentStatus, OrderStatus, PickupPoint, Provider};
use caisse::monetico::{mac, MacKey, MoneticoFields};
use caisse::orders;
use caisse::web::auth::INTERNAL_SECRET_HEADER;
use caisse::web::configure_app_routes;
use common::*;
use serde_json::{json, Value};
use serial_test::serial;

#[actix_web::test]
#[serial]
async fn order_creation_requires_the_internal_secret() {
  let t = test_app(Some(TEST_KEY));
  let app = test::init_service(
    App::new()
      .app_data(web::Data::new(t.state.clone()))
      .configure(configure_app_routes),
  )
  .await;

  let req = test::TestRequest::post()
    .uri("/api/orders")
    .set_json(order_input("WEB-1"))
    .to_request();
  assert_eq!(test::call_service(&app, req).await.status(), StatusCode::UNAUTHORIZED);

  let req = test::TestRequest::post()
    .uri("/api/orders")
    .insert_header((INTERNAL_SECRET_HEADER, "not-the-secret"))
    .set_json(order_input("WEB-1"))
    .to_request();
  assert_eq!(test::call_service(&app, req).await.status(), StatusCode::UNAUTHORIZED);
  assert_eq!(t.store.order_count().await, 0);
}

#[actix_web::test]
#[serial]
async fn creates_pending_order_with_frozen_attributes() {
  let t = test_app(Some(TEST_KEY));
  let app = test::init_service(
    App::new()
      .app_data(web::Data::new(t.state.clone()))
      .configure(configure_app_routes),
  )
  .await;

  let req = test::TestRequest::post()
    .uri("/api/orders")
    .insert_header((INTERNAL_SECRET_HEADER, INTERNAL_SECRET))
    .set_json(order_input("WEB-1"))
    .to_request();
  let resp = test::call_service(&app, req).await;

  assert_eq!(resp.status(), StatusCode::CREATED);
  let body: Value = test::read_body_json(resp).await;
  assert_eq!(body["ok"], json!(true));
  assert_eq!(body["order"]["reference"], json!("WEB-1"));
  assert_eq!(body["order"]["status"], json!("pending"));
  assert_eq!(body["order"]["items"][0]["attributes"]["flavor"], json!("vanille"));
  assert_eq!(t.store.order_count().await, 1);
}

#[actix_web::test]
#[serial]
async fn relay_delivery_needs_a_complete_pickup_point() {
  let t = test_app(Some(TEST_KEY));
  let app = test::init_service(
    App::new()
      .app_data(web::Data::new(t.state.clone()))
      .configure(configure_app_routes),
  )
  .await;

  let mut input = order_input("WEB-2");
  input.delivery_type = DeliveryType::Relay;
  input.pickup_point = Some(PickupPoint {
    id: "RELAY-9".to_string(),
    address1: "1 rue du Port".to_string(),
    zip: "".to_string(),
    city: "Nantes".to_string(),
    country_code: "FR".to_string(),
    ..Default::default()
  });

  let req = test::TestRequest::post()
    .uri("/api/orders")
    .insert_header((INTERNAL_SECRET_HEADER, INTERNAL_SECRET))
    .set_json(&input)
    .to_request();
  let resp = test::call_service(&app, req).await;

  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
  let body: Value = test::read_body_json(resp).await;
  assert_eq!(body["ok"], json!(false));
  assert_eq!(body["kind"], json!("validation"));
  assert!(body["error"].as_str().unwrap().contains("zip"));
  assert_eq!(t.store.order_count().await, 0);
}

#[actix_web::test]
#[serial]
async fn duplicate_reference_is_a_validation_failure() {
  let t = test_app(Some(TEST_KEY));
  let app = test::init_service(
    App::new()
      .app_data(web::Data::new(t.state.clone()))
      .configure(configure_app_routes),
  )
  .await;

  for expected in [StatusCode::CREATED, StatusCode::BAD_REQUEST] {
    let req = test::TestRequest::post()
      .uri("/api/orders")
      .insert_header((INTERNAL_SECRET_HEADER, INTERNAL_SECRET))
      .set_json(order_input("WEB-3"))
      .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), expected);
  }
  assert_eq!(t.store.order_count().await, 1);
}

#[actix_web::test]
#[serial]
async fn malformed_body_is_rejected_as_validation() {
  let t = test_app(Some(TEST_KEY));
  let app = test::init_service(
    App::new()
      .app_data(web::Data::new(t.state.clone()))
      .configure(configure_app_routes),
  )
  .await;

  let req = test::TestRequest::post()
    .uri("/api/orders")
    .insert_header((INTERNAL_SECRET_HEADER, INTERNAL_SECRET))
    .insert_header(("content-type", "application/json"))
    .set_payload("{\"reference\": ")
    .to_request();
  let resp = test::call_service(&app, req).await;
  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
  let body: Value = test::read_body_json(resp).await;
  assert!(body["error"].is_string());
}

#[actix_web::test]
#[serial]
async fn payment_form_is_signed_for_pending_order() {
  let t = test_app(Some(TEST_KEY));
  t.store.seed_order(order("CMD-42", OrderStatus::Pending)).await;
  let app = test::init_service(
    App::new()
      .app_data(web::Data::new(t.state.clone()))
      .configure(configure_app_routes),
  )
  .await;

  let req = test::TestRequest::post()
    .uri("/api/payments/monetico/form")
    .insert_header((INTERNAL_SECRET_HEADER, INTERNAL_SECRET))
    .set_json(json!({ "reference": "CMD-42" }))
    .to_request();
  let resp = test::call_service(&app, req).await;

  assert_eq!(resp.status(), StatusCode::OK);
  let body: Value = test::read_body_json(resp).await;
  let fields = body["fields"].as_object().unwrap();
  assert_eq!(fields["montant"], json!("199.00EUR"));
  assert_eq!(fields["TPE"], json!("1234567"));
  assert_eq!(fields["reference"], json!("CMD-42"));

  let signed = MoneticoFields::from_pairs(
    fields
      .iter()
      .filter(|(k, _)| k.as_str() != "MAC")
      .map(|(k, v)| (k.clone(), v.as_str().unwrap().to_string())),
  );
  let key = MacKey::from_hex(TEST_KEY).unwrap();
  assert!(mac::verify(&key, &signed.mac_message(), fields["MAC"].as_str().unwrap()));
}

#[actix_web::test]
#[serial]
async fn payment_form_refuses_completed_order() {
  let t = test_app(Some(TEST_KEY));
  t.store.seed_order(order("CMD-42", OrderStatus::Completed)).await;
  let app = test::init_service(
    App::new()
      .app_data(web::Data::new(t.state.clone()))
      .configure(configure_app_routes),
  )
  .await;

  let req = test::TestRequest::post()
    .uri("/api/payments/monetico/form")
    .insert_header((INTERNAL_SECRET_HEADER, INTERNAL_SECRET))
    .set_json(json!({ "reference": "CMD-42" }))
    .to_request();
  assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
#[serial]
async fn completed_paypal_capture_creates_and_links_order() {
  let t = test_app(Some(TEST_KEY));
  let app = test::init_service(
    App::new()
      .app_data(web::Data::new(t.state.clone()))
      .configure(configure_app_routes),
  )
  .await;

  let capture = json!({ "providerOrderId": "PP-100", "status": "COMPLETED", "order": order_input("WEB-PP-1") });
  let req = test::TestRequest::post()
    .uri("/api/payments/paypal/capture")
    .insert_header((INTERNAL_SECRET_HEADER, INTERNAL_SECRET))
    .set_json(&capture)
    .to_request();
  let resp = test::call_service(&app, req).await;

  assert_eq!(resp.status(), StatusCode::OK);
  let body: Value = test::read_body_json(resp).await;
  assert_eq!(body["ok"], json!(true));
  assert_eq!(body["reference"], json!("WEB-PP-1"));

  let intent = t.state.ledger.find(Provider::Paypal, "PP-100").await.unwrap().unwrap();
  assert_eq!(intent.status, IntentStatus::Captured);
  assert_eq!(intent.order_id.map(|id| id.to_string()), body["orderId"].as_str().map(str::to_string));

  let req = test::TestRequest::post()
    .uri("/api/payments/paypal/capture")
    .insert_header((INTERNAL_SECRET_HEADER, INTERNAL_SECRET))
    .set_json(&capture)
    .to_request();
  let body: Value = test::read_body_json(test::call_service(&app, req).await).await;
  assert_eq!(body["ok"], json!(true));
  assert_eq!(t.store.order_count().await, 1);
}

#[actix_web::test]
#[serial]
async fn declined_paypal_capture_is_recorded_as_failed() {
  let t = test_app(Some(TEST_KEY));
  let app = test::init_service(
    App::new()
      .app_data(web::Data::new(t.state.clone()))
      .configure(configure_app_routes),
  )
  .await;

  let req = test::TestRequest::post()
    .uri("/api/payments/paypal/capture")
    .insert_header((INTERNAL_SECRET_HEADER, INTERNAL_SECRET))
    .set_json(json!({ "providerOrderId": "PP-101", "status": "DECLINED", "order": order_input("WEB-PP-2") }))
    .to_request();
  let resp = test::call_service(&app, req).await;

  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
  let body: Value = test::read_body_json(resp).await;
  assert_eq!(body["ok"], json!(false));
  assert_eq!(body["kind"], json!("validation"));
  assert_eq!(body["error"], json!("Payment not completed (status DECLINED)"));
  let intent = t.state.ledger.find(Provider::Paypal, "PP-101").await.unwrap().unwrap();
  assert_eq!(intent.status, IntentStatus::Failed);
  assert!(intent.order_id.is_none());
  assert_eq!(t.store.order_count().await, 0);
}

#[actix_web::test]
#[serial]
async fn capture_with_invalid_order_fails_the_intent() {
  let t = test_app(Some(TEST_KEY));
  let app = test::init_service(
    App::new()
      .app_data(web::Data::new(t.state.clone()))
      .configure(configure_app_routes),
  )
  .await;

  let mut input = order_input("WEB-PP-3");
  input.items.clear();
  let req = test::TestRequest::post()
    .uri("/api/payments/paypal/capture")
    .insert_header((INTERNAL_SECRET_HEADER, INTERNAL_SECRET))
    .set_json(json!({ "providerOrderId": "PP-102", "status": "COMPLETED", "order": input }))
    .to_request();
  let resp = test::call_service(&app, req).await;

  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
  let body: Value = test::read_body_json(resp).await;
  assert_eq!(body["kind"], json!("validation"));
  let intent = t.state.ledger.find(Provider::Paypal, "PP-102").await.unwrap().unwrap();
  assert_eq!(intent.status, IntentStatus::Failed);
  assert!(intent.last_error.is_some());
}

#[actix_web::test]
#[serial]
async fn capture_retry_after_interrupted_link_adopts_the_order() {
  let t = test_app(Some(TEST_KEY));
  let input = order_input("WEB-PP-4");
  let created = orders::create_order(&t.state, input.clone()).await.unwrap();
  t.state.ledger.record_attempt(Provider::Paypal, "PP-103", &input).await.unwrap();
  t.state.ledger.mark_captured(Provider::Paypal, "PP-103").await.unwrap();
  let app = test::init_service(
    App::new()
      .app_data(web::Data::new(t.state.clone()))
      .configure(configure_app_routes),
  )
  .await;

  let req = test::TestRequest::post()
    .uri("/api/payments/paypal/capture")
    .insert_header((INTERNAL_SECRET_HEADER, INTERNAL_SECRET))
    .set_json(json!({ "providerOrderId": "PP-103", "status": "COMPLETED", "order": input }))
    .to_request();
  let resp = test::call_service(&app, req).await;

  assert_eq!(resp.status(), StatusCode::OK);
  let body: Value = test::read_body_json(resp).await;
  assert_eq!(body["ok"], json!(true));
  assert_eq!(body["orderId"], json!(created.id));
  assert_eq!(t.store.order_count().await, 1);

  let intent = t.state.ledger.find(Provider::Paypal, "PP-103").await.unwrap().unwrap();
  assert_eq!(intent.status, IntentStatus::Captured);
  assert_eq!(intent.order_id, Some(created.id));
  assert!(intent.last_error.is_none());
}
