use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use roadside_dispatch::api::rest::router;
use roadside_dispatch::config::Config;
use roadside_dispatch::engine::matching::run_match_worker;
use roadside_dispatch::state::AppState;
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tower::ServiceExt;
use uuid::Uuid;

fn setup() -> (axum::Router, mpsc::Receiver<Uuid>) {
    let (state, rx) = AppState::new(Config::default());
    (router(Arc::new(state)), rx)
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_string(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn driver_payload(lat: f64, lng: f64) -> Value {
    json!({
        "name": "Tow Joe",
        "location": { "lat": lat, "lng": lng },
        "service_radius_km": 50.0,
        "vehicle": {
            "make": "Ford",
            "model": "F-450",
            "year": 2021,
            "license_plate": "7TOW001",
            "towing_capacity": "medium"
        }
    })
}

fn request_payload(lat: f64, lng: f64) -> Value {
    json!({
        "commuter_id": Uuid::new_v4(),
        "pickup_location": { "lat": lat, "lng": lng },
        "dropoff_location": { "lat": lat + 0.05, "lng": lng + 0.05 },
        "pickup_address": "101 Main St",
        "dropoff_address": "5 Garage Way",
        "service_type": "tow"
    })
}

/// Creates a driver and flips them online so candidate search can see them.
async fn online_driver(app: &axum::Router, lat: f64, lng: f64) -> String {
    let res = app
        .clone()
        .oneshot(json_request("POST", "/drivers", driver_payload(lat, lng)))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let driver = body_json(res).await;
    let id = driver["id"].as_str().unwrap().to_string();

    let res = app
        .clone()
        .oneshot(json_request(
            "PATCH",
            &format!("/drivers/{id}/availability"),
            json!({ "is_available": true }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    id
}

#[tokio::test]
async fn health_returns_ok() {
    let (app, _rx) = setup();
    let response = app.oneshot(get_request("/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["requests"], 0);
    assert_eq!(body["drivers"], 0);
    assert_eq!(body["trips"], 0);
}

#[tokio::test]
async fn metrics_returns_prometheus_format() {
    let (app, _rx) = setup();
    let response = app.oneshot(get_request("/metrics")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let content_type = response
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(content_type.contains("text/plain"));

    let body = body_string(response).await;
    assert!(body.contains("match_jobs_in_queue"));
}

#[tokio::test]
async fn create_driver_starts_offline_without_geohash() {
    let (app, _rx) = setup();
    let response = app
        .oneshot(json_request("POST", "/drivers", driver_payload(34.24, -118.53)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["name"], "Tow Joe");
    assert_eq!(body["is_available"], false);
    assert!(body["geohash"].is_null());
    assert_eq!(body["total_trips"], 0);
}

#[tokio::test]
async fn create_driver_empty_name_returns_400() {
    let (app, _rx) = setup();
    let mut payload = driver_payload(34.24, -118.53);
    payload["name"] = json!("  ");

    let response = app
        .oneshot(json_request("POST", "/drivers", payload))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn availability_toggle_maintains_geohash() {
    let (app, _rx) = setup();
    let id = online_driver(&app, 34.24, -118.53).await;

    let res = app
        .clone()
        .oneshot(get_request(&format!("/drivers/{id}")))
        .await
        .unwrap();
    let driver = body_json(res).await;
    assert!(driver["geohash"].as_str().unwrap().len() > 0);

    let res = app
        .clone()
        .oneshot(json_request(
            "PATCH",
            &format!("/drivers/{id}/availability"),
            json!({ "is_available": false }),
        ))
        .await
        .unwrap();
    let driver = body_json(res).await;
    assert!(driver["geohash"].is_null());
}

#[tokio::test]
async fn location_update_recomputes_geohash() {
    let (app, _rx) = setup();
    let id = online_driver(&app, 34.24, -118.53).await;

    let res = app
        .clone()
        .oneshot(get_request(&format!("/drivers/{id}")))
        .await
        .unwrap();
    let before = body_json(res).await["geohash"].as_str().unwrap().to_string();

    let res = app
        .oneshot(json_request(
            "PATCH",
            &format!("/drivers/{id}/location"),
            json!({ "location": { "lat": 40.71, "lng": -74.0 } }),
        ))
        .await
        .unwrap();
    let after = body_json(res).await;
    assert_eq!(after["location"]["lat"], 40.71);
    assert_ne!(after["geohash"].as_str().unwrap(), before);
}

#[tokio::test]
async fn create_request_rejects_null_island() {
    let (app, _rx) = setup();
    let mut payload = request_payload(34.24, -118.53);
    payload["pickup_location"] = json!({ "lat": 0.0, "lng": 0.0 });

    let response = app
        .oneshot(json_request("POST", "/requests", payload))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn create_request_rejects_reserved_service_types() {
    let (app, _rx) = setup();
    let mut payload = request_payload(34.24, -118.53);
    payload["service_type"] = json!("jump_start");

    let response = app
        .oneshot(json_request("POST", "/requests", payload))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn create_request_starts_searching() {
    let (app, _rx) = setup();
    let response = app
        .oneshot(json_request(
            "POST",
            "/requests",
            request_payload(34.24, -118.53),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "searching");
    assert!(body["claimed_by_driver_id"].is_null());
    assert!(body["claim_expires_at"].is_null());
    assert!(body["matched_driver_id"].is_null());
    assert_eq!(body["notified_driver_ids"].as_array().unwrap().len(), 0);
    assert!(body["estimated_eta_minutes"].as_u64().unwrap() > 0);
}

#[tokio::test]
async fn get_nonexistent_request_returns_404() {
    let (app, _rx) = setup();
    let fake_id = "00000000-0000-0000-0000-000000000000";
    let response = app
        .oneshot(get_request(&format!("/requests/{fake_id}")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn list_requests_filters_by_status() {
    let (app, _rx) = setup();
    let res = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/requests",
            request_payload(34.24, -118.53),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = app
        .clone()
        .oneshot(get_request("/requests?status=searching"))
        .await
        .unwrap();
    let searching = body_json(res).await;
    assert_eq!(searching.as_array().unwrap().len(), 1);

    let res = app
        .oneshot(get_request("/requests?status=claimed"))
        .await
        .unwrap();
    let claimed = body_json(res).await;
    assert_eq!(claimed.as_array().unwrap().len(), 0);
}

// Scenario: request created with one nearby online driver is claimed for
// them, and accepting promotes it to a trip.
#[tokio::test]
async fn full_match_and_accept_flow() {
    let (state, rx) = AppState::new(Config::default());
    let shared = Arc::new(state);
    tokio::spawn(run_match_worker(shared.clone(), rx));
    let app = router(shared.clone());

    let driver_id = online_driver(&app, 34.2407, -118.53).await;

    let res = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/requests",
            request_payload(34.24, -118.53),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let request = body_json(res).await;
    let request_id = request["id"].as_str().unwrap().to_string();

    tokio::time::sleep(tokio::time::Duration::from_millis(200)).await;

    let res = app
        .clone()
        .oneshot(get_request(&format!("/requests/{request_id}")))
        .await
        .unwrap();
    let claimed = body_json(res).await;
    assert_eq!(claimed["status"], "claimed");
    assert_eq!(claimed["claimed_by_driver_id"], driver_id);
    assert!(!claimed["claim_expires_at"].is_null());
    assert_eq!(
        claimed["notified_driver_ids"],
        json!([driver_id.clone()])
    );

    let res = app
        .clone()
        .oneshot(get_request(&format!("/drivers/{driver_id}/claimed")))
        .await
        .unwrap();
    let incoming = body_json(res).await;
    assert_eq!(incoming.as_array().unwrap().len(), 1);
    assert_eq!(incoming[0]["id"], request_id);

    let res = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/requests/{request_id}/accept"),
            json!({ "driver_id": driver_id }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let trip = body_json(res).await;
    assert_eq!(trip["status"], "en_route");
    assert_eq!(trip["request_id"], request_id);
    assert_eq!(trip["driver_id"], driver_id);
    assert_eq!(trip["estimated_price"], 75.0);
    assert!(trip["final_price"].is_null());

    let res = app
        .clone()
        .oneshot(get_request(&format!("/requests/{request_id}")))
        .await
        .unwrap();
    let accepted = body_json(res).await;
    assert_eq!(accepted["status"], "accepted");
    assert_eq!(accepted["matched_driver_id"], driver_id);

    let trip_id = trip["id"].as_str().unwrap();
    let res = app
        .oneshot(get_request(&format!("/trips/{trip_id}")))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

// Scenario: a declined request goes back to searching, the declining driver
// stays notified, and with nobody else around it keeps searching.
#[tokio::test]
async fn decline_returns_request_to_searching() {
    let (state, rx) = AppState::new(Config::default());
    let shared = Arc::new(state);
    tokio::spawn(run_match_worker(shared.clone(), rx));
    let app = router(shared.clone());

    let driver_id = online_driver(&app, 34.2407, -118.53).await;

    let res = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/requests",
            request_payload(34.24, -118.53),
        ))
        .await
        .unwrap();
    let request = body_json(res).await;
    let request_id = request["id"].as_str().unwrap().to_string();

    tokio::time::sleep(tokio::time::Duration::from_millis(200)).await;

    let res = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/requests/{request_id}/decline"),
            json!({ "driver_id": driver_id }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = app
        .clone()
        .oneshot(get_request(&format!("/requests/{request_id}")))
        .await
        .unwrap();
    let after = body_json(res).await;
    assert_eq!(after["status"], "searching");
    assert!(after["claimed_by_driver_id"].is_null());
    assert!(after["claim_expires_at"].is_null());
    assert_eq!(after["notified_driver_ids"], json!([driver_id]));
}

#[tokio::test]
async fn accept_by_wrong_driver_returns_conflict() {
    let (state, rx) = AppState::new(Config::default());
    let shared = Arc::new(state);
    tokio::spawn(run_match_worker(shared.clone(), rx));
    let app = router(shared.clone());

    let _driver_id = online_driver(&app, 34.2407, -118.53).await;

    let res = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/requests",
            request_payload(34.24, -118.53),
        ))
        .await
        .unwrap();
    let request = body_json(res).await;
    let request_id = request["id"].as_str().unwrap().to_string();

    tokio::time::sleep(tokio::time::Duration::from_millis(200)).await;

    let res = app
        .oneshot(json_request(
            "POST",
            &format!("/requests/{request_id}/accept"),
            json!({ "driver_id": Uuid::new_v4() }),
        ))
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::CONFLICT);
    let body = body_json(res).await;
    assert_eq!(body["error"], "request no longer available");
}

#[tokio::test]
async fn cancel_searching_request() {
    let (app, _rx) = setup();

    let res = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/requests",
            request_payload(34.24, -118.53),
        ))
        .await
        .unwrap();
    let request = body_json(res).await;
    let request_id = request["id"].as_str().unwrap().to_string();

    let res = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/requests/{request_id}/cancel"),
            json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let cancelled = body_json(res).await;
    assert_eq!(cancelled["status"], "cancelled");

    // Terminal states stay put.
    let res = app
        .oneshot(json_request(
            "POST",
            &format!("/requests/{request_id}/cancel"),
            json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);
}
