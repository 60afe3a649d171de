use axum::http::StatusCode;
use fleet_api::error::{INVALID_VEHICLE_ID, MISSING_REQUIRED_FIELD, NO_VALID_FIELDS};
use fleet_db::{DbError, Vehicle, testing::MemoryPool};
use serde_json::json;
use uuid::Uuid;

use crate::common::{seed_vehicle, test_app, vehicle_body};

const SELECT: &str = "SELECT";
const UPDATE: &str = "UPDATE";
const COMMIT: &str = "COMMIT;";

#[tokio::test]
async fn test_get_vehicle_returns_stored_vehicle() {
    let (pool, client) = test_app();
    let vehicle = seed_vehicle(&pool).await;

    let response = client.get(&format!("/api/vehicles/{}", vehicle.id)).await;

    response.assert_status(StatusCode::OK);
    assert_eq!(response.json::<Vehicle>(), vehicle);

    let body: serde_json::Value = response.json();
    assert_eq!(body["serialNumber"], "SerialNumber42");
    assert_eq!(body["id"], vehicle.id.to_string());
}

#[tokio::test]
async fn test_get_missing_vehicle_returns_404() {
    let (_pool, client) = test_app();

    let response = client.get(&format!("/api/vehicles/{}", Uuid::new_v4())).await;

    response.assert_status(StatusCode::NOT_FOUND);
    assert_eq!(response.error_message(), "Not Found");
}

#[tokio::test]
async fn test_get_with_invalid_id_returns_400() {
    let (pool, client) = test_app();

    let response = client.get("/api/vehicles/not-a-uuid").await;

    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(response.error_message(), INVALID_VEHICLE_ID);
    assert_eq!(pool.acquired(), 0);
}

#[tokio::test]
async fn test_database_failure_returns_generic_500() {
    let (pool, client) = test_app();
    pool.fail_next(SELECT, DbError::database("XX000", "disk on fire"));

    let response = client.get(&format!("/api/vehicles/{}", Uuid::new_v4())).await;

    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    assert!(!response.text().contains("disk on fire"));
}

#[tokio::test]
async fn test_add_vehicle_returns_vehicle_with_new_id() {
    let (pool, client) = test_app();
    let client_id = Uuid::new_v4();
    let mut body = vehicle_body();
    body["id"] = json!(client_id);

    let response = client.post_json("/api/vehicles", &body).await;

    response.assert_status(StatusCode::OK);
    let created: Vehicle = response.json();
    assert_ne!(created.id, client_id);
    assert_eq!(created.make, "Make42");
    assert_eq!(created.year, 1999);
    assert!(pool.row(created.id).is_some());
    assert_eq!(pool.row_count(), 1);
}

#[tokio::test]
async fn test_add_vehicle_without_optional_fields() {
    let (_pool, client) = test_app();
    let body = json!({
        "serialNumber": "SN-1",
        "make": "Volvo",
        "model": "240",
        "year": 1988,
    });

    let response = client.post_json("/api/vehicles", &body).await;

    response.assert_status(StatusCode::OK);
    let created: Vehicle = response.json();
    assert_eq!(created.purchase_date, None);
    assert_eq!(created.color, None);
}

#[tokio::test]
async fn test_add_vehicle_with_missing_field_returns_400() {
    let (pool, client) = test_app();

    for field in ["serialNumber", "make", "model", "year"] {
        let mut body = vehicle_body();
        body.as_object_mut().unwrap().remove(field);

        let response = client.post_json("/api/vehicles", &body).await;

        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(response.error_message(), MISSING_REQUIRED_FIELD);
    }
    assert_eq!(pool.row_count(), 0);
}

#[tokio::test]
async fn test_update_vehicle_merges_fields() {
    let (pool, client) = test_app();
    let vehicle = seed_vehicle(&pool).await;

    let response = client
        .put_json(
            &format!("/api/vehicles/{}", vehicle.id),
            &json!({ "make": "Definitely a different make." }),
        )
        .await;

    response.assert_status(StatusCode::OK);
    let expected = Vehicle {
        make: "Definitely a different make.".to_string(),
        ..vehicle.clone()
    };
    assert_eq!(response.json::<Vehicle>(), expected);

    let response = client.get(&format!("/api/vehicles/{}", vehicle.id)).await;
    assert_eq!(response.json::<Vehicle>(), expected);
}

#[tokio::test]
async fn test_update_ignores_id_in_body() {
    let (pool, client) = test_app();
    let vehicle = seed_vehicle(&pool).await;

    let response = client
        .put_json(
            &format!("/api/vehicles/{}", vehicle.id),
            &json!({ "id": Uuid::new_v4(), "color": "Red" }),
        )
        .await;

    response.assert_status(StatusCode::OK);
    let updated: Vehicle = response.json();
    assert_eq!(updated.id, vehicle.id);
    assert_eq!(updated.color.as_deref(), Some("Red"));
}

#[tokio::test]
async fn test_update_applies_empty_and_null_values_next_to_valid_field() {
    let (pool, client) = test_app();
    let vehicle = seed_vehicle(&pool).await;

    let response = client
        .put_json(
            &format!("/api/vehicles/{}", vehicle.id),
            &json!({ "make": "Saab", "color": "", "description": null }),
        )
        .await;

    response.assert_status(StatusCode::OK);
    let updated: Vehicle = response.json();
    assert_eq!(updated.make, "Saab");
    assert_eq!(updated.color.as_deref(), Some(""));
    assert_eq!(updated.description, None);
    assert_eq!(updated.purchase_date, vehicle.purchase_date);
    assert_stored_color(&pool, &vehicle, "");

    let body: serde_json::Value = response.json();
    assert!(body["description"].is_null());
}

#[tokio::test]
async fn test_update_missing_vehicle_returns_404() {
    let (pool, client) = test_app();

    let response = client
        .put_json(
            &format!("/api/vehicles/{}", Uuid::new_v4()),
            &json!({ "color": "Red" }),
        )
        .await;

    response.assert_status(StatusCode::NOT_FOUND);
    assert_eq!(pool.row_count(), 0);
    assert!(!pool.statement_keywords().contains(&UPDATE.to_string()));
}

#[tokio::test]
async fn test_update_without_valid_fields_returns_400() {
    let (pool, client) = test_app();
    let vehicle = seed_vehicle(&pool).await;

    let response = client
        .put_json(
            &format!("/api/vehicles/{}", vehicle.id),
            &json!({ "extra": "An Extra Field" }),
        )
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(response.error_message(), NO_VALID_FIELDS);
    assert!(pool.statements().is_empty());
}

#[tokio::test]
async fn test_update_with_invalid_id_returns_400() {
    let (_pool, client) = test_app();

    let response = client
        .put_json("/api/vehicles/42", &json!({ "color": "Red" }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(response.error_message(), INVALID_VEHICLE_ID);
}

#[tokio::test(start_paused = true)]
async fn test_update_retries_serialization_conflict() {
    let (pool, client) = test_app();
    let vehicle = seed_vehicle(&pool).await;
    let id = vehicle.id;
    pool.conflict_next(UPDATE, move |table| {
        if let Some(row) = table.get_mut(&id) {
            row.set("model", "Model43");
        }
    });

    let response = client
        .put_json(&format!("/api/vehicles/{id}"), &json!({ "color": "Red" }))
        .await;

    response.assert_status(StatusCode::OK);
    let updated: Vehicle = response.json();
    assert_eq!(updated.model, "Model43");
    assert_eq!(updated.color.as_deref(), Some("Red"));
    assert_eq!(
        pool.statement_keywords(),
        vec!["BEGIN", "SELECT", "ROLLBACK", "BEGIN", "SELECT", "UPDATE", "COMMIT"]
    );
}

#[tokio::test(start_paused = true)]
async fn test_update_exhausting_retries_returns_500() {
    let (pool, client) = test_app();
    let vehicle = seed_vehicle(&pool).await;
    pool.fail_always(COMMIT, DbError::database("40001", "could not serialize access"));

    let response = client
        .put_json(
            &format!("/api/vehicles/{}", vehicle.id),
            &json!({ "color": "Red" }),
        )
        .await;

    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    assert_stored_color(&pool, &vehicle, "Color42");
    assert_eq!(pool.acquired(), pool.released());
}

fn assert_stored_color(pool: &MemoryPool, vehicle: &Vehicle, color: &str) {
    let row = pool.row(vehicle.id).expect("vehicle should still exist");
    assert_eq!(row.get::<String>("color").unwrap(), color);
}
