use std::time::Duration;

use axum::{
    Router,
    body::Body,
    http::{HeaderMap, Request, StatusCode},
    middleware,
};
use fleet_api::{middleware::request_id::request_id_middleware, router, state::ApiState};
use fleet_db::{NewVehicle, RetryPolicy, Vehicle, VehicleRepository, testing::MemoryPool};
use http_body_util::BodyExt;
use serde::Deserialize;
use tower::ServiceExt;

/// Build the application router over a fresh in-memory pool.
pub fn test_app() -> (MemoryPool, TestClient) {
    let pool = MemoryPool::new();
    let state = ApiState::new(pool.clone(), RetryPolicy::default());
    let app = router::router()
        .with_state(state)
        .layer(middleware::from_fn(request_id_middleware));

    (pool, TestClient::new(app))
}

/// A complete vehicle payload, as a client would send it.
pub fn vehicle_body() -> serde_json::Value {
    serde_json::json!({
        "purchaseDate": "2023-11-14T22:13:20Z",
        "serialNumber": "SerialNumber42",
        "make": "Make42",
        "model": "Model42",
        "year": 1999,
        "color": "Color42",
        "description": "Description42",
    })
}

/// Store a vehicle directly through the repository.
pub async fn seed_vehicle(pool: &MemoryPool) -> Vehicle {
    let repository = VehicleRepository::with_retry_policy(
        pool.clone(),
        RetryPolicy::new(1, Duration::ZERO),
    );
    let vehicle: NewVehicle =
        serde_json::from_value(vehicle_body()).expect("Failed to build vehicle");

    let stored = repository
        .add_vehicle(&vehicle)
        .await
        .expect("Failed to seed vehicle")
        .expect("Seeded vehicle should be returned");
    pool.clear_statements();
    stored
}

/// Helper to make requests to the test app
pub struct TestClient {
    router: Router,
}

impl TestClient {
    pub fn new(router: Router) -> Self {
        Self { router }
    }

    /// Send a request and get the response
    pub async fn request(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to execute request");

        let status = response.status();
        let headers = response.headers().clone();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to read response body")
            .to_bytes();

        TestResponse {
            status,
            body: body_bytes.to_vec(),
            headers,
        }
    }

    /// Send a GET request
    pub async fn get(&self, uri: &str) -> TestResponse {
        let request = Request::builder()
            .method("GET")
            .uri(uri)
            .body(Body::empty())
            .expect("Failed to build request");

        self.request(request).await
    }

    /// Send a POST request with JSON body
    pub async fn post_json<T: serde::Serialize>(&self, uri: &str, body: &T) -> TestResponse {
        self.send_json("POST", uri, body).await
    }

    /// Send a PUT request with JSON body
    pub async fn put_json<T: serde::Serialize>(&self, uri: &str, body: &T) -> TestResponse {
        self.send_json("PUT", uri, body).await
    }

    async fn send_json<T: serde::Serialize>(
        &self,
        method: &str,
        uri: &str,
        body: &T,
    ) -> TestResponse {
        let json_body = serde_json::to_string(body).expect("Failed to serialize body");

        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(json_body))
            .expect("Failed to build request");

        self.request(request).await
    }
}

/// Test response wrapper
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Vec<u8>,
    pub headers: HeaderMap,
}

impl TestResponse {
    /// Get response body as string
    pub fn text(&self) -> String {
        String::from_utf8(self.body.clone()).expect("Response body is not valid UTF-8")
    }

    /// Parse response body as JSON
    pub fn json<T: for<'de> Deserialize<'de>>(&self) -> T {
        serde_json::from_slice(&self.body).expect("Failed to parse JSON response")
    }

    /// The `error` message of a JSON error body
    pub fn error_message(&self) -> String {
        let body: serde_json::Value = self.json();
        body["error"]
            .as_str()
            .expect("Response has no error message")
            .to_string()
    }

    /// Assert status code
    pub fn assert_status(&self, expected: StatusCode) {
        assert_eq!(
            self.status,
            expected,
            "Expected status {}, got {}. Body: {}",
            expected,
            self.status,
            self.text()
        );
    }
}
