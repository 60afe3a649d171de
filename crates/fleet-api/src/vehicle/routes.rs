use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use fleet_db::{ConnectionPool, NewVehicle, Vehicle, VehiclePatch};

use super::model::{AddVehicleRequest, parse_vehicle_id, validate_update};
use crate::{ApiState, error::ApiError};

/// Create the vehicle routes
pub fn routes<P>() -> Router<ApiState<P>>
where
    P: ConnectionPool + Clone + 'static,
{
    Router::new()
        .route("/vehicles", post(add_vehicle::<P>))
        .route(
            "/vehicles/{id}",
            get(get_vehicle::<P>).put(update_vehicle::<P>),
        )
}

/// Get vehicle by ID
#[tracing::instrument(skip(state))]
async fn get_vehicle<P>(
    State(state): State<ApiState<P>>,
    Path(id): Path<String>,
) -> Result<Json<Vehicle>, ApiError>
where
    P: ConnectionPool + Clone + 'static,
{
    let id = parse_vehicle_id(&id)?;

    state
        .vehicles
        .get_vehicle(id)
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound)
}

/// Create a new vehicle
#[tracing::instrument(skip(state))]
async fn add_vehicle<P>(
    State(state): State<ApiState<P>>,
    Json(payload): Json<AddVehicleRequest>,
) -> Result<Json<Vehicle>, ApiError>
where
    P: ConnectionPool + Clone + 'static,
{
    let vehicle = NewVehicle::try_from(payload)?;

    let created = state
        .vehicles
        .add_vehicle(&vehicle)
        .await?
        .ok_or(ApiError::Conflict)?;

    tracing::info!(vehicle_id = %created.id, "vehicle added");
    Ok(Json(created))
}

/// Update an existing vehicle
#[tracing::instrument(skip(state))]
async fn update_vehicle<P>(
    State(state): State<ApiState<P>>,
    Path(id): Path<String>,
    Json(payload): Json<VehiclePatch>,
) -> Result<Json<Vehicle>, ApiError>
where
    P: ConnectionPool + Clone + 'static,
{
    let id = parse_vehicle_id(&id)?;
    let patch = validate_update(payload)?;

    state
        .vehicles
        .update_vehicle(id, patch)
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound)
}
