use uuid::Uuid;

use crate::{
    error::DbError,
    models::{NewVehicle, Vehicle, VehiclePatch},
    pool::{Connection, ConnectionPool, SqlValue},
    transaction::{self, RetryPolicy},
};

/// Mutable columns of the `vehicles` table, in bind order.
pub const VEHICLE_COLUMNS: [&str; 7] = [
    "purchase_date",
    "serial_number",
    "make",
    "model",
    "year",
    "color",
    "description",
];

const SELECT_VEHICLE: &str = r#"
    SELECT id, purchase_date, serial_number, make, model, year, color, description
    FROM vehicles
    WHERE id = $1
"#;

const INSERT_VEHICLE: &str = r#"
    INSERT INTO vehicles (purchase_date, serial_number, make, model, year, color, description)
    VALUES ($1, $2, $3, $4, $5, $6, $7)
    RETURNING id, purchase_date, serial_number, make, model, year, color, description
"#;

const UPDATE_VEHICLE: &str = r#"
    UPDATE vehicles
    SET
        purchase_date = $2,
        serial_number = $3,
        make = $4,
        model = $5,
        year = $6,
        color = $7,
        description = $8
    WHERE id = $1
    RETURNING id, purchase_date, serial_number, make, model, year, color, description
"#;

/// Data access for vehicles.
///
/// Reads and inserts run on a single leased connection. Updates are
/// read-modify-write transactions run through [`transaction::run`], so a
/// serialization conflict re-reads the row and merges the patch again.
#[derive(Debug, Clone)]
pub struct VehicleRepository<P> {
    pool: P,
    retry: RetryPolicy,
}

impl<P: ConnectionPool> VehicleRepository<P> {
    pub fn new(pool: P) -> Self {
        Self::with_retry_policy(pool, RetryPolicy::default())
    }

    pub const fn with_retry_policy(pool: P, retry: RetryPolicy) -> Self {
        Self { pool, retry }
    }

    /// Retrieve a vehicle by its id.
    pub async fn get_vehicle(&self, id: Uuid) -> Result<Option<Vehicle>, DbError> {
        let mut conn = self.pool.acquire().await?;
        find_vehicle(&mut conn, id).await
    }

    /// Store a new vehicle and return it with its assigned id.
    pub async fn add_vehicle(&self, vehicle: &NewVehicle) -> Result<Option<Vehicle>, DbError> {
        let mut conn = self.pool.acquire().await?;
        let result = conn
            .execute(INSERT_VEHICLE, &vehicle.column_values())
            .await?;

        result
            .into_single_row()
            .map(|row| Vehicle::from_row(&row))
            .transpose()
    }

    /// Merge `patch` into the stored vehicle.
    ///
    /// Returns `Ok(None)` without writing anything when no vehicle has this id.
    #[tracing::instrument(level = "debug", skip(self, patch))]
    pub async fn update_vehicle(
        &self,
        id: Uuid,
        patch: VehiclePatch,
    ) -> Result<Option<Vehicle>, DbError> {
        transaction::run(&self.pool, &self.retry, move |conn| {
            let patch = patch.clone();
            Box::pin(async move {
                let Some(existing) = find_vehicle(conn, id).await? else {
                    return Ok(None);
                };

                write_vehicle(conn, &existing.merge(patch)).await
            })
        })
        .await
    }
}

async fn find_vehicle<C: Connection>(conn: &mut C, id: Uuid) -> Result<Option<Vehicle>, DbError> {
    conn.execute(SELECT_VEHICLE, &[id.into()])
        .await?
        .into_single_row()
        .map(|row| Vehicle::from_row(&row))
        .transpose()
}

/// Overwrite every mutable column of the row with `vehicle`'s values.
async fn write_vehicle<C: Connection>(
    conn: &mut C,
    vehicle: &Vehicle,
) -> Result<Option<Vehicle>, DbError> {
    let mut params: Vec<SqlValue> = vec![vehicle.id.into()];
    params.extend(NewVehicle::from(vehicle.clone()).column_values());

    conn.execute(UPDATE_VEHICLE, &params)
        .await?
        .into_single_row()
        .map(|row| Vehicle::from_row(&row))
        .transpose()
}
