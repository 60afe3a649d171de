use fleet_db::{ConnectionPool, RetryPolicy, VehicleRepository};
use sqlx::PgPool;

/// Shared state handed to every handler.
#[derive(Debug, Clone)]
pub struct ApiState<P = PgPool> {
    pub vehicles: VehicleRepository<P>,
}

impl<P: ConnectionPool> ApiState<P> {
    pub const fn new(pool: P, retry: RetryPolicy) -> Self {
        Self {
            vehicles: VehicleRepository::with_retry_policy(pool, retry),
        }
    }
}
