//! In-memory stand-in for the vehicles database.
//!
//! [`MemoryPool`] implements [`ConnectionPool`] over a single in-process
//! `vehicles` table. It understands the statements issued by the transaction
//! executor and by [`VehicleRepository`](crate::VehicleRepository), buffers
//! writes until `COMMIT;`, and records enough about its use (statement log,
//! lease counts, injected faults) for tests to observe the executor from the
//! outside.

use std::{
    collections::HashMap,
    fmt,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    error::{DbError, SERIALIZATION_FAILURE},
    pool::{Connection, ConnectionPool, FromSqlValue, QueryResult, Row, SqlValue},
    repositories::vehicle::VEHICLE_COLUMNS,
};

type Table = HashMap<Uuid, Row>;
type ConcurrentWrite = Box<dyn FnOnce(&mut Table) + Send>;

struct Fault {
    keyword: String,
    error: DbError,
    /// `None` fails every matching statement.
    remaining: Option<usize>,
    concurrent_write: Option<ConcurrentWrite>,
}

#[derive(Default)]
struct State {
    vehicles: Table,
    statements: Vec<String>,
    attempted: Vec<String>,
    acquired: usize,
    released: usize,
    discarded: usize,
    acquire_error: Option<DbError>,
    faults: Vec<Fault>,
}

impl State {
    fn take_fault(&mut self, keyword: &str) -> Option<DbError> {
        let index = self.faults.iter().position(|f| f.keyword == keyword)?;
        let fault = &mut self.faults[index];
        let error = fault.error.clone();

        if let Some(write) = fault.concurrent_write.take() {
            write(&mut self.vehicles);
        }

        let exhausted = match &mut fault.remaining {
            Some(n) => {
                *n -= 1;
                *n == 0
            }
            None => false,
        };
        if exhausted {
            self.faults.remove(index);
        }

        Some(error)
    }
}

/// Shared in-memory pool. Clones share the same table and bookkeeping.
#[derive(Clone, Default)]
pub struct MemoryPool {
    state: Arc<Mutex<State>>,
}

impl fmt::Debug for MemoryPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("MemoryPool")
            .field("vehicles", &state.vehicles.len())
            .field("acquired", &state.acquired)
            .field("released", &state.released)
            .finish()
    }
}

impl MemoryPool {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        lock(&self.state)
    }

    /// Every statement that succeeded, in issue order.
    pub fn statements(&self) -> Vec<String> {
        self.lock().statements.clone()
    }

    /// First keyword of every statement that succeeded (`SELECT`, `COMMIT`, ...).
    pub fn statement_keywords(&self) -> Vec<String> {
        self.lock()
            .statements
            .iter()
            .map(|s| keyword(s))
            .collect()
    }

    /// Every statement issued, including the ones that failed.
    pub fn attempted_statements(&self) -> Vec<String> {
        self.lock().attempted.clone()
    }

    pub fn clear_statements(&self) {
        let mut state = self.lock();
        state.statements.clear();
        state.attempted.clear();
    }

    pub fn acquired(&self) -> usize {
        self.lock().acquired
    }

    pub fn released(&self) -> usize {
        self.lock().released
    }

    /// Leases that were closed instead of returned to the pool.
    pub fn discarded(&self) -> usize {
        self.lock().discarded
    }

    /// Make every following `acquire` fail with `error`.
    pub fn fail_acquire(&self, error: DbError) {
        self.lock().acquire_error = Some(error);
    }

    /// Fail the next statement starting with the keyword of `statement`.
    pub fn fail_next(&self, statement: &str, error: DbError) {
        self.push_fault(statement, error, Some(1), None);
    }

    /// Fail every statement starting with the keyword of `statement`.
    pub fn fail_always(&self, statement: &str, error: DbError) {
        self.push_fault(statement, error, None, None);
    }

    /// Commit `concurrent_write` as if another transaction had won the race,
    /// then fail the next matching statement with a serialization failure.
    pub fn conflict_next<W>(&self, statement: &str, concurrent_write: W)
    where
        W: FnOnce(&mut HashMap<Uuid, Row>) + Send + 'static,
    {
        self.push_fault(
            statement,
            DbError::database(SERIALIZATION_FAILURE, "could not serialize access"),
            Some(1),
            Some(Box::new(concurrent_write)),
        );
    }

    fn push_fault(
        &self,
        statement: &str,
        error: DbError,
        remaining: Option<usize>,
        concurrent_write: Option<ConcurrentWrite>,
    ) {
        self.lock().faults.push(Fault {
            keyword: keyword(statement),
            error,
            remaining,
            concurrent_write,
        });
    }

    /// Store `row` as committed data. The row must carry an `id` column.
    pub fn insert_row(&self, row: Row) -> Uuid {
        let id = row
            .get::<Uuid>("id")
            .unwrap_or_else(|_| Uuid::new_v4());
        let row = row.with("id", id);
        self.lock().vehicles.insert(id, row);
        id
    }

    /// Committed row for `id`.
    pub fn row(&self, id: Uuid) -> Option<Row> {
        self.lock().vehicles.get(&id).cloned()
    }

    pub fn row_count(&self) -> usize {
        self.lock().vehicles.len()
    }
}

#[async_trait]
impl ConnectionPool for MemoryPool {
    type Connection = MemoryConnection;

    async fn acquire(&self) -> Result<Self::Connection, DbError> {
        let mut state = self.lock();
        if let Some(error) = &state.acquire_error {
            return Err(error.clone());
        }
        state.acquired += 1;

        Ok(MemoryConnection {
            state: Arc::clone(&self.state),
            in_transaction: false,
            discarded: false,
            pending: Vec::new(),
        })
    }
}

/// A lease on a [`MemoryPool`]. Dropping it counts as a release.
pub struct MemoryConnection {
    state: Arc<Mutex<State>>,
    in_transaction: bool,
    discarded: bool,
    pending: Vec<Row>,
}

impl fmt::Debug for MemoryConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryConnection")
            .field("in_transaction", &self.in_transaction)
            .field("discarded", &self.discarded)
            .field("pending", &self.pending.len())
            .finish()
    }
}

impl Drop for MemoryConnection {
    fn drop(&mut self) {
        let mut state = lock(&self.state);
        state.released += 1;
        if self.discarded {
            state.discarded += 1;
        }
    }
}

impl MemoryConnection {
    /// Row for `id` as seen by this connection, including its own pending writes.
    fn visible(&self, state: &State, id: Uuid) -> Option<Row> {
        self.pending
            .iter()
            .rev()
            .find(|row| row.get::<Uuid>("id").is_ok_and(|row_id| row_id == id))
            .or_else(|| state.vehicles.get(&id))
            .cloned()
    }

    fn write(&mut self, state: &mut State, id: Uuid, row: Row) {
        if self.in_transaction {
            self.pending.push(row);
        } else {
            state.vehicles.insert(id, row);
        }
    }
}

#[async_trait]
impl Connection for MemoryConnection {
    async fn execute(
        &mut self,
        statement: &str,
        params: &[SqlValue],
    ) -> Result<QueryResult, DbError> {
        let shared = Arc::clone(&self.state);
        let mut state = lock(&shared);

        state.attempted.push(statement.trim().to_string());
        let keyword = keyword(statement);
        if let Some(error) = state.take_fault(&keyword) {
            return Err(error);
        }

        let rows = match keyword.as_str() {
            "BEGIN" => {
                self.in_transaction = true;
                self.pending.clear();
                Vec::new()
            }
            "COMMIT" => {
                for row in self.pending.drain(..) {
                    let id = row.get::<Uuid>("id")?;
                    state.vehicles.insert(id, row);
                }
                self.in_transaction = false;
                Vec::new()
            }
            "ROLLBACK" => {
                self.pending.clear();
                self.in_transaction = false;
                Vec::new()
            }
            "SELECT" => {
                let id = uuid_param(params, 0)?;
                self.visible(&state, id).into_iter().collect()
            }
            "INSERT" => {
                let id = Uuid::new_v4();
                let row = vehicle_row(id, params)?;
                self.write(&mut state, id, row.clone());
                vec![row]
            }
            "UPDATE" => {
                let id = uuid_param(params, 0)?;
                if self.visible(&state, id).is_some() {
                    let row = vehicle_row(id, &params[1..])?;
                    self.write(&mut state, id, row.clone());
                    vec![row]
                } else {
                    Vec::new()
                }
            }
            _ => Vec::new(),
        };

        state.statements.push(statement.trim().to_string());
        Ok(QueryResult::new(rows))
    }

    fn discard(&mut self) {
        self.discarded = true;
    }
}

fn lock(state: &Mutex<State>) -> MutexGuard<'_, State> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

fn keyword(statement: &str) -> String {
    statement
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .trim_end_matches(';')
        .to_uppercase()
}

fn uuid_param(params: &[SqlValue], index: usize) -> Result<Uuid, DbError> {
    let value = params
        .get(index)
        .ok_or_else(|| DbError::decode("id", format!("missing parameter ${}", index + 1)))?;
    Uuid::from_sql_value("id", value)
}

fn vehicle_row(id: Uuid, values: &[SqlValue]) -> Result<Row, DbError> {
    if values.len() != VEHICLE_COLUMNS.len() {
        return Err(DbError::Database {
            code: Some("08P01".to_string()),
            message: format!(
                "expected {} column values, got {}",
                VEHICLE_COLUMNS.len(),
                values.len()
            ),
        });
    }

    Ok(VEHICLE_COLUMNS
        .iter()
        .zip(values)
        .fold(Row::new().with("id", id), |row, (column, value)| {
            row.with(*column, value.clone())
        }))
}
