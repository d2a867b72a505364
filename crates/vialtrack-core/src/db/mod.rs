//! Database layer for vialtrack.

mod schema;
mod suppliers;
mod compounds;
mod batches;
mod preparations;
mod administrations;
mod protocols;

pub use schema::*;
#[allow(unused_imports)]
pub use suppliers::*;
#[allow(unused_imports)]
pub use compounds::*;
#[allow(unused_imports)]
pub use batches::*;
#[allow(unused_imports)]
pub use preparations::*;
#[allow(unused_imports)]
pub use administrations::*;
#[allow(unused_imports)]
pub use protocols::*;

use rusqlite::Connection;
use std::path::Path;
use thiserror::Error;

/// Ledger errors.
///
/// Validation failures are detected before any write; a failed multi-step
/// operation rolls back atomically.
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{entity} #{id} not found")]
    NotFound { entity: &'static str, id: i64 },

    #[error("vials insufficient: {available} available, {requested} requested")]
    InsufficientStock { available: i64, requested: i64 },

    #[error("volume insufficient: {available_ml:.3}ml available, {requested_ml:.3}ml requested")]
    InsufficientVolume { available_ml: f64, requested_ml: f64 },

    #[error("{entity} #{id} has {count} {referencing}; delete refused")]
    HasActiveReferences {
        entity: &'static str,
        id: i64,
        count: i64,
        referencing: &'static str,
    },

    #[error("adjustment of {delta:+} would leave batch #{batch_id} with {resulting} vials")]
    InvalidAdjustment {
        batch_id: i64,
        delta: i64,
        resulting: i64,
    },

    #[error("constraint violation: {0}")]
    Constraint(String),
}

pub type LedgerResult<T> = Result<T, LedgerError>;

/// Database connection wrapper.
///
/// Single-writer model: one logical actor performs one mutation at a time.
/// Multi-step mutations run inside a transaction, both-or-neither.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open database at path, creating if needed.
    pub fn open<P: AsRef<Path>>(path: P) -> LedgerResult<Self> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.initialize()?;
        Ok(db)
    }

    /// Create in-memory database (for testing).
    pub fn open_in_memory() -> LedgerResult<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.initialize()?;
        Ok(db)
    }

    /// Initialize schema.
    fn initialize(&self) -> LedgerResult<()> {
        self.conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    /// Get raw connection (for advanced queries).
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Row counts for every core table.
    pub fn stats(&self) -> LedgerResult<DatabaseStats> {
        let count = |table: &str| -> LedgerResult<i64> {
            Ok(self
                .conn
                .query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
                    row.get(0)
                })?)
        };

        Ok(DatabaseStats {
            suppliers: count("suppliers")?,
            compounds: count("compounds")?,
            batches: count("batches")?,
            preparations: count("preparations")?,
            administrations: count("administrations")?,
            protocols: count("protocols")?,
        })
    }
}

/// Per-table row counts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseStats {
    pub suppliers: i64,
    pub compounds: i64,
    pub batches: i64,
    pub preparations: i64,
    pub administrations: i64,
    pub protocols: i64,
}

/// Round a volume to 3 decimals, the resolution of all volume comparisons.
///
/// Guards against floating-point noise accumulating over many small doses.
pub(crate) fn round_ml(v: f64) -> f64 {
    (v * 1000.0).round() / 1000.0
}
