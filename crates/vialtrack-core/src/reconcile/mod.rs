//! Reconciliation engine.
//!
//! Makes `volume_remaining_ml` an authoritative function of the active
//! dose log and detects or repairs divergence caused by edits, bugs, or
//! out-of-band data changes.

use rusqlite::params;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::db::{Database, LedgerError, LedgerResult};

/// Resolution of all volume comparisons; differences at or below this are
/// floating-point noise, not drift.
pub const VOLUME_EPSILON_ML: f64 = 0.001;

/// One preparation whose stored balance disagrees with its dose log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VolumeDrift {
    pub preparation_id: i64,
    /// Product name of the source batch
    pub product_name: Option<String>,
    /// Stored `volume_remaining_ml`
    pub current_ml: f64,
    /// `volume_ml` minus the active doses on record
    pub expected_ml: f64,
    /// `current_ml - expected_ml`
    pub difference_ml: f64,
}

/// Result of a read-only integrity sweep.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IntegrityReport {
    /// Non-deleted preparations examined
    pub checked: i64,
    pub drifts: Vec<VolumeDrift>,
}

impl IntegrityReport {
    pub fn is_consistent(&self) -> bool {
        self.drifts.is_empty()
    }
}

/// Result of a repair pass.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReconcileStats {
    pub checked: i64,
    /// Preparations whose stored balance was rewritten
    pub fixed: i64,
    /// Sum of absolute drift across the fixes
    pub total_difference_ml: f64,
    pub details: Vec<VolumeDrift>,
}

/// Audits and repairs preparation balances against the dose log.
pub struct Reconciler<'a> {
    db: &'a Database,
}

impl<'a> Reconciler<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Read-only sweep over all non-deleted preparations; reports each one
    /// whose stored balance drifted beyond [`VOLUME_EPSILON_ML`]. Never
    /// mutates state.
    pub fn check_integrity(&self) -> LedgerResult<IntegrityReport> {
        let (checked, drifts) = self.scan(None)?;

        if drifts.is_empty() {
            info!(checked, "integrity check clean");
        } else {
            warn!(checked, drifted = drifts.len(), "integrity check found drift");
        }
        Ok(IntegrityReport { checked, drifts })
    }

    /// Rewrite drifted balances from the dose log, for one preparation or
    /// all of them. Idempotent: a second run right after reports zero fixes.
    pub fn reconcile(&self, prep_id: Option<i64>) -> LedgerResult<ReconcileStats> {
        if let Some(id) = prep_id {
            if self.db.get_preparation(id)?.is_none() {
                return Err(LedgerError::NotFound {
                    entity: "preparation",
                    id,
                });
            }
        }

        let (checked, details) = self.scan(prep_id)?;

        let mut total_difference_ml = 0.0;
        for drift in &details {
            self.db.recalculate_preparation_volume(drift.preparation_id)?;
            total_difference_ml += drift.difference_ml.abs();
            info!(
                prep_id = drift.preparation_id,
                from = drift.current_ml,
                to = drift.expected_ml,
                "balance repaired"
            );
        }

        Ok(ReconcileStats {
            checked,
            fixed: details.len() as i64,
            total_difference_ml,
            details,
        })
    }

    /// Compare stored balances against the log, optionally for one
    /// preparation. Pure read; returns how many rows were examined
    /// alongside the drifts found.
    fn scan(&self, prep_id: Option<i64>) -> LedgerResult<(i64, Vec<VolumeDrift>)> {
        let mut sql = String::from(
            r#"
            SELECT p.id, b.product_name, p.volume_remaining_ml,
                   p.volume_ml - COALESCE((
                       SELECT SUM(a.dose_ml) FROM administrations a
                       WHERE a.preparation_id = p.id AND a.deleted_at IS NULL
                   ), 0)
            FROM preparations p
            LEFT JOIN batches b ON p.batch_id = b.id
            WHERE p.deleted_at IS NULL
            "#,
        );
        if prep_id.is_some() {
            sql.push_str(" AND p.id = ?");
        }
        sql.push_str(" ORDER BY p.id");

        let mut stmt = self.db.conn().prepare(&sql)?;
        let map_row =
            |row: &rusqlite::Row<'_>| -> rusqlite::Result<(i64, Option<String>, f64, f64)> {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
            };
        let rows: Vec<(i64, Option<String>, f64, f64)> = match prep_id {
            Some(id) => stmt
                .query_map(params![id], map_row)?
                .collect::<Result<_, _>>()?,
            None => stmt.query_map([], map_row)?.collect::<Result<_, _>>()?,
        };

        let checked = rows.len() as i64;
        let mut drifts = Vec::new();
        for (id, product_name, current_ml, expected_raw) in rows {
            let expected_ml = crate::db::round_ml(expected_raw);
            let difference_ml = crate::db::round_ml(current_ml - expected_ml);
            if difference_ml.abs() > VOLUME_EPSILON_ML {
                drifts.push(VolumeDrift {
                    preparation_id: id,
                    product_name,
                    current_ml,
                    expected_ml,
                    difference_ml,
                });
            }
        }
        Ok((checked, drifts))
    }
}
