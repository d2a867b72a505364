//! Preparation (dosing solution) database operations.

use chrono::Utc;
use rusqlite::{params, params_from_iter, OptionalExtension};
use tracing::{info, warn};

use super::{round_ml, Database, LedgerError, LedgerResult};
use crate::models::{
    CompoundConcentration, NewPreparation, Preparation, PreparationDetails, PreparationFilter,
    PreparationPatch,
};

impl Database {
    /// Create a preparation from `vials_used` vials of a batch.
    ///
    /// Decrements the batch's stock and seeds `volume_remaining_ml` with the
    /// full diluent volume, in one transaction. Concentration is never
    /// stored; it is always derived from the batch composition.
    pub fn create_preparation(&self, input: &NewPreparation) -> LedgerResult<i64> {
        if input.vials_used <= 0 {
            return Err(LedgerError::Constraint(format!(
                "vials_used must be positive, got {}",
                input.vials_used
            )));
        }
        if input.volume_ml <= 0.0 {
            return Err(LedgerError::Constraint(format!(
                "volume_ml must be positive, got {}",
                input.volume_ml
            )));
        }

        let batch = self
            .get_batch(input.batch_id)?
            .ok_or(LedgerError::NotFound {
                entity: "batch",
                id: input.batch_id,
            })?;
        if batch.vials_remaining < input.vials_used {
            return Err(LedgerError::InsufficientStock {
                available: batch.vials_remaining,
                requested: input.vials_used,
            });
        }

        let tx = self.conn.unchecked_transaction()?;

        self.conn.execute(
            r#"
            INSERT INTO preparations (
                batch_id, vials_used, volume_ml, volume_remaining_ml, diluent,
                preparation_date, expiry_date, storage_location, notes
            ) VALUES (?1, ?2, ?3, ?4, COALESCE(?5, 'BAC Water'), ?6, ?7, ?8, ?9)
            "#,
            params![
                input.batch_id,
                input.vials_used,
                input.volume_ml,
                input.volume_ml,
                input.diluent,
                input.preparation_date,
                input.expiry_date,
                input.storage_location,
                input.notes,
            ],
        )?;
        let prep_id = self.conn.last_insert_rowid();

        self.conn.execute(
            "UPDATE batches SET vials_remaining = vials_remaining - ? WHERE id = ?",
            params![input.vials_used, input.batch_id],
        )?;

        tx.commit()?;

        info!(
            prep_id,
            batch_id = input.batch_id,
            vials_used = input.vials_used,
            volume_ml = input.volume_ml,
            "preparation created"
        );
        Ok(prep_id)
    }

    /// Get a preparation by id (including soft-deleted ones).
    pub fn get_preparation(&self, id: i64) -> LedgerResult<Option<Preparation>> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM preparations WHERE id = ?", PREP_COLUMNS),
                [id],
                map_preparation,
            )
            .optional()
            .map_err(Into::into)
    }

    /// List non-deleted preparations matching the filter, newest first.
    pub fn list_preparations(&self, filter: &PreparationFilter) -> LedgerResult<Vec<Preparation>> {
        let mut sql = format!(
            "SELECT {} FROM preparations WHERE deleted_at IS NULL",
            PREP_COLUMNS
        );
        let mut values: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(batch_id) = filter.batch_id {
            sql.push_str(" AND batch_id = ?");
            values.push(Box::new(batch_id));
        }
        if filter.only_active {
            sql.push_str(" AND volume_remaining_ml > 0");
        }
        sql.push_str(" ORDER BY preparation_date DESC, id DESC");

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(
            params_from_iter(values.iter().map(|v| v.as_ref())),
            map_preparation,
        )?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Preparations past their expiry date but still holding volume.
    pub fn list_expired_preparations(&self) -> LedgerResult<Vec<Preparation>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM preparations
             WHERE deleted_at IS NULL
               AND expiry_date IS NOT NULL
               AND expiry_date < date('now')
               AND volume_remaining_ml > 0
             ORDER BY expiry_date",
            PREP_COLUMNS
        ))?;
        let rows = stmt.query_map([], map_preparation)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Full preparation record with derived per-compound concentrations and
    /// the active-dose rollup.
    pub fn get_preparation_details(&self, id: i64) -> LedgerResult<Option<PreparationDetails>> {
        let preparation = match self.get_preparation(id)? {
            Some(p) => p,
            None => return Ok(None),
        };

        let (mg_per_vial, product_name, supplier_name): (f64, String, String) =
            self.conn.query_row(
                r#"
                SELECT b.mg_per_vial, b.product_name, s.name
                FROM batches b
                JOIN suppliers s ON b.supplier_id = s.id
                WHERE b.id = ?
                "#,
                [preparation.batch_id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )?;

        let scale = preparation.vials_used as f64 / preparation.volume_ml;
        let compounds = self
            .get_batch_composition(preparation.batch_id)?
            .into_iter()
            .map(|entry| CompoundConcentration {
                compound_id: entry.compound_id,
                compound_name: entry.compound_name,
                mg_per_vial: entry.mg_per_vial,
                concentration_mg_per_ml: entry.mg_per_vial * scale,
            })
            .collect();

        let (administrations_count, ml_used): (i64, f64) = self.conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(dose_ml), 0)
             FROM administrations
             WHERE preparation_id = ? AND deleted_at IS NULL",
            [id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        let total_mg = mg_per_vial * preparation.vials_used as f64;
        let concentration_mg_per_ml = total_mg / preparation.volume_ml;

        Ok(Some(PreparationDetails {
            preparation,
            product_name,
            supplier_name,
            total_mg,
            concentration_mg_per_ml,
            compounds,
            administrations_count,
            ml_used,
        }))
    }

    /// Apply a sparse update to a preparation.
    ///
    /// Changing `batch_id` or `vials_used` does not touch any batch's
    /// vial count; the caller owns that reconciliation.
    pub fn update_preparation(&self, id: i64, patch: &PreparationPatch) -> LedgerResult<bool> {
        self.get_preparation(id)?.ok_or(LedgerError::NotFound {
            entity: "preparation",
            id,
        })?;

        if let Some(batch_id) = patch.batch_id {
            if self.get_batch(batch_id)?.is_none() {
                return Err(LedgerError::NotFound {
                    entity: "batch",
                    id: batch_id,
                });
            }
        }
        if patch.batch_id.is_some() || patch.vials_used.is_some() {
            warn!(
                prep_id = id,
                "batch_id/vials_used changed without adjusting batch stock; reconcile manually"
            );
        }

        let mut sets: Vec<&'static str> = Vec::new();
        let mut values: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(expiry_date) = &patch.expiry_date {
            sets.push("expiry_date = ?");
            values.push(Box::new(expiry_date.clone()));
        }
        if let Some(volume_remaining_ml) = patch.volume_remaining_ml {
            sets.push("volume_remaining_ml = ?");
            values.push(Box::new(volume_remaining_ml));
        }
        if let Some(storage_location) = &patch.storage_location {
            sets.push("storage_location = ?");
            values.push(Box::new(storage_location.clone()));
        }
        if let Some(notes) = &patch.notes {
            sets.push("notes = ?");
            values.push(Box::new(notes.clone()));
        }
        if let Some(batch_id) = patch.batch_id {
            sets.push("batch_id = ?");
            values.push(Box::new(batch_id));
        }
        if let Some(vials_used) = patch.vials_used {
            sets.push("vials_used = ?");
            values.push(Box::new(vials_used));
        }
        if let Some(volume_ml) = patch.volume_ml {
            sets.push("volume_ml = ?");
            values.push(Box::new(volume_ml));
        }
        if let Some(diluent) = &patch.diluent {
            sets.push("diluent = ?");
            values.push(Box::new(diluent.clone()));
        }
        if let Some(preparation_date) = &patch.preparation_date {
            sets.push("preparation_date = ?");
            values.push(Box::new(preparation_date.clone()));
        }

        if sets.is_empty() {
            return Ok(false);
        }

        values.push(Box::new(id));
        let sql = format!("UPDATE preparations SET {} WHERE id = ?", sets.join(", "));
        self.conn
            .execute(&sql, params_from_iter(values.iter().map(|v| v.as_ref())))?;

        info!(prep_id = id, "preparation updated");
        Ok(true)
    }

    /// Soft-delete a preparation.
    ///
    /// Refused while active administrations still draw from it. With
    /// `restore_vials`, the vials it consumed go back into the batch.
    pub fn delete_preparation(&self, id: i64, restore_vials: bool) -> LedgerResult<()> {
        let preparation = self.get_preparation(id)?.ok_or(LedgerError::NotFound {
            entity: "preparation",
            id,
        })?;

        let active_count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM administrations WHERE preparation_id = ? AND deleted_at IS NULL",
            [id],
            |row| row.get(0),
        )?;
        if active_count > 0 {
            return Err(LedgerError::HasActiveReferences {
                entity: "preparation",
                id,
                count: active_count,
                referencing: "active administrations",
            });
        }

        let tx = self.conn.unchecked_transaction()?;
        self.conn.execute(
            "UPDATE preparations SET deleted_at = ?1 WHERE id = ?2",
            params![Utc::now().to_rfc3339(), id],
        )?;
        if restore_vials {
            self.conn.execute(
                "UPDATE batches SET vials_remaining = vials_remaining + ? WHERE id = ?",
                params![preparation.vials_used, preparation.batch_id],
            )?;
        }
        tx.commit()?;

        info!(
            prep_id = id,
            restore_vials,
            vials = preparation.vials_used,
            "preparation deleted"
        );
        Ok(())
    }

    /// Recompute a preparation's remaining volume from the active dose log.
    ///
    /// `volume_remaining_ml = volume_ml − Σ(dose_ml of non-deleted
    /// administrations)`, rounded to 3 decimals. Idempotent; every mutation
    /// path that can move a preparation's balance funnels into this rather
    /// than hand-rolling arithmetic. Returns the recomputed value.
    pub fn recalculate_preparation_volume(&self, prep_id: i64) -> LedgerResult<f64> {
        let volume_ml: f64 = self
            .conn
            .query_row(
                "SELECT volume_ml FROM preparations WHERE id = ?",
                [prep_id],
                |row| row.get(0),
            )
            .optional()?
            .ok_or(LedgerError::NotFound {
                entity: "preparation",
                id: prep_id,
            })?;

        let used: f64 = self.conn.query_row(
            "SELECT COALESCE(SUM(dose_ml), 0)
             FROM administrations
             WHERE preparation_id = ? AND deleted_at IS NULL",
            [prep_id],
            |row| row.get(0),
        )?;

        let remaining = round_ml(volume_ml - used);
        self.conn.execute(
            "UPDATE preparations SET volume_remaining_ml = ?1 WHERE id = ?2",
            params![remaining, prep_id],
        )?;
        Ok(remaining)
    }
}

const PREP_COLUMNS: &str = "id, batch_id, vials_used, volume_ml, volume_remaining_ml, diluent, \
     preparation_date, expiry_date, storage_location, notes, created_at, deleted_at";

fn map_preparation(row: &rusqlite::Row<'_>) -> rusqlite::Result<Preparation> {
    Ok(Preparation {
        id: row.get(0)?,
        batch_id: row.get(1)?,
        vials_used: row.get(2)?,
        volume_ml: row.get(3)?,
        volume_remaining_ml: row.get(4)?,
        diluent: row.get(5)?,
        preparation_date: row.get(6)?,
        expiry_date: row.get(7)?,
        storage_location: row.get(8)?,
        notes: row.get(9)?,
        created_at: row.get(10)?,
        deleted_at: row.get(11)?,
    })
}
