//! Batch (stock ledger) database operations.

use rusqlite::{params, params_from_iter, OptionalExtension};
use tracing::{info, warn};

use super::{Database, LedgerError, LedgerResult};
use crate::models::{
    Batch, BatchDetails, BatchFilter, BatchPatch, CompositionEntry, InventorySummary, NewBatch,
};

impl Database {
    /// Create a batch with its composition, returning the batch id.
    ///
    /// Compounds named in the composition that are not yet in the catalog
    /// are created automatically. Runs as one transaction: the batch and
    /// all composition rows land together or not at all.
    pub fn create_batch(&self, input: &NewBatch) -> LedgerResult<i64> {
        if input.vials_count <= 0 {
            return Err(LedgerError::Constraint(format!(
                "vials_count must be positive, got {}",
                input.vials_count
            )));
        }
        if input.mg_per_vial <= 0.0 {
            return Err(LedgerError::Constraint(format!(
                "mg_per_vial must be positive, got {}",
                input.mg_per_vial
            )));
        }
        for (name, mg) in &input.composition {
            if *mg <= 0.0 {
                return Err(LedgerError::Constraint(format!(
                    "composition entry '{}' must have positive mg_per_vial, got {}",
                    name, mg
                )));
            }
        }

        let supplier = self
            .get_supplier_by_name(&input.supplier)?
            .ok_or_else(|| {
                LedgerError::Constraint(format!("supplier '{}' not found", input.supplier))
            })?;

        let tx = self.conn.unchecked_transaction()?;

        self.conn.execute(
            r#"
            INSERT INTO batches (
                supplier_id, product_name, batch_number, vials_count, mg_per_vial,
                vials_remaining, total_price, currency, purchase_date, expiry_date,
                storage_location, notes
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
            params![
                supplier.id,
                input.product_name,
                input.batch_number,
                input.vials_count,
                input.mg_per_vial,
                input.vials_count,
                input.total_price,
                input.currency,
                input.purchase_date,
                input.expiry_date,
                input.storage_location,
                input.notes,
            ],
        )?;
        let batch_id = self.conn.last_insert_rowid();

        for (name, mg) in &input.composition {
            let compound_id = self.ensure_compound(name)?;
            self.conn.execute(
                "INSERT INTO batch_composition (batch_id, compound_id, mg_per_vial) VALUES (?1, ?2, ?3)",
                params![batch_id, compound_id, mg],
            )?;
        }

        tx.commit()?;

        info!(
            batch_id,
            product = %input.product_name,
            vials = input.vials_count,
            mg_per_vial = input.mg_per_vial,
            "batch added"
        );
        Ok(batch_id)
    }

    /// Get a batch by id.
    pub fn get_batch(&self, id: i64) -> LedgerResult<Option<Batch>> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM batches WHERE id = ?", BATCH_COLUMNS),
                [id],
                map_batch,
            )
            .optional()
            .map_err(Into::into)
    }

    /// List batches matching the filter, most recent purchase first.
    pub fn list_batches(&self, filter: &BatchFilter) -> LedgerResult<Vec<Batch>> {
        let mut sql = format!(
            "SELECT {} FROM batches b JOIN suppliers s ON b.supplier_id = s.id WHERE 1=1",
            BATCH_COLUMNS_QUALIFIED
        );
        let mut values: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(supplier) = &filter.supplier {
            sql.push_str(" AND s.name LIKE ?");
            values.push(Box::new(format!("%{}%", supplier)));
        }
        if let Some(compound) = &filter.compound {
            sql.push_str(
                " AND b.id IN (
                    SELECT bc.batch_id FROM batch_composition bc
                    JOIN compounds c ON bc.compound_id = c.id
                    WHERE c.name LIKE ?
                )",
            );
            values.push(Box::new(format!("%{}%", compound)));
        }
        if filter.only_available {
            sql.push_str(" AND b.vials_remaining > 0");
        }
        sql.push_str(" ORDER BY b.purchase_date DESC");

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(
            params_from_iter(values.iter().map(|v| v.as_ref())),
            map_batch,
        )?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Full batch record: supplier info, composition, preparations.
    pub fn get_batch_details(&self, id: i64) -> LedgerResult<Option<BatchDetails>> {
        let batch = match self.get_batch(id)? {
            Some(b) => b,
            None => return Ok(None),
        };

        let (supplier_name, supplier_country): (String, Option<String>) = self.conn.query_row(
            "SELECT name, country FROM suppliers WHERE id = ?",
            [batch.supplier_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        let composition = self.get_batch_composition(id)?;
        let preparations = self.list_preparations(&crate::models::PreparationFilter {
            batch_id: Some(id),
            only_active: false,
        })?;

        Ok(Some(BatchDetails {
            batch,
            supplier_name,
            supplier_country,
            composition,
            preparations,
        }))
    }

    /// Composition rows for a batch.
    pub fn get_batch_composition(&self, batch_id: i64) -> LedgerResult<Vec<CompositionEntry>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT c.id, c.name, bc.mg_per_vial
            FROM batch_composition bc
            JOIN compounds c ON bc.compound_id = c.id
            WHERE bc.batch_id = ?
            ORDER BY c.name
            "#,
        )?;
        let rows = stmt.query_map([batch_id], |row| {
            Ok(CompositionEntry {
                compound_id: row.get(0)?,
                compound_name: row.get(1)?,
                mg_per_vial: row.get(2)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Decrement stock when vials are consumed, returning the new count.
    pub fn use_vials(&self, batch_id: i64, count: i64) -> LedgerResult<i64> {
        let batch = self.get_batch(batch_id)?.ok_or(LedgerError::NotFound {
            entity: "batch",
            id: batch_id,
        })?;

        if batch.vials_remaining < count {
            return Err(LedgerError::InsufficientStock {
                available: batch.vials_remaining,
                requested: count,
            });
        }

        self.conn.execute(
            "UPDATE batches SET vials_remaining = vials_remaining - ? WHERE id = ?",
            params![count, batch_id],
        )?;

        let remaining = batch.vials_remaining - count;
        info!(batch_id, used = count, remaining, "vials consumed");
        Ok(remaining)
    }

    /// Correct a batch's vial count by a signed delta, returning the new count.
    ///
    /// A result above the nominal `vials_count` is a data-entry correction
    /// and must be explicitly confirmed via `confirm_exceeds_count`.
    pub fn adjust_vials(
        &self,
        batch_id: i64,
        delta: i64,
        confirm_exceeds_count: bool,
    ) -> LedgerResult<i64> {
        let batch = self.get_batch(batch_id)?.ok_or(LedgerError::NotFound {
            entity: "batch",
            id: batch_id,
        })?;

        let resulting = batch.vials_remaining + delta;
        if resulting < 0 {
            return Err(LedgerError::InvalidAdjustment {
                batch_id,
                delta,
                resulting,
            });
        }
        if resulting > batch.vials_count && !confirm_exceeds_count {
            return Err(LedgerError::Constraint(format!(
                "adjustment would leave batch #{} with {} vials, above the nominal {}; \
                 confirmation required",
                batch_id, resulting, batch.vials_count
            )));
        }

        self.conn.execute(
            "UPDATE batches SET vials_remaining = ? WHERE id = ?",
            params![resulting, batch_id],
        )?;

        info!(
            batch_id,
            delta,
            from = batch.vials_remaining,
            to = resulting,
            "vial count adjusted"
        );
        Ok(resulting)
    }

    /// Apply a sparse update to a batch.
    ///
    /// When the patch carries a replacement composition, existing rows are
    /// dropped, the new rows inserted, and the batch's nominal mg_per_vial
    /// recomputed as their sum, all in one transaction.
    pub fn update_batch(&self, id: i64, patch: &BatchPatch) -> LedgerResult<bool> {
        self.get_batch(id)?.ok_or(LedgerError::NotFound {
            entity: "batch",
            id,
        })?;

        let mut sets: Vec<&'static str> = Vec::new();
        let mut values: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(product_name) = &patch.product_name {
            sets.push("product_name = ?");
            values.push(Box::new(product_name.clone()));
        }
        if let Some(batch_number) = &patch.batch_number {
            sets.push("batch_number = ?");
            values.push(Box::new(batch_number.clone()));
        }
        if let Some(expiry_date) = &patch.expiry_date {
            sets.push("expiry_date = ?");
            values.push(Box::new(expiry_date.clone()));
        }
        if let Some(storage_location) = &patch.storage_location {
            sets.push("storage_location = ?");
            values.push(Box::new(storage_location.clone()));
        }
        if let Some(notes) = &patch.notes {
            sets.push("notes = ?");
            values.push(Box::new(notes.clone()));
        }
        if let Some(vials_remaining) = patch.vials_remaining {
            sets.push("vials_remaining = ?");
            values.push(Box::new(vials_remaining));
        }
        if let Some(supplier_id) = patch.supplier_id {
            sets.push("supplier_id = ?");
            values.push(Box::new(supplier_id));
        }
        if let Some(vials_count) = patch.vials_count {
            sets.push("vials_count = ?");
            values.push(Box::new(vials_count));
        }
        if let Some(total_price) = patch.total_price {
            sets.push("total_price = ?");
            values.push(Box::new(total_price));
        }
        if let Some(purchase_date) = &patch.purchase_date {
            sets.push("purchase_date = ?");
            values.push(Box::new(purchase_date.clone()));
        }
        if let Some(mg_per_vial) = patch.mg_per_vial {
            sets.push("mg_per_vial = ?");
            values.push(Box::new(mg_per_vial));
        }

        if sets.is_empty() && patch.composition.is_none() {
            return Ok(false);
        }

        let tx = self.conn.unchecked_transaction()?;

        if !sets.is_empty() {
            values.push(Box::new(id));
            let sql = format!("UPDATE batches SET {} WHERE id = ?", sets.join(", "));
            self.conn
                .execute(&sql, params_from_iter(values.iter().map(|v| v.as_ref())))?;
        }

        if let Some(composition) = &patch.composition {
            self.conn
                .execute("DELETE FROM batch_composition WHERE batch_id = ?", [id])?;
            for component in composition {
                self.conn.execute(
                    "INSERT INTO batch_composition (batch_id, compound_id, mg_per_vial) VALUES (?1, ?2, ?3)",
                    params![id, component.compound_id, component.mg_per_vial],
                )?;
            }
            let total_mg: f64 = composition.iter().map(|c| c.mg_per_vial).sum();
            self.conn.execute(
                "UPDATE batches SET mg_per_vial = ? WHERE id = ?",
                params![total_mg, id],
            )?;
        }

        tx.commit()?;
        info!(batch_id = id, "batch updated");
        Ok(true)
    }

    /// Delete a batch.
    ///
    /// Refuses when preparations reference it, unless forced; a forced
    /// delete cascades those preparations and their administrations.
    pub fn delete_batch(&self, id: i64, force: bool) -> LedgerResult<()> {
        self.get_batch(id)?.ok_or(LedgerError::NotFound {
            entity: "batch",
            id,
        })?;

        let prep_count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM preparations WHERE batch_id = ?",
            [id],
            |row| row.get(0),
        )?;

        if prep_count > 0 && !force {
            return Err(LedgerError::HasActiveReferences {
                entity: "batch",
                id,
                count: prep_count,
                referencing: "preparations",
            });
        }

        let tx = self.conn.unchecked_transaction()?;
        self.conn.execute(
            "DELETE FROM administrations
             WHERE preparation_id IN (SELECT id FROM preparations WHERE batch_id = ?)",
            [id],
        )?;
        self.conn
            .execute("DELETE FROM preparations WHERE batch_id = ?", [id])?;
        self.conn.execute("DELETE FROM batches WHERE id = ?", [id])?;
        tx.commit()?;

        if prep_count > 0 {
            warn!(
                batch_id = id,
                cascaded_preparations = prep_count,
                "batch force-deleted with dependents"
            );
        } else {
            info!(batch_id = id, "batch deleted");
        }
        Ok(())
    }

    /// Inventory-wide rollup of the stock ledger.
    pub fn inventory_summary(&self) -> LedgerResult<InventorySummary> {
        let total_batches: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM batches", [], |row| row.get(0))?;
        let available_batches: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM batches WHERE vials_remaining > 0",
            [],
            |row| row.get(0),
        )?;
        let total_value: f64 = self.conn.query_row(
            "SELECT COALESCE(SUM(total_price * vials_remaining * 1.0 / vials_count), 0) FROM batches",
            [],
            |row| row.get(0),
        )?;
        let unique_compounds: i64 = self.conn.query_row(
            r#"
            SELECT COUNT(DISTINCT c.id)
            FROM compounds c
            JOIN batch_composition bc ON c.id = bc.compound_id
            JOIN batches b ON bc.batch_id = b.id
            WHERE b.vials_remaining > 0
            "#,
            [],
            |row| row.get(0),
        )?;
        let expiring_soon: i64 = self.conn.query_row(
            r#"
            SELECT COUNT(*)
            FROM batches
            WHERE expiry_date IS NOT NULL
              AND expiry_date <= date('now', '+60 days')
              AND vials_remaining > 0
            "#,
            [],
            |row| row.get(0),
        )?;

        Ok(InventorySummary {
            total_batches,
            available_batches,
            total_value,
            unique_compounds,
            expiring_soon,
        })
    }
}

const BATCH_COLUMNS: &str = "id, supplier_id, product_name, batch_number, vials_count, \
     mg_per_vial, vials_remaining, total_price, currency, purchase_date, expiry_date, \
     storage_location, notes, created_at";

const BATCH_COLUMNS_QUALIFIED: &str =
    "b.id, b.supplier_id, b.product_name, b.batch_number, b.vials_count, \
     b.mg_per_vial, b.vials_remaining, b.total_price, b.currency, b.purchase_date, \
     b.expiry_date, b.storage_location, b.notes, b.created_at";

fn map_batch(row: &rusqlite::Row<'_>) -> rusqlite::Result<Batch> {
    Ok(Batch {
        id: row.get(0)?,
        supplier_id: row.get(1)?,
        product_name: row.get(2)?,
        batch_number: row.get(3)?,
        vials_count: row.get(4)?,
        mg_per_vial: row.get(5)?,
        vials_remaining: row.get(6)?,
        total_price: row.get(7)?,
        currency: row.get(8)?,
        purchase_date: row.get(9)?,
        expiry_date: row.get(10)?,
        storage_location: row.get(11)?,
        notes: row.get(12)?,
        created_at: row.get(13)?,
    })
}
