//! Supplier database operations.

use rusqlite::{params, params_from_iter, OptionalExtension};
use tracing::info;

use super::{Database, LedgerError, LedgerResult};
use crate::models::{NewSupplier, Supplier, SupplierPatch};

impl Database {
    /// Insert a new supplier, returning its id.
    pub fn insert_supplier(&self, supplier: &NewSupplier) -> LedgerResult<i64> {
        self.conn.execute(
            r#"
            INSERT INTO suppliers (name, country, website, email, notes, reliability_rating)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                supplier.name,
                supplier.country,
                supplier.website,
                supplier.email,
                supplier.notes,
                supplier.reliability_rating,
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        info!(supplier = %supplier.name, id, "supplier added");
        Ok(id)
    }

    /// Get a supplier by id.
    pub fn get_supplier(&self, id: i64) -> LedgerResult<Option<Supplier>> {
        self.conn
            .query_row(
                r#"
                SELECT id, name, country, website, email, notes, reliability_rating, created_at
                FROM suppliers
                WHERE id = ?
                "#,
                [id],
                map_supplier,
            )
            .optional()
            .map_err(Into::into)
    }

    /// Get a supplier by exact name.
    pub fn get_supplier_by_name(&self, name: &str) -> LedgerResult<Option<Supplier>> {
        self.conn
            .query_row(
                r#"
                SELECT id, name, country, website, email, notes, reliability_rating, created_at
                FROM suppliers
                WHERE name = ?
                "#,
                [name],
                map_supplier,
            )
            .optional()
            .map_err(Into::into)
    }

    /// List suppliers, optionally filtered by name/country substring.
    pub fn list_suppliers(&self, search: Option<&str>) -> LedgerResult<Vec<Supplier>> {
        let mut stmt;
        let rows = match search {
            Some(query) => {
                let pattern = format!("%{}%", query);
                stmt = self.conn.prepare(
                    r#"
                    SELECT id, name, country, website, email, notes, reliability_rating, created_at
                    FROM suppliers
                    WHERE name LIKE ?1 OR country LIKE ?1
                    ORDER BY name
                    "#,
                )?;
                stmt.query_map([pattern], map_supplier)?
            }
            None => {
                stmt = self.conn.prepare(
                    r#"
                    SELECT id, name, country, website, email, notes, reliability_rating, created_at
                    FROM suppliers
                    ORDER BY name
                    "#,
                )?;
                stmt.query_map([], map_supplier)?
            }
        };

        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Apply a sparse update to a supplier.
    ///
    /// Returns false when the patch has no fields set.
    pub fn update_supplier(&self, id: i64, patch: &SupplierPatch) -> LedgerResult<bool> {
        self.get_supplier(id)?.ok_or(LedgerError::NotFound {
            entity: "supplier",
            id,
        })?;

        let mut sets: Vec<&'static str> = Vec::new();
        let mut values: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(name) = &patch.name {
            sets.push("name = ?");
            values.push(Box::new(name.clone()));
        }
        if let Some(country) = &patch.country {
            sets.push("country = ?");
            values.push(Box::new(country.clone()));
        }
        if let Some(website) = &patch.website {
            sets.push("website = ?");
            values.push(Box::new(website.clone()));
        }
        if let Some(email) = &patch.email {
            sets.push("email = ?");
            values.push(Box::new(email.clone()));
        }
        if let Some(notes) = &patch.notes {
            sets.push("notes = ?");
            values.push(Box::new(notes.clone()));
        }
        if let Some(rating) = patch.reliability_rating {
            sets.push("reliability_rating = ?");
            values.push(Box::new(rating));
        }

        if sets.is_empty() {
            return Ok(false);
        }

        values.push(Box::new(id));
        let sql = format!("UPDATE suppliers SET {} WHERE id = ?", sets.join(", "));
        self.conn
            .execute(&sql, params_from_iter(values.iter().map(|v| v.as_ref())))?;

        info!(supplier_id = id, "supplier updated");
        Ok(true)
    }

    /// Delete a supplier.
    ///
    /// Refuses when batches reference it, unless forced; a forced delete
    /// takes each of its batches down too, dependents and all.
    pub fn delete_supplier(&self, id: i64, force: bool) -> LedgerResult<()> {
        let supplier = self.get_supplier(id)?.ok_or(LedgerError::NotFound {
            entity: "supplier",
            id,
        })?;

        let batch_count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM batches WHERE supplier_id = ?",
            [id],
            |row| row.get(0),
        )?;

        if batch_count > 0 && !force {
            return Err(LedgerError::HasActiveReferences {
                entity: "supplier",
                id,
                count: batch_count,
                referencing: "batches",
            });
        }

        let tx = self.conn.unchecked_transaction()?;
        self.conn.execute(
            "DELETE FROM administrations
             WHERE preparation_id IN (
                 SELECT p.id FROM preparations p
                 JOIN batches b ON p.batch_id = b.id
                 WHERE b.supplier_id = ?
             )",
            [id],
        )?;
        self.conn.execute(
            "DELETE FROM preparations
             WHERE batch_id IN (SELECT id FROM batches WHERE supplier_id = ?)",
            [id],
        )?;
        self.conn
            .execute("DELETE FROM batches WHERE supplier_id = ?", [id])?;
        self.conn
            .execute("DELETE FROM suppliers WHERE id = ?", [id])?;
        tx.commit()?;

        info!(supplier_id = id, supplier = %supplier.name, "supplier deleted");
        Ok(())
    }
}

fn map_supplier(row: &rusqlite::Row<'_>) -> rusqlite::Result<Supplier> {
    Ok(Supplier {
        id: row.get(0)?,
        name: row.get(1)?,
        country: row.get(2)?,
        website: row.get(3)?,
        email: row.get(4)?,
        notes: row.get(5)?,
        reliability_rating: row.get(6)?,
        created_at: row.get(7)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_db() -> Database {
        Database::open_in_memory().unwrap()
    }

    #[test]
    fn test_insert_and_get() {
        let db = setup_db();

        let mut input = NewSupplier::named("Acme Labs");
        input.country = Some("DE".into());
        let id = db.insert_supplier(&input).unwrap();

        let supplier = db.get_supplier(id).unwrap().unwrap();
        assert_eq!(supplier.name, "Acme Labs");
        assert_eq!(supplier.country, Some("DE".into()));
    }

    #[test]
    fn test_search_by_name_or_country() {
        let db = setup_db();

        db.insert_supplier(&NewSupplier::named("Acme Labs")).unwrap();
        let mut other = NewSupplier::named("Orbit Peptides");
        other.country = Some("Acmeland".into());
        db.insert_supplier(&other).unwrap();
        db.insert_supplier(&NewSupplier::named("Third")).unwrap();

        let results = db.list_suppliers(Some("Acme")).unwrap();
        assert_eq!(results.len(), 2);
    }

    #[test]
    fn test_update_patch() {
        let db = setup_db();
        let id = db.insert_supplier(&NewSupplier::named("Acme Labs")).unwrap();

        let patch = SupplierPatch {
            reliability_rating: Some(5),
            notes: Some("fast shipping".into()),
            ..Default::default()
        };
        assert!(db.update_supplier(id, &patch).unwrap());

        let supplier = db.get_supplier(id).unwrap().unwrap();
        assert_eq!(supplier.reliability_rating, Some(5));
        assert_eq!(supplier.notes, Some("fast shipping".into()));
        // Untouched field
        assert_eq!(supplier.name, "Acme Labs");
    }

    #[test]
    fn test_update_empty_patch_is_noop() {
        let db = setup_db();
        let id = db.insert_supplier(&NewSupplier::named("Acme Labs")).unwrap();
        assert!(!db.update_supplier(id, &SupplierPatch::default()).unwrap());
    }

    #[test]
    fn test_delete_missing() {
        let db = setup_db();
        let err = db.delete_supplier(99, false).unwrap_err();
        assert!(matches!(err, LedgerError::NotFound { id: 99, .. }));
    }
}
