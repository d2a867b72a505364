//! Compound catalog database operations.

use rusqlite::{params, params_from_iter, OptionalExtension};
use tracing::info;

use super::{Database, LedgerError, LedgerResult};
use crate::models::{Compound, CompoundPatch, NewCompound};

impl Database {
    /// Insert a new compound, returning its id.
    pub fn insert_compound(&self, compound: &NewCompound) -> LedgerResult<i64> {
        self.conn.execute(
            r#"
            INSERT INTO compounds (name, description, common_uses, notes)
            VALUES (?1, ?2, ?3, ?4)
            "#,
            params![
                compound.name,
                compound.description,
                compound.common_uses,
                compound.notes,
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        info!(compound = %compound.name, id, "compound added");
        Ok(id)
    }

    /// Get a compound by id.
    pub fn get_compound(&self, id: i64) -> LedgerResult<Option<Compound>> {
        self.conn
            .query_row(
                r#"
                SELECT id, name, description, common_uses, notes, created_at
                FROM compounds
                WHERE id = ?
                "#,
                [id],
                map_compound,
            )
            .optional()
            .map_err(Into::into)
    }

    /// Get a compound by exact name.
    pub fn get_compound_by_name(&self, name: &str) -> LedgerResult<Option<Compound>> {
        self.conn
            .query_row(
                r#"
                SELECT id, name, description, common_uses, notes, created_at
                FROM compounds
                WHERE name = ?
                "#,
                [name],
                map_compound,
            )
            .optional()
            .map_err(Into::into)
    }

    /// List compounds, optionally filtered by name/description substring.
    pub fn list_compounds(&self, search: Option<&str>) -> LedgerResult<Vec<Compound>> {
        let mut stmt;
        let rows = match search {
            Some(query) => {
                let pattern = format!("%{}%", query);
                stmt = self.conn.prepare(
                    r#"
                    SELECT id, name, description, common_uses, notes, created_at
                    FROM compounds
                    WHERE name LIKE ?1 OR description LIKE ?1
                    ORDER BY name
                    "#,
                )?;
                stmt.query_map([pattern], map_compound)?
            }
            None => {
                stmt = self.conn.prepare(
                    r#"
                    SELECT id, name, description, common_uses, notes, created_at
                    FROM compounds
                    ORDER BY name
                    "#,
                )?;
                stmt.query_map([], map_compound)?
            }
        };

        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Apply a sparse update to a compound.
    pub fn update_compound(&self, id: i64, patch: &CompoundPatch) -> LedgerResult<bool> {
        self.get_compound(id)?.ok_or(LedgerError::NotFound {
            entity: "compound",
            id,
        })?;

        let mut sets: Vec<&'static str> = Vec::new();
        let mut values: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(name) = &patch.name {
            sets.push("name = ?");
            values.push(Box::new(name.clone()));
        }
        if let Some(description) = &patch.description {
            sets.push("description = ?");
            values.push(Box::new(description.clone()));
        }
        if let Some(common_uses) = &patch.common_uses {
            sets.push("common_uses = ?");
            values.push(Box::new(common_uses.clone()));
        }
        if let Some(notes) = &patch.notes {
            sets.push("notes = ?");
            values.push(Box::new(notes.clone()));
        }

        if sets.is_empty() {
            return Ok(false);
        }

        values.push(Box::new(id));
        let sql = format!("UPDATE compounds SET {} WHERE id = ?", sets.join(", "));
        self.conn
            .execute(&sql, params_from_iter(values.iter().map(|v| v.as_ref())))?;

        info!(compound_id = id, "compound updated");
        Ok(true)
    }

    /// Delete a compound.
    ///
    /// Refuses when batch compositions or protocols reference it, unless
    /// forced (the join rows then cascade).
    pub fn delete_compound(&self, id: i64, force: bool) -> LedgerResult<()> {
        let compound = self.get_compound(id)?.ok_or(LedgerError::NotFound {
            entity: "compound",
            id,
        })?;

        let batch_refs: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM batch_composition WHERE compound_id = ?",
            [id],
            |row| row.get(0),
        )?;
        let protocol_refs: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM protocol_compounds WHERE compound_id = ?",
            [id],
            |row| row.get(0),
        )?;

        if (batch_refs > 0 || protocol_refs > 0) && !force {
            return Err(LedgerError::HasActiveReferences {
                entity: "compound",
                id,
                count: batch_refs + protocol_refs,
                referencing: "composition/protocol rows",
            });
        }

        self.conn
            .execute("DELETE FROM compounds WHERE id = ?", [id])?;
        info!(compound_id = id, compound = %compound.name, "compound deleted");
        Ok(())
    }

    /// Get the id for a compound name, creating the compound if missing.
    pub(crate) fn ensure_compound(&self, name: &str) -> LedgerResult<i64> {
        if let Some(compound) = self.get_compound_by_name(name)? {
            return Ok(compound.id);
        }
        self.conn
            .execute("INSERT INTO compounds (name) VALUES (?)", [name])?;
        let id = self.conn.last_insert_rowid();
        info!(compound = %name, id, "compound auto-created");
        Ok(id)
    }
}

fn map_compound(row: &rusqlite::Row<'_>) -> rusqlite::Result<Compound> {
    Ok(Compound {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        common_uses: row.get(3)?,
        notes: row.get(4)?,
        created_at: row.get(5)?,
    })
}
