//! Protocol (dosing schedule) database operations.

use rusqlite::{params, params_from_iter, OptionalExtension};
use tracing::info;

use super::{Database, LedgerError, LedgerResult};
use crate::models::{
    NewProtocol, Protocol, ProtocolCompound, ProtocolDetails, ProtocolPatch, ProtocolStatistics,
};

impl Database {
    /// Create a protocol with its compound targets, returning the id.
    ///
    /// Compounds named in the targets that are not yet in the catalog are
    /// created automatically.
    pub fn create_protocol(&self, input: &NewProtocol) -> LedgerResult<i64> {
        if input.dose_ml <= 0.0 {
            return Err(LedgerError::Constraint(format!(
                "dose_ml must be positive, got {}",
                input.dose_ml
            )));
        }
        if input.frequency_per_day <= 0 {
            return Err(LedgerError::Constraint(format!(
                "frequency_per_day must be positive, got {}",
                input.frequency_per_day
            )));
        }

        let tx = self.conn.unchecked_transaction()?;

        self.conn.execute(
            r#"
            INSERT INTO protocols (
                name, description, dose_ml, frequency_per_day, days_on, days_off,
                cycle_duration_weeks, notes
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                input.name,
                input.description,
                input.dose_ml,
                input.frequency_per_day,
                input.days_on,
                input.days_off,
                input.cycle_duration_weeks,
                input.notes,
            ],
        )?;
        let protocol_id = self.conn.last_insert_rowid();

        for (name, target_mcg) in &input.compounds {
            let compound_id = self.ensure_compound(name)?;
            self.conn.execute(
                "INSERT INTO protocol_compounds (protocol_id, compound_id, target_dose_mcg)
                 VALUES (?1, ?2, ?3)",
                params![protocol_id, compound_id, target_mcg],
            )?;
        }

        tx.commit()?;
        info!(protocol_id, name = %input.name, "protocol created");
        Ok(protocol_id)
    }

    /// Get a protocol by id.
    pub fn get_protocol(&self, id: i64) -> LedgerResult<Option<Protocol>> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM protocols WHERE id = ?", PROTOCOL_COLUMNS),
                [id],
                map_protocol,
            )
            .optional()
            .map_err(Into::into)
    }

    /// List protocols, alphabetically.
    pub fn list_protocols(&self, active_only: bool) -> LedgerResult<Vec<Protocol>> {
        let mut sql = format!("SELECT {} FROM protocols", PROTOCOL_COLUMNS);
        if active_only {
            sql.push_str(" WHERE active = 1");
        }
        sql.push_str(" ORDER BY name");

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], map_protocol)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Full protocol record: compound targets plus the active-dose rollup.
    pub fn get_protocol_details(&self, id: i64) -> LedgerResult<Option<ProtocolDetails>> {
        let protocol = match self.get_protocol(id)? {
            Some(p) => p,
            None => return Ok(None),
        };

        let mut stmt = self.conn.prepare(
            r#"
            SELECT c.id, c.name, pc.target_dose_mcg
            FROM protocol_compounds pc
            JOIN compounds c ON pc.compound_id = c.id
            WHERE pc.protocol_id = ?
            ORDER BY c.name
            "#,
        )?;
        let compounds = stmt
            .query_map([id], |row| {
                Ok(ProtocolCompound {
                    compound_id: row.get(0)?,
                    compound_name: row.get(1)?,
                    target_dose_mcg: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let (administrations_count, first_administration, last_administration): (
            i64,
            Option<String>,
            Option<String>,
        ) = self.conn.query_row(
            "SELECT COUNT(*), MIN(administered_at), MAX(administered_at)
             FROM administrations
             WHERE protocol_id = ? AND deleted_at IS NULL",
            [id],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )?;

        Ok(Some(ProtocolDetails {
            protocol,
            compounds,
            administrations_count,
            first_administration,
            last_administration,
        }))
    }

    /// Apply a sparse update to a protocol.
    pub fn update_protocol(&self, id: i64, patch: &ProtocolPatch) -> LedgerResult<bool> {
        self.get_protocol(id)?.ok_or(LedgerError::NotFound {
            entity: "protocol",
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
        if let Some(dose_ml) = patch.dose_ml {
            sets.push("dose_ml = ?");
            values.push(Box::new(dose_ml));
        }
        if let Some(frequency_per_day) = patch.frequency_per_day {
            sets.push("frequency_per_day = ?");
            values.push(Box::new(frequency_per_day));
        }
        if let Some(days_on) = patch.days_on {
            sets.push("days_on = ?");
            values.push(Box::new(days_on));
        }
        if let Some(days_off) = patch.days_off {
            sets.push("days_off = ?");
            values.push(Box::new(days_off));
        }
        if let Some(cycle_duration_weeks) = patch.cycle_duration_weeks {
            sets.push("cycle_duration_weeks = ?");
            values.push(Box::new(cycle_duration_weeks));
        }
        if let Some(notes) = &patch.notes {
            sets.push("notes = ?");
            values.push(Box::new(notes.clone()));
        }
        if let Some(active) = patch.active {
            sets.push("active = ?");
            values.push(Box::new(active));
        }

        if sets.is_empty() {
            return Ok(false);
        }

        values.push(Box::new(id));
        let sql = format!("UPDATE protocols SET {} WHERE id = ?", sets.join(", "));
        self.conn
            .execute(&sql, params_from_iter(values.iter().map(|v| v.as_ref())))?;

        info!(protocol_id = id, "protocol updated");
        Ok(true)
    }

    /// Reopen a protocol for linkage changes.
    pub fn activate_protocol(&self, id: i64) -> LedgerResult<bool> {
        self.update_protocol(
            id,
            &ProtocolPatch {
                active: Some(true),
                ..Default::default()
            },
        )
    }

    /// Close a protocol; its administrations' preparation links freeze.
    pub fn deactivate_protocol(&self, id: i64) -> LedgerResult<bool> {
        self.update_protocol(
            id,
            &ProtocolPatch {
                active: Some(false),
                ..Default::default()
            },
        )
    }

    /// Adherence statistics over the protocol's active administrations.
    pub fn protocol_statistics(&self, id: i64) -> LedgerResult<ProtocolStatistics> {
        let protocol = self.get_protocol(id)?.ok_or(LedgerError::NotFound {
            entity: "protocol",
            id,
        })?;

        let (total_administrations, total_ml_used, first_date, last_date, days_active): (
            i64,
            f64,
            Option<String>,
            Option<String>,
            i64,
        ) = self.conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(dose_ml), 0),
                    MIN(administered_at), MAX(administered_at),
                    COUNT(DISTINCT date(administered_at))
             FROM administrations
             WHERE protocol_id = ? AND deleted_at IS NULL",
            [id],
            |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                ))
            },
        )?;

        let days_elapsed: i64 = match (&first_date, &last_date) {
            (Some(first), Some(last)) => self.conn.query_row(
                "SELECT CAST(julianday(date(?1)) - julianday(date(?2)) AS INTEGER) + 1",
                params![last, first],
                |row| row.get(0),
            )?,
            _ => 0,
        };

        let expected_administrations = days_elapsed * protocol.frequency_per_day;
        let adherence_percentage = if expected_administrations > 0 {
            total_administrations as f64 / expected_administrations as f64 * 100.0
        } else {
            0.0
        };

        Ok(ProtocolStatistics {
            total_administrations,
            total_ml_used,
            first_date,
            last_date,
            days_active,
            days_elapsed,
            expected_administrations,
            adherence_percentage,
        })
    }

    /// Delete a protocol.
    ///
    /// Refused while administrations reference it, unless
    /// `unlink_administrations` clears those links first. Compound targets
    /// cascade away with the protocol row.
    pub fn delete_protocol(&self, id: i64, unlink_administrations: bool) -> LedgerResult<()> {
        self.get_protocol(id)?.ok_or(LedgerError::NotFound {
            entity: "protocol",
            id,
        })?;

        let linked: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM administrations WHERE protocol_id = ?",
            [id],
            |row| row.get(0),
        )?;
        if linked > 0 && !unlink_administrations {
            return Err(LedgerError::HasActiveReferences {
                entity: "protocol",
                id,
                count: linked,
                referencing: "administrations",
            });
        }

        let tx = self.conn.unchecked_transaction()?;
        self.conn.execute(
            "UPDATE administrations SET protocol_id = NULL WHERE protocol_id = ?",
            [id],
        )?;
        self.conn.execute("DELETE FROM protocols WHERE id = ?", [id])?;
        tx.commit()?;

        info!(protocol_id = id, unlinked = linked, "protocol deleted");
        Ok(())
    }
}

const PROTOCOL_COLUMNS: &str = "id, name, description, dose_ml, frequency_per_day, days_on, \
     days_off, cycle_duration_weeks, notes, active, created_at";

fn map_protocol(row: &rusqlite::Row<'_>) -> rusqlite::Result<Protocol> {
    Ok(Protocol {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        dose_ml: row.get(3)?,
        frequency_per_day: row.get(4)?,
        days_on: row.get(5)?,
        days_off: row.get(6)?,
        cycle_duration_weeks: row.get(7)?,
        notes: row.get(8)?,
        active: row.get(9)?,
        created_at: row.get(10)?,
    })
}
