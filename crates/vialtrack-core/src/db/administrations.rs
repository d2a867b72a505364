//! Administration (dose log) database operations.
//!
//! Every mutation that can move a preparation's balance concludes by
//! recomputing that balance from the active log, never by applying a
//! compensating ±delta. The one exception is the hard delete, where the
//! row is physically gone and cannot be double-counted.

use chrono::Utc;
use rusqlite::{params, params_from_iter, OptionalExtension};
use tracing::{info, warn};

use super::{round_ml, Database, LedgerError, LedgerResult};
use crate::models::{
    Administration, AdministrationEntry, AdministrationFilter, AdministrationPatch,
    DeletedAdministration, DeletionState, DoseEntry, DoseReceipt, InjectionMethod,
};

impl Database {
    /// Record a dose drawn from a preparation.
    ///
    /// Volumes are compared at 3-decimal resolution, then the exact
    /// `ml_used` is subtracted. Log row and decrement land in one
    /// transaction.
    pub fn use_preparation(&self, prep_id: i64, entry: &DoseEntry) -> LedgerResult<DoseReceipt> {
        if entry.ml_used <= 0.0 {
            return Err(LedgerError::Constraint(format!(
                "ml_used must be positive, got {}",
                entry.ml_used
            )));
        }

        let prep = self.get_preparation(prep_id)?.ok_or(LedgerError::NotFound {
            entity: "preparation",
            id: prep_id,
        })?;
        if prep.deleted_at.is_some() {
            return Err(LedgerError::Constraint(format!(
                "preparation #{} is deleted",
                prep_id
            )));
        }
        if round_ml(entry.ml_used) > round_ml(prep.volume_remaining_ml) {
            return Err(LedgerError::InsufficientVolume {
                available_ml: prep.volume_remaining_ml,
                requested_ml: entry.ml_used,
            });
        }

        let administered_at = entry
            .administered_at
            .clone()
            .unwrap_or_else(|| Utc::now().to_rfc3339());

        let tx = self.conn.unchecked_transaction()?;

        self.conn.execute(
            r#"
            INSERT INTO administrations (
                preparation_id, protocol_id, administered_at, dose_ml,
                injection_site, injection_method, notes
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                prep_id,
                entry.protocol_id,
                administered_at,
                entry.ml_used,
                entry.injection_site,
                entry.injection_method.as_str(),
                entry.notes,
            ],
        )?;
        let administration_id = self.conn.last_insert_rowid();

        self.conn.execute(
            "UPDATE preparations SET volume_remaining_ml = volume_remaining_ml - ? WHERE id = ?",
            params![entry.ml_used, prep_id],
        )?;

        tx.commit()?;

        let volume_remaining_ml = prep.volume_remaining_ml - entry.ml_used;
        let exhausted = round_ml(volume_remaining_ml) <= 0.0;

        info!(
            administration_id,
            prep_id,
            dose_ml = entry.ml_used,
            remaining_ml = volume_remaining_ml,
            "dose recorded"
        );
        if exhausted {
            info!(prep_id, "preparation exhausted");
        }

        Ok(DoseReceipt {
            administration_id,
            volume_remaining_ml,
            exhausted,
        })
    }

    /// Get an administration by id, whatever its deletion state.
    pub fn get_administration(&self, id: i64) -> LedgerResult<Option<Administration>> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM administrations WHERE id = ?", ADMIN_COLUMNS),
                [id],
                map_administration,
            )
            .optional()
            .map_err(Into::into)
    }

    /// List active administrations matching the filter, newest first,
    /// joined with protocol and batch labels.
    pub fn list_administrations(
        &self,
        filter: &AdministrationFilter,
    ) -> LedgerResult<Vec<AdministrationEntry>> {
        let mut sql = format!(
            r#"
            SELECT {}, pr.name, b.id, b.product_name
            FROM administrations a
            LEFT JOIN protocols pr ON a.protocol_id = pr.id
            LEFT JOIN preparations p ON a.preparation_id = p.id
            LEFT JOIN batches b ON p.batch_id = b.id
            WHERE a.deleted_at IS NULL
            "#,
            ADMIN_COLUMNS_QUALIFIED
        );
        let mut values: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(protocol_id) = filter.protocol_id {
            sql.push_str(" AND a.protocol_id = ?");
            values.push(Box::new(protocol_id));
        }
        if let Some(preparation_id) = filter.preparation_id {
            sql.push_str(" AND a.preparation_id = ?");
            values.push(Box::new(preparation_id));
        }
        if let Some(days_back) = filter.days_back {
            sql.push_str(" AND a.administered_at >= datetime('now', ?)");
            values.push(Box::new(format!("-{} days", days_back)));
        }
        sql.push_str(" ORDER BY a.administered_at DESC, a.id DESC");

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(values.iter().map(|v| v.as_ref())), |row| {
            Ok(AdministrationEntry {
                administration: map_administration(row)?,
                protocol_name: row.get(10)?,
                batch_id: row.get(11)?,
                batch_product: row.get(12)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Soft-deleted administrations, newest deletion first, with enough
    /// batch context to decide what to restore.
    pub fn list_deleted_administrations(&self) -> LedgerResult<Vec<DeletedAdministration>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT a.id, a.administered_at, a.dose_ml, a.deleted_at, b.product_name,
                   (SELECT GROUP_CONCAT(c.name, ', ')
                    FROM batch_composition bc
                    JOIN compounds c ON bc.compound_id = c.id
                    WHERE bc.batch_id = b.id)
            FROM administrations a
            LEFT JOIN preparations p ON a.preparation_id = p.id
            LEFT JOIN batches b ON p.batch_id = b.id
            WHERE a.deleted_at IS NOT NULL
            ORDER BY a.deleted_at DESC
            "#,
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(DeletedAdministration {
                id: row.get(0)?,
                administered_at: row.get(1)?,
                dose_ml: row.get(2)?,
                deleted_at: row.get(3)?,
                batch_product: row.get(4)?,
                compound_names: row.get(5)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Apply a sparse update to an administration.
    ///
    /// A change to `dose_ml` or `preparation_id` recomputes every
    /// preparation touched, old and new, from the log; the stored old
    /// value may itself be stale, so no ±delta shortcut is taken.
    pub fn update_administration(&self, id: i64, patch: &AdministrationPatch) -> LedgerResult<bool> {
        let current = self.get_administration(id)?.ok_or(LedgerError::NotFound {
            entity: "administration",
            id,
        })?;

        if let Some(new_prep) = patch.preparation_id {
            if self.get_preparation(new_prep)?.is_none() {
                return Err(LedgerError::NotFound {
                    entity: "preparation",
                    id: new_prep,
                });
            }
            if Some(new_prep) != current.preparation_id {
                self.check_relink_allowed(&current)?;
            }
        }
        if let Some(protocol_id) = patch.protocol_id {
            let exists: Option<i64> = self
                .conn
                .query_row(
                    "SELECT id FROM protocols WHERE id = ?",
                    [protocol_id],
                    |row| row.get(0),
                )
                .optional()?;
            if exists.is_none() {
                return Err(LedgerError::NotFound {
                    entity: "protocol",
                    id: protocol_id,
                });
            }
        }

        let mut sets: Vec<&'static str> = Vec::new();
        let mut values: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(preparation_id) = patch.preparation_id {
            sets.push("preparation_id = ?");
            values.push(Box::new(preparation_id));
        }
        if let Some(administered_at) = &patch.administered_at {
            sets.push("administered_at = ?");
            values.push(Box::new(administered_at.clone()));
        }
        if let Some(dose_ml) = patch.dose_ml {
            if dose_ml <= 0.0 {
                return Err(LedgerError::Constraint(format!(
                    "dose_ml must be positive, got {}",
                    dose_ml
                )));
            }
            sets.push("dose_ml = ?");
            values.push(Box::new(dose_ml));
        }
        if let Some(injection_site) = &patch.injection_site {
            sets.push("injection_site = ?");
            values.push(Box::new(injection_site.clone()));
        }
        if let Some(injection_method) = patch.injection_method {
            sets.push("injection_method = ?");
            values.push(Box::new(injection_method.as_str()));
        }
        if let Some(protocol_id) = patch.protocol_id {
            sets.push("protocol_id = ?");
            values.push(Box::new(protocol_id));
        }
        if let Some(notes) = &patch.notes {
            sets.push("notes = ?");
            values.push(Box::new(notes.clone()));
        }

        if sets.is_empty() {
            return Ok(false);
        }

        let tx = self.conn.unchecked_transaction()?;

        values.push(Box::new(id));
        let sql = format!("UPDATE administrations SET {} WHERE id = ?", sets.join(", "));
        self.conn
            .execute(&sql, params_from_iter(values.iter().map(|v| v.as_ref())))?;

        if patch.dose_ml.is_some() || patch.preparation_id.is_some() {
            if let Some(old_prep) = current.preparation_id {
                self.recalculate_preparation_volume(old_prep)?;
            }
            if let Some(new_prep) = patch.preparation_id {
                if Some(new_prep) != current.preparation_id {
                    self.recalculate_preparation_volume(new_prep)?;
                }
            }
        }

        tx.commit()?;
        info!(administration_id = id, "administration updated");
        Ok(true)
    }

    /// Soft-delete an administration and recompute its preparation's
    /// balance from the log.
    pub fn soft_delete_administration(&self, id: i64) -> LedgerResult<()> {
        let current = self.get_administration(id)?.ok_or(LedgerError::NotFound {
            entity: "administration",
            id,
        })?;
        if !current.state.is_active() {
            return Err(LedgerError::Constraint(format!(
                "administration #{} is already deleted",
                id
            )));
        }

        let tx = self.conn.unchecked_transaction()?;
        self.conn.execute(
            "UPDATE administrations SET deleted_at = ?1 WHERE id = ?2",
            params![Utc::now().to_rfc3339(), id],
        )?;
        if let Some(prep_id) = current.preparation_id {
            self.recalculate_preparation_volume(prep_id)?;
        }
        tx.commit()?;

        info!(administration_id = id, "administration soft-deleted");
        Ok(())
    }

    /// Bring a soft-deleted administration back and recompute its
    /// preparation's balance from the log.
    pub fn restore_administration(&self, id: i64) -> LedgerResult<()> {
        let current = self.get_administration(id)?.ok_or(LedgerError::NotFound {
            entity: "administration",
            id,
        })?;
        if current.state.is_active() {
            return Err(LedgerError::Constraint(format!(
                "administration #{} is not deleted",
                id
            )));
        }

        let tx = self.conn.unchecked_transaction()?;
        self.conn.execute(
            "UPDATE administrations SET deleted_at = NULL WHERE id = ?",
            [id],
        )?;
        if let Some(prep_id) = current.preparation_id {
            let remaining = self.recalculate_preparation_volume(prep_id)?;
            if remaining < 0.0 {
                warn!(
                    administration_id = id,
                    prep_id, remaining_ml = remaining,
                    "restore overdraws the preparation"
                );
            }
        }
        tx.commit()?;

        info!(administration_id = id, "administration restored");
        Ok(())
    }

    /// Hard-delete an administration.
    ///
    /// With `restore_volume`, its dose goes straight back onto the
    /// preparation. The direct increment is safe here: the row no longer
    /// exists, so a later recompute cannot count it twice.
    pub fn delete_administration(&self, id: i64, restore_volume: bool) -> LedgerResult<()> {
        let current = self.get_administration(id)?.ok_or(LedgerError::NotFound {
            entity: "administration",
            id,
        })?;

        let tx = self.conn.unchecked_transaction()?;
        self.conn
            .execute("DELETE FROM administrations WHERE id = ?", [id])?;
        if restore_volume && current.state.is_active() {
            if let Some(prep_id) = current.preparation_id {
                self.conn.execute(
                    "UPDATE preparations SET volume_remaining_ml = volume_remaining_ml + ? WHERE id = ?",
                    params![current.dose_ml, prep_id],
                )?;
            }
        }
        tx.commit()?;

        info!(
            administration_id = id,
            restore_volume, "administration hard-deleted"
        );
        Ok(())
    }

    /// Retroactively attach one administration to a protocol.
    pub fn link_administration_to_protocol(
        &self,
        administration_id: i64,
        protocol_id: i64,
    ) -> LedgerResult<()> {
        self.get_administration(administration_id)?
            .ok_or(LedgerError::NotFound {
                entity: "administration",
                id: administration_id,
            })?;
        let exists: Option<i64> = self
            .conn
            .query_row(
                "SELECT id FROM protocols WHERE id = ?",
                [protocol_id],
                |row| row.get(0),
            )
            .optional()?;
        if exists.is_none() {
            return Err(LedgerError::NotFound {
                entity: "protocol",
                id: protocol_id,
            });
        }

        self.conn.execute(
            "UPDATE administrations SET protocol_id = ?1 WHERE id = ?2",
            params![protocol_id, administration_id],
        )?;
        info!(administration_id, protocol_id, "administration linked");
        Ok(())
    }

    /// Retroactively attach many administrations to a protocol, returning
    /// how many rows changed.
    pub fn link_administrations_to_protocol(
        &self,
        administration_ids: &[i64],
        protocol_id: i64,
    ) -> LedgerResult<usize> {
        let tx = self.conn.unchecked_transaction()?;
        let mut linked = 0;
        for &id in administration_ids {
            self.link_administration_to_protocol(id, protocol_id)?;
            linked += 1;
        }
        tx.commit()?;
        Ok(linked)
    }

    /// Re-linking a dose is refused once its protocol has been
    /// deactivated; a deactivated protocol is a closed book.
    fn check_relink_allowed(&self, current: &Administration) -> LedgerResult<()> {
        let Some(protocol_id) = current.protocol_id else {
            return Ok(());
        };
        let active: Option<bool> = self
            .conn
            .query_row(
                "SELECT active FROM protocols WHERE id = ?",
                [protocol_id],
                |row| row.get(0),
            )
            .optional()?;
        if active == Some(false) {
            return Err(LedgerError::Constraint(format!(
                "administration #{} belongs to deactivated protocol #{}; preparation link is frozen",
                current.id, protocol_id
            )));
        }
        Ok(())
    }
}

const ADMIN_COLUMNS: &str = "id, preparation_id, protocol_id, administered_at, dose_ml, \
     injection_site, injection_method, notes, created_at, deleted_at";

const ADMIN_COLUMNS_QUALIFIED: &str =
    "a.id, a.preparation_id, a.protocol_id, a.administered_at, a.dose_ml, \
     a.injection_site, a.injection_method, a.notes, a.created_at, a.deleted_at";

fn map_administration(row: &rusqlite::Row<'_>) -> rusqlite::Result<Administration> {
    let method: Option<String> = row.get(6)?;
    Ok(Administration {
        id: row.get(0)?,
        preparation_id: row.get(1)?,
        protocol_id: row.get(2)?,
        administered_at: row.get(3)?,
        dose_ml: row.get(4)?,
        injection_site: row.get(5)?,
        injection_method: method
            .as_deref()
            .and_then(InjectionMethod::parse)
            .unwrap_or_default(),
        notes: row.get(7)?,
        created_at: row.get(8)?,
        state: DeletionState::from_column(row.get(9)?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewBatch, NewPreparation, NewSupplier};
    use rusqlite::params;

    fn setup_prep() -> (Database, i64) {
        let db = Database::open_in_memory().unwrap();
        db.insert_supplier(&NewSupplier::named("Acme Labs")).unwrap();
        let batch_id = db
            .create_batch(&NewBatch::new(
                "Acme Labs",
                "BPC-157 10mg",
                10,
                10.0,
                vec![("BPC-157".into(), 10.0)],
            ))
            .unwrap();
        let prep_id = db
            .create_preparation(&NewPreparation::new(batch_id, 2, 2.0, "2026-02-01"))
            .unwrap();
        (db, prep_id)
    }

    fn insert_protocol(db: &Database, name: &str, active: bool) -> i64 {
        db.conn()
            .execute(
                "INSERT INTO protocols (name, dose_ml, active) VALUES (?1, 0.5, ?2)",
                params![name, active],
            )
            .unwrap();
        db.conn().last_insert_rowid()
    }

    fn remaining(db: &Database, prep_id: i64) -> f64 {
        db.get_preparation(prep_id)
            .unwrap()
            .unwrap()
            .volume_remaining_ml
    }

    #[test]
    fn test_use_preparation_decrements_and_logs() {
        let (db, prep_id) = setup_prep();

        for _ in 0..3 {
            db.use_preparation(prep_id, &DoseEntry::of(0.5)).unwrap();
        }

        assert!((remaining(&db, prep_id) - 0.5).abs() < 1e-9);
        let log = db
            .list_administrations(&AdministrationFilter {
                preparation_id: Some(prep_id),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(log.len(), 3);
        assert_eq!(log[0].batch_product.as_deref(), Some("BPC-157 10mg"));
    }

    #[test]
    fn test_use_preparation_insufficient_volume() {
        let (db, prep_id) = setup_prep();
        for _ in 0..3 {
            db.use_preparation(prep_id, &DoseEntry::of(0.5)).unwrap();
        }

        let err = db.use_preparation(prep_id, &DoseEntry::of(0.51)).unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientVolume { .. }));
        // No state change on failure
        assert!((remaining(&db, prep_id) - 0.5).abs() < 1e-9);
        assert_eq!(db.stats().unwrap().administrations, 3);
    }

    #[test]
    fn test_exact_volume_dose_exhausts() {
        let (db, prep_id) = setup_prep();
        let receipt = db.use_preparation(prep_id, &DoseEntry::of(2.0)).unwrap();
        assert!(receipt.exhausted);
        assert_eq!(receipt.volume_remaining_ml, 0.0);
    }

    #[test]
    fn test_dose_comparison_rounds_to_three_decimals() {
        let (db, prep_id) = setup_prep();
        // 2.0004 rounds to 2.000 and passes; 2.001 does not
        assert!(db.use_preparation(prep_id, &DoseEntry::of(2.001)).is_err());
        assert!(db.use_preparation(prep_id, &DoseEntry::of(2.0004)).is_ok());
    }

    #[test]
    fn test_soft_delete_and_restore_round_trip() {
        let (db, prep_id) = setup_prep();
        let mut ids = Vec::new();
        for _ in 0..3 {
            ids.push(
                db.use_preparation(prep_id, &DoseEntry::of(0.5))
                    .unwrap()
                    .administration_id,
            );
        }

        db.soft_delete_administration(ids[1]).unwrap();
        assert_eq!(remaining(&db, prep_id), 1.0);
        assert_eq!(db.list_deleted_administrations().unwrap().len(), 1);

        db.restore_administration(ids[1]).unwrap();
        assert_eq!(remaining(&db, prep_id), 0.5);
        assert!(db.list_deleted_administrations().unwrap().is_empty());
    }

    #[test]
    fn test_soft_delete_twice_refused() {
        let (db, prep_id) = setup_prep();
        let id = db
            .use_preparation(prep_id, &DoseEntry::of(0.5))
            .unwrap()
            .administration_id;

        db.soft_delete_administration(id).unwrap();
        assert!(db.soft_delete_administration(id).is_err());
        assert!(db.restore_administration(id).is_ok());
        assert!(db.restore_administration(id).is_err());
    }

    #[test]
    fn test_update_dose_recomputes_from_log() {
        let (db, prep_id) = setup_prep();
        let id = db
            .use_preparation(prep_id, &DoseEntry::of(0.5))
            .unwrap()
            .administration_id;

        let patch = AdministrationPatch {
            dose_ml: Some(0.3),
            ..Default::default()
        };
        db.update_administration(id, &patch).unwrap();

        assert_eq!(remaining(&db, prep_id), 1.7);
    }

    #[test]
    fn test_move_dose_recomputes_both_preparations() {
        let (db, prep_a) = setup_prep();
        let batch_id = db.get_preparation(prep_a).unwrap().unwrap().batch_id;
        let prep_b = db
            .create_preparation(&NewPreparation::new(batch_id, 2, 3.0, "2026-02-02"))
            .unwrap();
        let id = db
            .use_preparation(prep_a, &DoseEntry::of(0.5))
            .unwrap()
            .administration_id;

        let patch = AdministrationPatch {
            preparation_id: Some(prep_b),
            ..Default::default()
        };
        db.update_administration(id, &patch).unwrap();

        assert_eq!(remaining(&db, prep_a), 2.0);
        assert_eq!(remaining(&db, prep_b), 2.5);
    }

    #[test]
    fn test_update_rejects_unknown_references() {
        let (db, prep_id) = setup_prep();
        let id = db
            .use_preparation(prep_id, &DoseEntry::of(0.5))
            .unwrap()
            .administration_id;

        let err = db
            .update_administration(
                id,
                &AdministrationPatch {
                    preparation_id: Some(999),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert!(matches!(
            err,
            LedgerError::NotFound {
                entity: "preparation",
                id: 999
            }
        ));

        let err = db
            .update_administration(
                id,
                &AdministrationPatch {
                    protocol_id: Some(999),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert!(matches!(
            err,
            LedgerError::NotFound {
                entity: "protocol",
                id: 999
            }
        ));

        // Nothing moved
        let dose = db.get_administration(id).unwrap().unwrap();
        assert_eq!(dose.preparation_id, Some(prep_id));
        assert_eq!(dose.protocol_id, None);
        assert!((remaining(&db, prep_id) - 1.5).abs() < 1e-9);
    }

    #[test]
    fn test_relink_frozen_under_deactivated_protocol() {
        let (db, prep_a) = setup_prep();
        let batch_id = db.get_preparation(prep_a).unwrap().unwrap().batch_id;
        let prep_b = db
            .create_preparation(&NewPreparation::new(batch_id, 2, 3.0, "2026-02-02"))
            .unwrap();
        let protocol = insert_protocol(&db, "Morning", false);

        let mut entry = DoseEntry::of(0.5);
        entry.protocol_id = Some(protocol);
        let id = db.use_preparation(prep_a, &entry).unwrap().administration_id;

        let patch = AdministrationPatch {
            preparation_id: Some(prep_b),
            ..Default::default()
        };
        let err = db.update_administration(id, &patch).unwrap_err();
        assert!(matches!(err, LedgerError::Constraint(_)));

        // Other fields stay editable
        let patch = AdministrationPatch {
            notes: Some("left side".into()),
            ..Default::default()
        };
        assert!(db.update_administration(id, &patch).unwrap());
    }

    #[test]
    fn test_hard_delete_with_volume_restore() {
        let (db, prep_id) = setup_prep();
        let id = db
            .use_preparation(prep_id, &DoseEntry::of(0.5))
            .unwrap()
            .administration_id;

        db.delete_administration(id, true).unwrap();
        assert_eq!(remaining(&db, prep_id), 2.0);
        assert!(db.get_administration(id).unwrap().is_none());
    }

    #[test]
    fn test_hard_delete_of_soft_deleted_does_not_restore_twice() {
        let (db, prep_id) = setup_prep();
        let id = db
            .use_preparation(prep_id, &DoseEntry::of(0.5))
            .unwrap()
            .administration_id;

        // Soft delete already put the volume back via recompute
        db.soft_delete_administration(id).unwrap();
        assert_eq!(remaining(&db, prep_id), 2.0);

        db.delete_administration(id, true).unwrap();
        assert_eq!(remaining(&db, prep_id), 2.0);
    }

    #[test]
    fn test_link_many_to_protocol() {
        let (db, prep_id) = setup_prep();
        let protocol = insert_protocol(&db, "Evening", true);
        let mut ids = Vec::new();
        for _ in 0..2 {
            ids.push(
                db.use_preparation(prep_id, &DoseEntry::of(0.25))
                    .unwrap()
                    .administration_id,
            );
        }

        let linked = db
            .link_administrations_to_protocol(&ids, protocol)
            .unwrap();
        assert_eq!(linked, 2);

        let by_protocol = db
            .list_administrations(&AdministrationFilter {
                protocol_id: Some(protocol),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(by_protocol.len(), 2);
        assert_eq!(by_protocol[0].protocol_name.as_deref(), Some("Evening"));
    }
}
