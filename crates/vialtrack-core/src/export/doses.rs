//! Dose log export.

use serde::{Deserialize, Serialize};

use crate::db::{Database, LedgerResult};
use crate::models::AdministrationFilter;

/// One flattened dose row for export.
///
/// Mass figures are derived from the source batch composition at export
/// time; doses whose preparation link was severed carry volume only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoseRecord {
    pub administration_id: i64,
    pub administered_at: String,
    pub dose_ml: f64,
    /// dose_ml * concentration, in micrograms
    pub dose_mcg: Option<f64>,
    pub concentration_mg_per_ml: Option<f64>,
    pub injection_site: Option<String>,
    pub injection_method: Option<String>,
    pub batch_product: Option<String>,
    /// Comma-separated compound names from the source batch
    pub compound_names: Option<String>,
    pub protocol_name: Option<String>,
    pub notes: Option<String>,
}

/// A snapshot of the active dose log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoseLogExport {
    /// Export timestamp
    pub exported_at: String,
    pub records: Vec<DoseRecord>,
}

impl DoseLogExport {
    /// Export to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Export to CSV format.
    pub fn to_csv(&self) -> String {
        let mut csv = String::new();

        // Header
        csv.push_str(
            "administration_id,administered_at,dose_ml,dose_mcg,concentration_mg_per_ml,\
             injection_site,injection_method,batch_product,compound_names,protocol_name,notes\n",
        );

        for record in &self.records {
            csv.push_str(&format!(
                "{},{},{},{},{},{},{},{},{},{},{}\n",
                record.administration_id,
                escape_csv(&record.administered_at),
                record.dose_ml,
                record
                    .dose_mcg
                    .map(|v| v.to_string())
                    .unwrap_or_default(),
                record
                    .concentration_mg_per_ml
                    .map(|v| v.to_string())
                    .unwrap_or_default(),
                escape_csv(record.injection_site.as_deref().unwrap_or("")),
                escape_csv(record.injection_method.as_deref().unwrap_or("")),
                escape_csv(record.batch_product.as_deref().unwrap_or("")),
                escape_csv(record.compound_names.as_deref().unwrap_or("")),
                escape_csv(record.protocol_name.as_deref().unwrap_or("")),
                escape_csv(record.notes.as_deref().unwrap_or("")),
            ));
        }

        csv
    }
}

/// Flattens the active dose log, joined with batch and protocol labels.
pub struct DoseExporter<'a> {
    db: &'a Database,
}

impl<'a> DoseExporter<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Export active doses matching the filter, oldest first.
    pub fn export(&self, filter: &AdministrationFilter) -> LedgerResult<DoseLogExport> {
        let mut sql = String::from(
            r#"
            SELECT a.id, a.administered_at, a.dose_ml,
                   b.mg_per_vial * p.vials_used / p.volume_ml,
                   a.injection_site, a.injection_method, b.product_name,
                   (SELECT GROUP_CONCAT(c.name, ', ')
                    FROM batch_composition bc
                    JOIN compounds c ON bc.compound_id = c.id
                    WHERE bc.batch_id = b.id),
                   pr.name, a.notes
            FROM administrations a
            LEFT JOIN preparations p ON a.preparation_id = p.id
            LEFT JOIN batches b ON p.batch_id = b.id
            LEFT JOIN protocols pr ON a.protocol_id = pr.id
            WHERE a.deleted_at IS NULL
            "#,
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
        sql.push_str(" ORDER BY a.administered_at, a.id");

        let mut stmt = self.db.conn().prepare(&sql)?;
        let records = stmt
            .query_map(
                rusqlite::params_from_iter(values.iter().map(|v| v.as_ref())),
                |row| {
                    let dose_ml: f64 = row.get(2)?;
                    let concentration: Option<f64> = row.get(3)?;
                    Ok(DoseRecord {
                        administration_id: row.get(0)?,
                        administered_at: row.get(1)?,
                        dose_ml,
                        dose_mcg: concentration.map(|c| dose_ml * c * 1000.0),
                        concentration_mg_per_ml: concentration,
                        injection_site: row.get(4)?,
                        injection_method: row.get(5)?,
                        batch_product: row.get(6)?,
                        compound_names: row.get(7)?,
                        protocol_name: row.get(8)?,
                        notes: row.get(9)?,
                    })
                },
            )?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(DoseLogExport {
            exported_at: chrono::Utc::now().to_rfc3339(),
            records,
        })
    }
}

/// Escape a CSV field if it contains special characters.
fn escape_csv(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DoseEntry, NewBatch, NewPreparation, NewSupplier};

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

    #[test]
    fn test_export_derives_mass_from_composition() {
        let (db, prep_id) = setup_prep();
        let mut entry = DoseEntry::of(0.5);
        entry.administered_at = Some("2026-02-10T08:00:00Z".into());
        db.use_preparation(prep_id, &entry).unwrap();

        let export = DoseExporter::new(&db)
            .export(&AdministrationFilter::default())
            .unwrap();
        assert_eq!(export.records.len(), 1);

        let record = &export.records[0];
        // 20mg in 2ml -> 10 mg/ml; 0.5ml -> 5000 mcg
        assert_eq!(record.concentration_mg_per_ml, Some(10.0));
        assert_eq!(record.dose_mcg, Some(5000.0));
        assert_eq!(record.batch_product.as_deref(), Some("BPC-157 10mg"));
        assert_eq!(record.compound_names.as_deref(), Some("BPC-157"));
    }

    #[test]
    fn test_export_skips_deleted_doses() {
        let (db, prep_id) = setup_prep();
        let keep = db.use_preparation(prep_id, &DoseEntry::of(0.5)).unwrap();
        let drop = db.use_preparation(prep_id, &DoseEntry::of(0.5)).unwrap();
        db.soft_delete_administration(drop.administration_id).unwrap();

        let export = DoseExporter::new(&db)
            .export(&AdministrationFilter::default())
            .unwrap();
        assert_eq!(export.records.len(), 1);
        assert_eq!(export.records[0].administration_id, keep.administration_id);
    }

    #[test]
    fn test_csv_output() {
        let (db, prep_id) = setup_prep();
        let mut entry = DoseEntry::of(0.5);
        entry.notes = Some("left side, morning".into());
        db.use_preparation(prep_id, &entry).unwrap();

        let csv = DoseExporter::new(&db)
            .export(&AdministrationFilter::default())
            .unwrap()
            .to_csv();

        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("administration_id,administered_at"));
        // Comma-bearing field is quoted
        assert!(lines[1].contains("\"left side, morning\""));
    }

    #[test]
    fn test_json_round_trips() {
        let (db, prep_id) = setup_prep();
        db.use_preparation(prep_id, &DoseEntry::of(0.5)).unwrap();

        let json = DoseExporter::new(&db)
            .export(&AdministrationFilter::default())
            .unwrap()
            .to_json()
            .unwrap();
        let parsed: DoseLogExport = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.records.len(), 1);
    }

    #[test]
    fn test_escape_csv() {
        assert_eq!(escape_csv("plain"), "plain");
        assert_eq!(escape_csv("a,b"), "\"a,b\"");
        assert_eq!(escape_csv("say \"hi\""), "\"say \"\"hi\"\"\"");
    }
}
