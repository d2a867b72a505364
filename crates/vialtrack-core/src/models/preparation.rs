//! Preparation (dosing solution) models.

use serde::{Deserialize, Serialize};

/// A diluted solution made from some vials of a batch.
///
/// `volume_remaining_ml` is an authoritative function of the active
/// administration log: initial volume minus the sum of non-deleted doses.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Preparation {
    pub id: i64,
    pub batch_id: i64,
    /// Vials drawn from the batch at creation time
    pub vials_used: i64,
    /// Initial diluent volume (immutable nominal)
    pub volume_ml: f64,
    /// Volume left after active administrations
    pub volume_remaining_ml: f64,
    pub diluent: String,
    pub preparation_date: String,
    pub expiry_date: Option<String>,
    pub storage_location: Option<String>,
    pub notes: Option<String>,
    pub created_at: String,
    pub deleted_at: Option<String>,
}

impl Preparation {
    /// Whether there is volume left to draw.
    pub fn is_active(&self) -> bool {
        self.volume_remaining_ml > 0.0 && self.deleted_at.is_none()
    }
}

/// Input for creating a preparation.
#[derive(Debug, Clone)]
pub struct NewPreparation {
    pub batch_id: i64,
    pub vials_used: i64,
    pub volume_ml: f64,
    pub preparation_date: String,
    pub diluent: Option<String>,
    pub expiry_date: Option<String>,
    pub storage_location: Option<String>,
    pub notes: Option<String>,
}

impl NewPreparation {
    pub fn new(
        batch_id: i64,
        vials_used: i64,
        volume_ml: f64,
        preparation_date: impl Into<String>,
    ) -> Self {
        Self {
            batch_id,
            vials_used,
            volume_ml,
            preparation_date: preparation_date.into(),
            diluent: None,
            expiry_date: None,
            storage_location: None,
            notes: None,
        }
    }
}

/// Sparse update for a preparation; unset fields are left untouched.
///
/// Changing `batch_id` or `vials_used` does NOT adjust the batch's vial
/// count; that reconciliation is the caller's responsibility.
#[derive(Debug, Clone, Default)]
pub struct PreparationPatch {
    pub expiry_date: Option<String>,
    pub volume_remaining_ml: Option<f64>,
    pub storage_location: Option<String>,
    pub notes: Option<String>,
    pub batch_id: Option<i64>,
    pub vials_used: Option<i64>,
    pub volume_ml: Option<f64>,
    pub diluent: Option<String>,
    pub preparation_date: Option<String>,
}

/// Preparation list filter.
#[derive(Debug, Clone, Default)]
pub struct PreparationFilter {
    pub batch_id: Option<i64>,
    /// Only preparations with volume remaining
    pub only_active: bool,
}

/// Per-compound concentration within a preparation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompoundConcentration {
    pub compound_id: i64,
    pub compound_name: String,
    /// Mass of this compound per source vial
    pub mg_per_vial: f64,
    /// Derived: mg_per_vial * vials_used / volume_ml
    pub concentration_mg_per_ml: f64,
}

/// Full preparation record with derived concentrations and dose rollup.
///
/// Concentrations are always derived, never stored; the batch composition
/// is the single source of truth for mass.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PreparationDetails {
    pub preparation: Preparation,
    pub product_name: String,
    pub supplier_name: String,
    /// Total mass in the solution: batch mg_per_vial * vials_used
    pub total_mg: f64,
    pub concentration_mg_per_ml: f64,
    pub compounds: Vec<CompoundConcentration>,
    /// Active (non-deleted) administrations drawn from this preparation
    pub administrations_count: i64,
    /// Total ml consumed by active administrations
    pub ml_used: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_active() {
        let mut prep = Preparation {
            id: 1,
            batch_id: 1,
            vials_used: 2,
            volume_ml: 2.0,
            volume_remaining_ml: 0.5,
            diluent: "BAC Water".into(),
            preparation_date: "2026-02-01".into(),
            expiry_date: None,
            storage_location: None,
            notes: None,
            created_at: "2026-02-01T08:00:00Z".into(),
            deleted_at: None,
        };
        assert!(prep.is_active());

        prep.volume_remaining_ml = 0.0;
        assert!(!prep.is_active());

        prep.volume_remaining_ml = 1.0;
        prep.deleted_at = Some("2026-02-02T08:00:00Z".into());
        assert!(!prep.is_active());
    }

    #[test]
    fn test_new_preparation_defaults() {
        let input = NewPreparation::new(1, 2, 2.0, "2026-02-01");
        assert!(input.diluent.is_none());
        assert_eq!(input.volume_ml, 2.0);
    }
}
