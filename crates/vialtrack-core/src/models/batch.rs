//! Batch (purchased lot) models.

use serde::{Deserialize, Serialize};

/// A purchased lot of one or more compounds, tracked by vial count.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Batch {
    pub id: i64,
    pub supplier_id: i64,
    pub product_name: String,
    pub batch_number: Option<String>,
    /// Nominal number of vials purchased (immutable under normal flow)
    pub vials_count: i64,
    /// Nominal mass per vial, summed over the composition
    pub mg_per_vial: f64,
    /// Vials still in stock; decremented as preparations draw from the lot
    pub vials_remaining: i64,
    pub total_price: Option<f64>,
    pub currency: String,
    pub purchase_date: Option<String>,
    pub expiry_date: Option<String>,
    pub storage_location: Option<String>,
    pub notes: Option<String>,
    pub created_at: String,
}

impl Batch {
    /// Purchase price divided over the nominal vial count.
    pub fn price_per_vial(&self) -> Option<f64> {
        self.total_price.map(|p| p / self.vials_count as f64)
    }

    /// Whether the lot still has vials in stock.
    pub fn is_available(&self) -> bool {
        self.vials_remaining > 0
    }

    /// Residual purchase value of the vials still in stock.
    pub fn remaining_value(&self) -> Option<f64> {
        self.price_per_vial()
            .map(|ppv| ppv * self.vials_remaining as f64)
    }
}

/// One compound and its per-vial mass within a batch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompositionEntry {
    pub compound_id: i64,
    pub compound_name: String,
    pub mg_per_vial: f64,
}

/// Input for creating a batch.
///
/// Composition names compounds by name; unknown names are added to the
/// catalog automatically.
#[derive(Debug, Clone)]
pub struct NewBatch {
    pub supplier: String,
    pub product_name: String,
    pub vials_count: i64,
    pub mg_per_vial: f64,
    /// (compound name, mg per vial) pairs
    pub composition: Vec<(String, f64)>,
    pub total_price: Option<f64>,
    pub currency: String,
    pub purchase_date: Option<String>,
    pub expiry_date: Option<String>,
    pub batch_number: Option<String>,
    pub storage_location: Option<String>,
    pub notes: Option<String>,
}

impl NewBatch {
    /// Create a batch input with required fields; the rest default to empty.
    pub fn new(
        supplier: impl Into<String>,
        product_name: impl Into<String>,
        vials_count: i64,
        mg_per_vial: f64,
        composition: Vec<(String, f64)>,
    ) -> Self {
        Self {
            supplier: supplier.into(),
            product_name: product_name.into(),
            vials_count,
            mg_per_vial,
            composition,
            total_price: None,
            currency: "EUR".to_string(),
            purchase_date: None,
            expiry_date: None,
            batch_number: None,
            storage_location: None,
            notes: None,
        }
    }
}

/// Replacement composition row for [`BatchPatch`].
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentAmount {
    pub compound_id: i64,
    pub mg_per_vial: f64,
}

/// Sparse update for a batch; unset fields are left untouched.
///
/// Setting `composition` replaces every composition row and recomputes the
/// batch's nominal `mg_per_vial` as the sum of component masses.
#[derive(Debug, Clone, Default)]
pub struct BatchPatch {
    pub product_name: Option<String>,
    pub batch_number: Option<String>,
    pub expiry_date: Option<String>,
    pub storage_location: Option<String>,
    pub notes: Option<String>,
    pub vials_remaining: Option<i64>,
    pub supplier_id: Option<i64>,
    pub vials_count: Option<i64>,
    pub total_price: Option<f64>,
    pub purchase_date: Option<String>,
    pub mg_per_vial: Option<f64>,
    pub composition: Option<Vec<ComponentAmount>>,
}

/// Batch list filter.
#[derive(Debug, Clone, Default)]
pub struct BatchFilter {
    /// Supplier name substring
    pub supplier: Option<String>,
    /// Compound name substring (matched against the composition)
    pub compound: Option<String>,
    /// Only lots with vials remaining
    pub only_available: bool,
}

/// Full batch record with joined supplier info and children.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BatchDetails {
    pub batch: Batch,
    pub supplier_name: String,
    pub supplier_country: Option<String>,
    pub composition: Vec<CompositionEntry>,
    pub preparations: Vec<crate::models::Preparation>,
}

/// Inventory-wide rollup.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InventorySummary {
    pub total_batches: i64,
    pub available_batches: i64,
    /// Residual purchase value of all vials still in stock
    pub total_value: f64,
    /// Distinct compounds present in available lots
    pub unique_compounds: i64,
    /// Available lots expiring within 60 days
    pub expiring_soon: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_batch() -> Batch {
        Batch {
            id: 1,
            supplier_id: 1,
            product_name: "BPC-157 10mg".into(),
            batch_number: Some("LOT-42".into()),
            vials_count: 10,
            mg_per_vial: 10.0,
            vials_remaining: 4,
            total_price: Some(120.0),
            currency: "EUR".into(),
            purchase_date: Some("2026-01-10".into()),
            expiry_date: None,
            storage_location: None,
            notes: None,
            created_at: "2026-01-10T12:00:00Z".into(),
        }
    }

    #[test]
    fn test_price_per_vial() {
        let batch = make_batch();
        assert_eq!(batch.price_per_vial(), Some(12.0));
        assert_eq!(batch.remaining_value(), Some(48.0));
    }

    #[test]
    fn test_availability() {
        let mut batch = make_batch();
        assert!(batch.is_available());
        batch.vials_remaining = 0;
        assert!(!batch.is_available());
    }

    #[test]
    fn test_new_batch_defaults() {
        let input = NewBatch::new("Acme", "Blend", 5, 10.0, vec![("BPC-157".into(), 10.0)]);
        assert_eq!(input.currency, "EUR");
        assert!(input.total_price.is_none());
    }
}
