//! Supplier and compound catalog models.

use serde::{Deserialize, Serialize};

/// A supplier of purchased lots.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Supplier {
    pub id: i64,
    pub name: String,
    pub country: Option<String>,
    pub website: Option<String>,
    pub email: Option<String>,
    pub notes: Option<String>,
    /// Subjective 1-5 reliability rating
    pub reliability_rating: Option<i64>,
    pub created_at: String,
}

/// Input for creating a supplier.
#[derive(Debug, Clone, Default)]
pub struct NewSupplier {
    pub name: String,
    pub country: Option<String>,
    pub website: Option<String>,
    pub email: Option<String>,
    pub notes: Option<String>,
    pub reliability_rating: Option<i64>,
}

impl NewSupplier {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

/// Sparse update for a supplier; unset fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct SupplierPatch {
    pub name: Option<String>,
    pub country: Option<String>,
    pub website: Option<String>,
    pub email: Option<String>,
    pub notes: Option<String>,
    pub reliability_rating: Option<i64>,
}

/// A compound in the catalog.
///
/// Compounds are auto-created when a batch composition or protocol names
/// one that does not yet exist.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Compound {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub common_uses: Option<String>,
    pub notes: Option<String>,
    pub created_at: String,
}

/// Input for creating a compound.
#[derive(Debug, Clone, Default)]
pub struct NewCompound {
    pub name: String,
    pub description: Option<String>,
    pub common_uses: Option<String>,
    pub notes: Option<String>,
}

impl NewCompound {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

/// Sparse update for a compound.
#[derive(Debug, Clone, Default)]
pub struct CompoundPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub common_uses: Option<String>,
    pub notes: Option<String>,
}
