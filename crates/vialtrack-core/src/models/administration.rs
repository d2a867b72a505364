//! Administration (dose event) models.

use serde::{Deserialize, Serialize};

/// Soft-delete state of an administration.
///
/// Only `Active` doses count against their preparation's remaining volume;
/// query paths must declare which state they want.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum DeletionState {
    Active,
    Deleted { at: String },
}

impl DeletionState {
    pub fn is_active(&self) -> bool {
        matches!(self, DeletionState::Active)
    }

    /// Build from the nullable `deleted_at` column.
    pub fn from_column(deleted_at: Option<String>) -> Self {
        match deleted_at {
            None => DeletionState::Active,
            Some(at) => DeletionState::Deleted { at },
        }
    }

    /// Column value for storage.
    pub fn as_column(&self) -> Option<&str> {
        match self {
            DeletionState::Active => None,
            DeletionState::Deleted { at } => Some(at),
        }
    }
}

/// Injection method.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum InjectionMethod {
    /// Subcutaneous
    #[default]
    SubQ,
    /// Intramuscular
    Im,
}

impl InjectionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            InjectionMethod::SubQ => "SubQ",
            InjectionMethod::Im => "IM",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "SubQ" => Some(InjectionMethod::SubQ),
            "IM" => Some(InjectionMethod::Im),
            _ => None,
        }
    }
}

/// One recorded dose drawn from a preparation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Administration {
    pub id: i64,
    /// Null after the preparation link has been severed
    pub preparation_id: Option<i64>,
    pub protocol_id: Option<i64>,
    pub administered_at: String,
    pub dose_ml: f64,
    pub injection_site: Option<String>,
    pub injection_method: InjectionMethod,
    pub notes: Option<String>,
    pub created_at: String,
    pub state: DeletionState,
}

/// Input for recording a dose against a preparation.
#[derive(Debug, Clone, Default)]
pub struct DoseEntry {
    pub ml_used: f64,
    /// Defaults to now when unset
    pub administered_at: Option<String>,
    pub injection_site: Option<String>,
    pub injection_method: InjectionMethod,
    pub notes: Option<String>,
    pub protocol_id: Option<i64>,
}

impl DoseEntry {
    pub fn of(ml_used: f64) -> Self {
        Self {
            ml_used,
            ..Default::default()
        }
    }
}

/// Result of a successful dose recording.
#[derive(Debug, Clone, PartialEq)]
pub struct DoseReceipt {
    pub administration_id: i64,
    pub volume_remaining_ml: f64,
    /// The dose drew the preparation down to zero
    pub exhausted: bool,
}

/// Sparse update for an administration; unset fields are left untouched.
///
/// Changing `dose_ml` or `preparation_id` triggers full recomputation of
/// every preparation touched, old and new.
#[derive(Debug, Clone, Default)]
pub struct AdministrationPatch {
    pub preparation_id: Option<i64>,
    pub administered_at: Option<String>,
    pub dose_ml: Option<f64>,
    pub injection_site: Option<String>,
    pub injection_method: Option<InjectionMethod>,
    pub protocol_id: Option<i64>,
    pub notes: Option<String>,
}

/// Administration log filter (active rows only).
#[derive(Debug, Clone, Default)]
pub struct AdministrationFilter {
    pub protocol_id: Option<i64>,
    pub preparation_id: Option<i64>,
    /// Only doses within the last N days
    pub days_back: Option<i64>,
}

/// Administration joined with its protocol and batch labels.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AdministrationEntry {
    pub administration: Administration,
    pub protocol_name: Option<String>,
    pub batch_id: Option<i64>,
    pub batch_product: Option<String>,
}

/// Soft-deleted administration, as listed for restore.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeletedAdministration {
    pub id: i64,
    pub administered_at: String,
    pub dose_ml: f64,
    pub deleted_at: String,
    pub batch_product: Option<String>,
    /// Comma-separated compound names from the source batch
    pub compound_names: Option<String>,
}
