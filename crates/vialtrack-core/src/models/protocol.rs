//! Protocol (dosing schedule) models.
//!
//! Protocols are a label/aggregation construct; they never take part in
//! volume bookkeeping.

use serde::{Deserialize, Serialize};

/// A named dosing schedule.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Protocol {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub dose_ml: f64,
    pub frequency_per_day: i64,
    pub days_on: Option<i64>,
    pub days_off: i64,
    pub cycle_duration_weeks: Option<i64>,
    pub notes: Option<String>,
    /// Deactivated protocols are considered finalized; administration
    /// linkage under them is locked
    pub active: bool,
    pub created_at: String,
}

/// Input for creating a protocol.
#[derive(Debug, Clone)]
pub struct NewProtocol {
    pub name: String,
    pub dose_ml: f64,
    pub frequency_per_day: i64,
    pub days_on: Option<i64>,
    pub days_off: i64,
    pub cycle_duration_weeks: Option<i64>,
    /// (compound name, target dose in mcg) pairs; unknown names are added
    /// to the catalog automatically
    pub compounds: Vec<(String, f64)>,
    pub description: Option<String>,
    pub notes: Option<String>,
}

impl NewProtocol {
    pub fn new(name: impl Into<String>, dose_ml: f64) -> Self {
        Self {
            name: name.into(),
            dose_ml,
            frequency_per_day: 1,
            days_on: None,
            days_off: 0,
            cycle_duration_weeks: None,
            compounds: Vec::new(),
            description: None,
            notes: None,
        }
    }
}

/// Sparse update for a protocol; unset fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct ProtocolPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub dose_ml: Option<f64>,
    pub frequency_per_day: Option<i64>,
    pub days_on: Option<i64>,
    pub days_off: Option<i64>,
    pub cycle_duration_weeks: Option<i64>,
    pub notes: Option<String>,
    pub active: Option<bool>,
}

/// Compound target within a protocol.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProtocolCompound {
    pub compound_id: i64,
    pub compound_name: String,
    pub target_dose_mcg: Option<f64>,
}

/// Full protocol record with compound targets and dose rollup.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProtocolDetails {
    pub protocol: Protocol,
    pub compounds: Vec<ProtocolCompound>,
    pub administrations_count: i64,
    pub first_administration: Option<String>,
    pub last_administration: Option<String>,
}

/// Adherence statistics for a protocol.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProtocolStatistics {
    pub total_administrations: i64,
    pub total_ml_used: f64,
    pub first_date: Option<String>,
    pub last_date: Option<String>,
    /// Distinct calendar days with at least one dose
    pub days_active: i64,
    /// Calendar span from first to last dose, inclusive
    pub days_elapsed: i64,
    /// days_elapsed * frequency_per_day
    pub expected_administrations: i64,
    pub adherence_percentage: f64,
}
