//! Vialtrack Core Library
//!
//! Local-first compound inventory ledger with a self-healing dose log.
//!
//! # Architecture
//!
//! ```text
//! Batch (vials purchased)
//!     │  create_preparation: vials → diluted solution
//!     ▼
//! Preparation (volume_ml, volume_remaining_ml)
//!     │  use_preparation: dose drawn, log row inserted
//!     ▼
//! Administration log (soft-deletable)
//!     │
//!     └──► Reconciler: volume_remaining_ml ≡ volume_ml − Σ(active doses)
//! ```
//!
//! # Core Principle
//!
//! **The dose log is the source of truth.** A preparation's remaining
//! volume is always recomputed from its active administrations, never
//! patched with compensating arithmetic; drift from edits or out-of-band
//! changes is detected and repaired, not accumulated.
//!
//! # Modules
//!
//! - [`db`]: SQLite database layer (suppliers, compounds, batches,
//!   preparations, administrations, protocols)
//! - [`models`]: Domain types (Batch, Preparation, Administration, etc.)
//! - [`reconcile`]: Integrity audit and balance repair
//! - [`export`]: Dose log export (JSON/CSV)

pub mod db;
pub mod export;
pub mod models;
pub mod reconcile;

// Re-export commonly used types
pub use db::{Database, DatabaseStats, LedgerError, LedgerResult};
pub use export::{DoseExporter, DoseLogExport};
pub use models::{
    Administration, AdministrationFilter, Batch, BatchFilter, DeletionState, DoseEntry,
    DoseReceipt, InjectionMethod, NewBatch, NewPreparation, NewProtocol, NewSupplier, Preparation,
    Protocol, Supplier,
};
pub use reconcile::{IntegrityReport, ReconcileStats, Reconciler, VOLUME_EPSILON_ML};
