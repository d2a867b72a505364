//! Export of the administration log for external analysis.

mod doses;

pub use doses::{DoseExporter, DoseLogExport, DoseRecord};
