//! Domain models for the vialtrack ledger.

mod administration;
mod batch;
mod catalog;
mod preparation;
mod protocol;

pub use administration::*;
pub use batch::*;
pub use catalog::*;
pub use preparation::*;
pub use protocol::*;
