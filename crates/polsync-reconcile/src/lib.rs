//! polsync-reconcile
//!
//! Diff engine: declared rule list + remote rule list -> ordered plan.
//!
//! - rules only on the remote side are deleted
//! - rules only on the declared side are created after their declared predecessor
//! - rules on both sides with different fields are updated
//! - rules off the longest already-ordered run are moved, one pass, left to right
//!
//! Deterministic, pure logic. No IO. No device calls.

mod engine;
mod order;
mod simulate;
mod types;

pub use engine::{diff, diff_with, field_changes, is_converged};
pub use simulate::{simulate, SimulationError};
pub use types::*;
