//! polsync-execution
//!
//! - `RuleBaseAdapter`: the remote read/write capability, implemented by
//!   transports (live device, offline device, test fakes)
//! - `PlanExecutor`: applies a plan in order, halting on the first failure
//! - `RuleBaseUnit`: create/read/update/delete for one composite key
//!
//! Synchronous by construction: within a pass every write can change the
//! preconditions of the next one.

mod adapter;
mod executor;
mod unit;

pub use adapter::{RemoteError, RemoteResult, RuleBaseAdapter};
pub use executor::{ExecutionFailure, ExecutionReport, PlanExecutor};
pub use unit::{PassReport, ReconcileError, RuleBaseUnit};
