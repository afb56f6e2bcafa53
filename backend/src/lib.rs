//! Factory Simulator Core - Rust Engine
//!
//! Predictive ledger of a factory's cash, inventory and production lines over
//! a fixed planning horizon, with nested bookmarks for speculative changes.
//!
//! # Architecture
//!
//! - **core**: Step windows, line filters and slot-selection methods
//! - **models**: Domain types (FactoryProfile, Ledger)
//! - **simulator**: The simulator (payments, transport, production, bookmarks, checkpoints)
//!
//! # Critical Invariants
//!
//! 1. All money values are i64
//! 2. History before `fixed_before` never changes
//! 3. Failed operations leave the ledger untouched
//! 4. FFI boundary is minimal and safe

// Module declarations
pub mod core;
pub mod models;
pub mod simulator;

// Re-exports for convenience
pub use crate::core::time::{Command, LineFilter, ParseSlotMethodError, SlotMethod, StepWindow, NO_COMMAND};
pub use models::{
    ledger::Ledger,
    profile::{FactoryProfile, ProfileError},
};
pub use simulator::{
    temporary_transaction, transaction, BookmarkGuard, BookmarkId, FactorySimulator, ProductionSlots,
    ScheduleRequest, Simulator, SimulatorConfig, SimulatorError, SimulatorSnapshot,
};

// FFI module (when feature enabled)
#[cfg(feature = "pyo3")]
pub mod ffi;

// PyO3 exports (when feature enabled)
#[cfg(feature = "pyo3")]
use pyo3::prelude::*;

#[cfg(feature = "pyo3")]
#[pymodule]
fn factory_simulator_core_rs(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<ffi::simulator::PySimulator>()?;
    Ok(())
}
