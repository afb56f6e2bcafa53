//! Python bindings (PyO3)

pub mod simulator;
pub mod types;
