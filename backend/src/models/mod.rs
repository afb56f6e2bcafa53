//! Domain models for the factory simulator

pub mod ledger;
pub mod profile;

// Re-exports
pub use ledger::Ledger;
pub use profile::{FactoryProfile, ProfileError};
