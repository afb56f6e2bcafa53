//! Checkpoint - Save/Load Simulator State
//!
//! Serializes the live ledger of a simulator so a prediction can be stored
//! and resumed later against the same factory profile.
//!
//! # Critical Invariants
//!
//! - **Profile Matching**: a snapshot can only be restored with the profile
//!   it was taken from (SHA-256 fingerprint of the canonical profile JSON)
//! - **Dimensions**: restored arrays must fit the profile exactly
//! - **Bookmarks are transient**: open bookmarks are never part of a snapshot

use crate::core::time::Command;
use crate::models::ledger::Ledger;
use crate::models::profile::FactoryProfile;
use crate::simulator::engine::Simulator;
use crate::simulator::{FactorySimulator, SimulatorConfig, SimulatorError};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Complete simulator state snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulatorSnapshot {
    /// SHA256 hash of the profile the snapshot belongs to
    pub profile_hash: String,

    pub config: SimulatorConfig,

    pub fixed_before: usize,

    pub wallet: Vec<i64>,

    /// `[product][step]`
    pub inventory: Vec<Vec<i64>>,

    /// `[line][step]`
    pub commands: Vec<Vec<Command>>,

    /// `[line][step]`: whether the command's run effects are in the ledger
    pub modeled: Vec<Vec<bool>>,

    /// `[product][step]`
    pub reserved_inventory: Vec<Vec<i64>>,
}

impl SimulatorSnapshot {
    pub fn to_json(&self) -> Result<String, SimulatorError> {
        serde_json::to_string(self).map_err(|e| {
            SimulatorError::SerializationError(format!("Snapshot serialization failed: {}", e))
        })
    }

    pub fn from_json(json: &str) -> Result<Self, SimulatorError> {
        serde_json::from_str(json).map_err(|e| {
            SimulatorError::SerializationError(format!("Snapshot deserialization failed: {}", e))
        })
    }
}

// ============================================================================
// Profile Hashing
// ============================================================================

/// Compute deterministic SHA256 hash of a profile
///
/// Uses canonical JSON serialization with sorted keys so the hash does not
/// depend on field order.
pub fn compute_profile_hash(profile: &FactoryProfile) -> Result<String, SimulatorError> {
    use serde_json::Value;
    use std::collections::BTreeMap;

    let value = serde_json::to_value(profile).map_err(|e| {
        SimulatorError::SerializationError(format!("Profile serialization failed: {}", e))
    })?;

    fn canonicalize(value: Value) -> Value {
        match value {
            Value::Object(map) => {
                let sorted: BTreeMap<String, Value> =
                    map.into_iter().map(|(k, v)| (k, canonicalize(v))).collect();
                Value::Object(sorted.into_iter().collect())
            }
            Value::Array(arr) => Value::Array(arr.into_iter().map(canonicalize).collect()),
            other => other,
        }
    }

    let json = serde_json::to_string(&canonicalize(value)).map_err(|e| {
        SimulatorError::SerializationError(format!("Profile serialization failed: {}", e))
    })?;

    let mut hasher = Sha256::new();
    hasher.update(json.as_bytes());
    Ok(format!("{:x}", hasher.finalize()))
}

impl Simulator {
    /// Capture the live ledger, reservations and fixed horizon
    ///
    /// # Example
    /// ```
    /// use factory_simulator_core_rs::{FactoryProfile, FactorySimulator, Simulator, SimulatorConfig};
    ///
    /// let profile = FactoryProfile::uniform(2, 1, 10, 1);
    /// let mut sim = Simulator::new(profile.clone(), SimulatorConfig::with_balance(100)).unwrap();
    /// sim.pay(40, 3, true).unwrap();
    ///
    /// let snapshot = sim.checkpoint().unwrap();
    /// let restored = Simulator::from_snapshot(profile, snapshot).unwrap();
    /// assert_eq!(restored.final_balance(), 60);
    /// ```
    pub fn checkpoint(&self) -> Result<SimulatorSnapshot, SimulatorError> {
        let (wallet, inventory, commands, modeled) = self.ledger().parts();
        Ok(SimulatorSnapshot {
            profile_hash: compute_profile_hash(self.profile())?,
            config: self.config().clone(),
            fixed_before: self.fixed_before(),
            wallet: wallet.to_vec(),
            inventory: inventory.to_vec(),
            commands: commands.to_vec(),
            modeled: modeled.to_vec(),
            reserved_inventory: self.reserved_inventory().to_vec(),
        })
    }

    /// Restore a simulator from a snapshot taken with the same profile
    ///
    /// # Errors
    /// - `ProfileMismatch` if the snapshot belongs to another profile
    /// - `DimensionMismatch` if the arrays do not fit the profile
    /// - `UnknownProcess` if a command names a process the profile lacks
    pub fn from_snapshot(profile: FactoryProfile, snapshot: SimulatorSnapshot) -> Result<Self, SimulatorError> {
        let profile_hash = compute_profile_hash(&profile)?;
        if profile_hash != snapshot.profile_hash {
            return Err(SimulatorError::ProfileMismatch {
                expected: snapshot.profile_hash,
                found: profile_hash,
            });
        }

        let found = snapshot.wallet.len();
        let ledger = Ledger::from_parts(snapshot.wallet, snapshot.inventory, snapshot.commands, snapshot.modeled).ok_or(
            SimulatorError::DimensionMismatch {
                what: "snapshot ledger steps",
                expected: profile.n_steps(),
                found,
            },
        )?;
        Simulator::from_parts(
            profile,
            snapshot.config,
            ledger,
            snapshot.reserved_inventory,
            snapshot.fixed_before,
        )
    }
}
