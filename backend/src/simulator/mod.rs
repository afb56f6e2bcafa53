//! Factory simulator
//!
//! Predicts a factory's cash balance, inventory and line occupancy over the
//! planning horizon, and lets callers tentatively commit buy/sell/production
//! actions, explore "what-if" futures and roll speculative changes back.
//!
//! # Failure Classes
//!
//! - **Logic violations** (`Err(SimulatorError)`): touching a step before
//!   `fixed_before`, resolving a bookmark that is not on top of the stack,
//!   addressing an unknown product/line/process.
//! - **Infeasibility** (`Ok(false)`): not enough money, stock or free
//!   production slots, or a step beyond the horizon. The ledger is unchanged
//!   whenever an operation reports `Ok(false)`.
//!
//! See `engine.rs` for the concrete implementation.

pub mod bookmark;
pub mod checkpoint;
pub mod engine;
pub mod production;

use crate::core::time::{Command, LineFilter, SlotMethod, StepWindow};
use crate::models::profile::ProfileError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use bookmark::{temporary_transaction, transaction, BookmarkGuard, BookmarkId};
pub use checkpoint::SimulatorSnapshot;
pub use engine::Simulator;
pub use production::{ProductionSlots, ScheduleRequest};

/// Errors signalling a broken caller contract
#[derive(Debug, Error, PartialEq)]
pub enum SimulatorError {
    #[error("Cannot change step {step}: history is fixed before step {fixed_before}")]
    HistoryFixed { step: usize, fixed_before: usize },

    #[error("Bookmark {requested} is not the active bookmark (active: {active:?})")]
    BookmarkNotActive {
        requested: BookmarkId,
        active: Option<BookmarkId>,
    },

    #[error("Unknown product {product} (factory has {n_products})")]
    UnknownProduct { product: usize, n_products: usize },

    #[error("Unknown line {line} (factory has {n_lines})")]
    UnknownLine { line: usize, n_lines: usize },

    #[error("Unknown process {process} (factory has {n_processes})")]
    UnknownProcess { process: usize, n_processes: usize },

    #[error("Step {step} is outside the horizon of {n_steps} steps")]
    StepOutOfHorizon { step: usize, n_steps: usize },

    #[error("Expected {expected} values for {what}, got {found}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("Quantity must be non-negative, got {0}")]
    NegativeQuantity(i64),

    #[error("Trade value overflows: {quantity} units at {price}")]
    AmountOverflow { quantity: i64, price: i64 },

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Invalid profile: {0}")]
    InvalidProfile(#[from] ProfileError),

    #[error("Snapshot was taken for profile {expected}, not {found}")]
    ProfileMismatch { expected: String, found: String },

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

/// Construction parameters for a simulator
///
/// # Example
/// ```
/// use factory_simulator_core_rs::SimulatorConfig;
///
/// let config: SimulatorConfig =
///     serde_json::from_str(r#"{"initial_balance": 1000, "bankruptcy_limit": -500}"#).unwrap();
/// assert_eq!(config.initial_balance, 1000);
/// assert!(config.initial_inventory.is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    /// Cash in the wallet at every step before anything happens
    pub initial_balance: i64,

    /// Stock of each product at every step; `None` means all zero
    pub initial_inventory: Option<Vec<i64>>,

    /// A wallet below this value anywhere in the horizon means bankruptcy
    pub bankruptcy_limit: i64,

    /// Penalty rate applied to breached contracts
    pub breach_penalty: f64,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            initial_balance: 0,
            initial_inventory: None,
            bankruptcy_limit: 0,
            breach_penalty: 0.0,
        }
    }
}

impl SimulatorConfig {
    /// Config with the given opening balance and defaults elsewhere
    pub fn with_balance(initial_balance: i64) -> Self {
        Self {
            initial_balance,
            ..Self::default()
        }
    }

    /// Check the config against the number of products in the profile
    pub fn validate(&self, n_products: usize) -> Result<(), SimulatorError> {
        if !self.breach_penalty.is_finite() || self.breach_penalty < 0.0 {
            return Err(SimulatorError::InvalidConfig(format!(
                "breach_penalty must be finite and non-negative, got {}",
                self.breach_penalty
            )));
        }
        if let Some(inventory) = &self.initial_inventory {
            if inventory.len() != n_products {
                return Err(SimulatorError::InvalidConfig(format!(
                    "initial_inventory has {} entries, factory has {} products",
                    inventory.len(),
                    n_products
                )));
            }
        }
        Ok(())
    }
}

/// Capability interface of a factory simulator
///
/// Implementors provide the ledger reads and mutators; the derived reads
/// (`*_at`, totals, availability, balance aliases) come for free.
pub trait FactorySimulator {
    // ------------------------------------------------------------------
    // Fixed properties
    // ------------------------------------------------------------------

    /// Number of steps predicted ahead
    fn n_steps(&self) -> usize;

    fn n_lines(&self) -> usize;

    fn n_products(&self) -> usize;

    fn initial_balance(&self) -> i64;

    fn initial_inventory(&self) -> &[i64];

    /// First step that may still be changed
    fn fixed_before(&self) -> usize;

    /// Wallet at the end of the horizon given everything scheduled so far
    fn final_balance(&self) -> i64;

    // ------------------------------------------------------------------
    // Ledger reads
    // ------------------------------------------------------------------

    /// Wallet from step 0 up to and including `t`
    fn wallet_to(&self, t: usize) -> &[i64];

    /// Per-product inventory rows up to and including `t`
    fn inventory_to(&self, t: usize) -> Vec<&[i64]>;

    /// Per-product reserved quantities up to and including `t`
    fn reserved_inventory_to(&self, t: usize) -> Vec<&[i64]>;

    /// Per-line commands up to and including `t`
    fn line_schedules_to(&self, t: usize) -> Vec<&[Command]>;

    fn wallet_at(&self, t: usize) -> i64 {
        self.wallet_to(t)
            .last()
            .copied()
            .unwrap_or_else(|| self.initial_balance())
    }

    fn inventory_at(&self, t: usize) -> Vec<i64> {
        last_column(&self.inventory_to(t))
    }

    fn reserved_inventory_at(&self, t: usize) -> Vec<i64> {
        last_column(&self.reserved_inventory_to(t))
    }

    fn line_schedules_at(&self, t: usize) -> Vec<Command> {
        self.line_schedules_to(t)
            .iter()
            .map(|row| row.last().copied().flatten())
            .collect()
    }

    /// Total stored quantity (all products) at each step up to `t`
    fn total_inventory_to(&self, t: usize) -> Vec<i64> {
        let rows = self.inventory_to(t);
        let len = rows.first().map_or(0, |row| row.len());
        (0..len).map(|step| rows.iter().map(|row| row[step]).sum()).collect()
    }

    fn total_inventory_at(&self, t: usize) -> i64 {
        self.inventory_at(t).iter().sum()
    }

    /// Inventory minus reservations, per product, at each step up to `t`
    fn available_inventory_to(&self, t: usize) -> Vec<Vec<i64>> {
        self.inventory_to(t)
            .iter()
            .zip(self.reserved_inventory_to(t))
            .map(|(stored, reserved)| stored.iter().zip(reserved).map(|(s, r)| s - r).collect())
            .collect()
    }

    fn available_inventory_at(&self, t: usize) -> Vec<i64> {
        self.inventory_at(t)
            .iter()
            .zip(self.reserved_inventory_at(t))
            .map(|(stored, reserved)| stored - reserved)
            .collect()
    }

    /// Same as `wallet_at`
    fn balance_at(&self, t: usize) -> i64 {
        self.wallet_at(t)
    }

    /// Same as `wallet_to`
    fn balance_to(&self, t: usize) -> &[i64] {
        self.wallet_to(t)
    }

    // ------------------------------------------------------------------
    // Mutators
    // ------------------------------------------------------------------

    /// Overwrite the state at step `t` with ground truth, then fix history
    /// before `t + 1`
    fn set_state(
        &mut self,
        t: usize,
        inventory: &[i64],
        wallet: i64,
        commands: &[Command],
    ) -> Result<(), SimulatorError>;

    /// Pay `amount` at step `t` (the balance drops from `t` onward)
    fn pay(&mut self, amount: i64, t: usize, ignore_money_shortage: bool) -> Result<bool, SimulatorError>;

    /// Receive `amount` at step `t`
    fn receive(&mut self, amount: i64, t: usize) -> Result<bool, SimulatorError> {
        self.pay(-amount, t, true)
    }

    /// Move `quantity` of `product` into (positive) or out of (negative)
    /// inventory at step `t`
    fn transport_to(
        &mut self,
        product: usize,
        quantity: i64,
        t: usize,
        ignore_inventory_shortage: bool,
    ) -> Result<bool, SimulatorError>;

    /// Buy `quantity` units of `product` at `price` each, delivered at `t`
    fn buy(
        &mut self,
        product: usize,
        quantity: i64,
        price: i64,
        t: usize,
        ignore_money_shortage: bool,
    ) -> Result<bool, SimulatorError>;

    /// Sell `quantity` units of `product` at `price` each, delivered at `t`
    fn sell(
        &mut self,
        product: usize,
        quantity: i64,
        price: i64,
        t: usize,
        ignore_inventory_shortage: bool,
    ) -> Result<bool, SimulatorError>;

    /// Mark `quantity` of `product` as reserved at step `t`
    fn reserve(&mut self, product: usize, quantity: i64, t: usize) -> Result<bool, SimulatorError>;

    /// Find (step, line) cells where `repeats` runs could be ordered
    ///
    /// Slots lie strictly after `fixed_before`. The result is empty when
    /// fewer than `repeats` candidates exist.
    fn available_for_production(
        &self,
        repeats: usize,
        window: StepWindow,
        line: LineFilter,
        override_commands: bool,
        method: SlotMethod,
    ) -> Result<ProductionSlots, SimulatorError>;

    /// Write `process` into precomputed slots, with no money or stock effect
    fn order_production(&mut self, process: usize, slots: &ProductionSlots) -> Result<(), SimulatorError>;

    /// Atomically order `request.quantity` runs of a process
    fn schedule(&mut self, request: &ScheduleRequest) -> Result<bool, SimulatorError>;

    /// Forbid any change before step `t`
    fn fix_before(&mut self, t: usize);

    // ------------------------------------------------------------------
    // History management
    // ------------------------------------------------------------------

    /// Snapshot the ledger and push it on the bookmark stack
    fn bookmark(&mut self) -> BookmarkId;

    /// Restore the ledger to the active bookmark (which stays on the stack)
    fn rollback(&mut self, id: BookmarkId) -> Result<(), SimulatorError>;

    /// Pop the active bookmark, keeping every change made since
    fn delete_bookmark(&mut self, id: BookmarkId) -> Result<(), SimulatorError>;
}

fn last_column(rows: &[&[i64]]) -> Vec<i64> {
    rows.iter().map(|row| row.last().copied().unwrap_or(0)).collect()
}
