//! Time-series ledger
//!
//! Holds the predicted state of a factory at every step of the horizon:
//! - `wallet[step]`: cash balance (i64)
//! - `inventory[product][step]`: stored quantity of each product
//! - `commands[line][step]`: process running on each line, if any
//! - `modeled[line][step]`: whether that command's run effects (input used,
//!   output made, cost paid) are part of the wallet and inventory
//!
//! # Critical Invariants
//!
//! - **Suffix semantics**: a change to the wallet or inventory at step `t`
//!   persists for every step `>= t`. Ledger arithmetic is always applied to
//!   the whole suffix.
//! - **Command locality**: a command cell describes only its own step.
//! - **Effect tracking**: a cell is marked modeled only by `place_run`; any
//!   direct command write clears the mark. Only modeled runs are reverted
//!   when a cell is overridden.
//! - **Value type**: a `Ledger` owns all of its arrays. Cloning it produces a
//!   fully independent snapshot, which is what bookmarks rely on.

use crate::core::time::{Command, NO_COMMAND};
use serde::{Deserialize, Serialize};

/// Predicted wallet, inventory and line commands over the horizon
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ledger {
    wallet: Vec<i64>,
    inventory: Vec<Vec<i64>>,
    commands: Vec<Vec<Command>>,
    modeled: Vec<Vec<bool>>,
}

/// Exclusive end of the prefix `[0, t]`, clipped to the horizon
fn prefix_end(t: usize, n_steps: usize) -> usize {
    t.saturating_add(1).min(n_steps)
}

impl Ledger {
    /// Create a ledger with a flat wallet, flat inventory and idle lines
    ///
    /// # Panics
    /// Panics if `n_steps` is zero.
    pub fn new(n_steps: usize, n_lines: usize, initial_balance: i64, initial_inventory: &[i64]) -> Self {
        assert!(n_steps > 0, "n_steps must be positive");
        Self {
            wallet: vec![initial_balance; n_steps],
            inventory: initial_inventory
                .iter()
                .map(|&quantity| vec![quantity; n_steps])
                .collect(),
            commands: vec![vec![NO_COMMAND; n_steps]; n_lines],
            modeled: vec![vec![false; n_steps]; n_lines],
        }
    }

    /// Rebuild a ledger from raw arrays, checking that they agree on sizes
    pub(crate) fn from_parts(
        wallet: Vec<i64>,
        inventory: Vec<Vec<i64>>,
        commands: Vec<Vec<Command>>,
        modeled: Vec<Vec<bool>>,
    ) -> Option<Self> {
        let n_steps = wallet.len();
        let rectangular = n_steps > 0
            && inventory.iter().all(|row| row.len() == n_steps)
            && commands.iter().all(|row| row.len() == n_steps)
            && modeled.len() == commands.len()
            && modeled.iter().all(|row| row.len() == n_steps);
        rectangular.then_some(Self {
            wallet,
            inventory,
            commands,
            modeled,
        })
    }

    pub fn n_steps(&self) -> usize {
        self.wallet.len()
    }

    pub fn n_products(&self) -> usize {
        self.inventory.len()
    }

    pub fn n_lines(&self) -> usize {
        self.commands.len()
    }

    // ========================================================================
    // Read views
    // ========================================================================

    /// Whole wallet series
    pub fn wallet(&self) -> &[i64] {
        &self.wallet
    }

    /// Wallet from step 0 up to and including `t`
    pub fn wallet_to(&self, t: usize) -> &[i64] {
        &self.wallet[..prefix_end(t, self.n_steps())]
    }

    /// Inventory series of one product
    pub fn inventory_of(&self, product: usize) -> &[i64] {
        &self.inventory[product]
    }

    /// Per-product inventory rows up to and including `t`
    pub fn inventory_to(&self, t: usize) -> Vec<&[i64]> {
        let end = prefix_end(t, self.n_steps());
        self.inventory.iter().map(|row| &row[..end]).collect()
    }

    /// Per-line command rows up to and including `t`
    pub fn commands_to(&self, t: usize) -> Vec<&[Command]> {
        let end = prefix_end(t, self.n_steps());
        self.commands.iter().map(|row| &row[..end]).collect()
    }

    /// Command of every line at step `t`
    pub fn commands_at(&self, t: usize) -> Vec<Command> {
        let t = t.min(self.n_steps() - 1);
        self.commands.iter().map(|row| row[t]).collect()
    }

    /// Command of one line at one step
    pub fn command(&self, line: usize, step: usize) -> Command {
        self.commands[line][step]
    }

    /// Lowest wallet value anywhere in the horizon
    pub fn min_wallet(&self) -> i64 {
        self.wallet.iter().copied().min().unwrap_or(0)
    }

    /// Lowest wallet value at or after step `t`
    pub fn min_wallet_from(&self, t: usize) -> Option<i64> {
        self.wallet.get(t..)?.iter().copied().min()
    }

    /// Lowest inventory of `product` at or after step `t`
    pub fn min_inventory_from(&self, product: usize, t: usize) -> Option<i64> {
        self.inventory[product].get(t..)?.iter().copied().min()
    }

    // ========================================================================
    // Mutation (no history checks here; the simulator owns those)
    // ========================================================================

    /// Add `delta` to the wallet at every step `>= t`
    ///
    /// Returns `false` (and changes nothing) if `t` is beyond the horizon.
    pub fn shift_wallet(&mut self, t: usize, delta: i64) -> bool {
        match self.wallet.get_mut(t..) {
            Some(suffix) if !suffix.is_empty() => {
                suffix.iter_mut().for_each(|balance| *balance += delta);
                true
            }
            _ => false,
        }
    }

    /// Add `delta` to the inventory of `product` at every step `>= t`
    ///
    /// Returns `false` (and changes nothing) if `t` is beyond the horizon.
    pub fn shift_inventory(&mut self, product: usize, t: usize, delta: i64) -> bool {
        match self.inventory[product].get_mut(t..) {
            Some(suffix) if !suffix.is_empty() => {
                suffix.iter_mut().for_each(|quantity| *quantity += delta);
                true
            }
            _ => false,
        }
    }

    /// Whether the run at (line, step) has its effects in wallet and inventory
    pub fn is_modeled(&self, line: usize, step: usize) -> bool {
        self.modeled[line][step]
    }

    /// Overwrite one command cell without any run effects, returning what
    /// was there
    pub fn set_command(&mut self, line: usize, step: usize, command: Command) -> Command {
        self.modeled[line][step] = false;
        std::mem::replace(&mut self.commands[line][step], command)
    }

    /// Put `process` on (line, step) as a run whose effects the caller
    /// applies
    ///
    /// Returns the process replaced there if its effects had been applied
    /// and now need reverting.
    pub fn place_run(&mut self, line: usize, step: usize, process: usize) -> Option<usize> {
        let was_modeled = std::mem::replace(&mut self.modeled[line][step], true);
        let previous = std::mem::replace(&mut self.commands[line][step], Some(process));
        previous.filter(|_| was_modeled)
    }

    /// Raw arrays, for snapshots
    pub(crate) fn parts(&self) -> (&[i64], &[Vec<i64>], &[Vec<Command>], &[Vec<bool>]) {
        (&self.wallet, &self.inventory, &self.commands, &self.modeled)
    }
}
