//! Simulator engine
//!
//! The one conforming implementation of [`FactorySimulator`]. It owns the
//! ledger, the reserved-inventory matrix, the fixed-history horizon and the
//! bookmark stack of a single factory.
//!
//! # Critical Invariants
//!
//! 1. No ledger cell at a step `< fixed_before` is ever changed; attempts
//!    fail with `SimulatorError::HistoryFixed`.
//! 2. Payments and transports apply to the whole suffix of the timeline.
//! 3. Every operation that reports `Ok(false)` leaves the ledger exactly as
//!    it found it.
//! 4. Reserved inventory never changes real inventory.

use crate::core::time::{Command, LineFilter, SlotMethod, StepWindow};
use crate::models::ledger::Ledger;
use crate::models::profile::FactoryProfile;
use crate::simulator::bookmark::{BookmarkId, BookmarkStack};
use crate::simulator::production::{ProductionSlots, ScheduleRequest};
use crate::simulator::{FactorySimulator, SimulatorConfig, SimulatorError};
use tracing::{debug, info};

/// Predictive ledger of one factory
///
/// # Example
/// ```
/// use factory_simulator_core_rs::{FactoryProfile, FactorySimulator, Simulator, SimulatorConfig};
///
/// let profile = FactoryProfile::uniform(10, 5, 50, 1);
/// let mut sim = Simulator::new(profile, SimulatorConfig::with_balance(1000)).unwrap();
///
/// // Buy 10 units of the raw material for 5 each, delivered at step 3
/// assert!(sim.buy(0, 10, 5, 3, false).unwrap());
/// assert_eq!(sim.wallet_at(2), 1000);
/// assert_eq!(sim.wallet_at(3), 950);
/// assert_eq!(sim.inventory_at(49)[0], 10);
/// ```
#[derive(Debug, Clone)]
pub struct Simulator {
    profile: FactoryProfile,
    config: SimulatorConfig,

    /// Stock per product at construction (zero when not configured)
    initial_inventory: Vec<i64>,

    ledger: Ledger,

    /// Bookkeeping-only deductions: `[product][step]`
    reserved_inventory: Vec<Vec<i64>>,

    /// Steps before this one are history and cannot change
    fixed_before: usize,

    bookmarks: BookmarkStack,
}

impl Simulator {
    /// Create a simulator for `profile`
    ///
    /// # Errors
    /// Fails if the profile or the config is invalid.
    pub fn new(profile: FactoryProfile, config: SimulatorConfig) -> Result<Self, SimulatorError> {
        profile.validate()?;
        config.validate(profile.n_products())?;

        let initial_inventory = config
            .initial_inventory
            .clone()
            .unwrap_or_else(|| vec![0; profile.n_products()]);
        let ledger = Ledger::new(
            profile.n_steps(),
            profile.n_lines(),
            config.initial_balance,
            &initial_inventory,
        );
        let reserved_inventory = vec![vec![0; profile.n_steps()]; profile.n_products()];

        Ok(Self {
            profile,
            config,
            initial_inventory,
            ledger,
            reserved_inventory,
            fixed_before: 0,
            bookmarks: BookmarkStack::default(),
        })
    }

    /// Rebuild a simulator around an existing ledger (used by checkpoints)
    pub(crate) fn from_parts(
        profile: FactoryProfile,
        config: SimulatorConfig,
        ledger: Ledger,
        reserved_inventory: Vec<Vec<i64>>,
        fixed_before: usize,
    ) -> Result<Self, SimulatorError> {
        let mut simulator = Self::new(profile, config)?;
        let n_steps = simulator.n_steps();
        let dims_match = ledger.n_steps() == n_steps
            && ledger.n_products() == simulator.n_products()
            && ledger.n_lines() == simulator.n_lines()
            && reserved_inventory.len() == simulator.n_products()
            && reserved_inventory.iter().all(|row| row.len() == n_steps);
        if !dims_match {
            return Err(SimulatorError::DimensionMismatch {
                what: "snapshot ledger cells",
                expected: n_steps * (1 + simulator.n_products() * 2 + simulator.n_lines()),
                found: ledger.n_steps() * (1 + ledger.n_products() + ledger.n_lines())
                    + reserved_inventory.iter().map(Vec::len).sum::<usize>(),
            });
        }
        let (_, _, commands, _) = ledger.parts();
        simulator.check_commands(commands.iter().flatten())?;
        simulator.ledger = ledger;
        simulator.reserved_inventory = reserved_inventory;
        simulator.fixed_before = fixed_before;
        Ok(simulator)
    }

    /// Drop every prediction, reservation and bookmark
    pub fn reset(&mut self) {
        self.ledger = Ledger::new(
            self.profile.n_steps(),
            self.profile.n_lines(),
            self.config.initial_balance,
            &self.initial_inventory,
        );
        self.reserved_inventory = vec![vec![0; self.n_steps()]; self.n_products()];
        self.fixed_before = 0;
        self.bookmarks.clear();
    }

    pub fn profile(&self) -> &FactoryProfile {
        &self.profile
    }

    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    /// Read-only access to the live ledger
    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub(crate) fn ledger_mut(&mut self) -> &mut Ledger {
        &mut self.ledger
    }

    pub(crate) fn reserved_inventory(&self) -> &[Vec<i64>] {
        &self.reserved_inventory
    }

    pub fn n_processes(&self) -> usize {
        self.profile.n_processes()
    }

    pub fn bankruptcy_limit(&self) -> i64 {
        self.config.bankruptcy_limit
    }

    pub fn breach_penalty(&self) -> f64 {
        self.config.breach_penalty
    }

    /// True if the projected wallet drops below the bankruptcy limit anywhere
    pub fn is_bankrupt(&self) -> bool {
        self.ledger.min_wallet() < self.config.bankruptcy_limit
    }

    /// Id of the bookmark on top of the stack
    pub fn active_bookmark(&self) -> Option<BookmarkId> {
        self.bookmarks.active()
    }

    /// Number of unresolved bookmarks
    pub fn bookmark_depth(&self) -> usize {
        self.bookmarks.depth()
    }

    // ========================================================================
    // Contract checks
    // ========================================================================

    pub(crate) fn check_step(&self, step: usize) -> Result<(), SimulatorError> {
        if step < self.fixed_before {
            return Err(SimulatorError::HistoryFixed {
                step,
                fixed_before: self.fixed_before,
            });
        }
        Ok(())
    }

    pub(crate) fn check_product(&self, product: usize) -> Result<(), SimulatorError> {
        if product >= self.n_products() {
            return Err(SimulatorError::UnknownProduct {
                product,
                n_products: self.n_products(),
            });
        }
        Ok(())
    }

    pub(crate) fn check_line(&self, line: usize) -> Result<(), SimulatorError> {
        if line >= self.n_lines() {
            return Err(SimulatorError::UnknownLine {
                line,
                n_lines: self.n_lines(),
            });
        }
        Ok(())
    }

    pub(crate) fn check_process(&self, process: usize) -> Result<(), SimulatorError> {
        if process >= self.n_processes() {
            return Err(SimulatorError::UnknownProcess {
                process,
                n_processes: self.n_processes(),
            });
        }
        Ok(())
    }

    /// Every process named in `commands` must exist
    pub(crate) fn check_commands<'a>(
        &self,
        commands: impl IntoIterator<Item = &'a Command>,
    ) -> Result<(), SimulatorError> {
        commands
            .into_iter()
            .flatten()
            .try_for_each(|&process| self.check_process(process))
    }

    pub(crate) fn check_in_horizon(&self, step: usize) -> Result<(), SimulatorError> {
        if step >= self.n_steps() {
            return Err(SimulatorError::StepOutOfHorizon {
                step,
                n_steps: self.n_steps(),
            });
        }
        Ok(())
    }
}

impl FactorySimulator for Simulator {
    fn n_steps(&self) -> usize {
        self.profile.n_steps()
    }

    fn n_lines(&self) -> usize {
        self.profile.n_lines()
    }

    fn n_products(&self) -> usize {
        self.profile.n_products()
    }

    fn initial_balance(&self) -> i64 {
        self.config.initial_balance
    }

    fn initial_inventory(&self) -> &[i64] {
        &self.initial_inventory
    }

    fn fixed_before(&self) -> usize {
        self.fixed_before
    }

    fn final_balance(&self) -> i64 {
        self.ledger
            .wallet()
            .last()
            .copied()
            .unwrap_or(self.config.initial_balance)
    }

    fn wallet_to(&self, t: usize) -> &[i64] {
        self.ledger.wallet_to(t)
    }

    fn inventory_to(&self, t: usize) -> Vec<&[i64]> {
        self.ledger.inventory_to(t)
    }

    fn reserved_inventory_to(&self, t: usize) -> Vec<&[i64]> {
        let end = t.saturating_add(1).min(self.n_steps());
        self.reserved_inventory.iter().map(|row| &row[..end]).collect()
    }

    fn line_schedules_to(&self, t: usize) -> Vec<&[Command]> {
        self.ledger.commands_to(t)
    }

    fn set_state(
        &mut self,
        t: usize,
        inventory: &[i64],
        wallet: i64,
        commands: &[Command],
    ) -> Result<(), SimulatorError> {
        self.check_step(t)?;
        self.check_in_horizon(t)?;
        if inventory.len() != self.n_products() {
            return Err(SimulatorError::DimensionMismatch {
                what: "inventory",
                expected: self.n_products(),
                found: inventory.len(),
            });
        }
        if commands.len() != self.n_lines() {
            return Err(SimulatorError::DimensionMismatch {
                what: "line commands",
                expected: self.n_lines(),
                found: commands.len(),
            });
        }
        self.check_commands(commands)?;

        for (product, &actual) in inventory.iter().enumerate() {
            let predicted = self.ledger.inventory_of(product)[t];
            self.ledger.shift_inventory(product, t, actual - predicted);
        }
        let predicted_wallet = self.ledger.wallet()[t];
        self.ledger.shift_wallet(t, wallet - predicted_wallet);
        for (line, &command) in commands.iter().enumerate() {
            self.ledger.set_command(line, t, command);
        }
        info!(
            step = t,
            wallet,
            wallet_drift = wallet - predicted_wallet,
            "state synchronized"
        );

        self.fix_before(t + 1);
        Ok(())
    }

    fn pay(&mut self, amount: i64, t: usize, ignore_money_shortage: bool) -> Result<bool, SimulatorError> {
        self.check_step(t)?;
        if !self.ledger.shift_wallet(t, -amount) {
            return Ok(false);
        }
        if ignore_money_shortage {
            return Ok(true);
        }
        let lowest = self.ledger.min_wallet_from(t).unwrap_or(i64::MAX);
        if lowest < self.config.bankruptcy_limit {
            self.ledger.shift_wallet(t, amount);
            debug!(amount, step = t, lowest, "payment rejected: money shortage");
            return Ok(false);
        }
        Ok(true)
    }

    fn transport_to(
        &mut self,
        product: usize,
        quantity: i64,
        t: usize,
        ignore_inventory_shortage: bool,
    ) -> Result<bool, SimulatorError> {
        self.check_step(t)?;
        self.check_product(product)?;
        if !self.ledger.shift_inventory(product, t, quantity) {
            return Ok(false);
        }
        if ignore_inventory_shortage {
            return Ok(true);
        }
        let lowest = self.ledger.min_inventory_from(product, t).unwrap_or(i64::MAX);
        if lowest < 0 {
            self.ledger.shift_inventory(product, t, -quantity);
            debug!(product, quantity, step = t, lowest, "transport rejected: inventory shortage");
            return Ok(false);
        }
        Ok(true)
    }

    fn buy(
        &mut self,
        product: usize,
        quantity: i64,
        price: i64,
        t: usize,
        ignore_money_shortage: bool,
    ) -> Result<bool, SimulatorError> {
        self.check_step(t)?;
        self.check_product(product)?;
        if quantity < 0 {
            return Err(SimulatorError::NegativeQuantity(quantity));
        }
        let value = trade_value(quantity, price)?;
        // pay restores the wallet itself when it fails
        if !self.pay(value, t, ignore_money_shortage)? {
            return Ok(false);
        }
        self.transport_to(product, quantity, t, true)
    }

    fn sell(
        &mut self,
        product: usize,
        quantity: i64,
        price: i64,
        t: usize,
        ignore_inventory_shortage: bool,
    ) -> Result<bool, SimulatorError> {
        self.check_step(t)?;
        self.check_product(product)?;
        if quantity < 0 {
            return Err(SimulatorError::NegativeQuantity(quantity));
        }
        let value = trade_value(quantity, price)?;
        if !self.transport_to(product, -quantity, t, ignore_inventory_shortage)? {
            return Ok(false);
        }
        self.pay(-value, t, true)
    }

    fn reserve(&mut self, product: usize, quantity: i64, t: usize) -> Result<bool, SimulatorError> {
        self.check_step(t)?;
        self.check_product(product)?;
        match self.reserved_inventory[product].get_mut(t) {
            Some(reserved) => {
                *reserved += quantity;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn available_for_production(
        &self,
        repeats: usize,
        window: StepWindow,
        line: LineFilter,
        override_commands: bool,
        method: SlotMethod,
    ) -> Result<ProductionSlots, SimulatorError> {
        self.find_production_slots(repeats, window, line, override_commands, method)
    }

    fn order_production(&mut self, process: usize, slots: &ProductionSlots) -> Result<(), SimulatorError> {
        self.write_production(process, slots)
    }

    fn schedule(&mut self, request: &ScheduleRequest) -> Result<bool, SimulatorError> {
        self.schedule_production(request)
    }

    fn fix_before(&mut self, t: usize) {
        debug!(from = self.fixed_before, to = t, "history fixed");
        self.fixed_before = t;
    }

    fn bookmark(&mut self) -> BookmarkId {
        self.bookmarks.push(self.ledger.clone())
    }

    fn rollback(&mut self, id: BookmarkId) -> Result<(), SimulatorError> {
        self.ledger = self.bookmarks.snapshot(id)?.clone();
        Ok(())
    }

    fn delete_bookmark(&mut self, id: BookmarkId) -> Result<(), SimulatorError> {
        self.bookmarks.pop(id)
    }
}

/// `quantity * price`, or an error when it does not fit in i64
fn trade_value(quantity: i64, price: i64) -> Result<i64, SimulatorError> {
    quantity
        .checked_mul(price)
        .ok_or(SimulatorError::AmountOverflow { quantity, price })
}
