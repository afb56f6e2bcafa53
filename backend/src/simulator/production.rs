//! Production slot search and scheduling
//!
//! A production slot is one (step, line) cell of the command ledger. Slot
//! search is a pure query; scheduling composes it with payments and inventory
//! transformation inside a bookmark so that an order for `quantity` runs is
//! either fully reflected in the ledger or not at all.
//!
//! # Critical Invariants
//!
//! - **Future only**: slots are never offered at or before `fixed_before`.
//! - **All or nothing**: `schedule` commits exactly `quantity` runs or leaves
//!   commands, inventory and wallet untouched.
//! - **Chronological order**: candidates are ordered by step, then by line.

use crate::core::time::{LineFilter, SlotMethod, StepWindow};
use crate::simulator::bookmark::{temporary_transaction, transaction};
use crate::simulator::engine::Simulator;
use crate::simulator::{FactorySimulator, SimulatorError};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Paired step/line coordinates of production slots
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductionSlots {
    steps: Vec<usize>,
    lines: Vec<usize>,
}

impl ProductionSlots {
    /// No slots (the request cannot be satisfied)
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn steps(&self) -> &[usize] {
        &self.steps
    }

    pub fn lines(&self) -> &[usize] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// `(step, line)` pairs
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.steps.iter().copied().zip(self.lines.iter().copied())
    }
}

impl FromIterator<(usize, usize)> for ProductionSlots {
    fn from_iter<I: IntoIterator<Item = (usize, usize)>>(iter: I) -> Self {
        let (steps, lines) = iter.into_iter().unzip();
        Self { steps, lines }
    }
}

fn default_true() -> bool {
    true
}

/// An order for `quantity` runs of `process`
///
/// # Example
/// ```
/// use factory_simulator_core_rs::{ScheduleRequest, SlotMethod, StepWindow};
///
/// let request = ScheduleRequest::new(0, 3)
///     .in_window(StepWindow::Between(5, 10))
///     .with_method(SlotMethod::Earliest)
///     .check_money();
/// assert!(request.override_commands);
/// assert!(!request.ignore_money_shortage);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleRequest {
    pub process: usize,
    pub quantity: usize,

    #[serde(default)]
    pub window: StepWindow,

    #[serde(default)]
    pub line: LineFilter,

    /// Whether runs may replace commands already on the ledger
    #[serde(default = "default_true")]
    pub override_commands: bool,

    /// Order in which candidate slots are tried
    #[serde(default)]
    pub method: SlotMethod,

    #[serde(default = "default_true")]
    pub ignore_inventory_shortage: bool,

    #[serde(default = "default_true")]
    pub ignore_money_shortage: bool,
}

impl ScheduleRequest {
    /// Request with the default window, line, override and shortage settings
    pub fn new(process: usize, quantity: usize) -> Self {
        Self {
            process,
            quantity,
            window: StepWindow::Any,
            line: LineFilter::Any,
            override_commands: true,
            method: SlotMethod::Latest,
            ignore_inventory_shortage: true,
            ignore_money_shortage: true,
        }
    }

    pub fn in_window(mut self, window: impl Into<StepWindow>) -> Self {
        self.window = window.into();
        self
    }

    pub fn on_line(mut self, line: impl Into<LineFilter>) -> Self {
        self.line = line.into();
        self
    }

    pub fn with_override(mut self, override_commands: bool) -> Self {
        self.override_commands = override_commands;
        self
    }

    pub fn with_method(mut self, method: SlotMethod) -> Self {
        self.method = method;
        self
    }

    /// Require one unit of input stock at each run's step
    pub fn check_inventory(mut self) -> Self {
        self.ignore_inventory_shortage = false;
        self
    }

    /// Require enough money for each run
    pub fn check_money(mut self) -> Self {
        self.ignore_money_shortage = false;
        self
    }
}

impl Simulator {
    /// Find (step, line) cells where production can be ordered
    ///
    /// The window is clipped to `[fixed_before + 1, n_steps)`. Candidates are
    /// idle cells, or every cell when `override_commands` is set. If fewer
    /// than `repeats` candidates exist the result is empty; otherwise
    /// `Earliest`/`Latest` pick `repeats` cells from the start/end of the
    /// chronological candidate list and `All` returns every candidate.
    ///
    /// # Errors
    /// Fails only if `line` names a line the factory does not have.
    pub(crate) fn find_production_slots(
        &self,
        repeats: usize,
        window: StepWindow,
        line: LineFilter,
        override_commands: bool,
        method: SlotMethod,
    ) -> Result<ProductionSlots, SimulatorError> {
        if let LineFilter::Line(only) = line {
            self.check_line(only)?;
        }
        let Some(steps) = window.normalize(self.fixed_before() + 1, self.n_steps()) else {
            return Ok(ProductionSlots::empty());
        };

        let ledger = self.ledger();
        let mut candidates: Vec<(usize, usize)> = steps
            .flat_map(|step| (0..self.n_lines()).map(move |l| (step, l)))
            .filter(|&(_, l)| line.accepts(l))
            .filter(|&(step, l)| override_commands || ledger.command(l, step).is_none())
            .collect();

        if candidates.len() < repeats {
            return Ok(ProductionSlots::empty());
        }
        match method {
            SlotMethod::Earliest => candidates.truncate(repeats),
            SlotMethod::Latest => {
                candidates.drain(..candidates.len() - repeats);
            }
            SlotMethod::All => {}
        }
        Ok(candidates.into_iter().collect())
    }

    /// Write `process` into the given slots without any other ledger effect
    ///
    /// Meant for slot assignments obtained from `available_for_production`.
    /// Every slot is validated before anything is written. The cells carry
    /// no run effects, so a later override has nothing to revert.
    pub(crate) fn write_production(&mut self, process: usize, slots: &ProductionSlots) -> Result<(), SimulatorError> {
        self.check_process(process)?;
        for (step, line) in slots.iter() {
            self.check_step(step)?;
            self.check_in_horizon(step)?;
            self.check_line(line)?;
        }
        for (step, line) in slots.iter() {
            self.ledger_mut().set_command(line, step, Some(process));
        }
        Ok(())
    }

    pub(crate) fn schedule_production(&mut self, request: &ScheduleRequest) -> Result<bool, SimulatorError> {
        let process = request.process;
        let quantity = request.quantity;
        self.check_process(process)?;
        if quantity == 0 {
            return Ok(true);
        }

        let candidates = self.find_production_slots(
            quantity,
            request.window,
            request.line,
            request.override_commands,
            SlotMethod::All,
        )?;
        // Re-ordering a cell that already runs this process adds nothing
        let mut slots: Vec<(usize, usize)> = candidates
            .iter()
            .filter(|&(step, line)| self.ledger().command(line, step) != Some(process))
            .collect();
        if slots.len() < quantity {
            debug!(process, quantity, available = slots.len(), "schedule rejected: not enough slots");
            return Ok(false);
        }
        if request.method == SlotMethod::Latest {
            slots.reverse();
        }

        let start = slots.iter().map(|&(step, _)| step).min().unwrap_or(0);
        let cheapest = slots
            .iter()
            .map(|&(_, line)| self.profile().cost(line, process))
            .min()
            .unwrap_or(0);
        if !request.ignore_money_shortage && self.ledger().wallet()[start..].iter().any(|&b| b < cheapest) {
            debug!(process, quantity, cost = cheapest, "schedule rejected: money shortage");
            return Ok(false);
        }

        transaction(self, |sim, bookmark| -> Result<bool, SimulatorError> {
            let affordable = temporary_transaction(sim, |sim, _| {
                sim.pay(cheapest, start, request.ignore_money_shortage)
            })?;
            if !affordable {
                sim.rollback(bookmark)?;
                return Ok(false);
            }

            let mut scheduled = 0;
            for (step, line) in slots {
                if scheduled == quantity {
                    break;
                }
                if sim.run_unit(process, step, line, request) {
                    scheduled += 1;
                }
            }
            if scheduled < quantity {
                debug!(process, quantity, scheduled, "schedule rejected: shortages at candidate steps");
                sim.rollback(bookmark)?;
                return Ok(false);
            }
            debug!(process, quantity, "production scheduled");
            Ok(true)
        })
    }

    /// Put one run of `process` on (step, line) if the shortage checks pass
    fn run_unit(&mut self, process: usize, step: usize, line: usize, request: &ScheduleRequest) -> bool {
        let cost = self.profile().cost(line, process);
        let ledger = self.ledger();
        let has_input = request.ignore_inventory_shortage || ledger.inventory_of(process)[step] >= 1;
        let has_money = request.ignore_money_shortage || ledger.wallet()[step] >= cost;
        if !(has_input && has_money) {
            return false;
        }

        if let Some(previous) = self.ledger_mut().place_run(line, step, process) {
            let refund = self.profile().cost(line, previous);
            self.apply_run(previous, step, -1, -refund);
        }
        self.apply_run(process, step, 1, cost);
        true
    }

    /// Inventory and wallet effect of `runs` runs from `step` onward
    fn apply_run(&mut self, process: usize, step: usize, runs: i64, cost: i64) {
        let ledger = self.ledger_mut();
        ledger.shift_inventory(process, step, -runs);
        ledger.shift_inventory(process + 1, step, runs);
        ledger.shift_wallet(step, -cost);
    }
}
