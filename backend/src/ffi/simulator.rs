//! PyO3 wrapper for the factory simulator
//!
//! This module provides the Python interface to the Rust simulator.

use pyo3::prelude::*;
use pyo3::types::PyDict;

use super::types::{
    command_from_py, command_to_py, parse_line_filter, parse_profile, parse_simulator_config,
    parse_slot_method, parse_step_window, to_py_err,
};
use crate::simulator::{BookmarkId, FactorySimulator, ProductionSlots, ScheduleRequest, Simulator};

/// Python wrapper for the Rust simulator
///
/// # Example (from Python)
///
/// ```python
/// from factory_simulator_core_rs import FactorySimulator
///
/// sim = FactorySimulator(profile, {"initial_balance": 1000})
/// if sim.schedule(0, 3, t=(5, 10)):
///     print(sim.wallet_at(49))
/// ```
#[pyclass(name = "FactorySimulator")]
pub struct PySimulator {
    inner: Simulator,
}

#[pymethods]
impl PySimulator {
    /// Create a simulator from a profile dict and an optional config dict
    ///
    /// Raises ValueError if the profile or config is invalid.
    #[new]
    #[pyo3(signature = (profile, config=None))]
    fn new(profile: &Bound<'_, PyDict>, config: Option<&Bound<'_, PyDict>>) -> PyResult<Self> {
        let profile = parse_profile(profile)?;
        let config = parse_simulator_config(config)?;
        let inner = Simulator::new(profile, config).map_err(to_py_err)?;
        Ok(PySimulator { inner })
    }

    // ========================================================================
    // State Queries
    // ========================================================================

    #[getter]
    fn n_steps(&self) -> usize {
        self.inner.n_steps()
    }

    #[getter]
    fn n_lines(&self) -> usize {
        self.inner.n_lines()
    }

    #[getter]
    fn n_products(&self) -> usize {
        self.inner.n_products()
    }

    #[getter]
    fn fixed_before(&self) -> usize {
        self.inner.fixed_before()
    }

    #[getter]
    fn final_balance(&self) -> i64 {
        self.inner.final_balance()
    }

    fn is_bankrupt(&self) -> bool {
        self.inner.is_bankrupt()
    }

    fn wallet_at(&self, t: usize) -> i64 {
        self.inner.wallet_at(t)
    }

    fn wallet_to(&self, t: usize) -> Vec<i64> {
        self.inner.wallet_to(t).to_vec()
    }

    fn inventory_at(&self, t: usize) -> Vec<i64> {
        self.inner.inventory_at(t)
    }

    fn inventory_to(&self, t: usize) -> Vec<Vec<i64>> {
        self.inner.inventory_to(t).into_iter().map(<[i64]>::to_vec).collect()
    }

    fn total_inventory_at(&self, t: usize) -> i64 {
        self.inner.total_inventory_at(t)
    }

    fn reserved_inventory_at(&self, t: usize) -> Vec<i64> {
        self.inner.reserved_inventory_at(t)
    }

    fn available_inventory_at(&self, t: usize) -> Vec<i64> {
        self.inner.available_inventory_at(t)
    }

    /// Process per line at step `t`, -1 for idle lines
    fn line_schedules_at(&self, t: usize) -> Vec<i64> {
        self.inner
            .line_schedules_at(t)
            .into_iter()
            .map(command_to_py)
            .collect()
    }

    // ========================================================================
    // Mutators
    // ========================================================================

    #[pyo3(signature = (amount, t, ignore_money_shortage=true))]
    fn pay(&mut self, amount: i64, t: usize, ignore_money_shortage: bool) -> PyResult<bool> {
        self.inner.pay(amount, t, ignore_money_shortage).map_err(to_py_err)
    }

    fn receive(&mut self, amount: i64, t: usize) -> PyResult<bool> {
        self.inner.receive(amount, t).map_err(to_py_err)
    }

    #[pyo3(signature = (product, quantity, t, ignore_inventory_shortage=true))]
    fn transport_to(
        &mut self,
        product: usize,
        quantity: i64,
        t: usize,
        ignore_inventory_shortage: bool,
    ) -> PyResult<bool> {
        self.inner
            .transport_to(product, quantity, t, ignore_inventory_shortage)
            .map_err(to_py_err)
    }

    #[pyo3(signature = (product, quantity, price, t, ignore_money_shortage=true))]
    fn buy(&mut self, product: usize, quantity: i64, price: i64, t: usize, ignore_money_shortage: bool) -> PyResult<bool> {
        self.inner
            .buy(product, quantity, price, t, ignore_money_shortage)
            .map_err(to_py_err)
    }

    #[pyo3(signature = (product, quantity, price, t, ignore_inventory_shortage=true))]
    fn sell(
        &mut self,
        product: usize,
        quantity: i64,
        price: i64,
        t: usize,
        ignore_inventory_shortage: bool,
    ) -> PyResult<bool> {
        self.inner
            .sell(product, quantity, price, t, ignore_inventory_shortage)
            .map_err(to_py_err)
    }

    fn reserve(&mut self, product: usize, quantity: i64, t: usize) -> PyResult<bool> {
        self.inner.reserve(product, quantity, t).map_err(to_py_err)
    }

    fn fix_before(&mut self, t: usize) {
        self.inner.fix_before(t)
    }

    fn set_state(&mut self, t: usize, inventory: Vec<i64>, wallet: i64, commands: Vec<i64>) -> PyResult<()> {
        let commands: Vec<_> = commands.into_iter().map(command_from_py).collect();
        self.inner
            .set_state(t, &inventory, wallet, &commands)
            .map_err(to_py_err)
    }

    /// Returns `(steps, lines)`; both empty when infeasible
    #[pyo3(signature = (repeats, step=None, line=None, override_commands=true, method="latest"))]
    fn available_for_production(
        &self,
        repeats: usize,
        step: Option<&Bound<'_, PyAny>>,
        line: Option<i64>,
        override_commands: bool,
        method: &str,
    ) -> PyResult<(Vec<usize>, Vec<usize>)> {
        let slots = self
            .inner
            .available_for_production(
                repeats,
                parse_step_window(step)?,
                parse_line_filter(line),
                override_commands,
                parse_slot_method(method)?,
            )
            .map_err(to_py_err)?;
        Ok((slots.steps().to_vec(), slots.lines().to_vec()))
    }

    fn order_production(&mut self, process: usize, steps: Vec<usize>, lines: Vec<usize>) -> PyResult<()> {
        if steps.len() != lines.len() {
            return Err(pyo3::exceptions::PyValueError::new_err(
                "steps and lines must have the same length",
            ));
        }
        let slots: ProductionSlots = steps.into_iter().zip(lines).collect();
        self.inner.order_production(process, &slots).map_err(to_py_err)
    }

    #[allow(clippy::too_many_arguments)]
    #[pyo3(signature = (
        process,
        quantity,
        t=None,
        line=None,
        override_commands=true,
        method="latest",
        ignore_inventory_shortage=true,
        ignore_money_shortage=true
    ))]
    fn schedule(
        &mut self,
        process: usize,
        quantity: usize,
        t: Option<&Bound<'_, PyAny>>,
        line: Option<i64>,
        override_commands: bool,
        method: &str,
        ignore_inventory_shortage: bool,
        ignore_money_shortage: bool,
    ) -> PyResult<bool> {
        let request = ScheduleRequest {
            process,
            quantity,
            window: parse_step_window(t)?,
            line: parse_line_filter(line),
            override_commands,
            method: parse_slot_method(method)?,
            ignore_inventory_shortage,
            ignore_money_shortage,
        };
        self.inner.schedule(&request).map_err(to_py_err)
    }

    // ========================================================================
    // Bookmarks
    // ========================================================================

    fn bookmark(&mut self) -> u64 {
        self.inner.bookmark().as_u64()
    }

    fn rollback(&mut self, bookmark_id: u64) -> PyResult<()> {
        self.inner
            .rollback(BookmarkId::from_u64(bookmark_id))
            .map_err(to_py_err)
    }

    fn delete_bookmark(&mut self, bookmark_id: u64) -> PyResult<()> {
        self.inner
            .delete_bookmark(BookmarkId::from_u64(bookmark_id))
            .map_err(to_py_err)
    }
}
