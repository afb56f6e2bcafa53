//! Type conversion utilities for FFI boundary
//!
//! Converts between Rust types and PyO3-compatible types (PyDict, tuples,
//! plain integers).

use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;
use pyo3::types::PyDict;

use crate::core::time::{Command, LineFilter, SlotMethod, StepWindow};
use crate::models::profile::FactoryProfile;
use crate::simulator::{SimulatorConfig, SimulatorError};

// ========================================================================
// PyDict Extraction Helpers
// ========================================================================

/// Extract a required field from a Python dict with clear error messages.
fn extract_required<'py, T: FromPyObject<'py>>(dict: &Bound<'py, PyDict>, key: &str) -> PyResult<T> {
    dict.get_item(key)?
        .ok_or_else(|| PyValueError::new_err(format!("Missing required field '{}'", key)))?
        .extract()
}

/// Extract an optional field from a Python dict.
fn extract_optional<'py, T: FromPyObject<'py>>(dict: &Bound<'py, PyDict>, key: &str) -> PyResult<Option<T>> {
    match dict.get_item(key)? {
        Some(value) if !value.is_none() => Ok(Some(value.extract()?)),
        _ => Ok(None),
    }
}

/// Extract a field with a default value if missing.
fn extract_with_default<'py, T: FromPyObject<'py>>(
    dict: &Bound<'py, PyDict>,
    key: &str,
    default: T,
) -> PyResult<T> {
    Ok(extract_optional(dict, key)?.unwrap_or(default))
}

// ========================================================================
// Parsers
// ========================================================================

/// Convert a Python dict to a FactoryProfile
///
/// Required keys: `costs` (`[line][process]`), `exogenous_supplies`,
/// `exogenous_sales`, `exogenous_supply_prices`, `exogenous_sale_prices`
/// (each `[step][product]`).
pub fn parse_profile(py_profile: &Bound<'_, PyDict>) -> PyResult<FactoryProfile> {
    FactoryProfile::new(
        extract_required(py_profile, "costs")?,
        extract_required(py_profile, "exogenous_supplies")?,
        extract_required(py_profile, "exogenous_sales")?,
        extract_required(py_profile, "exogenous_supply_prices")?,
        extract_required(py_profile, "exogenous_sale_prices")?,
    )
    .map_err(|e| PyValueError::new_err(e.to_string()))
}

/// Convert an optional Python dict to a SimulatorConfig
pub fn parse_simulator_config(py_config: Option<&Bound<'_, PyDict>>) -> PyResult<SimulatorConfig> {
    let Some(py_config) = py_config else {
        return Ok(SimulatorConfig::default());
    };
    let defaults = SimulatorConfig::default();
    Ok(SimulatorConfig {
        initial_balance: extract_with_default(py_config, "initial_balance", defaults.initial_balance)?,
        initial_inventory: extract_optional(py_config, "initial_inventory")?,
        bankruptcy_limit: extract_with_default(py_config, "bankruptcy_limit", defaults.bankruptcy_limit)?,
        breach_penalty: extract_with_default(py_config, "breach_penalty", defaults.breach_penalty)?,
    })
}

/// `None` or a negative int means any step, an int one step, a pair a range
pub fn parse_step_window(step: Option<&Bound<'_, PyAny>>) -> PyResult<StepWindow> {
    let Some(step) = step.filter(|s| !s.is_none()) else {
        return Ok(StepWindow::Any);
    };
    if let Ok((first, last)) = step.extract::<(usize, usize)>() {
        return Ok(StepWindow::Between(first, last));
    }
    let single: i64 = step.extract()?;
    Ok(usize::try_from(single).map_or(StepWindow::Any, StepWindow::At))
}

/// `None` or a negative int means any line
pub fn parse_line_filter(line: Option<i64>) -> LineFilter {
    match line.map(usize::try_from) {
        Some(Ok(line)) => LineFilter::Line(line),
        _ => LineFilter::Any,
    }
}

pub fn parse_slot_method(method: &str) -> PyResult<SlotMethod> {
    method.parse().map_err(|e: crate::core::time::ParseSlotMethodError| PyValueError::new_err(e.to_string()))
}

/// Python side uses -1 for an idle line
pub fn command_to_py(command: Command) -> i64 {
    command.map_or(-1, |process| process as i64)
}

pub fn command_from_py(command: i64) -> Command {
    usize::try_from(command).ok()
}

/// Caller contract violations surface as ValueError
pub fn to_py_err(error: SimulatorError) -> PyErr {
    PyValueError::new_err(error.to_string())
}
