//! Time vocabulary for the simulation
//!
//! The simulation operates in discrete steps over a fixed horizon. This module
//! defines how callers address steps and lines when asking for production
//! capacity, and how such requests are clipped to the part of the horizon that
//! can still be changed.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Range;
use std::str::FromStr;
use thiserror::Error;

/// Content of one line at one step: the process running there, if any
pub type Command = Option<usize>;

/// A line that runs nothing at a step
pub const NO_COMMAND: Command = None;

/// Steps a production request may use
///
/// # Example
/// ```
/// use factory_simulator_core_rs::StepWindow;
///
/// // Steps 5..=10, but nothing before step 7 may be touched
/// let range = StepWindow::Between(5, 10).normalize(7, 50);
/// assert_eq!(range, Some(7..11));
///
/// // A window that lies entirely in the fixed past is empty
/// assert_eq!(StepWindow::At(3).normalize(7, 50), None);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepWindow {
    /// Any step from the first changeable one to the end of the horizon
    #[default]
    Any,
    /// Exactly this step
    At(usize),
    /// Inclusive range of steps
    Between(usize, usize),
}

impl StepWindow {
    /// Convert to a half-open step range clipped to `[earliest, n_steps)`
    ///
    /// Returns `None` when nothing is left after clipping.
    pub fn normalize(&self, earliest: usize, n_steps: usize) -> Option<Range<usize>> {
        let (first, end) = match *self {
            StepWindow::Any => (earliest, n_steps),
            StepWindow::At(step) => (step, step.saturating_add(1)),
            StepWindow::Between(first, last) => (first, last.saturating_add(1)),
        };
        let first = first.max(earliest);
        let end = end.min(n_steps);
        if end <= first {
            None
        } else {
            Some(first..end)
        }
    }
}

impl From<usize> for StepWindow {
    fn from(step: usize) -> Self {
        StepWindow::At(step)
    }
}

impl From<(usize, usize)> for StepWindow {
    fn from((first, last): (usize, usize)) -> Self {
        StepWindow::Between(first, last)
    }
}

/// Lines a production request may use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineFilter {
    #[default]
    Any,
    Line(usize),
}

impl LineFilter {
    /// Whether `line` passes the filter
    pub fn accepts(&self, line: usize) -> bool {
        match *self {
            LineFilter::Any => true,
            LineFilter::Line(only) => only == line,
        }
    }
}

impl From<usize> for LineFilter {
    fn from(line: usize) -> Self {
        LineFilter::Line(line)
    }
}

/// How production slots are picked among the free candidates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotMethod {
    Earliest,
    #[default]
    Latest,
    /// Every candidate, regardless of how many were asked for
    All,
}

/// Unknown slot method name
#[derive(Debug, Error, PartialEq)]
#[error("Unknown slot method '{0}' (expected earliest, latest or all)")]
pub struct ParseSlotMethodError(pub String);

impl FromStr for SlotMethod {
    type Err = ParseSlotMethodError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "earliest" => Ok(SlotMethod::Earliest),
            "latest" => Ok(SlotMethod::Latest),
            "all" => Ok(SlotMethod::All),
            _ => Err(ParseSlotMethodError(s.to_string())),
        }
    }
}

impl fmt::Display for SlotMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SlotMethod::Earliest => "earliest",
            SlotMethod::Latest => "latest",
            SlotMethod::All => "all",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_any_window_spans_rest_of_horizon() {
        assert_eq!(StepWindow::Any.normalize(3, 10), Some(3..10));
        assert_eq!(StepWindow::Any.normalize(10, 10), None);
    }

    #[test]
    fn test_window_clipped_to_horizon_end() {
        assert_eq!(StepWindow::Between(8, 20).normalize(0, 10), Some(8..10));
        assert_eq!(StepWindow::At(10).normalize(0, 10), None);
    }

    #[test]
    fn test_reversed_window_is_empty() {
        assert_eq!(StepWindow::Between(6, 4).normalize(0, 10), None);
    }

    #[test]
    fn test_slot_method_parsing() {
        assert_eq!("Latest".parse::<SlotMethod>(), Ok(SlotMethod::Latest));
        assert_eq!("all".parse::<SlotMethod>(), Ok(SlotMethod::All));
        assert!("soonest".parse::<SlotMethod>().is_err());
        assert_eq!(SlotMethod::Earliest.to_string(), "earliest");
    }

    #[test]
    fn test_line_filter() {
        assert!(LineFilter::Any.accepts(7));
        assert!(LineFilter::Line(2).accepts(2));
        assert!(!LineFilter::Line(2).accepts(3));
    }
}
