//! Factory profile
//!
//! The immutable description of one factory: how many lines it has, what each
//! process costs on each line, and the exogenous supply/sale forecasts for
//! every step of the horizon.
//!
//! Process `i` consumes one unit of product `i` and produces one unit of
//! product `i + 1`, so a factory with `n` processes handles `n + 1` products.
//!
//! CRITICAL: All money values are i64

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while validating a profile
#[derive(Debug, Error, PartialEq)]
pub enum ProfileError {
    #[error("Profile must have at least one line")]
    NoLines,

    #[error("Profile must have at least one process")]
    NoProcesses,

    #[error("Profile must have at least one step")]
    NoSteps,

    #[error("Cost table row for line {line} has {found} entries, expected {expected}")]
    RaggedCosts {
        line: usize,
        expected: usize,
        found: usize,
    },

    #[error("Negative cost {cost} for process {process} on line {line}")]
    NegativeCost {
        line: usize,
        process: usize,
        cost: i64,
    },

    #[error("Table '{table}' has {found} steps, expected {expected}")]
    StepCountMismatch {
        table: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("Table '{table}' row for step {step} has {found} products, expected {expected}")]
    ProductCountMismatch {
        table: &'static str,
        step: usize,
        expected: usize,
        found: usize,
    },

    #[error("Profile JSON is invalid: {0}")]
    Json(String),
}

/// Production profile of a factory
///
/// # Example
/// ```
/// use factory_simulator_core_rs::FactoryProfile;
///
/// // 10 lines, 5 processes, 50 steps, every process costs 1 everywhere
/// let profile = FactoryProfile::uniform(10, 5, 50, 1);
/// assert_eq!(profile.n_products(), 6);
/// assert_eq!(profile.cost(3, 4), 1);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactoryProfile {
    /// Cost of running a process on a line: `costs[line][process]`
    costs: Vec<Vec<i64>>,

    /// Forecast quantity supplied to the factory: `[step][product]`
    exogenous_supplies: Vec<Vec<i64>>,

    /// Forecast quantity sold by the factory: `[step][product]`
    exogenous_sales: Vec<Vec<i64>>,

    /// Unit price of the forecast supplies: `[step][product]`
    exogenous_supply_prices: Vec<Vec<i64>>,

    /// Unit price of the forecast sales: `[step][product]`
    exogenous_sale_prices: Vec<Vec<i64>>,
}

impl FactoryProfile {
    /// Build and validate a profile
    ///
    /// `costs` is indexed `[line][process]`; every forecast table is indexed
    /// `[step][product]` and must cover the same number of steps.
    pub fn new(
        costs: Vec<Vec<i64>>,
        exogenous_supplies: Vec<Vec<i64>>,
        exogenous_sales: Vec<Vec<i64>>,
        exogenous_supply_prices: Vec<Vec<i64>>,
        exogenous_sale_prices: Vec<Vec<i64>>,
    ) -> Result<Self, ProfileError> {
        let profile = Self {
            costs,
            exogenous_supplies,
            exogenous_sales,
            exogenous_supply_prices,
            exogenous_sale_prices,
        };
        profile.validate()?;
        Ok(profile)
    }

    /// Profile with a single cost for every (line, process) and no forecasts
    ///
    /// # Panics
    /// Panics if any dimension is zero or `cost` is negative.
    pub fn uniform(n_lines: usize, n_processes: usize, n_steps: usize, cost: i64) -> Self {
        assert!(n_lines > 0, "n_lines must be positive");
        assert!(n_processes > 0, "n_processes must be positive");
        assert!(n_steps > 0, "n_steps must be positive");
        assert!(cost >= 0, "cost must be non-negative");
        let zeros = vec![vec![0; n_processes + 1]; n_steps];
        Self {
            costs: vec![vec![cost; n_processes]; n_lines],
            exogenous_supplies: zeros.clone(),
            exogenous_sales: zeros.clone(),
            exogenous_supply_prices: zeros.clone(),
            exogenous_sale_prices: zeros,
        }
    }

    /// Parse a profile from JSON and validate it
    pub fn from_json(json: &str) -> Result<Self, ProfileError> {
        let profile: FactoryProfile =
            serde_json::from_str(json).map_err(|e| ProfileError::Json(e.to_string()))?;
        profile.validate()?;
        Ok(profile)
    }

    /// Check that all tables are non-empty, rectangular and agree on sizes
    pub fn validate(&self) -> Result<(), ProfileError> {
        if self.costs.is_empty() {
            return Err(ProfileError::NoLines);
        }
        let n_processes = self.costs[0].len();
        if n_processes == 0 {
            return Err(ProfileError::NoProcesses);
        }
        for (line, row) in self.costs.iter().enumerate() {
            if row.len() != n_processes {
                return Err(ProfileError::RaggedCosts {
                    line,
                    expected: n_processes,
                    found: row.len(),
                });
            }
            if let Some((process, &cost)) = row.iter().enumerate().find(|&(_, &c)| c < 0) {
                return Err(ProfileError::NegativeCost {
                    line,
                    process,
                    cost,
                });
            }
        }

        let n_steps = self.exogenous_supplies.len();
        if n_steps == 0 {
            return Err(ProfileError::NoSteps);
        }
        let n_products = n_processes + 1;
        for (table, rows) in self.tables() {
            if rows.len() != n_steps {
                return Err(ProfileError::StepCountMismatch {
                    table,
                    expected: n_steps,
                    found: rows.len(),
                });
            }
            if let Some((step, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != n_products) {
                return Err(ProfileError::ProductCountMismatch {
                    table,
                    step,
                    expected: n_products,
                    found: row.len(),
                });
            }
        }
        Ok(())
    }

    fn tables(&self) -> [(&'static str, &Vec<Vec<i64>>); 4] {
        [
            ("exogenous_supplies", &self.exogenous_supplies),
            ("exogenous_sales", &self.exogenous_sales),
            ("exogenous_supply_prices", &self.exogenous_supply_prices),
            ("exogenous_sale_prices", &self.exogenous_sale_prices),
        ]
    }

    pub fn n_lines(&self) -> usize {
        self.costs.len()
    }

    pub fn n_processes(&self) -> usize {
        self.costs.first().map_or(0, Vec::len)
    }

    pub fn n_products(&self) -> usize {
        self.n_processes() + 1
    }

    pub fn n_steps(&self) -> usize {
        self.exogenous_supplies.len()
    }

    /// Full cost table, `[line][process]`
    pub fn costs(&self) -> &[Vec<i64>] {
        &self.costs
    }

    /// Cost of running `process` on `line`
    ///
    /// # Panics
    /// Panics if `line` or `process` is out of range.
    pub fn cost(&self, line: usize, process: usize) -> i64 {
        self.costs[line][process]
    }

    /// Forecast supply quantities per product at step `t`
    pub fn exogenous_supplies_at(&self, t: usize) -> Option<&[i64]> {
        self.exogenous_supplies.get(t).map(Vec::as_slice)
    }

    /// Forecast sale quantities per product at step `t`
    pub fn exogenous_sales_at(&self, t: usize) -> Option<&[i64]> {
        self.exogenous_sales.get(t).map(Vec::as_slice)
    }

    /// Forecast supply unit prices per product at step `t`
    pub fn exogenous_supply_prices_at(&self, t: usize) -> Option<&[i64]> {
        self.exogenous_supply_prices.get(t).map(Vec::as_slice)
    }

    /// Forecast sale unit prices per product at step `t`
    pub fn exogenous_sale_prices_at(&self, t: usize) -> Option<&[i64]> {
        self.exogenous_sale_prices.get(t).map(Vec::as_slice)
    }
}
