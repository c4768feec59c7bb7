//! Cost metering for bounded model-call paths.
//!
//! A meter is scoped to one bounded call path (one file task's primary calls,
//! one repair chain, one consolidation call) rather than shared globally, so
//! concurrent files cannot starve each other's budget.

use std::sync::Mutex;

use crate::error::BudgetExceeded;

/// Per-token pricing for a model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CostRates {
    pub input_per_token: f64,
    pub output_per_token: f64,
}

impl CostRates {
    /// Dollar cost of one completion.
    pub fn cost(&self, tokens_in: u64, tokens_out: u64) -> f64 {
        tokens_in as f64 * self.input_per_token + tokens_out as f64 * self.output_per_token
    }
}

/// Tracks cumulative spend against a ceiling. Pure accounting, no I/O.
#[derive(Debug)]
pub struct CostMeter {
    rates: CostRates,
    ceiling: f64,
    spent: Mutex<f64>,
}

impl CostMeter {
    pub fn new(rates: CostRates, ceiling: f64) -> Self {
        CostMeter {
            rates,
            ceiling,
            spent: Mutex::new(0.0),
        }
    }

    /// Charge for one completion, all or nothing: if the charge would pass
    /// the ceiling, nothing is recorded and `BudgetExceeded` comes back.
    /// Returns the cost that was charged.
    pub fn charge(&self, tokens_in: u64, tokens_out: u64) -> Result<f64, BudgetExceeded> {
        let cost = self.rates.cost(tokens_in, tokens_out);
        let mut spent = self.spent.lock().unwrap();
        if *spent + cost > self.ceiling {
            return Err(BudgetExceeded {
                cost,
                remaining: self.ceiling - *spent,
                ceiling: self.ceiling,
            });
        }
        *spent += cost;
        Ok(cost)
    }

    /// Whether the full ceiling has been consumed.
    pub fn exhausted(&self) -> bool {
        self.remaining() <= 0.0
    }

    pub fn spent(&self) -> f64 {
        *self.spent.lock().unwrap()
    }

    pub fn remaining(&self) -> f64 {
        self.ceiling - self.spent()
    }

    pub fn ceiling(&self) -> f64 {
        self.ceiling
    }
}
