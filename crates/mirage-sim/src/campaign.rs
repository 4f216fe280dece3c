//! Campaign runner: many seeds, one verdict.
//!
//! Executes a seed range with shared parameters, collecting pass/fail
//! per seed and remembering the first failing seed for replay.

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};
use std::ops::Range;
use tracing::info;

use crate::oracle::InvariantViolation;
use crate::{FaultConfig, SimulationConfig, Simulator};

/// Campaign-level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignConfig {
    /// Range of seeds to execute, e.g. `0..200`.
    pub seed_range: Range<u64>,
    /// Rounds of user activity per seed.
    pub rounds: u64,
    /// Percentage chance of dispatching an edit each round.
    pub edit_rate_percent: u8,
    /// Percentage of optimistic calls the server rejects.
    pub conflict_rate_percent: u8,
    /// Percentage chance per round of a foreign-session push.
    pub foreign_push_rate_percent: u8,
    /// Wire fault injection.
    pub fault: FaultConfig,
}

impl Default for CampaignConfig {
    fn default() -> Self {
        Self {
            seed_range: 0..200,
            rounds: 32,
            edit_rate_percent: 80,
            conflict_rate_percent: 10,
            foreign_push_rate_percent: 10,
            fault: FaultConfig::default(),
        }
    }
}

/// One failing seed with its violations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedFailure {
    pub seed: u64,
    pub violations: Vec<InvariantViolation>,
}

/// Aggregated campaign outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CampaignResult {
    pub seeds_run: u64,
    pub failures: Vec<SeedFailure>,
}

impl CampaignResult {
    /// The first failing seed, for replay.
    #[must_use]
    pub fn first_failure(&self) -> Option<u64> {
        self.failures.first().map(|failure| failure.seed)
    }

    /// Bail with a replayable diagnosis if any seed failed.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first failing seed and its
    /// violations.
    pub fn into_result(self) -> Result<Self> {
        if let Some(failure) = self.failures.first() {
            bail!(
                "{} of {} seeds failed; first failure seed={} violations={:?}",
                self.failures.len(),
                self.seeds_run,
                failure.seed,
                failure.violations
            );
        }
        Ok(self)
    }
}

/// Run every seed in the range.
#[must_use]
pub fn run_campaign(config: &CampaignConfig) -> CampaignResult {
    let mut failures = Vec::new();
    let mut seeds_run = 0;

    for seed in config.seed_range.clone() {
        seeds_run += 1;
        let mut simulator = Simulator::new(SimulationConfig {
            seed,
            rounds: config.rounds,
            edit_rate_percent: config.edit_rate_percent,
            conflict_rate_percent: config.conflict_rate_percent,
            foreign_push_rate_percent: config.foreign_push_rate_percent,
            fault: config.fault,
        });
        let result = simulator.run();
        if !result.oracle.passed {
            info!(seed, violations = ?result.oracle.violations, "seed failed");
            failures.push(SeedFailure {
                seed,
                violations: result.oracle.violations,
            });
        }
    }

    CampaignResult {
        seeds_run,
        failures,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
