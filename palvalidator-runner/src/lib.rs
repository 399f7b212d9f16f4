//! PAL Validator Runner: permutation robustness validation for price-action patterns.
//!
//! This crate builds on `palvalidator-core` to provide:
//! - Tolerance lookup curves and robustness criteria
//! - Permutation ladder generation and per-permutation backtests
//! - The robustness calculator and its verdict
//! - Monte Carlo payoff ratio refinement with reproducible seed streams
//! - A batch tester that files strategies as surviving, rejected or errored
//! - TOML run configuration and serializable summaries

pub mod config;
pub mod monte_carlo;
pub mod rng;
pub mod robustness;
pub mod summary;
pub mod tester;

pub use config::{ConfigError, Profile, ValidatorConfig};
pub use monte_carlo::{MonteCarloPayoffRatio, DEFAULT_TRIALS};
pub use rng::SeedHierarchy;
pub use robustness::{
    PermutationAttributes, Rejection, RobustnessCalculator, RobustnessCriteria, RobustnessError, RobustnessTest,
    RobustnessTestResult, Verdict,
};
pub use summary::{DistributionSummary, PermutationRow, RobustnessSummary};
pub use tester::{RobustnessTester, TesterError};
