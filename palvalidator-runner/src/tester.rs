//! Batch robustness tester.
//!
//! Runs one robustness test per candidate strategy against a shared backtester
//! prototype, then files each strategy as surviving, rejected or errored.
//! Tests may run on the rayon pool; filing is always serial, in the order the
//! strategies were added.

use rayon::prelude::*;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use thiserror::Error;
use tracing::{info, warn};

use palvalidator_core::domain::PalStrategy;
use palvalidator_core::BackTester;

use crate::monte_carlo::MonteCarloPayoffRatio;
use crate::rng::SeedHierarchy;
use crate::robustness::{
    PermutationAttributes, RobustnessCalculator, RobustnessCriteria, RobustnessError, RobustnessTest,
};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TesterError {
    /// Two strategies in one batch share a pattern hash; `bucket` is where
    /// the first one was filed.
    #[error("pattern hash {hash} already filed as {bucket}")]
    DuplicateHash { hash: u64, bucket: &'static str },
}

type Outcome = Result<(bool, RobustnessCalculator), RobustnessError>;

/// Runs the permutation robustness test over a batch of strategies.
///
/// Every strategy added with [`RobustnessTester::add_strategy`] ends up in
/// exactly one bucket after [`RobustnessTester::run`]:
/// - surviving: the verdict was robust
/// - rejected: the verdict named a failed gate
/// - errored: the sweep itself failed (backtest error, bad ladder)
///
/// Surviving and rejected strategies keep their calculator, keyed by
/// pattern hash. Monte Carlo refinement is on by default, seeded per
/// strategy from one master seed, so a batch is reproducible regardless of
/// parallelism.
///
/// # Example
///
/// ```no_run
/// use palvalidator_runner::RobustnessTester;
/// # fn demo(
/// #     strategy: &palvalidator_core::domain::PalStrategy,
/// #     prototype: &palvalidator_core::PatternBackTester,
/// # ) -> Result<(), palvalidator_runner::TesterError> {
/// let mut tester = RobustnessTester::standard().with_seed(42);
/// tester.add_strategy(strategy);
/// tester.run(prototype)?;
/// for survivor in tester.surviving_strategies() {
///     println!("{} is robust", survivor.name());
/// }
/// # Ok(())
/// # }
/// ```
pub struct RobustnessTester {
    attributes: PermutationAttributes,
    criteria: RobustnessCriteria,
    monte_carlo: Option<MonteCarloPayoffRatio>,
    seeds: SeedHierarchy,
    parallel: bool,
    pending: Vec<PalStrategy>,
    surviving: Vec<PalStrategy>,
    rejected: Vec<PalStrategy>,
    errored: Vec<(PalStrategy, RobustnessError)>,
    passed: HashMap<u64, RobustnessCalculator>,
    failed: HashMap<u64, RobustnessCalculator>,
}

impl RobustnessTester {
    /// Tester with Monte Carlo refinement at the default trial count.
    pub fn new(attributes: PermutationAttributes, criteria: RobustnessCriteria) -> Self {
        Self {
            attributes,
            criteria,
            monte_carlo: Some(MonteCarloPayoffRatio::default()),
            seeds: SeedHierarchy::new(0),
            parallel: true,
            pending: Vec::new(),
            surviving: Vec::new(),
            rejected: Vec::new(),
            errored: Vec::new(),
            passed: HashMap::new(),
            failed: HashMap::new(),
        }
    }

    /// 19-permutation ladder with the standard criteria.
    pub fn standard() -> Self {
        Self::new(PermutationAttributes::pal(), RobustnessCriteria::standard())
    }

    /// 30-permutation ladder with the standard criteria.
    pub fn stat_significant() -> Self {
        Self::new(PermutationAttributes::stat_significant(), RobustnessCriteria::standard())
    }

    /// Zero trials disables Monte Carlo refinement.
    pub fn with_monte_carlo_trials(mut self, trials: u32) -> Self {
        self.monte_carlo = (trials > 0).then(|| MonteCarloPayoffRatio::new(trials));
        self
    }

    /// Master seed for the per-strategy Monte Carlo streams.
    pub fn with_seed(mut self, master_seed: u64) -> Self {
        self.seeds = SeedHierarchy::new(master_seed);
        self
    }

    /// Run tests on the rayon pool. Filing order does not change.
    pub fn with_parallelism(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn attributes(&self) -> &PermutationAttributes {
        &self.attributes
    }

    pub fn criteria(&self) -> &RobustnessCriteria {
        &self.criteria
    }

    /// Queue a strategy; it is tested on an isolated clone.
    pub fn add_strategy(&mut self, strategy: &PalStrategy) {
        self.pending.push(strategy.clone_for_backtesting());
    }

    pub fn num_pending_strategies(&self) -> usize {
        self.pending.len()
    }

    /// Test every queued strategy against `prototype` and file the outcomes.
    ///
    /// A failed test files the strategy as errored and does not stop the
    /// batch. The only batch-level error is a pattern hash filed twice.
    pub fn run(&mut self, prototype: &dyn BackTester) -> Result<(), TesterError> {
        let strategies = std::mem::take(&mut self.pending);
        let attributes = self.attributes;
        let criteria = self.criteria;
        let monte_carlo = self.monte_carlo;
        let seeds = self.seeds;

        info!(
            strategies = strategies.len(),
            permutations = attributes.number_of_permutations(),
            monte_carlo = monte_carlo.map(|mc| mc.trials()).unwrap_or(0),
            parallel = self.parallel,
            "robustness batch started"
        );

        let test_one = |strategy: PalStrategy| -> (PalStrategy, Outcome) {
            let mut test = match monte_carlo {
                Some(estimator) => {
                    RobustnessTest::monte_carlo(prototype, strategy.clone(), attributes, criteria, estimator, seeds)
                }
                None => RobustnessTest::new(prototype, strategy.clone(), attributes, criteria),
            };
            let outcome = test.run().map(|robust| (robust, test.into_calculator()));
            (strategy, outcome)
        };

        let outcomes: Vec<(PalStrategy, Outcome)> = if self.parallel {
            strategies.into_par_iter().map(test_one).collect()
        } else {
            strategies.into_iter().map(test_one).collect()
        };

        for (strategy, outcome) in outcomes {
            self.file(strategy, outcome)?;
        }

        info!(
            surviving = self.surviving.len(),
            rejected = self.rejected.len(),
            errored = self.errored.len(),
            "robustness batch complete"
        );
        Ok(())
    }

    fn file(&mut self, strategy: PalStrategy, outcome: Outcome) -> Result<(), TesterError> {
        let hash = strategy.pattern().hash_code();
        match outcome {
            Ok((true, calculator)) => {
                insert_unique(&mut self.passed, hash, calculator, "passed")?;
                self.surviving.push(strategy);
            }
            Ok((false, calculator)) => {
                insert_unique(&mut self.failed, hash, calculator, "failed")?;
                self.rejected.push(strategy);
            }
            Err(error) => {
                warn!(strategy = strategy.name(), pattern_hash = hash, %error, "robustness test failed");
                self.errored.push((strategy, error));
            }
        }
        Ok(())
    }

    pub fn num_surviving_strategies(&self) -> usize {
        self.surviving.len()
    }

    pub fn num_rejected_strategies(&self) -> usize {
        self.rejected.len()
    }

    pub fn num_errored_strategies(&self) -> usize {
        self.errored.len()
    }

    pub fn surviving_strategies(&self) -> impl Iterator<Item = &PalStrategy> {
        self.surviving.iter()
    }

    pub fn rejected_strategies(&self) -> impl Iterator<Item = &PalStrategy> {
        self.rejected.iter()
    }

    /// Errored strategies with the error that stopped their sweep.
    pub fn errored_strategies(&self) -> impl Iterator<Item = (&PalStrategy, &RobustnessError)> {
        self.errored.iter().map(|(s, e)| (s, e))
    }

    /// Calculator of a tested pattern, whichever bucket it landed in.
    pub fn calculator(&self, pattern_hash: u64) -> Option<&RobustnessCalculator> {
        self.passed
            .get(&pattern_hash)
            .or_else(|| self.failed.get(&pattern_hash))
    }

    pub fn passed_calculator(&self, pattern_hash: u64) -> Option<&RobustnessCalculator> {
        self.passed.get(&pattern_hash)
    }

    pub fn failed_calculator(&self, pattern_hash: u64) -> Option<&RobustnessCalculator> {
        self.failed.get(&pattern_hash)
    }
}

fn insert_unique(
    map: &mut HashMap<u64, RobustnessCalculator>,
    hash: u64,
    calculator: RobustnessCalculator,
    bucket: &'static str,
) -> Result<(), TesterError> {
    match map.entry(hash) {
        Entry::Occupied(_) => Err(TesterError::DuplicateHash { hash, bucket }),
        Entry::Vacant(slot) => {
            slot.insert(calculator);
            Ok(())
        }
    }
}
