//! TOML run configuration for a robustness batch.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

use palvalidator_core::domain::{PalStrategy, Portfolio};
use palvalidator_core::pattern::{ExpressionError, PatternExpression, PriceBarReference};
use palvalidator_core::synthetic::RandomWalk;
use palvalidator_core::{Direction, PatternDescription, PatternError, PercentNumber, PricePattern};

use crate::monte_carlo::DEFAULT_TRIALS;
use crate::robustness::{CriteriaError, PermutationAttributes, PermutationError, RobustnessCriteria};
use crate::tester::RobustnessTester;

/// Fewest bars a synthetic series may have.
const MIN_SERIES_BARS: usize = 2;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("invalid criteria: {0}")]
    Criteria(#[from] CriteriaError),
    #[error("invalid permutations: {0}")]
    Permutation(#[from] PermutationError),
    #[error("pattern {index}: {source}")]
    Expression {
        index: u32,
        #[source]
        source: ExpressionError,
    },
    #[error("pattern {index}: {source}")]
    Pattern {
        index: u32,
        #[source]
        source: PatternError,
    },
    #[error("profile 'custom' requires a [permutations] table")]
    MissingPermutations,
    #[error("config lists no patterns")]
    NoPatterns,
    #[error("series must have at least {min} bars, got {bars}")]
    SeriesTooShort { bars: usize, min: usize },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Profile {
    #[default]
    Standard,
    StatSignificant,
    Custom,
}

/// Per-field overrides of the standard criteria. Percentages are in percent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CriteriaOverrides {
    pub min_robustness_index: Option<Decimal>,
    pub desired_profit_factor: Option<Decimal>,
    pub robustness_tolerance: Option<Decimal>,
    pub profitability_safety_factor: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PermutationConfig {
    pub below_ref: u32,
    pub above_ref: u32,
    pub divisor: u32,
    #[serde(default = "default_boundary_entries")]
    pub entries_at_beginning: u32,
    #[serde(default = "default_boundary_entries")]
    pub entries_at_end: u32,
}

fn default_boundary_entries() -> u32 {
    2
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeriesConfig {
    pub symbol: String,
    pub bars: usize,
    pub seed: u64,
    pub start_price: Decimal,
}

impl Default for SeriesConfig {
    fn default() -> Self {
        Self {
            symbol: "SYN".to_string(),
            bars: 1500,
            seed: 7,
            start_price: dec!(100.0),
        }
    }
}

/// One `lhs > rhs` comparison, e.g. `{ lhs = "close[0]", rhs = "high[1]" }`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ComparisonConfig {
    pub lhs: PriceBarReference,
    pub rhs: PriceBarReference,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternConfig {
    pub index: u32,
    pub index_date: NaiveDate,
    pub direction: Direction,
    pub profit_target: Decimal,
    pub stop_loss: Decimal,
    pub expression: Vec<ComparisonConfig>,
}

impl PatternConfig {
    pub fn to_pattern(&self) -> Result<PricePattern, ConfigError> {
        let expression = PatternExpression::conjunction(self.expression.iter().map(|c| (c.lhs, c.rhs)))
            .map_err(|source| ConfigError::Expression {
                index: self.index,
                source,
            })?;
        PricePattern::new(
            PatternDescription {
                index: self.index,
                index_date: self.index_date,
            },
            self.direction,
            expression,
            self.profit_target,
            self.stop_loss,
        )
        .map_err(|source| ConfigError::Pattern {
            index: self.index,
            source,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidatorConfig {
    #[serde(default)]
    pub profile: Profile,
    /// Zero disables Monte Carlo refinement.
    #[serde(default = "default_trials")]
    pub monte_carlo_trials: u32,
    #[serde(default)]
    pub seed: u64,
    #[serde(default = "default_parallel")]
    pub parallel: bool,
    #[serde(default)]
    pub criteria: CriteriaOverrides,
    #[serde(default)]
    pub permutations: Option<PermutationConfig>,
    #[serde(default)]
    pub series: SeriesConfig,
    #[serde(default)]
    pub patterns: Vec<PatternConfig>,
}

fn default_trials() -> u32 {
    DEFAULT_TRIALS
}

fn default_parallel() -> bool {
    true
}

impl ValidatorConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse and validate.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.criteria()?;
        self.attributes()?;
        if self.series.bars < MIN_SERIES_BARS {
            return Err(ConfigError::SeriesTooShort {
                bars: self.series.bars,
                min: MIN_SERIES_BARS,
            });
        }
        if self.patterns.is_empty() {
            return Err(ConfigError::NoPatterns);
        }
        for pattern in &self.patterns {
            pattern.to_pattern()?;
        }
        Ok(())
    }

    /// Standard criteria with any overrides applied.
    pub fn criteria(&self) -> Result<RobustnessCriteria, ConfigError> {
        let base = RobustnessCriteria::standard();
        let o = &self.criteria;
        Ok(RobustnessCriteria::new(
            o.min_robustness_index
                .map(PercentNumber::from_percent)
                .unwrap_or(base.min_robustness_index),
            o.desired_profit_factor.unwrap_or(base.desired_profit_factor),
            o.robustness_tolerance
                .map(PercentNumber::from_percent)
                .unwrap_or(base.robustness_tolerance),
            o.profitability_safety_factor
                .unwrap_or(base.profitability_safety_factor),
        )?)
    }

    pub fn attributes(&self) -> Result<PermutationAttributes, ConfigError> {
        match self.profile {
            Profile::Standard => Ok(PermutationAttributes::pal()),
            Profile::StatSignificant => Ok(PermutationAttributes::stat_significant()),
            Profile::Custom => {
                let p = self.permutations.as_ref().ok_or(ConfigError::MissingPermutations)?;
                Ok(PermutationAttributes::new(
                    p.below_ref,
                    p.above_ref,
                    p.divisor,
                    p.entries_at_beginning,
                    p.entries_at_end,
                )?)
            }
        }
    }

    pub fn random_walk(&self) -> RandomWalk {
        RandomWalk::new(
            self.series.symbol.clone(),
            self.series.bars,
            self.series.seed,
            self.series.start_price,
        )
    }

    /// One strategy per pattern, each trading the configured series symbol.
    pub fn strategies(&self) -> Result<Vec<PalStrategy>, ConfigError> {
        let portfolio = Arc::new(Portfolio::single(
            format!("{}-portfolio", self.series.symbol),
            self.series.symbol.clone(),
        ));
        self.patterns
            .iter()
            .map(|p| {
                let pattern = p.to_pattern()?;
                let name = format!("pal-{}-{}", p.index, p.index_date);
                Ok(PalStrategy::new(name, Arc::new(pattern), Arc::clone(&portfolio)))
            })
            .collect()
    }

    /// A tester with every strategy queued.
    pub fn tester(&self) -> Result<RobustnessTester, ConfigError> {
        let mut tester = RobustnessTester::new(self.attributes()?, self.criteria()?)
            .with_monte_carlo_trials(self.monte_carlo_trials)
            .with_seed(self.seed)
            .with_parallelism(self.parallel);
        for strategy in self.strategies()? {
            tester.add_strategy(&strategy);
        }
        Ok(tester)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
profile = "standard"
monte_carlo_trials = 50
seed = 42

[criteria]
desired_profit_factor = "1.75"

[series]
symbol = "SPY"
bars = 600

[[patterns]]
index = 1
index_date = "2019-03-04"
direction = "long"
profit_target = "2.0"
stop_loss = "2.0"
expression = [ { lhs = "close[0]", rhs = "high[1]" }, { lhs = "low[1]", rhs = "low[2]" } ]
"#;

    #[test]
    fn parses_sample() {
        let config = ValidatorConfig::from_toml(SAMPLE).unwrap();
        assert_eq!(config.profile, Profile::Standard);
        assert_eq!(config.monte_carlo_trials, 50);
        assert!(config.parallel);
        assert_eq!(config.series.seed, 7);

        let criteria = config.criteria().unwrap();
        assert_eq!(criteria.desired_profit_factor, dec!(1.75));
        assert_eq!(criteria.profitability_safety_factor, dec!(0.9));
        assert_eq!(config.attributes().unwrap(), PermutationAttributes::pal());

        let strategies = config.strategies().unwrap();
        assert_eq!(strategies.len(), 1);
        assert_eq!(strategies[0].pattern().max_bars_back(), 2);
        assert!(strategies[0].portfolio().contains("SPY"));
    }

    #[test]
    fn custom_profile_needs_permutations() {
        let toml = SAMPLE.replace("profile = \"standard\"", "profile = \"custom\"");
        assert!(matches!(
            ValidatorConfig::from_toml(&toml),
            Err(ConfigError::MissingPermutations)
        ));

        let with_table = format!("{toml}\n[permutations]\nbelow_ref = 3\nabove_ref = 2\ndivisor = 8\n");
        let config = ValidatorConfig::from_toml(&with_table).unwrap();
        assert_eq!(config.attributes().unwrap().number_of_permutations(), 6);
    }

    #[test]
    fn invalid_values_rejected() {
        let bad_safety = SAMPLE.replace(
            "desired_profit_factor = \"1.75\"",
            "profitability_safety_factor = \"1.5\"",
        );
        assert!(matches!(
            ValidatorConfig::from_toml(&bad_safety),
            Err(ConfigError::Criteria(_))
        ));

        let bad_ref = SAMPLE.replace("high[1]", "volume[1]");
        assert!(matches!(ValidatorConfig::from_toml(&bad_ref), Err(ConfigError::Parse(_))));

        let bad_stop = SAMPLE.replace("stop_loss = \"2.0\"", "stop_loss = \"0\"");
        assert!(matches!(
            ValidatorConfig::from_toml(&bad_stop),
            Err(ConfigError::Pattern { index: 1, .. })
        ));

        let empty = SAMPLE.replace("expression = [ { lhs = \"close[0]\", rhs = \"high[1]\" }, { lhs = \"low[1]\", rhs = \"low[2]\" } ]", "expression = []");
        assert!(matches!(
            ValidatorConfig::from_toml(&empty),
            Err(ConfigError::Expression { index: 1, .. })
        ));
    }

    #[test]
    fn toml_round_trip_preserves_config() {
        let config = ValidatorConfig::from_toml(SAMPLE).unwrap();
        let again = ValidatorConfig::from_toml(&config.to_toml().unwrap()).unwrap();
        assert_eq!(config, again);
    }
}
