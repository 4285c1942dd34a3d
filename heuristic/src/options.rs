//! Construction options for [`crate::CegarHeuristic`], each with an `EnvParam`
//! environment-variable override following the teacher's `env_param` crate.

use std::time::Duration;

use env_param::EnvParam;

use crate::splitter::{SplitScope, SplitSelector, SplitStrategy};
use crate::task::TaskError;

static MAX_STATES: EnvParam<i64> = EnvParam::new("CEGAR_MAX_STATES", "9223372036854775807");
static MAX_TIME_SECS: EnvParam<u64> = EnvParam::new("CEGAR_MAX_TIME", "18446744073709551615");
static PRECALCULATION: EnvParam<bool> = EnvParam::new("CEGAR_PRECALCULATION", "true");
static SINGLE_FACT_SPLIT: EnvParam<bool> = EnvParam::new("CEGAR_SINGLE_FACT_SPLIT", "false");
static INITIAL_GOAL_SPLIT: EnvParam<bool> = EnvParam::new("CEGAR_INITIAL_GOAL_SPLIT", "true");
static SPLIT_METHOD: EnvParam<SplitStrategy> = EnvParam::new("CEGAR_SPLIT_METHOD", "singlevaluesplit");
static SPLIT_SELECTOR: EnvParam<SplitSelector> = EnvParam::new("CEGAR_SPLIT_SELECTOR", "least_refined");
static MEMORY_PADDING_MB: EnvParam<u64> = EnvParam::new("CEGAR_MEMORY_PADDING_MB", "75");
static RNG_SEED: EnvParam<u64> = EnvParam::new("CEGAR_RNG_SEED", "3262344239");

/// Tunable internals of the CEGAR heuristic. `Default` reads every field from its
/// `EnvParam` (environment-overridable, fixed-default-otherwise), so the demo
/// binary and tests can tune behavior without recompiling.
#[derive(Clone, Debug)]
pub struct CegarOptions {
    pub max_states: i64,
    pub max_time: Option<Duration>,
    pub precalculation: bool,
    pub singlefactsplit: bool,
    pub initial_goal_split: bool,
    pub split_method: SplitStrategy,
    pub split_selector: SplitSelector,
    pub memory_padding_mb: u64,
    pub rng_seed: u64,
}

impl Default for CegarOptions {
    fn default() -> Self {
        let max_time_secs = MAX_TIME_SECS.get();
        CegarOptions {
            max_states: MAX_STATES.get(),
            max_time: (max_time_secs != u64::MAX).then(|| Duration::from_secs(max_time_secs)),
            precalculation: PRECALCULATION.get(),
            singlefactsplit: SINGLE_FACT_SPLIT.get(),
            initial_goal_split: INITIAL_GOAL_SPLIT.get(),
            split_method: SPLIT_METHOD.get(),
            split_selector: SPLIT_SELECTOR.get(),
            memory_padding_mb: MEMORY_PADDING_MB.get(),
            rng_seed: RNG_SEED.get(),
        }
    }
}

impl CegarOptions {
    pub fn validate(&self) -> Result<(), TaskError> {
        if self.max_states < 1 {
            return Err(TaskError::InvalidOptions(format!(
                "max_states must be at least 1, got {}",
                self.max_states
            )));
        }
        Ok(())
    }

    pub fn scope(&self) -> SplitScope {
        if self.singlefactsplit {
            SplitScope::OneMissedFact(self.split_selector)
        } else {
            SplitScope::AllMissedFacts
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let options = CegarOptions::default();
        assert!(options.validate().is_ok());
        assert!(options.max_time.is_none());
    }

    #[test]
    fn rejects_non_positive_max_states() {
        let mut options = CegarOptions::default();
        options.max_states = 0;
        assert!(options.validate().is_err());
    }

    #[test]
    fn single_fact_split_uses_configured_selector() {
        let mut options = CegarOptions::default();
        options.singlefactsplit = true;
        options.split_selector = SplitSelector::Random;
        assert_eq!(options.scope(), SplitScope::OneMissedFact(SplitSelector::Random));
    }
}
