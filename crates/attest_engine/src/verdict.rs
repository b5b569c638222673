//! Verdict resolver (spec §4.10).

use crate::error::EngineError;
use crate::rounding::round_half_to_even;
use attest_protocol::Verdict;

/// Resolve a verdict and exception rate from population/exception counts and
/// the effective materiality threshold (the max across a specification's
/// assertions). Returns [`EngineError::ZeroPopulation`] when the population,
/// after filters, had no rows — a silent `PASS` on empty input would mask a
/// broken upstream feed.
pub fn resolve(
    total_population: u64,
    exception_count: u64,
    effective_threshold_percent: f64,
) -> Result<(Verdict, f64), EngineError> {
    if total_population == 0 {
        return Err(EngineError::ZeroPopulation);
    }

    let raw_rate = (exception_count as f64 / total_population as f64) * 100.0;
    let exception_rate_percent = round_half_to_even(raw_rate, 2);

    let verdict = if raw_rate <= effective_threshold_percent {
        Verdict::Pass
    } else {
        Verdict::Fail
    };

    Ok((verdict, exception_rate_percent))
}

/// `max(materiality_threshold_percent)` across a specification's assertions
/// (spec §4.10).
pub fn effective_threshold(thresholds: impl IntoIterator<Item = f64>) -> f64 {
    thresholds.into_iter().fold(0.0f64, f64::max)
}
