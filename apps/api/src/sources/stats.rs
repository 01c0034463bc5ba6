//! Percentile summaries for connectors that hold raw salary records.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use tracing::debug;

use crate::sources::{ObservedPercentiles, PayPeriod, SourceObservation};

/// One raw annual salary record.
#[derive(Debug, Clone, PartialEq)]
pub struct SalarySample {
    pub amount: f64,
    pub currency: String,
    pub recorded_on: NaiveDate,
}

/// Linear-interpolated percentile of an ascending slice. `q` in [0, 1].
pub fn percentile(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let rank = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

/// p10/p25/p50/p75/p90 of the positive, finite values.
pub fn summarize(values: &[f64]) -> Option<ObservedPercentiles> {
    let mut sorted: Vec<f64> = values
        .iter()
        .copied()
        .filter(|v| v.is_finite() && *v > 0.0)
        .collect();
    if sorted.is_empty() {
        return None;
    }
    sorted.sort_by(f64::total_cmp);

    Some(ObservedPercentiles {
        p10: percentile(&sorted, 0.10),
        p25: percentile(&sorted, 0.25),
        p50: percentile(&sorted, 0.50),
        p75: percentile(&sorted, 0.75),
        p90: percentile(&sorted, 0.90),
    })
}

/// Builds an annual observation from raw records.
///
/// Records are summarized in their most common currency; records in other
/// currencies are dropped. The observation date is the newest record's date.
pub fn observation_from_samples(
    samples: &[SalarySample],
    location: Option<&str>,
) -> Option<SourceObservation> {
    let mut by_currency: BTreeMap<String, usize> = BTreeMap::new();
    for s in samples {
        *by_currency.entry(s.currency.trim().to_uppercase()).or_default() += 1;
    }
    // BTreeMap order makes ties resolve to the alphabetically first currency.
    let (currency, _) = by_currency
        .iter()
        .fold(None::<(&String, usize)>, |best, (c, n)| match best {
            Some((_, best_n)) if best_n >= *n => best,
            _ => Some((c, *n)),
        })?;

    let kept: Vec<&SalarySample> = samples
        .iter()
        .filter(|s| s.currency.trim().eq_ignore_ascii_case(currency))
        .collect();
    if kept.len() < samples.len() {
        debug!(
            "Dropped {} records not in dominant currency {}",
            samples.len() - kept.len(),
            currency
        );
    }

    let amounts: Vec<f64> = kept.iter().map(|s| s.amount).collect();
    let percentiles = summarize(&amounts)?;
    let usable = amounts.iter().filter(|v| v.is_finite() && **v > 0.0).count();
    let observation_date = kept.iter().map(|s| s.recorded_on).max()?;

    Some(SourceObservation {
        percentiles,
        sample_size: usable as u32,
        observation_date,
        currency: currency.clone(),
        period: PayPeriod::Annual,
        location: location.map(str::to_string),
    })
}
