//! Normalizer: brings every observation to annual pay in the target currency,
//! adjusted to the request location's cost of living.

use chrono::NaiveDate;
use serde::Serialize;

use crate::reference::{CurrencyTable, LocationIndex};
use crate::sources::{ObservedPercentiles, PayPeriod, SourceError, SourceObservation};

/// An observation in common units.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedObservation {
    pub percentiles: ObservedPercentiles,
    pub median: f64,
    pub sample_size: u32,
    pub observation_date: NaiveDate,
    pub original_currency: String,
    pub original_period: PayPeriod,
    /// Combined currency × period × cost-of-living factor applied.
    pub conversion_factor: f64,
}

pub struct Normalizer<'a> {
    locations: &'a dyn LocationIndex,
    currencies: &'a dyn CurrencyTable,
    target_currency: &'a str,
}

impl<'a> Normalizer<'a> {
    pub fn new(
        locations: &'a dyn LocationIndex,
        currencies: &'a dyn CurrencyTable,
        target_currency: &'a str,
    ) -> Self {
        Self {
            locations,
            currencies,
            target_currency,
        }
    }

    /// Currency rate from `currency` into the target currency.
    pub fn currency_factor(&self, currency: &str) -> Result<f64, SourceError> {
        let from = self
            .currencies
            .usd_per_unit(currency)
            .ok_or_else(|| SourceError::Malformed(format!("unsupported currency '{currency}'")))?;
        let to = self.currencies.usd_per_unit(self.target_currency).ok_or_else(|| {
            SourceError::Malformed(format!(
                "target currency '{}' has no exchange rate",
                self.target_currency
            ))
        })?;
        Ok(from / to)
    }

    /// Cost-of-living factor moving data from where it was observed to the
    /// request location. National data (no location) sits at the 1.0 baseline.
    pub fn location_factor(&self, observed_in: Option<&str>, request_location: &str) -> f64 {
        let target = self.locations.cost_of_living_multiplier(request_location);
        match observed_in {
            Some(loc) if loc.trim().eq_ignore_ascii_case(request_location.trim()) => 1.0,
            Some(loc) => target / self.locations.cost_of_living_multiplier(loc),
            None => target,
        }
    }

    pub fn normalize(
        &self,
        observation: &SourceObservation,
        request_location: &str,
    ) -> Result<NormalizedObservation, SourceError> {
        let present: Vec<f64> = observation
            .percentiles
            .points()
            .iter()
            .flatten()
            .copied()
            .collect();
        if present.is_empty() {
            return Err(SourceError::Malformed("observation has no percentiles".into()));
        }
        if present.iter().any(|v| !v.is_finite() || *v <= 0.0) {
            return Err(SourceError::Malformed(
                "observation has non-positive or non-finite values".into(),
            ));
        }

        let factor = self.currency_factor(&observation.currency)?
            * observation.period.annualization_factor()
            * self.location_factor(observation.location.as_deref(), request_location);

        let percentiles = observation.percentiles.map(|v| v * factor);
        if !factor.is_finite() || percentiles.points().iter().flatten().any(|v| !v.is_finite()) {
            return Err(SourceError::Malformed(
                "observation overflows after normalization".into(),
            ));
        }
        let median = percentiles
            .median()
            .filter(|m| m.is_finite())
            .ok_or_else(|| SourceError::Malformed("observation has no median".into()))?;

        Ok(NormalizedObservation {
            percentiles,
            median,
            sample_size: observation.sample_size,
            observation_date: observation.observation_date,
            original_currency: observation.currency.trim().to_uppercase(),
            original_period: observation.period,
            conversion_factor: factor,
        })
    }
}
