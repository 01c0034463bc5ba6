//! Reference data: taxonomy, grade bands, location index and currency rates.
//!
//! Loaded once at startup and shared read-only (`Arc<ReferenceData>`). Components
//! receive it through the narrow lookup traits below so tests can inject fixtures.

pub mod loader;

use std::collections::HashMap;

use crate::models::taxonomy::{CurrencyRate, GradeBand, LocationMultiplier, StandardizedJob};

/// Multiplier applied to locations missing from the index.
pub const DEFAULT_COL_MULTIPLIER: f64 = 1.0;

pub trait LocationIndex: Send + Sync {
    /// Cost-of-living multiplier relative to the national baseline (1.0).
    /// Unknown locations return `DEFAULT_COL_MULTIPLIER`.
    fn cost_of_living_multiplier(&self, location: &str) -> f64;
}

pub trait GradeBands: Send + Sync {
    fn bounds(&self, grade: &str) -> Option<GradeBand>;
}

pub trait CurrencyTable: Send + Sync {
    fn usd_per_unit(&self, currency: &str) -> Option<f64>;
}

#[derive(Debug, Clone, Default)]
pub struct ReferenceData {
    taxonomy: Vec<StandardizedJob>,
    grade_bands: HashMap<String, GradeBand>,
    locations: HashMap<String, f64>,
    currency_rates: HashMap<String, f64>,
}

fn location_key(location: &str) -> String {
    location.trim().to_lowercase()
}

fn grade_key(grade: &str) -> String {
    grade.trim().to_uppercase()
}

fn currency_key(currency: &str) -> String {
    currency.trim().to_uppercase()
}

impl ReferenceData {
    pub fn new(
        taxonomy: Vec<StandardizedJob>,
        grade_bands: Vec<GradeBand>,
        locations: Vec<LocationMultiplier>,
        currency_rates: Vec<CurrencyRate>,
    ) -> Self {
        let mut currencies: HashMap<String, f64> = currency_rates
            .into_iter()
            .map(|r| (currency_key(&r.currency), r.usd_per_unit))
            .collect();
        currencies.entry("USD".to_string()).or_insert(1.0);

        Self {
            taxonomy,
            grade_bands: grade_bands
                .into_iter()
                .map(|b| (grade_key(&b.grade), b))
                .collect(),
            locations: locations
                .into_iter()
                .map(|l| (location_key(&l.location), l.multiplier))
                .collect(),
            currency_rates: currencies,
        }
    }

    pub fn taxonomy(&self) -> &[StandardizedJob] {
        &self.taxonomy
    }

    pub fn job(&self, code: &str) -> Option<&StandardizedJob> {
        self.taxonomy.iter().find(|j| j.code.eq_ignore_ascii_case(code.trim()))
    }
}

impl LocationIndex for ReferenceData {
    fn cost_of_living_multiplier(&self, location: &str) -> f64 {
        self.locations
            .get(&location_key(location))
            .copied()
            .unwrap_or(DEFAULT_COL_MULTIPLIER)
    }
}

impl GradeBands for ReferenceData {
    fn bounds(&self, grade: &str) -> Option<GradeBand> {
        self.grade_bands.get(&grade_key(grade)).cloned()
    }
}

impl CurrencyTable for ReferenceData {
    fn usd_per_unit(&self, currency: &str) -> Option<f64> {
        self.currency_rates.get(&currency_key(currency)).copied()
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::reference;
    use super::*;

    #[test]
    fn test_unknown_location_uses_default_multiplier() {
        let data = reference();
        assert_eq!(data.cost_of_living_multiplier("Nowhere, ZZ"), DEFAULT_COL_MULTIPLIER);
    }

    #[test]
    fn test_location_lookup_is_case_and_space_insensitive() {
        let data = reference();
        assert_eq!(data.cost_of_living_multiplier("  san francisco, ca "), 1.4);
    }

    #[test]
    fn test_grade_bounds_lookup() {
        let data = reference();
        let band = data.bounds("g7").unwrap();
        assert_eq!(band.min, 60_000.0);
        assert_eq!(band.max, 95_000.0);
        assert!(data.bounds("G99").is_none());
    }

    #[test]
    fn test_usd_is_always_present() {
        let data = reference();
        assert_eq!(data.usd_per_unit("usd"), Some(1.0));
        assert_eq!(data.usd_per_unit("EUR"), Some(1.1));
        assert!(data.usd_per_unit("XYZ").is_none());
    }

    #[test]
    fn test_job_lookup_by_code() {
        let data = reference();
        assert_eq!(data.job("eng-data-3").unwrap().title, "Data Engineer III");
        assert!(data.job("NOPE").is_none());
    }
}
