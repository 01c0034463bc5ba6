//! Weighted Percentile Engine: combines scored sources into one percentile
//! distribution and derives the recommended range inside the grade band.

use crate::models::pricing::{PercentileSet, RecommendedRange};
use crate::models::taxonomy::GradeBand;
use crate::pricing::aggregator::{usable, SourceContribution};

pub const DEFAULT_MIN_SPREAD_RATIO: f64 = 0.20;

/// Weighted sum of each percentile point across usable sources. A source that
/// lacks a point contributes its own median there. The result is forced
/// monotone so p10 ≤ p25 ≤ p50 ≤ p75 ≤ p90 always holds.
pub fn combine(contributions: &[SourceContribution]) -> Option<PercentileSet> {
    let weighted: Vec<_> = usable(contributions)
        .filter(|c| c.weight > 0.0 && c.weight.is_finite())
        .filter_map(|c| c.observation.as_ref().map(|obs| (obs, c.weight)))
        .collect();
    let total_weight: f64 = weighted.iter().map(|(_, w)| w).sum();
    if total_weight <= 0.0 {
        return None;
    }

    // Weighted by share of the total, so each sum stays within the span of its inputs.
    let mut sums = [0.0_f64; 5];
    for (obs, weight) in &weighted {
        let share = weight / total_weight;
        for (sum, point) in sums.iter_mut().zip(obs.percentiles.points()) {
            *sum += point.unwrap_or(obs.median) * share;
        }
    }

    let mut running = f64::MIN;
    let points: Vec<f64> = sums
        .iter()
        .map(|s| {
            running = running.max(*s);
            running
        })
        .collect();

    Some(PercentileSet {
        p10: points[0],
        p25: points[1],
        p50: points[2],
        p75: points[3],
        p90: points[4],
    })
}

/// Recommended range from the interquartile spread with the median as target.
///
/// All three values are clamped into the grade band. A spread narrower than
/// `min_spread_ratio` of the midpoint is widened symmetrically; a widened
/// window that crosses a band edge slides back inside keeping its width, and
/// a band narrower than the required width yields the whole band.
pub fn recommend(p: &PercentileSet, band: &GradeBand, min_spread_ratio: f64) -> RecommendedRange {
    let clamp = |v: f64| v.clamp(band.min, band.max);

    let (mut min, mut max) = (clamp(p.p25), clamp(p.p75));
    let target = clamp(p.p50);
    let clamped_to_grade = min != p.p25 || max != p.p75 || target != p.p50;

    let midpoint = (min + max) / 2.0;
    let required = min_spread_ratio.max(0.0) * midpoint;
    let widened = max - min < required;

    if widened {
        min = midpoint - required / 2.0;
        max = midpoint + required / 2.0;
        if band.max - band.min <= required {
            min = band.min;
            max = band.max;
        } else if min < band.min {
            max += band.min - min;
            min = band.min;
        } else if max > band.max {
            min -= max - band.max;
            max = band.max;
        }
        min = min.max(band.min);
        max = max.min(band.max).max(min);
    }

    RecommendedRange {
        min,
        max,
        target: target.clamp(min, max),
        clamped_to_grade,
        widened,
        grade: band.grade.clone(),
        grade_min: band.min,
        grade_max: band.max,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::pricing::SourceStatus;
    use crate::pricing::normalizer::NormalizedObservation;
    use crate::reference::fixtures;
    use crate::sources::{ObservedPercentiles, PayPeriod, SourceKind};
    use crate::testing::as_of;

    fn contribution(points: [Option<f64>; 5], weight: f64) -> SourceContribution {
        let percentiles = ObservedPercentiles::from_points(points);
        SourceContribution {
            name: "s".into(),
            kind: SourceKind::JobBoard,
            status: SourceStatus::Used,
            observation: Some(NormalizedObservation {
                median: percentiles.median().unwrap(),
                percentiles,
                sample_size: 50,
                observation_date: as_of(),
                original_currency: "USD".into(),
                original_period: PayPeriod::Annual,
                conversion_factor: 1.0,
            }),
            match_level: None,
            quality_score: 1.0,
            recency_factor: 1.0,
            base_weight: weight,
            raw_weight: weight,
            weight,
        }
    }

    fn median(v: f64, weight: f64) -> SourceContribution {
        contribution([None, None, Some(v), None, None], weight)
    }

    fn set(p: [f64; 5]) -> PercentileSet {
        PercentileSet {
            p10: p[0],
            p25: p[1],
            p50: p[2],
            p75: p[3],
            p90: p[4],
        }
    }

    #[test]
    fn test_weighted_median_inside_band_is_not_clamped() {
        let combined = combine(&[
            median(70000.0, 0.5),
            median(80000.0, 0.3),
            median(120000.0, 0.2),
        ])
        .unwrap();
        assert!((combined.p50 - 83000.0).abs() < 1e-6);

        let range = recommend(&combined, &fixtures::band("G7", 60000.0, 95000.0, 7), 0.2);
        assert!((range.target - 83000.0).abs() < 1e-6);
        assert!(!range.clamped_to_grade);
    }

    #[test]
    fn test_low_market_clamps_to_band_floor_and_widens() {
        let combined = combine(&[median(50000.0, 0.6), median(50000.0, 0.4)]).unwrap();
        let range = recommend(&combined, &fixtures::band("G7", 60000.0, 95000.0, 7), 0.2);
        assert!(range.clamped_to_grade);
        assert!(range.widened);
        assert_eq!(range.target, 60000.0);
        assert_eq!(range.min, 60000.0);
        assert!((range.max - 72000.0).abs() < 1e-9);
    }

    #[test]
    fn test_missing_points_fall_back_to_source_median() {
        let combined = combine(&[
            contribution([Some(60.0), Some(70.0), Some(80.0), Some(90.0), Some(100.0)], 0.5),
            median(80.0, 0.5),
        ])
        .unwrap();
        assert!((combined.p10 - 70.0).abs() < 1e-9);
        assert!((combined.p90 - 90.0).abs() < 1e-9);
    }

    #[test]
    fn test_combined_points_are_monotone() {
        // Low-p50 median-only source pulls the middle below the neighbours.
        let combined = combine(&[
            contribution([Some(100.0), Some(100.0), None, Some(100.0), Some(100.0)], 0.5),
            contribution([Some(100.0), Some(100.0), Some(10.0), Some(100.0), Some(100.0)], 0.5),
        ])
        .unwrap();
        assert!(combined.is_ordered());
        assert_eq!(combined.p50, combined.p25);
    }

    #[test]
    fn test_unusable_sources_are_ignored() {
        let mut dead = median(1_000_000.0, 0.0);
        dead.status = SourceStatus::Unavailable {
            reason: "down".into(),
        };
        let combined = combine(&[dead, median(80000.0, 1.0)]).unwrap();
        assert_eq!(combined.p50, 80000.0);
        assert!(combine(&[]).is_none());
    }

    #[test]
    fn test_natural_spread_is_kept() {
        let range = recommend(
            &set([65000.0, 70000.0, 80000.0, 90000.0, 95000.0]),
            &fixtures::band("G7", 60000.0, 95000.0, 7),
            0.2,
        );
        assert_eq!((range.min, range.max, range.target), (70000.0, 90000.0, 80000.0));
        assert!(!range.widened);
        assert!(!range.clamped_to_grade);
    }

    #[test]
    fn test_narrow_spread_widens_symmetrically_inside_band() {
        let range = recommend(
            &set([79000.0, 79000.0, 80000.0, 81000.0, 81000.0]),
            &fixtures::band("G7", 60000.0, 95000.0, 7),
            0.2,
        );
        assert!(range.widened);
        assert!((range.min - 72000.0).abs() < 1e-9);
        assert!((range.max - 88000.0).abs() < 1e-9);
        assert_eq!(range.target, 80000.0);
    }

    #[test]
    fn test_widening_near_ceiling_slides_down() {
        let range = recommend(
            &set([93000.0, 94000.0, 94500.0, 95000.0, 99000.0]),
            &fixtures::band("G7", 60000.0, 95000.0, 7),
            0.2,
        );
        assert_eq!(range.max, 95000.0);
        assert!(range.min >= 60000.0);
        assert!((range.max - range.min) >= 0.2 * 94500.0 - 1e-6);
        assert!(range.target <= range.max && range.target >= range.min);
    }

    #[test]
    fn test_band_narrower_than_required_spread_uses_whole_band() {
        let range = recommend(
            &set([100.0, 100.0, 100.0, 100.0, 100.0]),
            &fixtures::band("N", 100.0, 105.0, 1),
            0.2,
        );
        assert_eq!((range.min, range.max), (100.0, 105.0));
    }

    #[test]
    fn test_high_market_clamps_to_ceiling() {
        let range = recommend(
            &set([150000.0, 160000.0, 170000.0, 180000.0, 190000.0]),
            &fixtures::band("G7", 60000.0, 95000.0, 7),
            0.2,
        );
        assert!(range.clamped_to_grade);
        assert!(range.max <= 95000.0 && range.min >= 60000.0);
        assert_eq!(range.target, 95000.0);
    }
}
