//! Output Composer: assembles the final pricing result from the stage outputs.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::pricing::{
    ConfidenceReport, MatchMethod, MatchSummary, PercentileSet, PricingResult, RecommendedRange,
    Scenario, ScenarioRange, SourceSummary,
};
use crate::models::taxonomy::GradeBand;
use crate::pricing::aggregator::SourceContribution;

pub const ANNUAL_PERIOD: &str = "annual";

/// Everything the composer reads. Built by the engine once every stage ran.
pub struct Composition<'a> {
    pub request_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub currency: &'a str,
    pub band: &'a GradeBand,
    pub job_match: MatchSummary,
    pub contributions: &'a [SourceContribution],
    pub percentiles: PercentileSet,
    pub range: RecommendedRange,
    pub confidence: ConfidenceReport,
}

pub fn compose(c: Composition<'_>) -> PricingResult {
    let sources = ordered_sources(c.contributions);
    let alternative_scenarios = scenarios(&c.percentiles, c.band);
    let warnings = warnings(&c.job_match, &sources, &c.range, &c.confidence);

    PricingResult {
        request_id: c.request_id,
        generated_at: c.generated_at,
        currency: c.currency.to_string(),
        period: ANNUAL_PERIOD.to_string(),
        recommended_range: c.range,
        percentiles: c.percentiles,
        confidence: c.confidence,
        sources,
        alternative_scenarios,
        job_match: c.job_match,
        warnings,
    }
}

/// Contribution breakdown, heaviest first, name as tie-break.
pub fn ordered_sources(contributions: &[SourceContribution]) -> Vec<SourceSummary> {
    let mut sources: Vec<SourceSummary> = contributions
        .iter()
        .map(SourceContribution::summary)
        .collect();
    sources.sort_by(|a, b| {
        b.weight
            .partial_cmp(&a.weight)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.name.cmp(&b.name))
    });
    sources
}

/// Conservative, competitive and premium positioning off the combined
/// distribution. Scenarios may leave the grade band; they carry a note then.
pub fn scenarios(p: &PercentileSet, band: &GradeBand) -> Vec<Scenario> {
    [
        ("conservative", p.p10, p.p25),
        ("competitive", p.p50, p.p75),
        ("premium", p.p75, p.p90),
    ]
    .into_iter()
    .map(|(label, min, max)| Scenario {
        label: label.to_string(),
        range: ScenarioRange { min, max },
        note: band_note(min, max, band),
    })
    .collect()
}

fn band_note(min: f64, max: f64, band: &GradeBand) -> Option<String> {
    match (min < band.min, max > band.max) {
        (true, true) => Some(format!(
            "spans beyond grade {} band [{:.0}, {:.0}]",
            band.grade, band.min, band.max
        )),
        (true, false) => Some(format!(
            "falls below grade {} minimum of {:.0}",
            band.grade, band.min
        )),
        (false, true) => Some(format!(
            "exceeds grade {} maximum of {:.0}",
            band.grade, band.max
        )),
        (false, false) => None,
    }
}

fn warnings(
    job_match: &MatchSummary,
    sources: &[SourceSummary],
    range: &RecommendedRange,
    confidence: &ConfidenceReport,
) -> Vec<String> {
    let mut warnings = Vec::new();

    match job_match.method {
        MatchMethod::None => warnings.push(
            "No confident taxonomy match; priced from free-text capable sources only".to_string(),
        ),
        MatchMethod::EmbeddingOnly => warnings.push(
            "Job match was not confirmed by the reasoning stage; similarity only".to_string(),
        ),
        MatchMethod::Reasoned => {}
    }

    let unavailable: Vec<&str> = sources
        .iter()
        .filter(|s| s.weight <= 0.0)
        .map(|s| s.name.as_str())
        .collect();
    if !unavailable.is_empty() {
        warnings.push(format!(
            "{} of {} sources contributed no data: {}",
            unavailable.len(),
            sources.len(),
            unavailable.join(", ")
        ));
    }

    if range.clamped_to_grade {
        warnings.push(format!(
            "Market data fell outside grade {} band; recommendation clamped to [{:.0}, {:.0}]",
            range.grade, range.grade_min, range.grade_max
        ));
    }
    if range.widened {
        warnings.push(
            "Market spread was unusually narrow; range widened to the minimum spread".to_string(),
        );
    }
    if confidence.requires_manual_review {
        warnings.push(format!(
            "Low confidence ({:.1}); manual review recommended",
            confidence.score
        ));
    }
    warnings
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::models::pricing::{ConfidenceFactors, ConfidenceLevel, SourceStatus};
    use crate::reference::fixtures;
    use crate::sources::SourceKind;

    fn contribution(name: &str, weight: f64) -> SourceContribution {
        SourceContribution {
            name: name.into(),
            kind: SourceKind::JobBoard,
            status: if weight > 0.0 {
                SourceStatus::Used
            } else {
                SourceStatus::Unavailable {
                    reason: "down".into(),
                }
            },
            observation: None,
            match_level: None,
            quality_score: 0.5,
            recency_factor: 1.0,
            base_weight: 0.2,
            raw_weight: weight,
            weight,
        }
    }

    fn percentiles() -> PercentileSet {
        PercentileSet {
            p10: 55000.0,
            p25: 65000.0,
            p50: 75000.0,
            p75: 90000.0,
            p90: 105000.0,
        }
    }

    fn confidence(level: ConfidenceLevel, score: f64) -> ConfidenceReport {
        ConfidenceReport {
            score,
            level,
            factors: ConfidenceFactors {
                job_match: 0.0,
                source_quality: 0.0,
                sample_size: 0.0,
                consistency: 0.0,
            },
            requires_manual_review: level == ConfidenceLevel::Low,
        }
    }

    fn composition<'a>(
        band: &'a GradeBand,
        contributions: &'a [SourceContribution],
        method: MatchMethod,
        level: ConfidenceLevel,
    ) -> Composition<'a> {
        Composition {
            request_id: Uuid::nil(),
            generated_at: Utc.timestamp_opt(1_790_000_000, 0).unwrap(),
            currency: "USD",
            band,
            job_match: MatchSummary {
                taxonomy_code: None,
                title: None,
                confidence: 0.0,
                method,
                justification: String::new(),
            },
            contributions,
            percentiles: percentiles(),
            range: RecommendedRange {
                min: 65000.0,
                max: 90000.0,
                target: 75000.0,
                clamped_to_grade: false,
                widened: false,
                grade: band.grade.clone(),
                grade_min: band.min,
                grade_max: band.max,
            },
            confidence: confidence(level, 85.0),
        }
    }

    #[test]
    fn test_sources_sorted_by_weight_then_name() {
        let sorted = ordered_sources(&[
            contribution("review_site", 0.2),
            contribution("job_board", 0.2),
            contribution("job_library", 0.6),
            contribution("applicant_expectations", 0.0),
        ]);
        let names: Vec<&str> = sorted.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["job_library", "job_board", "review_site", "applicant_expectations"]
        );
    }

    #[test]
    fn test_scenarios_note_band_overruns() {
        let band = fixtures::band("G7", 60000.0, 95000.0, 7);
        let s = scenarios(&percentiles(), &band);
        assert_eq!(s.len(), 3);
        assert_eq!(s[0].label, "conservative");
        assert_eq!(
            s[0].range,
            ScenarioRange {
                min: 55000.0,
                max: 65000.0
            }
        );
        assert!(s[0].note.as_deref().unwrap().contains("below"));
        assert!(s[1].note.is_none());
        assert!(s[2].note.as_deref().unwrap().contains("exceeds grade G7 maximum of 95000"));
    }

    #[test]
    fn test_clean_result_has_no_warnings() {
        let band = fixtures::band("G7", 60000.0, 95000.0, 7);
        let contributions = [contribution("job_library", 1.0)];
        let result = compose(composition(
            &band,
            &contributions,
            MatchMethod::Reasoned,
            ConfidenceLevel::High,
        ));
        assert!(result.warnings.is_empty());
        assert_eq!(result.period, "annual");
        assert_eq!(result.currency, "USD");
    }

    #[test]
    fn test_degraded_result_lists_warnings() {
        let band = fixtures::band("G7", 60000.0, 95000.0, 7);
        let contributions = [contribution("job_board", 1.0), contribution("job_library", 0.0)];
        let mut c = composition(&band, &contributions, MatchMethod::None, ConfidenceLevel::Low);
        c.range.clamped_to_grade = true;
        let result = compose(c);
        assert_eq!(result.warnings.len(), 4);
        assert!(result.warnings[1].contains("1 of 2 sources"));
        assert!(result.warnings[1].ends_with("job_library"));
    }

    #[test]
    fn test_result_serializes_match_key() {
        let band = fixtures::band("G7", 60000.0, 95000.0, 7);
        let contributions = [contribution("job_library", 1.0)];
        let result = compose(composition(
            &band,
            &contributions,
            MatchMethod::Reasoned,
            ConfidenceLevel::High,
        ));
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["match"]["method"], "reasoned");
        assert_eq!(json["sources"][0]["status"], "used");
        assert_eq!(json["alternative_scenarios"].as_array().unwrap().len(), 3);
    }
}
