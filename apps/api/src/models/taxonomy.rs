use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A standardized job-taxonomy entry. Read-only reference data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct StandardizedJob {
    pub code: String,
    pub title: String,
    pub family: String,
    pub description: String,
    /// Numeric complexity / position class. Compared against the grade's class.
    pub position_class: i32,
    pub career_level: String,
}

impl StandardizedJob {
    /// Text the similarity provider compares the request against.
    pub fn reference_text(&self) -> String {
        format!("{}\n{}", self.title, self.description)
    }
}

/// Organizational pay constraint for a grade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct GradeBand {
    pub grade: String,
    pub min: f64,
    pub max: f64,
    pub position_class: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct LocationMultiplier {
    pub location: String,
    pub multiplier: f64,
}

/// Exchange rate expressed as US dollars per one unit of `currency`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CurrencyRate {
    pub currency: String,
    pub usd_per_unit: f64,
}
