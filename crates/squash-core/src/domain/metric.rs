//! Metric definitions and threshold policy.

use serde::{Deserialize, Serialize};
use squash_state::MetricRecord;

use super::error::ValidationError;

pub const MAX_CODE_LEN: usize = 16;
pub const MAX_UNITS_LEN: usize = 16;

/// Comparison operator defining the "better than" direction of a metric.
///
/// `<` means lower values are better: a value satisfies a threshold `t` when
/// `value < t`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Condition {
    #[default]
    #[serde(rename = "<")]
    Less,
    #[serde(rename = "<=")]
    LessOrEqual,
    #[serde(rename = ">")]
    Greater,
    #[serde(rename = ">=")]
    GreaterOrEqual,
}

impl Condition {
    pub fn parse(symbol: &str) -> Result<Self, ValidationError> {
        match symbol.trim() {
            "<" => Ok(Condition::Less),
            "<=" => Ok(Condition::LessOrEqual),
            ">" => Ok(Condition::Greater),
            ">=" => Ok(Condition::GreaterOrEqual),
            other => Err(ValidationError::InvalidCondition {
                condition: other.to_string(),
            }),
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Condition::Less => "<",
            Condition::LessOrEqual => "<=",
            Condition::Greater => ">",
            Condition::GreaterOrEqual => ">=",
        }
    }

    /// Whether `value` satisfies `threshold` under this operator.
    ///
    /// NaN satisfies nothing.
    pub fn satisfies(self, value: f64, threshold: f64) -> bool {
        match self {
            Condition::Less => value < threshold,
            Condition::LessOrEqual => value <= threshold,
            Condition::Greater => value > threshold,
            Condition::GreaterOrEqual => value >= threshold,
        }
    }
}

impl std::fmt::Display for Condition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.symbol())
    }
}

/// A validated, immutable metric definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    pub code: String,
    pub description: String,
    pub units: String,
    pub condition: Condition,
    /// Least strict acceptance bound
    pub minimum: f64,
    /// Target bound
    pub design: f64,
    /// Aspirational bound
    pub stretch: f64,
    /// User-facing requirement, compared independently
    pub user: f64,
}

/// Unvalidated metric definition as submitted by an administrator.
///
/// `condition` defaults to `<` when omitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricDefinition {
    #[serde(alias = "metric")]
    pub code: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub units: String,
    #[serde(default)]
    pub condition: Option<String>,
    pub minimum: f64,
    pub design: f64,
    pub stretch: f64,
    pub user: f64,
}

impl MetricDefinition {
    /// Validate into an immutable [`Metric`].
    pub fn validate(self) -> Result<Metric, ValidationError> {
        let code = self.code.trim().to_string();
        if code.is_empty() {
            return Err(ValidationError::EmptyField {
                field: "metric code".to_string(),
            });
        }
        check_len("metric code", &code, MAX_CODE_LEN)?;
        check_len("units", &self.units, MAX_UNITS_LEN)?;

        let condition = match self.condition.as_deref() {
            None => Condition::default(),
            Some(symbol) => Condition::parse(symbol)?,
        };

        for (tier, value) in [
            ("minimum", self.minimum),
            ("design", self.design),
            ("stretch", self.stretch),
            ("user", self.user),
        ] {
            if !value.is_finite() {
                return Err(ValidationError::NonFiniteThreshold {
                    tier: tier.to_string(),
                    value,
                });
            }
        }

        Ok(Metric {
            code,
            description: self.description,
            units: self.units,
            condition,
            minimum: self.minimum,
            design: self.design,
            stretch: self.stretch,
            user: self.user,
        })
    }
}

pub(crate) fn check_len(field: &str, value: &str, max: usize) -> Result<(), ValidationError> {
    let len = value.chars().count();
    if len > max {
        return Err(ValidationError::FieldTooLong {
            field: field.to_string(),
            max,
            len,
        });
    }
    Ok(())
}

impl From<&Metric> for MetricRecord {
    fn from(m: &Metric) -> Self {
        MetricRecord {
            code: m.code.clone(),
            description: m.description.clone(),
            units: m.units.clone(),
            condition: m.condition.symbol().to_string(),
            minimum: m.minimum,
            design: m.design,
            stretch: m.stretch,
            user: m.user,
        }
    }
}

impl TryFrom<MetricRecord> for Metric {
    type Error = ValidationError;

    fn try_from(r: MetricRecord) -> Result<Self, Self::Error> {
        MetricDefinition {
            code: r.code,
            description: r.description,
            units: r.units,
            condition: Some(r.condition),
            minimum: r.minimum,
            design: r.design,
            stretch: r.stretch,
            user: r.user,
        }
        .validate()
    }
}
