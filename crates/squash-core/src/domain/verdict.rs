//! Verdicts and the events that carry them.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use squash_state::JobId;

/// Classification of a measured value against a metric's thresholds.
///
/// Ordered from worst to best so `Fail < Warn < Pass`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum VerdictLevel {
    Fail,
    Warn,
    Pass,
}

/// The strictest threshold tier the value was compared against and met,
/// or `Minimum` when it met none.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThresholdTier {
    Minimum,
    Design,
    Stretch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Verdict {
    pub level: VerdictLevel,
    pub tier: ThresholdTier,
    /// Whether the value satisfies the independent user-facing bound
    pub meets_user: bool,
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let level = match self.level {
            VerdictLevel::Pass => "PASS",
            VerdictLevel::Warn => "WARN",
            VerdictLevel::Fail => "FAIL",
        };
        let tier = match self.tier {
            ThresholdTier::Minimum => "minimum",
            ThresholdTier::Design => "design",
            ThresholdTier::Stretch => "stretch",
        };
        write!(f, "{level} ({tier}")?;
        if self.meets_user {
            write!(f, ", meets user")?;
        }
        write!(f, ")")
    }
}

/// Emitted once per successful job commit that touched at least one metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobCommitted {
    pub job_id: JobId,
    /// Distinct metric codes measured by the job
    pub metric_codes: BTreeSet<String>,
    /// Verdict of the last measurement of each touched metric
    pub verdicts: BTreeMap<String, Verdict>,
}
