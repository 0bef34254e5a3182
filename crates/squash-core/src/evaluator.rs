//! Measurement evaluator.
//!
//! Scores a value against a [`Metric`]'s threshold tiers. The metric's
//! `condition` gives the "better than" direction; a value satisfies a tier
//! when `value <condition> threshold` holds.
//!
//! | satisfies design | satisfies minimum | verdict |
//! |---|---|---|
//! | yes | - | PASS (tier `stretch` if it also satisfies stretch, else `design`) |
//! | no | yes | WARN |
//! | no | no | FAIL |
//!
//! The `user` bound is compared independently and reported as `meets_user`.
//! Evaluation is a pure function of `(value, metric)`.

use std::collections::BTreeMap;

use crate::domain::{Metric, ResolvedMeasurement, ThresholdTier, Verdict, VerdictLevel};
use crate::job_store::CommitReceipt;

/// Evaluate `value` against `metric`.
pub fn evaluate(value: f64, metric: &Metric) -> Verdict {
    let cond = metric.condition;
    let meets_user = cond.satisfies(value, metric.user);

    let (level, tier) = if cond.satisfies(value, metric.design) {
        let tier = if cond.satisfies(value, metric.stretch) {
            ThresholdTier::Stretch
        } else {
            ThresholdTier::Design
        };
        (VerdictLevel::Pass, tier)
    } else if cond.satisfies(value, metric.minimum) {
        (VerdictLevel::Warn, ThresholdTier::Minimum)
    } else {
        (VerdictLevel::Fail, ThresholdTier::Minimum)
    };

    Verdict {
        level,
        tier,
        meets_user,
    }
}

/// Evaluate every measurement, keeping the verdict of the last measurement
/// per metric code.
pub fn evaluate_all(measurements: &[ResolvedMeasurement]) -> BTreeMap<String, Verdict> {
    measurements
        .iter()
        .map(|m| (m.metric.code.clone(), evaluate(m.value, &m.metric)))
        .collect()
}

/// Score every measurement of a freshly committed job.
pub fn evaluate_job(receipt: &CommitReceipt) -> BTreeMap<String, Verdict> {
    evaluate_all(&receipt.measurements)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::domain::Condition;

    fn metric(condition: Condition) -> Metric {
        Metric {
            code: "AM1".to_string(),
            description: String::new(),
            units: "milliarcsec".to_string(),
            condition,
            minimum: 10.0,
            design: 5.0,
            stretch: 2.0,
            user: 1.0,
        }
    }

    fn higher_is_better(condition: Condition) -> Metric {
        Metric {
            code: "PF1".to_string(),
            description: String::new(),
            units: "percent".to_string(),
            condition,
            minimum: 50.0,
            design: 80.0,
            stretch: 95.0,
            user: 90.0,
        }
    }

    #[test]
    fn threshold_ordering_lower_is_better() {
        let m = metric(Condition::Less);
        assert_eq!(evaluate(12.0, &m).level, VerdictLevel::Fail);
        assert_eq!(evaluate(7.0, &m).level, VerdictLevel::Warn);
        assert_eq!(evaluate(4.0, &m).level, VerdictLevel::Pass);
        assert_eq!(evaluate(1.0, &m).level, VerdictLevel::Pass);
    }

    #[test]
    fn pass_reports_the_tier_met() {
        let m = metric(Condition::Less);
        assert_eq!(evaluate(4.0, &m).tier, ThresholdTier::Design);
        assert_eq!(evaluate(1.0, &m).tier, ThresholdTier::Stretch);
        assert_eq!(evaluate(7.0, &m).tier, ThresholdTier::Minimum);
    }

    #[test]
    fn boundaries_follow_strictness_of_operator() {
        let strict = metric(Condition::Less);
        assert_eq!(evaluate(5.0, &strict).level, VerdictLevel::Warn);
        assert_eq!(evaluate(10.0, &strict).level, VerdictLevel::Fail);

        let inclusive = metric(Condition::LessOrEqual);
        assert_eq!(evaluate(5.0, &inclusive).level, VerdictLevel::Pass);
        assert_eq!(evaluate(10.0, &inclusive).level, VerdictLevel::Warn);
    }

    #[test]
    fn higher_is_better_direction() {
        let m = higher_is_better(Condition::GreaterOrEqual);
        assert_eq!(evaluate(40.0, &m).level, VerdictLevel::Fail);
        assert_eq!(evaluate(60.0, &m).level, VerdictLevel::Warn);
        assert_eq!(evaluate(80.0, &m).level, VerdictLevel::Pass);
        assert_eq!(evaluate(99.0, &m).tier, ThresholdTier::Stretch);

        let strict = higher_is_better(Condition::Greater);
        assert_eq!(evaluate(80.0, &strict).level, VerdictLevel::Warn);
    }

    #[test]
    fn user_bound_is_independent() {
        let m = metric(Condition::Less);
        assert!(evaluate(0.5, &m).meets_user);
        assert!(!evaluate(1.5, &m).meets_user);
        assert_eq!(evaluate(1.5, &m).level, VerdictLevel::Pass);

        let mut odd = metric(Condition::Less);
        odd.user = 20.0;
        let verdict = evaluate(15.0, &odd);
        assert_eq!(verdict.level, VerdictLevel::Fail);
        assert!(verdict.meets_user);
    }

    #[test]
    fn nan_fails_everything() {
        let verdict = evaluate(f64::NAN, &metric(Condition::Less));
        assert_eq!(verdict.level, VerdictLevel::Fail);
        assert!(!verdict.meets_user);
    }

    #[test]
    fn evaluation_is_deterministic() {
        let m = metric(Condition::Less);
        for value in [-3.0, 0.0, 1.0, 2.0, 4.99, 5.0, 7.5, 10.0, 1e9] {
            let first = evaluate(value, &m);
            for _ in 0..10 {
                assert_eq!(evaluate(value, &m), first);
            }
        }
    }

    #[test]
    fn verdict_is_monotonic_in_better_direction() {
        for condition in [
            Condition::Less,
            Condition::LessOrEqual,
            Condition::Greater,
            Condition::GreaterOrEqual,
        ] {
            let m = match condition {
                Condition::Less | Condition::LessOrEqual => metric(condition),
                _ => higher_is_better(condition),
            };
            let lower_is_better = matches!(condition, Condition::Less | Condition::LessOrEqual);

            // Walk from worst to best; the level must never drop.
            let mut values: Vec<f64> = (-20..=120).map(|v| v as f64 * 0.5).collect();
            if lower_is_better {
                values.reverse();
            }
            let mut previous = VerdictLevel::Fail;
            for value in values {
                let level = evaluate(value, &m).level;
                assert!(level >= previous, "{condition}: {value} regressed");
                previous = level;
            }
        }
    }

    #[test]
    fn evaluate_all_keeps_last_measurement_per_metric() {
        let am1 = Arc::new(metric(Condition::Less));
        let measurements = vec![
            ResolvedMeasurement {
                metric: am1.clone(),
                value: 12.0,
            },
            ResolvedMeasurement {
                metric: am1,
                value: 4.0,
            },
        ];
        let verdicts = evaluate_all(&measurements);
        assert_eq!(verdicts.len(), 1);
        assert_eq!(verdicts["AM1"].level, VerdictLevel::Pass);
    }
}
