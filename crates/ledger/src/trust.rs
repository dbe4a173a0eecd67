//! Trust-score arithmetic.
//!
//! A performance report blends a fresh composite score into the previous
//! trust value: `0.7·old + 0.3·(P + R + U + A)`, clamped to [0, 100].

use std::str::FromStr;

use anyhow::bail;

/// Violation severity with its fixed trust penalty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    High,
    Medium,
    Low,
}

impl Severity {
    pub fn penalty(self) -> f64 {
        match self {
            Self::High => 15.0,
            Self::Medium => 8.0,
            Self::Low => 3.0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::High => "HIGH",
            Self::Medium => "MEDIUM",
            Self::Low => "LOW",
        }
    }
}

impl FromStr for Severity {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "HIGH" => Ok(Self::High),
            "MEDIUM" => Ok(Self::Medium),
            "LOW" => Ok(Self::Low),
            other => bail!("unknown violation severity: {other}"),
        }
    }
}

/// Everything the recomputation needs, gathered by the sink.
#[derive(Debug, Clone, Copy)]
pub struct TrustInputs {
    pub previous_score: f64,
    pub promised_latency_ms: i32,
    pub observed_latency_ms: i32,
    /// Percentage in [0, 100].
    pub success_rate: f64,
    /// Selections of this model within the last 100 routing records.
    pub recent_selections: i64,
    pub days_since_registration: i64,
}

pub fn recompute_trust(inputs: &TrustInputs) -> f64 {
    // Performance (0-40): how the observed latency compares to the promise.
    let latency_ratio = if inputs.observed_latency_ms > 0 {
        f64::from(inputs.promised_latency_ms) / f64::from(inputs.observed_latency_ms)
    } else {
        1.0
    };
    let performance = (40.0 * latency_ratio).min(40.0);

    // Reliability (0-30).
    let reliability = inputs.success_rate / 100.0 * 30.0;

    // Usage (0-20).
    let usage = (inputs.recent_selections as f64 / 5.0).min(20.0);

    // Age (0-10).
    let age = (inputs.days_since_registration as f64 / 3.0).min(10.0);

    let fresh = performance + reliability + usage + age;
    (0.7 * inputs.previous_score + 0.3 * fresh).clamp(0.0, 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs() -> TrustInputs {
        TrustInputs {
            previous_score: 50.0,
            promised_latency_ms: 1000,
            observed_latency_ms: 1000,
            success_rate: 100.0,
            recent_selections: 100,
            days_since_registration: 300,
        }
    }

    #[test]
    fn perfect_report_blends_toward_one_hundred() {
        // P=40, R=30, U=20, A=10 → fresh=100 → 0.7·50 + 0.3·100 = 65
        let score = recompute_trust(&inputs());
        assert!((score - 65.0).abs() < 1e-9);
    }

    #[test]
    fn slow_responses_halve_the_performance_component() {
        let mut slow = inputs();
        slow.observed_latency_ms = 2000;
        // P=20 → fresh=80 → 0.7·50 + 0.3·80 = 59
        assert!((recompute_trust(&slow) - 59.0).abs() < 1e-9);
    }

    #[test]
    fn zero_observed_latency_counts_as_meeting_the_promise() {
        let mut degenerate = inputs();
        degenerate.observed_latency_ms = 0;
        assert!((recompute_trust(&degenerate) - 65.0).abs() < 1e-9);
    }

    #[test]
    fn usage_and_age_are_capped() {
        let mut capped = inputs();
        capped.recent_selections = 10_000;
        capped.days_since_registration = 10_000;
        assert!((recompute_trust(&capped) - 65.0).abs() < 1e-9);
    }

    #[test]
    fn result_is_clamped_into_range() {
        let mut bad = inputs();
        bad.previous_score = 0.0;
        bad.success_rate = 0.0;
        bad.recent_selections = 0;
        bad.days_since_registration = 0;
        bad.observed_latency_ms = 1_000_000;
        let score = recompute_trust(&bad);
        assert!((0.0..=100.0).contains(&score));
    }

    #[test]
    fn severity_parse_and_penalty() {
        assert_eq!("HIGH".parse::<Severity>().ok(), Some(Severity::High));
        assert_eq!("medium".parse::<Severity>().ok(), Some(Severity::Medium));
        assert!("CATASTROPHIC".parse::<Severity>().is_err());
        assert_eq!(Severity::High.penalty(), 15.0);
        assert_eq!(Severity::Medium.penalty(), 8.0);
        assert_eq!(Severity::Low.penalty(), 3.0);
    }
}
