//! Quality score: a bounded 0–100 heuristic over popularity, classification,
//! documentation, recency, maintenance and licensing.
//!
//! The thresholds live in a single versioned [`WeightTable`]. Every signal is
//! optional and a missing signal contributes nothing, so a record with no
//! data at all scores 0.

use chrono::{DateTime, Utc};

use crate::models::Classification;

/// Point tables for every signal. Step tables are `(threshold, points)`
/// pairs checked in order; the first matching threshold wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeightTable {
    pub version: &'static str,
    /// `stars >= threshold`
    pub stars: &'static [(u64, u32)],
    /// Points for any non-zero star count below every threshold.
    pub stars_floor: u32,
    pub official: u32,
    pub reference: u32,
    pub community: u32,
    pub has_readme: u32,
    pub has_capabilities: u32,
    /// `days_since_push < threshold`
    pub recency_days: &'static [(i64, u32)],
    /// `open_issues < threshold`
    pub open_issues: &'static [(u64, u32)],
    pub permissive_license: u32,
    pub other_license: u32,
}

pub const WEIGHTS_V1: WeightTable = WeightTable {
    version: "v1",
    stars: &[(50_000, 30), (10_000, 27), (1_000, 22), (100, 15), (10, 8)],
    stars_floor: 4,
    official: 15,
    reference: 12,
    community: 7,
    has_readme: 10,
    has_capabilities: 5,
    recency_days: &[(30, 20), (90, 15), (180, 10), (365, 5)],
    open_issues: &[(5, 10), (20, 6), (50, 3)],
    permissive_license: 10,
    other_license: 5,
};

const PERMISSIVE_LICENSES: &[&str] = &["mit", "apache", "bsd"];

/// Signals available for one record.
#[derive(Debug, Clone, Default)]
pub struct ScoreInputs {
    pub stars: Option<u64>,
    pub classification: Option<Classification>,
    pub has_readme: bool,
    pub has_capabilities: bool,
    pub pushed_at: Option<DateTime<Utc>>,
    pub open_issues: Option<u64>,
    pub license: Option<String>,
}

impl WeightTable {
    pub fn score(&self, inputs: &ScoreInputs, now: DateTime<Utc>) -> u8 {
        let total = self.stars_points(inputs.stars)
            + self.classification_points(inputs.classification)
            + self.documentation_points(inputs.has_readme, inputs.has_capabilities)
            + self.recency_points(inputs.pushed_at, now)
            + self.issue_points(inputs.open_issues)
            + self.license_points(inputs.license.as_deref());
        total.min(100) as u8
    }

    fn stars_points(&self, stars: Option<u64>) -> u32 {
        match stars {
            Some(n) if n > 0 => self
                .stars
                .iter()
                .find(|(threshold, _)| n >= *threshold)
                .map(|(_, points)| *points)
                .unwrap_or(self.stars_floor),
            _ => 0,
        }
    }

    fn classification_points(&self, classification: Option<Classification>) -> u32 {
        match classification {
            Some(Classification::Official) => self.official,
            Some(Classification::Reference) => self.reference,
            Some(Classification::Community) => self.community,
            None => 0,
        }
    }

    fn documentation_points(&self, has_readme: bool, has_capabilities: bool) -> u32 {
        let mut points = 0;
        if has_readme {
            points += self.has_readme;
        }
        if has_capabilities {
            points += self.has_capabilities;
        }
        points
    }

    fn recency_points(&self, pushed_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> u32 {
        let Some(pushed_at) = pushed_at else {
            return 0;
        };
        let days = (now - pushed_at).num_days();
        self.recency_days
            .iter()
            .find(|(threshold, _)| days < *threshold)
            .map(|(_, points)| *points)
            .unwrap_or(0)
    }

    fn issue_points(&self, open_issues: Option<u64>) -> u32 {
        let Some(n) = open_issues else {
            return 0;
        };
        self.open_issues
            .iter()
            .find(|(threshold, _)| n < *threshold)
            .map(|(_, points)| *points)
            .unwrap_or(0)
    }

    fn license_points(&self, license: Option<&str>) -> u32 {
        let Some(name) = license.map(str::trim).filter(|l| !l.is_empty()) else {
            return 0;
        };
        let lower = name.to_lowercase();
        if PERMISSIVE_LICENSES.iter().any(|l| lower.contains(l)) {
            self.permissive_license
        } else {
            self.other_license
        }
    }
}

/// Score with the canonical weight table.
pub fn quality_score(inputs: &ScoreInputs, now: DateTime<Utc>) -> u8 {
    WEIGHTS_V1.score(inputs, now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-01-15T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn all_absent_scores_zero() {
        assert_eq!(quality_score(&ScoreInputs::default(), now()), 0);
    }

    #[test]
    fn worked_example_scores_92() {
        let inputs = ScoreInputs {
            stars: Some(12_000),
            classification: Some(Classification::Official),
            has_readme: true,
            has_capabilities: false,
            pushed_at: Some(now() - Duration::days(10)),
            open_issues: Some(2),
            license: Some("MIT License".to_string()),
        };
        assert_eq!(quality_score(&inputs, now()), 92);
    }

    #[test]
    fn maximal_inputs_score_100() {
        let inputs = ScoreInputs {
            stars: Some(80_000),
            classification: Some(Classification::Official),
            has_readme: true,
            has_capabilities: true,
            pushed_at: Some(now()),
            open_issues: Some(0),
            license: Some("Apache License 2.0".to_string()),
        };
        assert_eq!(quality_score(&inputs, now()), 100);
    }

    #[test]
    fn star_steps() {
        let t = &WEIGHTS_V1;
        assert_eq!(t.stars_points(None), 0);
        assert_eq!(t.stars_points(Some(0)), 0);
        assert_eq!(t.stars_points(Some(1)), 4);
        assert_eq!(t.stars_points(Some(10)), 8);
        assert_eq!(t.stars_points(Some(100)), 15);
        assert_eq!(t.stars_points(Some(1_000)), 22);
        assert_eq!(t.stars_points(Some(10_000)), 27);
        assert_eq!(t.stars_points(Some(50_000)), 30);
    }

    #[test]
    fn recency_and_issue_steps() {
        let t = &WEIGHTS_V1;
        let at = |days| Some(now() - Duration::days(days));
        assert_eq!(t.recency_points(at(29), now()), 20);
        assert_eq!(t.recency_points(at(89), now()), 15);
        assert_eq!(t.recency_points(at(179), now()), 10);
        assert_eq!(t.recency_points(at(364), now()), 5);
        assert_eq!(t.recency_points(at(400), now()), 0);

        assert_eq!(t.issue_points(Some(4)), 10);
        assert_eq!(t.issue_points(Some(19)), 6);
        assert_eq!(t.issue_points(Some(49)), 3);
        assert_eq!(t.issue_points(Some(50)), 0);
    }

    #[test]
    fn license_tiers() {
        let t = &WEIGHTS_V1;
        assert_eq!(t.license_points(Some("BSD 3-Clause")), 10);
        assert_eq!(t.license_points(Some("GNU GPL v3")), 5);
        assert_eq!(t.license_points(Some("  ")), 0);
        assert_eq!(t.license_points(None), 0);
    }

    #[test]
    fn score_always_bounded() {
        let classes = [
            None,
            Some(Classification::Official),
            Some(Classification::Reference),
            Some(Classification::Community),
        ];
        for stars in [None, Some(0), Some(5), Some(u64::MAX)] {
            for classification in classes {
                for flag in [false, true] {
                    let inputs = ScoreInputs {
                        stars,
                        classification,
                        has_readme: flag,
                        has_capabilities: !flag,
                        pushed_at: flag.then(now),
                        open_issues: flag.then_some(0),
                        license: flag.then(|| "MIT".to_string()),
                    };
                    assert!(quality_score(&inputs, now()) <= 100);
                }
            }
        }
    }
}
