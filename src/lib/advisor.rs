use log::{debug, info, warn};
use serde::Serialize;

use crate::lib::quota::{FetchError, QuotaMetric, RegionSnapshot};

/// Metrics that can rule a region in or out for a Dataflow deployment
pub const CRITICAL_METRICS: [QuotaMetric; 4] = [
    QuotaMetric::InUseAddresses,
    QuotaMetric::Cpus,
    QuotaMetric::DisksTotalGb,
    QuotaMetric::Instances,
];

/// Best scores at or below this value are never recommended
pub const UNUSABLE_SCORE: i64 = 0;

/// Three-tier threshold rule for one quota metric.
///
/// A limit below `critical_below` is a critical issue, below `warning_below`
/// a warning, anything else a passed check. Either tier may be absent.
#[derive(Debug, Clone, PartialEq)]
pub struct QuotaRule {
    pub metric: QuotaMetric,
    pub critical_below: Option<f64>,
    pub warning_below: Option<f64>,
    pub critical_message: &'static str,
    pub warning_message: &'static str,
    pub ok_message: &'static str,
}

impl QuotaRule {
    /// Rules applied by default: in-use IP addresses and CPUs.
    ///
    /// DISKS_TOTAL_GB and INSTANCES are part of [`CRITICAL_METRICS`] but have
    /// no agreed thresholds yet.
    pub fn defaults() -> Vec<QuotaRule> {
        vec![
            QuotaRule {
                metric: QuotaMetric::InUseAddresses,
                critical_below: Some(20.0),
                warning_below: Some(50.0),
                critical_message: "limit too low for efficient operation, need at least 20",
                warning_message: "moderate limit, the pipeline will run with reduced throughput",
                ok_message: "adequate limit for an efficient pipeline",
            },
            QuotaRule {
                metric: QuotaMetric::Cpus,
                critical_below: None,
                warning_below: Some(32.0),
                critical_message: "",
                warning_message: "moderate CPU limit, consider stronger machine types",
                ok_message: "adequate CPU limit",
            },
        ]
    }

    fn tier(&self, limit: f64) -> Tier {
        if self.critical_below.is_some_and(|t| limit < t) {
            Tier::Critical
        } else if self.warning_below.is_some_and(|t| limit < t) {
            Tier::Warning
        } else {
            Tier::Ok
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tier {
    Critical,
    Warning,
    Ok,
}

/// Result of scoring one region
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegionAssessment {
    pub region: String,
    pub critical_issues: Vec<String>,
    pub warnings: Vec<String>,
    pub recommendations: Vec<String>,
    pub ready: bool,
    pub score: i64,
}

/// A candidate region that was left out of the ranking
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedRegion {
    pub region: String,
    pub reason: String,
}

/// Ranking result. `best_region` is `None` when no region is usable.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankOutcome {
    pub best_region: Option<String>,
    pub best_score: Option<i64>,
    pub assessments: Vec<RegionAssessment>,
    pub skipped: Vec<SkippedRegion>,
}

impl RankOutcome {
    pub fn best(&self) -> Option<&RegionAssessment> {
        let best = self.best_region.as_deref()?;
        self.assessments.iter().find(|a| a.region == best)
    }
}

/// How comfortable the best region is for the workload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Verdict {
    Excellent,
    Good,
    Acceptable,
    Problematic,
}

impl Verdict {
    pub fn from_score(score: i64) -> Self {
        match score {
            s if s >= 8 => Verdict::Excellent,
            s if s >= 6 => Verdict::Good,
            s if s >= 4 => Verdict::Acceptable,
            _ => Verdict::Problematic,
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            Verdict::Excellent => "Quotas comfortably fit the pipeline.",
            Verdict::Good => "Good choice, with some minor limitations.",
            Verdict::Acceptable => "Usable, but throughput will be limited.",
            Verdict::Problematic => "Problematic region, consider requesting a quota increase.",
        }
    }
}

/// Scores regions by quota headroom and recommends one
pub struct RegionQuotaAdvisor {
    rules: Vec<QuotaRule>,
}

impl Default for RegionQuotaAdvisor {
    fn default() -> Self {
        Self::new(QuotaRule::defaults())
    }
}

impl RegionQuotaAdvisor {
    pub fn new(rules: Vec<QuotaRule>) -> Self {
        Self { rules }
    }

    /// Score a single snapshot
    pub fn assess(&self, snapshot: &RegionSnapshot) -> RegionAssessment {
        let mut critical_issues = Vec::new();
        let mut warnings = Vec::new();
        let mut recommendations = Vec::new();

        for rule in &self.rules {
            let Some(quota) = snapshot.get(rule.metric) else {
                continue;
            };
            let limit = quota.limit;
            let label = rule.metric.label();

            match rule.tier(limit) {
                Tier::Critical => {
                    critical_issues.push(format!("{label}: {} ({limit})", rule.critical_message))
                }
                Tier::Warning => {
                    warnings.push(format!("{label}: {} ({limit})", rule.warning_message))
                }
                Tier::Ok => {
                    recommendations.push(format!("{label}: {} ({limit})", rule.ok_message))
                }
            }
        }

        for metric in CRITICAL_METRICS {
            if snapshot.get(metric).is_some() && !self.rules.iter().any(|r| r.metric == metric) {
                debug!(
                    "{}: {} reported but no threshold rule is configured",
                    snapshot.region(),
                    metric
                );
            }
        }

        let ready = critical_issues.is_empty();
        let score = score(
            ready,
            recommendations.len(),
            warnings.len(),
            critical_issues.len(),
        );

        RegionAssessment {
            region: snapshot.region().to_string(),
            critical_issues,
            warnings,
            recommendations,
            ready,
            score,
        }
    }

    /// Rank candidates in the given order.
    ///
    /// Fetch errors drop the region from the ranking. The highest score wins;
    /// on equal scores the earlier candidate is kept.
    pub fn rank<I>(&self, candidates: I) -> RankOutcome
    where
        I: IntoIterator<Item = (String, Result<RegionSnapshot, FetchError>)>,
    {
        let mut assessments = Vec::new();
        let mut skipped = Vec::new();
        let mut best: Option<(usize, i64)> = None;

        for (region, fetched) in candidates {
            let snapshot = match fetched {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    warn!("Skipping {region}: {e}");
                    skipped.push(SkippedRegion {
                        region,
                        reason: e.to_string(),
                    });
                    continue;
                }
            };

            let assessment = self.assess(&snapshot);
            debug!(
                "{}: score {} (ready: {})",
                assessment.region, assessment.score, assessment.ready
            );

            let beats_current = match best {
                Some((_, top)) => assessment.score > top,
                None => assessment.score > UNUSABLE_SCORE,
            };
            if beats_current {
                best = Some((assessments.len(), assessment.score));
            }
            assessments.push(assessment);
        }

        let best_region = best.map(|(idx, _)| assessments[idx].region.clone());
        match &best_region {
            Some(region) => info!("Recommended region: {region}"),
            None => info!("No suitable region found"),
        }

        RankOutcome {
            best_region,
            best_score: best.map(|(_, score)| score),
            assessments,
            skipped,
        }
    }
}

/// `10·ready + 2·recommendations − warnings − 5·critical`
///
/// Unbounded in both directions; only meaningful relative to other regions.
pub fn score(ready: bool, recommendations: usize, warnings: usize, critical: usize) -> i64 {
    let mut score = 0i64;
    if ready {
        score += 10;
    }
    score += 2 * recommendations as i64;
    score -= warnings as i64;
    score -= 5 * critical as i64;
    score
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lib::quota::QuotaUsage;
    use std::collections::HashMap;

    fn snapshot(region: &str, quotas: &[(QuotaMetric, f64, f64)]) -> RegionSnapshot {
        let metrics: HashMap<String, QuotaUsage> = quotas
            .iter()
            .map(|(m, limit, usage)| (m.as_str().to_string(), QuotaUsage::new(*limit, *usage)))
            .collect();
        RegionSnapshot::new(region, metrics)
    }

    fn ok(
        region: &str,
        quotas: &[(QuotaMetric, f64, f64)],
    ) -> (String, Result<RegionSnapshot, FetchError>) {
        (region.to_string(), Ok(snapshot(region, quotas)))
    }

    #[test]
    fn adequate_ip_and_cpu_is_ready() {
        let advisor = RegionQuotaAdvisor::default();
        for (ips, cpus) in [(50.0, 32.0), (60.0, 40.0), (500.0, 2400.0)] {
            let a = advisor.assess(&snapshot(
                "r",
                &[(QuotaMetric::InUseAddresses, ips, 0.0), (QuotaMetric::Cpus, cpus, 0.0)],
            ));
            assert!(a.ready);
            assert!(a.critical_issues.is_empty());
            assert!(a.warnings.is_empty());
        }
    }

    #[test]
    fn low_ip_limit_is_never_ready() {
        let advisor = RegionQuotaAdvisor::default();
        for cpus in [1.0, 32.0, 10_000.0] {
            let a = advisor.assess(&snapshot(
                "r",
                &[
                    (QuotaMetric::InUseAddresses, 8.0, 0.0),
                    (QuotaMetric::Cpus, cpus, 0.0),
                    (QuotaMetric::DisksTotalGb, 40_960.0, 0.0),
                ],
            ));
            assert!(!a.ready);
            assert_eq!(a.critical_issues.len(), 1);
        }
    }

    #[test]
    fn raising_ip_limit_from_warning_tier_increases_score() {
        let advisor = RegionQuotaAdvisor::default();
        let cpu = (QuotaMetric::Cpus, 24.0, 0.0);
        let moderate =
            advisor.assess(&snapshot("r", &[(QuotaMetric::InUseAddresses, 30.0, 0.0), cpu]));
        let adequate =
            advisor.assess(&snapshot("r", &[(QuotaMetric::InUseAddresses, 60.0, 0.0), cpu]));
        assert!(adequate.score > moderate.score);
    }

    #[test]
    fn region_a_scores_fourteen() {
        let a = RegionQuotaAdvisor::default().assess(&snapshot(
            "a",
            &[(QuotaMetric::InUseAddresses, 60.0, 5.0), (QuotaMetric::Cpus, 40.0, 10.0)],
        ));
        assert_eq!(a.recommendations.len(), 2);
        assert!(a.warnings.is_empty());
        assert!(a.critical_issues.is_empty());
        assert!(a.ready);
        assert_eq!(a.score, 14);
    }

    #[test]
    fn region_b_scores_minus_six() {
        let b = RegionQuotaAdvisor::default().assess(&snapshot(
            "b",
            &[(QuotaMetric::InUseAddresses, 15.0, 2.0), (QuotaMetric::Cpus, 20.0, 5.0)],
        ));
        assert_eq!(b.critical_issues.len(), 1);
        assert_eq!(b.warnings.len(), 1);
        assert!(b.recommendations.is_empty());
        assert!(!b.ready);
        assert_eq!(b.score, -6);
    }

    #[test]
    fn region_c_two_warnings_scores_eight() {
        let c = RegionQuotaAdvisor::default().assess(&snapshot(
            "c",
            &[(QuotaMetric::InUseAddresses, 30.0, 0.0), (QuotaMetric::Cpus, 16.0, 0.0)],
        ));
        assert_eq!(c.warnings.len(), 2);
        assert!(c.warnings[0].starts_with("In-use IP addresses"));
        assert!(c.warnings[1].starts_with("CPUs"));
        assert!(c.critical_issues.is_empty());
        assert!(c.recommendations.is_empty());
        assert!(c.ready);
        assert_eq!(c.score, 8);
    }

    #[test]
    fn absent_metrics_contribute_nothing() {
        let a = RegionQuotaAdvisor::default().assess(&snapshot(
            "r",
            &[(QuotaMetric::Instances, 1.0, 0.0), (QuotaMetric::DisksTotalGb, 1.0, 0.0)],
        ));
        assert!(a.ready);
        assert_eq!(a.score, 10);
    }

    #[test]
    fn rank_prefers_a_over_b() {
        let outcome = RegionQuotaAdvisor::default().rank(vec![
            ok("b", &[(QuotaMetric::InUseAddresses, 15.0, 2.0), (QuotaMetric::Cpus, 20.0, 5.0)]),
            ok("a", &[(QuotaMetric::InUseAddresses, 60.0, 5.0), (QuotaMetric::Cpus, 40.0, 10.0)]),
        ]);
        assert_eq!(outcome.best_region.as_deref(), Some("a"));
        assert_eq!(outcome.best_score, Some(14));
        assert_eq!(outcome.assessments.len(), 2);
        assert_eq!(outcome.best().map(|a| a.score), Some(14));
    }

    #[test]
    fn rank_with_only_fetch_errors_has_no_best_region() {
        let outcome = RegionQuotaAdvisor::default().rank(vec![
            ("us-east1".to_string(), Err(FetchError::Timeout(30))),
            ("us-west1".to_string(), Err(FetchError::Command("denied".into()))),
        ]);
        assert!(outcome.best_region.is_none());
        assert!(outcome.best_score.is_none());
        assert!(outcome.assessments.is_empty());
        assert_eq!(outcome.skipped.len(), 2);
        assert_eq!(outcome.skipped[0].region, "us-east1");
    }

    #[test]
    fn rank_ties_keep_first_candidate() {
        let quotas = [(QuotaMetric::InUseAddresses, 60.0, 0.0), (QuotaMetric::Cpus, 64.0, 0.0)];
        let outcome = RegionQuotaAdvisor::default().rank(vec![
            ok("second-best", &[(QuotaMetric::InUseAddresses, 30.0, 0.0)]),
            ok("first", &quotas),
            ok("tied", &quotas),
        ]);
        assert_eq!(outcome.best_region.as_deref(), Some("first"));
    }

    #[test]
    fn rank_skips_errors_without_aborting() {
        let outcome = RegionQuotaAdvisor::default().rank(vec![
            ("broken".to_string(), Err(FetchError::Malformed("eof".into()))),
            ok("c", &[(QuotaMetric::InUseAddresses, 30.0, 0.0), (QuotaMetric::Cpus, 16.0, 0.0)]),
        ]);
        assert_eq!(outcome.best_region.as_deref(), Some("c"));
        assert_eq!(outcome.skipped.len(), 1);
    }

    #[test]
    fn rank_never_recommends_non_positive_scores() {
        let outcome = RegionQuotaAdvisor::default().rank(vec![ok(
            "b",
            &[(QuotaMetric::InUseAddresses, 15.0, 2.0), (QuotaMetric::Cpus, 20.0, 5.0)],
        )]);
        assert!(outcome.best_region.is_none());
        assert_eq!(outcome.assessments.len(), 1);
    }

    #[test]
    fn custom_rule_extends_reserved_metric() {
        let mut rules = QuotaRule::defaults();
        rules.push(QuotaRule {
            metric: QuotaMetric::DisksTotalGb,
            critical_below: Some(1_000.0),
            warning_below: Some(4_000.0),
            critical_message: "not enough disk",
            warning_message: "tight on disk",
            ok_message: "enough disk",
        });
        let a = RegionQuotaAdvisor::new(rules)
            .assess(&snapshot("r", &[(QuotaMetric::DisksTotalGb, 2_048.0, 0.0)]));
        assert_eq!(a.warnings, vec!["Total disk (GB): tight on disk (2048)".to_string()]);
        assert_eq!(a.score, 9);
    }

    #[test]
    fn verdict_bands() {
        assert_eq!(Verdict::from_score(14), Verdict::Excellent);
        assert_eq!(Verdict::from_score(8), Verdict::Excellent);
        assert_eq!(Verdict::from_score(7), Verdict::Good);
        assert_eq!(Verdict::from_score(4), Verdict::Acceptable);
        assert_eq!(Verdict::from_score(1), Verdict::Problematic);
    }
}
