use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Quota metrics the advisor knows how to reason about.
///
/// The provider reports many more; those are kept in the snapshot under their
/// raw name and never scored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QuotaMetric {
    InUseAddresses,
    Cpus,
    DisksTotalGb,
    Instances,
}

impl QuotaMetric {
    /// Metric name as reported by `gcloud compute regions describe`
    pub fn as_str(&self) -> &'static str {
        match self {
            QuotaMetric::InUseAddresses => "IN_USE_ADDRESSES",
            QuotaMetric::Cpus => "CPUS",
            QuotaMetric::DisksTotalGb => "DISKS_TOTAL_GB",
            QuotaMetric::Instances => "INSTANCES",
        }
    }

    /// Human label used in assessment messages
    pub fn label(&self) -> &'static str {
        match self {
            QuotaMetric::InUseAddresses => "In-use IP addresses",
            QuotaMetric::Cpus => "CPUs",
            QuotaMetric::DisksTotalGb => "Total disk (GB)",
            QuotaMetric::Instances => "Instances",
        }
    }
}

impl fmt::Display for QuotaMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Limit and usage of one quota metric
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QuotaUsage {
    pub limit: f64,
    pub usage: f64,
}

impl QuotaUsage {
    pub fn new(limit: f64, usage: f64) -> Self {
        Self { limit, usage }
    }

    /// Headroom left under the limit. Negative when usage exceeds the limit.
    pub fn available(&self) -> f64 {
        self.limit - self.usage
    }
}

/// Why quota data for a region could not be obtained
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FetchError {
    #[error("command failed: {0}")]
    Command(String),

    #[error("timed out after {0}s")]
    Timeout(u64),

    #[error("malformed quota payload: {0}")]
    Malformed(String),
}

/// Point-in-time read of one region's quotas
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegionSnapshot {
    region: String,
    metrics: HashMap<String, QuotaUsage>,
}

#[derive(Debug, Deserialize)]
struct DescribeRegion {
    #[serde(default)]
    quotas: Vec<DescribeQuota>,
}

#[derive(Debug, Deserialize)]
struct DescribeQuota {
    #[serde(default)]
    metric: String,
    #[serde(default)]
    limit: f64,
    #[serde(default)]
    usage: f64,
}

impl RegionSnapshot {
    pub fn new(region: impl Into<String>, metrics: HashMap<String, QuotaUsage>) -> Self {
        Self {
            region: region.into(),
            metrics,
        }
    }

    /// Build a snapshot from the output of
    /// `gcloud compute regions describe <region> --format=json`
    pub fn from_describe_json(region: &str, payload: &str) -> Result<Self, FetchError> {
        let describe: DescribeRegion =
            serde_json::from_str(payload).map_err(|e| FetchError::Malformed(e.to_string()))?;

        let metrics = describe
            .quotas
            .into_iter()
            .filter(|q| !q.metric.is_empty())
            .map(|q| (q.metric, QuotaUsage::new(q.limit, q.usage)))
            .collect();

        Ok(Self::new(region, metrics))
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn get(&self, metric: QuotaMetric) -> Option<&QuotaUsage> {
        self.metrics.get(metric.as_str())
    }

    pub fn get_raw(&self, name: &str) -> Option<&QuotaUsage> {
        self.metrics.get(name)
    }

    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DESCRIBE: &str = r#"{
        "name": "us-east1",
        "status": "UP",
        "quotas": [
            {"metric": "CPUS", "limit": 24.0, "usage": 4.0},
            {"metric": "IN_USE_ADDRESSES", "limit": 8.0, "usage": 0.0},
            {"metric": "SSD_TOTAL_GB", "limit": 500.0, "usage": 0.0}
        ]
    }"#;

    #[test]
    fn parses_describe_payload() {
        let snapshot = RegionSnapshot::from_describe_json("us-east1", DESCRIBE).unwrap();
        assert_eq!(snapshot.region(), "us-east1");
        assert_eq!(snapshot.len(), 3);

        let cpus = snapshot.get(QuotaMetric::Cpus).unwrap();
        assert_eq!(cpus.limit, 24.0);
        assert_eq!(cpus.available(), 20.0);

        assert!(snapshot.get_raw("SSD_TOTAL_GB").is_some());
        assert!(snapshot.get(QuotaMetric::Instances).is_none());
    }

    #[test]
    fn missing_quotas_array_yields_empty_snapshot() {
        let snapshot = RegionSnapshot::from_describe_json("us-west1", r#"{"name":"us-west1"}"#)
            .unwrap();
        assert!(snapshot.is_empty());
    }

    #[test]
    fn invalid_json_is_malformed() {
        let err = RegionSnapshot::from_describe_json("us-west1", "ERROR: (gcloud)").unwrap_err();
        assert!(matches!(err, FetchError::Malformed(_)));
    }

    #[test]
    fn available_is_not_clamped() {
        let over = QuotaUsage::new(10.0, 12.0);
        assert_eq!(over.available(), -2.0);
    }
}
