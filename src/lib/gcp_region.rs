use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Google Cloud regions as documented in https://cloud.google.com/compute/docs/regions-zones
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum GcpRegion {
    // North America
    UsCentral1,            // Iowa
    UsEast1,               // South Carolina
    UsEast4,               // Northern Virginia
    UsEast5,               // Columbus
    UsSouth1,              // Dallas
    UsWest1,               // Oregon
    UsWest2,               // Los Angeles
    UsWest3,               // Salt Lake City
    UsWest4,               // Las Vegas
    NorthamericaNortheast1, // Montréal
    NorthamericaNortheast2, // Toronto

    // South America
    SouthamericaEast1,     // São Paulo
    SouthamericaWest1,     // Santiago

    // Europe
    EuropeWest1,           // Belgium
    EuropeWest2,           // London
    EuropeWest3,           // Frankfurt
    EuropeWest4,           // Netherlands
    EuropeWest6,           // Zurich
    EuropeWest9,           // Paris
    EuropeNorth1,          // Finland
    EuropeCentral2,        // Warsaw
    EuropeSouthwest1,      // Madrid

    // Asia Pacific
    AsiaEast1,             // Taiwan
    AsiaEast2,             // Hong Kong
    AsiaNortheast1,        // Tokyo
    AsiaNortheast3,        // Seoul
    AsiaSouth1,            // Mumbai
    AsiaSoutheast1,        // Singapore
    AsiaSoutheast2,        // Jakarta
    AustraliaSoutheast1,   // Sydney

    // Middle East
    MeWest1,               // Tel Aviv
}

impl GcpRegion {
    pub fn as_str(&self) -> &'static str {
        match self {
            GcpRegion::UsCentral1 => "us-central1",
            GcpRegion::UsEast1 => "us-east1",
            GcpRegion::UsEast4 => "us-east4",
            GcpRegion::UsEast5 => "us-east5",
            GcpRegion::UsSouth1 => "us-south1",
            GcpRegion::UsWest1 => "us-west1",
            GcpRegion::UsWest2 => "us-west2",
            GcpRegion::UsWest3 => "us-west3",
            GcpRegion::UsWest4 => "us-west4",
            GcpRegion::NorthamericaNortheast1 => "northamerica-northeast1",
            GcpRegion::NorthamericaNortheast2 => "northamerica-northeast2",
            GcpRegion::SouthamericaEast1 => "southamerica-east1",
            GcpRegion::SouthamericaWest1 => "southamerica-west1",
            GcpRegion::EuropeWest1 => "europe-west1",
            GcpRegion::EuropeWest2 => "europe-west2",
            GcpRegion::EuropeWest3 => "europe-west3",
            GcpRegion::EuropeWest4 => "europe-west4",
            GcpRegion::EuropeWest6 => "europe-west6",
            GcpRegion::EuropeWest9 => "europe-west9",
            GcpRegion::EuropeNorth1 => "europe-north1",
            GcpRegion::EuropeCentral2 => "europe-central2",
            GcpRegion::EuropeSouthwest1 => "europe-southwest1",
            GcpRegion::AsiaEast1 => "asia-east1",
            GcpRegion::AsiaEast2 => "asia-east2",
            GcpRegion::AsiaNortheast1 => "asia-northeast1",
            GcpRegion::AsiaNortheast3 => "asia-northeast3",
            GcpRegion::AsiaSouth1 => "asia-south1",
            GcpRegion::AsiaSoutheast1 => "asia-southeast1",
            GcpRegion::AsiaSoutheast2 => "asia-southeast2",
            GcpRegion::AustraliaSoutheast1 => "australia-southeast1",
            GcpRegion::MeWest1 => "me-west1",
        }
    }

    /// Regions probed by `quotas` when none are given on the command line.
    ///
    /// Order matters: it is the tie-break order when two regions score the same.
    pub fn default_candidates() -> Vec<GcpRegion> {
        vec![
            GcpRegion::UsEast1,
            GcpRegion::UsWest1,
            GcpRegion::EuropeWest1,
            GcpRegion::AsiaSoutheast1,
            GcpRegion::UsCentral1,
            GcpRegion::EuropeWest4,
            GcpRegion::UsEast4,
        ]
    }
}

impl fmt::Display for GcpRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<GcpRegion> for String {
    fn from(region: GcpRegion) -> Self {
        region.as_str().to_string()
    }
}

impl TryFrom<String> for GcpRegion {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl FromStr for GcpRegion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "us-central1" => Ok(GcpRegion::UsCentral1),
            "us-east1" => Ok(GcpRegion::UsEast1),
            "us-east4" => Ok(GcpRegion::UsEast4),
            "us-east5" => Ok(GcpRegion::UsEast5),
            "us-south1" => Ok(GcpRegion::UsSouth1),
            "us-west1" => Ok(GcpRegion::UsWest1),
            "us-west2" => Ok(GcpRegion::UsWest2),
            "us-west3" => Ok(GcpRegion::UsWest3),
            "us-west4" => Ok(GcpRegion::UsWest4),
            "northamerica-northeast1" => Ok(GcpRegion::NorthamericaNortheast1),
            "northamerica-northeast2" => Ok(GcpRegion::NorthamericaNortheast2),
            "southamerica-east1" => Ok(GcpRegion::SouthamericaEast1),
            "southamerica-west1" => Ok(GcpRegion::SouthamericaWest1),
            "europe-west1" => Ok(GcpRegion::EuropeWest1),
            "europe-west2" => Ok(GcpRegion::EuropeWest2),
            "europe-west3" => Ok(GcpRegion::EuropeWest3),
            "europe-west4" => Ok(GcpRegion::EuropeWest4),
            "europe-west6" => Ok(GcpRegion::EuropeWest6),
            "europe-west9" => Ok(GcpRegion::EuropeWest9),
            "europe-north1" => Ok(GcpRegion::EuropeNorth1),
            "europe-central2" => Ok(GcpRegion::EuropeCentral2),
            "europe-southwest1" => Ok(GcpRegion::EuropeSouthwest1),
            "asia-east1" => Ok(GcpRegion::AsiaEast1),
            "asia-east2" => Ok(GcpRegion::AsiaEast2),
            "asia-northeast1" => Ok(GcpRegion::AsiaNortheast1),
            "asia-northeast3" => Ok(GcpRegion::AsiaNortheast3),
            "asia-south1" => Ok(GcpRegion::AsiaSouth1),
            "asia-southeast1" => Ok(GcpRegion::AsiaSoutheast1),
            "asia-southeast2" => Ok(GcpRegion::AsiaSoutheast2),
            "australia-southeast1" => Ok(GcpRegion::AustraliaSoutheast1),
            "me-west1" => Ok(GcpRegion::MeWest1),
            _ => Err(format!(
                "Invalid GCP region: '{}'. See https://cloud.google.com/compute/docs/regions-zones for valid regions",
                s
            )),
        }
    }
}
