use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Lifecycle state reported by the compute provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum InstanceStatus {
    Provisioning,
    Staging,
    Running,
    Stopping,
    Stopped,
    Suspending,
    Suspended,
    Repairing,
    Terminated,
    /// A state this build does not know about yet.
    Other(String),
}

impl InstanceStatus {
    pub fn parse(value: &str) -> Self {
        match value {
            "PROVISIONING" => Self::Provisioning,
            "STAGING" => Self::Staging,
            "RUNNING" => Self::Running,
            "STOPPING" => Self::Stopping,
            "STOPPED" => Self::Stopped,
            "SUSPENDING" => Self::Suspending,
            "SUSPENDED" => Self::Suspended,
            "REPAIRING" => Self::Repairing,
            "TERMINATED" => Self::Terminated,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Provisioning => "PROVISIONING",
            Self::Staging => "STAGING",
            Self::Running => "RUNNING",
            Self::Stopping => "STOPPING",
            Self::Stopped => "STOPPED",
            Self::Suspending => "SUSPENDING",
            Self::Suspended => "SUSPENDED",
            Self::Repairing => "REPAIRING",
            Self::Terminated => "TERMINATED",
            Self::Other(value) => value,
        }
    }

    /// States in which no stop request is issued.
    ///
    /// PROVISIONING and REPAIRING are deliberately part of this set even
    /// though the instance is not stopped.
    pub fn is_settled(&self) -> bool {
        matches!(
            self,
            Self::Stopped | Self::Stopping | Self::Terminated | Self::Provisioning | Self::Repairing
        )
    }
}

impl fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for InstanceStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for InstanceStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        Ok(Self::parse(&value))
    }
}

/// The subset of a provider instance resource this crate acts on.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InstanceRecord {
    pub name: String,
    /// Zone resource path, e.g. `.../projects/p/zones/us-central1-a`.
    pub zone: String,
    pub status: InstanceStatus,
}

impl InstanceRecord {
    pub fn zone_name(&self) -> &str {
        zone_short_name(&self.zone)
    }
}

/// Final path segment of a zone resource path.
pub fn zone_short_name(zone_path: &str) -> &str {
    zone_path.rsplit('/').next().unwrap_or(zone_path)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_KNOWN: [&str; 9] = [
        "PROVISIONING",
        "STAGING",
        "RUNNING",
        "STOPPING",
        "STOPPED",
        "SUSPENDING",
        "SUSPENDED",
        "REPAIRING",
        "TERMINATED",
    ];

    #[test]
    fn settled_set_matches_business_rule() {
        let settled: Vec<&str> = ALL_KNOWN
            .iter()
            .copied()
            .filter(|value| InstanceStatus::parse(value).is_settled())
            .collect();

        assert_eq!(
            settled,
            vec!["PROVISIONING", "STOPPING", "STOPPED", "REPAIRING", "TERMINATED"]
        );
    }

    #[test]
    fn unknown_status_is_kept_verbatim_and_not_settled() {
        let status = InstanceStatus::parse("HIBERNATING");

        assert_eq!(status, InstanceStatus::Other("HIBERNATING".to_string()));
        assert_eq!(status.as_str(), "HIBERNATING");
        assert!(!status.is_settled());
    }

    #[test]
    fn status_deserializes_from_provider_string() {
        let record: InstanceRecord = serde_json::from_str(
            r#"{"name":"vm-1","zone":"https://x/zones/europe-west1-b","status":"SUSPENDED"}"#,
        )
        .expect("record should parse");

        assert_eq!(record.status, InstanceStatus::Suspended);
        assert_eq!(record.zone_name(), "europe-west1-b");
    }

    #[test]
    fn zone_short_name_takes_last_segment() {
        assert_eq!(
            zone_short_name(
                "https://www.googleapis.com/compute/v1/projects/p/zones/us-central1-a"
            ),
            "us-central1-a"
        );
        assert_eq!(zone_short_name("zones/asia-east1-c"), "asia-east1-c");
    }

    #[test]
    fn zone_short_name_without_separator_is_identity() {
        assert_eq!(zone_short_name("us-east1-b"), "us-east1-b");
    }
}
