use serde::{Deserialize, Serialize};
use std::time::Duration;

fn default_retention_secs() -> u64 {
    600
}

fn default_check_after_secs() -> u64 {
    10
}

/// Static engine configuration, loaded once at construction and read-only
/// afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RaConfig {
    /// Retention horizon for transactions. A transaction still waiting for an
    /// upstream answer past this horizon is expired; terminal transactions
    /// older than it are garbage-collected.
    #[serde(default = "default_retention_secs")]
    pub retention_secs: u64,
    /// Poll hint returned downstream while an upstream exchange is pending.
    #[serde(default = "default_check_after_secs")]
    pub check_after_secs: u64,
    /// Known certificate-profile tags. An empty set accepts any tag and
    /// passes it through to the upstream exchange.
    #[serde(default)]
    pub known_profiles: Vec<String>,
}

impl Default for RaConfig {
    fn default() -> Self {
        Self {
            retention_secs: default_retention_secs(),
            check_after_secs: default_check_after_secs(),
            known_profiles: Vec::new(),
        }
    }
}

impl RaConfig {
    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_secs)
    }

    pub fn accepts_profile(&self, profile: Option<&str>) -> bool {
        match profile {
            None => true,
            Some(tag) => {
                self.known_profiles.is_empty() || self.known_profiles.iter().any(|k| k == tag)
            }
        }
    }
}
