use std::path::Path;

use async_trait::async_trait;
use tokio::fs;

use custody_domain::{DwellPolicyRepository, DwellRule};

/// Reads per-stage dwell overrides from a YAML list such as:
///
/// ```yaml
/// - stage: created
///   max_dwell_hours: 24
/// - stage: sorting
///   max_dwell_minutes: 90
/// ```
pub struct DwellPolicyFileRepository;

impl DwellPolicyFileRepository {
    pub fn new() -> Self {
        Self
    }
}

impl Default for DwellPolicyFileRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DwellPolicyRepository for DwellPolicyFileRepository {
    async fn load_dwell_rules(&self, path: &str) -> anyhow::Result<Vec<DwellRule>> {
        if !Path::new(path).exists() {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(path).await?;
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }
        let rules: Vec<DwellRule> = serde_yaml::from_str(&content)?;
        Ok(rules)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use custody_domain::ShipmentStatus;

    #[tokio::test]
    async fn missing_file_means_no_overrides() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("absent.yaml");
        let rules = DwellPolicyFileRepository::new()
            .load_dwell_rules(&path.to_string_lossy())
            .await
            .expect("load");
        assert!(rules.is_empty());
    }

    #[tokio::test]
    async fn parses_hours_and_minutes() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("dwell.yaml");
        fs::write(
            &path,
            "- stage: created\n  max_dwell_hours: 24\n- stage: in-transit\n  max_dwell_minutes: 90\n",
        )
        .await
        .expect("write");
        let result = DwellPolicyFileRepository::new()
            .load_dwell_rules(&path.to_string_lossy())
            .await;
        // `in-transit` is not the serialized spelling.
        assert!(result.is_err());

        fs::write(
            &path,
            "- stage: created\n  max_dwell_hours: 24\n- stage: in_transit\n  max_dwell_minutes: 90\n",
        )
        .await
        .expect("write");
        let rules = DwellPolicyFileRepository::new()
            .load_dwell_rules(&path.to_string_lossy())
            .await
            .expect("load");
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0].stage, ShipmentStatus::Created);
        assert_eq!(rules[0].max_dwell_hours, Some(24));
        assert_eq!(rules[1].max_dwell_minutes, Some(90));
    }
}
