use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{UploadError, UploadResult};

/// Tunables for [`UploadCoordinator`](crate::UploadCoordinator).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    /// Total write attempts for a part whose write succeeded but which is
    /// then missing from the listing.
    pub max_part_attempts: u32,
    /// Stat the final object of a dedup record before trusting it, and drop
    /// records whose object is gone.
    pub verify_dedup_targets: bool,
    /// When the target name is held by different content, prefix the
    /// identifier instead of failing with `TargetConflict`.
    pub rename_conflicting_targets: bool,
    /// Reject submissions into containers that do not exist.
    pub require_existing_container: bool,
    /// Directory for the spool file of streamed assemblies. Defaults to the
    /// system temp directory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spool_dir: Option<PathBuf>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_part_attempts: 4,
            verify_dedup_targets: true,
            rename_conflicting_targets: true,
            require_existing_container: true,
            spool_dir: None,
        }
    }
}

impl UploadConfig {
    pub fn validate(&self) -> UploadResult<()> {
        if self.max_part_attempts == 0 {
            return Err(UploadError::Validation(
                "max_part_attempts must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = UploadConfig::default();
        assert_eq!(config.max_part_attempts, 4);
        assert!(config.verify_dedup_targets);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config: UploadConfig = toml::from_str("max_part_attempts = 2").unwrap();
        assert_eq!(config.max_part_attempts, 2);
        assert!(config.rename_conflicting_targets);
        assert!(config.spool_dir.is_none());
    }

    #[test]
    fn spool_dir_from_toml() {
        let config: UploadConfig = toml::from_str(r#"spool_dir = "/var/spool/ferry""#).unwrap();
        assert_eq!(config.spool_dir.as_deref(), Some(std::path::Path::new("/var/spool/ferry")));
        assert!(!toml::to_string(&UploadConfig::default()).unwrap().contains("spool_dir"));
    }

    #[test]
    fn zero_attempts_rejected() {
        let config = UploadConfig {
            max_part_attempts: 0,
            ..UploadConfig::default()
        };
        assert!(matches!(config.validate(), Err(UploadError::Validation(_))));
    }
}
