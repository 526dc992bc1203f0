//! Sync Configuration
//!
//! Persisted description of a source-to-target pairing: which platforms and
//! lists to reconcile, the mapping tables to translate between them, and the
//! schedule on which the pairing becomes due. Configurations live as YAML
//! files; the CLI layer owns persistence of `next_sync_at`/`last_sync_at`
//! after each run.

use crate::platforms::Platform;
use crate::{Result, TaskBridgeError};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// One side of a sync pairing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformEndpoint {
    pub platform: Platform,

    /// Environment variable holding the account's access token.
    /// Credential storage itself is outside this crate; the CLI resolves
    /// this at adapter construction time.
    pub token_env: String,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub workspace_id: Option<String>,

    /// ClickUp space; Monday has no space concept and leaves this unset
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub space_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub folder_id: Option<String>,

    /// ClickUp list id, or Monday board id
    pub list_id: String,
}

/// Direction of synchronization
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncDirection {
    #[default]
    OneWay,
    TwoWay,
}

/// Policy when a matched task exists on both sides
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictResolution {
    #[default]
    SourceWins,
    TargetWins,
    Manual,
}

/// How runs are triggered
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleType {
    #[default]
    Manual,
    Interval,
    Cron,
}

/// Rule for deciding whether a source and target task denote the same item.
///
/// Parsed from the free-form `sync_options` map; unrecognized values carry
/// their raw text so the matcher can warn and degrade to "no match".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchStrategy {
    Name,
    ExternalId,
    CustomId,
    Unrecognized(String),
}

impl MatchStrategy {
    fn parse(raw: &str) -> Self {
        match raw {
            "name" => MatchStrategy::Name,
            "external_id" => MatchStrategy::ExternalId,
            "custom_id" => MatchStrategy::CustomId,
            other => MatchStrategy::Unrecognized(other.to_string()),
        }
    }
}

/// A stored sync pairing with its mapping and scheduling rules
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfiguration {
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub description: Option<String>,

    pub source: PlatformEndpoint,
    pub target: PlatformEndpoint,

    #[serde(default)]
    pub sync_direction: SyncDirection,

    #[serde(default)]
    pub conflict_resolution: ConflictResolution,

    #[serde(default)]
    pub sync_attachments: bool,

    #[serde(default)]
    pub sync_comments: bool,

    #[serde(default)]
    pub sync_custom_fields: bool,

    /// Free-form options; recognized key: `match_by`
    #[serde(default)]
    pub sync_options: HashMap<String, String>,

    /// Source custom field id -> target custom field id (absent key: drop)
    #[serde(default)]
    pub field_mapping: HashMap<String, String>,

    /// Source status name -> target status name (absent key: identity)
    #[serde(default)]
    pub status_mapping: HashMap<String, String>,

    /// Source user id -> target user id (absent key: drop)
    #[serde(default)]
    pub user_mapping: HashMap<String, String>,

    #[serde(default)]
    pub schedule_type: ScheduleType,

    /// Minutes between runs when `schedule_type` is interval
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub schedule_interval: Option<i64>,

    /// Cron expression when `schedule_type` is cron (evaluation is stubbed,
    /// see `calculate_next_sync_time`)
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub schedule_cron: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub last_sync_at: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub next_sync_at: Option<DateTime<Utc>>,

    /// Inactive configurations are never due
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

impl SyncConfiguration {
    /// Create a manual configuration with empty mappings
    pub fn new(
        name: impl Into<String>,
        source: PlatformEndpoint,
        target: PlatformEndpoint,
    ) -> Self {
        Self {
            name: name.into(),
            description: None,
            source,
            target,
            sync_direction: SyncDirection::default(),
            conflict_resolution: ConflictResolution::default(),
            sync_attachments: false,
            sync_comments: false,
            sync_custom_fields: false,
            sync_options: HashMap::new(),
            field_mapping: HashMap::new(),
            status_mapping: HashMap::new(),
            user_mapping: HashMap::new(),
            schedule_type: ScheduleType::default(),
            schedule_interval: None,
            schedule_cron: None,
            last_sync_at: None,
            next_sync_at: None,
            is_active: true,
        }
    }

    /// The matching rule, defaulting to name when `sync_options` is silent
    pub fn match_strategy(&self) -> MatchStrategy {
        self.sync_options
            .get("match_by")
            .map(|raw| MatchStrategy::parse(raw))
            .unwrap_or(MatchStrategy::Name)
    }

    pub fn is_scheduled(&self) -> bool {
        self.schedule_type != ScheduleType::Manual
    }

    /// True iff the configuration is active, scheduled, and its next run time
    /// has passed.
    pub fn is_due(&self) -> bool {
        if !self.is_active || !self.is_scheduled() {
            return false;
        }
        match self.next_sync_at {
            Some(next) => next <= Utc::now(),
            None => false,
        }
    }

    /// Recompute `next_sync_at`.
    ///
    /// Interval schedules advance by `schedule_interval` minutes from now.
    /// Cron schedules fall back to a flat 24 hours: expression evaluation is
    /// not implemented, and the fallback is kept rather than silently
    /// approximating the expression. Manual configurations always clear the
    /// field.
    pub fn calculate_next_sync_time(&mut self) {
        self.next_sync_at = match self.schedule_type {
            ScheduleType::Manual => None,
            ScheduleType::Interval => self
                .schedule_interval
                .map(|minutes| Utc::now() + Duration::minutes(minutes)),
            ScheduleType::Cron => self
                .schedule_cron
                .as_ref()
                .map(|_| Utc::now() + Duration::hours(24)),
        };
    }

    /// Validate the schedule invariant: exactly one of interval/cron is
    /// meaningful, selected by `schedule_type`.
    pub fn validate(&self) -> Result<()> {
        match self.schedule_type {
            ScheduleType::Interval => {
                if self.schedule_interval.is_none() {
                    return Err(TaskBridgeError::Config(format!(
                        "'{}': interval schedule requires schedule_interval",
                        self.name
                    )));
                }
            }
            ScheduleType::Cron => {
                if self.schedule_cron.is_none() {
                    return Err(TaskBridgeError::Config(format!(
                        "'{}': cron schedule requires schedule_cron",
                        self.name
                    )));
                }
            }
            ScheduleType::Manual => {
                if self.next_sync_at.is_some() {
                    return Err(TaskBridgeError::Config(format!(
                        "'{}': manual configurations must not carry next_sync_at",
                        self.name
                    )));
                }
            }
        }
        if self.source.list_id.is_empty() || self.target.list_id.is_empty() {
            return Err(TaskBridgeError::Config(format!(
                "'{}': source and target list ids are required",
                self.name
            )));
        }
        Ok(())
    }

    /// Load a configuration from a YAML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(TaskBridgeError::Config(format!(
                "Config file not found: {}",
                path.display()
            )));
        }

        tracing::info!(path = %path.display(), "Loading sync configuration");

        let content = fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Save the configuration back to a YAML file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        tracing::info!(path = %path.display(), name = %self.name, "Saving sync configuration");

        let yaml = serde_yaml::to_string(self)?;
        fs::write(path, yaml)?;

        Ok(())
    }

    /// Default directory for configuration files (~/.config/taskbridge)
    pub fn default_dir() -> PathBuf {
        let mut path = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push(".config");
        path.push("taskbridge");
        path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint(platform: Platform, list: &str) -> PlatformEndpoint {
        PlatformEndpoint {
            platform,
            token_env: "TEST_TOKEN".to_string(),
            workspace_id: None,
            space_id: None,
            folder_id: None,
            list_id: list.to_string(),
        }
    }

    fn test_config() -> SyncConfiguration {
        SyncConfiguration::new(
            "clickup-to-monday",
            endpoint(Platform::ClickUp, "list-1"),
            endpoint(Platform::Monday, "board-1"),
        )
    }

    #[test]
    fn test_manual_never_due() {
        let mut config = test_config();
        config.next_sync_at = Some(Utc::now() - Duration::hours(1));
        // schedule_type is manual, so even a past next_sync_at is not due
        assert!(!config.is_due());
    }

    #[test]
    fn test_manual_next_sync_cleared() {
        let mut config = test_config();
        config.next_sync_at = Some(Utc::now());
        config.calculate_next_sync_time();
        assert!(config.next_sync_at.is_none());
    }

    #[test]
    fn test_interval_next_sync_time() {
        let mut config = test_config();
        config.schedule_type = ScheduleType::Interval;
        config.schedule_interval = Some(30);

        let before = Utc::now();
        config.calculate_next_sync_time();
        let next = config.next_sync_at.unwrap();

        let expected = before + Duration::minutes(30);
        let drift = (next - expected).num_seconds().abs();
        assert!(drift <= 1, "next_sync_at should be now + 30 minutes");
    }

    #[test]
    fn test_cron_falls_back_to_24_hours() {
        let mut config = test_config();
        config.schedule_type = ScheduleType::Cron;
        config.schedule_cron = Some("0 6 * * *".to_string());

        let before = Utc::now();
        config.calculate_next_sync_time();
        let next = config.next_sync_at.unwrap();

        let drift = (next - (before + Duration::hours(24))).num_seconds().abs();
        assert!(drift <= 1, "cron fallback should be a flat 24 hours");
    }

    #[test]
    fn test_due_when_past() {
        let mut config = test_config();
        config.schedule_type = ScheduleType::Interval;
        config.schedule_interval = Some(5);
        config.next_sync_at = Some(Utc::now() - Duration::minutes(1));
        assert!(config.is_due());

        config.next_sync_at = Some(Utc::now() + Duration::minutes(5));
        assert!(!config.is_due());
    }

    #[test]
    fn test_inactive_never_due() {
        let mut config = test_config();
        config.schedule_type = ScheduleType::Interval;
        config.schedule_interval = Some(5);
        config.next_sync_at = Some(Utc::now() - Duration::minutes(1));
        config.is_active = false;
        assert!(!config.is_due());
    }

    #[test]
    fn test_match_strategy_parsing() {
        let mut config = test_config();
        assert_eq!(config.match_strategy(), MatchStrategy::Name);

        config
            .sync_options
            .insert("match_by".to_string(), "external_id".to_string());
        assert_eq!(config.match_strategy(), MatchStrategy::ExternalId);

        config
            .sync_options
            .insert("match_by".to_string(), "fuzzy".to_string());
        assert_eq!(
            config.match_strategy(),
            MatchStrategy::Unrecognized("fuzzy".to_string())
        );
    }

    #[test]
    fn test_validate_schedule_invariant() {
        let mut config = test_config();
        assert!(config.validate().is_ok());

        config.schedule_type = ScheduleType::Interval;
        assert!(config.validate().is_err());

        config.schedule_interval = Some(15);
        assert!(config.validate().is_ok());

        config.schedule_type = ScheduleType::Cron;
        assert!(config.validate().is_err());
        config.schedule_cron = Some("0 0 * * *".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_yaml_round_trip() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("pairing.yaml");

        let mut config = test_config();
        config.status_mapping.insert("Open".into(), "To Do".into());
        config.sync_comments = true;
        config.save(&path).unwrap();

        let loaded = SyncConfiguration::load(&path).unwrap();
        assert_eq!(loaded.name, "clickup-to-monday");
        assert_eq!(loaded.source.platform, Platform::ClickUp);
        assert_eq!(loaded.target.platform, Platform::Monday);
        assert_eq!(loaded.status_mapping.get("Open").unwrap(), "To Do");
        assert!(loaded.sync_comments);
        assert!(loaded.is_active);
    }
}
