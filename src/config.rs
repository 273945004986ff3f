//! Engine configuration loaded from TOML.
//!
//! Every section and key is optional; missing values take the defaults
//! below. A missing file yields the default configuration.
//!
//! ```toml
//! [sync]
//! interval_minutes = 5
//! max_results = 100
//! tracker_route = "track_b"
//!
//! [conflicts]
//! policy = "local_pins"
//!
//! [access]
//! fallback_route = "track_a"
//! dual_route = ["calendar", "email"]
//!
//! [access.roles]
//! sales = "track_a"
//! developer = "track_b"
//!
//! [access.sources]
//! auditor = "tracked"
//!
//! [writeback.transitions]
//! completed = "Done"
//! ```

use crate::access::domain::{SourceFilter, SourcePolicy};
use crate::sync::domain::SyncSettings;
use crate::task::domain::{Role, Route, RoutePolicy, WorkType};
use crate::task::services::ConflictPolicy;
use crate::tracker::domain::StatusCategory;
use crate::tracker::services::TransitionTable;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file exists but could not be read.
    #[error("failed to read {path}: {source}")]
    Read {
        /// Offending path.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },
    /// The content is not valid TOML for this schema.
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    /// A value parsed but is out of range.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Root configuration document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Reconciliation settings.
    pub sync: SyncConfig,
    /// Local edit conflict handling.
    pub conflicts: ConflictConfig,
    /// Visibility policies.
    pub access: AccessConfig,
    /// Tracker write-back settings.
    pub writeback: WriteBackConfig,
}

/// `[sync]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Minutes between passes for each scope.
    pub interval_minutes: u64,
    /// Tracker page size limit.
    pub max_results: u32,
    /// Route for tasks created by reconciliation.
    pub tracker_route: Route,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            interval_minutes: 5,
            max_results: 100,
            tracker_route: Route::TrackB,
        }
    }
}

/// `[conflicts]` section.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConflictConfig {
    /// What happens to tracked fields edited locally.
    pub policy: ConflictPolicy,
}

/// `[access]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessConfig {
    /// Route for roles without an entry in `roles`.
    pub fallback_route: Route,
    /// Work types visible on every track.
    pub dual_route: Vec<WorkType>,
    /// Default route per role.
    pub roles: BTreeMap<Role, Route>,
    /// Default source filter per role.
    pub sources: BTreeMap<Role, SourceFilter>,
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            fallback_route: Route::TrackA,
            dual_route: vec![WorkType::Calendar, WorkType::Email],
            roles: BTreeMap::from([
                (Role::new("sales"), Route::TrackA),
                (Role::new("developer"), Route::TrackB),
            ]),
            sources: BTreeMap::new(),
        }
    }
}

/// `[writeback]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WriteBackConfig {
    /// Transition name per status category; missing entries use defaults.
    pub transitions: BTreeMap<StatusCategory, String>,
}

impl EngineConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed TOML or unknown values
    /// and [`ConfigError::Invalid`] for out-of-range values.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from `path`, or the defaults when it does not
    /// exist.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] when the file cannot be read, otherwise
    /// the errors of [`EngineConfig::from_toml_str`].
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no configuration file, using defaults");
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        Self::from_toml_str(&content)
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for a zero sync interval or page
    /// size, or a blank transition name.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sync.interval_minutes == 0 {
            return Err(ConfigError::Invalid(
                "sync.interval_minutes must be positive".to_owned(),
            ));
        }
        if self.sync.max_results == 0 {
            return Err(ConfigError::Invalid(
                "sync.max_results must be positive".to_owned(),
            ));
        }
        if let Some((category, _)) = self
            .writeback
            .transitions
            .iter()
            .find(|(_, name)| name.trim().is_empty())
        {
            return Err(ConfigError::Invalid(format!(
                "writeback.transitions.{} must not be blank",
                category.as_str()
            )));
        }
        Ok(())
    }

    /// Returns the time between passes for each scope.
    #[must_use]
    pub const fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync.interval_minutes.saturating_mul(60))
    }

    /// Returns the reconciliation settings.
    #[must_use]
    pub const fn sync_settings(&self) -> SyncSettings {
        SyncSettings {
            max_results: self.sync.max_results,
            tracker_route: self.sync.tracker_route,
        }
    }

    /// Returns the conflict policy for local edits.
    #[must_use]
    pub const fn conflict_policy(&self) -> ConflictPolicy {
        self.conflicts.policy
    }

    /// Builds the role routing table.
    #[must_use]
    pub fn route_policy(&self) -> RoutePolicy {
        self.access
            .roles
            .iter()
            .fold(RoutePolicy::new(self.access.fallback_route), |policy, (role, route)| {
                policy.with_role(role.clone(), *route)
            })
            .with_dual_route(self.access.dual_route.iter().copied())
    }

    /// Builds the per-role source policy.
    #[must_use]
    pub fn source_policy(&self) -> SourcePolicy {
        self.access
            .sources
            .iter()
            .fold(SourcePolicy::new(), |policy, (role, filter)| {
                policy.with_role(role.clone(), *filter)
            })
    }

    /// Builds the write-back transition table.
    #[must_use]
    pub fn transition_table(&self) -> TransitionTable {
        TransitionTable::new(
            self.writeback
                .transitions
                .iter()
                .map(|(category, name)| (*category, name.trim().to_owned())),
        )
    }
}
