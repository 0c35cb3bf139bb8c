//! TOML-based configuration for bkquery.
//!
//! Supports a config file (bkquery.toml) with environment variable expansion
//! in physical table identifiers.
//!
//! Example configuration:
//! ```toml
//! [tables.audit]
//! risk = "warehouse.risk_snapshot.doris"
//! event = "${EVENT_DB}.event_log.doris"
//!
//! [planner]
//! storage_suffixes = ["doris"]
//! event_table_key = "event"
//! base_partition_column = "thedate"
//!
//! [planner.ordinal_orderings]
//! risk_level = ["HIGH", "MIDDLE", "LOW"]
//!
//! [planner.dedup]
//! "1001" = [{ source = "data", name = "ip" }, { source = "basic", name = "raw_event_id" }]
//!
//! [bridge]
//! utc_offset_minutes = 480
//! ```

use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::bridge::{BridgeResult, LiteralRenderer, DEFAULT_UTC_OFFSET_MINUTES};
use crate::planner::DedupField;

/// Error type for settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid table identifier for '{key}': {value}")]
    InvalidTableIdentifier { key: String, value: String },
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Logical → physical table identifiers, per namespace.
    pub tables: HashMap<String, HashMap<String, String>>,

    pub planner: PlannerSettings,

    pub bridge: BridgeSettings,
}

/// Analytical planner configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PlannerSettings {
    /// Trailing segments kept attached to the table name when splitting
    /// physical identifiers.
    pub storage_suffixes: Vec<String>,

    /// Table-name store key of the event table.
    pub event_table_key: String,

    /// Partition column on the base query's innermost scan; pushdown is
    /// skipped when unset.
    pub base_partition_column: Option<String>,

    /// Separator between concatenated dedup key parts.
    pub dedup_separator: String,

    /// Secondary sort key, always descending.
    pub tiebreaker: String,

    /// Ranked values for enum-like base fields.
    pub ordinal_orderings: HashMap<String, Vec<String>>,

    /// Dedup key fields per strategy id.
    pub dedup: BTreeMap<String, Vec<DedupField>>,

    pub event_columns: EventColumns,

    pub base_columns: BaseColumns,
}

impl Default for PlannerSettings {
    fn default() -> Self {
        Self {
            storage_suffixes: vec!["doris".to_string()],
            event_table_key: "event".to_string(),
            base_partition_column: None,
            dedup_separator: "|".to_string(),
            tiebreaker: "risk_id".to_string(),
            ordinal_orderings: HashMap::from([(
                "risk_level".to_string(),
                vec!["HIGH".to_string(), "MIDDLE".to_string(), "LOW".to_string()],
            )]),
            dedup: BTreeMap::new(),
            event_columns: EventColumns::default(),
            base_columns: BaseColumns::default(),
        }
    }
}

/// Column names on the event table.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EventColumns {
    pub strategy_id: String,
    pub raw_event_id: String,
    pub event_id: String,
    pub event_data: String,
    pub event_evidence: String,
    pub event_time: String,
    /// Millisecond epoch timestamp.
    pub timestamp: String,
    pub partition: String,
}

impl Default for EventColumns {
    fn default() -> Self {
        Self {
            strategy_id: "strategy_id".to_string(),
            raw_event_id: "raw_event_id".to_string(),
            event_id: "event_id".to_string(),
            event_data: "event_data".to_string(),
            event_evidence: "event_evidence".to_string(),
            event_time: "event_time".to_string(),
            timestamp: "dtEventTimeStamp".to_string(),
            partition: "thedate".to_string(),
        }
    }
}

/// Column names the base query must project for the event join.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BaseColumns {
    pub strategy_id: String,
    pub raw_event_id: String,
    pub event_time: String,
    pub event_end_time: String,
}

impl Default for BaseColumns {
    fn default() -> Self {
        Self {
            strategy_id: "strategy_id".to_string(),
            raw_event_id: "raw_event_id".to_string(),
            event_time: "event_time".to_string(),
            event_end_time: "event_end_time".to_string(),
        }
    }
}

/// ORM bridge configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BridgeSettings {
    /// Offset aware datetime parameters are localized to.
    pub utc_offset_minutes: i32,
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            utc_offset_minutes: DEFAULT_UTC_OFFSET_MINUTES,
        }
    }
}

impl BridgeSettings {
    pub fn renderer(&self) -> BridgeResult<LiteralRenderer> {
        LiteralRenderer::from_offset_minutes(self.utc_offset_minutes)
    }
}

impl Settings {
    /// Load settings from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SettingsError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, SettingsError> {
        Ok(toml::from_str(content)?)
    }

    /// Load settings from the default config file locations.
    ///
    /// Searches in order:
    /// 1. Environment variable `BKQUERY_CONFIG`
    /// 2. `./bkquery.toml`
    /// 3. `~/.config/bkquery/config.toml`
    pub fn load() -> Result<Self, SettingsError> {
        if let Ok(path) = env::var("BKQUERY_CONFIG") {
            return Self::from_file(&path);
        }

        let local_config = PathBuf::from("bkquery.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("bkquery").join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        Ok(Settings::default())
    }
}

/// Expand environment variables in a string.
///
/// Supports `${VAR}` and `$VAR` syntax.
pub fn expand_env_vars(s: &str) -> Result<String, SettingsError> {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '$' {
            result.push(c);
            continue;
        }

        let mut var_name = String::new();
        if chars.peek() == Some(&'{') {
            chars.next();
            for ch in chars.by_ref() {
                if ch == '}' {
                    break;
                }
                var_name.push(ch);
            }
        } else {
            while let Some(ch) = chars.next_if(|ch| ch.is_alphanumeric() || *ch == '_') {
                var_name.push(ch);
            }
            if var_name.is_empty() {
                result.push('$');
                continue;
            }
        }

        let value = env::var(&var_name).map_err(|_| SettingsError::MissingEnvVar(var_name))?;
        result.push_str(&value);
    }

    Ok(result)
}
