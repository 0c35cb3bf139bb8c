//! Logical → physical table-name lookup.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

use super::settings::{expand_env_vars, Settings, SettingsError};

static PHYSICAL_IDENTIFIER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9_]+(\.[A-Za-z0-9_]+)*$").expect("valid regex")
});

/// Reject anything but dot-separated `[A-Za-z0-9_]` segments.
///
/// Physical identifiers are emitted unquoted, so this is the only thing
/// standing between the store and the generated SQL.
pub fn validate_physical_identifier(key: &str, value: &str) -> Result<(), SettingsError> {
    if PHYSICAL_IDENTIFIER.is_match(value) {
        Ok(())
    } else {
        Err(SettingsError::InvalidTableIdentifier {
            key: key.to_string(),
            value: value.to_string(),
        })
    }
}

/// Key-value store of physical table identifiers, keyed by
/// `(config_key, namespace)`.
pub trait TableNameStore {
    fn get(&self, config_key: &str, namespace: &str) -> Option<String>;

    /// Look up and validate, falling back to `default`.
    fn resolve(
        &self,
        config_key: &str,
        namespace: &str,
        default: Option<&str>,
    ) -> Result<Option<String>, SettingsError> {
        let value = self
            .get(config_key, namespace)
            .or_else(|| default.map(str::to_string));
        if let Some(value) = &value {
            validate_physical_identifier(config_key, value)?;
        }
        Ok(value)
    }
}

/// In-memory store, env vars already expanded.
#[derive(Debug, Clone, Default)]
pub struct StaticTableNames {
    entries: HashMap<(String, String), String>,
}

impl StaticTableNames {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(
        mut self,
        namespace: impl Into<String>,
        config_key: impl Into<String>,
        physical: impl Into<String>,
    ) -> Self {
        self.entries
            .insert((config_key.into(), namespace.into()), physical.into());
        self
    }

    pub fn from_settings(settings: &Settings) -> Result<Self, SettingsError> {
        let mut entries = HashMap::new();
        for (namespace, tables) in &settings.tables {
            for (key, value) in tables {
                entries.insert((key.clone(), namespace.clone()), expand_env_vars(value)?);
            }
        }
        Ok(Self { entries })
    }
}

impl TableNameStore for StaticTableNames {
    fn get(&self, config_key: &str, namespace: &str) -> Option<String> {
        self.entries
            .get(&(config_key.to_string(), namespace.to_string()))
            .cloned()
    }
}
