//! Configuration module for bkquery.
//!
//! Handles the settings file, environment variables, and the table-name store.

mod settings;
mod table_names;

pub use settings::{
    expand_env_vars, BaseColumns, BridgeSettings, EventColumns, PlannerSettings, Settings,
    SettingsError,
};
pub use table_names::{validate_physical_identifier, StaticTableNames, TableNameStore};
