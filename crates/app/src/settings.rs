//! Settings for the `cambio` daemon, read from `settings.toml` in the working
//! directory and overridden by `CAMBIO__SECTION__KEY` environment variables.
//!
//! See `settings.example.toml` for the available keys.
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct App {
    #[serde(default = "default_level")]
    pub level: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Database {
    Memory,
    Sqlite(String),
}

#[derive(Debug, Deserialize)]
pub struct Ledger {
    /// IANA timezone used to bucket business days.
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

#[derive(Debug, Deserialize)]
pub struct Reconciliation {
    /// Seconds between two sweeps over every tracked location.
    pub interval_secs: u64,
    /// Recorded as `reconciled_by` on corrected balances.
    #[serde(default = "default_actor")]
    pub actor_id: String,
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub app: App,
    pub database: Database,
    pub ledger: Ledger,
    pub reconciliation: Option<Reconciliation>,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .set_default("app.level", default_level())?
            .set_default("ledger.timezone", default_timezone())?
            .add_source(File::with_name("settings").required(false))
            .add_source(Environment::with_prefix("CAMBIO").separator("__"))
            .build()?;

        settings.try_deserialize()
    }
}

fn default_level() -> String {
    "info".to_string()
}

fn default_timezone() -> String {
    "UTC".to_string()
}

fn default_actor() -> String {
    "system:reconciler".to_string()
}
