//! API configuration

use serde::Deserialize;

use core_kernel::{CoreError, Currency};
use domain_payment::EngineSettings;

/// API configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// JWT secret for authentication
    pub jwt_secret: String,
    /// JWT expiration in seconds
    pub jwt_expiration_secs: u64,
    /// Log level
    pub log_level: String,
    /// `json` for structured logs, anything else for text
    pub log_format: String,
    /// ISO code of the company currency
    pub currency: String,
    /// JSON file with accounts, journals and stage catalogs; the bundled
    /// catalog is used when unset
    pub catalog_seed: Option<String>,
    pub engine: EngineSettings,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            jwt_secret: "change-me-in-production".to_string(),
            jwt_expiration_secs: 3600,
            log_level: "info".to_string(),
            log_format: "text".to_string(),
            currency: "MAD".to_string(),
            catalog_seed: None,
            engine: EngineSettings::default(),
        }
    }
}

impl ApiConfig {
    /// Loads configuration from `PAYSTAGE_`-prefixed environment variables
    ///
    /// Nested engine settings use a double underscore, e.g.
    /// `PAYSTAGE_ENGINE__ALLOCATION_ORDER=smallest_remaining_first`.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(
                config::Environment::with_prefix("PAYSTAGE")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    /// Returns the server address
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn json_logs(&self) -> bool {
        self.log_format.eq_ignore_ascii_case("json")
    }

    pub fn currency(&self) -> Result<Currency, CoreError> {
        Ok(self.currency.parse::<Currency>()?)
    }
}
