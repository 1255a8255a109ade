//! Driver enablement configuration.

use serde::{Deserialize, Serialize};

use crate::mysql::MYSQL_DRIVER;
use crate::postgres::POSTGRES_DRIVER;
use crate::sqlite::SQLITE_DRIVER;

/// Which drivers the factory is allowed to hand out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    /// Enabled driver identifiers.
    pub enabled: Vec<String>,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            enabled: vec![
                MYSQL_DRIVER.to_string(),
                POSTGRES_DRIVER.to_string(),
                SQLITE_DRIVER.to_string(),
            ],
        }
    }
}

impl DriverConfig {
    /// Config enabling only the given drivers.
    pub fn only<I, S>(drivers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            enabled: drivers.into_iter().map(Into::into).collect(),
        }
    }

    /// Whether `driver` is enabled.
    pub fn is_enabled(&self, driver: &str) -> bool {
        self.enabled.iter().any(|d| d == driver)
    }

    /// Enable a driver.
    pub fn enable(mut self, driver: impl Into<String>) -> Self {
        let driver = driver.into();
        if !self.is_enabled(&driver) {
            self.enabled.push(driver);
        }
        self
    }

    /// Disable a driver.
    pub fn disable(mut self, driver: &str) -> Self {
        self.enabled.retain(|d| d != driver);
        self
    }
}
