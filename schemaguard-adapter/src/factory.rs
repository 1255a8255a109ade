//! Adapter selection and caching.
//!
//! The factory is an explicitly owned object: callers create one, hand it to
//! whatever needs adapters, and invalidate its cache with [`AdapterFactory::clear_cache`].

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info};

use crate::adapter::DatabaseAdapter;
use crate::config::DriverConfig;
use crate::connection::Connection;
use crate::error::{AdapterError, AdapterResult};
use crate::mysql::{MYSQL_DRIVER, MySqlAdapter};
use crate::postgres::{POSTGRES_DRIVER, PostgresAdapter};
use crate::sqlite::{SQLITE_DRIVER, SqliteAdapter};

/// Builds an adapter around a connection.
pub type AdapterConstructor =
    Arc<dyn Fn(Arc<dyn Connection>) -> Arc<dyn DatabaseAdapter> + Send + Sync>;

/// Chooses, validates and caches driver adapters.
pub struct AdapterFactory {
    config: DriverConfig,
    constructors: RwLock<HashMap<String, AdapterConstructor>>,
    default: Mutex<Option<Arc<dyn DatabaseAdapter>>>,
}

impl AdapterFactory {
    /// Create a factory with the reference drivers registered.
    pub fn new(config: DriverConfig) -> Self {
        let factory = Self {
            config,
            constructors: RwLock::new(HashMap::new()),
            default: Mutex::new(None),
        };
        factory.register(MYSQL_DRIVER, mysql_adapter);
        factory.register(POSTGRES_DRIVER, postgres_adapter);
        factory.register(SQLITE_DRIVER, sqlite_adapter);
        factory
    }

    /// The driver configuration.
    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    /// Register (or replace) the constructor for a driver.
    pub fn register<F>(&self, driver: impl Into<String>, constructor: F)
    where
        F: Fn(Arc<dyn Connection>) -> Arc<dyn DatabaseAdapter> + Send + Sync + 'static,
    {
        let driver = driver.into();
        debug!(driver = %driver, "Registering adapter");
        self.constructors
            .write()
            .insert(driver, Arc::new(constructor));
    }

    /// Whether a constructor is registered for `driver`.
    pub fn is_registered(&self, driver: &str) -> bool {
        self.constructors.read().contains_key(driver)
    }

    /// Adapter for the default connection, created on first use and cached.
    pub fn default_adapter(
        &self,
        connection: Arc<dyn Connection>,
    ) -> AdapterResult<Arc<dyn DatabaseAdapter>> {
        let mut cached = self.default.lock();
        if let Some(adapter) = cached.as_ref() {
            return Ok(Arc::clone(adapter));
        }

        let adapter = self.build(connection)?;
        info!(driver = %adapter.driver(), "Default adapter created");
        *cached = Some(Arc::clone(&adapter));
        Ok(adapter)
    }

    /// Adapter for a named connection. Never cached.
    pub fn for_connection(
        &self,
        connection: Arc<dyn Connection>,
    ) -> AdapterResult<Arc<dyn DatabaseAdapter>> {
        self.build(connection)
    }

    /// Drop the cached default adapter.
    pub fn clear_cache(&self) {
        if self.default.lock().take().is_some() {
            debug!("Adapter cache cleared");
        }
    }

    /// Whether a default adapter is currently cached.
    pub fn is_cached(&self) -> bool {
        self.default.lock().is_some()
    }

    fn build(&self, connection: Arc<dyn Connection>) -> AdapterResult<Arc<dyn DatabaseAdapter>> {
        let driver = connection.driver().to_string();

        if !self.config.is_enabled(&driver) {
            return Err(AdapterError::unsupported_driver(
                driver,
                "driver is not enabled in configuration",
            ));
        }

        let constructor = self
            .constructors
            .read()
            .get(&driver)
            .cloned()
            .ok_or_else(|| {
                AdapterError::unsupported_driver(driver.clone(), "no adapter registered")
            })?;

        let adapter = constructor(connection);
        if !adapter.supports() {
            return Err(AdapterError::unsupported_driver(
                driver,
                format!("adapter '{}' rejected the connection", adapter.driver()),
            ));
        }
        Ok(adapter)
    }
}

fn mysql_adapter(connection: Arc<dyn Connection>) -> Arc<dyn DatabaseAdapter> {
    Arc::new(MySqlAdapter::new(connection))
}

fn postgres_adapter(connection: Arc<dyn Connection>) -> Arc<dyn DatabaseAdapter> {
    Arc::new(PostgresAdapter::new(connection))
}

fn sqlite_adapter(connection: Arc<dyn Connection>) -> Arc<dyn DatabaseAdapter> {
    Arc::new(SqliteAdapter::new(connection))
}

impl Default for AdapterFactory {
    fn default() -> Self {
        Self::new(DriverConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::Row;

    struct StubConnection(&'static str);

    #[async_trait::async_trait]
    impl Connection for StubConnection {
        fn driver(&self) -> &str {
            self.0
        }
        fn database_name(&self) -> &str {
            "stub"
        }
        async fn query(&self, _sql: &str) -> AdapterResult<Vec<Row>> {
            Ok(Vec::new())
        }
        async fn execute(&self, _sql: &str) -> AdapterResult<u64> {
            Ok(0)
        }
    }

    fn conn(driver: &'static str) -> Arc<dyn Connection> {
        Arc::new(StubConnection(driver))
    }

    #[test]
    fn test_selects_adapter_by_driver() {
        let factory = AdapterFactory::default();
        assert_eq!(factory.for_connection(conn("mysql")).unwrap().driver(), "mysql");
        assert_eq!(factory.for_connection(conn("postgres")).unwrap().driver(), "postgres");
        assert_eq!(factory.for_connection(conn("sqlite")).unwrap().driver(), "sqlite");
    }

    #[test]
    fn test_unknown_driver_is_unsupported() {
        let err = AdapterFactory::default()
            .default_adapter(conn("oracle"))
            .err()
            .unwrap();
        assert!(err.is_unsupported_driver());
    }

    #[test]
    fn test_disabled_driver_is_unsupported() {
        let factory = AdapterFactory::new(DriverConfig::only(["sqlite"]));
        let err = factory.for_connection(conn("mysql")).err().unwrap();
        assert!(err.is_unsupported_driver());
    }

    #[test]
    fn test_supports_self_check() {
        let factory = AdapterFactory::new(DriverConfig::default().enable("custom"));
        // Custom driver mapped to an adapter that does not recognise it.
        factory.register("custom", sqlite_adapter);
        let err = factory.for_connection(conn("custom")).err().unwrap();
        assert!(err.is_unsupported_driver());
    }

    #[test]
    fn test_default_adapter_cached_until_cleared() {
        let factory = AdapterFactory::default();
        let first = factory.default_adapter(conn("sqlite")).unwrap();
        let second = factory.default_adapter(conn("sqlite")).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert!(factory.is_cached());

        factory.clear_cache();
        assert!(!factory.is_cached());
        let third = factory.default_adapter(conn("sqlite")).unwrap();
        assert!(!Arc::ptr_eq(&first, &third));
    }

    #[test]
    fn test_named_connections_not_cached() {
        let factory = AdapterFactory::default();
        let a = factory.for_connection(conn("sqlite")).unwrap();
        let b = factory.for_connection(conn("sqlite")).unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
        assert!(!factory.is_cached());
    }
}
