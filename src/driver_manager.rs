use std::sync::{Arc, LazyLock};

use dashmap::DashMap;

use crate::Result;
use crate::error::DbError;
use crate::executor::session::Session;
use crate::registry::REGISTRY;
use crate::udbc::DEFAULT_DB_NAME;
use crate::udbc::driver::Driver;

/// The global entry point: register drivers, load SQL mapper assets, and
/// open sessions against any of them by name.
pub static U: LazyLock<DriverManager> = LazyLock::new(DriverManager::new);

/// A registry of named database drivers (teacher: `DriverManager`, itself
/// grounded in `original_source/sqlrunner.go`'s `NewSessionManager(factory)`
/// — here a driver's `name()` plays the role the Go factory's lookup key
/// does).
pub struct DriverManager {
    pools: DashMap<String, Arc<dyn Driver>>,
}

impl Default for DriverManager {
    fn default() -> Self {
        Self::new()
    }
}

impl DriverManager {
    pub fn new() -> Self {
        Self {
            pools: DashMap::new(),
        }
    }

    /// Registers a driver under its own `name()`. Errors if the default
    /// driver name is already taken — non-default names may be
    /// re-registered (e.g. in tests that rebuild a fixture driver).
    pub fn register(&self, driver: impl Driver + 'static) -> Result<()> {
        let name = driver.name().to_string();
        if name == DEFAULT_DB_NAME && self.pools.contains_key(&name) {
            return Err(DbError::DriverError(format!(
                "driver with name '{}' already registered",
                name
            )));
        }
        self.pools.insert(name, Arc::new(driver));
        Ok(())
    }

    /// Loads XML mapper assets matched by `pattern` into the global
    /// `SqlRegistry`.
    pub fn assets(&self, pattern: &str) -> Result<()> {
        REGISTRY.load(pattern)
    }

    pub fn session(&self) -> Option<Session> {
        self.session_by_name(DEFAULT_DB_NAME)
    }

    pub fn session_by_name(&self, db_name: &str) -> Option<Session> {
        self.pools
            .get(db_name)
            .map(|v| Session::new(v.value().clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::udbc::sqlite::pool::SqliteDriver;

    #[test]
    fn session_by_name_is_none_for_unregistered_drivers() {
        let manager = DriverManager::new();
        assert!(manager.session_by_name("nope").is_none());
    }

    #[test]
    fn registering_the_default_name_twice_errors() {
        let manager = DriverManager::new();
        manager
            .register(SqliteDriver::new("sqlite::memory:").build().unwrap())
            .unwrap();
        assert!(
            manager
                .register(SqliteDriver::new("sqlite::memory:").build().unwrap())
                .is_err()
        );
    }
}
