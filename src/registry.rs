//! Named executor lookup.
//!
//! A [`Registry`] maps a database name to a getter that hands out an
//! executor. It is an ordinary value passed to whoever needs a connection,
//! so tests can build their own with fakes.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use crate::config::{Config, DatabaseConfig};
use crate::engine::{MySqlExecutor, SharedExecutor};
use crate::error::{WeaveError, WeaveResult};

/// Produces the executor for one database name.
pub type ConnGetter = Arc<dyn Fn() -> WeaveResult<SharedExecutor> + Send + Sync>;

#[derive(Clone, Default)]
pub struct Registry {
    getters: BTreeMap<String, ConnGetter>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a getter. Re-registering a name replaces the previous getter.
    pub fn register<F>(&mut self, name: impl Into<String>, getter: F)
    where
        F: Fn() -> WeaveResult<SharedExecutor> + Send + Sync + 'static,
    {
        let name = name.into();
        if self.getters.insert(name.clone(), Arc::new(getter)).is_some() {
            tracing::debug!(name = %name, "replaced database getter");
        }
    }

    /// Register an already built executor.
    pub fn register_executor(&mut self, name: impl Into<String>, executor: SharedExecutor) {
        self.register(name, move || Ok(Arc::clone(&executor)));
    }

    /// Register a lazily connected MySQL pool; the pool is built on first lookup.
    pub fn register_mysql(&mut self, db: &DatabaseConfig) {
        let dsn = db.dsn.clone();
        let settings = db.pool_settings();
        let slot: Mutex<Option<SharedExecutor>> = Mutex::new(None);
        self.register(db.name.clone(), move || {
            let mut slot = slot
                .lock()
                .map_err(|_| WeaveError::Connection("executor slot poisoned".to_string()))?;
            if let Some(executor) = slot.as_ref() {
                return Ok(Arc::clone(executor));
            }
            let executor: SharedExecutor = Arc::new(MySqlExecutor::connect_lazy(&dsn, settings)?);
            *slot = Some(Arc::clone(&executor));
            Ok(executor)
        });
    }

    /// One lazily connected pool per configured database. Later entries
    /// with the same name replace earlier ones.
    pub fn from_config(config: &Config) -> Self {
        let mut registry = Self::new();
        for db in &config.databases {
            registry.register_mysql(db);
        }
        registry
    }

    /// Resolve `name` to an executor.
    pub fn get(&self, name: &str) -> WeaveResult<SharedExecutor> {
        let getter = self
            .getters
            .get(name)
            .ok_or_else(|| WeaveError::UnknownDatabase(name.to_string()))?;
        getter()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.getters.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.getters.keys().map(String::as_str)
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("names", &self.getters.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{ExecResult, Executor, QueryResult};
    use crate::query::Statement;
    use async_trait::async_trait;

    struct Noop;

    #[async_trait]
    impl Executor for Noop {
        async fn query(&self, _statement: &Statement) -> WeaveResult<QueryResult> {
            Ok(QueryResult::default())
        }

        async fn execute(&self, _statement: &Statement) -> WeaveResult<ExecResult> {
            Ok(ExecResult::default())
        }
    }

    #[test]
    fn test_unknown_name() {
        let registry = Registry::new();
        assert!(matches!(
            registry.get("main"),
            Err(WeaveError::UnknownDatabase(name)) if name == "main"
        ));
    }

    #[test]
    fn test_register_and_replace() {
        let mut registry = Registry::new();
        registry.register("main", || Err(WeaveError::Connection("down".into())));
        assert!(registry.get("main").is_err());

        registry.register_executor("main", Arc::new(Noop));
        assert!(registry.get("main").is_ok());
        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["main"]);
    }

    #[test]
    fn test_from_config_registers_each_name() {
        let config = Config::from_toml(
            "[[database]]\nname = \"a\"\ndsn = \"mysql://localhost/a\"\n\
             [[database]]\nname = \"b\"\ndsn = \"mysql://localhost/b\"\n",
        )
        .unwrap();
        let registry = Registry::from_config(&config);
        assert!(registry.contains("a"));
        assert!(registry.contains("b"));
        assert!(!registry.contains("c"));
    }
}
