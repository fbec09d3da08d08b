//! # Configuration
//!
//! A minimal string key/value store in the spirit of Feathers'
//! `app.set()` / `app.get()`. Applications fill it from the environment
//! (after `dotenvy` has loaded any `.env` file) and then build their typed
//! configuration from an immutable [`ConfigSnapshot`].
//!
//! ```rust
//! use tenant_core::ConfigStore;
//!
//! let mut store = ConfigStore::new();
//! store.set("saga.base_stack", "perls-base");
//! store.load_vars(
//!     [("TENANT__HTTP__PORT".to_string(), "8080".to_string())],
//!     "TENANT__",
//! );
//!
//! let snap = store.snapshot();
//! assert_eq!(snap.get("http.port"), Some("8080"));
//! assert_eq!(snap.get("saga.base_stack"), Some("perls-base"));
//! ```

use std::collections::HashMap;
use std::str::FromStr;

use crate::errors::{TenantError, TenantResult};

#[derive(Debug, Default)]
pub struct ConfigStore {
    values: HashMap<String, String>,
}

impl ConfigStore {
    pub fn new() -> Self {
        Self {
            values: HashMap::new(),
        }
    }

    /// Set a configuration key to a string value.
    pub fn set<K, V>(&mut self, key: K, value: V)
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.values.insert(key.into(), value.into());
    }

    /// Set a key only if nothing has been set for it yet.
    pub fn set_default<K, V>(&mut self, key: K, value: V)
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.values.entry(key.into()).or_insert_with(|| value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(|s| s.as_str())
    }

    pub fn has(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Copy matching variables into the store.
    ///
    /// `TENANT__SAGA__BASE_STACK` with prefix `TENANT__` becomes
    /// `saga.base_stack`.
    pub fn load_vars<I>(&mut self, vars: I, prefix: &str)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in vars {
            if let Some(stripped) = key.strip_prefix(prefix) {
                let normalized = stripped.to_lowercase().replace("__", ".");
                self.set(normalized, value);
            }
        }
    }

    /// Load every process environment variable carrying `prefix`.
    pub fn load_env(&mut self, prefix: &str) {
        self.load_vars(std::env::vars(), prefix);
    }

    pub fn snapshot(&self) -> ConfigSnapshot {
        ConfigSnapshot::new(self.values.clone())
    }
}

#[derive(Debug, Clone, Default)]
pub struct ConfigSnapshot {
    map: HashMap<String, String>,
}

impl ConfigSnapshot {
    pub(crate) fn new(map: HashMap<String, String>) -> Self {
        Self { map }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.map.get(key).map(|s| s.as_str())
    }

    pub fn get_string(&self, key: &str) -> Option<String> {
        self.map.get(key).cloned()
    }

    pub fn get_usize(&self, key: &str) -> Option<usize> {
        self.get(key).and_then(|v| v.parse::<usize>().ok())
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(|v| v.parse::<bool>().ok())
    }

    /// A key that must be present and non-empty.
    pub fn require(&self, key: &str) -> TenantResult<String> {
        match self.get(key) {
            Some(v) if !v.trim().is_empty() => Ok(v.to_string()),
            _ => Err(TenantError::validation(format!(
                "missing configuration key `{key}`"
            ))),
        }
    }

    /// Parse a key, falling back to `default` when absent.
    pub fn parse_or<T: FromStr>(&self, key: &str, default: T) -> TenantResult<T> {
        match self.get(key) {
            None => Ok(default),
            Some(raw) => raw.parse::<T>().map_err(|_| {
                TenantError::validation(format!("configuration key `{key}` has invalid value `{raw}`"))
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_default_does_not_override() {
        let mut store = ConfigStore::new();
        store.set("queue.max_workers", "8");
        store.set_default("queue.max_workers", "4");
        store.set_default("http.port", "3030");

        let snap = store.snapshot();
        assert_eq!(snap.get_usize("queue.max_workers"), Some(8));
        assert_eq!(snap.get("http.port"), Some("3030"));
    }

    #[test]
    fn ignores_other_prefixes() {
        let mut store = ConfigStore::new();
        store.load_vars(
            [
                ("TENANT__LRS__BASE_URL".to_string(), "https://lrs/".to_string()),
                ("HOME".to_string(), "/root".to_string()),
            ],
            "TENANT__",
        );
        assert_eq!(store.get("lrs.base_url"), Some("https://lrs/"));
        assert!(!store.has("home"));
    }

    #[test]
    fn require_rejects_blank_values() {
        let mut store = ConfigStore::new();
        store.set("saga.project", "  ");
        let snap = store.snapshot();

        let err = snap.require("saga.project").unwrap_err();
        assert!(err.to_string().contains("saga.project"));
        assert!(snap.require("saga.base_stack").is_err());
    }

    #[test]
    fn parse_or_reports_bad_values() {
        let mut store = ConfigStore::new();
        store.set("http.port", "eighty");
        let snap = store.snapshot();

        assert!(snap.parse_or::<u16>("http.port", 3030).is_err());
        assert_eq!(snap.parse_or::<u64>("saga.stack_poll_interval_secs", 15).unwrap(), 15);
    }
}
