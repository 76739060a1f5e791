//! Backend directory: which worker nodes serve which application.
//!
//! Membership is eventually consistent. Callers get an owned snapshot
//! from [`BackendDirectory::backends`] and must not hold on to it beyond
//! the operation that requested it.

use std::collections::{HashMap, HashSet};

use parking_lot::RwLock;
use tracing::{debug, info};

use tern_core::{Backend, DirectoryConfig};

use crate::error::{StateError, StateResult};

/// Source of per-application backend sets.
pub trait BackendDirectory: Send + Sync {
    /// Begin tracking an application's backend set.
    ///
    /// Returns whether the directory accepted the application.
    fn watch_application(&self, app_id: &str) -> bool;

    /// Current backends for `app_id`, in the directory's iteration order.
    ///
    /// Fails when the directory cannot name a single backend.
    fn backends(&self, app_id: &str) -> StateResult<Vec<Backend>>;
}

/// Config-driven directory.
///
/// Every application shares the default backend list unless it has an
/// override. Both can be replaced at runtime when membership changes.
#[derive(Debug, Default)]
pub struct StaticDirectory {
    default_backends: RwLock<Vec<Backend>>,
    app_backends: RwLock<HashMap<String, Vec<Backend>>>,
    watched: RwLock<HashSet<String>>,
}

impl StaticDirectory {
    /// Create a directory where every application uses `backends`.
    pub fn new(backends: Vec<Backend>) -> Self {
        Self {
            default_backends: RwLock::new(dedup(backends)),
            ..Self::default()
        }
    }

    /// Build the directory from the `[directory]` config section.
    pub fn from_config(config: &DirectoryConfig) -> Self {
        let dir = Self::new(config.backends.clone());
        for (app_id, app) in &config.apps {
            dir.set_app_backends(app_id, app.backends.clone());
        }
        info!(
            backends = config.backends.len(),
            overrides = config.apps.len(),
            "static backend directory loaded"
        );
        dir
    }

    /// Replace the default backend list.
    pub fn set_backends(&self, backends: Vec<Backend>) {
        let backends = dedup(backends);
        debug!(count = backends.len(), "default backends replaced");
        *self.default_backends.write() = backends;
    }

    /// Replace the backend list of a single application.
    pub fn set_app_backends(&self, app_id: &str, backends: Vec<Backend>) {
        let backends = dedup(backends);
        debug!(%app_id, count = backends.len(), "application backends replaced");
        self.app_backends.write().insert(app_id.to_string(), backends);
    }

    /// Whether `watch_application` has been called for `app_id`.
    pub fn is_watched(&self, app_id: &str) -> bool {
        self.watched.read().contains(app_id)
    }
}

impl BackendDirectory for StaticDirectory {
    fn watch_application(&self, app_id: &str) -> bool {
        if self.watched.write().insert(app_id.to_string()) {
            info!(%app_id, "watching application");
        }
        true
    }

    fn backends(&self, app_id: &str) -> StateResult<Vec<Backend>> {
        let snapshot = match self.app_backends.read().get(app_id) {
            Some(backends) => backends.clone(),
            None => self.default_backends.read().clone(),
        };
        if snapshot.is_empty() {
            return Err(StateError::NoBackends(app_id.to_string()));
        }
        Ok(snapshot)
    }
}

/// Drop repeated addresses, keeping first-seen order.
fn dedup(backends: Vec<Backend>) -> Vec<Backend> {
    let mut seen = HashSet::with_capacity(backends.len());
    backends.into_iter().filter(|b| seen.insert(*b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tern_core::AppBackends;

    fn addr(i: u8) -> Backend {
        format!("10.0.0.{i}:20502").parse().unwrap()
    }

    #[test]
    fn all_apps_share_default_backends() {
        let dir = StaticDirectory::new(vec![addr(1), addr(2)]);

        assert_eq!(dir.backends("spark").unwrap(), vec![addr(1), addr(2)]);
        assert_eq!(dir.backends("hive").unwrap(), vec![addr(1), addr(2)]);
    }

    #[test]
    fn app_override_takes_precedence() {
        let dir = StaticDirectory::new(vec![addr(1), addr(2)]);
        dir.set_app_backends("spark", vec![addr(9)]);

        assert_eq!(dir.backends("spark").unwrap(), vec![addr(9)]);
        assert_eq!(dir.backends("hive").unwrap(), vec![addr(1), addr(2)]);
    }

    #[test]
    fn empty_directory_is_an_error() {
        let dir = StaticDirectory::new(Vec::new());
        assert!(matches!(dir.backends("spark"), Err(StateError::NoBackends(_))));
    }

    #[test]
    fn duplicates_are_removed_in_order() {
        let dir = StaticDirectory::new(vec![addr(2), addr(1), addr(2), addr(3)]);
        assert_eq!(dir.backends("spark").unwrap(), vec![addr(2), addr(1), addr(3)]);
    }

    #[test]
    fn snapshot_is_unaffected_by_later_updates() {
        let dir = StaticDirectory::new(vec![addr(1), addr(2)]);
        let snapshot = dir.backends("spark").unwrap();

        dir.set_backends(vec![addr(5)]);

        assert_eq!(snapshot, vec![addr(1), addr(2)]);
        assert_eq!(dir.backends("spark").unwrap(), vec![addr(5)]);
    }

    #[test]
    fn watch_application_is_recorded() {
        let dir = StaticDirectory::new(vec![addr(1)]);
        assert!(!dir.is_watched("spark"));

        assert!(dir.watch_application("spark"));
        assert!(dir.watch_application("spark"));
        assert!(dir.is_watched("spark"));
    }

    #[test]
    fn from_config_applies_overrides() {
        let mut apps = HashMap::new();
        apps.insert(
            "analytics".to_string(),
            AppBackends {
                backends: vec![addr(7)],
            },
        );
        let config = DirectoryConfig {
            backends: vec![addr(1), addr(2)],
            apps,
        };

        let dir = StaticDirectory::from_config(&config);
        assert_eq!(dir.backends("analytics").unwrap(), vec![addr(7)]);
        assert_eq!(dir.backends("other").unwrap().len(), 2);
    }
}
