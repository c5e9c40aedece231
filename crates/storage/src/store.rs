use promptdock_core::{Paths, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

/// Fixed-namespace store keys. Collection-valued entries (prompt cache,
/// selector blob) are always replaced wholesale, never mutated in place.
pub mod keys {
    pub const AUTH_STATE: &str = "auth_state";
    pub const PROMPT_CACHE: &str = "prompt_cache";
    pub const SETTINGS: &str = "settings";
    pub const SELECTOR_CACHE: &str = "selector_cache";
}

/// Durable key-value store backed by one JSON file per key. Survives
/// process restarts; the single source of truth for collection-valued
/// entries.
pub struct StateStore {
    paths: Paths,
}

impl StateStore {
    pub fn new(paths: Paths) -> Self {
        Self { paths }
    }

    /// Read and decode a key. A missing or unreadable file is `None`; a
    /// corrupt file is logged and treated as absent rather than poisoning
    /// every caller.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let path = self.paths.state_file(key);
        if !path.exists() {
            return Ok(None);
        }

        let content = tokio::fs::read_to_string(&path).await?;
        match serde_json::from_str(&content) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                debug!(key = %key, error = %e, "Failed to parse stored value, treating as absent");
                Ok(None)
            }
        }
    }

    /// Serialize and persist a key, replacing any previous value.
    pub async fn set<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let path = self.paths.state_file(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let content = serde_json::to_string_pretty(value)?;
        tokio::fs::write(&path, content).await?;
        Ok(())
    }

    /// Remove a key. Removing an absent key is not an error.
    pub async fn remove(&self, key: &str) -> Result<()> {
        let path = self.paths.state_file(key);
        if path.exists() {
            tokio::fs::remove_file(&path).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use promptdock_core::{AuthState, Paths};

    fn store_in(dir: &std::path::Path) -> StateStore {
        StateStore::new(Paths::with_base(dir.to_path_buf()))
    }

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());

        let state = AuthState {
            is_authenticated: true,
            user: None,
            token: Some("tok".to_string()),
        };
        store.set(keys::AUTH_STATE, &state).await.unwrap();

        let loaded: AuthState = store.get(keys::AUTH_STATE).await.unwrap().unwrap();
        assert_eq!(loaded, state);
    }

    #[tokio::test]
    async fn missing_key_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());

        let loaded: Option<AuthState> = store.get(keys::AUTH_STATE).await.unwrap();
        assert!(loaded.is_none());
    }

    #[tokio::test]
    async fn corrupt_file_reads_as_absent() {
        let dir = tempfile::tempdir().unwrap();
        let paths = Paths::with_base(dir.path().to_path_buf());
        paths.ensure_dirs().unwrap();
        std::fs::write(paths.state_file(keys::SETTINGS), "{not json").unwrap();

        let store = store_in(dir.path());
        let loaded: Option<AuthState> = store.get(keys::SETTINGS).await.unwrap();
        assert!(loaded.is_none());
    }

    #[tokio::test]
    async fn remove_clears_value_and_tolerates_absence() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path());

        store.set(keys::AUTH_STATE, &AuthState::default()).await.unwrap();
        store.remove(keys::AUTH_STATE).await.unwrap();
        let loaded: Option<AuthState> = store.get(keys::AUTH_STATE).await.unwrap();
        assert!(loaded.is_none());

        // Second remove is a no-op
        store.remove(keys::AUTH_STATE).await.unwrap();
    }
}
