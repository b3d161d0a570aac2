//! Durable holder for the current session.

use crate::error::Result;
use crate::routing::Site;
use crate::traits::SessionStorage;
use crate::types::{Session, UserProfile};
use std::sync::Arc;
use tokio::sync::Mutex;

const KEY_TOKEN: &str = "token";
const KEY_USER: &str = "user";

/// Durable holder for the current [`Session`].
///
/// Single-writer rule: only the session coordinator writes here (sign-in,
/// refresh success, invalidation). The gateway only reads. Every access
/// path holds the internal mutex, so a reader never observes a half-written
/// session (a stale token paired with a fresh profile, or the reverse).
#[derive(Clone)]
pub struct TokenStore {
    storage: Arc<dyn SessionStorage>,
    lock: Arc<Mutex<()>>,
}

impl TokenStore {
    pub fn new(storage: Arc<dyn SessionStorage>) -> Self {
        TokenStore {
            storage,
            lock: Arc::new(Mutex::new(())),
        }
    }

    /// Read the stored session. `None` when no complete session exists.
    pub async fn read(&self) -> Result<Option<Session>> {
        let _guard = self.lock.lock().await;
        let Some(token) = self.storage.get(KEY_TOKEN).await? else {
            return Ok(None);
        };
        let profile = match self.storage.get(KEY_USER).await? {
            Some(raw) => serde_json::from_str::<UserProfile>(&raw).unwrap_or_default(),
            None => UserProfile::default(),
        };
        let site = match self.storage.get(crate::routing::KEY_SELECTED_SITE).await? {
            Some(raw) => Site::parse(&raw).unwrap_or(Site::DEFAULT),
            None => Site::DEFAULT,
        };
        Ok(Some(Session::new(token, profile, site)))
    }

    /// Current bearer token, if a session exists.
    pub async fn access_token(&self) -> Result<Option<String>> {
        let _guard = self.lock.lock().await;
        self.storage.get(KEY_TOKEN).await
    }

    /// Replace the stored session. Atomic: no partial state observable.
    pub async fn write(&self, session: &Session) -> Result<()> {
        let _guard = self.lock.lock().await;
        let profile = serde_json::to_string(&session.profile)?;
        self.storage.set(KEY_USER, profile).await?;
        self.storage
            .set(KEY_TOKEN, session.access_token.clone())
            .await?;
        Ok(())
    }

    /// Remove the stored session. Leaves the persisted site alone; the
    /// site lifecycle is independent of the token lifecycle.
    pub async fn clear(&self) -> Result<()> {
        let _guard = self.lock.lock().await;
        self.storage.remove(KEY_TOKEN).await?;
        self.storage.remove(KEY_USER).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use async_trait::async_trait;

    fn store() -> TokenStore {
        TokenStore::new(Arc::new(MemoryStorage::new()))
    }

    /// Storage that yields to the scheduler before writing the token
    /// key, widening the gap between the profile and token writes.
    struct YieldingStorage {
        inner: MemoryStorage,
    }

    #[async_trait]
    impl SessionStorage for YieldingStorage {
        async fn get(&self, key: &str) -> Result<Option<String>> {
            self.inner.get(key).await
        }

        async fn set(&self, key: &str, value: String) -> Result<()> {
            if key == KEY_TOKEN {
                for _ in 0..8 {
                    tokio::task::yield_now().await;
                }
            }
            self.inner.set(key, value).await
        }

        async fn remove(&self, key: &str) -> Result<()> {
            self.inner.remove(key).await
        }
    }

    #[tokio::test]
    async fn test_empty_store_reads_none() {
        assert_eq!(store().read().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_write_read_clear() {
        let store = store();
        let session = Session::new("tok-1", UserProfile::new("mruiz"), Site::DEFAULT);
        store.write(&session).await.unwrap();

        let read = store.read().await.unwrap().unwrap();
        assert_eq!(read.access_token, "tok-1");
        assert_eq!(read.profile.username, "mruiz");

        store.clear().await.unwrap();
        assert_eq!(store.read().await.unwrap(), None);
        assert_eq!(store.access_token().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_concurrent_read_never_sees_half_written_session() {
        let store = TokenStore::new(Arc::new(YieldingStorage {
            inner: MemoryStorage::new(),
        }));

        let mut before = UserProfile::new("mruiz");
        before.role = Some("agent".into());
        store
            .write(&Session::new("tok-1", before, Site::DEFAULT))
            .await
            .unwrap();

        let mut after = UserProfile::new("mruiz");
        after.role = Some("supervisor".into());
        let writer = {
            let store = store.clone();
            tokio::spawn(async move {
                store
                    .write(&Session::new("tok-2", after, Site::DEFAULT))
                    .await
                    .unwrap();
            })
        };

        for _ in 0..32 {
            let session = store.read().await.unwrap().unwrap();
            let consistent = (session.access_token == "tok-1"
                && session.profile.role.as_deref() == Some("agent"))
                || (session.access_token == "tok-2"
                    && session.profile.role.as_deref() == Some("supervisor"));
            assert!(
                consistent,
                "half-written session observed: {} / {:?}",
                session.access_token, session.profile.role
            );
            tokio::task::yield_now().await;
        }
        writer.await.unwrap();
        assert_eq!(store.access_token().await.unwrap().as_deref(), Some("tok-2"));
    }

    #[tokio::test]
    async fn test_clear_leaves_site_alone() {
        let storage = Arc::new(MemoryStorage::new());
        storage
            .set(crate::routing::KEY_SELECTED_SITE, "qa".into())
            .await
            .unwrap();
        let store = TokenStore::new(storage.clone());
        store
            .write(&Session::new("tok", UserProfile::new("u"), Site::Qa))
            .await
            .unwrap();
        store.clear().await.unwrap();
        assert_eq!(
            storage
                .get(crate::routing::KEY_SELECTED_SITE)
                .await
                .unwrap()
                .as_deref(),
            Some("qa")
        );
    }
}
