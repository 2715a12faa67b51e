use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::Arc;

use crate::data::{AuthProvider, PersistenceGateway, User};

const SESSION_KEY: &str = "session";

/// Single-machine auth: the session lives in the same store as the projects.
///
/// A username keeps the same user id across sign-ins (`user_<username>`).
pub struct LocalAuthProvider {
    store: Arc<dyn PersistenceGateway>,
    username: String,
}

impl LocalAuthProvider {
    pub fn new(store: Arc<dyn PersistenceGateway>, username: impl Into<String>) -> Self {
        Self {
            store,
            username: username.into(),
        }
    }

    async fn user_id(&self) -> Result<String> {
        let key = format!("user_{}", self.username);
        if let Some(id) = self.store.get(&key).await?.as_ref().and_then(|v| v.as_str()) {
            return Ok(id.to_string());
        }

        let id = uuid::Uuid::new_v4().to_string();
        self.store
            .set(&key, serde_json::Value::String(id.clone()))
            .await?;
        Ok(id)
    }
}

#[async_trait]
impl AuthProvider for LocalAuthProvider {
    async fn get_user(&self) -> Result<User> {
        match self.store.get(SESSION_KEY).await? {
            None | Some(serde_json::Value::Null) => Ok(User::anonymous()),
            Some(value) => serde_json::from_value(value).context("Invalid session record"),
        }
    }

    async fn sign_in(&self) -> Result<User> {
        let user = User {
            id: self.user_id().await?,
            username: self.username.clone(),
            is_logged_in: true,
        };
        self.store
            .set(SESSION_KEY, serde_json::to_value(&user)?)
            .await?;
        Ok(user)
    }

    async fn sign_out(&self) -> Result<()> {
        self.store.set(SESSION_KEY, serde_json::Value::Null).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contexts::FileStore;

    fn provider(dir: &std::path::Path, username: &str) -> LocalAuthProvider {
        let store = Arc::new(FileStore::new(Some(dir.to_path_buf())));
        LocalAuthProvider::new(store, username)
    }

    #[tokio::test]
    async fn test_anonymous_until_sign_in() {
        let dir = tempfile::tempdir().unwrap();
        let auth = provider(dir.path(), "ada");

        assert!(!auth.get_user().await.unwrap().is_logged_in);

        let user = auth.sign_in().await.unwrap();
        assert!(user.is_logged_in);
        assert_eq!(user.username, "ada");
        assert_eq!(auth.get_user().await.unwrap(), user);

        auth.sign_out().await.unwrap();
        assert_eq!(auth.get_user().await.unwrap(), User::anonymous());
    }

    #[tokio::test]
    async fn test_user_id_is_stable_across_sign_ins() {
        let dir = tempfile::tempdir().unwrap();
        let auth = provider(dir.path(), "grace");

        let first = auth.sign_in().await.unwrap();
        auth.sign_out().await.unwrap();
        let second = auth.sign_in().await.unwrap();
        assert_eq!(first.id, second.id);

        let other = provider(dir.path(), "linus").sign_in().await.unwrap();
        assert_ne!(first.id, other.id);
    }
}
