use log::warn;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Bearer token shared by every REST caller of a session. A 401 evicts it.
#[derive(Clone, Debug, Default)]
pub struct AuthToken {
    inner: Arc<RwLock<Option<String>>>,
}

impl AuthToken {
    pub fn new(token: Option<String>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(token.filter(|t| !t.is_empty()))),
        }
    }

    pub async fn bearer(&self) -> Option<String> {
        self.inner
            .read().await
            .as_ref()
            .map(|t| format!("Bearer {}", t))
    }

    pub async fn evict(&self) {
        if self.inner.write().await.take().is_some() {
            warn!("Server rejected the auth token; it has been cleared. Sign in again to restore access.");
        }
    }

    pub async fn is_present(&self) -> bool {
        self.inner.read().await.is_some()
    }
}
