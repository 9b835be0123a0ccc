use std::{path::Path, sync::Arc};

use anyhow::Context;

use crate::{
    api::{Backend, UserId},
    Notices,
};

#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Comments fetched per branch page
    pub page_size: usize,

    /// Notifications considered by the unread counter
    pub notification_limit: usize,
}

impl Default for ClientConfig {
    fn default() -> ClientConfig {
        ClientConfig {
            page_size: 20,
            notification_limit: 50,
        }
    }
}

impl ClientConfig {
    pub fn from_json_file(path: &Path) -> anyhow::Result<ClientConfig> {
        let data = std::fs::read(path)
            .with_context(|| format!("reading client config {}", path.display()))?;
        let mut config: ClientConfig = serde_json::from_slice(&data)
            .with_context(|| format!("parsing client config {}", path.display()))?;
        if config.page_size == 0 {
            tracing::warn!("page_size of 0 is not usable, falling back to 1");
            config.page_size = 1;
        }
        Ok(config)
    }
}

/// Everything an operation needs to talk to the outside world: the backend
/// session, the toast sink and the configuration.
#[derive(Clone)]
pub struct Client {
    backend: Arc<dyn Backend>,
    notices: Notices,
    config: ClientConfig,
}

impl Client {
    pub fn new(backend: Arc<dyn Backend>, notices: Notices, config: ClientConfig) -> Client {
        Client {
            backend,
            notices,
            config,
        }
    }

    pub fn backend(&self) -> &dyn Backend {
        &*self.backend
    }

    pub fn notices(&self) -> &Notices {
        &self.notices
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Identity gate for every write. Returns `None` after telling the user to
    /// log in.
    pub async fn require_auth(&self) -> Option<UserId> {
        match self.backend.current_user().await {
            Ok(Some(user)) => Some(user),
            Ok(None) => {
                self.notices.push("Please log in first.");
                None
            }
            Err(err) => {
                tracing::warn!(?err, "failed resolving current user");
                self.notices.push("Please log in first.");
                None
            }
        }
    }
}
