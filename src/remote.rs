//! Shared plumbing for the remote-store plugins: the error type clients
//! report and a lazily-initialized client slot.
//!
//! The crate ships no SDK bindings. Applications implement
//! [`ParameterFetcher`](crate::ParameterFetcher) or
//! [`SecretFetcher`](crate::SecretFetcher) over whatever client they use and
//! hand it (or a factory for it) to the plugin.

use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;

use crate::error::ConfigError;

/// What a remote client reports back. Only `NotFound` is ever recovered from.
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("resource not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl RemoteError {
    pub fn other(msg: impl Into<String>) -> Self {
        let msg: String = msg.into();
        RemoteError::Other(msg.into())
    }
}

type Factory<C> = Box<dyn Fn() -> Result<Arc<C>, RemoteError> + Send + Sync>;

/// A client that is either supplied up front or built on first use.
pub(crate) struct LazyClient<C: ?Sized> {
    service: &'static str,
    client: Mutex<Option<Arc<C>>>,
    factory: Option<Factory<C>>,
}

impl<C: ?Sized> LazyClient<C> {
    pub(crate) fn ready(service: &'static str, client: Arc<C>) -> Self {
        Self {
            service,
            client: Mutex::new(Some(client)),
            factory: None,
        }
    }

    pub(crate) fn deferred<F>(service: &'static str, factory: F) -> Self
    where
        F: Fn() -> Result<Arc<C>, RemoteError> + Send + Sync + 'static,
    {
        Self {
            service,
            client: Mutex::new(None),
            factory: Some(Box::new(factory)),
        }
    }

    pub(crate) fn get(&self) -> Result<Arc<C>, ConfigError> {
        let mut slot = self.client.lock();
        if let Some(client) = slot.as_ref() {
            return Ok(client.clone());
        }
        let factory = self.factory.as_ref().ok_or_else(|| self.fail(RemoteError::other("no client configured")))?;
        tracing::debug!(service = self.service, "creating client");
        let client = factory().map_err(|e| self.fail(e))?;
        *slot = Some(client.clone());
        Ok(client)
    }

    pub(crate) fn fail(&self, source: RemoteError) -> ConfigError {
        ConfigError::Remote {
            service: self.service,
            source,
        }
    }
}
