//! Remote secret-store provider.
//!
//! Fetches one secret per provider, optionally treats it as a JSON document
//! and extracts a top-level key, then applies the cast. A "not found" answer
//! from the store is absence; any other failure propagates.

use std::any::Any;
use std::sync::Arc;

use tracing::debug;

use crate::error::ConfigError;
use crate::field::Field;
use crate::plugin::Plugin;
use crate::provider::{Provider, kinds};
use crate::remote::{LazyClient, RemoteError};
use crate::value::{Cast, Parser, Value, cast_opt};

const SERVICE: &str = "secret store";

/// The consumed contract of a secret store client.
///
/// `Ok(None)` means the secret exists but carries no string payload.
/// A missing secret must be reported as [`RemoteError::NotFound`].
pub trait SecretFetcher: Send + Sync {
    fn get_secret_value(&self, secret_id: &str) -> Result<Option<String>, RemoteError>;
}

impl<F: SecretFetcher + ?Sized> SecretFetcher for Arc<F> {
    fn get_secret_value(&self, secret_id: &str) -> Result<Option<String>, RemoteError> {
        (**self).get_secret_value(secret_id)
    }
}

/// Enables `from_secret`.
pub struct SecretStorePlugin {
    client: LazyClient<dyn SecretFetcher>,
}

impl SecretStorePlugin {
    pub const KIND: &'static str = "secret_store";

    pub fn new(client: impl SecretFetcher + 'static) -> Self {
        let client: Arc<dyn SecretFetcher> = Arc::new(client);
        Self {
            client: LazyClient::ready(SERVICE, client),
        }
    }

    /// Build the client on first fetch instead of up front.
    pub fn lazy<F>(factory: F) -> Self
    where
        F: Fn() -> Result<Arc<dyn SecretFetcher>, RemoteError> + Send + Sync + 'static,
    {
        Self {
            client: LazyClient::deferred(SERVICE, factory),
        }
    }

    pub fn get_secret(&self, name: &str) -> Result<Option<String>, ConfigError> {
        let client = self.client.get()?;
        match client.get_secret_value(name) {
            Ok(secret) => Ok(secret),
            Err(RemoteError::NotFound(_)) => {
                debug!(secret = name, "could not find secret");
                Ok(None)
            }
            Err(e) => Err(self.client.fail(e)),
        }
    }
}

impl Plugin for SecretStorePlugin {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn provider_kind(&self) -> &'static str {
        kinds::SECRET_STORE
    }

    fn chain_methods(&self) -> &'static [&'static str] {
        &["from_secret"]
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

/// Which secret to read and how.
#[derive(Debug, Clone)]
pub struct SecretRef {
    name: String,
    key: Option<String>,
    cast: Option<Cast>,
    require_key: bool,
}

impl SecretRef {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            key: None,
            cast: None,
            require_key: false,
        }
    }

    /// Parse the secret as a JSON object and take this top-level key.
    pub fn key(mut self, key: &str) -> Self {
        self.key = Some(key.to_string());
        self
    }

    pub fn cast(mut self, cast: Cast) -> Self {
        self.cast = Some(cast);
        self
    }

    /// Fail with [`ConfigError::MissingSecretKey`] instead of resolving to
    /// absence when the key is missing. Off by default.
    pub fn require_key(mut self, require: bool) -> Self {
        self.require_key = require;
        self
    }
}

impl From<&str> for SecretRef {
    fn from(name: &str) -> Self {
        SecretRef::new(name)
    }
}

pub struct SecretProvider {
    plugin: Arc<SecretStorePlugin>,
    secret: SecretRef,
}

impl SecretProvider {
    pub fn new(plugin: Arc<SecretStorePlugin>, secret: SecretRef) -> Self {
        Self { plugin, secret }
    }

    fn extract(&self, raw: String) -> Result<Option<Value>, ConfigError> {
        let Some(key) = &self.secret.key else {
            return Ok(Some(Value::String(raw)));
        };
        let origin = format!("secret {}", self.secret.name);
        let doc = Parser::Json.parse(&origin, &raw)?;
        match doc.get(key) {
            Some(Value::Null) => {
                debug!(secret = %self.secret.name, key = %key, "secret key is null");
                Ok(None)
            }
            Some(value) => Ok(Some(value.clone())),
            None => {
                debug!(secret = %self.secret.name, key = %key, "secret did not have key");
                if self.secret.require_key {
                    return Err(ConfigError::MissingSecretKey {
                        key: key.clone(),
                        secret: self.secret.name.clone(),
                    });
                }
                Ok(None)
            }
        }
    }
}

impl Provider for SecretProvider {
    fn kind(&self) -> &'static str {
        kinds::SECRET_STORE
    }

    fn provide(&self) -> Result<Option<Value>, ConfigError> {
        let value = match self.plugin.get_secret(&self.secret.name)? {
            Some(raw) => self.extract(raw)?,
            None => None,
        };
        cast_opt(self.secret.cast.as_ref(), value)
    }

    fn description(&self) -> Option<String> {
        Some(match &self.secret.key {
            Some(key) => format!("secret store {} key {key}", self.secret.name),
            None => format!("secret store {}", self.secret.name),
        })
    }
}

impl Field {
    /// Fall back to a secret. Pass a name, or a [`SecretRef`] for key
    /// extraction, casting, or strict key handling.
    pub fn from_secret(self, secret: impl Into<SecretRef>) -> Self {
        let secret = secret.into();
        self.with_plugin::<SecretStorePlugin, _>(SecretStorePlugin::KIND, |plugin, _| {
            Arc::new(SecretProvider::new(plugin.clone(), secret))
        })
    }
}
