//! The provider contract and the two always-present providers.
//!
//! A provider is one candidate source for a field's value. It either produces
//! a value or reports absence (`Ok(None)`); errors are reserved for things
//! that should stop resolution outright (malformed content, failed casts,
//! transport failures).

use std::any::type_name;
use std::sync::Arc;

use crate::error::ConfigError;
use crate::field::Field;
use crate::value::{Value, render_plain};

/// Provider-kind identifiers, used for kind-filtered resolution and
/// [`ConfigSchema::keys`](crate::ConfigSchema::keys).
pub mod kinds {
    pub const CONSTANT: &str = "constant";
    pub const DEFAULT_FACTORY: &str = "default_factory";
    pub const ENV_VAR: &str = "env_var";
    pub const FILE: &str = "file";
    pub const PARAMETER_STORE: &str = "parameter_store";
    pub const SECRET_STORE: &str = "secret_store";
    pub const CLI_ARG: &str = "cli_arg";
}

pub trait Provider: Send + Sync {
    /// Kind identifier, shared by every provider of the same family.
    fn kind(&self) -> &'static str;

    /// Produce a value, or `Ok(None)` when this source has nothing to offer.
    fn provide(&self) -> Result<Option<Value>, ConfigError>;

    /// One fragment of auto-generated help text, e.g. `environment variable X`.
    fn description(&self) -> Option<String> {
        None
    }

    /// Fields whose resolved value this provider reads.
    fn dependencies(&self) -> Vec<Field> {
        Vec::new()
    }
}

/// Always provides the same value.
#[derive(Debug, Clone)]
pub struct ConstantProvider {
    value: Value,
}

impl ConstantProvider {
    pub fn new(value: impl Into<Value>) -> Self {
        Self {
            value: value.into(),
        }
    }
}

impl Provider for ConstantProvider {
    fn kind(&self) -> &'static str {
        kinds::CONSTANT
    }

    fn provide(&self) -> Result<Option<Value>, ConfigError> {
        Ok(Some(self.value.clone()))
    }

    fn description(&self) -> Option<String> {
        Some(format!("defaults to {}", render_plain(&self.value)))
    }
}

/// Calls a zero-argument function every time it is asked.
#[derive(Clone)]
pub struct DefaultFactoryProvider {
    name: &'static str,
    factory: Arc<dyn Fn() -> Value + Send + Sync>,
}

impl DefaultFactoryProvider {
    pub fn new<F, V>(factory: F) -> Self
    where
        F: Fn() -> V + Send + Sync + 'static,
        V: Into<Value>,
    {
        Self {
            name: type_name::<F>(),
            factory: Arc::new(move || factory().into()),
        }
    }
}

impl Provider for DefaultFactoryProvider {
    fn kind(&self) -> &'static str {
        kinds::DEFAULT_FACTORY
    }

    fn provide(&self) -> Result<Option<Value>, ConfigError> {
        Ok(Some((self.factory)()))
    }

    fn description(&self) -> Option<String> {
        Some(format!("defaults to result of function {}", self.name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn constant_provides_value() {
        let provider = ConstantProvider::new("foo");
        assert_eq!(provider.provide().unwrap(), Some(json!("foo")));
        assert_eq!(provider.kind(), kinds::CONSTANT);
    }

    #[test]
    fn constant_falsy_is_present() {
        assert_eq!(ConstantProvider::new(false).provide().unwrap(), Some(json!(false)));
        assert_eq!(ConstantProvider::new(0).provide().unwrap(), Some(json!(0)));
    }

    #[test]
    fn constant_description() {
        let provider = ConstantProvider::new("default value");
        assert_eq!(provider.description().unwrap(), "defaults to default value");
    }

    #[test]
    fn default_factory_calls_every_time() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let provider = DefaultFactoryProvider::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            json!([])
        });
        assert_eq!(provider.provide().unwrap(), Some(json!([])));
        assert_eq!(provider.provide().unwrap(), Some(json!([])));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn default_factory_description_names_function() {
        fn empty_list() -> Value {
            json!([])
        }
        let provider = DefaultFactoryProvider::new(empty_list);
        let desc = provider.description().unwrap();
        assert!(desc.starts_with("defaults to result of function"));
        assert!(desc.contains("empty_list"));
    }
}
