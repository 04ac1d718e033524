//! Remote parameter-store provider.
//!
//! Every `from_parameter` call registers one name with the plugin. Nothing is
//! fetched until the first provider asks for a value; at that point every
//! registered name is fetched in batches of at most [`MAX_BATCH`] and the
//! merged result becomes a permanent cache. Names the store doesn't return
//! resolve to absence.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::error::ConfigError;
use crate::field::Field;
use crate::plugin::Plugin;
use crate::provider::{Provider, kinds};
use crate::remote::{LazyClient, RemoteError};
use crate::value::{Cast, Value, cast_opt};

/// Most names the store accepts per request.
pub const MAX_BATCH: usize = 10;

const SERVICE: &str = "parameter store";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    pub name: String,
    pub value: String,
}

/// The consumed contract of a parameter store client.
///
/// `names` holds at most [`MAX_BATCH`] fully-qualified names. A name missing
/// from the response means "not found", not an error.
pub trait ParameterFetcher: Send + Sync {
    fn get_parameters(&self, names: &[String]) -> Result<Vec<Parameter>, RemoteError>;
}

impl<F: ParameterFetcher + ?Sized> ParameterFetcher for Arc<F> {
    fn get_parameters(&self, names: &[String]) -> Result<Vec<Parameter>, RemoteError> {
        (**self).get_parameters(names)
    }
}

/// Enables `from_parameter` and `from_parameter_as`.
pub struct ParameterStorePlugin {
    prefix: String,
    client: LazyClient<dyn ParameterFetcher>,
    names: Mutex<Vec<String>>,
    cache: Mutex<Option<HashMap<String, String>>>,
}

impl ParameterStorePlugin {
    pub const KIND: &'static str = "parameter_store";

    /// `prefix` is prepended to every registered name, e.g. `"/myapp/prod/"`.
    pub fn new(prefix: &str, client: impl ParameterFetcher + 'static) -> Self {
        let client: Arc<dyn ParameterFetcher> = Arc::new(client);
        Self::with_client(prefix, LazyClient::ready(SERVICE, client))
    }

    /// Build the client on first fetch instead of up front.
    pub fn lazy<F>(prefix: &str, factory: F) -> Self
    where
        F: Fn() -> Result<Arc<dyn ParameterFetcher>, RemoteError> + Send + Sync + 'static,
    {
        Self::with_client(prefix, LazyClient::deferred(SERVICE, factory))
    }

    fn with_client(prefix: &str, client: LazyClient<dyn ParameterFetcher>) -> Self {
        Self {
            prefix: prefix.to_string(),
            client,
            names: Mutex::new(Vec::new()),
            cache: Mutex::new(None),
        }
    }

    pub fn fullname(&self, name: &str) -> String {
        format!("{}{name}", self.prefix)
    }

    /// Register interest in `name`. Duplicates are ignored.
    pub fn add_name(&self, name: &str) {
        let mut names = self.names.lock();
        if !names.iter().any(|n| n == name) {
            names.push(name.to_string());
        }
    }

    /// Look `name` up, fetching every registered name on first use.
    pub fn value_for_name(&self, name: &str) -> Result<Option<String>, ConfigError> {
        let mut cache = self.cache.lock();
        if cache.is_none() {
            *cache = Some(self.fetch()?);
        }
        Ok(cache
            .as_ref()
            .and_then(|c| c.get(&self.fullname(name)).cloned()))
    }

    fn fetch(&self) -> Result<HashMap<String, String>, ConfigError> {
        let client = self.client.get()?;
        let fullnames: Vec<String> = self.names.lock().iter().map(|n| self.fullname(n)).collect();

        let mut merged = HashMap::new();
        for batch in fullnames.chunks(MAX_BATCH) {
            debug!(count = batch.len(), "fetching parameters");
            let params = client
                .get_parameters(batch)
                .map_err(|e| self.client.fail(e))?;
            merged.extend(params.into_iter().map(|p| (p.name, p.value)));
        }
        debug!(requested = fullnames.len(), found = merged.len(), "fetched parameters");
        Ok(merged)
    }
}

impl Plugin for ParameterStorePlugin {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn provider_kind(&self) -> &'static str {
        kinds::PARAMETER_STORE
    }

    fn chain_methods(&self) -> &'static [&'static str] {
        &["from_parameter", "from_parameter_as"]
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

pub struct ParameterProvider {
    plugin: Arc<ParameterStorePlugin>,
    name: String,
    cast: Option<Cast>,
}

impl ParameterProvider {
    /// Registers `name` with the plugin.
    pub fn new(plugin: Arc<ParameterStorePlugin>, name: &str, cast: Option<Cast>) -> Self {
        plugin.add_name(name);
        Self {
            plugin,
            name: name.to_string(),
            cast,
        }
    }
}

impl Provider for ParameterProvider {
    fn kind(&self) -> &'static str {
        kinds::PARAMETER_STORE
    }

    fn provide(&self) -> Result<Option<Value>, ConfigError> {
        debug!(parameter = %self.plugin.fullname(&self.name), "looking up parameter");
        let value = self.plugin.value_for_name(&self.name)?.map(Value::String);
        cast_opt(self.cast.as_ref(), value)
    }

    fn description(&self) -> Option<String> {
        Some(format!("parameter store {}", self.plugin.fullname(&self.name)))
    }
}

impl Field {
    /// Fall back to parameter `name` (the plugin's prefix is prepended).
    pub fn from_parameter(self, name: &str) -> Self {
        self.parameter(name, None)
    }

    pub fn from_parameter_as(self, name: &str, cast: Cast) -> Self {
        self.parameter(name, Some(cast))
    }

    fn parameter(self, name: &str, cast: Option<Cast>) -> Self {
        self.with_plugin::<ParameterStorePlugin, _>(ParameterStorePlugin::KIND, |plugin, _| {
            Arc::new(ParameterProvider::new(plugin.clone(), name, cast))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::test::{FakeParameters, plugin_field};
    use serde_json::json;

    fn params(pairs: &[(&str, &str)]) -> FakeParameters {
        FakeParameters::new(pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())))
    }

    #[test]
    fn fetches_all_names_in_one_request() {
        let client = Arc::new(params(&[("/prefix/foo", "foovalue"), ("/prefix/bar", "barvalue")]));
        let plugin = ParameterStorePlugin::new("/prefix/", client.clone());
        plugin.add_name("foo");
        plugin.add_name("bar");

        assert_eq!(plugin.value_for_name("foo").unwrap().as_deref(), Some("foovalue"));
        assert_eq!(plugin.value_for_name("bar").unwrap().as_deref(), Some("barvalue"));
        assert_eq!(client.recorded(), vec![vec!["/prefix/foo".to_string(), "/prefix/bar".to_string()]]);
    }

    #[test]
    fn provider_cases() {
        let cases: Vec<(&str, &str, Vec<(&str, &str)>, Option<Cast>, Option<Value>)> = vec![
            ("/prefix/", "foo", vec![("/prefix/foo", "foovalue")], None, Some(json!("foovalue"))),
            ("", "/prefix/foo", vec![("/prefix/foo", "foovalue")], None, Some(json!("foovalue"))),
            ("/prefix/", "bar", vec![("/prefix/foo", "foovalue")], None, None),
            ("", "foo", vec![("/prefix/foo", "foovalue")], None, None),
            ("/prefix/", "foo", vec![("/prefix/foo", "")], Some(Cast::Bool), Some(json!(false))),
            ("/prefix/", "foo", vec![("/prefix/foo", "1")], Some(Cast::Bool), Some(json!(true))),
            ("/prefix/", "foo", vec![("/prefix/foo", "true")], Some(Cast::Bool), Some(json!(true))),
            ("/prefix/", "foo", vec![], Some(Cast::Bool), None),
        ];
        for (prefix, name, pairs, cast, expected) in cases {
            let plugin = Arc::new(ParameterStorePlugin::new(prefix, params(&pairs)));
            let provider = ParameterProvider::new(plugin, name, cast);
            assert_eq!(provider.provide().unwrap(), expected, "{prefix}{name}");
        }
    }

    #[test]
    fn eleven_names_take_two_requests() {
        let names: Vec<String> = ('a'..='k').map(|c| c.to_string()).collect();
        let pairs: Vec<(String, String)> = names.iter().map(|n| (format!("/prefix/{n}"), n.clone())).collect();
        let client = Arc::new(FakeParameters::new(pairs));
        let plugin = ParameterStorePlugin::new("/prefix/", client.clone());
        for n in &names {
            plugin.add_name(n);
        }
        for n in &names {
            assert_eq!(plugin.value_for_name(n).unwrap().as_deref(), Some(n.as_str()));
        }

        let recorded = client.recorded();
        assert_eq!(recorded.len(), 2);
        assert_eq!(recorded[0].len(), 10);
        assert_eq!(recorded[1].len(), 1);
    }

    #[test]
    fn duplicate_names_fetched_once() {
        let client = Arc::new(params(&[("foo", "1")]));
        let plugin = ParameterStorePlugin::new("", client.clone());
        plugin.add_name("foo");
        plugin.add_name("foo");
        plugin.value_for_name("foo").unwrap();
        assert_eq!(client.recorded(), vec![vec!["foo".to_string()]]);
    }

    #[test]
    fn shared_across_fields() {
        let client = Arc::new(params(&[("/app/a", "1"), ("/app/b", "2")]));
        let plugin = Arc::new(ParameterStorePlugin::new("/app/", client.clone()));
        let a = plugin_field(plugin.clone()).from_parameter("a");
        let b = plugin_field(plugin).from_parameter_as("b", Cast::Integer);

        assert_eq!(a.resolve().unwrap(), Some(json!("1")));
        assert_eq!(b.resolve().unwrap(), Some(json!(2)));
        assert_eq!(client.recorded().len(), 1);
    }

    #[test]
    fn transport_failure_propagates_and_retries() {
        let client = Arc::new(params(&[("x", "1")]));
        client.fail_next();
        let plugin = ParameterStorePlugin::new("", client.clone());
        plugin.add_name("x");

        let err = plugin.value_for_name("x").unwrap_err();
        assert!(matches!(err, ConfigError::Remote { service: "parameter store", .. }));
        assert_eq!(plugin.value_for_name("x").unwrap().as_deref(), Some("1"));
    }

    #[test]
    fn lazy_client_not_built_until_fetch() {
        let plugin = ParameterStorePlugin::lazy("", || Err(RemoteError::other("no region")));
        plugin.add_name("x");
        assert!(plugin.value_for_name("x").is_err());
    }

    #[test]
    fn description_uses_full_name() {
        let plugin = Arc::new(ParameterStorePlugin::new("/prefix/", params(&[])));
        let provider = ParameterProvider::new(plugin, "value", None);
        assert_eq!(provider.description().unwrap(), "parameter store /prefix/value");
    }
}
