//! Fields: named configuration slots with an ordered fallback chain.
//!
//! A [`Field`] is a cheap, clonable handle. Clones share the same chain and
//! resolve cache, which is what lets a provider in one field read another
//! field's resolved value (see `from_file_field`).
//!
//! # Resolution
//!
//! [`resolve`](Field::resolve) walks the chain in declared order and returns
//! the first present value. The outcome, including absence, is cached: later
//! calls return it without invoking any provider.
//!
//! [`resolve_only`](Field::resolve_only) restricts the walk to providers of
//! the given kinds. It neither reads nor populates the cache, so a config can
//! be reloaded from one source without disturbing the permanent result.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::error::ConfigError;
use crate::plugin::{Plugin, PluginSet};
use crate::provider::Provider;
use crate::value::Value;

pub(crate) const REDACTED: &str = "*****";

#[derive(Default)]
struct ResolveState {
    resolved: bool,
    value: Option<Value>,
    in_progress: bool,
}

pub(crate) struct FieldInner {
    name: Mutex<Option<String>>,
    sensitive: bool,
    plugins: PluginSet,
    providers: Mutex<Vec<Arc<dyn Provider>>>,
    state: Mutex<ResolveState>,
    chain_error: Mutex<Option<Arc<ConfigError>>>,
}

#[derive(Clone)]
pub struct Field {
    inner: Arc<FieldInner>,
}

impl Default for Field {
    /// A non-sensitive field with no plugins; only [`from_provider`](Field::from_provider) works on it.
    fn default() -> Self {
        Self::with_plugins(PluginSet::default(), false)
    }
}

impl Field {
    pub(crate) fn with_plugins(plugins: PluginSet, sensitive: bool) -> Self {
        Self {
            inner: Arc::new(FieldInner {
                name: Mutex::new(None),
                sensitive,
                plugins,
                providers: Mutex::new(Vec::new()),
                state: Mutex::new(ResolveState::default()),
                chain_error: Mutex::new(None),
            }),
        }
    }

    /// The name assigned at registration, if any.
    pub fn name(&self) -> Option<String> {
        self.inner.name.lock().clone()
    }

    pub(crate) fn display_name(&self) -> String {
        self.name().unwrap_or_else(|| "<unnamed>".to_string())
    }

    pub(crate) fn set_name(&self, name: &str) {
        *self.inner.name.lock() = Some(name.to_string());
    }

    pub fn is_sensitive(&self) -> bool {
        self.inner.sensitive
    }

    /// Whether a chain method such as `"from_env_var"` is enabled for this field.
    pub fn supports(&self, method: &str) -> bool {
        self.inner.plugins.supports(method)
    }

    /// Snapshot of the chain, highest priority first.
    pub fn providers(&self) -> Vec<Arc<dyn Provider>> {
        self.inner.providers.lock().clone()
    }

    pub fn provider_kinds(&self) -> Vec<&'static str> {
        self.inner.providers.lock().iter().map(|p| p.kind()).collect()
    }

    /// True if any provider in the chain is of one of `kinds`.
    pub fn has_provider(&self, kinds: &[&str]) -> bool {
        self.inner
            .providers
            .lock()
            .iter()
            .any(|p| kinds.contains(&p.kind()))
    }

    pub fn is_resolved(&self) -> bool {
        self.inner.state.lock().resolved
    }

    /// Both handles point at the same field.
    pub fn same(&self, other: &Field) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Append any provider to the end of the chain.
    pub fn from_provider(self, provider: impl Provider + 'static) -> Self {
        self.push(Arc::new(provider));
        self
    }

    pub(crate) fn push(&self, provider: Arc<dyn Provider>) {
        self.inner.providers.lock().push(provider);
    }

    /// Run `build` against plugin `P` and append the provider it returns, or
    /// record [`ConfigError::PluginNotEnabled`] when `P` is not in this field's
    /// plugin snapshot.
    pub(crate) fn with_plugin<P, F>(self, kind: &'static str, build: F) -> Self
    where
        P: Plugin,
        F: FnOnce(&Arc<P>, &Field) -> Arc<dyn Provider>,
    {
        match self.inner.plugins.get::<P>() {
            Some(plugin) => {
                let provider = build(&plugin, &self);
                self.push(provider);
            }
            None => self.fail(ConfigError::PluginNotEnabled { kind }),
        }
        self
    }

    /// Keep the first chain-building error; registration reports it.
    pub(crate) fn fail(&self, err: ConfigError) {
        let mut slot = self.inner.chain_error.lock();
        if slot.is_none() {
            *slot = Some(Arc::new(err));
        }
    }

    /// The first chain-building error. It stays recorded, so every
    /// registration of this field fails.
    pub(crate) fn chain_error(&self) -> Option<Arc<ConfigError>> {
        self.inner.chain_error.lock().clone()
    }

    pub(crate) fn downgrade(&self) -> Weak<FieldInner> {
        Arc::downgrade(&self.inner)
    }

    pub(crate) fn upgrade(weak: &Weak<FieldInner>) -> Option<Field> {
        weak.upgrade().map(|inner| Field { inner })
    }

    /// Fields read by providers in this chain.
    pub fn dependencies(&self) -> Vec<Field> {
        self.providers()
            .iter()
            .flat_map(|p| p.dependencies())
            .collect()
    }

    /// Resolve through the full chain, using and filling the cache.
    pub fn resolve(&self) -> Result<Option<Value>, ConfigError> {
        self.resolve_filtered(None)
    }

    /// Resolve through providers whose kind is in `kinds` only, bypassing the cache.
    pub fn resolve_only(&self, kinds: &[&str]) -> Result<Option<Value>, ConfigError> {
        self.resolve_filtered(Some(kinds))
    }

    pub fn resolve_filtered(&self, filter: Option<&[&str]>) -> Result<Option<Value>, ConfigError> {
        {
            let mut state = self.inner.state.lock();
            if filter.is_none() && state.resolved {
                trace!(field = %self.display_name(), "cache hit");
                return Ok(state.value.clone());
            }
            if state.in_progress {
                return Err(ConfigError::CyclicReference(self.display_name()));
            }
            state.in_progress = true;
        }

        let result = self.scan(filter);

        let mut state = self.inner.state.lock();
        state.in_progress = false;
        let value = result?;
        if filter.is_none() {
            state.resolved = true;
            state.value = value.clone();
        }
        Ok(value)
    }

    fn scan(&self, filter: Option<&[&str]>) -> Result<Option<Value>, ConfigError> {
        // Providers may resolve other fields, so the chain lock is not held while they run.
        let providers = self.providers();
        for provider in providers {
            if let Some(kinds) = filter
                && !kinds.contains(&provider.kind())
            {
                continue;
            }
            if let Some(value) = provider.provide()? {
                debug!(
                    field = %self.display_name(),
                    provider = provider.kind(),
                    value = %self.loggable(&value),
                    "Providing"
                );
                return Ok(Some(value));
            }
            trace!(field = %self.display_name(), provider = provider.kind(), "absent, falling through");
        }
        debug!(field = %self.display_name(), "no provider produced a value");
        Ok(None)
    }

    fn loggable(&self, value: &Value) -> String {
        if self.is_sensitive() {
            REDACTED.to_string()
        } else {
            value.to_string()
        }
    }
}

impl std::fmt::Debug for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Field")
            .field("name", &self.name())
            .field("sensitive", &self.is_sensitive())
            .field("providers", &self.provider_kinds())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::test::{CountingProvider, Fixed, chain};
    use serde_json::json;
    use tracing_test::traced_test;

    fn resolve_seq(values: Vec<Option<Value>>) -> Option<Value> {
        chain(values).resolve().unwrap()
    }

    #[test]
    fn first_present_wins() {
        assert_eq!(resolve_seq(vec![Some(json!(1)), Some(json!(2)), Some(json!(3))]), Some(json!(1)));
        assert_eq!(resolve_seq(vec![None, None, Some(json!(3))]), Some(json!(3)));
        assert_eq!(resolve_seq(vec![Some(json!("foo")), Some(json!("bar"))]), Some(json!("foo")));
        assert_eq!(resolve_seq(vec![None, Some(json!("bar")), Some(json!("baz"))]), Some(json!("bar")));
    }

    #[test]
    fn falsy_values_are_present() {
        assert_eq!(resolve_seq(vec![None, Some(json!(0)), Some(json!(3))]), Some(json!(0)));
        assert_eq!(resolve_seq(vec![Some(json!(0)), None, Some(json!(3))]), Some(json!(0)));
        assert_eq!(resolve_seq(vec![Some(json!(false)), Some(json!(true))]), Some(json!(false)));
        assert_eq!(resolve_seq(vec![None, Some(json!(false)), Some(json!(true))]), Some(json!(false)));
        assert_eq!(resolve_seq(vec![Some(json!("")), Some(json!("bar"))]), Some(json!("")));
    }

    #[test]
    fn all_absent_is_absent() {
        assert_eq!(resolve_seq(vec![None, None]), None);
        assert_eq!(resolve_seq(vec![]), None);
    }

    #[test]
    fn resolve_caches_value() {
        let counter = CountingProvider::new("test", Some(json!("x")));
        let calls = counter.calls();
        let field = Field::default().from_provider(counter);
        assert_eq!(field.resolve().unwrap(), Some(json!("x")));
        assert_eq!(field.resolve().unwrap(), Some(json!("x")));
        assert_eq!(calls.get(), 1);
        assert!(field.is_resolved());
    }

    #[test]
    fn resolve_caches_absence() {
        let counter = CountingProvider::new("test", None);
        let calls = counter.calls();
        let field = Field::default().from_provider(counter);
        assert_eq!(field.resolve().unwrap(), None);
        assert_eq!(field.resolve().unwrap(), None);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn filtered_resolve_skips_other_kinds() {
        let field = Field::default()
            .from_provider(Fixed::new("a", Some(json!("from a"))))
            .from_provider(Fixed::new("b", Some(json!("from b"))));
        assert_eq!(field.resolve_only(&["b"]).unwrap(), Some(json!("from b")));
        assert_eq!(field.resolve_only(&["c"]).unwrap(), None);
    }

    #[test]
    fn filtered_resolve_takes_first_present_not_first_attempted() {
        let field = Field::default()
            .from_provider(Fixed::new("b", None))
            .from_provider(Fixed::new("b", Some(json!(2))));
        assert_eq!(field.resolve_only(&["b"]).unwrap(), Some(json!(2)));
    }

    #[test]
    fn filtered_resolve_does_not_touch_cache() {
        let counter = CountingProvider::new("a", Some(json!(1)));
        let calls = counter.calls();
        let field = Field::default().from_provider(counter);

        assert_eq!(field.resolve_only(&["a"]).unwrap(), Some(json!(1)));
        assert!(!field.is_resolved());
        assert_eq!(field.resolve_only(&["a"]).unwrap(), Some(json!(1)));
        assert_eq!(calls.get(), 2);

        assert_eq!(field.resolve().unwrap(), Some(json!(1)));
        assert_eq!(calls.get(), 3);
        assert_eq!(field.resolve_only(&["a"]).unwrap(), Some(json!(1)));
        assert_eq!(calls.get(), 4);
    }

    #[test]
    fn provider_error_propagates_and_is_not_cached() {
        let field = Field::default().from_provider(Fixed::failing("bad"));
        assert!(field.resolve().is_err());
        assert!(!field.is_resolved());
    }

    #[test]
    fn self_reference_is_cyclic() {
        let field = Field::default();
        field.set_name("loop");
        let field = field.clone().from_provider(crate::fixtures::test::ReadField(field.clone()));
        let err = field.resolve().unwrap_err();
        assert!(matches!(err, ConfigError::CyclicReference(name) if name == "loop"));
    }

    #[test]
    fn clones_share_state() {
        let field = Field::default().from_provider(Fixed::new("a", Some(json!(1))));
        let other = field.clone();
        field.resolve().unwrap();
        assert!(other.is_resolved());
        assert!(field.same(&other));
        assert!(!field.same(&Field::default()));
    }

    #[test]
    fn has_provider_by_kind() {
        let field = Field::default().from_provider(Fixed::new("a", None));
        assert!(field.has_provider(&["a", "z"]));
        assert!(!field.has_provider(&["z"]));
    }

    #[test]
    #[traced_test]
    fn sensitive_value_never_logged() {
        let field = Field::with_plugins(PluginSet::default(), true)
            .from_provider(Fixed::new("a", Some(json!("hunter2"))));
        field.resolve().unwrap();
        assert!(!logs_contain("hunter2"));
        assert!(logs_contain("*****"));
    }
}
