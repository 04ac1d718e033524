use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use tracing::trace;

use crate::error::ConfigError;
use crate::field::Field;
use crate::plugin::Plugin;
use crate::provider::{Provider, kinds};
use crate::value::{Cast, Value, cast_opt};

/// Enables `from_env_var` and `from_env_var_as`.
///
/// By default each provider snapshots the process environment when it is
/// built; later changes to the real environment are not observed.
/// [`with_vars`](EnvVarPlugin::with_vars) pins a synthetic environment instead,
/// so tests don't have to mutate process state.
#[derive(Debug, Default)]
pub struct EnvVarPlugin {
    vars: Option<Arc<HashMap<String, String>>>,
}

impl EnvVarPlugin {
    pub const KIND: &'static str = "env_var";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_vars(vars: impl IntoIterator<Item = (String, String)>) -> Self {
        Self {
            vars: Some(Arc::new(vars.into_iter().collect())),
        }
    }

    fn provider(&self, name: &str, cast: Option<Cast>) -> EnvVarProvider {
        match &self.vars {
            Some(vars) => EnvVarProvider::from_vars(name, cast, vars),
            None => EnvVarProvider::new(name, cast),
        }
    }
}

impl Plugin for EnvVarPlugin {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn provider_kind(&self) -> &'static str {
        kinds::ENV_VAR
    }

    fn chain_methods(&self) -> &'static [&'static str] {
        &["from_env_var", "from_env_var_as"]
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

/// Reads one variable from an environment snapshot taken at construction.
#[derive(Debug, Clone)]
pub struct EnvVarProvider {
    name: String,
    value: Option<String>,
    cast: Option<Cast>,
}

impl EnvVarProvider {
    /// Snapshot `name` from the process environment. Non-UTF-8 values are
    /// converted lossily.
    pub fn new(name: &str, cast: Option<Cast>) -> Self {
        let value = std::env::var_os(name).map(|v| v.to_string_lossy().into_owned());
        Self {
            name: name.to_string(),
            value,
            cast,
        }
    }

    pub fn from_vars(name: &str, cast: Option<Cast>, vars: &HashMap<String, String>) -> Self {
        Self {
            name: name.to_string(),
            value: vars.get(name).cloned(),
            cast,
        }
    }
}

impl Provider for EnvVarProvider {
    fn kind(&self) -> &'static str {
        kinds::ENV_VAR
    }

    fn provide(&self) -> Result<Option<Value>, ConfigError> {
        trace!(var = %self.name, set = self.value.is_some(), "reading environment variable");
        cast_opt(self.cast.as_ref(), self.value.clone().map(Value::String))
    }

    fn description(&self) -> Option<String> {
        Some(format!("environment variable {}", self.name))
    }
}

impl Field {
    /// Fall back to environment variable `name`, as a string.
    pub fn from_env_var(self, name: &str) -> Self {
        self.env_var(name, None)
    }

    /// Fall back to environment variable `name`, coerced with `cast`.
    pub fn from_env_var_as(self, name: &str, cast: Cast) -> Self {
        self.env_var(name, Some(cast))
    }

    fn env_var(self, name: &str, cast: Option<Cast>) -> Self {
        self.with_plugin::<EnvVarPlugin, _>(EnvVarPlugin::KIND, |plugin, _| {
            Arc::new(plugin.provider(name, cast))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn vars() -> HashMap<String, String> {
        HashMap::from([
            ("empty".to_string(), String::new()),
            ("foo".to_string(), "bar".to_string()),
        ])
    }

    fn provide(name: &str, cast: Option<Cast>) -> Option<Value> {
        EnvVarProvider::from_vars(name, cast, &vars()).provide().unwrap()
    }

    #[test]
    fn plain_lookup() {
        assert_eq!(provide("foo", None), Some(json!("bar")));
        assert_eq!(provide("empty", None), Some(json!("")));
        assert_eq!(provide("missing", None), None);
    }

    #[test]
    fn bool_cast() {
        assert_eq!(provide("foo", Some(Cast::Bool)), Some(json!(true)));
        assert_eq!(provide("empty", Some(Cast::Bool)), Some(json!(false)));
        assert_eq!(provide("missing", Some(Cast::Bool)), None);
    }

    #[test]
    fn failed_cast_is_an_error() {
        let provider = EnvVarProvider::from_vars("foo", Some(Cast::Integer), &vars());
        assert!(matches!(provider.provide(), Err(ConfigError::Cast { .. })));
    }

    #[test]
    fn description_names_variable() {
        let provider = EnvVarProvider::from_vars("VALUE", None, &vars());
        assert_eq!(provider.description().unwrap(), "environment variable VALUE");
    }

    #[test]
    fn process_snapshot_misses_unset_variable() {
        let provider = EnvVarProvider::new("CFGCHAIN_TEST_SURELY_UNSET_VARIABLE", None);
        assert_eq!(provider.provide().unwrap(), None);
    }

    #[test]
    fn plugin_uses_pinned_vars() {
        let plugin = EnvVarPlugin::with_vars(vars());
        assert_eq!(plugin.provider("foo", None).provide().unwrap(), Some(json!("bar")));
    }

    #[test]
    fn empty_string_with_bool_cast_beats_later_constant() {
        let env = crate::Environment::empty()
            .with_plugin(EnvVarPlugin::with_vars([("X".to_string(), String::new())]))
            .with_plugin(crate::plugin::ConstantPlugin);
        let field = env.field().from_env_var_as("X", Cast::Bool).from_constant(true);
        assert_eq!(field.resolve().unwrap(), Some(json!(false)));
    }

    #[test]
    fn unset_without_fallback_is_absent() {
        let env = crate::Environment::empty().with_plugin(EnvVarPlugin::with_vars(vec![]));
        let field = env.field().from_env_var_as("FOO", Cast::Bool);
        assert_eq!(field.resolve().unwrap(), None);
    }
}
