//! The plugin registry that fields are created from.

use std::sync::Arc;

use crate::env::EnvVarPlugin;
use crate::field::Field;
use crate::file::FilePlugin;
use crate::plugin::{ConstantPlugin, DefaultFactoryPlugin, Plugin, PluginSet};

/// A set of enabled plugins, at most one per plugin kind.
///
/// [`field`](Environment::field) snapshots the current set: plugins added or
/// replaced later do not reach fields that already exist.
///
/// [`Environment::default()`] enables the constant, default-factory,
/// environment-variable, file and (with the `clap` feature) command-line
/// plugins, the last with auto-help on. Remote-store plugins need a client
/// and are always added explicitly:
///
/// ```ignore
/// let mut env = Environment::default();
/// env.add_plugin(ParameterStorePlugin::new("/myapp/prod/", client));
/// let db_url = env.field().from_parameter("db_url").from_constant("sqlite::memory:");
/// ```
#[derive(Clone)]
pub struct Environment {
    plugins: PluginSet,
}

impl Default for Environment {
    fn default() -> Self {
        let env = Self::empty()
            .with_plugin(EnvVarPlugin::new())
            .with_plugin(ConstantPlugin)
            .with_plugin(FilePlugin::new())
            .with_plugin(DefaultFactoryPlugin);
        #[cfg(feature = "clap")]
        let env = env.with_plugin(crate::cli::CommandLinePlugin::new().with_auto_help(true));
        env
    }
}

impl Environment {
    /// An environment with no plugins enabled.
    pub fn empty() -> Self {
        Self {
            plugins: PluginSet::default(),
        }
    }

    /// Builder form of [`add_plugin`](Self::add_plugin).
    pub fn with_plugin(mut self, plugin: impl Plugin) -> Self {
        self.add_plugin(plugin);
        self
    }

    /// Enable `plugin`, replacing any plugin of the same kind.
    pub fn add_plugin(&mut self, plugin: impl Plugin) {
        self.add_shared_plugin(Arc::new(plugin));
    }

    /// Enable a plugin instance that is also held elsewhere.
    pub fn add_shared_plugin(&mut self, plugin: Arc<dyn Plugin>) {
        if let Some(previous) = self.plugins.insert(plugin) {
            tracing::debug!(kind = previous.kind(), "replaced plugin");
        }
    }

    /// The enabled plugin of type `P`.
    pub fn get_plugin<P: Plugin>(&self) -> Option<Arc<P>> {
        self.plugins.get::<P>()
    }

    pub fn plugins(&self) -> &PluginSet {
        &self.plugins
    }

    /// A new, non-sensitive field with this environment's chain methods.
    pub fn field(&self) -> Field {
        Field::with_plugins(self.plugins.clone(), false)
    }

    /// A new field whose value is redacted in logs and rendered config.
    pub fn sensitive_field(&self) -> Field {
        Field::with_plugins(self.plugins.clone(), true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConfigError;
    use crate::fixtures::test::FakeParameters;
    use crate::parameter::ParameterStorePlugin;
    use serde_json::json;

    #[test]
    fn default_enables_local_sources() {
        let field = Environment::default().field();
        for method in [
            "from_constant",
            "from_default_factory",
            "from_env_var",
            "from_env_var_as",
            "from_file",
            "from_json_file",
            "from_toml_file",
        ] {
            assert!(field.supports(method), "{method}");
        }
        assert!(!field.supports("from_parameter"));
        assert!(!field.supports("from_secret"));
    }

    #[cfg(feature = "clap")]
    #[test]
    fn default_enables_cli_with_auto_help() {
        let env = Environment::default();
        assert!(env.field().supports("from_cli"));
        let cli = env.get_plugin::<crate::cli::CommandLinePlugin>().unwrap();
        assert!(cli.auto_help());
    }

    #[test]
    fn add_plugin_enables_methods_for_new_fields_only() {
        let mut env = Environment::default();
        let before = env.field();
        env.add_plugin(ParameterStorePlugin::new("/p/", FakeParameters::new(vec![])));
        let after = env.field();

        assert!(!before.supports("from_parameter"));
        assert!(after.supports("from_parameter"));
        assert!(env.get_plugin::<ParameterStorePlugin>().is_some());
    }

    #[test]
    fn same_kind_replaces_previous_plugin() {
        let mut env = Environment::empty();
        env.add_plugin(ParameterStorePlugin::new("/old/", FakeParameters::new(vec![])));
        env.add_plugin(ParameterStorePlugin::new("/new/", FakeParameters::new(vec![])));
        assert_eq!(env.plugins().len(), 1);
        assert_eq!(env.get_plugin::<ParameterStorePlugin>().unwrap().fullname("x"), "/new/x");
    }

    #[test]
    fn existing_fields_keep_their_snapshot() {
        let mut env = Environment::empty();
        env.add_plugin(ParameterStorePlugin::new(
            "/old/",
            FakeParameters::new(vec![("/old/x".to_string(), "old".to_string())]),
        ));
        let field = env.field();
        env.add_plugin(ParameterStorePlugin::new("/new/", FakeParameters::new(vec![])));

        let field = field.from_parameter("x");
        assert_eq!(field.resolve().unwrap(), Some(json!("old")));
    }

    #[test]
    fn empty_environment_rejects_chain_methods() {
        let field = Environment::empty().field().from_env_var("X");
        assert!(matches!(field.chain_error().as_deref(), Some(ConfigError::PluginNotEnabled { kind: "env_var" })));
    }

    #[test]
    fn sensitive_field_is_flagged() {
        let env = Environment::default();
        assert!(env.sensitive_field().is_sensitive());
        assert!(!env.field().is_sensitive());
    }
}
