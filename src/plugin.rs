//! Plugins: provider factories that enable chain methods on fields.
//!
//! A plugin is not bound to any field. It owns whatever state its providers
//! share (a file cache, a remote client, a parser binding) and, once enabled
//! in an [`Environment`](crate::Environment), makes its chain methods usable
//! on every field created from that environment afterwards.

use std::any::Any;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::field::Field;
use crate::provider::{ConstantProvider, DefaultFactoryProvider, kinds};
use crate::value::Value;

pub trait Plugin: Send + Sync + 'static {
    /// Plugin-kind identifier. An environment holds at most one plugin per kind.
    fn kind(&self) -> &'static str;

    /// Kind of the providers this plugin creates.
    fn provider_kind(&self) -> &'static str;

    /// Names of the chain methods this plugin enables on a field.
    fn chain_methods(&self) -> &'static [&'static str];

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

/// An immutable snapshot of enabled plugins, keyed by plugin kind.
#[derive(Clone, Default)]
pub struct PluginSet {
    plugins: BTreeMap<&'static str, Arc<dyn Plugin>>,
}

impl PluginSet {
    pub(crate) fn insert(&mut self, plugin: Arc<dyn Plugin>) -> Option<Arc<dyn Plugin>> {
        self.plugins.insert(plugin.kind(), plugin)
    }

    /// Typed lookup of the plugin of type `P`.
    pub fn get<P: Plugin>(&self) -> Option<Arc<P>> {
        self.plugins
            .values()
            .find_map(|p| p.clone().into_any().downcast::<P>().ok())
    }

    pub fn get_kind(&self, kind: &str) -> Option<&Arc<dyn Plugin>> {
        self.plugins.get(kind)
    }

    pub fn kinds(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.plugins.keys().copied()
    }

    pub fn supports(&self, method: &str) -> bool {
        self.plugins
            .values()
            .any(|p| p.chain_methods().contains(&method))
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}

/// Enables `from_constant`.
#[derive(Debug, Default)]
pub struct ConstantPlugin;

impl ConstantPlugin {
    pub const KIND: &'static str = "constant";
}

impl Plugin for ConstantPlugin {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn provider_kind(&self) -> &'static str {
        kinds::CONSTANT
    }

    fn chain_methods(&self) -> &'static [&'static str] {
        &["from_constant"]
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

/// Enables `from_default_factory`.
#[derive(Debug, Default)]
pub struct DefaultFactoryPlugin;

impl DefaultFactoryPlugin {
    pub const KIND: &'static str = "default_factory";
}

impl Plugin for DefaultFactoryPlugin {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn provider_kind(&self) -> &'static str {
        kinds::DEFAULT_FACTORY
    }

    fn chain_methods(&self) -> &'static [&'static str] {
        &["from_default_factory"]
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

impl Field {
    /// Fall back to a fixed value. Always present, so usually last in a chain.
    pub fn from_constant(self, value: impl Into<Value>) -> Self {
        let value = value.into();
        self.with_plugin::<ConstantPlugin, _>(ConstantPlugin::KIND, |_, _| {
            Arc::new(ConstantProvider::new(value))
        })
    }

    /// Fall back to the result of `factory`, called on every resolve that reaches it.
    pub fn from_default_factory<F, V>(self, factory: F) -> Self
    where
        F: Fn() -> V + Send + Sync + 'static,
        V: Into<Value>,
    {
        self.with_plugin::<DefaultFactoryPlugin, _>(DefaultFactoryPlugin::KIND, |_, _| {
            Arc::new(DefaultFactoryProvider::new(factory))
        })
    }
}
