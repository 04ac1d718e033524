//! Registration: turning a set of fields into a loadable configuration.
//!
//! A [`ConfigSchema`] is an ordered list of named fields. Declaration order
//! is resolution order, and nothing is reordered: a field whose chain reads
//! another field (for example a file path taken from `filepath`) must be
//! registered after it. [`SchemaBuilder::build`] rejects forward, self and
//! unregistered references up front.
//!
//! ```ignore
//! let config = ConfigSchema::builder()
//!     .field("filepath", &filepath)
//!     .field("debug", &debug)
//!     .build()?
//!     .load()?;
//!
//! let debug: Option<bool> = config.get_as("debug")?;
//! ```

use std::any::type_name;
use std::fmt;

use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::ConfigError;
use crate::field::{Field, REDACTED};
use crate::value::Value;

const UNSET: &str = "<unset>";

/// Collects named fields for [`ConfigSchema`].
#[derive(Default)]
pub struct SchemaBuilder {
    fields: Vec<(String, Field)>,
}

impl SchemaBuilder {
    /// Register `field` under `name`. Order matters: see the module docs.
    pub fn field(mut self, name: &str, field: &Field) -> Self {
        self.fields.push((name.to_string(), field.clone()));
        self
    }

    /// Validate the declaration, then name every field.
    ///
    /// Fails on a duplicate name, on a chain-building error recorded on any
    /// field (such as a chain method whose plugin is not enabled), or on a
    /// provider that reads a field not registered earlier. A failed build
    /// leaves the fields untouched, and a field with a broken chain fails
    /// every build it is part of.
    pub fn build(self) -> Result<ConfigSchema, ConfigError> {
        for (i, (name, _)) in self.fields.iter().enumerate() {
            if self.fields[..i].iter().any(|(earlier, _)| earlier == name) {
                return Err(ConfigError::DuplicateField(name.clone()));
            }
        }
        for (name, field) in &self.fields {
            if let Some(source) = field.chain_error() {
                return Err(ConfigError::InvalidChain {
                    field: name.clone(),
                    source,
                });
            }
        }
        for (i, (name, field)) in self.fields.iter().enumerate() {
            for dependency in field.dependencies() {
                let declared_earlier = self.fields[..i].iter().any(|(_, f)| f.same(&dependency));
                if !declared_earlier {
                    return Err(ConfigError::ForwardReference {
                        field: name.clone(),
                        dependency: self.name_of(&dependency),
                    });
                }
            }
        }
        for (name, field) in &self.fields {
            field.set_name(name);
        }
        debug!(fields = self.fields.len(), "registered config schema");
        Ok(ConfigSchema {
            fields: self.fields,
        })
    }

    fn name_of(&self, field: &Field) -> String {
        self.fields
            .iter()
            .find(|(_, f)| f.same(field))
            .map(|(n, _)| n.clone())
            .unwrap_or_else(|| field.display_name())
    }
}

/// An ordered, validated set of named fields.
pub struct ConfigSchema {
    fields: Vec<(String, Field)>,
}

impl ConfigSchema {
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::default()
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, f)| f)
    }

    /// Field names in declaration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(n, _)| n.as_str())
    }

    /// Names of the fields whose chain has a provider of any of `has_provider`,
    /// in declaration order.
    pub fn keys(&self, has_provider: &[&str]) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|(_, f)| f.has_provider(has_provider))
            .map(|(n, _)| n.as_str())
            .collect()
    }

    /// Resolve every field through its full chain.
    pub fn load(&self) -> Result<ResolvedConfig, ConfigError> {
        self.loader().load()
    }

    /// Start a load with explicit values or a provider-kind filter.
    pub fn loader(&self) -> Loader<'_> {
        Loader {
            schema: self,
            overrides: Vec::new(),
            only: None,
        }
    }

    /// Build a config from providers of the given kinds only. The listed
    /// fields' caches are neither read nor written, but a field another
    /// provider reads (such as a file path field) resolves through its full
    /// chain and caches that value.
    pub fn from_providers(&self, kinds: &[&str]) -> Result<ResolvedConfig, ConfigError> {
        self.loader().only(kinds).load()
    }
}

/// One load of a [`ConfigSchema`].
pub struct Loader<'a> {
    schema: &'a ConfigSchema,
    overrides: Vec<(String, Value)>,
    only: Option<Vec<String>>,
}

impl Loader<'_> {
    /// Use `value` for `name` without consulting its chain.
    pub fn set(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.overrides.retain(|(n, _)| n != name);
        self.overrides.push((name.to_string(), value.into()));
        self
    }

    /// Restrict resolution to providers of these kinds.
    pub fn only(mut self, kinds: &[&str]) -> Self {
        self.only = Some(kinds.iter().map(|k| k.to_string()).collect());
        self
    }

    pub fn load(self) -> Result<ResolvedConfig, ConfigError> {
        if let Some((name, _)) = self
            .overrides
            .iter()
            .find(|(name, _)| self.schema.field(name).is_none())
        {
            return Err(ConfigError::UnknownField(name.clone()));
        }

        let only: Option<Vec<&str>> = self.only.as_ref().map(|k| k.iter().map(String::as_str).collect());
        let mut entries = Vec::with_capacity(self.schema.fields.len());
        for (name, field) in &self.schema.fields {
            let value = match self.overrides.iter().find(|(n, _)| n == name) {
                Some((_, value)) => {
                    debug!(field = %name, "using explicit value");
                    Some(value.clone())
                }
                None => field.resolve_filtered(only.as_deref())?,
            };
            entries.push(Entry {
                name: name.clone(),
                value,
                sensitive: field.is_sensitive(),
            });
        }
        Ok(ResolvedConfig { entries })
    }
}

struct Entry {
    name: String,
    value: Option<Value>,
    sensitive: bool,
}

impl Entry {
    fn rendered(&self) -> String {
        match (&self.value, self.sensitive) {
            (_, true) => REDACTED.to_string(),
            (None, false) => UNSET.to_string(),
            (Some(v), false) => v.to_string(),
        }
    }
}

/// The values produced by one load, in declaration order.
///
/// `Display` and `Debug` both redact sensitive fields.
pub struct ResolvedConfig {
    entries: Vec<Entry>,
}

impl ResolvedConfig {
    fn entry(&self, name: &str) -> Option<&Entry> {
        self.entries.iter().find(|e| e.name == name)
    }

    /// The value of `name`, or `None` when absent or unknown.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entry(name).and_then(|e| e.value.as_ref())
    }

    pub fn is_present(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// The value of `name` converted to `T`. Absence is `Ok(None)`.
    pub fn get_as<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>, ConfigError> {
        let entry = self
            .entry(name)
            .ok_or_else(|| ConfigError::UnknownField(name.to_string()))?;
        entry
            .value
            .clone()
            .map(|v| {
                serde_json::from_value(v).map_err(|source| ConfigError::Deserialize {
                    target: type_name::<T>(),
                    source,
                })
            })
            .transpose()
    }

    /// Deserialize the whole config into `T`. Absent fields are left out, so
    /// they map onto `Option` or `#[serde(default)]` members.
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T, ConfigError> {
        let map: serde_json::Map<String, Value> = self
            .entries
            .iter()
            .filter_map(|e| e.value.clone().map(|v| (e.name.clone(), v)))
            .collect();
        serde_json::from_value(Value::Object(map)).map_err(|source| ConfigError::Deserialize {
            target: type_name::<T>(),
            source,
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&Value>)> {
        self.entries.iter().map(|e| (e.name.as_str(), e.value.as_ref()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Display for ResolvedConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for entry in &self.entries {
            writeln!(f, "{} = {}", entry.name, entry.rendered())?;
        }
        Ok(())
    }
}

impl fmt::Debug for ResolvedConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        struct Raw(String);
        impl fmt::Debug for Raw {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
        f.debug_map()
            .entries(self.entries.iter().map(|e| (&e.name, Raw(e.rendered()))))
            .finish()
    }
}
