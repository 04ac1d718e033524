//! Per-field fallback chains for application configuration.
//!
//! Each configuration field declares, once, the order in which its sources
//! are consulted: a command-line flag, then an environment variable, then a
//! file, then a hardcoded default. The first source that has a value wins.
//!
//! ```ignore
//! let env = Environment::default();
//!
//! let debug = env
//!     .field()
//!     .from_cli(CliArg::flag("--debug"))
//!     .from_env_var_as("DEBUG", Cast::Bool)
//!     .from_constant(false);
//!
//! let schema = ConfigSchema::builder().field("debug", &debug).build()?;
//!
//! env.get_plugin::<CommandLinePlugin>().unwrap().bind_parser(Command::new("myapp"));
//! env.get_plugin::<CommandLinePlugin>().unwrap().parse()?;
//!
//! let config = schema.load()?;
//! ```
//!
//! # Why chains
//!
//! Layered configuration usually means writing the same fallback logic for
//! every setting: check the flag, else read the variable, else parse the
//! file, else use the default. The order differs per setting, the parsing
//! differs per source, and the plumbing grows with every new key.
//!
//! A chain moves that logic into data. The order is explicit at the point of
//! declaration, every source honors the same contract, and help text for a
//! flag can describe what happens when the flag is omitted.
//!
//! # Absence is not falsiness
//!
//! A provider either produces a value or reports absence (`Ok(None)`). Only
//! absence falls through to the next provider. `false`, `0` and `""` are
//! values: with `DEBUG=""` and a `Cast::Bool`, the chain above resolves to
//! `false` without ever reaching the constant. A chain where every provider
//! is absent resolves to absence; that is never an error on its own.
//!
//! # Resolve once
//!
//! [`Field::resolve`] caches its outcome, absence included, and never calls a
//! provider again. [`Field::resolve_only`] restricts the walk to some
//! provider kinds and neither reads nor fills that cache, so
//! [`ConfigSchema::from_providers`] can rebuild a config from one source
//! without disturbing the permanent values.
//!
//! # Plugins and environments
//!
//! Chain methods (`from_env_var`, `from_file`, `from_cli`, ...) are enabled by
//! plugins. An [`Environment`] holds at most one plugin per kind and hands a
//! snapshot of them to every field it creates. A chain method whose plugin
//! is missing from that snapshot does not panic: the error is recorded on
//! the field and reported when the field is registered.
//!
//! [`Environment::default()`] enables constants, default factories,
//! environment variables, files and (with the `clap` feature) command-line
//! arguments. The two remote stores need a client and are added explicitly:
//!
//! | Plugin | Chain methods | Provider kind |
//! |--------|---------------|---------------|
//! | [`ConstantPlugin`] | `from_constant` | `constant` |
//! | [`DefaultFactoryPlugin`] | `from_default_factory` | `default_factory` |
//! | [`EnvVarPlugin`] | `from_env_var`, `from_env_var_as` | `env_var` |
//! | [`FilePlugin`] | `from_file`, `from_file_with`, `from_json_file`, `from_toml_file` | `file` |
//! | [`ParameterStorePlugin`] | `from_parameter`, `from_parameter_as` | `parameter_store` |
//! | [`SecretStorePlugin`] | `from_secret` | `secret_store` |
//! | `CommandLinePlugin` | `from_cli` | `cli_arg` |
//!
//! Any type implementing [`Provider`] can join a chain through
//! [`Field::from_provider`].
//!
//! # Remote stores
//!
//! The crate ships no SDK bindings. Implement [`ParameterFetcher`] or
//! [`SecretFetcher`] over the client you already use. The parameter store
//! fetches every registered name on first use, in batches of at most ten,
//! and caches the result for the life of the plugin. The secret store treats
//! "not found" as absence; every other client failure propagates.
//!
//! # Registration
//!
//! [`ConfigSchema::builder`] names fields in declaration order, which is also
//! resolution order. A provider may read an earlier field's value (a file
//! path held in another field, for example); forward, self and unregistered
//! references are rejected at [`build`](SchemaBuilder::build) time.
//! [`ResolvedConfig`] renders sensitive fields as `*****`.
//!
//! # Clap adapter
//!
//! The `cli` module (behind the `clap` feature, on by default) binds
//! arguments to a [`clap::Command`] that may not exist yet when fields are
//! declared. Arguments queue on the plugin until
//! `CommandLinePlugin::bind_parser`, and the plugin runs the parse itself so
//! it can keep the matches. To use the crate without clap:
//!
//! ```toml
//! cfgchain = { version = "...", default-features = false }
//! ```
//!
//! # Error handling
//!
//! All fallible operations return [`ConfigError`]. Missing files, unset
//! variables, unknown parameters and "not found" secrets are absence, not
//! errors. Malformed content, failed casts, transport failures and strict
//! secret-key misses stop resolution.

pub mod error;

#[cfg(feature = "clap")]
mod cli;
mod env;
mod environment;
mod field;
mod file;
mod parameter;
mod plugin;
mod provider;
mod remote;
mod schema;
mod secret;
mod value;

#[cfg(test)]
mod fixtures;

#[cfg(feature = "clap")]
pub use cli::{CliAction, CliArg, CliArgProvider, CommandLinePlugin};
pub use env::{EnvVarPlugin, EnvVarProvider};
pub use environment::Environment;
pub use error::ConfigError;
pub use field::Field;
pub use file::{FilePlugin, FileProvider, FileReader, FileSource, OsFileReader, normalize_path};
pub use parameter::{MAX_BATCH, Parameter, ParameterFetcher, ParameterProvider, ParameterStorePlugin};
pub use plugin::{ConstantPlugin, DefaultFactoryPlugin, Plugin, PluginSet};
pub use provider::{ConstantProvider, DefaultFactoryProvider, Provider, kinds};
pub use remote::RemoteError;
pub use schema::{ConfigSchema, Loader, ResolvedConfig, SchemaBuilder};
pub use secret::{SecretFetcher, SecretProvider, SecretRef, SecretStorePlugin};
pub use value::{Cast, CastFn, JsonPath, ParseFn, Parser, SelectFn, Selector, Value};
