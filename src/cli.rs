//! Clap adapter: command-line arguments as chain providers.
//!
//! This module is compiled only when the `clap` Cargo feature is enabled (on
//! by default).
//!
//! Fields are usually declared before the application has built its
//! [`clap::Command`], so arguments requested through
//! [`Field::from_cli`] are queued on the [`CommandLinePlugin`] until
//! [`bind_parser`](CommandLinePlugin::bind_parser) supplies the command.
//! Binding upgrades every queued argument; arguments requested afterwards
//! register immediately.
//!
//! The plugin owns the parse call. [`try_parse_from`](CommandLinePlugin::try_parse_from)
//! and [`parse`](CommandLinePlugin::parse) run clap against the bound command
//! plus every registered argument, keep the resulting [`ArgMatches`] for the
//! providers, and hand the caller an identical copy.
//!
//! ```ignore
//! let env = Environment::default();
//! let debug = env.field()
//!     .from_cli(CliArg::flag("--debug"))
//!     .from_env_var_as("DEBUG", Cast::Bool)
//!     .from_constant(false);
//!
//! let cli = env.get_plugin::<CommandLinePlugin>().unwrap();
//! cli.bind_parser(Command::new("myapp"));
//! let matches = cli.parse()?;
//! ```

use std::any::Any;
use std::ffi::OsString;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use clap::parser::ValueSource;
use clap::{Arg, ArgAction, ArgMatches, Command};
use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::error::ConfigError;
use crate::field::{Field, FieldInner};
use crate::plugin::Plugin;
use crate::provider::{Provider, kinds};
use crate::value::{Cast, Value, cast_opt};

const FALLBACK_PREFIX: &str = "Falls back to: ";

/// How clap treats the argument. Mirrors the subset of [`ArgAction`] that
/// maps onto a single configuration value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CliAction {
    /// Takes a value: `--key value`. Resolves to a string.
    Set,
    /// Boolean switch, `true` when given.
    SetTrue,
    /// Boolean switch, `false` when given.
    SetFalse,
    /// Counts occurrences: `-vvv` resolves to `3`.
    Count,
}

impl CliAction {
    fn to_clap(self) -> ArgAction {
        match self {
            CliAction::Set => ArgAction::Set,
            CliAction::SetTrue => ArgAction::SetTrue,
            CliAction::SetFalse => ArgAction::SetFalse,
            CliAction::Count => ArgAction::Count,
        }
    }
}

/// Registration options for one command-line argument.
///
/// The spelling decides the argument shape: `--name` is a long flag, `-n` a
/// short flag, anything else a positional. The destination id drops leading
/// dashes and turns `-` into `_`, so `--log-level` is read back as
/// `log_level`.
#[derive(Debug, Clone)]
pub struct CliArg {
    spelling: String,
    short: Option<char>,
    action: CliAction,
    default_value: Option<Value>,
    help: Option<String>,
    auto_help: Option<bool>,
    cast: Option<Cast>,
}

impl CliArg {
    /// An argument that takes a value.
    pub fn new(spelling: &str) -> Self {
        Self {
            spelling: spelling.to_string(),
            short: None,
            action: CliAction::Set,
            default_value: None,
            help: None,
            auto_help: None,
            cast: None,
        }
    }

    /// A boolean switch that is `true` when present.
    pub fn flag(spelling: &str) -> Self {
        Self::new(spelling).action(CliAction::SetTrue)
    }

    /// Extra short spelling for a long flag.
    pub fn short(mut self, short: char) -> Self {
        self.short = Some(short);
        self
    }

    pub fn action(mut self, action: CliAction) -> Self {
        self.action = action;
        self
    }

    /// Value used when the argument is not on the command line. Without one,
    /// a missing argument is absence and the chain falls through.
    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    /// Help text. With auto-help on, the fallback list is appended to it.
    pub fn help(mut self, help: &str) -> Self {
        self.help = Some(help.to_string());
        self
    }

    /// Override the plugin's auto-help setting for this argument.
    pub fn auto_help(mut self, enabled: bool) -> Self {
        self.auto_help = Some(enabled);
        self
    }

    pub fn cast(mut self, cast: Cast) -> Self {
        self.cast = Some(cast);
        self
    }

    /// The id clap stores the parsed value under.
    pub fn id(&self) -> String {
        self.spelling.trim_start_matches('-').replace('-', "_")
    }

    fn to_arg(&self, help: Option<String>) -> Arg {
        let name = self.spelling.trim_start_matches('-');
        let mut arg = Arg::new(self.id()).action(self.action.to_clap());

        if self.spelling.starts_with("--") {
            arg = arg.long(name.to_string());
        } else if self.spelling.starts_with('-')
            && let Some(c) = name.chars().next()
        {
            arg = arg.short(c);
        }
        if let Some(c) = self.short {
            arg = arg.short(c);
        }
        if self.action == CliAction::Set {
            arg = arg.value_parser(clap::value_parser!(String));
        }
        if let Some(help) = help {
            arg = arg.help(help);
        }
        arg
    }
}

impl From<&str> for CliArg {
    fn from(spelling: &str) -> Self {
        CliArg::new(spelling)
    }
}

/// Reads one argument out of the plugin's captured [`ArgMatches`].
///
/// Created pending; becomes live once its argument has been registered with
/// a bound command. Either way it provides absence until a parse has run.
pub struct CliArgProvider {
    arg: CliArg,
    id: String,
    field: Weak<FieldInner>,
    matches: Arc<Mutex<Option<ArgMatches>>>,
    live: AtomicBool,
}

impl CliArgProvider {
    pub(crate) fn new(arg: CliArg, field: Weak<FieldInner>, matches: Arc<Mutex<Option<ArgMatches>>>) -> Self {
        let id = arg.id();
        Self {
            arg,
            id,
            field,
            matches,
            live: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Whether the argument has been registered with a bound command.
    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    fn upgrade(&self) {
        self.live.store(true, Ordering::SeqCst);
    }

    /// Descriptions of every provider after this one in the owning field's
    /// chain. Empty when the provider is not in any field's chain.
    fn fallbacks(&self) -> Vec<String> {
        let Some(field) = Field::upgrade(&self.field) else {
            return Vec::new();
        };
        let providers = field.providers();
        let me = self as *const Self;
        let Some(pos) = providers.iter().position(|p| std::ptr::addr_eq(Arc::as_ptr(p), me)) else {
            return Vec::new();
        };
        providers[pos + 1..]
            .iter()
            .filter_map(|p| p.description())
            .collect()
    }

    /// Help text as registered with clap.
    pub fn help_text(&self, auto_help: bool) -> Option<String> {
        if !self.arg.auto_help.unwrap_or(auto_help) {
            return self.arg.help.clone();
        }
        let fallbacks = self.fallbacks();
        if fallbacks.is_empty() {
            return self.arg.help.clone();
        }
        let prefix = self.arg.help.as_deref().unwrap_or(FALLBACK_PREFIX);
        Some(format!("{prefix}{}", fallbacks.join(", ")))
    }

    fn read(&self, matches: &ArgMatches) -> Option<Value> {
        if matches.value_source(&self.id) != Some(ValueSource::CommandLine) {
            return self.arg.default_value.clone();
        }
        match self.arg.action {
            CliAction::Set => matches
                .try_get_one::<String>(&self.id)
                .ok()
                .flatten()
                .map(|s| Value::String(s.clone())),
            CliAction::SetTrue | CliAction::SetFalse => matches
                .try_get_one::<bool>(&self.id)
                .ok()
                .flatten()
                .map(|b| Value::Bool(*b)),
            CliAction::Count => matches
                .try_get_one::<u8>(&self.id)
                .ok()
                .flatten()
                .map(|n| Value::from(*n)),
        }
    }
}

impl Provider for CliArgProvider {
    fn kind(&self) -> &'static str {
        kinds::CLI_ARG
    }

    fn provide(&self) -> Result<Option<Value>, ConfigError> {
        let value = {
            let matches = self.matches.lock();
            let Some(matches) = matches.as_ref() else {
                trace!(arg = %self.id, "nothing parsed yet");
                return Ok(None);
            };
            self.read(matches)
        };
        cast_opt(self.arg.cast.as_ref(), value)
    }
}

enum Binding {
    Unbound {
        pending: Vec<Arc<CliArgProvider>>,
    },
    Bound {
        command: Command,
        registered: Vec<Arc<CliArgProvider>>,
    },
}

/// Enables `from_cli` and owns the clap parse.
pub struct CommandLinePlugin {
    auto_help: bool,
    binding: Mutex<Binding>,
    matches: Arc<Mutex<Option<ArgMatches>>>,
}

impl Default for CommandLinePlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandLinePlugin {
    pub const KIND: &'static str = "cli";

    /// An unbound plugin with auto-help off.
    pub fn new() -> Self {
        Self {
            auto_help: false,
            binding: Mutex::new(Binding::Unbound {
                pending: Vec::new(),
            }),
            matches: Arc::new(Mutex::new(None)),
        }
    }

    /// Append a description of the rest of each field's chain to its
    /// argument's help text.
    pub fn with_auto_help(mut self, enabled: bool) -> Self {
        self.auto_help = enabled;
        self
    }

    /// Bind at construction.
    pub fn with_command(self, command: Command) -> Self {
        self.bind_parser(command);
        self
    }

    pub fn auto_help(&self) -> bool {
        self.auto_help
    }

    pub fn is_bound(&self) -> bool {
        matches!(*self.binding.lock(), Binding::Bound { .. })
    }

    /// Attach `command` and register every queued argument against it.
    /// Binding again swaps the command and keeps the registered arguments.
    pub fn bind_parser(&self, command: Command) {
        let mut binding = self.binding.lock();
        let args = match std::mem::replace(&mut *binding, Binding::Unbound { pending: Vec::new() }) {
            Binding::Unbound { pending } => pending,
            Binding::Bound { registered, .. } => registered,
        };
        for provider in &args {
            provider.upgrade();
        }
        debug!(command = %command.get_name(), upgraded = args.len(), "bound command-line parser");
        *binding = Binding::Bound {
            command,
            registered: args,
        };
    }

    fn install(&self, provider: Arc<CliArgProvider>) {
        let mut binding = self.binding.lock();
        match &mut *binding {
            Binding::Unbound { pending } => {
                trace!(arg = %provider.id(), "queued until a parser is bound");
                pending.push(provider);
            }
            Binding::Bound { registered, .. } => {
                provider.upgrade();
                registered.push(provider);
            }
        }
    }

    /// The bound command with every registered argument, help text
    /// refreshed from the current chains. Fails with
    /// [`ConfigError::DuplicateArgument`] when two fields register the same
    /// argument or one clashes with the command's own.
    pub fn command(&self) -> Result<Command, ConfigError> {
        let binding = self.binding.lock();
        let Binding::Bound {
            command,
            registered,
        } = &*binding
        else {
            return Err(ConfigError::ParserNotBound);
        };
        let args: Vec<Arg> = registered
            .iter()
            .map(|provider| provider.arg.to_arg(provider.help_text(self.auto_help)))
            .collect();
        check_unique(command, &args)?;
        Ok(command.clone().args(args))
    }

    /// Parse `args` (including the binary name), capture the matches for the
    /// providers and return them.
    pub fn try_parse_from<I, T>(&self, args: I) -> Result<ArgMatches, ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let matches = self.command()?.try_get_matches_from(args)?;
        Ok(self.capture(matches))
    }

    /// Parse the process arguments. Like clap, prints usage and exits on a
    /// parse error or `--help`.
    pub fn parse(&self) -> Result<ArgMatches, ConfigError> {
        let matches = self.command()?.get_matches();
        Ok(self.capture(matches))
    }

    /// The most recently captured matches.
    pub fn matches(&self) -> Option<ArgMatches> {
        self.matches.lock().clone()
    }

    fn capture(&self, matches: ArgMatches) -> ArgMatches {
        debug!("captured command-line matches");
        *self.matches.lock() = Some(matches.clone());
        matches
    }
}

/// Ids and names already claimed on a command.
#[derive(Default)]
struct Claimed {
    ids: Vec<String>,
    longs: Vec<String>,
    shorts: Vec<char>,
}

impl Claimed {
    fn has_id(&self, id: &str) -> bool {
        self.ids.iter().any(|i| i == id)
    }

    fn add(&mut self, id: &str, long: Option<&str>, short: Option<char>) {
        self.ids.push(id.to_string());
        self.longs.extend(long.map(str::to_string));
        self.shorts.extend(short);
    }

    /// The name `arg` clashes on, if any.
    fn clash(&self, arg: &Arg) -> Option<String> {
        let id = arg.get_id().as_str();
        if self.has_id(id) {
            return Some(id.to_string());
        }
        if let Some(long) = arg.get_long()
            && self.longs.iter().any(|l| l == long)
        {
            return Some(format!("--{long}"));
        }
        match arg.get_short() {
            Some(short) if self.shorts.contains(&short) => Some(format!("-{short}")),
            _ => None,
        }
    }
}

/// Reject registered arguments whose id, long or short name is already
/// taken, by the command or by another registered argument. clap asserts on
/// these when the command is built.
fn check_unique(command: &Command, args: &[Arg]) -> Result<(), ConfigError> {
    let mut claimed = Claimed::default();
    for arg in command.get_arguments() {
        claimed.add(arg.get_id().as_str(), arg.get_long(), arg.get_short());
    }
    if !command.is_disable_help_flag_set() && !claimed.has_id("help") {
        claimed.add("help", Some("help"), Some('h'));
    }
    if command.get_version().is_some() && !command.is_disable_version_flag_set() && !claimed.has_id("version") {
        claimed.add("version", Some("version"), Some('V'));
    }

    for arg in args {
        if let Some(name) = claimed.clash(arg) {
            return Err(ConfigError::DuplicateArgument(name));
        }
        claimed.add(arg.get_id().as_str(), arg.get_long(), arg.get_short());
    }
    Ok(())
}

impl Plugin for CommandLinePlugin {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn provider_kind(&self) -> &'static str {
        kinds::CLI_ARG
    }

    fn chain_methods(&self) -> &'static [&'static str] {
        &["from_cli"]
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

impl Field {
    /// Fall back to a command-line argument. Pass a spelling such as
    /// `"--name"`, or a [`CliArg`] for flags, defaults and help.
    pub fn from_cli(self, arg: impl Into<CliArg>) -> Self {
        let arg = arg.into();
        self.with_plugin::<CommandLinePlugin, _>(CommandLinePlugin::KIND, |plugin, field| {
            let provider = Arc::new(CliArgProvider::new(arg, field.downgrade(), plugin.matches.clone()));
            plugin.install(provider.clone());
            provider as Arc<dyn Provider>
        })
    }
}
