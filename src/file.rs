//! File-backed providers and the shared read cache.
//!
//! A [`FileProvider`] resolves its path (a literal or another field's value),
//! normalizes it to an absolute path with `~` expanded, then reads it through
//! its [`FilePlugin`]. The plugin caches parsed content by
//! `(absolute path, parser name)`, so any number of fields reading the same
//! file with the same parser cost one read and one parse per process.
//!
//! A missing file is absence, cached like any other result. Other I/O errors
//! and parse failures propagate and are not cached.

use std::any::Any;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::error::ConfigError;
use crate::field::Field;
use crate::plugin::Plugin;
use crate::provider::{Provider, kinds};
use crate::value::{JsonPath, Parser, Selector, Value, render_plain};

/// The read layer under [`FilePlugin`]. Swap it out to count or fake reads.
pub trait FileReader: Send + Sync {
    fn read_to_string(&self, path: &Path) -> io::Result<String>;
}

impl<R: FileReader + ?Sized> FileReader for Arc<R> {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        (**self).read_to_string(path)
    }
}

#[derive(Debug, Default)]
pub struct OsFileReader;

impl FileReader for OsFileReader {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }
}

/// Enables `from_file`, `from_file_with`, `from_json_file`, and `from_toml_file`.
pub struct FilePlugin {
    reader: Arc<dyn FileReader>,
    cache: Mutex<HashMap<(PathBuf, String), Option<Value>>>,
}

impl Default for FilePlugin {
    fn default() -> Self {
        Self::with_reader(OsFileReader)
    }
}

impl FilePlugin {
    pub const KIND: &'static str = "file";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_reader(reader: impl FileReader + 'static) -> Self {
        Self {
            reader: Arc::new(reader),
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Read and parse `path`, at most once per `(path, parser)` pair.
    pub fn read_file(&self, path: &Path, parser: &Parser) -> Result<Option<Value>, ConfigError> {
        let key = (path.to_path_buf(), parser.name().to_string());
        let mut cache = self.cache.lock();
        if let Some(hit) = cache.get(&key) {
            trace!(path = %path.display(), parser = parser.name(), "file cache hit");
            return Ok(hit.clone());
        }

        debug!(path = %path.display(), parser = parser.name(), "not in cache, trying to load");
        let content = match self.reader.read_to_string(path) {
            Ok(text) => Some(parser.parse(&path.display().to_string(), &text)?),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "does not exist");
                None
            }
            Err(e) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source: e,
                });
            }
        };
        cache.insert(key, content.clone());
        Ok(content)
    }
}

impl Plugin for FilePlugin {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn provider_kind(&self) -> &'static str {
        kinds::FILE
    }

    fn chain_methods(&self) -> &'static [&'static str] {
        &["from_file", "from_file_with", "from_json_file", "from_toml_file"]
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

/// Where a [`FileProvider`] gets its path from.
#[derive(Debug, Clone)]
pub enum FileSource {
    Path(String),
    /// The resolved value of another field. That field must be declared earlier.
    Field(Field),
}

impl From<&str> for FileSource {
    fn from(path: &str) -> Self {
        FileSource::Path(path.to_string())
    }
}

impl From<String> for FileSource {
    fn from(path: String) -> Self {
        FileSource::Path(path)
    }
}

impl From<&Path> for FileSource {
    fn from(path: &Path) -> Self {
        FileSource::Path(path.to_string_lossy().into_owned())
    }
}

impl From<&Field> for FileSource {
    fn from(field: &Field) -> Self {
        FileSource::Field(field.clone())
    }
}

impl From<Field> for FileSource {
    fn from(field: Field) -> Self {
        FileSource::Field(field)
    }
}

pub struct FileProvider {
    plugin: Arc<FilePlugin>,
    source: FileSource,
    parser: Parser,
    selector: Selector,
}

impl FileProvider {
    pub fn new(plugin: Arc<FilePlugin>, source: FileSource, parser: Parser, selector: Selector) -> Self {
        Self {
            plugin,
            source,
            parser,
            selector,
        }
    }

    fn raw_path(&self) -> Result<Option<String>, ConfigError> {
        match &self.source {
            FileSource::Path(p) => Ok(Some(p.clone())),
            FileSource::Field(field) => Ok(field.resolve()?.map(|v| render_plain(&v))),
        }
    }
}

impl Provider for FileProvider {
    fn kind(&self) -> &'static str {
        kinds::FILE
    }

    fn provide(&self) -> Result<Option<Value>, ConfigError> {
        let Some(raw) = self.raw_path()? else {
            debug!("file path resolved to nothing");
            return Ok(None);
        };
        let path = normalize_path(&raw)?;
        debug!(path = %path.display(), "fetching file");
        match self.plugin.read_file(&path, &self.parser)? {
            Some(content) => self.selector.select(&content),
            None => Ok(None),
        }
    }

    fn description(&self) -> Option<String> {
        Some(match &self.source {
            FileSource::Path(p) => format!("file {p}"),
            FileSource::Field(f) => format!("file named by field {}", f.display_name()),
        })
    }

    fn dependencies(&self) -> Vec<Field> {
        match &self.source {
            FileSource::Path(_) => Vec::new(),
            FileSource::Field(f) => vec![f.clone()],
        }
    }
}

/// Expand a leading `~` to the home directory and make the path absolute.
pub fn normalize_path(raw: &str) -> Result<PathBuf, ConfigError> {
    let expanded = match raw.strip_prefix('~') {
        Some(rest) if rest.is_empty() || rest.starts_with('/') || rest.starts_with('\\') => {
            let tail = rest.trim_start_matches(['/', '\\']);
            match directories::UserDirs::new() {
                Some(user) if tail.is_empty() => user.home_dir().to_path_buf(),
                Some(user) => user.home_dir().join(tail),
                None => PathBuf::from(raw),
            }
        }
        _ => PathBuf::from(raw),
    };
    std::path::absolute(&expanded).map_err(|e| ConfigError::Io {
        path: expanded,
        source: e,
    })
}

impl Field {
    /// Fall back to the raw contents of a file.
    pub fn from_file(self, source: impl Into<FileSource>) -> Self {
        self.from_file_with(source, Parser::Raw, Selector::Identity)
    }

    /// Fall back to a file, parsed with `parser`, narrowed by `selector`.
    pub fn from_file_with(self, source: impl Into<FileSource>, parser: Parser, selector: Selector) -> Self {
        let source = source.into();
        self.with_plugin::<FilePlugin, _>(FilePlugin::KIND, |plugin, _| {
            Arc::new(FileProvider::new(plugin.clone(), source, parser, selector))
        })
    }

    /// Fall back to one value inside a JSON file, e.g. `"database.hosts[0]"`.
    pub fn from_json_file(self, source: impl Into<FileSource>, path: &str) -> Self {
        self.structured_file(source, Parser::Json, path)
    }

    /// Fall back to one value inside a TOML file.
    pub fn from_toml_file(self, source: impl Into<FileSource>, path: &str) -> Self {
        self.structured_file(source, Parser::Toml, path)
    }

    fn structured_file(self, source: impl Into<FileSource>, parser: Parser, path: &str) -> Self {
        match JsonPath::parse(path) {
            Ok(query) => self.from_file_with(source, parser, Selector::Path(query)),
            Err(e) => {
                self.fail(e);
                self
            }
        }
    }
}
