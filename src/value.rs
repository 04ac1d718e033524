//! Dynamic values and the small transforms providers apply to them.
//!
//! Every provider hands back an `Option<Value>`: `None` is absence, anything
//! else is a present value, including `false`, `0`, and `""`. Three transforms
//! sit between raw source data and that result:
//!
//! - [`Parser`] turns raw text (file contents) into a structured value.
//! - [`Selector`] extracts a sub-value from parsed content.
//! - [`Cast`] coerces a value into a scalar type. Casting is opt-in per
//!   provider and is not a schema: it exists so `"1"` from an env var can
//!   become `true` or `1`.

use std::fmt;
use std::sync::Arc;

use crate::error::ConfigError;

pub use serde_json::Value;

pub type CastFn = Arc<dyn Fn(Value) -> Result<Value, ConfigError> + Send + Sync>;
pub type ParseFn = Arc<dyn Fn(&str) -> Result<Value, String> + Send + Sync>;
pub type SelectFn = Arc<dyn Fn(&Value) -> Result<Option<Value>, ConfigError> + Send + Sync>;

/// Scalar coercion applied to a present value.
#[derive(Clone)]
pub enum Cast {
    /// Truthiness: `""`, `"0"`, `"false"`, `"no"`, `"off"` (any case) are
    /// `false`, every other string is `true`. Zero is `false`.
    Bool,
    Integer,
    Float,
    String,
    Custom(CastFn),
}

impl Cast {
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(Value) -> Result<Value, ConfigError> + Send + Sync + 'static,
    {
        Cast::Custom(Arc::new(f))
    }

    pub fn apply(&self, value: Value) -> Result<Value, ConfigError> {
        match self {
            Cast::Bool => Ok(Value::Bool(truthy(&value))),
            Cast::Integer => to_integer(value),
            Cast::Float => to_float(value),
            Cast::String => Ok(match value {
                Value::String(s) => Value::String(s),
                other => Value::String(other.to_string()),
            }),
            Cast::Custom(f) => f(value),
        }
    }
}

impl fmt::Debug for Cast {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cast::Bool => write!(f, "Bool"),
            Cast::Integer => write!(f, "Integer"),
            Cast::Float => write!(f, "Float"),
            Cast::String => write!(f, "String"),
            Cast::Custom(_) => write!(f, "Custom(..)"),
        }
    }
}

/// Apply an optional cast; absence passes through untouched.
pub(crate) fn cast_opt(cast: Option<&Cast>, value: Option<Value>) -> Result<Option<Value>, ConfigError> {
    match (cast, value) {
        (Some(cast), Some(v)) => cast.apply(v).map(Some),
        (_, v) => Ok(v),
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => {
            let s = s.trim();
            !(s.is_empty()
                || s == "0"
                || s.eq_ignore_ascii_case("false")
                || s.eq_ignore_ascii_case("no")
                || s.eq_ignore_ascii_case("off"))
        }
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

fn to_integer(value: Value) -> Result<Value, ConfigError> {
    let parsed = match &value {
        Value::Number(n) => n.as_i64(),
        Value::Bool(b) => Some(i64::from(*b)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };
    parsed.map(Value::from).ok_or_else(|| ConfigError::Cast {
        value: value.to_string(),
        target: "integer",
    })
}

fn to_float(value: Value) -> Result<Value, ConfigError> {
    let parsed = match &value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed
        .and_then(serde_json::Number::from_f64)
        .map(Value::Number)
        .ok_or_else(|| ConfigError::Cast {
            value: value.to_string(),
            target: "float",
        })
}

/// Turns raw file or secret text into a value.
///
/// The parser's [`name`](Parser::name) is its identity: the file cache keys
/// parsed content by `(path, parser name)`.
#[derive(Clone)]
pub enum Parser {
    /// Text passes through as a string value.
    Raw,
    Json,
    Toml,
    Custom { name: String, parse: ParseFn },
}

impl Parser {
    pub fn custom<F>(name: &str, f: F) -> Self
    where
        F: Fn(&str) -> Result<Value, String> + Send + Sync + 'static,
    {
        Parser::Custom {
            name: name.to_string(),
            parse: Arc::new(f),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Parser::Raw => "raw",
            Parser::Json => "json",
            Parser::Toml => "toml",
            Parser::Custom { name, .. } => name,
        }
    }

    /// Parse `content`. `origin` only feeds the error message.
    pub fn parse(&self, origin: &str, content: &str) -> Result<Value, ConfigError> {
        let fail = |reason: String| ConfigError::Parse {
            origin: origin.to_string(),
            parser: self.name().to_string(),
            reason,
        };
        match self {
            Parser::Raw => Ok(Value::String(content.to_string())),
            Parser::Json => serde_json::from_str(content).map_err(|e| fail(e.to_string())),
            Parser::Toml => {
                let table: toml::Table = toml::from_str(content).map_err(|e| fail(e.to_string()))?;
                serde_json::to_value(table).map_err(|e| fail(e.to_string()))
            }
            Parser::Custom { parse, .. } => parse(content).map_err(fail),
        }
    }
}

impl fmt::Debug for Parser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Parser({})", self.name())
    }
}

/// Extracts the part of parsed content a field cares about.
#[derive(Clone)]
pub enum Selector {
    Identity,
    Path(JsonPath),
    Custom(SelectFn),
}

impl Selector {
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&Value) -> Result<Option<Value>, ConfigError> + Send + Sync + 'static,
    {
        Selector::Custom(Arc::new(f))
    }

    /// A selected JSON `null` is absence.
    pub fn select(&self, content: &Value) -> Result<Option<Value>, ConfigError> {
        let selected = match self {
            Selector::Identity => Some(content.clone()),
            Selector::Path(path) => path.query(content)?,
            Selector::Custom(f) => f(content)?,
        };
        Ok(selected.filter(|v| !v.is_null()))
    }
}

impl fmt::Debug for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::Identity => write!(f, "Identity"),
            Selector::Path(p) => write!(f, "Path({p})"),
            Selector::Custom(_) => write!(f, "Custom(..)"),
        }
    }
}

/// A JMESPath query, validated when the chain is built.
///
/// `root.nested`, `list[-1]`, `"dotted.key"`, `items[*].name` and
/// `items[?enabled].name` are all valid. A query that matches nothing
/// yields `None`, as does an explicit JSON `null`.
#[derive(Debug, Clone, PartialEq)]
pub struct JsonPath {
    expr: String,
}

impl JsonPath {
    pub fn parse(expr: &str) -> Result<Self, ConfigError> {
        if expr.trim().is_empty() {
            return Err(ConfigError::InvalidPath {
                expr: expr.to_string(),
                reason: "empty expression".to_string(),
            });
        }
        Self::compile(expr)?;
        Ok(Self {
            expr: expr.to_string(),
        })
    }

    // Compiled expressions are `Rc`-based, so only the source is stored.
    fn compile(expr: &str) -> Result<jmespath::Expression<'static>, ConfigError> {
        jmespath::compile(expr).map_err(|e| ConfigError::InvalidPath {
            expr: expr.to_string(),
            reason: e.to_string(),
        })
    }

    pub fn query(&self, root: &Value) -> Result<Option<Value>, ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidPath {
            expr: self.expr.clone(),
            reason,
        };
        let found = Self::compile(&self.expr)?
            .search(root.clone())
            .map_err(|e| invalid(e.to_string()))?;
        if found.is_null() {
            return Ok(None);
        }
        serde_json::to_value(&*found)
            .map(Some)
            .map_err(|e| invalid(e.to_string()))
    }
}

impl fmt::Display for JsonPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.expr)
    }
}

/// Human-facing rendering: strings without quotes, everything else as JSON.
pub(crate) fn render_plain(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
