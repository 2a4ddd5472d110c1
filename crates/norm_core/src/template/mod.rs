//! Query template compilation.
//!
//! # Responsibility
//! - Turn a template plus a serializable envelope into SQL text and an
//!   ordered list of bind values.
//!
//! # Invariants
//! - Every `{{ .Root.path }}` marker becomes exactly one placeholder, numbered
//!   in order of appearance, and contributes exactly one bind value.
//! - Text outside markers is copied verbatim.
//! - Compilation is deterministic for the same template and envelope shape.

mod placeholder;

pub use placeholder::{default_placeholder, set_default_placeholder, Placeholder};

use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::types::Value;
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};

static MARKER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)\{\{(.*?)\}\}").expect("valid marker regex"));
static PATH_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\.[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z0-9_]+)*$").expect("valid path regex")
});

/// Template compilation failure.
#[derive(Debug)]
pub enum TemplateError {
    /// A `{{` has no matching `}}`.
    Unclosed { offset: usize },
    /// A marker contains only whitespace.
    EmptyMarker { offset: usize },
    /// A marker is not a `.Root.field` path.
    InvalidPath { offset: usize, expr: String },
    /// The path does not resolve against the envelope.
    UnknownField { path: String },
    /// An integer does not fit SQLite's signed 64-bit range.
    OutOfRange { path: String, value: String },
    /// The envelope could not be serialized.
    Encode(serde_json::Error),
}

impl Display for TemplateError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unclosed { offset } => write!(f, "unclosed marker at byte {offset}"),
            Self::EmptyMarker { offset } => write!(f, "empty marker at byte {offset}"),
            Self::InvalidPath { offset, expr } => {
                write!(f, "invalid field path `{expr}` at byte {offset}")
            }
            Self::UnknownField { path } => write!(f, "field `{path}` not found in envelope"),
            Self::OutOfRange { path, value } => {
                write!(f, "field `{path}` value {value} exceeds the 64-bit integer range")
            }
            Self::Encode(err) => write!(f, "encode envelope: {err}"),
        }
    }
}

impl Error for TemplateError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Encode(err) => Some(err),
            _ => None,
        }
    }
}

/// SQL text with its positional bind values.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    pub sql: String,
    pub params: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Text(String),
    Field(Vec<String>),
}

/// Parsed query template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    segments: Vec<Segment>,
}

impl Template {
    /// Parses `source`, validating every marker.
    pub fn parse(source: &str) -> Result<Self, TemplateError> {
        let mut segments = Vec::new();
        let mut cursor = 0;

        for captures in MARKER_RE.captures_iter(source) {
            let (Some(whole), Some(inner)) = (captures.get(0), captures.get(1)) else {
                continue;
            };
            push_text(&mut segments, &source[cursor..whole.start()], cursor)?;

            let expr = inner.as_str().trim();
            if expr.is_empty() {
                return Err(TemplateError::EmptyMarker {
                    offset: whole.start(),
                });
            }
            if !PATH_RE.is_match(expr) {
                return Err(TemplateError::InvalidPath {
                    offset: whole.start(),
                    expr: expr.to_string(),
                });
            }

            let path = expr[1..].split('.').map(str::to_string).collect();
            segments.push(Segment::Field(path));
            cursor = whole.end();
        }
        push_text(&mut segments, &source[cursor..], cursor)?;

        Ok(Self { segments })
    }

    /// Number of markers, which equals the number of bind values produced.
    pub fn marker_count(&self) -> usize {
        self.segments
            .iter()
            .filter(|segment| matches!(segment, Segment::Field(_)))
            .count()
    }

    /// Renders the template against `envelope`.
    pub fn render<E: Serialize + ?Sized>(
        &self,
        envelope: &E,
        placeholder: Placeholder,
    ) -> Result<CompiledQuery, TemplateError> {
        let root = serde_json::to_value(envelope).map_err(TemplateError::Encode)?;
        let mut sql = String::new();
        let mut params = Vec::with_capacity(self.marker_count());

        for segment in &self.segments {
            match segment {
                Segment::Text(text) => sql.push_str(text),
                Segment::Field(path) => {
                    let value = resolve(&root, path).ok_or_else(|| TemplateError::UnknownField {
                        path: format!(".{}", path.join(".")),
                    })?;
                    params.push(to_sql_value(value, path)?);
                    sql.push_str(&placeholder.render(params.len()));
                }
            }
        }

        Ok(CompiledQuery { sql, params })
    }
}

/// Parses and renders `source` in one step.
pub fn compile<E: Serialize + ?Sized>(
    source: &str,
    envelope: &E,
    placeholder: Placeholder,
) -> Result<CompiledQuery, TemplateError> {
    Template::parse(source)?.render(envelope, placeholder)
}

fn push_text(segments: &mut Vec<Segment>, text: &str, base: usize) -> Result<(), TemplateError> {
    if let Some(position) = text.find("{{") {
        return Err(TemplateError::Unclosed {
            offset: base + position,
        });
    }
    if !text.is_empty() {
        segments.push(Segment::Text(text.to_string()));
    }
    Ok(())
}

fn resolve<'v>(root: &'v serde_json::Value, path: &[String]) -> Option<&'v serde_json::Value> {
    path.iter().try_fold(root, |value, segment| match value {
        serde_json::Value::Object(map) => map.get(segment),
        serde_json::Value::Array(items) => segment
            .parse::<usize>()
            .ok()
            .and_then(|index| items.get(index)),
        _ => None,
    })
}

fn to_sql_value(value: &serde_json::Value, path: &[String]) -> Result<Value, TemplateError> {
    let bound = match value {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(flag) => Value::Integer(i64::from(*flag)),
        serde_json::Value::Number(number) => {
            if let Some(integer) = number.as_i64() {
                Value::Integer(integer)
            } else if number.is_u64() {
                return Err(TemplateError::OutOfRange {
                    path: format!(".{}", path.join(".")),
                    value: number.to_string(),
                });
            } else {
                Value::Real(number.as_f64().unwrap_or(f64::NAN))
            }
        }
        serde_json::Value::String(text) => Value::Text(text.clone()),
        nested @ (serde_json::Value::Array(_) | serde_json::Value::Object(_)) => {
            Value::Text(nested.to_string())
        }
    };
    Ok(bound)
}
