//! Minimal text template language.
//!
//! Templates are plain text with `{{ ... }}` actions. An action holds a
//! pipeline of commands separated by `|`; the value of each stage is passed
//! as the last argument of the next one. Terms are function names, the data
//! cursor `.`, string literals (`"..."` or `` `...` ``), integers
//! (decimal, `0x` hex, `0o` or leading-zero octal, `0b` binary), the
//! constants `true`, `false` and `nil`, and parenthesized pipelines.
//! Floats and character literals are not supported. `{{- ` and ` -}}` trim adjacent whitespace and
//! `{{/* ... */}}` is a comment.
//!
//! Functions are registered up front in a [`FuncMap`]. Referencing a
//! function that is not registered is a parse error, while bad arguments
//! (such as an index out of range) surface when the template is executed.

mod error;
mod eval;
mod parser;
mod value;

pub use error::{ExecError, ExecErrorKind, ParseError, ParseErrorKind};
pub use value::Value;

use std::collections::BTreeMap;

use parser::Node;

/// A function callable from a template action.
pub type Func<'a> = Box<dyn Fn(&[Value]) -> Result<Value, ExecErrorKind> + 'a>;

/// Named functions available to a template.
///
/// `index` and `len` are always present.
pub struct FuncMap<'a> {
    funcs: BTreeMap<String, Func<'a>>,
}

impl<'a> FuncMap<'a> {
    /// Create a map holding only the builtins.
    pub fn new() -> Self {
        let mut map = Self {
            funcs: BTreeMap::new(),
        };
        map.insert("index", eval::builtin_index);
        map.insert("len", eval::builtin_len);
        map
    }

    /// Register `func` under `name`, replacing any previous entry.
    pub fn insert<F>(&mut self, name: impl Into<String>, func: F) -> &mut Self
    where
        F: Fn(&[Value]) -> Result<Value, ExecErrorKind> + 'a,
    {
        self.funcs.insert(name.into(), Box::new(func));
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.funcs.contains_key(name)
    }

    pub(crate) fn call(&self, name: &str, args: &[Value]) -> Result<Value, ExecErrorKind> {
        match self.funcs.get(name) {
            Some(func) => func(args),
            None => Err(ExecErrorKind::UnknownFunction(name.to_string())),
        }
    }
}

impl Default for FuncMap<'_> {
    fn default() -> Self {
        Self::new()
    }
}

/// A parsed template.
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    name: String,
    source: String,
    nodes: Vec<Node>,
}

impl Template {
    /// Parse `source`, checking every function reference against `funcs`.
    pub fn parse(
        name: impl Into<String>,
        source: &str,
        funcs: &FuncMap<'_>,
    ) -> Result<Self, ParseError> {
        let name = name.into();
        let nodes = parser::parse(source, funcs).map_err(|(line, kind)| ParseError {
            name: name.clone(),
            line,
            kind,
        })?;

        Ok(Self {
            name,
            source: source.to_string(),
            nodes,
        })
    }

    /// Render the template with `data` as the `.` cursor.
    pub fn execute(&self, data: &Value, funcs: &FuncMap<'_>) -> Result<String, ExecError> {
        let mut out = String::new();
        for node in &self.nodes {
            match node {
                Node::Text(text) => out.push_str(text),
                Node::Action { line, pipeline } => {
                    let value = eval::pipeline(pipeline, data, funcs).map_err(|kind| ExecError {
                        name: self.name.clone(),
                        line: *line,
                        kind,
                    })?;
                    out.push_str(&value.to_string());
                }
            }
        }
        Ok(out)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The template source text.
    pub fn source(&self) -> &str {
        &self.source
    }
}
