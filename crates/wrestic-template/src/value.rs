use std::fmt;

use crate::error::ExecErrorKind;

/// Data flowing through template actions.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Nil,
    Str(String),
    Int(i64),
    Bool(bool),
    List(Vec<Value>),
}

impl Value {
    /// Short type name used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Str(_) => "string",
            Value::Int(_) => "int",
            Value::Bool(_) => "bool",
            Value::List(_) => "list",
        }
    }

    /// Borrow the string inside, or report a type error attributed to `func`.
    pub fn expect_str(&self, func: &str) -> Result<&str, ExecErrorKind> {
        match self {
            Value::Str(s) => Ok(s),
            other => Err(ExecErrorKind::WrongType {
                func: func.to_string(),
                expected: "string",
                got: other.type_name(),
            }),
        }
    }

    /// The integer inside, or a type error attributed to `func`.
    pub fn expect_int(&self, func: &str) -> Result<i64, ExecErrorKind> {
        match self {
            Value::Int(n) => Ok(*n),
            other => Err(ExecErrorKind::WrongType {
                func: func.to_string(),
                expected: "int",
                got: other.type_name(),
            }),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "<no value>"),
            Value::Str(s) => write!(f, "{}", s),
            Value::Int(n) => write!(f, "{}", n),
            Value::Bool(b) => write!(f, "{}", b),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<Vec<String>> for Value {
    fn from(items: Vec<String>) -> Self {
        Value::List(items.into_iter().map(Value::Str).collect())
    }
}

impl From<&[String]> for Value {
    fn from(items: &[String]) -> Self {
        Value::List(items.iter().cloned().map(Value::Str).collect())
    }
}
