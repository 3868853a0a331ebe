//! Template error types.

/// Failure to parse a template.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("template: {name}:{line}: {kind}")]
pub struct ParseError {
    /// Template name given to [`crate::Template::parse`]
    pub name: String,
    /// 1-based line where the offending action starts
    pub line: usize,
    pub kind: ParseErrorKind,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParseErrorKind {
    #[error("unclosed action")]
    UnclosedAction,

    #[error("unclosed comment")]
    UnclosedComment,

    #[error("unterminated quoted string")]
    UnterminatedString,

    #[error("invalid escape sequence \\{0}")]
    BadEscape(char),

    #[error("bad number syntax: {0:?}")]
    BadNumber(String),

    #[error("unexpected {0:?} in command")]
    UnexpectedChar(char),

    #[error("unexpected {0} in operand")]
    UnexpectedToken(String),

    #[error("field access is not supported")]
    FieldAccess,

    #[error("unclosed left paren")]
    UnclosedParen,

    #[error("missing value for command")]
    MissingValue,

    #[error("can't give argument to non-function")]
    NotAFunction,

    #[error("non executable command in pipeline stage {0}")]
    NonExecutableStage(usize),

    #[error("nil is not a command")]
    NilCommand,

    #[error("function {0:?} not defined")]
    UnknownFunction(String),
}

/// Failure while executing a parsed template.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("template: {name}:{line}: {kind}")]
pub struct ExecError {
    pub name: String,
    pub line: usize,
    pub kind: ExecErrorKind,
}

/// Errors raised by functions and by evaluation itself.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExecErrorKind {
    #[error("index out of range: {index} (length {len})")]
    IndexOutOfRange { index: i64, len: usize },

    #[error("wrong number of args for {func}: want {expected} got {got}")]
    WrongArgCount {
        func: String,
        expected: usize,
        got: usize,
    },

    #[error("wrong type for value in {func}; expected {expected}, got {got}")]
    WrongType {
        func: String,
        expected: &'static str,
        got: &'static str,
    },

    #[error("nil is not a command")]
    NilCommand,

    #[error("function {0:?} not defined")]
    UnknownFunction(String),
}
