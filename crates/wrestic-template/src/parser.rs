//! Template source parser.
//!
//! Splits source into text and action nodes, then tokenizes and parses each
//! action body into a pipeline.

use crate::error::ParseErrorKind;
use crate::FuncMap;

const LEFT_DELIM: &str = "{{";
const RIGHT_DELIM: &str = "}}";

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Node {
    Text(String),
    Action { line: usize, pipeline: Pipeline },
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Pipeline {
    pub commands: Vec<Command>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Command {
    pub terms: Vec<Term>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Term {
    Func(String),
    Dot,
    Str(String),
    Int(i64),
    Bool(bool),
    Nil,
    Pipeline(Pipeline),
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Dot,
    Str(String),
    Int(i64),
    LeftParen,
    RightParen,
    Pipe,
}

/// Parse template source. Errors carry the line of the failing action.
pub(crate) fn parse(
    source: &str,
    funcs: &FuncMap<'_>,
) -> Result<Vec<Node>, (usize, ParseErrorKind)> {
    let mut nodes = Vec::new();
    let mut rest = source;
    let mut line = 1;
    let mut trim_next = false;

    loop {
        let Some(start) = rest.find(LEFT_DELIM) else {
            push_text(&mut nodes, rest, trim_next, false);
            return Ok(nodes);
        };

        let raw_text = &rest[..start];
        let mut inner = &rest[start + LEFT_DELIM.len()..];
        let trim_left = has_left_trim(inner);
        if trim_left {
            inner = &inner[1..];
        }
        push_text(&mut nodes, raw_text, trim_next, trim_left);
        line += count_lines(raw_text);

        let end = find_right_delim(inner).ok_or((line, ParseErrorKind::UnclosedAction))?;
        let mut body = &inner[..end];
        trim_next = has_right_trim(body);
        if trim_next {
            body = &body[..body.len() - 1];
        }

        let trimmed = body.trim();
        if trimmed.starts_with("/*") {
            if !trimmed.ends_with("*/") || trimmed.len() < 4 {
                return Err((line, ParseErrorKind::UnclosedComment));
            }
        } else {
            let pipeline = parse_action(body, funcs).map_err(|kind| (line, kind))?;
            nodes.push(Node::Action { line, pipeline });
        }

        line += count_lines(&inner[..end]);
        rest = &inner[end + RIGHT_DELIM.len()..];
    }
}

fn push_text(nodes: &mut Vec<Node>, text: &str, trim_start: bool, trim_end: bool) {
    let mut text = text;
    if trim_start {
        text = text.trim_start();
    }
    if trim_end {
        text = text.trim_end();
    }
    if !text.is_empty() {
        nodes.push(Node::Text(text.to_string()));
    }
}

fn count_lines(s: &str) -> usize {
    s.matches('\n').count()
}

// "{{- " trims preceding text; the marker needs trailing whitespace so that
// "{{-3}}" still reads as a number.
fn has_left_trim(inner: &str) -> bool {
    let mut chars = inner.chars();
    chars.next() == Some('-') && chars.next().is_some_and(char::is_whitespace)
}

fn has_right_trim(body: &str) -> bool {
    body.strip_suffix('-')
        .is_some_and(|before| before.ends_with(char::is_whitespace))
}

/// Locate the closing delimiter, skipping over quoted strings.
fn find_right_delim(inner: &str) -> Option<usize> {
    let bytes = inner.as_bytes();
    let mut i = 0;
    let mut quote: Option<u8> = None;

    while i < bytes.len() {
        let b = bytes[i];
        match quote {
            Some(b'"') if b == b'\\' => i += 1,
            Some(q) if b == q => quote = None,
            Some(_) => {}
            None if b == b'"' || b == b'`' => quote = Some(b),
            None if bytes[i..].starts_with(RIGHT_DELIM.as_bytes()) => return Some(i),
            None => {}
        }
        i += 1;
    }

    None
}

fn parse_action(body: &str, funcs: &FuncMap<'_>) -> Result<Pipeline, ParseErrorKind> {
    let tokens = tokenize(body)?;
    let mut stream = TokenStream { tokens, pos: 0 };
    let pipeline = parse_pipeline(&mut stream, funcs)?;

    match stream.peek() {
        None => Ok(pipeline),
        Some(token) => Err(ParseErrorKind::UnexpectedToken(describe(token))),
    }
}

fn describe(token: &Token) -> String {
    match token {
        Token::Ident(name) => format!("identifier {:?}", name),
        Token::Dot => "\".\"".to_string(),
        Token::Str(s) => format!("string {:?}", s),
        Token::Int(n) => format!("number {}", n),
        Token::LeftParen => "\"(\"".to_string(),
        Token::RightParen => "\")\"".to_string(),
        Token::Pipe => "\"|\"".to_string(),
    }
}

struct TokenStream {
    tokens: Vec<Token>,
    pos: usize,
}

impl TokenStream {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }
}

fn parse_pipeline(
    stream: &mut TokenStream,
    funcs: &FuncMap<'_>,
) -> Result<Pipeline, ParseErrorKind> {
    let mut commands = vec![parse_command(stream, funcs)?];

    while stream.peek() == Some(&Token::Pipe) {
        stream.next();
        let command = parse_command(stream, funcs)?;
        if !matches!(command.terms.first(), Some(Term::Func(_))) {
            return Err(ParseErrorKind::NonExecutableStage(commands.len() + 1));
        }
        commands.push(command);
    }

    Ok(Pipeline { commands })
}

fn parse_command(
    stream: &mut TokenStream,
    funcs: &FuncMap<'_>,
) -> Result<Command, ParseErrorKind> {
    let mut terms = Vec::new();

    loop {
        let term = match stream.peek() {
            None | Some(Token::Pipe) | Some(Token::RightParen) => break,
            Some(Token::LeftParen) => {
                stream.next();
                let inner = parse_pipeline(stream, funcs)?;
                if stream.next() != Some(Token::RightParen) {
                    return Err(ParseErrorKind::UnclosedParen);
                }
                Term::Pipeline(inner)
            }
            Some(Token::Ident(name)) => {
                let term = match constant(name) {
                    Some(term) => term,
                    None if funcs.contains(name) => Term::Func(name.clone()),
                    None => return Err(ParseErrorKind::UnknownFunction(name.clone())),
                };
                stream.next();
                term
            }
            Some(Token::Dot) => {
                stream.next();
                Term::Dot
            }
            Some(Token::Str(s)) => {
                let term = Term::Str(s.clone());
                stream.next();
                term
            }
            Some(Token::Int(n)) => {
                let term = Term::Int(*n);
                stream.next();
                term
            }
        };
        terms.push(term);
    }

    if terms.is_empty() {
        return Err(ParseErrorKind::MissingValue);
    }
    if terms.len() > 1 && !matches!(terms[0], Term::Func(_)) {
        return Err(ParseErrorKind::NotAFunction);
    }
    if terms == [Term::Nil] {
        return Err(ParseErrorKind::NilCommand);
    }

    Ok(Command { terms })
}

fn constant(name: &str) -> Option<Term> {
    match name {
        "true" => Some(Term::Bool(true)),
        "false" => Some(Term::Bool(false)),
        "nil" => Some(Term::Nil),
        _ => None,
    }
}

/// Integer literal with an optional sign and `0x`, `0o`, `0b` or leading-zero
/// octal prefix.
fn parse_int(text: &str) -> Option<i64> {
    let (sign, unsigned) = match text.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", text),
    };

    let lower = unsigned.to_ascii_lowercase();
    let (radix, digits) = if let Some(hex) = lower.strip_prefix("0x") {
        (16, hex)
    } else if let Some(octal) = lower.strip_prefix("0o") {
        (8, octal)
    } else if let Some(binary) = lower.strip_prefix("0b") {
        (2, binary)
    } else if lower.len() > 1 && lower.starts_with('0') {
        (8, &lower[1..])
    } else {
        (10, lower.as_str())
    };

    // from_str_radix accepts a sign of its own
    if digits.is_empty() || digits.starts_with(['+', '-']) {
        return None;
    }
    i64::from_str_radix(&format!("{}{}", sign, digits), radix).ok()
}

fn tokenize(body: &str) -> Result<Vec<Token>, ParseErrorKind> {
    let mut tokens = Vec::new();
    let mut chars = body.char_indices().peekable();

    while let Some(&(start, c)) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '(' => {
                chars.next();
                tokens.push(Token::LeftParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RightParen);
            }
            '|' => {
                chars.next();
                tokens.push(Token::Pipe);
            }
            '.' => {
                chars.next();
                if chars
                    .peek()
                    .is_some_and(|&(_, next)| next.is_alphanumeric() || next == '_')
                {
                    return Err(ParseErrorKind::FieldAccess);
                }
                tokens.push(Token::Dot);
            }
            '"' => {
                chars.next();
                let mut s = String::new();
                loop {
                    match chars.next() {
                        None => return Err(ParseErrorKind::UnterminatedString),
                        Some((_, '"')) => break,
                        Some((_, '\\')) => match chars.next() {
                            Some((_, 'n')) => s.push('\n'),
                            Some((_, 't')) => s.push('\t'),
                            Some((_, '\\')) => s.push('\\'),
                            Some((_, '"')) => s.push('"'),
                            Some((_, other)) => return Err(ParseErrorKind::BadEscape(other)),
                            None => return Err(ParseErrorKind::UnterminatedString),
                        },
                        Some((_, ch)) => s.push(ch),
                    }
                }
                tokens.push(Token::Str(s));
            }
            '`' => {
                chars.next();
                let mut s = String::new();
                loop {
                    match chars.next() {
                        None => return Err(ParseErrorKind::UnterminatedString),
                        Some((_, '`')) => break,
                        Some((_, ch)) => s.push(ch),
                    }
                }
                tokens.push(Token::Str(s));
            }
            c if c.is_ascii_digit() || c == '-' => {
                chars.next();
                let mut end = start + c.len_utf8();
                while let Some(&(i, next)) = chars.peek() {
                    if !next.is_alphanumeric() && next != '_' {
                        break;
                    }
                    end = i + next.len_utf8();
                    chars.next();
                }
                let text = &body[start..end];
                let n = parse_int(text).ok_or_else(|| ParseErrorKind::BadNumber(text.to_string()))?;
                tokens.push(Token::Int(n));
            }
            c if c.is_alphabetic() || c == '_' => {
                chars.next();
                let mut end = start + c.len_utf8();
                while let Some(&(i, next)) = chars.peek() {
                    if !next.is_alphanumeric() && next != '_' {
                        break;
                    }
                    end = i + next.len_utf8();
                    chars.next();
                }
                tokens.push(Token::Ident(body[start..end].to_string()));
            }
            other => return Err(ParseErrorKind::UnexpectedChar(other)),
        }
    }

    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn funcs<'a>() -> FuncMap<'a> {
        let mut funcs = FuncMap::new();
        funcs.insert("f", |_args: &[crate::Value]| Ok(crate::Value::Nil));
        funcs
    }

    #[test]
    fn test_text_only() {
        let nodes = parse("hello", &funcs()).unwrap();
        assert_eq!(nodes, vec![Node::Text("hello".to_string())]);
    }

    #[test]
    fn test_action_terms() {
        let nodes = parse(r#"{{ f . "s" 2 }}"#, &funcs()).unwrap();
        let Node::Action { pipeline, .. } = &nodes[0] else {
            panic!("expected action, got {:?}", nodes[0]);
        };
        assert_eq!(
            pipeline.commands[0].terms,
            vec![
                Term::Func("f".to_string()),
                Term::Dot,
                Term::Str("s".to_string()),
                Term::Int(2),
            ]
        );
    }

    #[test]
    fn test_delimiter_inside_string() {
        let nodes = parse(r#"{{ f "}}" }}x"#, &funcs()).unwrap();
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[1], Node::Text("x".to_string()));
    }

    #[test]
    fn test_negative_number_not_trim_marker() {
        let nodes = parse("{{-3}}", &funcs()).unwrap();
        let Node::Action { pipeline, .. } = &nodes[0] else {
            panic!("expected action");
        };
        assert_eq!(pipeline.commands[0].terms, vec![Term::Int(-3)]);
    }

    #[test]
    fn test_bad_number() {
        let err = parse("{{ f 1x }}", &funcs()).unwrap_err();
        assert_eq!(err, (1, ParseErrorKind::BadNumber("1x".to_string())));
    }

    #[test]
    fn test_prefixed_numbers() {
        let nodes = parse("{{ f 0x1F 0o17 017 0b101 -0x10 0 -7 }}", &funcs()).unwrap();
        let Node::Action { pipeline, .. } = &nodes[0] else {
            panic!("expected action");
        };
        assert_eq!(
            pipeline.commands[0].terms[1..],
            [
                Term::Int(31),
                Term::Int(15),
                Term::Int(15),
                Term::Int(5),
                Term::Int(-16),
                Term::Int(0),
                Term::Int(-7),
            ]
        );
    }

    #[test]
    fn test_bad_prefixed_numbers() {
        for text in ["0x", "0xg", "08", "0b2", "-0o9"] {
            let err = parse(&format!("{{{{ f {} }}}}", text), &funcs()).unwrap_err();
            assert_eq!(err.1, ParseErrorKind::BadNumber(text.to_string()), "{}", text);
        }
    }

    #[test]
    fn test_constants() {
        let nodes = parse("{{ f true false nil }}", &funcs()).unwrap();
        let Node::Action { pipeline, .. } = &nodes[0] else {
            panic!("expected action");
        };
        assert_eq!(
            pipeline.commands[0].terms[1..],
            [Term::Bool(true), Term::Bool(false), Term::Nil]
        );
    }

    #[test]
    fn test_nil_alone_is_not_a_command() {
        let err = parse("{{ nil }}", &funcs()).unwrap_err();
        assert_eq!(err.1, ParseErrorKind::NilCommand);
    }

    #[test]
    fn test_unterminated_string() {
        let err = parse(r#"{{ f "abc }}"#, &funcs()).unwrap_err();
        assert_eq!(err.1, ParseErrorKind::UnclosedAction);
    }

    #[test]
    fn test_field_access_rejected() {
        let err = parse("{{ .Args }}", &funcs()).unwrap_err();
        assert_eq!(err.1, ParseErrorKind::FieldAccess);
    }

    #[test]
    fn test_argument_to_non_function() {
        let err = parse(r#"{{ "a" "b" }}"#, &funcs()).unwrap_err();
        assert_eq!(err.1, ParseErrorKind::NotAFunction);
    }

    #[test]
    fn test_non_executable_pipeline_stage() {
        let err = parse("{{ f | 3 }}", &funcs()).unwrap_err();
        assert_eq!(err.1, ParseErrorKind::NonExecutableStage(2));
    }

    #[test]
    fn test_unclosed_paren() {
        let err = parse("{{ f (f 1 }}", &funcs()).unwrap_err();
        assert_eq!(err.1, ParseErrorKind::UnclosedParen);
    }

    #[test]
    fn test_stray_right_paren() {
        let err = parse("{{ f ) }}", &funcs()).unwrap_err();
        assert!(matches!(err.1, ParseErrorKind::UnexpectedToken(_)));
    }

    #[test]
    fn test_unclosed_comment() {
        let err = parse("{{/* nope }}", &funcs()).unwrap_err();
        assert_eq!(err.1, ParseErrorKind::UnclosedComment);
    }

    #[test]
    fn test_line_tracking() {
        let err = parse("a\nb\n{{ missing }}", &funcs()).unwrap_err();
        assert_eq!(err.0, 3);
    }
}
