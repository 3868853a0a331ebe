//! Template evaluation and builtin functions.

use crate::error::ExecErrorKind;
use crate::parser::{Command, Pipeline, Term};
use crate::value::Value;
use crate::FuncMap;

pub(crate) fn pipeline(
    pipeline: &Pipeline,
    data: &Value,
    funcs: &FuncMap<'_>,
) -> Result<Value, ExecErrorKind> {
    let mut piped: Option<Value> = None;
    for command in &pipeline.commands {
        piped = Some(command_value(command, data, funcs, piped)?);
    }
    Ok(piped.unwrap_or_default())
}

fn command_value(
    command: &Command,
    data: &Value,
    funcs: &FuncMap<'_>,
    piped: Option<Value>,
) -> Result<Value, ExecErrorKind> {
    let Some((first, rest)) = command.terms.split_first() else {
        return Ok(Value::Nil);
    };

    match first {
        Term::Func(name) => {
            let mut args = rest
                .iter()
                .map(|term| term_value(term, data, funcs))
                .collect::<Result<Vec<_>, _>>()?;
            args.extend(piped);
            funcs.call(name, &args)
        }
        term => term_value(term, data, funcs),
    }
}

fn term_value(term: &Term, data: &Value, funcs: &FuncMap<'_>) -> Result<Value, ExecErrorKind> {
    match term {
        Term::Func(name) => funcs.call(name, &[]),
        Term::Dot => Ok(data.clone()),
        Term::Str(s) => Ok(Value::Str(s.clone())),
        Term::Int(n) => Ok(Value::Int(*n)),
        Term::Bool(b) => Ok(Value::Bool(*b)),
        Term::Nil => Ok(Value::Nil),
        Term::Pipeline(inner) => pipeline(inner, data, funcs),
    }
}

/// `index list i [j ...]`
pub(crate) fn builtin_index(args: &[Value]) -> Result<Value, ExecErrorKind> {
    let Some((target, indices)) = args.split_first() else {
        return Err(ExecErrorKind::WrongArgCount {
            func: "index".to_string(),
            expected: 2,
            got: 0,
        });
    };

    let mut current = target;
    for index in indices {
        let i = index.expect_int("index")?;
        let Value::List(items) = current else {
            return Err(ExecErrorKind::WrongType {
                func: "index".to_string(),
                expected: "list",
                got: current.type_name(),
            });
        };
        current = usize::try_from(i)
            .ok()
            .and_then(|i| items.get(i))
            .ok_or(ExecErrorKind::IndexOutOfRange {
                index: i,
                len: items.len(),
            })?;
    }

    Ok(current.clone())
}

/// `len x`
pub(crate) fn builtin_len(args: &[Value]) -> Result<Value, ExecErrorKind> {
    let [arg] = args else {
        return Err(ExecErrorKind::WrongArgCount {
            func: "len".to_string(),
            expected: 1,
            got: args.len(),
        });
    };

    let len = match arg {
        Value::List(items) => items.len(),
        Value::Str(s) => s.len(),
        other => {
            return Err(ExecErrorKind::WrongType {
                func: "len".to_string(),
                expected: "list or string",
                got: other.type_name(),
            })
        }
    };

    Ok(Value::Int(len as i64))
}
