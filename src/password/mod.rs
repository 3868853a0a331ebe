//! Password command construction
//!
//! Renders a [`PasswordConfig`] template into the shell command restic runs
//! to obtain a repository password. Templates reference secret files with
//! `filename "path"` or `filenameArg i`, which pick up `args[i]`. Relative
//! paths are resolved against the config directory.

use std::path::Path;
use std::sync::OnceLock;

use regex_lite::{Captures, Regex};
use tracing::debug;
use wrestic_template::{ExecError, ExecErrorKind, FuncMap, ParseError, Template, Value};

use crate::config::PasswordConfig;

/// Template name reported in parse and execution errors
const TEMPLATE_NAME: &str = "password-config";

/// Password command errors
#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    #[error("{source}: password-config.template is invalid (template: {template:?})")]
    TemplateInvalid {
        template: String,
        #[source]
        source: ParseError,
    },

    #[error(
        "{source}: password-config.template does not agree with args (template: {template:?}, {args} args)"
    )]
    TemplateArgsMismatch {
        template: String,
        args: usize,
        #[source]
        source: ExecError,
    },
}

/// Render the password command for `pw`.
///
/// Returns an empty string when no template is set, in which case the caller
/// should leave out the `password-command` flag entirely.
pub fn password_command(config_dir: &Path, pw: &PasswordConfig) -> Result<String, PasswordError> {
    let Some(template) = pw.template.as_deref() else {
        return Ok(String::new());
    };
    let args: &[String] = pw.args.as_deref().unwrap_or_default();

    let mut funcs = FuncMap::new();
    funcs
        .insert("filename", |values: &[Value]| {
            let [path] = values else {
                return Err(arg_count("filename", values.len()));
            };
            Ok(Value::Str(format_filename(config_dir, path.expect_str("filename")?)))
        })
        .insert("filenameArg", |values: &[Value]| {
            let [index] = values else {
                return Err(arg_count("filenameArg", values.len()));
            };
            let index = index.expect_int("filenameArg")?;
            let arg = usize::try_from(index)
                .ok()
                .and_then(|i| args.get(i))
                .ok_or(ExecErrorKind::IndexOutOfRange {
                    index,
                    len: args.len(),
                })?;
            Ok(Value::Str(format_filename(config_dir, arg)))
        });

    let tmpl = Template::parse(TEMPLATE_NAME, template, &funcs).map_err(|source| {
        PasswordError::TemplateInvalid {
            template: template.to_string(),
            source,
        }
    })?;

    let data = Value::from(args);
    let out = tmpl
        .execute(&data, &funcs)
        .map_err(|source| PasswordError::TemplateArgsMismatch {
            template: template.to_string(),
            args: args.len(),
            source,
        })?;

    debug!(args = args.len(), "rendered password command");
    Ok(out)
}

fn arg_count(func: &str, got: usize) -> ExecErrorKind {
    ExecErrorKind::WrongArgCount {
        func: func.to_string(),
        expected: 1,
        got,
    }
}

/// Turn a configured filename into a command-line-ready path.
///
/// The path is cleaned, environment-expanded if it contains `$`, joined onto
/// `config_dir` when relative, and double-quoted when it contains a space.
pub fn format_filename(config_dir: &Path, filename: &str) -> String {
    let mut name = clean_path(filename);

    if name.contains('$') {
        name = expand_env(&name);
    }

    if !Path::new(&name).is_absolute() {
        name = clean_path(&config_dir.join(&name).to_string_lossy());
    }

    if name.contains(' ') {
        name = format!("{:?}", name);
    }
    name
}

/// Lexically normalize a slash-separated path: collapse repeated separators,
/// drop `.` elements and resolve `..` against the preceding element.
fn clean_path(path: &str) -> String {
    if path.is_empty() {
        return ".".to_string();
    }

    let rooted = path.starts_with('/');
    let mut parts: Vec<&str> = Vec::new();
    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." => match parts.last() {
                Some(&last) if last != ".." => {
                    parts.pop();
                }
                _ if rooted => {}
                _ => parts.push(".."),
            },
            other => parts.push(other),
        }
    }

    let joined = parts.join("/");
    match (rooted, joined.is_empty()) {
        (true, _) => format!("/{}", joined),
        (false, true) => ".".to_string(),
        (false, false) => joined,
    }
}

/// Replace `$VAR` and `${VAR}` with their environment values. Unset
/// variables expand to the empty string.
fn expand_env(input: &str) -> String {
    static VAR_RE: OnceLock<Regex> = OnceLock::new();
    let re = VAR_RE.get_or_init(|| {
        Regex::new(r"\$(?:\{([A-Za-z_][A-Za-z0-9_]*)\}|([A-Za-z_][A-Za-z0-9_]*))").unwrap()
    });

    re.replace_all(input, |caps: &Captures<'_>| {
        caps.get(1)
            .or_else(|| caps.get(2))
            .and_then(|name| std::env::var(name.as_str()).ok())
            .unwrap_or_default()
    })
    .into_owned()
}
