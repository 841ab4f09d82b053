//! Language error categories, source excerpts, and the unwinding type.
//!
//! Three host-level categories surface language problems: syntax (lexer or
//! parser, or an illegal declaration/placement detected at evaluation time),
//! reference (unresolvable name), and type (operator/coercion mismatch,
//! uncallable, non-iterable, non-constructable). Syntax errors are fatal and
//! never caught; type errors, reference errors, and user-thrown values unwind
//! to the nearest `try` scope.

use std::fmt;

use strum::{Display, IntoStaticStr};

use crate::{ast::Pos, value::Value};

/// Result alias used by every evaluator production.
pub type RunResult<T> = Result<T, RunError>;

/// Error category, displayed as the ANSI-colored prefix of a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, IntoStaticStr)]
pub enum ErrorKind {
    SyntaxError,
    ReferenceError,
    TypeError,
}

/// A positioned language error.
#[derive(Debug, Clone)]
pub struct LangError {
    pub kind: ErrorKind,
    pub message: String,
    pub pos: Pos,
    pub path: String,
}

impl LangError {
    pub fn new(kind: ErrorKind, message: impl Into<String>, pos: Pos, path: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            pos,
            path: path.into(),
        }
    }

    /// Renders the full diagnostic: category prefix, message, offending line
    /// with a caret underline spanning `pos.count`, and the `at (path:l:c)`
    /// trailer. `source` overrides reading the file at `self.path` (used by
    /// the REPL, where the path is synthetic).
    pub fn render(&self, color: bool, source: Option<&str>) -> String {
        let prefix = if color {
            format!("\x1b[31m{}\x1b[0m: ", self.kind)
        } else {
            format!("{}: ", self.kind)
        };
        format!(
            "{prefix}{}{}",
            self.message,
            source_log(&self.path, source, self.pos, color)
        )
    }
}

impl fmt::Display for LangError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.render(false, None))
    }
}

impl std::error::Error for LangError {}

/// Anything that unwinds evaluation: a language error or a user-thrown value.
///
/// `return`/`break`/`continue` are driven by interpreter flags, not by this
/// type; this carries only the error channel.
#[derive(Debug, Clone)]
pub enum RunError {
    Syntax(LangError),
    Reference(LangError),
    Type(LangError),
    Thrown(Value),
}

impl RunError {
    /// Whether a surrounding `try` may catch this. Syntax errors never are.
    pub fn catchable(&self) -> bool {
        !matches!(self, Self::Syntax(_))
    }

    /// The value bound to a catch parameter: the thrown value itself, or the
    /// error message as a string for reference/type errors.
    pub(crate) fn catch_value(&self) -> Value {
        match self {
            Self::Thrown(value) => value.clone(),
            Self::Syntax(err) | Self::Reference(err) | Self::Type(err) => {
                Value::Str(format!("{}: {}", err.kind, err.message).into())
            }
        }
    }

    /// Renders the diagnostic for terminal output. Thrown values render with
    /// the `Uncaught Error:` prefix used when no `try` was found.
    pub fn render(&self, color: bool) -> String {
        match self {
            Self::Syntax(err) | Self::Reference(err) | Self::Type(err) => err.render(color, None),
            Self::Thrown(value) => {
                let prefix = if color {
                    "Uncaught \x1b[31mError\x1b[0m: "
                } else {
                    "Uncaught Error: "
                };
                format!("{prefix}{}", crate::value::render_value(value, color))
            }
        }
    }
}

impl From<LangError> for RunError {
    fn from(err: LangError) -> Self {
        match err.kind {
            ErrorKind::SyntaxError => Self::Syntax(err),
            ErrorKind::ReferenceError => Self::Reference(err),
            ErrorKind::TypeError => Self::Type(err),
        }
    }
}

pub(crate) fn syntax_error(message: impl Into<String>, pos: Pos, path: &str) -> RunError {
    RunError::Syntax(LangError::new(ErrorKind::SyntaxError, message, pos, path))
}

pub(crate) fn reference_error(message: impl Into<String>, pos: Pos, path: &str) -> RunError {
    RunError::Reference(LangError::new(ErrorKind::ReferenceError, message, pos, path))
}

pub(crate) fn type_error(message: impl Into<String>, pos: Pos, path: &str) -> RunError {
    RunError::Type(LangError::new(ErrorKind::TypeError, message, pos, path))
}

/// Builds the source excerpt trailer: a newline, the offending line, a caret
/// underline, then the position trailer.
pub(crate) fn source_log(path: &str, source: Option<&str>, pos: Pos, color: bool) -> String {
    let mut out = String::new();
    let text = match source {
        Some(text) => Some(text.to_owned()),
        None => std::fs::read_to_string(path).ok(),
    };
    if let Some(text) = text
        && pos.line > 0
        && let Some(line) = text.lines().nth(pos.line - 1)
    {
        let mut underline = " ".repeat(pos.col.saturating_sub(1));
        let carets = "^".repeat(pos.count.max(1));
        if color {
            underline.push_str(&format!("\x1b[31m{carets}\x1b[0m"));
        } else {
            underline.push_str(&carets);
        }
        out.push_str(&format!("\n{line}\n{underline}"));
    }
    if color {
        out.push_str(&format!("\nat (\x1b[34m{path}\x1b[0m\x1b[33m:{}:{}\x1b[0m)", pos.line, pos.col));
    } else {
        out.push_str(&format!("\nat ({path}:{}:{})", pos.line, pos.col));
    }
    out
}
