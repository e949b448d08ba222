use miette::{Diagnostic, SourceSpan};
use smol_str::SmolStr;
use thiserror::Error;

use crate::command::CommandBinding;

/// Errors raised while turning script text into a [`crate::Call`].
///
/// These are always user input defects and their messages are shown to the
/// user verbatim.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("Missing closing bracket")]
    MissingClosingBracket { offset: usize },
    #[error("Missing closing brace")]
    MissingClosingBrace { offset: usize },
    #[error("Excessive closing bracket")]
    ExcessiveClosingBracket { offset: usize },
    #[error("Excessive closing brace")]
    ExcessiveClosingBrace { offset: usize },
    #[error("Too deeply nested")]
    NestingTooDeep { offset: usize },
}

impl ParseError {
    /// Byte offset into the script text the error points at: the opening
    /// delimiter for missing-closer errors, the stray closer otherwise.
    pub fn offset(&self) -> usize {
        match self {
            ParseError::MissingClosingBracket { offset }
            | ParseError::MissingClosingBrace { offset }
            | ParseError::ExcessiveClosingBracket { offset }
            | ParseError::ExcessiveClosingBrace { offset }
            | ParseError::NestingTooDeep { offset } => *offset,
        }
    }
}

/// Errors raised while evaluating a parsed call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EvalError {
    #[error("Unknown command name: {0}")]
    UnknownCommand(SmolStr),
    #[error("Unbound variable: {0}")]
    UnboundVariable(SmolStr),
    #[error("Maximum recursion depth exceeded")]
    RecursionLimit(u32),
}

/// Raised when the evaluated argument count cannot be bound to a command's
/// declared signature.
///
/// Carries the binding, the literally invoked name and the post-collapse
/// argument list so a host can build a `Usage: ...` reply without
/// re-deriving anything.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Argument count does not match what command accepts")]
pub struct ApplyError {
    pub command: CommandBinding,
    pub command_name: SmolStr,
    pub arguments: Vec<String>,
}

impl ApplyError {
    /// The declared shape, rendered as `name <required> [optional] {vararg...}`.
    pub fn usage(&self) -> String {
        self.command.usage()
    }
}

/// The whole family of script failures.
///
/// Command callables may also raise their own failures through
/// [`ScriptError::Command`]; the evaluator propagates those unmodified.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScriptError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Eval(#[from] EvalError),
    #[error(transparent)]
    Apply(#[from] ApplyError),
    #[error("{0}")]
    Command(String),
    #[error("{0}")]
    Registry(String),
}

/// A [`ScriptError`] paired with the script text it came from, for
/// diagnostic rendering.
#[derive(Error, Debug, PartialEq)]
#[error("{cause}")]
pub struct Error {
    /// The underlying cause of the error.
    pub cause: ScriptError,
    /// The script text related to the error.
    pub source_code: String,
    /// The location in the script text for diagnostics.
    pub location: SourceSpan,
}

impl Error {
    pub fn from_error(script: impl Into<String>, cause: ScriptError) -> Self {
        let source_code = script.into();
        let offset = match &cause {
            ScriptError::Parse(err) => err.offset().min(source_code.len()),
            _ => 0,
        };

        Self {
            cause,
            source_code,
            location: SourceSpan::new(offset.into(), 1),
        }
    }
}

impl Diagnostic for Error {
    fn code<'a>(&'a self) -> Option<Box<dyn std::fmt::Display + 'a>> {
        let code = match &self.cause {
            ScriptError::Parse(ParseError::MissingClosingBracket { .. }) => {
                "ParseError::MissingClosingBracket"
            }
            ScriptError::Parse(ParseError::MissingClosingBrace { .. }) => {
                "ParseError::MissingClosingBrace"
            }
            ScriptError::Parse(ParseError::ExcessiveClosingBracket { .. }) => {
                "ParseError::ExcessiveClosingBracket"
            }
            ScriptError::Parse(ParseError::ExcessiveClosingBrace { .. }) => {
                "ParseError::ExcessiveClosingBrace"
            }
            ScriptError::Parse(ParseError::NestingTooDeep { .. }) => "ParseError::NestingTooDeep",
            ScriptError::Eval(EvalError::UnknownCommand(_)) => "EvalError::UnknownCommand",
            ScriptError::Eval(EvalError::UnboundVariable(_)) => "EvalError::UnboundVariable",
            ScriptError::Eval(EvalError::RecursionLimit(_)) => "EvalError::RecursionLimit",
            ScriptError::Apply(_) => "ApplyError",
            ScriptError::Command(_) => "CommandError",
            ScriptError::Registry(_) => "RegistryError",
        };

        Some(Box::new(code))
    }

    fn help<'a>(&'a self) -> Option<Box<dyn std::fmt::Display + 'a>> {
        let msg = match &self.cause {
            ScriptError::Parse(ParseError::MissingClosingBracket { .. }) => {
                Some("Every `[` needs a matching `]`.".to_string())
            }
            ScriptError::Parse(ParseError::MissingClosingBrace { .. }) => {
                Some("Every `{` needs a matching `}`.".to_string())
            }
            ScriptError::Parse(ParseError::ExcessiveClosingBracket { .. }) => {
                Some("There is a `]` with no opening `[` before it.".to_string())
            }
            ScriptError::Parse(ParseError::ExcessiveClosingBrace { .. }) => {
                Some("There is a `}` with no opening `{` before it.".to_string())
            }
            ScriptError::Parse(ParseError::NestingTooDeep { .. }) => {
                Some("Reduce the nesting of `[...]` calls.".to_string())
            }
            ScriptError::Eval(EvalError::UnknownCommand(_)) => {
                Some("Use `help -command` to list the registered commands.".to_string())
            }
            ScriptError::Eval(EvalError::UnboundVariable(name)) => Some(format!(
                "`${name}` is not bound here. Did you mean to set it with `let`?"
            )),
            ScriptError::Eval(EvalError::RecursionLimit(limit)) => Some(format!(
                "Evaluation was stopped after {limit} nested calls. A command is probably calling itself."
            )),
            ScriptError::Apply(err) => Some(format!("Usage: {}", err.usage())),
            ScriptError::Command(_) | ScriptError::Registry(_) => None,
        };

        msg.map(|m| Box::new(m) as Box<dyn std::fmt::Display>)
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = miette::LabeledSpan> + '_>> {
        Some(Box::new(std::iter::once(
            miette::LabeledSpan::new_with_span(Some(format!("{}", self.cause)), self.location),
        )))
    }

    fn source_code(&self) -> Option<&dyn miette::SourceCode> {
        Some(&self.source_code)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case::missing_bracket(
        ParseError::MissingClosingBracket { offset: 4 },
        "Missing closing bracket"
    )]
    #[case::missing_brace(ParseError::MissingClosingBrace { offset: 0 }, "Missing closing brace")]
    #[case::excessive_bracket(
        ParseError::ExcessiveClosingBracket { offset: 3 },
        "Excessive closing bracket"
    )]
    #[case::excessive_brace(
        ParseError::ExcessiveClosingBrace { offset: 3 },
        "Excessive closing brace"
    )]
    fn test_parse_error_message(#[case] err: ParseError, #[case] message: &str) {
        assert_eq!(err.to_string(), message);
    }

    #[test]
    fn test_eval_error_messages_are_verbatim() {
        assert_eq!(
            EvalError::UnknownCommand("frobnicate".into()).to_string(),
            "Unknown command name: frobnicate"
        );
        assert_eq!(
            EvalError::UnboundVariable("x".into()).to_string(),
            "Unbound variable: x"
        );
    }

    #[test]
    fn test_from_error_points_at_parse_offset() {
        let cause = ScriptError::Parse(ParseError::ExcessiveClosingBracket { offset: 3 });
        let error = Error::from_error("cmd]", cause);

        assert_eq!(error.source_code, "cmd]");
        assert_eq!(error.location, SourceSpan::new(3.into(), 1));
    }

    #[test]
    fn test_from_error_clamps_offset_to_source() {
        let cause = ScriptError::Parse(ParseError::MissingClosingBrace { offset: 100 });
        let error = Error::from_error("cmd {", cause);

        assert_eq!(error.location, SourceSpan::new(5.into(), 1));
    }
}
