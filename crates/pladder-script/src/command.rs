use std::fmt;
use std::sync::Arc;

use regex_lite::Regex;
use smol_str::SmolStr;

use crate::context::Context;
use crate::error::ScriptError;

pub type CommandResult = Result<String, ScriptError>;

type PlainFn = dyn Fn(Vec<String>) -> CommandResult + Send + Sync;
type ContextualFn = dyn Fn(&mut Context, Vec<String>) -> CommandResult + Send + Sync;

/// How a binding decides whether it answers to a candidate command name.
///
/// A pattern matcher lets one handler serve a whole family of spellings
/// (`kloofify`, `klooooofify`, ...); the handler reads the literally invoked
/// name back from [`Context::command_name`].
#[derive(Clone)]
pub enum NameMatcher {
    Exact(SmolStr),
    Pattern(Arc<Regex>),
}

impl NameMatcher {
    /// Builds a pattern matcher. The pattern is matched against the whole
    /// candidate name; `^`/`$` anchors may be given but are implied.
    pub fn pattern(pattern: &str) -> Result<Self, ScriptError> {
        let core = pattern.trim_start_matches('^').trim_end_matches('$');
        Regex::new(&format!("^(?:{core})$"))
            .map(|regex| NameMatcher::Pattern(Arc::new(regex)))
            .map_err(|err| ScriptError::Registry(format!("Invalid name pattern {pattern}: {err}")))
    }

    pub fn matches(&self, candidate: &str) -> bool {
        match self {
            NameMatcher::Exact(name) => name == candidate,
            NameMatcher::Pattern(regex) => regex.is_match(candidate),
        }
    }

    pub fn display_name(&self) -> SmolStr {
        match self {
            NameMatcher::Exact(name) => name.clone(),
            NameMatcher::Pattern(regex) => {
                let core = regex
                    .as_str()
                    .trim_start_matches("^(?:")
                    .trim_end_matches(")$");
                SmolStr::new(format!("/{core}/"))
            }
        }
    }
}

impl From<&str> for NameMatcher {
    fn from(name: &str) -> Self {
        NameMatcher::Exact(SmolStr::new(name))
    }
}

impl fmt::Debug for NameMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NameMatcher::Exact(name) => f.debug_tuple("Exact").field(name).finish(),
            NameMatcher::Pattern(regex) => f.debug_tuple("Pattern").field(&regex.as_str()).finish(),
        }
    }
}

impl PartialEq for NameMatcher {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (NameMatcher::Exact(a), NameMatcher::Exact(b)) => a == b,
            (NameMatcher::Pattern(a), NameMatcher::Pattern(b)) => a.as_str() == b.as_str(),
            _ => false,
        }
    }
}

/// One declared positional parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub name: SmolStr,
    pub default: Option<String>,
}

/// The declared shape of a command: an explicit arity descriptor attached at
/// registration time, never derived by introspection.
///
/// `params` are the named string parameters (a defaulted parameter may be
/// left out by the caller). `rest`, if set, accepts any number of extra
/// separate arguments after the named ones. `varargs` makes the final named
/// parameter collect all trailing words, joined with single spaces.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Signature {
    params: Vec<Param>,
    rest: Option<SmolStr>,
    varargs: bool,
}

impl Signature {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn required(mut self, name: &str) -> Self {
        assert!(
            self.params.iter().all(|p| p.default.is_none()),
            "required parameter {name} declared after an optional one"
        );
        self.params.push(Param {
            name: SmolStr::new(name),
            default: None,
        });
        self
    }

    pub fn optional(mut self, name: &str, default: &str) -> Self {
        self.params.push(Param {
            name: SmolStr::new(name),
            default: Some(default.to_string()),
        });
        self
    }

    pub fn rest(mut self, name: &str) -> Self {
        self.rest = Some(SmolStr::new(name));
        self
    }

    pub fn varargs(mut self) -> Self {
        self.varargs = true;
        self
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }

    pub fn rest_name(&self) -> Option<&SmolStr> {
        self.rest.as_ref()
    }

    pub fn has_varargs(&self) -> bool {
        self.varargs
    }

    pub fn required_count(&self) -> usize {
        self.params.iter().filter(|p| p.default.is_none()).count()
    }

    fn check_shape(&self) {
        if self.varargs {
            assert!(
                !self.params.is_empty(),
                "a varargs command needs a parameter to collect into"
            );
            assert!(
                self.rest.is_none(),
                "varargs and a rest parameter cannot be combined"
            );
        }
    }

    /// Collapses varargs, validates the count and fills in defaults.
    ///
    /// On success the returned list lines up with `params` (plus any rest
    /// arguments); on failure the post-collapse argument list comes back so
    /// the caller can build an [`crate::ApplyError`] from it.
    pub(crate) fn bind(&self, arguments: &[String]) -> Result<Vec<String>, Vec<String>> {
        let mut args: Vec<String> = arguments.to_vec();
        if self.varargs && args.len() >= self.params.len() {
            let trailing = args.split_off(self.params.len() - 1);
            args.push(trailing.join(" "));
        }
        let too_many = self.rest.is_none() && args.len() > self.params.len();
        if args.len() < self.required_count() || too_many {
            return Err(args);
        }
        while args.len() < self.params.len() {
            match &self.params[args.len()].default {
                Some(default) => args.push(default.clone()),
                // Unreachable: every non-defaulted parameter is covered by
                // the required_count check above.
                None => return Err(args),
            }
        }
        Ok(args)
    }
}

/// The function behind a binding. Contextual commands receive the evaluation
/// [`Context`] as an implicit leading parameter.
#[derive(Clone)]
pub enum Callable {
    Plain(Arc<PlainFn>),
    Contextual(Arc<ContextualFn>),
}

impl Callable {
    pub fn plain(f: impl Fn(Vec<String>) -> CommandResult + Send + Sync + 'static) -> Self {
        Callable::Plain(Arc::new(f))
    }

    pub fn contextual(
        f: impl Fn(&mut Context, Vec<String>) -> CommandResult + Send + Sync + 'static,
    ) -> Self {
        Callable::Contextual(Arc::new(f))
    }

    pub fn is_contextual(&self) -> bool {
        matches!(self, Callable::Contextual(_))
    }
}

impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Callable::Plain(_) => f.write_str("Plain(..)"),
            Callable::Contextual(_) => f.write_str("Contextual(..)"),
        }
    }
}

/// A registered command: name matcher, declared shape, callable and a
/// human-readable definition text.
#[derive(Debug, Clone)]
pub struct CommandBinding {
    matcher: NameMatcher,
    display_name: SmolStr,
    signature: Signature,
    callable: Callable,
    source: String,
}

impl CommandBinding {
    pub fn new(matcher: impl Into<NameMatcher>, signature: Signature, callable: Callable) -> Self {
        signature.check_shape();
        let matcher = matcher.into();
        let display_name = matcher.display_name();
        let source = format!("<built-in command {display_name}>");
        Self {
            matcher,
            display_name,
            signature,
            callable,
            source,
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    pub fn name_matches(&self, candidate: &str) -> bool {
        self.matcher.matches(candidate)
    }

    pub fn display_name(&self) -> &SmolStr {
        &self.display_name
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    pub fn callable(&self) -> &Callable {
        &self.callable
    }

    pub fn is_contextual(&self) -> bool {
        self.callable.is_contextual()
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Renders the declared shape as `name <required> [optional] {vararg...}`.
    pub fn usage(&self) -> String {
        let mut result = self.display_name.to_string();
        let params = self.signature.params();
        for (i, param) in params.iter().enumerate() {
            if i == params.len() - 1 && self.signature.has_varargs() {
                result.push_str(&format!(" {{{}...}}", param.name));
            } else if param.default.is_some() {
                result.push_str(&format!(" [{}]", param.name));
            } else {
                result.push_str(&format!(" <{}>", param.name));
            }
        }
        if let Some(rest) = self.signature.rest_name() {
            result.push_str(&format!(" {{{rest}...}}"));
        }
        result
    }
}

/// Bindings compare by declaration, not by callable identity; two bindings
/// registered from the same definition are equal.
impl PartialEq for CommandBinding {
    fn eq(&self, other: &Self) -> bool {
        self.matcher == other.matcher
            && self.display_name == other.display_name
            && self.signature == other.signature
            && self.source == other.source
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn noop() -> Callable {
        Callable::plain(|_| Ok(String::new()))
    }

    #[test]
    fn test_exact_matcher() {
        let matcher = NameMatcher::from("echo");
        assert!(matcher.matches("echo"));
        assert!(!matcher.matches("echoo"));
        assert_eq!(matcher.display_name(), "echo");
    }

    #[rstest]
    #[case::anchored("^kloo+fify$")]
    #[case::bare("kloo+fify")]
    fn test_pattern_matcher_is_anchored(#[case] pattern: &str) {
        let matcher = NameMatcher::pattern(pattern).unwrap();
        assert!(matcher.matches("kloofify"));
        assert!(matcher.matches("klooooofify"));
        assert!(!matcher.matches("kloofify2"));
        assert!(!matcher.matches("xkloofify"));
        assert_eq!(matcher.display_name(), "/kloo+fify/");
    }

    #[test]
    fn test_pattern_matcher_rejects_bad_regex() {
        assert!(matches!(
            NameMatcher::pattern("kloo[fify"),
            Err(ScriptError::Registry(_))
        ));
    }

    #[rstest]
    #[case::exact(&["one", "two"], Ok(vec!["one", "two"]))]
    #[case::too_few(&["one"], Err(vec!["one"]))]
    #[case::too_many(&["one", "two", "three"], Err(vec!["one", "two", "three"]))]
    fn test_bind_required(#[case] args: &[&str], #[case] expected: Result<Vec<&str>, Vec<&str>>) {
        let signature = Signature::new().required("x").required("y");
        let args: Vec<String> = args.iter().map(|s| s.to_string()).collect();
        let expected = match expected {
            Ok(v) => Ok(v.into_iter().map(String::from).collect::<Vec<_>>()),
            Err(v) => Err(v.into_iter().map(String::from).collect::<Vec<_>>()),
        };
        assert_eq!(signature.bind(&args), expected);
    }

    #[test]
    fn test_bind_fills_defaults() {
        let signature = Signature::new().required("x").optional("y", "fallback");
        assert_eq!(
            signature.bind(&["one".to_string()]),
            Ok(vec!["one".to_string(), "fallback".to_string()])
        );
    }

    #[test]
    fn test_bind_collapses_trailing_words() {
        let signature = Signature::new().required("target").optional("text", "").varargs();
        assert_eq!(
            signature.bind(&["a".to_string(), "b".to_string(), "c".to_string()]),
            Ok(vec!["a".to_string(), "b c".to_string()])
        );
    }

    #[test]
    fn test_bind_omits_empty_vararg_slot_so_default_applies() {
        let signature = Signature::new().optional("text", "fallback").varargs();
        assert_eq!(signature.bind(&[]), Ok(vec!["fallback".to_string()]));
    }

    #[test]
    fn test_bind_empty_vararg_slot_without_default_is_an_error() {
        let signature = Signature::new().required("text").varargs();
        assert_eq!(signature.bind(&[]), Err(vec![]));
    }

    #[test]
    fn test_bind_rest_accepts_any_count() {
        let signature = Signature::new().rest("args");
        assert!(signature.bind(&[]).is_ok());
        let many: Vec<String> = (0..10).map(|i| i.to_string()).collect();
        assert_eq!(signature.bind(&many), Ok(many.clone()));
    }

    #[test]
    fn test_usage_rendering() {
        let binding = CommandBinding::new(
            "give",
            Signature::new()
                .required("target")
                .optional("text", "")
                .varargs(),
            noop(),
        );
        assert_eq!(binding.usage(), "give <target> {text...}");

        let binding = CommandBinding::new(
            "searchlog",
            Signature::new().required("needle").optional("index", "0"),
            noop(),
        );
        assert_eq!(binding.usage(), "searchlog <needle> [index]");

        let binding = CommandBinding::new("nth", Signature::new().required("index").rest("args"), noop());
        assert_eq!(binding.usage(), "nth <index> {args...}");
    }

    #[test]
    #[should_panic(expected = "varargs command needs a parameter")]
    fn test_varargs_without_params_is_a_bug() {
        CommandBinding::new("broken", Signature::new().varargs(), noop());
    }
}
