use smol_str::SmolStr;

/// One parsed invocation: a sequence of words, the first of which names the
/// command. Nested invocations appear as [`Fragment::Call`] inside words.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Call {
    pub words: Vec<Word>,
}

impl Call {
    pub fn new(words: Vec<Word>) -> Self {
        Self { words }
    }
}

/// A sequence of fragments whose evaluated texts concatenate into a single
/// command-name or argument token.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Word {
    pub fragments: Vec<Fragment>,
}

impl Word {
    pub fn new(fragments: Vec<Fragment>) -> Self {
        Self { fragments }
    }
}

/// One piece of a word. Fragments never change after parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fragment {
    /// Plain text, either bare or taken verbatim from a `{...}` quote.
    Literal(String),
    /// A nested `[...]` invocation evaluated before the enclosing word.
    Call(Call),
    /// A `$name` reference resolved against the context environment.
    Variable(SmolStr),
}
