use smol_str::SmolStr;

use crate::ast::{Call, Fragment, Word};
use crate::error::ParseError;

/// Nesting ceiling for `[...]` calls, so hostile input cannot exhaust the
/// parser's stack.
const MAX_NESTING: usize = 500;

/// Quotes `word` so it survives re-parsing at a word position.
///
/// Words are left untouched unless they are empty, contain a space or
/// contain `{`; those are wrapped in a `{...}` quote. Quote bodies are taken
/// verbatim by the parser, so `parse(escape(s))` gives back exactly `s`.
pub fn escape(word: &str) -> String {
    if word.is_empty() || word.contains(' ') || word.contains('{') {
        format!("{{{word}}}")
    } else {
        word.to_string()
    }
}

/// Parses script text into a [`Call`].
pub fn parse(text: &str) -> Result<Call, ParseError> {
    Parser::new(text).parse()
}

struct Parser<'a> {
    text: &'a str,
    pos: usize,
    nesting: usize,
}

impl<'a> Parser<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            text,
            pos: 0,
            nesting: 0,
        }
    }

    fn at_end(&self) -> bool {
        self.pos == self.text.len()
    }

    fn peek(&self) -> Option<char> {
        self.text[self.pos..].chars().next()
    }

    fn pop(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn try_pop(&mut self, c: char) -> bool {
        if self.try_peek(c) {
            self.pos += c.len_utf8();
            true
        } else {
            false
        }
    }

    fn try_peek(&self, c: char) -> bool {
        self.peek() == Some(c)
    }

    fn parse(mut self) -> Result<Call, ParseError> {
        let call = self.parse_call()?;
        if self.at_end() {
            Ok(call)
        } else {
            // The only way parse_call stops before the end is a `]` it does
            // not own.
            Err(ParseError::ExcessiveClosingBracket { offset: self.pos })
        }
    }

    fn parse_call(&mut self) -> Result<Call, ParseError> {
        let mut words = Vec::new();
        loop {
            self.parse_whitespace();
            if self.at_end() || self.try_peek(']') {
                break;
            }
            words.push(self.parse_word()?);
        }
        Ok(Call::new(words))
    }

    fn parse_whitespace(&mut self) {
        while self.try_pop(' ') {}
    }

    fn parse_word(&mut self) -> Result<Word, ParseError> {
        let mut fragments = Vec::new();
        let mut start = self.pos;
        let mut variable = false;
        loop {
            if self.at_end() || self.try_peek(']') || self.try_peek(' ') {
                self.push_pending(&mut fragments, start, self.pos, variable);
                break;
            } else if self.try_pop('[') {
                let open = self.pos - 1;
                self.push_pending(&mut fragments, start, open, variable);
                if self.nesting == MAX_NESTING {
                    return Err(ParseError::NestingTooDeep { offset: open });
                }
                self.nesting += 1;
                let call = self.parse_call()?;
                self.nesting -= 1;
                if self.at_end() {
                    return Err(ParseError::MissingClosingBracket { offset: open });
                }
                let closer = self.pop();
                debug_assert_eq!(closer, Some(']'));
                fragments.push(Fragment::Call(call));
                start = self.pos;
                variable = false;
            } else if self.try_pop('{') {
                let open = self.pos - 1;
                self.push_pending(&mut fragments, start, open, variable);
                let body_start = self.pos;
                let mut level = 1usize;
                while let Some(c) = self.pop() {
                    match c {
                        '{' => level += 1,
                        '}' => {
                            level -= 1;
                            if level == 0 {
                                break;
                            }
                        }
                        _ => {}
                    }
                }
                if level != 0 {
                    return Err(ParseError::MissingClosingBrace { offset: open });
                }
                let body = &self.text[body_start..self.pos - 1];
                fragments.push(Fragment::Literal(body.to_string()));
                start = self.pos;
                variable = false;
            } else if self.try_peek('}') {
                return Err(ParseError::ExcessiveClosingBrace { offset: self.pos });
            } else if self.try_pop('$') {
                self.push_pending(&mut fragments, start, self.pos - 1, variable);
                start = self.pos;
                variable = true;
            } else {
                self.pop();
            }
        }
        Ok(Word::new(fragments))
    }

    fn push_pending(
        &self,
        fragments: &mut Vec<Fragment>,
        start: usize,
        end: usize,
        variable: bool,
    ) {
        if start != end {
            let text = &self.text[start..end];
            let fragment = if variable {
                Fragment::Variable(SmolStr::new(text))
            } else {
                Fragment::Literal(text.to_string())
            };
            fragments.push(fragment);
        }
    }
}
