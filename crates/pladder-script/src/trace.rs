use itertools::Itertools;

use crate::context::TraceEntry;
use crate::error::ScriptError;
use crate::parser::escape;

/// mIRC text formatting codes, as sent to chat networks.
pub mod color {
    pub const RESET: &str = "\x0f";

    pub const LIGHT_RED: &str = "\x0304";
    pub const DARK_RED: &str = "\x0305";
    pub const LIGHT_GREEN: &str = "\x0309";
    pub const DARK_GREEN: &str = "\x0303";
    pub const LIGHT_BLUE: &str = "\x0312";
    pub const DARK_BLUE: &str = "\x0302";
    pub const LIGHT_YELLOW: &str = "\x0308";
    pub const DARK_YELLOW: &str = "\x0307";
    pub const LIGHT_MAGENTA: &str = "\x0313";
    pub const DARK_MAGENTA: &str = "\x0306";
    pub const LIGHT_CYAN: &str = "\x0311";
    pub const DARK_CYAN: &str = "\x0310";
}

type ColorPair = (&'static str, &'static str);

/// Light/dark pairs cycled through by nesting depth; deeper levels fall back
/// to the reset code.
const COLOR_PAIRS: [ColorPair; 6] = [
    (color::LIGHT_RED, color::DARK_RED),
    (color::LIGHT_GREEN, color::DARK_GREEN),
    (color::LIGHT_BLUE, color::DARK_BLUE),
    (color::LIGHT_YELLOW, color::DARK_YELLOW),
    (color::LIGHT_MAGENTA, color::DARK_MAGENTA),
    (color::LIGHT_CYAN, color::DARK_CYAN),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceMode {
    /// Command names only, nesting shown with parentheses.
    Brief,
    /// Adds each command's escaped result.
    Results,
    /// Adds the full escaped invocation.
    Full,
}

impl TraceMode {
    /// Maps the user-typed mode flag (`-brief`, `-results`, `-full`).
    pub fn from_flag(flag: &str) -> Option<Self> {
        match flag {
            "-brief" => Some(TraceMode::Brief),
            "-results" => Some(TraceMode::Results),
            "-full" => Some(TraceMode::Full),
            _ => None,
        }
    }
}

/// Renders a recorded trace into one chat line.
pub fn render_trace(trace: &[TraceEntry], mode: TraceMode) -> String {
    match mode {
        TraceMode::Brief => brief_trace(trace, &COLOR_PAIRS),
        TraceMode::Results => results_trace(trace, &COLOR_PAIRS),
        TraceMode::Full => full_trace(trace, &COLOR_PAIRS),
    }
}

fn split_colors(pairs: &[ColorPair]) -> (&'static str, &'static str, &[ColorPair]) {
    match pairs.split_first() {
        Some(((light, dark), rest)) => (light, dark, rest),
        None => (color::RESET, color::RESET, &[]),
    }
}

fn result_text(result: &Result<String, ScriptError>) -> String {
    match result {
        Ok(text) => text.clone(),
        Err(err) => err.to_string(),
    }
}

fn brief_trace(trace: &[TraceEntry], pairs: &[ColorPair]) -> String {
    let (light, dark, rest) = split_colors(pairs);
    let parts = trace
        .iter()
        .map(|entry| {
            if entry.subtrace.is_empty() {
                format!("{light}{}", entry.command_name)
            } else {
                let sub = brief_trace(&entry.subtrace, rest);
                format!("{light}{}{dark}({sub}{dark})", entry.command_name)
            }
        })
        .join(&format!("{dark}, "));
    format!("{parts}{}", color::RESET)
}

fn results_trace(trace: &[TraceEntry], pairs: &[ColorPair]) -> String {
    let (light, dark, rest) = split_colors(pairs);
    let parts = trace
        .iter()
        .map(|entry| {
            let command = escape(&entry.command_name);
            let result = escape(&result_text(&entry.result));
            if entry.subtrace.is_empty() {
                format!("{light}{command} {dark}=> {light}{result}")
            } else {
                let sub = results_trace(&entry.subtrace, rest);
                format!("{light}{command} {dark}=> ( {sub} {dark}) => {light}{result}")
            }
        })
        .join(&format!("{dark}, "));
    format!("{parts}{}", color::RESET)
}

fn full_trace(trace: &[TraceEntry], pairs: &[ColorPair]) -> String {
    let (light, dark, rest) = split_colors(pairs);
    let parts = trace
        .iter()
        .map(|entry| {
            let invocation = std::iter::once(entry.command_name.as_str())
                .chain(entry.arguments.iter().map(String::as_str))
                .map(escape)
                .join(" ");
            let result = escape(&result_text(&entry.result));
            if entry.subtrace.is_empty() {
                format!("{light}[{invocation}] {dark}=> {light}{result}")
            } else {
                let sub = full_trace(&entry.subtrace, rest);
                format!("{light}[{invocation}] {dark}=> ( {sub} {dark}) => {light}{result}")
            }
        })
        .join(&format!("{dark}, "));
    format!("{parts}{}", color::RESET)
}
