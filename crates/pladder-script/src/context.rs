use std::sync::Arc;

use rustc_hash::FxHashMap;
use smol_str::SmolStr;

use crate::command::CommandBinding;
use crate::error::{EvalError, ScriptError};
use crate::registry::CommandRegistry;

/// Variable bindings visible to `$name` references.
pub type Environment = FxHashMap<SmolStr, String>;

/// Request metadata supplied by the host (network, channel, sender, ...).
pub type Metadata = FxHashMap<SmolStr, String>;

/// The command name a fresh context reports before any command has run.
pub const TOP_COMMAND_NAME: &str = "<TOP>";

#[cfg(debug_assertions)]
const DEFAULT_MAX_DEPTH: u32 = 32; // Lower call depth for debug builds.

#[cfg(not(debug_assertions))]
const DEFAULT_MAX_DEPTH: u32 = 192;

/// One recorded command invocation: inputs, nested invocations and outcome.
#[derive(Debug, Clone, PartialEq)]
pub struct TraceEntry {
    pub command: CommandBinding,
    /// The literally invoked name, which for pattern bindings can differ
    /// from the display name.
    pub command_name: SmolStr,
    /// The evaluated argument words, before varargs collapsing.
    pub arguments: Vec<String>,
    /// Invocations made while evaluating this command's argument sub-calls
    /// and inside its callable.
    pub subtrace: Vec<TraceEntry>,
    pub result: Result<String, ScriptError>,
}

/// Per-evaluation state: registry handle, variables, request metadata, the
/// currently executing command name and the recorded trace.
///
/// A context is created fresh per top-level [`crate::interpret`] call (and
/// per isolated sub-evaluation such as `trace`) and discarded after use; the
/// registry is the only part shared between concurrent evaluations.
#[derive(Debug, Clone)]
pub struct Context {
    pub commands: Arc<CommandRegistry>,
    pub environment: Environment,
    pub metadata: Metadata,
    pub command_name: SmolStr,
    pub trace: Vec<TraceEntry>,
    depth: u32,
    max_depth: u32,
}

impl Context {
    pub fn new(commands: Arc<CommandRegistry>) -> Self {
        Self {
            commands,
            environment: Environment::default(),
            metadata: Metadata::default(),
            command_name: SmolStr::new_static(TOP_COMMAND_NAME),
            trace: Vec::new(),
            depth: 0,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    pub fn with_environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_command_name(mut self, command_name: &str) -> Self {
        self.command_name = SmolStr::new(command_name);
        self
    }

    pub fn with_max_depth(mut self, max_depth: u32) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Called before evaluating a call to keep runaway recursion (a
    /// user-defined command invoking itself, directly or via `eval`) a
    /// reportable error instead of a stack overflow.
    pub(crate) fn enter_call(&mut self) -> Result<(), ScriptError> {
        if self.depth >= self.max_depth {
            return Err(EvalError::RecursionLimit(self.max_depth).into());
        }
        self.depth += 1;
        Ok(())
    }

    pub(crate) fn exit_call(&mut self) {
        debug_assert!(self.depth > 0);
        self.depth = self.depth.saturating_sub(1);
    }
}
