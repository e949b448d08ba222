//! `pladder-script` provides a parser and evaluator for PladderScript, the
//! bracket-based scripting language embedded in the pladder chat bot.
//!
//! Script text mixes literal output with nested command invocations
//! (`[cmd arg]`), verbatim quoted text (`{...}`) and variable references
//! (`$name`). Plugins expose named commands through a [`CommandRegistry`];
//! evaluation walks the parsed call tree, dispatches commands and records a
//! trace for the debugging tools.
//!
//! ## Examples
//!
//! ```
//! use std::sync::Arc;
//!
//! use pladder_script::{Callable, CommandRegistry, Context, Signature, interpret};
//!
//! let mut registry = CommandRegistry::new();
//! let group = registry.new_command_group("demo").unwrap();
//! group.register(
//!     "upper",
//!     Signature::new().required("text").varargs(),
//!     Callable::plain(|args| Ok(args[0].to_uppercase())),
//! );
//!
//! let mut context = Context::new(Arc::new(registry));
//! let result = interpret(&mut context, "upper hello [upper world]").unwrap();
//! assert_eq!(result, "HELLO WORLD");
//! ```
mod ast;
mod builtin;
mod command;
mod context;
mod error;
mod eval;
mod parser;
mod registry;
mod trace;
mod userdef;

pub use ast::{Call, Fragment, Word};
pub use builtin::register_builtin_commands;
pub use command::{Callable, CommandBinding, CommandResult, NameMatcher, Param, Signature};
pub use context::{Context, Environment, Metadata, TOP_COMMAND_NAME, TraceEntry};
pub use error::{ApplyError, Error, EvalError, ParseError, ScriptError};
pub use eval::{apply_call, eval_call, interpret};
pub use parser::{escape, parse};
pub use registry::{CommandGroup, CommandRegistry, TableGroup};
pub use trace::{TraceMode, color, render_trace};
pub use userdef::{
    DefinedCommands, Definition, DefinitionStore, MemoryStore, register_admin_commands,
};
