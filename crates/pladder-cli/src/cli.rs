use std::sync::Arc;

use clap::Parser;
use colored::Colorize;
use miette::IntoDiagnostic;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use smol_str::SmolStr;

use pladder_script::{
    CommandRegistry, Context, DefinedCommands, DefinitionStore, Error, MemoryStore, Metadata,
    ScriptError, interpret, register_admin_commands, register_builtin_commands,
};

/// The bot truncates replies before they go out to a chat network; the CLI
/// behaves the same way.
const MAX_REPLY_LEN: usize = 10_000;

const PROMPT: &str = "> ";

#[derive(Parser, Debug)]
#[command(name = "pladder")]
#[command(author = env!("CARGO_PKG_AUTHORS"))]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(
    about = "Runs PladderScript commands the way the chat bot would, from the command line.",
    long_about = None
)]
pub struct Cli {
    /// Run this command instead of starting an interactive session.
    #[arg(short, long)]
    command: Option<String>,
}

impl Cli {
    pub fn run(self) -> miette::Result<()> {
        let registry = Arc::new(build_registry().into_diagnostic()?);
        match self.command {
            Some(script) => {
                println!("{}", run_script(&registry, &script));
                Ok(())
            }
            None => repl(registry),
        }
    }
}

/// Builds the registry the way the bot does at startup: the built-in group,
/// the user-defined-command admin group and the dynamic view over the
/// definition store.
fn build_registry() -> Result<CommandRegistry, ScriptError> {
    let mut registry = CommandRegistry::new();
    let store: Arc<dyn DefinitionStore> = Arc::new(MemoryStore::new());
    register_builtin_commands(&mut registry)?;
    register_admin_commands(&mut registry, Arc::clone(&store))?;
    registry.add_command_group("userdefs", Arc::new(DefinedCommands::new(store)))?;
    Ok(registry)
}

fn cli_metadata() -> Metadata {
    let mut metadata = Metadata::default();
    metadata.insert(SmolStr::new_static("network"), "cli".to_string());
    metadata.insert(SmolStr::new_static("channel"), "cli".to_string());
    metadata.insert(SmolStr::new_static("nick"), "user".to_string());
    metadata
}

/// Interprets one script on a fresh context and renders the reply the way
/// the bot's host boundary does.
fn run_script(registry: &Arc<CommandRegistry>, script: &str) -> String {
    let mut context = Context::new(Arc::clone(registry)).with_metadata(cli_metadata());
    match interpret(&mut context, script) {
        Ok(result) => truncate_reply(result),
        Err(ScriptError::Apply(err)) => format!("Usage: {}", err.usage()),
        Err(err) => err.to_string(),
    }
}

fn truncate_reply(reply: String) -> String {
    match reply.char_indices().nth(MAX_REPLY_LEN) {
        Some((index, _)) => reply[..index].to_string(),
        None => reply,
    }
}

fn repl(registry: Arc<CommandRegistry>) -> miette::Result<()> {
    let mut editor = DefaultEditor::new().into_diagnostic()?;
    loop {
        match editor.readline(&PROMPT.cyan().to_string()) {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                editor.add_history_entry(line).into_diagnostic()?;
                let mut context =
                    Context::new(Arc::clone(&registry)).with_metadata(cli_metadata());
                match interpret(&mut context, line) {
                    Ok(result) => println!("{}", truncate_reply(result)),
                    Err(ScriptError::Apply(err)) => println!("Usage: {}", err.usage()),
                    Err(err @ ScriptError::Parse(_)) => {
                        // Parse errors get a labeled diagnostic pointing into
                        // the offending script text.
                        let report = miette::Report::new(Error::from_error(line, err));
                        eprintln!("{report:?}");
                    }
                    Err(err) => println!("{err}"),
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(err) => return Err(err).into_diagnostic(),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case::plain("echo hello", "hello")]
    #[case::nested("echo [echo nested] text", "nested text")]
    #[case::apply_error("if true", "Usage: if <condition> <then_value> <else_value>")]
    #[case::unknown("nosuchcmd", "Unknown command name: nosuchcmd")]
    #[case::parse_error("echo [oops", "Missing closing bracket")]
    fn test_run_script_renders_replies(#[case] script: &str, #[case] expected: &str) {
        let registry = Arc::new(build_registry().unwrap());
        assert_eq!(run_script(&registry, script), expected);
    }

    #[test]
    fn test_definitions_survive_between_scripts() {
        let registry = Arc::new(build_registry().unwrap());
        run_script(&registry, "def-command hi {} {echo hello}");
        assert_eq!(run_script(&registry, "hi"), "hello");
    }

    #[test]
    fn test_long_replies_are_truncated() {
        let registry = Arc::new(build_registry().unwrap());
        let reply = run_script(&registry, "repeat 5000 {echo xxxxxxxxxx}");
        assert_eq!(reply.chars().count(), MAX_REPLY_LEN);
    }
}
