//! The `builtin` command group: string and argument helpers plus the
//! commands intertwined with the interpreter itself (`eval`, `let`,
//! `trace`, ...).

use std::mem;
use std::sync::Arc;

use itertools::Itertools;
use smol_str::SmolStr;

use crate::command::{Callable, CommandResult, Signature};
use crate::context::Context;
use crate::error::{EvalError, ScriptError};
use crate::eval::{apply_call, interpret};
use crate::parser::escape;
use crate::registry::{CommandRegistry, TableGroup};
use crate::trace::{TraceMode, render_trace};

/// Creates the `builtin` group on `registry` and returns a handle to it.
pub fn register_builtin_commands(
    registry: &mut CommandRegistry,
) -> Result<Arc<TableGroup>, ScriptError> {
    let cmds = registry.new_command_group("builtin")?;
    // Strings
    cmds.register(
        "echo",
        Signature::new().optional("text", "").varargs(),
        Callable::plain(|args| Ok(args.into_iter().next().unwrap_or_default())),
    );
    cmds.register(
        "concat",
        Signature::new().rest("args"),
        Callable::plain(|args| Ok(args.iter().map(|arg| arg.trim()).join(" "))),
    );
    cmds.register(
        "escape",
        Signature::new().optional("text", "").varargs(),
        Callable::plain(|args| Ok(escape(&args[0]))),
    );
    // Booleans
    cmds.register(
        "=",
        Signature::new().required("value1").required("value2"),
        Callable::plain(|args| Ok(bool_to_script(args[0] == args[1]))),
    );
    cmds.register(
        "/=",
        Signature::new().required("value1").required("value2"),
        Callable::plain(|args| Ok(bool_to_script(args[0] != args[1]))),
    );
    cmds.register(
        "bool",
        Signature::new().required("value"),
        Callable::plain(|args| Ok(bool_to_script(bool_from_script(&args[0])?))),
    );
    cmds.register(
        "if",
        Signature::new()
            .required("condition")
            .required("then_value")
            .required("else_value"),
        Callable::plain(|args| {
            let index = if bool_from_script(&args[0])? { 1 } else { 2 };
            Ok(args[index].clone())
        }),
    );
    // Integers
    cmds.register(
        "random-range",
        Signature::new()
            .required("start")
            .required("exl_end")
            .optional("step", "1"),
        Callable::plain(random_range),
    );
    // Arguments
    cmds.register(
        "first",
        Signature::new().rest("args"),
        Callable::plain(|args| {
            args.first()
                .cloned()
                .ok_or_else(|| ScriptError::Command("first: no arguments given".to_string()))
        }),
    );
    cmds.register(
        "last",
        Signature::new().rest("args"),
        Callable::plain(|args| {
            args.last()
                .cloned()
                .ok_or_else(|| ScriptError::Command("last: no arguments given".to_string()))
        }),
    );
    cmds.register(
        "nth",
        Signature::new().required("index").rest("args"),
        Callable::plain(nth),
    );
    cmds.register(
        "pick",
        Signature::new().rest("args"),
        Callable::plain(|args| {
            if args.is_empty() {
                Ok(String::new())
            } else {
                Ok(args[rand::random_range(0..args.len())].clone())
            }
        }),
    );
    cmds.register("wpick", Signature::new().rest("args"), Callable::plain(wpick));
    // Intertwined with the interpreter
    cmds.register(
        "eval",
        Signature::new().required("script"),
        Callable::contextual(|context, args| interpret(context, &args[0])),
    );
    cmds.register(
        "eval-pick",
        Signature::new().rest("args"),
        Callable::contextual(|context, args| {
            let script = if args.is_empty() {
                String::new()
            } else {
                args[rand::random_range(0..args.len())].clone()
            };
            interpret(context, &script)
        }),
    );
    cmds.register(
        "comp",
        Signature::new().required("command1").rest("command2"),
        Callable::contextual(|context, args| {
            let command2_result = apply_words(context, args[1..].to_vec())?;
            apply_words(context, vec![args[0].clone(), command2_result])
        }),
    );
    cmds.register(
        "repeat",
        Signature::new().required("count").required("script"),
        Callable::contextual(repeat),
    );
    cmds.register(
        "let",
        Signature::new().rest("args"),
        Callable::contextual(let_command),
    );
    // Documentation
    cmds.register(
        "version",
        Signature::new(),
        Callable::plain(|_| Ok(env!("CARGO_PKG_VERSION").to_string())),
    );
    cmds.register(
        "help",
        Signature::new().optional("type", "").optional("name", ""),
        Callable::contextual(help),
    );
    cmds.register(
        "source",
        Signature::new().required("command_name"),
        Callable::contextual(|context, args| {
            Ok(match context.commands.lookup_command(&args[0]) {
                Some(command) => command.source().to_string(),
                None => format!("Unknown command name: {}", args[0]),
            })
        }),
    );
    // Debugging
    cmds.register(
        "show-args",
        Signature::new().rest("args"),
        Callable::plain(|args| Ok(format!("{args:?}"))),
    );
    cmds.register(
        "show-context",
        Signature::new(),
        Callable::contextual(|context, _args| {
            Ok(format!(
                "{{commands: ..., metadata: {:?}, command_name: {:?}}}",
                context.metadata, context.command_name
            ))
        }),
    );
    cmds.register(
        "trace",
        Signature::new().required("mode").required("script"),
        Callable::contextual(trace),
    );
    Ok(cmds)
}

fn bool_to_script(value: bool) -> String {
    if value { "true" } else { "false" }.to_string()
}

fn bool_from_script(text: &str) -> Result<bool, ScriptError> {
    match text {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(ScriptError::Command(format!(
            "Expected \"true\" or \"false\", got \"{text}\""
        ))),
    }
}

fn parse_int(text: &str) -> Result<i64, ScriptError> {
    text.trim()
        .parse()
        .map_err(|_| ScriptError::Command(format!("Not a number: {text}")))
}

fn random_range(args: Vec<String>) -> CommandResult {
    let start = parse_int(&args[0])?;
    let end = parse_int(&args[1])?;
    let step = parse_int(&args[2])?;
    if step == 0 {
        return Err(ScriptError::Command(
            "random-range: step must not be zero".to_string(),
        ));
    }
    let span = if step > 0 { end - start } else { start - end };
    let count = (span + step.abs() - 1).div_euclid(step.abs());
    if count <= 0 {
        return Err(ScriptError::Command("random-range: empty range".to_string()));
    }
    Ok((start + rand::random_range(0..count) * step).to_string())
}

fn nth(args: Vec<String>) -> CommandResult {
    let index = parse_int(&args[0])?;
    let rest = &args[1..];
    if index < 0 || index as usize >= rest.len() {
        return Err(ScriptError::Command("nth: index out of range".to_string()));
    }
    Ok(rest[index as usize].clone())
}

fn wpick(args: Vec<String>) -> CommandResult {
    if args.len() % 2 != 0 {
        return Err(ScriptError::Command(
            "Got an odd number of elements".to_string(),
        ));
    }
    let mut weights = Vec::with_capacity(args.len() / 2);
    let mut values = Vec::with_capacity(args.len() / 2);
    for (weight, value) in args.iter().tuples() {
        let weight = parse_int(weight)?;
        if weight < 0 {
            return Err(ScriptError::Command(format!("Negative weight: {weight}")));
        }
        weights.push(weight as u64);
        values.push(value);
    }
    let total: u64 = weights.iter().sum();
    if total == 0 {
        return Err(ScriptError::Command(
            "Total of weights must be greater than zero".to_string(),
        ));
    }
    let mut remaining = rand::random_range(0..total);
    for (weight, value) in weights.iter().zip(&values) {
        if remaining < *weight {
            return Ok(value.to_string());
        }
        remaining -= weight;
    }
    unreachable!("total weight covers every pick")
}

/// Looks a command up and applies it directly, without recording a trace
/// entry. Backs `comp`.
fn apply_words(context: &mut Context, words: Vec<String>) -> CommandResult {
    let mut words = words.into_iter();
    let Some(command_name) = words.next().map(SmolStr::from) else {
        return Ok(String::new());
    };
    let arguments: Vec<String> = words.collect();
    let Some(command) = context.commands.lookup_command(&command_name) else {
        return Err(EvalError::UnknownCommand(command_name).into());
    };
    let saved_name = mem::replace(&mut context.command_name, command_name.clone());
    let result = apply_call(context, &command, &command_name, &arguments);
    context.command_name = saved_name;
    result
}

fn repeat(context: &mut Context, args: Vec<String>) -> CommandResult {
    let count = parse_int(&args[0])?;
    let mut texts = Vec::new();
    for _ in 0..count.max(0) {
        texts.push(interpret(context, &args[1])?);
    }
    Ok(texts.join("   "))
}

fn let_command(context: &mut Context, args: Vec<String>) -> CommandResult {
    if args.len() % 2 != 1 {
        return Err(ScriptError::Command(
            "Let accepts an odd number of arguments (name-value pairs and a body)".to_string(),
        ));
    }
    let (body, bindings) = args.split_last().expect("checked above: args is odd-length");
    let mut environment = context.environment.clone();
    for (name, value) in bindings.iter().tuples() {
        environment.insert(SmolStr::new(name), value.clone());
    }
    let saved = mem::replace(&mut context.environment, environment);
    let result = interpret(context, body);
    context.environment = saved;
    result
}

fn help(context: &mut Context, args: Vec<String>) -> CommandResult {
    let mut kind = args[0].clone();
    let mut name = args[1].clone();
    if !kind.is_empty() && !kind.starts_with('-') {
        name = mem::replace(&mut kind, "-command".to_string());
    }
    match kind.as_str() {
        "-group" if name.is_empty() => {
            let mut groups = context.commands.list_groups();
            groups.sort();
            Ok(format!(
                "Command groups ({}): {}",
                groups.len(),
                groups.iter().join(", ")
            ))
        }
        "-group" => match context.commands.lookup_group(&name) {
            None => Ok(format!("Unknown group: {name}")),
            Some(group) => {
                let mut command_names = group.list_commands();
                command_names.sort();
                Ok(format!(
                    "Commands in {name} group ({}): {}",
                    command_names.len(),
                    command_names.iter().join(", ")
                ))
            }
        },
        "-command" if name.is_empty() => {
            let mut command_names = context.commands.list_commands();
            command_names.sort();
            Ok(format!(
                "Commands ({}): {}",
                command_names.len(),
                command_names.iter().join(", ")
            ))
        }
        "-command" => match context.commands.lookup_command(&name) {
            None => Ok(format!("Unknown command: {name}")),
            Some(command) => Ok(format!("Usage: {}", command.usage())),
        },
        _ => Ok([
            "Usage: help (-group|-command) [name]",
            "List groups: help -group",
            "List commands in group: help -group <name>",
            "Show usage of command: help [-command] <name>",
        ]
        .join("   ")),
    }
}

fn trace(context: &mut Context, args: Vec<String>) -> CommandResult {
    let Some(mode) = TraceMode::from_flag(&args[0]) else {
        return Ok("Mode must be one of: -brief, -results, -full".to_string());
    };
    let mut subcontext =
        Context::new(Arc::clone(&context.commands)).with_metadata(context.metadata.clone());
    // The outcome does not matter here; failed invocations show up in the
    // trace with their error.
    let _ = interpret(&mut subcontext, &args[1]);
    Ok(render_trace(&subcontext.trace, mode))
}
