use std::mem;

use smol_str::SmolStr;

use crate::ast::{Call, Fragment};
use crate::command::{Callable, CommandBinding};
use crate::context::{Context, TraceEntry};
use crate::error::{ApplyError, EvalError, ScriptError};
use crate::parser::parse;

/// Parses and evaluates one script against the given context.
///
/// Appends one [`TraceEntry`] per directly evaluated command to
/// `context.trace` as a side effect.
pub fn interpret(context: &mut Context, script: &str) -> Result<String, ScriptError> {
    let call = parse(script)?;
    eval_call(context, &call)
}

/// Evaluates a parsed call.
///
/// A zero-word call is `""` straight away: no lookup, no trace entry.
pub fn eval_call(context: &mut Context, call: &Call) -> Result<String, ScriptError> {
    if call.words.is_empty() {
        return Ok(String::new());
    }
    context.enter_call()?;
    let result = eval_words(context, call);
    context.exit_call();
    result
}

fn eval_words(context: &mut Context, call: &Call) -> Result<String, ScriptError> {
    // Argument sub-calls and the command's own callable record into the same
    // fresh list, which ends up as the subtrace of this call's entry.
    let mut subtrace: Vec<TraceEntry> = Vec::new();
    match try_eval_words(context, call, &mut subtrace) {
        Ok(result) => Ok(result),
        Err(err) => {
            // No entry of their own exists for this call, so keep any
            // already-recorded nested invocations visible to the caller.
            context.trace.append(&mut subtrace);
            Err(err)
        }
    }
}

fn try_eval_words(
    context: &mut Context,
    call: &Call,
    subtrace: &mut Vec<TraceEntry>,
) -> Result<String, ScriptError> {
    let mut evaled_words = Vec::with_capacity(call.words.len());
    for word in &call.words {
        let mut evaled_word = String::new();
        for fragment in &word.fragments {
            match fragment {
                Fragment::Literal(text) => evaled_word.push_str(text),
                Fragment::Variable(name) => match context.environment.get(name) {
                    Some(value) => evaled_word.push_str(value),
                    None => return Err(EvalError::UnboundVariable(name.clone()).into()),
                },
                Fragment::Call(sub_call) => {
                    let saved = mem::replace(&mut context.trace, mem::take(subtrace));
                    let result = eval_call(context, sub_call);
                    *subtrace = mem::replace(&mut context.trace, saved);
                    evaled_word.push_str(&result?);
                }
            }
        }
        evaled_words.push(evaled_word);
    }

    let mut evaled_words = evaled_words.into_iter();
    let Some(command_name) = evaled_words.next().map(SmolStr::from) else {
        return Ok(String::new());
    };
    let arguments: Vec<String> = evaled_words.collect();

    let Some(command) = context.commands.lookup_command(&command_name) else {
        return Err(EvalError::UnknownCommand(command_name).into());
    };

    let saved_name = mem::replace(&mut context.command_name, command_name.clone());
    let saved_trace = mem::replace(&mut context.trace, mem::take(subtrace));
    let result = apply_call(context, &command, &command_name, &arguments);
    *subtrace = mem::replace(&mut context.trace, saved_trace);
    context.command_name = saved_name;

    context.trace.push(TraceEntry {
        command,
        command_name,
        arguments,
        subtrace: mem::take(subtrace),
        result: result.clone(),
    });
    result
}

/// Binds `arguments` against the command's declared shape and invokes its
/// callable. Callable failures propagate unmodified.
pub fn apply_call(
    context: &mut Context,
    command: &CommandBinding,
    command_name: &str,
    arguments: &[String],
) -> Result<String, ScriptError> {
    let bound = match command.signature().bind(arguments) {
        Ok(bound) => bound,
        Err(collapsed) => {
            return Err(ApplyError {
                command: command.clone(),
                command_name: command_name.into(),
                arguments: collapsed,
            }
            .into());
        }
    };
    match command.callable() {
        Callable::Plain(f) => f(bound),
        Callable::Contextual(f) => f(context, bound),
    }
}
