//! User-defined commands: a dynamic command group backed by a definition
//! store, plus the admin commands that edit the store.
//!
//! The store is consulted on every lookup, so definitions added or removed
//! at runtime are visible immediately without touching the registry.

use std::mem;
use std::sync::{Arc, Mutex};

use itertools::Itertools;
use smol_str::SmolStr;

use crate::command::{Callable, CommandBinding, CommandResult, Signature};
use crate::context::Environment;
use crate::error::ScriptError;
use crate::eval::interpret;
use crate::registry::{CommandGroup, CommandRegistry};

/// One stored command definition: parameter names and a body script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Definition {
    pub name: SmolStr,
    pub params: Vec<SmolStr>,
    pub script: String,
}

impl Definition {
    pub fn new(name: &str, params: &str, script: &str) -> Result<Self, ScriptError> {
        let params: Vec<SmolStr> = params.split_whitespace().map(SmolStr::new).collect();
        for param in &params {
            if param.contains(' ') || param.contains('{') || param.contains('}') {
                return Err(ScriptError::Command(format!(
                    "Invalid parameter name: \"{param}\""
                )));
            }
        }
        Ok(Self {
            name: SmolStr::new(name),
            params,
            script: script.to_string(),
        })
    }

    fn prettify(&self) -> String {
        let mut result = self.name.to_string();
        for param in &self.params {
            result.push(' ');
            result.push_str(param);
        }
        result.push_str(" => ");
        result.push_str(&self.script);
        result
    }
}

/// Persistence interface for command definitions. Implementations own their
/// locking; the interpreter only sees immutable snapshots.
pub trait DefinitionStore: Send + Sync {
    fn lookup(&self, name: &str) -> Option<Definition>;
    fn list(&self) -> Vec<SmolStr>;
    fn define(&self, definition: Definition) -> Result<(), ScriptError>;
    fn remove(&self, name: &str) -> Result<(), ScriptError>;
}

/// An in-process [`DefinitionStore`], for hosts without persistence and for
/// tests.
#[derive(Default)]
pub struct MemoryStore {
    definitions: Mutex<Vec<Definition>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DefinitionStore for MemoryStore {
    fn lookup(&self, name: &str) -> Option<Definition> {
        self.definitions
            .lock()
            .expect("definition store lock poisoned")
            .iter()
            .find(|definition| definition.name == name)
            .cloned()
    }

    fn list(&self) -> Vec<SmolStr> {
        self.definitions
            .lock()
            .expect("definition store lock poisoned")
            .iter()
            .map(|definition| definition.name.clone())
            .collect()
    }

    fn define(&self, definition: Definition) -> Result<(), ScriptError> {
        self.definitions
            .lock()
            .expect("definition store lock poisoned")
            .push(definition);
        Ok(())
    }

    fn remove(&self, name: &str) -> Result<(), ScriptError> {
        let mut definitions = self
            .definitions
            .lock()
            .expect("definition store lock poisoned");
        match definitions.iter().position(|d| d.name == name) {
            Some(index) => {
                definitions.remove(index);
                Ok(())
            }
            None => Err(ScriptError::Command(format!(
                "Unknown command name: {name}"
            ))),
        }
    }
}

/// A dynamic command group producing bindings from a [`DefinitionStore`] on
/// the fly.
pub struct DefinedCommands {
    store: Arc<dyn DefinitionStore>,
}

impl DefinedCommands {
    pub fn new(store: Arc<dyn DefinitionStore>) -> Self {
        Self { store }
    }

    fn make_binding(definition: Definition) -> CommandBinding {
        let source = format!(
            "def-command {{{}}} {{{}}} {{{}}}",
            definition.name,
            definition.params.iter().join(" "),
            definition.script
        );
        let mut signature = Signature::new();
        for param in &definition.params {
            signature = signature.required(param);
        }
        let params = definition.params;
        let script = definition.script;
        let callable = Callable::contextual(move |context, args| {
            // The body sees only its own parameters, not the caller's
            // variables.
            let environment: Environment = params.iter().cloned().zip(args).collect();
            let saved = mem::replace(&mut context.environment, environment);
            let result = interpret(context, &script);
            context.environment = saved;
            result
        });
        CommandBinding::new(definition.name.as_str(), signature, callable).with_source(source)
    }
}

impl CommandGroup for DefinedCommands {
    fn lookup_command(&self, command_name: &str) -> Option<CommandBinding> {
        self.store.lookup(command_name).map(Self::make_binding)
    }

    fn list_commands(&self) -> Vec<SmolStr> {
        self.store.list()
    }
}

/// Creates the `userdef` admin group (`def-command`, `set-command`,
/// `del-command`) on `registry`, editing `store`.
pub fn register_admin_commands(
    registry: &mut CommandRegistry,
    store: Arc<dyn DefinitionStore>,
) -> Result<(), ScriptError> {
    let cmds = registry.new_command_group("userdef")?;
    cmds.register(
        "def-command",
        Signature::new()
            .required("name")
            .required("params")
            .required("script"),
        Callable::plain({
            let store = Arc::clone(&store);
            move |args| def_command(store.as_ref(), args)
        }),
    );
    cmds.register(
        "set-command",
        Signature::new()
            .required("name")
            .required("params")
            .required("script"),
        Callable::plain({
            let store = Arc::clone(&store);
            move |args| set_command(store.as_ref(), args)
        }),
    );
    cmds.register(
        "del-command",
        Signature::new().required("name"),
        Callable::plain(move |args| del_command(store.as_ref(), args)),
    );
    Ok(())
}

fn def_command(store: &dyn DefinitionStore, args: Vec<String>) -> CommandResult {
    let (name, params, script) = (&args[0], &args[1], &args[2]);
    if store.lookup(name).is_some() {
        return Ok(format!("A command with name \"{name}\" already exists!"));
    }
    let definition = Definition::new(name, params, script)?;
    let pretty = definition.prettify();
    store.define(definition)?;
    Ok(format!("Command added: {pretty}"))
}

fn set_command(store: &dyn DefinitionStore, args: Vec<String>) -> CommandResult {
    let (name, params, script) = (&args[0], &args[1], &args[2]);
    let Some(old) = store.lookup(name) else {
        return Ok(format!("A command with name \"{name}\" doesn't exists!"));
    };
    let definition = Definition::new(name, params, script)?;
    let pretty = definition.prettify();
    store.remove(name)?;
    store.define(definition)?;
    Ok(format!(
        "Command replaced. Now: {pretty} Was: {}",
        old.prettify()
    ))
}

fn del_command(store: &dyn DefinitionStore, args: Vec<String>) -> CommandResult {
    let name = &args[0];
    let Some(old) = store.lookup(name) else {
        return Ok(format!("A command with name \"{name}\" doesn't exists!"));
    };
    store.remove(name)?;
    Ok(format!("Command deleted. Was: {}", old.prettify()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;
    use crate::error::EvalError;

    fn make_context() -> (Context, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let mut registry = CommandRegistry::new();
        crate::builtin::register_builtin_commands(&mut registry).unwrap();
        register_admin_commands(&mut registry, Arc::clone(&store) as Arc<dyn DefinitionStore>)
            .unwrap();
        registry
            .add_command_group(
                "userdefs",
                Arc::new(DefinedCommands::new(
                    Arc::clone(&store) as Arc<dyn DefinitionStore>
                )),
            )
            .unwrap();
        (Context::new(Arc::new(registry)), store)
    }

    #[test]
    fn test_define_and_invoke() {
        let (mut context, _store) = make_context();
        let reply = interpret(&mut context, "def-command greet {who} {echo Hello $who}").unwrap();
        assert_eq!(reply, "Command added: greet who => echo Hello $who");
        assert_eq!(interpret(&mut context, "greet world").unwrap(), "Hello world");
    }

    #[test]
    fn test_defined_command_arity_is_enforced() {
        let (mut context, _store) = make_context();
        interpret(&mut context, "def-command greet {who} {echo Hello $who}").unwrap();
        let err = interpret(&mut context, "greet").unwrap_err();
        let ScriptError::Apply(apply) = err else {
            panic!("expected an apply error, got {err:?}");
        };
        assert_eq!(apply.usage(), "greet <who>");
    }

    #[test]
    fn test_defined_command_body_sees_only_its_params() {
        let (mut context, _store) = make_context();
        interpret(&mut context, "def-command leak {} {echo $outside}").unwrap();
        context
            .environment
            .insert("outside".into(), "secret".to_string());
        assert_eq!(
            interpret(&mut context, "leak").unwrap_err(),
            EvalError::UnboundVariable("outside".into()).into()
        );
    }

    #[test]
    fn test_duplicate_definition_is_reported() {
        let (mut context, _store) = make_context();
        interpret(&mut context, "def-command x {} {echo}").unwrap();
        assert_eq!(
            interpret(&mut context, "def-command x {} {echo}").unwrap(),
            "A command with name \"x\" already exists!"
        );
    }

    #[test]
    fn test_set_command_replaces_definition() {
        let (mut context, _store) = make_context();
        interpret(&mut context, "def-command x {} {echo old}").unwrap();
        let reply = interpret(&mut context, "set-command x {} {echo new}").unwrap();
        assert_eq!(reply, "Command replaced. Now: x => echo new Was: x => echo old");
        assert_eq!(interpret(&mut context, "x").unwrap(), "new");
    }

    #[test]
    fn test_del_command_removes_definition() {
        let (mut context, _store) = make_context();
        interpret(&mut context, "def-command x {} {echo gone}").unwrap();
        assert_eq!(
            interpret(&mut context, "del-command x").unwrap(),
            "Command deleted. Was: x => echo gone"
        );
        assert_eq!(
            interpret(&mut context, "x").unwrap_err(),
            EvalError::UnknownCommand("x".into()).into()
        );
        assert_eq!(
            interpret(&mut context, "del-command x").unwrap(),
            "A command with name \"x\" doesn't exists!"
        );
    }

    #[test]
    fn test_invalid_parameter_name_is_rejected() {
        let (mut context, _store) = make_context();
        assert_eq!(
            interpret(&mut context, "def-command x {a{}b} {echo}").unwrap_err(),
            ScriptError::Command("Invalid parameter name: \"a{}b\"".to_string())
        );
    }

    #[test]
    fn test_source_shows_the_stored_definition() {
        let (mut context, _store) = make_context();
        interpret(&mut context, "def-command greet {who} {echo Hello $who}").unwrap();
        assert_eq!(
            interpret(&mut context, "source greet").unwrap(),
            "def-command {greet} {who} {echo Hello $who}"
        );
    }

    #[test]
    fn test_store_changes_are_visible_without_reregistration() {
        let (mut context, store) = make_context();
        store
            .define(Definition::new("direct", "", "echo from the store").unwrap())
            .unwrap();
        assert_eq!(
            interpret(&mut context, "direct").unwrap(),
            "from the store"
        );
    }

    #[test]
    fn test_recursive_definition_is_reported_not_fatal() {
        let (mut context, _store) = make_context();
        interpret(&mut context, "def-command loop {} {loop}").unwrap();
        let mut context = context.with_max_depth(16);
        assert_eq!(
            interpret(&mut context, "loop").unwrap_err(),
            EvalError::RecursionLimit(16).into()
        );
    }
}
