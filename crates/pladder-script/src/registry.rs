use std::fmt;
use std::sync::{Arc, RwLock};

use smol_str::SmolStr;

use crate::command::{Callable, CommandBinding, NameMatcher, Signature};
use crate::error::{EvalError, ScriptError};

/// A named family of command bindings.
///
/// A group may be a static table ([`TableGroup`]) or a dynamic view that
/// consults external storage on every call (for example
/// [`crate::DefinedCommands`], which fabricates bindings from a definition
/// store per lookup).
pub trait CommandGroup: Send + Sync {
    /// The first binding whose matcher accepts `command_name`, if any.
    fn lookup_command(&self, command_name: &str) -> Option<CommandBinding>;

    /// Display names of every binding in the group.
    fn list_commands(&self) -> Vec<SmolStr>;
}

/// A static command table scanned in registration order.
///
/// The table is locked internally so plugins can keep a handle and add or
/// remove bindings while other evaluations are looking commands up.
#[derive(Default)]
pub struct TableGroup {
    commands: RwLock<Vec<CommandBinding>>,
}

impl TableGroup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a command under an exact name.
    pub fn register(&self, name: &str, signature: Signature, callable: Callable) {
        self.register_binding(CommandBinding::new(name, signature, callable));
    }

    /// Registers a command answering to every name the pattern accepts.
    pub fn register_pattern(
        &self,
        pattern: &str,
        signature: Signature,
        callable: Callable,
    ) -> Result<(), ScriptError> {
        let matcher = NameMatcher::pattern(pattern)?;
        self.register_binding(CommandBinding::new(matcher, signature, callable));
        Ok(())
    }

    pub fn register_binding(&self, binding: CommandBinding) {
        self.commands
            .write()
            .expect("command table lock poisoned")
            .push(binding);
    }

    pub fn remove_command(&self, command_name: &str) -> Result<(), ScriptError> {
        let mut commands = self.commands.write().expect("command table lock poisoned");
        match commands.iter().position(|c| c.name_matches(command_name)) {
            Some(index) => {
                commands.remove(index);
                Ok(())
            }
            None => Err(EvalError::UnknownCommand(command_name.into()).into()),
        }
    }
}

impl CommandGroup for TableGroup {
    fn lookup_command(&self, command_name: &str) -> Option<CommandBinding> {
        self.commands
            .read()
            .expect("command table lock poisoned")
            .iter()
            .find(|command| command.name_matches(command_name))
            .cloned()
    }

    fn list_commands(&self) -> Vec<SmolStr> {
        self.commands
            .read()
            .expect("command table lock poisoned")
            .iter()
            .map(|command| command.display_name().clone())
            .collect()
    }
}

/// An ordered collection of uniquely named command groups.
///
/// Groups are added once at startup; lookups scan them in registration
/// order and the first match wins. The registry is owned explicitly and
/// threaded through every [`crate::Context`] behind an `Arc`; there is no
/// process-wide binding list.
#[derive(Default)]
pub struct CommandRegistry {
    groups: Vec<(SmolStr, Arc<dyn CommandGroup>)>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an existing group under a unique name. A duplicate name is a
    /// configuration defect and fails.
    pub fn add_command_group(
        &mut self,
        group_name: &str,
        group: Arc<dyn CommandGroup>,
    ) -> Result<(), ScriptError> {
        if self.groups.iter().any(|(name, _)| name == group_name) {
            return Err(ScriptError::Registry(format!(
                "Group {group_name} already registered"
            )));
        }
        self.groups.push((SmolStr::new(group_name), group));
        Ok(())
    }

    /// Creates, registers and returns a fresh static table group.
    pub fn new_command_group(&mut self, group_name: &str) -> Result<Arc<TableGroup>, ScriptError> {
        let group = Arc::new(TableGroup::new());
        self.add_command_group(group_name, Arc::clone(&group) as Arc<dyn CommandGroup>)?;
        Ok(group)
    }

    pub fn lookup_command(&self, command_name: &str) -> Option<CommandBinding> {
        self.groups
            .iter()
            .find_map(|(_, group)| group.lookup_command(command_name))
    }

    pub fn lookup_group(&self, group_name: &str) -> Option<Arc<dyn CommandGroup>> {
        self.groups
            .iter()
            .find(|(name, _)| name == group_name)
            .map(|(_, group)| Arc::clone(group))
    }

    pub fn list_commands(&self) -> Vec<SmolStr> {
        self.groups
            .iter()
            .flat_map(|(_, group)| group.list_commands())
            .collect()
    }

    pub fn list_groups(&self) -> Vec<SmolStr> {
        self.groups.iter().map(|(name, _)| name.clone()).collect()
    }
}

impl fmt::Debug for CommandRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandRegistry")
            .field("groups", &self.list_groups())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn echo_callable() -> Callable {
        Callable::plain(|args| Ok(args.into_iter().next().unwrap_or_default()))
    }

    #[test]
    fn test_group_names_are_unique() {
        let mut registry = CommandRegistry::new();
        registry.new_command_group("builtin").unwrap();
        assert!(matches!(
            registry.new_command_group("builtin"),
            Err(ScriptError::Registry(_))
        ));
    }

    #[test]
    fn test_lookup_scans_groups_in_registration_order() {
        let mut registry = CommandRegistry::new();
        let first = registry.new_command_group("first").unwrap();
        let second = registry.new_command_group("second").unwrap();

        first.register(
            "cmd",
            Signature::new(),
            Callable::plain(|_| Ok("from first".to_string())),
        );
        second.register(
            "cmd",
            Signature::new(),
            Callable::plain(|_| Ok("from second".to_string())),
        );

        let binding = registry.lookup_command("cmd").unwrap();
        assert_eq!(binding.display_name(), "cmd");
        // Same group order as registration.
        assert_eq!(registry.list_groups(), vec!["first", "second"]);
    }

    #[test]
    fn test_first_matching_binding_wins_within_a_group() {
        let group = TableGroup::new();
        group
            .register_pattern("kloo+fify", Signature::new().required("text"), echo_callable())
            .unwrap();
        group.register("kloofify", Signature::new().required("text"), echo_callable());

        let binding = group.lookup_command("kloofify").unwrap();
        assert_eq!(binding.display_name(), "/kloo+fify/");
    }

    #[test]
    fn test_remove_command() {
        let group = TableGroup::new();
        group.register("echo", Signature::new().optional("text", "").varargs(), echo_callable());
        assert!(group.lookup_command("echo").is_some());

        group.remove_command("echo").unwrap();
        assert!(group.lookup_command("echo").is_none());
        assert!(group.remove_command("echo").is_err());
    }

    #[test]
    fn test_list_commands_spans_groups() {
        let mut registry = CommandRegistry::new();
        let a = registry.new_command_group("a").unwrap();
        let b = registry.new_command_group("b").unwrap();
        a.register("one", Signature::new(), echo_callable());
        b.register("two", Signature::new(), echo_callable());

        assert_eq!(registry.list_commands(), vec!["one", "two"]);
    }
}
