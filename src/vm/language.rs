//! Languages - ordered command lists
//!
//! A language is an ordered list of commands plus a name lookup. The list
//! order IS the opcode table: two languages with the same commands in a
//! different order decode the same genome differently.
//!
//! ```text
//! slot 0        separator (built-in, closes the current rule)
//! slot 1..N     user commands and conditions, in definition order
//! ```
//!
//! Languages own no runtime state. Compiling a genome creates a [`Code`].

use super::code::Code;
use super::command::{CommandDef, InitHook, Param};
use super::rule::RuleId;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// An Evolu language.
#[derive(Clone)]
pub struct Language {
    name: String,
    /// Opcode table, separator first.
    list: Vec<Arc<CommandDef>>,
    /// Name → most recent definition with that name.
    commands: HashMap<String, Arc<CommandDef>>,
}

impl Language {
    /// Create a language holding only the separator.
    pub fn new(name: impl Into<String>) -> Self {
        let separator = Arc::new(CommandDef::separator());
        let mut commands = HashMap::new();
        commands.insert(separator.name().to_string(), separator.clone());
        Self {
            name: name.into(),
            list: vec![separator],
            commands,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Add command `name`.
    ///
    /// Appends unless the definition carries a position. Positions are
    /// clamped to `1..=len` so the separator keeps slot 0. A name that is
    /// already defined is shadowed in the lookup; both stay in the list.
    pub fn define_command(&mut self, name: &str, mut def: CommandDef) -> &mut Self {
        def.set_name(name);
        let position = def.take_position();
        let def = Arc::new(def);

        if self.commands.insert(name.to_string(), def.clone()).is_some() {
            log::warn!(
                "command '{}' in language '{}' shadows an earlier definition",
                name,
                self.name,
            );
        }

        match position {
            Some(pos) => {
                let pos = pos.clamp(1, self.list.len());
                self.list.insert(pos, def);
            }
            None => self.list.push(def),
        }
        self
    }

    /// Add condition `name`.
    ///
    /// The condition's `init` always registers the line with the program's
    /// condition index first, then runs the user hook (if any).
    pub fn define_condition(&mut self, name: &str, mut def: CommandDef) -> &mut Self {
        def.set_condition();
        let user = def.take_init();
        let key = name.to_string();
        let init: InitHook = Arc::new(move |code: &mut Code, rule: RuleId, param: Option<&Param>| {
            code.index_condition(rule, &key, param);
            if let Some(user) = &user {
                user(code, rule, param);
            }
        });
        def.set_init(init);
        self.define_command(name, def)
    }

    /// Apply a command package.
    pub fn add<F>(&mut self, package: F) -> &mut Self
    where
        F: FnOnce(&mut Language),
    {
        package(self);
        self
    }

    /// Opcode table, separator first.
    pub fn commands(&self) -> &[Arc<CommandDef>] {
        &self.list
    }

    /// Current definition for `name`.
    pub fn command(&self, name: &str) -> Option<&Arc<CommandDef>> {
        self.commands.get(name)
    }

    /// First opcode slot holding a command called `name`.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.list.iter().position(|cmd| cmd.name() == name)
    }

    /// Command for an opcode. Opcodes wrap around the table.
    pub fn resolve(&self, opcode: u64) -> &Arc<CommandDef> {
        let idx = (opcode % self.list.len() as u64) as usize;
        &self.list[idx]
    }

    /// Number of opcode slots, separator included.
    pub fn len(&self) -> usize {
        self.list.len()
    }

    /// A language always holds the separator.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Definitions reachable by name, in table order.
    pub(crate) fn reachable(&self) -> impl Iterator<Item = &Arc<CommandDef>> {
        self.list.iter().filter(move |cmd| {
            self.commands
                .get(cmd.name())
                .is_some_and(|current| Arc::ptr_eq(current, cmd))
        })
    }

    /// Compile a genome into a program.
    pub fn compile(self: &Arc<Self>, bytes: &[u8]) -> Code {
        Code::from_genome(self.clone(), bytes)
    }
}

impl fmt::Debug for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.list.iter().map(|cmd| cmd.name()).collect();
        write!(f, "Language({:?} {:?})", self.name, names)
    }
}
