//! Command and Condition Definitions
//!
//! A command is the unit a language is built from. Each command carries a
//! name, an optional list of parameter labels and a capability set of
//! optional hooks:
//!
//! ```text
//! install   fn(&mut Code)                              once per new program
//! init      fn(&mut Code, RuleId, Option<&Param>)      once per compiled line
//! run       fn(&mut Code, Option<&Param>)              every time the rule executes
//! ```
//!
//! Conditions are commands with `is_condition` set. Their `init` hook always
//! starts with the readiness bookkeeping (see [`Language::define_condition`]).
//!
//! [`Language::define_condition`]: super::Language::define_condition

use super::code::Code;
use super::rule::RuleId;
use std::fmt;
use std::sync::Arc;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Hook run once when a program is created.
pub type InstallHook = Arc<dyn Fn(&mut Code) + Send + Sync>;

/// Hook run once for every compiled line, after its rule is closed.
pub type InitHook = Arc<dyn Fn(&mut Code, RuleId, Option<&Param>) + Send + Sync>;

/// Hook run every time the owning rule executes.
pub type RunHook = Arc<dyn Fn(&mut Code, Option<&Param>) + Send + Sync>;

/// Resolved line parameter.
///
/// Raw genome parameters are numbers. Commands that declare a label list get
/// the label at `number % labels.len()` instead.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Param {
    Number(u64),
    Label(String),
}

impl Param {
    pub fn as_number(&self) -> Option<u64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Label(_) => None,
        }
    }

    pub fn as_label(&self) -> Option<&str> {
        match self {
            Self::Number(_) => None,
            Self::Label(label) => Some(label),
        }
    }
}

impl fmt::Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{}", n),
            Self::Label(label) => f.write_str(label),
        }
    }
}

impl From<u64> for Param {
    fn from(value: u64) -> Self {
        Self::Number(value)
    }
}

impl From<&str> for Param {
    fn from(value: &str) -> Self {
        Self::Label(value.to_string())
    }
}

impl From<String> for Param {
    fn from(value: String) -> Self {
        Self::Label(value)
    }
}

/// Command or condition descriptor.
///
/// Built with chaining setters and handed to
/// [`Language::define_command`](super::Language::define_command), which
/// assigns the name.
#[derive(Clone, Default)]
pub struct CommandDef {
    name: String,
    params: Option<Vec<String>>,
    is_condition: bool,
    position: Option<usize>,
    install: Option<InstallHook>,
    init: Option<InitHook>,
    run: Option<RunHook>,
    separator: bool,
}

impl CommandDef {
    /// Empty definition: no labels, no hooks.
    pub fn new() -> Self {
        Self::default()
    }

    /// Definition with only a `run` hook.
    pub fn runnable<F>(run: F) -> Self
    where
        F: Fn(&mut Code, Option<&Param>) + Send + Sync + 'static,
    {
        Self::new().on_run(run)
    }

    /// Built-in rule separator. Only [`Language::new`](super::Language::new) creates it.
    pub(crate) fn separator() -> Self {
        Self {
            name: super::SEPARATOR_NAME.to_string(),
            separator: true,
            ..Self::default()
        }
    }

    /// Declare parameter labels. Raw parameters wrap around this list.
    pub fn params<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.params = Some(labels.into_iter().map(Into::into).collect());
        self
    }

    /// Insert at this list position instead of appending.
    pub fn position(mut self, position: usize) -> Self {
        self.position = Some(position);
        self
    }

    pub fn on_install<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut Code) + Send + Sync + 'static,
    {
        self.install = Some(Arc::new(hook));
        self
    }

    pub fn on_init<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut Code, RuleId, Option<&Param>) + Send + Sync + 'static,
    {
        self.init = Some(Arc::new(hook));
        self
    }

    pub fn on_run<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut Code, Option<&Param>) + Send + Sync + 'static,
    {
        self.run = Some(Arc::new(hook));
        self
    }

    pub(crate) fn set_name(&mut self, name: &str) {
        self.name = name.to_string();
    }

    pub(crate) fn set_condition(&mut self) {
        self.is_condition = true;
    }

    pub(crate) fn set_init(&mut self, hook: InitHook) {
        self.init = Some(hook);
    }

    pub(crate) fn take_position(&mut self) -> Option<usize> {
        self.position.take()
    }

    pub(crate) fn take_init(&mut self) -> Option<InitHook> {
        self.init.take()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared labels, if any.
    pub fn labels(&self) -> Option<&[String]> {
        self.params.as_deref().filter(|labels| !labels.is_empty())
    }

    pub fn is_condition(&self) -> bool {
        self.is_condition
    }

    pub fn is_separator(&self) -> bool {
        self.separator
    }

    pub fn install_hook(&self) -> Option<&InstallHook> {
        self.install.as_ref()
    }

    pub fn init_hook(&self) -> Option<&InitHook> {
        self.init.as_ref()
    }

    pub fn run_hook(&self) -> Option<&RunHook> {
        self.run.as_ref()
    }

    /// Map a raw genome parameter onto this command's labels.
    pub fn resolve_param(&self, raw: u64) -> Param {
        match self.labels() {
            Some(labels) => {
                let idx = (raw % labels.len() as u64) as usize;
                Param::Label(labels[idx].clone())
            }
            None => Param::Number(raw),
        }
    }

    /// Index of `label` in the declared label list.
    pub fn label_index(&self, label: &str) -> Option<usize> {
        self.labels()?.iter().position(|l| l == label)
    }
}

impl fmt::Debug for CommandDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut hooks = Vec::new();
        if self.install.is_some() {
            hooks.push("install");
        }
        if self.init.is_some() {
            hooks.push("init");
        }
        if self.run.is_some() {
            hooks.push("run");
        }
        f.debug_struct("CommandDef")
            .field("name", &self.name)
            .field("params", &self.params)
            .field("is_condition", &self.is_condition)
            .field("hooks", &hooks)
            .finish()
    }
}

/// One compiled line of a rule: a command and its resolved parameter.
#[derive(Clone)]
pub struct Line {
    pub command: Arc<CommandDef>,
    pub param: Option<Param>,
}

impl Line {
    pub fn new(command: Arc<CommandDef>, param: Option<Param>) -> Self {
        Self { command, param }
    }

    pub fn name(&self) -> &str {
        self.command.name()
    }

    pub fn is_condition(&self) -> bool {
        self.command.is_condition()
    }
}

impl PartialEq for Line {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.command, &other.command) && self.param == other.param
    }
}

impl fmt::Debug for Line {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.param {
            Some(param) => write!(f, "{} {}", self.command.name(), param),
            None => f.write_str(self.command.name()),
        }
    }
}
