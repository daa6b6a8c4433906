//! Code - a compiled Evolu program
//!
//! Owns the rules compiled from one genome and drives them as a reactive
//! engine:
//!
//! ```text
//! on/off(condition)  →  rule balance ∓ n    →  pending add/remove (staged)
//! run()              →  flush pending into active  →  execute active rules
//! init()             →  flush pending  →  execute initializer rules once
//! ```
//!
//! Activation changes requested while rules execute are staged and only
//! applied by the next `run()`, so every call is exactly one step.

use super::binary::{self, encode_opcode, encode_param, Envelope};
use super::command::{InstallHook, Line, Param};
use super::events::{Arg, EventBus, Listener};
use super::language::Language;
use super::rule::{Rule, RuleId, Transition};
use crate::error::{EvoluError, Result};
use std::any::{Any, TypeId};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

/// Condition index key: condition name plus optional parameter.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConditionKey {
    pub name: String,
    pub param: Option<Param>,
}

impl ConditionKey {
    pub fn new(name: &str, param: Option<&Param>) -> Self {
        Self {
            name: name.to_string(),
            param: param.cloned(),
        }
    }
}

/// Line description for [`Code::rule`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineSpec {
    pub command: String,
    pub param: Option<Param>,
}

impl From<&str> for LineSpec {
    fn from(command: &str) -> Self {
        Self {
            command: command.to_string(),
            param: None,
        }
    }
}

impl From<(&str, u64)> for LineSpec {
    fn from((command, param): (&str, u64)) -> Self {
        Self {
            command: command.to_string(),
            param: Some(Param::Number(param)),
        }
    }
}

impl From<(&str, &str)> for LineSpec {
    fn from((command, label): (&str, &str)) -> Self {
        Self {
            command: command.to_string(),
            param: Some(Param::from(label)),
        }
    }
}

impl From<(&str, Param)> for LineSpec {
    fn from((command, param): (&str, Param)) -> Self {
        Self {
            command: command.to_string(),
            param: Some(param),
        }
    }
}

/// Staged activation changes. An id sits in at most one list; the latest
/// request wins.
#[derive(Debug, Default)]
struct PendingChanges {
    add: Vec<RuleId>,
    remove: Vec<RuleId>,
}

impl PendingChanges {
    fn add(&mut self, id: RuleId) {
        self.remove.retain(|r| *r != id);
        if !self.add.contains(&id) {
            self.add.push(id);
        }
    }

    fn remove(&mut self, id: RuleId) {
        self.add.retain(|r| *r != id);
        if !self.remove.contains(&id) {
            self.remove.push(id);
        }
    }

    fn is_empty(&self) -> bool {
        self.add.is_empty() && self.remove.is_empty()
    }
}

/// A program compiled against one language.
pub struct Code {
    language: Arc<Language>,
    /// Genome, or the bytes accumulated by [`Code::rule`].
    bytes: Vec<u8>,
    rules: Vec<Rule>,
    conditions: HashMap<ConditionKey, Vec<RuleId>>,
    active: BTreeSet<RuleId>,
    pending: PendingChanges,
    events: EventBus,
    /// Per-program state owned by command packs.
    state: HashMap<TypeId, Box<dyn Any>>,
    /// Rule and line index being initialized or executed.
    current: Option<(RuleId, usize)>,
    initialized: bool,
}

impl Code {
    /// Empty program. Runs every reachable command's install hook.
    pub fn new(language: Arc<Language>) -> Self {
        let installs: Vec<InstallHook> = language
            .reachable()
            .filter_map(|cmd| cmd.install_hook().cloned())
            .collect();

        let mut code = Self {
            language,
            bytes: Vec::new(),
            rules: Vec::new(),
            conditions: HashMap::new(),
            active: BTreeSet::new(),
            pending: PendingChanges::default(),
            events: EventBus::new(),
            state: HashMap::new(),
            current: None,
            initialized: false,
        };
        for install in installs {
            install(&mut code);
        }
        code
    }

    pub(crate) fn from_genome(language: Arc<Language>, bytes: &[u8]) -> Self {
        let decoded = binary::decode(&language, bytes);
        let mut code = Self::new(language);
        code.bytes = bytes.to_vec();
        for lines in decoded {
            code.add_rule(lines);
        }
        log::debug!(
            "compiled {} bytes of '{}' into {} rules",
            bytes.len(),
            code.language.name(),
            code.rules.len(),
        );
        code
    }

    pub fn language(&self) -> &Arc<Language> {
        &self.language
    }

    /// Genome bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Rules in id order.
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn rule_at(&self, id: RuleId) -> Option<&Rule> {
        self.rules.get(id.0)
    }

    /// Program envelope text, `EVOLU:<language>:<genome>`.
    pub fn to_source(&self) -> String {
        Envelope::new(self.language.name(), self.bytes.clone()).to_source()
    }

    // =========================================================================
    // Rule construction
    // =========================================================================

    /// Add a rule from line descriptions and append its genome encoding.
    ///
    /// ```ignore
    /// code.rule(["if_a", ("b", "two").into()])?;
    /// ```
    pub fn rule<I>(&mut self, lines: I) -> Result<RuleId>
    where
        I: IntoIterator,
        I::Item: Into<LineSpec>,
    {
        let mut bytes = Vec::new();
        let mut compiled = Vec::new();

        for spec in lines.into_iter().map(Into::into) {
            let position = self
                .language
                .position(&spec.command)
                .filter(|&pos| !self.language.commands()[pos].is_separator())
                .ok_or_else(|| {
                    log::warn!(
                        "rule references unknown command '{}' in language '{}'",
                        spec.command,
                        self.language.name(),
                    );
                    EvoluError::UnknownCommand {
                        language: self.language.name().to_string(),
                        command: spec.command.clone(),
                    }
                })?;
            let command = self.language.commands()[position].clone();

            encode_opcode(&mut bytes, position).ok_or_else(|| EvoluError::UnencodableCommand {
                command: spec.command.clone(),
                position,
            })?;

            let param = match spec.param {
                Some(Param::Number(raw)) => {
                    encode_param(&mut bytes, raw);
                    Some(command.resolve_param(raw))
                }
                Some(Param::Label(label)) => {
                    let idx = command.label_index(&label).ok_or_else(|| {
                        EvoluError::UnencodableParam {
                            command: spec.command.clone(),
                            label: label.clone(),
                        }
                    })?;
                    encode_param(&mut bytes, idx as u64);
                    Some(Param::Label(label))
                }
                None => None,
            };
            compiled.push(Line::new(command, param));
        }

        bytes.push(0);
        self.bytes.extend(bytes);
        Ok(self.add_rule(compiled))
    }

    /// Store a rule and run the init hooks of its lines.
    fn add_rule(&mut self, lines: Vec<Line>) -> RuleId {
        let id = RuleId(self.rules.len());
        self.rules.push(Rule::new(id, lines));

        let previous = self.current.take();
        for idx in 0..self.rules[id.0].lines().len() {
            let (hook, param) = {
                let line = &self.rules[id.0].lines()[idx];
                (line.command.init_hook().cloned(), line.param.clone())
            };
            if let Some(hook) = hook {
                self.current = Some((id, idx));
                hook(self, id, param.as_ref());
            }
        }
        self.current = previous;
        id
    }

    // =========================================================================
    // Condition index
    // =========================================================================

    /// Register a condition line of `rule` under `(name, param)`.
    ///
    /// Every condition's init hook starts with this.
    pub fn index_condition(&mut self, rule: RuleId, name: &str, param: Option<&Param>) {
        let Some(target) = self.rules.get_mut(rule.0) else {
            log::warn!("condition '{}' indexed for unknown rule {}", name, rule);
            return;
        };
        target.require();
        self.conditions
            .entry(ConditionKey::new(name, param))
            .or_default()
            .push(rule);
    }

    /// Rules indexed under `(name, param)`, one entry per matching line.
    pub fn conditions(&self, name: &str, param: Option<&Param>) -> &[RuleId] {
        self.conditions
            .get(&ConditionKey::new(name, param))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    // =========================================================================
    // Activation
    // =========================================================================

    /// Mark condition `(name, param)` as met.
    pub fn on(&mut self, name: &str, param: Option<&Param>) -> &mut Self {
        let rules = self.conditions(name, param).to_vec();
        for id in rules {
            self.satisfy(id, 1);
        }
        self
    }

    /// Mark condition `(name, param)` as no longer met.
    pub fn off(&mut self, name: &str, param: Option<&Param>) -> &mut Self {
        let rules = self.conditions(name, param).to_vec();
        for id in rules {
            self.unsatisfy(id, 1);
        }
        self
    }

    /// Mark `count` conditions of rule `id` as met.
    pub fn satisfy(&mut self, id: RuleId, count: usize) {
        let Some(rule) = self.rules.get_mut(id.0) else {
            return;
        };
        if rule.satisfy(count) == Transition::Ready {
            log::trace!("rule {} ready", id);
            self.pending.add(id);
        }
    }

    /// Mark `count` conditions of rule `id` as no longer met.
    pub fn unsatisfy(&mut self, id: RuleId, count: usize) {
        let Some(rule) = self.rules.get_mut(id.0) else {
            return;
        };
        if rule.unsatisfy(count) == Transition::Unready {
            log::trace!("rule {} no longer ready", id);
            self.pending.remove(id);
        }
    }

    /// Deliver one signal: satisfy every rule waiting on `(condition, param)`
    /// for exactly one `run()`.
    ///
    /// A program receives one signal at a time, so all of a rule's
    /// `condition` lines count as met, whatever their parameter.
    pub fn signal(&mut self, condition: &str, param: &Param) -> &mut Self {
        let mut rules: Vec<RuleId> = self.conditions(condition, Some(param)).to_vec();
        rules.dedup();
        let counts: Vec<(RuleId, usize)> = rules
            .into_iter()
            .map(|id| (id, self.rules[id.0].count_lines(condition)))
            .collect();

        for &(id, count) in &counts {
            self.satisfy(id, count);
        }
        self.run();
        for &(id, count) in &counts {
            self.unsatisfy(id, count);
        }
        self
    }

    /// Apply staged changes to the active set.
    fn flush(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        let pending = std::mem::take(&mut self.pending);
        for id in pending.remove {
            self.active.remove(&id);
        }
        self.active.extend(pending.add);
    }

    pub fn is_active(&self, id: RuleId) -> bool {
        self.active.contains(&id)
    }

    /// Active rules in id order.
    pub fn active(&self) -> impl Iterator<Item = RuleId> + '_ {
        self.active.iter().copied()
    }

    /// True when activation changes wait for the next `run()`/`init()`.
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    // =========================================================================
    // Execution
    // =========================================================================

    /// Run every rule without conditions. Only the first call has effect.
    pub fn init(&mut self) {
        self.flush();
        if self.initialized {
            log::warn!("program '{}' is already initialized", self.language.name());
            return;
        }
        self.initialized = true;

        let initializers: Vec<RuleId> = self
            .rules
            .iter()
            .filter(|rule| rule.is_initializer())
            .map(Rule::id)
            .collect();
        for id in initializers {
            self.execute(id);
        }
    }

    /// One step: apply staged changes, then execute every active rule.
    ///
    /// Rules made ready while this step executes run on the next call.
    pub fn run(&mut self) {
        self.flush();
        let active: Vec<RuleId> = self.active.iter().copied().collect();
        for id in active {
            self.execute(id);
        }
    }

    fn execute(&mut self, id: RuleId) {
        log::trace!("executing rule {}", id);
        let previous = self.current.take();
        for idx in 0..self.rules[id.0].lines().len() {
            let (hook, param) = {
                let line = &self.rules[id.0].lines()[idx];
                (line.command.run_hook().cloned(), line.param.clone())
            };
            self.current = Some((id, idx));
            if let Some(hook) = hook {
                hook(self, param.as_ref());
            }
        }
        self.current = previous;
    }

    /// Rule being initialized or executed.
    pub fn current_rule(&self) -> Option<&Rule> {
        let (id, _) = self.current?;
        self.rules.get(id.0)
    }

    /// Line being initialized or executed.
    pub fn current_line(&self) -> Option<&Line> {
        let (id, idx) = self.current?;
        self.rules.get(id.0)?.lines().get(idx)
    }

    // =========================================================================
    // Events
    // =========================================================================

    /// Register `listener` for `event`.
    pub fn listen<F>(&mut self, event: &str, listener: F)
    where
        F: Fn(&mut Code, &[Arg]) + 'static,
    {
        let listener: Listener = Rc::new(listener);
        self.events.listen(event, listener);
    }

    /// Call every listener of `event` in registration order.
    pub fn fire(&mut self, event: &str, args: &[Arg]) {
        for listener in self.events.listeners(event) {
            listener(self, args);
        }
    }

    // =========================================================================
    // Pack state
    // =========================================================================

    /// Store per-program state, replacing any previous value of this type.
    pub fn insert_state<T: Any>(&mut self, value: T) {
        self.state.insert(TypeId::of::<T>(), Box::new(value));
    }

    pub fn state<T: Any>(&self) -> Option<&T> {
        self.state.get(&TypeId::of::<T>())?.downcast_ref()
    }

    pub fn state_mut<T: Any>(&mut self) -> Option<&mut T> {
        self.state.get_mut(&TypeId::of::<T>())?.downcast_mut()
    }
}

impl fmt::Debug for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Code")
            .field("language", &self.language.name())
            .field("bytes", &self.bytes.len())
            .field("rules", &self.rules.len())
            .field("active", &self.active)
            .field("events", &self.events)
            .finish()
    }
}
