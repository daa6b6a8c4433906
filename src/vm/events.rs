//! Event bus - named observer lists
//!
//! Commands talk to the host (and to each other) through events. Listeners
//! receive the program as an explicit argument, so they may call back into
//! `on`/`off`/`fire`.

use super::code::Code;
use super::command::Param;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

/// Listener callback.
pub type Listener = Rc<dyn Fn(&mut Code, &[Arg])>;

/// Event argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Arg {
    Param(Param),
    Int(i64),
}

impl Arg {
    pub fn as_param(&self) -> Option<&Param> {
        match self {
            Self::Param(param) => Some(param),
            Self::Int(_) => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(value) => Some(*value),
            Self::Param(_) => None,
        }
    }
}

impl From<Param> for Arg {
    fn from(value: Param) -> Self {
        Self::Param(value)
    }
}

impl From<i64> for Arg {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl fmt::Display for Arg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Param(param) => write!(f, "{}", param),
            Self::Int(value) => write!(f, "{}", value),
        }
    }
}

/// Event name → listeners, in registration order.
#[derive(Default)]
pub struct EventBus {
    listeners: HashMap<String, Vec<Listener>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn listen(&mut self, event: &str, listener: Listener) {
        self.listeners.entry(event.to_string()).or_default().push(listener);
    }

    /// Snapshot of the listeners for `event`.
    ///
    /// Callers invoke the snapshot, so a listener registering another
    /// listener does not affect the current dispatch.
    pub fn listeners(&self, event: &str) -> Vec<Listener> {
        self.listeners.get(event).cloned().unwrap_or_default()
    }

    pub fn listener_count(&self, event: &str) -> usize {
        self.listeners.get(event).map_or(0, Vec::len)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut events: Vec<(&str, usize)> = self
            .listeners
            .iter()
            .map(|(name, list)| (name.as_str(), list.len()))
            .collect();
        events.sort();
        write!(f, "EventBus({:?})", events)
    }
}
