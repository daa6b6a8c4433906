//! Rules - condition-guarded groups of lines
//!
//! A rule is ready once every one of its condition lines is satisfied.
//! The rule keeps a signed balance of outstanding conditions, so every
//! `satisfy(n)` is undone by exactly one `unsatisfy(n)`. Crossings of zero
//! are reported to the owning [`Code`](super::Code), which stages them.

use super::command::Line;
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Rule identifier, equal to creation order within its program.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RuleId(pub usize);

impl RuleId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Readiness change caused by satisfying or unsatisfying conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Counter reached zero.
    Ready,
    /// Counter left zero.
    Unready,
    /// No change across zero.
    None,
}

/// A compiled rule.
#[derive(Debug, Clone)]
pub struct Rule {
    id: RuleId,
    lines: Vec<Line>,
    /// Outstanding conditions. Negative when satisfied more often than
    /// required.
    balance: i64,
    initializer: bool,
}

impl Rule {
    pub(crate) fn new(id: RuleId, lines: Vec<Line>) -> Self {
        let initializer = !lines.iter().any(Line::is_condition);
        Self {
            id,
            lines,
            balance: 0,
            initializer,
        }
    }

    pub fn id(&self) -> RuleId {
        self.id
    }

    pub fn lines(&self) -> &[Line] {
        &self.lines
    }

    /// Condition lines not yet satisfied, never below zero.
    pub fn required(&self) -> usize {
        usize::try_from(self.balance).unwrap_or(0)
    }

    /// True when the rule has no condition lines at all.
    pub fn is_initializer(&self) -> bool {
        self.initializer
    }

    pub fn is_ready(&self) -> bool {
        self.balance <= 0
    }

    /// Number of lines using the command `name`, whatever their parameter.
    pub fn count_lines(&self, name: &str) -> usize {
        self.lines.iter().filter(|line| line.name() == name).count()
    }

    /// Register one more outstanding condition.
    pub(crate) fn require(&mut self) {
        self.balance += 1;
    }

    /// Mark `count` conditions as met.
    pub(crate) fn satisfy(&mut self, count: usize) -> Transition {
        let was_ready = self.is_ready();
        self.balance -= count as i64;
        if !was_ready && self.is_ready() {
            Transition::Ready
        } else {
            Transition::None
        }
    }

    /// Mark `count` conditions as no longer met.
    pub(crate) fn unsatisfy(&mut self, count: usize) -> Transition {
        let was_ready = self.is_ready();
        self.balance += count as i64;
        if was_ready && !self.is_ready() {
            Transition::Unready
        } else {
            Transition::None
        }
    }
}
