//! Pattern rule engine.
//!
//! Holds the active rule set in evaluation order and decides, for each
//! event, which rule (if any) fires. The engine itself is not synchronized;
//! the session wraps it in a single lock so that one-shot removal and rule
//! iteration are atomic with respect to each other.

use std::sync::Arc;

use indexmap::IndexMap;
use log::{debug, trace};

use super::matcher::Captures;
use super::rule::{Rule, RuleId};
use crate::channel::Event;
use crate::error::RuleError;

/// A rule that fired for an event.
#[derive(Debug, Clone)]
pub struct RuleMatch {
    /// Id the rule was registered under.
    pub id: RuleId,

    /// The rule itself. One-shot rules are already deregistered.
    pub rule: Arc<Rule>,

    /// Data captured by the matcher.
    pub captures: Captures,
}

/// Ordered set of active rules.
#[derive(Debug, Default)]
pub struct RuleEngine {
    /// Active rules in evaluation order: descending priority, then
    /// registration order.
    rules: IndexMap<RuleId, Arc<Rule>>,

    next_id: u64,
}

impl RuleEngine {
    /// Create an empty engine.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a rule and return its id.
    pub fn register(&mut self, rule: Rule) -> RuleId {
        let id = RuleId(self.next_id);
        self.next_id += 1;

        // Insert after every rule of equal or higher priority.
        let index = self
            .rules
            .values()
            .position(|r| r.priority < rule.priority)
            .unwrap_or(self.rules.len());

        debug!(
            "rule {} registered at position {} ({:?})",
            id,
            index,
            rule.name()
        );
        self.rules.shift_insert(index, id, Arc::new(rule));
        id
    }

    /// Remove a rule from the active set.
    pub fn deregister(&mut self, id: RuleId) -> Result<Arc<Rule>, RuleError> {
        self.rules
            .shift_remove(&id)
            .ok_or(RuleError::UnknownRule(id))
    }

    /// Find the first active rule matching `event`.
    ///
    /// A matching one-shot rule is removed before this returns. A `None`
    /// result is not an error; the caller passes the event on unmodified.
    pub fn evaluate(&mut self, event: &Event) -> Option<RuleMatch> {
        let (index, captures) = self
            .rules
            .values()
            .enumerate()
            .find_map(|(i, rule)| rule.match_event(event).map(|caps| (i, caps)))?;

        let (id, rule) = if self.rules[index].is_one_shot() {
            self.rules.shift_remove_index(index)?
        } else {
            let (id, rule) = self.rules.get_index(index)?;
            (*id, Arc::clone(rule))
        };

        trace!("rule {} matched {}", id, event);
        Some(RuleMatch { id, rule, captures })
    }

    /// Whether a rule is still active.
    pub fn contains(&self, id: RuleId) -> bool {
        self.rules.contains_key(&id)
    }

    /// Ids of the active rules in evaluation order.
    pub fn ids(&self) -> impl Iterator<Item = RuleId> + '_ {
        self.rules.keys().copied()
    }

    /// Number of active rules.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether no rules are active.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
