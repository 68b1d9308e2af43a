//! Multi-turn conversation history.
//!
//! A [`ConversationHistory`] is owned by exactly one chat session. The QA
//! pipeline borrows it mutably for the lifetime of an answer stream, so two
//! concurrent answers against the same history cannot be expressed.

use serde::{Deserialize, Serialize};

use crate::chat::ChatMessage;
use crate::error::{RagError, Result};

/// One question/answer exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    question: String,
    answer: String,
}

impl Turn {
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self { question: question.into(), answer: answer.into() }
    }

    pub fn question(&self) -> &str {
        &self.question
    }

    pub fn answer(&self) -> &str {
        &self.answer
    }
}

/// Ordered turns, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationHistory {
    turns: Vec<Turn>,
}

impl ConversationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a turn at the end. No capacity is enforced here.
    pub fn append(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    /// Remove every turn.
    pub fn clear(&mut self) {
        self.turns.clear();
    }

    /// Keep only the most recent `max_turns` turns, preserving their order.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::InputError`] if `max_turns` is zero.
    pub fn truncate(&mut self, max_turns: usize) -> Result<()> {
        if max_turns == 0 {
            return Err(RagError::InputError("max_turns must be at least 1".to_string()));
        }
        if self.turns.len() > max_turns {
            let excess = self.turns.len() - max_turns;
            self.turns.drain(..excess);
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Turn> {
        self.turns.iter()
    }

    /// Render the history as alternating user/assistant messages.
    pub fn to_messages(&self) -> Vec<ChatMessage> {
        self.turns
            .iter()
            .flat_map(|turn| {
                [ChatMessage::user(turn.question.clone()), ChatMessage::assistant(turn.answer.clone())]
            })
            .collect()
    }
}

impl From<Vec<Turn>> for ConversationHistory {
    fn from(turns: Vec<Turn>) -> Self {
        Self { turns }
    }
}

impl<'a> IntoIterator for &'a ConversationHistory {
    type Item = &'a Turn;
    type IntoIter = std::slice::Iter<'a, Turn>;

    fn into_iter(self) -> Self::IntoIter {
        self.turns.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::Role;

    fn history_of(n: usize) -> ConversationHistory {
        (0..n).map(|i| Turn::new(format!("q{i}"), format!("a{i}"))).collect::<Vec<_>>().into()
    }

    #[test]
    fn truncate_six_to_five_drops_oldest() {
        let mut history = history_of(6);
        history.truncate(5).unwrap();

        assert_eq!(history.len(), 5);
        assert_eq!(history.turns()[0], Turn::new("q1", "a1"));
        assert_eq!(history.turns()[4], Turn::new("q5", "a5"));
    }

    #[test]
    fn truncate_within_bound_is_noop() {
        let mut history = history_of(3);
        history.truncate(5).unwrap();
        assert_eq!(history, history_of(3));
    }

    #[test]
    fn truncate_rejects_zero() {
        let mut history = history_of(2);
        let err = history.truncate(0).unwrap_err();
        assert!(matches!(err, RagError::InputError(_)));
        assert_eq!(history.len(), 2);
    }

    #[test]
    fn clear_is_idempotent() {
        let mut history = history_of(4);
        history.clear();
        history.clear();
        assert!(history.is_empty());
        history.truncate(3).unwrap();
        assert!(history.is_empty());
    }

    #[test]
    fn messages_alternate_user_and_assistant() {
        let messages = history_of(2).to_messages();
        let roles: Vec<Role> = messages.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::User, Role::Assistant, Role::User, Role::Assistant]);
        assert_eq!(messages[2].content, "q1");
        assert_eq!(messages[3].content, "a1");
    }
}
