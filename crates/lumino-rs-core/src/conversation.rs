//! Alternating user/assistant conversation history.

use lumino_rs_protocol::{Role, Turn};
use thiserror::Error;

/// A turn was pushed out of order.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("expected a {expected} turn, got {actual}")]
pub struct HistoryError {
    pub expected: &'static str,
    pub actual: &'static str,
}

/// Ordered turns, alternating user then assistant.
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    turns: Vec<Turn>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Role the next pushed turn must have.
    pub fn next_role(&self) -> Role {
        match self.turns.last() {
            Some(turn) if turn.role == Role::User => Role::Assistant,
            _ => Role::User,
        }
    }

    /// Append a turn, enforcing alternation.
    pub fn push(&mut self, turn: Turn) -> Result<(), HistoryError> {
        let expected = self.next_role();
        if turn.role != expected {
            return Err(HistoryError {
                expected: expected.as_str(),
                actual: turn.role.as_str(),
            });
        }
        self.turns.push(turn);
        Ok(())
    }

    /// Open an exchange with the user's message.
    pub fn begin(&mut self, user_text: &str) -> Result<(), HistoryError> {
        self.push(Turn::user(user_text))
    }

    /// Close the open exchange with the assistant's reply.
    pub fn complete(&mut self, assistant_text: String) -> Result<(), HistoryError> {
        self.push(Turn::assistant(assistant_text))
    }

    /// Drop the pending user turn of an exchange that produced no reply.
    pub fn abandon(&mut self) {
        if self.next_role() == Role::Assistant {
            self.turns.pop();
        }
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }
}
