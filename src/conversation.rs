//! In-memory conversation history.
//!
//! The receive task appends streamed transcription chunks and function calls
//! as they arrive; the tool engine reads the history to infer missing tool
//! arguments.  A turn stays open (further chunks from the same speaker are
//! appended to it) until [`ConversationHistory::close_turn`] is called at
//! the end of a model turn or a speaker change starts a new one.
//!
//! The history is shared between tasks as [`SharedHistory`].

use std::sync::Arc;

use serde_json::{Map, Value};
use tokio::sync::Mutex;

// ---------------------------------------------------------------------------
// Role / Part / ConversationTurn
// ---------------------------------------------------------------------------

/// Author of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Model,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Model => "model",
        }
    }
}

/// One content part of a turn.
#[derive(Debug, Clone, PartialEq)]
pub enum Part {
    Text(String),
    FunctionCall {
        name: String,
        args: Map<String, Value>,
    },
}

/// A single turn: author plus ordered content parts.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationTurn {
    pub role: Role,
    pub parts: Vec<Part>,
}

impl ConversationTurn {
    pub fn text(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            parts: vec![Part::Text(text.into())],
        }
    }

    /// Text parts joined with a single space.
    pub fn joined_text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|p| match p {
                Part::Text(t) if !t.is_empty() => Some(t.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

// ---------------------------------------------------------------------------
// ConversationHistory
// ---------------------------------------------------------------------------

/// Ordered list of conversation turns.
#[derive(Debug, Clone, Default)]
pub struct ConversationHistory {
    turns: Vec<ConversationTurn>,
    /// Whether the last turn accepts further chunks.
    open: bool,
}

/// History handle shared by the receive and console tasks.
pub type SharedHistory = Arc<Mutex<ConversationHistory>>;

/// Construct an empty [`SharedHistory`].
pub fn new_shared_history() -> SharedHistory {
    Arc::new(Mutex::new(ConversationHistory::default()))
}

impl ConversationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_turns(turns: Vec<ConversationTurn>) -> Self {
        Self { turns, open: false }
    }

    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Append a text chunk.
    ///
    /// Streamed transcription arrives in fragments, so a chunk from the
    /// speaker of the open turn is concatenated onto that turn's last text
    /// part.  Any other chunk starts a new turn.
    pub fn push_text(&mut self, role: Role, chunk: &str) {
        if chunk.is_empty() {
            return;
        }
        if let Some(turn) = self.open_turn(role) {
            if let Some(Part::Text(text)) = turn.parts.last_mut() {
                text.push_str(chunk);
            } else {
                turn.parts.push(Part::Text(chunk.to_string()));
            }
            return;
        }
        self.turns.push(ConversationTurn::text(role, chunk));
        self.open = true;
    }

    /// Record a complete user message (typed input) as its own turn.
    pub fn push_user_message(&mut self, text: &str) {
        self.turns.push(ConversationTurn::text(Role::User, text));
        self.open = false;
    }

    /// Record a function call requested by the model.
    pub fn push_function_call(&mut self, name: &str, args: Map<String, Value>) {
        let part = Part::FunctionCall {
            name: name.to_string(),
            args,
        };
        match self.open_turn(Role::Model) {
            Some(turn) => turn.parts.push(part),
            None => {
                self.turns.push(ConversationTurn {
                    role: Role::Model,
                    parts: vec![part],
                });
                self.open = true;
            }
        }
    }

    /// Seal the current turn; the next chunk starts a new one.
    pub fn close_turn(&mut self) {
        self.open = false;
    }

    /// Joined text of the most recent user turn, if any.
    pub fn last_user_text(&self) -> Option<String> {
        self.turns
            .iter()
            .rev()
            .find(|t| t.role == Role::User)
            .map(ConversationTurn::joined_text)
    }

    /// Keep only the last `max_users` blocks, where a block is a user turn
    /// plus every turn that follows it up to the next user turn.  Turns
    /// before the first user turn form a block of their own.
    ///
    /// Returns how many turns were removed.
    pub fn trim_to_recent_user_blocks(&mut self, max_users: usize) -> usize {
        let mut starts: Vec<usize> = Vec::new();
        for (i, turn) in self.turns.iter().enumerate() {
            if i == 0 || turn.role == Role::User {
                starts.push(i);
            }
        }

        if starts.len() <= max_users {
            return 0;
        }

        let cut = if max_users == 0 {
            self.turns.len()
        } else {
            starts[starts.len() - max_users]
        };
        self.turns.drain(..cut);
        if self.turns.is_empty() {
            self.open = false;
        }
        cut
    }

    fn open_turn(&mut self, role: Role) -> Option<&mut ConversationTurn> {
        if !self.open {
            return None;
        }
        self.turns.last_mut().filter(|t| t.role == role)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn roles(history: &ConversationHistory) -> Vec<Role> {
        history.turns().iter().map(|t| t.role).collect()
    }

    #[test]
    fn streamed_chunks_join_the_open_turn() {
        let mut h = ConversationHistory::new();
        h.push_text(Role::User, "weather in");
        h.push_text(Role::User, " rome");
        h.push_text(Role::Model, "It is");
        h.push_text(Role::Model, " sunny.");

        assert_eq!(h.len(), 2);
        assert_eq!(h.turns()[0].joined_text(), "weather in rome");
        assert_eq!(h.turns()[1].joined_text(), "It is sunny.");
    }

    #[test]
    fn close_turn_starts_a_new_turn() {
        let mut h = ConversationHistory::new();
        h.push_text(Role::User, "hello");
        h.close_turn();
        h.push_text(Role::User, "again");
        assert_eq!(h.len(), 2);
    }

    #[test]
    fn empty_chunks_are_ignored() {
        let mut h = ConversationHistory::new();
        h.push_text(Role::User, "");
        assert!(h.is_empty());
    }

    #[test]
    fn function_call_lands_in_model_turn() {
        let mut h = ConversationHistory::new();
        h.push_text(Role::User, "price of bitcoin");
        h.push_function_call("crypto_price", Map::new());

        assert_eq!(roles(&h), vec![Role::User, Role::Model]);
        assert!(matches!(
            &h.turns()[1].parts[0],
            Part::FunctionCall { name, .. } if name == "crypto_price"
        ));
    }

    #[test]
    fn last_user_text_skips_model_turns() {
        let mut h = ConversationHistory::new();
        h.push_user_message("first question");
        h.push_text(Role::Model, "answer");
        h.close_turn();
        h.push_user_message("second question");
        h.push_text(Role::Model, "another answer");

        assert_eq!(h.last_user_text().as_deref(), Some("second question"));
    }

    #[test]
    fn last_user_text_none_without_user_turns() {
        let h = ConversationHistory::from_turns(vec![ConversationTurn::text(Role::Model, "hi")]);
        assert!(h.last_user_text().is_none());
    }

    #[test]
    fn trim_keeps_last_user_blocks() {
        let mut turns = Vec::new();
        for i in 0..7 {
            turns.push(ConversationTurn::text(Role::User, format!("q{i}")));
            turns.push(ConversationTurn::text(Role::Model, format!("a{i}")));
        }
        let mut h = ConversationHistory::from_turns(turns);

        let removed = h.trim_to_recent_user_blocks(5);
        assert_eq!(removed, 4);
        assert_eq!(h.len(), 10);
        assert_eq!(h.turns()[0].joined_text(), "q2");
    }

    #[test]
    fn trim_counts_leading_model_turns_as_a_block() {
        let mut h = ConversationHistory::from_turns(vec![
            ConversationTurn::text(Role::Model, "greeting"),
            ConversationTurn::text(Role::User, "q1"),
            ConversationTurn::text(Role::User, "q2"),
        ]);

        assert_eq!(h.trim_to_recent_user_blocks(2), 1);
        assert_eq!(h.turns()[0].joined_text(), "q1");
    }

    #[test]
    fn trim_is_noop_under_limit() {
        let mut h = ConversationHistory::new();
        h.push_user_message("only one");
        assert_eq!(h.trim_to_recent_user_blocks(5), 0);
        assert_eq!(h.len(), 1);
    }
}
