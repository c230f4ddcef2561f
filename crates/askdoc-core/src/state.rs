//! UI-agnostic conversation state
//!
//! This module contains the transcript and query history shared by every front end.
//! Nothing outside this crate can mutate a [`Conversation`]; the
//! [`InteractionController`](crate::InteractionController) is the only writer.

use serde::{Deserialize, Deserializer, Serialize};

use crate::ai::{Answer, AskError};

/// Shown in place of an answer whenever a request fails, whatever the cause.
pub const FALLBACK_MESSAGE: &str = "Sorry, something went wrong. Please try again.";

/// The author of a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// A source record attached to an answer by the endpoint
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    #[serde(default, deserialize_with = "null_as_default")]
    pub source: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub question: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub updated_at: String,
}

/// Treat an explicit JSON `null` the same as a missing field.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// One message in the transcript
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub citations: Vec<Citation>,
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            citations: Vec::new(),
        }
    }

    pub fn assistant(content: impl Into<String>, citations: Vec<Citation>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            citations,
        }
    }

    pub fn fallback() -> Self {
        Self::assistant(FALLBACK_MESSAGE, Vec::new())
    }
}

/// A question that has been accepted and is waiting for its answer.
///
/// `history` is the snapshot taken before the question was added, so it never
/// contains `query` itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRequest {
    pub query: String,
    pub history: Vec<String>,
}

/// Transcript, query history and the busy flag.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Conversation {
    turns: Vec<Turn>,
    history: Vec<String>,
    pending: bool,
}

impl Conversation {
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// Queries of every exchange that completed successfully, oldest first.
    pub fn history(&self) -> &[String] {
        &self.history
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn last_turn(&self) -> Option<&Turn> {
        self.turns.last()
    }

    /// Whether `raw` would be accepted right now.
    pub fn can_submit(&self, raw: &str) -> bool {
        !self.pending && !raw.trim().is_empty()
    }

    /// Idle -> Pending. Returns `None` and leaves everything untouched when the
    /// input is blank or a request is already in flight.
    pub(crate) fn accept(&mut self, raw: &str) -> Option<PendingRequest> {
        if !self.can_submit(raw) {
            return None;
        }

        let request = PendingRequest {
            query: raw.to_string(),
            history: self.history.clone(),
        };
        self.turns.push(Turn::user(raw));
        self.pending = true;
        Some(request)
    }

    /// Pending -> Idle. Failed exchanges are shown but kept out of the history.
    pub(crate) fn resolve(&mut self, query: String, outcome: Result<Answer, AskError>) {
        match outcome {
            Ok(answer) => {
                self.turns.push(Turn::assistant(answer.text, answer.citations));
                self.history.push(query);
            }
            Err(_) => self.turns.push(Turn::fallback()),
        }
        self.pending = false;
    }
}
