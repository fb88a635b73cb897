//! Transport-independent conversation and voting logic
//!
//! Flow functions take a database connection (and an injected clock where
//! time matters) and return [`Reply`] values; the `telegram` module renders
//! those into messages and inline keyboards. Multi-step conversations keep
//! their per-chat state in [`Sessions`], an explicit finite-state map that is
//! independent of how the transport demultiplexes updates.

pub mod registration;
pub mod results;
pub mod voting;

use dashmap::DashMap;

/// A single inline button: label plus callback payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    pub label: String,
    pub data: String,
}

impl Button {
    pub fn new(label: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            data: data.into(),
        }
    }
}

/// Reply produced by a flow step: text plus optional button rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    pub buttons: Vec<Vec<Button>>,
}

impl Reply {
    /// Plain text reply without buttons.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            buttons: Vec::new(),
        }
    }

    /// Reply with inline button rows.
    pub fn with_buttons(text: impl Into<String>, buttons: Vec<Vec<Button>>) -> Self {
        Self {
            text: text.into(),
            buttons,
        }
    }
}

/// Per-chat conversation state.
///
/// Registration and the user-results lookup are the only multi-step flows;
/// a chat is in at most one of them at a time, so a single state enum per
/// chat id is enough. An entry is discarded on flow completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversationState {
    /// Registration: waiting for the first name
    AwaitingFirstName,
    /// Registration: first name received, waiting for the last name
    AwaitingLastName { first_name: String },
    /// User-results lookup: waiting for "имя фамилия" free text
    AwaitingResultsName,
}

/// Session store: chat id → state of its multi-step conversation.
///
/// Concurrent map because the dispatcher may deliver updates from different
/// chats in parallel.
pub type Sessions = DashMap<i64, ConversationState>;
