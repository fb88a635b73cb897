//! Two-step registration: first name, then last name, then a user upsert.

use crate::core::error::AppResult;
use crate::flows::{ConversationState, Reply, Sessions};
use crate::storage::db::{self, DbConnection};

/// Identity of the registering sender, as delivered by the transport.
#[derive(Debug, Clone)]
pub struct Registrant {
    pub user_id: i64,
    pub username: Option<String>,
}

/// Entry point (`/start`): puts the chat into the first-name state.
pub fn start(sessions: &Sessions, chat_id: i64) -> Reply {
    sessions.insert(chat_id, ConversationState::AwaitingFirstName);
    Reply::text("Привет! Пожалуйста, введи свое имя:")
}

/// First transition: text in the first-name state becomes the pending first
/// name, kept only in the session entry until the flow completes.
pub fn on_first_name(sessions: &Sessions, chat_id: i64, text: &str) -> Reply {
    sessions.insert(
        chat_id,
        ConversationState::AwaitingLastName {
            first_name: text.to_string(),
        },
    );
    Reply::text("Прекрасно! Теперь фамилию:")
}

/// Terminal transition: combines the pending first name with the received
/// last name and upserts the user record. Repeating registration overwrites
/// the stored names without creating a second row.
pub fn on_last_name(
    sessions: &Sessions,
    conn: &DbConnection,
    chat_id: i64,
    registrant: &Registrant,
    first_name: &str,
    text: &str,
) -> AppResult<Reply> {
    db::upsert_user(
        conn,
        registrant.user_id,
        registrant.username.as_deref(),
        first_name,
        text,
    )?;
    sessions.remove(&chat_id);
    Ok(Reply::text(format!(
        "Спасибо, {} {}! Теперь ты в игре!",
        first_name, text
    )))
}
