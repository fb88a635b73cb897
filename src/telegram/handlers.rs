//! Telegram bot handler tree configuration
//!
//! This module provides the main dispatcher schema for the bot. The handlers
//! are thin: they extract the sender identity and payload from the update,
//! call the matching flow function and render its [`Reply`] back through the
//! Bot API. The same handler tree is used by production and tests.

use std::sync::Arc;

use chrono::Local;
use teloxide::dispatching::{UpdateFilterExt, UpdateHandler};
use teloxide::prelude::*;
use teloxide::types::{
    InlineKeyboardButton, InlineKeyboardMarkup, KeyboardButton, KeyboardMarkup, Message,
    MessageId,
};

use crate::flows::registration::{self, Registrant};
use crate::flows::results::{self, ALL_RESULTS_CALLBACK, USER_RESULTS_CALLBACK};
use crate::flows::voting::{self, Voter};
use crate::flows::{ConversationState, Reply, Sessions};
use crate::storage::db::DbPool;
use crate::storage::get_connection;

/// Error type for handlers
pub type HandlerError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Dependencies required by handlers
#[derive(Clone)]
pub struct HandlerDeps {
    pub db_pool: Arc<DbPool>,
    pub sessions: Arc<Sessions>,
}

impl HandlerDeps {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self {
            db_pool,
            sessions: Arc::new(Sessions::new()),
        }
    }
}

/// Creates the main dispatcher schema for the Telegram bot.
///
/// # Arguments
/// * `deps` - Handler dependencies (database pool, conversation sessions)
///
/// # Returns
/// The complete handler tree for the bot
pub fn schema(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    let deps_commands = deps.clone();
    let deps_messages = deps.clone();
    let deps_callback = deps;

    dptree::entry()
        // Command handler first so that commands never leak into a
        // pending free-text conversation
        .branch(command_handler(deps_commands))
        // Free-text continuation of the two sub-conversations
        .branch(message_handler(deps_messages))
        // Callback query handler (inline keyboard buttons)
        .branch(callback_handler(deps_callback))
}

/// Renders flow buttons into a Telegram inline keyboard.
fn inline_keyboard(reply: &Reply) -> Option<InlineKeyboardMarkup> {
    if reply.buttons.is_empty() {
        return None;
    }
    let rows: Vec<Vec<InlineKeyboardButton>> = reply
        .buttons
        .iter()
        .map(|row| {
            row.iter()
                .map(|b| InlineKeyboardButton::callback(b.label.clone(), b.data.clone()))
                .collect()
        })
        .collect();
    Some(InlineKeyboardMarkup::new(rows))
}

/// Sends a flow reply as a new message.
async fn send_reply(bot: &Bot, chat_id: ChatId, reply: Reply) -> ResponseResult<()> {
    match inline_keyboard(&reply) {
        Some(keyboard) => {
            bot.send_message(chat_id, reply.text)
                .reply_markup(keyboard)
                .await?;
        }
        None => {
            bot.send_message(chat_id, reply.text).await?;
        }
    }
    Ok(())
}

/// Replaces the message that carried the pressed inline keyboard.
async fn edit_reply(
    bot: &Bot,
    chat_id: ChatId,
    message_id: MessageId,
    reply: Reply,
) -> ResponseResult<()> {
    match inline_keyboard(&reply) {
        Some(keyboard) => {
            bot.edit_message_text(chat_id, message_id, reply.text)
                .reply_markup(keyboard)
                .await?;
        }
        None => {
            bot.edit_message_text(chat_id, message_id, reply.text).await?;
        }
    }
    Ok(())
}

/// Persistent reply keyboard shown after registration completes.
fn commands_keyboard() -> KeyboardMarkup {
    let mut keyboard = KeyboardMarkup::new(vec![
        vec![KeyboardButton::new("/vote"), KeyboardButton::new("/standings")],
        vec![KeyboardButton::new("/results"), KeyboardButton::new("/teams")],
        vec![KeyboardButton::new("/matches")],
    ]);
    keyboard.resize_keyboard = true;
    keyboard
}

fn sender_id(msg: &Message) -> i64 {
    msg.from
        .as_ref()
        .and_then(|u| i64::try_from(u.id.0).ok())
        .unwrap_or(msg.chat.id.0)
}

/// Handler for bot commands (/start, /vote, /standings, ...)
fn command_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    use crate::telegram::bot::Command;

    Update::filter_message().branch(dptree::entry().filter_command::<Command>().endpoint(
        move |bot: Bot, msg: Message, cmd: Command| {
            let deps = deps.clone();
            async move {
                log::info!("Received command: {:?} from chat {}", cmd, msg.chat.id);
                let chat_id = msg.chat.id;

                let reply = match cmd {
                    Command::Start => Ok(registration::start(&deps.sessions, chat_id.0)),
                    Command::Vote => {
                        let conn = get_connection(&deps.db_pool)?;
                        voting::start(&conn, Local::now().date_naive()).map_err(HandlerError::from)
                    }
                    Command::Standings => {
                        let conn = get_connection(&deps.db_pool)?;
                        results::standings(&conn).map_err(HandlerError::from)
                    }
                    Command::Results => Ok(results::results_menu()),
                    Command::Teams => {
                        let conn = get_connection(&deps.db_pool)?;
                        results::teams(&conn).map_err(HandlerError::from)
                    }
                    Command::Matches => {
                        let conn = get_connection(&deps.db_pool)?;
                        results::matches(&conn).map_err(HandlerError::from)
                    }
                };

                match reply {
                    Ok(reply) => send_reply(&bot, chat_id, reply).await?,
                    Err(e) => log::error!("Command {:?} failed for chat {}: {}", cmd, chat_id, e),
                }
                Ok(())
            }
        },
    ))
}

/// Handler for free text continuing a multi-step conversation.
///
/// Text arriving outside any conversation is ignored, matching the original
/// transport filter that only forwarded text while a conversation was open.
fn message_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_message()
        .filter(|msg: Message| {
            msg.text().map(|t| !t.starts_with('/')).unwrap_or(false)
        })
        .endpoint(move |bot: Bot, msg: Message| {
            let deps = deps.clone();
            async move {
                let chat_id = msg.chat.id;
                let Some(text) = msg.text() else { return Ok(()) };
                let Some(state) = deps.sessions.get(&chat_id.0).map(|s| s.value().clone()) else {
                    return Ok(());
                };

                match state {
                    ConversationState::AwaitingFirstName => {
                        let reply = registration::on_first_name(&deps.sessions, chat_id.0, text);
                        send_reply(&bot, chat_id, reply).await?;
                    }
                    ConversationState::AwaitingLastName { first_name } => {
                        let registrant = Registrant {
                            user_id: sender_id(&msg),
                            username: msg.from.as_ref().and_then(|u| u.username.clone()),
                        };
                        let conn = get_connection(&deps.db_pool)?;
                        match registration::on_last_name(
                            &deps.sessions,
                            &conn,
                            chat_id.0,
                            &registrant,
                            &first_name,
                            text,
                        ) {
                            Ok(reply) => {
                                bot.send_message(chat_id, reply.text)
                                    .reply_markup(commands_keyboard())
                                    .await?;
                            }
                            Err(e) => {
                                log::error!("Registration failed for chat {}: {}", chat_id, e)
                            }
                        }
                    }
                    ConversationState::AwaitingResultsName => {
                        let conn = get_connection(&deps.db_pool)?;
                        match results::user_results(&deps.sessions, &conn, chat_id.0, text) {
                            Ok(reply) => send_reply(&bot, chat_id, reply).await?,
                            Err(e) => {
                                log::error!("User results lookup failed for chat {}: {}", chat_id, e)
                            }
                        }
                    }
                }
                Ok(())
            }
        })
}

/// Handler for callback queries (inline keyboard buttons)
fn callback_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_callback_query().endpoint(move |bot: Bot, q: CallbackQuery| {
        let deps = deps.clone();
        async move {
            // "query is too old" on a double click is not actionable
            let _ = bot.answer_callback_query(q.id.clone()).await;

            let Some(data) = q.data.as_deref() else { return Ok(()) };
            let (Some(chat_id), Some(message_id)) = (
                q.message.as_ref().map(|m| m.chat().id),
                q.message.as_ref().map(|m| m.id()),
            ) else {
                log::warn!("Callback {:?} without an accessible message", q.id);
                return Ok(());
            };
            let user_id = i64::try_from(q.from.id.0).unwrap_or(0);

            let reply = if data == ALL_RESULTS_CALLBACK {
                let conn = get_connection(&deps.db_pool)?;
                results::all_results(&conn)
            } else if data == USER_RESULTS_CALLBACK {
                Ok(results::user_results_start(&deps.sessions, chat_id.0))
            } else if voting::parse_outcome_payload(data).is_some() {
                let voter = Voter {
                    user_id,
                    username: q.from.username.clone(),
                };
                let conn = get_connection(&deps.db_pool)?;
                voting::record_vote(&conn, &voter, data, Local::now().naive_local())
            } else {
                // Match selection, or malformed data answered inside the flow
                let conn = get_connection(&deps.db_pool)?;
                voting::select_match(&conn, user_id, data, Local::now().naive_local())
            };

            match reply {
                Ok(reply) => edit_reply(&bot, chat_id, message_id, reply).await?,
                Err(e) => log::error!("Callback '{}' failed for chat {}: {}", data, chat_id, e),
            }
            Ok(())
        }
    })
}
