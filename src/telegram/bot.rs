//! Bot initialization and command definitions

use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;

/// Bot commands enum with descriptions
#[derive(BotCommands, Clone, Debug)]
#[command(rename_rule = "lowercase", description = "Я умею:")]
pub enum Command {
    #[command(description = "регистрация в игре")]
    Start,
    #[command(description = "голосовать за исход матча")]
    Vote,
    #[command(description = "турнирная таблица")]
    Standings,
    #[command(description = "результаты голосования")]
    Results,
    #[command(description = "список команд")]
    Teams,
    #[command(description = "список матчей")]
    Matches,
}

/// Creates a Bot instance from the TELOXIDE_TOKEN environment variable
pub fn create_bot() -> Bot {
    Bot::from_env()
}

/// Sets up bot commands in Telegram UI
///
/// # Returns
/// * `Ok(())` - Commands set successfully
/// * `Err(RequestError)` - Failed to set commands
pub async fn setup_bot_commands(bot: &Bot) -> Result<(), teloxide::RequestError> {
    use teloxide::types::BotCommand;

    bot.set_my_commands(vec![
        BotCommand::new("start", "регистрация в игре"),
        BotCommand::new("vote", "голосовать за исход матча"),
        BotCommand::new("standings", "турнирная таблица"),
        BotCommand::new("results", "результаты голосования"),
        BotCommand::new("teams", "список команд"),
        BotCommand::new("matches", "список матчей"),
    ])
    .await?;

    Ok(())
}
