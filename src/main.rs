use anyhow::Result;
use dotenvy::dotenv;
use std::path::Path;
use std::sync::Arc;
use teloxide::prelude::*;

use matchvote::core::{config, init_logger};
use matchvote::storage::create_pool;
use matchvote::telegram::{create_bot, schema, setup_bot_commands, HandlerDeps};

/// Main entry point for the Telegram bot
///
/// # Errors
/// Returns an error if initialization fails (logging, database, bot creation).
/// A store that cannot be opened at startup is fatal for the whole process.
#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env if present
    let _ = dotenv();

    // Initialize logger (console + file)
    init_logger(&config::LOG_FILE_PATH)?;

    // Create the database directory if it does not exist
    if let Some(parent) = Path::new(config::DATABASE_PATH.as_str()).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let db_pool = Arc::new(
        create_pool(&config::DATABASE_PATH)
            .map_err(|e| anyhow::anyhow!("Ошибка инициализации базы данных: {}", e))?,
    );
    log::info!("База данных открыта: {}", *config::DATABASE_PATH);

    let bot = create_bot();
    if let Err(e) = setup_bot_commands(&bot).await {
        log::warn!("Не удалось установить список команд: {}", e);
    }

    let deps = HandlerDeps::new(db_pool);

    log::info!("Запуск бота");
    Dispatcher::builder(bot, schema(deps))
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}
