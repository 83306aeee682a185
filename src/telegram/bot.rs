//! Bot initialization and command registration

use reqwest::ClientBuilder;
use teloxide::prelude::*;
use teloxide::types::BotCommand;
use teloxide::utils::command::BotCommands;

use crate::core::config;
use crate::i18n::{t, Language};

/// Bot commands enum with descriptions
#[derive(BotCommands, Clone, Debug, PartialEq, Eq)]
#[command(rename_rule = "lowercase", description = "Commands:")]
pub enum Command {
    #[command(description = "start or open the main menu")]
    Start(String),
}

/// Creates a Bot instance with custom or default API URL
///
/// Reads the token from `BOT_TOKEN`/`TELOXIDE_TOKEN`, applies the request timeout
/// and, when `BOT_API_URL` is set, points the bot at that server.
pub fn create_bot() -> anyhow::Result<Bot> {
    let client = ClientBuilder::new().timeout(config::network::timeout()).build()?;
    let bot = Bot::with_client(config::BOT_TOKEN.as_str(), client);

    let bot = match config::network::bot_api_url() {
        Some(bot_api_url) => {
            log::info!("Using custom Bot API URL: {}", bot_api_url);
            let url = url::Url::parse(&bot_api_url).map_err(|e| anyhow::anyhow!("Invalid BOT_API_URL: {}", e))?;
            bot.set_api_url(url)
        }
        None => bot,
    };

    Ok(bot)
}

/// Registers `/start` in the Telegram command menu for every supported language.
pub async fn setup_bot_commands(bot: &Bot) -> Result<(), teloxide::RequestError> {
    bot.set_my_commands(vec![BotCommand::new("start", t(Language::default(), "command-start"))])
        .await?;

    for lang in Language::all() {
        bot.set_my_commands(vec![BotCommand::new("start", t(lang, "command-start"))])
            .language_code(lang.code())
            .await?;
    }

    Ok(())
}
