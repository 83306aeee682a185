use anyhow::{Context, Result};
use dotenvy::dotenv;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use teloxide::prelude::*;
use tokio::time::sleep;

use coursebot::admin;
use coursebot::cli::{Cli, Commands};
use coursebot::conversation::outbound::Messenger;
use coursebot::conversation::Engine;
use coursebot::core::{config, export, init_logger, log_startup_configuration, web_server, BotSettings};
use coursebot::notifications::{start_scheduler, Broadcaster, Scheduler};
use coursebot::storage::db::{self, DbPool, NewFaq};
use coursebot::storage::{create_pool, get_connection};
use coursebot::telegram::{create_bot, schema, setup_bot_commands, HandlerDeps, TelegramMessenger};

/// Main entry point for the Telegram bot
///
/// Parses CLI arguments and dispatches to appropriate subcommand.
///
/// # Errors
/// Returns an error if initialization fails (logging, database, bot creation).
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();

    // Log panics instead of losing them on stderr
    std::panic::set_hook(Box::new(|panic_info| {
        log::error!("Panic caught: {:?}", panic_info);
        if let Some(location) = panic_info.location() {
            log::error!("Panic at {}:{}:{}", location.file(), location.line(), location.column());
        }
        if let Some(msg) = panic_info.payload().downcast_ref::<&str>() {
            log::error!("Panic message: {}", msg);
        }
    }));

    // Load environment variables from .env if present
    let _ = dotenv();

    // Initialize logger (console + file)
    init_logger(&config::LOG_FILE_PATH)?;

    match cli.command {
        Some(Commands::Run) | None => run_bot().await,
        Some(Commands::Users { json }) => {
            let conn = get_connection(&open_pool()?)?;
            let reports = db::get_users_with_payment_attempts(&conn)?;
            print_report(&reports, json, || admin::format_users(&reports))
        }
        Some(Commands::PaymentStats { json }) => {
            let conn = get_connection(&open_pool()?)?;
            let stats = db::get_payment_stats(&conn)?;
            print_report(&stats, json, || admin::format_payment_stats(&stats))
        }
        Some(Commands::ReferralStats { json }) => {
            let conn = get_connection(&open_pool()?)?;
            let referrers = db::get_referral_report(&conn)?;
            print_report(&referrers, json, || admin::format_referral_report(&referrers))
        }
        Some(Commands::PendingPayments { json }) => {
            let conn = get_connection(&open_pool()?)?;
            let pending = db::get_pending_payments(&conn)?;
            print_report(&pending, json, || admin::format_pending_payments(&pending))
        }
        Some(Commands::ExportUsers { output }) => {
            let conn = get_connection(&open_pool()?)?;
            let reports = db::get_users_with_payment_attempts(&conn)?;
            std::fs::write(&output, export::users_to_csv(&reports))
                .with_context(|| format!("Failed to write {}", output))?;
            println!("✅ Exported {} user(s) to {}", reports.len(), output);
            Ok(())
        }
        Some(Commands::AddFaq {
            question_uz,
            answer_uz,
            question_ru,
            answer_ru,
            question_en,
            answer_en,
        }) => {
            let faq = NewFaq {
                question_uz,
                answer_uz,
                question_ru,
                answer_ru,
                question_en,
                answer_en,
            };
            let conn = get_connection(&open_pool()?)?;
            let id = db::add_faq(&conn, &faq)?;
            println!("✅ FAQ entry #{} added", id);
            Ok(())
        }
        Some(Commands::SeedFaq) => {
            let conn = get_connection(&open_pool()?)?;
            let inserted = db::seed_faq(&conn)?;
            println!("✅ Inserted {} FAQ entr(ies)", inserted);
            Ok(())
        }
        Some(Commands::RemindSubscription { all }) => run_subscription_reminder(all).await,
    }
}

fn open_pool() -> Result<DbPool> {
    create_pool(&config::DATABASE_PATH).map_err(|e| anyhow::anyhow!("Failed to create database pool: {}", e))
}

fn print_report<T: Serialize + ?Sized>(value: &T, json: bool, text: impl FnOnce() -> String) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        println!("{}", text());
    }
    Ok(())
}

fn require_token() -> Result<()> {
    if config::BOT_TOKEN.is_empty() {
        anyhow::bail!("BOT_TOKEN (or TELOXIDE_TOKEN) is not set");
    }
    Ok(())
}

/// Connects to the Bot API, retrying while a local server is still starting.
async fn fetch_bot_username(bot: &Bot) -> Result<Option<String>> {
    let startup_max_retries = 12;
    let mut startup_retry = 0;
    loop {
        match bot.get_me().await {
            Ok(me) => return Ok(me.username.clone()),
            Err(e) => {
                startup_retry += 1;
                if startup_retry >= startup_max_retries {
                    return Err(anyhow::anyhow!(
                        "Failed to connect to Bot API after {} retries: {}",
                        startup_retry,
                        e
                    ));
                }
                log::warn!(
                    "Bot API not ready (attempt {}/{}): {}. Retrying in 5 seconds...",
                    startup_retry,
                    startup_max_retries,
                    e
                );
                sleep(Duration::from_secs(5)).await;
            }
        }
    }
}

async fn run_subscription_reminder(all: bool) -> Result<()> {
    require_token()?;
    let bot = create_bot()?;
    let username = fetch_bot_username(&bot).await?;
    let settings = Arc::new(BotSettings::from_env(username.as_deref()));
    let db_pool = Arc::new(open_pool()?);
    let messenger: Arc<dyn Messenger> = Arc::new(TelegramMessenger::new(bot));

    let broadcaster = Broadcaster::new(db_pool, messenger, settings);
    let report = broadcaster.send_subscription_reminders(!all).await?;
    println!(
        "✅ Subscription reminder: {} sent, {} failed, {} skipped",
        report.sent, report.failed, report.skipped
    );
    Ok(())
}

async fn run_bot() -> Result<()> {
    log::info!("Starting bot...");
    require_token()?;

    let db_pool = Arc::new(open_pool()?);
    {
        let conn = get_connection(&db_pool)?;
        match db::seed_faq(&conn) {
            Ok(0) => {}
            Ok(inserted) => log::info!("Seeded {} FAQ entries", inserted),
            Err(e) => log::warn!("Failed to seed FAQ: {}", e),
        }
    }

    let bot = create_bot()?;
    let bot_username = fetch_bot_username(&bot).await?;
    log::info!("Bot username: {:?}", bot_username);

    if let Err(e) = setup_bot_commands(&bot).await {
        log::warn!("Failed to register bot commands: {}", e);
    }

    let settings = Arc::new(BotSettings::from_env(bot_username.as_deref()));
    log_startup_configuration(&settings);

    // Liveness endpoint runs independently of the dispatcher
    let health_port = *config::network::HEALTH_PORT;
    tokio::spawn(async move {
        if let Err(e) = web_server::start_health_server(health_port).await {
            log::error!("Health server error: {}", e);
        }
    });

    let messenger: Arc<dyn Messenger> = Arc::new(TelegramMessenger::new(bot.clone()));
    let engine = Arc::new(Engine::new(
        Arc::clone(&db_pool),
        Arc::clone(&messenger),
        Arc::clone(&settings),
    ));

    let broadcaster = Broadcaster::new(Arc::clone(&db_pool), Arc::clone(&messenger), Arc::clone(&settings));
    let _scheduler = start_scheduler(Scheduler::new(
        broadcaster,
        Arc::clone(&settings),
        config::schedule::tick_interval(),
    ));

    let handler = schema(HandlerDeps::new(engine, bot_username));

    let mut retry_count = 0;
    let max_retries = config::retry::MAX_DISPATCHER_RETRIES;

    // Run the dispatcher with retry logic
    loop {
        let bot_clone = bot.clone();
        let handler_clone = handler.clone();

        // Run the dispatcher in its own task so a panic surfaces as a JoinError
        let handle = tokio::spawn(async move {
            use teloxide::update_listeners::Polling;

            let listener = Polling::builder(bot_clone.clone()).build();

            Dispatcher::builder(bot_clone, handler_clone)
                .dependencies(DependencyMap::new())
                .enable_ctrlc_handler()
                .build()
                .dispatch_with_listener(
                    listener,
                    LoggingErrorHandler::with_custom_text("An error from the update listener"),
                )
                .await
        });

        match handle.await {
            Ok(()) => {
                log::info!("Dispatcher shutdown gracefully");
                break;
            }
            Err(join_err) if join_err.is_panic() => {
                log::error!("Dispatcher panicked: {}", join_err);
                if retry_count >= max_retries {
                    log::error!("Max retries reached after panic. Exiting...");
                    break;
                }
                retry_count += 1;
                log::info!(
                    "Restarting dispatcher (attempt {}/{})...",
                    retry_count,
                    max_retries
                );
                sleep(config::retry::dispatcher_delay()).await;
            }
            Err(join_err) => {
                log::warn!("Dispatcher task was cancelled: {}", join_err);
                break;
            }
        }
    }

    Ok(())
}
