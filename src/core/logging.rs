//! Logging initialization and startup diagnostics
//!
//! This module provides:
//! - Logger initialization (console + file)
//! - A summary of the effective configuration at startup

use anyhow::Result;
use simplelog::*;
use std::fs::OpenOptions;

use crate::core::config::BotSettings;

/// Initialize logger for both console and file output
///
/// # Arguments
/// * `log_file_path` - Path to the log file (appended to across restarts)
///
/// # Returns
/// * `Ok(())` - Logger initialized successfully
/// * `Err(anyhow::Error)` - Failed to initialize logger
pub fn init_logger(log_file_path: &str) -> Result<()> {
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file_path)
        .map_err(|e| anyhow::anyhow!("Failed to open log file: {}", e))?;

    let config = ConfigBuilder::new()
        .add_filter_ignore_str("hyper")
        .add_filter_ignore_str("reqwest")
        .build();

    CombinedLogger::init(vec![
        TermLogger::new(LevelFilter::Info, config.clone(), TerminalMode::Mixed, ColorChoice::Auto),
        WriteLogger::new(LevelFilter::Debug, config, log_file),
    ])
    .map_err(|e| anyhow::anyhow!("Failed to initialize logger: {}", e))?;

    Ok(())
}

/// Logs the effective settings so misconfiguration is visible right after startup
pub fn log_startup_configuration(settings: &BotSettings) {
    log::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    log::info!("⚙️  Configuration");
    log::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    if settings.admin_chat_id == 0 {
        log::warn!("⚠️  ADMIN_GROUP_ID: not set, payments and questions will not reach staff");
    } else {
        log::info!("✅ ADMIN_GROUP_ID: {}", settings.admin_chat_id);
    }

    if settings.secret_group_link.is_empty() {
        log::warn!("⚠️  SECRET_GROUP_LINK: not set, approval notices will carry an empty link");
    } else {
        log::info!("✅ SECRET_GROUP_LINK: configured");
    }

    if settings.bot_username.is_empty() {
        log::warn!("⚠️  Bot username unknown, referral links will be incomplete");
    } else {
        log::info!("✅ Referral links via @{}", settings.bot_username);
    }

    log::info!("📢 Channel: {}", settings.channel_username);
    log::info!(
        "💵 Base price: {} | admin language: {}",
        crate::core::discount::format_price(settings.base_price_cents),
        settings.admin_language
    );
    log::info!(
        "⏰ Lesson reminders at {:?}h, monthly discount at {}h",
        settings.lesson_reminder_hours,
        settings.monthly_discount_hour
    );
}
