use teloxide::ApiError;
use thiserror::Error;

/// Centralized error types for the application
///
/// Library code returns [`AppResult`]; the binary and the admin CLI wrap it in
/// `anyhow` at the edges. Uses `thiserror` for automatic conversion and display.
///
/// # Example
///
/// ```no_run
/// use coursebot::core::error::AppError;
///
/// fn handle_error(err: AppError) {
///     log::error!("Error: {}", err);
/// }
/// ```
#[derive(Error, Debug)]
pub enum AppError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Database connection pool errors
    #[error("Database pool error: {0}")]
    DatabasePool(#[from] r2d2::Error),

    /// Schema migration errors
    #[error("Migration error: {0}")]
    Migration(String),

    /// Telegram API errors
    #[error("Telegram error: {0}")]
    Telegram(#[from] teloxide::RequestError),

    /// Outbound delivery failed for a reason the transport did not classify
    #[error("Delivery error: {0}")]
    Delivery(String),

    /// Event for a user that has no stored record
    #[error("User {0} is not registered")]
    NotRegistered(i64),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Anyhow errors (for general error handling)
    #[error("Application error: {0}")]
    Anyhow(#[from] anyhow::Error),
}

/// Type alias for Result with AppError
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    /// True when the failure came from the outbound side (blocked bot, deleted chat, network).
    pub fn is_delivery(&self) -> bool {
        matches!(self, AppError::Telegram(_) | AppError::Delivery(_))
    }

    /// True when Telegram reports that the user is not in the chat that was queried.
    pub fn is_user_absent(&self) -> bool {
        match self {
            AppError::Telegram(teloxide::RequestError::Api(ApiError::UserNotFound)) => true,
            AppError::Telegram(teloxide::RequestError::Api(ApiError::Unknown(description))) => {
                let description = description.to_lowercase();
                ["user not found", "user is not a member", "member not found"]
                    .iter()
                    .any(|needle| description.contains(needle))
            }
            _ => false,
        }
    }
}
