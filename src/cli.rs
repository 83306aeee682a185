use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "coursebot")]
#[command(author, version, about = "Telegram bot for a paid course", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Run the bot (default)
    Run,

    /// List all users with their payment attempts
    Users {
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Payment totals by status
    PaymentStats {
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Referrers with referred and paid counts
    ReferralStats {
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Pending payments, oldest first
    PendingPayments {
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Export users to a CSV file
    ExportUsers {
        /// Output file path
        #[arg(short, long, default_value = "users.csv")]
        output: String,
    },

    /// Add an FAQ entry; each language is optional
    AddFaq {
        #[arg(long)]
        question_uz: Option<String>,
        #[arg(long)]
        answer_uz: Option<String>,
        #[arg(long)]
        question_ru: Option<String>,
        #[arg(long)]
        answer_ru: Option<String>,
        #[arg(long)]
        question_en: Option<String>,
        #[arg(long)]
        answer_en: Option<String>,
    },

    /// Insert the initial FAQ entries when the table is empty
    SeedFaq,

    /// Send the channel subscription prompt to registered users
    RemindSubscription {
        /// Message every user instead of only those not in the channel
        #[arg(long)]
        all: bool,
    },
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
