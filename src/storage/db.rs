use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{params, Connection, OptionalExtension, Result, Row};
use serde::Serialize;
use strum::{AsRefStr, Display, EnumString};

use crate::core::error::{AppError, AppResult};
use crate::i18n::Language;

pub type DbPool = Pool<SqliteConnectionManager>;
pub type DbConnection = PooledConnection<SqliteConnectionManager>;

/// Create a new database connection pool
///
/// Initializes a connection pool with up to 10 connections, enables foreign keys
/// on every connection and runs the embedded schema migrations.
///
/// # Example
///
/// ```no_run
/// use coursebot::storage::db;
///
/// let pool = db::create_pool("coursebot.sqlite")?;
/// # Ok::<(), coursebot::core::error::AppError>(())
/// ```
pub fn create_pool(database_path: &str) -> AppResult<DbPool> {
    let manager = SqliteConnectionManager::file(database_path)
        .with_init(|conn| conn.execute_batch("PRAGMA foreign_keys = ON;"));
    let pool = Pool::builder()
        .max_size(10) // Maximum 10 connections in the pool
        .build(manager)?;

    let mut conn = pool.get()?;
    crate::storage::migrations::run_migrations(&mut conn).map_err(|e| AppError::Migration(format!("{:#}", e)))?;

    Ok(pool)
}

/// Get a connection from the pool
///
/// The connection is returned to the pool when dropped.
pub fn get_connection(pool: &DbPool) -> Result<DbConnection, r2d2::Error> {
    pool.get()
}

// ==================== Users ====================

/// A registered user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    pub telegram_id: i64,
    pub username: Option<String>,
    pub full_name: String,
    pub phone: String,
    pub age: Option<u32>,
    pub region: String,
    pub language: Language,
    pub referrer_id: Option<i64>,
    /// Number of users who registered with this user as referrer.
    pub referral_count: u32,
    /// True once any payment of this user has been approved.
    pub payment_status: bool,
    pub is_active: bool,
    pub created_at: String,
}

const USER_COLUMNS: &str = "telegram_id, username, full_name, phone, age, region, language, referrer_id, \
     referral_count, payment_status, is_active, created_at";

fn user_from_row(row: &Row<'_>) -> Result<User> {
    let language: String = row.get(6)?;
    Ok(User {
        telegram_id: row.get(0)?,
        username: row.get(1)?,
        full_name: row.get(2)?,
        phone: row.get(3)?,
        age: row.get(4)?,
        region: row.get(5)?,
        language: Language::from_code_or_default(&language),
        referrer_id: row.get(7)?,
        referral_count: row.get(8)?,
        payment_status: row.get(9)?,
        is_active: row.get(10)?,
        created_at: row.get(11)?,
    })
}

/// Profile collected by the registration dialogue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub telegram_id: i64,
    pub username: Option<String>,
    pub full_name: String,
    pub phone: String,
    pub age: Option<u32>,
    pub region: String,
    pub language: Language,
    /// Referrer id parsed from the start token; validated before it is stored.
    pub referrer_candidate: Option<i64>,
}

/// What [`register_user`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationOutcome {
    /// A new row was inserted; `referrer` is the user whose counter was incremented.
    Created { referrer: Option<i64> },
    /// The row existed and its profile fields were overwritten.
    Updated,
}

pub fn user_exists(conn: &Connection, telegram_id: i64) -> Result<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM users WHERE telegram_id = ?1)",
        params![telegram_id],
        |row| row.get(0),
    )
}

/// Creates or overwrites a user and credits the referrer exactly once.
///
/// The referrer is honoured only when the row is new, the candidate exists and is
/// not the registering user. Re-registration keeps the original `referrer_id`.
/// Upsert and counter increment run in one transaction.
pub fn register_user(conn: &Connection, user: &NewUser) -> Result<RegistrationOutcome> {
    let tx = conn.unchecked_transaction()?;

    if user_exists(&tx, user.telegram_id)? {
        tx.execute(
            "UPDATE users SET username = ?2, full_name = ?3, phone = ?4, age = ?5, region = ?6, language = ?7, is_active = 1
             WHERE telegram_id = ?1",
            params![
                user.telegram_id,
                user.username,
                user.full_name,
                user.phone,
                user.age,
                user.region,
                user.language.code()
            ],
        )?;
        tx.commit()?;
        return Ok(RegistrationOutcome::Updated);
    }

    let referrer = match user.referrer_candidate {
        Some(candidate) if candidate == user.telegram_id => {
            log::warn!("User {} tried to refer themselves, ignoring", user.telegram_id);
            None
        }
        Some(candidate) => {
            if user_exists(&tx, candidate)? {
                Some(candidate)
            } else {
                log::warn!(
                    "Referrer {} for user {} does not exist, ignoring",
                    candidate,
                    user.telegram_id
                );
                None
            }
        }
        None => None,
    };

    tx.execute(
        "INSERT INTO users (telegram_id, username, full_name, phone, age, region, language, referrer_id)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            user.telegram_id,
            user.username,
            user.full_name,
            user.phone,
            user.age,
            user.region,
            user.language.code(),
            referrer
        ],
    )?;

    if let Some(referrer_id) = referrer {
        tx.execute(
            "UPDATE users SET referral_count = referral_count + 1 WHERE telegram_id = ?1",
            params![referrer_id],
        )?;
    }

    tx.commit()?;
    Ok(RegistrationOutcome::Created { referrer })
}

pub fn get_user(conn: &Connection, telegram_id: i64) -> Result<Option<User>> {
    conn.query_row(
        &format!("SELECT {} FROM users WHERE telegram_id = ?1", USER_COLUMNS),
        params![telegram_id],
        user_from_row,
    )
    .optional()
}

/// Returns `false` when no user row matched.
pub fn update_user_language(conn: &Connection, telegram_id: i64, language: Language) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE users SET language = ?2 WHERE telegram_id = ?1",
        params![telegram_id, language.code()],
    )?;
    Ok(changed > 0)
}

pub fn update_user_name(conn: &Connection, telegram_id: i64, full_name: &str) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE users SET full_name = ?2 WHERE telegram_id = ?1",
        params![telegram_id, full_name],
    )?;
    Ok(changed > 0)
}

pub fn update_user_phone(conn: &Connection, telegram_id: i64, phone: &str) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE users SET phone = ?2 WHERE telegram_id = ?1",
        params![telegram_id, phone],
    )?;
    Ok(changed > 0)
}

pub fn update_user_age(conn: &Connection, telegram_id: i64, age: Option<u32>) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE users SET age = ?2 WHERE telegram_id = ?1",
        params![telegram_id, age],
    )?;
    Ok(changed > 0)
}

pub fn update_user_region(conn: &Connection, telegram_id: i64, region: &str) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE users SET region = ?2 WHERE telegram_id = ?1",
        params![telegram_id, region],
    )?;
    Ok(changed > 0)
}

/// All users, newest first.
pub fn get_all_users(conn: &Connection) -> Result<Vec<User>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM users ORDER BY created_at DESC, telegram_id DESC",
        USER_COLUMNS
    ))?;
    let rows = stmt.query_map([], user_from_row)?;
    let items = rows.collect::<Result<Vec<_>>>()?;
    Ok(items)
}

/// Recipients of lesson reminders: paid and active.
pub fn get_users_for_notification(conn: &Connection) -> Result<Vec<User>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM users WHERE payment_status = 1 AND is_active = 1 ORDER BY telegram_id",
        USER_COLUMNS
    ))?;
    let rows = stmt.query_map([], user_from_row)?;
    let items = rows.collect::<Result<Vec<_>>>()?;
    Ok(items)
}

/// Referral figures shown to a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReferralStats {
    /// Stored counter of referred users.
    pub referral_count: u32,
    /// Referred users whose payment has been approved.
    pub paid_referrals: u32,
}

pub fn get_referral_stats(conn: &Connection, telegram_id: i64) -> Result<ReferralStats> {
    let referral_count: Option<u32> = conn
        .query_row(
            "SELECT referral_count FROM users WHERE telegram_id = ?1",
            params![telegram_id],
            |row| row.get(0),
        )
        .optional()?;
    let paid_referrals: u32 = conn.query_row(
        "SELECT COUNT(*) FROM users WHERE referrer_id = ?1 AND payment_status = 1",
        params![telegram_id],
        |row| row.get(0),
    )?;

    Ok(ReferralStats {
        referral_count: referral_count.unwrap_or(0),
        paid_referrals,
    })
}

/// Recipient of the monthly discount summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscountCandidate {
    pub telegram_id: i64,
    pub language: Language,
    pub paid_referrals: u32,
}

/// Paid users with at least one paid referral.
pub fn get_discount_candidates(conn: &Connection) -> Result<Vec<DiscountCandidate>> {
    let mut stmt = conn.prepare(
        "SELECT u.telegram_id, u.language, COUNT(r.telegram_id)
         FROM users u
         JOIN users r ON r.referrer_id = u.telegram_id AND r.payment_status = 1
         WHERE u.payment_status = 1
         GROUP BY u.telegram_id, u.language
         ORDER BY u.telegram_id",
    )?;
    let rows = stmt.query_map([], |row| {
        let language: String = row.get(1)?;
        Ok(DiscountCandidate {
            telegram_id: row.get(0)?,
            language: Language::from_code_or_default(&language),
            paid_referrals: row.get(2)?,
        })
    })?;
    let items = rows.collect::<Result<Vec<_>>>()?;
    Ok(items)
}

// ==================== Payments ====================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Approved,
    Rejected,
}

impl ToSql for PaymentStatus {
    fn to_sql(&self) -> Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_ref()))
    }
}

impl FromSql for PaymentStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e: strum::ParseError| FromSqlError::Other(Box::new(e)))
    }
}

/// Admin decision on a pending payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Approve,
    Reject,
}

impl Verdict {
    pub fn status(self) -> PaymentStatus {
        match self {
            Verdict::Approve => PaymentStatus::Approved,
            Verdict::Reject => PaymentStatus::Rejected,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payment {
    pub id: i64,
    pub user_id: i64,
    pub screenshot_file_id: String,
    pub status: PaymentStatus,
    /// Admin chat message carrying the approve/reject buttons.
    pub admin_message_id: Option<i32>,
    pub created_at: String,
}

fn payment_from_row(row: &Row<'_>) -> Result<Payment> {
    Ok(Payment {
        id: row.get(0)?,
        user_id: row.get(1)?,
        screenshot_file_id: row.get(2)?,
        status: row.get(3)?,
        admin_message_id: row.get(4)?,
        created_at: row.get(5)?,
    })
}

/// Creates a pending payment and returns its id.
pub fn add_payment(conn: &Connection, user_id: i64, screenshot_file_id: &str) -> Result<i64> {
    conn.execute(
        "INSERT INTO payments (user_id, screenshot_file_id, status) VALUES (?1, ?2, ?3)",
        params![user_id, screenshot_file_id, PaymentStatus::Pending],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn set_payment_admin_message(conn: &Connection, payment_id: i64, admin_message_id: i32) -> Result<()> {
    conn.execute(
        "UPDATE payments SET admin_message_id = ?2 WHERE id = ?1",
        params![payment_id, admin_message_id],
    )?;
    Ok(())
}

pub fn get_payment(conn: &Connection, payment_id: i64) -> Result<Option<Payment>> {
    conn.query_row(
        "SELECT id, user_id, screenshot_file_id, status, admin_message_id, created_at FROM payments WHERE id = ?1",
        params![payment_id],
        payment_from_row,
    )
    .optional()
}

/// Result of [`resolve_payment`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The payment moved out of `pending` by this call.
    Resolved(Payment),
    /// The payment had already been resolved; nothing changed.
    AlreadyResolved(Payment),
    NotFound,
}

/// Moves a pending payment to its terminal status.
///
/// Only a `pending` row is updated, so a second approval or rejection is a no-op.
/// Approval also sets the owner's `payment_status`, which is never reset.
pub fn resolve_payment(conn: &Connection, payment_id: i64, verdict: Verdict) -> Result<Resolution> {
    let tx = conn.unchecked_transaction()?;

    let changed = tx.execute(
        "UPDATE payments SET status = ?2 WHERE id = ?1 AND status = ?3",
        params![payment_id, verdict.status(), PaymentStatus::Pending],
    )?;

    if changed == 0 {
        let existing = get_payment(&tx, payment_id)?;
        tx.commit()?;
        return Ok(existing.map_or(Resolution::NotFound, Resolution::AlreadyResolved));
    }

    if verdict == Verdict::Approve {
        tx.execute(
            "UPDATE users SET payment_status = 1 WHERE telegram_id = (SELECT user_id FROM payments WHERE id = ?1)",
            params![payment_id],
        )?;
    }

    let payment = get_payment(&tx, payment_id)?.ok_or(rusqlite::Error::QueryReturnedNoRows)?;
    tx.commit()?;
    Ok(Resolution::Resolved(payment))
}

// ==================== Questions ====================

/// Stores a question and returns its id.
pub fn add_question(conn: &Connection, user_id: i64, text: &str) -> Result<i64> {
    conn.execute(
        "INSERT INTO questions (user_id, question_text) VALUES (?1, ?2)",
        params![user_id, text],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Marks every open question of the user as answered; returns how many changed.
pub fn mark_questions_answered(conn: &Connection, user_id: i64) -> Result<usize> {
    conn.execute(
        "UPDATE questions SET answered = 1 WHERE user_id = ?1 AND answered = 0",
        params![user_id],
    )
}

pub fn count_open_questions(conn: &Connection, user_id: i64) -> Result<u32> {
    conn.query_row(
        "SELECT COUNT(*) FROM questions WHERE user_id = ?1 AND answered = 0",
        params![user_id],
        |row| row.get(0),
    )
}

// ==================== FAQ ====================

/// FAQ entry in one language.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaqEntry {
    pub id: i64,
    pub question: String,
    pub answer: String,
}

/// FAQ entry with every language column, as entered by staff.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewFaq {
    pub question_uz: Option<String>,
    pub answer_uz: Option<String>,
    pub question_ru: Option<String>,
    pub answer_ru: Option<String>,
    pub question_en: Option<String>,
    pub answer_en: Option<String>,
}

/// Entries that have a question in the given language.
pub fn get_faq(conn: &Connection, language: Language) -> Result<Vec<FaqEntry>> {
    let (question_col, answer_col) = match language {
        Language::Uz => ("question_uz", "answer_uz"),
        Language::Ru => ("question_ru", "answer_ru"),
        Language::En => ("question_en", "answer_en"),
    };
    let mut stmt = conn.prepare(&format!(
        "SELECT id, {q}, COALESCE({a}, '') FROM faq WHERE {q} IS NOT NULL AND TRIM({q}) <> '' ORDER BY id",
        q = question_col,
        a = answer_col
    ))?;
    let rows = stmt.query_map([], |row| {
        Ok(FaqEntry {
            id: row.get(0)?,
            question: row.get(1)?,
            answer: row.get(2)?,
        })
    })?;
    let items = rows.collect::<Result<Vec<_>>>()?;
    Ok(items)
}

pub fn add_faq(conn: &Connection, faq: &NewFaq) -> Result<i64> {
    conn.execute(
        "INSERT INTO faq (question_uz, answer_uz, question_ru, answer_ru, question_en, answer_en)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            faq.question_uz,
            faq.answer_uz,
            faq.question_ru,
            faq.answer_ru,
            faq.question_en,
            faq.answer_en
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

fn seed_entry(q_uz: &str, a_uz: &str, q_ru: &str, a_ru: &str, q_en: &str, a_en: &str) -> NewFaq {
    NewFaq {
        question_uz: Some(q_uz.to_string()),
        answer_uz: Some(a_uz.to_string()),
        question_ru: Some(q_ru.to_string()),
        answer_ru: Some(a_ru.to_string()),
        question_en: Some(q_en.to_string()),
        answer_en: Some(a_en.to_string()),
    }
}

/// Inserts the starter FAQ set when the table is empty. Returns the number inserted.
pub fn seed_faq(conn: &Connection) -> Result<usize> {
    let existing: i64 = conn.query_row("SELECT COUNT(*) FROM faq", [], |row| row.get(0))?;
    if existing > 0 {
        return Ok(0);
    }

    let entries = [
        seed_entry(
            "ESL kursi qancha vaqt davom etadi?",
            "ESL kursi 3 oy davom etadi, haftada 3 marta dars bo'ladi.",
            "Сколько времени длится курс ESL?",
            "Курс ESL длится 3 месяца, занятия проводятся 3 раза в неделю.",
            "How long does the ESL course last?",
            "The ESL course lasts 3 months, with classes 3 times a week.",
        ),
        seed_entry(
            "Kurs narxi qancha?",
            "Kurs narxi oyiga $10. Referal orqali chegirmalar mavjud.",
            "Сколько стоит курс?",
            "Курс стоит $10 в месяц. Доступны скидки по реферальной программе.",
            "How much does the course cost?",
            "The course costs $10 per month. Discounts are available through the referral program.",
        ),
        seed_entry(
            "Referal tizimi qanday ishlaydi?",
            "Har bir to'lov qilgan referal uchun chegirma olasiz. 100+ referal uchun kurs bepul!",
            "Как работает реферальная система?",
            "Вы получаете скидку за каждого оплатившего реферала. При 100+ рефералах курс бесплатный!",
            "How does the referral system work?",
            "You get a discount for each paying referral. With 100+ referrals, the course is free!",
        ),
    ];

    let tx = conn.unchecked_transaction()?;
    for entry in &entries {
        add_faq(&tx, entry)?;
    }
    tx.commit()?;
    Ok(entries.len())
}

// ==================== Admin reports ====================

/// User row plus the number of payments they submitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserReport {
    #[serde(flatten)]
    pub user: User,
    pub payment_attempts: u32,
}

pub fn get_users_with_payment_attempts(conn: &Connection) -> Result<Vec<UserReport>> {
    let mut stmt = conn.prepare(
        "SELECT u.telegram_id, u.username, u.full_name, u.phone, u.age, u.region, u.language, u.referrer_id,
                u.referral_count, u.payment_status, u.is_active, u.created_at, COUNT(p.id)
         FROM users u
         LEFT JOIN payments p ON p.user_id = u.telegram_id
         GROUP BY u.telegram_id
         ORDER BY u.created_at DESC, u.telegram_id DESC",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(UserReport {
            user: user_from_row(row)?,
            payment_attempts: row.get(12)?,
        })
    })?;
    let items = rows.collect::<Result<Vec<_>>>()?;
    Ok(items)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct PaymentStats {
    pub total: u32,
    pub approved: u32,
    pub rejected: u32,
    pub pending: u32,
}

pub fn get_payment_stats(conn: &Connection) -> Result<PaymentStats> {
    conn.query_row(
        "SELECT COUNT(*),
                COALESCE(SUM(status = 'approved'), 0),
                COALESCE(SUM(status = 'rejected'), 0),
                COALESCE(SUM(status = 'pending'), 0)
         FROM payments",
        [],
        |row| {
            Ok(PaymentStats {
                total: row.get(0)?,
                approved: row.get(1)?,
                rejected: row.get(2)?,
                pending: row.get(3)?,
            })
        },
    )
}

/// Per-referrer figures for the admin panel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReferrerReport {
    pub telegram_id: i64,
    pub full_name: String,
    pub referral_count: u32,
    pub actual_referrals: u32,
    pub paid_referrals: u32,
}

pub fn get_referral_report(conn: &Connection) -> Result<Vec<ReferrerReport>> {
    let mut stmt = conn.prepare(
        "SELECT u.telegram_id, u.full_name, u.referral_count,
                COUNT(r.telegram_id),
                COALESCE(SUM(r.payment_status = 1), 0)
         FROM users u
         LEFT JOIN users r ON r.referrer_id = u.telegram_id
         WHERE u.referral_count > 0
         GROUP BY u.telegram_id, u.full_name, u.referral_count
         ORDER BY u.referral_count DESC, u.telegram_id",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(ReferrerReport {
            telegram_id: row.get(0)?,
            full_name: row.get(1)?,
            referral_count: row.get(2)?,
            actual_referrals: row.get(3)?,
            paid_referrals: row.get(4)?,
        })
    })?;
    let items = rows.collect::<Result<Vec<_>>>()?;
    Ok(items)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingPayment {
    pub payment_id: i64,
    pub user_id: i64,
    pub screenshot_file_id: String,
    pub full_name: String,
    pub phone: String,
    pub region: String,
    pub created_at: String,
}

/// Pending payments, oldest first.
pub fn get_pending_payments(conn: &Connection) -> Result<Vec<PendingPayment>> {
    let mut stmt = conn.prepare(
        "SELECT p.id, p.user_id, p.screenshot_file_id, u.full_name, u.phone, u.region, p.created_at
         FROM payments p
         JOIN users u ON u.telegram_id = p.user_id
         WHERE p.status = 'pending'
         ORDER BY p.created_at ASC, p.id ASC",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(PendingPayment {
            payment_id: row.get(0)?,
            user_id: row.get(1)?,
            screenshot_file_id: row.get(2)?,
            full_name: row.get(3)?,
            phone: row.get(4)?,
            region: row.get(5)?,
            created_at: row.get(6)?,
        })
    })?;
    let items = rows.collect::<Result<Vec<_>>>()?;
    Ok(items)
}
