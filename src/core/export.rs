use crate::storage::db::UserReport;

/// Column header of the users export.
pub const USERS_CSV_HEADER: &str =
    "telegram_id,full_name,phone,age,region,language,referral_count,payment_status,created_at,payment_attempts";

/// Quotes a field when it contains a separator, quote or newline.
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\"").replace(['\n', '\r'], " "))
    } else {
        value.to_string()
    }
}

/// Exports users with their payment attempt counts to CSV format
pub fn users_to_csv(reports: &[UserReport]) -> String {
    let mut content = String::from(USERS_CSV_HEADER);
    content.push('\n');

    for report in reports {
        let user = &report.user;
        let age = user.age.map(|age| age.to_string()).unwrap_or_default();
        content.push_str(&format!(
            "{},{},{},{},{},{},{},{},{},{}\n",
            user.telegram_id,
            csv_field(&user.full_name),
            csv_field(&user.phone),
            age,
            csv_field(&user.region),
            user.language,
            user.referral_count,
            user.payment_status,
            user.created_at,
            report.payment_attempts
        ));
    }

    content
}
