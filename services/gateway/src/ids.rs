use chrono::{DateTime, SubsecRound, Utc};
use uuid::Uuid;

/// Generate a fresh record id
pub fn new_record_id() -> String {
    Uuid::new_v4().to_string()
}

/// Current time truncated to milliseconds, so stored timestamps
/// serialize as `2026-01-01T00:00:00.123Z`
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}
