use chrono::Utc;

/// Milliseconds since the Unix epoch.
pub fn now_unix_millis() -> i64 {
    Utc::now().timestamp_millis()
}

pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339()
}
