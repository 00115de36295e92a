//! Session and mirror name generation.
//!
//! Sessions default to a timestamp name like `session-20250402-153012`.
//! Mirror files get a UUIDv7 so two live sessions never share one.

use chrono::{DateTime, Local, TimeZone};
use uuid::Uuid;

const SESSION_PREFIX: &str = "session";

/// Generate a session name from the current local time.
pub fn generate_session_name() -> String {
    session_name_at(&Local::now())
}

/// Session name for a given instant.
pub fn session_name_at<Tz: TimeZone>(at: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!("{SESSION_PREFIX}-{}", at.format("%Y%m%d-%H%M%S"))
}

/// Check that a user-supplied session name is usable as a file stem.
pub fn is_valid_session_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && name
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

/// Identity used to key the mirror file of one attached viewer.
pub fn generate_mirror_id() -> String {
    Uuid::now_v7().to_string()
}
