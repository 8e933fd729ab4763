//! Shared utility functions used across the codebase.

use rand::Rng;
use std::time::Duration;

const SESSION_ID_CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Generate the per-run correlation id sent with registration requests:
/// five random alphanumerics lowercased, then the current Unix time in
/// milliseconds, as one concatenated string.
pub fn generate_session_id<R: Rng>(rng: &mut R) -> String {
    let prefix: String = (0..5)
        .map(|_| SESSION_ID_CHARSET[rng.gen_range(0..SESSION_ID_CHARSET.len())] as char)
        .collect();
    format!(
        "{}{}",
        prefix.to_lowercase(),
        chrono::Utc::now().timestamp_millis()
    )
}

/// Format a duration as `Nd Nh Nm Ns` for wait logging.
pub fn format_duration(duration: Duration) -> String {
    let total_seconds = duration.as_secs();

    let days = total_seconds / (60 * 60 * 24);
    let hours = (total_seconds % (60 * 60 * 24)) / (60 * 60);
    let minutes = (total_seconds % (60 * 60)) / 60;
    let seconds = total_seconds % 60;

    format!("{}d {}h {}m {}s", days, hours, minutes, seconds)
}
