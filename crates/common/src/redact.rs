/// Placeholder printed instead of a secret in `Debug` output.
pub const REDACTED: &str = "[REDACTED]";

/// Number of leading characters kept by [`fingerprint`].
const FINGERPRINT_CHARS: usize = 4;

/// Short, log-safe identifier for a secret token.
///
/// Keeps the first few characters (enough to tell `xoxb-` bot tokens from
/// `xoxp-` user tokens) and replaces the rest with an ellipsis. Short or empty
/// secrets collapse to [`REDACTED`] so nothing meaningful leaks.
pub fn fingerprint(secret: &str) -> String {
    let trimmed = secret.trim();
    if trimmed.chars().count() <= FINGERPRINT_CHARS * 2 {
        return REDACTED.to_string();
    }
    let prefix: String = trimmed.chars().take(FINGERPRINT_CHARS).collect();
    format!("{prefix}…")
}
