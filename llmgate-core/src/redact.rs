//! Credential redaction.
//!
//! Credentials never leave the process verbatim: listings, diagnostics and
//! logs replace them with a fixed-length placeholder so the output does not
//! even reveal the credential's length.

use serde_json::Value;

/// Fixed-length placeholder shown in place of a credential.
pub const REDACTED: &str = "********";

/// Shortest credential that is scrubbed out of free text.
///
/// A shorter value matches ordinary words and numbers, so replacing it
/// would corrupt provider output without protecting anything.
pub const MIN_SCRUB_LEN: usize = 8;

/// Returns the placeholder for a non-empty credential, or an empty string.
pub fn redact_credential(credential: &str) -> String {
    if credential.is_empty() {
        String::new()
    } else {
        REDACTED.to_string()
    }
}

/// Replaces every occurrence of `secret` in `text` with the placeholder.
///
/// Upstream error messages sometimes echo the key they rejected, so text
/// coming back from a provider is scrubbed before it is logged or returned.
/// Secrets shorter than [`MIN_SCRUB_LEN`] are left in place.
pub fn redact_secret(text: &str, secret: &str) -> String {
    if secret.len() < MIN_SCRUB_LEN {
        return text.to_string();
    }
    text.replace(secret, REDACTED)
}

/// Redacts a header value built from `secret`, whatever its length.
///
/// The credential is expected at the end of the value (`Bearer <key>`).
pub fn redact_header(value: &str, secret: &str) -> String {
    if secret.is_empty() {
        return value.to_string();
    }
    match value.strip_suffix(secret) {
        Some(scheme) => format!("{scheme}{REDACTED}"),
        None => value.replace(secret, REDACTED),
    }
}

/// Scrubs `secret` out of every string inside a JSON value, in place.
///
/// Same length rule as [`redact_secret`].
pub fn redact_value(value: &mut Value, secret: &str) {
    if secret.len() < MIN_SCRUB_LEN {
        return;
    }
    match value {
        Value::String(s) => {
            if s.contains(secret) {
                *s = redact_secret(s, secret);
            }
        }
        Value::Array(items) => {
            for item in items {
                redact_value(item, secret);
            }
        }
        Value::Object(map) => {
            for item in map.values_mut() {
                redact_value(item, secret);
            }
        }
        _ => {}
    }
}
