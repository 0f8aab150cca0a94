//! Utilities for handling sensitive data

/// Patterns that identify sensitive field names
pub const SENSITIVE_PATTERNS: [&str; 7] = [
    "password", "secret", "token", "otp", "key", "credential", "hash",
];

/// Check if a field name refers to sensitive data
pub fn is_sensitive(key: &str) -> bool {
    let lowercase_key = key.to_lowercase();
    SENSITIVE_PATTERNS
        .iter()
        .any(|pattern| lowercase_key.contains(pattern))
}

/// Mask sensitive data with asterisks while preserving some information
///
/// - For values < 12 chars: last 2 chars visible, rest masked
/// - For values >= 12 chars: last 4 chars visible, rest masked
/// - Dashes ('-') and dots ('.') keep their positions, so the shape of a
///   JWT or UUID stays recognisable in logs
pub fn mask_sensitive_value(value: &str) -> String {
    let value_len = value.chars().count();
    let visible_suffix_len = if value_len >= 12 { 4 } else { 2.min(value_len) };
    let prefix_len = value_len.saturating_sub(visible_suffix_len);

    value
        .chars()
        .enumerate()
        .map(|(i, c)| {
            if i >= prefix_len || c == '-' || c == '.' {
                c
            } else {
                '*'
            }
        })
        .collect()
}

/// Mask an email address, keeping the first character and the domain
pub fn mask_email(email: &str) -> String {
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() => {
            let first: String = local.chars().take(1).collect();
            format!("{}***@{}", first, domain)
        }
        _ => mask_sensitive_value(email),
    }
}
