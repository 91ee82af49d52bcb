#![allow(clippy::module_name_repetitions)]
//! Small utilities: shell escaping, identifier validation, filesystem helpers.

pub mod exec;
pub mod fs;

/// Reject strings containing newline, carriage return, or NUL before embedding
/// into a shell command.
pub fn reject_newlines(s: &str, what: &str) -> Result<(), String> {
    if s.contains('\n') || s.contains('\r') || s.contains('\0') {
        Err(format!("refusing to use {what}: contains newline"))
    } else {
        Ok(())
    }
}

pub fn shell_join(args: &[String]) -> String {
    args.iter()
        .map(|a| shell_escape(a))
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn shell_escape(s: &str) -> String {
    if s.is_empty() {
        "''".to_string()
    } else if s
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || "-_=./:@".contains(c))
    {
        s.to_string()
    } else {
        let escaped = s.replace('\'', "'\"'\"'");
        format!("'{}'", escaped)
    }
}

/// BIDS labels (sub/ses values) must be non-empty ASCII alphanumerics.
/// Zero-padded numeric strings like "01" are the common case; mixed labels
/// such as "control01" are accepted.
pub fn is_valid_bids_label(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric())
}
