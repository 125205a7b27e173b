//! Terminal output helpers for consistent CLI formatting

use crate::error::{CliError, CliResult};

/// Check if color output is enabled
fn use_color() -> bool {
    std::env::var("NO_COLOR").is_err()
}

/// Print a success message (green checkmark)
pub fn print_success(message: &str) {
    if use_color() {
        println!("\x1b[32m✓\x1b[0m {}", message);
    } else {
        println!("OK: {}", message);
    }
}

/// Print a warning message (yellow)
pub fn print_warning(message: &str) {
    if use_color() {
        eprintln!("\x1b[33mWarning:\x1b[0m {}", message);
    } else {
        eprintln!("Warning: {}", message);
    }
}

/// Print an info message (blue)
pub fn print_info(message: &str) {
    if use_color() {
        println!("\x1b[34mℹ\x1b[0m {}", message);
    } else {
        println!("Info: {}", message);
    }
}

/// Truncate a string for table display, handling Unicode safely.
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{truncated}...")
    }
}

/// Validate pagination parameters.
///
/// - `limit` must be between 1 and 500 inclusive
/// - `offset` must be >= 0
pub fn validate_pagination(limit: i64, offset: i64) -> CliResult<()> {
    if !(1..=500).contains(&limit) {
        return Err(CliError::Validation(
            "Limit must be between 1 and 500.".to_string(),
        ));
    }
    if offset < 0 {
        return Err(CliError::Validation("Offset must be >= 0.".to_string()));
    }
    Ok(())
}
