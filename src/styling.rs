//! Terminal styling for user-facing messages.
//!
//! All output goes through [`anstream`]'s auto-detecting streams, so ANSI
//! codes are stripped when stdout/stderr is not a terminal (and when
//! `NO_COLOR` is set - anstream honours it natively). Use
//! [`color_print::cformat!`] with HTML-like tags for inline styling:
//!
//! ```
//! use color_print::cformat;
//!
//! let branch = "feature";
//! let msg = cformat!("<green>Merged <bold>{branch}</></>");
//! ```
//!
//! Semantic mapping:
//! - Errors: `<red>...</>`
//! - Warnings: `<yellow>...</>`
//! - Progress / phase headers: `<blue>...</>`
//! - Success: `<green>...</>`
//! - Hints: `<dim>...</>`

use color_print::cformat;

// Re-export anstream's macros so callers get colour-aware printing by
// importing from one place.
pub use anstream::{eprint, eprintln, print, println};

/// Disable colour output for the rest of the process.
///
/// Called once at startup when `--no-color` is passed. The `NO_COLOR`
/// environment variable needs no handling here; anstream checks it on
/// every write.
pub fn disable_color() {
    anstream::ColorChoice::Never.write_global();
}

/// Format an error message in red.
pub fn error_message(content: impl AsRef<str>) -> String {
    cformat!("<red>{}</>", content.as_ref())
}

/// Format a warning message in yellow.
pub fn warning_message(content: impl AsRef<str>) -> String {
    cformat!("<yellow>{}</>", content.as_ref())
}

/// Format a success message in green.
pub fn success_message(content: impl AsRef<str>) -> String {
    cformat!("<green>{}</>", content.as_ref())
}

/// Format a progress / phase header in blue.
pub fn progress_message(content: impl AsRef<str>) -> String {
    cformat!("<blue>{}</>", content.as_ref())
}

/// Format a hint (next-command suggestion) in blue, matching the way
/// remediation commands are quoted inline elsewhere.
pub fn hint_command(content: impl AsRef<str>) -> String {
    cformat!("<blue>{}</>", content.as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_helpers_wrap_content() {
        // cformat always emits ANSI; anstream strips it at write time.
        assert!(error_message("boom").contains("boom"));
        assert!(success_message("done").contains("done"));
        assert!(warning_message("careful").contains("careful"));
        assert!(progress_message("working").contains("working"));
    }
}
