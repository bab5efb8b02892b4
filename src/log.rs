//! Coloured terminal output helpers.
//!
//! No logging facade is pulled in here; like the rest of this lineage, level
//! prefixes are plain `colored`-wrapped `println!`/`eprintln!` calls, kept
//! behind small functions so callers don't repeat the colour choices.

use std::sync::atomic::{AtomicU8, Ordering};

use colored::Colorize;

static VERBOSITY: AtomicU8 = AtomicU8::new(0);

/// Set from `-v`/`--verbose`'s repeat count; `debug` only prints once this is
/// at least 1.
pub fn set_verbosity(level: u8) {
    VERBOSITY.store(level, Ordering::Relaxed);
}

pub fn debug(msg: &str) {
    if VERBOSITY.load(Ordering::Relaxed) >= 1 {
        eprintln!("{} {}", "debug:".dimmed(), msg);
    }
}

pub fn info(msg: &str) {
    println!("{} {}", "info:".blue().bold(), msg);
}

pub fn success(msg: &str) {
    println!("{} {}", "✓".green().bold(), msg);
}

pub fn warn(msg: &str) {
    eprintln!("{} {}", "warning:".yellow().bold(), msg);
}

pub fn error(msg: &str) {
    eprintln!("{} {}", "error:".red().bold(), msg);
}

/// Render one line of deployment log output, prefixed per entity slug and
/// with `[builder] ...` lines demoted to grey (§4.7 step 9).
pub fn deploy_log_line(slug: &str, level: &str, text: &str) {
    let prefix = format!("[deploy {slug}]").dimmed();
    let line = if text.starts_with("[builder]") {
        text.dimmed().to_string()
    } else {
        match level {
            "error" => text.red().to_string(),
            "warn" => text.yellow().to_string(),
            _ => text.normal().to_string(),
        }
    };
    println!("{prefix} {line}");
}
