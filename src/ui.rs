use colored::{ColoredString, Colorize};
use tracker::Status;

/// Print a success message
pub fn success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

/// Print a warning message
pub fn warn(msg: &str) {
    println!("{} {}", "⚠".yellow(), msg);
}

/// Print an error message
pub fn error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

/// Print a dim/muted message
pub fn dim(msg: &str) {
    println!("  {}", msg.dimmed());
}

/// Print a header/title
pub fn header(title: &str) {
    println!();
    println!("{}", title.bold());
    println!("{}", "─".repeat(title.chars().count()).dimmed());
}

/// Print a section header
pub fn section(title: &str) {
    println!();
    println!("{}", title.cyan().bold());
}

/// Print a key-value pair
pub fn kv(key: &str, value: &str) {
    println!("  {}: {}", key.dimmed(), value);
}

/// Colour a status string
pub fn status(status: &str) -> ColoredString {
    match status.parse::<Status>() {
        Ok(Status::Updated) => status.green(),
        Ok(Status::Failed) => status.red().bold(),
        Ok(Status::Skipped | Status::WhyRun) => status.yellow(),
        Ok(Status::UpToDate) => status.normal(),
        Ok(Status::Unprocessed | Status::UnprocessedPostFailure) | Err(_) => status.dimmed(),
    }
}

/// Nesting prefix, one marker per level
pub fn nest_prefix(level: u64) -> String {
    "> ".repeat(level as usize)
}

/// Format milliseconds as human-readable duration
pub fn format_duration_ms(ms: u64) -> String {
    if ms >= 60_000 {
        format!("{}m {:02}s", ms / 60_000, (ms % 60_000) / 1000)
    } else if ms >= 1000 {
        format!("{:.1}s", ms as f64 / 1000.0)
    } else {
        format!("{ms} ms")
    }
}

// ============================================================================
// Tests
// ============================================================================
