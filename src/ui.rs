use colored::{ColoredString, Colorize};
use enactor::{EntryOutcome, NodeStatus, StepStatus};

/// Print an info message
pub fn info(msg: &str) {
    println!("{} {}", "ℹ".blue(), msg);
}

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

// ============================================================================
// Run Formatting
// ============================================================================

/// Colored label for a node status
pub fn status_label(status: NodeStatus) -> ColoredString {
    let text = status.as_str();
    match status {
        NodeStatus::Healthy => text.green(),
        NodeStatus::Created | NodeStatus::Configured => text.blue(),
        NodeStatus::Failed => text.red(),
        NodeStatus::Pending | NodeStatus::Deleted => text.dimmed(),
    }
}

/// One-symbol marker for a record entry
pub fn outcome_marker(outcome: &EntryOutcome) -> ColoredString {
    match outcome {
        EntryOutcome::Succeeded => "✓".green(),
        EntryOutcome::Failed { .. } => "✗".red(),
        EntryOutcome::Skipped { .. } => "-".dimmed(),
    }
}

/// Short text for a rollback step status
pub fn step_status(status: &StepStatus) -> String {
    match status {
        StepStatus::Recorded => "recorded".to_string(),
        StepStatus::Succeeded => "done".to_string(),
        StepStatus::Failed { error } => format!("failed: {error}"),
        StepStatus::NotAttempted { reason } => format!("not attempted: {reason}"),
    }
}

/// Format a duration the way run summaries print it
pub fn format_duration(duration: std::time::Duration) -> String {
    let secs = duration.as_secs();
    if secs >= 60 {
        format!("{}m {:02}s", secs / 60, secs % 60)
    } else {
        format!("{:.1}s", duration.as_secs_f64())
    }
}
