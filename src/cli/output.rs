use colored::*;

use crate::verify::Diagnostic;

/// Print a warning message
pub fn warning(msg: &str) {
    eprintln!("{} {}", "⚠".yellow(), msg.yellow());
}

/// Print an info message
pub fn info(msg: &str) {
    eprintln!("{} {}", "ℹ".blue(), msg);
}

/// Print a success message
pub fn success(msg: &str) {
    eprintln!("{} {}", "✓".green(), msg.green());
}

/// Print an error message
pub fn error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg.red());
}

/// Print a verification diagnostic
pub fn diagnostic(diagnostic: &Diagnostic) {
    match diagnostic {
        Diagnostic::SubstituterFailed { .. } => warning(&diagnostic.to_string()),
        _ => error(&diagnostic.to_string()),
    }
}
