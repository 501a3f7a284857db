//! Output formatting for CLI
//!
//! Provides consistent output formatting across all commands:
//! - Human-readable default output
//! - JSON output (--json flag)
//! - Quiet mode for scripting (--quiet flag)

use std::path::Path;

use serde::Serialize;

use portalsync_core::{CommitSummary, DownloadSummary, PendingChange, SyncError};

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable output (default)
    Human,
    /// JSON output
    Json,
    /// Quiet mode - minimal output
    Quiet,
}

impl OutputFormat {
    /// Create format from CLI flags
    pub fn from_flags(json: bool, quiet: bool) -> Self {
        if quiet {
            OutputFormat::Quiet
        } else if json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        }
    }
}

/// Output helper for consistent formatting
#[derive(Debug, Clone, Copy)]
pub struct Output {
    /// The output format
    pub format: OutputFormat,
}

impl Output {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Progress lines only make sense for a person watching
    pub fn shows_progress(&self) -> bool {
        self.format == OutputFormat::Human
    }

    /// Print any serializable value as one JSON document
    fn json<T: Serialize + ?Sized>(&self, value: &T) {
        match serde_json::to_string_pretty(value) {
            Ok(text) => println!("{}", text),
            Err(e) => eprintln!("Could not encode output: {}", e),
        }
    }

    /// Print pending changes, paths relative to the workspace root
    pub fn print_changes(&self, root: &Path, changes: &[PendingChange]) {
        match self.format {
            OutputFormat::Human => {
                if changes.is_empty() {
                    println!("No changes.");
                    return;
                }
                println!("Changes ({}):", changes.len());
                for change in changes {
                    println!("  {}", change_line(root, change));
                }
            }
            OutputFormat::Json => self.json(changes),
            OutputFormat::Quiet => {
                for change in changes {
                    println!("{}", change_line(root, change));
                }
            }
        }
    }

    /// Print the outcome of a download
    pub fn print_download(&self, summary: &DownloadSummary) {
        match self.format {
            OutputFormat::Human => {
                let what = if summary.full { "Downloaded" } else { "Refreshed" };
                println!(
                    "{} {} template(s), {} snippet(s), {} file(s), {} page(s)",
                    what, summary.templates, summary.snippets, summary.files, summary.pages
                );
                if summary.canceled {
                    println!("Canceled; kept the previous local state.");
                }
            }
            OutputFormat::Json => self.json(summary),
            OutputFormat::Quiet => {}
        }
    }

    /// Print the outcome of a commit
    pub fn print_commit(&self, root: &Path, summary: &CommitSummary) {
        match self.format {
            OutputFormat::Human => {
                if summary.counts.is_empty() && summary.failures.is_empty() {
                    println!("Nothing to commit.");
                    return;
                }
                for (kind, counts) in &summary.counts {
                    println!(
                        "  {:<14} {} added, {} updated, {} deleted",
                        kind.label(),
                        counts.added,
                        counts.updated,
                        counts.deleted
                    );
                }
                println!("Committed {} change(s).", summary.committed());
                if !summary.failures.is_empty() {
                    println!();
                    println!("Failed ({}):", summary.failures.len());
                    for failure in &summary.failures {
                        println!(
                            "  {} {}: {}",
                            failure.change.marker(),
                            relative(root, &failure.path),
                            failure.reason
                        );
                    }
                }
            }
            OutputFormat::Json => self.json(summary),
            OutputFormat::Quiet => {
                for failure in &summary.failures {
                    println!("{}", failure.path.display());
                }
            }
        }
    }

    pub fn success(&self, message: &str) {
        match self.format {
            OutputFormat::Human => println!("✓ {}", message),
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({"status": "success", "message": message})
                );
            }
            OutputFormat::Quiet => {}
        }
    }

    /// Print an informational message
    pub fn message(&self, msg: &str) {
        match self.format {
            OutputFormat::Human => println!("{}", msg),
            OutputFormat::Json => {
                println!("{}", serde_json::json!({"message": msg}));
            }
            OutputFormat::Quiet => {}
        }
    }

    /// Report a failed command on stderr, with a hint when there is one
    pub fn error(&self, error: &anyhow::Error) {
        let hint = error
            .downcast_ref::<SyncError>()
            .and_then(SyncError::recovery_suggestion);

        match self.format {
            OutputFormat::Json => {
                eprintln!(
                    "{}",
                    serde_json::json!({
                        "status": "error",
                        "message": format!("{:#}", error),
                        "hint": hint
                    })
                );
            }
            _ => {
                eprintln!("Error: {:#}", error);
                if let Some(hint) = hint {
                    eprintln!("Hint: {}", hint);
                }
            }
        }
    }
}

/// `M Templates/home.html` style status line
pub fn change_line(root: &Path, change: &PendingChange) -> String {
    format!("{} {}", change.kind.marker(), relative(root, &change.path))
}

fn relative(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use portalsync_core::ChangeKind;
    use std::path::PathBuf;

    #[test]
    fn test_format_from_flags() {
        assert_eq!(OutputFormat::from_flags(false, false), OutputFormat::Human);
        assert_eq!(OutputFormat::from_flags(true, false), OutputFormat::Json);
        assert_eq!(OutputFormat::from_flags(false, true), OutputFormat::Quiet);
        // Quiet takes precedence
        assert_eq!(OutputFormat::from_flags(true, true), OutputFormat::Quiet);
    }

    #[test]
    fn test_change_line_is_relative() {
        let root = PathBuf::from("/work/site");
        let change = PendingChange {
            path: root.join("Templates").join("home.html"),
            kind: ChangeKind::Modified,
            last_seen_dirty: Utc::now(),
        };
        assert_eq!(change_line(&root, &change), "M Templates/home.html");
    }

    #[test]
    fn test_change_line_outside_root() {
        let change = PendingChange {
            path: PathBuf::from("/elsewhere/a.png"),
            kind: ChangeKind::Added,
            last_seen_dirty: Utc::now(),
        };
        assert_eq!(
            change_line(Path::new("/work/site"), &change),
            "A /elsewhere/a.png"
        );
    }
}
