//! Terminal prompts
//!
//! [`TerminalPrompt`] answers the engine's questions on the controlling
//! terminal. Questions go to stderr so `--json` output on stdout stays
//! parseable.

use std::io::{self, BufRead, Write};

use async_trait::async_trait;
use tracing::{debug, info};

use portalsync_core::Interaction;

/// Asks on stderr, reads answers from stdin
#[derive(Debug, Clone, Copy)]
pub struct TerminalPrompt {
    show_progress: bool,
}

impl TerminalPrompt {
    pub fn new(show_progress: bool) -> Self {
        Self { show_progress }
    }
}

#[async_trait]
impl Interaction for TerminalPrompt {
    async fn confirm(&self, prompt: &str) -> bool {
        eprint!("{} [y/N] ", prompt);
        match ask().await {
            Some(answer) => parse_confirm(&answer),
            None => false,
        }
    }

    async fn choose(&self, prompt: &str, options: &[String]) -> Option<usize> {
        if options.is_empty() {
            return None;
        }

        eprintln!("{}", prompt);
        for (i, option) in options.iter().enumerate() {
            eprintln!("  [{}] {}", i + 1, option);
        }
        eprint!("> ");

        let answer = ask().await?;
        parse_choice(&answer, options.len())
    }

    fn progress(&self, message: &str) {
        if self.show_progress {
            eprintln!("{}", message);
        } else {
            debug!("{}", message);
        }
    }
}

/// Read one line from stdin without blocking the runtime
///
/// `None` on end of input or a read error.
async fn ask() -> Option<String> {
    let _ = io::stderr().flush();
    let line = tokio::task::spawn_blocking(|| {
        let mut line = String::new();
        match io::stdin().lock().read_line(&mut line) {
            Ok(0) | Err(_) => None,
            Ok(_) => Some(line),
        }
    })
    .await
    .ok()
    .flatten();

    if line.is_none() {
        info!("No answer on stdin");
    }
    line
}

fn parse_confirm(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

/// One-based answer to a zero-based index
fn parse_choice(answer: &str, count: usize) -> Option<usize> {
    let n: usize = answer.trim().parse().ok()?;
    (1..=count).contains(&n).then(|| n - 1)
}
