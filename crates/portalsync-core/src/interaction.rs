//! User interaction capability
//!
//! The engine never talks to a terminal or UI directly. It reports progress
//! and asks yes/no or choose-one questions through [`Interaction`].

use async_trait::async_trait;
use tracing::info;

/// Progress reporting and questions for the user
#[async_trait]
pub trait Interaction: Send + Sync {
    /// Ask a yes/no question
    async fn confirm(&self, prompt: &str) -> bool;

    /// Ask the user to pick one option; `None` when nothing was picked
    async fn choose(&self, prompt: &str, options: &[String]) -> Option<usize>;

    /// Report progress of a long-running operation
    fn progress(&self, message: &str);
}

/// Answers without a user: confirms everything, never picks an option
///
/// Used by background loops where nobody is there to ask.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unattended;

#[async_trait]
impl Interaction for Unattended {
    async fn confirm(&self, _prompt: &str) -> bool {
        true
    }

    async fn choose(&self, prompt: &str, _options: &[String]) -> Option<usize> {
        info!("No one to answer '{}'; skipping", prompt);
        None
    }

    fn progress(&self, message: &str) {
        info!("{}", message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unattended_answers() {
        let ui = Unattended;
        assert!(ui.confirm("Overwrite?").await);
        assert_eq!(ui.choose("Pick", &["a".to_string()]).await, None);
    }
}
