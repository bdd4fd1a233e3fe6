//! Interactive transfer confirmation on the terminal.

use std::io::{self, BufRead, IsTerminal, Write};

use async_trait::async_trait;
use codelist_sync_core::{PlannedTransfer, TransferApproval};
use tracing::warn;

/// Asks on stderr and reads the answer from stdin.
///
/// Declines without asking when stdin is not a terminal.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct TerminalPrompt;

#[async_trait]
impl TransferApproval for TerminalPrompt {
    async fn approve(&self, plan: &[PlannedTransfer]) -> bool {
        if !io::stdin().is_terminal() {
            warn!(
                planned = plan.len(),
                "stdin is not a terminal - declining transfers (use --yes or autoConfirmDownloads)"
            );
            return false;
        }

        let question = format!("Download {} file(s)? [y/N] ", plan.len());
        let answer = tokio::task::spawn_blocking(move || ask(&question)).await;
        match answer {
            Ok(Ok(line)) => is_affirmative(&line),
            Ok(Err(error)) => {
                warn!(error = %error, "could not read confirmation - declining transfers");
                false
            }
            Err(error) => {
                warn!(error = %error, "confirmation prompt aborted - declining transfers");
                false
            }
        }
    }
}

fn ask(question: &str) -> io::Result<String> {
    let mut stderr = io::stderr();
    stderr.write_all(question.as_bytes())?;
    stderr.flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line)
}

pub(crate) fn is_affirmative(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}
