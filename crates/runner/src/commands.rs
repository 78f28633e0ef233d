//! Operator commands read from stdin.
//!
//! `pause <strategy>` / `p <strategy>`, `resume <strategy>` / `r <strategy>`,
//! `quit` / `q`.

use std::io::BufRead;
use std::str::FromStr;
use std::thread;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// A command applied by the tick loop at the next cycle boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperatorCommand {
    Pause(String),
    Resume(String),
    Quit,
}

impl FromStr for OperatorCommand {
    type Err = String;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (verb, rest) = match line.split_once(char::is_whitespace) {
            Some((verb, rest)) => (verb, rest.trim()),
            None => (line, ""),
        };

        match (verb.to_ascii_lowercase().as_str(), rest) {
            ("q" | "quit", _) => Ok(OperatorCommand::Quit),
            ("p" | "pause", name) if !name.is_empty() => Ok(OperatorCommand::Pause(name.to_string())),
            ("r" | "resume", name) if !name.is_empty() => Ok(OperatorCommand::Resume(name.to_string())),
            ("p" | "pause" | "r" | "resume", _) => Err(format!("'{}' needs a strategy name", verb)),
            _ => Err(format!("unknown command '{}'", line)),
        }
    }
}

/// Forward parsed stdin lines into `tx` until stdin closes or the receiver drops.
///
/// Runs on a plain thread: a blocking stdin read cannot be cancelled, and a
/// detached thread does not hold up runtime shutdown.
pub fn spawn_stdin_reader(tx: mpsc::Sender<OperatorCommand>) -> std::io::Result<thread::JoinHandle<()>> {
    thread::Builder::new().name("stdin-commands".to_string()).spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    warn!(error = %e, "Failed to read stdin");
                    break;
                }
            };
            if line.trim().is_empty() {
                continue;
            }
            match line.parse::<OperatorCommand>() {
                Ok(cmd) => {
                    if tx.blocking_send(cmd).is_err() {
                        break;
                    }
                }
                Err(e) => warn!(error = %e, "Ignoring operator input"),
            }
        }
        debug!("stdin reader finished");
    })
}
