//! Cooperative cancellation.

use std::io::BufRead;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use anyhow::{Context, Result};

/// Shared stop request, checked by the orchestrator once per pass.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Cancel `token` on Ctrl-C.
pub fn install_ctrlc(token: &CancellationToken) -> Result<()> {
    let token = token.clone();
    ctrlc::set_handler(move || {
        log::info!("interrupt received, shutting down");
        token.cancel();
    })
    .context("error setting Ctrl-C handler")
}

/// Cancel `token` when a line consisting of `key` is read from `input`.
///
/// The thread ends on the key, at end of input, or on a read error.
pub fn spawn_key_listener<R>(input: R, key: char, token: CancellationToken) -> Result<JoinHandle<()>>
where
    R: BufRead + Send + 'static,
{
    std::thread::Builder::new()
        .name("quit-key".to_string())
        .spawn(move || {
            for line in input.lines() {
                let Ok(line) = line else {
                    break;
                };
                if is_key(&line, key) {
                    log::info!("quit key '{}' pressed", key);
                    token.cancel();
                    break;
                }
            }
        })
        .context("spawn quit key listener")
}

/// Listen for the quit key on stdin.
pub fn spawn_stdin_listener(key: char, token: CancellationToken) -> Result<JoinHandle<()>> {
    spawn_key_listener(std::io::BufReader::new(std::io::stdin()), key, token)
}

fn is_key(line: &str, key: char) -> bool {
    let mut chars = line.trim().chars();
    matches!((chars.next(), chars.next()), (Some(c), None) if c.eq_ignore_ascii_case(&key))
}
