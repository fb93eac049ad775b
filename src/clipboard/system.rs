//! OS clipboard backend
//!
//! The OS clipboard handle lives on one dedicated thread and every request is
//! queued to it, so calls are serialized no matter what thread-safety the
//! platform binding offers.

use std::sync::mpsc;
use std::thread;

use arboard::Clipboard;
use async_trait::async_trait;
use tokio::sync::oneshot;
use tracing::debug;

use super::{ClipboardBackend, ClipboardError};

enum Command {
    Read(oneshot::Sender<Result<String, ClipboardError>>),
    Write(String, oneshot::Sender<Result<(), ClipboardError>>),
}

/// Clipboard backend backed by the operating system clipboard
pub struct SystemBackend {
    commands: mpsc::Sender<Command>,
}

impl SystemBackend {
    /// Start the clipboard worker and check that the OS clipboard answers
    pub fn connect() -> Result<Self, ClipboardError> {
        let (commands, queue) = mpsc::channel::<Command>();
        let (ready_tx, ready_rx) = mpsc::sync_channel::<Result<(), ClipboardError>>(1);

        thread::Builder::new()
            .name("remoclip-clipboard".to_string())
            .spawn(move || {
                let mut clipboard = match Clipboard::new() {
                    Ok(clipboard) => {
                        let _ = ready_tx.send(Ok(()));
                        clipboard
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(ClipboardError::Unavailable(e.to_string())));
                        return;
                    }
                };

                for command in queue {
                    match command {
                        Command::Read(reply) => {
                            let _ = reply.send(read_text(&mut clipboard));
                        }
                        Command::Write(text, reply) => {
                            let result = clipboard
                                .set_text(text)
                                .map_err(|e| ClipboardError::Platform(e.to_string()));
                            let _ = reply.send(result);
                        }
                    }
                }

                debug!("Clipboard worker exiting");
            })?;

        ready_rx.recv().map_err(|_| ClipboardError::WorkerGone)??;

        Ok(Self { commands })
    }
}

fn read_text(clipboard: &mut Clipboard) -> Result<String, ClipboardError> {
    match clipboard.get_text() {
        Ok(text) => Ok(text),
        // An empty clipboard reads as empty text
        Err(arboard::Error::ContentNotAvailable) => Ok(String::new()),
        Err(e) => Err(ClipboardError::Platform(e.to_string())),
    }
}

#[async_trait]
impl ClipboardBackend for SystemBackend {
    async fn read(&self) -> Result<String, ClipboardError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(Command::Read(reply))
            .map_err(|_| ClipboardError::WorkerGone)?;
        response.await.map_err(|_| ClipboardError::WorkerGone)?
    }

    async fn write(&self, text: &str) -> Result<(), ClipboardError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(Command::Write(text.to_string(), reply))
            .map_err(|_| ClipboardError::WorkerGone)?;
        response.await.map_err(|_| ClipboardError::WorkerGone)?
    }

    fn name(&self) -> &str {
        "system"
    }
}
