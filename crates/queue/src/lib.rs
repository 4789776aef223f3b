//! `queue` crate: the command channel between editor surfaces and the
//! single task that owns an [`EditorSession`].
//!
//! Any number of [`CommandSender`] clones feed one bounded channel. The
//! session task applies requests strictly in arrival order, so every edit
//! sees the graph left by the one before it.

use engine::{CommandOutcome, EditorCommand, EditorSession, EngineError, ExportDocument};
use thiserror::Error;
use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

/// Tuning for one session channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// Requests that may wait before senders start to back off.
    pub command_buffer: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self { command_buffer: 64 }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum QueueError {
    #[error("editor session is no longer running")]
    SessionClosed,
    #[error(transparent)]
    Engine(#[from] EngineError),
}

type Reply<T> = oneshot::Sender<Result<T, EngineError>>;

enum SessionRequest {
    Edit {
        command: EditorCommand,
        reply: Option<Reply<CommandOutcome>>,
    },
    Save {
        reply: Reply<i64>,
    },
    Export {
        reply: oneshot::Sender<ExportDocument>,
    },
}

/// Cloneable handle for submitting work to a running session.
#[derive(Clone)]
pub struct CommandSender {
    tx: mpsc::Sender<SessionRequest>,
}

/// Receiving half, consumed by [`run_session`].
pub struct SessionReceiver {
    rx: mpsc::Receiver<SessionRequest>,
}

pub fn channel(config: &SessionConfig) -> (CommandSender, SessionReceiver) {
    let (tx, rx) = mpsc::channel(config.command_buffer.max(1));
    (CommandSender { tx }, SessionReceiver { rx })
}

impl CommandSender {
    /// Queue a command without waiting for its result. Rejections are
    /// logged by the session.
    pub async fn dispatch(&self, command: EditorCommand) -> Result<(), QueueError> {
        self.send(SessionRequest::Edit {
            command,
            reply: None,
        })
        .await
    }

    /// Queue a command and wait until it has been applied.
    pub async fn request(&self, command: EditorCommand) -> Result<CommandOutcome, QueueError> {
        let (reply, rx) = oneshot::channel();
        self.send(SessionRequest::Edit {
            command,
            reply: Some(reply),
        })
        .await?;
        Ok(rx.await.map_err(|_| QueueError::SessionClosed)??)
    }

    /// Save once every request queued before this one has been applied.
    pub async fn save(&self) -> Result<i64, QueueError> {
        let (reply, rx) = oneshot::channel();
        self.send(SessionRequest::Save { reply }).await?;
        Ok(rx.await.map_err(|_| QueueError::SessionClosed)??)
    }

    pub async fn export(&self) -> Result<ExportDocument, QueueError> {
        let (reply, rx) = oneshot::channel();
        self.send(SessionRequest::Export { reply }).await?;
        rx.await.map_err(|_| QueueError::SessionClosed)
    }

    async fn send(&self, request: SessionRequest) -> Result<(), QueueError> {
        self.tx
            .send(request)
            .await
            .map_err(|_| QueueError::SessionClosed)
    }
}

/// Drive `session` until every [`CommandSender`] has been dropped, then hand
/// it back.
pub async fn run_session(mut session: EditorSession, receiver: SessionReceiver) -> EditorSession {
    let SessionReceiver { mut rx } = receiver;
    info!(workflow_id = %session.workflow_id(), "session task started");

    while let Some(request) = rx.recv().await {
        match request {
            SessionRequest::Edit { command, reply } => {
                debug!(command = command.name(), "applying queued command");
                let result = session.apply(command);
                if let Some(reply) = reply {
                    // The requester may have given up waiting.
                    let _ = reply.send(result);
                }
            }
            SessionRequest::Save { reply } => {
                let _ = reply.send(session.save().await);
            }
            SessionRequest::Export { reply } => {
                let _ = reply.send(session.export());
            }
        }
    }

    if session.is_dirty() {
        warn!(workflow_id = %session.workflow_id(), "session closed with unsaved edits");
    }
    info!(workflow_id = %session.workflow_id(), "session task stopped");
    session
}

/// Spawn [`run_session`] on the current runtime.
pub fn spawn_session(
    session: EditorSession,
    config: &SessionConfig,
) -> (CommandSender, JoinHandle<EditorSession>) {
    let (sender, receiver) = channel(config);
    let handle = tokio::spawn(run_session(session, receiver));
    (sender, handle)
}
