/// Single-writer board session.
///
/// Local intents and remote events originate concurrently but are funnelled
/// through one bounded queue and applied one at a time, in arrival order.
/// Every new `present` is published on a watch channel; subscribers always
/// hold a complete, unchanging snapshot.
use std::sync::Arc;

use chrono::Duration;
use tokio::sync::{broadcast, mpsc, oneshot, watch};

use crate::clock::Clock;
use crate::command::Command;
use crate::config::SessionConfig;
use crate::error::BoardError;
use crate::history::History;
use crate::reconcile::events::{OutboundRequest, RemoteEvent};
use crate::reconcile::{self, ReconcileOutcome};
use crate::reminders::{ReminderFired, ReminderScheduler};
use crate::types::Board;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Board session has shut down")]
    Closed,

    #[error(transparent)]
    Rejected(#[from] BoardError),
}

type Reply = oneshot::Sender<Result<(), BoardError>>;

#[derive(Debug)]
pub enum Input {
    Local {
        command: Command,
        reply: Option<Reply>,
    },
    Undo,
    Redo,
    Remote(RemoteEvent),
    /// Ask the remote store for a new column. The board only changes when
    /// the insert echoes back through the feed.
    RequestColumn {
        title: String,
        reply: Option<Reply>,
    },
}

/// Cloneable sender side of a session.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    tx: mpsc::Sender<Input>,
}

impl SessionHandle {
    async fn send(&self, input: Input) -> Result<(), SessionError> {
        self.tx.send(input).await.map_err(|_| SessionError::Closed)
    }

    /// Apply a local command and wait for its result.
    pub async fn apply(&self, command: Command) -> Result<(), SessionError> {
        let (reply, rx) = oneshot::channel();
        self.send(Input::Local {
            command,
            reply: Some(reply),
        })
        .await?;
        rx.await.map_err(|_| SessionError::Closed)??;
        Ok(())
    }

    /// Queue a local command without waiting for it.
    pub async fn dispatch(&self, command: Command) -> Result<(), SessionError> {
        self.send(Input::Local {
            command,
            reply: None,
        })
        .await
    }

    pub async fn undo(&self) -> Result<(), SessionError> {
        self.send(Input::Undo).await
    }

    pub async fn redo(&self) -> Result<(), SessionError> {
        self.send(Input::Redo).await
    }

    pub async fn remote(&self, event: RemoteEvent) -> Result<(), SessionError> {
        self.send(Input::Remote(event)).await
    }

    pub async fn request_column(&self, title: impl Into<String>) -> Result<(), SessionError> {
        let (reply, rx) = oneshot::channel();
        self.send(Input::RequestColumn {
            title: title.into(),
            reply: Some(reply),
        })
        .await?;
        rx.await.map_err(|_| SessionError::Closed)??;
        Ok(())
    }
}

/// Receiving ends handed out when a session is created.
#[derive(Debug)]
pub struct SessionChannels {
    pub handle: SessionHandle,
    pub board: watch::Receiver<Arc<Board>>,
    pub outbound: mpsc::UnboundedReceiver<OutboundRequest>,
}

pub struct BoardSession {
    history: History,
    clock: Arc<dyn Clock>,
    rx: mpsc::Receiver<Input>,
    board_tx: watch::Sender<Arc<Board>>,
    outbound_tx: mpsc::UnboundedSender<OutboundRequest>,
    reminders: ReminderScheduler,
}

impl BoardSession {
    pub fn new(initial: Board, config: &SessionConfig, clock: Arc<dyn Clock>) -> (Self, SessionChannels) {
        let history = History::with_limit(initial, config.undo_limit);
        let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
        let (board_tx, board_rx) = watch::channel(Arc::clone(history.present()));
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let lead_secs = i64::try_from(config.reminder_lead_secs).unwrap_or(i64::MAX);
        let lead = Duration::try_seconds(lead_secs).unwrap_or_else(Duration::zero);

        let session = Self {
            history,
            clock,
            rx,
            board_tx,
            outbound_tx,
            reminders: ReminderScheduler::new(lead),
        };
        let channels = SessionChannels {
            handle: SessionHandle { tx },
            board: board_rx,
            outbound: outbound_rx,
        };
        (session, channels)
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn reminders(&self) -> broadcast::Receiver<ReminderFired> {
        self.reminders.subscribe()
    }

    /// Process inputs until every handle is dropped. Returns the final board.
    pub async fn run(mut self) -> Arc<Board> {
        log::info!("[taskboard.session] Started");
        let empty = Board::new();
        let now = self.clock.now();
        self.reminders.sync(&empty, self.history.present(), now);

        while let Some(input) = self.rx.recv().await {
            self.handle(input);
        }
        log::info!("[taskboard.session] All handles dropped, stopping");
        Arc::clone(self.history.present())
    }

    /// Apply one input to completion and publish the result. Replies go out
    /// after the new snapshot is visible to subscribers.
    pub fn handle(&mut self, input: Input) {
        let before = Arc::clone(self.history.present());
        let now = self.clock.now();

        let answered = match input {
            Input::Local { command, reply } => {
                let result = self.history.apply_local(&command, now).map(|_| ());
                reply.map(|reply| (reply, result))
            }
            Input::Undo => {
                if !self.history.undo() {
                    log::debug!("[taskboard.session] Nothing to undo");
                }
                None
            }
            Input::Redo => {
                if !self.history.redo() {
                    log::debug!("[taskboard.session] Nothing to redo");
                }
                None
            }
            Input::Remote(event) => {
                let outcome = reconcile::reconcile(&mut self.history, &event, now);
                if let ReconcileOutcome::Ignored(reason) = outcome {
                    log::debug!("[taskboard.session] Remote {} ignored: {}", event.label(), reason);
                }
                None
            }
            Input::RequestColumn { title, reply } => {
                let result = self.request_column(&title);
                reply.map(|reply| (reply, result))
            }
        };

        let after = self.history.present();
        if !Arc::ptr_eq(&before, after) {
            self.reminders.sync(&before, after, now);
            self.board_tx.send_replace(Arc::clone(after));
        }
        if let Some((reply, result)) = answered {
            let _ = reply.send(result);
        }
    }

    fn request_column(&self, title: &str) -> Result<(), BoardError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(BoardError::InvalidInput("column title must not be blank".into()));
        }
        let request = OutboundRequest::CreateColumn {
            title: title.to_string(),
            position: self.history.present().column_count(),
        };
        if self.outbound_tx.send(request).is_err() {
            log::warn!("[taskboard.session] Outbound channel closed, dropping column request");
        }
        Ok(())
    }
}
