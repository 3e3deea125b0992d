use std::io::BufRead;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::command::{Command, ReadError, read_commands};
use crate::engine::book_engine::{Engine, ReplaySummary};
use crate::error::BookError;
use crate::matching::{AddOutcome, BookSnapshot};
use crate::models::{EventEnvelope, OrderId, OrderView, Side};

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Book(#[from] BookError),
    #[error(transparent)]
    Read(#[from] ReadError),
    #[error("book service has stopped")]
    Closed,
}

enum Request {
    Add {
        id: OrderId,
        side: Side,
        price: i64,
        quantity: i64,
        reply: oneshot::Sender<Result<AddOutcome, BookError>>,
    },
    Cancel {
        id: OrderId,
        reply: oneshot::Sender<Result<OrderView, BookError>>,
    },
    Command {
        command: Command,
        reply: oneshot::Sender<Vec<EventEnvelope>>,
    },
    Snapshot {
        depth: usize,
        reply: oneshot::Sender<BookSnapshot>,
    },
}

/// Cloneable client of a running [`BookService`].
#[derive(Debug, Clone)]
pub struct BookHandle {
    tx: mpsc::Sender<Request>,
}

/// Single writer for one book: a task that owns the engine and applies
/// requests strictly in arrival order.
pub struct BookService;

impl BookService {
    /// Spawns the owning task on the current runtime. The task ends, handing
    /// back its engine, once every handle is dropped.
    pub fn spawn(capacity: usize) -> (BookHandle, JoinHandle<Engine>) {
        Self::spawn_with(Engine::new(), capacity)
    }

    /// A `capacity` of zero is treated as one; the queue always holds at
    /// least one pending request.
    pub fn spawn_with(mut engine: Engine, capacity: usize) -> (BookHandle, JoinHandle<Engine>) {
        let (tx, mut rx) = mpsc::channel::<Request>(capacity.max(1));
        let task = tokio::spawn(async move {
            while let Some(request) = rx.recv().await {
                match request {
                    Request::Add {
                        id,
                        side,
                        price,
                        quantity,
                        reply,
                    } => {
                        let _ = reply.send(engine.add_order(id, side, price, quantity));
                    }
                    Request::Cancel { id, reply } => {
                        let _ = reply.send(engine.cancel_order(id));
                    }
                    Request::Command { command, reply } => {
                        let _ = reply.send(engine.handle_command(command));
                    }
                    Request::Snapshot { depth, reply } => {
                        let _ = reply.send(engine.snapshot(depth));
                    }
                }
            }
            info!(engine_seq = engine.engine_seq(), "book service stopped");
            engine
        });
        (BookHandle { tx }, task)
    }
}

impl BookHandle {
    pub async fn add_order(
        &self,
        id: OrderId,
        side: Side,
        price: i64,
        quantity: i64,
    ) -> Result<AddOutcome, ServiceError> {
        let (reply, rx) = oneshot::channel();
        self.send(Request::Add {
            id,
            side,
            price,
            quantity,
            reply,
        })
        .await?;
        Ok(rx.await.map_err(|_| ServiceError::Closed)??)
    }

    pub async fn cancel_order(&self, id: OrderId) -> Result<OrderView, ServiceError> {
        let (reply, rx) = oneshot::channel();
        self.send(Request::Cancel { id, reply }).await?;
        Ok(rx.await.map_err(|_| ServiceError::Closed)??)
    }

    /// Applies a parsed command and returns the events it produced.
    pub async fn submit(&self, command: Command) -> Result<Vec<EventEnvelope>, ServiceError> {
        let (reply, rx) = oneshot::channel();
        self.send(Request::Command { command, reply }).await?;
        rx.await.map_err(|_| ServiceError::Closed)
    }

    /// Streams every command in `reader` through the service, in file order.
    /// Unparsable lines are logged and skipped; read failures stop the replay.
    pub async fn replay<R, F>(&self, reader: R, mut on_event: F) -> Result<ReplaySummary, ServiceError>
    where
        R: BufRead,
        F: FnMut(&EventEnvelope),
    {
        let mut summary = ReplaySummary::default();
        for item in read_commands(reader) {
            let (line, command) = match item {
                Ok(parsed) => parsed,
                Err(ReadError::Parse { line, source }) => {
                    warn!(line, error = %source, "skipping unparsable command");
                    summary.unparsable += 1;
                    continue;
                }
                Err(err) => return Err(err.into()),
            };
            debug!(line, ?command, "submitting command");
            let envelopes = self.submit(command).await?;
            summary.record(&envelopes);
            for envelope in &envelopes {
                on_event(envelope);
            }
        }
        Ok(summary)
    }

    /// Top-of-book view taken between two mutations, never during one.
    pub async fn snapshot(&self, depth: usize) -> Result<BookSnapshot, ServiceError> {
        let (reply, rx) = oneshot::channel();
        self.send(Request::Snapshot { depth, reply }).await?;
        rx.await.map_err(|_| ServiceError::Closed)
    }

    async fn send(&self, request: Request) -> Result<(), ServiceError> {
        self.tx.send(request).await.map_err(|_| {
            debug!("book service request dropped");
            ServiceError::Closed
        })
    }
}
