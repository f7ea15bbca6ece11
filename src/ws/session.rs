//! Per-connection duplex pump.
//!
//! A [`SubscriberSession`] registers with the [`BroadcastRouter`], then runs
//! two halves concurrently: a spawned reader task that applies inbound
//! change requests straight to the [`SharedState`], and a writer loop that
//! drains the session's own delivery queue onto the socket. Whichever half
//! finishes first tears the other down.

use std::fmt;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio::task::JoinHandle;

use super::messages::parse_change_request;
use crate::domain::{BroadcastRouter, SharedState, SubscriberId, Subscription};

/// Lifecycle of a session, logged on every transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionState {
    /// Created, not yet registered with the router.
    Connecting,
    /// Registered; reader and writer running.
    Active,
    /// One half finished; tearing down.
    Closing,
    /// Deregistered and both halves stopped.
    Closed,
}

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// The peer sent a close frame or the stream ended.
    PeerClosed,
    /// Reading from the socket failed.
    ReadFailed,
    /// Writing to the socket failed.
    WriteFailed,
    /// The router closed the delivery queue.
    QueueClosed,
    /// The reader task panicked or was cancelled.
    ReaderAborted,
}

impl CloseReason {
    /// Whether the socket is still writable, so a close frame can be sent.
    const fn owes_close_frame(self) -> bool {
        matches!(self, Self::PeerClosed | Self::QueueClosed)
    }
}

/// One live WebSocket subscriber.
#[derive(Debug)]
pub struct SubscriberSession {
    world: Arc<SharedState>,
    router: Arc<BroadcastRouter>,
    state: SessionState,
}

impl SubscriberSession {
    /// Creates a session that is not yet registered with the router.
    #[must_use]
    pub fn new(world: Arc<SharedState>, router: Arc<BroadcastRouter>) -> Self {
        Self {
            world,
            router,
            state: SessionState::Connecting,
        }
    }

    fn transition(&mut self, next: SessionState, subscriber: SubscriberId) {
        tracing::debug!(%subscriber, from = ?self.state, to = ?next, "session state");
        self.state = next;
    }

    /// Runs the session over an upgraded WebSocket until either half ends.
    pub async fn run(self, socket: WebSocket) -> CloseReason {
        let (sink, stream) = socket.split();
        self.run_with(sink, stream).await
    }

    /// Runs the session over any frame sink and stream, then tears it down.
    ///
    /// The subscription is dropped and the reader aborted on every exit
    /// path, including a panic in the writer. When the socket is still
    /// writable a close frame is sent before the sink is closed.
    pub async fn run_with<Si, St, E>(mut self, mut sink: Si, stream: St) -> CloseReason
    where
        Si: Sink<Message> + Unpin,
        Si::Error: fmt::Display,
        St: Stream<Item = Result<Message, E>> + Unpin + Send + 'static,
        E: fmt::Display + Send + 'static,
    {
        let mut subscription = self.router.subscribe();
        let id = subscription.id();
        self.transition(SessionState::Active, id);
        tracing::info!(subscriber = %id, "subscriber connected");

        let world = Arc::clone(&self.world);
        let mut reader = AbortOnDrop(tokio::spawn(read_loop(id, stream, world)));

        let reason = tokio::select! {
            reason = write_loop(&mut subscription, &mut sink) => reason,
            joined = &mut reader.0 => joined.unwrap_or(CloseReason::ReaderAborted),
        };

        self.transition(SessionState::Closing, id);
        drop(reader);
        drop(subscription);
        if reason.owes_close_frame() {
            let _ = sink.send(Message::Close(None)).await;
        }
        let _ = sink.close().await;
        self.transition(SessionState::Closed, id);
        tracing::info!(subscriber = %id, ?reason, "subscriber disconnected");
        reason
    }
}

/// Aborts the wrapped task when dropped.
#[derive(Debug)]
struct AbortOnDrop<T>(JoinHandle<T>);

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

async fn read_loop<St, E>(id: SubscriberId, mut stream: St, world: Arc<SharedState>) -> CloseReason
where
    St: Stream<Item = Result<Message, E>> + Unpin,
    E: fmt::Display,
{
    while let Some(frame) = stream.next().await {
        match frame {
            Ok(Message::Text(text)) => apply(id, text.as_str(), &world).await,
            Ok(Message::Binary(bytes)) => match std::str::from_utf8(&bytes) {
                Ok(text) => apply(id, text, &world).await,
                Err(_) => tracing::warn!(subscriber = %id, "skipping non-UTF-8 binary frame"),
            },
            Ok(Message::Close(_)) => return CloseReason::PeerClosed,
            Ok(_) => {}
            Err(err) => {
                tracing::debug!(subscriber = %id, error = %err, "ws read failed");
                return CloseReason::ReadFailed;
            }
        }
    }
    CloseReason::PeerClosed
}

/// Applies one inbound change; malformed input is logged and skipped.
async fn apply(id: SubscriberId, text: &str, world: &SharedState) {
    match parse_change_request(text) {
        Ok(change) => {
            world.set(&change.entity, change.data).await;
        }
        Err(err) => {
            tracing::warn!(subscriber = %id, error = %err, "skipping malformed message");
        }
    }
}

async fn write_loop<Si>(subscription: &mut Subscription, sink: &mut Si) -> CloseReason
where
    Si: Sink<Message> + Unpin,
    Si::Error: fmt::Display,
{
    while let Some(message) = subscription.recv().await {
        if let Err(err) = sink.send(Message::text(message.to_string())).await {
            tracing::debug!(subscriber = %subscription.id(), error = %err, "ws write failed");
            return CloseReason::WriteFailed;
        }
    }
    CloseReason::QueueClosed
}
