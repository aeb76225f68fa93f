//! Session coordinator - one client connection from accept to teardown.
//!
//! # Lifecycle
//!
//! 1. Spawn the outbound writer for the client sink
//! 2. Open a database connection and run the on-connect hook
//! 3. Subscribe the event forwarder and start the keepalive pulse
//! 4. Dispatch inbound frames until the client goes away or the database
//!    connection is lost
//! 5. Stop the pulse, run the on-disconnect hook, release the connection
//! 6. Drain and shut down the writer

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures::{Sink, Stream, StreamExt};
use serde::Serialize;

use super::command_registry::CommandRegistry;
use super::event_forwarder::EventForwarder;
use super::keepalive::{KeepalivePulse, DEFAULT_KEEPALIVE_INTERVAL};
use super::outbound::{OutboundQueue, OutboundWriter};
use super::result_streamer::{ResultStreamer, StreamSummary};
use crate::domain::foundation::{BridgeError, SessionId, StateMachine};
use crate::domain::protocol::{InboundFrame, InboundMessage, OutboundFrame};
use crate::domain::session::SessionState;
use crate::ports::{DatabaseConnection, DatabaseConnector, SessionHooks};

/// Why the receive loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseReason {
    /// The client sent a close frame.
    ClientClosed,
    /// The transport reported an error.
    TransportError,
    /// The inbound stream ended without a close frame.
    InboundEnded,
    /// The outbound writer stopped, so the client is unreachable.
    OutboundClosed,
    /// The database connection was lost.
    DatabaseFailed,
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CloseReason::ClientClosed => "client closed",
            CloseReason::TransportError => "transport error",
            CloseReason::InboundEnded => "inbound ended",
            CloseReason::OutboundClosed => "outbound closed",
            CloseReason::DatabaseFailed => "database connection lost",
        };
        write!(f, "{}", s)
    }
}

/// What a finished session did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSummary {
    pub session_id: SessionId,
    pub state: SessionState,
    pub close_reason: CloseReason,
    /// Data frames dispatched.
    pub messages: usize,
    /// Error frames produced.
    pub errors: usize,
}

/// How one inbound message was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Dispatched {
    /// A command handler suppressed SQL execution.
    Handled,
    /// The message ran as a statement.
    Executed(StreamSummary),
}

/// Bookkeeping for one session.
struct Session {
    id: SessionId,
    state: SessionState,
    outbound: OutboundQueue,
    messages: usize,
    errors: usize,
}

impl Session {
    fn new(id: SessionId, outbound: OutboundQueue) -> Self {
        Self {
            id,
            state: SessionState::Connecting,
            outbound,
            messages: 0,
            errors: 0,
        }
    }

    fn advance(&mut self, next: SessionState) {
        match self.state.transition_to(next) {
            Ok(state) => {
                tracing::debug!(session_id = %self.id, from = %self.state, to = %state, "session state changed");
                self.state = state;
            }
            Err(e) => {
                tracing::error!(session_id = %self.id, error = %e, "invalid session state transition");
            }
        }
    }

    /// Sends the single error frame for a failed message.
    fn report(&mut self, err: &BridgeError) {
        tracing::error!(session_id = %self.id, error = %err, "message dispatch failed");
        self.errors += 1;
        self.outbound.push(OutboundFrame::error(err));
    }

    fn summary(&self, close_reason: CloseReason) -> SessionSummary {
        SessionSummary {
            session_id: self.id,
            state: self.state,
            close_reason,
            messages: self.messages,
            errors: self.errors,
        }
    }

    async fn finish(self, writer: OutboundWriter) {
        drop(self.outbound);
        writer.shutdown().await;
    }
}

/// Runs bridged sessions. One coordinator serves every connection; each
/// call to [`SessionCoordinator::run`] is one session.
pub struct SessionCoordinator {
    connector: Arc<dyn DatabaseConnector>,
    registry: Arc<CommandRegistry>,
    hooks: Arc<dyn SessionHooks>,
    keepalive_interval: Duration,
}

impl SessionCoordinator {
    pub fn new(
        connector: Arc<dyn DatabaseConnector>,
        registry: Arc<CommandRegistry>,
        hooks: Arc<dyn SessionHooks>,
    ) -> Self {
        Self {
            connector,
            registry,
            hooks,
            keepalive_interval: DEFAULT_KEEPALIVE_INTERVAL,
        }
    }

    /// Overrides the heartbeat interval.
    pub fn with_keepalive_interval(mut self, interval: Duration) -> Self {
        self.keepalive_interval = interval;
        self
    }

    /// Serves one client until it goes away.
    ///
    /// Returns an error only when the session could not start (database
    /// unreachable or on-connect hook failed). In that case the client is
    /// sent a close frame and anything already opened is released.
    pub async fn run<I, O>(
        &self,
        session_id: SessionId,
        mut inbound: I,
        outbound: O,
    ) -> Result<SessionSummary, BridgeError>
    where
        I: Stream<Item = InboundFrame> + Send + Unpin,
        O: Sink<OutboundFrame> + Send + Unpin + 'static,
        O::Error: fmt::Display,
    {
        let (queue, writer) = OutboundQueue::spawn_writer(outbound);
        let mut session = Session::new(session_id, queue);

        let conn = match self.open(session_id).await {
            Ok(conn) => conn,
            Err(err) => {
                tracing::error!(session_id = %session_id, error = %err, "session failed to start");
                session.advance(SessionState::Closing);
                session.outbound.push(OutboundFrame::Close);
                session.advance(SessionState::Closed);
                session.finish(writer).await;
                return Err(err);
            }
        };

        conn.subscribe(Arc::new(EventForwarder::new(
            session_id,
            session.outbound.clone(),
        )));
        let pulse = KeepalivePulse::start(session.outbound.clone(), self.keepalive_interval);
        session.advance(SessionState::Active);

        let close_reason = self
            .receive_loop(&mut session, conn.as_ref(), &mut inbound)
            .await;
        tracing::debug!(session_id = %session_id, reason = %close_reason, "receive loop ended");

        session.advance(SessionState::Closing);
        pulse.stop();
        if let Err(e) = self.hooks.on_disconnect(conn.as_ref()).await {
            tracing::warn!(session_id = %session_id, error = %e, "on-disconnect hook failed");
        }
        release(session_id, conn).await;
        session.advance(SessionState::Closed);

        let summary = session.summary(close_reason);
        session.finish(writer).await;
        Ok(summary)
    }

    /// Opens the connection and runs the on-connect hook on it.
    async fn open(&self, session_id: SessionId) -> Result<Box<dyn DatabaseConnection>, BridgeError> {
        let conn = self.connector.connect().await?;
        if let Err(err) = self.hooks.on_connect(conn.as_ref()).await {
            release(session_id, conn).await;
            return Err(err);
        }
        Ok(conn)
    }

    async fn receive_loop<I>(
        &self,
        session: &mut Session,
        conn: &dyn DatabaseConnection,
        inbound: &mut I,
    ) -> CloseReason
    where
        I: Stream<Item = InboundFrame> + Send + Unpin,
    {
        loop {
            let frame = tokio::select! {
                biased;
                _ = conn.closed() => {
                    tracing::error!(session_id = %session.id, "database connection lost, closing session");
                    session.outbound.push(OutboundFrame::Close);
                    return CloseReason::DatabaseFailed;
                }
                frame = inbound.next() => frame,
            };
            let Some(frame) = frame else {
                return CloseReason::InboundEnded;
            };

            let text = match frame {
                InboundFrame::Text(text) => text,
                InboundFrame::Binary(bytes) => match String::from_utf8(bytes) {
                    Ok(text) => text,
                    Err(e) => {
                        session.messages += 1;
                        session.report(&BridgeError::InvalidMessage(e.to_string()));
                        continue;
                    }
                },
                InboundFrame::Ping | InboundFrame::Pong => continue,
                InboundFrame::Close => {
                    tracing::debug!(session_id = %session.id, "client sent close frame");
                    session.outbound.push(OutboundFrame::Close);
                    return CloseReason::ClientClosed;
                }
                InboundFrame::Error(e) => {
                    tracing::error!(session_id = %session.id, error = %e, "transport error");
                    return CloseReason::TransportError;
                }
            };

            session.messages += 1;
            let result = self.dispatch(session.id, conn, &session.outbound, &text).await;
            match result {
                Ok(Dispatched::Handled) => {}
                Ok(Dispatched::Executed(summary)) => {
                    tracing::trace!(
                        session_id = %session.id,
                        rows = summary.rows,
                        frames = summary.frames,
                        "statement streamed"
                    );
                }
                Err(err) => session.report(&err),
            }

            if session.outbound.is_closed() {
                return CloseReason::OutboundClosed;
            }
        }
    }

    async fn dispatch(
        &self,
        session_id: SessionId,
        conn: &dyn DatabaseConnection,
        outbound: &OutboundQueue,
        text: &str,
    ) -> Result<Dispatched, BridgeError> {
        let message = InboundMessage::parse(text)?;

        if let Some(handler) = self.registry.lookup(message.command()) {
            tracing::debug!(
                session_id = %session_id,
                command = %message.command(),
                args = ?message.args(),
                "calling command handler"
            );
            if handler.handle(conn, message.args()).await? {
                return Ok(Dispatched::Handled);
            }
        }

        tracing::debug!(session_id = %session_id, statement = %message.command(), "executing statement");
        let summary = ResultStreamer::new(outbound)
            .execute(conn, message.command(), message.args())
            .await?;
        Ok(Dispatched::Executed(summary))
    }
}

async fn release(session_id: SessionId, conn: Box<dyn DatabaseConnection>) {
    if let Err(e) = conn.close().await {
        tracing::warn!(session_id = %session_id, error = %e, "failed to release database connection");
    }
}
