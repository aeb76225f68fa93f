//! Per-session outbound queue with a single writer task.
//!
//! Three independent sources write to a client: the receive loop (result
//! rows, error frames), the keepalive pulse and the notification
//! forwarder. None of them touches the transport directly. They push
//! into an [`OutboundQueue`], and one [`OutboundWriter`] task owns the sink
//! and drains the queue in arrival order.
//!
//! ```text
//!  receive loop ──┐
//!  keepalive ─────┼──► OutboundQueue ──► OutboundWriter ──► transport sink
//!  notifications ─┘
//! ```

use std::fmt;

use futures::{Sink, SinkExt};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::domain::protocol::OutboundFrame;

/// Cloneable handle for enqueueing frames to one client.
///
/// Pushing never blocks. Once the writer has stopped, pushes fail and
/// report `false`.
#[derive(Debug, Clone)]
pub struct OutboundQueue {
    tx: mpsc::UnboundedSender<OutboundFrame>,
}

impl OutboundQueue {
    /// Creates a queue and the receiving end for a writer.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<OutboundFrame>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Creates a queue whose writer drains into `sink`.
    pub fn spawn_writer<O>(sink: O) -> (Self, OutboundWriter)
    where
        O: Sink<OutboundFrame> + Send + Unpin + 'static,
        O::Error: fmt::Display,
    {
        let (queue, rx) = Self::new();
        (queue, OutboundWriter::spawn(rx, sink))
    }

    /// Enqueues a frame. Returns `false` if the writer has stopped.
    pub fn push(&self, frame: OutboundFrame) -> bool {
        self.tx.send(frame).is_ok()
    }

    /// Returns true once the writer will no longer deliver anything.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// The task that owns the transport sink.
pub struct OutboundWriter {
    shutdown: oneshot::Sender<()>,
    handle: JoinHandle<usize>,
}

impl OutboundWriter {
    /// Spawns the writer task.
    pub fn spawn<O>(rx: mpsc::UnboundedReceiver<OutboundFrame>, sink: O) -> Self
    where
        O: Sink<OutboundFrame> + Send + Unpin + 'static,
        O::Error: fmt::Display,
    {
        let (shutdown, shutdown_rx) = oneshot::channel();
        let handle = tokio::spawn(write_frames(rx, sink, shutdown_rx));
        Self { shutdown, handle }
    }

    /// Delivers everything already queued, closes the sink and waits for
    /// the task. Returns the number of frames written.
    pub async fn shutdown(self) -> usize {
        let _ = self.shutdown.send(());
        match self.handle.await {
            Ok(written) => written,
            Err(e) => {
                tracing::warn!(error = %e, "outbound writer task failed");
                0
            }
        }
    }
}

async fn write_frames<O>(
    mut rx: mpsc::UnboundedReceiver<OutboundFrame>,
    mut sink: O,
    mut shutdown: oneshot::Receiver<()>,
) -> usize
where
    O: Sink<OutboundFrame> + Unpin,
    O::Error: fmt::Display,
{
    let mut written = 0;
    let mut draining = false;

    loop {
        let next = if draining {
            rx.recv().await
        } else {
            tokio::select! {
                biased;
                frame = rx.recv() => frame,
                _ = &mut shutdown => {
                    // No new frames are accepted; queued ones still go out.
                    draining = true;
                    rx.close();
                    continue;
                }
            }
        };

        let Some(frame) = next else { break };
        let closing = frame.is_close();

        if let Err(e) = sink.send(frame).await {
            tracing::debug!(error = %e, "outbound write failed, stopping writer");
            break;
        }
        written += 1;

        if closing {
            break;
        }
    }

    rx.close();
    if let Err(e) = sink.close().await {
        tracing::debug!(error = %e, "failed to close outbound sink");
    }
    written
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::channel::mpsc as fmpsc;
    use futures::StreamExt;

    #[tokio::test]
    async fn frames_are_written_in_queue_order() {
        let (sink, received) = fmpsc::unbounded();
        let (queue, writer) = OutboundQueue::spawn_writer(sink);

        assert!(queue.push(OutboundFrame::Text("a".into())));
        assert!(queue.push(OutboundFrame::Ping));
        assert!(queue.push(OutboundFrame::Text("b".into())));

        assert_eq!(writer.shutdown().await, 3);
        let frames: Vec<_> = received.collect().await;
        assert_eq!(
            frames,
            vec![
                OutboundFrame::Text("a".into()),
                OutboundFrame::Ping,
                OutboundFrame::Text("b".into()),
            ]
        );
    }

    #[tokio::test]
    async fn close_frame_is_the_last_frame() {
        let (sink, received) = fmpsc::unbounded();
        let (queue, writer) = OutboundQueue::spawn_writer(sink);

        queue.push(OutboundFrame::Text("before".into()));
        queue.push(OutboundFrame::Close);
        queue.push(OutboundFrame::Text("after".into()));

        writer.shutdown().await;
        let frames: Vec<_> = received.collect().await;
        assert_eq!(
            frames,
            vec![OutboundFrame::Text("before".into()), OutboundFrame::Close]
        );
        assert!(queue.is_closed());
        assert!(!queue.push(OutboundFrame::Ping));
    }

    #[tokio::test]
    async fn writer_stops_when_sink_fails() {
        let (sink, received) = fmpsc::unbounded::<OutboundFrame>();
        drop(received);
        let (queue, writer) = OutboundQueue::spawn_writer(sink);

        queue.push(OutboundFrame::Text("lost".into()));
        assert_eq!(writer.shutdown().await, 0);
        assert!(queue.is_closed());
    }

    #[tokio::test]
    async fn shutdown_without_frames_closes_sink() {
        let (sink, mut received) = fmpsc::unbounded::<OutboundFrame>();
        let (_queue, writer) = OutboundQueue::spawn_writer(sink);

        assert_eq!(writer.shutdown().await, 0);
        assert_eq!(received.next().await, None);
    }
}
