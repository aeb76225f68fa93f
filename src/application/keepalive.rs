//! Periodic transport heartbeat.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::application::outbound::OutboundQueue;
use crate::domain::protocol::OutboundFrame;

/// Interval between heartbeat pings.
pub const DEFAULT_KEEPALIVE_INTERVAL: Duration = Duration::from_secs(30);

/// Background task that enqueues a ping every interval.
///
/// Once the outbound stream is closed the pulse ends on its own without
/// reporting anything. The session aborts it at teardown.
pub struct KeepalivePulse {
    handle: JoinHandle<()>,
}

impl KeepalivePulse {
    /// Starts pulsing. The first ping goes out one full interval from now.
    pub fn start(outbound: OutboundQueue, interval: Duration) -> Self {
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // Skip the immediate first tick
            ticker.tick().await;

            loop {
                ticker.tick().await;
                if !outbound.push(OutboundFrame::Ping) {
                    tracing::debug!("outbound stream closed, keepalive stopped");
                    break;
                }
            }
        });
        Self { handle }
    }

    /// Cancels the pulse.
    pub fn stop(self) {
        self.handle.abort();
    }

    #[cfg(test)]
    fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc::error::TryRecvError;

    #[tokio::test(start_paused = true)]
    async fn pings_once_per_interval() {
        let (queue, mut rx) = OutboundQueue::new();
        let pulse = KeepalivePulse::start(queue, Duration::from_secs(30));

        tokio::time::sleep(Duration::from_secs(29)).await;
        assert_eq!(rx.try_recv(), Err(TryRecvError::Empty));

        tokio::time::sleep(Duration::from_secs(62)).await;
        assert_eq!(rx.try_recv(), Ok(OutboundFrame::Ping));
        assert_eq!(rx.try_recv(), Ok(OutboundFrame::Ping));
        assert_eq!(rx.try_recv(), Ok(OutboundFrame::Ping));
        assert_eq!(rx.try_recv(), Err(TryRecvError::Empty));

        pulse.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn ends_silently_when_stream_is_closed() {
        let (queue, rx) = OutboundQueue::new();
        drop(rx);
        let pulse = KeepalivePulse::start(queue, Duration::from_secs(30));

        tokio::time::sleep(Duration::from_secs(31)).await;
        tokio::task::yield_now().await;
        assert!(pulse.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn stop_cancels_further_pings() {
        let (queue, mut rx) = OutboundQueue::new();
        let pulse = KeepalivePulse::start(queue, Duration::from_secs(30));

        pulse.stop();
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert!(rx.try_recv().is_err());
    }
}
