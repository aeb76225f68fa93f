//! Relays database notifications to the client.

use crate::application::outbound::OutboundQueue;
use crate::domain::foundation::SessionId;
use crate::domain::protocol::OutboundFrame;
use crate::ports::{Notification, NotificationHandler};

/// Forwards every notification payload verbatim as a text frame.
///
/// Which channels reach a session is decided by the `LISTEN`s issued on
/// its connection; the forwarder itself does not filter.
pub struct EventForwarder {
    session_id: SessionId,
    outbound: OutboundQueue,
}

impl EventForwarder {
    pub fn new(session_id: SessionId, outbound: OutboundQueue) -> Self {
        Self {
            session_id,
            outbound,
        }
    }
}

impl NotificationHandler for EventForwarder {
    fn on_notification(&self, notification: Notification) {
        tracing::debug!(
            session_id = %self.session_id,
            channel = %notification.channel,
            process_id = notification.process_id,
            "forwarding notification"
        );
        if !self.outbound.push(OutboundFrame::Text(notification.payload)) {
            tracing::debug!(
                session_id = %self.session_id,
                channel = %notification.channel,
                "outbound stream closed, notification dropped"
            );
        }
    }
}
