//! Outgoing mail hand-off.
//!
//! Delivery itself is external; the services only enqueue messages.

use tokio::sync::mpsc;

use crate::error::{ServiceError, ServiceResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailMessage {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub html_body: String,
}

pub trait MailDispatcher: Send + Sync {
    /// ## Summary
    /// Enqueues a message without waiting for delivery.
    ///
    /// ## Errors
    /// Returns `InternalServer` if the delivery side has shut down.
    fn send(&self, message: MailMessage) -> ServiceResult<()>;
}

/// Dispatcher backed by an unbounded channel drained by the delivery task.
#[derive(Debug, Clone)]
pub struct ChannelMailer {
    sender: mpsc::UnboundedSender<MailMessage>,
}

impl ChannelMailer {
    #[must_use]
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<MailMessage>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl MailDispatcher for ChannelMailer {
    fn send(&self, message: MailMessage) -> ServiceResult<()> {
        tracing::debug!(to = %message.to, subject = %message.subject, "Mail queued");
        self.sender.send(message).map_err(|e| {
            ServiceError::InternalServer(anyhow::anyhow!("mail channel closed: {e}"))
        })
    }
}
