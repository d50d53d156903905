use async_trait::async_trait;

/// How a message left the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Posted to the chat destination.
    Sent,
    /// No destination configured; the message was written to the log.
    Logged,
}

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("chat request failed: {0}")]
    Transport(String),
    #[error("chat endpoint returned HTTP {0}")]
    Status(u16),
}

/// Outbound chat transport.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn send(&self, text: &str) -> Result<Delivery, SinkError>;
}
