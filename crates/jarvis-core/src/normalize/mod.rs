//! Conversion of the three raw shapes into [`NotificationEvent`]s:
//! polled API records ([`poll`]), native GitHub webhook deliveries
//! ([`webhook`]) and flattened dispatch payloads ([`payload`]).
//!
//! [`NotificationEvent`]: crate::events::NotificationEvent

pub mod payload;
pub mod poll;
pub mod webhook;

pub use payload::{FlatPayload, flatten, from_payload, from_payload_str};
pub use poll::{PollItem, from_poll};
pub use webhook::from_webhook;

/// First line of a commit message, or `None` when it is blank.
pub fn commit_summary(message: &str) -> Option<String> {
    let first = message.split('\n').next().unwrap_or_default().trim_end_matches('\r');
    if first.trim().is_empty() {
        None
    } else {
        Some(first.to_string())
    }
}
