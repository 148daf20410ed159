//! Records read from a recorded live-stream session log.

use chrono::{DateTime, FixedOffset};
use serde::Serialize;

use crate::colour::Colour;

/// A single chat message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatEvent {
    /// Seconds since stream start.
    pub timestamp: f64,
    /// Display name of the sender.
    pub username: String,
    /// Message body, unescaped.
    pub text: String,
    /// Colour the message was sent with.
    pub colour: Colour,
}

/// A gift sent during the stream.
///
/// Gifts are never rendered; they are surfaced for callers that want them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GiftEvent {
    /// Seconds since stream start.
    pub timestamp: f64,
    pub username: String,
    pub gift_name: String,
    pub gift_count: u32,
}

/// Metadata describing the recorded stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionInfo {
    pub room_id: String,
    /// Display name of the streamer.
    pub host_name: String,
    /// Stream start time truncated to whole seconds, e.g. `2021-01-26T21:01:31`.
    pub start_time: String,
    /// Full start time, when the recorder wrote a valid RFC 3339 value.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<FixedOffset>>,
    /// Subtitle title, taken from the source file name.
    pub title: String,
}

/// Everything read from one session log.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionLog {
    pub info: SessionInfo,
    /// Chat messages in document order.
    pub chats: Vec<ChatEvent>,
    /// Gifts in document order. Empty unless gifts were requested.
    pub gifts: Vec<GiftEvent>,
}

/// A chat message with its computed display window.
///
/// `display_start` is always the message's own timestamp; only the end is
/// computed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AllocatedEvent<'a> {
    pub event: &'a ChatEvent,
    pub display_start: f64,
    pub display_end: f64,
}

impl AllocatedEvent<'_> {
    /// Visible duration in seconds. May be zero near the end of a log.
    #[must_use]
    pub fn duration(&self) -> f64 {
        self.display_end - self.display_start
    }
}
