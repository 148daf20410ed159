//! Time-slot allocation for chat messages.
//!
//! Decides how long each chat message stays on screen by simulating a
//! scrolling chat overlay that holds a fixed number of lines.
//!
//! # Algorithm Summary
//!
//! 1. Keep two FIFO queues of indices into the input: `active` (lines on
//!    screen, at most `capacity`) and `standby` (lines waiting to appear).
//! 2. For each message in order, top `active` up from `standby`.
//! 3. Within the last `capacity` messages, append a copy of the newest active
//!    index to `standby` so there is always a follower to measure against.
//! 4. The front of `active` is shown until the front of `standby` would have
//!    appeared: `end = start + (standby.front - active.front)`.
//! 5. Pop the front of `active` and move on.
//!
//! With unit-spaced timestamps this makes message `i` disappear when message
//! `i + capacity` arrives. Messages near the end of the log all expire at the
//! last message's timestamp, so the final message gets a zero-length cue.
//! [`AllocationConfig::tail_duration`] can give those cues a fixed length.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::event::{AllocatedEvent, ChatEvent};
use crate::time::round_centis;

/// Number of chat lines treated as visible at once.
pub const DEFAULT_CAPACITY: usize = 7;

/// Configuration for time-slot allocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AllocationConfig {
    /// Maximum number of messages on screen at once.
    /// Default: 7.
    pub capacity: usize,

    /// Seconds to show a message whose padded window came out empty.
    /// Default: `None`, which keeps zero-length cues.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tail_duration: Option<f64>,
}

impl Default for AllocationConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            tail_duration: None,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum AllocationError {
    #[error("allocation capacity must be at least 1")]
    ZeroCapacity,
    #[error("chat event #{index} has an invalid timestamp: {value}")]
    InvalidTimestamp { index: usize, value: f64 },
}

/// Result of allocating display windows.
#[derive(Debug, Clone, PartialEq)]
pub struct Allocation<'a> {
    /// One entry per input event, in input order.
    pub events: Vec<AllocatedEvent<'a>>,

    /// Largest size the active window reached.
    pub peak_occupancy: usize,

    /// Number of duplicated follower slots appended to standby.
    pub padded: usize,
}

/// Assigns each chat message a display window.
///
/// Events are expected in non-decreasing timestamp order; out-of-order input
/// is accepted and can yield negative durations, which are passed through.
/// An empty slice yields an empty allocation.
pub fn allocate<'a>(
    events: &'a [ChatEvent],
    config: &AllocationConfig,
) -> Result<Allocation<'a>, AllocationError> {
    let capacity = config.capacity;
    if capacity == 0 {
        return Err(AllocationError::ZeroCapacity);
    }
    validate_timestamps(events)?;

    let total = events.len();
    let tail_start = total.saturating_sub(capacity);

    let mut active: VecDeque<usize> = VecDeque::with_capacity(capacity + 1);
    let mut standby: VecDeque<usize> = (0..total).collect();
    let mut allocated = Vec::with_capacity(total);
    let mut peak_occupancy = 0;
    let mut padded = 0;

    for index in 0..total {
        while active.len() < capacity {
            let Some(next) = standby.pop_front() else {
                break;
            };
            active.push_back(next);
        }

        if index >= tail_start {
            // Followers run out here; measure against a copy of the newest line.
            if let Some(&newest) = active.back() {
                standby.push_back(newest);
                padded += 1;
            }
        }
        peak_occupancy = peak_occupancy.max(active.len());

        // Before the tail standby still holds unseen events; from the tail on
        // it is padded every step, so neither queue can be empty here.
        let (Some(&current), Some(&follower)) = (active.front(), standby.front()) else {
            unreachable!("display window emptied at chat event #{index}");
        };
        debug_assert_eq!(current, index, "active window out of order");

        let start = events[current].timestamp;
        let shown_for = round_centis(events[follower].timestamp - start);
        let end = match config.tail_duration {
            Some(fallback) if index >= tail_start && shown_for <= 0.0 => start + fallback,
            _ => start + shown_for,
        };

        allocated.push(AllocatedEvent {
            event: &events[current],
            display_start: start,
            display_end: end,
        });
        active.pop_front();
    }

    tracing::debug!(
        events = total,
        capacity,
        peak_occupancy,
        padded,
        "allocated display windows"
    );

    Ok(Allocation {
        events: allocated,
        peak_occupancy,
        padded,
    })
}

fn validate_timestamps(events: &[ChatEvent]) -> Result<(), AllocationError> {
    if let Some((index, event)) = events
        .iter()
        .enumerate()
        .find(|(_, e)| !e.timestamp.is_finite() || e.timestamp < 0.0)
    {
        return Err(AllocationError::InvalidTimestamp {
            index,
            value: event.timestamp,
        });
    }

    let out_of_order = events
        .windows(2)
        .filter(|pair| pair[1].timestamp < pair[0].timestamp)
        .count();
    if out_of_order > 0 {
        tracing::debug!(out_of_order, "chat timestamps are not monotonic");
    }

    Ok(())
}
