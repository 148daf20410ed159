//! Core logic for turning recorded live-stream chat into subtitles.
//!
//! This crate contains:
//! - Reader: parsing recorder session logs into chat and gift events
//! - Allocation: deciding how long each chat message stays on screen
//! - Writer: emitting the allocated messages as an ASS subtitle file

mod allocation;
pub mod colour;
pub mod event;
pub mod reader;
mod time;
pub mod writer;

pub use allocation::{
    Allocation, AllocationConfig, AllocationError, DEFAULT_CAPACITY, allocate,
};
pub use colour::{Colour, ColourParseError};
pub use event::{AllocatedEvent, ChatEvent, GiftEvent, SessionInfo, SessionLog};
pub use reader::{ReadError, ReadOptions, parse_session, read_session};
pub use time::format_ass_time;
pub use writer::{AssDocument, AssStyle, AssTemplate, render_subtitles, write_subtitles};
