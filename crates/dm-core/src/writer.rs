//! ASS subtitle emission.
//!
//! The header layout is fixed; everything that varies between setups (comment
//! lines, script properties, the single dialogue style) lives in
//! [`AssTemplate`] and is passed in explicitly.

use std::borrow::Cow;
use std::fmt;
use std::io::{self, Write};

use serde::{Deserialize, Serialize};

use crate::event::{AllocatedEvent, SessionInfo};
use crate::time::format_ass_time;

const STYLE_FORMAT: &str = "Format: Name, Fontname, Fontsize, PrimaryColour, SecondaryColour, \
OutlineColour, BackColour, Bold, Italic, Underline, StrikeOut, ScaleX, ScaleY, Spacing, Angle, \
BorderStyle, Outline, Shadow, Alignment, MarginL, MarginR, MarginV, Encoding";

const EVENT_FORMAT: &str =
    "Format: Layer, Start, End, Style, Name, MarginL, MarginR, MarginV, Effect, Text";

/// The single style every dialogue line uses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssStyle {
    pub name: String,
    pub font_name: String,
    pub font_size: u32,
    pub primary_colour: String,
    pub secondary_colour: String,
    pub outline_colour: String,
    pub back_colour: String,
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub strike_out: bool,
    pub scale_x: u32,
    pub scale_y: u32,
    pub spacing: f64,
    pub angle: f64,
    pub border_style: u8,
    pub outline: f64,
    pub shadow: f64,
    /// Numpad-style alignment, 1 is bottom left.
    pub alignment: u8,
    pub margin_l: u32,
    pub margin_r: u32,
    pub margin_v: u32,
    pub encoding: u8,
}

impl Default for AssStyle {
    fn default() -> Self {
        Self {
            name: "TypeA".to_string(),
            font_name: "黑体".to_string(),
            font_size: 40,
            primary_colour: "&H00FFFFFF".to_string(),
            secondary_colour: "&H000000FF".to_string(),
            outline_colour: "&H00000000".to_string(),
            back_colour: "&H00000000".to_string(),
            bold: false,
            italic: false,
            underline: false,
            strike_out: false,
            scale_x: 100,
            scale_y: 100,
            spacing: 0.0,
            angle: 0.0,
            border_style: 1,
            outline: 1.0,
            shadow: 1.0,
            alignment: 1,
            margin_l: 10,
            margin_r: 10,
            margin_v: 10,
            encoding: 1,
        }
    }
}

/// ASS booleans are `-1` for true and `0` for false.
const fn ass_flag(value: bool) -> i8 {
    if value { -1 } else { 0 }
}

impl fmt::Display for AssStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Style: {},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{}",
            self.name,
            self.font_name,
            self.font_size,
            self.primary_colour,
            self.secondary_colour,
            self.outline_colour,
            self.back_colour,
            ass_flag(self.bold),
            ass_flag(self.italic),
            ass_flag(self.underline),
            ass_flag(self.strike_out),
            self.scale_x,
            self.scale_y,
            self.spacing,
            self.angle,
            self.border_style,
            self.outline,
            self.shadow,
            self.alignment,
            self.margin_l,
            self.margin_r,
            self.margin_v,
            self.encoding,
        )
    }
}

/// Everything configurable about the emitted file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssTemplate {
    /// Lines written as `; ` comments at the top of `[Script Info]`.
    pub comments: Vec<String>,
    pub wrap_style: u8,
    pub scaled_border_and_shadow: bool,
    pub ycbcr_matrix: String,
    pub style: AssStyle,
    /// Escape override braces and line breaks in usernames and message text.
    /// Off by default, which writes text exactly as received.
    pub escape_text: bool,
}

impl Default for AssTemplate {
    fn default() -> Self {
        Self {
            comments: vec!["Converted by dmass".to_string()],
            wrap_style: 0,
            scaled_border_and_shadow: true,
            ycbcr_matrix: "None".to_string(),
            style: AssStyle::default(),
            escape_text: false,
        }
    }
}

/// A complete subtitle file, rendered through [`fmt::Display`].
#[derive(Debug, Clone, Copy)]
pub struct AssDocument<'a> {
    pub info: &'a SessionInfo,
    pub events: &'a [AllocatedEvent<'a>],
    pub template: &'a AssTemplate,
}

impl AssDocument<'_> {
    fn fmt_header(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let info = self.info;
        let template = self.template;

        writeln!(f, "[Script Info]")?;
        for comment in &template.comments {
            writeln!(f, "; {comment}")?;
        }
        writeln!(f, "Title: {}", info.title)?;
        writeln!(f, "ScriptType: v4.00+")?;
        writeln!(f, "WrapStyle: {}", template.wrap_style)?;
        writeln!(
            f,
            "ScaledBorderAndShadow: {}",
            if template.scaled_border_and_shadow { "yes" } else { "no" }
        )?;
        writeln!(f, "YCbCr Matrix: {}", template.ycbcr_matrix)?;
        writeln!(f, "RoomID: {}", info.room_id)?;
        writeln!(f, "Host: {}", info.host_name)?;
        writeln!(f, "StartLiveTime: {}", info.start_time)?;
        writeln!(f)?;

        writeln!(f, "[V4+ Styles]")?;
        writeln!(f, "{STYLE_FORMAT}")?;
        writeln!(f, "{}", template.style)?;
        writeln!(f)?;

        writeln!(f, "[Events]")?;
        writeln!(f, "{EVENT_FORMAT}")
    }

    fn fmt_dialogue(&self, f: &mut fmt::Formatter<'_>, event: &AllocatedEvent<'_>) -> fmt::Result {
        let (username, text) = if self.template.escape_text {
            (
                escape_ass_text(&event.event.username),
                escape_ass_text(&event.event.text),
            )
        } else {
            (
                Cow::Borrowed(event.event.username.as_str()),
                Cow::Borrowed(event.event.text.as_str()),
            )
        };

        // Effect field and override block are always empty.
        writeln!(
            f,
            "Dialogue: 0,{},{},{},,0,0,0,,{username}: {text}",
            format_ass_time(event.display_start),
            format_ass_time(event.display_end),
            self.template.style.name,
        )
    }
}

impl fmt::Display for AssDocument<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_header(f)?;
        for event in self.events {
            self.fmt_dialogue(f, event)?;
        }
        Ok(())
    }
}

/// Escapes text so libass shows it literally.
///
/// Braces would open override blocks and raw line breaks would end the
/// dialogue line.
#[must_use]
pub fn escape_ass_text(text: &str) -> Cow<'_, str> {
    if !text.contains(['{', '}', '\r', '\n']) {
        return Cow::Borrowed(text);
    }

    let mut escaped = String::with_capacity(text.len() + 8);
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '{' => escaped.push_str("\\{"),
            '}' => escaped.push_str("\\}"),
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
                escaped.push_str("\\N");
            }
            '\n' => escaped.push_str("\\N"),
            other => escaped.push(other),
        }
    }
    Cow::Owned(escaped)
}

/// Writes a complete subtitle file: header, then one dialogue line per event.
pub fn write_subtitles<W: Write>(
    writer: &mut W,
    info: &SessionInfo,
    events: &[AllocatedEvent<'_>],
    template: &AssTemplate,
) -> io::Result<()> {
    let document = AssDocument {
        info,
        events,
        template,
    };
    write!(writer, "{document}")?;
    writer.flush()
}

/// Renders a complete subtitle file to a string.
#[must_use]
pub fn render_subtitles(
    info: &SessionInfo,
    events: &[AllocatedEvent<'_>],
    template: &AssTemplate,
) -> String {
    AssDocument {
        info,
        events,
        template,
    }
    .to_string()
}
