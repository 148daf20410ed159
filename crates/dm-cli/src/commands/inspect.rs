//! Inspect command for summarising a session log.
//!
//! Unlike `convert`, this reads gift records too and reports per-gift totals.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;

use dm_core::{Colour, ReadOptions, SessionInfo, SessionLog, format_ass_time, read_session};

#[derive(Debug, Args)]
pub struct InspectArgs {
    /// Session log (XML) to inspect.
    pub source: PathBuf,

    /// Output as JSON.
    #[arg(long)]
    pub json: bool,
}

/// Total count for one kind of gift.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GiftTotal {
    pub gift_name: String,
    pub count: u64,
}

/// Number of chat messages sent in one colour.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColourTotal {
    pub colour: Colour,
    pub count: usize,
}

/// Summary of a session log.
#[derive(Debug, Serialize)]
pub struct SessionSummary<'a> {
    pub session: &'a SessionInfo,
    pub chat_count: usize,
    pub first_chat_at: Option<f64>,
    pub last_chat_at: Option<f64>,
    /// Sorted by colour value.
    pub colour_totals: Vec<ColourTotal>,
    pub gift_event_count: usize,
    /// Sorted by gift name.
    pub gift_totals: Vec<GiftTotal>,
}

impl<'a> SessionSummary<'a> {
    pub fn from_log(log: &'a SessionLog) -> Self {
        let mut colours: BTreeMap<Colour, usize> = BTreeMap::new();
        for chat in &log.chats {
            *colours.entry(chat.colour).or_default() += 1;
        }

        let mut totals: BTreeMap<&str, u64> = BTreeMap::new();
        for gift in &log.gifts {
            *totals.entry(gift.gift_name.as_str()).or_default() += u64::from(gift.gift_count);
        }

        Self {
            session: &log.info,
            chat_count: log.chats.len(),
            first_chat_at: log.chats.first().map(|c| c.timestamp),
            last_chat_at: log.chats.last().map(|c| c.timestamp),
            colour_totals: colours
                .into_iter()
                .map(|(colour, count)| ColourTotal { colour, count })
                .collect(),
            gift_event_count: log.gifts.len(),
            gift_totals: totals
                .into_iter()
                .map(|(gift_name, count)| GiftTotal {
                    gift_name: gift_name.to_string(),
                    count,
                })
                .collect(),
        }
    }
}

/// Formats a summary for terminal output.
pub fn format_summary(summary: &SessionSummary<'_>) -> String {
    let mut output = String::new();
    let session = summary.session;

    let _ = writeln!(output, "Session: {}", session.title);
    let _ = writeln!(output, "Room:    {}", session.room_id);
    let _ = writeln!(output, "Host:    {}", session.host_name);
    let _ = writeln!(output, "Started: {}", session.start_time);

    match (summary.first_chat_at, summary.last_chat_at) {
        (Some(first), Some(last)) => {
            let _ = writeln!(
                output,
                "Chats:   {} ({} to {})",
                summary.chat_count,
                format_ass_time(first),
                format_ass_time(last)
            );
        }
        _ => {
            let _ = writeln!(output, "Chats:   0");
        }
    }

    if !summary.colour_totals.is_empty() {
        let colours: Vec<_> = summary
            .colour_totals
            .iter()
            .map(|total| format!("#{} x{}", total.colour.hex(), total.count))
            .collect();
        let _ = writeln!(output, "Colours: {}", colours.join(", "));
    }

    let _ = writeln!(output, "Gifts:   {}", summary.gift_event_count);
    for total in &summary.gift_totals {
        let _ = writeln!(output, "- {} x{}", total.gift_name, total.count);
    }

    output
}

pub fn run<W: Write>(writer: &mut W, args: &InspectArgs) -> Result<()> {
    let options = ReadOptions {
        include_gifts: true,
    };
    let log = read_session(&args.source, &options)
        .with_context(|| format!("failed to read session log {}", args.source.display()))?;
    let summary = SessionSummary::from_log(&log);

    if args.json {
        let json = serde_json::to_string_pretty(&summary).context("failed to serialize summary")?;
        writeln!(writer, "{json}")?;
    } else {
        write!(writer, "{}", format_summary(&summary))?;
    }

    Ok(())
}
