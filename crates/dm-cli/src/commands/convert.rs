//! Implementation of the `dmass convert` command.
//!
//! Reads a session log, allocates a display window for every chat message and
//! writes the result as an ASS subtitle file. The file is written under a
//! temporary name and renamed into place, so a failed run leaves nothing
//! behind.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;

use dm_core::{ReadOptions, allocate, read_session, write_subtitles};

use crate::Config;

#[derive(Debug, Args)]
pub struct ConvertArgs {
    /// Session log (XML) to convert.
    pub source: PathBuf,

    /// Subtitle file to write. Defaults to `output_path` from the config.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Escape override braces and line breaks in chat text.
    #[arg(long)]
    pub escape_text: bool,
}

pub fn run<W: Write>(writer: &mut W, args: &ConvertArgs, config: &Config) -> Result<()> {
    // Gifts are never rendered, so skip them entirely.
    let log = read_session(&args.source, &ReadOptions::default())
        .with_context(|| format!("failed to read session log {}", args.source.display()))?;

    let allocation =
        allocate(&log.chats, &config.allocation).context("failed to allocate display windows")?;

    let mut template = config.template.clone();
    template.escape_text |= args.escape_text;

    let output_path = args.output.as_deref().unwrap_or(&config.output_path);
    write_atomically(output_path, |out| {
        write_subtitles(out, &log.info, &allocation.events, &template)
    })?;

    tracing::debug!(
        source = %args.source.display(),
        output = %output_path.display(),
        dialogue_lines = allocation.events.len(),
        "conversion finished"
    );
    writeln!(
        writer,
        "Wrote {} dialogue lines to {}",
        allocation.events.len(),
        output_path.display()
    )?;
    Ok(())
}

/// Writes a file through a sibling `.tmp` file and an atomic rename.
///
/// Creates missing parent directories. On failure the temporary file is
/// removed and `path` is left untouched.
fn write_atomically<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(&mut BufWriter<File>) -> io::Result<()>,
{
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create output directory {}", parent.display()))?;
    }

    let tmp_path = path.with_extension("tmp");
    let written = File::create(&tmp_path).and_then(|file| {
        let mut out = BufWriter::new(file);
        write(&mut out)?;
        out.into_inner()
            .map_err(io::IntoInnerError::into_error)?
            .sync_all()
    });

    if let Err(e) = written {
        // Best effort; the write error is the one worth reporting.
        let _ = fs::remove_file(&tmp_path);
        return Err(e).with_context(|| format!("failed to write {}", tmp_path.display()));
    }

    if let Err(e) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(e).with_context(|| {
            format!(
                "failed to move {} into place at {}",
                tmp_path.display(),
                path.display()
            )
        });
    }

    Ok(())
}
