//! JSONL notification feed reading.
//!
//! The feed is an append-only file with one JSON notification per line. A new
//! run may overwrite it, which shows up as the file shrinking.

use std::fs::{self, File};
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use anyhow::{Context, Result};
use tracing::debug;

use crate::event::Notification;
use crate::ingest::decode_line;

/// Incremental reader returning only complete lines appended since the last read.
#[derive(Debug, Default)]
pub struct FeedCursor {
    offset: u64,
    partial: Vec<u8>,
}

impl FeedCursor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Read lines appended to `path` since the previous call.
    ///
    /// A trailing line without a newline is held back until it is completed.
    pub fn read_new(&mut self, path: &Path) -> Result<Vec<String>> {
        let mut file = File::open(path).with_context(|| format!("open feed {}", path.display()))?;
        let len = file
            .metadata()
            .with_context(|| format!("stat feed {}", path.display()))?
            .len();
        if len < self.offset {
            debug!(path = %path.display(), len, offset = self.offset, "feed truncated, rewinding");
            self.offset = 0;
            self.partial.clear();
        }

        file.seek(SeekFrom::Start(self.offset))
            .with_context(|| format!("seek feed {}", path.display()))?;
        let mut buf = Vec::new();
        file.read_to_end(&mut buf)
            .with_context(|| format!("read feed {}", path.display()))?;
        self.offset += buf.len() as u64;
        self.partial.extend_from_slice(&buf);

        let mut lines = Vec::new();
        while let Some(pos) = self.partial.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.partial.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&raw);
            let line = line.trim_end_matches(['\n', '\r']);
            if !line.trim().is_empty() {
                lines.push(line.to_string());
            }
        }
        Ok(lines)
    }
}

/// Decode every notification in a feed file, skipping lines that do not decode.
pub fn read_feed(path: &Path) -> Result<Vec<Notification>> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("read feed {}", path.display()))?;
    Ok(contents.lines().filter_map(decode_line).collect())
}
