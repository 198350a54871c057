//! ZIP export of every costume photo, named after its participant.

use std::collections::HashMap;
use std::io::{Cursor, Write};
use std::path::PathBuf;

use tracing::warn;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::ServerError;

/// One file to place in the archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    pub name: String,
    pub path: PathBuf,
}

/// Tracks names already handed out so duplicates get a ` (n)` suffix.
#[derive(Debug, Default)]
pub struct EntryNamer {
    seen: HashMap<String, usize>,
}

impl EntryNamer {
    /// `<participant>[ - <costume>].<ext>`, made safe for any filesystem.
    pub fn name(&mut self, participant: &str, costume: Option<&str>, ext: &str) -> String {
        let mut stem = sanitize(participant);
        if let Some(costume) = costume.map(sanitize).filter(|c| !c.is_empty()) {
            stem = format!("{stem} - {costume}");
        }
        if stem.is_empty() {
            stem = "photo".to_string();
        }

        let count = self.seen.entry(stem.to_lowercase()).or_insert(0);
        *count += 1;
        let ext = ext.to_ascii_lowercase();
        if *count == 1 {
            format!("{stem}.{ext}")
        } else {
            format!("{stem} ({count}).{ext}")
        }
    }
}

fn sanitize(raw: &str) -> String {
    raw.chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, ' ' | '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect::<String>()
        .trim_matches(|c: char| c == '.' || c.is_whitespace())
        .to_string()
}

/// Write `entries` into an uncompressed ZIP held in memory.
///
/// Images are already compressed, so entries are stored as-is. Files that
/// cannot be read are skipped. Returns the archive and the number of entries
/// written.
pub fn build_archive(entries: &[ArchiveEntry]) -> Result<(Vec<u8>, usize), ServerError> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
    let mut written = 0;

    for entry in entries {
        let data = match std::fs::read(&entry.path) {
            Ok(data) => data,
            Err(e) => {
                warn!(path = %entry.path.display(), error = %e, "Skipping unreadable photo");
                continue;
            }
        };

        zip.start_file(entry.name.as_str(), options)
            .map_err(|e| ServerError::Archive(format!("{}: {e}", entry.name)))?;
        zip.write_all(&data)
            .map_err(|e| ServerError::Archive(format!("{}: {e}", entry.name)))?;
        written += 1;
    }

    let cursor = zip
        .finish()
        .map_err(|e| ServerError::Archive(e.to_string()))?;
    Ok((cursor.into_inner(), written))
}
