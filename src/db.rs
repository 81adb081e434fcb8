//! Line-oriented dump of a [`FingerprintIndex`].
//!
//! ```text
//! *
//! <hash>
//! <count>
//! <song> <seconds>     (count lines)
//! ```

use std::{
    fs::{self, File},
    io::{self, BufRead, BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};

use tracing::{info, warn};

use crate::{error::FingerprintError, index::FingerprintIndex};

const RECORD_MARKER: &str = "*";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadStatus {
    Loaded,
    /// No database file yet; the index starts empty.
    Missing,
    /// Parsing stopped at `line` (1-based); everything before it was kept.
    Truncated { line: usize, reason: String },
}

#[derive(Debug)]
pub struct LoadReport {
    pub index: FingerprintIndex,
    pub status: LoadStatus,
    pub records: usize,
}

/// Loads a database file. A missing file or a malformed line is not an error:
/// the report says what happened and carries whatever was read.
pub fn load(path: impl AsRef<Path>) -> Result<LoadReport, FingerprintError> {
    let path = path.as_ref();
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            info!(path = %path.display(), "no fingerprint database yet, starting empty");
            return Ok(LoadReport {
                index: FingerprintIndex::new(),
                status: LoadStatus::Missing,
                records: 0,
            });
        }
        Err(e) => return Err(e.into()),
    };

    let report = read_from(BufReader::new(file))?;
    match &report.status {
        LoadStatus::Truncated { line, reason } => warn!(
            path = %path.display(),
            "database truncated at line {}: {}; kept {} records",
            line,
            reason,
            report.records
        ),
        _ => info!(
            path = %path.display(),
            "loaded {} records ({} entries, {} songs)",
            report.records,
            report.index.entry_count(),
            report.index.song_count()
        ),
    }
    Ok(report)
}

/// Parses the textual format from any reader. A malformed or unreadable line
/// ends parsing with [`LoadStatus::Truncated`]; records before it are kept.
pub fn read_from<R: BufRead>(reader: R) -> Result<LoadReport, FingerprintError> {
    let mut index = FingerprintIndex::new();
    let mut records = 0;
    let lines = reader.lines().enumerate().map(|(i, line)| (i + 1, line));

    let status = match read_records(lines, &mut index, &mut records) {
        Ok(()) => LoadStatus::Loaded,
        Err((line, reason)) => LoadStatus::Truncated { line, reason },
    };
    Ok(LoadReport {
        index,
        status,
        records,
    })
}

/// Line number and reason of the first line that could not be used.
type Stop = (usize, String);

fn read_records<I>(mut lines: I, index: &mut FingerprintIndex, records: &mut usize) -> Result<(), Stop>
where
    I: Iterator<Item = (usize, io::Result<String>)>,
{
    while let Some((line_no, marker)) = next_non_blank(&mut lines)? {
        if marker.trim() != RECORD_MARKER {
            return Err((line_no, format!("expected '*', found {:?}", marker)));
        }

        let (line_no, hash_line) =
            next_non_blank(&mut lines)?.ok_or_else(|| (line_no + 1, "missing hash".to_owned()))?;
        let hash = parse_hash(hash_line.trim()).ok_or_else(|| (line_no, format!("bad hash {:?}", hash_line)))?;

        let (line_no, count_line) = next_non_blank(&mut lines)?
            .ok_or_else(|| (line_no + 1, "missing occurrence count".to_owned()))?;
        let count = count_line
            .trim()
            .parse::<usize>()
            .map_err(|_| (line_no, format!("bad count {:?}", count_line)))?;

        let mut last_line = line_no;
        for _ in 0..count {
            let (line_no, entry_line) = next_non_blank(&mut lines)?
                .ok_or_else(|| (last_line + 1, "missing occurrence".to_owned()))?;
            let (song, offset) =
                parse_occurrence(&entry_line).ok_or_else(|| (line_no, format!("bad occurrence {:?}", entry_line)))?;
            index.insert(hash, song, offset);
            last_line = line_no;
        }
        *records += 1;
    }
    Ok(())
}

fn next_non_blank<I>(lines: &mut I) -> Result<Option<(usize, String)>, Stop>
where
    I: Iterator<Item = (usize, io::Result<String>)>,
{
    for (line_no, line) in lines {
        let line = line.map_err(|e| (line_no, format!("unreadable line: {}", e)))?;
        if !line.trim().is_empty() {
            return Ok(Some((line_no, line)));
        }
    }
    Ok(None)
}

// Older dumps stored hashes as signed 64-bit values.
fn parse_hash(text: &str) -> Option<u64> {
    text.parse::<u64>()
        .ok()
        .or_else(|| text.parse::<i64>().ok().map(|h| h as u64))
}

// `<song> <seconds>`; the offset is the last token, the song is the rest.
fn parse_occurrence(line: &str) -> Option<(&str, u32)> {
    let (song, offset) = line.trim().rsplit_once(char::is_whitespace)?;
    let song = song.trim_end();
    if song.is_empty() {
        return None;
    }
    Some((song, offset.parse().ok()?))
}

/// Writes the index in ascending hash order, replacing `path` atomically.
/// The dump goes to `<path>.tmp` first, which is removed again on failure.
pub fn save(index: &FingerprintIndex, path: impl AsRef<Path>) -> Result<(), FingerprintError> {
    let path = path.as_ref();
    let tmp_path = temp_path(path);

    let written = write_file(index, &tmp_path).and_then(|()| Ok(fs::rename(&tmp_path, path)?));
    if let Err(e) = written {
        fs::remove_file(&tmp_path).ok();
        return Err(e);
    }

    info!(
        path = %path.display(),
        "saved {} records ({} entries)",
        index.len(),
        index.entry_count()
    );
    Ok(())
}

fn write_file(index: &FingerprintIndex, path: &Path) -> Result<(), FingerprintError> {
    let mut writer = BufWriter::new(File::create(path)?);
    write_to(index, &mut writer)?;
    writer.flush()?;
    Ok(())
}

// `songs.db` -> `songs.db.tmp`, so a sibling `songs.tmp` is never touched.
fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

pub fn write_to<W: Write>(index: &FingerprintIndex, writer: &mut W) -> Result<(), FingerprintError> {
    for (hash, entries) in index.buckets() {
        writeln!(writer, "{}", RECORD_MARKER)?;
        writeln!(writer, "{}", hash)?;
        writeln!(writer, "{}", entries.len())?;
        for entry in entries {
            writeln!(writer, "{} {}", index.song_name(entry.song), entry.time_offset)?;
        }
    }
    Ok(())
}
