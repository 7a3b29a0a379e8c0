//! Line codec for the change log and snapshot files
//!
//! Comma-separated fields, one record per line. A field containing a comma,
//! a quote, or a line break is wrapped in quotes with inner quotes doubled,
//! so a single record may span several physical lines.

use std::borrow::Cow;
use std::fs;
use std::io;
use std::path::Path;

use chrono::NaiveDateTime;
use claimwatch_core::{
    ChangeRecord, ChangeType, ChunkPos, ClaimError, ClaimResult, Dimension, OwnerId, Timestamp,
};

/// First line of every change log file
pub const CHANGE_LOG_HEADER: &str = "timestamp,team_id,team_name,dimension,chunk_x,chunk_z,type";

/// First line of every snapshot file
pub const SNAPSHOT_HEADER: &str = "dimension,chunk_x,chunk_z,team_id";

/// Written timestamp format (local ISO-8601, fraction only when non-zero)
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

/// Minute-precision form accepted on read
const TIMESTAMP_FORMAT_SHORT: &str = "%Y-%m-%dT%H:%M";

pub fn format_timestamp(ts: Timestamp) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

pub fn parse_timestamp(s: &str) -> Option<Timestamp> {
    NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT_SHORT))
        .ok()
}

/// Quote a field if it needs it
pub fn escape_field(field: &str) -> Cow<'_, str> {
    if field.contains([',', '"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", field.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(field)
    }
}

/// Split change log contents into logical records.
///
/// Line breaks inside quoted fields belong to the record. A quote opens a
/// quoted section only at the start of a field. An unterminated quoted
/// record ends at the next physical line that starts with a timestamp or a
/// header, so one torn line cannot swallow the records after it. Blank
/// lines are skipped and a trailing `\r` is stripped from every record.
pub fn split_records(text: &str) -> Vec<&str> {
    let mut records = Vec::new();
    let mut scanner = QuoteScanner::new();
    let mut start = 0;
    let mut offset = 0;

    for line in text.split_inclusive('\n') {
        let line_start = offset;
        offset += line.len();

        if scanner.in_quotes && starts_record(line) {
            push_record(&mut records, strip_newline(&text[start..line_start]));
            start = line_start;
            scanner = QuoteScanner::new();
        }
        scanner.scan(line);
        if !scanner.in_quotes {
            push_record(&mut records, strip_newline(&text[start..offset]));
            start = offset;
            scanner = QuoteScanner::new();
        }
    }
    if start < text.len() {
        push_record(&mut records, strip_newline(&text[start..]));
    }
    records
}

/// Split contents into physical lines, for files whose rows never span lines
pub fn split_lines(text: &str) -> Vec<&str> {
    let mut records = Vec::new();
    for line in text.split('\n') {
        push_record(&mut records, line);
    }
    records
}

/// Quote state of a logical record being scanned line by line
struct QuoteScanner {
    in_quotes: bool,
    field_start: bool,
}

impl QuoteScanner {
    fn new() -> Self {
        QuoteScanner {
            in_quotes: false,
            field_start: true,
        }
    }

    fn scan(&mut self, line: &str) {
        let mut chars = line.chars().peekable();
        while let Some(c) = chars.next() {
            if self.in_quotes {
                if c == '"' {
                    if chars.peek() == Some(&'"') {
                        chars.next();
                    } else {
                        self.in_quotes = false;
                    }
                }
            } else if c == ',' {
                self.field_start = true;
                continue;
            } else if c == '"' && self.field_start {
                self.in_quotes = true;
            }
            self.field_start = false;
        }
    }
}

/// Whether a physical line begins a new change log record
fn starts_record(line: &str) -> bool {
    let line = strip_newline(line);
    let line = line.strip_suffix('\r').unwrap_or(line);
    if is_header(line) {
        return true;
    }
    let first = line.split_once(',').map_or(line, |(first, _)| first);
    parse_timestamp(first.trim()).is_some()
}

fn strip_newline(s: &str) -> &str {
    s.strip_suffix('\n').unwrap_or(s)
}

fn push_record<'a>(records: &mut Vec<&'a str>, raw: &'a str) {
    let raw = raw.strip_suffix('\r').unwrap_or(raw);
    if !raw.trim().is_empty() {
        records.push(raw);
    }
}

/// Read a whole file as text; invalid UTF-8 is replaced so only the
/// affected lines fail to decode. `None` when the file does not exist.
pub fn read_text(path: &Path) -> ClaimResult<Option<String>> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(String::from_utf8_lossy(&bytes).into_owned())),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(ClaimError::io(path, err)),
    }
}

/// Split one logical record into unescaped fields
pub fn split_fields(record: &str) -> ClaimResult<Vec<String>> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut chars = record.chars().peekable();
    let mut in_quotes = false;

    while let Some(c) = chars.next() {
        if in_quotes {
            if c == '"' {
                if chars.peek() == Some(&'"') {
                    field.push('"');
                    chars.next();
                } else {
                    in_quotes = false;
                }
            } else {
                field.push(c);
            }
            continue;
        }
        match c {
            '"' if field.is_empty() => in_quotes = true,
            ',' => fields.push(std::mem::take(&mut field)),
            _ => field.push(c),
        }
    }

    if in_quotes {
        return Err(ClaimError::malformed("unterminated quoted field"));
    }
    fields.push(field);
    Ok(fields)
}

/// Encode a change record as one logical line (without terminator)
pub fn encode_record(record: &ChangeRecord) -> String {
    format!(
        "{},{},{},{},{},{},{}",
        format_timestamp(record.timestamp),
        record.owner.map(|owner| owner.to_string()).unwrap_or_default(),
        escape_field(&record.owner_name),
        escape_field(record.dimension.as_str()),
        record.pos.x,
        record.pos.z,
        record.change.as_str(),
    )
}

/// Decode one logical change log line
pub fn decode_record(line: &str) -> ClaimResult<ChangeRecord> {
    let fields = split_fields(line)?;
    let [timestamp, owner, name, dimension, x, z, change] = fields.as_slice() else {
        return Err(ClaimError::malformed(format!(
            "expected 7 fields, found {}",
            fields.len()
        )));
    };

    let timestamp = parse_timestamp(timestamp.trim())
        .ok_or_else(|| ClaimError::malformed(format!("bad timestamp {timestamp:?}")))?;
    let owner = match owner.trim() {
        "" => None,
        id => Some(
            OwnerId::parse(id).ok_or_else(|| ClaimError::malformed(format!("bad owner id {id:?}")))?,
        ),
    };
    let pos = parse_pos(x, z)?;
    let change = ChangeType::parse(change.trim())
        .ok_or_else(|| ClaimError::malformed(format!("bad change type {change:?}")))?;

    Ok(ChangeRecord::new(
        timestamp,
        owner,
        name.as_str(),
        parse_dimension(dimension)?,
        pos,
        change,
    ))
}

/// Encode one snapshot row
pub fn encode_snapshot_row(dimension: &Dimension, pos: ChunkPos, owner: OwnerId) -> String {
    format!("{},{},{},{}", escape_field(dimension.as_str()), pos.x, pos.z, owner)
}

/// Decode one snapshot row
pub fn decode_snapshot_row(line: &str) -> ClaimResult<(Dimension, ChunkPos, OwnerId)> {
    let fields = split_fields(line)?;
    let [dimension, x, z, owner] = fields.as_slice() else {
        return Err(ClaimError::malformed(format!(
            "expected 4 fields, found {}",
            fields.len()
        )));
    };
    let owner = OwnerId::parse(owner.trim())
        .filter(|owner| !owner.is_nil())
        .ok_or_else(|| ClaimError::malformed(format!("bad owner id {owner:?}")))?;
    Ok((parse_dimension(dimension)?, parse_pos(x, z)?, owner))
}

/// True if a logical line is one of the known headers
pub fn is_header(line: &str) -> bool {
    let line = line.trim();
    line == CHANGE_LOG_HEADER || line == SNAPSHOT_HEADER
}

fn parse_dimension(s: &str) -> ClaimResult<Dimension> {
    Dimension::parse(s.trim()).ok_or_else(|| ClaimError::malformed(format!("bad dimension {s:?}")))
}

fn parse_pos(x: &str, z: &str) -> ClaimResult<ChunkPos> {
    let coord = |s: &str| {
        s.trim()
            .parse::<i32>()
            .map_err(|_| ClaimError::malformed(format!("bad chunk coordinate {s:?}")))
    };
    Ok(ChunkPos::new(coord(x)?, coord(z)?))
}
