//! Line-oriented text parsing shared by the user-config and power-limit files.

use std::fmt;

use thiserror::Error;

/// Fatal parse failure. Individual bad entries never end up here.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("Declared size {size} exceeds buffer length {len}")]
    SizeExceedsBuffer { size: usize, len: usize },
}

/// Why a single entry was rejected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EntryError {
    #[error("unknown key '{0}'")]
    UnknownKey(String),
    #[error("invalid number '{0}'")]
    InvalidNumber(String),
    #[error("value {value} out of range {min}..={max}")]
    OutOfRange { value: i64, min: i64, max: i64 },
    #[error("expected {expected} values, got {actual}")]
    WrongLength { expected: usize, actual: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WarningKind {
    /// Line is neither a section header nor `key=value`.
    Malformed,
    /// Entry appears before any section header.
    OutsideSection,
    /// Entry rejected by its table.
    Entry { key: String, error: EntryError },
}

impl fmt::Display for WarningKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WarningKind::Malformed => write!(f, "malformed line"),
            WarningKind::OutsideSection => write!(f, "entry outside of any section"),
            WarningKind::Entry { key, error } => write!(f, "{}: {}", key, error),
        }
    }
}

/// A skipped entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseWarning {
    /// 1-based line number.
    pub line: usize,
    pub kind: WarningKind,
}

impl fmt::Display for ParseWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line, self.kind)
    }
}

/// Outcome of a parse that did not fail outright.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParseReport {
    pub warnings: Vec<ParseWarning>,
    /// Entries or rows actually applied.
    pub applied: usize,
}

impl ParseReport {
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    pub(crate) fn warn(&mut self, line: usize, kind: WarningKind) {
        tracing::warn!(line, "Skipping config entry: {}", kind);
        self.warnings.push(ParseWarning { line, kind });
    }
}

/// Split the first `size` bytes of `buffer` into 1-based numbered lines.
///
/// Each line is decoded on its own. An undecodable comment reads as blank,
/// any other undecodable line as `None`.
pub(crate) fn lines_of(
    buffer: &[u8],
    size: usize,
) -> Result<impl Iterator<Item = (usize, Option<&str>)>, ParseError> {
    if size > buffer.len() {
        return Err(ParseError::SizeExceedsBuffer {
            size,
            len: buffer.len(),
        });
    }
    Ok(buffer[..size]
        .split(|&b| b == b'\n')
        .enumerate()
        .map(|(idx, raw)| {
            let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
            let text = match std::str::from_utf8(raw) {
                Ok(text) => Some(text),
                Err(_) if is_comment(raw) => Some(""),
                Err(_) => None,
            };
            (idx + 1, text)
        }))
}

fn is_comment(raw: &[u8]) -> bool {
    matches!(
        raw.iter().find(|b| !b.is_ascii_whitespace()),
        Some(b'#' | b';')
    )
}

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Line<'a> {
    Blank,
    Section(&'a str),
    Entry { key: &'a str, value: &'a str },
    Malformed,
}

pub(crate) fn classify(raw: &str) -> Line<'_> {
    let line = raw.trim();
    if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
        return Line::Blank;
    }
    if let Some(rest) = line.strip_prefix('[') {
        return match rest.strip_suffix(']') {
            Some(name) if !name.trim().is_empty() => Line::Section(name.trim()),
            _ => Line::Malformed,
        };
    }
    match line.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => Line::Entry {
            key: key.trim(),
            value: value.trim(),
        },
        _ => Line::Malformed,
    }
}

pub(crate) fn parse_int(s: &str) -> Result<i64, EntryError> {
    let s = s.trim();
    let (negative, digits) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s.strip_prefix('+').unwrap_or(s)),
    };
    if !digits.starts_with(|c: char| c.is_ascii_digit()) {
        return Err(EntryError::InvalidNumber(s.to_string()));
    }
    let magnitude = match digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        Some(hex) if !hex.starts_with('+') => u32::from_str_radix(hex, 16).map(i64::from),
        Some(_) => return Err(EntryError::InvalidNumber(s.to_string())),
        None => digits.parse::<u32>().map(i64::from),
    }
    .map_err(|_| EntryError::InvalidNumber(s.to_string()))?;
    Ok(if negative { -magnitude } else { magnitude })
}

fn in_range(value: i64, min: i64, max: i64) -> Result<i64, EntryError> {
    if value < min || value > max {
        Err(EntryError::OutOfRange { value, min, max })
    } else {
        Ok(value)
    }
}

pub(crate) fn parse_i8(s: &str) -> Result<i8, EntryError> {
    Ok(in_range(parse_int(s)?, i8::MIN as i64, i8::MAX as i64)? as i8)
}

pub(crate) fn parse_u8(s: &str) -> Result<u8, EntryError> {
    Ok(in_range(parse_int(s)?, 0, u8::MAX as i64)? as u8)
}

pub(crate) fn parse_bool(s: &str) -> Result<bool, EntryError> {
    Ok(in_range(parse_int(s)?, 0, 1)? == 1)
}

/// Comma-separated list of exactly `N` signed bytes.
pub(crate) fn parse_array<const N: usize>(s: &str) -> Result<[i8; N], EntryError> {
    let items: Vec<&str> = s.split(',').map(str::trim).collect();
    if items.len() != N {
        return Err(EntryError::WrongLength {
            expected: N,
            actual: items.len(),
        });
    }
    let mut out = [0i8; N];
    for (slot, item) in out.iter_mut().zip(items) {
        *slot = parse_i8(item)?;
    }
    Ok(out)
}

/// `R` rows of `C` values, rows separated by `;`.
pub(crate) fn parse_table<const R: usize, const C: usize>(
    s: &str,
) -> Result<[[i8; C]; R], EntryError> {
    let rows: Vec<&str> = s.split(';').map(str::trim).collect();
    if rows.len() != R {
        return Err(EntryError::WrongLength {
            expected: R,
            actual: rows.len(),
        });
    }
    let mut out = [[0i8; C]; R];
    for (slot, row) in out.iter_mut().zip(rows) {
        *slot = parse_array::<C>(row)?;
    }
    Ok(out)
}
