use lazy_static::lazy_static;
use regex::Regex;

use super::error::{Error, ParseError, Result};
use super::types::Stat;

lazy_static! {
    static ref STAT_RESPONSE: Regex = Regex::new(r"^\+OK\s+(\d+)\s+(\d+)").unwrap();
}

/// Whether a single-line reply carries the positive status indicator.
pub(crate) fn is_positive(line: &[u8]) -> bool {
    line.starts_with(b"+OK")
}

/// Strip the line ending off a reply and make it printable.
pub(crate) fn reply_text(line: &[u8]) -> String {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    String::from_utf8_lossy(line).into_owned()
}

/// Parse a positive `STAT` reply of the form `+OK <count> <size>`.
pub fn parse_stat(line: &str) -> Result<Stat> {
    let invalid = || Error::Parse(ParseError::BadStatResponse(line.to_string()));
    let captures = STAT_RESPONSE.captures(line).ok_or_else(invalid)?;
    Ok(Stat {
        count: captures[1].parse().map_err(|_| invalid())?,
        size: captures[2].parse().map_err(|_| invalid())?,
    })
}
