//! Header fields: tokenizing a header block, MIME parameters and RFC 2047 encoded words.

use std::borrow::Cow;
use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use encoding_rs::Encoding;
use lazy_static::lazy_static;
use memchr::memchr;
use regex::Regex;

use super::transfer::qp_decode;
use crate::error::ParseError;
use crate::types::DEFAULT_CHARSET;

lazy_static! {
    static ref ENCODED_WORD: Regex = Regex::new(r"=\?([^?\s]+)\?([^?\s]*)\?([^?]*)\?=").unwrap();
}

/// The inner encoding of an [RFC 2047](https://tools.ietf.org/html/rfc2047) encoded word.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum WordEncoding {
    /// `Q`: a quoted-printable variant in which `_` stands for a space.
    Q,
    /// `B`: base64.
    B,
}

impl WordEncoding {
    fn from_tag(tag: &str) -> Result<Self, ParseError> {
        match tag {
            "q" | "Q" => Ok(WordEncoding::Q),
            "b" | "B" => Ok(WordEncoding::B),
            _ => Err(ParseError::UnsupportedWordEncoding(tag.to_string())),
        }
    }

    fn decode(&self, text: &str) -> Result<Vec<u8>, ParseError> {
        match *self {
            WordEncoding::Q => Ok(qp_decode(text.replace('_', " ").as_bytes())),
            WordEncoding::B => STANDARD
                .decode(text.trim())
                .map_err(|e| ParseError::Base64(e.to_string())),
        }
    }
}

impl fmt::Display for WordEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            WordEncoding::Q => f.write_str("Q"),
            WordEncoding::B => f.write_str("B"),
        }
    }
}

/// The first encoded word found in a header value, decoded, together with the literal text
/// surrounding it.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct EncodedWord<'a> {
    /// The declared character set, e.g. `utf-8`.
    pub charset: &'a str,
    /// The declared inner encoding.
    pub encoding: WordEncoding,
    /// The decoded text.
    pub decoded: String,
    /// Literal text preceding the encoded word.
    pub prefix: &'a str,
    /// Literal text following the encoded word, such as the `<address>` after a display name.
    pub suffix: &'a str,
}

/// Decode the first `=?charset?encoding?text?=` occurrence inside `value`.
///
/// Returns `Ok(None)` when `value` holds no encoded word at all.
pub fn decode_encoded_word(value: &str) -> Result<Option<EncodedWord<'_>>, ParseError> {
    let captures = match ENCODED_WORD.captures(value) {
        Some(c) => c,
        None => return Ok(None),
    };
    let whole = captures.get(0).expect("group 0 always participates");
    let charset = captures.get(1).map_or("", |m| m.as_str());
    let encoding = WordEncoding::from_tag(&captures[2])?;
    let decoded = decode_word(charset, encoding, &captures[3])?;

    Ok(Some(EncodedWord {
        charset,
        encoding,
        decoded,
        prefix: &value[..whole.start()],
        suffix: &value[whole.end()..],
    }))
}

fn decode_word(charset: &str, encoding: WordEncoding, text: &str) -> Result<String, ParseError> {
    // RFC 2231 allows a language suffix, as in `utf-8*en`
    let charset = charset.split('*').next().unwrap_or(charset);
    let bytes = encoding.decode(text)?;
    decode_charset(charset, &bytes).map(Cow::into_owned)
}

/// Decode every encoded word inside a header value.
///
/// Whitespace between two adjacent encoded words is dropped, as RFC 2047 requires. All other
/// text is kept verbatim, so `=?utf-8?B?...?= <user@example.com>` keeps its address.
pub fn decode_header_value(value: &str) -> Result<String, ParseError> {
    let mut out = String::with_capacity(value.len());
    let mut last_end = 0;
    let mut previous_was_word = false;

    for captures in ENCODED_WORD.captures_iter(value) {
        let whole = captures.get(0).expect("group 0 always participates");
        let gap = &value[last_end..whole.start()];
        if !(previous_was_word && gap.trim().is_empty()) {
            out.push_str(gap);
        }

        let encoding = WordEncoding::from_tag(&captures[2])?;
        out.push_str(&decode_word(&captures[1], encoding, &captures[3])?);

        last_end = whole.end();
        previous_was_word = true;
    }
    out.push_str(&value[last_end..]);
    Ok(out)
}

/// Encode `text` as a single UTF-8 encoded word.
pub fn encode_word(text: &str, encoding: WordEncoding) -> String {
    let encoded = match encoding {
        WordEncoding::B => STANDARD.encode(text.as_bytes()),
        WordEncoding::Q => {
            let mut s = String::with_capacity(text.len() * 3);
            for &b in text.as_bytes() {
                match b {
                    b' ' => s.push('_'),
                    b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'!' | b'*' | b'+' | b'-' | b'/' => {
                        s.push(b as char)
                    }
                    _ => s.push_str(&format!("={:02X}", b)),
                }
            }
            s
        }
    };
    format!("=?utf-8?{}?{}?=", encoding, encoded)
}

/// Decode `bytes` in the named character set.
///
/// Unknown character sets and malformed input are errors; nothing is replaced.
pub(crate) fn decode_charset<'a>(charset: &str, bytes: &'a [u8]) -> Result<Cow<'a, str>, ParseError> {
    Encoding::for_label(charset.trim().as_bytes())
        .and_then(|encoding| encoding.decode_without_bom_handling_and_without_replacement(bytes))
        .ok_or_else(|| ParseError::Charset(charset.to_string()))
}

/// The header fields of one header block, in order, with continuation lines unfolded.
///
/// Field values are kept as raw bytes. They must be UTF-8 (non-ASCII text belongs in encoded
/// words), which is checked only when a field is looked up, so malformed fields the parser never
/// reads do not fail the message.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub(crate) struct Headers {
    fields: Vec<(String, Vec<u8>)>,
}

impl Headers {
    pub(crate) fn parse(block: &[u8]) -> Headers {
        let mut fields: Vec<(String, Vec<u8>)> = Vec::new();

        for line in block.split(|&b| b == b'\n') {
            let line = line.strip_suffix(b"\r").unwrap_or(line);
            if line.starts_with(b" ") || line.starts_with(b"\t") {
                if let Some((_, value)) = fields.last_mut() {
                    value.push(b' ');
                    value.extend_from_slice(line.trim_ascii());
                }
                continue;
            }

            // lines without a colon, or with a non-ASCII name, are not fields; skip them
            let Some(colon) = memchr(b':', line) else {
                continue;
            };
            let name = &line[..colon];
            if !name.is_ascii() {
                continue;
            }
            fields.push((
                name.trim_ascii().iter().map(|&b| char::from(b)).collect(),
                line[colon + 1..].trim_ascii().to_vec(),
            ));
        }

        Headers { fields }
    }

    /// The value of the first field called `name`, compared case-insensitively.
    ///
    /// A value that is not valid UTF-8 is [`ParseError::Charset`]; nothing is replaced.
    pub(crate) fn get(&self, name: &str) -> Result<Option<&str>, ParseError> {
        self.fields
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| {
                std::str::from_utf8(v).map_err(|_| ParseError::Charset(DEFAULT_CHARSET.to_string()))
            })
            .transpose()
    }
}

/// A structured header value such as `text/plain; charset="utf-8"`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) struct ParamValue {
    pub(crate) value: String,
    params: Vec<(String, String)>,
}

impl ParamValue {
    pub(crate) fn parse(raw: &str) -> ParamValue {
        let mut pieces = split_unquoted(raw, ';').into_iter();
        let value = pieces.next().unwrap_or_default().trim().to_ascii_lowercase();

        let params = pieces
            .filter_map(|piece| {
                let (name, value) = piece.split_once('=')?;
                Some((name.trim().to_ascii_lowercase(), unquote(value.trim())))
            })
            .collect();

        ParamValue { value, params }
    }

    pub(crate) fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }
}

fn split_unquoted(raw: &str, delim: char) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut escaped = false;

    for c in raw.chars() {
        if escaped {
            escaped = false;
        } else if quoted && c == '\\' {
            escaped = true;
        } else if c == '"' {
            quoted = !quoted;
        } else if c == delim && !quoted {
            pieces.push(std::mem::take(&mut current));
            continue;
        }
        current.push(c);
    }
    pieces.push(current);
    pieces
}

fn unquote(value: &str) -> String {
    match value.strip_prefix('"').and_then(|v| v.strip_suffix('"')) {
        Some(inner) => {
            let mut out = String::with_capacity(inner.len());
            let mut chars = inner.chars();
            while let Some(c) = chars.next() {
                if c == '\\' {
                    if let Some(next) = chars.next() {
                        out.push(next);
                    }
                } else {
                    out.push(c);
                }
            }
            out
        }
        None => value.to_string(),
    }
}
