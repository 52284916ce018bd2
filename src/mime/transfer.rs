//! Content-transfer-encodings applied to message bodies.

use std::fmt;
use std::str::FromStr;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::error::ParseError;

const QP_LINE_LIMIT: usize = 76;

/// A [content-transfer-encoding](https://tools.ietf.org/html/rfc2045#section-6) declared by a
/// leaf part.
///
/// Only this fixed set is understood; any other name fails to parse.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum TransferEncoding {
    /// `quoted-printable`
    QuotedPrintable,
    /// `7bit`. Decoded with the quoted-printable rules, which leave plain 7-bit text untouched.
    SevenBit,
    /// `base64`
    Base64,
}

impl TransferEncoding {
    /// The canonical name of this encoding, as it appears in a header.
    pub fn as_str(&self) -> &'static str {
        match *self {
            TransferEncoding::QuotedPrintable => "quoted-printable",
            TransferEncoding::SevenBit => "7bit",
            TransferEncoding::Base64 => "base64",
        }
    }

    /// Undo this encoding.
    pub fn decode(&self, content: &[u8]) -> Result<Vec<u8>, ParseError> {
        match *self {
            TransferEncoding::QuotedPrintable | TransferEncoding::SevenBit => {
                Ok(qp_decode(content))
            }
            TransferEncoding::Base64 => base64_decode(content),
        }
    }

    /// Apply this encoding.
    pub fn encode(&self, content: &[u8]) -> Vec<u8> {
        match *self {
            TransferEncoding::QuotedPrintable | TransferEncoding::SevenBit => {
                qp_encode(content)
            }
            TransferEncoding::Base64 => base64_encode(content),
        }
    }
}

impl FromStr for TransferEncoding {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        if name.eq_ignore_ascii_case("quoted-printable") {
            Ok(TransferEncoding::QuotedPrintable)
        } else if name.eq_ignore_ascii_case("7bit") {
            Ok(TransferEncoding::SevenBit)
        } else if name.eq_ignore_ascii_case("base64") {
            Ok(TransferEncoding::Base64)
        } else {
            Err(ParseError::UnsupportedTransferEncoding(name.to_string()))
        }
    }
}

impl fmt::Display for TransferEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decodes quoted-printable content as described by RFC 2045.
///
/// Soft line breaks are discarded with both DOS and UNIX endings. Invalid
/// escape sequences are passed through verbatim, as are 8-bit bytes.
pub(crate) fn qp_decode(s: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(s.len());
    let mut i = 0;
    while i < s.len() {
        if s[i] != b'=' {
            out.push(s[i]);
            i += 1;
            continue;
        }

        let rest = &s[i + 1..];
        if rest.starts_with(b"\r\n") {
            i += 3;
        } else if rest.starts_with(b"\n") {
            i += 2;
        } else if let Some(byte) = rest.get(..2).and_then(hex_byte) {
            out.push(byte);
            i += 3;
        } else {
            out.push(b'=');
            i += 1;
        }
    }
    out
}

fn hex_byte(pair: &[u8]) -> Option<u8> {
    let hi = (pair[0] as char).to_digit(16)?;
    let lo = (pair[1] as char).to_digit(16)?;
    Some((hi * 16 + lo) as u8)
}

fn qp_encode(s: &[u8]) -> Vec<u8> {
    const HEX: &[u8; 16] = b"0123456789ABCDEF";

    let mut out = Vec::with_capacity(s.len() + s.len() / 8);
    let mut column = 0;
    for (i, &b) in s.iter().enumerate() {
        // line breaks in the source survive as hard breaks
        if b == b'\r' && s.get(i + 1) == Some(&b'\n') {
            continue;
        }
        if b == b'\n' && i > 0 && s[i - 1] == b'\r' {
            out.extend_from_slice(b"\r\n");
            column = 0;
            continue;
        }

        let next_is_break = match s.get(i + 1) {
            None => true,
            Some(b'\n') => true,
            Some(b'\r') => s.get(i + 2) == Some(&b'\n'),
            Some(_) => false,
        };
        let literal = match b {
            b'=' => false,
            b' ' | b'\t' => !next_is_break,
            33..=126 => true,
            _ => false,
        };
        let width = if literal { 1 } else { 3 };

        if column + width > QP_LINE_LIMIT - 1 {
            out.extend_from_slice(b"=\r\n");
            column = 0;
        }
        if literal {
            out.push(b);
        } else {
            out.push(b'=');
            out.push(HEX[(b >> 4) as usize]);
            out.push(HEX[(b & 0x0f) as usize]);
        }
        column += width;
    }
    out
}

fn base64_decode(content: &[u8]) -> Result<Vec<u8>, ParseError> {
    let compact: Vec<u8> = content
        .iter()
        .copied()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    STANDARD
        .decode(compact)
        .map_err(|e| ParseError::Base64(e.to_string()))
}

fn base64_encode(content: &[u8]) -> Vec<u8> {
    let encoded = STANDARD.encode(content);
    let mut out = Vec::with_capacity(encoded.len() + encoded.len() / 38);
    for (i, line) in encoded.as_bytes().chunks(QP_LINE_LIMIT).enumerate() {
        if i > 0 {
            out.extend_from_slice(b"\r\n");
        }
        out.extend_from_slice(line);
    }
    out
}
