//! Parsing of retrieved messages into [`Message`] values.
//!
//! Parsing happens in two phases. The header block is split from the body once and tokenized
//! field by field; the body is then walked as a recursive descent over boundary-delimited
//! segments. Every leaf segment becomes a [`ContentPart`], and nested multiparts are flattened
//! into their parent's part list in order of appearance.
//!
//! Structural problems (a multipart without a boundary, an attachment without a filename, an
//! unknown transfer encoding, ...) abort the whole parse with a [`ParseError`].

use chrono::DateTime;
use memchr::{memchr, memchr_iter, memmem};

use crate::error::ParseError;
use crate::types::{ContentPart, Message, DEFAULT_CHARSET};

pub mod header;
pub mod transfer;

pub use self::header::{
    decode_encoded_word, decode_header_value, encode_word, EncodedWord, WordEncoding,
};
pub use self::transfer::TransferEncoding;

use self::header::{Headers, ParamValue};

/// Multiparts nested deeper than this are rejected.
pub const MAX_DEPTH: usize = 10;

/// Parse a complete message, as returned by `RETR`.
pub fn parse_message(raw: &[u8]) -> Result<Message, ParseError> {
    Parser { preview: false }.message(raw)
}

/// Parse a message preview, as returned by `TOP`.
///
/// The body of a preview is cut off after a number of lines, so a multipart that lost its close
/// delimiter is accepted: the incomplete trailing segment is dropped, and the resulting message
/// may have no parts at all.
pub fn parse_preview(raw: &[u8]) -> Result<Message, ParseError> {
    Parser { preview: true }.message(raw)
}

struct Parser {
    preview: bool,
}

impl Parser {
    fn message(&self, raw: &[u8]) -> Result<Message, ParseError> {
        let (head, body) = split_head_body(raw);
        let headers = Headers::parse(head);

        let from = headers
            .get("From")?
            .ok_or(ParseError::MissingHeader("From"))
            .and_then(decode_field)?;
        let to = headers.get("To")?.map(decode_field).transpose()?;
        let subject = headers.get("Subject")?.map(decode_field).transpose()?;
        let date = headers
            .get("Date")
            .ok()
            .flatten()
            .and_then(|d| DateTime::parse_from_rfc2822(d).ok());

        let mut parts = Vec::new();
        self.unit(&headers, body, 0, &mut parts)?;

        Ok(Message {
            from,
            to,
            subject,
            date,
            parts,
        })
    }

    /// Parse one header+body unit, appending its leaves to `parts`.
    fn unit(
        &self,
        headers: &Headers,
        body: &[u8],
        depth: usize,
        parts: &mut Vec<ContentPart>,
    ) -> Result<(), ParseError> {
        // RFC 2045 section 5.2
        let content_type = ParamValue::parse(headers.get("Content-Type")?.unwrap_or("text/plain"));
        if !content_type.value.starts_with("multipart") {
            parts.push(leaf(headers, content_type, body)?);
            return Ok(());
        }

        if depth >= MAX_DEPTH {
            return Err(ParseError::NestingTooDeep(MAX_DEPTH));
        }
        let boundary = content_type
            .param("boundary")
            .filter(|b| !b.is_empty())
            .ok_or(ParseError::MissingBoundary)?;

        let segments = split_multipart(body, boundary.as_bytes(), self.preview);
        if segments.is_empty() && !self.preview {
            return Err(ParseError::EmptyMultipart(boundary.to_string()));
        }
        for segment in segments {
            let (head, body) = split_head_body(segment);
            self.unit(&Headers::parse(head), body, depth + 1, parts)?;
        }
        Ok(())
    }
}

fn leaf(headers: &Headers, content_type: ParamValue, body: &[u8]) -> Result<ContentPart, ParseError> {
    let transfer_encoding = headers
        .get("Content-Transfer-Encoding")?
        .map(str::parse::<TransferEncoding>)
        .transpose()?;
    let decoded_content = match transfer_encoding {
        Some(encoding) => encoding.decode(body)?,
        None => body.to_vec(),
    };

    let media_type = content_type.value.clone();
    let filename = if media_type.starts_with("text") {
        // text parts are shown inline; a declared name is not kept
        None
    } else {
        let filename = headers
            .get("Content-Disposition")?
            .map(ParamValue::parse)
            .and_then(|d| d.param("filename").map(str::to_string))
            .or_else(|| content_type.param("name").map(str::to_string))
            .ok_or_else(|| ParseError::MissingFilename(media_type.clone()))?;
        Some(decode_field(&filename)?)
    };

    Ok(ContentPart {
        charset: content_type
            .param("charset")
            .unwrap_or(DEFAULT_CHARSET)
            .to_string(),
        media_type,
        transfer_encoding,
        filename,
        raw_content: body.to_vec(),
        decoded_content,
    })
}

fn decode_field(value: &str) -> Result<String, ParseError> {
    if value.contains("=?") {
        decode_header_value(value)
    } else {
        Ok(value.to_string())
    }
}

/// Split a unit at its first empty line. Both CRLF and bare LF line endings are accepted.
fn split_head_body(raw: &[u8]) -> (&[u8], &[u8]) {
    if let Some(body) = raw.strip_prefix(b"\r\n").or_else(|| raw.strip_prefix(b"\n")) {
        return (&raw[..0], body);
    }
    for pos in memchr_iter(b'\n', raw) {
        let rest = &raw[pos + 1..];
        if rest.starts_with(b"\r\n") {
            return (&raw[..=pos], &rest[2..]);
        }
        if rest.starts_with(b"\n") {
            return (&raw[..=pos], &rest[1..]);
        }
    }
    (raw, &raw[raw.len()..])
}

/// Split a multipart body into the segments between its `--boundary` delimiter lines.
///
/// The preamble and everything after the close delimiter are discarded. A trailing segment
/// that is not followed by any delimiter is kept, unless `truncated` says the body was cut off.
fn split_multipart<'a>(body: &'a [u8], boundary: &[u8], truncated: bool) -> Vec<&'a [u8]> {
    let delimiter = [&b"--"[..], boundary].concat();
    let mut segments = Vec::new();
    let mut open: Option<usize> = None;

    for pos in memmem::find_iter(body, &delimiter) {
        if pos > 0 && body[pos - 1] != b'\n' {
            continue;
        }
        let after = &body[pos + delimiter.len()..];
        let close = after.starts_with(b"--");
        if !close && !matches!(after.first().copied(), None | Some(b'\r' | b'\n' | b' ' | b'\t')) {
            // a longer boundary that merely starts with ours
            continue;
        }

        if let Some(start) = open.take() {
            segments.push(&body[start..line_end(body, start, pos)]);
        }
        if close {
            return segments;
        }
        open = Some(match memchr(b'\n', after) {
            Some(n) => pos + delimiter.len() + n + 1,
            None => body.len(),
        });
    }

    if let Some(start) = open {
        if !truncated {
            segments.push(&body[start..]);
        }
    }
    segments
}

/// The end of a segment running from `start` to a delimiter at `pos`, excluding the line break
/// that belongs to the delimiter.
fn line_end(body: &[u8], start: usize, pos: usize) -> usize {
    let mut end = pos;
    if end > start && body[end - 1] == b'\n' {
        end -= 1;
        if end > start && body[end - 1] == b'\r' {
            end -= 1;
        }
    }
    end
}

#[cfg(test)]
mod tests {
    use super::*;

    const NESTED: &str = "From: sender@example.com\r\n\
                          To: rcpt@example.com\r\n\
                          Subject: nested\r\n\
                          Content-Type: multipart/mixed; boundary=\"XYZ\"\r\n\
                          \r\n\
                          This is the preamble.\r\n\
                          --XYZ\r\n\
                          Content-Type: text/plain; charset=\"utf-8\"\r\n\
                          \r\n\
                          first\r\n\
                          --XYZ\r\n\
                          Content-Type: multipart/mixed; boundary=\"INNER\"\r\n\
                          \r\n\
                          --INNER\r\n\
                          Content-Type: text/plain\r\n\
                          \r\n\
                          second\r\n\
                          --INNER--\r\n\
                          --XYZ--\r\n\
                          epilogue\r\n";

    #[test]
    fn plain_text_message() {
        let raw = b"From: a@example.com\r\n\
                    Content-Type: text/plain; charset=\"utf-8\"\r\n\
                    \r\n\
                    Hello";
        let message = parse_message(raw).unwrap();
        assert_eq!(1, message.parts.len());
        let part = &message.parts[0];
        assert_eq!("text/plain", part.media_type);
        assert_eq!(b"Hello".to_vec(), part.decoded_content);
        assert_eq!(None, part.filename);
        assert_eq!("utf-8", part.charset);
        assert_eq!(None, part.transfer_encoding);
    }

    #[test]
    fn nested_multipart_is_flattened() {
        let message = parse_message(NESTED.as_bytes()).unwrap();
        assert_eq!("nested", message.subject.as_deref().unwrap());
        let bodies: Vec<_> = message
            .parts
            .iter()
            .map(|p| (p.media_type.as_str(), p.decoded_content.as_slice()))
            .collect();
        assert_eq!(
            vec![("text/plain", &b"first"[..]), ("text/plain", &b"second"[..])],
            bodies
        );
        assert!(message
            .parts
            .iter()
            .all(|p| !p.media_type.starts_with("multipart")));
    }

    #[test]
    fn attachment_without_filename_fails() {
        let raw = "From: a@example.com\r\n\
                   Content-Type: multipart/mixed; boundary=\"b\"\r\n\
                   \r\n\
                   --b\r\n\
                   Content-Type: application/pdf\r\n\
                   Content-Transfer-Encoding: base64\r\n\
                   \r\n\
                   JVBERg==\r\n\
                   --b--\r\n";
        assert_eq!(
            Err(ParseError::MissingFilename("application/pdf".to_string())),
            parse_message(raw.as_bytes())
        );
    }

    #[test]
    fn attachment_filename_and_encoding() {
        let raw = "From: a@example.com\r\n\
                   Content-Type: multipart/mixed; boundary=\"b\"\r\n\
                   \r\n\
                   --b\r\n\
                   Content-Type: text/plain; charset=\"koi8-r\"\r\n\
                   Content-Transfer-Encoding: quoted-printable\r\n\
                   \r\n\
                   =F0=D2=C9=D7=C5=D4\r\n\
                   --b\r\n\
                   Content-Type: image/png; name=\"ignored.png\"\r\n\
                   Content-Disposition: attachment;\r\n\
                   \tfilename=\"=?utf-8?B?0LrQvtGCLnBuZw==?=\"\r\n\
                   Content-Transfer-Encoding: base64\r\n\
                   \r\n\
                   iVBORw==\r\n\
                   --b--\r\n";
        let message = parse_message(raw.as_bytes()).unwrap();
        assert_eq!(2, message.parts.len());

        let text = &message.parts[0];
        assert_eq!(Some(TransferEncoding::QuotedPrintable), text.transfer_encoding);
        assert_eq!("Привет", text.text().unwrap());

        let image = &message.parts[1];
        assert_eq!(Some("кот.png"), image.filename.as_deref());
        assert_eq!(b"iVBORw==".to_vec(), image.raw_content);
        assert_eq!(b"\x89PNG".to_vec(), image.decoded_content);
    }

    #[test]
    fn name_parameter_is_a_filename_fallback() {
        let raw = "From: a@example.com\r\n\
                   Content-Type: application/octet-stream; name=\"blob.bin\"\r\n\
                   \r\n\
                   data";
        let message = parse_message(raw.as_bytes()).unwrap();
        assert_eq!(Some("blob.bin"), message.parts[0].filename.as_deref());
    }

    #[test]
    fn text_part_drops_declared_filename() {
        let raw = "From: a@example.com\r\n\
                   Content-Type: text/plain; name=\"notes.txt\"\r\n\
                   Content-Disposition: attachment; filename=\"notes.txt\"\r\n\
                   \r\n\
                   remember the milk";
        let message = parse_message(raw.as_bytes()).unwrap();
        assert_eq!(None, message.parts[0].filename);
        assert_eq!(1, message.text_parts().count());
    }

    #[test]
    fn raw_eight_bit_header_is_rejected() {
        // windows-1251 bytes sent without an encoded word
        let raw = b"From: a@example.com\r\n\
                    Subject: \xcf\xf0\xe8\xe2\xe5\xf2\r\n\
                    \r\n\
                    body";
        assert_eq!(
            Err(ParseError::Charset("utf-8".to_string())),
            parse_message(raw)
        );

        let raw = b"From: a@example.com\r\n\
                    Content-Type: multipart/mixed; boundary=b\r\n\
                    \r\n\
                    --b\r\n\
                    Content-Type: application/pdf; name=\"\xee\xf2\xf7\xe5\xf2.pdf\"\r\n\
                    \r\n\
                    data\r\n\
                    --b--\r\n";
        assert_eq!(
            Err(ParseError::Charset("utf-8".to_string())),
            parse_message(raw)
        );
    }

    #[test]
    fn eight_bit_in_unused_header_is_ignored() {
        let raw = b"Received: from \xff\xfe relay\r\n\
                    From: a@example.com\r\n\
                    Date: \xff\r\n\
                    \r\n\
                    body";
        let message = parse_message(raw).unwrap();
        assert_eq!("a@example.com", message.from);
        assert_eq!(None, message.date);
    }

    #[test]
    fn multipart_without_boundary_fails() {
        let raw = "From: a@example.com\r\nContent-Type: multipart/mixed\r\n\r\nbody";
        assert_eq!(
            Err(ParseError::MissingBoundary),
            parse_message(raw.as_bytes())
        );
    }

    #[test]
    fn unsupported_transfer_encoding_fails() {
        let raw = "From: a@example.com\r\n\
                   Content-Type: text/plain\r\n\
                   Content-Transfer-Encoding: x-uuencode\r\n\
                   \r\n\
                   begin 644 file";
        assert_eq!(
            Err(ParseError::UnsupportedTransferEncoding("x-uuencode".to_string())),
            parse_message(raw.as_bytes())
        );
    }

    #[test]
    fn missing_from_fails() {
        assert_eq!(
            Err(ParseError::MissingHeader("From")),
            parse_message(b"Subject: hi\r\n\r\nbody")
        );
    }

    #[test]
    fn encoded_headers_are_decoded() {
        let raw = "From: =?utf-8?B?0JjQstCw0L0=?= <ivan@example.ru>\r\n\
                   To: plain@example.com\r\n\
                   Subject: =?utf-8?Q?=D0=9F=D1=80=D0=B8=D0=B2=D0=B5=D1=82?=\r\n\
                   Date: Tue, 1 Jul 2003 10:52:37 +0200\r\n\
                   \r\n\
                   body";
        let message = parse_message(raw.as_bytes()).unwrap();
        assert_eq!("Иван <ivan@example.ru>", message.from);
        assert_eq!(Some("plain@example.com"), message.to.as_deref());
        assert_eq!(Some("Привет"), message.subject.as_deref());
        assert_eq!(
            Some(1057049557),
            message.date.map(|d| d.timestamp())
        );
    }

    #[test]
    fn missing_content_type_is_plain_text() {
        let message = parse_message(b"From: a@example.com\n\nbare LF body\n").unwrap();
        assert_eq!("text/plain", message.parts[0].media_type);
        assert_eq!(b"bare LF body\n".to_vec(), message.parts[0].decoded_content);
    }

    #[test]
    fn empty_multipart_is_rejected_unless_preview() {
        let raw = "From: a@example.com\r\n\
                   Content-Type: multipart/alternative; boundary=\"b\"\r\n\
                   \r\n\
                   --b\r\n\
                   Content-Type: text/plain\r\n\
                   \r\n\
                   cut off here";
        let preview = parse_preview(raw.as_bytes()).unwrap();
        assert!(preview.parts.is_empty());

        let headers_only = "From: a@example.com\r\n\
                            Content-Type: multipart/alternative; boundary=\"b\"\r\n\
                            \r\n";
        assert_eq!(
            Err(ParseError::EmptyMultipart("b".to_string())),
            parse_message(headers_only.as_bytes())
        );
        assert!(parse_preview(headers_only.as_bytes()).unwrap().parts.is_empty());
    }

    #[test]
    fn full_parse_keeps_unclosed_trailing_segment() {
        let raw = "From: a@example.com\r\n\
                   Content-Type: multipart/alternative; boundary=\"b\"\r\n\
                   \r\n\
                   --b\r\n\
                   Content-Type: text/plain\r\n\
                   \r\n\
                   no close delimiter\r\n";
        let message = parse_message(raw.as_bytes()).unwrap();
        assert_eq!(b"no close delimiter\r\n".to_vec(), message.parts[0].decoded_content);
    }

    #[test]
    fn longer_boundary_with_same_prefix_is_not_a_delimiter() {
        let body = b"--b\r\nA\r\n--bb\r\nB\r\n--b--\r\n";
        let segments = split_multipart(body, b"b", false);
        assert_eq!(vec![&b"A\r\n--bb\r\nB"[..]], segments);
    }

    #[test]
    fn nesting_depth_is_limited() {
        let mut raw = String::from("From: a@example.com\r\n");
        for level in 0..=MAX_DEPTH {
            raw.push_str(&format!(
                "Content-Type: multipart/mixed; boundary=\"l{}\"\r\n\r\n--l{}\r\n",
                level, level
            ));
        }
        raw.push_str("Content-Type: text/plain\r\n\r\ndeep\r\n");
        for level in (0..=MAX_DEPTH).rev() {
            raw.push_str(&format!("--l{}--\r\n", level));
        }
        assert_eq!(
            Err(ParseError::NestingTooDeep(MAX_DEPTH)),
            parse_message(raw.as_bytes())
        );
    }

    #[test]
    fn split_head_body_variants() {
        assert_eq!((&b""[..], &b"body"[..]), split_head_body(b"\r\nbody"));
        assert_eq!(
            (&b"A: b\r\n"[..], &b"body"[..]),
            split_head_body(b"A: b\r\n\r\nbody")
        );
        assert_eq!((&b"A: b\n"[..], &b""[..]), split_head_body(b"A: b\n\n"));
        assert_eq!((&b"A: b\r\n"[..], &b""[..]), split_head_body(b"A: b\r\n"));
    }
}
