use std::borrow::Cow;
use std::fmt;

use chrono::{DateTime, FixedOffset};

use crate::error::ParseError;
use crate::mime::header::decode_charset;
use crate::mime::TransferEncoding;

/// The charset assumed for text parts that do not declare one.
pub const DEFAULT_CHARSET: &str = "utf-8";

/// A retrieved message with its headers decoded and its body flattened into content parts.
///
/// Produced by [`mime::parse_message`](crate::mime::parse_message) and
/// [`mime::parse_preview`](crate::mime::parse_preview).
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Message {
    /// The `From` header, with any encoded words decoded.
    pub from: String,
    /// The `To` header, with any encoded words decoded.
    pub to: Option<String>,
    /// The `Subject` header, with any encoded words decoded.
    pub subject: Option<String>,
    /// The `Date` header, if present and well-formed.
    pub date: Option<DateTime<FixedOffset>>,
    /// The leaf parts of the body, in order of appearance.
    pub parts: Vec<ContentPart>,
}

impl Message {
    /// The parts whose media type is `text/*`.
    pub fn text_parts(&self) -> impl Iterator<Item = &ContentPart> {
        self.parts.iter().filter(|p| p.is_text())
    }

    /// The parts that are not text, i.e. attachments.
    pub fn attachments(&self) -> impl Iterator<Item = &ContentPart> {
        self.parts.iter().filter(|p| !p.is_text())
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "From: {}", self.from)?;
        writeln!(f, "To: {}", self.to.as_deref().unwrap_or(""))?;
        writeln!(f, "Subject: {}", self.subject.as_deref().unwrap_or(""))?;
        for part in &self.parts {
            if part.is_text() {
                match part.text() {
                    Ok(text) => write!(f, "\n\n{}", text)?,
                    Err(e) => write!(f, "\n\n[{} part: {}]", part.media_type, e)?,
                }
            } else if let Some(ref filename) = part.filename {
                write!(f, "\n\nFile named {}.", filename)?;
            }
        }
        Ok(())
    }
}

/// One leaf of a message body.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ContentPart {
    /// The lowercased `type/subtype`, e.g. `text/plain` or `image/png`. Never `multipart/*`.
    pub media_type: String,
    /// The declared content-transfer-encoding, if any.
    pub transfer_encoding: Option<TransferEncoding>,
    /// The declared charset, or [`DEFAULT_CHARSET`] when the part declares none. Only meaningful
    /// for text parts.
    pub charset: String,
    /// The declared filename of a non-text part, where it is required. Text parts are shown
    /// inline, so this is always `None` for them.
    pub filename: Option<String>,
    /// The body bytes as they appeared in the message.
    pub raw_content: Vec<u8>,
    /// `raw_content` with the transfer encoding undone.
    pub decoded_content: Vec<u8>,
}

impl ContentPart {
    /// Whether this part's media type is `text/*`.
    pub fn is_text(&self) -> bool {
        self.media_type.starts_with("text")
    }

    /// The decoded content as text in the part's charset.
    ///
    /// An unknown charset or bytes that are invalid in it are an error; nothing is replaced.
    pub fn text(&self) -> Result<Cow<'_, str>, ParseError> {
        decode_charset(&self.charset, &self.decoded_content)
    }
}
