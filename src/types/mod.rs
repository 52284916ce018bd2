//! This module contains the values produced by a POP3 session: maildrop statistics and decoded
//! messages.
//!
//! A [`Message`] is built by a single call into the MIME parser and is never modified
//! afterwards. Its [`ContentPart`]s are the leaves of the message's MIME tree, in the order they
//! appear in the body; `multipart/*` containers are expanded away and never show up as parts.

/// From [RFC 1939 section 4](https://tools.ietf.org/html/rfc1939#section-4).
///
/// Each message in the maildrop is assigned a message-number, starting at 1. Message numbers are
/// only valid for the duration of one session; a message marked as deleted keeps its number
/// until the session ends, but may not be referred to again.
pub type MessageNumber = u32;

mod stat;
pub use self::stat::Stat;

mod message;
pub use self::message::{ContentPart, Message, DEFAULT_CHARSET};
