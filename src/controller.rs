//! Dispatching user-level operations against an authenticated [`Session`].
//!
//! An [`Operation`] is what a front end asks for: count the messages, preview one, retrieve
//! one, or end the session. [`Session::dispatch`] runs it and reports an [`Outcome`]. A refused
//! command is an outcome rather than an error, so a menu loop can carry on after it.
//!
//! Operations can be parsed from the numbered menu a terminal front end offers, or from the
//! POP3 keywords:
//!
//! ```
//! use popfetch::Operation;
//!
//! assert_eq!(Ok(Operation::Preview { message: 3, lines: 10 }), "1 3 10".parse());
//! assert_eq!(Ok(Operation::Retrieve { message: 3 }), "retr 3".parse());
//! assert_eq!(Ok(Operation::Quit), "0".parse());
//! ```

use std::fmt;
use std::io::{Read, Write};
use std::str::FromStr;

use crate::client::Session;
use crate::error::{Error, Result};
use crate::types::{Message, MessageNumber};

/// A request to run against a session.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Operation {
    /// Report the number of messages in the maildrop.
    Count,
    /// Fetch the header and the first `lines` body lines of a message.
    Preview {
        /// The message number, starting at 1.
        message: MessageNumber,
        /// How many lines of the body to fetch.
        lines: usize,
    },
    /// Fetch a whole message.
    Retrieve {
        /// The message number, starting at 1.
        message: MessageNumber,
    },
    /// End the session.
    Quit,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Operation::Count => write!(f, "STAT"),
            Operation::Preview { message, lines } => write!(f, "TOP {} {}", message, lines),
            Operation::Retrieve { message } => write!(f, "RETR {}", message),
            Operation::Quit => write!(f, "QUIT"),
        }
    }
}

/// An input line that does not name an [`Operation`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseOperationError {
    /// The input was blank.
    #[error("no operation given")]
    Empty,
    /// The first word is neither a menu number nor a known keyword.
    #[error("unknown operation {0:?}")]
    Unknown(String),
    /// An argument is missing or is not a number.
    #[error("{operation} expects {expected}")]
    BadArguments {
        /// The operation word as typed.
        operation: String,
        /// A description of the arguments it takes.
        expected: &'static str,
    },
}

impl FromStr for Operation {
    type Err = ParseOperationError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let mut words = s.split_whitespace();
        let head = words.next().ok_or(ParseOperationError::Empty)?;
        let args: Vec<&str> = words.collect();

        let bad = |expected| ParseOperationError::BadArguments {
            operation: head.to_string(),
            expected,
        };

        match head.to_ascii_lowercase().as_str() {
            "0" | "quit" | "q" => {
                if !args.is_empty() {
                    return Err(bad("no arguments"));
                }
                Ok(Operation::Quit)
            }
            "stat" | "count" => {
                if !args.is_empty() {
                    return Err(bad("no arguments"));
                }
                Ok(Operation::Count)
            }
            "1" | "top" => match args[..] {
                [message, lines] => Ok(Operation::Preview {
                    message: message
                        .parse()
                        .map_err(|_| bad("a message number and a line count"))?,
                    lines: lines
                        .parse()
                        .map_err(|_| bad("a message number and a line count"))?,
                }),
                _ => Err(bad("a message number and a line count")),
            },
            "2" | "retr" => match args[..] {
                [message] => Ok(Operation::Retrieve {
                    message: message.parse().map_err(|_| bad("a message number"))?,
                }),
                _ => Err(bad("a message number")),
            },
            _ => Err(ParseOperationError::Unknown(head.to_string())),
        }
    }
}

/// What came of a dispatched [`Operation`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Outcome {
    /// The number of messages in the maildrop.
    Count(usize),
    /// A previewed or retrieved message.
    Message(Message),
    /// The server refused the command with the given reply line. The session is still usable.
    Rejected(String),
    /// The session has ended. Further operations fail with [`Error::InvalidState`].
    Terminated,
}

impl<T: Read + Write> Session<T> {
    /// Run an operation.
    ///
    /// Negative replies come back as [`Outcome::Rejected`]. Connection failures and messages
    /// that cannot be parsed are errors; after a connection failure the session is terminated.
    ///
    /// `Quit` always yields [`Outcome::Terminated`], even if the server answers the `QUIT`
    /// negatively, since the session is over either way.
    pub fn dispatch(&mut self, op: &Operation) -> Result<Outcome> {
        tracing::debug!(operation = %op, "dispatching");
        let outcome = match *op {
            Operation::Count => self.message_count().map(Outcome::Count),
            Operation::Preview { message, lines } => {
                self.fetch_preview(message, lines).map(Outcome::Message)
            }
            Operation::Retrieve { message } => self.fetch_full(message).map(Outcome::Message),
            Operation::Quit => {
                return match self.quit() {
                    Ok(()) | Err(Error::Negative(_)) => Ok(Outcome::Terminated),
                    Err(e) => Err(e),
                }
            }
        };

        match outcome {
            Err(Error::Negative(line)) => Ok(Outcome::Rejected(line)),
            other => other,
        }
    }
}
