//! This crate lets you retrieve mail from a POP3 server ([RFC 1939]) and decode it into
//! readable messages ([RFC 2045], [RFC 2046], [RFC 2047]).
//!
//! Connections go over TLS. A [`ClientBuilder`] opens one and yields an unauthenticated
//! [`Client`]; [`Client::login`] turns it into an authenticated [`Session`]. Retrieved messages
//! are parsed by the [`mime`] module into [`Message`] values whose [`ContentPart`]s are the
//! leaves of the message's MIME tree.
//!
//! Below is a basic client example. See the `demos/` directory for an interactive one.
//!
//! ```no_run
//! # #[cfg(feature = "native-tls")]
//! fn fetch_first_message() -> popfetch::error::Result<Option<String>> {
//!     let client = popfetch::ClientBuilder::new("pop.example.com", 995).connect()?;
//!
//!     // the client we have here is unauthenticated.
//!     // to do anything useful with the e-mails, we need to log in
//!     let mut session = client
//!         .login("me@example.com", "password")
//!         .map_err(|e| e.0)?;
//!
//!     if session.message_count()? == 0 {
//!         return Ok(None);
//!     }
//!
//!     // fetch message number 1 in its entirety and decode it
//!     let message = session.fetch_full(1)?;
//!
//!     // be nice to the server and say goodbye
//!     session.quit()?;
//!
//!     Ok(Some(message.to_string()))
//! }
//! ```
//!
//! ## Opting out of `native_tls`
//!
//! For native TLS support, the [`native_tls`](https://crates.io/crates/native-tls) crate is used.
//! If you'd rather use [`rustls`](https://crates.io/crates/rustls), disable the default features
//! and enable `rustls-tls` instead.
//!
//! [RFC 1939]: https://tools.ietf.org/html/rfc1939
//! [RFC 2045]: https://tools.ietf.org/html/rfc2045
//! [RFC 2046]: https://tools.ietf.org/html/rfc2046
//! [RFC 2047]: https://tools.ietf.org/html/rfc2047

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

mod parse;
pub use parse::parse_stat;

pub mod types;
pub use types::*;

mod client;
pub use client::*;
mod client_builder;
pub use client_builder::*;

pub mod conn;
pub use conn::{Pop3Stream, Stream};

pub mod controller;
pub use controller::{Operation, Outcome};

pub mod error;
pub use error::{Error, Result};

pub mod mime;

#[cfg(test)]
mod mock_stream;
