//! POP3 client and MIME parsing errors.

use std::io::Error as IoError;
#[cfg(any(feature = "native-tls", feature = "rustls-tls"))]
use std::net::TcpStream;
use std::result;

use bufstream::IntoInnerError as BufError;
#[cfg(feature = "native-tls")]
use native_tls::Error as TlsError;
#[cfg(feature = "native-tls")]
use native_tls::HandshakeError as TlsHandshakeError;
#[cfg(feature = "rustls-tls")]
use rustls_connector::HandshakeError as RustlsHandshakeError;
use thiserror::Error;

use crate::client::SessionState;

/// A convenience wrapper around `Result` for `popfetch::Error`.
pub type Result<T> = result::Result<T, Error>;

/// A set of errors that can occur in the POP3 client.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// An `io::Error` that occurred while trying to read or write to a network stream.
    #[error(transparent)]
    Io(#[from] IoError),
    /// An error from the `native_tls` library during the TLS handshake.
    #[cfg(feature = "native-tls")]
    #[error(transparent)]
    TlsHandshake(#[from] TlsHandshakeError<TcpStream>),
    /// An error from the `native_tls` library while managing the socket.
    #[cfg(feature = "native-tls")]
    #[error(transparent)]
    Tls(#[from] TlsError),
    /// An error from the `rustls` library during the TLS handshake.
    #[cfg(feature = "rustls-tls")]
    #[error(transparent)]
    RustlsHandshake(#[from] RustlsHandshakeError<TcpStream>),
    /// The server answered without the `+OK` marker. Carries the server's reply line.
    ///
    /// The session stays usable after this error, except when it was returned by
    /// [`Client::login`](crate::Client::login).
    #[error("negative response: {0}")]
    Negative(String),
    /// The connection was terminated unexpectedly.
    #[error("connection lost")]
    ConnectionLost,
    /// A multi-line payload grew past the configured maximum size.
    #[error("message exceeds the maximum size of {0} bytes")]
    MessageTooLarge(usize),
    /// A command was issued in a session state that does not permit it. Nothing was sent.
    #[error("{command} is not valid in the {state:?} state")]
    InvalidState {
        /// The command keyword that was rejected.
        command: String,
        /// The state the session was in.
        state: SessionState,
    },
    /// Error parsing a server response or a retrieved message.
    #[error(transparent)]
    Parse(#[from] ParseError),
    /// Error validating input data.
    #[error(transparent)]
    Validate(#[from] ValidateError),
}

impl<T> From<BufError<T>> for Error {
    fn from(err: BufError<T>) -> Error {
        Error::Io(err.into())
    }
}

/// An error parsing a server response or the structure of a retrieved message.
///
/// A parse error always aborts the parse of the whole message: no partially
/// populated [`Message`](crate::types::Message) is ever returned.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ParseError {
    /// A header the grammar requires is absent.
    #[error("missing {0} header")]
    MissingHeader(&'static str),
    /// A multipart unit has no `boundary` parameter.
    #[error("multipart content type without a boundary parameter")]
    MissingBoundary,
    /// A non-text leaf part does not declare a filename.
    #[error("{0} part without a filename")]
    MissingFilename(String),
    /// A multipart unit contains no complete part.
    #[error("multipart body with boundary {0:?} contains no parts")]
    EmptyMultipart(String),
    /// Multipart units are nested deeper than the parser allows.
    #[error("multipart nesting deeper than {0} levels")]
    NestingTooDeep(usize),
    /// A `Content-Transfer-Encoding` outside of the supported set.
    #[error("unsupported transfer encoding {0:?}")]
    UnsupportedTransferEncoding(String),
    /// An encoded word with an encoding tag other than `Q` or `B`.
    #[error("unsupported encoded-word encoding {0:?}")]
    UnsupportedWordEncoding(String),
    /// Invalid base64 content.
    #[error("invalid base64 content: {0}")]
    Base64(String),
    /// An unknown character set, or bytes that are invalid in the declared one.
    #[error("cannot decode text as {0}")]
    Charset(String),
    /// A `STAT` reply that does not carry a count and a size.
    #[error("unable to parse STAT response {0:?}")]
    BadStatResponse(String),
}

/// An invalid character found in a command argument.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
// print character in debug form because invalid ones are often whitespaces
#[error("invalid character in input: {0:?}")]
pub struct ValidateError(pub char);
