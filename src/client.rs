use bufstream::BufStream;
use std::io::{BufRead, Read, Write};
use std::ops::{Deref, DerefMut};
use std::result;

use super::error::{Error, Result, ValidateError};
use super::mime;
use super::parse::{is_positive, parse_stat, reply_text};
use super::types::*;

const CR: u8 = 0x0d;
const LF: u8 = 0x0a;
const TERMINATOR: &[u8] = b".\r\n";

/// A convenience macro for [`Client::login`] that returns the client along with the error.
macro_rules! ok_or_unauth_client_err {
    ($r:expr, $self:expr) => {
        match $r {
            Ok(o) => o,
            Err(e) => return Err((e, $self)),
        }
    };
}

fn validate_str(value: &str) -> Result<&str> {
    if value.contains('\n') {
        return Err(Error::Validate(ValidateError('\n')));
    }
    if value.contains('\r') {
        return Err(Error::Validate(ValidateError('\r')));
    }
    Ok(value)
}

/// The state of a POP3 session, as laid out in [RFC 1939 section
/// 3](https://tools.ietf.org/html/rfc1939#section-3).
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum SessionState {
    /// The client has connected but not yet identified itself. Only `USER`, `PASS` and `QUIT`
    /// may be sent.
    Authorization,
    /// The client has authenticated and may access the maildrop.
    Transaction,
    /// The session has ended, either by `QUIT` or because the connection failed. Nothing may be
    /// sent any more.
    Terminated,
}

impl SessionState {
    fn permits(&self, keyword: &str) -> bool {
        match *self {
            SessionState::Authorization => {
                ["USER", "PASS", "QUIT"].iter().any(|k| k.eq_ignore_ascii_case(keyword))
            }
            SessionState::Transaction => true,
            SessionState::Terminated => false,
        }
    }
}

/// A single-line reply from the server.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Reply {
    /// Whether the reply began with `+OK`.
    pub ok: bool,
    /// The reply line, without its line ending.
    pub line: String,
}

/// An authenticated POP3 session, in the transaction state.
///
/// Dropping a session that has not been terminated sends a best-effort `QUIT`.
#[derive(Debug)]
pub struct Session<T: Read + Write> {
    conn: Connection<T>,
}

/// An unauthenticated POP3 client.
///
/// Use [`ClientBuilder`](crate::ClientBuilder) to connect to a server over TLS, then
/// [`Client::login`] to obtain a [`Session`].
#[derive(Debug)]
pub struct Client<T: Read + Write> {
    conn: Connection<T>,
}

/// The underlying command stream shared by [`Client`] and [`Session`].
///
/// It owns the transport exclusively, issues one command at a time and tracks the
/// [`SessionState`]. Every command is checked against the state before anything is written.
#[derive(Debug)]
pub struct Connection<T: Read + Write> {
    pub(crate) stream: BufStream<T>,

    /// Enable debug mode for this connection so that all client-server interactions are traced.
    pub debug: bool,

    state: SessionState,
    max_message_size: Option<usize>,
}

// `Deref` instances are so we can make use of the same underlying primitives in `Client` and
// `Session`
impl<T: Read + Write> Deref for Client<T> {
    type Target = Connection<T>;

    fn deref(&self) -> &Connection<T> {
        &self.conn
    }
}

impl<T: Read + Write> DerefMut for Client<T> {
    fn deref_mut(&mut self) -> &mut Connection<T> {
        &mut self.conn
    }
}

impl<T: Read + Write> Deref for Session<T> {
    type Target = Connection<T>;

    fn deref(&self) -> &Connection<T> {
        &self.conn
    }
}

impl<T: Read + Write> DerefMut for Session<T> {
    fn deref_mut(&mut self) -> &mut Connection<T> {
        &mut self.conn
    }
}

impl<T: Read + Write> Client<T> {
    /// Creates a new client over the given stream.
    ///
    /// This method primarily exists for writing tests that mock the underlying transport, and
    /// for connecting over transports [`ClientBuilder`](crate::ClientBuilder) does not know
    /// about. The server greeting must still be consumed with [`Connection::read_greeting`].
    pub fn new(stream: T) -> Client<T> {
        Client {
            conn: Connection {
                stream: BufStream::new(stream),
                debug: false,
                state: SessionState::Authorization,
                max_message_size: None,
            },
        }
    }

    /// Yield the underlying stream.
    pub fn into_inner(self) -> Result<T> {
        let res = self.conn.stream.into_inner()?;
        Ok(res)
    }

    /// Log in to the POP3 server with `USER` followed by `PASS`.
    ///
    /// On success the client turns into a [`Session`]. If either command is refused the
    /// client is handed back together with the error, still unauthenticated:
    ///
    /// ```no_run
    /// # fn main() {
    /// let client = popfetch::ClientBuilder::new("pop.example.com", 995)
    ///     .connect()
    ///     .unwrap();
    ///
    /// match client.login("user", "pass") {
    ///     Ok(s) => {
    ///         // you are successfully authenticated!
    ///     }
    ///     Err((e, orig_client)) => {
    ///         eprintln!("error logging in: {}", e);
    ///         // prompt user and try again with orig_client here
    ///         return;
    ///     }
    /// }
    /// # }
    /// ```
    pub fn login<U: AsRef<str>, P: AsRef<str>>(
        mut self,
        username: U,
        password: P,
    ) -> result::Result<Session<T>, (Error, Client<T>)> {
        let username = ok_or_unauth_client_err!(validate_str(username.as_ref()), self).to_string();
        let password = ok_or_unauth_client_err!(validate_str(password.as_ref()), self).to_string();

        ok_or_unauth_client_err!(
            self.run_command_and_check_ok(&format!("USER {}", username)),
            self
        );
        ok_or_unauth_client_err!(
            self.run_command_and_check_ok(&format!("PASS {}", password)),
            self
        );

        tracing::info!(user = %username, "authenticated");
        self.conn.state = SessionState::Transaction;
        Ok(Session { conn: self.conn })
    }

    /// End the conversation without authenticating.
    pub fn quit(&mut self) -> Result<()> {
        self.conn.quit()
    }
}

impl<T: Read + Write> Session<T> {
    /// Retrieve the maildrop statistics with `STAT`.
    pub fn stat(&mut self) -> Result<Stat> {
        let line = self.run_command_and_check_ok("STAT")?;
        parse_stat(&line)
    }

    /// The number of messages in the maildrop.
    pub fn message_count(&mut self) -> Result<usize> {
        self.stat().map(|s| s.count)
    }

    /// Retrieve the header and the first `lines` lines of the body of a message with `TOP`,
    /// undecoded.
    pub fn top(&mut self, message: MessageNumber, lines: usize) -> Result<Vec<u8>> {
        self.run_command_and_check_ok(&format!("TOP {} {}", message, lines))?;
        self.read_multiline()
    }

    /// Retrieve a whole message with `RETR`, undecoded.
    pub fn retr(&mut self, message: MessageNumber) -> Result<Vec<u8>> {
        self.run_command_and_check_ok(&format!("RETR {}", message))?;
        self.read_multiline()
    }

    /// Retrieve and decode the header and the first `lines` lines of a message.
    ///
    /// Since the body is cut short, the returned message may lack parts that a full retrieval
    /// would yield.
    pub fn fetch_preview(&mut self, message: MessageNumber, lines: usize) -> Result<Message> {
        let raw = self.top(message, lines)?;
        Ok(mime::parse_preview(&raw)?)
    }

    /// Retrieve and decode a whole message.
    pub fn fetch_full(&mut self, message: MessageNumber) -> Result<Message> {
        let raw = self.retr(message)?;
        Ok(mime::parse_message(&raw)?)
    }

    /// End the session. No other operation is valid afterwards.
    pub fn quit(&mut self) -> Result<()> {
        self.conn.quit()
    }
}

impl<T: Read + Write> Drop for Session<T> {
    fn drop(&mut self) {
        if self.conn.state != SessionState::Terminated {
            // we don't want to panic here if we can't say goodbye
            let _ = self.conn.quit();
        }
    }
}

impl<T: Read + Write> Connection<T> {
    /// The current state of the session.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Limit the size of multi-line payloads. A larger payload fails with
    /// [`Error::MessageTooLarge`] and ends the session.
    pub fn set_max_message_size(&mut self, max: Option<usize>) {
        self.max_message_size = max;
    }

    /// Read the greeting the server sends upon connecting.
    pub fn read_greeting(&mut self) -> Result<String> {
        let mut v = Vec::new();
        self.readline(&mut v)?;
        let line = reply_text(&v);
        if is_positive(&v) {
            Ok(line)
        } else {
            self.state = SessionState::Terminated;
            Err(Error::Negative(line))
        }
    }

    /// Runs a command and reads its single-line reply. A negative reply is not an error here.
    ///
    /// Fails with [`Error::InvalidState`], without writing anything, if the command is not
    /// permitted in the current state.
    pub fn run_command(&mut self, command: &str) -> Result<Reply> {
        let keyword = command.split(' ').next().unwrap_or(command);
        if !self.state.permits(keyword) {
            return Err(Error::InvalidState {
                command: keyword.to_string(),
                state: self.state,
            });
        }

        self.write_line(command.as_bytes())?;
        let mut v = Vec::new();
        self.readline(&mut v)?;

        let reply = Reply {
            ok: is_positive(&v),
            line: reply_text(&v),
        };
        tracing::debug!(command = keyword, ok = reply.ok, "command completed");
        Ok(reply)
    }

    /// Runs a command and checks that it returns `+OK`, yielding the reply line.
    pub fn run_command_and_check_ok(&mut self, command: &str) -> Result<String> {
        let reply = self.run_command(command)?;
        if reply.ok {
            Ok(reply.line)
        } else {
            let keyword = command.split(' ').next().unwrap_or(command);
            tracing::warn!(command = keyword, reply = %reply.line, "negative response");
            Err(Error::Negative(reply.line))
        }
    }

    /// Read a multi-line payload up to, and excluding, the terminating `.` line.
    ///
    /// Byte-stuffed lines are restored. Running out of input before the terminator arrives is
    /// [`Error::ConnectionLost`].
    pub(crate) fn read_multiline(&mut self) -> Result<Vec<u8>> {
        let mut data = Vec::new();
        let mut line = Vec::new();
        loop {
            line.clear();
            self.readline(&mut line)?;
            if line == TERMINATOR {
                return Ok(data);
            }

            // https://tools.ietf.org/html/rfc1939#section-3
            let unstuffed = if line.starts_with(b"..") {
                &line[1..]
            } else {
                &line[..]
            };
            data.extend_from_slice(unstuffed);

            if let Some(max) = self.max_message_size {
                if data.len() > max {
                    // the rest of the payload is still in flight; the stream is unusable
                    self.state = SessionState::Terminated;
                    return Err(Error::MessageTooLarge(max));
                }
            }
        }
    }

    fn quit(&mut self) -> Result<()> {
        let res = self.run_command_and_check_ok("QUIT");
        self.state = SessionState::Terminated;
        tracing::info!("session terminated");
        res.map(|_| ())
    }

    fn readline(&mut self, into: &mut Vec<u8>) -> Result<usize> {
        let read = match self.stream.read_until(LF, into) {
            Ok(read) => read,
            Err(e) => {
                self.state = SessionState::Terminated;
                return Err(e.into());
            }
        };
        if read == 0 {
            self.state = SessionState::Terminated;
            return Err(Error::ConnectionLost);
        }

        if self.debug {
            let len = into.len();
            let line = reply_text(&into[(len - read)..]);
            tracing::trace!("S: {}", line);
        }

        Ok(read)
    }

    fn write_line(&mut self, buf: &[u8]) -> Result<()> {
        let res = self
            .stream
            .write_all(buf)
            .and_then(|_| self.stream.write_all(&[CR, LF]))
            .and_then(|_| self.stream.flush());
        if let Err(e) = res {
            self.state = SessionState::Terminated;
            return Err(e.into());
        }
        if self.debug {
            if buf.starts_with(b"PASS ") {
                tracing::trace!("C: PASS ****");
            } else {
                tracing::trace!("C: {}", String::from_utf8_lossy(buf));
            }
        }
        Ok(())
    }
}
