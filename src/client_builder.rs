use crate::conn::Stream;
use crate::{Client, Result};
use std::fmt;
use std::io::{Read, Write};
use std::net::TcpStream;
use std::str::FromStr;
use std::time::Duration;

#[cfg(feature = "native-tls")]
use native_tls::{TlsConnector, TlsStream};
#[cfg(feature = "rustls-tls")]
use rustls_connector::{RustlsConnector, TlsStream as RustlsStream};

/// The POP3 over TLS port, from [RFC 2595](https://tools.ietf.org/html/rfc2595#section-7).
pub const POP3S_PORT: u16 = 995;

/// Mailbox providers with a well-known POP3 endpoint.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Provider {
    /// Yandex Mail
    Yandex,
    /// Mail.ru
    MailRu,
    /// Rambler Mail
    Rambler,
}

impl Provider {
    /// The provider's POP3 host.
    pub fn host(&self) -> &'static str {
        match *self {
            Provider::Yandex => "pop.yandex.ru",
            Provider::MailRu => "pop.mail.ru",
            Provider::Rambler => "pop.rambler.ru",
        }
    }

    /// The provider's POP3 port.
    pub fn port(&self) -> u16 {
        POP3S_PORT
    }
}

impl FromStr for Provider {
    type Err = UnknownProvider;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "y" | "yandex" => Ok(Provider::Yandex),
            "m" | "mail" | "mailru" | "mail.ru" => Ok(Provider::MailRu),
            "r" | "rambler" => Ok(Provider::Rambler),
            _ => Err(UnknownProvider(s.to_string())),
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host(), self.port())
    }
}

/// A provider name that is not in the table of known providers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown mailbox provider {0:?}")]
pub struct UnknownProvider(pub String);

/// A convenience builder for [`Client`] structs over various encrypted transports.
///
/// Creating a [`Client`] using `native-tls` transport is straightforward:
/// ```no_run
/// # use popfetch::ClientBuilder;
/// # fn main() -> Result<(), popfetch::Error> {
/// let client = ClientBuilder::new("pop.example.com", 995).native_tls()?;
/// # Ok(())
/// # }
/// ```
///
/// Similarly, if using the `rustls-tls` feature you can create a [`Client`] using rustls:
/// ```no_run
/// # use popfetch::ClientBuilder;
/// # #[cfg(feature = "rustls-tls")]
/// # fn main() -> Result<(), popfetch::Error> {
/// let client = ClientBuilder::new("pop.example.com", 995).rustls()?;
/// # Ok(())
/// # }
/// # #[cfg(not(feature = "rustls-tls"))]
/// # fn main() {}
/// ```
///
/// The blocking reads of a session can be bounded, as can the size of a retrieved message:
/// ```no_run
/// # use popfetch::{ClientBuilder, Provider};
/// # use std::time::Duration;
/// # fn main() -> Result<(), popfetch::Error> {
/// let client = ClientBuilder::from_provider(Provider::Yandex)
///     .read_timeout(Duration::from_secs(30))
///     .max_message_size(50 * 1024 * 1024)
///     .connect()?;
/// # Ok(())
/// # }
/// ```
pub struct ClientBuilder<D>
where
    D: AsRef<str>,
{
    domain: D,
    port: u16,
    read_timeout: Option<Duration>,
    max_message_size: Option<usize>,
}

impl ClientBuilder<&'static str> {
    /// Make a new `ClientBuilder` for a known provider's endpoint.
    pub fn from_provider(provider: Provider) -> Self {
        ClientBuilder::new(provider.host(), provider.port())
    }
}

impl<D> ClientBuilder<D>
where
    D: AsRef<str>,
{
    /// Make a new `ClientBuilder` using the given domain and port.
    pub fn new(domain: D, port: u16) -> Self {
        ClientBuilder {
            domain,
            port,
            read_timeout: None,
            max_message_size: None,
        }
    }

    /// Fail any single read from the server that blocks for longer than `timeout`.
    ///
    /// A timed out read ends the session. By default reads block indefinitely.
    pub fn read_timeout(&mut self, timeout: Duration) -> &mut Self {
        self.read_timeout = Some(timeout);
        self
    }

    /// Refuse messages larger than `max` bytes. By default there is no limit.
    pub fn max_message_size(&mut self, max: usize) -> &mut Self {
        self.max_message_size = Some(max);
        self
    }

    /// Return a new [`Client`] using the TLS backend selected by the crate features,
    /// preferring `native-tls`.
    #[cfg(any(feature = "native-tls", feature = "rustls-tls"))]
    #[cfg_attr(docsrs, doc(cfg(any(feature = "native-tls", feature = "rustls-tls"))))]
    pub fn connect(&mut self) -> Result<Client<Stream>> {
        #[cfg(feature = "native-tls")]
        let client = self.connect_with(|domain, tcp| {
            let ssl_conn = TlsConnector::builder().build()?;
            Ok(Box::new(TlsConnector::connect(&ssl_conn, domain, tcp)?) as Stream)
        });
        #[cfg(all(feature = "rustls-tls", not(feature = "native-tls")))]
        let client = self.connect_with(|domain, tcp| {
            let ssl_conn = RustlsConnector::new_with_native_certs()?;
            Ok(Box::new(ssl_conn.connect(domain, tcp)?) as Stream)
        });
        client
    }

    /// Return a new [`Client`] using a `native-tls` transport.
    #[cfg(feature = "native-tls")]
    #[cfg_attr(docsrs, doc(cfg(feature = "native-tls")))]
    pub fn native_tls(&mut self) -> Result<Client<TlsStream<TcpStream>>> {
        self.connect_with(|domain, tcp| {
            let ssl_conn = TlsConnector::builder().build()?;
            Ok(TlsConnector::connect(&ssl_conn, domain, tcp)?)
        })
    }

    /// Return a new [`Client`] using `rustls` transport.
    #[cfg(feature = "rustls-tls")]
    #[cfg_attr(docsrs, doc(cfg(feature = "rustls-tls")))]
    pub fn rustls(&mut self) -> Result<Client<RustlsStream<TcpStream>>> {
        self.connect_with(|domain, tcp| {
            let ssl_conn = RustlsConnector::new_with_native_certs()?;
            Ok(ssl_conn.connect(domain, tcp)?)
        })
    }

    /// Make a [`Client`] using a custom TLS initialization. This function is intended
    /// to be used if your TLS setup requires custom work such as adding private CAs
    /// or other specific TLS parameters.
    ///
    /// The `handshake` argument should accept two parameters:
    ///
    /// - domain: [`&str`]
    /// - tcp: [`TcpStream`]
    ///
    /// and yield a `Result<C>` where `C` is `Read + Write`. It should only perform
    /// TLS initialization over the given `tcp` socket and return the encrypted stream
    /// object, such as a [`native_tls::TlsStream`] or a [`rustls_connector::TlsStream`].
    ///
    /// The server greeting has been read when the client is returned.
    ///
    /// ```no_run
    /// # use popfetch::ClientBuilder;
    /// # use native_tls::TlsConnector;
    /// # fn main() -> Result<(), popfetch::Error> {
    /// let client = ClientBuilder::new("pop.example.com", 995)
    ///     .connect_with(|domain, tcp| {
    ///         let ssl_conn = TlsConnector::builder()
    ///             .danger_accept_invalid_certs(true)
    ///             .build()?;
    ///         Ok(TlsConnector::connect(&ssl_conn, domain, tcp)?)
    ///     })?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn connect_with<F, C>(&mut self, handshake: F) -> Result<Client<C>>
    where
        F: FnOnce(&str, TcpStream) -> Result<C>,
        C: Read + Write,
    {
        let domain = self.domain.as_ref();
        let tcp = TcpStream::connect((domain, self.port))?;
        // the TLS stream reads through this socket, so the deadline covers it too
        tcp.set_read_timeout(self.read_timeout)?;

        let tls = handshake(domain, tcp)?;
        let mut client = Client::new(tls);
        client.set_max_message_size(self.max_message_size);
        let greeting = client.read_greeting()?;
        tracing::info!(domain, port = self.port, %greeting, "connected");
        Ok(client)
    }
}
