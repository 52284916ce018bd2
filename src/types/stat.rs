use std::fmt;

/// The maildrop statistics reported by the
/// [`STAT` command](https://tools.ietf.org/html/rfc1939#page-6).
///
/// Messages marked as deleted are not counted by the server.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub struct Stat {
    /// The number of messages in the maildrop.
    pub count: usize,
    /// The size of the maildrop in octets.
    pub size: usize,
}

impl fmt::Display for Stat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "count: {}, size: {}", self.count, self.size)
    }
}
