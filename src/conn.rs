//! The transport a POP3 client runs over.

use std::fmt::{Debug, Formatter};
use std::io::{Read, Write};

/// A POP3 transport: any read/write stream, usually TLS over TCP.
pub trait Pop3Stream: Read + Write + Send + private::Sealed {}

impl<T> Pop3Stream for T where T: Read + Write + Send {}

impl Debug for dyn Pop3Stream {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "POP3 stream")
    }
}

/// A boxed transport, so that a client type does not depend on the TLS backend chosen at
/// connect time.
pub type Stream = Box<dyn Pop3Stream>;

mod private {
    use super::{Read, Write};

    pub trait Sealed {}

    impl<T> Sealed for T where T: Read + Write {}
}
