//! Stream framing for the master/slave connection
//!
//! Provides the optional framed deflate compression layer. The raw
//! big-endian primitives live in [`crate::codec::wire`]; this module
//! only concerns itself with what happens between those primitives and
//! the socket.

pub mod compress;

pub use compress::{CompressingReader, CompressingWriter};

/// Prelude for the wire module
pub mod prelude {
    pub use super::compress::{CompressingReader, CompressingWriter};
}
