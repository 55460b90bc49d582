//! Wire protocol for the replikv command stream.
//!
//! Requests are plain byte sequences with no terminator: a three-byte command
//! name followed by length-prefixed arguments. The parser is a pure function
//! of the accumulated buffer and supports streaming input, so a connection
//! handler can feed it one byte at a time until a complete command appears.

mod command;
mod reply;

pub use command::{format_argument, parse, parse_argument, Command, Request};
pub use reply::Reply;

/// Reply written after a successful mutation, and by peers acknowledging a
/// replicated one.
pub const ACK: &[u8] = b"ack";

/// Reply written when a request cannot be decoded or a command fails.
pub const ERR: &[u8] = b"err";

/// Reply written when the requested key is absent.
pub const NIL: &[u8] = b"nil";

/// Prefix of a reply carrying a value.
pub const VAL: &[u8] = b"val";

/// Command names, matched on the first three bytes of a request.
pub mod names {
    /// Insert or overwrite a key: `put` + argument(key) + argument(value)
    pub const PUT: &[u8] = b"put";
    /// Read a key: `get` + argument(key) + max-length field
    pub const GET: &[u8] = b"get";
    /// Remove a key: `del` + argument(key)
    pub const DEL: &[u8] = b"del";
    /// Close the connection: exactly `bye`
    pub const BYE: &[u8] = b"bye";
}
