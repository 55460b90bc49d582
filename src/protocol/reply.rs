//! Reply serialization.

use super::{format_argument, ACK, ERR, NIL, VAL};
use bytes::{Bytes, BytesMut};

/// A reply to a single command.
///
/// Replies are cheap to clone (`Bytes` for value payloads) and serialize
/// with direct writes into the connection's write buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Mutation applied
    Ack,
    /// Value (possibly a truncated prefix) for a get
    Value(Bytes),
    /// Requested key is absent
    Nil,
    /// Request could not be decoded or the command failed
    Error,
    /// Close marker: the connection must be terminated, nothing is written
    Closed,
}

impl Reply {
    /// Serialize the reply into `buf`. The close marker writes nothing.
    pub fn serialize(&self, buf: &mut BytesMut) {
        match self {
            Reply::Ack => buf.extend_from_slice(ACK),
            Reply::Value(value) => {
                buf.extend_from_slice(VAL);
                format_argument(value, buf);
            }
            Reply::Nil => buf.extend_from_slice(NIL),
            Reply::Error => buf.extend_from_slice(ERR),
            Reply::Closed => {}
        }
    }

    /// Returns true if serializing this reply writes no bytes.
    pub fn is_empty(&self) -> bool {
        matches!(self, Reply::Closed)
    }
}
