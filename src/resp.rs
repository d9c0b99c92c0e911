/*
 * This file is part of ferrokv.
 *
 * ferrokv is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * ferrokv is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU Affero General Public License for more details.
 *
 * You should have received a copy of the GNU Affero General Public License
 * along with ferrokv. If not, see <https://www.gnu.org/licenses/>.
 *
*/

//! # Response encoder
//!
//! Pure, stateless functions that build wire-format reply buffers: simple
//! string, error, integer, bulk string, null bulk, and array. Mirrors the
//! role `resp/mod.rs` plays in the teacher crate, but targets the
//! RESP-style framing this server actually speaks (`+`, `-`, `:`, `$`, `*`)
//! instead of the teacher's own Skyhash wire format.
//!
//! None of this module validates its input beyond length-prefixing -- a
//! caller that hands it a string containing `\r\n` gets exactly that
//! written out, framing be damned. Validation belongs to the command
//! layer, not the encoder.

use crate::error::DbError;

/// A reply a command handler produces, before it's been flattened into
/// bytes. Kept as a tree (rather than handlers writing directly into a
/// buffer) so tests can assert on structure instead of on exact byte
/// sequences.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    SimpleString(String),
    Error(String),
    Integer(i64),
    Bulk(Vec<u8>),
    NullBulk,
    Array(Vec<Reply>),
}

impl Reply {
    pub fn ok() -> Reply {
        Reply::SimpleString("OK".to_owned())
    }

    pub fn bulk(v: impl Into<Vec<u8>>) -> Reply {
        Reply::Bulk(v.into())
    }

    pub fn from_error(e: DbError) -> Reply {
        Reply::Error(e.to_string())
    }

    /// Serialize this reply into `out`, appending to whatever's already
    /// there.
    pub fn encode_into(&self, out: &mut Vec<u8>) {
        match self {
            Reply::SimpleString(s) => simple_string_into(s, out),
            Reply::Error(s) => error_into(s, out),
            Reply::Integer(n) => integer_into(*n, out),
            Reply::Bulk(b) => bulk_string_into(b, out),
            Reply::NullBulk => null_bulk_into(out),
            Reply::Array(items) => {
                array_header_into(items.len(), out);
                for item in items {
                    item.encode_into(out);
                }
            }
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.encode_into(&mut out);
        out
    }
}

impl From<DbError> for Reply {
    fn from(e: DbError) -> Self {
        Reply::from_error(e)
    }
}

pub fn simple_string_into(s: &str, out: &mut Vec<u8>) {
    out.push(b'+');
    out.extend_from_slice(s.as_bytes());
    out.extend_from_slice(b"\r\n");
}

pub fn error_into(s: &str, out: &mut Vec<u8>) {
    out.push(b'-');
    out.extend_from_slice(s.as_bytes());
    out.extend_from_slice(b"\r\n");
}

pub fn integer_into(n: i64, out: &mut Vec<u8>) {
    out.push(b':');
    out.extend_from_slice(n.to_string().as_bytes());
    out.extend_from_slice(b"\r\n");
}

pub fn bulk_string_into(b: &[u8], out: &mut Vec<u8>) {
    out.push(b'$');
    out.extend_from_slice(b.len().to_string().as_bytes());
    out.extend_from_slice(b"\r\n");
    out.extend_from_slice(b);
    out.extend_from_slice(b"\r\n");
}

pub fn null_bulk_into(out: &mut Vec<u8>) {
    out.extend_from_slice(b"$-1\r\n");
}

pub fn array_header_into(n: usize, out: &mut Vec<u8>) {
    out.push(b'*');
    out.extend_from_slice(n.to_string().as_bytes());
    out.extend_from_slice(b"\r\n");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_string() {
        assert_eq!(Reply::ok().encode(), b"+OK\r\n");
    }

    #[test]
    fn error() {
        assert_eq!(
            Reply::Error("bad".into()).encode(),
            b"-bad\r\n"
        );
    }

    #[test]
    fn integer() {
        assert_eq!(Reply::Integer(42).encode(), b":42\r\n");
        assert_eq!(Reply::Integer(-1).encode(), b":-1\r\n");
    }

    #[test]
    fn bulk() {
        assert_eq!(Reply::bulk("bar").encode(), b"$3\r\nbar\r\n");
    }

    #[test]
    fn null_bulk() {
        assert_eq!(Reply::NullBulk.encode(), b"$-1\r\n");
    }

    #[test]
    fn array_of_bulks() {
        let reply = Reply::Array(vec![
            Reply::bulk("a"),
            Reply::bulk("b"),
            Reply::bulk("c"),
        ]);
        assert_eq!(reply.encode(), b"*3\r\n$1\r\na\r\n$1\r\nb\r\n$1\r\nc\r\n");
    }

    #[test]
    fn nested_array_message() {
        // the shape PUBLISH fan-out uses: ["message", channel, payload]
        let reply = Reply::Array(vec![
            Reply::bulk("message"),
            Reply::bulk("ch"),
            Reply::bulk("hello"),
        ]);
        assert_eq!(
            reply.encode(),
            b"*3\r\n$7\r\nmessage\r\n$2\r\nch\r\n$5\r\nhello\r\n"
        );
    }
}
