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

//! The §7 error taxonomy. Handlers return `Result<Reply, DbError>`; the
//! dispatcher turns an `Err` into an encoded RESP error reply. Nothing here
//! terminates a connection -- that only happens on an actual socket I/O
//! failure, which is tracked separately by the server loop.
//!
//! Hand-rolled rather than built on `thiserror`/`anyhow`: the teacher crate
//! (and the rest of the corpus this crate learns from) rolls its own small
//! error enums per subsystem instead of reaching for an error-derive crate.

use std::fmt;
use std::io;

#[derive(Debug)]
pub enum DbError {
    /// empty command line, or an unrecognized verb
    Protocol(String),
    /// wrong number of arguments for a known command
    Arity(&'static str),
    /// a kind-specific command targeted a key holding a different kind
    WrongType,
    /// a value wasn't an integer, or was out of the accepted range
    NotAnInteger,
    InvalidExpireTime,
    /// LSET / LINDEX index out of range, or LSET against a missing key
    IndexOutOfRange,
    NoSuchKey,
    /// persistence asked for but not enabled, reload failed, etc.
    State(String),
    /// save/bgsave failed to complete, or to start
    Io(String),
}

impl fmt::Display for DbError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DbError::Protocol(msg) => write!(f, "{msg}"),
            DbError::Arity(cmd) => write!(f, "wrong number of arguments for '{cmd}' command"),
            DbError::WrongType => {
                write!(f, "WRONGTYPE Operation against a key holding the wrong kind of value")
            }
            DbError::NotAnInteger => write!(f, "value is not an integer or out of range"),
            DbError::InvalidExpireTime => write!(f, "invalid expire time"),
            DbError::IndexOutOfRange => write!(f, "index out of range"),
            DbError::NoSuchKey => write!(f, "no such key"),
            DbError::State(msg) => write!(f, "{msg}"),
            DbError::Io(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for DbError {}

impl From<io::Error> for DbError {
    fn from(e: io::Error) -> Self {
        DbError::Io(e.to_string())
    }
}

pub type DbResult<T> = Result<T, DbError>;
