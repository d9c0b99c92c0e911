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

//! `PING`, `ECHO`, `SET [EX n]`, `GET` (§4.G, §6).

use crate::error::{DbError, DbResult};
use crate::keyspace::Keyspace;
use crate::resp::Reply;
use crate::util::now_ms;

pub fn ping(args: &[&str]) -> DbResult<Reply> {
    match args {
        [] => Ok(Reply::SimpleString("PONG".to_owned())),
        [msg] => Ok(Reply::bulk(msg.as_bytes().to_vec())),
        _ => Err(DbError::Arity("ping")),
    }
}

/// Joins every argument with a space rather than requiring exactly one --
/// the original prototype's behavior, preserved per the spec's open
/// questions rather than "corrected" to single-arg semantics.
pub fn echo(args: &[&str]) -> DbResult<Reply> {
    Ok(Reply::SimpleString(args.join(" ")))
}

/// `SET key value [EX seconds]`. The `EX` suffix is only recognized when
/// the second-to-last token is literally `EX` and at least one value
/// token precedes it -- ambiguous for values whose own last two tokens
/// happen to look like `EX <int>`, preserved as a documented quirk.
pub fn set(args: &[&str]) -> DbResult<(Reply, Option<u64>, String)> {
    if args.len() < 2 {
        return Err(DbError::Arity("set"));
    }
    let key = args[0];
    let rest = &args[1..];

    if rest.len() >= 3 && rest[rest.len() - 2].eq_ignore_ascii_case("EX") {
        let secs: i64 = rest[rest.len() - 1]
            .parse()
            .map_err(|_| DbError::InvalidExpireTime)?;
        let value = rest[..rest.len() - 2].join(" ");
        let expiry_at = if secs > 0 {
            Some(now_ms() + (secs as u64) * 1000)
        } else {
            None
        };
        Ok((Reply::ok(), expiry_at, value))
    } else {
        Ok((Reply::ok(), None, rest.join(" ")))
    }
}

pub fn apply_set(keyspace: &mut Keyspace, key: &str, value: String, expiry_at: Option<u64>) {
    keyspace.set(key.as_bytes(), value.into_bytes(), expiry_at);
}

pub fn get(keyspace: &mut Keyspace, args: &[&str]) -> DbResult<Reply> {
    match args {
        [key] => match keyspace.get(key.as_bytes())? {
            Some(v) => Ok(Reply::bulk(v)),
            None => Ok(Reply::NullBulk),
        },
        _ => Err(DbError::Arity("get")),
    }
}
