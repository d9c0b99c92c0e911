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

//! Key-generic commands: `DEL, EXISTS, KEYS, FLUSHALL, TYPE, EXPIRE,
//! EXPIREAT, TTL, PTTL, PERSIST` (§4.B, §4.G).

use crate::error::{DbError, DbResult};
use crate::keyspace::Keyspace;
use crate::resp::Reply;

pub fn del(keyspace: &mut Keyspace, args: &[&str]) -> DbResult<Reply> {
    if args.is_empty() {
        return Err(DbError::Arity("del"));
    }
    let keys: Vec<Vec<u8>> = args.iter().map(|a| a.as_bytes().to_vec()).collect();
    Ok(Reply::Integer(keyspace.delete(&keys) as i64))
}

pub fn exists(keyspace: &mut Keyspace, args: &[&str]) -> DbResult<Reply> {
    if args.is_empty() {
        return Err(DbError::Arity("exists"));
    }
    let keys: Vec<Vec<u8>> = args.iter().map(|a| a.as_bytes().to_vec()).collect();
    Ok(Reply::Integer(keyspace.exists(&keys) as i64))
}

pub fn keys(keyspace: &mut Keyspace, args: &[&str]) -> DbResult<Reply> {
    let pattern = args.first().copied().unwrap_or("*");
    let matched = keyspace.keys_matching(pattern.as_bytes());
    Ok(Reply::Array(matched.into_iter().map(Reply::bulk).collect()))
}

pub fn flushall(keyspace: &mut Keyspace, args: &[&str]) -> DbResult<Reply> {
    if !args.is_empty() {
        return Err(DbError::Arity("flushall"));
    }
    keyspace.flush();
    Ok(Reply::ok())
}

pub fn type_of(keyspace: &mut Keyspace, args: &[&str]) -> DbResult<Reply> {
    match args {
        [key] => Ok(Reply::SimpleString(keyspace.type_of(key.as_bytes()).to_owned())),
        _ => Err(DbError::Arity("type")),
    }
}

pub fn expire(keyspace: &mut Keyspace, args: &[&str]) -> DbResult<Reply> {
    match args {
        [key, seconds] => {
            let seconds: i64 = seconds.parse().map_err(|_| DbError::InvalidExpireTime)?;
            if seconds <= 0 {
                return Ok(Reply::Integer(0));
            }
            let applied = keyspace.expire(key.as_bytes(), seconds);
            Ok(Reply::Integer(applied as i64))
        }
        _ => Err(DbError::Arity("expire")),
    }
}

pub fn expireat(keyspace: &mut Keyspace, args: &[&str]) -> DbResult<Reply> {
    match args {
        [key, ts] => {
            let ts: i64 = ts.parse().map_err(|_| DbError::InvalidExpireTime)?;
            let applied = keyspace.expire_at(key.as_bytes(), ts);
            Ok(Reply::Integer(applied as i64))
        }
        _ => Err(DbError::Arity("expireat")),
    }
}

/// Always an integer reply, per the testable-properties invariant
/// `ttl(k) in {-2,-1} union N` -- the prototype's human-readable "no
/// expiration"/"has expired" strings are not preserved here.
pub fn ttl(keyspace: &mut Keyspace, args: &[&str]) -> DbResult<Reply> {
    match args {
        [key] => Ok(Reply::Integer(keyspace.ttl(key.as_bytes()))),
        _ => Err(DbError::Arity("ttl")),
    }
}

pub fn pttl(keyspace: &mut Keyspace, args: &[&str]) -> DbResult<Reply> {
    match args {
        [key] => Ok(Reply::Integer(keyspace.pttl(key.as_bytes()))),
        _ => Err(DbError::Arity("pttl")),
    }
}

pub fn persist(keyspace: &mut Keyspace, args: &[&str]) -> DbResult<Reply> {
    match args {
        [key] => Ok(Reply::Integer(keyspace.persist(key.as_bytes()) as i64)),
        _ => Err(DbError::Arity("persist")),
    }
}
