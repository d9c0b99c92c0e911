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

//! List commands: `LPUSH, RPUSH, LPOP, RPOP, LRANGE, LLEN, LINDEX, LSET`
//! (§4.B).

use crate::error::{DbError, DbResult};
use crate::keyspace::Keyspace;
use crate::resp::Reply;

fn parse_i64(s: &str) -> DbResult<i64> {
    s.parse().map_err(|_| DbError::NotAnInteger)
}

pub fn lpush(keyspace: &mut Keyspace, args: &[&str]) -> DbResult<Reply> {
    push(keyspace, args, true, "lpush")
}

pub fn rpush(keyspace: &mut Keyspace, args: &[&str]) -> DbResult<Reply> {
    push(keyspace, args, false, "rpush")
}

fn push(keyspace: &mut Keyspace, args: &[&str], front: bool, name: &'static str) -> DbResult<Reply> {
    if args.len() < 2 {
        return Err(DbError::Arity(name));
    }
    let key = args[0];
    let values: Vec<Vec<u8>> = args[1..].iter().map(|a| a.as_bytes().to_vec()).collect();
    let len = keyspace.lpush(key.as_bytes(), values, front)?;
    Ok(Reply::Integer(len))
}

pub fn lpop(keyspace: &mut Keyspace, args: &[&str]) -> DbResult<Reply> {
    pop(keyspace, args, true, "lpop")
}

pub fn rpop(keyspace: &mut Keyspace, args: &[&str]) -> DbResult<Reply> {
    pop(keyspace, args, false, "rpop")
}

fn pop(keyspace: &mut Keyspace, args: &[&str], front: bool, name: &'static str) -> DbResult<Reply> {
    match args {
        [key] => match keyspace.lpop(key.as_bytes(), front)? {
            Some(v) => Ok(Reply::bulk(v)),
            None => Ok(Reply::NullBulk),
        },
        _ => Err(DbError::Arity(name)),
    }
}

pub fn lrange(keyspace: &mut Keyspace, args: &[&str]) -> DbResult<Reply> {
    match args {
        [key, start, stop] => {
            let start = parse_i64(start)?;
            let stop = parse_i64(stop)?;
            let items = keyspace.lrange(key.as_bytes(), start, stop)?;
            Ok(Reply::Array(items.into_iter().map(Reply::bulk).collect()))
        }
        _ => Err(DbError::Arity("lrange")),
    }
}

pub fn llen(keyspace: &mut Keyspace, args: &[&str]) -> DbResult<Reply> {
    match args {
        [key] => Ok(Reply::Integer(keyspace.llen(key.as_bytes())?)),
        _ => Err(DbError::Arity("llen")),
    }
}

pub fn lindex(keyspace: &mut Keyspace, args: &[&str]) -> DbResult<Reply> {
    match args {
        [key, index] => {
            let index = parse_i64(index)?;
            match keyspace.lindex(key.as_bytes(), index)? {
                Some(v) => Ok(Reply::bulk(v)),
                None => Ok(Reply::NullBulk),
            }
        }
        _ => Err(DbError::Arity("lindex")),
    }
}

pub fn lset(keyspace: &mut Keyspace, args: &[&str]) -> DbResult<Reply> {
    match args {
        [key, index, value] => {
            let index = parse_i64(index)?;
            keyspace.lset(key.as_bytes(), index, value.as_bytes().to_vec())?;
            Ok(Reply::ok())
        }
        _ => Err(DbError::Arity("lset")),
    }
}
