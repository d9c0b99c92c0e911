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

//! Set commands: `SADD, SREM, SMEMBERS, SISMEMBER, SCARD, SUNION, SDIFF,
//! SINTER, SINTERSTORE` (§4.B).

use crate::error::{DbError, DbResult};
use crate::keyspace::Keyspace;
use crate::resp::Reply;

pub fn sadd(keyspace: &mut Keyspace, args: &[&str]) -> DbResult<Reply> {
    if args.len() < 2 {
        return Err(DbError::Arity("sadd"));
    }
    let key = args[0];
    let members: Vec<Vec<u8>> = args[1..].iter().map(|a| a.as_bytes().to_vec()).collect();
    Ok(Reply::Integer(keyspace.sadd(key.as_bytes(), members)?))
}

pub fn srem(keyspace: &mut Keyspace, args: &[&str]) -> DbResult<Reply> {
    if args.len() < 2 {
        return Err(DbError::Arity("srem"));
    }
    let key = args[0];
    let members: Vec<Vec<u8>> = args[1..].iter().map(|a| a.as_bytes().to_vec()).collect();
    Ok(Reply::Integer(keyspace.srem(key.as_bytes(), &members)?))
}

pub fn smembers(keyspace: &mut Keyspace, args: &[&str]) -> DbResult<Reply> {
    match args {
        [key] => {
            let members = keyspace.smembers(key.as_bytes())?;
            Ok(Reply::Array(members.into_iter().map(Reply::bulk).collect()))
        }
        _ => Err(DbError::Arity("smembers")),
    }
}

pub fn sismember(keyspace: &mut Keyspace, args: &[&str]) -> DbResult<Reply> {
    match args {
        [key, member] => Ok(Reply::Integer(
            keyspace.sismember(key.as_bytes(), member.as_bytes())? as i64,
        )),
        _ => Err(DbError::Arity("sismember")),
    }
}

pub fn scard(keyspace: &mut Keyspace, args: &[&str]) -> DbResult<Reply> {
    match args {
        [key] => Ok(Reply::Integer(keyspace.scard(key.as_bytes())?)),
        _ => Err(DbError::Arity("scard")),
    }
}

fn key_list(args: &[&str], name: &'static str) -> DbResult<Vec<Vec<u8>>> {
    if args.is_empty() {
        return Err(DbError::Arity(name));
    }
    Ok(args.iter().map(|a| a.as_bytes().to_vec()).collect())
}

pub fn sunion(keyspace: &mut Keyspace, args: &[&str]) -> DbResult<Reply> {
    let keys = key_list(args, "sunion")?;
    let members = keyspace.sunion(&keys)?;
    Ok(Reply::Array(members.into_iter().map(Reply::bulk).collect()))
}

pub fn sdiff(keyspace: &mut Keyspace, args: &[&str]) -> DbResult<Reply> {
    let keys = key_list(args, "sdiff")?;
    let members = keyspace.sdiff(&keys)?;
    Ok(Reply::Array(members.into_iter().map(Reply::bulk).collect()))
}

pub fn sinter(keyspace: &mut Keyspace, args: &[&str]) -> DbResult<Reply> {
    let keys = key_list(args, "sinter")?;
    let members = keyspace.sinter(&keys)?;
    Ok(Reply::Array(members.into_iter().map(Reply::bulk).collect()))
}

pub fn sinterstore(keyspace: &mut Keyspace, args: &[&str]) -> DbResult<Reply> {
    if args.len() < 2 {
        return Err(DbError::Arity("sinterstore"));
    }
    let dest = args[0];
    let keys: Vec<Vec<u8>> = args[1..].iter().map(|a| a.as_bytes().to_vec()).collect();
    Ok(Reply::Integer(keyspace.sinterstore(dest.as_bytes(), &keys)?))
}
