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

//! Hash commands: `HSET, HGET, HMSET, HMGET, HGETALL, HDEL, HEXISTS, HLEN`
//! (§4.B).

use crate::error::{DbError, DbResult};
use crate::keyspace::Keyspace;
use crate::resp::Reply;

fn pairs(args: &[&str], name: &'static str) -> DbResult<(&str, Vec<(Vec<u8>, Vec<u8>)>)> {
    if args.len() < 3 || args.len() % 2 == 0 {
        return Err(DbError::Arity(name));
    }
    let key = args[0];
    let rest = &args[1..];
    let pairs = rest
        .chunks(2)
        .map(|c| (c[0].as_bytes().to_vec(), c[1].as_bytes().to_vec()))
        .collect();
    Ok((key, pairs))
}

pub fn hset(keyspace: &mut Keyspace, args: &[&str]) -> DbResult<Reply> {
    let (key, pairs) = pairs(args, "hset")?;
    let created = keyspace.hset(key.as_bytes(), pairs)?;
    Ok(Reply::Integer(created))
}

pub fn hmset(keyspace: &mut Keyspace, args: &[&str]) -> DbResult<Reply> {
    let (key, pairs) = pairs(args, "hmset")?;
    keyspace.hset(key.as_bytes(), pairs)?;
    Ok(Reply::ok())
}

pub fn hget(keyspace: &mut Keyspace, args: &[&str]) -> DbResult<Reply> {
    match args {
        [key, field] => match keyspace.hget(key.as_bytes(), field.as_bytes())? {
            Some(v) => Ok(Reply::bulk(v)),
            None => Ok(Reply::NullBulk),
        },
        _ => Err(DbError::Arity("hget")),
    }
}

pub fn hmget(keyspace: &mut Keyspace, args: &[&str]) -> DbResult<Reply> {
    if args.len() < 2 {
        return Err(DbError::Arity("hmget"));
    }
    let key = args[0];
    let mut out = Vec::with_capacity(args.len() - 1);
    for field in &args[1..] {
        out.push(match keyspace.hget(key.as_bytes(), field.as_bytes())? {
            Some(v) => Reply::bulk(v),
            None => Reply::NullBulk,
        });
    }
    Ok(Reply::Array(out))
}

pub fn hgetall(keyspace: &mut Keyspace, args: &[&str]) -> DbResult<Reply> {
    match args {
        [key] => {
            let pairs = keyspace.hgetall(key.as_bytes())?;
            let mut out = Vec::with_capacity(pairs.len() * 2);
            for (f, v) in pairs {
                out.push(Reply::bulk(f));
                out.push(Reply::bulk(v));
            }
            Ok(Reply::Array(out))
        }
        _ => Err(DbError::Arity("hgetall")),
    }
}

pub fn hdel(keyspace: &mut Keyspace, args: &[&str]) -> DbResult<Reply> {
    if args.len() < 2 {
        return Err(DbError::Arity("hdel"));
    }
    let key = args[0];
    let fields: Vec<Vec<u8>> = args[1..].iter().map(|a| a.as_bytes().to_vec()).collect();
    Ok(Reply::Integer(keyspace.hdel(key.as_bytes(), &fields)?))
}

pub fn hexists(keyspace: &mut Keyspace, args: &[&str]) -> DbResult<Reply> {
    match args {
        [key, field] => Ok(Reply::Integer(
            keyspace.hexists(key.as_bytes(), field.as_bytes())? as i64,
        )),
        _ => Err(DbError::Arity("hexists")),
    }
}

pub fn hlen(keyspace: &mut Keyspace, args: &[&str]) -> DbResult<Reply> {
    match args {
        [key] => Ok(Reply::Integer(keyspace.hlen(key.as_bytes())?)),
        _ => Err(DbError::Arity("hlen")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hset_counts_new_fields_only() {
        let mut ks = Keyspace::new();
        assert_eq!(hset(&mut ks, &["h", "f1", "v1", "f2", "v2"]).unwrap(), Reply::Integer(2));
        assert_eq!(hset(&mut ks, &["h", "f1", "V1", "f3", "v3"]).unwrap(), Reply::Integer(1));
    }

    #[test]
    fn hmget_mixes_found_and_missing() {
        let mut ks = Keyspace::new();
        hset(&mut ks, &["h", "f1", "v1"]).unwrap();
        let Reply::Array(items) = hmget(&mut ks, &["h", "f1", "nope"]).unwrap() else { panic!() };
        assert_eq!(items, vec![Reply::bulk("v1"), Reply::NullBulk]);
    }

    #[test]
    fn hdel_empties_and_removes_key() {
        let mut ks = Keyspace::new();
        hset(&mut ks, &["h", "f", "v"]).unwrap();
        assert_eq!(hdel(&mut ks, &["h", "f"]).unwrap(), Reply::Integer(1));
        assert_eq!(hlen(&mut ks, &["h"]).unwrap(), Reply::Integer(0));
    }
}
