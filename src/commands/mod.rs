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

//! # Command registry & dispatcher (§4.G)
//!
//! One `execute` call per line read off a connection. Splits into tokens,
//! checks for a pending AOF error first (a failed fsync is reported at the
//! next command boundary rather than silently dropped), looks the verb up
//! in the match below, and -- for write-set commands that succeeded --
//! appends the command to the AOF before returning the reply. Plays the
//! role the teacher's `dispatcher`/`actions` registry plays, but as a
//! single `match` instead of a table of function pointers, since this
//! registry is small and fixed rather than macro-generated per action.

pub mod admin;
pub mod generic;
pub mod hashes;
pub mod lists;
pub mod pubsub_cmds;
pub mod sets;
pub mod strings;

#[cfg(test)]
mod tests;

pub use pubsub_cmds::ClientSink;

use crate::config::Config;
use crate::error::DbError;
use crate::keyspace::Keyspace;
use crate::persistence::PersistenceManager;
use crate::pubsub::{ClientId, PubSubRouter};
use crate::resp::Reply;

/// Commands that mutate the keyspace (or pub/sub state) and therefore get
/// appended to the AOF once they've succeeded. `PUBLISH` is write-set
/// despite not touching the keyspace, matching the original prototype's
/// logging of publish events into its journal.
pub const WRITE_SET: &[&str] = &[
    "SET", "DEL", "EXPIRE", "EXPIREAT", "PERSIST", "FLUSHALL", "LPUSH", "RPUSH", "LPOP", "RPOP",
    "LSET", "HSET", "HMSET", "HDEL", "SADD", "SREM", "SINTERSTORE", "PUBLISH",
];

/// Everything a command handler needs, borrowed for the duration of one
/// `execute` call.
pub struct Context<'a> {
    pub keyspace: &'a mut Keyspace,
    pub pubsub: &'a mut PubSubRouter,
    pub persistence: &'a mut PersistenceManager,
    pub config: &'a mut Config,
    pub started_at_unix: u64,
}

fn split_line(line: &str) -> Vec<&str> {
    line.split_whitespace().collect()
}

/// Runs one command line to completion and returns the encoded reply
/// frame(s) -- usually one, but `SUBSCRIBE`/`UNSUBSCRIBE` emit one frame
/// per channel touched.
pub fn execute(ctx: &mut Context<'_>, sink: &mut dyn ClientSink, client: ClientId, line: &str) -> Vec<u8> {
    if let Some(err) = ctx.persistence.take_pending_aof_error() {
        return Reply::Error(format!("ERR AOF write failed: {err}")).encode();
    }

    let tokens = split_line(line);
    let Some((verb, args)) = tokens.split_first() else {
        return Vec::new();
    };
    let verb_upper = verb.to_ascii_uppercase();

    let result = dispatch(ctx, sink, client, &verb_upper, args);
    ctx.persistence.note_command();

    let mut out = Vec::new();
    match result {
        Ok(replies) => {
            for reply in &replies {
                reply.encode_into(&mut out);
            }
            if WRITE_SET.contains(&verb_upper.as_str()) {
                let logged_args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
                ctx.persistence.log_write(&verb_upper, &logged_args);
            }
        }
        Err(e) => Reply::from_error(e).encode_into(&mut out),
    }
    out
}

fn dispatch(
    ctx: &mut Context<'_>,
    sink: &mut dyn ClientSink,
    client: ClientId,
    verb: &str,
    args: &[&str],
) -> Result<Vec<Reply>, DbError> {
    use strings::apply_set;

    let single = |r: Result<Reply, DbError>| r.map(|reply| vec![reply]);

    match verb {
        "PING" => single(strings::ping(args)),
        "ECHO" => single(strings::echo(args)),
        "SET" => {
            let (reply, expiry_at, value) = strings::set(args)?;
            apply_set(ctx.keyspace, args[0], value, expiry_at);
            Ok(vec![reply])
        }
        "GET" => single(strings::get(ctx.keyspace, args)),

        "DEL" => single(generic::del(ctx.keyspace, args)),
        "EXISTS" => single(generic::exists(ctx.keyspace, args)),
        "KEYS" => single(generic::keys(ctx.keyspace, args)),
        "FLUSHALL" => single(generic::flushall(ctx.keyspace, args)),
        "TYPE" => single(generic::type_of(ctx.keyspace, args)),
        "EXPIRE" => single(generic::expire(ctx.keyspace, args)),
        "EXPIREAT" => single(generic::expireat(ctx.keyspace, args)),
        "TTL" => single(generic::ttl(ctx.keyspace, args)),
        "PTTL" => single(generic::pttl(ctx.keyspace, args)),
        "PERSIST" => single(generic::persist(ctx.keyspace, args)),

        "LPUSH" => single(lists::lpush(ctx.keyspace, args)),
        "RPUSH" => single(lists::rpush(ctx.keyspace, args)),
        "LPOP" => single(lists::lpop(ctx.keyspace, args)),
        "RPOP" => single(lists::rpop(ctx.keyspace, args)),
        "LRANGE" => single(lists::lrange(ctx.keyspace, args)),
        "LLEN" => single(lists::llen(ctx.keyspace, args)),
        "LINDEX" => single(lists::lindex(ctx.keyspace, args)),
        "LSET" => single(lists::lset(ctx.keyspace, args)),

        "HSET" => single(hashes::hset(ctx.keyspace, args)),
        "HMSET" => single(hashes::hmset(ctx.keyspace, args)),
        "HGET" => single(hashes::hget(ctx.keyspace, args)),
        "HMGET" => single(hashes::hmget(ctx.keyspace, args)),
        "HGETALL" => single(hashes::hgetall(ctx.keyspace, args)),
        "HDEL" => single(hashes::hdel(ctx.keyspace, args)),
        "HEXISTS" => single(hashes::hexists(ctx.keyspace, args)),
        "HLEN" => single(hashes::hlen(ctx.keyspace, args)),

        "SADD" => single(sets::sadd(ctx.keyspace, args)),
        "SREM" => single(sets::srem(ctx.keyspace, args)),
        "SMEMBERS" => single(sets::smembers(ctx.keyspace, args)),
        "SISMEMBER" => single(sets::sismember(ctx.keyspace, args)),
        "SCARD" => single(sets::scard(ctx.keyspace, args)),
        "SUNION" => single(sets::sunion(ctx.keyspace, args)),
        "SDIFF" => single(sets::sdiff(ctx.keyspace, args)),
        "SINTER" => single(sets::sinter(ctx.keyspace, args)),
        "SINTERSTORE" => single(sets::sinterstore(ctx.keyspace, args)),

        "SUBSCRIBE" => pubsub_cmds::subscribe(ctx.pubsub, client, args),
        "UNSUBSCRIBE" => pubsub_cmds::unsubscribe(ctx.pubsub, client, args),
        "PUBLISH" => single(pubsub_cmds::publish(ctx.pubsub, sink, args)),
        "PUBSUB" => single(pubsub_cmds::pubsub(ctx.pubsub, args)),

        "SAVE" => single(admin::save(ctx.persistence, ctx.keyspace)),
        "BGSAVE" => single(admin::bgsave(ctx.persistence, ctx.keyspace)),
        "BGREWRITEAOF" => single(admin::bgrewriteaof(ctx.persistence, ctx.keyspace)),
        "LASTSAVE" => single(admin::lastsave(ctx.persistence)),
        "CONFIG" => single(admin::config(ctx.config, args)),
        "DEBUG" => single(admin::debug(ctx.config, ctx.keyspace, args)),
        "INFO" => single(admin::info(ctx.config, ctx.persistence, ctx.keyspace, ctx.started_at_unix)),

        other => Err(DbError::Protocol(format!("unknown command '{}'", other.to_ascii_lowercase()))),
    }
}
