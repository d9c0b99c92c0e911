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

//! `SUBSCRIBE, UNSUBSCRIBE, PUBLISH, PUBSUB CHANNELS|NUMSUB|NUMPAT` (§4.F,
//! §4.G).
//!
//! Delivery of the published `["message", channel, payload]` frame to each
//! subscriber is the server loop's job, since it's the only thing holding
//! live sockets. [`ClientSink`] is the seam: the command layer calls it with
//! a target [`ClientId`] and an already-encoded frame, and never touches a
//! socket directly, so these handlers stay unit-testable with a fake sink.

use crate::error::{DbError, DbResult};
use crate::pubsub::{ClientId, PubSubRouter};
use crate::resp::Reply;

/// Delivers an encoded reply frame to a single connected client. Implemented
/// by the server loop over its connection table; a failed write should
/// `disconnect` the client from the router rather than panic.
pub trait ClientSink {
    fn deliver(&mut self, client: ClientId, frame: &[u8]) -> bool;
}

fn confirmation(verb: &'static str, channel: Option<&[u8]>, count: usize) -> Reply {
    Reply::Array(vec![
        Reply::SimpleString(verb.to_owned()),
        match channel {
            Some(c) => Reply::bulk(c.to_vec()),
            None => Reply::NullBulk,
        },
        Reply::Integer(count as i64),
    ])
}

/// Returns one confirmation array per channel, concatenated into a flat
/// array reply rather than nested -- the RESP wire form is just the frames
/// back to back, so the caller only needs `encode_into` per element.
pub fn subscribe(router: &mut PubSubRouter, client: ClientId, args: &[&str]) -> DbResult<Vec<Reply>> {
    if args.is_empty() {
        return Err(DbError::Arity("subscribe"));
    }
    let channels: Vec<Vec<u8>> = args.iter().map(|a| a.as_bytes().to_vec()).collect();
    let results = router.subscribe(client, &channels);
    Ok(results
        .into_iter()
        .map(|(channel, count)| confirmation("subscribe", Some(&channel), count))
        .collect())
}

pub fn unsubscribe(router: &mut PubSubRouter, client: ClientId, args: &[&str]) -> DbResult<Vec<Reply>> {
    let requested: Option<Vec<Vec<u8>>> = if args.is_empty() {
        None
    } else {
        Some(args.iter().map(|a| a.as_bytes().to_vec()).collect())
    };
    let results = router.unsubscribe(client, requested.as_deref());
    if results.is_empty() {
        return Ok(vec![confirmation("unsubscribe", None, 0)]);
    }
    Ok(results
        .into_iter()
        .map(|(channel, count)| confirmation("unsubscribe", Some(&channel), count))
        .collect())
}

fn strip_quotes(s: &str) -> &str {
    let bytes = s.as_bytes();
    if bytes.len() >= 2
        && ((bytes[0] == b'"' && bytes[bytes.len() - 1] == b'"')
            || (bytes[0] == b'\'' && bytes[bytes.len() - 1] == b'\''))
    {
        &s[1..s.len() - 1]
    } else {
        s
    }
}

/// `PUBLISH channel message...`. Joins multi-word messages with a space and
/// strips one layer of surrounding quotes, matching the original prototype;
/// delivery happens inline here since the router only hands back targets.
pub fn publish(
    router: &mut PubSubRouter,
    sink: &mut dyn ClientSink,
    args: &[&str],
) -> DbResult<Reply> {
    if args.len() < 2 {
        return Err(DbError::Arity("publish"));
    }
    let channel = args[0].as_bytes();
    let message = strip_quotes(&args[1..].join(" ")).to_owned();

    let targets = router.publish_targets(channel);
    let frame = Reply::Array(vec![
        Reply::SimpleString("message".to_owned()),
        Reply::bulk(channel.to_vec()),
        Reply::bulk(message.into_bytes()),
    ])
    .encode();

    let mut delivered = 0i64;
    let mut failed = Vec::new();
    for client in targets {
        if sink.deliver(client, &frame) {
            delivered += 1;
        } else {
            failed.push(client);
        }
    }
    for client in failed {
        router.disconnect(client);
    }
    Ok(Reply::Integer(delivered))
}

pub fn pubsub(router: &mut PubSubRouter, args: &[&str]) -> DbResult<Reply> {
    let (sub, rest) = args.split_first().ok_or(DbError::Arity("pubsub"))?;
    match sub.to_ascii_uppercase().as_str() {
        "CHANNELS" => {
            let pattern = rest.first().map(|p| p.as_bytes());
            let channels = router.channels(pattern);
            Ok(Reply::Array(channels.into_iter().map(Reply::bulk).collect()))
        }
        "NUMSUB" => {
            if rest.is_empty() {
                return Ok(Reply::Array(vec![]));
            }
            let channels: Vec<Vec<u8>> = rest.iter().map(|a| a.as_bytes().to_vec()).collect();
            let mut out = Vec::with_capacity(channels.len() * 2);
            for (channel, count) in router.numsub(&channels) {
                out.push(Reply::bulk(channel));
                out.push(Reply::Integer(count as i64));
            }
            Ok(Reply::Array(out))
        }
        "NUMPAT" => Ok(Reply::Integer(0)),
        _ => Err(DbError::Arity("pubsub")),
    }
}
