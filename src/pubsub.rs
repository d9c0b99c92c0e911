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

//! # Pub/Sub router (§4.F)
//!
//! A bidirectional `channel -> {client}` / `client -> {channel}` map.
//! Delivery itself (writing the encoded `["message", channel, payload]`
//! reply to each subscriber's socket) is done by the server loop, which
//! owns the connections; this module only tracks who's subscribed to
//! what and hands back a snapshot of targets to publish to, so the
//! routing logic can be unit tested without any actual sockets.

use crate::util::glob_match;
use std::collections::{HashMap, HashSet};

pub type ClientId = u64;

#[derive(Default)]
pub struct PubSubRouter {
    channels: HashMap<Vec<u8>, HashSet<ClientId>>,
    subscriptions: HashMap<ClientId, HashSet<Vec<u8>>>,
}

impl PubSubRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe `client` to each channel; returns `(channel,
    /// client_total_subscriptions)` per channel, in the order given.
    pub fn subscribe(&mut self, client: ClientId, channels: &[Vec<u8>]) -> Vec<(Vec<u8>, usize)> {
        let mut out = Vec::with_capacity(channels.len());
        for channel in channels {
            let subs = self.subscriptions.entry(client).or_default();
            if subs.insert(channel.clone()) {
                self.channels
                    .entry(channel.clone())
                    .or_default()
                    .insert(client);
            }
            let total = self.subscriptions.get(&client).map(|s| s.len()).unwrap_or(0);
            out.push((channel.clone(), total));
        }
        out
    }

    /// Unsubscribe from the given channels, or from everything if `None`.
    /// Drops empty channel entries. Returns `(channel,
    /// client_total_subscriptions)` per channel touched.
    pub fn unsubscribe(
        &mut self,
        client: ClientId,
        channels: Option<&[Vec<u8>]>,
    ) -> Vec<(Vec<u8>, usize)> {
        let targets: Vec<Vec<u8>> = match channels {
            Some(chs) => chs.to_vec(),
            None => self
                .subscriptions
                .get(&client)
                .map(|s| s.iter().cloned().collect())
                .unwrap_or_default(),
        };
        let mut out = Vec::with_capacity(targets.len());
        for channel in targets {
            if let Some(subs) = self.subscriptions.get_mut(&client) {
                subs.remove(&channel);
            }
            if let Some(members) = self.channels.get_mut(&channel) {
                members.remove(&client);
                if members.is_empty() {
                    self.channels.remove(&channel);
                }
            }
            let total = self
                .subscriptions
                .get(&client)
                .map(|s| s.len())
                .unwrap_or(0);
            out.push((channel, total));
        }
        out
    }

    /// A snapshot of the subscriber set for `channel` at this instant --
    /// the caller iterates this to deliver, and reports failures back via
    /// [`PubSubRouter::disconnect`].
    pub fn publish_targets(&self, channel: &[u8]) -> Vec<ClientId> {
        self.channels
            .get(channel)
            .map(|s| s.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Remove a client from both sides of the mapping atomically, e.g. on
    /// disconnect or on a failed delivery write.
    pub fn disconnect(&mut self, client: ClientId) {
        if let Some(channels) = self.subscriptions.remove(&client) {
            for channel in channels {
                if let Some(members) = self.channels.get_mut(&channel) {
                    members.remove(&client);
                    if members.is_empty() {
                        self.channels.remove(&channel);
                    }
                }
            }
        }
    }

    /// Sorted active channels, optionally glob-filtered.
    pub fn channels(&self, pattern: Option<&[u8]>) -> Vec<Vec<u8>> {
        let mut out: Vec<Vec<u8>> = self
            .channels
            .keys()
            .filter(|c| pattern.map(|p| glob_match(p, c)).unwrap_or(true))
            .cloned()
            .collect();
        out.sort();
        out
    }

    pub fn numsub(&self, channels: &[Vec<u8>]) -> Vec<(Vec<u8>, usize)> {
        channels
            .iter()
            .map(|c| (c.clone(), self.channels.get(c).map(|s| s.len()).unwrap_or(0)))
            .collect()
    }

    pub fn is_subscribed(&self, client: ClientId) -> bool {
        self.subscriptions
            .get(&client)
            .map(|s| !s.is_empty())
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c(s: &str) -> Vec<u8> {
        s.as_bytes().to_vec()
    }

    #[test]
    fn subscribe_counts_grow_per_client() {
        let mut r = PubSubRouter::new();
        let res = r.subscribe(1, &[c("a"), c("b")]);
        assert_eq!(res, vec![(c("a"), 1), (c("b"), 2)]);
    }

    #[test]
    fn subscribe_is_idempotent_per_channel() {
        let mut r = PubSubRouter::new();
        r.subscribe(1, &[c("a")]);
        let res = r.subscribe(1, &[c("a")]);
        assert_eq!(res, vec![(c("a"), 1)]);
    }

    #[test]
    fn publish_targets_sees_all_subscribers() {
        let mut r = PubSubRouter::new();
        r.subscribe(1, &[c("ch")]);
        r.subscribe(2, &[c("ch")]);
        let mut targets = r.publish_targets(&c("ch"));
        targets.sort();
        assert_eq!(targets, vec![1, 2]);
    }

    #[test]
    fn unsubscribe_all_when_no_channels_given() {
        let mut r = PubSubRouter::new();
        r.subscribe(1, &[c("a"), c("b")]);
        let res = r.unsubscribe(1, None);
        assert_eq!(res.len(), 2);
        assert!(!r.is_subscribed(1));
        assert!(r.publish_targets(&c("a")).is_empty());
    }

    #[test]
    fn disconnect_removes_from_both_maps() {
        let mut r = PubSubRouter::new();
        r.subscribe(1, &[c("a")]);
        r.subscribe(2, &[c("a")]);
        r.disconnect(1);
        assert_eq!(r.publish_targets(&c("a")), vec![2]);
        assert!(!r.is_subscribed(1));
    }

    #[test]
    fn channels_sorted_and_filtered() {
        let mut r = PubSubRouter::new();
        r.subscribe(1, &[c("news.sports"), c("news.tech"), c("weather")]);
        assert_eq!(r.channels(None), vec![c("news.sports"), c("news.tech"), c("weather")]);
        assert_eq!(r.channels(Some(b"news.*")), vec![c("news.sports"), c("news.tech")]);
    }

    #[test]
    fn numsub_reports_per_channel_counts() {
        let mut r = PubSubRouter::new();
        r.subscribe(1, &[c("a")]);
        r.subscribe(2, &[c("a")]);
        r.subscribe(3, &[c("b")]);
        assert_eq!(
            r.numsub(&[c("a"), c("b"), c("missing")]),
            vec![(c("a"), 2), (c("b"), 1), (c("missing"), 0)]
        );
    }
}
