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

use super::*;
use crate::config::Config;
use std::collections::HashMap;

fn scratch_config(name: &str) -> Config {
    let mut cfg = Config::default();
    let base = std::env::temp_dir().join(format!("ferrokv-cmds-{name}-{}", std::process::id()));
    cfg.data_dir = base.join("data").to_string_lossy().into_owned();
    cfg.temp_dir = base.join("tmp").to_string_lossy().into_owned();
    std::fs::create_dir_all(&cfg.data_dir).unwrap();
    std::fs::create_dir_all(&cfg.temp_dir).unwrap();
    cfg
}

#[derive(Default)]
struct RecordingSink {
    inbox: HashMap<ClientId, Vec<Vec<u8>>>,
}

impl ClientSink for RecordingSink {
    fn deliver(&mut self, client: ClientId, frame: &[u8]) -> bool {
        self.inbox.entry(client).or_default().push(frame.to_vec());
        true
    }
}

struct Harness {
    keyspace: Keyspace,
    pubsub: PubSubRouter,
    persistence: PersistenceManager,
    config: Config,
}

impl Harness {
    fn new(name: &str) -> Self {
        let config = scratch_config(name);
        let persistence = PersistenceManager::new(&config).unwrap();
        Harness { keyspace: Keyspace::new(), pubsub: PubSubRouter::new(), persistence, config }
    }

    fn run(&mut self, sink: &mut dyn ClientSink, client: ClientId, line: &str) -> Vec<u8> {
        let mut ctx = Context {
            keyspace: &mut self.keyspace,
            pubsub: &mut self.pubsub,
            persistence: &mut self.persistence,
            config: &mut self.config,
            started_at_unix: 0,
        };
        execute(&mut ctx, sink, client, line)
    }
}

#[test]
fn set_get_roundtrip() {
    let mut h = Harness::new("set-get");
    let mut sink = RecordingSink::default();
    assert_eq!(h.run(&mut sink, 1, "SET foo bar"), b"+OK\r\n");
    assert_eq!(h.run(&mut sink, 1, "GET foo"), b"$3\r\nbar\r\n");
}

#[test]
fn list_semantics_scenario() {
    let mut h = Harness::new("lists");
    let mut sink = RecordingSink::default();
    assert_eq!(h.run(&mut sink, 1, "RPUSH l a b c"), b":3\r\n");
    assert_eq!(h.run(&mut sink, 1, "LRANGE l 0 -1"), b"*3\r\n$1\r\na\r\n$1\r\nb\r\n$1\r\nc\r\n");
    assert_eq!(h.run(&mut sink, 1, "LPOP l"), b"$1\r\na\r\n");
    assert_eq!(h.run(&mut sink, 1, "LPOP l"), b"$1\r\nb\r\n");
    assert_eq!(h.run(&mut sink, 1, "LPOP l"), b"$1\r\nc\r\n");
    assert_eq!(h.run(&mut sink, 1, "TYPE l"), b"+none\r\n");
}

#[test]
fn set_intersection_store_scenario() {
    let mut h = Harness::new("sinterstore");
    let mut sink = RecordingSink::default();
    assert_eq!(h.run(&mut sink, 1, "SADD a 1 2 3"), b":3\r\n");
    assert_eq!(h.run(&mut sink, 1, "SADD b 2 3 4"), b":3\r\n");
    assert_eq!(h.run(&mut sink, 1, "SINTERSTORE dst a b"), b":2\r\n");
    assert_eq!(h.run(&mut sink, 1, "SINTERSTORE dst a missing"), b":0\r\n");
    assert_eq!(h.run(&mut sink, 1, "TYPE dst"), b"+none\r\n");
}

#[test]
fn pubsub_fan_out_scenario() {
    let mut h = Harness::new("pubsub");
    let mut sink = RecordingSink::default();
    h.run(&mut sink, 1, "SUBSCRIBE ch");
    h.run(&mut sink, 2, "SUBSCRIBE ch");
    assert_eq!(h.run(&mut sink, 3, "PUBLISH ch hello"), b":2\r\n");
    let expected = b"*3\r\n$7\r\nmessage\r\n$2\r\nch\r\n$5\r\nhello\r\n".to_vec();
    assert_eq!(sink.inbox.get(&1).unwrap(), &vec![expected.clone()]);
    assert_eq!(sink.inbox.get(&2).unwrap(), &vec![expected]);
}

#[test]
fn no_pending_aof_error_lets_commands_run_normally() {
    let mut h = Harness::new("aof-error");
    let mut sink = RecordingSink::default();
    assert!(h.persistence.take_pending_aof_error().is_none());
    let reply = h.run(&mut sink, 1, "SET k v");
    assert_eq!(reply, b"+OK\r\n");
}

#[test]
fn unknown_command_reports_name() {
    let mut h = Harness::new("unknown");
    let mut sink = RecordingSink::default();
    let reply = h.run(&mut sink, 1, "FROBNICATE a b");
    assert_eq!(reply, b"-unknown command 'frobnicate'\r\n");
}

#[test]
fn expire_then_lazy_get_reports_missing() {
    let mut h = Harness::new("expire");
    let mut sink = RecordingSink::default();
    h.run(&mut sink, 1, "SET foo bar");
    h.keyspace.set(b"foo", b"bar".to_vec(), Some(0));
    assert_eq!(h.run(&mut sink, 1, "GET foo"), b"$-1\r\n");
    assert_eq!(h.run(&mut sink, 1, "TYPE foo"), b"+none\r\n");
}
