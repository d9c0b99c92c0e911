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

fn k(s: &str) -> Vec<u8> {
    s.as_bytes().to_vec()
}

#[test]
fn set_get_roundtrip() {
    let mut ks = Keyspace::new();
    ks.set(&k("foo"), k("bar"), None);
    assert_eq!(ks.get(&k("foo")).unwrap(), Some(k("bar")));
    assert_eq!(ks.type_of(&k("foo")), "string");
}

#[test]
fn get_missing_is_none() {
    let mut ks = Keyspace::new();
    assert_eq!(ks.get(&k("nope")).unwrap(), None);
    assert_eq!(ks.type_of(&k("nope")), "none");
}

#[test]
fn wrong_type_on_list_get() {
    let mut ks = Keyspace::new();
    ks.lpush(&k("l"), vec![k("a")], false).unwrap();
    assert!(matches!(ks.get(&k("l")), Err(DbError::WrongType)));
}

#[test]
fn expiry_makes_key_invisible_and_type_none() {
    let mut ks = Keyspace::new();
    ks.set(&k("foo"), k("bar"), Some(now_ms().saturating_sub(1)));
    assert_eq!(ks.get(&k("foo")).unwrap(), None);
    assert_eq!(ks.type_of(&k("foo")), "none");
    assert_eq!(ks.exists(&[k("foo")]), 0);
}

#[test]
fn ttl_semantics() {
    let mut ks = Keyspace::new();
    assert_eq!(ks.ttl(&k("nope")), -2);
    ks.set(&k("foo"), k("bar"), None);
    assert_eq!(ks.ttl(&k("foo")), -1);
    ks.expire(&k("foo"), 10);
    let ttl = ks.ttl(&k("foo"));
    assert!((9..=10).contains(&ttl));
}

#[test]
fn expire_non_positive_seconds_is_noop() {
    let mut ks = Keyspace::new();
    ks.set(&k("foo"), k("bar"), None);
    assert!(!ks.expire(&k("foo"), 0));
    assert!(!ks.expire(&k("foo"), -5));
    // key must still exist
    assert_eq!(ks.get(&k("foo")).unwrap(), Some(k("bar")));
}

#[test]
fn persist_clears_expiry() {
    let mut ks = Keyspace::new();
    ks.set(&k("foo"), k("bar"), None);
    ks.expire(&k("foo"), 100);
    assert!(ks.persist(&k("foo")));
    assert_eq!(ks.ttl(&k("foo")), -1);
    assert!(!ks.persist(&k("foo")));
}

#[test]
fn list_push_pop_deletes_key_when_empty() {
    let mut ks = Keyspace::new();
    assert_eq!(ks.lpush(&k("l"), vec![k("a"), k("b"), k("c")], false).unwrap(), 3);
    assert_eq!(ks.lrange(&k("l"), 0, -1).unwrap(), vec![k("a"), k("b"), k("c")]);
    assert_eq!(ks.lpop(&k("l"), true).unwrap(), Some(k("a")));
    assert_eq!(ks.lpop(&k("l"), true).unwrap(), Some(k("b")));
    assert_eq!(ks.lpop(&k("l"), true).unwrap(), Some(k("c")));
    assert_eq!(ks.type_of(&k("l")), "none");
    assert_eq!(ks.llen(&k("l")).unwrap(), 0);
}

#[test]
fn lset_errors() {
    let mut ks = Keyspace::new();
    assert!(matches!(ks.lset(&k("l"), 0, k("x")), Err(DbError::NoSuchKey)));
    ks.lpush(&k("l"), vec![k("a")], false).unwrap();
    assert!(matches!(ks.lset(&k("l"), 5, k("x")), Err(DbError::IndexOutOfRange)));
    ks.lset(&k("l"), 0, k("z")).unwrap();
    assert_eq!(ks.lindex(&k("l"), 0).unwrap(), Some(k("z")));
}

#[test]
fn hash_new_field_count() {
    let mut ks = Keyspace::new();
    let created = ks
        .hset(&k("h"), vec![(k("f1"), k("v1")), (k("f2"), k("v2"))])
        .unwrap();
    assert_eq!(created, 2);
    let created2 = ks
        .hset(&k("h"), vec![(k("f1"), k("V1")), (k("f3"), k("v3"))])
        .unwrap();
    assert_eq!(created2, 1);
    let mut all = ks.hgetall(&k("h")).unwrap();
    all.sort();
    let mut expected = vec![(k("f1"), k("V1")), (k("f2"), k("v2")), (k("f3"), k("v3"))];
    expected.sort();
    assert_eq!(all, expected);
}

#[test]
fn hdel_deletes_key_when_empty() {
    let mut ks = Keyspace::new();
    ks.hset(&k("h"), vec![(k("f"), k("v"))]).unwrap();
    assert_eq!(ks.hdel(&k("h"), &[k("f")]).unwrap(), 1);
    assert_eq!(ks.type_of(&k("h")), "none");
}

#[test]
fn set_operations_and_sinterstore() {
    let mut ks = Keyspace::new();
    ks.sadd(&k("a"), vec![k("1"), k("2"), k("3")]).unwrap();
    ks.sadd(&k("b"), vec![k("2"), k("3"), k("4")]).unwrap();
    let card = ks.sinterstore(&k("dst"), &[k("a"), k("b")]).unwrap();
    assert_eq!(card, 2);
    let mut members = ks.smembers(&k("dst")).unwrap();
    members.sort();
    assert_eq!(members, vec![k("2"), k("3")]);

    let card2 = ks.sinterstore(&k("dst"), &[k("a"), k("missing")]).unwrap();
    assert_eq!(card2, 0);
    assert_eq!(ks.type_of(&k("dst")), "none");
}

#[test]
fn sunion_and_sdiff_treat_missing_as_empty() {
    let mut ks = Keyspace::new();
    ks.sadd(&k("a"), vec![k("1"), k("2")]).unwrap();
    let mut u = ks.sunion(&[k("a"), k("missing")]).unwrap().into_iter().collect::<Vec<_>>();
    u.sort();
    assert_eq!(u, vec![k("1"), k("2")]);
    let mut d = ks.sdiff(&[k("a"), k("missing")]).unwrap().into_iter().collect::<Vec<_>>();
    d.sort();
    assert_eq!(d, vec![k("1"), k("2")]);
}

#[test]
fn memory_accounting_tracks_inserts_and_deletes() {
    let mut ks = Keyspace::new();
    assert_eq!(ks.mem_bytes(), 0);
    ks.set(&k("foo"), k("bar"), None);
    assert!(ks.mem_bytes() > 0);
    ks.delete(&[k("foo")]);
    assert_eq!(ks.mem_bytes(), 0);
}

#[test]
fn kind_counts_track_live_set() {
    let mut ks = Keyspace::new();
    ks.set(&k("s"), k("v"), None);
    ks.lpush(&k("l"), vec![k("a")], false).unwrap();
    ks.sadd(&k("st"), vec![k("m")]).unwrap();
    assert_eq!(ks.kind_count(Kind::Str), 1);
    assert_eq!(ks.kind_count(Kind::List), 1);
    assert_eq!(ks.kind_count(Kind::Set), 1);
    assert_eq!(ks.kind_count(Kind::Hash), 0);
    ks.delete(&[k("s")]);
    assert_eq!(ks.kind_count(Kind::Str), 0);
}

#[test]
fn glob_keys() {
    let mut ks = Keyspace::new();
    ks.set(&k("user:1"), k("a"), None);
    ks.set(&k("user:2"), k("b"), None);
    ks.set(&k("other"), k("c"), None);
    let mut matched = ks.keys_matching(b"user:*");
    matched.sort();
    assert_eq!(matched, vec![k("user:1"), k("user:2")]);
}

#[test]
fn changes_since_save_tracks_mutations_and_resets_on_load() {
    let mut ks = Keyspace::new();
    assert_eq!(ks.changes_since_save, 0);
    ks.set(&k("a"), k("1"), None);
    ks.delete(&[k("a")]);
    assert!(ks.changes_since_save >= 2);
    ks.load_entries(vec![]);
    assert_eq!(ks.changes_since_save, 0);
}

#[test]
fn flush_resets_everything() {
    let mut ks = Keyspace::new();
    ks.set(&k("a"), k("1"), None);
    ks.lpush(&k("b"), vec![k("x")], false).unwrap();
    ks.flush();
    assert_eq!(ks.len(), 0);
    assert_eq!(ks.mem_bytes(), 0);
    assert_eq!(ks.kind_count(Kind::Str), 0);
    assert_eq!(ks.kind_count(Kind::List), 0);
}
