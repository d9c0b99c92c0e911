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

//! # Keyspace
//!
//! The typed map from key to value, with expiry, memory accounting, and
//! per-kind counters (§3, §4.B). This plays the role the teacher's
//! `corestore`/`coredb` modules play -- the single owned aggregate that
//! every command handler borrows for the duration of one command (§3
//! "Ownership") -- but holds the four flat value shapes this spec defines
//! instead of the teacher's keyspace-of-keyspaces model.

use crate::error::{DbError, DbResult};
use crate::util::{glob_match, now_ms};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};

#[cfg(test)]
mod tests;

/// Fixed per-entry bookkeeping cost folded into the memory accounting
/// (§3 invariant 4: `overhead_constant`). Chosen to approximate the
/// allocator + hashmap-bucket overhead of one entry; it does not need to
/// be exact, only consistently applied.
pub const OVERHEAD_BYTES: usize = 48;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Kind {
    Str = 0,
    List = 1,
    Hash = 2,
    Set = 3,
}

impl Kind {
    pub const ALL: [Kind; 4] = [Kind::Str, Kind::List, Kind::Hash, Kind::Set];

    pub fn name(self) -> &'static str {
        match self {
            Kind::Str => "string",
            Kind::List => "list",
            Kind::Hash => "hash",
            Kind::Set => "set",
        }
    }

    fn idx(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Value {
    Str(Vec<u8>),
    List(VecDeque<Vec<u8>>),
    Hash(HashMap<Vec<u8>, Vec<u8>>),
    Set(HashSet<Vec<u8>>),
}

impl Value {
    pub fn kind(&self) -> Kind {
        match self {
            Value::Str(_) => Kind::Str,
            Value::List(_) => Kind::List,
            Value::Hash(_) => Kind::Hash,
            Value::Set(_) => Kind::Set,
        }
    }

    /// Approximate heap footprint of the value's own payload -- the part
    /// of the §3 memory formula beyond `len(key)` and the fixed overhead.
    fn size_bytes(&self) -> usize {
        match self {
            Value::Str(s) => s.len(),
            Value::List(l) => l.iter().map(|v| v.len() + 8).sum(),
            Value::Hash(h) => h.iter().map(|(k, v)| k.len() + v.len() + 16).sum(),
            Value::Set(s) => s.iter().map(|m| m.len() + 8).sum(),
        }
    }

}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entry {
    pub value: Value,
    pub kind: Kind,
    /// absolute expiry, in unix milliseconds
    pub expiry_at: Option<u64>,
}

impl Entry {
    fn is_live(&self, now: u64) -> bool {
        match self.expiry_at {
            Some(at) => at > now,
            None => true,
        }
    }
}

#[derive(Default)]
pub struct Keyspace {
    map: HashMap<Vec<u8>, Entry>,
    mem_bytes: usize,
    kind_counts: [usize; 4],
    /// writes applied since the last successful snapshot, feeding the
    /// §4.D auto-save conditions
    pub changes_since_save: u64,
}

impl Keyspace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn mem_bytes(&self) -> usize {
        self.mem_bytes
    }

    pub fn kind_count(&self, kind: Kind) -> usize {
        self.kind_counts[kind.idx()]
    }

    fn entry_size(key: &[u8], value: &Value) -> usize {
        key.len() + value.size_bytes() + OVERHEAD_BYTES
    }

    fn before_size(&self, key: &[u8]) -> usize {
        self.map
            .get(key)
            .map(|e| Self::entry_size(key, &e.value))
            .unwrap_or(0)
    }

    fn apply_size_delta(&mut self, before: usize, after: usize) {
        if after >= before {
            self.mem_bytes += after - before;
        } else {
            self.mem_bytes -= before - after;
        }
    }

    fn remove_entry(&mut self, key: &[u8]) -> Option<Entry> {
        let entry = self.map.remove(key)?;
        let size = Self::entry_size(key, &entry.value);
        self.mem_bytes -= size;
        self.kind_counts[entry.kind.idx()] -= 1;
        self.changes_since_save += 1;
        Some(entry)
    }

    /// §4.B "Lazy" expiration: called on every access path before the key
    /// is looked at. Removes the entry if its expiry has passed and
    /// reports it as missing to the caller.
    fn lazy_purge(&mut self, key: &[u8]) {
        let now = now_ms();
        let expired = matches!(self.map.get(key), Some(e) if !e.is_live(now));
        if expired {
            self.remove_entry(key);
        }
    }

    fn install(&mut self, key: Vec<u8>, value: Value, expiry_at: Option<u64>) {
        let kind = value.kind();
        let after = Self::entry_size(&key, &value);
        let before = if let Some(old) = self.map.get(&key) {
            self.kind_counts[old.kind.idx()] -= 1;
            Self::entry_size(&key, &old.value)
        } else {
            0
        };
        self.kind_counts[kind.idx()] += 1;
        self.apply_size_delta(before, after);
        self.map.insert(key, Entry { value, kind, expiry_at });
        self.changes_since_save += 1;
    }

    // ---------------------------------------------------------------
    // generic key operations
    // ---------------------------------------------------------------

    pub fn set(&mut self, key: &[u8], value: Vec<u8>, expiry_at: Option<u64>) {
        self.install(key.to_vec(), Value::Str(value), expiry_at);
    }

    pub fn get(&mut self, key: &[u8]) -> DbResult<Option<Vec<u8>>> {
        self.lazy_purge(key);
        match self.map.get(key) {
            None => Ok(None),
            Some(e) if e.kind != Kind::Str => Err(DbError::WrongType),
            Some(e) => match &e.value {
                Value::Str(s) => Ok(Some(s.clone())),
                _ => unreachable!(),
            },
        }
    }

    pub fn delete(&mut self, keys: &[Vec<u8>]) -> usize {
        let mut count = 0;
        for key in keys {
            self.lazy_purge(key);
            if self.remove_entry(key).is_some() {
                count += 1;
            }
        }
        count
    }

    pub fn exists(&mut self, keys: &[Vec<u8>]) -> usize {
        let now = now_ms();
        let mut count = 0;
        for key in keys {
            self.lazy_purge(key);
            if matches!(self.map.get(key), Some(e) if e.is_live(now)) {
                count += 1;
            }
        }
        count
    }

    pub fn keys_matching(&mut self, pattern: &[u8]) -> Vec<Vec<u8>> {
        self.purge_all_expired();
        self.map
            .keys()
            .filter(|k| glob_match(pattern, k))
            .cloned()
            .collect()
    }

    /// Drops every entry whose expiry has already passed. Used by `KEYS`
    /// (so a full scan never observes a stale-but-not-yet-sampled key) and
    /// by the background sampler's bookkeeping.
    fn purge_all_expired(&mut self) {
        let now = now_ms();
        let expired: Vec<Vec<u8>> = self
            .map
            .iter()
            .filter(|(_, e)| !e.is_live(now))
            .map(|(k, _)| k.clone())
            .collect();
        for key in expired {
            self.remove_entry(&key);
        }
    }

    pub fn flush(&mut self) {
        self.map.clear();
        self.mem_bytes = 0;
        self.kind_counts = [0; 4];
        self.changes_since_save += 1;
    }

    pub fn expire(&mut self, key: &[u8], seconds: i64) -> bool {
        if seconds <= 0 {
            return false;
        }
        let at = now_ms() + (seconds as u64) * 1000;
        self.set_expiry_if_present(key, at)
    }

    pub fn expire_at(&mut self, key: &[u8], unix_ts_secs: i64) -> bool {
        let now_secs = (now_ms() / 1000) as i64;
        if unix_ts_secs <= now_secs {
            return false;
        }
        self.set_expiry_if_present(key, (unix_ts_secs as u64) * 1000)
    }

    fn set_expiry_if_present(&mut self, key: &[u8], at_ms: u64) -> bool {
        self.lazy_purge(key);
        match self.map.get_mut(key) {
            Some(e) => {
                e.expiry_at = Some(at_ms);
                self.changes_since_save += 1;
                true
            }
            None => false,
        }
    }

    pub fn ttl(&mut self, key: &[u8]) -> i64 {
        match self.pttl(key) {
            -2 => -2,
            -1 => -1,
            ms => (ms + 999) / 1000,
        }
    }

    pub fn pttl(&mut self, key: &[u8]) -> i64 {
        self.lazy_purge(key);
        match self.map.get(key) {
            None => -2,
            Some(Entry { expiry_at: None, .. }) => -1,
            Some(Entry {
                expiry_at: Some(at),
                ..
            }) => {
                let now = now_ms();
                if *at <= now {
                    0
                } else {
                    (*at - now) as i64
                }
            }
        }
    }

    pub fn persist(&mut self, key: &[u8]) -> bool {
        self.lazy_purge(key);
        match self.map.get_mut(key) {
            Some(e) if e.expiry_at.is_some() => {
                e.expiry_at = None;
                self.changes_since_save += 1;
                true
            }
            _ => false,
        }
    }

    pub fn type_of(&mut self, key: &[u8]) -> &'static str {
        self.lazy_purge(key);
        match self.map.get(key) {
            Some(e) => e.kind.name(),
            None => "none",
        }
    }

    /// §4.B "Sampled" expiration: pick up to `sample_size` random keys and
    /// drop those whose expiry has passed. Returns how many were reclaimed.
    pub fn sample_expire(&mut self, sample_size: usize) -> usize {
        use rand::seq::IteratorRandom;
        let now = now_ms();
        let candidates: Vec<Vec<u8>> = self
            .map
            .keys()
            .choose_multiple(&mut rand::thread_rng(), sample_size)
            .into_iter()
            .cloned()
            .collect();
        let mut reclaimed = 0;
        for key in candidates {
            if matches!(self.map.get(&key), Some(e) if !e.is_live(now)) {
                self.remove_entry(&key);
                reclaimed += 1;
            }
        }
        reclaimed
    }

    // ---------------------------------------------------------------
    // list operations
    // ---------------------------------------------------------------

    fn check_kind_or_absent(&self, key: &[u8], want: Kind) -> DbResult<()> {
        match self.map.get(key) {
            Some(e) if e.kind != want => Err(DbError::WrongType),
            _ => Ok(()),
        }
    }

    pub fn lpush(&mut self, key: &[u8], values: Vec<Vec<u8>>, front: bool) -> DbResult<i64> {
        self.lazy_purge(key);
        self.check_kind_or_absent(key, Kind::List)?;
        let before = self.before_size(key);
        if !self.map.contains_key(key) {
            self.map.insert(
                key.to_vec(),
                Entry {
                    value: Value::List(VecDeque::new()),
                    kind: Kind::List,
                    expiry_at: None,
                },
            );
            self.kind_counts[Kind::List.idx()] += 1;
        }
        let len = {
            let entry = self.map.get_mut(key).unwrap();
            let list = match &mut entry.value {
                Value::List(l) => l,
                _ => unreachable!(),
            };
            for v in values {
                if front {
                    list.push_front(v);
                } else {
                    list.push_back(v);
                }
            }
            list.len() as i64
        };
        let after = self.before_size(key);
        self.apply_size_delta(before, after);
        Ok(len)
    }

    pub fn lpop(&mut self, key: &[u8], front: bool) -> DbResult<Option<Vec<u8>>> {
        self.lazy_purge(key);
        self.check_kind_or_absent(key, Kind::List)?;
        if !self.map.contains_key(key) {
            return Ok(None);
        }
        let before = self.before_size(key);
        let (popped, became_empty) = {
            let entry = self.map.get_mut(key).unwrap();
            let list = match &mut entry.value {
                Value::List(l) => l,
                _ => unreachable!(),
            };
            let popped = if front { list.pop_front() } else { list.pop_back() };
            (popped, list.is_empty())
        };
        if became_empty {
            self.remove_entry(key);
        } else {
            let after = self.before_size(key);
            self.apply_size_delta(before, after);
        }
        Ok(popped)
    }

    pub fn lrange(&mut self, key: &[u8], start: i64, stop: i64) -> DbResult<Vec<Vec<u8>>> {
        self.lazy_purge(key);
        self.check_kind_or_absent(key, Kind::List)?;
        let Some(entry) = self.map.get(key) else {
            return Ok(Vec::new());
        };
        let Value::List(list) = &entry.value else {
            unreachable!()
        };
        let len = list.len() as i64;
        if len == 0 {
            return Ok(Vec::new());
        }
        let (start, stop) = normalize_range(start, stop, len);
        if start > stop {
            return Ok(Vec::new());
        }
        Ok(list
            .iter()
            .skip(start as usize)
            .take((stop - start + 1) as usize)
            .cloned()
            .collect())
    }

    pub fn llen(&mut self, key: &[u8]) -> DbResult<i64> {
        self.lazy_purge(key);
        self.check_kind_or_absent(key, Kind::List)?;
        match self.map.get(key) {
            None => Ok(0),
            Some(e) => match &e.value {
                Value::List(l) => Ok(l.len() as i64),
                _ => unreachable!(),
            },
        }
    }

    pub fn lindex(&mut self, key: &[u8], index: i64) -> DbResult<Option<Vec<u8>>> {
        self.lazy_purge(key);
        self.check_kind_or_absent(key, Kind::List)?;
        let Some(entry) = self.map.get(key) else {
            return Ok(None);
        };
        let Value::List(list) = &entry.value else {
            unreachable!()
        };
        let Some(i) = normalize_index(index, list.len() as i64) else {
            return Ok(None);
        };
        Ok(list.get(i as usize).cloned())
    }

    pub fn lset(&mut self, key: &[u8], index: i64, value: Vec<u8>) -> DbResult<()> {
        self.lazy_purge(key);
        self.check_kind_or_absent(key, Kind::List)?;
        if !self.map.contains_key(key) {
            return Err(DbError::NoSuchKey);
        }
        let before = self.before_size(key);
        {
            let entry = self.map.get_mut(key).unwrap();
            let list = match &mut entry.value {
                Value::List(l) => l,
                _ => unreachable!(),
            };
            let Some(i) = normalize_index(index, list.len() as i64) else {
                return Err(DbError::IndexOutOfRange);
            };
            list[i as usize] = value;
        }
        let after = self.before_size(key);
        self.apply_size_delta(before, after);
        Ok(())
    }

    // ---------------------------------------------------------------
    // hash operations
    // ---------------------------------------------------------------

    pub fn hset(&mut self, key: &[u8], pairs: Vec<(Vec<u8>, Vec<u8>)>) -> DbResult<i64> {
        self.lazy_purge(key);
        self.check_kind_or_absent(key, Kind::Hash)?;
        let before = self.before_size(key);
        if !self.map.contains_key(key) {
            self.map.insert(
                key.to_vec(),
                Entry {
                    value: Value::Hash(HashMap::new()),
                    kind: Kind::Hash,
                    expiry_at: None,
                },
            );
            self.kind_counts[Kind::Hash.idx()] += 1;
        }
        let created = {
            let entry = self.map.get_mut(key).unwrap();
            let hash = match &mut entry.value {
                Value::Hash(h) => h,
                _ => unreachable!(),
            };
            let mut created = 0;
            for (field, value) in pairs {
                if hash.insert(field, value).is_none() {
                    created += 1;
                }
            }
            created
        };
        let after = self.before_size(key);
        self.apply_size_delta(before, after);
        Ok(created)
    }

    pub fn hget(&mut self, key: &[u8], field: &[u8]) -> DbResult<Option<Vec<u8>>> {
        self.lazy_purge(key);
        self.check_kind_or_absent(key, Kind::Hash)?;
        match self.map.get(key) {
            None => Ok(None),
            Some(e) => match &e.value {
                Value::Hash(h) => Ok(h.get(field).cloned()),
                _ => unreachable!(),
            },
        }
    }

    pub fn hgetall(&mut self, key: &[u8]) -> DbResult<Vec<(Vec<u8>, Vec<u8>)>> {
        self.lazy_purge(key);
        self.check_kind_or_absent(key, Kind::Hash)?;
        match self.map.get(key) {
            None => Ok(Vec::new()),
            Some(e) => match &e.value {
                Value::Hash(h) => Ok(h.iter().map(|(k, v)| (k.clone(), v.clone())).collect()),
                _ => unreachable!(),
            },
        }
    }

    pub fn hdel(&mut self, key: &[u8], fields: &[Vec<u8>]) -> DbResult<i64> {
        self.lazy_purge(key);
        self.check_kind_or_absent(key, Kind::Hash)?;
        if !self.map.contains_key(key) {
            return Ok(0);
        }
        let before = self.before_size(key);
        let (removed, became_empty) = {
            let entry = self.map.get_mut(key).unwrap();
            let hash = match &mut entry.value {
                Value::Hash(h) => h,
                _ => unreachable!(),
            };
            let mut removed = 0;
            for field in fields {
                if hash.remove(field).is_some() {
                    removed += 1;
                }
            }
            (removed, hash.is_empty())
        };
        if became_empty {
            self.remove_entry(key);
        } else {
            let after = self.before_size(key);
            self.apply_size_delta(before, after);
        }
        Ok(removed)
    }

    pub fn hexists(&mut self, key: &[u8], field: &[u8]) -> DbResult<bool> {
        self.lazy_purge(key);
        self.check_kind_or_absent(key, Kind::Hash)?;
        match self.map.get(key) {
            None => Ok(false),
            Some(e) => match &e.value {
                Value::Hash(h) => Ok(h.contains_key(field)),
                _ => unreachable!(),
            },
        }
    }

    pub fn hlen(&mut self, key: &[u8]) -> DbResult<i64> {
        self.lazy_purge(key);
        self.check_kind_or_absent(key, Kind::Hash)?;
        match self.map.get(key) {
            None => Ok(0),
            Some(e) => match &e.value {
                Value::Hash(h) => Ok(h.len() as i64),
                _ => unreachable!(),
            },
        }
    }

    // ---------------------------------------------------------------
    // set operations
    // ---------------------------------------------------------------

    pub fn sadd(&mut self, key: &[u8], members: Vec<Vec<u8>>) -> DbResult<i64> {
        self.lazy_purge(key);
        self.check_kind_or_absent(key, Kind::Set)?;
        let before = self.before_size(key);
        if !self.map.contains_key(key) {
            self.map.insert(
                key.to_vec(),
                Entry {
                    value: Value::Set(HashSet::new()),
                    kind: Kind::Set,
                    expiry_at: None,
                },
            );
            self.kind_counts[Kind::Set.idx()] += 1;
        }
        let added = {
            let entry = self.map.get_mut(key).unwrap();
            let set = match &mut entry.value {
                Value::Set(s) => s,
                _ => unreachable!(),
            };
            let mut added = 0;
            for m in members {
                if set.insert(m) {
                    added += 1;
                }
            }
            added
        };
        let after = self.before_size(key);
        self.apply_size_delta(before, after);
        Ok(added)
    }

    pub fn srem(&mut self, key: &[u8], members: &[Vec<u8>]) -> DbResult<i64> {
        self.lazy_purge(key);
        self.check_kind_or_absent(key, Kind::Set)?;
        if !self.map.contains_key(key) {
            return Ok(0);
        }
        let before = self.before_size(key);
        let (removed, became_empty) = {
            let entry = self.map.get_mut(key).unwrap();
            let set = match &mut entry.value {
                Value::Set(s) => s,
                _ => unreachable!(),
            };
            let mut removed = 0;
            for m in members {
                if set.remove(m) {
                    removed += 1;
                }
            }
            (removed, set.is_empty())
        };
        if became_empty {
            self.remove_entry(key);
        } else {
            let after = self.before_size(key);
            self.apply_size_delta(before, after);
        }
        Ok(removed)
    }

    pub fn smembers(&mut self, key: &[u8]) -> DbResult<Vec<Vec<u8>>> {
        self.lazy_purge(key);
        self.check_kind_or_absent(key, Kind::Set)?;
        match self.map.get(key) {
            None => Ok(Vec::new()),
            Some(e) => match &e.value {
                Value::Set(s) => Ok(s.iter().cloned().collect()),
                _ => unreachable!(),
            },
        }
    }

    pub fn sismember(&mut self, key: &[u8], member: &[u8]) -> DbResult<bool> {
        self.lazy_purge(key);
        self.check_kind_or_absent(key, Kind::Set)?;
        match self.map.get(key) {
            None => Ok(false),
            Some(e) => match &e.value {
                Value::Set(s) => Ok(s.contains(member)),
                _ => unreachable!(),
            },
        }
    }

    pub fn scard(&mut self, key: &[u8]) -> DbResult<i64> {
        self.lazy_purge(key);
        self.check_kind_or_absent(key, Kind::Set)?;
        match self.map.get(key) {
            None => Ok(0),
            Some(e) => match &e.value {
                Value::Set(s) => Ok(s.len() as i64),
                _ => unreachable!(),
            },
        }
    }

    fn read_set(&mut self, key: &[u8]) -> DbResult<HashSet<Vec<u8>>> {
        self.lazy_purge(key);
        self.check_kind_or_absent(key, Kind::Set)?;
        match self.map.get(key) {
            None => Ok(HashSet::new()),
            Some(e) => match &e.value {
                Value::Set(s) => Ok(s.clone()),
                _ => unreachable!(),
            },
        }
    }

    /// missing keys count as empty for union/diff
    pub fn sunion(&mut self, keys: &[Vec<u8>]) -> DbResult<HashSet<Vec<u8>>> {
        let mut out = HashSet::new();
        for key in keys {
            out.extend(self.read_set(key)?);
        }
        Ok(out)
    }

    pub fn sdiff(&mut self, keys: &[Vec<u8>]) -> DbResult<HashSet<Vec<u8>>> {
        let Some((first, rest)) = keys.split_first() else {
            return Ok(HashSet::new());
        };
        let mut out = self.read_set(first)?;
        for key in rest {
            let other = self.read_set(key)?;
            out.retain(|m| !other.contains(m));
        }
        Ok(out)
    }

    /// any missing key yields an empty intersection
    pub fn sinter(&mut self, keys: &[Vec<u8>]) -> DbResult<HashSet<Vec<u8>>> {
        if keys.is_empty() {
            return Ok(HashSet::new());
        }
        for key in keys {
            self.lazy_purge(key);
            if !self.map.contains_key(key) {
                return Ok(HashSet::new());
            }
        }
        let mut iter = keys.iter();
        let mut out = self.read_set(iter.next().unwrap())?;
        for key in iter {
            let other = self.read_set(key)?;
            out.retain(|m| other.contains(m));
        }
        Ok(out)
    }

    // ---------------------------------------------------------------
    // persistence hooks: §4.C (AOF rewrite) and §4.D (snapshot) both need
    // a consistent point-in-time view of every live entry.
    // ---------------------------------------------------------------

    /// A snapshot of every live (non-expired) entry, used both by the
    /// binary snapshot writer and by AOF rewrite.
    pub fn live_entries(&self) -> Vec<(Vec<u8>, Entry)> {
        let now = now_ms();
        self.map
            .iter()
            .filter(|(_, e)| e.is_live(now))
            .map(|(k, e)| (k.clone(), e.clone()))
            .collect()
    }

    /// Replaces the whole keyspace with `entries`, skipping any whose
    /// expiry has already passed -- the §4.D snapshot `Load` contract.
    pub fn load_entries(&mut self, entries: Vec<(Vec<u8>, Entry)>) {
        self.flush();
        let now = now_ms();
        for (key, entry) in entries {
            if entry.is_live(now) {
                self.install(key, entry.value, entry.expiry_at);
            }
        }
        // loading a snapshot establishes a baseline, not a set of changes
        // pending the next save.
        self.changes_since_save = 0;
    }

    pub fn sinterstore(&mut self, dest: &[u8], keys: &[Vec<u8>]) -> DbResult<i64> {
        let result = self.sinter(keys)?;
        if result.is_empty() {
            self.lazy_purge(dest);
            self.remove_entry(dest);
            Ok(0)
        } else {
            let card = result.len() as i64;
            self.install(dest.to_vec(), Value::Set(result), None);
            Ok(card)
        }
    }
}

fn normalize_range(start: i64, stop: i64, len: i64) -> (i64, i64) {
    let norm = |i: i64| -> i64 {
        if i < 0 {
            (len + i).max(0)
        } else {
            i
        }
    };
    let start = norm(start).min(len - 1).max(0);
    let stop = norm(stop).min(len - 1);
    (start, stop)
}

fn normalize_index(index: i64, len: i64) -> Option<i64> {
    let i = if index < 0 { len + index } else { index };
    if i < 0 || i >= len {
        None
    } else {
        Some(i)
    }
}
