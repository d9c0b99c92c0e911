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

//! Startup recovery and AOF replay (§4.E).
//!
//! Replay applies write verbs directly to the keyspace without going
//! through the command dispatcher, so nothing gets re-logged to the AOF
//! while the AOF itself is being read -- the same split the teacher's
//! `storage/v1/recovery` keeps between "apply to the in-memory tree" and
//! "append to the journal".

use crate::config::Config;
use crate::keyspace::Keyspace;
use crate::persistence::snapshot;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoverySource {
    Aof,
    Snapshot,
    Empty,
}

/// Top-level §4.E recovery: AOF (if present and enabled) takes priority
/// over the snapshot (if present), which takes priority over starting
/// empty. A catastrophic read error on either source is logged and
/// recovery falls through to the next source rather than propagating.
pub fn recover(config: &Config, keyspace: &mut Keyspace) -> RecoverySource {
    let aof_path = config.aof_path();
    if config.aof_enabled && aof_path.exists() {
        match replay_aof(&aof_path, keyspace) {
            Ok(n) => {
                log::info!("recovered {n} commands from {}", aof_path.display());
                return RecoverySource::Aof;
            }
            Err(e) => {
                log::warn!("aof recovery failed ({e}), falling back to snapshot");
                keyspace.flush();
            }
        }
    }

    let rdb_path = config.rdb_path();
    if config.rdb_enabled && rdb_path.exists() {
        match snapshot::load(&rdb_path) {
            Ok(payload) => {
                keyspace.load_entries(payload.keys);
                log::info!("recovered {} keys from {}", keyspace.len(), rdb_path.display());
                return RecoverySource::Snapshot;
            }
            Err(e) => {
                log::warn!("snapshot recovery failed ({e}), starting empty");
                keyspace.flush();
            }
        }
    }

    RecoverySource::Empty
}

/// Parse and apply every line of `path` to `keyspace`. A malformed line is
/// logged and skipped; the count of successfully applied lines is
/// returned. A read failure is propagated to the caller, which treats it
/// as catastrophic per §4.E.
pub fn replay_aof(path: &Path, keyspace: &mut Keyspace) -> std::io::Result<usize> {
    let text = fs::read_to_string(path)?;
    let mut applied = 0;
    for (lineno, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match apply_line(line, keyspace) {
            Ok(true) => applied += 1,
            Ok(false) => {}
            Err(msg) => log::warn!("aof replay: skipping malformed line {}: {msg}", lineno + 1),
        }
    }
    Ok(applied)
}

/// Applies one record; returns `Ok(true)` if it mutated the keyspace,
/// `Ok(false)` for recognized-but-inert records (e.g. `PUBLISH`), and
/// `Err` for anything that couldn't be parsed or dispatched.
fn apply_line(line: &str, keyspace: &mut Keyspace) -> Result<bool, String> {
    let mut tokens = line.split_whitespace();
    let ts: i64 = tokens
        .next()
        .ok_or("missing timestamp")?
        .parse()
        .map_err(|_| "timestamp is not an integer".to_string())?;
    let verb = tokens.next().ok_or("missing command")?.to_ascii_uppercase();
    let args: Vec<&str> = tokens.collect();

    match verb.as_str() {
        "SET" => {
            let key = *args.first().ok_or("SET: missing key")?;
            let rest = &args[1..];
            if rest.len() >= 3 && rest[rest.len() - 2].eq_ignore_ascii_case("EX") {
                let secs: i64 = rest[rest.len() - 1]
                    .parse()
                    .map_err(|_| "SET: EX seconds not an integer".to_string())?;
                let value = rest[..rest.len() - 2].join(" ");
                keyspace.set(key.as_bytes(), value.into_bytes(), None);
                keyspace.expire_at(key.as_bytes(), ts + secs);
            } else {
                let value = rest.join(" ");
                keyspace.set(key.as_bytes(), value.into_bytes(), None);
            }
            Ok(true)
        }
        "DEL" => {
            let keys: Vec<Vec<u8>> = args.iter().map(|a| a.as_bytes().to_vec()).collect();
            keyspace.delete(&keys);
            Ok(true)
        }
        "EXPIRE" => {
            let key = *args.first().ok_or("EXPIRE: missing key")?;
            let secs: i64 = args.get(1).ok_or("EXPIRE: missing seconds")?.parse().map_err(|_| "EXPIRE: seconds not an integer".to_string())?;
            keyspace.expire_at(key.as_bytes(), ts + secs);
            Ok(true)
        }
        "EXPIREAT" => {
            let key = *args.first().ok_or("EXPIREAT: missing key")?;
            let at: i64 = args.get(1).ok_or("EXPIREAT: missing timestamp")?.parse().map_err(|_| "EXPIREAT: timestamp not an integer".to_string())?;
            keyspace.expire_at(key.as_bytes(), at);
            Ok(true)
        }
        "PERSIST" => {
            let key = *args.first().ok_or("PERSIST: missing key")?;
            keyspace.persist(key.as_bytes());
            Ok(true)
        }
        "FLUSHALL" => {
            keyspace.flush();
            Ok(true)
        }
        "LPUSH" | "RPUSH" => {
            let key = *args.first().ok_or("LPUSH/RPUSH: missing key")?;
            let values: Vec<Vec<u8>> = args[1..].iter().map(|a| a.as_bytes().to_vec()).collect();
            keyspace
                .lpush(key.as_bytes(), values, verb == "LPUSH")
                .map_err(|e| e.to_string())?;
            Ok(true)
        }
        "LPOP" | "RPOP" => {
            let key = *args.first().ok_or("LPOP/RPOP: missing key")?;
            keyspace
                .lpop(key.as_bytes(), verb == "LPOP")
                .map_err(|e| e.to_string())?;
            Ok(true)
        }
        "LSET" => {
            let key = *args.first().ok_or("LSET: missing key")?;
            let index: i64 = args.get(1).ok_or("LSET: missing index")?.parse().map_err(|_| "LSET: index not an integer".to_string())?;
            let value = args[2..].join(" ");
            keyspace
                .lset(key.as_bytes(), index, value.into_bytes())
                .map_err(|e| e.to_string())?;
            Ok(true)
        }
        "HSET" | "HMSET" => {
            let key = *args.first().ok_or("HSET/HMSET: missing key")?;
            let rest = &args[1..];
            if rest.len() % 2 != 0 {
                return Err("HSET/HMSET: odd number of field/value tokens".into());
            }
            let pairs: Vec<(Vec<u8>, Vec<u8>)> = rest
                .chunks(2)
                .map(|c| (c[0].as_bytes().to_vec(), c[1].as_bytes().to_vec()))
                .collect();
            keyspace.hset(key.as_bytes(), pairs).map_err(|e| e.to_string())?;
            Ok(true)
        }
        "HDEL" => {
            let key = *args.first().ok_or("HDEL: missing key")?;
            let fields: Vec<Vec<u8>> = args[1..].iter().map(|a| a.as_bytes().to_vec()).collect();
            keyspace.hdel(key.as_bytes(), &fields).map_err(|e| e.to_string())?;
            Ok(true)
        }
        "SADD" => {
            let key = *args.first().ok_or("SADD: missing key")?;
            let members: Vec<Vec<u8>> = args[1..].iter().map(|a| a.as_bytes().to_vec()).collect();
            keyspace.sadd(key.as_bytes(), members).map_err(|e| e.to_string())?;
            Ok(true)
        }
        "SREM" => {
            let key = *args.first().ok_or("SREM: missing key")?;
            let members: Vec<Vec<u8>> = args[1..].iter().map(|a| a.as_bytes().to_vec()).collect();
            keyspace.srem(key.as_bytes(), &members).map_err(|e| e.to_string())?;
            Ok(true)
        }
        "SINTERSTORE" => {
            let dest = *args.first().ok_or("SINTERSTORE: missing dest")?;
            let keys: Vec<Vec<u8>> = args[1..].iter().map(|a| a.as_bytes().to_vec()).collect();
            keyspace
                .sinterstore(dest.as_bytes(), &keys)
                .map_err(|e| e.to_string())?;
            Ok(true)
        }
        "PUBLISH" => Ok(false),
        other => Err(format!("unknown command '{other}'")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::now_unix_secs;
    use std::process;

    fn scratch_path(name: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("ferrokv-recovery-{}", process::id()));
        fs::create_dir_all(&dir).unwrap();
        dir.join(name)
    }

    #[test]
    fn replays_basic_writes() {
        let path = scratch_path("basic.aof");
        let ts = now_unix_secs();
        fs::write(
            &path,
            format!("{ts} SET foo bar\n{ts} SADD s a b c\n{ts} DEL foo\n"),
        )
        .unwrap();
        let mut ks = Keyspace::new();
        let applied = replay_aof(&path, &mut ks).unwrap();
        assert_eq!(applied, 3);
        assert_eq!(ks.get(b"foo").unwrap(), None);
        assert_eq!(ks.scard(b"s").unwrap(), 3);
    }

    #[test]
    fn skips_malformed_lines_without_failing_whole_replay() {
        let path = scratch_path("malformed.aof");
        let ts = now_unix_secs();
        fs::write(&path, format!("{ts} SET ok value\nnot a valid line\n{ts} BOGUS x\n")).unwrap();
        let mut ks = Keyspace::new();
        let applied = replay_aof(&path, &mut ks).unwrap();
        assert_eq!(applied, 1);
        assert_eq!(ks.get(b"ok").unwrap(), Some(b"value".to_vec()));
    }

    #[test]
    fn publish_is_a_replay_noop() {
        let path = scratch_path("publish.aof");
        let ts = now_unix_secs();
        fs::write(&path, format!("{ts} PUBLISH ch hello\n")).unwrap();
        let mut ks = Keyspace::new();
        let applied = replay_aof(&path, &mut ks).unwrap();
        assert_eq!(applied, 0);
        assert_eq!(ks.len(), 0);
    }

    #[test]
    fn set_with_ex_anchors_expiry_to_record_timestamp() {
        let path = scratch_path("ttl.aof");
        let ts = now_unix_secs() as i64 - 1000;
        fs::write(&path, format!("{ts} SET foo bar EX 10\n")).unwrap();
        let mut ks = Keyspace::new();
        replay_aof(&path, &mut ks).unwrap();
        // the absolute deadline (ts + 10s) is long past "now"
        assert_eq!(ks.get(b"foo").unwrap(), None);
    }
}
