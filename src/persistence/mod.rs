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

//! Durability (§4.C, §4.D, §4.E): AOF logging, binary snapshots, and
//! startup recovery, bundled behind one manager the server loop drives
//! from its persistence tick. Mirrors the split the teacher keeps
//! between `storage::v1::journal` (write-ahead log) and
//! `storage::v1::batch_jrnl` (periodic flush) -- one writer for the
//! continuous log, one routine for the point-in-time snapshot.

pub mod aof;
pub mod recovery;
pub mod snapshot;

#[cfg(test)]
mod tests;

use crate::config::Config;
use crate::keyspace::Keyspace;
use aof::AofWriter;
use snapshot::{SnapshotMetadata, SnapshotPayload};
use std::path::PathBuf;

use crate::util::now_unix_secs;

/// Error/latency counters surfaced by `INFO` (§4.E of SPEC_FULL) and by
/// `SAVE`/`BGSAVE` reporting a prior background failure.
#[derive(Debug, Default, Clone)]
pub struct PersistenceStats {
    pub commands_processed: u64,
    pub last_aof_error: Option<String>,
    pub last_snapshot_error: Option<String>,
    pub last_save_unix: Option<u64>,
    pub last_sync_policy_applied: u64,
}

pub struct PersistenceManager {
    aof: Option<AofWriter>,
    aof_enabled: bool,
    rdb_enabled: bool,
    rdb_path: PathBuf,
    temp_dir: PathBuf,
    rdb_compression: bool,
    rdb_checksum: bool,
    save_conditions: Vec<(u64, u64)>,
    last_save_unix: u64,
    stats: PersistenceStats,
}

impl PersistenceManager {
    pub fn new(config: &Config) -> std::io::Result<Self> {
        let aof = if config.persistence_enabled && config.aof_enabled {
            Some(AofWriter::open(&config.aof_path(), config.aof_sync_policy)?)
        } else {
            None
        };
        Ok(PersistenceManager {
            aof,
            aof_enabled: config.persistence_enabled && config.aof_enabled,
            rdb_enabled: config.persistence_enabled && config.rdb_enabled,
            rdb_path: config.rdb_path(),
            temp_dir: PathBuf::from(&config.temp_dir),
            rdb_compression: config.rdb_compression,
            rdb_checksum: config.rdb_checksum,
            save_conditions: config.rdb_save_conditions.clone(),
            last_save_unix: now_unix_secs(),
            stats: PersistenceStats::default(),
        })
    }

    pub fn stats(&self) -> &PersistenceStats {
        &self.stats
    }

    pub fn last_save_unix(&self) -> u64 {
        self.last_save_unix
    }

    /// Called by the dispatcher for every executed command, write or not,
    /// so `INFO`'s stats section can report a running total.
    pub fn note_command(&mut self) {
        self.stats.commands_processed += 1;
    }

    /// Called by the dispatcher after a write-set command completes
    /// successfully (§4.G step 5). No-op if AOF logging is disabled.
    pub fn log_write(&mut self, verb: &str, args: &[String]) {
        if let Some(aof) = self.aof.as_mut() {
            aof.append(verb, args);
        }
        self.sync_stats_from_aof();
    }

    /// Mirrors the AOF writer's last real fsync timestamp into `stats` so
    /// `INFO`'s `aof_last_sync_time` reflects it rather than staying zero.
    fn sync_stats_from_aof(&mut self) {
        if let Some(aof) = self.aof.as_ref() {
            self.stats.last_sync_policy_applied = aof.last_sync_unix();
        }
    }

    /// A failed AOF fsync/write is surfaced once, at the next command
    /// boundary (§4.C), rather than silently swallowed.
    pub fn take_pending_aof_error(&mut self) -> Option<String> {
        let err = self.aof.as_mut().and_then(|a| a.check_and_clear_error());
        if let Some(e) = &err {
            self.stats.last_aof_error = Some(e.clone());
        }
        err
    }

    /// Driven by the server loop's persistence tick (§4.H step 6): AOF
    /// fsync-policy evaluation, then auto-save condition evaluation.
    pub fn tick(&mut self, keyspace: &mut Keyspace) {
        if let Some(aof) = self.aof.as_mut() {
            aof.tick();
        }
        self.sync_stats_from_aof();
        if self.rdb_enabled && self.should_autosave(keyspace) {
            if let Err(e) = self.save(keyspace) {
                log::warn!("background snapshot failed: {e}");
                self.stats.last_snapshot_error = Some(e.to_string());
            }
        }
    }

    fn should_autosave(&self, keyspace: &Keyspace) -> bool {
        let elapsed = now_unix_secs().saturating_sub(self.last_save_unix);
        let changes = keyspace.changes_since_save;
        self.save_conditions
            .iter()
            .any(|(secs, min_changes)| elapsed >= *secs && changes >= *min_changes)
    }

    /// `SAVE`/`BGSAVE`/auto-save: materialize the live keyspace and write
    /// it out. The distinction between foreground `SAVE` and background
    /// `BGSAVE` is, per §5, that the materialized view is always taken
    /// synchronously -- the only difference worth making here is that the
    /// caller can choose not to block on the write by not calling this
    /// inline, which the server loop's worker-thread story (§5) covers;
    /// this manager always does the write itself since it's already
    /// bounded and synchronous on the single keyspace thread.
    pub fn save(&mut self, keyspace: &mut Keyspace) -> Result<(), snapshot::SnapshotError> {
        let keys = keyspace.live_entries();
        let payload = SnapshotPayload {
            metadata: SnapshotMetadata {
                saved_at_unix: now_unix_secs(),
                key_count: keys.len(),
            },
            keys,
        };
        let temp_path = self.temp_dir.join(format!("temp-{}.rdb", std::process::id()));
        snapshot::save(&payload, &self.rdb_path, &temp_path, self.rdb_compression, self.rdb_checksum)?;
        self.last_save_unix = now_unix_secs();
        self.stats.last_save_unix = Some(self.last_save_unix);
        self.stats.last_snapshot_error = None;
        keyspace.changes_since_save = 0;
        Ok(())
    }

    /// `BGREWRITEAOF` (§4.C): serialize the live keyspace as a minimal
    /// sequence of write commands into a temp file, then swap it in for
    /// the live AOF.
    pub fn rewrite_aof(&mut self, keyspace: &Keyspace) -> std::io::Result<()> {
        if !self.aof_enabled {
            return Ok(());
        }
        let temp_path = self.temp_dir.join(format!("temp-rewrite-{}.aof", std::process::id()));
        let mut lines = String::new();
        let now = now_unix_secs();
        for (key, entry) in keyspace.live_entries() {
            let key_str = String::from_utf8_lossy(&key);
            match &entry.value {
                crate::keyspace::Value::Str(v) => {
                    lines.push_str(&format!("{now} SET {key_str} {}\n", String::from_utf8_lossy(v)));
                }
                crate::keyspace::Value::List(items) => {
                    let rendered: Vec<String> =
                        items.iter().map(|i| String::from_utf8_lossy(i).into_owned()).collect();
                    if !rendered.is_empty() {
                        lines.push_str(&format!("{now} RPUSH {key_str} {}\n", rendered.join(" ")));
                    }
                }
                crate::keyspace::Value::Hash(map) => {
                    let rendered: Vec<String> = map
                        .iter()
                        .flat_map(|(f, v)| {
                            vec![String::from_utf8_lossy(f).into_owned(), String::from_utf8_lossy(v).into_owned()]
                        })
                        .collect();
                    if !rendered.is_empty() {
                        lines.push_str(&format!("{now} HSET {key_str} {}\n", rendered.join(" ")));
                    }
                }
                crate::keyspace::Value::Set(members) => {
                    let rendered: Vec<String> =
                        members.iter().map(|m| String::from_utf8_lossy(m).into_owned()).collect();
                    if !rendered.is_empty() {
                        lines.push_str(&format!("{now} SADD {key_str} {}\n", rendered.join(" ")));
                    }
                }
            }
            if let Some(expiry_ms) = entry.expiry_at {
                lines.push_str(&format!("{now} EXPIREAT {key_str} {}\n", expiry_ms / 1000));
            }
        }

        if let Some(parent) = temp_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&temp_path, lines.as_bytes())?;
        if let Some(aof) = self.aof.as_mut() {
            aof.switch_to(&temp_path)?;
        }
        Ok(())
    }

    pub fn sync_on_shutdown(&mut self) {
        if let Some(aof) = self.aof.as_mut() {
            aof.sync_on_shutdown();
        }
        self.sync_stats_from_aof();
    }
}
