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

//! Append-only log writer (§4.C).
//!
//! Each record is one text line: `"<unix_ts> <CMD_UPPER> <arg1> <arg2> ...\n"`.
//! The writer is deliberately dumb about command semantics -- it just
//! appends whatever verb+args the dispatcher hands it after a successful
//! write, the way the teacher's own WAL writer in `storage/v1/journal`
//! stays oblivious to the higher-level query language.

use crate::config::AofSyncPolicy;
use crate::util::now_unix_secs;
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

pub struct AofWriter {
    path: PathBuf,
    file: BufWriter<File>,
    sync_policy: AofSyncPolicy,
    last_sync_secs: u64,
    /// set when a flush/fsync fails; cleared (and surfaced once) by
    /// `check_and_clear_error`, per §4.C's "reported at next command
    /// boundary" contract.
    pending_error: Option<String>,
}

impl AofWriter {
    pub fn open(path: &Path, sync_policy: AofSyncPolicy) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(AofWriter {
            path: path.to_owned(),
            file: BufWriter::new(file),
            sync_policy,
            last_sync_secs: now_unix_secs(),
            pending_error: None,
        })
    }

    pub fn set_sync_policy(&mut self, policy: AofSyncPolicy) {
        self.sync_policy = policy;
    }

    /// Append one record. Under `always` this flushes and fsyncs
    /// immediately; other policies just buffer.
    pub fn append(&mut self, verb: &str, args: &[String]) {
        let mut line = format!("{} {}", now_unix_secs(), verb.to_ascii_uppercase());
        for arg in args {
            line.push(' ');
            line.push_str(arg);
        }
        line.push('\n');
        if let Err(e) = self.file.write_all(line.as_bytes()) {
            self.record_error(format!("aof write failed: {e}"));
            return;
        }
        if self.sync_policy == AofSyncPolicy::Always {
            self.flush_and_sync();
        }
    }

    /// Called from the server loop's persistence tick: under `everysec`,
    /// flush+fsync if at least a second has elapsed since the last sync.
    pub fn tick(&mut self) {
        match self.sync_policy {
            AofSyncPolicy::Always | AofSyncPolicy::No => {}
            AofSyncPolicy::Everysec => {
                let now = now_unix_secs();
                if now.saturating_sub(self.last_sync_secs) >= 1 {
                    self.flush_and_sync();
                }
            }
        }
    }

    /// Called on graceful shutdown regardless of policy.
    pub fn sync_on_shutdown(&mut self) {
        self.flush_and_sync();
    }

    fn flush_and_sync(&mut self) {
        if let Err(e) = self.file.flush() {
            self.record_error(format!("aof flush failed: {e}"));
            return;
        }
        if let Err(e) = self.file.get_ref().sync_all() {
            self.record_error(format!("aof fsync failed: {e}"));
            return;
        }
        self.last_sync_secs = now_unix_secs();
    }

    fn record_error(&mut self, msg: String) {
        log::warn!("{msg}");
        self.pending_error = Some(msg);
    }

    /// Returns and clears any pending write/fsync failure, so the caller
    /// (the dispatcher, at the next command boundary) can surface it.
    pub fn check_and_clear_error(&mut self) -> Option<String> {
        self.pending_error.take()
    }

    /// Unix timestamp of the last successful flush+fsync.
    pub fn last_sync_unix(&self) -> u64 {
        self.last_sync_secs
    }

    /// Replace the live file with `new_path` (already written and
    /// fsynced by the rewrite routine) and reopen the writer on it.
    pub fn switch_to(&mut self, new_path: &Path) -> io::Result<()> {
        std::fs::rename(new_path, &self.path)?;
        let file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        self.file = BufWriter::new(file);
        self.last_sync_secs = now_unix_secs();
        Ok(())
    }
}
