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
use std::process;

fn scratch_config(name: &str) -> Config {
    let base = std::env::temp_dir().join(format!("ferrokv-pm-{name}-{}", process::id()));
    let mut cfg = Config::default();
    cfg.data_dir = base.join("data").to_string_lossy().into_owned();
    cfg.temp_dir = base.join("temp").to_string_lossy().into_owned();
    std::fs::create_dir_all(&cfg.data_dir).unwrap();
    std::fs::create_dir_all(&cfg.temp_dir).unwrap();
    cfg
}

#[test]
fn log_write_appends_and_reload_reads_it_back() {
    let cfg = scratch_config("logwrite");
    let mut pm = PersistenceManager::new(&cfg).unwrap();
    pm.log_write("SET", &["foo".to_owned(), "bar".to_owned()]);
    pm.sync_on_shutdown();

    let mut ks = Keyspace::new();
    let source = recovery::recover(&cfg, &mut ks);
    assert_eq!(source, recovery::RecoverySource::Aof);
    assert_eq!(ks.get(b"foo").unwrap(), Some(b"bar".to_vec()));
}

#[test]
fn save_then_recover_falls_back_to_snapshot_without_aof() {
    let mut cfg = scratch_config("savepath");
    cfg.aof_enabled = false;
    let mut pm = PersistenceManager::new(&cfg).unwrap();
    let mut ks = Keyspace::new();
    ks.set(b"k", b"v".to_vec(), None);
    pm.save(&mut ks).unwrap();
    assert_eq!(ks.changes_since_save, 0);

    let mut ks2 = Keyspace::new();
    let source = recovery::recover(&cfg, &mut ks2);
    assert_eq!(source, recovery::RecoverySource::Snapshot);
    assert_eq!(ks2.get(b"k").unwrap(), Some(b"v".to_vec()));
}

#[test]
fn autosave_triggers_when_change_threshold_met() {
    let mut cfg = scratch_config("autosave");
    cfg.aof_enabled = false;
    cfg.rdb_save_conditions = vec![(0, 1)];
    let mut pm = PersistenceManager::new(&cfg).unwrap();
    let mut ks = Keyspace::new();
    ks.set(b"k", b"v".to_vec(), None);
    assert!(ks.changes_since_save > 0);
    pm.tick(&mut ks);
    assert_eq!(ks.changes_since_save, 0);
    assert!(cfg.rdb_path().exists());
}

#[test]
fn rewrite_aof_replaces_log_with_minimal_form() {
    let cfg = scratch_config("rewrite");
    let mut pm = PersistenceManager::new(&cfg).unwrap();
    let mut ks = Keyspace::new();
    ks.set(b"k1", b"v1".to_vec(), None);
    ks.sadd(b"s", vec![b"a".to_vec(), b"b".to_vec()]).unwrap();
    pm.log_write("SET", &["k1".to_owned(), "v1".to_owned()]);
    pm.log_write("SET", &["k2".to_owned(), "v2".to_owned()]);
    pm.log_write("DEL", &["k2".to_owned()]);
    ks.delete(&[b"k2".to_vec()]);

    pm.rewrite_aof(&ks).unwrap();
    pm.sync_on_shutdown();

    let mut ks2 = Keyspace::new();
    let applied = recovery::replay_aof(&cfg.aof_path(), &mut ks2).unwrap();
    assert!(applied >= 1);
    assert_eq!(ks2.get(b"k1").unwrap(), Some(b"v1".to_vec()));
    assert_eq!(ks2.get(b"k2").unwrap(), None);
    assert_eq!(ks2.scard(b"s").unwrap(), 2);
}

#[test]
fn note_command_feeds_stats() {
    let cfg = scratch_config("stats");
    let mut pm = PersistenceManager::new(&cfg).unwrap();
    pm.note_command();
    pm.note_command();
    assert_eq!(pm.stats().commands_processed, 2);
}
