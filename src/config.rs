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

//! # Configuration
//!
//! A validated options bundle consumed by the persistence subsystem and
//! recovery (§4.C, §4.D, §4.E). Loaded from an optional YAML file layered
//! over defaults, the way the teacher crate's `config` module loads
//! `serde_yaml`-backed configuration files -- but ferrokv skips the
//! teacher's CLI-flag/env-var cascade, since driving that cascade is a
//! collaborator out of this crate's core scope (§1).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};

const DEFAULT_HOST: IpAddr = IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1));
const DEFAULT_PORT: u16 = 6379;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AofSyncPolicy {
    Always,
    Everysec,
    No,
}

impl fmt::Display for AofSyncPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AofSyncPolicy::Always => "always",
            AofSyncPolicy::Everysec => "everysec",
            AofSyncPolicy::No => "no",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub host: IpAddr,
    pub port: u16,

    pub persistence_enabled: bool,
    pub recovery_on_startup: bool,

    pub aof_enabled: bool,
    pub aof_filename: String,
    pub aof_sync_policy: AofSyncPolicy,

    pub rdb_enabled: bool,
    pub rdb_filename: String,
    pub rdb_compression: bool,
    pub rdb_checksum: bool,
    pub rdb_save_conditions: Vec<(u64, u64)>,

    pub data_dir: String,
    pub temp_dir: String,

    pub max_memory_usage: u64,

    /// how often (ms) the server loop runs sampled expiration
    pub cleanup_interval_ms: u64,
    /// how often (ms) the server loop evaluates fsync/auto-save
    pub persistence_interval_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            host: DEFAULT_HOST,
            port: DEFAULT_PORT,
            persistence_enabled: true,
            recovery_on_startup: true,
            aof_enabled: true,
            aof_filename: "appendonly.aof".to_owned(),
            aof_sync_policy: AofSyncPolicy::Everysec,
            rdb_enabled: true,
            rdb_filename: "dump.rdb".to_owned(),
            rdb_compression: true,
            rdb_checksum: true,
            rdb_save_conditions: vec![(900, 1), (300, 10), (60, 10_000)],
            data_dir: "./data".to_owned(),
            temp_dir: "./data/temp".to_owned(),
            max_memory_usage: 100 * 1024 * 1024,
            cleanup_interval_ms: 100,
            persistence_interval_ms: 100,
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Parse(String),
    Invalid(String),
    Io(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Parse(e) => write!(f, "failed to parse configuration: {e}"),
            ConfigError::Invalid(e) => write!(f, "invalid configuration: {e}"),
            ConfigError::Io(e) => write!(f, "failed to read configuration: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl Config {
    /// Load from an optional YAML file, falling back to defaults for
    /// anything the file doesn't set, then validate and create
    /// `data_dir`/`temp_dir` if they don't exist yet.
    pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
        let cfg = match path {
            None => Config::default(),
            Some(path) => {
                let text = fs::read_to_string(path)
                    .map_err(|e| ConfigError::Io(format!("{}: {e}", path.display())))?;
                serde_yaml::from_str(&text).map_err(|e| ConfigError::Parse(e.to_string()))?
            }
        };
        cfg.validate()?;
        cfg.ensure_directories()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.rdb_filename.trim().is_empty() {
            return Err(ConfigError::Invalid("rdb_filename cannot be empty".into()));
        }
        if self.aof_filename.trim().is_empty() {
            return Err(ConfigError::Invalid("aof_filename cannot be empty".into()));
        }
        for (secs, changes) in &self.rdb_save_conditions {
            if *secs == 0 && *changes == 0 {
                return Err(ConfigError::Invalid(
                    "rdb save conditions must require at least one change or elapsed second"
                        .into(),
                ));
            }
        }
        Ok(())
    }

    fn ensure_directories(&self) -> Result<(), ConfigError> {
        fs::create_dir_all(&self.data_dir)
            .map_err(|e| ConfigError::Io(format!("data_dir {}: {e}", self.data_dir)))?;
        fs::create_dir_all(&self.temp_dir)
            .map_err(|e| ConfigError::Io(format!("temp_dir {}: {e}", self.temp_dir)))?;
        Ok(())
    }

    pub fn aof_path(&self) -> PathBuf {
        Path::new(&self.data_dir).join(&self.aof_filename)
    }

    pub fn rdb_path(&self) -> PathBuf {
        Path::new(&self.data_dir).join(&self.rdb_filename)
    }

    pub fn rdb_temp_path(&self, disambiguator: u64) -> PathBuf {
        Path::new(&self.temp_dir).join(format!("temp-{disambiguator}.rdb"))
    }

    pub fn aof_temp_path(&self, disambiguator: u64) -> PathBuf {
        Path::new(&self.temp_dir).join(format!("temp-rewrite-{disambiguator}.aof"))
    }

    /// `CONFIG GET <param>`: only the parameters named in §4.G are exposed.
    pub fn get_param(&self, name: &str) -> Option<String> {
        match name.to_ascii_lowercase().as_str() {
            "aof_enabled" => Some(self.aof_enabled.to_string()),
            "aof_sync_policy" => Some(self.aof_sync_policy.to_string()),
            "rdb_enabled" => Some(self.rdb_enabled.to_string()),
            "rdb_compression" => Some(self.rdb_compression.to_string()),
            "rdb_checksum" => Some(self.rdb_checksum.to_string()),
            "persistence_enabled" => Some(self.persistence_enabled.to_string()),
            "recovery_on_startup" => Some(self.recovery_on_startup.to_string()),
            "max_memory_usage" => Some(self.max_memory_usage.to_string()),
            _ => None,
        }
    }

    /// `CONFIG SET <param> <value>`: only boolean-like and integer
    /// parameters may be mutated at runtime, per §4.G.
    pub fn set_param(&mut self, name: &str, value: &str) -> Result<(), &'static str> {
        match name.to_ascii_lowercase().as_str() {
            "aof_enabled" => self.aof_enabled = parse_bool(value)?,
            "rdb_enabled" => self.rdb_enabled = parse_bool(value)?,
            "rdb_compression" => self.rdb_compression = parse_bool(value)?,
            "rdb_checksum" => self.rdb_checksum = parse_bool(value)?,
            "persistence_enabled" => self.persistence_enabled = parse_bool(value)?,
            "recovery_on_startup" => self.recovery_on_startup = parse_bool(value)?,
            "max_memory_usage" => {
                self.max_memory_usage = value.parse().map_err(|_| "not an integer")?
            }
            _ => return Err("unknown or read-only parameter"),
        }
        Ok(())
    }
}

fn parse_bool(value: &str) -> Result<bool, &'static str> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err("not a boolean"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let cfg = Config::default();
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn rejects_empty_rdb_filename() {
        let mut cfg = Config::default();
        cfg.rdb_filename = "".into();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn config_set_get_roundtrip() {
        let mut cfg = Config::default();
        cfg.set_param("aof_enabled", "false").unwrap();
        assert_eq!(cfg.get_param("aof_enabled"), Some("false".to_owned()));
        assert!(cfg.set_param("port", "1234").is_err());
    }
}
