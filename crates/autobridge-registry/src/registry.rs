//! File-backed instance registry.

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use autobridge_config::RegistryConfig;
use chrono::{Duration, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::RegistryError;
use crate::record::InstanceRecord;

/// Registry contents keyed by instance id.
pub type RegistryTable = BTreeMap<String, InstanceRecord>;

/// Shared registry of bridge instances on this host.
#[derive(Debug, Clone)]
pub struct InstanceRegistry {
    path: PathBuf,
    stale_after: Duration,
}

impl InstanceRegistry {
    /// Create a registry backed by the file at `path`.
    pub fn new<P: AsRef<Path>>(path: P, stale_after: std::time::Duration) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            stale_after: Duration::from_std(stale_after).unwrap_or(Duration::seconds(30)),
        }
    }

    pub fn from_config(config: &RegistryConfig) -> Self {
        Self::new(
            config.resolved_path(),
            std::time::Duration::from_secs(config.stale_after_secs),
        )
    }

    /// Get the registry file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".lock");
        self.path.with_file_name(name)
    }

    /// Fresh identifier for a new instance.
    pub fn generate_instance_id() -> String {
        Uuid::new_v4().to_string()
    }

    /// Insert or replace `id`'s record.
    ///
    /// Fails if a different live instance already holds the same port.
    pub fn register_instance(&self, id: &str, record: InstanceRecord) -> Result<(), RegistryError> {
        let now = Utc::now();
        let stale_after = self.stale_after;
        self.update(|table| {
            let owner = table
                .iter()
                .find(|(other, r)| *other != id && r.port == record.port && r.is_live(now, stale_after))
                .map(|(other, _)| other.clone());
            if let Some(owner) = owner {
                return Err(RegistryError::PortInUse {
                    port: record.port,
                    owner,
                });
            }

            info!(
                "Registered instance {} ({}) on port {}",
                id, record.agent_name, record.port
            );
            table.insert(id.to_string(), record);
            Ok(())
        })
    }

    /// Port previously recorded for `id`.
    pub fn get_port(&self, id: &str) -> Result<Option<u16>, RegistryError> {
        Ok(self.get(id)?.map(|r| r.port))
    }

    pub fn get(&self, id: &str) -> Result<Option<InstanceRecord>, RegistryError> {
        Ok(self.read()?.remove(id))
    }

    /// Drop `id`'s record. Returns whether it existed.
    pub fn remove_instance(&self, id: &str) -> Result<bool, RegistryError> {
        let removed = self.update(|table| Ok(table.remove(id).is_some()))?;
        if removed {
            info!("Removed instance {} from registry", id);
        }
        Ok(removed)
    }

    /// Refresh `id`'s last-seen time. Returns `false` if it is not registered.
    pub fn touch(&self, id: &str) -> Result<bool, RegistryError> {
        self.update(|table| match table.get_mut(id) {
            Some(record) => {
                record.last_seen = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        })
    }

    /// Drop records whose process is gone or whose last-seen time is too old.
    ///
    /// Returns the removed ids.
    pub fn cleanup_stale_entries(&self) -> Result<Vec<String>, RegistryError> {
        let now = Utc::now();
        let stale_after = self.stale_after;
        let removed = self.update(|table| {
            let stale: Vec<String> = table
                .iter()
                .filter(|(_, r)| !r.is_live(now, stale_after))
                .map(|(id, _)| id.clone())
                .collect();
            for id in &stale {
                table.remove(id);
            }
            Ok(stale)
        })?;

        if !removed.is_empty() {
            info!("Removed {} stale registry entries", removed.len());
        }
        Ok(removed)
    }

    /// Whole table, live or not.
    pub fn list(&self) -> Result<RegistryTable, RegistryError> {
        self.read()
    }

    /// Live records only.
    pub fn live(&self) -> Result<RegistryTable, RegistryError> {
        let now = Utc::now();
        Ok(self
            .read()?
            .into_iter()
            .filter(|(_, r)| r.is_live(now, self.stale_after))
            .collect())
    }

    /// Whether a live instance other than `except` holds `port`.
    pub fn is_port_claimed(&self, port: u16, except: &str) -> Result<bool, RegistryError> {
        Ok(self.live()?.iter().any(|(id, r)| id != except && r.port == port))
    }

    fn read(&self) -> Result<RegistryTable, RegistryError> {
        let _lock = self.lock()?;
        self.load()
    }

    fn update<R, F>(&self, f: F) -> Result<R, RegistryError>
    where
        F: FnOnce(&mut RegistryTable) -> Result<R, RegistryError>,
    {
        let _lock = self.lock()?;
        let mut table = self.load()?;
        let before = table.clone();
        let result = f(&mut table)?;
        if table != before {
            self.store(&table)?;
        }
        Ok(result)
    }

    fn load(&self) -> Result<RegistryTable, RegistryError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(RegistryTable::new()),
            Err(e) => return Err(e.into()),
        };
        if contents.trim().is_empty() {
            return Ok(RegistryTable::new());
        }

        match serde_json::from_str(&contents) {
            Ok(table) => Ok(table),
            Err(e) => {
                let aside = self.quarantine()?;
                warn!(
                    "Unreadable registry {} moved to {}: {}",
                    self.path.display(),
                    aside.display(),
                    e
                );
                Ok(RegistryTable::new())
            }
        }
    }

    /// Move an unparsable registry file out of the way, keeping its bytes.
    fn quarantine(&self) -> Result<PathBuf, RegistryError> {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(format!(".corrupt-{}", Utc::now().format("%Y%m%dT%H%M%S%.3fZ")));
        let aside = self.path.with_file_name(name);
        fs::rename(&self.path, &aside)?;
        Ok(aside)
    }

    fn store(&self, table: &RegistryTable) -> Result<(), RegistryError> {
        let mut tmp_name = self.path.file_name().unwrap_or_default().to_os_string();
        tmp_name.push(format!(".tmp-{}", std::process::id()));
        let tmp_path = self.path.with_file_name(tmp_name);

        let json = serde_json::to_string_pretty(table)?;
        {
            let mut file = File::create(&tmp_path)?;
            file.write_all(json.as_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&tmp_path, &self.path)?;
        debug!("Wrote {} registry entries", table.len());
        Ok(())
    }

    fn lock(&self) -> Result<RegistryLock, RegistryError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let lock_path = self.lock_path();
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)?;
        RegistryLock::acquire(file, &lock_path)
    }
}

/// Exclusive lock on the registry's sibling lock file, released on drop.
#[cfg(unix)]
struct RegistryLock(#[allow(dead_code)] nix::fcntl::Flock<File>);

#[cfg(unix)]
impl RegistryLock {
    fn acquire(file: File, path: &Path) -> Result<Self, RegistryError> {
        use nix::fcntl::{Flock, FlockArg};

        Flock::lock(file, FlockArg::LockExclusive)
            .map(RegistryLock)
            .map_err(|(_, errno)| RegistryError::Lock {
                path: path.to_path_buf(),
                reason: errno.to_string(),
            })
    }
}

#[cfg(not(unix))]
struct RegistryLock(#[allow(dead_code)] File);

#[cfg(not(unix))]
impl RegistryLock {
    fn acquire(file: File, _path: &Path) -> Result<Self, RegistryError> {
        Ok(RegistryLock(file))
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
