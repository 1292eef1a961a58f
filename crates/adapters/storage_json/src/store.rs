//! File-backed implementation of [`ConfigStore`].

use std::fs::{self, File, OpenOptions};
use std::future::Future;
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use nix::fcntl::{Flock, FlockArg};
use pinhub_app::ports::ConfigStore;
use pinhub_domain::error::PinHubError;
use pinhub_domain::pin_config::PinConfig;
use tempfile::NamedTempFile;

use crate::error::StoreError;

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> StoreError {
    let path = path.to_path_buf();
    move |source| StoreError::Io { path, source }
}

/// Configuration stored as pretty-printed JSON at a fixed path.
///
/// Cloning is cheap; clones share nothing but the path, all coordination
/// goes through the lock file.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    /// Create a store for `path`. Nothing is touched until the first call.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".lock");
        self.path.with_file_name(name)
    }

    fn directory(&self) -> &Path {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        }
    }

    fn lock(&self, arg: FlockArg) -> Result<Flock<File>, StoreError> {
        let lock_path = self.lock_path();
        fs::create_dir_all(self.directory()).map_err(io_error(self.directory()))?;
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)
            .map_err(io_error(&lock_path))?;
        Flock::lock(file, arg).map_err(|(_, source)| StoreError::Lock {
            path: lock_path,
            source,
        })
    }

    /// A missing or empty file is an empty configuration.
    fn read(&self) -> Result<PinConfig, StoreError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(PinConfig::default()),
            Err(err) => return Err(io_error(&self.path)(err)),
        };
        if content.trim().is_empty() {
            return Ok(PinConfig::default());
        }
        serde_json::from_str(&content).map_err(|source| StoreError::Parse {
            path: self.path.clone(),
            source,
        })
    }

    fn write(&self, config: &PinConfig) -> Result<(), StoreError> {
        let directory = self.directory();
        let temp = NamedTempFile::new_in(directory).map_err(io_error(directory))?;
        {
            let mut writer = BufWriter::new(temp.as_file());
            serde_json::to_writer_pretty(&mut writer, config).map_err(|source| StoreError::Parse {
                path: temp.path().to_path_buf(),
                source,
            })?;
            writer.write_all(b"\n").map_err(io_error(temp.path()))?;
            writer.flush().map_err(io_error(temp.path()))?;
        }
        temp.as_file().sync_all().map_err(io_error(temp.path()))?;
        temp.persist(&self.path)
            .map_err(|err| io_error(&self.path)(err.error))?;
        Ok(())
    }

    fn load_blocking(&self) -> Result<PinConfig, StoreError> {
        let _guard = self.lock(FlockArg::LockShared)?;
        self.read()
    }

    fn update_blocking<T, F>(&self, change: F) -> Result<T, PinHubError>
    where
        F: FnOnce(&mut PinConfig) -> Result<T, PinHubError>,
    {
        let _guard = self.lock(FlockArg::LockExclusive)?;
        let mut config = self.read()?;
        let value = change(&mut config)?;
        self.write(&config)?;
        tracing::debug!(path = %self.path.display(), "configuration written");
        Ok(value)
    }
}

impl ConfigStore for JsonFileStore {
    fn load(&self) -> impl Future<Output = Result<PinConfig, PinHubError>> + Send {
        let store = self.clone();
        async move {
            let config = tokio::task::spawn_blocking(move || store.load_blocking())
                .await
                .map_err(StoreError::from)??;
            Ok(config)
        }
    }

    fn update<T, F>(&self, change: F) -> impl Future<Output = Result<T, PinHubError>> + Send
    where
        T: Send + 'static,
        F: FnOnce(&mut PinConfig) -> Result<T, PinHubError> + Send + 'static,
    {
        let store = self.clone();
        async move {
            tokio::task::spawn_blocking(move || store.update_blocking(change))
                .await
                .map_err(StoreError::from)?
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use pinhub_domain::device::Device;
    use pinhub_domain::routine::Routine;
    use pinhub_domain::time::now;
    use serde_json::json;

    use super::*;

    fn device(name: &str, pin: i64) -> Device {
        Device::builder().name(name).pin(pin).build().unwrap()
    }

    #[tokio::test]
    async fn should_load_empty_config_when_file_missing() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("pin_config.json"));
        let config = store.load().await.unwrap();
        assert!(config.devices.is_empty());
        assert!(config.routines.is_empty());
    }

    #[tokio::test]
    async fn should_persist_updates_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pin_config.json");
        let store = JsonFileStore::new(&path);
        store
            .update(|config| config.devices.register(device("lamp", 17)))
            .await
            .unwrap();
        store
            .update(|config| {
                let routine = Routine::new("wake", "", vec![json!({"command": "read_all"})], now())?;
                Ok(config.routines.save(routine))
            })
            .await
            .unwrap();

        let reopened = JsonFileStore::new(&path).load().await.unwrap();
        assert_eq!(reopened.devices.get("lamp").map(|d| d.pin), Some(17));
        assert_eq!(reopened.routines.len(), 1);
        assert!(dir.path().join("pin_config.json.lock").exists());
    }

    #[tokio::test]
    async fn should_write_readable_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pin_config.json");
        let store = JsonFileStore::new(&path);
        store
            .update(|config| config.devices.register(device("lamp", 17)))
            .await
            .unwrap();

        let raw: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["devices"]["lamp"]["pin"], 17);
        assert_eq!(raw["devices"]["lamp"]["type"], "output");
    }

    #[tokio::test]
    async fn should_read_file_written_by_hand() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pin_config.json");
        fs::write(
            &path,
            r#"{"devices": {"button": {"pin": 2, "type": "input", "pull_up": true}}}"#,
        )
        .unwrap();
        let config = JsonFileStore::new(&path).load().await.unwrap();
        let button = config.devices.get("button").unwrap();
        assert!(button.pull_up);
        assert!(config.routines.is_empty());
    }

    #[tokio::test]
    async fn should_leave_file_untouched_when_change_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pin_config.json");
        let store = JsonFileStore::new(&path);
        let result = store
            .update(|_config| -> Result<(), PinHubError> {
                Err(PinHubError::BackendUnavailable("test".into()))
            })
            .await;
        assert!(result.is_err());
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn should_report_corrupt_file_as_storage_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pin_config.json");
        fs::write(&path, "{not json").unwrap();
        let err = JsonFileStore::new(&path).load().await.unwrap_err();
        assert!(matches!(err, PinHubError::Storage(_)));
    }

    #[test]
    fn should_not_lose_concurrent_updates() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(JsonFileStore::new(dir.path().join("pin_config.json")));
        let workers: Vec<_> = (0..4)
            .map(|worker| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for i in 0..10 {
                        let pin = worker * 10 + i;
                        store
                            .update_blocking(move |config| {
                                config.devices.register(device(&format!("d{pin}"), pin))
                            })
                            .unwrap();
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }
        assert_eq!(store.load_blocking().unwrap().devices.len(), 40);
    }
}
