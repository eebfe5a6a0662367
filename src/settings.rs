//! Settings persistence
//!
//! The host keeps one JSON record per extension namespace. [`SettingsStore`]
//! is the seam to that storage; [`DebouncedStore`] coalesces bursts of saves
//! on a background worker the same way the host's own debounced save does.
//! [`Settings`] ties a store to the typed [`SnapConfig`].

use crate::config::{SettingsEdit, SnapConfig};
use crate::{Error, Result};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

/// Namespace under which the configuration record is stored.
pub const SETTINGS_NAMESPACE: &str = "chatsnap";

/// Default debounce window for [`DebouncedStore`].
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);

/// Read/write access to namespaced settings records.
pub trait SettingsStore: Send + Sync {
    /// Load the record for `namespace`, `None` when nothing was stored yet.
    fn load(&self, namespace: &str) -> Result<Option<Value>>;

    /// Persist the record for `namespace`.
    fn save(&self, namespace: &str, record: &Value) -> Result<()>;
}

/// In-memory store, used by tests and as a scratch store.
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<String, Value>>,
    writes: Mutex<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `save` calls that reached this store.
    pub fn write_count(&self) -> usize {
        self.writes.lock().map(|g| *g).unwrap_or(0)
    }
}

impl SettingsStore for MemoryStore {
    fn load(&self, namespace: &str) -> Result<Option<Value>> {
        let records = self
            .records
            .lock()
            .map_err(|_| Error::Other("settings store poisoned".into()))?;
        Ok(records.get(namespace).cloned())
    }

    fn save(&self, namespace: &str, record: &Value) -> Result<()> {
        let mut records = self
            .records
            .lock()
            .map_err(|_| Error::Other("settings store poisoned".into()))?;
        records.insert(namespace.to_string(), record.clone());
        if let Ok(mut w) = self.writes.lock() {
            *w += 1;
        }
        Ok(())
    }
}

/// A JSON file holding one object per namespace.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<Map<String, Value>> {
        if !self.path.exists() {
            return Ok(Map::new());
        }
        let text = std::fs::read_to_string(&self.path)?;
        if text.trim().is_empty() {
            return Ok(Map::new());
        }
        match serde_json::from_str::<Value>(&text)? {
            Value::Object(map) => Ok(map),
            _ => Err(Error::ConfigError(format!(
                "{} does not contain a JSON object",
                self.path.display()
            ))),
        }
    }
}

impl SettingsStore for JsonFileStore {
    fn load(&self, namespace: &str) -> Result<Option<Value>> {
        Ok(self.read_all()?.remove(namespace))
    }

    fn save(&self, namespace: &str, record: &Value) -> Result<()> {
        let mut all = self.read_all()?;
        all.insert(namespace.to_string(), record.clone());
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let text = serde_json::to_string_pretty(&Value::Object(all))?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, text)?;
        std::fs::rename(&tmp, &self.path)?;
        log::debug!("settings written to {}", self.path.display());
        Ok(())
    }
}

enum Command {
    Save(String, Value),
    Flush(mpsc::Sender<Result<()>>),
}

/// Wraps a store so that rapid consecutive saves collapse into one write.
///
/// Saves are handed to a worker thread which writes the latest record per
/// namespace once no new save arrived for the debounce window. Loads see
/// pending records immediately; a record whose write failed is forgotten, so
/// loads report the inner store again. Dropping the store flushes pending
/// writes.
pub struct DebouncedStore {
    cmd_tx: Option<Sender<Command>>,
    handle: Option<thread::JoinHandle<()>>,
    inner: Arc<dyn SettingsStore>,
    latest: Arc<Mutex<HashMap<String, Value>>>,
}

impl DebouncedStore {
    pub fn new(inner: Arc<dyn SettingsStore>, window: Duration) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel::<Command>();
        let worker_store = inner.clone();
        let latest = Arc::new(Mutex::new(HashMap::new()));
        let worker_latest: Arc<Mutex<HashMap<String, Value>>> = Arc::clone(&latest);

        let handle = thread::spawn(move || {
            let mut pending: HashMap<String, Value> = HashMap::new();

            let write_pending = |pending: &mut HashMap<String, Value>| -> Result<()> {
                let mut first_err = None;
                for (ns, record) in pending.drain() {
                    if let Err(e) = worker_store.save(&ns, &record) {
                        log::warn!("debounced settings write for {} failed: {}", ns, e);
                        // Loads fall back to what the inner store really holds,
                        // unless a newer save already replaced the record.
                        if let Ok(mut latest) = worker_latest.lock() {
                            if latest.get(&ns) == Some(&record) {
                                latest.remove(&ns);
                            }
                        }
                        first_err.get_or_insert(e);
                    }
                }
                match first_err {
                    Some(e) => Err(e),
                    None => Ok(()),
                }
            };

            loop {
                let next = if pending.is_empty() {
                    cmd_rx.recv().map_err(|_| RecvTimeoutError::Disconnected)
                } else {
                    cmd_rx.recv_timeout(window)
                };
                match next {
                    Ok(Command::Save(ns, record)) => {
                        pending.insert(ns, record);
                    }
                    Ok(Command::Flush(resp)) => {
                        let _ = resp.send(write_pending(&mut pending));
                    }
                    Err(RecvTimeoutError::Timeout) => {
                        let _ = write_pending(&mut pending);
                    }
                    Err(RecvTimeoutError::Disconnected) => {
                        let _ = write_pending(&mut pending);
                        break;
                    }
                }
            }
        });

        Self {
            cmd_tx: Some(cmd_tx),
            handle: Some(handle),
            inner,
            latest,
        }
    }

    /// Write every pending record now.
    pub fn flush(&self) -> Result<()> {
        let tx = self
            .cmd_tx
            .as_ref()
            .ok_or_else(|| Error::Other("settings worker stopped".into()))?;
        let (resp_tx, resp_rx) = mpsc::channel();
        tx.send(Command::Flush(resp_tx))
            .map_err(|_| Error::Other("settings worker stopped".into()))?;
        resp_rx
            .recv()
            .map_err(|e| Error::Other(format!("Flush canceled: {}", e)))?
    }
}

impl SettingsStore for DebouncedStore {
    fn load(&self, namespace: &str) -> Result<Option<Value>> {
        if let Ok(latest) = self.latest.lock() {
            if let Some(v) = latest.get(namespace) {
                return Ok(Some(v.clone()));
            }
        }
        self.inner.load(namespace)
    }

    fn save(&self, namespace: &str, record: &Value) -> Result<()> {
        if let Ok(mut latest) = self.latest.lock() {
            latest.insert(namespace.to_string(), record.clone());
        }
        let tx = self
            .cmd_tx
            .as_ref()
            .ok_or_else(|| Error::Other("settings worker stopped".into()))?;
        tx.send(Command::Save(namespace.to_string(), record.clone()))
            .map_err(|_| Error::Other("settings worker stopped".into()))
    }
}

impl Drop for DebouncedStore {
    fn drop(&mut self) {
        // Closing the channel makes the worker write what is pending and exit.
        drop(self.cmd_tx.take());
        if let Some(h) = self.handle.take() {
            let _ = h.join();
        }
    }
}

/// Typed access to the stored configuration.
pub struct Settings<S: SettingsStore> {
    store: S,
    namespace: String,
}

impl<S: SettingsStore> Settings<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            namespace: SETTINGS_NAMESPACE.to_string(),
        }
    }

    pub fn with_namespace(store: S, namespace: impl Into<String>) -> Self {
        Self {
            store,
            namespace: namespace.into(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Load the stored record merged over the defaults.
    pub fn load(&self) -> Result<SnapConfig> {
        let stored = self.store.load(&self.namespace)?;
        let (cfg, _) = SnapConfig::merge_stored(stored.as_ref())?;
        Ok(cfg)
    }

    /// Persist `cfg`, keeping keys of the stored record this version does not know.
    pub fn save(&self, cfg: &SnapConfig) -> Result<()> {
        let stored = self.store.load(&self.namespace)?;
        let mut record = match stored {
            Some(Value::Object(map)) => map,
            _ => Map::new(),
        };
        if let Value::Object(fields) = serde_json::to_value(cfg)? {
            for (k, v) in fields {
                record.insert(k, v);
            }
        }
        if cfg.font_file.is_none() {
            record.remove("fontFile");
        }
        self.store.save(&self.namespace, &Value::Object(record))
    }

    /// Apply a settings-form edit and persist the result.
    pub fn edit(&self, edit: &SettingsEdit) -> Result<SnapConfig> {
        let current = self.load()?;
        let next = edit.apply(&current)?;
        self.save(&next)?;
        Ok(next)
    }

    /// Restore a fresh copy of the defaults.
    pub fn reset(&self) -> Result<SnapConfig> {
        let defaults = SnapConfig::default();
        self.save(&defaults)?;
        Ok(defaults)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn temp_path(name: &str) -> PathBuf {
        let mut p = std::env::temp_dir();
        p.push(format!("chatsnap-settings-{}-{}.json", name, std::process::id()));
        p
    }

    #[test]
    fn memory_store_roundtrip() {
        let s = MemoryStore::new();
        assert!(s.load("a").unwrap().is_none());
        s.save("a", &json!({"x": 1})).unwrap();
        assert_eq!(s.load("a").unwrap(), Some(json!({"x": 1})));
        assert_eq!(s.write_count(), 1);
    }

    #[test]
    fn json_file_store_keeps_other_namespaces() {
        let path = temp_path("namespaces");
        let _ = std::fs::remove_file(&path);
        let store = JsonFileStore::new(&path);
        store.save("other", &json!({"keep": true})).unwrap();
        store.save("chatsnap", &json!({"MAX": 100})).unwrap();
        assert_eq!(store.load("other").unwrap(), Some(json!({"keep": true})));
        assert_eq!(store.load("chatsnap").unwrap(), Some(json!({"MAX": 100})));
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn debounced_store_coalesces_bursts() {
        let inner = Arc::new(MemoryStore::new());
        let store = DebouncedStore::new(inner.clone(), Duration::from_millis(200));
        for i in 0..10 {
            store.save("ns", &json!({ "n": i })).unwrap();
        }
        // Reads see the pending value before it is written.
        assert_eq!(store.load("ns").unwrap(), Some(json!({"n": 9})));
        store.flush().unwrap();
        assert_eq!(inner.write_count(), 1);
        assert_eq!(inner.load("ns").unwrap(), Some(json!({"n": 9})));
    }

    #[test]
    fn debounced_store_writes_on_drop() {
        let inner = Arc::new(MemoryStore::new());
        {
            let store = DebouncedStore::new(inner.clone(), Duration::from_secs(60));
            store.save("ns", &json!({"v": 1})).unwrap();
        }
        assert_eq!(inner.load("ns").unwrap(), Some(json!({"v": 1})));
    }

    struct FailingStore;

    impl SettingsStore for FailingStore {
        fn load(&self, _namespace: &str) -> Result<Option<Value>> {
            Ok(None)
        }

        fn save(&self, namespace: &str, _record: &Value) -> Result<()> {
            Err(Error::Other(format!("{} is read-only", namespace)))
        }
    }

    #[test]
    fn failed_flush_is_not_reported_as_saved() {
        let store = DebouncedStore::new(Arc::new(FailingStore), Duration::from_secs(60));
        store.save("ns", &json!({"v": 1})).unwrap();
        assert_eq!(store.load("ns").unwrap(), Some(json!({"v": 1})));
        assert!(store.flush().is_err());
        assert_eq!(store.load("ns").unwrap(), None);
    }

    #[test]
    fn failed_timed_write_is_forgotten() {
        let store = DebouncedStore::new(Arc::new(FailingStore), Duration::from_millis(20));
        store.save("ns", &json!({"v": 2})).unwrap();
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while store.load("ns").unwrap().is_some() {
            assert!(std::time::Instant::now() < deadline, "write never attempted");
            thread::sleep(Duration::from_millis(10));
        }
        // nothing is left pending after the failure
        assert!(store.flush().is_ok());
    }

    #[test]
    fn debounced_file_settings_persist_edits() {
        let path = temp_path("debounced-file");
        let _ = std::fs::remove_file(&path);
        let settings = Settings::new(DebouncedStore::new(
            Arc::new(JsonFileStore::new(&path)),
            DEFAULT_DEBOUNCE,
        ));
        let edit = SettingsEdit {
            max_segment_height: Some(2048),
            ..SettingsEdit::default()
        };
        settings.edit(&edit).unwrap();
        settings.store().flush().unwrap();

        let on_disk = Settings::new(JsonFileStore::new(&path)).load().unwrap();
        assert_eq!(on_disk.max_segment_height, 2048);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn settings_save_preserves_unknown_keys() {
        let store = MemoryStore::new();
        store
            .save(SETTINGS_NAMESPACE, &json!({"legacy": "x", "userBg": "#111111"}))
            .unwrap();
        let settings = Settings::new(store);
        let cfg = settings.load().unwrap();
        assert_eq!(cfg.user_bg, "#111111");
        settings.save(&cfg).unwrap();
        let raw = settings.store().load(SETTINGS_NAMESPACE).unwrap().unwrap();
        assert_eq!(raw["legacy"], json!("x"));
        assert_eq!(raw["aiBg"], json!("#202020"));
    }

    #[test]
    fn reset_restores_defaults() {
        let settings = Settings::new(MemoryStore::new());
        let edited = settings
            .edit(&SettingsEdit {
                width: Some(1200),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(edited.width, 1200);
        assert_eq!(settings.load().unwrap().width, 1200);
        let reset = settings.reset().unwrap();
        assert_eq!(reset, SnapConfig::default());
        assert_eq!(settings.load().unwrap(), SnapConfig::default());
    }
}
