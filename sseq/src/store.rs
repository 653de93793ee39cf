//! Document storage ports: a local cache keyed by name, and an async source
//! for documents that live elsewhere.

use crate::error::SseqError;
use crate::config::SseqSettings;
use crate::Sseq;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Raw byte storage keyed by document name.
pub trait DocumentStore {
    /// Load a stored blob. Returns `NotFound` when missing.
    fn load_raw(&self, key: &str) -> Result<Vec<u8>, SseqError>;
    fn save_raw(&self, key: &str, data: &[u8]) -> Result<(), SseqError>;
}

/// Where documents come from when the cache has nothing, e.g. a server.
#[allow(async_fn_in_trait)]
pub trait DocumentSource {
    async fn fetch(&self, path: &str) -> Result<Vec<u8>, SseqError>;
}

/// In-process cache.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RefCell<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn contains(&self, key: &str) -> bool {
        self.entries.borrow().contains_key(key)
    }
    pub fn remove(&self, key: &str) -> Option<Vec<u8>> {
        self.entries.borrow_mut().remove(key)
    }
}

impl DocumentStore for MemoryStore {
    fn load_raw(&self, key: &str) -> Result<Vec<u8>, SseqError> {
        self.entries
            .borrow()
            .get(key)
            .cloned()
            .ok_or_else(|| SseqError::NotFound(key.to_string()))
    }

    fn save_raw(&self, key: &str, data: &[u8]) -> Result<(), SseqError> {
        self.entries.borrow_mut().insert(key.to_string(), data.to_vec());
        Ok(())
    }
}

/// Stores documents as `<key>.json` files under a base directory.
#[derive(Clone, Debug)]
pub struct FsStore {
    base: PathBuf,
}

impl FsStore {
    pub fn new(base: impl Into<PathBuf>) -> Result<Self, SseqError> {
        let base = base.into();
        fs::create_dir_all(&base)?;
        Ok(Self { base })
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.base.join(format!("{key}.json"))
    }
}

impl DocumentStore for FsStore {
    fn load_raw(&self, key: &str) -> Result<Vec<u8>, SseqError> {
        match fs::read(self.path_for(key)) {
            Ok(bytes) => Ok(bytes),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Err(SseqError::NotFound(key.to_string())),
            Err(err) => Err(SseqError::Io(err)),
        }
    }

    fn save_raw(&self, key: &str, data: &[u8]) -> Result<(), SseqError> {
        let path = self.path_for(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, data)?;
        Ok(())
    }
}

fn parse_document(bytes: &[u8], settings: &SseqSettings) -> Result<Sseq, SseqError> {
    let v: serde_json::Value = serde_json::from_slice(bytes)?;
    Sseq::from_json_value_with_settings(v, settings)
}

/// Load `path` from the cache, falling back to the source. Fails only when
/// neither yields a readable document.
pub async fn load_from_store_or_source<S, R>(cache: &S, source: &R, path: &str) -> Result<Sseq, SseqError>
where
    S: DocumentStore + ?Sized,
    R: DocumentSource + ?Sized,
{
    load_from_store_or_source_with_settings(cache, source, path, &SseqSettings::default()).await
}

/// As [`load_from_store_or_source`], enforcing `settings.limits` on both the
/// cached and the fetched document.
pub async fn load_from_store_or_source_with_settings<S, R>(
    cache: &S,
    source: &R,
    path: &str,
    settings: &SseqSettings,
) -> Result<Sseq, SseqError>
where
    S: DocumentStore + ?Sized,
    R: DocumentSource + ?Sized,
{
    match cache.load_raw(path) {
        Ok(bytes) => match parse_document(&bytes, settings) {
            Ok(sseq) => {
                debug!(path, "loaded document from cache");
                return Ok(sseq);
            }
            Err(err) => warn!(path, %err, "cached document unreadable; fetching"),
        },
        Err(SseqError::NotFound(_)) => debug!(path, "document not cached; fetching"),
        Err(err) => warn!(path, %err, "cache lookup failed; fetching"),
    }
    let bytes = source.fetch(path).await?;
    let sseq = parse_document(&bytes, settings)?;
    info!(path, classes = sseq.class_count(), edges = sseq.edge_count(), "loaded document from source");
    Ok(sseq)
}

impl Sseq {
    pub fn save_to_store<S: DocumentStore + ?Sized>(&mut self, store: &S, key: &str) -> Result<(), SseqError> {
        let data = serde_json::to_vec(&self.to_json_value())?;
        store.save_raw(key, &data)?;
        debug!(key, bytes = data.len(), "saved document");
        Ok(())
    }

    /// Document stored under `key`; `Ok(None)` when the store has none.
    pub fn load_from_store<S: DocumentStore + ?Sized>(store: &S, key: &str) -> Result<Option<Sseq>, SseqError> {
        Self::load_from_store_with_settings(store, key, &SseqSettings::default())
    }

    pub fn load_from_store_with_settings<S: DocumentStore + ?Sized>(
        store: &S,
        key: &str,
        settings: &SseqSettings,
    ) -> Result<Option<Sseq>, SseqError> {
        match store.load_raw(key) {
            Ok(bytes) => parse_document(&bytes, settings).map(Some),
            Err(SseqError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Write the document to `path` as pretty-printed JSON.
    pub fn download(&mut self, path: impl AsRef<Path>) -> Result<(), SseqError> {
        let path = path.as_ref();
        let data = serde_json::to_vec_pretty(&self.to_json_value())?;
        fs::write(path, data)?;
        info!(path = %path.display(), "wrote document");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_reports_missing_keys() {
        let store = MemoryStore::new();
        let err = store.load_raw("nope").unwrap_err();
        assert_eq!(err.code(), "not_found");
        store.save_raw("doc", b"{}").unwrap();
        assert!(store.contains("doc"));
        assert_eq!(store.load_raw("doc").unwrap(), b"{}".to_vec());
    }

    #[test]
    fn load_from_store_absent_is_none() {
        let store = MemoryStore::new();
        assert!(Sseq::load_from_store(&store, "missing").unwrap().is_none());
    }

    #[test]
    fn settings_caps_reject_stored_documents() {
        let store = MemoryStore::new();
        let mut chart = Sseq::new();
        chart.add_class(0, 0);
        chart.add_class(1, 0);
        chart.save_to_store(&store, "chart").unwrap();

        let mut settings = SseqSettings::default();
        settings.limits.max_classes = 1;
        let err = Sseq::load_from_store_with_settings(&store, "chart", &settings).unwrap_err();
        assert_eq!(err.code(), "caps_exceeded");
        settings.limits.max_classes = 2;
        let back = Sseq::load_from_store_with_settings(&store, "chart", &settings).unwrap().unwrap();
        assert_eq!(back.limits.max_classes, 2);
    }

    #[test]
    fn fs_store_writes_json_files() {
        let dir = std::env::temp_dir().join(format!("sseq-fs-store-{}", std::process::id()));
        let store = FsStore::new(&dir).unwrap();
        let mut sseq = Sseq::new();
        sseq.add_class(0, 0);
        sseq.save_to_store(&store, "chart").unwrap();
        assert!(dir.join("chart.json").exists());
        let back = Sseq::load_from_store(&store, "chart").unwrap().unwrap();
        assert_eq!(back.class_count(), 1);
        assert_eq!(store.load_raw("other").unwrap_err().code(), "not_found");
        let _ = fs::remove_dir_all(&dir);
    }
}
