//! Construction settings for a spectral sequence.

use crate::error::SseqError;
use crate::limits::Limits;
use crate::model::Node;
use crate::store::DocumentStore;
use serde::{Deserialize, Serialize};

/// Defaults a new graph starts from. Every field may be omitted in JSON.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SseqSettings {
    pub initial_x_range: [i32; 2],
    pub initial_y_range: [i32; 2],
    pub offset_size: f64,
    pub class_scale: f64,
    pub default_node: Node,
    /// Caps applied when loading documents.
    pub limits: Limits,
}

impl Default for SseqSettings {
    fn default() -> Self {
        SseqSettings {
            initial_x_range: [0, 10],
            initial_y_range: [0, 10],
            offset_size: 0.3,
            class_scale: 1.0,
            default_node: Node::default(),
            limits: Limits::default(),
        }
    }
}

impl SseqSettings {
    pub fn from_json_str(s: &str) -> Result<Self, SseqError> {
        Ok(serde_json::from_str(s)?)
    }

    /// Settings stored under `key`; `Ok(None)` when the store has none.
    pub fn load<S: DocumentStore + ?Sized>(store: &S, key: &str) -> Result<Option<Self>, SseqError> {
        match store.load_raw(key) {
            Ok(bytes) if bytes.is_empty() => Ok(None),
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(SseqError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub fn save<S: DocumentStore + ?Sized>(&self, store: &S, key: &str) -> Result<(), SseqError> {
        let data = serde_json::to_vec_pretty(self)?;
        store.save_raw(key, &data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Shape;
    use crate::store::MemoryStore;

    #[test]
    fn missing_keys_fall_back_to_defaults() {
        let s = SseqSettings::from_json_str(r#"{ "offset_size": 0.5, "limits": { "max_classes": 10 } }"#).unwrap();
        assert_eq!(s.offset_size, 0.5);
        assert_eq!(s.class_scale, 1.0);
        assert_eq!(s.initial_x_range, [0, 10]);
        assert_eq!(s.limits.max_classes, 10);
        assert_eq!(s.limits.max_edges, crate::limits::MAX_EDGES);
    }

    #[test]
    fn load_absent_key_is_none() {
        let store = MemoryStore::new();
        assert_eq!(SseqSettings::load(&store, "settings").unwrap(), None);
    }

    #[test]
    fn saved_settings_load_back() {
        let store = MemoryStore::new();
        let s = SseqSettings {
            default_node: Node { shape: Shape::Diamond, ..Node::default() },
            ..SseqSettings::default()
        };
        s.save(&store, "settings").unwrap();
        assert_eq!(SseqSettings::load(&store, "settings").unwrap(), Some(s));
    }

    #[test]
    fn malformed_settings_are_an_error() {
        let err = SseqSettings::from_json_str(r#"{ "class_scale": "big" }"#).unwrap_err();
        assert_eq!(err.code(), "json_parse");
    }
}
