//! Durable key-value preference layer.
//!
//! The UI does not talk to the pipeline directly; it observes a small
//! durable key-value store that the engine keeps current: device on/loading
//! flags, live accel/gyro/mag mirrors, the published prediction slots, the
//! configured peripheral ids, user toggles, and the segment id high-water
//! mark that must survive process restarts.
//!
//! Storage is a single JSON object file, loaded at open and rewritten
//! atomically (temp file + rename) on every mutation. The store is shared
//! between receiver threads behind an internal mutex.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::debug;
use parking_lot::Mutex;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::types::{DeviceKind, Prediction};

/// Number of ranked entries a publish writes into the prediction slots.
pub const PRED_SLOTS: usize = 4;

/// Well-known preference keys.
pub mod keys {
    /// Durable segment id counter (see the segment tracker).
    pub const LAST_SEGMENT_ID: &str = "last_segment_id";
    /// Which taxonomy the UI is displaying (1 = coarse, 2 = fine-grained).
    pub const MODEL_TYPE: &str = "model_type";
    /// Notification sound name.
    pub const SOUND: &str = "sound";
    /// Haptic feedback toggle.
    pub const VIBRATE: &str = "vibrate";
}

/// Preference layer failures.
#[derive(Debug, Error)]
pub enum PrefError {
    /// Filesystem failure reading or replacing the backing file.
    #[error("preference file io: {0}")]
    Io(#[from] io::Error),

    /// The backing file is not a JSON object.
    #[error("preference file corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}

#[derive(Debug)]
struct Inner {
    path: PathBuf,
    values: Map<String, Value>,
}

impl Inner {
    /// Rewrites the backing file. A temp-file-then-rename replace keeps a
    /// crash from ever leaving a half-written store on disk.
    fn flush(&self) -> Result<(), PrefError> {
        let bytes = serde_json::to_vec_pretty(&self.values)?;
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

/// Durable typed key-value store.
#[derive(Debug)]
pub struct PrefStore {
    inner: Mutex<Inner>,
}

impl PrefStore {
    /// Opens (or creates) the store at `path`. A missing file is an empty
    /// store; a present but unparseable file is an error.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, PrefError> {
        let path = path.as_ref().to_path_buf();
        let values = match fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => Map::new(),
            Err(e) => return Err(e.into()),
        };
        debug!("opened preference store at {} ({} keys)", path.display(), values.len());
        Ok(Self {
            inner: Mutex::new(Inner { path, values }),
        })
    }

    fn set(&self, key: &str, value: Value) -> Result<(), PrefError> {
        let mut inner = self.inner.lock();
        inner.values.insert(key.to_string(), value);
        inner.flush()
    }

    /// Inserts several keys under one lock and one file rewrite.
    fn set_many(&self, entries: Vec<(String, Value)>) -> Result<(), PrefError> {
        let mut inner = self.inner.lock();
        for (key, value) in entries {
            inner.values.insert(key, value);
        }
        inner.flush()
    }

    fn get(&self, key: &str) -> Option<Value> {
        self.inner.lock().values.get(key).cloned()
    }

    // ------------------------------------------------------------------
    // Typed accessors
    // ------------------------------------------------------------------

    pub fn set_bool(&self, key: &str, value: bool) -> Result<(), PrefError> {
        self.set(key, Value::Bool(value))
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key)?.as_bool()
    }

    pub fn set_i64(&self, key: &str, value: i64) -> Result<(), PrefError> {
        self.set(key, Value::from(value))
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.get(key)?.as_i64()
    }

    pub fn set_f32(&self, key: &str, value: f32) -> Result<(), PrefError> {
        self.set(key, Value::from(value as f64))
    }

    pub fn get_f32(&self, key: &str) -> Option<f32> {
        self.get(key)?.as_f64().map(|v| v as f32)
    }

    pub fn set_string(&self, key: &str, value: &str) -> Result<(), PrefError> {
        self.set(key, Value::from(value))
    }

    pub fn get_string(&self, key: &str) -> Option<String> {
        self.get(key)?.as_str().map(str::to_string)
    }

    pub fn set_vec3(&self, key: &str, value: [f32; 3]) -> Result<(), PrefError> {
        let list: Vec<Value> = value.iter().map(|v| Value::from(*v as f64)).collect();
        self.set(key, Value::Array(list))
    }

    pub fn get_vec3(&self, key: &str) -> Option<[f32; 3]> {
        let value = self.get(key)?;
        let list = value.as_array()?;
        if list.len() != 3 {
            return None;
        }
        let mut out = [0.0f32; 3];
        for (slot, item) in out.iter_mut().zip(list.iter()) {
            *slot = item.as_f64()? as f32;
        }
        Some(out)
    }

    // ------------------------------------------------------------------
    // Device state mirrors
    // ------------------------------------------------------------------

    pub fn set_device_on(&self, device: DeviceKind, on: bool) -> Result<(), PrefError> {
        self.set_bool(&format!("{}_on", device.name()), on)
    }

    pub fn device_on(&self, device: DeviceKind) -> bool {
        self.get_bool(&format!("{}_on", device.name())).unwrap_or(false)
    }

    pub fn set_device_loading(&self, device: DeviceKind, loading: bool) -> Result<(), PrefError> {
        self.set_bool(&format!("{}_loading", device.name()), loading)
    }

    pub fn device_loading(&self, device: DeviceKind) -> bool {
        self.get_bool(&format!("{}_loading", device.name()))
            .unwrap_or(false)
    }

    pub fn set_live_accel(&self, device: DeviceKind, value: [f32; 3]) -> Result<(), PrefError> {
        self.set_vec3(&format!("{}_accel", device.name()), value)
    }

    pub fn live_accel(&self, device: DeviceKind) -> Option<[f32; 3]> {
        self.get_vec3(&format!("{}_accel", device.name()))
    }

    pub fn set_live_gyro(&self, device: DeviceKind, value: [f32; 3]) -> Result<(), PrefError> {
        self.set_vec3(&format!("{}_gyro", device.name()), value)
    }

    pub fn live_gyro(&self, device: DeviceKind) -> Option<[f32; 3]> {
        self.get_vec3(&format!("{}_gyro", device.name()))
    }

    pub fn set_live_mag(&self, device: DeviceKind, value: [f32; 3]) -> Result<(), PrefError> {
        self.set_vec3(&format!("{}_mag", device.name()), value)
    }

    pub fn live_mag(&self, device: DeviceKind) -> Option<[f32; 3]> {
        self.get_vec3(&format!("{}_mag", device.name()))
    }

    pub fn set_device_id(&self, device: DeviceKind, id: &str) -> Result<(), PrefError> {
        self.set_string(&format!("{}_device_id", device.name()), id)
    }

    pub fn device_id(&self, device: DeviceKind) -> Option<String> {
        self.get_string(&format!("{}_device_id", device.name()))
    }

    // ------------------------------------------------------------------
    // Counters and toggles
    // ------------------------------------------------------------------

    /// Segment id high-water mark; 0 means no segment was ever persisted.
    pub fn last_segment_id(&self) -> i64 {
        self.get_i64(keys::LAST_SEGMENT_ID).unwrap_or(0)
    }

    pub fn set_last_segment_id(&self, id: i64) -> Result<(), PrefError> {
        self.set_i64(keys::LAST_SEGMENT_ID, id)
    }

    pub fn model_type(&self) -> i64 {
        self.get_i64(keys::MODEL_TYPE).unwrap_or(1)
    }

    pub fn set_model_type(&self, model_type: i64) -> Result<(), PrefError> {
        self.set_i64(keys::MODEL_TYPE, model_type)
    }

    pub fn sound(&self) -> String {
        self.get_string(keys::SOUND).unwrap_or_default()
    }

    pub fn set_sound(&self, sound: &str) -> Result<(), PrefError> {
        self.set_string(keys::SOUND, sound)
    }

    pub fn vibration(&self) -> bool {
        self.get_bool(keys::VIBRATE).unwrap_or(true)
    }

    pub fn set_vibration(&self, on: bool) -> Result<(), PrefError> {
        self.set_bool(keys::VIBRATE, on)
    }

    // ------------------------------------------------------------------
    // Prediction slots
    // ------------------------------------------------------------------

    /// Publishes the top [`PRED_SLOTS`] entries of a fine-grained or fused
    /// prediction. Returns false (publishing nothing) when the prediction
    /// carries fewer entries, which only a degenerate fusion produces.
    pub fn publish_detailed(&self, prediction: &Prediction) -> Result<bool, PrefError> {
        self.publish_slots("pred", prediction)
    }

    /// Publishes the top [`PRED_SLOTS`] entries of a coarse prediction.
    pub fn publish_basic(&self, prediction: &Prediction) -> Result<bool, PrefError> {
        self.publish_slots("pred_basic", prediction)
    }

    fn publish_slots(&self, prefix: &str, prediction: &Prediction) -> Result<bool, PrefError> {
        if prediction.len() < PRED_SLOTS {
            debug!(
                "skipping publish of {}-entry prediction on `{prefix}` slots",
                prediction.len()
            );
            return Ok(false);
        }
        let mut entries = Vec::with_capacity(PRED_SLOTS * 2);
        for (slot, entry) in prediction.entries().iter().take(PRED_SLOTS).enumerate() {
            entries.push((format!("{prefix}{slot}_index"), Value::from(entry.index as i64)));
            entries.push((
                format!("{prefix}{slot}_conf"),
                Value::from(entry.confidence as f64),
            ));
        }
        self.set_many(entries)?;
        Ok(true)
    }

    /// Reads back one fine-grained/fused prediction slot.
    pub fn detailed_slot(&self, slot: usize) -> Option<(i64, f32)> {
        self.read_slot("pred", slot)
    }

    /// Reads back one coarse prediction slot.
    pub fn basic_slot(&self, slot: usize) -> Option<(i64, f32)> {
        self.read_slot("pred_basic", slot)
    }

    fn read_slot(&self, prefix: &str, slot: usize) -> Option<(i64, f32)> {
        let index = self.get_i64(&format!("{prefix}{slot}_index"))?;
        let conf = self.get_f32(&format!("{prefix}{slot}_conf"))?;
        Some((index, conf))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RankedClass;
    use tempfile::tempdir;

    fn ranked(values: &[(usize, f32)]) -> Prediction {
        Prediction::new(
            values
                .iter()
                .map(|(index, confidence)| RankedClass {
                    index: *index,
                    confidence: *confidence,
                })
                .collect(),
        )
    }

    #[test]
    fn test_missing_file_is_empty_store() {
        let dir = tempdir().unwrap();
        let store = PrefStore::open(dir.path().join("prefs.json")).unwrap();
        assert_eq!(store.last_segment_id(), 0);
        assert_eq!(store.model_type(), 1);
        assert!(store.vibration());
        assert!(!store.device_on(DeviceKind::Chest));
    }

    #[test]
    fn test_values_survive_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("prefs.json");

        {
            let store = PrefStore::open(&path).unwrap();
            store.set_last_segment_id(41).unwrap();
            store.set_device_on(DeviceKind::Wrist, true).unwrap();
            store.set_live_accel(DeviceKind::Chest, [0.1, 0.2, 9.8]).unwrap();
            store.set_device_id(DeviceKind::Chest, "E7:6E:9C:24:55:9A").unwrap();
            store.set_vibration(false).unwrap();
        }

        let store = PrefStore::open(&path).unwrap();
        assert_eq!(store.last_segment_id(), 41);
        assert!(store.device_on(DeviceKind::Wrist));
        assert_eq!(store.live_accel(DeviceKind::Chest), Some([0.1, 0.2, 9.8]));
        assert_eq!(
            store.device_id(DeviceKind::Chest).as_deref(),
            Some("E7:6E:9C:24:55:9A")
        );
        assert!(!store.vibration());
    }

    #[test]
    fn test_publish_writes_top_four_slots() {
        let dir = tempdir().unwrap();
        let store = PrefStore::open(dir.path().join("prefs.json")).unwrap();

        let prediction = ranked(&[(1, 0.7), (0, 0.1), (2, 0.1), (3, 0.1)]);
        assert!(store.publish_basic(&prediction).unwrap());

        assert_eq!(store.basic_slot(0), Some((1, 0.7)));
        assert_eq!(store.basic_slot(1), Some((0, 0.1)));
        assert_eq!(store.basic_slot(2), Some((2, 0.1)));
        assert_eq!(store.basic_slot(3), Some((3, 0.1)));
        // The detailed slots belong to a different stream.
        assert!(store.detailed_slot(0).is_none());
    }

    #[test]
    fn test_short_prediction_publishes_nothing() {
        let dir = tempdir().unwrap();
        let store = PrefStore::open(dir.path().join("prefs.json")).unwrap();

        assert!(!store.publish_detailed(&Prediction::default()).unwrap());
        assert!(!store.publish_detailed(&ranked(&[(0, 0.9)])).unwrap());
        assert!(store.detailed_slot(0).is_none());
    }

    #[test]
    fn test_wrong_typed_read_is_none() {
        let dir = tempdir().unwrap();
        let store = PrefStore::open(dir.path().join("prefs.json")).unwrap();
        store.set_string("oddity", "not a number").unwrap();
        assert!(store.get_i64("oddity").is_none());
        assert!(store.get_vec3("oddity").is_none());
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("prefs.json");
        std::fs::write(&path, b"{ definitely not json").unwrap();
        assert!(matches!(
            PrefStore::open(&path).unwrap_err(),
            PrefError::Corrupt(_)
        ));
    }
}
