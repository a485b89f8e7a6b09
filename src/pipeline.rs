//! Live inference pipeline.
//!
//! This module wires the per-device receivers together: payload decode,
//! rolling-window upkeep, dual-model inference, dual-sensor fusion,
//! segment tracking, and throttled publication into the preference layer.
//!
//! Each receiver owns its device's window and throttle clocks and is
//! driven by that device's broadcast stream. The two receivers share the
//! preference store, the history store, the loaded models, and one slot
//! holding the chest's latest fine-grained output vector, which the wrist
//! stream fuses against. On a dual-sensor deployment the receivers run on
//! separate handler threads; [`LiveEngine::split`] hands them out.
//!
//! Failure policy per tick: an undecodable payload or failed classifier
//! invocation costs that tick only. Windows are mutated strictly after
//! decode succeeds, so a dropped tick never corrupts buffered history.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{debug, warn};
use parking_lot::RwLock;
use thiserror::Error;

use crate::fusion::fuse_mean;
use crate::inference::{InferenceError, ModelBank};
use crate::prefs::{PrefError, PrefStore};
use crate::ranking::rank;
use crate::segments::{SegmentTracker, TrackError, MIN_SEGMENT_MS};
use crate::store::{HistoryStore, StoreError};
use crate::throttle::{Throttle, PRED_INTERVAL_MS};
use crate::types::{BasicActivity, DeviceKind, SensorFrame, DETAILED_CLASS_COUNT};
use crate::window::FeatureWindow;
use crate::wire::{decode_frame, WireError};

/// Engine-level failures. Wire and inference problems are tick-scoped;
/// store and preference problems indicate the durable layer is unhealthy.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Wire(#[from] WireError),
    #[error(transparent)]
    Inference(#[from] InferenceError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Pref(#[from] PrefError),
}

impl From<TrackError> for EngineError {
    fn from(err: TrackError) -> Self {
        match err {
            TrackError::Store(e) => EngineError::Store(e),
            TrackError::Pref(e) => EngineError::Pref(e),
        }
    }
}

/// Top-level engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Minimum spacing between published predictions per stream (ms).
    pub pred_interval_ms: u64,

    /// Minimum activity run duration before a segment is persisted (ms).
    pub min_segment_ms: u64,

    /// Peripheral id of the chest unit, handed to the Bluetooth bridge.
    pub chest_device_id: String,

    /// Peripheral id of the wrist unit.
    pub wrist_device_id: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            pred_interval_ms: PRED_INTERVAL_MS,
            min_segment_ms: MIN_SEGMENT_MS,
            chest_device_id: "E7:6E:9C:24:55:9A".to_string(),
            wrist_device_id: "DF:80:AA:B3:5A:F7".to_string(),
        }
    }
}

/// State shared between the two receivers.
struct SharedState {
    /// Latest raw 14-class output of the chest stream. Starts as zeros, so
    /// fusion before the first chest tick halves the wrist confidences
    /// rather than failing.
    chest_detailed: RwLock<Vec<f32>>,

    /// Set on the first wrist frame; from then on the chest stream stops
    /// publishing its solo fine-grained prediction in favor of the fused
    /// stream.
    wrist_active: AtomicBool,
}

impl SharedState {
    fn new() -> Self {
        Self {
            chest_detailed: RwLock::new(vec![0.0; DETAILED_CLASS_COUNT]),
            wrist_active: AtomicBool::new(false),
        }
    }
}

/// Receiver for the chest stream: coarse + fine-grained inference, segment
/// tracking, and the basic/solo-detailed publications.
pub struct ChestReceiver {
    models: Arc<ModelBank>,
    window: FeatureWindow,
    tracker: SegmentTracker,
    basic_throttle: Throttle,
    detailed_throttle: Throttle,
    shared: Arc<SharedState>,
    history: Arc<HistoryStore>,
    prefs: Arc<PrefStore>,
}

impl ChestReceiver {
    /// Processes one decoded chest frame.
    pub fn on_frame(&mut self, frame: &SensorFrame, now_ms: u64) -> Result<(), EngineError> {
        debug!("chest frame at {} ms", frame.timestamp_ms);
        self.prefs.set_device_on(DeviceKind::Chest, true)?;
        self.prefs.set_device_loading(DeviceKind::Chest, false)?;
        self.prefs.set_live_accel(DeviceKind::Chest, frame.accel)?;
        self.prefs.set_live_gyro(DeviceKind::Chest, frame.gyro)?;

        self.window.push(frame);
        let snapshot = self.window.snapshot();

        let basic_raw = match self.models.infer_basic(&snapshot) {
            Ok(values) => values,
            Err(e) => {
                warn!("coarse classifier failed, skipping tick: {e}");
                return Ok(());
            }
        };
        let basic = rank(&basic_raw);

        if let Some(flag) = basic
            .top()
            .and_then(|top| BasicActivity::from_index(top.index))
        {
            self.tracker
                .observe(flag, now_ms, &self.history, &self.prefs)?;
        }

        if self.basic_throttle.ready(now_ms) {
            self.prefs.publish_basic(&basic)?;
        }

        let detailed_raw = match self.models.infer_detailed_chest(&snapshot) {
            Ok(values) => values,
            Err(e) => {
                warn!("fine-grained classifier failed, skipping tick: {e}");
                return Ok(());
            }
        };
        let detailed = rank(&detailed_raw);
        *self.shared.chest_detailed.write() = detailed_raw;

        if !self.shared.wrist_active.load(Ordering::Relaxed)
            && self.detailed_throttle.ready(now_ms)
        {
            self.prefs.publish_detailed(&detailed)?;
        }

        Ok(())
    }
}

/// Receiver for the wrist stream: fine-grained inference fused with the
/// chest's latest output, published on its own throttle.
pub struct WristReceiver {
    models: Arc<ModelBank>,
    window: FeatureWindow,
    fused_throttle: Throttle,
    shared: Arc<SharedState>,
    prefs: Arc<PrefStore>,
}

impl WristReceiver {
    /// Processes one decoded wrist frame.
    pub fn on_frame(&mut self, frame: &SensorFrame, now_ms: u64) -> Result<(), EngineError> {
        debug!("wrist frame at {} ms", frame.timestamp_ms);
        self.shared.wrist_active.store(true, Ordering::Relaxed);
        self.prefs.set_device_on(DeviceKind::Wrist, true)?;
        self.prefs.set_device_loading(DeviceKind::Wrist, false)?;
        self.prefs.set_live_accel(DeviceKind::Wrist, frame.accel)?;
        self.prefs.set_live_gyro(DeviceKind::Wrist, frame.gyro)?;
        if let Some(mag) = frame.mag {
            self.prefs.set_live_mag(DeviceKind::Wrist, mag)?;
        }

        self.window.push(frame);
        let snapshot = self.window.snapshot();

        let wrist_raw = match self.models.infer_detailed_wrist(&snapshot) {
            Ok(values) => values,
            Err(e) => {
                warn!("wrist classifier failed, skipping tick: {e}");
                return Ok(());
            }
        };

        let chest_raw = self.shared.chest_detailed.read().clone();
        let fused = fuse_mean(&wrist_raw, &chest_raw);
        let prediction = rank(&fused);

        if self.fused_throttle.ready(now_ms) && !self.prefs.publish_detailed(&prediction)? {
            debug!("fused prediction is degenerate, nothing published");
        }

        Ok(())
    }
}

/// The assembled live engine.
pub struct LiveEngine {
    chest: ChestReceiver,
    wrist: WristReceiver,
    prefs: Arc<PrefStore>,
    history: Arc<HistoryStore>,
}

impl LiveEngine {
    /// Builds the engine, records the configured peripheral ids, and marks
    /// both devices as loading until their first frame arrives.
    ///
    /// `now_ms` seeds the throttle clocks, so the first publication on any
    /// stream happens one full interval after construction.
    pub fn new(
        config: EngineConfig,
        models: ModelBank,
        history: Arc<HistoryStore>,
        prefs: Arc<PrefStore>,
        now_ms: u64,
    ) -> Result<Self, EngineError> {
        prefs.set_device_id(DeviceKind::Chest, &config.chest_device_id)?;
        prefs.set_device_id(DeviceKind::Wrist, &config.wrist_device_id)?;
        for device in [DeviceKind::Chest, DeviceKind::Wrist] {
            prefs.set_device_on(device, false)?;
            prefs.set_device_loading(device, true)?;
        }

        let models = Arc::new(models);
        let shared = Arc::new(SharedState::new());

        let chest = ChestReceiver {
            models: Arc::clone(&models),
            window: FeatureWindow::new(),
            tracker: SegmentTracker::with_threshold(config.min_segment_ms),
            basic_throttle: Throttle::new(config.pred_interval_ms, now_ms),
            detailed_throttle: Throttle::new(config.pred_interval_ms, now_ms),
            shared: Arc::clone(&shared),
            history: Arc::clone(&history),
            prefs: Arc::clone(&prefs),
        };

        let wrist = WristReceiver {
            models,
            window: FeatureWindow::new(),
            fused_throttle: Throttle::new(config.pred_interval_ms, now_ms),
            shared,
            prefs: Arc::clone(&prefs),
        };

        Ok(Self {
            chest,
            wrist,
            prefs,
            history,
        })
    }

    /// Decodes one broadcast payload and runs the owning receiver's tick.
    ///
    /// An undecodable payload is logged and returned as an error without
    /// touching any receiver state.
    pub fn on_payload(&mut self, payload: &[u8], now_ms: u64) -> Result<(), EngineError> {
        let (device, frame) = match decode_frame(payload) {
            Ok(decoded) => decoded,
            Err(e) => {
                warn!("dropping undecodable sensor payload: {e}");
                return Err(e.into());
            }
        };
        match device {
            DeviceKind::Chest => self.chest.on_frame(&frame, now_ms),
            DeviceKind::Wrist => self.wrist.on_frame(&frame, now_ms),
        }
    }

    /// Hands out the per-device receivers for two-thread deployments.
    pub fn split(self) -> (ChestReceiver, WristReceiver) {
        (self.chest, self.wrist)
    }

    /// Repairs the engine to a different chest peripheral.
    pub fn set_chest_device(&self, id: &str) -> Result<(), EngineError> {
        self.prefs.set_device_id(DeviceKind::Chest, id)?;
        Ok(())
    }

    /// Repairs the engine to a different wrist peripheral.
    pub fn set_wrist_device(&self, id: &str) -> Result<(), EngineError> {
        self.prefs.set_device_id(DeviceKind::Wrist, id)?;
        Ok(())
    }

    /// Marks both devices disconnected; called on host teardown.
    pub fn shutdown(&self) -> Result<(), EngineError> {
        for device in [DeviceKind::Chest, DeviceKind::Wrist] {
            self.prefs.set_device_on(device, false)?;
        }
        Ok(())
    }

    /// The shared preference store.
    pub fn prefs(&self) -> &Arc<PrefStore> {
        &self.prefs
    }

    /// The shared history store.
    pub fn history(&self) -> &Arc<HistoryStore> {
        &self.history
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::encode_frame;
    use tempfile::tempdir;

    fn engine_at(now_ms: u64) -> (tempfile::TempDir, LiveEngine) {
        let dir = tempdir().unwrap();
        let history = Arc::new(HistoryStore::open_in_memory().unwrap());
        let prefs = Arc::new(PrefStore::open(dir.path().join("prefs.json")).unwrap());
        let engine = LiveEngine::new(
            EngineConfig::default(),
            ModelBank::builtin(),
            history,
            prefs,
            now_ms,
        )
        .unwrap();
        (dir, engine)
    }

    fn chest_still_frame(timestamp_ms: u64) -> SensorFrame {
        SensorFrame::new(timestamp_ms, [0.05, 0.1, 9.8], [0.01, 0.01, 0.01])
    }

    fn wrist_still_frame(timestamp_ms: u64) -> SensorFrame {
        SensorFrame::with_mag(
            timestamp_ms,
            [0.05, 0.1, 9.8],
            [0.01, 0.01, 0.01],
            [22.0, -4.0, 40.0],
        )
    }

    #[test]
    fn test_construction_records_device_ids_and_loading_state() {
        let (_dir, engine) = engine_at(0);
        let prefs = engine.prefs();
        assert_eq!(
            prefs.device_id(DeviceKind::Chest).as_deref(),
            Some("E7:6E:9C:24:55:9A")
        );
        assert_eq!(
            prefs.device_id(DeviceKind::Wrist).as_deref(),
            Some("DF:80:AA:B3:5A:F7")
        );
        assert!(prefs.device_loading(DeviceKind::Chest));
        assert!(!prefs.device_on(DeviceKind::Chest));
    }

    #[test]
    fn test_chest_tick_mirrors_live_state() {
        let (_dir, mut engine) = engine_at(0);
        let frame = chest_still_frame(20);
        let payload = encode_frame(DeviceKind::Chest, &frame).unwrap();
        engine.on_payload(&payload, 20).unwrap();

        let prefs = engine.prefs();
        assert!(prefs.device_on(DeviceKind::Chest));
        assert!(!prefs.device_loading(DeviceKind::Chest));
        assert_eq!(prefs.live_accel(DeviceKind::Chest), Some(frame.accel));
        assert_eq!(prefs.live_gyro(DeviceKind::Chest), Some(frame.gyro));
    }

    #[test]
    fn test_wrist_tick_mirrors_magnetometer() {
        let (_dir, mut engine) = engine_at(0);
        let frame = wrist_still_frame(20);
        let payload = encode_frame(DeviceKind::Wrist, &frame).unwrap();
        engine.on_payload(&payload, 20).unwrap();

        let prefs = engine.prefs();
        assert!(prefs.device_on(DeviceKind::Wrist));
        assert_eq!(prefs.live_mag(DeviceKind::Wrist), frame.mag);
    }

    #[test]
    fn test_undecodable_payload_leaves_state_untouched() {
        let (_dir, mut engine) = engine_at(0);
        let err = engine.on_payload(b"{ nonsense", 20).unwrap_err();
        assert!(matches!(err, EngineError::Wire(_)));

        let prefs = engine.prefs();
        assert!(!prefs.device_on(DeviceKind::Chest));
        assert!(!prefs.device_on(DeviceKind::Wrist));
        assert!(prefs.basic_slot(0).is_none());
    }

    #[test]
    fn test_basic_publication_waits_for_throttle() {
        let (_dir, mut engine) = engine_at(0);

        for now in (20..=1000).step_by(20) {
            let payload = encode_frame(DeviceKind::Chest, &chest_still_frame(now)).unwrap();
            engine.on_payload(&payload, now).unwrap();
            assert!(engine.prefs().basic_slot(0).is_none());
        }

        let payload = encode_frame(DeviceKind::Chest, &chest_still_frame(1020)).unwrap();
        engine.on_payload(&payload, 1020).unwrap();

        let (index, conf) = engine.prefs().basic_slot(0).unwrap();
        assert_eq!(index, BasicActivity::SittingStanding.index() as i64);
        assert!(conf > 0.0);
    }

    #[test]
    fn test_wrist_activation_moves_detailed_stream_to_fusion() {
        let (_dir, mut engine) = engine_at(0);

        // Wrist announces itself immediately; its own publish is throttled.
        let payload = encode_frame(DeviceKind::Wrist, &wrist_still_frame(20)).unwrap();
        engine.on_payload(&payload, 20).unwrap();

        // Chest ticks past the throttle no longer publish solo detailed
        // predictions.
        for now in (40..=1200).step_by(20) {
            let payload = encode_frame(DeviceKind::Chest, &chest_still_frame(now)).unwrap();
            engine.on_payload(&payload, now).unwrap();
        }
        assert!(engine.prefs().detailed_slot(0).is_none());

        // The fused stream publishes on the wrist tick.
        let payload = encode_frame(DeviceKind::Wrist, &wrist_still_frame(1220)).unwrap();
        engine.on_payload(&payload, 1220).unwrap();
        assert!(engine.prefs().detailed_slot(0).is_some());
    }

    #[test]
    fn test_chest_solo_publishes_detailed_prediction() {
        let (_dir, mut engine) = engine_at(0);

        for now in (20..=1020).step_by(20) {
            let payload = encode_frame(DeviceKind::Chest, &chest_still_frame(now)).unwrap();
            engine.on_payload(&payload, now).unwrap();
        }
        assert!(engine.prefs().detailed_slot(0).is_some());
    }

    #[test]
    fn test_segment_persists_through_engine() {
        let (_dir, mut engine) = engine_at(0);

        // The still-posture segment only opens once the zero-initialized
        // window has fully filled with real frames (50 frames, 1000 ms),
        // so the stream must run well past 2000 ms to cross the
        // persistence threshold.
        for now in (20..=2500).step_by(20) {
            let payload = encode_frame(DeviceKind::Chest, &chest_still_frame(now)).unwrap();
            engine.on_payload(&payload, now).unwrap();
        }

        let all = engine.history().get_all().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].flag, BasicActivity::SittingStanding);
        assert!(all[0].interval_ms > 1000);
        assert_eq!(engine.prefs().last_segment_id(), all[0].id);
    }

    #[test]
    fn test_shutdown_marks_devices_off() {
        let (_dir, mut engine) = engine_at(0);
        let payload = encode_frame(DeviceKind::Chest, &chest_still_frame(20)).unwrap();
        engine.on_payload(&payload, 20).unwrap();
        assert!(engine.prefs().device_on(DeviceKind::Chest));

        engine.shutdown().unwrap();
        assert!(!engine.prefs().device_on(DeviceKind::Chest));
        assert!(!engine.prefs().device_on(DeviceKind::Wrist));
    }
}
