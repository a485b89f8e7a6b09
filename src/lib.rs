//! Wearsense Activity Recognition Engine
//!
//! A real-time human activity recognition core for dual wearable IMU
//! streams: a chest-worn unit and a wrist/pocket unit, each broadcasting
//! six-channel inertial samples. The engine maintains a fixed 50-sample
//! rolling feature window per device, runs a coarse 4-class and a
//! fine-grained 14-class classifier over every tick, fuses dual-sensor
//! predictions by element-wise mean, tracks activity segments into a
//! SQLite history store, mirrors live state into a durable preference
//! store, and throttles observable updates to one per second per stream.
//!
//! # Design Philosophy
//!
//! - **Tick isolation**: an undecodable payload or failed classifier call
//!   costs exactly one tick. Buffered window state is never corrupted.
//! - **Raw confidences**: nothing between a classifier and its observers
//!   renormalizes; model output values are the published confidences.
//! - **Durable where it matters**: in-memory pipeline state dies with the
//!   process; history rows and the segment id counter survive it.
//! - **Opaque classifiers**: models live behind [`inference::ActivityModel`],
//!   loaded once and cached for the engine's lifetime.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use wearsense::inference::ModelBank;
//! use wearsense::pipeline::{EngineConfig, LiveEngine};
//! use wearsense::prefs::PrefStore;
//! use wearsense::store::HistoryStore;
//!
//! let history = Arc::new(HistoryStore::open("history.sqlite")?);
//! let prefs = Arc::new(PrefStore::open("prefs.json")?);
//! let mut engine = LiveEngine::new(
//!     EngineConfig::default(),
//!     ModelBank::builtin(),
//!     history,
//!     prefs,
//!     0,
//! )?;
//!
//! // Feed broadcast payloads as they arrive.
//! engine.on_payload(payload, now_ms)?;
//! ```

pub mod fusion;
pub mod inference;
pub mod pipeline;
pub mod prefs;
pub mod ranking;
pub mod segments;
pub mod store;
pub mod throttle;
pub mod types;
pub mod window;
pub mod wire;


// Re-export commonly used types
pub use inference::{ActivityModel, InferenceError, ModelBank};
pub use pipeline::{EngineConfig, EngineError, LiveEngine};
pub use prefs::PrefStore;
pub use store::HistoryStore;
pub use types::{
    BasicActivity, DetailedActivity, DeviceKind, Prediction, RankedClass, SegmentRecord,
    SensorFrame,
};
