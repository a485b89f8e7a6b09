//! Core data types for the activity recognition engine.
//!
//! This module defines the fundamental types used throughout the live
//! inference pipeline. All types are designed to make intent obvious:
//! if a concept exists, it gets a type. Raw tuples and untyped collections
//! never cross module boundaries.
//!
//! Class indices are load-bearing: both classifier taxonomies are indexed
//! exactly the way the model output vectors are laid out, and the history
//! store persists the coarse index as-is.

use serde::{Deserialize, Serialize};

/// Number of classes in the coarse activity taxonomy.
pub const BASIC_CLASS_COUNT: usize = 4;

/// Number of classes in the fine-grained activity taxonomy.
pub const DETAILED_CLASS_COUNT: usize = 14;

/// Which wearable peripheral a reading came from.
///
/// The chest unit streams accelerometer + gyroscope; the wrist unit
/// additionally carries a magnetometer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    /// Chest-worn respiration/IMU unit.
    Chest,
    /// Wrist- or pocket-carried IMU unit.
    Wrist,
}

impl DeviceKind {
    /// Stable lowercase name, as used in wire payloads and preference keys.
    pub fn name(&self) -> &'static str {
        match self {
            DeviceKind::Chest => "chest",
            DeviceKind::Wrist => "wrist",
        }
    }
}

/// A single decoded inertial reading from one device at one instant.
///
/// Assumptions:
/// - `timestamp_ms` is monotonically increasing within a device stream
/// - accel and gyro are calibrated (device-specific bias removed)
///
/// f32 is deliberate: the classifiers consume f32 tensors and the extra
/// precision of f64 would be discarded at the model boundary anyway.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensorFrame {
    /// Monotonic timestamp in milliseconds.
    pub timestamp_ms: u64,

    /// Accelerometer reading [x, y, z] in m/s².
    pub accel: [f32; 3],

    /// Gyroscope reading [x, y, z] in rad/s.
    pub gyro: [f32; 3],

    /// Magnetometer reading [x, y, z] in µT. Present on wrist frames only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mag: Option<[f32; 3]>,
}

impl SensorFrame {
    /// Creates a frame with accelerometer and gyroscope only.
    pub fn new(timestamp_ms: u64, accel: [f32; 3], gyro: [f32; 3]) -> Self {
        Self {
            timestamp_ms,
            accel,
            gyro,
            mag: None,
        }
    }

    /// Creates a frame carrying a magnetometer reading as well.
    pub fn with_mag(timestamp_ms: u64, accel: [f32; 3], gyro: [f32; 3], mag: [f32; 3]) -> Self {
        Self {
            timestamp_ms,
            accel,
            gyro,
            mag: Some(mag),
        }
    }

    /// Magnitude of acceleration in m/s².
    pub fn accel_magnitude(&self) -> f32 {
        let [x, y, z] = self.accel;
        (x * x + y * y + z * z).sqrt()
    }

    /// Magnitude of rotational velocity in rad/s.
    pub fn gyro_magnitude(&self) -> f32 {
        let [x, y, z] = self.gyro;
        (x * x + y * y + z * z).sqrt()
    }

    /// The six feature channels fed to the rolling window, in the fixed
    /// order the classifiers consume: accel x/y/z then gyro x/y/z. The
    /// magnetometer is mirrored to observers but never enters the window.
    pub fn channels(&self) -> [f32; 6] {
        [
            self.accel[0],
            self.accel[1],
            self.accel[2],
            self.gyro[0],
            self.gyro[1],
            self.gyro[2],
        ]
    }
}

/// Coarse activity taxonomy produced by the 4-class classifier.
///
/// Index order matches the model output vector and must not be reordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BasicActivity {
    /// Upright and static: sitting or standing.
    SittingStanding,
    /// Horizontal and static.
    LyingDown,
    /// Pedestrian locomotion.
    Walking,
    /// Vigorous locomotion.
    Running,
}

impl BasicActivity {
    /// Maps a model output index back to an activity class.
    pub fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(BasicActivity::SittingStanding),
            1 => Some(BasicActivity::LyingDown),
            2 => Some(BasicActivity::Walking),
            3 => Some(BasicActivity::Running),
            _ => None,
        }
    }

    /// The class index in the model output vector.
    pub fn index(&self) -> usize {
        match self {
            BasicActivity::SittingStanding => 0,
            BasicActivity::LyingDown => 1,
            BasicActivity::Walking => 2,
            BasicActivity::Running => 3,
        }
    }

    /// Human-readable label, as shown in history entries.
    pub fn label(&self) -> &'static str {
        match self {
            BasicActivity::SittingStanding => "Sitting / Standing",
            BasicActivity::LyingDown => "Lying Down",
            BasicActivity::Walking => "Walking",
            BasicActivity::Running => "Running",
        }
    }
}

/// Fine-grained activity taxonomy produced by the 14-class classifier.
///
/// Index order matches the model output vector and must not be reordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DetailedActivity {
    ClimbingStairs,
    DescendingStairs,
    DeskWork,
    Sitting,
    SittingBentForward,
    SittingBentBackward,
    Standing,
    LyingLeft,
    LyingBack,
    LyingStomach,
    LyingRight,
    Movement,
    Running,
    Walking,
}

impl DetailedActivity {
    /// Maps a model output index back to an activity class.
    pub fn from_index(index: usize) -> Option<Self> {
        use DetailedActivity::*;
        match index {
            0 => Some(ClimbingStairs),
            1 => Some(DescendingStairs),
            2 => Some(DeskWork),
            3 => Some(Sitting),
            4 => Some(SittingBentForward),
            5 => Some(SittingBentBackward),
            6 => Some(Standing),
            7 => Some(LyingLeft),
            8 => Some(LyingBack),
            9 => Some(LyingStomach),
            10 => Some(LyingRight),
            11 => Some(Movement),
            12 => Some(Running),
            13 => Some(Walking),
            _ => None,
        }
    }

    /// The class index in the model output vector.
    pub fn index(&self) -> usize {
        use DetailedActivity::*;
        match self {
            ClimbingStairs => 0,
            DescendingStairs => 1,
            DeskWork => 2,
            Sitting => 3,
            SittingBentForward => 4,
            SittingBentBackward => 5,
            Standing => 6,
            LyingLeft => 7,
            LyingBack => 8,
            LyingStomach => 9,
            LyingRight => 10,
            Movement => 11,
            Running => 12,
            Walking => 13,
        }
    }

    /// Human-readable label.
    pub fn label(&self) -> &'static str {
        use DetailedActivity::*;
        match self {
            ClimbingStairs => "Climbing stairs",
            DescendingStairs => "Descending stairs",
            DeskWork => "Desk work",
            Sitting => "Sitting",
            SittingBentForward => "Sitting bent forward",
            SittingBentBackward => "Sitting bent backward",
            Standing => "Standing",
            LyingLeft => "Lying down left",
            LyingBack => "Lying down on back",
            LyingStomach => "Lying down on stomach",
            LyingRight => "Lying down right",
            Movement => "Movement",
            Running => "Running",
            Walking => "Walking",
        }
    }
}

/// One entry of a ranked prediction: a class index and its confidence.
///
/// Confidence is the raw model output value; the pipeline applies no
/// normalization between the classifier and its observers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankedClass {
    /// Class index into the producing model's taxonomy.
    pub index: usize,
    /// Raw confidence value, nominally in [0, 1].
    pub confidence: f32,
}

/// A classifier output ranked by descending confidence.
///
/// Covers every index of the raw output vector exactly once. The first
/// entry is the global argmax; the relative order of tied confidences is
/// unspecified and observers must not rely on it.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Prediction {
    entries: Vec<RankedClass>,
}

impl Prediction {
    /// Wraps an already-ranked entry list.
    pub fn new(entries: Vec<RankedClass>) -> Self {
        Self { entries }
    }

    /// The highest-confidence class, if any.
    pub fn top(&self) -> Option<&RankedClass> {
        self.entries.first()
    }

    /// All entries in descending confidence order.
    pub fn entries(&self) -> &[RankedClass] {
        &self.entries
    }

    /// Number of ranked classes.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when the prediction carries no classes (degenerate fusion).
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// One continuous run of a single predicted coarse activity.
///
/// Records are persisted only once the run has lasted longer than the
/// minimum segment duration, which suppresses single-tick flicker.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentRecord {
    /// Segment id. Monotonically increasing across process restarts; the
    /// high-water mark lives in the preference store.
    pub id: i64,
    /// Coarse activity class held throughout the segment.
    pub flag: BasicActivity,
    /// Display label captured at persistence time.
    pub label: String,
    /// Timestamp (ms) at which this activity run began.
    pub start_ms: u64,
    /// Timestamp (ms) of the latest observation of this run.
    pub end_ms: u64,
    /// `end_ms - start_ms`, stored explicitly for history queries.
    pub interval_ms: u64,
}
