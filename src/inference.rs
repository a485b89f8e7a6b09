//! Classifier seam and built-in activity models.
//!
//! The pipeline treats a classifier as an opaque function from the rolling
//! window (a flat (1, 50, 6) tensor) to a probability-like vector whose
//! length is the class count. No normalization happens between a model and
//! its observers: raw output values are the confidences.
//!
//! Models are expensive to construct relative to a tick, so [`ModelBank`]
//! loads each one exactly once and hands out shared references for the
//! lifetime of the engine. A failed invocation costs one tick; the window
//! is untouched and the next tick retries independently.
//!
//! The built-in models are deterministic feature-threshold classifiers
//! over window statistics (mean and variance of acceleration magnitude,
//! mean rotation rate, gravity direction). They stand in for the trained
//! networks the host app ships; any backend implementing [`ActivityModel`]
//! plugs into the same seam.

use std::sync::Arc;

use thiserror::Error;

use crate::types::{BASIC_CLASS_COUNT, DETAILED_CLASS_COUNT};
use crate::window::{FRAME_CHANNELS, WINDOW_LEN};

/// Failure modes of a classifier invocation. All are recoverable at the
/// tick level.
#[derive(Debug, Error)]
pub enum InferenceError {
    /// Input tensor is not 50 frames of 6 channels.
    #[error("classifier input shape mismatch: expected {expected} values, got {got}")]
    BadInputShape { expected: usize, got: usize },

    /// Model returned a vector of the wrong length.
    #[error("classifier output shape mismatch: expected {expected} values, got {got}")]
    BadOutputShape { expected: usize, got: usize },

    /// The backing inference engine failed.
    #[error("classifier backend failure: {0}")]
    Backend(String),
}

/// An opaque activity classifier.
///
/// Contract: `infer` receives the rolling window flattened to
/// [`WINDOW_LEN`] scalars and returns a vector of exactly `class_count()`
/// raw confidence values. Implementations must be deterministic: the same
/// input always yields the same output.
pub trait ActivityModel: Send + Sync {
    /// Length of the output vector.
    fn class_count(&self) -> usize;

    /// Runs one classification over a window snapshot.
    fn infer(&self, input: &[f32]) -> Result<Vec<f32>, InferenceError>;
}

/// The engine's loaded classifiers, constructed once and shared.
///
/// Three slots mirror the three deployed models: the coarse 4-class chest
/// model and one fine-grained 14-class model per device.
pub struct ModelBank {
    basic: Arc<dyn ActivityModel>,
    detailed_chest: Arc<dyn ActivityModel>,
    detailed_wrist: Arc<dyn ActivityModel>,
}

impl ModelBank {
    /// Assembles a bank from explicit backends.
    pub fn new(
        basic: Arc<dyn ActivityModel>,
        detailed_chest: Arc<dyn ActivityModel>,
        detailed_wrist: Arc<dyn ActivityModel>,
    ) -> Self {
        Self {
            basic,
            detailed_chest,
            detailed_wrist,
        }
    }

    /// The built-in deterministic models with default thresholds.
    pub fn builtin() -> Self {
        Self::new(
            Arc::new(CoarsePostureModel::default()),
            Arc::new(FinePostureModel::default()),
            Arc::new(FinePostureModel::default()),
        )
    }

    /// Coarse 4-class inference over a chest window.
    pub fn infer_basic(&self, input: &[f32]) -> Result<Vec<f32>, InferenceError> {
        Self::checked(self.basic.as_ref(), input)
    }

    /// Fine-grained 14-class inference over a chest window.
    pub fn infer_detailed_chest(&self, input: &[f32]) -> Result<Vec<f32>, InferenceError> {
        Self::checked(self.detailed_chest.as_ref(), input)
    }

    /// Fine-grained 14-class inference over a wrist window.
    pub fn infer_detailed_wrist(&self, input: &[f32]) -> Result<Vec<f32>, InferenceError> {
        Self::checked(self.detailed_wrist.as_ref(), input)
    }

    /// Enforces the tensor contract on both sides of a model call.
    fn checked(model: &dyn ActivityModel, input: &[f32]) -> Result<Vec<f32>, InferenceError> {
        if input.len() != WINDOW_LEN {
            return Err(InferenceError::BadInputShape {
                expected: WINDOW_LEN,
                got: input.len(),
            });
        }
        let output = model.infer(input)?;
        if output.len() != model.class_count() {
            return Err(InferenceError::BadOutputShape {
                expected: model.class_count(),
                got: output.len(),
            });
        }
        Ok(output)
    }
}

// ============================================================================
// WINDOW FEATURES
// ============================================================================

/// Statistics extracted from one window snapshot.
#[derive(Debug, Clone, Copy)]
struct WindowFeatures {
    /// Sample variance of acceleration magnitude.
    accel_variance: f32,
    /// Mean rotation magnitude (rad/s).
    gyro_mean: f32,
    /// Mean acceleration vector: the gravity estimate for static postures.
    gravity: [f32; 3],
}

impl WindowFeatures {
    fn extract(input: &[f32]) -> Self {
        let frames = input.len() / FRAME_CHANNELS;
        let mut accel_sum = 0.0f32;
        let mut gyro_sum = 0.0f32;
        let mut gravity = [0.0f32; 3];
        let mut magnitudes = Vec::with_capacity(frames);

        for frame in input.chunks_exact(FRAME_CHANNELS) {
            let (ax, ay, az) = (frame[0], frame[1], frame[2]);
            let (gx, gy, gz) = (frame[3], frame[4], frame[5]);
            let accel_mag = (ax * ax + ay * ay + az * az).sqrt();
            let gyro_mag = (gx * gx + gy * gy + gz * gz).sqrt();

            accel_sum += accel_mag;
            gyro_sum += gyro_mag;
            gravity[0] += ax;
            gravity[1] += ay;
            gravity[2] += az;
            magnitudes.push(accel_mag);
        }

        let n = frames.max(1) as f32;
        let accel_mean = accel_sum / n;
        let gyro_mean = gyro_sum / n;
        gravity[0] /= n;
        gravity[1] /= n;
        gravity[2] /= n;

        let accel_variance = if frames > 1 {
            let sum_sq_dev: f32 = magnitudes
                .iter()
                .map(|m| {
                    let dev = m - accel_mean;
                    dev * dev
                })
                .sum();
            sum_sq_dev / (n - 1.0)
        } else {
            0.0
        };

        Self {
            accel_variance,
            gyro_mean,
            gravity,
        }
    }

    /// Unit gravity direction, zero when the window is silent.
    fn gravity_direction(&self) -> [f32; 3] {
        let [x, y, z] = self.gravity;
        let mag = (x * x + y * y + z * z).sqrt();
        if mag < 1e-6 {
            [0.0, 0.0, 0.0]
        } else {
            [x / mag, y / mag, z / mag]
        }
    }
}

/// Soft evidence in [0, 1): zero at `value = 0`, one half at
/// `value = scale`, saturating toward one.
fn evidence(value: f32, scale: f32) -> f32 {
    let value = value.max(0.0);
    value / (value + scale)
}

/// Normalizes scores into a probability-like vector. A silent window (all
/// scores zero) yields the uniform distribution.
fn normalize(scores: &mut [f32]) {
    let sum: f32 = scores.iter().sum();
    if sum > 1e-9 {
        for score in scores.iter_mut() {
            *score /= sum;
        }
    } else {
        let uniform = 1.0 / scores.len() as f32;
        for score in scores.iter_mut() {
            *score = uniform;
        }
    }
}

// ============================================================================
// COARSE 4-CLASS MODEL
// ============================================================================

/// Thresholds for the coarse posture classifier.
#[derive(Debug, Clone)]
pub struct CoarseModelConfig {
    /// Accel-magnitude variance at which walking evidence reaches 0.5.
    pub walk_variance: f32,
    /// Accel-magnitude variance at which running evidence reaches 0.5.
    pub run_variance: f32,
}

impl Default for CoarseModelConfig {
    fn default() -> Self {
        Self {
            walk_variance: 1.0,
            run_variance: 9.0,
        }
    }
}

/// Built-in 4-class classifier: sitting/standing, lying, walking, running.
///
/// Motion intensity (variance of acceleration magnitude) separates static
/// from locomotive classes; gravity direction separates upright from
/// horizontal static postures.
#[derive(Debug, Clone, Default)]
pub struct CoarsePostureModel {
    config: CoarseModelConfig,
}

impl CoarsePostureModel {
    pub fn new(config: CoarseModelConfig) -> Self {
        Self { config }
    }
}

impl ActivityModel for CoarsePostureModel {
    fn class_count(&self) -> usize {
        BASIC_CLASS_COUNT
    }

    fn infer(&self, input: &[f32]) -> Result<Vec<f32>, InferenceError> {
        if input.len() != WINDOW_LEN {
            return Err(InferenceError::BadInputShape {
                expected: WINDOW_LEN,
                got: input.len(),
            });
        }

        let features = WindowFeatures::extract(input);
        let motion = evidence(features.accel_variance, self.config.walk_variance);
        let running = evidence(features.accel_variance, self.config.run_variance);
        let still = 1.0 - motion;
        let vertical = features.gravity_direction()[2].abs();

        let mut scores = vec![
            still * vertical,         // sitting / standing
            still * (1.0 - vertical), // lying down
            motion * (1.0 - running), // walking
            motion * running,         // running
        ];
        normalize(&mut scores);
        Ok(scores)
    }
}

// ============================================================================
// FINE-GRAINED 14-CLASS MODEL
// ============================================================================

/// Thresholds for the fine-grained posture classifier.
#[derive(Debug, Clone)]
pub struct FineModelConfig {
    /// Accel-magnitude variance at which locomotion evidence reaches 0.5.
    pub walk_variance: f32,
    /// Accel-magnitude variance at which running evidence reaches 0.5.
    pub run_variance: f32,
    /// Mean rotation rate at which stair evidence reaches 0.5 (rad/s).
    pub stair_gyro: f32,
    /// Forward/backward gravity shift at which lean evidence reaches 0.5.
    pub lean_scale: f32,
    /// Share of locomotion mass assigned to undirected movement.
    pub movement_share: f32,
}

impl Default for FineModelConfig {
    fn default() -> Self {
        Self {
            walk_variance: 1.0,
            run_variance: 9.0,
            stair_gyro: 0.6,
            lean_scale: 0.25,
            movement_share: 0.15,
        }
    }
}

/// Built-in 14-class classifier over detailed postures and transitions.
///
/// Locomotion classes split by motion intensity and rotation; upright
/// static classes split by forward/backward lean; lying classes split by
/// which horizontal axis carries gravity and with which sign.
#[derive(Debug, Clone, Default)]
pub struct FinePostureModel {
    config: FineModelConfig,
}

impl FinePostureModel {
    pub fn new(config: FineModelConfig) -> Self {
        Self { config }
    }
}

impl ActivityModel for FinePostureModel {
    fn class_count(&self) -> usize {
        DETAILED_CLASS_COUNT
    }

    fn infer(&self, input: &[f32]) -> Result<Vec<f32>, InferenceError> {
        if input.len() != WINDOW_LEN {
            return Err(InferenceError::BadInputShape {
                expected: WINDOW_LEN,
                got: input.len(),
            });
        }

        let cfg = &self.config;
        let features = WindowFeatures::extract(input);
        let [ux, uy, uz] = features.gravity_direction();

        let motion = evidence(features.accel_variance, cfg.walk_variance);
        let running = evidence(features.accel_variance, cfg.run_variance);
        let stair = evidence(features.gyro_mean, cfg.stair_gyro);
        let still = 1.0 - motion;
        let vertical = uz.abs();
        let horizontal = 1.0 - vertical;

        // Locomotion family.
        let run_score = motion * running;
        let stairs_score = motion * (1.0 - running) * stair;
        let walk_score = motion * (1.0 - running) * (1.0 - stair);
        let movement_score = motion * cfg.movement_share;

        // Upright static family, split by lean direction.
        let upright = still * vertical;
        let lean_forward = evidence(uy, cfg.lean_scale);
        let lean_backward = evidence(-uy, cfg.lean_scale);
        let neutral = upright * (1.0 - lean_forward.max(lean_backward));
        let bent_forward = upright * lean_forward;
        let bent_backward = upright * lean_backward;

        // Lying family, split by which horizontal axis holds gravity.
        let lying = still * horizontal;
        let axis_sum = ux.abs() + uy.abs();
        let side_weight = if axis_sum > 1e-6 {
            ux.abs() / axis_sum
        } else {
            0.5
        };
        let front_weight = 1.0 - side_weight;
        let lying_left = lying * side_weight * if ux > 0.0 { 1.0 } else { 0.0 };
        let lying_right = lying * side_weight * if ux <= 0.0 { 1.0 } else { 0.0 };
        let lying_stomach = lying * front_weight * if uy > 0.0 { 1.0 } else { 0.0 };
        let lying_back = lying * front_weight * if uy <= 0.0 { 1.0 } else { 0.0 };

        let mut scores = vec![
            stairs_score * 0.5, // climbing stairs
            stairs_score * 0.5, // descending stairs
            neutral * 0.25,     // desk work
            neutral * 0.40,     // sitting
            bent_forward,       // sitting bent forward
            bent_backward,      // sitting bent backward
            neutral * 0.35,     // standing
            lying_left,         // lying down left
            lying_back,         // lying down on back
            lying_stomach,      // lying down on stomach
            lying_right,        // lying down right
            movement_score,     // movement
            run_score,          // running
            walk_score,         // walking
        ];
        normalize(&mut scores);
        Ok(scores)
    }
}
