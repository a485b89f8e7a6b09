//! Rolling feature window.
//!
//! Each device stream feeds a fixed-capacity FIFO of the most recent 50
//! six-channel frames, flattened to 300 scalars in arrival order. The
//! window starts zero-filled and is always exactly full: pushing a frame
//! evicts the oldest frame's six values and appends the new six. No other
//! mutation path exists.
//!
//! The owning receiver holds the window behind `&mut`, so a snapshot taken
//! for inference can never observe a half-applied push.

use std::collections::VecDeque;

use crate::types::SensorFrame;

/// Frames held in the rolling window.
pub const WINDOW_SAMPLES: usize = 50;

/// Feature channels per frame (accel x/y/z, gyro x/y/z).
pub const FRAME_CHANNELS: usize = 6;

/// Total scalars in a full window.
pub const WINDOW_LEN: usize = WINDOW_SAMPLES * FRAME_CHANNELS;

/// A flattened copy of the window, laid out as (1, 50, 6) row-major:
/// the classifier input tensor for a batch of one.
pub type WindowSnapshot = [f32; WINDOW_LEN];

/// Fixed-capacity rolling buffer of the latest [`WINDOW_SAMPLES`] frames.
#[derive(Debug, Clone)]
pub struct FeatureWindow {
    values: VecDeque<f32>,
    frames_seen: u64,
}

impl FeatureWindow {
    /// Creates a zero-filled window.
    pub fn new() -> Self {
        let mut values = VecDeque::with_capacity(WINDOW_LEN);
        values.extend(std::iter::repeat(0.0).take(WINDOW_LEN));
        Self {
            values,
            frames_seen: 0,
        }
    }

    /// Appends one frame, evicting the oldest. The buffer length is exactly
    /// [`WINDOW_LEN`] before and after every push.
    pub fn push(&mut self, frame: &SensorFrame) {
        for _ in 0..FRAME_CHANNELS {
            self.values.pop_front();
        }
        for value in frame.channels() {
            self.values.push_back(value);
        }
        self.frames_seen += 1;
        debug_assert_eq!(self.values.len(), WINDOW_LEN);
    }

    /// Number of scalars currently buffered. Always [`WINDOW_LEN`].
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// A window is never empty; it is zero-filled until real frames arrive.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Total frames pushed since construction.
    pub fn frames_seen(&self) -> u64 {
        self.frames_seen
    }

    /// True once every zero-fill slot has been displaced by real data.
    pub fn is_warm(&self) -> bool {
        self.frames_seen >= WINDOW_SAMPLES as u64
    }

    /// Copies the buffer into the flat classifier input layout.
    pub fn snapshot(&self) -> WindowSnapshot {
        let mut out = [0.0; WINDOW_LEN];
        for (slot, value) in out.iter_mut().zip(self.values.iter()) {
            *slot = *value;
        }
        out
    }
}

impl Default for FeatureWindow {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(seq: u64) -> SensorFrame {
        let base = seq as f32 * 10.0;
        SensorFrame::new(
            seq,
            [base, base + 1.0, base + 2.0],
            [base + 3.0, base + 4.0, base + 5.0],
        )
    }

    #[test]
    fn test_window_starts_full_of_zeros() {
        let window = FeatureWindow::new();
        assert_eq!(window.len(), WINDOW_LEN);
        assert!(window.snapshot().iter().all(|v| *v == 0.0));
        assert!(!window.is_warm());
    }

    #[test]
    fn test_length_invariant_under_any_push_count() {
        let mut window = FeatureWindow::new();
        for seq in 0..137 {
            window.push(&frame(seq));
            assert_eq!(window.len(), WINDOW_LEN);
        }
    }

    #[test]
    fn test_partial_fill_keeps_leading_zeros() {
        let mut window = FeatureWindow::new();
        window.push(&frame(0));
        window.push(&frame(1));

        let snap = window.snapshot();
        // 48 zero frames remain in front, the two real frames at the back.
        assert!(snap[..WINDOW_LEN - 2 * FRAME_CHANNELS]
            .iter()
            .all(|v| *v == 0.0));
        let first = frame(0).channels();
        let second = frame(1).channels();
        assert_eq!(
            &snap[WINDOW_LEN - 2 * FRAME_CHANNELS..WINDOW_LEN - FRAME_CHANNELS],
            &first[..]
        );
        assert_eq!(&snap[WINDOW_LEN - FRAME_CHANNELS..], &second[..]);
    }

    #[test]
    fn test_contents_equal_last_50_frames_in_arrival_order() {
        let mut window = FeatureWindow::new();
        let total = 80u64;
        for seq in 0..total {
            window.push(&frame(seq));
        }
        assert!(window.is_warm());

        let snap = window.snapshot();
        let mut expected = Vec::with_capacity(WINDOW_LEN);
        for seq in total - WINDOW_SAMPLES as u64..total {
            expected.extend_from_slice(&frame(seq).channels());
        }
        assert_eq!(snap.as_slice(), expected.as_slice());
    }

    #[test]
    fn test_snapshot_is_a_copy() {
        let mut window = FeatureWindow::new();
        window.push(&frame(0));
        let before = window.snapshot();
        window.push(&frame(1));
        let after = window.snapshot();
        assert_ne!(before.as_slice(), after.as_slice());
        // The older snapshot is unaffected by the later push.
        let first = frame(0).channels();
        assert_eq!(&before[WINDOW_LEN - FRAME_CHANNELS..], &first[..]);
    }
}
