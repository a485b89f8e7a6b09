//! Activity segment tracking.
//!
//! A segment is one continuous run of a single predicted coarse activity.
//! The tracker is a two-state machine fed by the top-1 coarse prediction
//! of every chest tick:
//!
//! - no active segment: the first observation opens one, drawing its id
//!   from the durable counter in the preference store
//! - active segment, flag differs: the open segment is abandoned and a new
//!   one opens under the next id. The abandoned run is not written to
//!   history; only continuation writes below do.
//! - active segment, flag matches: once the run exceeds the minimum
//!   duration it is persisted, and each further matching tick re-persists
//!   the same id with a growing end time. The durable id counter advances
//!   with the persist, so ids stay monotonic across process restarts.
//!
//! There is no terminal state. In-memory state dies with the process; the
//! history rows and the id counter are the only durable outputs.

use log::debug;
use thiserror::Error;

use crate::prefs::{PrefError, PrefStore};
use crate::store::{HistoryStore, StoreError};
use crate::types::{BasicActivity, SegmentRecord};

/// Runs at or below this duration are never persisted, suppressing
/// single-tick prediction flicker.
pub const MIN_SEGMENT_MS: u64 = 1000;

/// Segment persistence failures.
#[derive(Debug, Error)]
pub enum TrackError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Pref(#[from] PrefError),
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum TrackerState {
    /// No observation has arrived yet.
    Idle,
    /// An activity run is open.
    Active {
        id: i64,
        flag: BasicActivity,
        start_ms: u64,
    },
}

/// State machine turning per-tick coarse predictions into history rows.
#[derive(Debug)]
pub struct SegmentTracker {
    state: TrackerState,
    min_segment_ms: u64,
}

impl SegmentTracker {
    pub fn new() -> Self {
        Self::with_threshold(MIN_SEGMENT_MS)
    }

    /// Tracker with a custom persistence threshold.
    pub fn with_threshold(min_segment_ms: u64) -> Self {
        Self {
            state: TrackerState::Idle,
            min_segment_ms,
        }
    }

    /// Feeds one top-1 coarse prediction into the machine.
    ///
    /// Returns the persisted record when this tick crossed (or re-crossed)
    /// the persistence threshold, `None` otherwise.
    pub fn observe(
        &mut self,
        flag: BasicActivity,
        now_ms: u64,
        history: &HistoryStore,
        prefs: &PrefStore,
    ) -> Result<Option<SegmentRecord>, TrackError> {
        match self.state {
            TrackerState::Idle => {
                let last = prefs.last_segment_id();
                let id = if last == 0 {
                    // Nothing was ever persisted on this install; claim id 1
                    // and record the claim immediately.
                    prefs.set_last_segment_id(1)?;
                    1
                } else {
                    last + 1
                };
                debug!("opening segment {id} ({})", flag.label());
                self.state = TrackerState::Active {
                    id,
                    flag,
                    start_ms: now_ms,
                };
                Ok(None)
            }

            TrackerState::Active { id, flag: current, .. } if flag != current => {
                // The abandoned run's duration is dropped, not recorded.
                debug!(
                    "segment {id} ended ({} -> {}), opening segment {}",
                    current.label(),
                    flag.label(),
                    id + 1
                );
                self.state = TrackerState::Active {
                    id: id + 1,
                    flag,
                    start_ms: now_ms,
                };
                Ok(None)
            }

            TrackerState::Active { id, flag: current, start_ms } => {
                let interval_ms = now_ms.saturating_sub(start_ms);
                if interval_ms <= self.min_segment_ms {
                    return Ok(None);
                }
                let record = SegmentRecord {
                    id,
                    flag: current,
                    label: current.label().to_string(),
                    start_ms,
                    end_ms: now_ms,
                    interval_ms,
                };
                history.insert(&record)?;
                prefs.set_last_segment_id(id)?;
                Ok(Some(record))
            }
        }
    }

    /// The id of the currently open segment, if any.
    pub fn active_segment_id(&self) -> Option<i64> {
        match self.state {
            TrackerState::Idle => None,
            TrackerState::Active { id, .. } => Some(id),
        }
    }

    /// The flag of the currently open segment, if any.
    pub fn active_flag(&self) -> Option<BasicActivity> {
        match self.state {
            TrackerState::Idle => None,
            TrackerState::Active { flag, .. } => Some(flag),
        }
    }
}

impl Default for SegmentTracker {
    fn default() -> Self {
        Self::new()
    }
}
