//! Liveness is derived, never stored: it combines the explicit status with
//! the time elapsed since the last heartbeat, under a staleness threshold the
//! caller picks at query time.

use crate::service::{ServiceRecord, ServiceStatus};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Liveness {
    Live,
    /// Explicitly marked unhealthy, whether or not it is still heartbeating.
    Unhealthy,
    /// No heartbeat within the threshold.
    Stale,
}

impl Liveness {
    pub fn is_live(self) -> bool {
        self == Liveness::Live
    }
}

fn elapsed(record: &ServiceRecord, now: f64) -> f64 {
    now - record.last_seen
}

pub fn liveness(record: &ServiceRecord, now: f64, timeout: Duration) -> Liveness {
    if record.status == ServiceStatus::Unhealthy {
        Liveness::Unhealthy
    } else if elapsed(record, now) <= timeout.as_secs_f64() {
        Liveness::Live
    } else {
        Liveness::Stale
    }
}

pub fn is_live(record: &ServiceRecord, now: f64, timeout: Duration) -> bool {
    liveness(record, now, timeout).is_live()
}

/// Whether the reaper should remove `record`. Status is ignored.
///
/// A zero timeout reaps every record whose elapsed time is non-negative.
pub fn is_stale(record: &ServiceRecord, now: f64, timeout: Duration) -> bool {
    let elapsed = elapsed(record, now);
    let limit = timeout.as_secs_f64();
    elapsed > limit || (limit == 0.0 && elapsed >= 0.0)
}
