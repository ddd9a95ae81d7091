//! Request lifecycle bookkeeping shared by the state containers.
//!
//! Every remote operation a container exposes owns one [`RequestSlot`]. The
//! slot tracks the request's [`RequestStatus`], the latest failure message,
//! and a monotonically increasing stamp per attempt. Completions carry their
//! stamp back to the slot, which lets it discard results of attempts that a
//! newer attempt has superseded instead of applying them out of order.

use std::fmt;

use tracing::{debug, warn};

// ============================================================================
// Request Status
// ============================================================================

/// Lifecycle phase of one asynchronous operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequestStatus {
    /// Never attempted since the container was created
    #[default]
    Idle,
    /// An attempt is in flight
    Pending,
    /// The latest settled attempt succeeded
    Fulfilled,
    /// The latest settled attempt failed
    Rejected,
}

impl RequestStatus {
    pub fn is_pending(self) -> bool {
        self == RequestStatus::Pending
    }

    pub fn is_fulfilled(self) -> bool {
        self == RequestStatus::Fulfilled
    }

    pub fn is_rejected(self) -> bool {
        self == RequestStatus::Rejected
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RequestStatus::Idle => "idle",
            RequestStatus::Pending => "pending",
            RequestStatus::Fulfilled => "fulfilled",
            RequestStatus::Rejected => "rejected",
        };
        f.write_str(s)
    }
}

// ============================================================================
// Request Slot
// ============================================================================

/// Status, latest error, and attempt stamping for one operation.
///
/// `issued` identifies the current attempt. [`RequestSlot::settle`] applies
/// an outcome only when the caller presents the current stamp, so an attempt
/// that was superseded by [`RequestSlot::begin_superseding`] can complete in
/// any order without clobbering newer state.
#[derive(Debug)]
pub struct RequestSlot {
    /// Operation label used in logs
    name: &'static str,
    status: RequestStatus,
    error: Option<String>,
    issued: u64,
}

/// Read-only view of a slot, embedded in container snapshots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestSnapshot {
    pub status: RequestStatus,
    pub error: Option<String>,
}

impl RequestSlot {
    pub fn new(name: &'static str) -> Self {
        RequestSlot {
            name,
            status: RequestStatus::Idle,
            error: None,
            issued: 0,
        }
    }

    pub fn status(&self) -> RequestStatus {
        self.status
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_pending(&self) -> bool {
        self.status.is_pending()
    }

    pub fn snapshot(&self) -> RequestSnapshot {
        RequestSnapshot {
            status: self.status,
            error: self.error.clone(),
        }
    }

    /// Begin a new attempt unless one is already in flight.
    ///
    /// Returns the stamp to settle with, or `None` when an equivalent
    /// attempt is pending and the caller should coalesce onto it.
    pub fn begin(&mut self) -> Option<u64> {
        if self.is_pending() {
            debug!(op = self.name, stamp = self.issued, "Coalescing onto in-flight request");
            return None;
        }
        Some(self.begin_superseding())
    }

    /// Begin a new attempt unconditionally.
    ///
    /// Any attempt still in flight keeps running, but its stamp is no longer
    /// current and [`RequestSlot::settle`] will discard its outcome.
    pub fn begin_superseding(&mut self) -> u64 {
        self.issued += 1;
        self.status = RequestStatus::Pending;
        self.error = None;
        self.issued
    }

    /// Settle the attempt identified by `stamp`.
    ///
    /// Returns `true` when the outcome was applied. Returns `false` when a
    /// newer attempt superseded this one, in which case the slot is left
    /// untouched and the caller must drop the attempt's payload as well.
    pub fn settle(&mut self, stamp: u64, outcome: Result<(), String>) -> bool {
        if stamp != self.issued {
            debug!(
                op = self.name,
                stamp,
                current = self.issued,
                "Discarding completion of superseded request"
            );
            return false;
        }
        match outcome {
            Ok(()) => {
                self.status = RequestStatus::Fulfilled;
                self.error = None;
            }
            Err(message) => {
                warn!(op = self.name, stamp, error = %message, "Request rejected");
                self.status = RequestStatus::Rejected;
                self.error = Some(message);
            }
        }
        true
    }
}
