//! Shared test resources for collection and tracker integration tests.

#![allow(dead_code, reason = "each test binary uses a different subset")]

use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use multiclose_core::close::{BoxError, Close, TrackedClose};
use parking_lot::Mutex;
use std::io;
use std::sync::Arc;

/// Records the ids of resources in the order they were closed.
#[derive(Clone, Default)]
pub struct CloseLog(Arc<Mutex<Vec<usize>>>);

impl CloseLog {
    pub fn record(&self, id: usize) {
        self.0.lock().push(id);
    }

    pub fn order(&self) -> Vec<usize> {
        self.0.lock().clone()
    }
}

/// A resource that records its close and optionally fails.
pub struct Resource {
    pub id: usize,
    fail: bool,
    closed: AtomicBool,
    attempts: AtomicUsize,
    log: CloseLog,
}

impl Resource {
    fn build(id: usize, fail: bool, log: &CloseLog) -> Arc<Self> {
        Arc::new(Self {
            id,
            fail,
            closed: AtomicBool::new(false),
            attempts: AtomicUsize::new(0),
            log: log.clone(),
        })
    }

    pub fn new(id: usize, log: &CloseLog) -> Arc<Self> {
        Self::build(id, false, log)
    }

    /// A resource whose close marks it closed and then fails.
    pub fn crasher(id: usize, log: &CloseLog) -> Arc<Self> {
        Self::build(id, true, log)
    }

    pub fn closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl Close for Resource {
    fn close(&self) -> Result<(), BoxError> {
        tracing::debug!(id = self.id, "resource close");
        self.closed.store(true, Ordering::SeqCst);
        self.attempts.fetch_add(1, Ordering::SeqCst);
        self.log.record(self.id);
        if self.fail {
            return Err(io::Error::other(format!("Failed {}", self.id)).into());
        }
        Ok(())
    }
}

impl TrackedClose for Resource {
    fn is_closed(&self) -> bool {
        self.closed()
    }
}

/// A resource that cannot report whether it is closed.
pub struct PlainResource {
    pub id: usize,
    closed: AtomicBool,
    log: CloseLog,
}

impl PlainResource {
    pub fn new(id: usize, log: &CloseLog) -> Arc<Self> {
        Arc::new(Self {
            id,
            closed: AtomicBool::new(false),
            log: log.clone(),
        })
    }

    pub fn closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl Close for PlainResource {
    fn close(&self) -> Result<(), BoxError> {
        self.closed.store(true, Ordering::SeqCst);
        self.log.record(self.id);
        Ok(())
    }
}

/// Messages of the suppressed causes, in order.
pub fn causes(suppressed: &[BoxError]) -> Vec<String> {
    suppressed.iter().map(ToString::to_string).collect()
}
