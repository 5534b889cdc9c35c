//! Shared refresh status for the /status endpoint.
//! Written by the refresh orchestrator, read by the API.

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Mutex;

use serde::Serialize;

use crate::refresh::RefreshState;

#[derive(Default)]
pub struct RefreshStatus {
    state: AtomicU8,
    cycles_completed: AtomicU64,
    /// Nanosecond timestamp the current or last cycle started (0 = never).
    last_cycle_started_ns: AtomicU64,
    /// Nanosecond timestamp of the last successful publish (0 = never).
    last_published_ns: AtomicU64,
    collector_failures: AtomicU64,
    last_error: Mutex<Option<String>>,
}

/// Point-in-time copy for serialization.
#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    pub state: RefreshState,
    pub cycles_completed: u64,
    pub last_cycle_started_ns: Option<u64>,
    pub last_published_ns: Option<u64>,
    pub collector_failures: u64,
    pub last_error: Option<String>,
}

impl RefreshStatus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_state(&self, state: RefreshState) {
        self.state.store(state as u8, Ordering::Relaxed);
    }

    pub fn state(&self) -> RefreshState {
        RefreshState::from_u8(self.state.load(Ordering::Relaxed))
    }

    pub fn begin_cycle(&self, now_ns: u64) {
        self.last_cycle_started_ns.store(now_ns, Ordering::Relaxed);
    }

    pub fn finish_cycle(&self) {
        self.cycles_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_publish(&self, now_ns: u64) {
        self.last_published_ns.store(now_ns, Ordering::Relaxed);
    }

    pub fn record_collector_failure(&self) {
        self.collector_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self, msg: impl Into<String>) {
        let mut slot = self.last_error.lock().unwrap_or_else(|e| e.into_inner());
        *slot = Some(msg.into());
    }

    pub fn cycles_completed(&self) -> u64 {
        self.cycles_completed.load(Ordering::Relaxed)
    }

    pub fn collector_failures(&self) -> u64 {
        self.collector_failures.load(Ordering::Relaxed)
    }

    pub fn last_error(&self) -> Option<String> {
        self.last_error
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        let nonzero = |v: u64| (v != 0).then_some(v);
        StatusSnapshot {
            state: self.state(),
            cycles_completed: self.cycles_completed(),
            last_cycle_started_ns: nonzero(self.last_cycle_started_ns.load(Ordering::Relaxed)),
            last_published_ns: nonzero(self.last_published_ns.load(Ordering::Relaxed)),
            collector_failures: self.collector_failures(),
            last_error: self.last_error(),
        }
    }
}
