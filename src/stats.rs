// File: stats.rs
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::sync::atomic::{AtomicU64, Ordering};

/// Run-wide counters, shared across workers. Plain relaxed atomics: the
/// numbers only feed the end-of-run summary.
#[derive(Debug)]
pub struct ScanState {
    completed: AtomicU64,
    changed: AtomicU64,
    unchanged: AtomicU64,
    indeterminate: AtomicU64,
    rejected: AtomicU64,
}

impl ScanState {
    pub fn new() -> Self {
        Self {
            completed: AtomicU64::new(0),
            changed: AtomicU64::new(0),
            unchanged: AtomicU64::new(0),
            indeterminate: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
        }
    }

    pub fn add_completed(&self) {
        self.completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_changed(&self) {
        self.changed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_unchanged(&self) {
        self.unchanged.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_indeterminate(&self) {
        self.indeterminate.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::Relaxed)
    }

    pub fn changed(&self) -> u64 {
        self.changed.load(Ordering::Relaxed)
    }

    pub fn unchanged(&self) -> u64 {
        self.unchanged.load(Ordering::Relaxed)
    }

    pub fn indeterminate(&self) -> u64 {
        self.indeterminate.load(Ordering::Relaxed)
    }

    pub fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }
}
