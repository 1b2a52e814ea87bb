// File: config.rs
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::path::PathBuf;
use std::time::Duration;

/// Shared, read-only configuration for one scan run. Built once from the CLI
/// before fan-out and never mutated afterwards.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    pub verbose: bool,
    pub validate: bool,
    pub baseline_ext: Option<String>,
    pub attack_ext: Option<String>,
    pub output_dir: Option<PathBuf>,
    pub workers: usize,
    pub rate_limit: u32,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            verbose: false,
            validate: false,
            baseline_ext: None,
            attack_ext: None,
            output_dir: None,
            workers: 4,
            rate_limit: 10,
            connect_timeout: Duration::from_millis(3000),
            read_timeout: Duration::from_millis(5000),
        }
    }
}

pub fn validate_config(config: &mut ScanConfig) {
    if config.workers == 0 {
        config.workers = 1;
    }
    if config.workers > 64 {
        config.workers = 64;
    }
    if config.rate_limit == 0 {
        config.rate_limit = 1;
    }
    // Zero timeouts would reintroduce indefinite stalls on dead sockets.
    if config.connect_timeout.is_zero() {
        config.connect_timeout = Duration::from_millis(3000);
    }
    if config.read_timeout.is_zero() {
        config.read_timeout = Duration::from_millis(5000);
    }
}
