// File: cli.rs
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::config::ScanConfig;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(
    name = env!("CARGO_PKG_NAME"),
    version = env!("CARGO_PKG_VERSION"),
    about = env!("CARGO_PKG_DESCRIPTION"),
)]
pub struct Cli {
    #[arg(short = 'u', long = "url", help = "Target URL (single mode)")]
    pub url: Option<String>,

    #[arg(
        short = 'i',
        long = "input-file",
        help = "File containing URLs (batch mode)"
    )]
    pub input_file: Option<String>,

    #[arg(
        short = 'a',
        long = "attack",
        help = "Attack type (HHO, HMC, HMO, ALL)"
    )]
    pub attack: String,

    #[arg(short = 'v', long = "verbose", help = "Show all request details")]
    pub verbose: bool,

    #[arg(
        long = "validate",
        help = "Compare baseline vs. post-attack responses"
    )]
    pub validate: bool,

    #[arg(
        long = "ext1",
        help = "Path extension for baseline (also used by attack if ext2 not given)"
    )]
    pub baseline_ext: Option<String>,

    #[arg(
        long = "ext2",
        help = "Path extension for attack/post (only used if ext1 is also set)"
    )]
    pub attack_ext: Option<String>,

    #[arg(
        long = "all-urls-per-domain",
        help = "Keep every URL per domain instead of one"
    )]
    pub all_urls_per_domain: bool,

    #[arg(
        short = 'o',
        long = "output-dir",
        help = "Directory to save raw HTTP responses"
    )]
    pub output_dir: Option<PathBuf>,

    #[arg(short = 'w', long = "workers", default_value_t = 4)]
    pub workers: usize,

    #[arg(
        short = 'r',
        long = "rate-limit",
        default_value_t = 10,
        help = "Requests per second across all workers"
    )]
    pub rate_limit: u32,

    #[arg(
        long = "connect-timeout",
        default_value_t = 3000,
        help = "Connect/TLS handshake timeout in milliseconds"
    )]
    pub connect_timeout: u64,

    #[arg(
        long = "read-timeout",
        default_value_t = 5000,
        help = "Response read timeout in milliseconds"
    )]
    pub read_timeout: u64,

    #[arg(long = "log-level", default_value = "warn")]
    pub log_level: String,
}

impl Cli {
    pub fn to_scan_config(&self) -> ScanConfig {
        ScanConfig {
            verbose: self.verbose,
            validate: self.validate,
            baseline_ext: self.baseline_ext.clone(),
            attack_ext: self.attack_ext.clone(),
            output_dir: self.output_dir.clone(),
            workers: self.workers,
            rate_limit: self.rate_limit,
            connect_timeout: Duration::from_millis(self.connect_timeout),
            read_timeout: Duration::from_millis(self.read_timeout),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_invocation() {
        let cli = Cli::try_parse_from(["cpdos-probe", "-a", "HHO"]).unwrap();
        assert_eq!(cli.attack, "HHO");
        assert!(cli.url.is_none());
        assert!(!cli.validate);
        assert_eq!(cli.workers, 4);
    }

    #[test]
    fn test_attack_is_required() {
        assert!(Cli::try_parse_from(["cpdos-probe"]).is_err());
    }

    #[test]
    fn test_full_invocation_maps_to_config() {
        let cli = Cli::try_parse_from([
            "cpdos-probe",
            "-u",
            "https://example.com/",
            "-a",
            "ALL",
            "--validate",
            "--ext1",
            "css",
            "--ext2",
            "js",
            "-o",
            "out",
            "-w",
            "8",
            "--connect-timeout",
            "1000",
            "--read-timeout",
            "2000",
        ])
        .unwrap();
        let config = cli.to_scan_config();
        assert!(config.validate);
        assert_eq!(config.baseline_ext.as_deref(), Some("css"));
        assert_eq!(config.attack_ext.as_deref(), Some("js"));
        assert_eq!(config.workers, 8);
        assert_eq!(config.connect_timeout, Duration::from_millis(1000));
        assert_eq!(config.read_timeout, Duration::from_millis(2000));
        assert_eq!(config.output_dir.as_deref(), Some(std::path::Path::new("out")));
    }
}
