// File: main.rs
// SPDX-License-Identifier: MIT OR Apache-2.0

use clap::Parser;
use cpdos_probe::attacks;
use cpdos_probe::cli::Cli;
use cpdos_probe::driver;
use cpdos_probe::urls;
use log::LevelFilter;
use std::io::{BufRead, IsTerminal};
use std::str::FromStr;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_level = LevelFilter::from_str(&cli.log_level).unwrap_or(LevelFilter::Warn);
    if let Err(e) = simple_logger::SimpleLogger::new().with_level(log_level).init() {
        eprintln!("[!] Failed to initialize logger: {}", e);
    }

    // Reject an unknown selector before any request is sent.
    let attack_kinds = match attacks::resolve_selector(&cli.attack) {
        Ok(kinds) => kinds,
        Err(e) => {
            eprintln!("[!] {}", e);
            std::process::exit(1);
        }
    };
    let attack_ids: Vec<String> = attack_kinds.iter().map(|k| k.id().to_string()).collect();

    let targets = match collect_targets(&cli) {
        Ok(targets) => targets,
        Err(e) => {
            eprintln!("[!] Error reading targets: {}", e);
            std::process::exit(1);
        }
    };
    if targets.is_empty() {
        eprintln!("[!] No valid URLs found. Provide -u or -i, or pipe URLs via STDIN.");
        std::process::exit(1);
    }

    let config = cli.to_scan_config();
    if let Err(e) = driver::run_scan(targets, attack_ids, config).await {
        eprintln!("[!] Scan failed: {}", e);
        std::process::exit(1);
    }
}

fn collect_targets(cli: &Cli) -> Result<Vec<String>, std::io::Error> {
    let single_per_domain = !cli.all_urls_per_domain;

    if let Some(url) = &cli.url {
        return Ok(vec![url.trim().to_string()]);
    }

    if let Some(input_file) = &cli.input_file {
        let content = std::fs::read_to_string(input_file)?;
        let lines: Vec<String> = content.lines().map(|l| l.to_string()).collect();
        return Ok(urls::extract_urls(&lines, single_per_domain));
    }

    let stdin = std::io::stdin();
    if stdin.is_terminal() {
        return Ok(Vec::new());
    }
    let lines: Vec<String> = stdin.lock().lines().collect::<Result<_, _>>()?;
    Ok(urls::extract_urls(&lines, single_per_domain))
}
