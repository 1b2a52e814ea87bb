// File: driver.rs
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::config::{validate_config, ScanConfig};
use crate::protocol::{self, AttackResult, Verdict};
use crate::stats::ScanState;
use crate::wire::WireClient;
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use log::warn;
use std::io::Write;
use std::sync::Arc;

/// Contiguous chunks sized by ceiling division. Deterministic: the
/// concatenation of all chunks is the input, and no chunk is empty.
pub fn partition_targets(urls: &[String], workers: usize) -> Vec<Vec<String>> {
    if urls.is_empty() || workers == 0 {
        return Vec::new();
    }
    let chunk_size = urls.len().div_ceil(workers);
    urls.chunks(chunk_size).map(|chunk| chunk.to_vec()).collect()
}

/// Runs the attack protocol for every (URL, attack id) pair. URLs are
/// partitioned across a fixed worker pool; each worker walks its partition's
/// pairs sequentially. Workers share only the read-only config, the rate
/// limiter inside the wire client, and the stats counters.
pub async fn run_scan(
    urls: Vec<String>,
    attack_ids: Vec<String>,
    mut config: ScanConfig,
) -> Result<Vec<AttackResult>, Box<dyn std::error::Error + Send + Sync>> {
    validate_config(&mut config);

    if let Some(dir) = &config.output_dir {
        if let Err(e) = std::fs::create_dir_all(dir) {
            warn!("failed to create output directory {}: {}", dir.display(), e);
            eprintln!("[!] Output directory unavailable, persistence disabled: {}", e);
            config.output_dir = None;
        }
    }

    let total_pairs = (urls.len() * attack_ids.len()) as u64;
    let pb = ProgressBar::new(total_pairs);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos:>7}/{len:7} {msg}",
            )?
            .progress_chars("##-"),
    );

    let client = Arc::new(WireClient::new(config.clone()));
    let stats = Arc::new(ScanState::new());
    let attack_ids = Arc::new(attack_ids);

    let mut handles = Vec::new();
    for partition in partition_targets(&urls, config.workers) {
        let client = Arc::clone(&client);
        let stats = Arc::clone(&stats);
        let attack_ids = Arc::clone(&attack_ids);
        let config = config.clone();
        let pb = pb.clone();

        handles.push(tokio::spawn(async move {
            let mut results = Vec::new();
            for url in partition {
                pb.set_message(format!("Probing {}", url));
                for attack_id in attack_ids.iter() {
                    match protocol::run_named_attack(&client, &url, attack_id, &config).await {
                        Ok(Some(result)) => {
                            stats.add_completed();
                            match result.verdict {
                                Verdict::Changed => stats.add_changed(),
                                Verdict::Unchanged => stats.add_unchanged(),
                                Verdict::Indeterminate => stats.add_indeterminate(),
                            }
                            results.push(result);
                        }
                        Ok(None) => stats.add_rejected(),
                        Err(e) => warn!("attack invocation failed for {}: {}", url, e),
                    }
                    pb.inc(1);
                }
            }
            results
        }));
    }

    let mut all_results = Vec::new();
    for handle in handles {
        match handle.await {
            Ok(mut results) => all_results.append(&mut results),
            Err(e) => warn!("worker task failed: {}", e),
        }
    }
    pb.finish_and_clear();

    display_summary(&stats);

    if let Some(dir) = &config.output_dir {
        if let Err(e) = save_results(&all_results, dir) {
            warn!("failed to save results file: {}", e);
        }
    }

    Ok(all_results)
}

fn display_summary(stats: &ScanState) {
    println!("\nScan Summary");
    println!("============");
    println!(
        "Pairs executed: {} ({} rejected)",
        stats.completed(),
        stats.rejected()
    );
    let changed = stats.changed();
    println!(
        "Changed: {}",
        if changed > 0 {
            changed.to_string().red().bold().to_string()
        } else {
            changed.to_string()
        }
    );
    println!("Unchanged: {}", stats.unchanged());
    println!("Indeterminate: {}", stats.indeterminate());
}

fn save_results(
    results: &[AttackResult],
    dir: &std::path::Path,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let timestamp = chrono::Utc::now().format("%Y%m%d_%H%M%S");
    let path = dir.join(format!("cpdos_results_{}.jsonl", timestamp));
    let mut file = std::fs::File::create(&path)?;
    for result in results {
        writeln!(file, "{}", serde_json::to_string(result)?)?;
    }
    println!("Results written to: {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn urls(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("https://host{}.example/", i)).collect()
    }

    #[test]
    fn test_partition_ceiling_division() {
        let parts = partition_targets(&urls(10), 3);
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0].len(), 4);
        assert_eq!(parts[1].len(), 4);
        assert_eq!(parts[2].len(), 2);
    }

    #[test]
    fn test_partition_preserves_order() {
        let input = urls(7);
        let parts = partition_targets(&input, 2);
        let flattened: Vec<String> = parts.into_iter().flatten().collect();
        assert_eq!(flattened, input);
    }

    #[test]
    fn test_partition_more_workers_than_urls() {
        let parts = partition_targets(&urls(2), 8);
        assert_eq!(parts.len(), 2);
        assert!(parts.iter().all(|p| p.len() == 1));
    }

    #[test]
    fn test_partition_empty() {
        assert!(partition_targets(&[], 4).is_empty());
        assert!(partition_targets(&urls(3), 0).is_empty());
    }
}
