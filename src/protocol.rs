// File: protocol.rs
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::attacks::AttackKind;
use crate::config::ScanConfig;
use crate::urls;
use crate::wire::{RequestOutcome, WireClient};
use colored::*;
use log::warn;
use serde::Serialize;
use std::path::Path;

/// Outcome of the baseline/post-attack comparison.
///
/// `Indeterminate` covers a wire failure in the baseline or post-attack
/// phase: with one side all-absent there is nothing sound to diff, so the
/// verdict is neither "changed" nor "unchanged" and reports as success =
/// false. It is never collapsed into `Unchanged`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Verdict {
    Changed,
    Unchanged,
    Indeterminate,
}

/// Everything one (URL, attack type) invocation produced. Built fresh per
/// invocation and never mutated afterwards.
#[derive(Debug, Clone, Serialize)]
pub struct AttackResult {
    pub url: String,
    pub attack: AttackKind,
    pub baseline: Option<RequestOutcome>,
    pub attack_outcome: RequestOutcome,
    pub post: Option<RequestOutcome>,
    pub verdict: Verdict,
}

impl AttackResult {
    pub fn changed(&self) -> bool {
        self.verdict == Verdict::Changed
    }
}

/// Baseline vs. post-attack diff over status, body length and body hash. The
/// attack phase is the stimulus and takes no part in the comparison.
pub fn compare_outcomes(baseline: &RequestOutcome, post: &RequestOutcome) -> Verdict {
    if baseline.is_failure() || post.is_failure() {
        return Verdict::Indeterminate;
    }
    if baseline.status != post.status
        || baseline.body_len != post.body_len
        || baseline.body_hash != post.body_hash
    {
        Verdict::Changed
    } else {
        Verdict::Unchanged
    }
}

/// Without a baseline/post pair, "changed" degrades to: the attack response
/// showed a cache indicator at all.
pub fn attack_only_verdict(attack_outcome: &RequestOutcome) -> Verdict {
    if attack_outcome.x_cache.is_some() {
        Verdict::Changed
    } else {
        Verdict::Unchanged
    }
}

/// Entry point used by the fan-out driver. An unknown attack identifier
/// rejects this single invocation with a diagnostic and sends nothing.
pub async fn run_named_attack(
    client: &WireClient,
    target_url: &str,
    attack_id: &str,
    config: &ScanConfig,
) -> Result<Option<AttackResult>, Box<dyn std::error::Error + Send + Sync>> {
    let attack: AttackKind = match attack_id.parse() {
        Ok(attack) => attack,
        Err(e) => {
            warn!("rejecting {} against {}: {}", attack_id, target_url, e);
            eprintln!("[!] {}", e);
            return Ok(None);
        }
    };
    run_attack(client, target_url, attack, config).await.map(Some)
}

/// The three-phase protocol for one (URL, attack type) pair:
/// optional baseline, attack stimulus, optional post-attack re-request
/// against the exact cache key the attack tried to poison.
pub async fn run_attack(
    client: &WireClient,
    target_url: &str,
    attack: AttackKind,
    config: &ScanConfig,
) -> Result<AttackResult, Box<dyn std::error::Error + Send + Sync>> {
    if config.verbose || !config.validate {
        println!("[*] Executing {} attack on {}...", attack.label(), target_url);
    }

    let (base_url, atk_url) = match (&config.baseline_ext, &config.attack_ext) {
        (Some(baseline_ext), None) => {
            let rewritten = urls::rewrite_extension(target_url, baseline_ext)?;
            (rewritten.clone(), rewritten)
        }
        (Some(baseline_ext), Some(attack_ext)) => (
            urls::rewrite_extension(target_url, baseline_ext)?,
            urls::rewrite_extension(target_url, attack_ext)?,
        ),
        _ => (target_url.to_string(), target_url.to_string()),
    };

    // Distinct cache busters: the baseline must not populate the key the
    // attack goes after.
    let baseline_cb = urls::random_cache_buster();
    let attack_cb = urls::random_cache_buster();

    let baseline = if config.validate {
        let baseline_url = urls::append_cache_buster(&base_url, &baseline_cb)?;
        Some(client.send(&baseline_url, &[]).await)
    } else {
        None
    };

    let attack_url = urls::append_cache_buster(&atk_url, &attack_cb)?;
    let attack_outcome = client.send(&attack_url, &attack.headers()).await;

    // Same URL, same cache buster: the post-attack check must hit the exact
    // cache key the attack attempted to poison.
    let post = if config.validate {
        Some(client.send(&attack_url, &[]).await)
    } else {
        None
    };

    let verdict = match (&baseline, &post) {
        (Some(b), Some(p)) => compare_outcomes(b, p),
        _ => attack_only_verdict(&attack_outcome),
    };

    let result = AttackResult {
        url: target_url.to_string(),
        attack,
        baseline,
        attack_outcome,
        post,
        verdict,
    };

    report(&result, config);

    if let Some(dir) = &config.output_dir {
        persist(&result, &base_url, &atk_url, dir, config);
    }

    Ok(result)
}

fn fmt_status(outcome: Option<&RequestOutcome>) -> String {
    match outcome.and_then(|o| o.status) {
        Some(status) => status.to_string(),
        None => "-".to_string(),
    }
}

fn fmt_len(outcome: Option<&RequestOutcome>) -> String {
    match outcome.and_then(|o| o.body_len) {
        Some(len) => len.to_string(),
        None => "-".to_string(),
    }
}

fn report(result: &AttackResult, config: &ScanConfig) {
    match result.verdict {
        Verdict::Changed if config.validate => {
            let baseline = result.baseline.as_ref();
            let post = result.post.as_ref();
            println!(
                "{} Target changed after {} attack: {}",
                "[+]".green().bold(),
                result.attack,
                result.url
            );
            println!(
                "    - Status Code: {} → {} → {}",
                fmt_status(baseline),
                fmt_status(Some(&result.attack_outcome)),
                fmt_status(post)
            );
            println!(
                "    - Content Length: {} → {} → {}",
                fmt_len(baseline),
                fmt_len(Some(&result.attack_outcome)),
                fmt_len(post)
            );
            let hashes_match = baseline.and_then(|b| b.body_hash.as_ref())
                == post.and_then(|p| p.body_hash.as_ref());
            println!(
                "    - Hash Match: {}",
                if hashes_match {
                    "match".green().to_string()
                } else {
                    "differ".red().to_string()
                }
            );
            if config.verbose {
                if let Some(b) = baseline {
                    println!("\n--- Baseline Response ---");
                    println!(
                        "Status: {} | Length: {} | Hash: {}",
                        fmt_status(Some(b)),
                        fmt_len(Some(b)),
                        b.body_hash.as_deref().unwrap_or("-")
                    );
                }
                if let Some(p) = post {
                    println!("\n--- Post-Attack Response ---");
                    println!(
                        "Status: {} | Length: {} | Hash: {}\n",
                        fmt_status(Some(p)),
                        fmt_len(Some(p)),
                        p.body_hash.as_deref().unwrap_or("-")
                    );
                }
            }
        }
        Verdict::Indeterminate => {
            warn!(
                "verdict for {} {} is indeterminate: baseline or post-attack phase failed on the wire",
                result.attack, result.url
            );
        }
        _ => {}
    }
}

/// Saves raw response bytes per phase when the attack succeeded. In validate
/// mode all three phases are written; without validation only the attack
/// phase. Write failures are logged and never affect the reported outcome.
fn persist(result: &AttackResult, base_url: &str, atk_url: &str, dir: &Path, config: &ScanConfig) {
    if !result.changed() {
        return;
    }

    if config.validate {
        if let Some(baseline) = &result.baseline {
            write_phase(dir, base_url, "baseline", &baseline.raw, config);
        }
        write_phase(dir, atk_url, "attack", &result.attack_outcome.raw, config);
        if let Some(post) = &result.post {
            write_phase(dir, atk_url, "post", &post.raw, config);
        }
    } else {
        write_phase(dir, atk_url, "attack", &result.attack_outcome.raw, config);
    }
}

fn write_phase(dir: &Path, url: &str, phase: &str, bytes: &[u8], config: &ScanConfig) {
    let filename = match urls::response_filename(url, phase) {
        Ok(filename) => filename,
        Err(e) => {
            warn!("could not build {} filename for {}: {}", phase, url, e);
            return;
        }
    };
    let path = dir.join(filename);
    match std::fs::write(&path, bytes) {
        Ok(()) => {
            if config.verbose || config.validate {
                println!("Saved to: {}", path.display());
            }
        }
        Err(e) => warn!("failed to save {} response to {}: {}", phase, path.display(), e),
    }
}
