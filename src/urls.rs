// File: urls.rs
// SPDX-License-Identifier: MIT OR Apache-2.0

use once_cell::sync::Lazy;
use rand::Rng;
use regex::Regex;
use std::collections::HashMap;
use url::Url;

static URL_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"https?://[^\s]+").unwrap());

/// Replaces the final path segment's extension with `new_ext` (a leading dot
/// is added if missing); a segment without an extension gets it appended.
/// Directory structure, query and fragment are preserved.
pub fn rewrite_extension(url: &str, new_ext: &str) -> Result<String, url::ParseError> {
    let ext = if new_ext.starts_with('.') {
        new_ext.to_string()
    } else {
        format!(".{}", new_ext)
    };

    let mut parsed = Url::parse(url)?;
    let path = if parsed.path().is_empty() {
        "/".to_string()
    } else {
        parsed.path().to_string()
    };

    let (base_dir, filename) = match path.rsplit_once('/') {
        Some((dir, file)) => (dir.to_string(), file.to_string()),
        None => (String::new(), path),
    };

    let mut filename = filename.trim_matches('/').to_string();
    if let Some(dot) = filename.rfind('.') {
        filename.truncate(dot);
    }
    filename.push_str(&ext);

    let new_path = if base_dir.is_empty() {
        format!("/{}", filename)
    } else {
        format!("{}/{}", base_dir, filename)
    };
    parsed.set_path(&new_path);
    Ok(parsed.to_string())
}

/// Appends a `cb=<value>` query parameter, joining with `&` when a query
/// string already exists. Existing parameters are never touched.
pub fn append_cache_buster(url: &str, value: &str) -> Result<String, url::ParseError> {
    let mut parsed = Url::parse(url)?;
    let new_query = match parsed.query() {
        Some(q) if !q.is_empty() => format!("{}&cb={}", q, value),
        _ => format!("cb={}", value),
    };
    parsed.set_query(Some(&new_query));
    Ok(parsed.to_string())
}

/// A fresh 6-digit decimal cache-buster value.
pub fn random_cache_buster() -> String {
    rand::thread_rng().gen_range(100_000..1_000_000).to_string()
}

/// Pulls `http(s)://` URLs out of free-form lines. With `single_per_domain`
/// only one URL survives per domain, preferring the third occurrence, else
/// the second, else the first. Domain order follows first appearance.
pub fn extract_urls(lines: &[String], single_per_domain: bool) -> Vec<String> {
    let mut order: Vec<String> = Vec::new();
    let mut by_domain: HashMap<String, Vec<String>> = HashMap::new();

    for line in lines {
        let Some(found) = URL_PATTERN.find(line) else {
            continue;
        };
        let raw = found.as_str().to_string();
        let Ok(parsed) = Url::parse(&raw) else {
            continue;
        };
        let Some(host) = parsed.host_str() else {
            continue;
        };
        let domain = match parsed.port() {
            Some(port) => format!("{}:{}", host.to_lowercase(), port),
            None => host.to_lowercase(),
        };
        let entry = by_domain.entry(domain.clone()).or_default();
        if entry.is_empty() {
            order.push(domain);
        }
        entry.push(raw);
    }

    if single_per_domain {
        order
            .iter()
            .map(|domain| {
                let urls = &by_domain[domain];
                if urls.len() >= 3 {
                    urls[2].clone()
                } else {
                    urls[urls.len() - 1].clone()
                }
            })
            .collect()
    } else {
        order
            .iter()
            .flat_map(|domain| by_domain[domain].clone())
            .collect()
    }
}

/// Persistence filename for one (URL, phase) pair:
/// `<host><path with '/' replaced by '.'>.<phase>.txt`, with `.root` standing
/// in for an empty path. Different URLs can flatten to the same name (the
/// '/' to '.' mapping is lossy), in which case the later write wins.
pub fn response_filename(url: &str, phase: &str) -> Result<String, url::ParseError> {
    let parsed = Url::parse(url)?;
    let host = parsed.host_str().unwrap_or_default();
    let path = parsed.path();
    let flattened = if path.is_empty() || path == "/" {
        ".root".to_string()
    } else {
        path.replace('/', ".")
    };
    Ok(format!("{}{}.{}.txt", host, flattened, phase))
}
