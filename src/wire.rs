// File: wire.rs
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::config::ScanConfig;
use governor::{clock::DefaultClock, state::InMemoryState, state::NotKeyed, Quota, RateLimiter};
use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use url::Url;

/// Upper bound on how much of a response is read. The client performs exactly
/// one read of this size and never drains the rest of the stream, so body
/// length and hash are first-chunk approximations, not full-body values.
pub const READ_CHUNK_SIZE: usize = 4096;

/// Display sentinel for a response header that was not present.
pub const HEADER_ABSENT: &str = "N/A";

static STATUS_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^HTTP/\d\.\d (\d{3})").unwrap());

/// Realistic browser-like defaults sent with every request. Initialized once
/// and read by all workers without synchronization.
pub static BROWSER_HEADERS: Lazy<Vec<(&'static str, &'static str)>> = Lazy::new(|| {
    vec![
        (
            "User-Agent",
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
        ),
        (
            "Accept",
            "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8",
        ),
        ("Accept-Language", "en-US,en;q=0.5"),
        ("Accept-Encoding", "gzip, deflate, br"),
        ("Referer", "https://www.google.com/"),
        ("Connection", "keep-alive"),
    ]
});

pub static CACHE_BYPASS_HEADERS: Lazy<Vec<(&'static str, &'static str)>> =
    Lazy::new(|| vec![("Cache-Control", "no-cache")]);

type DirectLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Result of one wire exchange. Either all of status, body length and body
/// hash are present, or the exchange failed and all three are absent.
#[derive(Debug, Clone, Serialize)]
pub struct RequestOutcome {
    pub status: Option<u16>,
    pub body_len: Option<usize>,
    pub body_hash: Option<String>,
    #[serde(skip)]
    pub raw: Vec<u8>,
    pub x_cache: Option<String>,
    pub age: Option<String>,
    pub cache_control: Option<String>,
}

impl RequestOutcome {
    /// All-absent outcome for a failed connect, handshake or read.
    pub fn failed() -> Self {
        Self {
            status: None,
            body_len: None,
            body_hash: None,
            raw: Vec::new(),
            x_cache: None,
            age: None,
            cache_control: None,
        }
    }

    pub fn is_failure(&self) -> bool {
        self.status.is_none()
    }

    pub fn x_cache_display(&self) -> &str {
        self.x_cache.as_deref().unwrap_or(HEADER_ABSENT)
    }

    pub fn age_display(&self) -> &str {
        self.age.as_deref().unwrap_or(HEADER_ABSENT)
    }

    pub fn cache_control_display(&self) -> &str {
        self.cache_control.as_deref().unwrap_or(HEADER_ABSENT)
    }
}

/// Minimal parse of the first response chunk: status line, a case-insensitive
/// header map built in one pass, and the body bytes after the first blank
/// line. Without a blank line the whole chunk counts as headers.
#[derive(Debug)]
pub struct ParsedResponse<'a> {
    pub status: u16,
    headers: HashMap<String, String>,
    pub body: &'a [u8],
}

impl<'a> ParsedResponse<'a> {
    pub fn parse(raw: &'a [u8]) -> ParsedResponse<'a> {
        let (head, body) = match find_blank_line(raw) {
            Some(pos) => (&raw[..pos], &raw[pos + 4..]),
            None => (raw, &raw[raw.len()..]),
        };
        let head_str = String::from_utf8_lossy(head);

        let mut lines = head_str.lines();
        let status = lines
            .next()
            .and_then(|line| STATUS_LINE.captures(line))
            .and_then(|caps| caps[1].parse().ok())
            .unwrap_or(0);

        let mut headers = HashMap::new();
        for line in lines {
            if let Some(colon) = line.find(':') {
                let key = line[..colon].trim().to_ascii_lowercase();
                let value = line[colon + 1..].trim().to_string();
                headers.insert(key, value);
            }
        }

        ParsedResponse {
            status,
            headers,
            body,
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(|v| v.as_str())
    }
}

fn find_blank_line(raw: &[u8]) -> Option<usize> {
    raw.windows(4).position(|w| w == b"\r\n\r\n")
}

/// Default headers extended by the cache-bypass header and then by
/// attack-specific headers, in that precedence order. Later entries win on a
/// case-insensitive key collision; first-seen ordering is kept.
pub fn merge_headers(extra: &[(String, String)]) -> Vec<(String, String)> {
    fn upsert(merged: &mut Vec<(String, String)>, name: &str, value: &str) {
        match merged.iter_mut().find(|(n, _)| n.eq_ignore_ascii_case(name)) {
            Some(slot) => slot.1 = value.to_string(),
            None => merged.push((name.to_string(), value.to_string())),
        }
    }

    let mut merged = Vec::new();
    for (name, value) in BROWSER_HEADERS.iter() {
        upsert(&mut merged, name, value);
    }
    for (name, value) in CACHE_BYPASS_HEADERS.iter() {
        upsert(&mut merged, name, value);
    }
    for (name, value) in extra {
        upsert(&mut merged, name, value);
    }
    merged
}

fn build_request(host: &str, path: &str, extra: &[(String, String)]) -> String {
    let mut lines = vec![format!("GET {} HTTP/1.1", path), format!("Host: {}", host)];
    for (name, value) in merge_headers(extra) {
        lines.push(format!("{}: {}", name, value));
    }
    lines.push("\r\n".to_string());
    lines.join("\r\n")
}

/// Raw HTTP client: one TCP (or TLS) connection, one GET, one bounded read.
/// All socket operations carry explicit timeouts; the shared rate limiter is
/// awaited before every exchange.
pub struct WireClient {
    config: ScanConfig,
    limiter: Arc<DirectLimiter>,
}

impl WireClient {
    pub fn new(config: ScanConfig) -> Self {
        let quota = Quota::per_second(NonZeroU32::new(config.rate_limit.max(1)).unwrap());
        Self {
            config,
            limiter: Arc::new(RateLimiter::direct(quota)),
        }
    }

    /// Sends one GET to `target_url` with the merged header set and returns
    /// the parsed first chunk. Any connection, TLS or read failure yields an
    /// all-absent outcome; there are no retries.
    pub async fn send(&self, target_url: &str, extra_headers: &[(String, String)]) -> RequestOutcome {
        self.limiter.until_ready().await;
        match self.try_send(target_url, extra_headers).await {
            Ok(outcome) => outcome,
            Err(e) => {
                debug!("request to {} failed: {}", target_url, e);
                if self.config.verbose {
                    eprintln!("[!] Request failed for {}: {}", target_url, e);
                }
                RequestOutcome::failed()
            }
        }
    }

    async fn try_send(
        &self,
        target_url: &str,
        extra_headers: &[(String, String)],
    ) -> Result<RequestOutcome, Box<dyn std::error::Error + Send + Sync>> {
        let parsed = Url::parse(target_url)?;
        let host = parsed.host_str().ok_or("no host in URL")?.to_string();
        let secure_scheme = parsed.scheme() == "https";
        let port = parsed
            .port_or_known_default()
            .unwrap_or(if secure_scheme { 443 } else { 80 });
        let use_tls = secure_scheme || port == 443;

        let path = match parsed.query() {
            Some(query) => format!("{}?{}", parsed.path(), query),
            None => parsed.path().to_string(),
        };
        let request = build_request(&host, &path, extra_headers);
        debug!(
            "sending to {}:{} (tls={}): {}",
            host,
            port,
            use_tls,
            request.replace("\r\n", "\\r\\n")
        );

        let chunk = if use_tls {
            let stream = self.connect_tls(&host, port).await?;
            self.exchange(stream, &request).await?
        } else {
            let stream = self.connect_tcp(&host, port).await?;
            self.exchange(stream, &request).await?
        };

        let outcome = self.outcome_from_chunk(chunk);
        self.trace_outcome(target_url, &outcome);
        Ok(outcome)
    }

    async fn connect_tcp(
        &self,
        host: &str,
        port: u16,
    ) -> Result<TcpStream, Box<dyn std::error::Error + Send + Sync>> {
        match tokio::time::timeout(self.config.connect_timeout, TcpStream::connect((host, port)))
            .await
        {
            Ok(Ok(stream)) => Ok(stream),
            Ok(Err(e)) => Err(format!("connection failed: {}", e).into()),
            Err(_) => Err("connection timeout".into()),
        }
    }

    async fn connect_tls(
        &self,
        host: &str,
        port: u16,
    ) -> Result<tokio_rustls::client::TlsStream<TcpStream>, Box<dyn std::error::Error + Send + Sync>>
    {
        use tokio_rustls::{rustls, TlsConnector};

        let mut root_store = rustls::RootCertStore::empty();
        root_store.add_trust_anchors(webpki_roots::TLS_SERVER_ROOTS.iter().map(|ta| {
            rustls::OwnedTrustAnchor::from_subject_spki_name_constraints(
                ta.subject,
                ta.spki,
                ta.name_constraints,
            )
        }));

        let tls_config = rustls::ClientConfig::builder()
            .with_safe_defaults()
            .with_root_certificates(root_store)
            .with_no_client_auth();

        let connector = TlsConnector::from(Arc::new(tls_config));
        let domain = rustls::ServerName::try_from(host)?;

        let tcp_stream = self.connect_tcp(host, port).await?;
        match tokio::time::timeout(self.config.connect_timeout, connector.connect(domain, tcp_stream))
            .await
        {
            Ok(Ok(stream)) => Ok(stream),
            Ok(Err(e)) => Err(format!("TLS handshake failed: {}", e).into()),
            Err(_) => Err("TLS handshake timeout".into()),
        }
    }

    /// Writes the request, then performs the single bounded read.
    async fn exchange<S>(
        &self,
        mut stream: S,
        request: &str,
    ) -> Result<Vec<u8>, Box<dyn std::error::Error + Send + Sync>>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        stream.write_all(request.as_bytes()).await?;

        let mut buffer = [0u8; READ_CHUNK_SIZE];
        let n = match tokio::time::timeout(self.config.read_timeout, stream.read(&mut buffer)).await
        {
            Ok(Ok(n)) => n,
            Ok(Err(e)) => return Err(format!("read failed: {}", e).into()),
            Err(_) => return Err("read timeout".into()),
        };
        Ok(buffer[..n].to_vec())
    }

    fn outcome_from_chunk(&self, chunk: Vec<u8>) -> RequestOutcome {
        let parsed = ParsedResponse::parse(&chunk);
        let body_hash = format!("{:x}", md5::compute(parsed.body));
        RequestOutcome {
            status: Some(parsed.status),
            body_len: Some(parsed.body.len()),
            body_hash: Some(body_hash),
            x_cache: parsed.header("x-cache").map(|v| v.to_string()),
            age: parsed.header("age").map(|v| v.to_string()),
            cache_control: parsed.header("cache-control").map(|v| v.to_string()),
            raw: chunk,
        }
    }

    fn trace_outcome(&self, target_url: &str, outcome: &RequestOutcome) {
        let interesting = !self.config.validate && outcome.x_cache.is_some();
        if !self.config.verbose && !interesting {
            return;
        }
        println!("\n--- Response for {} ---", target_url);
        println!(
            "Status: {} | Length: {}",
            outcome.status.unwrap_or(0),
            outcome.body_len.unwrap_or(0)
        );
        println!(
            "Body Hash: {} | X-Cache: {}",
            outcome.body_hash.as_deref().unwrap_or(HEADER_ABSENT),
            outcome.x_cache_display()
        );
        println!(
            "Age: {} | Cache-Control: {}\n",
            outcome.age_display(),
            outcome.cache_control_display()
        );
    }
}
