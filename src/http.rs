//! One-shot blocking HTTPS POST to the configured collector (C6).
//!
//! A fresh `ureq::Agent` is built per call instead of held across the
//! daemon's lifetime — the idiomatic equivalent of the original's
//! acquire/release of its transport's process-wide globals around each call,
//! keeping idle footprint small between sends.

use std::sync::Arc;
use std::time::Duration;

use crate::core::config::HttpConfig;
use crate::core::errors::{Result, TpdError};
use crate::record::N_HEADERS;

/// POST `headers` (the parsed `N_HEADERS`) plus `tid_header` plus
/// `Content-Type: application/text`, and `body`, to `config.server_addr`.
///
/// Returns `Ok(true)` iff the transport reported no error and the response
/// status was 200 or 201. Any other status, or a transport-level failure
/// (timeout, connection refused, TLS error), collapses to `Ok(false)` — only
/// a malformed configuration (e.g. an unparsable URL) surfaces as `Err`.
pub fn post(
    config: &HttpConfig,
    headers: &[String],
    machine_id_override: Option<&str>,
    body: &str,
) -> Result<bool> {
    debug_assert!(headers.len() == N_HEADERS || headers.is_empty());

    let agent = build_agent(config)?;
    let mut request = agent.post(&config.server_addr);

    for header in headers {
        if let Some((key, value)) = header.split_once(':') {
            request = request.set(key.trim(), value.trim());
        }
    }
    request = request.set(&tid_header_name(config), &tid_header_value(config));
    request = request.set("Content-Type", "application/text");
    if let Some(machine_id) = machine_id_override {
        request = request.set("X-Machine-Id", machine_id);
    }

    match request.send_string(body) {
        Ok(response) => Ok(response.status() == 200 || response.status() == 201),
        Err(ureq::Error::Status(_, _)) => Ok(false),
        Err(ureq::Error::Transport(_)) => Ok(false),
    }
}

fn build_agent(config: &HttpConfig) -> Result<ureq::Agent> {
    let mut builder = ureq::AgentBuilder::new()
        .timeout_connect(Duration::from_secs(config.connect_timeout_secs))
        .timeout(Duration::from_secs(config.total_timeout_secs));

    if has_ca_override(config) {
        builder = builder.tls_config(Arc::new(ca_override_tls_config(&config.cainfo)?));
    }

    Ok(builder.build())
}

/// Whether a configured CA override file exists and should replace the
/// default trust store.
#[must_use]
pub fn has_ca_override(config: &HttpConfig) -> bool {
    !config.cainfo.is_empty() && std::path::Path::new(&config.cainfo).exists()
}

/// Build a rustls client config whose only trust anchors are the
/// certificates in `cainfo`, overriding the default trust store entirely —
/// the same replace-not-merge semantics as the original's `CURLOPT_CAINFO`.
fn ca_override_tls_config(cainfo: &str) -> Result<rustls::ClientConfig> {
    let path = std::path::Path::new(cainfo);
    let pem = std::fs::read(path).map_err(|source| TpdError::io(path, source))?;
    let mut reader = std::io::BufReader::new(pem.as_slice());
    let der_certs =
        rustls_pemfile::certs(&mut reader).map_err(|source| TpdError::io(path, source))?;
    if der_certs.is_empty() {
        return Err(TpdError::InvalidConfig {
            details: format!("cainfo {cainfo} contains no PEM certificates"),
        });
    }

    let mut roots = rustls::RootCertStore::empty();
    for der in der_certs {
        roots
            .add(&rustls::Certificate(der))
            .map_err(|source| TpdError::InvalidConfig {
                details: format!("cainfo {cainfo}: {source}"),
            })?;
    }

    Ok(rustls::ClientConfig::builder()
        .with_safe_defaults()
        .with_root_certificates(roots)
        .with_no_client_auth())
}

fn tid_header_name(config: &HttpConfig) -> String {
    config
        .tid_header
        .split_once(':')
        .map(|(k, _)| k.trim().to_string())
        .unwrap_or_else(|| "X-Tid".to_string())
}

fn tid_header_value(config: &HttpConfig) -> String {
    config
        .tid_header
        .split_once(':')
        .map(|(_, v)| v.trim().to_string())
        .unwrap_or_else(|| config.tid_header.clone())
}
