//! Web service probing.
//!
//! Each listening port is tried as HTTPS with certificate
//! verification, then HTTPS without, then plain HTTP, stopping at the
//! first attempt that yields an HTML page. The ladder distinguishes a
//! properly-secured service from one behind a self-signed certificate
//! from one speaking plain HTTP, without a raw TLS handshake.

use std::error::Error;
use std::time::Duration;

use reqwest::redirect::Policy;
use reqwest::Client;
use url::Url;

use crate::error::Result;
use crate::meta;
use crate::types::{Protocol, WebService};

/// Per-request budget: connect, TLS, redirects, and body together.
pub const PROBE_TIMEOUT: Duration = Duration::from_millis(1500);

/// Redirects followed before an attempt is abandoned.
const MAX_REDIRECTS: usize = 10;

/// Outcome of a single fetch attempt.
enum Attempt {
    /// HTML with a non-error status: a usable web page.
    Page(meta::PageMeta),
    /// TLS handshake failed certificate validation. Worth retrying
    /// with verification off.
    UntrustedCert,
    /// Everything else: refused, timed out, non-HTML, error status.
    NoService,
}

/// Prober holding both trust configurations, built once and shared
/// across every port probed.
pub struct WebProbe {
    verified: Client,
    unverified: Client,
}

impl WebProbe {
    pub fn new() -> Result<Self> {
        Ok(Self {
            verified: build_client(false)?,
            unverified: build_client(true)?,
        })
    }

    /// Classify the service on `port`, if it speaks HTTP(S).
    ///
    /// Never fails: any outcome that is not a web page, including
    /// timeouts and refused connections, is `None`.
    pub async fn probe(&self, port: u16) -> Option<WebService> {
        let https = format!("https://localhost:{port}");
        match fetch(&self.verified, &https).await {
            Attempt::Page(page) => return Some(classified(page, Protocol::Https, Some(true))),
            Attempt::UntrustedCert => {
                tracing::trace!(port, "Certificate not trusted, retrying unverified");
                if let Attempt::Page(page) = fetch(&self.unverified, &https).await {
                    return Some(classified(page, Protocol::Https, Some(false)));
                }
            }
            Attempt::NoService => {}
        }

        let http = format!("http://localhost:{port}");
        if let Attempt::Page(page) = fetch(&self.verified, &http).await {
            return Some(classified(page, Protocol::Http, None));
        }
        None
    }
}

fn build_client(accept_invalid_certs: bool) -> Result<Client> {
    Ok(Client::builder()
        .timeout(PROBE_TIMEOUT)
        .redirect(Policy::limited(MAX_REDIRECTS))
        .danger_accept_invalid_certs(accept_invalid_certs)
        .build()?)
}

fn classified(page: meta::PageMeta, protocol: Protocol, secure: Option<bool>) -> WebService {
    WebService {
        title: page.title,
        description: page.description,
        favicon: page.favicon,
        protocol,
        secure,
    }
}

/// One GET against `url`, classified for the probe ladder. Metadata is
/// resolved against the original probe origin even when the request
/// was redirected elsewhere.
async fn fetch(client: &Client, url: &str) -> Attempt {
    let base = match Url::parse(url) {
        Ok(base) => base,
        Err(_) => return Attempt::NoService,
    };

    let response = match client.get(base.clone()).send().await {
        Ok(response) => response,
        Err(err) => {
            if is_trust_failure(&err) {
                return Attempt::UntrustedCert;
            }
            tracing::trace!(url, error = %err, "Probe attempt failed");
            return Attempt::NoService;
        }
    };

    if response.status().as_u16() >= 400 {
        return Attempt::NoService;
    }

    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string();

    let body = match response.bytes().await {
        Ok(body) => body,
        Err(_) => return Attempt::NoService,
    };

    match meta::extract(&body, &content_type, &base) {
        Some(page) => Attempt::Page(page),
        None => Attempt::NoService,
    }
}

/// Walk the error source chain looking for certificate-validation
/// markers. reqwest does not expose the TLS failure class directly, so
/// this goes by the backend's error text.
fn is_trust_failure(err: &reqwest::Error) -> bool {
    let mut source: Option<&(dyn Error + 'static)> = Some(err);
    while let Some(current) = source {
        if trust_failure_text(&current.to_string()) {
            return true;
        }
        source = current.source();
    }
    false
}

fn trust_failure_text(message: &str) -> bool {
    let message = message.to_ascii_lowercase();
    message.contains("certificate")
        || message.contains("unknownissuer")
        || message.contains("self signed")
        || message.contains("self-signed")
        || message.contains("hostname mismatch")
}
