use std::{net::IpAddr, time::Duration};

use async_trait::async_trait;
use tracing::debug;

/// Decides whether an email domain exists, for `Email { dns: true }` rules.
#[async_trait]
pub trait DomainResolver: Send + Sync {
    async fn resolves(&self, domain: &str) -> bool;
}

/// Top-level labels that only ever resolve on the local machine or network.
const RESERVED_TLDS: &[&str] = &[
    "localhost",
    "local",
    "localdomain",
    "invalid",
    "test",
    "example",
    "internal",
    "home",
    "lan",
    "arpa",
];

/// Whether a domain could be answered by public DNS at all. IP literals,
/// single-label hosts and reserved TLDs are answered by the hosts file or
/// parsed without any query, so they never count as resolvable.
pub fn is_public_domain(domain: &str) -> bool {
    let domain = domain.trim_end_matches('.').to_ascii_lowercase();
    if domain.parse::<IpAddr>().is_ok() {
        return false;
    }
    match domain.rsplit_once('.') {
        Some((rest, tld)) => {
            !rest.is_empty()
                && !tld.is_empty()
                && !tld.chars().all(|c| c.is_ascii_digit())
                && !RESERVED_TLDS.contains(&tld)
        }
        None => false,
    }
}

/// Looks the domain up through the system resolver (A/AAAA).
#[derive(Debug, Clone)]
pub struct SystemResolver {
    timeout: Duration,
}

impl SystemResolver {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl DomainResolver for SystemResolver {
    async fn resolves(&self, domain: &str) -> bool {
        if !is_public_domain(domain) {
            debug!(%domain, "domain is not publicly resolvable");
            return false;
        }
        let lookup = tokio::net::lookup_host((domain, 0));
        match tokio::time::timeout(self.timeout, lookup).await {
            Ok(Ok(mut addrs)) => addrs.next().is_some(),
            Ok(Err(e)) => {
                debug!(%domain, error = %e, "domain lookup failed");
                false
            }
            Err(_) => {
                debug!(%domain, timeout = ?self.timeout, "domain lookup timed out");
                false
            }
        }
    }
}

/// Accepts every domain; used when `EMAIL_DNS_CHECK` is off.
#[derive(Debug, Clone, Copy, Default)]
pub struct SkipResolver;

#[async_trait]
impl DomainResolver for SkipResolver {
    async fn resolves(&self, _domain: &str) -> bool {
        true
    }
}
