use reqwest::dns::{Addrs, Name, Resolve, Resolving};
use std::net::{IpAddr, SocketAddr};
use thiserror::Error;
use url::{Host, Url};

use crate::error::{GatewayError, Result};
use crate::target::ParsedTarget;

// One destination the gateway may forward to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllowListEntry {
    Exact(String),
    // suffix without the leading "*."
    Wildcard(String),
}

impl AllowListEntry {
    fn matches(&self, host: &str) -> bool {
        match self {
            AllowListEntry::Exact(domain) => host == domain,
            AllowListEntry::Wildcard(base) => host
                .strip_suffix(base.as_str())
                .and_then(|sub| sub.strip_suffix('.'))
                .is_some_and(|sub| !sub.is_empty()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllowList {
    entries: Vec<AllowListEntry>,
}

impl AllowList {
    // Create from comma-separated domains "hapi.fhir.org, *.smarthealthit.org"
    pub fn parse(raw: &str) -> Self {
        let entries = raw
            .split(',')
            .map(|s| s.trim()) // remove spaces
            .filter(|s| !s.is_empty()) // remove empty strings
            .map(|s| {
                let s = s.to_ascii_lowercase();
                match s.strip_prefix("*.") {
                    Some(base) => AllowListEntry::Wildcard(base.to_string()),
                    None => AllowListEntry::Exact(s),
                }
            })
            .collect();
        Self { entries }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    // An empty list allows every host
    pub fn allows(&self, host: &str) -> bool {
        self.is_empty() || self.entries.iter().any(|entry| entry.matches(host))
    }
}

/// Literal hostname test against localhost and the private IPv4 ranges.
///
/// Works on the string only. A name that resolves into one of these ranges
/// passes unless host resolution is switched on.
pub fn is_private_host(host: &str) -> bool {
    if host == "localhost"
        || host.starts_with("127.")
        || host.starts_with("10.")
        || host.starts_with("192.168.")
        || host.starts_with("169.254.")
    {
        return true;
    }

    // 172.16.* through 172.31.*
    host.strip_prefix("172.")
        .and_then(|rest| rest.split('.').next())
        .and_then(|octet| octet.parse::<u8>().ok())
        .is_some_and(|octet| (16..=31).contains(&octet))
}

pub fn is_private_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_loopback() || v4.is_private() || v4.is_link_local() || v4.is_unspecified()
        }
        IpAddr::V6(v6) => {
            if let Some(mapped) = v6.to_ipv4_mapped() {
                return is_private_ip(IpAddr::V4(mapped));
            }
            let first = v6.segments()[0];
            v6.is_loopback()
                || v6.is_unspecified()
                || (first & 0xfe00) == 0xfc00 // unique local fc00::/7
                || (first & 0xffc0) == 0xfe80 // link local fe80::/10
        }
    }
}

// Raised by the resolver when a name points into a blocked range
#[derive(Error, Debug)]
#[error("resolved address {0} is in a blocked range")]
pub struct BlockedAddress(pub IpAddr);

/// DNS resolver for the upstream client that refuses private addresses.
///
/// Runs for every connection the client opens, redirect hops included, on
/// the same lookup the connection then uses.
pub struct GuardedResolver;

impl Resolve for GuardedResolver {
    fn resolve(&self, name: Name) -> Resolving {
        Box::pin(resolve_public(name.as_str().to_string()))
    }
}

async fn resolve_public(
    host: String,
) -> std::result::Result<Addrs, Box<dyn std::error::Error + Send + Sync>> {
    let addrs: Vec<SocketAddr> = tokio::net::lookup_host((host.as_str(), 0)).await?.collect();

    if let Some(blocked) = addrs.iter().find(|addr| is_private_ip(addr.ip())) {
        return Err(Box::new(BlockedAddress(blocked.ip())));
    }
    Ok(Box::new(addrs.into_iter()))
}

// Destination rules applied to every target before it is forwarded
#[derive(Debug, Clone)]
pub struct NetworkPolicy {
    production: bool,
    allow_list: AllowList,
    resolve_hosts: bool,
}

impl NetworkPolicy {
    pub fn new(production: bool, allow_list: AllowList, resolve_hosts: bool) -> Self {
        Self {
            production,
            allow_list,
            resolve_hosts,
        }
    }

    // Resolved-address checks only apply in production
    pub fn resolves_hosts(&self) -> bool {
        self.production && self.resolve_hosts
    }

    pub fn check(&self, target: &ParsedTarget) -> Result<()> {
        self.check_host(target.host())
    }

    // Used on redirect hops, where only the URL is at hand. IP literals never
    // reach the resolver, so in resolve mode they are classified here.
    pub fn check_url(&self, url: &Url) -> Result<()> {
        if !matches!(url.scheme(), "http" | "https") {
            return Err(GatewayError::UnsupportedScheme);
        }

        let literal = match url.host() {
            Some(Host::Ipv4(ip)) => Some(IpAddr::V4(ip)),
            Some(Host::Ipv6(ip)) => Some(IpAddr::V6(ip)),
            Some(Host::Domain(_)) => None,
            None => return Err(GatewayError::InvalidUrl),
        };
        if self.resolves_hosts() && literal.is_some_and(is_private_ip) {
            return Err(GatewayError::PrivateNetworkBlocked);
        }

        match url.host_str() {
            Some(host) => self.check_host(host),
            None => Err(GatewayError::InvalidUrl),
        }
    }

    fn check_host(&self, host: &str) -> Result<()> {
        // private ranges are only blocked in production
        if self.production && is_private_host(host) {
            return Err(GatewayError::PrivateNetworkBlocked);
        }

        if !self.allow_list.allows(host) {
            return Err(GatewayError::DomainNotAllowed);
        }

        Ok(())
    }

    // 403 before connecting; no-op unless resolves_hosts()
    pub async fn check_resolved(&self, target: &ParsedTarget) -> Result<()> {
        if !self.resolves_hosts() {
            return Ok(());
        }

        // url keeps brackets around IPv6 literals
        let host = target.host().trim_start_matches('[').trim_end_matches(']');
        let addrs = tokio::net::lookup_host((host, target.port()))
            .await
            .map_err(|e| GatewayError::Resolve(e.to_string()))?;

        for addr in addrs {
            if is_private_ip(addr.ip()) {
                return Err(GatewayError::PrivateNetworkBlocked);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(raw: &str) -> ParsedTarget {
        ParsedTarget::parse(Some(raw)).unwrap()
    }

    #[test]
    fn literal_private_hosts() {
        for host in [
            "localhost",
            "127.0.0.1",
            "10.1.2.3",
            "192.168.0.10",
            "169.254.169.254",
            "172.16.0.1",
            "172.20.5.5",
            "172.31.255.255",
        ] {
            assert!(is_private_host(host), "{host}");
        }
    }

    #[test]
    fn literal_public_hosts() {
        for host in [
            "hapi.fhir.org",
            "8.8.8.8",
            "172.15.0.1",
            "172.32.0.1",
            "172.2.0.1",
            "172.200.0.1",
            "192.169.0.1",
        ] {
            assert!(!is_private_host(host), "{host}");
        }
    }

    #[test]
    fn production_blocks_loopback_development_does_not() {
        let prod = NetworkPolicy::new(true, AllowList::default(), false);
        let dev = NetworkPolicy::new(false, AllowList::default(), false);
        let t = target("http://127.0.0.1:8080/fhir/metadata");

        assert!(matches!(prod.check(&t), Err(GatewayError::PrivateNetworkBlocked)));
        assert!(dev.check(&t).is_ok());
    }

    #[test]
    fn allow_list_wildcard_and_exact() {
        let t = target("https://api.example.org/Patient");

        let other = NetworkPolicy::new(false, AllowList::parse("*.other.org"), false);
        assert!(matches!(other.check(&t), Err(GatewayError::DomainNotAllowed)));

        let wildcard = NetworkPolicy::new(false, AllowList::parse("*.example.org"), false);
        assert!(wildcard.check(&t).is_ok());

        let exact = NetworkPolicy::new(false, AllowList::parse("api.example.org"), false);
        assert!(exact.check(&t).is_ok());
    }

    #[test]
    fn wildcard_does_not_match_bare_domain() {
        let list = AllowList::parse("*.example.org");
        assert!(list.allows("foo.example.org"));
        assert!(list.allows("a.b.example.org"));
        assert!(!list.allows("example.org"));
        assert!(!list.allows("badexample.org"));

        let both = AllowList::parse("*.example.org,example.org");
        assert!(both.allows("example.org"));
    }

    #[test]
    fn allow_list_parsing_skips_blanks_and_lowercases() {
        let list = AllowList::parse(" HAPI.fhir.org ,, *.Example.org ");
        assert_eq!(
            list.entries,
            vec![
                AllowListEntry::Exact("hapi.fhir.org".to_string()),
                AllowListEntry::Wildcard("example.org".to_string()),
            ]
        );
    }

    #[test]
    fn private_block_is_checked_before_allow_list() {
        let policy = NetworkPolicy::new(true, AllowList::parse("localhost"), false);
        assert!(matches!(
            policy.check(&target("http://localhost/")),
            Err(GatewayError::PrivateNetworkBlocked)
        ));
    }

    #[test]
    fn redirect_urls_get_the_same_checks() {
        let policy = NetworkPolicy::new(true, AllowList::parse("*.example.org"), false);
        let ok = Url::parse("https://r.example.org/next").unwrap();
        let private = Url::parse("http://10.0.0.7/admin").unwrap();
        let foreign = Url::parse("https://evil.test/").unwrap();

        assert!(policy.check_url(&ok).is_ok());
        assert!(matches!(policy.check_url(&private), Err(GatewayError::PrivateNetworkBlocked)));
        assert!(matches!(policy.check_url(&foreign), Err(GatewayError::DomainNotAllowed)));
    }

    #[test]
    fn resolved_address_classification() {
        assert!(is_private_ip("127.0.0.1".parse().unwrap()));
        assert!(is_private_ip("172.16.4.4".parse().unwrap()));
        assert!(is_private_ip("::1".parse().unwrap()));
        assert!(is_private_ip("fd00::1".parse().unwrap()));
        assert!(is_private_ip("fe80::1".parse().unwrap()));
        assert!(is_private_ip("::ffff:10.0.0.1".parse().unwrap()));
        assert!(!is_private_ip("93.184.216.34".parse().unwrap()));
        assert!(!is_private_ip("2606:4700::1111".parse().unwrap()));
    }

    #[tokio::test]
    async fn resolution_catches_names_pointing_at_loopback() {
        let policy = NetworkPolicy::new(true, AllowList::default(), true);
        let t = target("http://[::1]:9/");
        assert!(policy.check(&t).is_ok());
        assert!(matches!(
            policy.check_resolved(&t).await,
            Err(GatewayError::PrivateNetworkBlocked)
        ));
    }

    #[test]
    fn redirect_to_private_literal_is_refused_when_resolving() {
        let resolving = NetworkPolicy::new(true, AllowList::default(), true);
        let literal_only = NetworkPolicy::new(true, AllowList::default(), false);

        for raw in ["http://[::1]:9/admin", "http://[::ffff:10.0.0.1]/", "http://[fd00::7]/"] {
            let url = Url::parse(raw).unwrap();
            assert!(
                matches!(resolving.check_url(&url), Err(GatewayError::PrivateNetworkBlocked)),
                "{raw}"
            );
            assert!(literal_only.check_url(&url).is_ok(), "{raw}");
        }

        let public = Url::parse("http://[2606:4700::1111]/").unwrap();
        assert!(resolving.check_url(&public).is_ok());
    }

    #[tokio::test]
    async fn guarded_resolver_refuses_private_names() {
        let err = resolve_public("localhost".to_string()).await.err().unwrap();
        assert!(err.downcast_ref::<BlockedAddress>().is_some());

        let err = resolve_public("127.0.0.1".to_string()).await.err().unwrap();
        assert!(err.downcast_ref::<BlockedAddress>().is_some());
    }

    #[tokio::test]
    async fn resolution_is_skipped_outside_production() {
        let policy = NetworkPolicy::new(false, AllowList::default(), true);
        assert!(policy.check_resolved(&target("http://[::1]:9/")).await.is_ok());
    }
}
