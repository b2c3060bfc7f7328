// SPDX-FileCopyrightText: 2026 Ragline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SSRF protection for user-supplied source URLs.
//!
//! [`validate_source_url`] rejects non-HTTP schemes and literal private IPs up
//! front. [`SsrfSafeResolver`] implements `reqwest::dns::Resolve` and drops
//! private addresses after DNS resolution, which catches hostnames that point
//! inside the network.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use ragline_core::RaglineError;
use reqwest::dns::{Addrs, Name, Resolve, Resolving};
use tracing::warn;
use url::Url;

/// Whether `ip` is loopback, private, link-local, or otherwise not routable
/// on the public internet.
pub fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => is_private_v4(v4),
        IpAddr::V6(v6) => {
            if let Some(mapped) = v6.to_ipv4_mapped() {
                return is_private_v4(&mapped);
            }
            v6.is_loopback()
                || v6.is_unspecified()
                || (v6.segments()[0] & 0xfe00) == 0xfc00 // fc00::/7 unique local
                || (v6.segments()[0] & 0xffc0) == 0xfe80 // fe80::/10 link-local
        }
    }
}

fn is_private_v4(v4: &Ipv4Addr) -> bool {
    let [a, b, ..] = v4.octets();
    v4.is_private()
        || v4.is_loopback()
        || v4.is_link_local()
        || v4.is_broadcast()
        || v4.is_unspecified()
        || (a == 100 && (64..128).contains(&b)) // 100.64.0.0/10 carrier-grade NAT
}

/// Parses and vets a source URL before it is handed to the crawler.
///
/// Only `http` and `https` are accepted. Literal IP hosts in private ranges
/// are rejected unless `allow_private` is set. Hostnames pass here and are
/// checked by [`SsrfSafeResolver`] at connect time.
pub fn validate_source_url(raw: &str, allow_private: bool) -> Result<Url, RaglineError> {
    let url = Url::parse(raw.trim())
        .map_err(|e| RaglineError::Validation(format!("invalid URL `{raw}`: {e}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(RaglineError::Validation(format!(
            "unsupported URL scheme `{}` in `{raw}`",
            url.scheme()
        )));
    }
    let host = url
        .host()
        .ok_or_else(|| RaglineError::Validation(format!("URL `{raw}` has no host")))?;
    if !allow_private {
        let ip = match host {
            url::Host::Ipv4(v4) => Some(IpAddr::V4(v4)),
            url::Host::Ipv6(v6) => Some(IpAddr::V6(v6)),
            url::Host::Domain(d) if d.eq_ignore_ascii_case("localhost") => {
                Some(IpAddr::V4(Ipv4Addr::LOCALHOST))
            }
            url::Host::Domain(_) => None,
        };
        if let Some(ip) = ip
            && is_private_ip(&ip)
        {
            warn!(ip = %ip, url = %raw, "SSRF blocked: URL targets private address");
            return Err(RaglineError::Validation(format!(
                "URL `{raw}` targets a private address"
            )));
        }
    }
    Ok(url)
}

/// DNS resolver that drops private and reserved addresses.
///
/// If every resolved address is private the lookup fails, so reqwest never
/// opens a connection into the internal network.
#[derive(Debug, Default, Clone, Copy)]
pub struct SsrfSafeResolver;

impl Resolve for SsrfSafeResolver {
    fn resolve(&self, name: Name) -> Resolving {
        let hostname = name.as_str().to_string();

        Box::pin(async move {
            let addrs: Vec<SocketAddr> = tokio::net::lookup_host(format!("{hostname}:0"))
                .await
                .map_err(|e| -> Box<dyn std::error::Error + Send + Sync> { Box::new(e) })?
                .collect();

            let public: Vec<SocketAddr> = addrs
                .into_iter()
                .filter(|addr| {
                    let private = is_private_ip(&addr.ip());
                    if private {
                        warn!(ip = %addr.ip(), host = %hostname, "SSRF blocked: resolved to private address");
                    }
                    !private
                })
                .collect();

            if public.is_empty() {
                let err: Box<dyn std::error::Error + Send + Sync> =
                    format!("SSRF blocked: {hostname} resolves only to private addresses").into();
                return Err(err);
            }

            let addrs: Addrs = Box::new(public.into_iter());
            Ok(addrs)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv6Addr;

    #[test]
    fn private_ranges_are_detected() {
        let private = [
            "10.0.0.1",
            "172.16.0.1",
            "172.31.255.255",
            "192.168.1.1",
            "127.0.0.1",
            "169.254.169.254",
            "0.0.0.0",
            "255.255.255.255",
            "100.64.0.1",
            "::1",
            "::",
            "fd00::1",
            "fe80::1",
            "::ffff:10.0.0.1",
        ];
        for ip in private {
            let parsed: IpAddr = ip.parse().unwrap();
            assert!(is_private_ip(&parsed), "{ip} should be private");
        }
    }

    #[test]
    fn public_addresses_pass() {
        for ip in ["8.8.8.8", "1.1.1.1", "104.18.0.1", "100.128.0.1"] {
            let parsed: IpAddr = ip.parse().unwrap();
            assert!(!is_private_ip(&parsed), "{ip} should be public");
        }
        let v6 = IpAddr::V6(Ipv6Addr::new(0x2001, 0x4860, 0x4860, 0, 0, 0, 0, 0x8888));
        assert!(!is_private_ip(&v6));
    }

    #[test]
    fn source_url_requires_http_scheme() {
        assert!(validate_source_url("ftp://example.com/file", false).is_err());
        assert!(validate_source_url("file:///etc/passwd", false).is_err());
        assert!(validate_source_url("not a url", false).is_err());
        assert!(validate_source_url("https://example.com/docs", false).is_ok());
    }

    #[test]
    fn source_url_blocks_private_literals() {
        assert!(validate_source_url("http://10.0.0.1:8080/api", false).is_err());
        assert!(validate_source_url("http://[::1]/", false).is_err());
        assert!(validate_source_url("http://localhost:3000/", false).is_err());
    }

    #[test]
    fn allow_private_opts_out() {
        assert!(validate_source_url("http://127.0.0.1:8080/", true).is_ok());
    }
}
