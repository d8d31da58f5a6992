//! Outbound URL guard for webhook delivery.
//!
//! Rejects destinations that would let a webhook reach the host itself or
//! the surrounding network: loopback, private ranges, link-local, CGNAT,
//! and cloud metadata endpoints, checked against every address DNS returns.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use {tokio::net::lookup_host, url::Url};

/// Why a URL was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SsrfViolation {
    /// Stable machine-readable reason code.
    pub reason_code: &'static str,
    /// Human-readable detail for logs and outcomes.
    pub detail: String,
}

impl std::fmt::Display for SsrfViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.detail)
    }
}

impl std::error::Error for SsrfViolation {}

fn violation(reason_code: &'static str, detail: String) -> SsrfViolation {
    SsrfViolation {
        reason_code,
        detail,
    }
}

/// Parse and validate a webhook URL. HTTP and HTTPS only; the host must not
/// resolve to a blocked address.
pub async fn validate_webhook_url(raw_url: &str) -> Result<Url, SsrfViolation> {
    let url = Url::parse(raw_url).map_err(|error| {
        violation(
            "webhook_url_invalid",
            format!("invalid webhook url '{raw_url}': {error}"),
        )
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(violation(
            "webhook_blocked_scheme",
            format!("blocked webhook scheme '{}'", url.scheme()),
        ));
    }

    let host = url
        .host_str()
        .map(|h| h.trim().trim_end_matches('.').to_ascii_lowercase())
        .filter(|h| !h.is_empty())
        .ok_or_else(|| {
            violation(
                "webhook_url_invalid",
                format!("webhook url '{url}' is missing a host"),
            )
        })?;

    if is_metadata_hostname(&host) {
        return Err(violation(
            "webhook_blocked_metadata_endpoint",
            format!("blocked webhook metadata hostname '{host}'"),
        ));
    }
    if host == "localhost" || host.ends_with(".localhost") {
        return Err(violation(
            "webhook_blocked_private_network",
            format!("blocked webhook localhost hostname '{host}'"),
        ));
    }
    if let Ok(ip_addr) = host.parse::<IpAddr>() {
        validate_ip(ip_addr)?;
        return Ok(url);
    }

    let port = url.port_or_known_default().ok_or_else(|| {
        violation(
            "webhook_url_invalid",
            format!("webhook url '{url}' has no known port"),
        )
    })?;
    let addresses = lookup_host((host.as_str(), port)).await.map_err(|error| {
        violation(
            "webhook_dns_resolution_failed",
            format!("failed DNS resolution for webhook host '{host}': {error}"),
        )
    })?;

    let mut resolved_any = false;
    for socket_addr in addresses {
        resolved_any = true;
        validate_ip(socket_addr.ip())?;
    }
    if !resolved_any {
        return Err(violation(
            "webhook_dns_resolution_failed",
            format!("webhook host '{host}' resolved no addresses"),
        ));
    }
    Ok(url)
}

fn validate_ip(ip_addr: IpAddr) -> Result<(), SsrfViolation> {
    if is_metadata_ip(ip_addr) {
        return Err(violation(
            "webhook_blocked_metadata_endpoint",
            format!("blocked webhook metadata IP '{ip_addr}'"),
        ));
    }
    if ip_addr.is_unspecified() || ip_addr.is_multicast() || is_private_network_ip(ip_addr) {
        return Err(violation(
            "webhook_blocked_private_network",
            format!("blocked webhook private or loopback IP '{ip_addr}'"),
        ));
    }
    Ok(())
}

fn is_metadata_hostname(host: &str) -> bool {
    matches!(
        host,
        "metadata"
            | "metadata.google.internal"
            | "instance-data"
            | "instance-data.ec2.internal"
            | "metadata.azure.internal"
    )
}

fn is_metadata_ip(ip_addr: IpAddr) -> bool {
    matches!(ip_addr, IpAddr::V4(ipv4) if ipv4 == Ipv4Addr::new(169, 254, 169, 254))
}

fn is_private_network_ip(ip_addr: IpAddr) -> bool {
    match ip_addr {
        IpAddr::V4(ipv4) => {
            ipv4.is_private()
                || ipv4.is_loopback()
                || ipv4.is_link_local()
                || ipv4.is_broadcast()
                || is_ipv4_carrier_grade_nat(ipv4)
        }
        IpAddr::V6(ipv6) => {
            ipv6.is_loopback() || ipv6.is_unique_local() || is_ipv6_link_local(ipv6)
        }
    }
}

fn is_ipv4_carrier_grade_nat(ipv4: Ipv4Addr) -> bool {
    let octets = ipv4.octets();
    octets[0] == 100 && (64..=127).contains(&octets[1])
}

fn is_ipv6_link_local(ipv6: Ipv6Addr) -> bool {
    (ipv6.segments()[0] & 0xffc0) == 0xfe80
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn blocks_non_http_scheme() {
        let error = validate_webhook_url("ftp://example.com/hook")
            .await
            .unwrap_err();
        assert_eq!(error.reason_code, "webhook_blocked_scheme");
    }

    #[tokio::test]
    async fn blocks_loopback_ip() {
        let error = validate_webhook_url("http://127.0.0.1:1/").await.unwrap_err();
        assert_eq!(error.reason_code, "webhook_blocked_private_network");
    }

    #[tokio::test]
    async fn blocks_private_ip() {
        let error = validate_webhook_url("http://10.0.0.10/path")
            .await
            .unwrap_err();
        assert_eq!(error.reason_code, "webhook_blocked_private_network");
    }

    #[tokio::test]
    async fn blocks_localhost_hostname() {
        let error = validate_webhook_url("http://localhost:8787/hook")
            .await
            .unwrap_err();
        assert_eq!(error.reason_code, "webhook_blocked_private_network");
    }

    #[tokio::test]
    async fn blocks_metadata_endpoint() {
        let error = validate_webhook_url("http://169.254.169.254/latest/meta-data")
            .await
            .unwrap_err();
        assert_eq!(error.reason_code, "webhook_blocked_metadata_endpoint");
    }

    #[tokio::test]
    async fn blocks_malformed_url() {
        let error = validate_webhook_url("not a url").await.unwrap_err();
        assert_eq!(error.reason_code, "webhook_url_invalid");
    }

    #[tokio::test]
    async fn allows_public_ip() {
        validate_webhook_url("https://93.184.216.34/hook")
            .await
            .expect("public address should pass");
    }

    #[test]
    fn cgnat_range_is_private() {
        assert!(is_private_network_ip(IpAddr::V4(Ipv4Addr::new(
            100, 64, 0, 1
        ))));
        assert!(!is_private_network_ip(IpAddr::V4(Ipv4Addr::new(
            100, 63, 0, 1
        ))));
    }
}
