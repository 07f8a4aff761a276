// SPDX-License-Identifier: MIT OR Apache-2.0
//! Runtime egress gate (SPEC_FULL §4.2 step 1).

use gate_core::Decision;
use std::collections::BTreeSet;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// Whether the egress gate is wide open, or restricted to the allowlist plus
/// private/loopback destinations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EgressMode {
    /// Every destination is permitted.
    Allow,
    /// Only allowlisted hostnames or private/loopback addresses are permitted.
    Restricted,
}

/// Egress rules: a mode plus the hostname allowlist consulted under
/// [`EgressMode::Restricted`].
#[derive(Debug, Clone)]
pub struct EgressRules {
    /// Open or restricted posture.
    pub mode: EgressMode,
    /// Hostnames permitted even though they don't resolve to a private address.
    pub allowed_hosts: BTreeSet<String>,
}

impl EgressRules {
    /// A wide-open egress posture.
    #[must_use]
    pub fn allow_all() -> Self {
        Self { mode: EgressMode::Allow, allowed_hosts: BTreeSet::new() }
    }
}

/// Classifies whether `addr` is loopback, RFC1918/CGNAT, link-local, or ULA.
///
/// These are the address classes the egress gate treats as "private enough
/// to reach without an explicit allowlist entry" (SPEC_FULL §4.2 step 1).
#[must_use]
pub fn is_private_address(addr: IpAddr) -> bool {
    match addr {
        IpAddr::V4(v4) => is_private_v4(v4),
        IpAddr::V6(v6) => is_private_v6(v6),
    }
}

fn is_private_v4(v4: Ipv4Addr) -> bool {
    if v4.is_loopback() || v4.is_link_local() || v4.is_private() {
        return true;
    }
    // 100.64.0.0/10, carrier-grade NAT (RFC 6598).
    let octets = v4.octets();
    octets[0] == 100 && (64..=127).contains(&octets[1])
}

fn is_private_v6(v6: Ipv6Addr) -> bool {
    if v6.is_loopback() {
        return true;
    }
    if let Some(v4) = v6.to_ipv4_mapped() {
        return is_private_v4(v4);
    }
    // fc00::/7, unique local addresses (RFC 4193).
    let is_ula = (v6.segments()[0] & 0xfe00) == 0xfc00;
    // fe80::/10, link-local.
    let is_link_local = (v6.segments()[0] & 0xffc0) == 0xfe80;
    is_ula || is_link_local
}

/// Evaluates whether `host` is a permitted egress target.
///
/// `resolved_ips` is the set of addresses `host` resolved to (already
/// performed by the caller; DNS lookup errors are the caller's concern and
/// surface as a deny before this function is reached). An empty slice is
/// treated as "host is itself a literal IP, not a DNS name" and skips the
/// all-addresses-private check.
#[must_use]
pub fn evaluate_egress(host: &str, resolved_ips: &[IpAddr], rules: &EgressRules) -> Decision {
    if rules.mode == EgressMode::Allow {
        return Decision::allow();
    }
    if rules.allowed_hosts.contains(host) {
        return Decision::allow();
    }
    if let Ok(literal) = host.parse::<IpAddr>() {
        return if is_private_address(literal) {
            Decision::allow()
        } else {
            Decision::block(format!("egress target '{host}' is not an allowlisted or private address"))
        };
    }
    if !resolved_ips.is_empty() && resolved_ips.iter().all(|ip| is_private_address(*ip)) {
        return Decision::allow();
    }
    Decision::block(format!("egress target '{host}' is not allowlisted and does not resolve to only private addresses"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn restricted(hosts: &[&str]) -> EgressRules {
        EgressRules { mode: EgressMode::Restricted, allowed_hosts: hosts.iter().map(|s| s.to_string()).collect() }
    }

    #[test]
    fn allow_mode_passes_everything() {
        let decision = evaluate_egress("anything.example.com", &[], &EgressRules::allow_all());
        assert!(decision.is_allow());
    }

    #[test]
    fn allowlisted_hostname_passes_under_restricted_mode() {
        let decision = evaluate_egress("api.example.com", &[], &restricted(&["api.example.com"]));
        assert!(decision.is_allow());
    }

    #[test]
    fn loopback_literal_ip_passes() {
        let decision = evaluate_egress("127.0.0.1", &[], &restricted(&[]));
        assert!(decision.is_allow());
    }

    #[test]
    fn public_literal_ip_is_denied() {
        let decision = evaluate_egress("8.8.8.8", &[], &restricted(&[]));
        assert!(!decision.is_allow());
    }

    #[test]
    fn hostname_resolving_only_to_private_addresses_passes() {
        let ips = vec![IpAddr::V4(Ipv4Addr::new(10, 0, 0, 5))];
        let decision = evaluate_egress("internal.svc", &ips, &restricted(&[]));
        assert!(decision.is_allow());
    }

    #[test]
    fn hostname_resolving_to_any_public_address_is_denied() {
        let ips = vec![IpAddr::V4(Ipv4Addr::new(10, 0, 0, 5)), IpAddr::V4(Ipv4Addr::new(93, 184, 216, 34))];
        let decision = evaluate_egress("mixed.example", &ips, &restricted(&[]));
        assert!(!decision.is_allow());
    }

    #[test]
    fn cgnat_range_is_private() {
        assert!(is_private_address(IpAddr::V4(Ipv4Addr::new(100, 64, 0, 1))));
        assert!(!is_private_address(IpAddr::V4(Ipv4Addr::new(100, 128, 0, 1))));
    }

    #[test]
    fn ipv6_unique_local_is_private() {
        let ula: Ipv6Addr = "fd00::1".parse().unwrap();
        assert!(is_private_address(IpAddr::V6(ula)));
    }

    #[test]
    fn ipv6_global_is_not_private() {
        let global: Ipv6Addr = "2606:4700:4700::1111".parse().unwrap();
        assert!(!is_private_address(IpAddr::V6(global)));
    }
}
