//! `allowed_hosts` authorization: literal-string IP allowlist with
//! IPv4-mapped-IPv6 normalization.

use std::net::IpAddr;

/// True if `peer` is permitted. An empty `allowed` list allows any peer.
/// An IPv4-mapped-IPv6 peer (`::ffff:a.b.c.d`) is compared using its
/// extracted IPv4 form, matching how the original handler normalized
/// `IPV4_MAPPED_IPV6_RE` addresses before the textual comparison.
pub fn host_allowed(allowed: &[String], peer: IpAddr) -> bool {
    if allowed.is_empty() {
        return true;
    }
    let candidate = match peer {
        IpAddr::V4(v4) => v4.to_string(),
        IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
            Some(v4) => v4.to_string(),
            None => v6.to_string(),
        },
    };
    allowed.iter().any(|h| h == &candidate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{Ipv4Addr, Ipv6Addr};

    #[test]
    fn empty_allows_any() {
        assert!(host_allowed(&[], "10.0.0.5".parse().unwrap()));
    }

    #[test]
    fn matches_literal_ipv4() {
        let allowed = vec!["10.0.0.1".to_string()];
        assert!(host_allowed(&allowed, IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1))));
        assert!(!host_allowed(&allowed, IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2))));
    }

    #[test]
    fn normalizes_ipv4_mapped_ipv6() {
        let allowed = vec!["10.0.0.1".to_string()];
        let mapped = Ipv6Addr::new(0, 0, 0, 0, 0, 0xffff, 0x0a00, 0x0001);
        assert!(host_allowed(&allowed, IpAddr::V6(mapped)));
    }

    #[test]
    fn raw_ipv6_entries_match_textually() {
        let allowed = vec!["2001:db8::1".to_string()];
        assert!(host_allowed(&allowed, "2001:db8::1".parse().unwrap()));
    }
}
