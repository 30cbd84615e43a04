//! Host and IP matching against the effective ignore set

use ipnet::{IpNet, Ipv4Net, Ipv6Net};
use std::collections::HashSet;
use std::net::IpAddr;
use wildmatch::WildMatch;

/// Matcher for ignore-set entries
///
/// A plain entry `example.com` matches `example.com` itself and any
/// subdomain of it. Entries with `*` or `?` are wildcard patterns, and IP
/// addresses or CIDR ranges match the peer address.
#[derive(Debug, Clone, Default)]
pub struct IgnoreMatcher {
    domains: HashSet<String>,
    patterns: Vec<WildMatch>,
    ipv4_ranges: Vec<Ipv4Net>,
    ipv6_ranges: Vec<Ipv6Net>,
}

impl IgnoreMatcher {
    /// Create a new empty matcher
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a matcher from effective-set entries
    pub fn from_entries<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut matcher = Self::new();
        for entry in entries {
            matcher.add_entry(entry.as_ref());
        }
        matcher
    }

    /// Add one entry, classifying it as domain, pattern or address range
    pub fn add_entry(&mut self, entry: &str) {
        let entry = entry.trim();
        if entry.is_empty() {
            return;
        }

        if entry.contains(['*', '?']) {
            self.add_pattern(entry);
        } else if let Ok(net) = entry.parse::<IpNet>() {
            self.add_range(net);
        } else if let Ok(addr) = entry.parse::<IpAddr>() {
            self.add_range(IpNet::from(addr));
            self.add_domain(entry);
        } else {
            self.add_domain(entry);
        }
    }

    /// Add an exact-or-subdomain entry
    pub fn add_domain(&mut self, domain: &str) {
        let domain = domain.trim_end_matches('.').to_ascii_lowercase();
        self.domains.insert(domain);
    }

    /// Add a wildcard pattern for host matching
    pub fn add_pattern(&mut self, pattern: &str) {
        self.patterns.push(WildMatch::new(&pattern.to_ascii_lowercase()));
    }

    /// Add an IPv4 or IPv6 CIDR range
    pub fn add_range(&mut self, range: IpNet) {
        match range {
            IpNet::V4(net) => self.ipv4_ranges.push(net),
            IpNet::V6(net) => self.ipv6_ranges.push(net),
        }
    }

    /// Check if a hostname is ignored by a domain or pattern entry
    pub fn matches_host(&self, host: &str) -> bool {
        let host = host.trim_end_matches('.').to_ascii_lowercase();
        if host.is_empty() {
            return false;
        }

        let mut suffix = host.as_str();
        loop {
            if self.domains.contains(suffix) {
                return true;
            }
            match suffix.split_once('.') {
                Some((_, rest)) if !rest.is_empty() => suffix = rest,
                _ => break,
            }
        }

        self.patterns.iter().any(|p| p.matches(&host))
    }

    /// Check if an IP address matches any range
    pub fn matches_ip(&self, ip: IpAddr) -> bool {
        match ip {
            IpAddr::V4(ipv4) => self.ipv4_ranges.iter().any(|net| net.contains(&ipv4)),
            IpAddr::V6(ipv6) => self.ipv6_ranges.iter().any(|net| net.contains(&ipv6)),
        }
    }

    /// Check if either hostname or IP matches
    pub fn matches(&self, host: &str, ip: Option<IpAddr>) -> bool {
        if self.matches_host(host) {
            return true;
        }

        if let Some(addr) = ip {
            return self.matches_ip(addr);
        }

        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn test_domain_and_subdomains() {
        let matcher = IgnoreMatcher::from_entries(["example.com"]);

        assert!(matcher.matches_host("example.com"));
        assert!(matcher.matches_host("api.example.com"));
        assert!(matcher.matches_host("deep.api.example.com"));
        assert!(matcher.matches_host("API.Example.COM."));
        assert!(!matcher.matches_host("badexample.com"));
        assert!(!matcher.matches_host("example.com.evil.org"));
        assert!(!matcher.matches_host("com"));
    }

    #[test]
    fn test_wildcard_matching() {
        let matcher = IgnoreMatcher::from_entries(["*.cdn.example.net", "test.*.org"]);

        assert!(matcher.matches_host("img.cdn.example.net"));
        assert!(matcher.matches_host("test.something.org"));
        assert!(!matcher.matches_host("cdn.example.net"));
        assert!(!matcher.matches_host("something.org"));
    }

    #[test]
    fn test_ipv4_matching() {
        let matcher = IgnoreMatcher::from_entries(["192.168.1.0/24"]);

        let ip_in = IpAddr::V4("192.168.1.100".parse::<Ipv4Addr>().unwrap());
        let ip_out = IpAddr::V4("192.168.2.100".parse::<Ipv4Addr>().unwrap());

        assert!(matcher.matches_ip(ip_in));
        assert!(!matcher.matches_ip(ip_out));
    }

    #[test]
    fn test_bare_ip_entry_matches_host_and_address() {
        let matcher = IgnoreMatcher::from_entries(["93.184.216.34", "2001:db8::1"]);

        assert!(matcher.matches_host("93.184.216.34"));
        assert!(matcher.matches_ip("93.184.216.34".parse().unwrap()));
        assert!(!matcher.matches_ip("93.184.216.35".parse().unwrap()));
        assert!(matcher.matches_ip("2001:db8::1".parse().unwrap()));
    }

    #[test]
    fn test_combined_matching() {
        let matcher = IgnoreMatcher::from_entries(["example.com", "10.0.0.0/8"]);
        let ip = Some(IpAddr::V4("10.1.2.3".parse::<Ipv4Addr>().unwrap()));

        assert!(matcher.matches("foo.example.com", None));
        assert!(matcher.matches("anything.com", ip));
        assert!(!matcher.matches("other.org", None));
    }

    #[test]
    fn test_empty_matcher() {
        let matcher = IgnoreMatcher::from_entries(["", "   "]);
        assert!(!matcher.matches_host("example.com"));
        assert!(!matcher.matches_host(""));
        assert!(!matcher.matches("example.com", Some("10.0.0.1".parse().unwrap())));
    }
}
