//! Effective ignore set: operator patterns plus registry domains

use crate::filter::IgnoreMatcher;
use std::collections::HashSet;
use std::net::IpAddr;

/// Combine the operator's base list with the registry's active domains
///
/// Base entries come first, verbatim and in order, and are never dropped.
/// Registry domains follow in the order given, skipping exact duplicates of
/// anything already in the result. With no registry domains the base list is
/// returned unchanged.
pub fn recompute(external_base: &[String], registry_active: &[String]) -> Vec<String> {
    let mut effective = external_base.to_vec();
    let mut seen: HashSet<&str> = external_base.iter().map(String::as_str).collect();

    for domain in registry_active {
        if seen.insert(domain.as_str()) {
            effective.push(domain.clone());
        }
    }

    effective
}

/// Ordered ignore entries handed to the proxy engine, with a compiled matcher
#[derive(Debug, Clone, Default)]
pub struct EffectiveIgnoreSet {
    entries: Vec<String>,
    matcher: IgnoreMatcher,
}

impl EffectiveIgnoreSet {
    pub fn new(entries: Vec<String>) -> Self {
        let matcher = IgnoreMatcher::from_entries(&entries);
        Self { entries, matcher }
    }

    /// Recompute from the base list and registry domains
    pub fn merged(external_base: &[String], registry_active: &[String]) -> Self {
        Self::new(recompute(external_base, registry_active))
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether the proxy should pass this connection through untouched
    pub fn matches(&self, host: &str, ip: Option<IpAddr>) -> bool {
        self.matcher.matches(host, ip)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_union_appends_registry_after_base() {
        assert_eq!(recompute(&list(&["a.com"]), &list(&["b.com"])), list(&["a.com", "b.com"]));
    }

    #[test]
    fn test_skips_duplicates_of_base() {
        assert_eq!(recompute(&list(&["a.com"]), &list(&["a.com"])), list(&["a.com"]));
    }

    #[test]
    fn test_empty_registry_keeps_base_verbatim() {
        let base = list(&["z.com", "a.com", "z.com"]);
        assert_eq!(recompute(&base, &[]), base);
    }

    #[test]
    fn test_empty_base() {
        assert_eq!(recompute(&[], &list(&["a.com", "b.com"])), list(&["a.com", "b.com"]));
    }

    #[test]
    fn test_duplicate_match_is_case_sensitive() {
        assert_eq!(
            recompute(&list(&["Example.com"]), &list(&["example.com"])),
            list(&["Example.com", "example.com"])
        );
    }

    #[test]
    fn test_recompute_is_deterministic() {
        let base = list(&["10.0.0.0/8", "corp.example"]);
        let active = list(&["a.com", "corp.example", "b.com"]);
        let first = recompute(&base, &active);
        assert_eq!(first, recompute(&base, &active));
        assert_eq!(first, list(&["10.0.0.0/8", "corp.example", "a.com", "b.com"]));
    }

    #[test]
    fn test_effective_set_matches_entries() {
        let set = EffectiveIgnoreSet::merged(&list(&["10.0.0.0/8"]), &list(&["bad.example.com"]));

        assert_eq!(set.len(), 2);
        assert!(set.matches("bad.example.com", None));
        assert!(set.matches("www.bad.example.com", None));
        assert!(set.matches("internal", Some("10.2.3.4".parse().unwrap())));
        assert!(!set.matches("good.example.com", None));
    }
}
