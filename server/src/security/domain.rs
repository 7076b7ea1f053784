use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

/// Pattern that matches every domain.
pub const WILDCARD: &str = ".*";

/// Compiled suffix regexes keyed by pattern; `None` marks a pattern that does
/// not compile. Patterns only come from configuration and from tokens whose
/// signature was checked, so the map stays as small as the user table.
static COMPILED: Lazy<RwLock<HashMap<String, Option<Regex>>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

fn compile(pattern: &str) -> Result<Regex, regex::Error> {
    Regex::new(&format!("{}$", pattern))
}

fn compiled(pattern: &str) -> Option<Regex> {
    if let Some(hit) = COMPILED
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .get(pattern)
    {
        return hit.clone();
    }

    let re = match compile(pattern) {
        Ok(re) => Some(re),
        Err(e) => {
            warn!("Skipping invalid domain pattern {:?}: {}", pattern, e);
            None
        }
    };

    COMPILED
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .insert(pattern.to_string(), re.clone());
    re
}

/// Reduce a URL or host to the bare domain: scheme, path and port removed.
///
/// A bracketed IPv6 literal is kept whole (`[::1]:8080` gives `[::1]`). A
/// bare IPv6 address without brackets has no unambiguous port and is
/// returned as-is.
pub fn extract_domain(raw: &str) -> &str {
    // remove scheme (domain.com:port/path)
    let rest = match raw.find("//") {
        Some(idx) => &raw[idx + 2..],
        None => raw,
    };

    // remove path (domain.com:port)
    let authority = rest.split('/').next().unwrap_or(rest);

    strip_port(authority)
}

/// Drop a trailing `:port` from a host, treating `[...]` as one unit.
pub fn strip_port(host: &str) -> &str {
    if host.starts_with('[') {
        return match host.find(']') {
            Some(end) => &host[..=end],
            None => host,
        };
    }

    match host.rfind(':') {
        // exactly one colon: host:port
        Some(idx) if host[..idx].find(':').is_none() => &host[..idx],
        _ => host,
    }
}

/// `true` when the domain of `candidate` ends with a match of one of
/// `patterns`, each pattern being a regular expression anchored at the end
/// only.
///
/// The wildcard `.*` matches anything, the empty candidate included. Otherwise
/// an empty pattern set or an empty candidate never matches. Patterns that
/// fail to compile are skipped.
pub fn matches<S: AsRef<str>>(patterns: &[S], candidate: &str) -> bool {
    if patterns.iter().any(|p| p.as_ref() == WILDCARD) {
        return true;
    }

    let domain = extract_domain(candidate);
    if domain.is_empty() {
        return false;
    }

    patterns.iter().map(AsRef::as_ref).any(|pattern| {
        let hit = compiled(pattern).is_some_and(|re| re.is_match(domain));
        if hit {
            debug!("Domain {} matched pattern {}", domain, pattern);
        }
        hit
    })
}

/// Check that every pattern compiles, so a bad allow-list fails at startup
/// instead of silently denying at request time. Good patterns are kept
/// compiled for [`matches`].
pub fn check_patterns<S: AsRef<str>>(patterns: &[S]) -> Result<(), regex::Error> {
    for pattern in patterns {
        let pattern = pattern.as_ref();
        let re = compile(pattern)?;
        COMPILED
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(pattern.to_string(), Some(re));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn extract_strips_scheme_port_and_path() {
        assert_eq!(extract_domain("https://host:443/path"), "host");
        assert_eq!(extract_domain("host"), "host");
        assert_eq!(extract_domain("http://sub.url.com/a/b?c=d"), "sub.url.com");
        assert_eq!(extract_domain("url.com:8080"), "url.com");
        assert_eq!(extract_domain(""), "");
    }

    #[test]
    fn extract_keeps_bracketed_ipv6() {
        assert_eq!(extract_domain("http://[::1]:8080/x"), "[::1]");
        assert_eq!(extract_domain("[2001:db8::1]"), "[2001:db8::1]");
        assert_eq!(extract_domain("2001:db8::1"), "2001:db8::1");
    }

    #[test]
    fn matches_is_a_suffix_regex() {
        assert!(matches(&["a.*"], "sub.a.com"));
        assert!(matches(&["url.com"], "https://url.com:443/"));
        assert!(matches(&[".*example.com"], "deep.sub.example.com"));
        assert!(!matches(&["url.com"], "url.com.evil.net"));
        assert!(!matches(&["url.fr"], "baddomain"));
    }

    #[test]
    fn empty_patterns_never_match() {
        let none: [&str; 0] = [];
        assert!(!matches(&none, "anything"));
    }

    #[test]
    fn wildcard_matches_everything() {
        assert!(matches(&[WILDCARD], "whatever.org"));
        assert!(matches(&[WILDCARD], ""));
        assert!(matches(&[WILDCARD], "http:///x"));
        assert!(matches(&["url.com", WILDCARD], ""));
        assert!(!matches(&["url.com"], ""));
    }

    #[test]
    fn patterns_are_compiled_once() {
        assert!(matches(&["cached\\.example"], "www.cached.example"));
        assert!(COMPILED.read().unwrap()["cached\\.example"].is_some());

        assert!(!matches(&["[unclosed"], "unclosed"));
        assert!(COMPILED.read().unwrap()["[unclosed"].is_none());

        check_patterns(&["warmed\\.example"]).unwrap();
        assert!(COMPILED.read().unwrap().contains_key("warmed\\.example"));
        assert!(matches(&["warmed\\.example"], "https://warmed.example/"));
    }

    #[test]
    fn invalid_pattern_is_skipped() {
        assert!(matches(&["(", "url.com"], "url.com"));
        assert!(!matches(&["("], "url.com"));
        assert!(check_patterns(&["("]).is_err());
        assert!(check_patterns(&["url.com", ".*"]).is_ok());
    }

    proptest! {
        #[test]
        fn extract_is_idempotent_on_plain_hosts(
            host in "[a-z]{1,10}(\\.[a-z]{1,6}){0,3}",
            port in 1u16..,
            path in "(/[a-z0-9]{0,8}){0,3}",
        ) {
            let url = format!("https://{}:{}{}", host, port, path);
            prop_assert_eq!(extract_domain(&url), host.as_str());
            prop_assert_eq!(extract_domain(&host), host.as_str());
        }

        #[test]
        fn a_host_always_matches_its_escaped_self(host in "[a-z]{1,10}(\\.[a-z]{1,6}){0,3}") {
            let pattern = regex::escape(&host);
            let url = format!("http://{}/", host);
            prop_assert!(matches(&[pattern], &url));
        }
    }
}
