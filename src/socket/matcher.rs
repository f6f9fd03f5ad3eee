//! Proxy exception lists and loopback detection.
//!
//! An exception list names hosts that are reached directly even when a
//! proxy is configured. Entries are separated by `,` or `;` and may be:
//! - a domain, matching itself and its subdomains (`example.com`,
//!   `.example.com`)
//! - a glob with `*` (`*.corp.local`, `10.*`)
//! - an IP address or CIDR range (`192.168.0.0/16`, `::1`)
//! - `*` alone, matching everything

use std::net::IpAddr;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Rule {
    Any,
    Domain(String),
    Glob(String),
    Addr(IpAddr),
    Network(IpAddr, u8),
}

/// Hosts that bypass the proxy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExceptionList {
    rules: Vec<Rule>,
}

impl ExceptionList {
    /// Parse a `NO_PROXY`-style list.
    pub fn parse(list: &str) -> Self {
        let rules = list
            .split([',', ';'])
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(parse_rule)
            .collect();
        Self { rules }
    }

    /// Read `NO_PROXY`, falling back to `no_proxy`.
    pub fn from_env() -> Self {
        std::env::var("NO_PROXY")
            .or_else(|_| std::env::var("no_proxy"))
            .map(|v| Self::parse(&v))
            .unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Whether `host` is on the list.
    pub fn matches(&self, host: &str) -> bool {
        let host = strip_brackets(host).to_ascii_lowercase();
        let ip = host.parse::<IpAddr>().ok();

        self.rules.iter().any(|rule| match rule {
            Rule::Any => true,
            Rule::Domain(domain) => {
                host == *domain
                    || host
                        .strip_suffix(domain.as_str())
                        .is_some_and(|prefix| prefix.ends_with('.'))
            }
            Rule::Glob(pattern) => glob_match(pattern.as_bytes(), host.as_bytes()),
            Rule::Addr(addr) => ip == Some(*addr),
            Rule::Network(net, prefix) => ip.is_some_and(|ip| in_network(*net, *prefix, ip)),
        })
    }
}

fn parse_rule(entry: &str) -> Rule {
    if entry == "*" {
        return Rule::Any;
    }
    if let Some((addr, bits)) = entry.split_once('/') {
        if let (Ok(addr), Ok(bits)) = (addr.parse::<IpAddr>(), bits.parse::<u8>()) {
            return Rule::Network(addr, bits);
        }
    }
    let entry = strip_brackets(entry);
    if let Ok(addr) = entry.parse::<IpAddr>() {
        return Rule::Addr(addr);
    }
    let entry = entry.to_ascii_lowercase();
    if entry.contains('*') {
        return Rule::Glob(entry);
    }
    Rule::Domain(entry.trim_start_matches('.').to_string())
}

fn strip_brackets(host: &str) -> &str {
    host.trim_start_matches('[').trim_end_matches(']')
}

/// `*` matches any run of bytes, including an empty one.
fn glob_match(pattern: &[u8], text: &[u8]) -> bool {
    let (mut p, mut t) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;
    while t < text.len() {
        if p < pattern.len() && pattern[p] == b'*' {
            backtrack = Some((p, t));
            p += 1;
        } else if p < pattern.len() && pattern[p] == text[t] {
            p += 1;
            t += 1;
        } else if let Some((bp, bt)) = backtrack {
            p = bp + 1;
            t = bt + 1;
            backtrack = Some((bp, bt + 1));
        } else {
            return false;
        }
    }
    pattern[p..].iter().all(|&b| b == b'*')
}

fn in_network(net: IpAddr, prefix: u8, ip: IpAddr) -> bool {
    let (net, ip, width) = match (net, ip) {
        (IpAddr::V4(n), IpAddr::V4(i)) => (u32::from(n) as u128, u32::from(i) as u128, 32),
        (IpAddr::V6(n), IpAddr::V6(i)) => (u128::from(n), u128::from(i), 128),
        _ => return false,
    };
    if prefix > width {
        return false;
    }
    let shift = u32::from(width - prefix);
    net.checked_shr(shift).unwrap_or(0) == ip.checked_shr(shift).unwrap_or(0)
}

/// `localhost`, `*.localhost`, and loopback addresses.
pub fn is_loopback_host(host: &str) -> bool {
    let host = strip_brackets(host);
    if host.eq_ignore_ascii_case("localhost")
        || host.to_ascii_lowercase().ends_with(".localhost")
    {
        return true;
    }
    host.parse::<IpAddr>().is_ok_and(|ip| ip.is_loopback())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_match_all() {
        let list = ExceptionList::parse("*");
        assert!(list.matches("anything.test"));
        assert!(list.matches("10.0.0.1"));
    }

    #[test]
    fn test_domain_and_subdomains() {
        let list = ExceptionList::parse(".example.com; intranet");
        assert!(list.matches("example.com"));
        assert!(list.matches("WWW.Example.com"));
        assert!(list.matches("intranet"));
        assert!(!list.matches("notexample.com"));
        assert!(!list.matches("intranet.example.org"));
    }

    #[test]
    fn test_glob() {
        let list = ExceptionList::parse("*.corp.local, 10.*");
        assert!(list.matches("build.corp.local"));
        assert!(!list.matches("corp.local"));
        assert!(list.matches("10.1.2.3"));
        assert!(!list.matches("110.1.2.3"));
    }

    #[test]
    fn test_addresses_and_networks() {
        let list = ExceptionList::parse("192.168.0.0/16, ::1, 2001:db8::/32");
        assert!(list.matches("192.168.4.20"));
        assert!(!list.matches("192.169.0.1"));
        assert!(list.matches("[::1]"));
        assert!(list.matches("2001:db8::7"));
        assert!(!list.matches("2001:db9::7"));
    }

    #[test]
    fn test_empty_list() {
        let list = ExceptionList::parse(" , ;");
        assert!(list.is_empty());
        assert!(!list.matches("example.com"));
    }

    #[test]
    fn test_loopback() {
        assert!(is_loopback_host("localhost"));
        assert!(is_loopback_host("api.localhost"));
        assert!(is_loopback_host("127.0.0.1"));
        assert!(is_loopback_host("127.8.9.10"));
        assert!(is_loopback_host("[::1]"));
        assert!(!is_loopback_host("example.com"));
        assert!(!is_loopback_host("10.0.0.1"));
    }
}
