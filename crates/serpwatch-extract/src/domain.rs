//! Domain normalization and matching for rank resolution.

/// Normalizes a domain or URL to a bare host: lowercase, scheme stripped,
/// leading `www.` stripped, path/query/fragment dropped, port stripped.
#[must_use]
pub fn normalize_domain(raw: &str) -> String {
    let mut s = raw.trim().to_ascii_lowercase();

    if let Some(idx) = s.find("://") {
        s.drain(..idx + 3);
    }

    // Drop everything after the host.
    if let Some(idx) = s.find(['/', '?', '#']) {
        s.truncate(idx);
    }

    // Strip a numeric port. rfind keeps IPv6-style hosts intact because a
    // bracketed host's colon segments are not all-digit suffixes.
    if let Some(idx) = s.rfind(':') {
        if !s[idx + 1..].is_empty() && s[idx + 1..].bytes().all(|b| b.is_ascii_digit()) {
            s.truncate(idx);
        }
    }

    s.strip_prefix("www.").map_or_else(|| s.clone(), str::to_owned)
}

/// Returns `true` when two *normalized* domains refer to the same site:
/// exact equality, or one is a dot-suffix subdomain of the other (covers
/// `shop.example.com` vs `example.com` in either direction).
#[must_use]
pub fn domains_match(a: &str, b: &str) -> bool {
    if a.is_empty() || b.is_empty() {
        return false;
    }
    a == b || is_subdomain_of(a, b) || is_subdomain_of(b, a)
}

fn is_subdomain_of(sub: &str, parent: &str) -> bool {
    sub.len() > parent.len()
        && sub.ends_with(parent)
        && sub.as_bytes()[sub.len() - parent.len() - 1] == b'.'
}
