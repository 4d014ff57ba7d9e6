//! Client address normalization.
//!
//! Picks the caller's address from the forwarding header or the connection
//! address and reduces it to the canonical textual form of an IP address.

use std::net::IpAddr;

/// Normalize the client address of a request.
///
/// The first entry of `forwarded_for` wins when the header is present and
/// non-empty; otherwise the first entry of `remote_addr` is used. Ports and
/// IPv6 brackets are stripped. When nothing parses as an IP address the
/// candidate is returned unchanged.
pub fn normalize_ip(forwarded_for: Option<&str>, remote_addr: Option<&str>) -> String {
    let source = match forwarded_for {
        Some(header) if !header.trim().is_empty() => header,
        _ => remote_addr.unwrap_or(""),
    };

    let candidate = first_entry(source);

    parse_candidate(candidate)
        .map(|ip| ip.to_string())
        .unwrap_or_else(|| candidate.to_string())
}

fn first_entry(list: &str) -> &str {
    list.split(',').next().unwrap_or("").trim()
}

fn parse_candidate(candidate: &str) -> Option<IpAddr> {
    // [addr]:port
    let bracketed = candidate.trim_start_matches('[');
    let bracketed = bracketed.split(']').next().unwrap_or(bracketed);
    if let Ok(ip) = bracketed.parse::<IpAddr>() {
        return Some(ip);
    }

    // addr:port
    if let Some((host, _port)) = candidate.split_once(':') {
        if let Ok(ip) = host.parse::<IpAddr>() {
            return Some(ip);
        }
    }

    candidate.parse::<IpAddr>().ok()
}
