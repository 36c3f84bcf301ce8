//! IP range parsing
//!
//! Accepts a single IPv4 address, `start-end` with two dotted quads,
//! the `a.b.c.d-e` last-octet shorthand, and CIDR notation.

use std::net::Ipv4Addr;

use crate::error::{Error, Result};

/// Upper bound on addresses produced by one range
pub const MAX_RANGE_SIZE: u64 = 65_536;

/// Four decimal octets, each 0..=255
pub fn is_valid_ip(s: &str) -> bool {
    let parts: Vec<&str> = s.trim().split('.').collect();
    parts.len() == 4
        && parts.iter().all(|p| {
            !p.is_empty()
                && p.len() <= 3
                && p.bytes().all(|b| b.is_ascii_digit())
                && p.parse::<u16>().map_or(false, |n| n <= 255)
        })
}

fn parse_ip(s: &str) -> Result<Ipv4Addr> {
    let s = s.trim();
    if !is_valid_ip(s) {
        return Err(Error::Config(format!("Invalid IP address: {}", s)));
    }
    s.parse()
        .map_err(|_| Error::Config(format!("Invalid IP address: {}", s)))
}

/// Inclusive, ascending range; reversed endpoints are swapped
pub fn generate_range(start: Ipv4Addr, end: Ipv4Addr) -> Result<Vec<Ipv4Addr>> {
    let (a, b) = (u32::from(start), u32::from(end));
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    if (hi - lo) as u64 + 1 > MAX_RANGE_SIZE {
        return Err(Error::Config(format!(
            "IP range too large: {} - {}",
            start, end
        )));
    }
    Ok((lo..=hi).map(Ipv4Addr::from).collect())
}

fn parse_cidr(base: &str, prefix: &str) -> Result<Vec<Ipv4Addr>> {
    let base_ip = parse_ip(base)?;
    let prefix: u8 = prefix
        .trim()
        .parse()
        .map_err(|_| Error::Config(format!("Invalid prefix: {}", prefix)))?;
    if prefix > 32 {
        return Err(Error::Config(format!("Invalid prefix: {} (must be 0-32)", prefix)));
    }

    let mask = if prefix == 0 {
        0
    } else {
        !((1u32 << (32 - prefix)) - 1)
    };
    let network = u32::from(base_ip) & mask;
    let broadcast = network | !mask;

    // Skip network and broadcast addresses for /24..=/30
    let (start, end) = if (24..=30).contains(&prefix) {
        (network + 1, broadcast - 1)
    } else {
        (network, broadcast)
    };
    generate_range(Ipv4Addr::from(start), Ipv4Addr::from(end))
}

/// Parse a range expression into an address list
pub fn parse_ip_range(input: &str) -> Result<Vec<Ipv4Addr>> {
    let input = input.trim();
    if input.is_empty() {
        return Err(Error::Config("IP range is required".to_string()));
    }

    if let Some((base, prefix)) = input.split_once('/') {
        return parse_cidr(base, prefix);
    }

    match input.split_once('-') {
        None => Ok(vec![parse_ip(input)?]),
        Some((start, end)) => {
            let start_ip = parse_ip(start)?;
            let end = end.trim();
            let end_ip = if is_valid_ip(end) {
                parse_ip(end)?
            } else {
                // a.b.c.d-e shorthand
                let last: u8 = end
                    .parse()
                    .map_err(|_| Error::Config(format!("Invalid IP address: {}", end)))?;
                let [a, b, c, _] = start_ip.octets();
                Ipv4Addr::new(a, b, c, last)
            };
            generate_range(start_ip, end_ip)
        }
    }
}
