//! System ARP cache lookup
//!
//! Tries `ip neigh show <ip>` first, then `arp -n <ip>`. Nothing is sent on
//! the wire; only the kernel's neighbour table is read.

use std::net::Ipv4Addr;
use std::process::Stdio;
use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use tokio::process::Command;

fn mac_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b([0-9a-f]{1,2}[:-]){5}[0-9a-f]{1,2}\b").expect("Invalid MAC Regex")
    })
}

/// Normalise to "AA:BB:CC:DD:EE:FF", padding single-digit octets
pub fn normalize_mac(raw: &str) -> Option<String> {
    let octets: Vec<String> = raw
        .split(|c| c == ':' || c == '-')
        .map(|o| format!("{:0>2}", o.to_uppercase()))
        .collect();
    if octets.len() != 6 || octets.iter().any(|o| o.len() != 2) {
        return None;
    }
    let mac = octets.join(":");
    // Incomplete entries show as all zeros on some systems
    (mac != "00:00:00:00:00:00").then_some(mac)
}

/// Parse `ip neigh show` output for one address
///
/// Format: `IP dev interface lladdr MAC STATE`
pub fn parse_ip_neigh_output(output: &str, ip: Ipv4Addr) -> Option<String> {
    let ip = ip.to_string();
    output.lines().find_map(|line| {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.first() != Some(&ip.as_str()) {
            return None;
        }
        let pos = parts.iter().position(|p| *p == "lladdr")?;
        parts.get(pos + 1).and_then(|m| normalize_mac(m))
    })
}

/// Parse `arp -n` output (Linux table or BSD one-liner) for one address
pub fn parse_arp_output(output: &str, ip: Ipv4Addr) -> Option<String> {
    let ip = ip.to_string();
    output
        .lines()
        .filter(|line| {
            line.split_whitespace()
                .any(|tok| tok.trim_matches(|c| c == '(' || c == ')') == ip)
        })
        .find_map(|line| mac_regex().find(line).and_then(|m| normalize_mac(m.as_str())))
}

async fn run(program: &str, args: &[&str], timeout: Duration) -> Option<String> {
    let child = Command::new(program)
        .args(args)
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()
        .ok()?;
    match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(Ok(output)) if output.status.success() => {
            Some(String::from_utf8_lossy(&output.stdout).into_owned())
        }
        _ => None,
    }
}

/// MAC for an IP from the system neighbour table, if present
pub async fn lookup_mac(ip: Ipv4Addr, timeout: Duration) -> Option<String> {
    let ip_str = ip.to_string();

    if let Some(out) = run("ip", &["neigh", "show", &ip_str], timeout).await {
        if let Some(mac) = parse_ip_neigh_output(&out, ip) {
            return Some(mac);
        }
    }

    let out = run("arp", &["-n", &ip_str], timeout).await?;
    let mac = parse_arp_output(&out, ip);
    if mac.is_none() {
        tracing::debug!(ip = %ip, "no ARP entry");
    }
    mac
}
