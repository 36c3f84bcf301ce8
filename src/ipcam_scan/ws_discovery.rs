//! WS-Discovery probe for ONVIF NetworkVideoTransmitters
//!
//! One multicast Probe, then unicast ProbeMatches collected for a fixed
//! window. Replies are keyed by the host of their device-service XAddr.

use std::collections::HashSet;
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;
use reqwest::Url;
use uuid::Uuid;

use crate::error::Result;
use crate::models::Device;
use crate::onvif_client::xml::extract_xml_value;

pub const WSD_MULTICAST: Ipv4Addr = Ipv4Addr::new(239, 255, 255, 250);
pub const WSD_PORT: u16 = 3702;

/// Probe envelope with a fresh MessageID
pub fn probe_message(message_id: Uuid) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?><e:Envelope xmlns:e="http://www.w3.org/2003/05/soap-envelope" xmlns:w="http://schemas.xmlsoap.org/ws/2004/08/addressing" xmlns:d="http://schemas.xmlsoap.org/ws/2005/04/discovery" xmlns:dn="http://www.onvif.org/ver10/network/wsdl"><e:Header><w:MessageID>uuid:{}</w:MessageID><w:To>urn:schemas-xmlsoap-org:ws:2005:04:discovery</w:To><w:Action>http://schemas.xmlsoap.org/ws/2005/04/discovery/Probe</w:Action></e:Header><e:Body><d:Probe><d:Types>dn:NetworkVideoTransmitter</d:Types></d:Probe></e:Body></e:Envelope>"#,
        message_id
    )
}

/// Device-service address from a ProbeMatch, preferring IPv4 entries
pub fn parse_xaddrs(reply: &str) -> Option<String> {
    let xaddrs = extract_xml_value(reply, "XAddrs")?;
    xaddrs
        .split_whitespace()
        .find(|a| !a.contains('['))
        .map(str::to_string)
}

/// Host part of a service address
pub fn xaddr_host(xaddr: &str) -> Option<String> {
    Url::parse(xaddr).ok()?.host_str().map(str::to_string)
}

/// Send one probe to `target` (normally the multicast group) and collect
/// replies until `window` elapses.
///
/// Malformed replies are skipped. Each host is reported once.
pub async fn ws_discover(target: SocketAddr, window: Duration, cancel: &CancellationToken) -> Result<Vec<Device>> {
    let socket = UdpSocket::bind("0.0.0.0:0").await?;
    socket.set_multicast_ttl_v4(4)?;
    let probe = probe_message(Uuid::new_v4());
    socket.send_to(probe.as_bytes(), target).await?;
    tracing::info!(target = %target, window_ms = window.as_millis() as u64, "WS-Discovery probe sent");

    let deadline = tokio::time::Instant::now() + window;
    let mut seen = HashSet::new();
    let mut devices = Vec::new();
    let mut buf = vec![0u8; 8192];

    loop {
        let recv = tokio::select! {
            r = tokio::time::timeout_at(deadline, socket.recv_from(&mut buf)) => r,
            _ = cancel.cancelled() => break,
        };
        let (len, from) = match recv {
            Err(_) => break,
            Ok(Err(e)) => {
                tracing::debug!(error = %e, "WS-Discovery receive failed");
                continue;
            }
            Ok(Ok(r)) => r,
        };

        let reply = String::from_utf8_lossy(&buf[..len]);
        let Some(xaddr) = parse_xaddrs(&reply) else {
            tracing::debug!(from = %from, "Reply without usable XAddrs");
            continue;
        };
        let Some(host) = xaddr_host(&xaddr) else {
            continue;
        };
        if !seen.insert(host.clone()) {
            continue;
        }
        tracing::info!(ip = %host, xaddr = %xaddr, "ONVIF device answered");
        let device = Device::new(host);
        device.set_service_address(xaddr);
        devices.push(device);
    }

    tracing::info!(found = devices.len(), "WS-Discovery finished");
    Ok(devices)
}
