//! Loopback fakes shared by unit tests

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::Router;
use base64::Engine;
use chrono::{Datelike, Timelike, Utc};
use parking_lot::Mutex;

use crate::onvif_client::soap::password_digest;
use crate::onvif_client::xml::extract_xml_value;
use crate::stream_probe::{ProbeOutcome, StreamProber, AUTH_INVALID, STREAM_NOT_FOUND};

#[derive(Debug)]
struct FakeState {
    username: String,
    password: String,
    profiles: usize,
    plaintext_only: bool,
    base: String,
    device_info_attempts: Arc<AtomicUsize>,
    usernames_seen: Arc<Mutex<Vec<String>>>,
}

/// Minimal ONVIF device + media service on 127.0.0.1
pub struct FakeOnvif {
    username: String,
    password: String,
    profiles: usize,
    plaintext_only: bool,
    device_info_attempts: Arc<AtomicUsize>,
    usernames_seen: Arc<Mutex<Vec<String>>>,
}

impl FakeOnvif {
    pub fn new(username: &str, password: &str) -> Self {
        Self {
            username: username.to_string(),
            password: password.to_string(),
            profiles: 2,
            plaintext_only: false,
            device_info_attempts: Arc::new(AtomicUsize::new(0)),
            usernames_seen: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Total media profiles (two per channel)
    pub fn with_profiles(mut self, n: usize) -> Self {
        self.profiles = n;
        self
    }

    /// Reject PasswordDigest tokens
    pub fn plaintext_only(mut self) -> Self {
        self.plaintext_only = true;
        self
    }

    /// Serve in the background; returns the device service URL
    pub async fn spawn(&self) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let state = Arc::new(FakeState {
            username: self.username.clone(),
            password: self.password.clone(),
            profiles: self.profiles,
            plaintext_only: self.plaintext_only,
            base: base.clone(),
            device_info_attempts: self.device_info_attempts.clone(),
            usernames_seen: self.usernames_seen.clone(),
        });
        let app = Router::new()
            .route("/onvif/device_service", post(handle))
            .route("/onvif/media_service", post(handle))
            .with_state(state);
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        format!("{}/onvif/device_service", base)
    }

    /// GetDeviceInformation requests received, authorised or not
    pub fn device_info_attempts(&self) -> usize {
        self.device_info_attempts.load(Ordering::SeqCst)
    }

    /// Usernames presented in security headers, in arrival order
    pub fn usernames_seen(&self) -> Vec<String> {
        self.usernames_seen.lock().clone()
    }
}

fn authorised(state: &FakeState, body: &str) -> bool {
    let Some(user) = extract_xml_value(body, "Username") else {
        return false;
    };
    state.usernames_seen.lock().push(user.clone());
    if user != state.username {
        return false;
    }
    let password = extract_xml_value(body, "Password").unwrap_or_default();

    if body.contains("#PasswordDigest") {
        if state.plaintext_only {
            return false;
        }
        let nonce = extract_xml_value(body, "Nonce")
            .and_then(|n| base64::engine::general_purpose::STANDARD.decode(n).ok())
            .unwrap_or_default();
        let created = extract_xml_value(body, "Created").unwrap_or_default();
        password_digest(&nonce, &created, &state.password) == password
    } else {
        password == state.password
    }
}

fn soap(inner: String) -> Response {
    let xml = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<SOAP-ENV:Envelope xmlns:SOAP-ENV="http://www.w3.org/2003/05/soap-envelope" xmlns:tds="http://www.onvif.org/ver10/device/wsdl" xmlns:trt="http://www.onvif.org/ver10/media/wsdl" xmlns:tt="http://www.onvif.org/ver10/schema">
<SOAP-ENV:Body>{}</SOAP-ENV:Body>
</SOAP-ENV:Envelope>"#,
        inner
    );
    (StatusCode::OK, [(header::CONTENT_TYPE, "application/soap+xml")], xml).into_response()
}

async fn handle(State(state): State<Arc<FakeState>>, body: String) -> Response {
    if body.contains("GetDeviceInformation") {
        state.device_info_attempts.fetch_add(1, Ordering::SeqCst);
    }
    if !authorised(&state, &body) {
        return StatusCode::UNAUTHORIZED.into_response();
    }

    if body.contains("GetDeviceInformation") {
        soap("<tds:GetDeviceInformationResponse>\
<tds:Manufacturer>Hikvision</tds:Manufacturer>\
<tds:Model>DS-2CD2143G0-I</tds:Model>\
<tds:FirmwareVersion>V5.5.82</tds:FirmwareVersion>\
<tds:SerialNumber>DS-2CD2143G0-I20190101AAWRC12345678</tds:SerialNumber>\
<tds:HardwareId>88</tds:HardwareId>\
</tds:GetDeviceInformationResponse>"
            .to_string())
    } else if body.contains("GetSystemDateAndTime") {
        let now = Utc::now();
        soap(format!(
            "<tds:GetSystemDateAndTimeResponse><tds:SystemDateAndTime><tt:UTCDateTime>\
<tt:Time><tt:Hour>{}</tt:Hour><tt:Minute>{}</tt:Minute><tt:Second>{}</tt:Second></tt:Time>\
<tt:Date><tt:Year>{}</tt:Year><tt:Month>{}</tt:Month><tt:Day>{}</tt:Day></tt:Date>\
</tt:UTCDateTime></tds:SystemDateAndTime></tds:GetSystemDateAndTimeResponse>",
            now.hour(),
            now.minute(),
            now.second(),
            now.year(),
            now.month(),
            now.day()
        ))
    } else if body.contains("GetHostname") {
        soap("<tds:GetHostnameResponse><tds:HostnameInformation>\
<tt:FromDHCP>false</tt:FromDHCP><tt:Name>cam-lobby</tt:Name>\
</tds:HostnameInformation></tds:GetHostnameResponse>"
            .to_string())
    } else if body.contains("GetNetworkInterfaces") {
        soap("<tds:GetNetworkInterfacesResponse><tds:NetworkInterfaces token=\"eth0\">\
<tt:Info><tt:Name>eth0</tt:Name><tt:HwAddress>44:19:b6:12:34:56</tt:HwAddress></tt:Info>\
</tds:NetworkInterfaces></tds:GetNetworkInterfacesResponse>"
            .to_string())
    } else if body.contains("GetCapabilities") {
        soap(format!(
            "<tds:GetCapabilitiesResponse><tds:Capabilities>\
<tt:Device><tt:XAddr>{0}/onvif/device_service</tt:XAddr></tt:Device>\
<tt:Media><tt:XAddr>{0}/onvif/media_service</tt:XAddr></tt:Media>\
</tds:Capabilities></tds:GetCapabilitiesResponse>",
            state.base
        ))
    } else if body.contains("GetProfiles") {
        let profiles: String = (0..state.profiles)
            .map(|i| {
                let channel = i / 2 + 1;
                let kind = if i % 2 == 0 { "Main" } else { "Sub" };
                format!(
                    "<trt:Profiles token=\"Profile_{}\" fixed=\"true\">\
<tt:Name>Channel{}_{}</tt:Name>\
<tt:VideoSourceConfiguration token=\"VSC\"><tt:Name>VideoSource</tt:Name></tt:VideoSourceConfiguration>\
</trt:Profiles>",
                    i + 1,
                    channel,
                    kind
                )
            })
            .collect();
        soap(format!("<trt:GetProfilesResponse>{}</trt:GetProfilesResponse>", profiles))
    } else if body.contains("GetStreamUri") {
        let token = extract_xml_value(&body, "ProfileToken").unwrap_or_default();
        soap(format!(
            "<trt:GetStreamUriResponse><trt:MediaUri>\
<tt:Uri>rtsp://127.0.0.1:554/onvif/{}</tt:Uri>\
<tt:InvalidAfterConnect>false</tt:InvalidAfterConnect>\
</trt:MediaUri></trt:GetStreamUriResponse>",
            token
        ))
    } else {
        StatusCode::BAD_REQUEST.into_response()
    }
}

/// Scripted reply for a probed URL
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Reply {
    Ok,
    AuthFailed,
    NotFound,
    /// Never answers; the probe runs out its timeout
    Hang,
}

type Rule = Box<dyn Fn(&str) -> Reply + Send + Sync>;

/// In-memory `StreamProber` that records every URL it is asked about
pub struct FakeProber {
    rule: Rule,
    calls: Mutex<Vec<String>>,
}

impl FakeProber {
    pub fn new(rule: impl Fn(&str) -> Reply + Send + Sync + 'static) -> Self {
        Self {
            rule: Box::new(rule),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl StreamProber for FakeProber {
    async fn probe(&self, url: &str, timeout: Duration) -> ProbeOutcome {
        self.calls.lock().push(url.to_string());
        match (self.rule)(url) {
            Reply::Ok => ProbeOutcome {
                success: true,
                resolution: Some("1920x1080".to_string()),
                codec: Some("H264".to_string()),
                fps: Some(25.0),
                ..ProbeOutcome::default()
            },
            Reply::AuthFailed => ProbeOutcome::auth_failed(AUTH_INVALID),
            Reply::NotFound => ProbeOutcome::failed(STREAM_NOT_FOUND),
            Reply::Hang => {
                tokio::time::sleep(timeout).await;
                ProbeOutcome::failed("RTSP Error: Connection timed out")
            }
        }
    }
}
