//! SOAP envelopes and WS-Security UsernameToken headers

use quick_xml::escape::escape;
use rand::Rng;
use sha1::{Digest, Sha1};

use crate::models::{AuthMethod, Credential};

pub const SOAP_CONTENT_TYPE: &str = "application/soap+xml; charset=utf-8";

const WSSE_NS: &str =
    "http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-wssecurity-secext-1.0.xsd";
const WSU_NS: &str =
    "http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-wssecurity-utility-1.0.xsd";
const PASSWORD_DIGEST: &str =
    "http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-username-token-profile-1.0#PasswordDigest";
const PASSWORD_TEXT: &str =
    "http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-username-token-profile-1.0#PasswordText";
const BASE64_BINARY: &str =
    "http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-soap-message-security-1.0#Base64Binary";

fn b64(bytes: &[u8]) -> String {
    base64::Engine::encode(&base64::engine::general_purpose::STANDARD, bytes)
}

/// PasswordDigest = Base64(SHA1(nonce + created + password))
pub fn password_digest(nonce: &[u8], created: &str, password: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(nonce);
    hasher.update(created.as_bytes());
    hasher.update(password.as_bytes());
    b64(&hasher.finalize())
}

/// UsernameToken with a hashed password (16-byte nonce, ms-precision Created)
pub fn ws_security_digest(username: &str, password: &str) -> String {
    let nonce: [u8; 16] = rand::thread_rng().gen();
    let created = chrono::Utc::now()
        .format("%Y-%m-%dT%H:%M:%S%.3fZ")
        .to_string();
    let digest = password_digest(&nonce, &created, password);

    format!(
        r#"<wsse:Security s:mustUnderstand="1" xmlns:wsse="{WSSE_NS}" xmlns:wsu="{WSU_NS}">
      <wsse:UsernameToken>
        <wsse:Username>{}</wsse:Username>
        <wsse:Password Type="{PASSWORD_DIGEST}">{}</wsse:Password>
        <wsse:Nonce EncodingType="{BASE64_BINARY}">{}</wsse:Nonce>
        <wsu:Created>{}</wsu:Created>
      </wsse:UsernameToken>
    </wsse:Security>"#,
        escape(username),
        digest,
        b64(&nonce),
        created
    )
}

/// UsernameToken carrying the password in clear
pub fn ws_security_plaintext(username: &str, password: &str) -> String {
    format!(
        r#"<wsse:Security s:mustUnderstand="1" xmlns:wsse="{WSSE_NS}">
      <wsse:UsernameToken>
        <wsse:Username>{}</wsse:Username>
        <wsse:Password Type="{PASSWORD_TEXT}">{}</wsse:Password>
      </wsse:UsernameToken>
    </wsse:Security>"#,
        escape(username),
        escape(password)
    )
}

/// Security header for a scheme; `None` for unauthenticated requests
pub fn security_header(scheme: AuthMethod, cred: Option<&Credential>) -> Option<String> {
    let cred = cred?;
    match scheme {
        AuthMethod::Digest => Some(ws_security_digest(&cred.username, &cred.password)),
        AuthMethod::Plaintext => Some(ws_security_plaintext(&cred.username, &cred.password)),
        AuthMethod::None => None,
    }
}

/// Wrap a request body in a SOAP 1.2 envelope
pub fn build_envelope(header: Option<&str>, body: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<s:Envelope xmlns:s="http://www.w3.org/2003/05/soap-envelope">
  <s:Header>
    {}
  </s:Header>
  <s:Body xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" xmlns:xsd="http://www.w3.org/2001/XMLSchema">
    {}
  </s:Body>
</s:Envelope>"#,
        header.unwrap_or(""),
        body
    )
}

pub const GET_DEVICE_INFORMATION: &str =
    r#"<GetDeviceInformation xmlns="http://www.onvif.org/ver10/device/wsdl"/>"#;
pub const GET_SYSTEM_DATE_AND_TIME: &str =
    r#"<GetSystemDateAndTime xmlns="http://www.onvif.org/ver10/device/wsdl"/>"#;
pub const GET_HOSTNAME: &str = r#"<GetHostname xmlns="http://www.onvif.org/ver10/device/wsdl"/>"#;
pub const GET_SCOPES: &str = r#"<GetScopes xmlns="http://www.onvif.org/ver10/device/wsdl"/>"#;
pub const GET_NETWORK_INTERFACES: &str =
    r#"<GetNetworkInterfaces xmlns="http://www.onvif.org/ver10/device/wsdl"/>"#;
pub const GET_CAPABILITIES: &str = r#"<GetCapabilities xmlns="http://www.onvif.org/ver10/device/wsdl"><Category>All</Category></GetCapabilities>"#;
pub const GET_PROFILES: &str = r#"<GetProfiles xmlns="http://www.onvif.org/ver10/media/wsdl"/>"#;

/// GetStreamUri for RTP-Unicast over RTSP
pub fn get_stream_uri(profile_token: &str) -> String {
    format!(
        r#"<GetStreamUri xmlns="http://www.onvif.org/ver10/media/wsdl">
      <StreamSetup>
        <Stream xmlns="http://www.onvif.org/ver10/schema">RTP-Unicast</Stream>
        <Transport xmlns="http://www.onvif.org/ver10/schema"><Protocol>RTSP</Protocol></Transport>
      </StreamSetup>
      <ProfileToken>{}</ProfileToken>
    </GetStreamUri>"#,
        escape(profile_token)
    )
}
