//! Namespace-tolerant value extraction from SOAP responses
//!
//! Fast path: substring search over known ONVIF prefixes, then any prefix,
//! then the bare tag. Fallback: a quick-xml walk matching local names.

use quick_xml::events::Event;
use quick_xml::Reader;

use super::types::MediaProfile;

const KNOWN_PREFIXES: &[&str] = &["tds", "tt", "trt", "tev", "d", "wsdd"];

fn unescape(raw: &str) -> String {
    quick_xml::escape::unescape(raw)
        .map(|v| v.into_owned())
        .unwrap_or_else(|_| raw.to_string())
}

fn value_after(xml: &str, open: &str) -> Option<String> {
    let start = xml.find(open)? + open.len();
    let end = xml[start..].find("</")?;
    let value = xml[start..start + end].trim();
    if value.is_empty() || value.contains('<') {
        return None;
    }
    Some(unescape(value))
}

/// Extract an element's text, tolerant of namespace prefixes
pub fn extract_xml_value(xml: &str, tag: &str) -> Option<String> {
    for prefix in KNOWN_PREFIXES {
        if let Some(v) = value_after(xml, &format!("<{}:{}>", prefix, tag)) {
            return Some(v);
        }
    }

    // Any prefix
    let any_prefix = format!(":{}>", tag);
    let mut search = 0;
    while let Some(pos) = xml[search..].find(any_prefix.as_str()) {
        let at = search + pos;
        let tag_start = xml[..at].rfind('<');
        let is_open = tag_start.map_or(false, |s| {
            let name = &xml[s + 1..at];
            !name.starts_with('/') && !name.contains(char::is_whitespace)
        });
        if is_open {
            if let Some(v) = value_after(&xml[at..], &any_prefix) {
                return Some(v);
            }
        }
        search = at + any_prefix.len();
    }

    if let Some(v) = value_after(xml, &format!("<{}>", tag)) {
        return Some(v);
    }

    find_element_text(xml, tag)
}

/// Depth-first search for the first element whose local name matches `tag`
/// (case-insensitive), returning its trimmed text content.
pub fn find_element_text(xml: &str, tag: &str) -> Option<String> {
    find_all_element_text(xml, tag).into_iter().next()
}

/// Text content of every element whose local name matches `tag`
pub fn find_all_element_text(xml: &str, tag: &str) -> Vec<String> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut out = Vec::new();
    let mut capturing: Option<(usize, String)> = None;
    let mut depth = 0usize;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                depth += 1;
                if capturing.is_none() && e.local_name().as_ref().eq_ignore_ascii_case(tag.as_bytes()) {
                    capturing = Some((depth, String::new()));
                }
            }
            Ok(Event::End(_)) => {
                if let Some((d, text)) = capturing.take() {
                    if d == depth {
                        let text = text.trim().to_string();
                        if !text.is_empty() {
                            out.push(text);
                        }
                    } else {
                        capturing = Some((d, text));
                    }
                }
                depth = depth.saturating_sub(1);
            }
            Ok(Event::Text(t)) => {
                if let Some((_, buf)) = capturing.as_mut() {
                    if let Ok(s) = t.unescape() {
                        buf.push_str(&s);
                    }
                }
            }
            Ok(Event::CData(c)) => {
                if let Some((_, buf)) = capturing.as_mut() {
                    buf.push_str(&String::from_utf8_lossy(&c.into_inner()));
                }
            }
            Ok(Event::Eof) | Err(_) => break,
            _ => {}
        }
    }
    out
}

/// Byte offset just past the `>` of the first opening `tag` element
fn find_open_tag(xml: &str, tag: &str) -> Option<usize> {
    let mut search = 0;
    while let Some(pos) = xml[search..].find('<') {
        let at = search + pos + 1;
        let after = &xml[at..];
        let name_end = after.find(|c: char| c.is_whitespace() || c == '>' || c == '/')?;
        let name = &after[..name_end];
        let local = name.rsplit(':').next().unwrap_or(name);
        if !name.is_empty() && !name.starts_with('/') && local == tag {
            let close = after.find('>')?;
            if !after[..close].ends_with('/') {
                return Some(at + close + 1);
            }
        }
        search = at;
    }
    None
}

/// Inner markup of the first `tag` element (any prefix, attributes allowed)
pub fn extract_section<'a>(xml: &'a str, tag: &str) -> Option<&'a str> {
    let body_start = find_open_tag(xml, tag)?;
    let rest = &xml[body_start..];
    for (i, _) in rest.match_indices("</") {
        let after = &rest[i + 2..];
        let name_end = after.find('>')?;
        let name = after[..name_end].trim();
        if name.rsplit(':').next() == Some(tag) {
            return Some(&rest[..i]);
        }
    }
    None
}

/// Extract XAddr from a capability section (e.g. `Media`)
pub fn extract_capability_xaddr(xml: &str, capability: &str) -> Option<String> {
    let section = extract_section(xml, capability)?;
    extract_xml_value(section, "XAddr")
}

/// Extract XML attribute value from the first `tag` element
pub fn extract_xml_attribute(xml: &str, tag: &str, attr: &str) -> Option<String> {
    let mut reader = Reader::from_str(xml);
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                if e.local_name().as_ref().eq_ignore_ascii_case(tag.as_bytes()) {
                    for a in e.attributes().flatten() {
                        if a.key.local_name().as_ref() == attr.as_bytes() {
                            return a.unescape_value().ok().map(|v| v.into_owned());
                        }
                    }
                }
            }
            Ok(Event::Eof) | Err(_) => return None,
            _ => {}
        }
    }
}

/// Media profiles from a GetProfiles response, in document order
pub fn parse_profiles(xml: &str) -> Vec<MediaProfile> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut profiles = Vec::new();
    let mut depth = 0usize;
    // (depth of the Profiles element, profile being built)
    let mut current: Option<(usize, MediaProfile)> = None;
    let mut in_name = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                depth += 1;
                let local = e.local_name();
                if current.is_none() && local.as_ref() == b"Profiles" {
                    let token = e
                        .attributes()
                        .flatten()
                        .find(|a| a.key.local_name().as_ref() == b"token")
                        .and_then(|a| a.unescape_value().ok().map(|v| v.into_owned()))
                        .unwrap_or_default();
                    current = Some((depth, MediaProfile { token, name: None }));
                } else if let Some((d, _)) = &current {
                    in_name = depth == d + 1 && local.as_ref() == b"Name";
                }
            }
            Ok(Event::Text(t)) => {
                if in_name {
                    if let (Some((_, p)), Ok(s)) = (current.as_mut(), t.unescape()) {
                        p.name = Some(s.trim().to_string());
                    }
                }
            }
            Ok(Event::End(_)) => {
                in_name = false;
                if let Some((d, _)) = &current {
                    if *d == depth {
                        if let Some((_, p)) = current.take() {
                            if !p.token.is_empty() {
                                profiles.push(p);
                            }
                        }
                    }
                }
                depth = depth.saturating_sub(1);
            }
            Ok(Event::Eof) | Err(_) => break,
            _ => {}
        }
    }
    profiles
}

/// SOAP fault text (Reason/Text or faultstring), if the body is a fault
pub fn soap_fault(xml: &str) -> Option<String> {
    if !xml.contains(":Fault>") && !xml.contains("<Fault>") && !xml.contains(":Fault ") {
        return None;
    }
    let subcode = find_all_element_text(xml, "Value").into_iter().last();
    let reason = find_element_text(xml, "Text").or_else(|| find_element_text(xml, "faultstring"));
    Some(match (subcode, reason) {
        (Some(code), Some(reason)) => format!("{}: {}", code, reason),
        (Some(code), None) => code,
        (None, Some(reason)) => reason,
        (None, None) => "SOAP fault".to_string(),
    })
}
